// 9.0 oracle.rs: price oracle collaborator. the engine never computes prices; it asks the
// oracle for the reading at a timestamp and for the timestamp new orders should target.
// MockOracle is an in-memory feed with a manually driven clock, shared through Rc so a
// test or simulation can keep publishing after handing it to the engine.

use crate::types::{AccountId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OracleVersion {
    pub timestamp: Timestamp,
    pub price: Decimal,
    pub valid: bool,
    // fee owed to the oracle for publishing this reading
    pub settlement_fee: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleStatus {
    // most recent committed reading, valid or not
    pub latest: OracleVersion,
    // timestamp that orders placed now will settle at; always after `latest`
    pub next_timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("no reading committed at or after {0}")]
    NotCommitted(Timestamp),
    #[error("reading at {timestamp} is not after latest {latest}")]
    OutOfOrder { timestamp: Timestamp, latest: Timestamp },
    #[error("price must be positive, got {0}")]
    InvalidPrice(Decimal),
}

pub trait Oracle {
    fn at(&self, timestamp: Timestamp) -> Result<OracleVersion, OracleError>;
    fn status(&self) -> Result<OracleStatus, OracleError>;
    // prefetch hint: someone has an order pending at the next timestamp
    fn request(&mut self, account: AccountId) -> Result<(), OracleError>;
}

#[derive(Debug, Default)]
struct OracleBook {
    readings: BTreeMap<Timestamp, OracleVersion>,
    latest: Option<Timestamp>,
    now: Timestamp,
    granularity: u64,
    settlement_fee: Decimal,
    requests: Vec<(AccountId, Timestamp)>,
}

impl OracleBook {
    fn round_up(&self, timestamp: u64) -> u64 {
        let granularity = self.granularity.max(1);
        timestamp.div_ceil(granularity) * granularity
    }

    fn next_timestamp(&self) -> Timestamp {
        let after_latest = self.latest.map_or(0, |latest| self.round_up(latest.0 + 1));
        Timestamp(self.round_up(self.now.0).max(after_latest))
    }

    fn last_price_before(&self, timestamp: Timestamp) -> Decimal {
        self.readings
            .range(..timestamp)
            .rev()
            .find(|(_, reading)| reading.valid)
            .map_or(Decimal::ZERO, |(_, reading)| reading.price)
    }

    fn push(&mut self, reading: OracleVersion) -> Result<(), OracleError> {
        if let Some(latest) = self.latest {
            if reading.timestamp <= latest {
                return Err(OracleError::OutOfOrder {
                    timestamp: reading.timestamp,
                    latest,
                });
            }
        }
        self.latest = Some(reading.timestamp);
        self.readings.insert(reading.timestamp, reading);
        Ok(())
    }
}

/// In-memory oracle. Clones share the same feed.
#[derive(Debug, Clone)]
pub struct MockOracle {
    book: Rc<RefCell<OracleBook>>,
}

impl MockOracle {
    pub fn new(granularity: u64) -> Self {
        let book = OracleBook {
            granularity,
            ..OracleBook::default()
        };
        Self {
            book: Rc::new(RefCell::new(book)),
        }
    }

    pub fn set_time(&self, now: Timestamp) {
        self.book.borrow_mut().now = now;
    }

    pub fn now(&self) -> Timestamp {
        self.book.borrow().now
    }

    pub fn next_timestamp(&self) -> Timestamp {
        self.book.borrow().next_timestamp()
    }

    pub fn set_settlement_fee(&self, fee: Decimal) {
        self.book.borrow_mut().settlement_fee = fee;
    }

    pub fn commit(&self, timestamp: Timestamp, price: Decimal) -> Result<(), OracleError> {
        if price <= Decimal::ZERO {
            return Err(OracleError::InvalidPrice(price));
        }
        let mut book = self.book.borrow_mut();
        let settlement_fee = book.settlement_fee;
        book.push(OracleVersion {
            timestamp,
            price,
            valid: true,
            settlement_fee,
        })
    }

    /// Commits a timestamp for which no valid price could be produced.
    pub fn commit_invalid(&self, timestamp: Timestamp) -> Result<(), OracleError> {
        let mut book = self.book.borrow_mut();
        let reading = OracleVersion {
            timestamp,
            price: book.last_price_before(timestamp),
            valid: false,
            settlement_fee: book.settlement_fee,
        };
        book.push(reading)
    }

    pub fn requests(&self) -> Vec<(AccountId, Timestamp)> {
        self.book.borrow().requests.clone()
    }
}

impl Oracle for MockOracle {
    fn at(&self, timestamp: Timestamp) -> Result<OracleVersion, OracleError> {
        let book = self.book.borrow();
        if let Some(reading) = book.readings.get(&timestamp) {
            return Ok(*reading);
        }
        match book.latest {
            // skipped over: the oracle never produced a price here
            Some(latest) if timestamp <= latest => Ok(OracleVersion {
                timestamp,
                price: book.last_price_before(timestamp),
                valid: false,
                settlement_fee: book.settlement_fee,
            }),
            _ => Err(OracleError::NotCommitted(timestamp)),
        }
    }

    fn status(&self) -> Result<OracleStatus, OracleError> {
        let book = self.book.borrow();
        let latest = book
            .latest
            .and_then(|latest| book.readings.get(&latest).copied())
            .unwrap_or_default();
        Ok(OracleStatus {
            latest,
            next_timestamp: book.next_timestamp(),
        })
    }

    fn request(&mut self, account: AccountId) -> Result<(), OracleError> {
        let mut book = self.book.borrow_mut();
        let next = book.next_timestamp();
        book.requests.push((account, next));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn next_timestamp_is_after_latest_and_granular() {
        let oracle = MockOracle::new(10);
        oracle.set_time(Timestamp(95));
        assert_eq!(oracle.next_timestamp(), Timestamp(100));
        oracle.commit(Timestamp(100), dec!(50)).unwrap();
        assert_eq!(oracle.next_timestamp(), Timestamp(110));
        oracle.set_time(Timestamp(131));
        assert_eq!(oracle.next_timestamp(), Timestamp(140));
    }

    #[test]
    fn skipped_timestamps_read_as_invalid() {
        let oracle = MockOracle::new(1);
        oracle.set_settlement_fee(dec!(0.5));
        oracle.commit(Timestamp(10), dec!(50)).unwrap();
        oracle.commit(Timestamp(20), dec!(60)).unwrap();

        let skipped = oracle.at(Timestamp(15)).unwrap();
        assert!(!skipped.valid);
        assert_eq!(skipped.price, dec!(50));
        assert_eq!(skipped.settlement_fee, dec!(0.5));
        assert!(matches!(oracle.at(Timestamp(21)), Err(OracleError::NotCommitted(_))));
    }

    #[test]
    fn commits_must_move_forward() {
        let oracle = MockOracle::new(1);
        oracle.commit(Timestamp(10), dec!(50)).unwrap();
        assert!(oracle.commit(Timestamp(10), dec!(51)).is_err());
        assert!(oracle.commit_invalid(Timestamp(9)).is_err());
        assert!(oracle.commit(Timestamp(11), dec!(0)).is_err());
    }

    #[test]
    fn status_reports_latest_reading() {
        let mut oracle = MockOracle::new(1);
        let status = oracle.status().unwrap();
        assert!(!status.latest.valid);
        oracle.commit_invalid(Timestamp(5)).unwrap();
        let status = oracle.status().unwrap();
        assert_eq!(status.latest.timestamp, Timestamp(5));
        assert!(!status.latest.valid);
        oracle.request(AccountId(1)).unwrap();
        assert_eq!(oracle.requests(), vec![(AccountId(1), Timestamp(6))]);
    }
}
