//! Immutable per-timestamp snapshots of the market's cumulative accumulators.
//!
//! Value fields are cumulative per unit of position: an account holding `size` on a side
//! from version `a` to version `b` earns `size * (b.value - a.value)`, whatever happened
//! in between. Per-version fields (fees, spread) only apply to orders settling at that
//! timestamp.

use crate::liquidation::LiquidationFee;
use crate::types::{Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Version {
    pub timestamp: Timestamp,
    pub valid: bool,
    pub price: Decimal,
    pub maker_value: Decimal,
    pub long_value: Decimal,
    pub short_value: Decimal,
    // fee per unit of maker / fee-paying taker volume
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
    // price impact per unit of skew-positive / skew-negative volume
    pub spread_pos: Decimal,
    pub spread_neg: Decimal,
    // oracle fee per order settling here
    pub settlement_fee: Decimal,
    pub liquidation_fee: LiquidationFee,
}

impl Version {
    /// Starting point before the first valid version: no price, all accumulators zero.
    pub fn genesis() -> Self {
        Self::default()
    }

    /// Next snapshot carrying the cumulative values forward, per-version fields cleared.
    pub fn next(&self, timestamp: Timestamp, valid: bool, price: Decimal) -> Self {
        Self {
            timestamp,
            valid,
            price,
            maker_value: self.maker_value,
            long_value: self.long_value,
            short_value: self.short_value,
            ..Self::default()
        }
    }

    pub fn value(&self, side: Side) -> Decimal {
        match side {
            Side::Maker => self.maker_value,
            Side::Long => self.long_value,
            Side::Short => self.short_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VersionError {
    #[error("version at {timestamp} already exists")]
    Duplicate { timestamp: Timestamp },
    #[error("version at {timestamp} is older than latest {latest}")]
    OutOfOrder { timestamp: Timestamp, latest: Timestamp },
}

// append-only arena of versions with a timestamp index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionLog {
    versions: Vec<Version>,
    index: BTreeMap<Timestamp, usize>,
    latest_valid: Option<usize>,
}

impl VersionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, version: Version) -> Result<(), VersionError> {
        if self.index.contains_key(&version.timestamp) {
            return Err(VersionError::Duplicate {
                timestamp: version.timestamp,
            });
        }
        if let Some(latest) = self.versions.last() {
            if version.timestamp < latest.timestamp {
                return Err(VersionError::OutOfOrder {
                    timestamp: version.timestamp,
                    latest: latest.timestamp,
                });
            }
        }
        self.index.insert(version.timestamp, self.versions.len());
        if version.valid {
            self.latest_valid = Some(self.versions.len());
        }
        self.versions.push(version);
        Ok(())
    }

    pub fn get(&self, timestamp: Timestamp) -> Option<&Version> {
        self.index.get(&timestamp).and_then(|&slot| self.versions.get(slot))
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.index.contains_key(&timestamp)
    }

    pub fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    /// Most recent version with a usable price, where accumulation last ran.
    pub fn latest_valid(&self) -> Option<&Version> {
        self.latest_valid.and_then(|slot| self.versions.get(slot))
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter()
    }
}
