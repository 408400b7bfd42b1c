//! Market-wide ledger: the global position, the aggregate pending queue, the version
//! log and the fee pools.

use crate::config::MarketConfig;
use crate::liquidation::Shortfall;
use crate::pending::PendingQueue;
use crate::position::Position;
use crate::types::{Quote, Timestamp};
use crate::version::VersionLog;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ledger head of the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Global {
    pub current_id: u64,
    pub latest_id: u64,
    pub latest_price: Decimal,
    // funding controller state, annualised
    pub funding_rate: Decimal,
    pub protocol_fee: Quote,
    pub oracle_fee: Quote,
    pub risk_fee: Quote,
    pub donation: Quote,
    pub shortfall: Shortfall,
}

impl Global {
    pub fn pools(&self) -> Quote {
        self.protocol_fee
            .add(self.oracle_fee)
            .add(self.risk_fee)
            .add(self.donation)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    pub config: MarketConfig,
    pub global: Global,
    pub position: Position,
    pub pending: PendingQueue,
    pub versions: VersionLog,
    // invalid timestamp -> timestamp its orders were moved to, while an account still
    // has an order at or before it
    pub carries: BTreeMap<Timestamp, Timestamp>,
}

impl MarketState {
    pub fn new(config: MarketConfig) -> Self {
        Self {
            config,
            global: Global::default(),
            position: Position::default(),
            pending: PendingQueue::new(),
            versions: VersionLog::new(),
            carries: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn pools_sum_every_fee_bucket() {
        let global = Global {
            protocol_fee: Quote::new(dec!(1)),
            oracle_fee: Quote::new(dec!(2)),
            risk_fee: Quote::new(dec!(3)),
            donation: Quote::new(dec!(4)),
            ..Global::default()
        };
        assert_eq!(global.pools(), Quote::new(dec!(10)));
    }
}
