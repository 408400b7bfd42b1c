//! Unsettled orders, per account and for the whole market, keyed by order id.
//!
//! Ids increase with timestamps. An action at the timestamp of the newest entry
//! coalesces into it; an action at a later timestamp opens the next id.

use crate::margin::Projection;
use crate::order::{Guarantee, Order};
use crate::position::{Position, PositionError};
use crate::types::{AccountId, Quote, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PendingEntry {
    pub order: Order,
    pub guarantee: Guarantee,
    pub referrer: Option<AccountId>,
    // intent fills: the originator and solver share the guarantee's referral fee
    pub originator: Option<AccountId>,
    pub solver: Option<AccountId>,
    pub solver_fee: Decimal,
}

impl PendingEntry {
    pub fn new(order: Order, guarantee: Guarantee) -> Self {
        Self {
            order,
            guarantee,
            ..Self::default()
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.order.timestamp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carry {
    Merged { into: u64 },
    Rekeyed,
    Missing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingQueue {
    entries: BTreeMap<u64, PendingEntry>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&PendingEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut PendingEntry> {
        self.entries.get_mut(&id)
    }

    /// Oldest unsettled entry.
    pub fn first(&self) -> Option<(u64, PendingEntry)> {
        self.entries.iter().next().map(|(&id, entry)| (id, *entry))
    }

    pub fn remove(&mut self, id: u64) -> Option<PendingEntry> {
        self.entries.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &PendingEntry)> {
        self.entries.iter()
    }

    /// Adds `order` to the entry at `current_id` when both target the same timestamp,
    /// otherwise opens `current_id + 1`. Returns the id the order landed in.
    pub fn stage(&mut self, current_id: &mut u64, order: &Order, guarantee: &Guarantee) -> u64 {
        if let Some(entry) = self.entries.get_mut(current_id) {
            if entry.order.timestamp == order.timestamp {
                entry.order.merge(order);
                entry.guarantee.merge(guarantee);
                return *current_id;
            }
        }
        *current_id += 1;
        self.entries.insert(*current_id, PendingEntry::new(*order, *guarantee));
        *current_id
    }

    /// The settled position walked through every pending order.
    pub fn project(&self, settled: &Position) -> Result<Projection, PositionError> {
        let mut projection = Projection::from_position(settled);
        for entry in self.entries.values() {
            projection.push(&entry.order)?;
        }
        Ok(projection)
    }

    pub fn collateral(&self) -> Quote {
        self.entries.values().map(|entry| entry.order.collateral).sum()
    }

    pub fn deposits(&self) -> Quote {
        self.entries
            .values()
            .map(|entry| entry.order.collateral.max(Quote::zero()))
            .sum()
    }

    pub fn has_protection(&self) -> bool {
        self.entries.values().any(|entry| entry.order.is_protected())
    }

    /// Moves the deltas of an invalid entry to `target`: into the next entry when it
    /// settles at `target`, otherwise by re-keying the entry itself.
    pub fn carry(&mut self, id: u64, target: Timestamp) -> Carry {
        let Some(entry) = self.entries.remove(&id) else {
            return Carry::Missing;
        };
        let order = entry.order.carried(target);
        let guarantee = entry.guarantee.carried();

        let next = self.entries.range(id + 1..).next().map(|(&next_id, _)| next_id);
        if let Some(next_id) = next {
            if let Some(next_entry) = self.entries.get_mut(&next_id) {
                if next_entry.order.timestamp <= target {
                    next_entry.order.merge(&order);
                    next_entry.guarantee.merge(&guarantee);
                    return Carry::Merged { into: next_id };
                }
            }
        }

        self.entries.insert(
            id,
            PendingEntry {
                order,
                guarantee,
                ..entry
            },
        );
        Carry::Rekeyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(timestamp: u64, long: Decimal, collateral: Decimal) -> Order {
        Order::from_deltas(Timestamp(timestamp), dec!(0), long, dec!(0), Quote::new(collateral), Decimal::ZERO)
    }

    #[test]
    fn same_timestamp_coalesces() {
        let mut queue = PendingQueue::new();
        let mut current = 0;
        assert_eq!(queue.stage(&mut current, &order(10, dec!(1), dec!(5)), &Guarantee::default()), 1);
        assert_eq!(queue.stage(&mut current, &order(10, dec!(2), dec!(0)), &Guarantee::default()), 1);
        assert_eq!(queue.stage(&mut current, &order(20, dec!(1), dec!(0)), &Guarantee::default()), 2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get(1).map(|e| (e.order.long_pos, e.order.orders)), Some((dec!(3), 2)));
        assert_eq!(queue.collateral(), Quote::new(dec!(5)));
    }

    #[test]
    fn projection_tracks_peak_magnitude() {
        let mut queue = PendingQueue::new();
        let mut current = 0;
        queue.stage(&mut current, &order(10, dec!(4), dec!(0)), &Guarantee::default());
        queue.stage(&mut current, &order(20, dec!(-3), dec!(0)), &Guarantee::default());
        let projection = queue.project(&Position::new(Timestamp(0))).unwrap();
        assert_eq!(projection.current.long, dec!(1));
        assert_eq!(projection.max_magnitude, dec!(4));
        assert!(projection.single_sided);
    }

    #[test]
    fn carry_merges_into_next_entry() {
        let mut queue = PendingQueue::new();
        let mut current = 0;
        queue.stage(&mut current, &order(10, dec!(1), dec!(5)), &Guarantee::default());
        queue.stage(&mut current, &order(20, dec!(2), dec!(0)), &Guarantee::default());

        assert_eq!(queue.carry(1, Timestamp(20)), Carry::Merged { into: 2 });
        let merged = queue.get(2).copied().unwrap();
        assert_eq!(merged.order.long_pos, dec!(3));
        // the carried part pays no second settlement fee and moves no collateral
        assert_eq!(merged.order.orders, 1);
        assert!(merged.order.collateral.is_zero());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn carry_rekeys_last_entry() {
        let mut queue = PendingQueue::new();
        let mut current = 0;
        queue.stage(&mut current, &order(10, dec!(1), dec!(5)), &Guarantee::default());
        assert_eq!(queue.carry(1, Timestamp(30)), Carry::Rekeyed);
        let rekeyed = queue.get(1).copied().unwrap();
        assert_eq!(rekeyed.timestamp(), Timestamp(30));
        assert_eq!(rekeyed.order.orders, 0);

        // a later action at the new timestamp joins the same id
        assert_eq!(queue.stage(&mut current, &order(30, dec!(1), dec!(0)), &Guarantee::default()), 1);
        assert_eq!(queue.carry(7, Timestamp(40)), Carry::Missing);
    }
}
