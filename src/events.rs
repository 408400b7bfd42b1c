// 11.0: every committed state change produces an event. used for audit trails and for
// reconstructing per-account history. aborted calls leave no events behind.

use crate::accumulator::AccumulationResult;
use crate::checkpoint::Checkpoint;
use crate::config::{MarketParameter, RiskParameter};
use crate::order::{Guarantee, Order};
use crate::types::{AccountId, Quote, Side, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Order events
    OrderCreated(OrderCreatedEvent),

    // Settlement events
    PositionProcessed(PositionProcessedEvent),
    AccountPositionProcessed(AccountPositionProcessedEvent),
    ShortfallSocialized(ShortfallSocializedEvent),

    // Fee events
    FeeClaimed(FeeClaimedEvent),

    // Admin events
    ParameterUpdated(ParameterUpdatedEvent),
    RiskParameterUpdated(RiskParameterUpdatedEvent),
    BeneficiaryUpdated(BeneficiaryUpdatedEvent),
}

impl EventPayload {
    /// Account the event is about, if it concerns a single one.
    pub fn account(&self) -> Option<AccountId> {
        match self {
            EventPayload::OrderCreated(e) => Some(e.account),
            EventPayload::AccountPositionProcessed(e) => Some(e.account),
            EventPayload::ShortfallSocialized(e) => Some(e.account),
            EventPayload::FeeClaimed(e) => Some(e.claimant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub account: AccountId,
    pub order_id: u64,
    pub order: Order,
    pub guarantee: Guarantee,
    pub liquidator: Option<AccountId>,
    pub originator: Option<AccountId>,
    pub solver: Option<AccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionProcessedEvent {
    pub order_id: u64,
    pub timestamp: Timestamp,
    pub valid: bool,
    pub order: Order,
    pub accumulation: AccumulationResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPositionProcessedEvent {
    pub account: AccountId,
    pub order_id: u64,
    pub timestamp: Timestamp,
    pub order: Order,
    pub checkpoint: Checkpoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortfallSocializedEvent {
    pub account: AccountId,
    pub side: Side,
    pub amount: Quote,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeClaimedEvent {
    pub claimant: AccountId,
    pub receiver: AccountId,
    pub amount: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterUpdatedEvent {
    pub parameter: MarketParameter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParameterUpdatedEvent {
    pub parameter: RiskParameter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeneficiaryUpdatedEvent {
    pub beneficiary: Option<AccountId>,
}
