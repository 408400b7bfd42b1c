// 8.9 engine/config.rs: process-level knobs that never touch market state: how much of
// the event history stays in memory and which events are echoed to stdout.

use crate::config::ConfigError;
use crate::events::EventPayload;
use serde::{Deserialize, Serialize};

/// Events written to stdout as they are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventEcho {
    #[default]
    Off,
    // global and local settlement, shortfalls
    Settlement,
    All,
}

impl EventEcho {
    pub fn includes(&self, payload: &EventPayload) -> bool {
        match self {
            EventEcho::Off => false,
            EventEcho::All => true,
            EventEcho::Settlement => matches!(
                payload,
                EventPayload::PositionProcessed(_)
                    | EventPayload::AccountPositionProcessed(_)
                    | EventPayload::ShortfallSocialized(_)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    // oldest events are dropped past this many; ledgers and checkpoints are never trimmed
    pub event_capacity: usize,
    pub echo: EventEcho,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_capacity: 100_000,
            echo: EventEcho::Off,
        }
    }
}

impl EngineConfig {
    /// Keeps every event and prints settlement as it happens.
    pub fn audit() -> Self {
        Self {
            event_capacity: usize::MAX,
            echo: EventEcho::Settlement,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // the last committed call's events must stay readable
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidEngine {
                reason: "event capacity must be at least one".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BeneficiaryUpdatedEvent, ShortfallSocializedEvent};
    use crate::types::{AccountId, Quote, Side, Timestamp};
    use rust_decimal_macros::dec;

    #[test]
    fn settlement_echo_skips_admin_events() {
        let shortfall = EventPayload::ShortfallSocialized(ShortfallSocializedEvent {
            account: AccountId(1),
            side: Side::Long,
            amount: Quote::new(dec!(3)),
            timestamp: Timestamp(1000),
        });
        let admin = EventPayload::BeneficiaryUpdated(BeneficiaryUpdatedEvent {
            beneficiary: Some(AccountId(2)),
        });
        assert!(EventEcho::Settlement.includes(&shortfall));
        assert!(!EventEcho::Settlement.includes(&admin));
        assert!(EventEcho::All.includes(&admin));
        assert!(!EventEcho::Off.includes(&shortfall));
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = EngineConfig {
            event_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(EngineConfig::audit().validate().is_ok());
    }

    #[test]
    fn json_round_trip() {
        let json = serde_json::to_string(&EngineConfig::audit()).unwrap();
        assert!(json.contains("\"settlement\""));
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EngineConfig::audit());
    }
}
