// 7.0 config.rs: every tunable of the market in one place.
// 7.1 RiskParameter: margin, fees, price impact, funding, interest, limits. owner or coordinator.
// 7.2 MarketParameter: fee cuts, pending limits, open/close switches. owner only.
// 7.3 ProtocolParameter: protocol-wide caps and pause flag, served by the registry.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::funding::FundingController;
use crate::interest::UtilizationCurve;
use crate::liquidation::LiquidationFee;
use crate::spread::SpreadCurve;
use crate::types::Quote;

// How the efficiency limit is enforced once the market is under it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyMode {
    // reject orders that lower efficiency and leave it under the limit
    #[default]
    Standard,
    // under the limit, only closing orders are accepted
    AlwaysClose,
}

/** 7.1: risk parameters */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParameter {
    // initial margin as a fraction of notional
    pub margin: Decimal,
    // maintenance as a fraction of notional
    pub maintenance: Decimal,
    pub min_margin: Quote,
    pub min_maintenance: Quote,
    // fraction of notional charged per unit traded
    pub taker_fee: Decimal,
    pub maker_fee: Decimal,
    pub spread: SpreadCurve,
    // position size that counts as a skew of 1.0
    pub skew_scale: Decimal,
    pub funding: FundingController,
    pub utilization: UtilizationCurve,
    // cap on the global maker position
    pub maker_limit: Decimal,
    // minimum maker / taker ratio
    pub efficiency_limit: Decimal,
    // fraction of the closed notional paid to the liquidator
    pub liquidation_fee: Decimal,
    pub min_liquidation_fee: Quote,
    pub max_liquidation_fee: Quote,
    // seconds after which the latest price may no longer open or change positions
    pub stale_after: u64,
    pub maker_receive_only: bool,
}

impl Default for RiskParameter {
    fn default() -> Self {
        Self {
            margin: dec!(0.1),
            maintenance: dec!(0.05),
            min_margin: Quote::new(dec!(10)),
            min_maintenance: Quote::new(dec!(5)),
            taker_fee: dec!(0.0005),
            maker_fee: dec!(0.0002),
            spread: SpreadCurve::default(),
            skew_scale: dec!(1000),
            funding: FundingController::default(),
            utilization: UtilizationCurve::default(),
            maker_limit: dec!(1_000_000),
            efficiency_limit: dec!(0.5),
            liquidation_fee: dec!(0.01),
            min_liquidation_fee: Quote::new(dec!(1)),
            max_liquidation_fee: Quote::new(dec!(1000)),
            stale_after: 7200,
            maker_receive_only: false,
        }
    }
}

impl RiskParameter {
    pub fn liquidation_fee_schedule(&self) -> LiquidationFee {
        LiquidationFee {
            rate: self.liquidation_fee,
            min: self.min_liquidation_fee,
            max: self.max_liquidation_fee,
        }
    }

    pub fn validate(&self, protocol: &ProtocolParameter) -> Result<(), ConfigError> {
        if self.maintenance <= Decimal::ZERO || self.margin < self.maintenance {
            return Err(ConfigError::InvalidMargin {
                reason: "maintenance must be positive and at most margin".to_string(),
            });
        }
        if self.min_maintenance.is_negative() || self.min_margin < self.min_maintenance {
            return Err(ConfigError::InvalidMargin {
                reason: "min maintenance must be non-negative and at most min margin".to_string(),
            });
        }
        for (name, fee) in [("taker", self.taker_fee), ("maker", self.maker_fee)] {
            if fee < Decimal::ZERO || fee > protocol.max_fee {
                return Err(ConfigError::InvalidFees {
                    reason: format!("{name} fee {fee} outside [0, {}]", protocol.max_fee),
                });
            }
        }
        if self.skew_scale <= Decimal::ZERO {
            return Err(ConfigError::InvalidRisk {
                reason: "skew scale must be positive".to_string(),
            });
        }
        if self.funding.k < Decimal::ZERO || self.funding.min > self.funding.max {
            return Err(ConfigError::InvalidRisk {
                reason: "funding controller bounds are inverted".to_string(),
            });
        }
        let curve = &self.utilization;
        if curve.target_utilization <= Decimal::ZERO
            || curve.target_utilization > Decimal::ONE
            || curve.min_rate < Decimal::ZERO
            || curve.target_rate < Decimal::ZERO
            || curve.max_rate < Decimal::ZERO
        {
            return Err(ConfigError::InvalidRisk {
                reason: "utilization curve out of range".to_string(),
            });
        }
        if self.liquidation_fee < Decimal::ZERO
            || self.liquidation_fee > Decimal::ONE
            || self.min_liquidation_fee.is_negative()
            || self.min_liquidation_fee > self.max_liquidation_fee
            || self.max_liquidation_fee > protocol.max_fee_absolute
        {
            return Err(ConfigError::InvalidFees {
                reason: "liquidation fee schedule out of range".to_string(),
            });
        }
        if self.maker_limit < Decimal::ZERO || self.efficiency_limit < Decimal::ZERO {
            return Err(ConfigError::InvalidRisk {
                reason: "limits must be non-negative".to_string(),
            });
        }
        if self.stale_after == 0 {
            return Err(ConfigError::InvalidRisk {
                reason: "stale_after must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/** 7.2: market parameters */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketParameter {
    // cut of funding kept by the market
    pub funding_fee: Decimal,
    // cut of interest kept by the market
    pub interest_fee: Decimal,
    // share of market fees (after the protocol cut) paid to the oracle
    pub oracle_fee: Decimal,
    // share of market fees (after the protocol cut) kept as the risk pool
    pub risk_fee: Decimal,
    pub max_pending_global: u64,
    pub max_pending_local: u64,
    pub efficiency_mode: EfficiencyMode,
    // no position increases
    pub closed: bool,
    // no position changes at all
    pub settle_only: bool,
}

impl Default for MarketParameter {
    fn default() -> Self {
        Self {
            funding_fee: dec!(0.1),
            interest_fee: dec!(0.1),
            oracle_fee: dec!(0.1),
            risk_fee: dec!(0.2),
            max_pending_global: 8,
            max_pending_local: 4,
            efficiency_mode: EfficiencyMode::Standard,
            closed: false,
            settle_only: false,
        }
    }
}

impl MarketParameter {
    pub fn validate(&self, protocol: &ProtocolParameter) -> Result<(), ConfigError> {
        for (name, cut) in [
            ("funding", self.funding_fee),
            ("interest", self.interest_fee),
            ("oracle", self.oracle_fee),
            ("risk", self.risk_fee),
        ] {
            if cut < Decimal::ZERO || cut > protocol.max_cut {
                return Err(ConfigError::InvalidFees {
                    reason: format!("{name} fee {cut} outside [0, {}]", protocol.max_cut),
                });
            }
        }
        if self.oracle_fee + self.risk_fee > Decimal::ONE {
            return Err(ConfigError::InvalidFees {
                reason: "oracle and risk shares exceed the whole".to_string(),
            });
        }
        for limit in [self.max_pending_global, self.max_pending_local] {
            if limit == 0 || limit > protocol.max_pending_ids {
                return Err(ConfigError::InvalidMarket {
                    reason: format!("pending limit {limit} outside [1, {}]", protocol.max_pending_ids),
                });
            }
        }
        Ok(())
    }
}

/** 7.3: protocol-wide parameters */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolParameter {
    // cut of market fees taken by the protocol before any other split
    pub protocol_fee: Decimal,
    // cap on trade fee rates
    pub max_fee: Decimal,
    // cap on absolute fees (liquidation fee)
    pub max_fee_absolute: Quote,
    // cap on fee cuts
    pub max_cut: Decimal,
    // default referral share of trade fees
    pub referral_fee: Decimal,
    pub max_pending_ids: u64,
    pub paused: bool,
}

impl Default for ProtocolParameter {
    fn default() -> Self {
        Self {
            protocol_fee: dec!(0.1),
            max_fee: dec!(0.01),
            max_fee_absolute: Quote::new(dec!(10_000)),
            max_cut: dec!(0.5),
            referral_fee: dec!(0.1),
            max_pending_ids: 16,
            paused: false,
        }
    }
}

impl ProtocolParameter {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol_fee < Decimal::ZERO || self.protocol_fee > self.max_cut {
            return Err(ConfigError::InvalidFees {
                reason: "protocol fee outside [0, max_cut]".to_string(),
            });
        }
        if self.max_cut > Decimal::ONE || self.referral_fee < Decimal::ZERO || self.referral_fee > Decimal::ONE {
            return Err(ConfigError::InvalidFees {
                reason: "cuts must be fractions".to_string(),
            });
        }
        if self.max_pending_ids == 0 {
            return Err(ConfigError::InvalidMarket {
                reason: "max pending ids must be positive".to_string(),
            });
        }
        Ok(())
    }
}

// The full configuration of one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub name: String,
    pub risk: RiskParameter,
    pub market: MarketParameter,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            name: "ETH-PERP".to_string(),
            risk: RiskParameter::default(),
            market: MarketParameter::default(),
        }
    }
}

impl MarketConfig {
    // Free trading and fast funding for test deployments
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.name = "ETH-PERP Testnet".to_string();
        config.risk.taker_fee = Decimal::ZERO;
        config.risk.maker_fee = Decimal::ZERO;
        config.risk.funding.k = dec!(10000);
        config.market.max_pending_local = 8;
        config
    }

    // Conservative margins and a tight efficiency rule
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.risk.margin = dec!(0.2);
        config.risk.maintenance = dec!(0.1);
        config.risk.efficiency_limit = dec!(1);
        config.risk.stale_after = 600;
        config.market.efficiency_mode = EfficiencyMode::AlwaysClose;
        config
    }

    pub fn validate(&self, protocol: &ProtocolParameter) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::InvalidMarket {
                reason: "market name is empty".to_string(),
            });
        }
        self.risk.validate(protocol)?;
        self.market.validate(protocol)
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid margin: {reason}")]
    InvalidMargin { reason: String },
    #[error("invalid market: {reason}")]
    InvalidMarket { reason: String },
    #[error("invalid fees: {reason}")]
    InvalidFees { reason: String },
    #[error("invalid risk: {reason}")]
    InvalidRisk { reason: String },
    #[error("invalid engine: {reason}")]
    InvalidEngine { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> MarketConfig {
        match self {
            Environment::Development => MarketConfig::default(),
            Environment::Testnet => MarketConfig::testnet(),
            Environment::Mainnet => MarketConfig::mainnet_conservative(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_presets_valid() {
        let protocol = ProtocolParameter::default();
        assert!(protocol.validate().is_ok());
        assert!(Environment::Development.config().validate(&protocol).is_ok());
        assert!(Environment::Testnet.config().validate(&protocol).is_ok());
        assert!(Environment::Mainnet.config().validate(&protocol).is_ok());
    }

    #[test]
    fn test_inverted_margin_rejected() {
        let mut config = MarketConfig::default();
        config.risk.maintenance = dec!(0.2);
        let result = config.validate(&ProtocolParameter::default());
        assert!(matches!(result, Err(ConfigError::InvalidMargin { .. })));
    }

    #[test]
    fn test_fee_above_protocol_cap_rejected() {
        let mut config = MarketConfig::default();
        config.risk.taker_fee = dec!(0.02);
        let result = config.validate(&ProtocolParameter::default());
        assert!(matches!(result, Err(ConfigError::InvalidFees { .. })));
    }

    #[test]
    fn test_cut_above_max_cut_rejected() {
        let mut market = MarketParameter::default();
        market.funding_fee = dec!(0.9);
        assert!(market.validate(&ProtocolParameter::default()).is_err());
    }

    #[test]
    fn test_pending_limit_bounded_by_protocol() {
        let mut market = MarketParameter::default();
        market.max_pending_local = 0;
        assert!(matches!(
            market.validate(&ProtocolParameter::default()),
            Err(ConfigError::InvalidMarket { .. })
        ));
        market.max_pending_local = 17;
        assert!(market.validate(&ProtocolParameter::default()).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = MarketConfig::mainnet_conservative();
        let json = serde_json::to_string(&config).unwrap();
        let back: MarketConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        assert!(json.contains("always_close"));
    }
}
