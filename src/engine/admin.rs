// 8.8 engine/admin.rs: parameter changes. the market is settled under the old
// parameters first so no version straddles two configurations.

use super::core::Engine;
use super::results::EngineError;
use crate::config::{MarketParameter, RiskParameter};
use crate::events::{
    BeneficiaryUpdatedEvent, EventPayload, ParameterUpdatedEvent, RiskParameterUpdatedEvent,
};
use crate::types::AccountId;

impl Engine {
    pub fn update_parameter(&mut self, sender: AccountId, parameter: MarketParameter) -> Result<(), EngineError> {
        let _token = self.guard.enter()?;
        self.require_owner(sender)?;
        parameter.validate(&self.registry.parameter())?;

        let mut ctx = self.load(&[])?;
        self.settle_context(&mut ctx, &[])?;
        let now = ctx.now();
        self.commit(ctx)?;

        self.market.config.market = parameter.clone();
        self.emit_event(now, EventPayload::ParameterUpdated(ParameterUpdatedEvent { parameter }));
        Ok(())
    }

    /// The owner or the coordinator may retune risk.
    pub fn update_risk_parameter(&mut self, sender: AccountId, parameter: RiskParameter) -> Result<(), EngineError> {
        let _token = self.guard.enter()?;
        if sender != self.registry.owner() && self.registry.coordinator() != Some(sender) {
            return Err(EngineError::Unauthorized {
                account: self.registry.owner(),
                sender,
            });
        }
        parameter.validate(&self.registry.parameter())?;

        let mut ctx = self.load(&[])?;
        self.settle_context(&mut ctx, &[])?;
        let now = ctx.now();
        self.commit(ctx)?;

        self.market.config.risk = parameter.clone();
        self.emit_event(now, EventPayload::RiskParameterUpdated(RiskParameterUpdatedEvent { parameter }));
        Ok(())
    }

    /// Account that may claim the donation pool.
    pub fn update_beneficiary(&mut self, sender: AccountId, beneficiary: Option<AccountId>) -> Result<(), EngineError> {
        let _token = self.guard.enter()?;
        self.require_owner(sender)?;
        self.beneficiary = beneficiary;
        let now = self.oracle.status()?.next_timestamp;
        self.emit_event(now, EventPayload::BeneficiaryUpdated(BeneficiaryUpdatedEvent { beneficiary }));
        Ok(())
    }

    fn require_owner(&self, sender: AccountId) -> Result<(), EngineError> {
        let owner = self.registry.owner();
        if sender != owner {
            return Err(EngineError::Unauthorized { account: owner, sender });
        }
        Ok(())
    }
}
