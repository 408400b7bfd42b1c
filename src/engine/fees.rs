// 8.7 engine/fees.rs: claiming. an account's claimable balance is always its own to
// take; the pools go to whoever the registry (or the market, for donations) names.

use super::core::Engine;
use super::results::EngineError;
use crate::events::{EventPayload, FeeClaimedEvent};
use crate::types::{AccountId, Quote};

impl Engine {
    /// Pays out everything `sender` may claim to `receiver` and returns the total.
    pub fn claim_fee(&mut self, sender: AccountId, receiver: AccountId) -> Result<Quote, EngineError> {
        let _token = self.guard.enter()?;
        if self.registry.parameter().paused {
            return Err(EngineError::Paused);
        }

        let mut ctx = self.load(&[sender])?;
        let mut amount = ctx.account_mut(sender)?.local.take_claimable();

        let global = &mut ctx.global;
        if sender == self.registry.owner() {
            amount = amount.add(std::mem::take(&mut global.protocol_fee));
        }
        if self.registry.oracle_fee_receiver() == Some(sender) {
            amount = amount.add(std::mem::take(&mut global.oracle_fee));
        }
        if self.registry.coordinator() == Some(sender) {
            amount = amount.add(std::mem::take(&mut global.risk_fee));
        }
        if self.beneficiary == Some(sender) {
            amount = amount.add(std::mem::take(&mut global.donation));
        }

        if !amount.is_positive() {
            return Ok(Quote::zero());
        }
        ctx.transfers.push((receiver, amount.negate()));
        ctx.events.push(EventPayload::FeeClaimed(FeeClaimedEvent {
            claimant: sender,
            receiver,
            amount,
        }));
        self.commit(ctx)?;
        Ok(amount)
    }
}
