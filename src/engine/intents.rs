// 8.6 engine/intents.rs: fills a signed intent against the sender. both sides get a
// guaranteed order at the intent price, queued at the same timestamp, so the fill
// never moves the skew-based price.

use super::core::Engine;
use super::results::{EngineError, IntentOutcome};
use super::update::Placement;
use crate::events::{EventPayload, OrderCreatedEvent};
use crate::intent::{Intent, IntentError};
use crate::types::AccountId;

impl Engine {
    /// `sender` takes the other side of `intent`, signed by `intent.common.signer` for
    /// `intent.common.account`.
    pub fn update_intent(
        &mut self,
        sender: AccountId,
        intent: &Intent,
        signature: &[u8],
    ) -> Result<IntentOutcome, EngineError> {
        let _token = self.guard.enter()?;
        if self.registry.parameter().paused {
            return Err(EngineError::Paused);
        }
        let signer = intent.common.account;

        self.verifier.verify_intent(intent, signature)?;
        let referrer = intent.originator.or(intent.solver);
        let authorization = self
            .registry
            .authorize(signer, sender, Some(intent.common.signer), referrer);
        if !authorization.is_signer {
            return Err(EngineError::Unauthorized {
                account: signer,
                sender: intent.common.signer,
            });
        }
        if self.used_nonces.contains(&(signer, intent.common.nonce)) {
            return Err(IntentError::NonceUsed {
                account: signer,
                nonce: intent.common.nonce,
            }
            .into());
        }

        let mut ctx = self.load(&[signer, sender])?;
        intent.validate(sender, ctx.now())?;
        let settled = self.settle_context(&mut ctx, &[signer, sender])?;

        let signer_state = ctx.account(signer)?;
        intent.check_collateralization(signer_state.effective_collateral(), ctx.global.latest_price)?;
        let signer_current = signer_state.projection()?.current;
        let counter_current = ctx.account(sender)?.projection()?.current;
        let fill = intent.fill(ctx.now(), &signer_current, &counter_current, authorization.referral_fee);

        let global = self.project_global(&ctx, &[&fill.signer_order, &fill.counter_order])?;
        for (account, order) in [(signer, &fill.signer_order), (sender, &fill.counter_order)] {
            self.validate_placement(
                &ctx,
                &Placement {
                    account,
                    order,
                    protected: false,
                    global: &global,
                },
            )?;
        }

        // a pending entry pays one originator and one solver
        let state = ctx.account(signer)?;
        if let Some(current) = state.pending.get(state.local.current_id) {
            let recipients = (current.originator, current.solver);
            let tagged = recipients != (None, None);
            if current.timestamp() == ctx.now() && tagged && recipients != (intent.originator, intent.solver) {
                return Err(EngineError::ReferrerMismatch {
                    existing: current.originator.or(current.solver),
                    requested: referrer,
                });
            }
        }

        let signer_order_id = self.stage(&mut ctx, signer, &fill.signer_order, &fill.signer_guarantee, None)?;
        if let Some(entry) = ctx.account_mut(signer)?.pending.get_mut(signer_order_id) {
            entry.originator = intent.originator;
            entry.solver = intent.solver;
            entry.solver_fee = intent.fee;
        }
        let counter_order_id = self.stage(&mut ctx, sender, &fill.counter_order, &fill.counter_guarantee, None)?;

        ctx.nonces.push((signer, intent.common.nonce));
        ctx.requests.push(signer);
        ctx.events.push(EventPayload::OrderCreated(OrderCreatedEvent {
            account: signer,
            order_id: signer_order_id,
            order: fill.signer_order,
            guarantee: fill.signer_guarantee,
            liquidator: None,
            originator: intent.originator,
            solver: intent.solver,
        }));
        ctx.events.push(EventPayload::OrderCreated(OrderCreatedEvent {
            account: sender,
            order_id: counter_order_id,
            order: fill.counter_order,
            guarantee: fill.counter_guarantee,
            liquidator: None,
            originator: None,
            solver: None,
        }));

        self.commit(ctx)?;
        Ok(IntentOutcome {
            signer,
            counterparty: sender,
            signer_order_id,
            counter_order_id,
            settled,
        })
    }
}
