// 8.3 engine/settlement.rs: settlement runs at the start of every action. the global
// queue is accumulated first, one version per pending timestamp the oracle has
// reached, then each touched account replays its own queue against those versions.

use super::context::Context;
use super::core::Engine;
use super::results::{EngineError, SettleOutcome};
use crate::accumulator::{accumulate, AccumulationInput};
use crate::checkpoint::{settle_order, valuation, CheckpointError, LocalInput};
use crate::events::{AccountPositionProcessedEvent, EventPayload, PositionProcessedEvent, ShortfallSocializedEvent};
use crate::oracle::OracleVersion;
use crate::order::{Guarantee, Order};
use crate::pending::{Carry, PendingEntry};
use crate::types::{AccountId, Quote, Timestamp};
use crate::version::Version;

impl Engine {
    /// Settles the market, then `accounts` in the order given.
    pub(super) fn settle_context(&self, ctx: &mut Context, accounts: &[AccountId]) -> Result<SettleOutcome, EngineError> {
        let versions = self.settle_market(ctx)?;
        let mut local_orders = 0;
        for &account in accounts {
            local_orders += self.settle_account(ctx, account)?;
        }
        Ok(SettleOutcome { versions, local_orders })
    }

    fn settle_market(&self, ctx: &mut Context) -> Result<usize, EngineError> {
        let latest = ctx.status.latest;
        let mut processed = 0;

        while let Some((id, entry)) = ctx.pending.first() {
            let timestamp = entry.timestamp();
            if timestamp > latest.timestamp {
                break;
            }
            let reading = self.oracle.at(timestamp)?;
            self.accumulate_market(ctx, id, &entry, &reading)?;
            processed += 1;

            if reading.valid {
                ctx.position = ctx.position.apply(&entry.order)?;
                ctx.position.timestamp = timestamp;
                ctx.pending.remove(id);
                ctx.global.latest_id = id;
                continue;
            }

            // 8.3.1: the global queue picks the carry target, accounts follow the record
            let target = ctx
                .pending
                .iter()
                .find(|(&next, _)| next > id)
                .map(|(_, next)| next.timestamp())
                .unwrap_or(ctx.status.next_timestamp);
            ctx.carries.insert(timestamp, target);
            if let Carry::Merged { .. } = ctx.pending.carry(id, target) {
                ctx.global.latest_id = id;
            }
        }

        // idle markets still accrue up to the newest valid reading
        let newest = self.latest_version(ctx).map_or(Timestamp(0), |version| version.timestamp);
        if latest.valid && latest.timestamp > newest {
            let idle = PendingEntry::new(Order::new(latest.timestamp), Guarantee::default());
            let order_id = ctx.global.latest_id;
            self.accumulate_market(ctx, order_id, &idle, &latest)?;
            ctx.position.timestamp = latest.timestamp;
            processed += 1;
        }

        Ok(processed)
    }

    fn accumulate_market(
        &self,
        ctx: &mut Context,
        order_id: u64,
        entry: &PendingEntry,
        reading: &OracleVersion,
    ) -> Result<(), EngineError> {
        let from = self.latest_valid_version(ctx);
        let config = &self.market.config;
        let input = AccumulationInput {
            from: &from,
            position: &ctx.position,
            order: &entry.order,
            guarantee: &entry.guarantee,
            oracle: reading,
            funding_rate: ctx.global.funding_rate,
            risk: &config.risk,
            market: &config.market,
            protocol: &ctx.protocol,
        };
        let accumulation = accumulate(&input, &mut ctx.global.shortfall);
        let result = accumulation.result;

        let global = &mut ctx.global;
        global.funding_rate = result.funding_rate;
        global.protocol_fee = global.protocol_fee.add(Quote::new(result.protocol_fee));
        global.oracle_fee = global.oracle_fee.add(Quote::new(result.oracle_fee));
        global.risk_fee = global.risk_fee.add(Quote::new(result.risk_fee));
        global.donation = global.donation.add(Quote::new(result.donation));
        if reading.valid {
            global.latest_price = reading.price;
        }

        ctx.versions.push(accumulation.version);
        ctx.events.push(EventPayload::PositionProcessed(PositionProcessedEvent {
            order_id,
            timestamp: reading.timestamp,
            valid: reading.valid,
            order: entry.order,
            accumulation: result,
        }));
        Ok(())
    }

    fn settle_account(&self, ctx: &mut Context, account: AccountId) -> Result<usize, EngineError> {
        let mut processed = 0;

        loop {
            let state = ctx.account(account)?;
            let Some((id, entry)) = state.pending.first() else {
                break;
            };
            let timestamp = entry.timestamp();
            let Some(version) = self.version_at(ctx, timestamp) else {
                break;
            };
            let from = self
                .version_at(ctx, state.position.timestamp)
                .unwrap_or_else(Version::genesis);
            let liquidator = if entry.order.is_protected() {
                state.local.protection_initiator
            } else {
                None
            };
            let settled = settle_order(&LocalInput {
                entry: &entry,
                from: &from,
                version: &version,
                position: &state.position,
                collateral: state.local.collateral,
                deficit: state.local.deficit,
                risk_pool: ctx.global.risk_fee,
                liquidator,
            })?;

            let target = if version.valid {
                None
            } else {
                let target = self
                    .carry_target(ctx, timestamp)
                    .ok_or(EngineError::MissingCarry(timestamp))?;
                Some(target)
            };
            let staged = ctx
                .checkpoints
                .iter()
                .any(|(owner, checkpoint)| *owner == account && checkpoint.timestamp == timestamp);
            if staged {
                return Err(CheckpointError::Duplicate(timestamp).into());
            }

            ctx.global.risk_fee = ctx.global.risk_fee.sub(settled.pool_debit).add(settled.pool_credit);
            ctx.credits
                .extend(settled.credits.iter().map(|credit| (credit.account, credit.amount)));
            ctx.checkpoints.push((account, settled.checkpoint));

            let state = ctx.account_mut(account)?;
            state.local.collateral = settled.collateral;
            state.local.deficit = settled.deficit;
            state.position = settled.position;
            match target {
                None => {
                    state.pending.remove(id);
                    state.local.latest_id = id;
                    if entry.order.is_protected() {
                        state.local.protection_initiator = None;
                    }
                }
                Some(target) => {
                    if let Carry::Merged { .. } = state.pending.carry(id, target) {
                        state.local.latest_id = id;
                    }
                }
            }

            if let Some((side, amount)) = settled.shortfall {
                ctx.global.shortfall.allocate(amount.value(), side, &ctx.position);
                ctx.events.push(EventPayload::ShortfallSocialized(ShortfallSocializedEvent {
                    account,
                    side,
                    amount,
                    timestamp,
                }));
            }
            ctx.events
                .push(EventPayload::AccountPositionProcessed(AccountPositionProcessedEvent {
                    account,
                    order_id: id,
                    timestamp,
                    order: entry.order,
                    checkpoint: settled.checkpoint,
                }));
            processed += 1;
        }

        self.value_to_latest(ctx, account)?;
        Ok(processed)
    }

    // 8.3.2: value the settled position up to the newest valid version. no checkpoint,
    // the next settled order picks up from the new timestamp.
    fn value_to_latest(&self, ctx: &mut Context, account: AccountId) -> Result<(), EngineError> {
        let latest = self.latest_valid_version(ctx);
        let state = ctx.account(account)?;
        let blocked = state
            .pending
            .first()
            .is_some_and(|(_, entry)| entry.timestamp() <= latest.timestamp);
        if blocked || latest.timestamp <= state.position.timestamp {
            return Ok(());
        }

        let from = self
            .version_at(ctx, state.position.timestamp)
            .unwrap_or_else(Version::genesis);
        let pnl = valuation(&state.position, &from, &latest);

        let state = ctx.account_mut(account)?;
        state.local.collateral = state.local.collateral.add(Quote::new(pnl));
        state.position.timestamp = latest.timestamp;
        Ok(())
    }
}
