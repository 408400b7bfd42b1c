// 8.5 engine/update.rs: account actions. every action settles first, then validates
// the new order against the projected books and queues it at the oracle's next
// timestamp. collateral moves in the same call, the position only when it settles.

use super::context::Context;
use super::core::Engine;
use super::results::{EngineError, LiquidationQuote, SettleOutcome, UpdateOutcome};
use crate::events::{EventPayload, OrderCreatedEvent};
use crate::liquidation::{required_maker_reduction, validate_protection, ProtectionCheck};
use crate::margin::{is_maintained, validate_order, InvariantError, OrderCheck};
use crate::order::{Guarantee, Order};
use crate::pending::PendingQueue;
use crate::position::Position;
use crate::types::{AccountId, Quote, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Signed position and collateral deltas for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub account: AccountId,
    // the account itself or an approved operator; anyone when liquidating
    pub sender: AccountId,
    pub maker: Decimal,
    pub long: Decimal,
    pub short: Decimal,
    pub collateral: Quote,
    pub protect: bool,
    pub referrer: Option<AccountId>,
}

impl UpdateRequest {
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            sender: account,
            ..Self::default()
        }
    }

    pub fn sender(mut self, sender: AccountId) -> Self {
        self.sender = sender;
        self
    }

    pub fn maker(mut self, delta: Decimal) -> Self {
        self.maker = delta;
        self
    }

    pub fn long(mut self, delta: Decimal) -> Self {
        self.long = delta;
        self
    }

    pub fn short(mut self, delta: Decimal) -> Self {
        self.short = delta;
        self
    }

    pub fn collateral(mut self, delta: Decimal) -> Self {
        self.collateral = Quote::new(delta);
        self
    }

    pub fn referrer(mut self, referrer: AccountId) -> Self {
        self.referrer = Some(referrer);
        self
    }

    /// Marks the order as a liquidation submitted by `sender`.
    pub fn protect(mut self, liquidator: AccountId) -> Self {
        self.protect = true;
        self.sender = liquidator;
        self
    }
}

/// Where one new order would land, for validation.
pub(super) struct Placement<'a> {
    pub account: AccountId,
    pub order: &'a Order,
    pub protected: bool,
    // global pending position after every order placed in this call
    pub global: &'a Position,
}

impl Engine {
    pub fn update(&mut self, request: UpdateRequest) -> Result<UpdateOutcome, EngineError> {
        let _token = self.guard.enter()?;
        if self.registry.parameter().paused {
            return Err(EngineError::Paused);
        }
        let authorization = self
            .registry
            .authorize(request.account, request.sender, None, request.referrer);
        if !authorization.is_operator && !request.protect {
            return Err(EngineError::Unauthorized {
                account: request.account,
                sender: request.sender,
            });
        }

        let mut ctx = self.load(&[request.account])?;
        let settled = self.settle_context(&mut ctx, &[request.account])?;

        let mut order = Order::from_deltas(
            ctx.now(),
            request.maker,
            request.long,
            request.short,
            request.collateral,
            authorization.referral_fee,
        );
        if request.protect {
            order.protection = 1;
        }
        if order.is_empty() && order.collateral.is_zero() && !request.protect {
            self.commit(ctx)?;
            return Ok(UpdateOutcome {
                account: request.account,
                order_id: None,
                order,
                settled,
            });
        }

        let global = self.project_global(&ctx, &[&order])?;
        self.validate_placement(
            &ctx,
            &Placement {
                account: request.account,
                order: &order,
                protected: request.protect,
                global: &global,
            },
        )?;

        let liquidator = request.protect.then_some(request.sender);
        let order_id = self.stage(&mut ctx, request.account, &order, &Guarantee::default(), request.referrer)?;
        {
            let state = ctx.account_mut(request.account)?;
            if let Some(liquidator) = liquidator {
                state.local.protection_initiator = Some(liquidator);
            }
        }
        ctx.transfers.push((request.account, order.collateral));
        ctx.requests.push(request.account);
        ctx.events.push(EventPayload::OrderCreated(OrderCreatedEvent {
            account: request.account,
            order_id,
            order,
            guarantee: Guarantee::default(),
            liquidator,
            originator: None,
            solver: None,
        }));

        self.commit(ctx)?;
        Ok(UpdateOutcome {
            account: request.account,
            order_id: Some(order_id),
            order,
            settled,
        })
    }

    /// Closes everything the account would hold once its pending orders settle.
    pub fn close(
        &mut self,
        account: AccountId,
        sender: AccountId,
        protect: bool,
        referrer: Option<AccountId>,
    ) -> Result<UpdateOutcome, EngineError> {
        let current = match self.accounts.get(&account) {
            Some(state) => state.projection()?.current,
            None => Position::default(),
        };
        self.update(UpdateRequest {
            account,
            sender,
            maker: -current.maker,
            long: -current.long,
            short: -current.short,
            collateral: Quote::zero(),
            protect,
            referrer,
        })
    }

    pub fn settle(&mut self, account: AccountId) -> Result<SettleOutcome, EngineError> {
        let _token = self.guard.enter()?;
        if self.registry.parameter().paused {
            return Err(EngineError::Paused);
        }
        let mut ctx = self.load(&[account])?;
        let outcome = self.settle_context(&mut ctx, &[account])?;
        self.commit(ctx)?;
        Ok(outcome)
    }

    /// Dry run of a liquidation at the latest settled price. Nothing is written.
    pub fn liquidation_quote(&self, account: AccountId) -> Result<LiquidationQuote, EngineError> {
        let mut ctx = self.load(&[account])?;
        self.settle_context(&mut ctx, &[account])?;
        let state = ctx.account(account)?;
        let risk = &self.market.config.risk;
        let price = ctx.global.latest_price;
        let latest = state.position;

        let liquidatable = !latest.is_empty()
            && !state.pending.has_protection()
            && !is_maintained(state.local.collateral, latest.magnitude(), price, risk);
        let current = state.projection()?.current;

        let reduction = if latest.side() == Some(Side::Maker) && current == latest {
            required_maker_reduction(latest.maker, state.local.collateral, price, risk)
        } else {
            current.maker
        };
        let (maker, long, short) = if liquidatable {
            (-reduction, -current.long, -current.short)
        } else {
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
        };
        let closed = reduction.max(current.long).max(current.short);
        let fee = if liquidatable {
            risk.liquidation_fee_schedule().compute(closed * price)
        } else {
            Quote::zero()
        };

        Ok(LiquidationQuote {
            account,
            liquidatable,
            maker,
            long,
            short,
            price,
            fee,
        })
    }

    /// Global pending position once `orders` are added.
    pub(super) fn project_global(&self, ctx: &Context, orders: &[&Order]) -> Result<Position, EngineError> {
        let mut projection = ctx.pending.project(&ctx.position)?;
        for order in orders {
            projection.push(order)?;
        }
        Ok(projection.current)
    }

    // 8.5.1: pending limits, then protection, then the policy / validity / solvency chain
    pub(super) fn validate_placement(&self, ctx: &Context, placement: &Placement<'_>) -> Result<(), EngineError> {
        let state = ctx.account(placement.account)?;
        let order = placement.order;
        let config = &self.market.config;

        let local_pending = state.pending.len() + usize::from(opens_entry(state.local.current_id, &state.pending, order));
        let global_pending = ctx.pending.len() + usize::from(opens_entry(ctx.global.current_id, &ctx.pending, order));
        for (pending, limit) in [
            (local_pending, config.market.max_pending_local),
            (global_pending, config.market.max_pending_global),
        ] {
            if pending as u64 > limit {
                return Err(InvariantError::PendingLimitExceeded {
                    pending: pending as u64,
                    limit,
                }
                .into());
            }
        }

        let mut local = state.projection()?;
        local.push(order).map_err(InvariantError::from)?;
        let price = ctx.global.latest_price;

        if placement.protected {
            validate_protection(&ProtectionCheck {
                risk: &config.risk,
                order,
                latest_local: &state.position,
                local: &local,
                collateral: state.local.collateral,
                price,
                protection_pending: state.pending.has_protection(),
            })?;
        }

        let deposit = order.collateral.max(Quote::zero());
        validate_order(&OrderCheck {
            risk: &config.risk,
            market: &config.market,
            order,
            latest_local: &state.position,
            local: &local,
            global: placement.global,
            collateral: state.effective_collateral().add(order.collateral),
            uncovered_deficit: state.uncovered_deficit().sub(deposit).max(Quote::zero()),
            price,
            latest: ctx.position.timestamp,
            now: ctx.now(),
            protected: placement.protected,
        })?;
        Ok(())
    }

    /// Queues `order` for `account` and mirrors it into the global queue. Returns the
    /// local pending id.
    pub(super) fn stage(
        &self,
        ctx: &mut Context,
        account: AccountId,
        order: &Order,
        guarantee: &Guarantee,
        referrer: Option<AccountId>,
    ) -> Result<u64, EngineError> {
        let state = ctx.account_mut(account)?;
        if let Some(current) = state.pending.get(state.local.current_id) {
            let coalesces = current.timestamp() == order.timestamp;
            if coalesces && referrer.is_some() && current.referrer.is_some() && current.referrer != referrer {
                return Err(EngineError::ReferrerMismatch {
                    existing: current.referrer,
                    requested: referrer,
                });
            }
        }

        let id = state.pending.stage(&mut state.local.current_id, order, guarantee);
        if let Some(entry) = state.pending.get_mut(id) {
            entry.referrer = entry.referrer.or(referrer);
        }
        ctx.pending.stage(&mut ctx.global.current_id, order, guarantee);
        Ok(id)
    }
}

/// True when `order` would open a new pending id rather than coalesce.
fn opens_entry(current_id: u64, pending: &PendingQueue, order: &Order) -> bool {
    pending
        .get(current_id)
        .map_or(true, |entry| entry.timestamp() != order.timestamp)
}
