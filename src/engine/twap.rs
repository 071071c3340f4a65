//! TWAP: the total is split into `intervals` equal chunks executed no more
//! often than every `interval_duration` seconds, each within a price band.

use alloy::primitives::Address;
use tracing::debug;

use super::{
    ensure_before_deadline, wrong_strategy, ExecutionContext, ExecutionReceipt, Fill,
    SettlementEngine, Transition,
};
use crate::domain::{
    ExecutionStep, FixedPointAmount, Order, OrderHash, OrderStatus, StrategyKind, StrategyState,
    TwapParams,
};
use crate::error::{ArithmeticError, EconomicError, GatingError, Result};
use crate::escrow::EscrowOp;

pub(super) fn initial_state(params: &TwapParams, now: u64) -> (StrategyState, FixedPointAmount) {
    let state = StrategyState::Twap {
        token_in: params.token_in,
        token_out: params.token_out,
        intervals: params.intervals,
        interval_duration: params.interval_duration,
        min_price_per_token: params.min_price_per_token,
        max_price_per_token: params.max_price_per_token,
        last_execution_time: now,
        intervals_executed: 0,
    };
    (state, params.total_amount)
}

/// Gates passed for the next interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalFill {
    /// 1-based interval number
    pub interval: u32,
    pub amount_in: FixedPointAmount,
    pub price: FixedPointAmount,
    pub token_in: Address,
    pub completes: bool,
}

/// Amount of token_in for `interval` (1-based); the final interval takes the remainder
pub fn interval_amount(
    total: FixedPointAmount,
    executed: FixedPointAmount,
    intervals: u32,
    interval: u32,
) -> std::result::Result<FixedPointAmount, ArithmeticError> {
    if interval >= intervals {
        total.checked_sub(executed)
    } else {
        total.checked_div_int(u64::from(intervals))
    }
}

/// Run every TWAP gate against the order without changing it.
///
/// Does not look at the order's status. Through the engine a completed
/// order is refused with `OrderNotActive` before this runs, so
/// `AllIntervalsExecuted` only surfaces when planning against a bare order.
pub fn plan_interval(order: &Order, amount_out: FixedPointAmount, now: u64) -> Result<IntervalFill> {
    let StrategyState::Twap {
        token_in,
        intervals,
        interval_duration,
        min_price_per_token,
        max_price_per_token,
        last_execution_time,
        intervals_executed,
        ..
    } = &order.strategy
    else {
        return Err(wrong_strategy(order, StrategyKind::Twap));
    };

    ensure_before_deadline(order, now)?;

    let next_allowed_at = last_execution_time.saturating_add(*interval_duration);
    if now < next_allowed_at {
        return Err(GatingError::IntervalNotElapsed { next_allowed_at }.into());
    }

    if intervals_executed >= intervals {
        return Err(GatingError::AllIntervalsExecuted {
            intervals: *intervals,
        }
        .into());
    }

    let interval = intervals_executed + 1;
    let amount_in = interval_amount(
        order.total_amount,
        order.executed_amount,
        *intervals,
        interval,
    )?;

    let price = amount_out.div_scaled(amount_in)?;
    if price < *min_price_per_token || price > *max_price_per_token {
        return Err(EconomicError::PriceOutOfRange {
            price,
            min: *min_price_per_token,
            max: *max_price_per_token,
        }
        .into());
    }

    Ok(IntervalFill {
        interval,
        amount_in,
        price,
        token_in: *token_in,
        completes: interval == *intervals,
    })
}

impl SettlementEngine {
    /// Execute the next TWAP interval. `amount_out` is what the taker delivers
    /// for this interval's chunk; `amount_out / chunk` must sit inside the
    /// order's price band.
    pub fn execute_interval(
        &self,
        ctx: &ExecutionContext,
        order_hash: &OrderHash,
        amount_out: FixedPointAmount,
    ) -> Result<ExecutionReceipt> {
        let _admitted = self.admit();
        let receipt = self.ledger.mutate(order_hash, |order| {
            let plan = plan_interval(order, amount_out, ctx.now)?;

            order.executed_amount = order.executed_amount.checked_add(plan.amount_in)?;
            if let StrategyState::Twap {
                last_execution_time,
                intervals_executed,
                ..
            } = &mut order.strategy
            {
                *last_execution_time = ctx.now;
                *intervals_executed = plan.interval;
            }
            if plan.completes {
                order.transition_to(OrderStatus::Completed)?;
            }

            let step = ExecutionStep::Interval(plan.interval);
            let fill = Fill {
                amount: plan.amount_in,
                amount_out: Some(amount_out),
                price: Some(plan.price),
            };
            let ops = [EscrowOp::Consume {
                maker: order.maker,
                asset: plan.token_in,
                amount: plan.amount_in,
                recipient: ctx.caller,
            }];
            self.commit_transition(
                order,
                &ops,
                &[],
                Transition::fill(order, step, &fill),
                ctx.now,
            )?;
            Ok(ExecutionReceipt::new(order, step, &fill))
        })?;

        debug!(
            "TWAP {} {}: {} in @ {} (executed {}, status {})",
            order_hash.short(),
            receipt.step,
            receipt.amount_in,
            amount_out,
            receipt.executed_amount,
            receipt.status
        );
        Ok(receipt)
    }
}
