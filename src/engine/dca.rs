//! DCA: fixed-size executions at most once per `frequency`, each within
//! `max_slippage_bps` of the caller's reference rate.

use alloy::primitives::Address;
use tracing::debug;

use super::{
    ensure_before_deadline, wrong_strategy, ExecutionContext, ExecutionReceipt, Fill,
    SettlementEngine, Transition,
};
use crate::domain::{
    DcaParams, ExecutionStep, FixedPointAmount, Order, OrderHash, OrderStatus, StrategyKind,
    StrategyState,
};
use crate::error::{EconomicError, GatingError, Result};
use crate::escrow::EscrowOp;

pub(super) fn initial_state(params: &DcaParams, now: u64) -> (StrategyState, FixedPointAmount) {
    let state = StrategyState::Dca {
        token_in: params.token_in,
        token_out: params.token_out,
        frequency: params.frequency,
        amount_per_execution: params.amount_per_execution,
        max_slippage_bps: params.max_slippage_bps,
        last_execution_time: now,
        executions: 0,
    };
    (state, params.total_amount)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DcaFill {
    /// 1-based execution number
    pub execution: u32,
    pub chunk: FixedPointAmount,
    pub price: FixedPointAmount,
    pub deviation_bps: u64,
    pub token_in: Address,
    pub completes: bool,
}

/// Run every DCA gate without changing the order.
///
/// Status is the ledger's concern: once the last chunk completes the order,
/// engine callers get `OrderNotActive` and never reach `AllFundsExecuted`.
pub fn plan_execution(
    order: &Order,
    amount_out: FixedPointAmount,
    reference_rate: FixedPointAmount,
    now: u64,
) -> Result<DcaFill> {
    let StrategyState::Dca {
        token_in,
        frequency,
        amount_per_execution,
        max_slippage_bps,
        last_execution_time,
        executions,
        ..
    } = &order.strategy
    else {
        return Err(wrong_strategy(order, StrategyKind::Dca));
    };

    ensure_before_deadline(order, now)?;

    let next_allowed_at = last_execution_time.saturating_add(*frequency);
    if now < next_allowed_at {
        return Err(GatingError::FrequencyNotElapsed { next_allowed_at }.into());
    }

    let remaining = order.total_amount.checked_sub(order.executed_amount)?;
    if remaining.is_zero() {
        return Err(GatingError::AllFundsExecuted.into());
    }

    let chunk = (*amount_per_execution).min(remaining);
    let price = amount_out.div_scaled(chunk)?;
    let deviation_bps = price.deviation_bps(reference_rate)?;
    if deviation_bps > u64::from(*max_slippage_bps) {
        return Err(EconomicError::SlippageExceeded {
            deviation_bps,
            max_bps: *max_slippage_bps,
        }
        .into());
    }

    Ok(DcaFill {
        execution: executions + 1,
        chunk,
        price,
        deviation_bps,
        token_in: *token_in,
        completes: chunk == remaining,
    })
}

impl SettlementEngine {
    /// Execute the next DCA chunk. `reference_rate` is the oracle rate for the
    /// pair; the implied rate `amount_out / chunk` may deviate from it by at
    /// most the order's slippage tolerance.
    pub fn execute_order(
        &self,
        ctx: &ExecutionContext,
        order_hash: &OrderHash,
        amount_out: FixedPointAmount,
        reference_rate: FixedPointAmount,
    ) -> Result<ExecutionReceipt> {
        let _admitted = self.admit();
        let receipt = self.ledger.mutate(order_hash, |order| {
            let plan = plan_execution(order, amount_out, reference_rate, ctx.now)?;

            order.executed_amount = order.executed_amount.checked_add(plan.chunk)?;
            if let StrategyState::Dca {
                last_execution_time,
                executions,
                ..
            } = &mut order.strategy
            {
                *last_execution_time = ctx.now;
                *executions = plan.execution;
            }
            if plan.completes {
                order.transition_to(OrderStatus::Completed)?;
            }

            let step = ExecutionStep::DcaExecution(plan.execution);
            let fill = Fill {
                amount: plan.chunk,
                amount_out: Some(amount_out),
                price: Some(plan.price),
            };
            let ops = [EscrowOp::Consume {
                maker: order.maker,
                asset: plan.token_in,
                amount: plan.chunk,
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
            "DCA {} {}: {} in, {} out (executed {}, status {})",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use alloy::primitives::B256;

    fn amt(s: &str) -> FixedPointAmount {
        s.parse().unwrap()
    }

    fn dca_order(total: &str, per_execution: &str) -> Order {
        let (strategy, total_amount) = initial_state(
            &DcaParams {
                token_in: Address::repeat_byte(0xaa),
                token_out: Address::repeat_byte(0xbb),
                total_amount: amt(total),
                frequency: 3600,
                amount_per_execution: amt(per_execution),
                max_slippage_bps: 100,
            },
            0,
        );
        Order {
            order_hash: OrderHash::from([3u8; 32]),
            maker: Address::repeat_byte(1),
            nonce: 0,
            salt: B256::ZERO,
            status: OrderStatus::Active,
            created_at: 0,
            deadline: None,
            total_amount,
            executed_amount: FixedPointAmount::ZERO,
            strategy,
        }
    }

    #[test]
    fn test_frequency_gate() {
        let order = dca_order("1000", "100");
        let err = plan_execution(&order, amt("200"), amt("2"), 3_599).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Gating(GatingError::FrequencyNotElapsed {
                next_allowed_at: 3_600
            })
        ));
        assert!(plan_execution(&order, amt("200"), amt("2"), 3_600).is_ok());
    }

    #[test]
    fn test_slippage_against_reference_rate() {
        let order = dca_order("1000", "100");
        // 1% below reference is exactly at the limit
        let plan = plan_execution(&order, amt("198"), amt("2"), 3_600).unwrap();
        assert_eq!(plan.deviation_bps, 100);

        let err = plan_execution(&order, amt("197.9"), amt("2"), 3_600).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Economic(EconomicError::SlippageExceeded { max_bps: 100, .. })
        ));
    }

    #[test]
    fn test_last_chunk_is_capped_at_remaining() {
        let mut order = dca_order("250", "100");
        order.executed_amount = amt("200");
        let plan = plan_execution(&order, amt("100"), amt("2"), 3_600).unwrap();
        assert_eq!(plan.chunk, amt("50"));
        assert!(plan.completes);

        order.executed_amount = amt("250");
        let err = plan_execution(&order, amt("100"), amt("2"), 3_600).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Gating(GatingError::AllFundsExecuted)
        ));
    }
}
