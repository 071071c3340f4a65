//! Concentrated-liquidity positions. The position is escrowed as two legs
//! (`token0`, `token1`); booked fees grow the legs and removal releases both.

use tracing::info;

use super::{
    ensure_maker, invalid_amount, wrong_strategy, ExecutionContext, ExecutionReceipt, Fill,
    SettlementEngine, Transition,
};
use crate::domain::{
    EventKind, ExecutionStep, FixedPointAmount, LiquidityParams, Order, OrderHash, OrderStatus,
    StrategyKind, StrategyState,
};
use crate::error::{Result, StateError};
use crate::escrow::EscrowOp;

pub(super) fn initial_state(params: &LiquidityParams) -> Result<(StrategyState, FixedPointAmount)> {
    let total = params.amount0.checked_add(params.amount1)?;
    let state = StrategyState::ConcentratedLiquidity {
        token0: params.token0,
        token1: params.token1,
        amount0: params.amount0,
        amount1: params.amount1,
        lower_tick: params.lower_tick,
        upper_tick: params.upper_tick,
        fees0: FixedPointAmount::ZERO,
        fees1: FixedPointAmount::ZERO,
    };
    Ok((state, total))
}

fn ensure_position(order: &Order) -> Result<()> {
    if order.kind() != StrategyKind::ConcentratedLiquidity {
        return Err(wrong_strategy(order, StrategyKind::ConcentratedLiquidity));
    }
    if !order.is_active() {
        return Err(StateError::PositionNotActive {
            order_hash: order.order_hash,
        }
        .into());
    }
    Ok(())
}

impl SettlementEngine {
    /// Close a position: both legs plus booked fees go back to the maker
    pub fn remove_liquidity(
        &self,
        ctx: &ExecutionContext,
        order_hash: &OrderHash,
    ) -> Result<ExecutionReceipt> {
        let _admitted = self.admit();
        let receipt = self.ledger.update(order_hash, |order| {
            ensure_position(order)?;
            ensure_maker(order, ctx.caller)?;

            let ops: Vec<EscrowOp> = order
                .outstanding_commitment()?
                .into_iter()
                .map(|(asset, amount)| EscrowOp::Release {
                    maker: order.maker,
                    asset,
                    amount,
                })
                .collect();

            order.executed_amount = order.total_amount;
            order.transition_to(OrderStatus::Completed)?;

            let step = ExecutionStep::PositionRemoved;
            let fill = Fill {
                amount: order.total_amount,
                amount_out: None,
                price: None,
            };
            self.commit_transition(
                order,
                &ops,
                &[],
                Transition::fill(order, step, &fill),
                ctx.now,
            )?;
            Ok(ExecutionReceipt::new(order, step, &fill))
        })?;

        info!(
            "Position {} removed by {}",
            order_hash.short(),
            ctx.caller
        );
        Ok(receipt)
    }

    /// Book accrued fees on an open position. The fees are escrowed on the
    /// maker's side so removal can release them with the principal.
    pub fn book_fees(
        &self,
        ctx: &ExecutionContext,
        order_hash: &OrderHash,
        fee0: FixedPointAmount,
        fee1: FixedPointAmount,
    ) -> Result<Order> {
        if fee0.is_zero() && fee1.is_zero() {
            return Err(invalid_amount("fee booking needs a non-zero fee0 or fee1"));
        }

        let _admitted = self.admit();
        let order = self.ledger.update(order_hash, |order| {
            ensure_position(order)?;

            let (token0, token1) = match &order.strategy {
                StrategyState::ConcentratedLiquidity { token0, token1, .. } => (*token0, *token1),
                _ => return Err(wrong_strategy(order, StrategyKind::ConcentratedLiquidity)),
            };
            if let StrategyState::ConcentratedLiquidity { fees0, fees1, .. } = &mut order.strategy {
                *fees0 = fees0.checked_add(fee0)?;
                *fees1 = fees1.checked_add(fee1)?;
            }

            let ops: Vec<EscrowOp> = [(token0, fee0), (token1, fee1)]
                .into_iter()
                .filter(|(_, amount)| !amount.is_zero())
                .map(|(asset, amount)| EscrowOp::Commit {
                    maker: order.maker,
                    asset,
                    amount,
                })
                .collect();

            let booked = fee0.checked_add(fee1)?;
            self.commit_transition(
                order,
                &ops,
                &[],
                Transition::new(EventKind::FeesBooked, booked),
                ctx.now,
            )?;
            Ok(order.clone())
        })?;

        info!(
            "Fees booked on position {}: {} / {}",
            order_hash.short(),
            fee0,
            fee1
        );
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    fn amt(s: &str) -> FixedPointAmount {
        s.parse().unwrap()
    }

    #[test]
    fn test_initial_state_sums_both_legs() {
        let (state, total) = initial_state(&LiquidityParams {
            token0: Address::repeat_byte(0x10),
            token1: Address::repeat_byte(0x11),
            amount0: amt("5"),
            amount1: amt("2.5"),
            lower_tick: -600,
            upper_tick: 600,
        })
        .unwrap();
        assert_eq!(total, amt("7.5"));
        assert_eq!(state.kind(), StrategyKind::ConcentratedLiquidity);
    }
}
