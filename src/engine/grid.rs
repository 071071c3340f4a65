//! Grid: `grid_levels` fills of `amount_per_grid`, one per price level, each
//! executable once and only near its level's target price.

use alloy::primitives::Address;
use tracing::debug;

use super::{
    ensure_before_deadline, wrong_strategy, ExecutionContext, ExecutionReceipt, Fill,
    SettlementEngine, Transition,
};
use crate::config::GridSplit;
use crate::domain::{
    ExecutionStep, FixedPointAmount, GridParams, LevelBitmap, Order, OrderHash, OrderStatus,
    StrategyKind, StrategyState,
};
use crate::error::{ArithmeticError, EconomicError, Result, StateError};
use crate::escrow::EscrowOp;
use crate::validation;

pub(super) fn initial_state(params: &GridParams) -> Result<(StrategyState, FixedPointAmount)> {
    let total = validation::grid_total(params)?;
    let state = StrategyState::Grid {
        base_token: params.base_token,
        quote_token: params.quote_token,
        grid_levels: params.grid_levels,
        price_step: params.price_step,
        base_price: params.base_price,
        amount_per_grid: params.amount_per_grid,
        executed_levels: LevelBitmap::with_levels(params.grid_levels),
    };
    Ok((state, total))
}

/// Levels below `grid_levels / 2` buy below the base price
pub fn is_buy_level(level: u32, grid_levels: u32) -> bool {
    level < grid_levels / 2
}

/// Target price of a grid level under the given split
pub fn level_target_price(
    base_price: FixedPointAmount,
    price_step: FixedPointAmount,
    grid_levels: u32,
    level: u32,
    split: GridSplit,
) -> std::result::Result<FixedPointAmount, ArithmeticError> {
    let half = grid_levels / 2;
    let steps = match (split, is_buy_level(level, grid_levels)) {
        (GridSplit::Symmetric, true) => half - level,
        (GridSplit::Symmetric, false) => level - half + 1,
        (GridSplit::LevelOffset, _) => level,
    };
    let offset = price_step.checked_mul_int(u64::from(steps))?;

    if is_buy_level(level, grid_levels) {
        base_price.checked_sub(offset)
    } else {
        base_price.checked_add(offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelFill {
    pub level: u32,
    pub is_buy: bool,
    pub target: FixedPointAmount,
    pub price: FixedPointAmount,
    pub amount: FixedPointAmount,
    pub base_token: Address,
    pub completes: bool,
}

/// Run every grid gate without changing the order
pub fn plan_level(
    order: &Order,
    level: u32,
    amount_out: FixedPointAmount,
    now: u64,
    split: GridSplit,
    tolerance_bps: u32,
) -> Result<LevelFill> {
    let StrategyState::Grid {
        base_token,
        grid_levels,
        price_step,
        base_price,
        amount_per_grid,
        executed_levels,
        ..
    } = &order.strategy
    else {
        return Err(wrong_strategy(order, StrategyKind::Grid));
    };

    ensure_before_deadline(order, now)?;

    if level >= *grid_levels {
        return Err(StateError::InvalidLevel {
            level,
            levels: *grid_levels,
        }
        .into());
    }

    if executed_levels.contains(level) {
        return Err(StateError::LevelAlreadyExecuted { level }.into());
    }

    let target = level_target_price(*base_price, *price_step, *grid_levels, level, split)?;
    let band = target.apply_bps(u64::from(tolerance_bps))?;
    let min = target.saturating_sub(band);
    let max = target.checked_add(band)?;
    let price = amount_out.div_scaled(*amount_per_grid)?;
    if price < min || price > max {
        return Err(EconomicError::PriceOutOfRange { price, min, max }.into());
    }

    Ok(LevelFill {
        level,
        is_buy: is_buy_level(level, *grid_levels),
        target,
        price,
        amount: *amount_per_grid,
        base_token: *base_token,
        completes: executed_levels.count() + 1 == *grid_levels,
    })
}

impl SettlementEngine {
    /// Fill one grid level. `amount_out / amount_per_grid` must land within
    /// the configured tolerance of the level's target price.
    pub fn execute_level(
        &self,
        ctx: &ExecutionContext,
        order_hash: &OrderHash,
        level: u32,
        amount_out: FixedPointAmount,
    ) -> Result<ExecutionReceipt> {
        let split = self.policy.grid_split;
        let tolerance_bps = self.policy.grid_tolerance_bps;

        let _admitted = self.admit();
        let receipt = self.ledger.mutate(order_hash, |order| {
            let plan = plan_level(order, level, amount_out, ctx.now, split, tolerance_bps)?;

            order.executed_amount = order.executed_amount.checked_add(plan.amount)?;
            if let StrategyState::Grid {
                executed_levels, ..
            } = &mut order.strategy
            {
                executed_levels.insert(level);
            }
            if plan.completes {
                order.transition_to(OrderStatus::Completed)?;
            }

            let step = ExecutionStep::Level(level);
            let fill = Fill {
                amount: plan.amount,
                amount_out: Some(amount_out),
                price: Some(plan.price),
            };
            let ops = [EscrowOp::Consume {
                maker: order.maker,
                asset: plan.base_token,
                amount: plan.amount,
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
            "Grid {} level {} filled at {} (executed {}, status {})",
            order_hash.short(),
            level,
            receipt.price.unwrap_or_default(),
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

    fn grid_order(levels: u32) -> Order {
        let (strategy, total_amount) = initial_state(&GridParams {
            base_token: Address::repeat_byte(0xaa),
            quote_token: Address::repeat_byte(0xbb),
            grid_levels: levels,
            price_step: amt("1"),
            base_price: amt("100"),
            amount_per_grid: amt("10"),
        })
        .unwrap();
        Order {
            order_hash: OrderHash::from([4u8; 32]),
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
    fn test_symmetric_ladder() {
        let targets: Vec<FixedPointAmount> = (0..4)
            .map(|level| {
                level_target_price(amt("100"), amt("1"), 4, level, GridSplit::Symmetric).unwrap()
            })
            .collect();
        assert_eq!(targets, vec![amt("98"), amt("99"), amt("101"), amt("102")]);
    }

    #[test]
    fn test_level_offset_ladder() {
        let targets: Vec<FixedPointAmount> = (0..4)
            .map(|level| {
                level_target_price(amt("100"), amt("1"), 4, level, GridSplit::LevelOffset).unwrap()
            })
            .collect();
        assert_eq!(targets, vec![amt("100"), amt("99"), amt("102"), amt("103")]);
    }

    #[test]
    fn test_single_level_grid_sells_above_base() {
        assert!(!is_buy_level(0, 1));
        assert_eq!(
            level_target_price(amt("100"), amt("1"), 1, 0, GridSplit::Symmetric).unwrap(),
            amt("101")
        );
    }

    #[test]
    fn test_level_gates() {
        let order = grid_order(4);
        assert_eq!(order.total_amount, amt("40"));

        // Level 0 targets 98; 1% band is [97.02, 98.98]
        let plan = plan_level(&order, 0, amt("980"), 0, GridSplit::Symmetric, 100).unwrap();
        assert!(plan.is_buy);
        assert_eq!(plan.target, amt("98"));
        assert!(plan_level(&order, 0, amt("989.8"), 0, GridSplit::Symmetric, 100).is_ok());

        let err = plan_level(&order, 0, amt("990"), 0, GridSplit::Symmetric, 100).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Economic(EconomicError::PriceOutOfRange { .. })
        ));

        let err = plan_level(&order, 4, amt("1000"), 0, GridSplit::Symmetric, 100).unwrap_err();
        assert!(matches!(
            err,
            EngineError::State(StateError::InvalidLevel {
                level: 4,
                levels: 4
            })
        ));
    }

    #[test]
    fn test_executed_level_is_rejected() {
        let mut order = grid_order(4);
        if let StrategyState::Grid {
            executed_levels, ..
        } = &mut order.strategy
        {
            executed_levels.insert(2);
        }
        let err = plan_level(&order, 2, amt("1010"), 0, GridSplit::Symmetric, 100).unwrap_err();
        assert!(matches!(
            err,
            EngineError::State(StateError::LevelAlreadyExecuted { level: 2 })
        ));
    }
}
