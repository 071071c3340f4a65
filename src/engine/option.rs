//! Options: a single in-the-money exercise before expiry, premium paid
//! atomically with the exercise, payout drawn from the writer's collateral.

use alloy::primitives::Address;
use tracing::info;

use super::{
    ensure_before_deadline, wrong_strategy, ExecutionContext, ExecutionReceipt, Fill,
    SettlementEngine, Transition,
};
use crate::adapters::{TransferIntent, TransferKind};
use crate::config::OptionPayoutPolicy;
use crate::domain::{
    ExecutionStep, FixedPointAmount, OptionParams, Order, OrderHash, OrderStatus, StrategyKind,
    StrategyState,
};
use crate::error::{ArithmeticError, EconomicError, GatingError, Result, StateError};
use crate::escrow::EscrowOp;

pub(super) fn initial_state(params: &OptionParams) -> (StrategyState, FixedPointAmount) {
    let state = StrategyState::Option {
        underlying: params.underlying,
        strike_price: params.strike_price,
        premium: params.premium,
        expiry: params.expiry,
        is_call: params.is_call,
        collateral_amount: params.collateral_amount,
        is_premium_paid: false,
        is_exercised: false,
        payout: None,
    };
    (state, params.collateral_amount)
}

/// Collateral paid to the holder for an in-the-money exercise
pub fn payout(
    policy: OptionPayoutPolicy,
    collateral: FixedPointAmount,
    strike: FixedPointAmount,
    current: FixedPointAmount,
) -> std::result::Result<FixedPointAmount, ArithmeticError> {
    match policy {
        OptionPayoutPolicy::FullCollateral => Ok(collateral),
        OptionPayoutPolicy::LinearCapped => {
            let linear = collateral.mul_div(current.abs_diff(strike), strike)?;
            Ok(linear.min(collateral))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exercise {
    pub underlying: Address,
    pub premium: FixedPointAmount,
    pub payout: FixedPointAmount,
    pub refund: FixedPointAmount,
}

/// Run every exercise gate without changing the order.
///
/// `AlreadyExercised` is reported ahead of the status check, since an
/// exercised option is also no longer active.
pub fn plan_exercise(
    order: &Order,
    current_price: FixedPointAmount,
    paid_premium: FixedPointAmount,
    now: u64,
    policy: OptionPayoutPolicy,
) -> Result<Exercise> {
    let StrategyState::Option {
        underlying,
        strike_price,
        premium,
        expiry,
        is_call,
        collateral_amount,
        is_exercised,
        ..
    } = &order.strategy
    else {
        return Err(wrong_strategy(order, StrategyKind::Option));
    };

    if *is_exercised {
        return Err(StateError::AlreadyExercised {
            order_hash: order.order_hash,
        }
        .into());
    }

    if !order.is_active() {
        return Err(StateError::OrderNotActive {
            order_hash: order.order_hash,
            status: order.status,
        }
        .into());
    }

    if now > *expiry {
        return Err(GatingError::OptionExpired {
            expiry: *expiry,
            now,
        }
        .into());
    }

    ensure_before_deadline(order, now)?;

    if paid_premium != *premium {
        return Err(EconomicError::PremiumMismatch {
            expected: *premium,
            paid: paid_premium,
        }
        .into());
    }

    let in_the_money = if *is_call {
        current_price > *strike_price
    } else {
        current_price < *strike_price
    };
    if !in_the_money {
        return Err(EconomicError::NotProfitable {
            current: current_price,
            strike: *strike_price,
        }
        .into());
    }

    let payout = payout(policy, *collateral_amount, *strike_price, current_price)?;
    let refund = collateral_amount.checked_sub(payout)?;

    Ok(Exercise {
        underlying: *underlying,
        premium: *premium,
        payout,
        refund,
    })
}

impl SettlementEngine {
    /// Exercise an option on behalf of `ctx.caller` (the holder)
    pub fn exercise(
        &self,
        ctx: &ExecutionContext,
        order_hash: &OrderHash,
        current_price: FixedPointAmount,
        paid_premium: FixedPointAmount,
    ) -> Result<ExecutionReceipt> {
        let policy = self.policy.option_payout;
        let _admitted = self.admit();
        let receipt = self.ledger.update(order_hash, |order| {
            let plan = plan_exercise(order, current_price, paid_premium, ctx.now, policy)?;

            if let StrategyState::Option {
                is_premium_paid,
                is_exercised,
                payout,
                ..
            } = &mut order.strategy
            {
                *is_premium_paid = true;
                *is_exercised = true;
                *payout = Some(plan.payout);
            }
            order.executed_amount = order.total_amount;
            order.transition_to(OrderStatus::Completed)?;

            let step = ExecutionStep::Exercise;
            let fill = Fill {
                amount: plan.payout,
                amount_out: None,
                price: Some(current_price),
            };
            let ops = [
                EscrowOp::Consume {
                    maker: order.maker,
                    asset: plan.underlying,
                    amount: plan.payout,
                    recipient: ctx.caller,
                },
                EscrowOp::Release {
                    maker: order.maker,
                    asset: plan.underlying,
                    amount: plan.refund,
                },
            ];
            let premium = TransferIntent {
                kind: TransferKind::Premium,
                order_hash: order.order_hash,
                maker: order.maker,
                asset: plan.underlying,
                amount: plan.premium,
                counterparty: ctx.caller,
            };
            let extra: &[TransferIntent] = if plan.premium.is_zero() {
                &[]
            } else {
                std::slice::from_ref(&premium)
            };

            self.commit_transition(
                order,
                &ops,
                extra,
                Transition::fill(order, step, &fill),
                ctx.now,
            )?;
            Ok(ExecutionReceipt::new(order, step, &fill))
        })?;

        info!(
            "Option {} exercised by {}: payout {} at price {}",
            order_hash.short(),
            ctx.caller,
            receipt.amount_in,
            current_price
        );
        Ok(receipt)
    }
}
