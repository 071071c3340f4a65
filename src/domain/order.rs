use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::amount::FixedPointAmount;
use super::codec;
use super::hash::OrderHash;
use super::state::OrderStatus;
use crate::error::{ArithmeticError, StateError};

/// Strategy variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    Twap,
    Option,
    Dca,
    Grid,
    ConcentratedLiquidity,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Twap,
        StrategyKind::Option,
        StrategyKind::Dca,
        StrategyKind::Grid,
        StrategyKind::ConcentratedLiquidity,
    ];

    /// Stable byte used in order-hash preimages
    pub fn tag(&self) -> u8 {
        match self {
            StrategyKind::Twap => 0,
            StrategyKind::Option => 1,
            StrategyKind::Dca => 2,
            StrategyKind::Grid => 3,
            StrategyKind::ConcentratedLiquidity => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Twap => "TWAP",
            StrategyKind::Option => "OPTION",
            StrategyKind::Dca => "DCA",
            StrategyKind::Grid => "GRID",
            StrategyKind::ConcentratedLiquidity => "CONCENTRATED_LIQUIDITY",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for StrategyKind {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "TWAP" => Ok(StrategyKind::Twap),
            "OPTION" => Ok(StrategyKind::Option),
            "DCA" => Ok(StrategyKind::Dca),
            "GRID" => Ok(StrategyKind::Grid),
            "CONCENTRATED_LIQUIDITY" | "LIQUIDITY" => Ok(StrategyKind::ConcentratedLiquidity),
            _ => Err(format!("Unknown strategy kind: {}", s)),
        }
    }
}

/// Set of executed grid levels, one bit per level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelBitmap(Vec<u64>);

impl LevelBitmap {
    pub fn with_levels(levels: u32) -> Self {
        Self(vec![0; (levels as usize).div_ceil(64)])
    }

    pub fn contains(&self, level: u32) -> bool {
        let (word, bit) = Self::position(level);
        self.0.get(word).is_some_and(|w| w & (1 << bit) != 0)
    }

    pub fn insert(&mut self, level: u32) {
        let (word, bit) = Self::position(level);
        if word >= self.0.len() {
            self.0.resize(word + 1, 0);
        }
        self.0[word] |= 1 << bit;
    }

    pub fn count(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }

    pub fn levels(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.count() as usize);
        for (i, word) in self.0.iter().enumerate() {
            for bit in 0..64u32 {
                if word & (1 << bit) != 0 {
                    out.push(i as u32 * 64 + bit);
                }
            }
        }
        out
    }

    fn position(level: u32) -> (usize, u32) {
        ((level / 64) as usize, level % 64)
    }
}

/// Strategy-specific payload of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyState {
    Twap {
        #[serde(with = "codec::address")]
        token_in: Address,
        #[serde(with = "codec::address")]
        token_out: Address,
        intervals: u32,
        interval_duration: u64,
        min_price_per_token: FixedPointAmount,
        max_price_per_token: FixedPointAmount,
        last_execution_time: u64,
        intervals_executed: u32,
    },
    Option {
        #[serde(with = "codec::address")]
        underlying: Address,
        strike_price: FixedPointAmount,
        premium: FixedPointAmount,
        expiry: u64,
        is_call: bool,
        collateral_amount: FixedPointAmount,
        is_premium_paid: bool,
        is_exercised: bool,
        #[serde(default)]
        payout: Option<FixedPointAmount>,
    },
    Dca {
        #[serde(with = "codec::address")]
        token_in: Address,
        #[serde(with = "codec::address")]
        token_out: Address,
        frequency: u64,
        amount_per_execution: FixedPointAmount,
        max_slippage_bps: u32,
        last_execution_time: u64,
        executions: u32,
    },
    Grid {
        #[serde(with = "codec::address")]
        base_token: Address,
        #[serde(with = "codec::address")]
        quote_token: Address,
        grid_levels: u32,
        price_step: FixedPointAmount,
        base_price: FixedPointAmount,
        amount_per_grid: FixedPointAmount,
        executed_levels: LevelBitmap,
    },
    ConcentratedLiquidity {
        #[serde(with = "codec::address")]
        token0: Address,
        #[serde(with = "codec::address")]
        token1: Address,
        amount0: FixedPointAmount,
        amount1: FixedPointAmount,
        lower_tick: i32,
        upper_tick: i32,
        #[serde(default)]
        fees0: FixedPointAmount,
        #[serde(default)]
        fees1: FixedPointAmount,
    },
}

impl StrategyState {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyState::Twap { .. } => StrategyKind::Twap,
            StrategyState::Option { .. } => StrategyKind::Option,
            StrategyState::Dca { .. } => StrategyKind::Dca,
            StrategyState::Grid { .. } => StrategyKind::Grid,
            StrategyState::ConcentratedLiquidity { .. } => StrategyKind::ConcentratedLiquidity,
        }
    }
}

/// Strategy order envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_hash: OrderHash,
    #[serde(with = "codec::address")]
    pub maker: Address,
    /// Position of this order in the maker's order list at creation
    pub nonce: u64,
    #[serde(with = "codec::b256")]
    pub salt: B256,
    pub status: OrderStatus,
    pub created_at: u64,
    #[serde(default)]
    pub deadline: Option<u64>,
    pub total_amount: FixedPointAmount,
    pub executed_amount: FixedPointAmount,
    pub strategy: StrategyState,
}

impl Order {
    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn remaining(&self) -> FixedPointAmount {
        self.total_amount.saturating_sub(self.executed_amount)
    }

    /// Move to `target` if the lifecycle allows it; terminal states are final
    pub fn transition_to(&mut self, target: OrderStatus) -> Result<(), StateError> {
        if !self.status.can_transition_to(target) {
            return Err(StateError::InvalidStatusTransition {
                order_hash: self.order_hash,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        Ok(())
    }

    /// Escrow committed for this order at creation, per asset
    pub fn initial_commitment(&self) -> Vec<(Address, FixedPointAmount)> {
        match &self.strategy {
            StrategyState::Twap { token_in, .. } | StrategyState::Dca { token_in, .. } => {
                vec![(*token_in, self.total_amount)]
            }
            StrategyState::Option {
                underlying,
                collateral_amount,
                ..
            } => vec![(*underlying, *collateral_amount)],
            StrategyState::Grid { base_token, .. } => vec![(*base_token, self.total_amount)],
            StrategyState::ConcentratedLiquidity {
                token0,
                token1,
                amount0,
                amount1,
                ..
            } => non_zero_legs([(*token0, *amount0), (*token1, *amount1)]),
        }
    }

    /// Escrow still held for this order, per asset
    pub fn outstanding_commitment(&self) -> Result<Vec<(Address, FixedPointAmount)>, ArithmeticError> {
        match &self.strategy {
            StrategyState::ConcentratedLiquidity {
                token0,
                token1,
                amount0,
                amount1,
                fees0,
                fees1,
                ..
            } => Ok(non_zero_legs([
                (*token0, amount0.checked_add(*fees0)?),
                (*token1, amount1.checked_add(*fees1)?),
            ])),
            _ => {
                let remaining = self.total_amount.checked_sub(self.executed_amount)?;
                Ok(self
                    .initial_commitment()
                    .into_iter()
                    .map(|(asset, _)| (asset, remaining))
                    .filter(|(_, amount)| !amount.is_zero())
                    .collect())
            }
        }
    }

    /// Time after which the order may be expired, if any
    pub fn expires_after(&self) -> Option<u64> {
        match &self.strategy {
            StrategyState::Option { expiry, .. } => Some(match self.deadline {
                Some(deadline) => deadline.min(*expiry),
                None => *expiry,
            }),
            _ => self.deadline,
        }
    }

    /// Per-kind progress counter (intervals, executions, levels)
    pub fn progress(&self) -> Progress {
        match &self.strategy {
            StrategyState::Twap {
                intervals,
                intervals_executed,
                ..
            } => Progress {
                done: *intervals_executed,
                of: Some(*intervals),
            },
            StrategyState::Dca { executions, .. } => Progress {
                done: *executions,
                of: None,
            },
            StrategyState::Grid {
                grid_levels,
                executed_levels,
                ..
            } => Progress {
                done: executed_levels.count(),
                of: Some(*grid_levels),
            },
            StrategyState::Option { is_exercised, .. } => Progress {
                done: u32::from(*is_exercised),
                of: Some(1),
            },
            StrategyState::ConcentratedLiquidity { .. } => Progress {
                done: u32::from(self.status == OrderStatus::Completed),
                of: Some(1),
            },
        }
    }
}

fn non_zero_legs<const N: usize>(
    legs: [(Address, FixedPointAmount); N],
) -> Vec<(Address, FixedPointAmount)> {
    legs.into_iter().filter(|(_, amount)| !amount.is_zero()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub done: u32,
    pub of: Option<u32>,
}

/// Read-only status view of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusView {
    pub order_hash: OrderHash,
    #[serde(with = "codec::address")]
    pub maker: Address,
    pub kind: StrategyKind,
    pub status: OrderStatus,
    pub total_amount: FixedPointAmount,
    pub executed_amount: FixedPointAmount,
    pub remaining: FixedPointAmount,
    pub progress: Progress,
    pub deadline: Option<u64>,
}

impl From<&Order> for OrderStatusView {
    fn from(order: &Order) -> Self {
        Self {
            order_hash: order.order_hash,
            maker: order.maker,
            kind: order.kind(),
            status: order.status,
            total_amount: order.total_amount,
            executed_amount: order.executed_amount,
            remaining: order.remaining(),
            progress: order.progress(),
            deadline: order.deadline,
        }
    }
}
