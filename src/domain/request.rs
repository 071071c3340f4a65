//! Creation requests, as submitted by a maker.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use super::amount::FixedPointAmount;
use super::codec;
use super::order::StrategyKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapParams {
    #[serde(with = "codec::address")]
    pub token_in: Address,
    #[serde(with = "codec::address")]
    pub token_out: Address,
    pub total_amount: FixedPointAmount,
    pub intervals: u32,
    /// Seconds between interval executions
    pub interval_duration: u64,
    pub min_price_per_token: FixedPointAmount,
    pub max_price_per_token: FixedPointAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionParams {
    #[serde(with = "codec::address")]
    pub underlying: Address,
    pub strike_price: FixedPointAmount,
    pub premium: FixedPointAmount,
    pub expiry: u64,
    pub is_call: bool,
    pub collateral_amount: FixedPointAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcaParams {
    #[serde(with = "codec::address")]
    pub token_in: Address,
    #[serde(with = "codec::address")]
    pub token_out: Address,
    pub total_amount: FixedPointAmount,
    /// Seconds between executions
    pub frequency: u64,
    pub amount_per_execution: FixedPointAmount,
    pub max_slippage_bps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridParams {
    #[serde(with = "codec::address")]
    pub base_token: Address,
    #[serde(with = "codec::address")]
    pub quote_token: Address,
    pub grid_levels: u32,
    pub price_step: FixedPointAmount,
    pub base_price: FixedPointAmount,
    pub amount_per_grid: FixedPointAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityParams {
    #[serde(with = "codec::address")]
    pub token0: Address,
    #[serde(with = "codec::address")]
    pub token1: Address,
    pub amount0: FixedPointAmount,
    pub amount1: FixedPointAmount,
    pub lower_tick: i32,
    pub upper_tick: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyRequest {
    Twap(TwapParams),
    Option(OptionParams),
    Dca(DcaParams),
    Grid(GridParams),
    ConcentratedLiquidity(LiquidityParams),
}

impl StrategyRequest {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyRequest::Twap(_) => StrategyKind::Twap,
            StrategyRequest::Option(_) => StrategyKind::Option,
            StrategyRequest::Dca(_) => StrategyKind::Dca,
            StrategyRequest::Grid(_) => StrategyKind::Grid,
            StrategyRequest::ConcentratedLiquidity(_) => StrategyKind::ConcentratedLiquidity,
        }
    }
}

/// Order creation request. The maker is the calling identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    /// Off-chain salt mixed into the order hash
    #[serde(with = "codec::b256", default)]
    pub salt: B256,
    /// Optional time after which the order can no longer execute
    #[serde(default)]
    pub deadline: Option<u64>,
    pub strategy: StrategyRequest,
}

impl CreateOrder {
    pub fn new(strategy: StrategyRequest) -> Self {
        Self {
            salt: B256::ZERO,
            deadline: None,
            strategy,
        }
    }

    pub fn with_salt(mut self, salt: B256) -> Self {
        self.salt = salt;
        self
    }

    pub fn with_deadline(mut self, deadline: u64) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
