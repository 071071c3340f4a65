#![allow(dead_code)]

use std::sync::Arc;

use alloy::primitives::Address;
use rust_decimal::Decimal;

use strategy_settlement::domain::{
    DcaParams, GridParams, LiquidityParams, OptionParams, TwapParams,
};
use strategy_settlement::{
    CreateOrder, EngineConfig, ExecutionContext, FixedPointAmount, RecordingEventSink,
    RecordingTransferSink, SettlementEngine, StrategyRequest,
};

pub const T0: u64 = 1_700_000_000;

pub fn maker() -> Address {
    Address::repeat_byte(0x11)
}

pub fn taker() -> Address {
    Address::repeat_byte(0x22)
}

pub fn token_x() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn token_y() -> Address {
    Address::repeat_byte(0xbb)
}

pub fn amt(value: Decimal) -> FixedPointAmount {
    FixedPointAmount::from_decimal(value).unwrap()
}

pub fn as_maker(now: u64) -> ExecutionContext {
    ExecutionContext::new(now, maker())
}

pub fn as_taker(now: u64) -> ExecutionContext {
    ExecutionContext::new(now, taker())
}

pub struct Harness {
    pub engine: SettlementEngine,
    pub events: Arc<RecordingEventSink>,
    pub transfers: Arc<RecordingTransferSink>,
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let events = Arc::new(RecordingEventSink::new());
    let transfers = Arc::new(RecordingTransferSink::new());
    let engine = SettlementEngine::new(&config)
        .with_event_sink(events.clone())
        .with_transfer_sink(transfers.clone());
    Harness {
        engine,
        events,
        transfers,
    }
}

/// TWAP X -> Y: 1000 over 10 hourly intervals, price band [0.95, 1.05]
pub fn twap_params() -> TwapParams {
    TwapParams {
        token_in: token_x(),
        token_out: token_y(),
        total_amount: FixedPointAmount::from_units(1000),
        intervals: 10,
        interval_duration: 3600,
        min_price_per_token: amt(rust_decimal_macros::dec!(0.95)),
        max_price_per_token: amt(rust_decimal_macros::dec!(1.05)),
    }
}

pub fn twap(params: TwapParams) -> CreateOrder {
    CreateOrder::new(StrategyRequest::Twap(params))
}

/// Call on X, strike 100, premium 0.1, one day to expiry, 1000 collateral
pub fn option_params(now: u64) -> OptionParams {
    OptionParams {
        underlying: token_x(),
        strike_price: FixedPointAmount::from_units(100),
        premium: amt(rust_decimal_macros::dec!(0.1)),
        expiry: now + 86_400,
        is_call: true,
        collateral_amount: FixedPointAmount::from_units(1000),
    }
}

pub fn option(params: OptionParams) -> CreateOrder {
    CreateOrder::new(StrategyRequest::Option(params))
}

/// DCA X -> Y: 500 in chunks of 100 every hour, 1% slippage
pub fn dca_params() -> DcaParams {
    DcaParams {
        token_in: token_x(),
        token_out: token_y(),
        total_amount: FixedPointAmount::from_units(500),
        frequency: 3600,
        amount_per_execution: FixedPointAmount::from_units(100),
        max_slippage_bps: 100,
    }
}

pub fn dca(params: DcaParams) -> CreateOrder {
    CreateOrder::new(StrategyRequest::Dca(params))
}

/// 4 levels of 10 X around 100, step 1: targets 98, 99, 101, 102
pub fn grid_params() -> GridParams {
    GridParams {
        base_token: token_x(),
        quote_token: token_y(),
        grid_levels: 4,
        price_step: FixedPointAmount::from_units(1),
        base_price: FixedPointAmount::from_units(100),
        amount_per_grid: FixedPointAmount::from_units(10),
    }
}

pub fn grid(params: GridParams) -> CreateOrder {
    CreateOrder::new(StrategyRequest::Grid(params))
}

pub fn liquidity_params() -> LiquidityParams {
    LiquidityParams {
        token0: token_x(),
        token1: token_y(),
        amount0: FixedPointAmount::from_units(50),
        amount1: FixedPointAmount::from_units(20),
        lower_tick: -887,
        upper_tick: 887,
    }
}

pub fn liquidity(params: LiquidityParams) -> CreateOrder {
    CreateOrder::new(StrategyRequest::ConcentratedLiquidity(params))
}
