use alloy::primitives::Address;
use thiserror::Error;

use crate::domain::{FixedPointAmount, LinkStatus, OrderHash, OrderStatus, StrategyKind};

/// Main error type for the settlement engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Execution gated: {0}")]
    Gating(#[from] GatingError),

    #[error("Economic terms violated: {0}")]
    Economic(#[from] EconomicError),

    #[error("Escrow error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    // Outer surfaces (configuration, snapshots, CLI input)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Coarse error category, for callers that surface errors by kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    State,
    Gating,
    Economic,
    Resource,
    Arithmetic,
    Infrastructure,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::State(_) => ErrorKind::State,
            EngineError::Gating(_) => ErrorKind::Gating,
            EngineError::Economic(_) => ErrorKind::Economic,
            EngineError::Resource(_) => ErrorKind::Resource,
            EngineError::Arithmetic(_) => ErrorKind::Arithmetic,
            EngineError::Config(_)
            | EngineError::Io(_)
            | EngineError::Json(_)
            | EngineError::InvalidInput(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Creation-time parameter violations. Never accompanied by a state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("TWAP needs at least 2 intervals, got {intervals}")]
    InvalidIntervals { intervals: u32 },

    #[error("Interval duration must be positive")]
    InvalidDuration,

    #[error("Invalid price range: min {min} must be below max {max}")]
    InvalidPriceRange {
        min: FixedPointAmount,
        max: FixedPointAmount,
    },

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("Expiry {expiry} is not after current time {now}")]
    InvalidExpiry { expiry: u64, now: u64 },

    #[error("Strike price must be non-zero")]
    InvalidStrike,

    #[error("Frequency {frequency}s below minimum {minimum}s")]
    FrequencyTooShort { frequency: u64, minimum: u64 },

    #[error("Slippage tolerance {bps} bps exceeds cap {max_bps} bps")]
    InvalidSlippage { bps: u32, max_bps: u32 },

    #[error("Grid levels must be within 1..={max}, got {levels}")]
    InvalidGridLevels { levels: u32, max: u32 },

    #[error("Invalid grid price ladder: {reason}")]
    InvalidGridPrice { reason: String },

    #[error("Invalid tick range: lower {lower} must be below upper {upper}")]
    InvalidTickRange { lower: i32, upper: i32 },

    #[error("Deadline {deadline} is not after current time {now}")]
    InvalidDeadline { deadline: u64, now: u64 },
}

/// Order/ledger state refusals, checked before any mutation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Order not found: {order_hash}")]
    OrderNotFound { order_hash: OrderHash },

    #[error("Order {order_hash} is not active (status: {status})")]
    OrderNotActive {
        order_hash: OrderHash,
        status: OrderStatus,
    },

    #[error("Order {order_hash} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        order_hash: OrderHash,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Duplicate order: {order_hash}")]
    DuplicateOrder { order_hash: OrderHash },

    #[error("Option {order_hash} already exercised")]
    AlreadyExercised { order_hash: OrderHash },

    #[error("Grid level {level} already executed")]
    LevelAlreadyExecuted { level: u32 },

    #[error("Grid level {level} out of range (levels: {levels})")]
    InvalidLevel { level: u32, levels: u32 },

    #[error("Liquidity position {order_hash} is not active")]
    PositionNotActive { order_hash: OrderHash },

    #[error("Order {order_hash} is a {actual} order, expected {expected}")]
    WrongStrategy {
        order_hash: OrderHash,
        expected: StrategyKind,
        actual: StrategyKind,
    },

    #[error("Caller {caller} is not the maker of {order_hash}")]
    Unauthorized {
        order_hash: OrderHash,
        caller: Address,
    },

    #[error("Cross-chain link already exists for {order_hash}")]
    LinkAlreadyExists { order_hash: OrderHash },

    #[error("Cross-chain link not found for counterpart {counterpart_order_hash}")]
    LinkNotFound { counterpart_order_hash: OrderHash },

    #[error("Invalid link transition: from {from} to {to}")]
    InvalidLinkTransition { from: LinkStatus, to: LinkStatus },
}

/// Time- and progress-based refusals
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatingError {
    #[error("Interval not elapsed: next execution allowed at {next_allowed_at}")]
    IntervalNotElapsed { next_allowed_at: u64 },

    #[error("Frequency not elapsed: next execution allowed at {next_allowed_at}")]
    FrequencyNotElapsed { next_allowed_at: u64 },

    #[error("Option expired at {expiry} (now {now})")]
    OptionExpired { expiry: u64, now: u64 },

    #[error("All {intervals} intervals already executed")]
    AllIntervalsExecuted { intervals: u32 },

    #[error("All funds already executed")]
    AllFundsExecuted,

    #[error("Order deadline {deadline} passed (now {now})")]
    DeadlinePassed { deadline: u64, now: u64 },

    #[error("Order cannot expire yet (now {now})")]
    NotYetExpired { now: u64 },
}

/// The execution would violate the order's economic terms
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomicError {
    #[error("Price {price} outside range [{min}, {max}]")]
    PriceOutOfRange {
        price: FixedPointAmount,
        min: FixedPointAmount,
        max: FixedPointAmount,
    },

    #[error("Slippage {deviation_bps} bps exceeds limit {max_bps} bps")]
    SlippageExceeded { deviation_bps: u64, max_bps: u32 },

    #[error("Option not in the money: current {current}, strike {strike}")]
    NotProfitable {
        current: FixedPointAmount,
        strike: FixedPointAmount,
    },

    #[error("Premium mismatch: expected {expected}, paid {paid}")]
    PremiumMismatch {
        expected: FixedPointAmount,
        paid: FixedPointAmount,
    },
}

/// Escrow-accounting violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Insufficient committed {asset} for {maker}: requested {requested}, committed {committed}")]
    InsufficientCommitted {
        maker: Address,
        asset: Address,
        requested: FixedPointAmount,
        committed: FixedPointAmount,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("Overflow in {operation}")]
    Overflow { operation: &'static str },

    #[error("Underflow in {operation}")]
    Underflow { operation: &'static str },

    #[error("Division by zero in {operation}")]
    DivisionByZero { operation: &'static str },

    #[error("Cannot parse amount '{input}': {reason}")]
    Parse { input: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err: EngineError = ValidationError::InvalidStrike.into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: EngineError = GatingError::AllFundsExecuted.into();
        assert_eq!(err.kind(), ErrorKind::Gating);

        let err: EngineError = ArithmeticError::Underflow { operation: "sub" }.into();
        assert_eq!(err.kind(), ErrorKind::Arithmetic);

        let err = EngineError::InvalidInput("bad".to_string());
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn test_error_messages() {
        let err = ValidationError::FrequencyTooShort {
            frequency: 100,
            minimum: 3600,
        };
        assert_eq!(err.to_string(), "Frequency 100s below minimum 3600s");

        let err: EngineError = GatingError::IntervalNotElapsed {
            next_allowed_at: 7200,
        }
        .into();
        assert!(err.to_string().contains("7200"));
    }
}
