use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::amount::FixedPointAmount;
use super::codec;
use super::hash::OrderHash;
use super::order::StrategyKind;
use super::state::{LinkStatus, OrderStatus};

/// Event types emitted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    /// Partial execution, order stays active
    Executed,
    /// Execution that filled the order (or exercise / position removal)
    Completed,
    Cancelled,
    Expired,
    FeesBooked,
    LinkAttached,
    LinkStatusChanged,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Created => "created",
            EventKind::Executed => "executed",
            EventKind::Completed => "completed",
            EventKind::Cancelled => "cancelled",
            EventKind::Expired => "expired",
            EventKind::FeesBooked => "fees_booked",
            EventKind::LinkAttached => "link_attached",
            EventKind::LinkStatusChanged => "link_status_changed",
        };
        write!(f, "{}", s)
    }
}

/// Which step of the strategy an execution filled.
///
/// Together with the order hash this is the natural dedup key of an
/// execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "step", content = "index", rename_all = "snake_case")]
pub enum ExecutionStep {
    /// 1-based TWAP interval
    Interval(u32),
    /// 1-based DCA execution
    DcaExecution(u32),
    /// 0-based grid level
    Level(u32),
    Exercise,
    PositionRemoved,
}

impl fmt::Display for ExecutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStep::Interval(n) => write!(f, "interval #{}", n),
            ExecutionStep::DcaExecution(n) => write!(f, "execution #{}", n),
            ExecutionStep::Level(n) => write!(f, "level {}", n),
            ExecutionStep::Exercise => write!(f, "exercise"),
            ExecutionStep::PositionRemoved => write!(f, "remove"),
        }
    }
}

/// Structured event published once per successful state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Engine-wide publication order
    pub sequence: u64,
    pub kind: EventKind,
    pub order_hash: OrderHash,
    #[serde(with = "codec::address")]
    pub maker: Address,
    pub strategy_kind: StrategyKind,
    /// Amount moved by this transition (chunk, payout, release, fees)
    pub amount: FixedPointAmount,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub amount_out: Option<FixedPointAmount>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price: Option<FixedPointAmount>,
    pub executed_amount: FixedPointAmount,
    pub total_amount: FixedPointAmount,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub step: Option<ExecutionStep>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub link_status: Option<LinkStatus>,
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = EngineEvent {
            sequence: 3,
            kind: EventKind::Executed,
            order_hash: OrderHash::from([1u8; 32]),
            maker: Address::repeat_byte(2),
            strategy_kind: StrategyKind::Twap,
            amount: "100".parse().unwrap(),
            amount_out: Some("95".parse().unwrap()),
            price: Some("0.95".parse().unwrap()),
            executed_amount: "100".parse().unwrap(),
            total_amount: "1000".parse().unwrap(),
            status: OrderStatus::Active,
            step: Some(ExecutionStep::Interval(1)),
            link_status: None,
            timestamp: 4_600,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "executed");
        assert_eq!(json["strategy_kind"], "TWAP");
        assert_eq!(json["step"]["step"], "interval");
        assert_eq!(json["step"]["index"], 1);
        assert!(json.get("link_status").is_none());

        let back: EngineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
