use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Validated, escrow committed, accepting executions
    Active,
    /// executed_amount reached total_amount (or option exercised / position removed)
    Completed,
    /// Maker cancelled, remaining escrow released
    Cancelled,
    /// Passed expiry or deadline, remaining escrow released
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Active => "ACTIVE",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Expired => "EXPIRED",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Active)
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;

        match (self, target) {
            // Partial executions keep the order active
            (Active, Active) => true,
            (Active, Completed) => true,
            (Active, Cancelled) => true,
            (Active, Expired) => true,

            // Terminal states are final
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTLC-side status of a cross-chain link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    /// Counterpart order announced, nothing locked yet
    Pending,
    /// Counterpart HTLC funded with hashlock/timelock
    Locked,
    /// Preimage revealed, swap settled
    Executed,
    /// Timelock expired, funds returned
    Refunded,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Pending => "PENDING",
            LinkStatus::Locked => "LOCKED",
            LinkStatus::Executed => "EXECUTED",
            LinkStatus::Refunded => "REFUNDED",
        }
    }

    /// Forward-only: Pending → Locked → {Executed | Refunded}, or Pending → Refunded
    pub fn can_transition_to(&self, target: LinkStatus) -> bool {
        use LinkStatus::*;

        matches!(
            (self, target),
            (Pending, Locked) | (Pending, Refunded) | (Locked, Executed) | (Locked, Refunded)
        )
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
