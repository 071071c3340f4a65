//! Scenario replay: drive an engine through a JSON list of actions.
//!
//! Orders are referred to by their creation index within the scenario
//! (`"order": 0` is the first successful `create`). Each step runs at its own
//! `at` timestamp as its own `caller`.
//!
//! ```json
//! { "steps": [
//!   { "at": 1000, "caller": "0x01..", "action": "create", "request": { .. } },
//!   { "at": 4600, "caller": "0x02..", "action": "execute_interval",
//!     "order": 0, "amount_out": "95" }
//! ] }
//! ```

use std::fs;
use std::path::Path;

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::codec;
use crate::domain::{
    CreateOrder, CrossChainOrderLink, EngineEvent, FixedPointAmount, LinkStatus, OrderHash,
};
use crate::engine::{Execution, ExecutionContext, SettlementEngine};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub at: u64,
    #[serde(with = "codec::address")]
    pub caller: Address,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Create {
        request: CreateOrder,
    },
    ExecuteInterval {
        order: usize,
        amount_out: FixedPointAmount,
    },
    Exercise {
        order: usize,
        current_price: FixedPointAmount,
        paid_premium: FixedPointAmount,
    },
    ExecuteDca {
        order: usize,
        amount_out: FixedPointAmount,
        reference_rate: FixedPointAmount,
    },
    ExecuteLevel {
        order: usize,
        level: u32,
        amount_out: FixedPointAmount,
    },
    RemoveLiquidity {
        order: usize,
    },
    BookFees {
        order: usize,
        fee0: FixedPointAmount,
        fee1: FixedPointAmount,
    },
    Cancel {
        order: usize,
    },
    Expire {
        order: usize,
    },
    AttachLink {
        order: usize,
        counterpart_order_hash: OrderHash,
        amount: FixedPointAmount,
        #[serde(with = "codec::b256")]
        hashlock: B256,
        timelock: u64,
    },
    UpdateLink {
        counterpart_order_hash: OrderHash,
        status: LinkStatus,
    },
    /// Any strategy execution through the single dispatch point
    Execute {
        order: usize,
        execution: Execution,
    },
    Status {
        order: usize,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Create { .. } => "create",
            Action::ExecuteInterval { .. } => "execute_interval",
            Action::Exercise { .. } => "exercise",
            Action::ExecuteDca { .. } => "execute_dca",
            Action::ExecuteLevel { .. } => "execute_level",
            Action::RemoveLiquidity { .. } => "remove_liquidity",
            Action::BookFees { .. } => "book_fees",
            Action::Cancel { .. } => "cancel",
            Action::Expire { .. } => "expire",
            Action::AttachLink { .. } => "attach_link",
            Action::UpdateLink { .. } => "update_link",
            Action::Execute { .. } => "execute",
            Action::Status { .. } => "status",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: usize,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayReport {
    pub steps: Vec<StepOutcome>,
    pub orders: Vec<OrderHash>,
    pub events: Vec<EngineEvent>,
}

impl ReplayReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.is_ok()).count()
    }
}

pub struct Replayer<'a> {
    engine: &'a SettlementEngine,
    orders: Vec<OrderHash>,
    fail_fast: bool,
}

impl<'a> Replayer<'a> {
    pub fn new(engine: &'a SettlementEngine) -> Self {
        Self {
            engine,
            orders: Vec::new(),
            fail_fast: false,
        }
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Run every step, recording each outcome. Events are left to the
    /// engine's sink; the caller fills `ReplayReport::events` if it records them.
    pub fn run(mut self, scenario: &Scenario) -> Result<ReplayReport> {
        let mut report = ReplayReport::default();

        for (index, step) in scenario.steps.iter().enumerate() {
            let outcome = match self.apply(step) {
                Ok(output) => StepOutcome {
                    step: index,
                    action: step.action.name().to_string(),
                    output: Some(output),
                    error: None,
                },
                Err(e) => {
                    warn!("Step {} ({}) failed: {}", index, step.action.name(), e);
                    if self.fail_fast {
                        return Err(e);
                    }
                    StepOutcome {
                        step: index,
                        action: step.action.name().to_string(),
                        output: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            report.steps.push(outcome);
        }

        debug!(
            steps = report.steps.len(),
            failures = report.failures(),
            "replay finished"
        );
        report.orders = self.orders;
        Ok(report)
    }

    fn apply(&mut self, step: &ScenarioStep) -> Result<Value> {
        let ctx = ExecutionContext::new(step.at, step.caller);
        let engine = self.engine;

        let output = match &step.action {
            Action::Create { request } => {
                let order = engine.create_order(&ctx, request.clone())?;
                self.orders.push(order.order_hash);
                serde_json::to_value(&order)?
            }
            Action::ExecuteInterval { order, amount_out } => {
                let hash = self.order(*order)?;
                serde_json::to_value(engine.execute_interval(&ctx, &hash, *amount_out)?)?
            }
            Action::Exercise {
                order,
                current_price,
                paid_premium,
            } => {
                let hash = self.order(*order)?;
                serde_json::to_value(engine.exercise(&ctx, &hash, *current_price, *paid_premium)?)?
            }
            Action::ExecuteDca {
                order,
                amount_out,
                reference_rate,
            } => {
                let hash = self.order(*order)?;
                serde_json::to_value(engine.execute_order(
                    &ctx,
                    &hash,
                    *amount_out,
                    *reference_rate,
                )?)?
            }
            Action::ExecuteLevel {
                order,
                level,
                amount_out,
            } => {
                let hash = self.order(*order)?;
                serde_json::to_value(engine.execute_level(&ctx, &hash, *level, *amount_out)?)?
            }
            Action::RemoveLiquidity { order } => {
                let hash = self.order(*order)?;
                serde_json::to_value(engine.remove_liquidity(&ctx, &hash)?)?
            }
            Action::BookFees { order, fee0, fee1 } => {
                let hash = self.order(*order)?;
                serde_json::to_value(engine.book_fees(&ctx, &hash, *fee0, *fee1)?)?
            }
            Action::Cancel { order } => {
                let hash = self.order(*order)?;
                serde_json::to_value(engine.cancel(&ctx, &hash)?)?
            }
            Action::Expire { order } => {
                let hash = self.order(*order)?;
                serde_json::to_value(engine.expire(&ctx, &hash)?)?
            }
            Action::AttachLink {
                order,
                counterpart_order_hash,
                amount,
                hashlock,
                timelock,
            } => {
                let hash = self.order(*order)?;
                let link = CrossChainOrderLink::pending(
                    hash,
                    *counterpart_order_hash,
                    *amount,
                    *hashlock,
                    *timelock,
                );
                serde_json::to_value(engine.attach_link(&ctx, &hash, link)?)?
            }
            Action::UpdateLink {
                counterpart_order_hash,
                status,
            } => serde_json::to_value(engine.update_link_status(
                &ctx,
                counterpart_order_hash,
                *status,
            )?)?,
            Action::Execute { order, execution } => {
                let hash = self.order(*order)?;
                serde_json::to_value(engine.execute(&ctx, &hash, *execution)?)?
            }
            Action::Status { order } => {
                let hash = self.order(*order)?;
                serde_json::to_value(engine.get_order_status(&hash)?)?
            }
        };
        Ok(output)
    }

    fn order(&self, index: usize) -> Result<OrderHash> {
        self.orders.get(index).copied().ok_or_else(|| {
            EngineError::InvalidInput(format!(
                "scenario refers to order #{index}, but only {} orders were created",
                self.orders.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    const MAKER: &str = "0x1111111111111111111111111111111111111111";
    const TAKER: &str = "0x2222222222222222222222222222222222222222";

    fn scenario() -> Scenario {
        let json = format!(
            r#"{{ "steps": [
                {{ "at": 1000, "caller": "{MAKER}", "action": "create", "request": {{
                    "strategy": {{
                        "type": "twap",
                        "token_in": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                        "token_out": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
                        "total_amount": "1000",
                        "intervals": 10,
                        "interval_duration": 3600,
                        "min_price_per_token": "0.95",
                        "max_price_per_token": "1.05"
                    }}
                }} }},
                {{ "at": 2000, "caller": "{TAKER}", "action": "execute_interval",
                   "order": 0, "amount_out": "100" }},
                {{ "at": 4600, "caller": "{TAKER}", "action": "execute_interval",
                   "order": 0, "amount_out": "100" }},
                {{ "at": 4600, "caller": "{TAKER}", "action": "cancel", "order": 3 }},
                {{ "at": 4700, "caller": "{MAKER}", "action": "status", "order": 0 }}
            ] }}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_replay_records_every_step() {
        let engine = SettlementEngine::new(&EngineConfig::default());
        let report = Replayer::new(&engine).run(&scenario()).unwrap();

        assert_eq!(report.steps.len(), 5);
        assert_eq!(report.orders.len(), 1);
        assert!(report.steps[0].is_ok());
        // First interval is gated by the duration
        assert!(!report.steps[1].is_ok());
        assert!(report.steps[2].is_ok());
        // Unknown creation index
        assert!(!report.steps[3].is_ok());
        assert_eq!(report.failures(), 2);

        let status = report.steps[4].output.as_ref().unwrap();
        assert_eq!(status["executed_amount"], "100");
    }

    #[test]
    fn test_fail_fast_stops_at_first_error() {
        let engine = SettlementEngine::new(&EngineConfig::default());
        let result = Replayer::new(&engine).fail_fast(true).run(&scenario());
        assert!(matches!(
            result,
            Err(EngineError::Gating(crate::error::GatingError::IntervalNotElapsed { .. }))
        ));
    }
}
