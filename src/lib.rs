pub mod adapters;
pub mod cli;
pub mod config;
pub mod crosschain;
pub mod domain;
pub mod engine;
pub mod error;
pub mod escrow;
pub mod ledger;
pub mod persistence;
pub mod validation;

pub use adapters::{
    EventSink, RecordingEventSink, RecordingTransferSink, TracingEventSink, TracingTransferSink,
    TransferIntent, TransferKind, TransferSink,
};
pub use config::{EngineConfig, GridSplit, HashAlgorithm, OptionPayoutPolicy, PolicyConfig};
pub use crosschain::CrossChainRegistry;
pub use domain::{
    CreateOrder, CrossChainOrderLink, EngineEvent, EventKind, ExecutionStep, FixedPointAmount,
    LinkStatus, Order, OrderHash, OrderStatus, OrderStatusView, StrategyKind, StrategyRequest,
    StrategyState,
};
pub use engine::{Execution, ExecutionContext, ExecutionReceipt, SettlementEngine};
pub use error::{EngineError, ErrorKind, Result};
pub use escrow::{CollateralEscrow, EscrowEntry, EscrowOp};
pub use ledger::OrderLedger;
pub use persistence::LedgerSnapshot;
