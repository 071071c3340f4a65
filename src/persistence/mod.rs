//! Persistence for crash recovery: JSON snapshots of the ledger, escrow and
//! link registry, restorable through `SettlementEngine::restore`.

pub mod snapshot;

pub use snapshot::{LedgerSnapshot, MakerIndexEntry, SnapshotParts, SNAPSHOT_VERSION};
