//! Domain layer - Core detection logic and models.
//!
//! Pure state machines and data types for both monitors: backoff,
//! filter cursor/window math, snapshot diffing, decoded events, alerts
//! and the error taxonomy. No network I/O here.

pub mod alert;
pub mod backoff;
pub mod errors;
pub mod event;
pub mod filter;
pub mod listing;

// Re-export core types for convenience
pub use alert::{AlertKind, AlertMessage};
pub use backoff::Backoff;
pub use errors::{
    AnomalyError, ConnectionError, DecodeError, FetchError, FilterError, MonitorError,
    NotifyError, TickError,
};
pub use event::TokenAdded;
pub use filter::{BlockStart, Cursor, FilterId, FilterMode, LogQuery};
pub use listing::{AnomalyPolicy, ListingRecord, Snapshot, SnapshotDiffer};
