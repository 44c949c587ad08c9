//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `EventSource` / `Connector`: contract logs and connection management
//! - `ListingSource`: exchange listing snapshots
//! - `Notifier`: alert delivery

pub mod event_source;
pub mod listing_source;
pub mod notifier;

pub use event_source::{Connector, EventSource, TransportKind};
pub use listing_source::ListingSource;
pub use notifier::Notifier;
