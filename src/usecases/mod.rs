//! Use Cases Layer - Monitor Workflows
//!
//! Orchestrates domain logic with port interfaces to implement the
//! sentinel's two monitors on one shared loop.
//!
//! Use cases:
//! - `Monitor`: generic tick / alert / backoff loop
//! - `EventFilterController`: PROBE / FILTER / POLL log fetching
//! - `EventWatcher`: on-chain AddToken detection
//! - `ListingWatcher`: exchange listing snapshot diffing

pub mod event_watch;
pub mod filter_controller;
pub mod listing_watch;
pub mod monitor;

pub use event_watch::EventWatcher;
pub use filter_controller::{EventFilterController, FilterTimings};
pub use listing_watch::ListingWatcher;
pub use monitor::{Monitor, Watcher};
