//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (blockchain RPC, HTTP clients, webhooks).
//! Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `chain`: contract log access via alloy-rs (WS or HTTP)
//! - `listing`: exchange listing snapshots over HTTP
//! - `notify`: Telegram bot alerts
//! - `metrics`: Prometheus metrics export and health checks

pub mod chain;
pub mod listing;
pub mod metrics;
pub mod notify;
