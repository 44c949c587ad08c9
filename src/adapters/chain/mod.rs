//! Chain Adapters - Contract Event Access Layer
//!
//! Provides on-chain access via alloy-rs 0.9 for:
//! - RPC connection management (stream preferred, HTTP fallback)
//! - Server-side log filters and manual range queries
//! - `AddToken` ABI and log decoding

pub mod abi;
pub mod connection;

pub use abi::{decode_add_token, AddToken, ADD_TOKEN_TOPIC};
pub use connection::{Endpoint, RpcConnection, RpcConnector};
