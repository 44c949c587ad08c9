//! Listing Adapters - Exchange Listing Snapshots
//!
//! Provides the reqwest-based fetcher for the exchange's full token
//! list endpoint.

pub mod http;

pub use http::HttpListingSource;
