//! Listing HTTP Client - Full Token List Fetcher
//!
//! GETs the exchange's published token list (`{"data": [...]}`) and
//! turns it into an immutable `Snapshot`. Transport failures, non-2xx
//! statuses and undecodable bodies are all `FetchError`s; nothing is
//! ever reported as an empty list.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument};

use crate::domain::{FetchError, ListingRecord, Snapshot};
use crate::ports::ListingSource;

/// Raw listing response envelope.
#[derive(Debug, Deserialize)]
struct ListingResponse {
    /// Listed tokens. Error envelopes carry no `data` and fail to parse.
    data: Vec<RawListing>,
}

/// Raw listing entry. Only `symbol` is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListing {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    chain_id: Option<String>,
    #[serde(default)]
    contract_address: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl From<RawListing> for ListingRecord {
    fn from(raw: RawListing) -> Self {
        Self {
            symbol: raw.symbol,
            name: raw.name,
            chain_id: raw.chain_id,
            contract_address: raw.contract_address,
            extra: raw.extra,
        }
    }
}

/// `chainId` is published as either `"56"` or `56`.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Parse a listing body into a snapshot stamped now.
pub fn parse_listing(body: &[u8]) -> Result<Snapshot, FetchError> {
    let response: ListingResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    let records = response.data.into_iter().map(ListingRecord::from);
    Ok(Snapshot::new(records, Utc::now()))
}

/// Reqwest-backed listing source.
pub struct HttpListingSource {
    /// Underlying HTTP client.
    http: Client,
    /// Listing endpoint.
    url: String,
    /// Request deadline.
    timeout: Duration,
}

impl HttpListingSource {
    /// Create a listing client with a bounded request timeout.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            url: url.to_string(),
            timeout,
        })
    }

    fn request_error(&self, err: &reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.request_error(&e))?;
        let snapshot = parse_listing(&body)?;
        debug!(entries = snapshot.len(), "Listing snapshot fetched");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_records_and_keeps_extra_fields() {
        let body = br#"{
            "code": "000000",
            "data": [
                {"symbol": "AAA", "name": "Alpha", "chainId": "56", "contractAddress": "0xabc", "decimals": 18},
                {"symbol": "BBB", "chainId": 1}
            ]
        }"#;
        let snapshot = parse_listing(body).expect("valid body");
        assert_eq!(snapshot.len(), 2);

        let a = snapshot.get("AAA").expect("AAA present");
        assert_eq!(a.name.as_deref(), Some("Alpha"));
        assert_eq!(a.chain_id.as_deref(), Some("56"));
        assert_eq!(a.contract_address.as_deref(), Some("0xabc"));
        assert_eq!(a.extra.get("decimals"), Some(&serde_json::json!(18)));

        let b = snapshot.get("BBB").expect("BBB present");
        assert_eq!(b.chain_id.as_deref(), Some("1"));
        assert!(b.name.is_none());
    }

    #[test]
    fn test_error_envelope_is_malformed() {
        let body = br#"{"code": "100001", "message": "busy"}"#;
        assert!(matches!(parse_listing(body), Err(FetchError::Malformed(_))));
        assert!(matches!(
            parse_listing(br#"{"code": "000000", "data": null}"#),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn test_explicit_empty_list_is_empty_snapshot() {
        let snapshot = parse_listing(br#"{"data": []}"#).expect("valid body");
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(parse_listing(b"<html>"), Err(FetchError::Malformed(_))));
        assert!(matches!(
            parse_listing(br#"{"data": [{"name": "no symbol"}]}"#),
            Err(FetchError::Malformed(_))
        ));
    }
}
