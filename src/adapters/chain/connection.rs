//! RPC Connection Manager - alloy-rs 0.9 Connection Management
//!
//! Opens the upstream connection for the event monitor. A configured
//! WebSocket endpoint (persistent stream) wins over HTTP
//! (request/response). Each `connect()` builds a brand-new provider and
//! validates it with a chain-id query; a dead connection is dropped by
//! its owner and replaced, never repaired in place.
//!
//! `ProviderBuilder::on_builtin` picks the transport from the URL scheme
//! and returns a `RootProvider<BoxTransport>`, so both transports share
//! one concrete type.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, Log};
use alloy::transports::{BoxTransport, TransportError};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

use crate::config::RpcConfig;
use crate::domain::{ConnectionError, FetchError, FilterError, FilterId, LogQuery};
use crate::ports::{Connector, EventSource, TransportKind};

/// JSON-RPC "method not found".
const METHOD_NOT_FOUND: i64 = -32601;

/// Selected upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Transport implied by the URL.
    pub kind: TransportKind,
    /// Endpoint URL.
    pub url: String,
}

impl Endpoint {
    /// WebSocket when configured, otherwise HTTP.
    pub fn select(rpc: &RpcConfig) -> Self {
        match rpc.ws_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(ws) => Self {
                kind: TransportKind::Stream,
                url: ws.to_string(),
            },
            None => Self {
                kind: TransportKind::RequestResponse,
                url: rpc.http_url.trim().to_string(),
            },
        }
    }
}

/// Connection Manager for the event monitor.
#[derive(Debug, Clone)]
pub struct RpcConnector {
    endpoint: Endpoint,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl RpcConnector {
    /// Build from the RPC section of the config.
    pub fn new(rpc: &RpcConfig) -> Self {
        Self {
            endpoint: Endpoint::select(rpc),
            connect_timeout: rpc.connect_timeout(),
            request_timeout: rpc.request_timeout(),
        }
    }

    /// Endpoint this connector dials.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl Connector for RpcConnector {
    #[instrument(skip(self), fields(transport = self.endpoint.kind.label()))]
    async fn connect(&self) -> Result<Arc<dyn EventSource>, ConnectionError> {
        let connection =
            RpcConnection::open(&self.endpoint, self.connect_timeout, self.request_timeout)
                .await?;
        Ok(Arc::new(connection))
    }
}

/// One live upstream connection.
pub struct RpcConnection {
    provider: RootProvider<BoxTransport>,
    kind: TransportKind,
    request_timeout: Duration,
}

impl RpcConnection {
    /// Dial `endpoint` and confirm it answers a chain-id query.
    pub async fn open(
        endpoint: &Endpoint,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let provider: RootProvider<BoxTransport> =
            timeout(connect_timeout, ProviderBuilder::new().on_builtin(&endpoint.url))
                .await
                .map_err(|_| ConnectionError::Timeout(connect_timeout))?
                .map_err(|e| connection_error(&e))?;

        let chain_id = timeout(connect_timeout, async { provider.get_chain_id().await })
            .await
            .map_err(|_| ConnectionError::Timeout(connect_timeout))?
            .map_err(|e| connection_error(&e))?;

        info!(chain_id, transport = endpoint.kind.label(), "Connected to RPC");

        Ok(Self {
            provider,
            kind: endpoint.kind,
            request_timeout,
        })
    }
}

#[async_trait]
impl EventSource for RpcConnection {
    fn transport(&self) -> TransportKind {
        self.kind
    }

    async fn head(&self) -> Result<u64, FetchError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| fetch_error(&e))
    }

    #[instrument(skip(self, query))]
    async fn install_filter(
        &self,
        query: &LogQuery,
        from_block: u64,
    ) -> Result<FilterId, FilterError> {
        let filter = build_filter(query).from_block(from_block);
        let id = self
            .provider
            .new_filter(&filter)
            .await
            .map_err(|e| install_error(&e))?;
        debug!(filter_id = %id, "Log filter registered");
        Ok(id)
    }

    async fn filter_changes(&self, id: FilterId) -> Result<Vec<Log>, FilterError> {
        self.provider
            .get_filter_changes::<Log>(id)
            .await
            .map_err(|e| changes_error(&e))
    }

    async fn uninstall_filter(&self, id: FilterId) -> Result<bool, FilterError> {
        self.provider
            .uninstall_filter(id)
            .await
            .map_err(|e| changes_error(&e))
    }

    async fn logs_in_range(
        &self,
        query: &LogQuery,
        range: RangeInclusive<u64>,
    ) -> Result<Vec<Log>, FetchError> {
        let filter = build_filter(query)
            .from_block(*range.start())
            .to_block(*range.end());
        self.provider
            .get_logs(&filter)
            .await
            .map_err(|e| fetch_error(&e))
    }

    async fn is_live(&self) -> bool {
        matches!(
            timeout(self.request_timeout, async { self.provider.get_block_number().await }).await,
            Ok(Ok(_))
        )
    }
}

/// Address + topic0 (+ topic2 constraint) filter without a block range.
pub fn build_filter(query: &LogQuery) -> Filter {
    let filter = Filter::new()
        .address(query.contract)
        .event_signature(query.signature);
    match query.constraint_topic() {
        Some(topic) => filter.topic2(topic),
        None => filter,
    }
}

fn connection_error(err: &TransportError) -> ConnectionError {
    match err.as_error_resp() {
        Some(payload) => ConnectionError::Rejected(payload.message.to_string()),
        None => ConnectionError::Unreachable(err.to_string()),
    }
}

fn fetch_error(err: &TransportError) -> FetchError {
    match err {
        TransportError::DeserError { .. } => FetchError::Malformed(err.to_string()),
        _ => FetchError::Transport(err.to_string()),
    }
}

/// Classify an `eth_newFilter` failure. Any RPC-level refusal other than
/// rate limiting means filters are not usable on this upstream.
fn install_error(err: &TransportError) -> FilterError {
    match err.as_error_resp() {
        Some(payload) if is_rate_limit(payload.code, &payload.message) => {
            FilterError::Fetch(FetchError::Transport(payload.message.to_string()))
        }
        Some(payload) => FilterError::Unsupported(payload.message.to_string()),
        None => FilterError::Fetch(fetch_error(err)),
    }
}

/// Classify an `eth_getFilterChanges` failure.
fn changes_error(err: &TransportError) -> FilterError {
    let Some(payload) = err.as_error_resp() else {
        return FilterError::Fetch(fetch_error(err));
    };
    classify_changes_response(payload.code, &payload.message)
}

fn classify_changes_response(code: i64, message: &str) -> FilterError {
    let lower = message.to_ascii_lowercase();
    if code == METHOD_NOT_FOUND || lower.contains("not supported") || lower.contains("unsupported")
    {
        FilterError::Unsupported(message.to_string())
    } else if lower.contains("not found") || lower.contains("unknown") || lower.contains("expired")
    {
        FilterError::Expired
    } else {
        FilterError::Fetch(FetchError::Transport(message.to_string()))
    }
}

fn is_rate_limit(code: i64, message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    code == 429 || code == -32005 || lower.contains("rate limit") || lower.contains("too many")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, B256};

    #[test]
    fn test_ws_endpoint_preferred() {
        let mut rpc = RpcConfig::default();
        assert_eq!(Endpoint::select(&rpc).kind, TransportKind::RequestResponse);

        rpc.ws_url = Some("  ".to_string());
        assert_eq!(Endpoint::select(&rpc).kind, TransportKind::RequestResponse);

        rpc.ws_url = Some("wss://bsc.example/ws".to_string());
        let endpoint = Endpoint::select(&rpc);
        assert_eq!(endpoint.kind, TransportKind::Stream);
        assert_eq!(endpoint.url, "wss://bsc.example/ws");
    }

    #[test]
    fn test_changes_errors_classified() {
        assert_eq!(
            classify_changes_response(-32000, "filter not found"),
            FilterError::Expired
        );
        assert!(matches!(
            classify_changes_response(METHOD_NOT_FOUND, "the method eth_getFilterChanges does not exist"),
            FilterError::Unsupported(_)
        ));
        assert!(matches!(
            classify_changes_response(-32005, "limit exceeded"),
            FilterError::Fetch(_)
        ));
    }

    #[test]
    fn test_filter_carries_constraint_in_topic2() {
        let feed = address!("2222222222222222222222222222222222222222");
        let query = LogQuery {
            contract: address!("128463a60784c4d3f46c23af3f65ed859ba87974"),
            signature: B256::with_last_byte(1),
            constraint: Some(feed),
        };
        let filter = build_filter(&query);
        assert!(filter.topics[2].matches(&feed.into_word()));
        assert!(filter.topics[1].is_empty());
        assert!(filter.topics[0].matches(&B256::with_last_byte(1)));
    }
}
