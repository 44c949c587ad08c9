//! Integration Tests - End-to-end Monitor Component Testing
//!
//! Tests the interaction between usecases, ports, and mock adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{address, Address, Bytes, LogData, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use chrono::Utc;
use mockall::mock;
use tokio::sync::broadcast;

use listing_sentinel::adapters::chain::{AddToken, ADD_TOKEN_TOPIC};
use listing_sentinel::domain::{
    AlertKind, AlertMessage, AnomalyPolicy, Backoff, BlockStart, ConnectionError, FetchError,
    FilterError, FilterId, FilterMode, ListingRecord, LogQuery, MonitorError, NotifyError,
    Snapshot, SnapshotDiffer,
};
use listing_sentinel::ports::{EventSource, TransportKind};
use listing_sentinel::usecases::{
    EventFilterController, EventWatcher, FilterTimings, ListingWatcher, Monitor,
};

// ---- Mock Definitions ----

mock! {
    pub Notify {}

    #[async_trait::async_trait]
    impl listing_sentinel::ports::Notifier for Notify {
        async fn notify(&self, alert: &AlertMessage) -> Result<(), NotifyError>;
    }
}

mock! {
    pub Listing {}

    #[async_trait::async_trait]
    impl listing_sentinel::ports::ListingSource for Listing {
        async fn fetch(&self) -> Result<Snapshot, FetchError>;
    }
}

mock! {
    pub Source {}

    #[async_trait::async_trait]
    impl listing_sentinel::ports::EventSource for Source {
        fn transport(&self) -> TransportKind;
        async fn head(&self) -> Result<u64, FetchError>;
        async fn install_filter(&self, query: &LogQuery, from_block: u64)
            -> Result<FilterId, FilterError>;
        async fn filter_changes(&self, id: FilterId) -> Result<Vec<Log>, FilterError>;
        async fn uninstall_filter(&self, id: FilterId) -> Result<bool, FilterError>;
        async fn logs_in_range(&self, query: &LogQuery, range: RangeInclusive<u64>)
            -> Result<Vec<Log>, FetchError>;
        async fn is_live(&self) -> bool;
    }
}

mock! {
    pub Connect {}

    #[async_trait::async_trait]
    impl listing_sentinel::ports::Connector for Connect {
        async fn connect(&self) -> Result<Arc<dyn EventSource>, ConnectionError>;
    }
}

// ---- Helpers ----

const CONTRACT: Address = address!("128463a60784c4d3f46c23af3f65ed859ba87974");

fn snapshot(symbols: &[&str]) -> Snapshot {
    Snapshot::new(symbols.iter().map(|s| ListingRecord::bare(*s)), Utc::now())
}

fn numbered(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i}")).collect()
}

/// Listing source that replays a fixed sequence, then repeats the last one.
fn scripted_listing(script: Vec<Result<Snapshot, FetchError>>) -> MockListing {
    let queue = Mutex::new(VecDeque::from(script));
    let last = Mutex::new(None::<Result<Snapshot, FetchError>>);
    let mut source = MockListing::new();
    source.expect_fetch().returning(move || {
        let next = queue.lock().unwrap().pop_front();
        match next {
            Some(result) => {
                *last.lock().unwrap() = Some(result.clone());
                result
            }
            None => last.lock().unwrap().clone().unwrap(),
        }
    });
    source
}

fn listing_monitor(
    source: MockListing,
    notifier: MockNotify,
    policy: AnomalyPolicy,
) -> Monitor<ListingWatcher> {
    let watcher = ListingWatcher::new(
        Arc::new(source),
        SnapshotDiffer::default(),
        "Binance Alpha new listing",
        "chat-1",
        Duration::from_secs(10),
    );
    Monitor::new(
        watcher,
        Arc::new(notifier),
        Backoff::default(),
        Duration::from_millis(150),
    )
    .with_policy(policy)
}

fn add_token_log(block: u64, currency_byte: u8) -> Log {
    let event = AddToken {
        currency: Address::with_last_byte(currency_byte),
        priceFeed: Address::with_last_byte(0xfe),
        fixedPrice: false,
    };
    Log {
        inner: alloy::primitives::Log {
            address: CONTRACT,
            data: event.encode_log_data(),
        },
        block_number: Some(block),
        transaction_hash: Some(B256::with_last_byte(currency_byte)),
        ..Default::default()
    }
}

fn garbage_log(block: u64) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: CONTRACT,
            data: LogData::new_unchecked(vec![ADD_TOKEN_TOPIC], Bytes::new()),
        },
        block_number: Some(block),
        transaction_hash: Some(B256::with_last_byte(0xaa)),
        ..Default::default()
    }
}

fn event_watcher(connector: MockConnect, start: BlockStart) -> EventWatcher {
    let query = LogQuery {
        contract: CONTRACT,
        signature: ADD_TOKEN_TOPIC,
        constraint: None,
    };
    let controller = EventFilterController::new(
        query,
        start,
        FilterTimings {
            probe_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
            max_span: 50,
        },
    );
    EventWatcher::new(Arc::new(connector), controller, "Aster AddToken event", "chat-1")
}

fn event_monitor(watcher: EventWatcher, notifier: MockNotify) -> Monitor<EventWatcher> {
    Monitor::new(
        watcher,
        Arc::new(notifier),
        Backoff::default(),
        Duration::from_secs(1),
    )
}

/// Connector that hands out the given sources in order.
fn connector_for(sources: Vec<MockSource>) -> MockConnect {
    let queue: Mutex<VecDeque<Arc<dyn EventSource>>> = Mutex::new(
        sources
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn EventSource>)
            .collect(),
    );
    let mut connector = MockConnect::new();
    connector.expect_connect().returning(move || {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ConnectionError::Unreachable("no more sources".into()))
    });
    connector
}

// ---- Listing Monitor ----

#[tokio::test]
async fn test_new_listing_alerted_once() {
    let source = scripted_listing(vec![
        Ok(snapshot(&["BTC", "ETH"])),
        Ok(snapshot(&["BTC", "ETH", "NEW"])),
        Ok(snapshot(&["BTC", "ETH", "NEW"])),
    ]);
    let mut notifier = MockNotify::new();
    notifier
        .expect_notify()
        .withf(|alert| {
            alert.kind == AlertKind::ListingNewToken
                && alert.field("symbol") == Some("NEW")
                && alert.destination == "chat-1"
        })
        .times(1)
        .returning(|_| Ok(()));

    let mut monitor = listing_monitor(source, notifier, AnomalyPolicy::Abort);
    for _ in 0..3 {
        assert_eq!(monitor.step().await.unwrap(), Duration::from_millis(150));
    }
}

#[tokio::test]
async fn test_anomaly_aborts_without_alerts() {
    let baseline: Vec<String> = numbered("OLD", 5);
    let mut flood = baseline.clone();
    flood.extend(numbered("NEW", 11));
    let as_refs = |v: &[String]| Snapshot::new(v.iter().map(|s| ListingRecord::bare(s.as_str())), Utc::now());

    let source = scripted_listing(vec![Ok(as_refs(&baseline[..])), Ok(as_refs(&flood[..]))]);
    let mut notifier = MockNotify::new();
    notifier.expect_notify().never();

    let mut monitor = listing_monitor(source, notifier, AnomalyPolicy::Abort);
    monitor.step().await.unwrap();
    let err = monitor.step().await.unwrap_err();

    let MonitorError::Anomaly { monitor: name, source } = err;
    assert_eq!(name, "listings");
    assert_eq!(source.count, 11);
    assert_eq!(source.threshold, 10);
}

#[tokio::test]
async fn test_ten_new_listings_are_not_an_anomaly() {
    let mut grown = vec!["BASE".to_string()];
    grown.extend(numbered("NEW", 10));
    let source = scripted_listing(vec![
        Ok(snapshot(&["BASE"])),
        Ok(Snapshot::new(grown.iter().map(|s| ListingRecord::bare(s.as_str())), Utc::now())),
    ]);
    let mut notifier = MockNotify::new();
    notifier.expect_notify().times(10).returning(|_| Ok(()));

    let mut monitor = listing_monitor(source, notifier, AnomalyPolicy::Abort);
    monitor.step().await.unwrap();
    monitor.step().await.unwrap();
}

#[tokio::test]
async fn test_suppressed_anomaly_keeps_running() {
    let mut flood = vec!["BASE".to_string()];
    flood.extend(numbered("NEW", 20));
    let source = scripted_listing(vec![
        Ok(snapshot(&["BASE"])),
        Ok(Snapshot::new(flood.iter().map(|s| ListingRecord::bare(s.as_str())), Utc::now())),
        Ok(snapshot(&["BASE", "ONE"])),
    ]);
    let mut notifier = MockNotify::new();
    notifier
        .expect_notify()
        .withf(|alert| alert.field("symbol") == Some("ONE"))
        .times(1)
        .returning(|_| Ok(()));

    let mut monitor = listing_monitor(source, notifier, AnomalyPolicy::Suppress);
    for _ in 0..3 {
        assert!(monitor.step().await.is_ok());
    }
    assert_eq!(monitor.watcher().differ().baseline().map(Snapshot::len), Some(1));
}

#[tokio::test]
async fn test_listing_after_suppressed_flood_is_alerted() {
    let base = numbered("S", 350);
    let mut flooded = base.clone();
    flooded.extend(numbered("F", 11));
    let mut genuine = flooded.clone();
    genuine.push("GENUINE".to_string());
    let of = |v: &[String]| Snapshot::new(v.iter().map(|s| ListingRecord::bare(s.as_str())), Utc::now());

    let mut script = vec![Ok(of(&base[..]))];
    script.extend((0..5).map(|_| Ok(of(&flooded[..]))));
    script.push(Ok(of(&genuine[..])));
    let source = scripted_listing(script);

    let mut notifier = MockNotify::new();
    notifier
        .expect_notify()
        .withf(|alert| alert.field("symbol") == Some("GENUINE"))
        .times(1)
        .returning(|_| Ok(()));

    let mut monitor = listing_monitor(source, notifier, AnomalyPolicy::Suppress);
    for _ in 0..7 {
        assert_eq!(monitor.step().await.unwrap(), Duration::from_millis(150));
    }
    assert_eq!(monitor.watcher().differ().baseline().map(Snapshot::len), Some(362));
}

#[tokio::test]
async fn test_notifier_failure_does_not_stop_monitor() {
    let source = scripted_listing(vec![
        Ok(snapshot(&["A"])),
        Ok(snapshot(&["A", "B", "C"])),
    ]);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut notifier = MockNotify::new();
    notifier.expect_notify().returning(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Timeout(Duration::from_secs(5)))
    });

    let mut monitor = listing_monitor(source, notifier, AnomalyPolicy::Abort);
    monitor.step().await.unwrap();
    assert_eq!(monitor.step().await.unwrap(), Duration::from_millis(150));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(monitor.backoff().failures(), 0);
}

#[tokio::test]
async fn test_fetch_failures_back_off_and_recover() {
    let source = scripted_listing(vec![
        Err(FetchError::Status(502)),
        Err(FetchError::Timeout(Duration::from_secs(5))),
        Err(FetchError::Malformed("eof".into())),
        Ok(snapshot(&["A"])),
    ]);
    let mut notifier = MockNotify::new();
    notifier.expect_notify().never();

    let mut monitor = listing_monitor(source, notifier, AnomalyPolicy::Abort);
    let pauses: Vec<Duration> = [
        monitor.step().await.unwrap(),
        monitor.step().await.unwrap(),
        monitor.step().await.unwrap(),
        monitor.step().await.unwrap(),
    ]
    .to_vec();

    assert_eq!(
        pauses,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_millis(150),
        ]
    );
    assert!(monitor.watcher().differ().baseline().is_some());
}

#[tokio::test]
async fn test_large_snapshot_replaces_baseline() {
    let mut big = numbered("T", 300);
    big.push("EXTRA".to_string());
    let big_snapshot =
        Snapshot::new(big.iter().map(|s| ListingRecord::bare(s.as_str())), Utc::now());
    let source = scripted_listing(vec![
        Ok(Snapshot::new(
            numbered("T", 300).into_iter().map(ListingRecord::bare),
            Utc::now(),
        )),
        Ok(big_snapshot),
    ]);
    let mut notifier = MockNotify::new();
    notifier.expect_notify().times(1).returning(|_| Ok(()));

    let mut monitor = listing_monitor(source, notifier, AnomalyPolicy::Abort);
    monitor.step().await.unwrap();
    monitor.step().await.unwrap();

    let baseline = monitor.watcher().differ().baseline().unwrap();
    assert_eq!(baseline.len(), 301);
    assert!(baseline.contains("EXTRA"));
}

#[tokio::test(start_paused = true)]
async fn test_listing_monitor_runs_until_shutdown() {
    let source = scripted_listing(vec![Ok(snapshot(&["A"]))]);
    let mut notifier = MockNotify::new();
    notifier.expect_notify().never();
    let monitor = listing_monitor(source, notifier, AnomalyPolicy::Abort);

    let (tx, rx) = broadcast::channel(1);
    let handle = tokio::spawn(monitor.run(rx));
    tokio::time::sleep(Duration::from_secs(2)).await;
    tx.send(()).unwrap();

    assert_eq!(handle.await.unwrap(), Ok(()));
}

// ---- Event Monitor ----

#[tokio::test]
async fn test_poll_fallback_clamps_window_and_skips_bad_log() {
    let mut source = MockSource::new();
    source
        .expect_transport()
        .return_const(TransportKind::RequestResponse);
    source
        .expect_install_filter()
        .withf(|_, from| *from == 900)
        .times(1)
        .returning(|_, _| Err(FilterError::Unsupported("eth_newFilter not available".into())));
    source.expect_head().returning(|| Ok(1000));
    source
        .expect_logs_in_range()
        .withf(|query, range| query.signature == ADD_TOKEN_TOPIC && *range == (950..=1000))
        .times(1)
        .returning(|_, _| Ok(vec![add_token_log(960, 1), garbage_log(970), add_token_log(980, 2)]));

    let mut notifier = MockNotify::new();
    notifier
        .expect_notify()
        .withf(|alert| alert.kind == AlertKind::EventNewToken)
        .times(2)
        .returning(|_| Ok(()));

    let watcher = event_watcher(connector_for(vec![source]), BlockStart::Number(900));
    let mut monitor = event_monitor(watcher, notifier);

    assert_eq!(monitor.step().await.unwrap(), Duration::from_secs(1));
    assert_eq!(monitor.watcher().controller().mode(), FilterMode::Poll);
    assert_eq!(monitor.watcher().controller().cursor(), Some(1001));
}

#[tokio::test]
async fn test_filter_mode_delivers_changes() {
    let mut source = MockSource::new();
    source.expect_transport().return_const(TransportKind::Stream);
    source.expect_head().times(1).returning(|| Ok(500));
    source
        .expect_install_filter()
        .withf(|_, from| *from == 500)
        .times(1)
        .returning(|_, _| Ok(U256::from(42)));
    let reads = AtomicUsize::new(0);
    source
        .expect_filter_changes()
        .withf(|id| *id == U256::from(42))
        .returning(move |_| match reads.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(Vec::new()),
            _ => Ok(vec![add_token_log(505, 7)]),
        });
    source.expect_logs_in_range().never();

    let mut notifier = MockNotify::new();
    notifier
        .expect_notify()
        .withf(|alert| alert.field("block") == Some("505"))
        .times(1)
        .returning(|_| Ok(()));

    let watcher = event_watcher(connector_for(vec![source]), BlockStart::Latest);
    let mut monitor = event_monitor(watcher, notifier);

    monitor.step().await.unwrap();
    assert_eq!(
        monitor.watcher().controller().mode(),
        FilterMode::Filter(U256::from(42))
    );
    monitor.step().await.unwrap();
    assert_eq!(monitor.watcher().controller().cursor(), Some(506));
}

#[tokio::test]
async fn test_dead_connection_reconnects_and_reprobes() {
    let mut first = MockSource::new();
    first
        .expect_transport()
        .return_const(TransportKind::RequestResponse);
    first
        .expect_install_filter()
        .times(1)
        .returning(|_, _| Err(FilterError::Unsupported("no filters".into())));
    let heads = AtomicUsize::new(0);
    first.expect_head().returning(move || {
        Ok(if heads.fetch_add(1, Ordering::SeqCst) == 0 { 1000 } else { 1005 })
    });
    let polls = AtomicUsize::new(0);
    first.expect_logs_in_range().returning(move |_, _| {
        if polls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(Vec::new())
        } else {
            Err(FetchError::Transport("connection reset".into()))
        }
    });
    first.expect_is_live().times(1).return_const(false);

    let mut second = MockSource::new();
    second.expect_transport().return_const(TransportKind::RequestResponse);
    second
        .expect_install_filter()
        .withf(|_, from| *from == 1001)
        .times(1)
        .returning(|_, _| Ok(U256::from(1)));
    second
        .expect_filter_changes()
        .returning(|_| Ok(Vec::new()));

    let mut notifier = MockNotify::new();
    notifier.expect_notify().never();

    let watcher = event_watcher(connector_for(vec![first, second]), BlockStart::Number(990));
    let mut monitor = event_monitor(watcher, notifier);

    // Session 1: probe rejected, poll 990..=1000
    assert_eq!(monitor.step().await.unwrap(), Duration::from_secs(1));
    assert_eq!(monitor.watcher().controller().mode(), FilterMode::Poll);

    // Poll fails, liveness check fails, connection dropped
    assert_eq!(monitor.step().await.unwrap(), Duration::from_secs(1));
    assert!(!monitor.watcher().is_connected());
    assert_eq!(monitor.backoff().failures(), 1);

    // Session 2: fresh connection probes again from the carried cursor
    monitor.step().await.unwrap();
    assert_eq!(
        monitor.watcher().controller().mode(),
        FilterMode::Filter(U256::from(1))
    );
    assert_eq!(monitor.backoff().failures(), 0);
}

#[tokio::test]
async fn test_live_connection_kept_after_fetch_error() {
    let mut source = MockSource::new();
    source
        .expect_transport()
        .return_const(TransportKind::RequestResponse);
    source
        .expect_install_filter()
        .returning(|_, _| Err(FilterError::Fetch(FetchError::Status(429))));
    source.expect_is_live().return_const(true);

    let mut notifier = MockNotify::new();
    notifier.expect_notify().never();

    let watcher = event_watcher(connector_for(vec![source]), BlockStart::Number(1));
    let mut monitor = event_monitor(watcher, notifier);

    assert_eq!(monitor.step().await.unwrap(), Duration::from_secs(1));
    assert_eq!(monitor.step().await.unwrap(), Duration::from_secs(2));
    assert!(monitor.watcher().is_connected());
    assert_eq!(monitor.watcher().controller().mode(), FilterMode::Probe);
}

#[tokio::test]
async fn test_connection_failure_backs_off() {
    let mut connector = MockConnect::new();
    connector
        .expect_connect()
        .times(3)
        .returning(|| Err(ConnectionError::Timeout(Duration::from_secs(10))));

    let mut notifier = MockNotify::new();
    notifier.expect_notify().never();

    let watcher = event_watcher(connector, BlockStart::Latest);
    let mut monitor = event_monitor(watcher, notifier);

    let pauses = [
        monitor.step().await.unwrap(),
        monitor.step().await.unwrap(),
        monitor.step().await.unwrap(),
    ];
    assert_eq!(
        pauses,
        [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert!(!monitor.watcher().is_connected());
}
