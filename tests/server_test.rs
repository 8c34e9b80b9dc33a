//! Integration tests for [`CachingParameterServer`].
//!
//! Starts the server on a random loopback port with a scripted
//! [`ParameterStore`] and talks to it over real HTTP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use parameter_extension::{
    CacheConfig, CachingParameterServer, ExtensionError, ParameterCache, ParameterResponse,
    ParameterStore, Result, ServerConfig,
};

const PARAMETER: &str = "extension-parameter";

/// Store returning a swappable result and counting calls.
struct ScriptedStore {
    result: Mutex<std::result::Result<String, String>>,
    delay: Duration,
    call_count: AtomicU32,
}

impl ScriptedStore {
    fn ok(value: &str) -> Arc<Self> {
        Arc::new(Self::with(Ok(value.to_string()), Duration::ZERO))
    }

    fn err(message: &str) -> Arc<Self> {
        Arc::new(Self::with(Err(message.to_string()), Duration::ZERO))
    }

    fn slow(value: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::with(Ok(value.to_string()), delay))
    }

    fn with(result: std::result::Result<String, String>, delay: Duration) -> Self {
        Self {
            result: Mutex::new(result),
            delay,
            call_count: AtomicU32::new(0),
        }
    }

    fn set(&self, result: std::result::Result<&str, &str>) {
        *self.result.lock().unwrap() = result.map(str::to_string).map_err(str::to_string);
    }

    fn calls(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ParameterStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn get_parameter(&self, name: &str) -> Result<String> {
        assert_eq!(name, PARAMETER);
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result
            .lock()
            .unwrap()
            .clone()
            .map_err(ExtensionError::RemoteFetch)
    }
}

fn build_server(store: Arc<ScriptedStore>, ttl: Duration) -> CachingParameterServer {
    let cache = Arc::new(ParameterCache::new(&CacheConfig::new().ttl(ttl)));
    CachingParameterServer::new(ServerConfig::with_port(0), cache, store, PARAMETER)
}

struct Running {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl Running {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

async fn start(server: CachingParameterServer) -> Running {
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(server.serve(listener, shutdown.clone()));
    Running {
        addr,
        shutdown,
        task,
    }
}

async fn get(url: &str) -> (StatusCode, String, String) {
    let response = reqwest::get(url).await.unwrap();
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    (status, content_type, response.text().await.unwrap())
}

// =============================================================================
// Serving and caching
// =============================================================================

#[tokio::test]
async fn responds_with_parameter_value() {
    let store = ScriptedStore::ok("parameter-value");
    let running = start(build_server(store.clone(), Duration::from_secs(30))).await;

    let (status, content_type, body) = get(&running.url("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "application/json");
    assert_eq!(body, r#"{"body":"parameter-value"}"#);
    assert_eq!(store.calls(), 1);
    running.shutdown.cancel();
}

#[tokio::test]
async fn subsequent_requests_served_from_cache() {
    let store = ScriptedStore::ok("parameter-value");
    let running = start(build_server(store.clone(), Duration::from_secs(30))).await;

    for _ in 0..5 {
        let (status, content_type, body) = get(&running.url("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/json");
        assert_eq!(body, r#"{"body":"parameter-value"}"#);
    }

    assert_eq!(store.calls(), 1, "store should be called once within the TTL");
    running.shutdown.cancel();
}

#[tokio::test]
async fn expired_entry_triggers_one_more_fetch() {
    let store = ScriptedStore::ok("parameter-value");
    let running = start(build_server(store.clone(), Duration::from_millis(100))).await;

    get(&running.url("/")).await;
    get(&running.url("/")).await;
    assert_eq!(store.calls(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let (status, _, body) = get(&running.url("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"body":"parameter-value"}"#);
    assert_eq!(store.calls(), 2);

    // Re-cached after the refresh
    get(&running.url("/")).await;
    assert_eq!(store.calls(), 2);
    running.shutdown.cancel();
}

#[tokio::test]
async fn store_error_returns_500_and_is_not_cached() {
    let store = ScriptedStore::err("boom");
    let running = start(build_server(store.clone(), Duration::from_secs(30))).await;

    let (status, content_type, body) = get(&running.url("/")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(content_type, "application/json");
    assert_eq!(body, r#"{"body":"boom"}"#);

    store.set(Ok("ok"));

    let (status, _, body) = get(&running.url("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"body":"ok"}"#);
    assert_eq!(store.calls(), 2);
    running.shutdown.cancel();
}

#[tokio::test]
async fn server_keeps_serving_after_errors() {
    let store = ScriptedStore::err("throttled");
    let running = start(build_server(store.clone(), Duration::from_secs(30))).await;

    for _ in 0..3 {
        let (status, _, _) = get(&running.url("/")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
    assert_eq!(store.calls(), 3);
    assert!(!running.task.is_finished());
    running.shutdown.cancel();
}

#[tokio::test]
async fn any_get_path_is_answered() {
    let store = ScriptedStore::ok("parameter-value");
    let running = start(build_server(store.clone(), Duration::from_secs(30))).await;

    let (status, _, body) = get(&running.url("/some/other/path")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"body":"parameter-value"}"#);
    running.shutdown.cancel();
}

#[tokio::test]
async fn concurrent_misses_all_succeed() {
    let store = ScriptedStore::slow("parameter-value", Duration::from_millis(50));
    let running = start(build_server(store.clone(), Duration::from_secs(30))).await;

    let requests: Vec<_> = (0..8)
        .map(|_| {
            let url = running.url("/");
            tokio::spawn(async move { get(&url).await })
        })
        .collect();
    for request in requests {
        let (status, _, body) = request.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"body":"parameter-value"}"#);
    }

    // Racing misses may each fetch; afterwards the value is cached
    let fetched = store.calls();
    assert!((1..=8).contains(&fetched));
    get(&running.url("/")).await;
    assert_eq!(store.calls(), fetched);
    running.shutdown.cancel();
}

// =============================================================================
// Router (no network)
// =============================================================================

#[tokio::test]
async fn router_rejects_non_get() {
    let server = build_server(ScriptedStore::ok("v"), Duration::from_secs(30));

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn router_body_deserializes_to_parameter_response() {
    let server = build_server(ScriptedStore::ok("s3cr3t"), Duration::from_secs(30));

    let response = server
        .router()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: ParameterResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed.body, "s3cr3t");
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn shuts_down_promptly_when_idle() {
    let running = start(build_server(
        ScriptedStore::ok("v"),
        Duration::from_secs(30),
    ))
    .await;

    let start = Instant::now();
    running.shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), running.task)
        .await
        .expect("server should stop")
        .unwrap();

    assert!(result.is_ok());
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(tokio::net::TcpStream::connect(running.addr).await.is_err());
}

#[tokio::test]
async fn in_flight_request_completes_within_grace_period() {
    let store = ScriptedStore::slow("v", Duration::from_millis(40));
    let running = start(build_server(store.clone(), Duration::from_secs(30))).await;

    let url = running.url("/");
    let in_flight = tokio::spawn(async move { get(&url).await });

    while store.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    running.shutdown.cancel();

    let (status, _, body) = tokio::time::timeout(Duration::from_secs(2), in_flight)
        .await
        .expect("in-flight request should finish")
        .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"body":"v"}"#);

    let result = tokio::time::timeout(Duration::from_secs(2), running.task)
        .await
        .expect("server should stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn in_flight_request_bounded_by_grace_period() {
    let store = ScriptedStore::slow("v", Duration::from_secs(10));
    let running = start(build_server(store.clone(), Duration::from_secs(30))).await;

    let url = running.url("/");
    let _in_flight = tokio::spawn(async move { reqwest::get(url).await });

    // Wait until the request reached the store
    while store.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let start = Instant::now();
    running.shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), running.task)
        .await
        .expect("server should be force-closed after the grace period")
        .unwrap();

    // A grace timeout is logged, not returned
    assert!(result.is_ok());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn bind_conflict_is_server_bind_error() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let cache = Arc::new(ParameterCache::new(&CacheConfig::default()));
    let server = CachingParameterServer::new(
        ServerConfig::with_port(port),
        cache,
        ScriptedStore::ok("v"),
        PARAMETER,
    );

    let err = server.start(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ExtensionError::ServerBind { .. }));
    assert!(err.is_fatal());
}
