//! End-to-end orchestrator behaviour against a scripted in-memory transport.
//!
//! All tests run on paused tokio time, so throttle pauses and retry backoff
//! resolve instantly while still being measured in virtual time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, HeaderValue, USER_AGENT};
use http::HeaderMap;
use prizepicks_proxy::{
    FetchClient, FetchError, FetchOptions, HttpTransport, RequestAttempt, TransportError,
    TransportResponse,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

type Scripted = Result<(u16, &'static str), TransportError>;

#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    repeat_last: Mutex<Option<Scripted>>,
    seen: Mutex<Vec<RequestAttempt>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    /// Replays `response` for every call once the script runs dry.
    fn repeating(response: Scripted) -> Arc<Self> {
        Arc::new(Self {
            repeat_last: Mutex::new(Some(response)),
            ..Self::default()
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn requests(&self) -> Vec<RequestAttempt> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: &RequestAttempt) -> Result<TransportResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat_last.lock().unwrap().clone())
            .unwrap_or(Ok((200, r#"{"data":[]}"#)));

        next.map(|(status, body)| TransportResponse {
            status,
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
            url: request.url.clone(),
        })
    }
}

fn client(transport: Arc<ScriptedTransport>) -> FetchClient {
    FetchClient::builder()
        .with_seed(7)
        .with_throttle(Duration::ZERO, Duration::ZERO)
        .with_transport(transport)
        .build()
        .unwrap()
}

const LEAGUES: &str = "https://api.prizepicks.com/leagues";

#[tokio::test(start_paused = true)]
async fn cached_payload_served_until_ttl_expires() {
    let transport = ScriptedTransport::new(vec![
        Ok((200, r#"{"data":[{"id":"7"}]}"#)),
        Ok((200, r#"{"data":[{"id":"9"}]}"#)),
    ]);
    let client = client(transport.clone());
    let options = FetchOptions::new().with_cache(Some(Duration::from_secs(60)));

    let first = client.fetch(LEAGUES, &options).await.unwrap();
    assert!(!first.is_cached());
    assert_eq!(first.json(), &json!({"data":[{"id":"7"}]}));

    tokio::time::advance(Duration::from_secs(30)).await;
    let second = client.fetch(LEAGUES, &options).await.unwrap();
    assert!(second.is_cached());
    assert_eq!(second.json(), first.json());
    assert_eq!(transport.calls(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    let third = client.fetch(LEAGUES, &options).await.unwrap();
    assert!(!third.is_cached());
    assert_eq!(third.json(), &json!({"data":[{"id":"9"}]}));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn uncached_calls_always_hit_network() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(transport.clone());

    client.fetch(LEAGUES, &FetchOptions::new()).await.unwrap();
    client.fetch(LEAGUES, &FetchOptions::new()).await.unwrap();
    assert_eq!(transport.calls(), 2);
    assert!(client.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn query_parameters_split_cache_entries() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(transport.clone());
    let url = "https://api.prizepicks.com/projections";

    let nba = FetchOptions::new().with_query("league_id", "7").with_cache(None);
    let nfl = FetchOptions::new().with_query("league_id", "9").with_cache(None);

    client.fetch(url, &nba).await.unwrap();
    client.fetch(url, &nfl).await.unwrap();
    client.fetch(url, &nba).await.unwrap();

    assert_eq!(transport.calls(), 2);
    assert_eq!(
        transport.requests()[1].url.as_str(),
        "https://api.prizepicks.com/projections?league_id=9"
    );
}

#[tokio::test(start_paused = true)]
async fn rate_limit_exhausts_retry_budget() {
    let transport = ScriptedTransport::repeating(Ok((429, "")));
    let client = client(transport.clone());

    let started = tokio::time::Instant::now();
    let err = client.fetch(LEAGUES, &FetchOptions::new()).await.unwrap_err();

    assert!(matches!(err, FetchError::RateLimited));
    assert_eq!(err.status_code(), Some(429));
    assert_eq!(transport.calls(), 4);
    // three backoffs of 2..=5s each
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6), "{elapsed:?}");
    assert!(elapsed <= Duration::from_secs(15), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn retry_forces_fresh_identity() {
    let transport = ScriptedTransport::new(vec![Ok((429, "")), Ok((200, r#"{"ok":true}"#))]);
    let client = FetchClient::builder()
        .with_seed(11)
        .with_throttle(Duration::ZERO, Duration::ZERO)
        .with_proxies(["http://10.0.0.1:8080"])
        .with_transport(transport.clone())
        .build()
        .unwrap();

    let options = FetchOptions::new().with_identity_rotation(false);
    let response = client.fetch(LEAGUES, &options).await.unwrap();
    assert_eq!(response.json(), &json!({"ok": true}));

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].headers.get(USER_AGENT).is_none());
    assert!(requests[0].proxy.is_none());
    assert!(requests[1].headers.get(USER_AGENT).is_some());
    assert_eq!(
        requests[1].proxy.as_ref().map(|p| p.endpoint()),
        Some("http://10.0.0.1:8080".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn client_errors_are_returned_as_data() {
    let transport = ScriptedTransport::repeating(Ok((404, r#"{"errors":["not found"]}"#)));
    let client = client(transport.clone());
    let options = FetchOptions::new().with_cache(None);

    let response = client.fetch(LEAGUES, &options).await.unwrap();
    assert_eq!(response.status(), 404);
    assert!(!response.is_success());
    assert_eq!(response.json(), &json!({"errors":["not found"]}));

    client.fetch(LEAGUES, &options).await.unwrap();
    assert_eq!(transport.calls(), 2, "non-200 responses are never cached");
}

#[tokio::test(start_paused = true)]
async fn server_errors_fail_without_retry() {
    let transport = ScriptedTransport::repeating(Ok((503, "unavailable")));
    let client = client(transport.clone());

    let err = client.fetch(LEAGUES, &FetchOptions::new()).await.unwrap_err();
    assert!(matches!(err, FetchError::Upstream { status: 503 }));
    assert_eq!(err.status_code(), Some(503));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn connection_reset_is_retried() {
    let transport = ScriptedTransport::new(vec![
        Err(TransportError::ConnectionReset),
        Err(TransportError::Timeout),
        Ok((200, r#"{"data":[]}"#)),
    ]);
    let client = client(transport.clone());

    let response = client.fetch(LEAGUES, &FetchOptions::new()).await.unwrap();
    assert!(response.is_success());
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn connect_failure_is_not_retried() {
    let transport =
        ScriptedTransport::repeating(Err(TransportError::Connect("dns error".into())));
    let client = client(transport.clone());

    let err = client.fetch(LEAGUES, &FetchOptions::new()).await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::Transport(TransportError::Connect(_))
    ));
    assert_eq!(err.status_code(), None);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_success_body_is_a_decode_error() {
    let transport = ScriptedTransport::new(vec![Ok((200, "<html>blocked</html>"))]);
    let client = client(transport.clone());

    let err = client
        .fetch(LEAGUES, &FetchOptions::new().with_cache(None))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
    assert!(client.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn caller_headers_win_over_generated_ones() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(transport.clone());
    let options = FetchOptions::new().with_header(USER_AGENT, HeaderValue::from_static("custom/1.0"));

    client.fetch(LEAGUES, &options).await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.headers[USER_AGENT], "custom/1.0");
    assert_eq!(request.headers.get_all(USER_AGENT).iter().count(), 1);
    assert!(request.headers.contains_key(ACCEPT));
    assert!(request.headers.contains_key("sec-ch-ua-mobile"));
}

#[tokio::test(start_paused = true)]
async fn proxies_rotate_round_robin() {
    let transport = ScriptedTransport::new(vec![]);
    let client = FetchClient::builder()
        .with_seed(3)
        .with_throttle(Duration::ZERO, Duration::ZERO)
        .with_proxy_list("http://10.0.0.1:8080,not a proxy,socks5://user:pw@10.0.0.2:1080")
        .with_transport(transport.clone())
        .build()
        .unwrap();
    assert_eq!(client.proxies().len(), 2);

    for _ in 0..3 {
        client.fetch(LEAGUES, &FetchOptions::new()).await.unwrap();
    }

    let used: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| r.proxy.as_ref().map(|p| p.endpoint()).unwrap_or_default())
        .collect();
    assert_eq!(
        used,
        vec![
            "http://10.0.0.1:8080",
            "socks5://10.0.0.2:1080",
            "http://10.0.0.1:8080"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn cache_hit_consumes_no_identity_or_proxy() {
    let transport = ScriptedTransport::new(vec![]);
    let client = FetchClient::builder()
        .with_seed(13)
        .with_throttle(Duration::ZERO, Duration::ZERO)
        .with_proxies(["http://1.1.1.1:1", "http://2.2.2.2:2"])
        .with_transport(transport.clone())
        .build()
        .unwrap();
    let cached = FetchOptions::new().with_cache(None);

    client.fetch(LEAGUES, &cached).await.unwrap();
    let hit = client.fetch(LEAGUES, &cached).await.unwrap();
    assert!(hit.is_cached());
    client.fetch(LEAGUES, &FetchOptions::new()).await.unwrap();

    let used: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| r.proxy.as_ref().map(|p| p.endpoint()).unwrap_or_default())
        .collect();
    assert_eq!(used, vec!["http://1.1.1.1:1", "http://2.2.2.2:2"]);
}

#[tokio::test(start_paused = true)]
async fn consecutive_requests_are_spaced() {
    let transport = ScriptedTransport::new(vec![]);
    let client = FetchClient::builder()
        .with_seed(5)
        .with_transport(transport.clone())
        .build()
        .unwrap();

    let started = tokio::time::Instant::now();
    client.fetch(LEAGUES, &FetchOptions::new()).await.unwrap();
    client.fetch(LEAGUES, &FetchOptions::new()).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(2_000), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn cancelled_token_stops_before_network() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(transport.clone());
    let token = CancellationToken::new();
    token.cancel();

    let err = client
        .fetch(LEAGUES, &FetchOptions::new().with_cancellation(token))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Cancelled));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_retry_chain() {
    let transport = ScriptedTransport::repeating(Ok((429, "")));
    let client = Arc::new(client(transport.clone()));
    let token = CancellationToken::new();

    let task = {
        let client = client.clone();
        let options = FetchOptions::new().with_cancellation(token.clone());
        tokio::spawn(async move { client.fetch(LEAGUES, &options).await })
    };

    // first attempt completes at once, then the task parks in a 2..=5s backoff
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, FetchError::Cancelled));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_bounds_whole_call() {
    let transport = ScriptedTransport::repeating(Ok((429, "")));
    let client = client(transport.clone());

    let err = client
        .fetch(
            LEAGUES,
            &FetchOptions::new().with_deadline(Duration::from_secs(3)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::DeadlineExceeded));
    assert!(transport.calls() <= 2);
}
