//! High level fetch orchestration.
//!
//! Wires together the cache, throttle gate, identity generator, and proxy
//! rotator around a single HTTP GET, with a bounded retry loop for transient
//! failures.

use std::future::{Future, pending};
use std::sync::Arc;
use std::time::Duration;

use http::header::USER_AGENT;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use thiserror::Error;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::modules::cache::{self, CacheKey, CacheStore};
use crate::modules::events::{
	CacheHitEvent, ErrorEvent, EventDispatcher, EventHandler, FetchEvent, LoggingHandler,
	PostResponseEvent, PreRequestEvent, RateLimitedEvent, RetryEvent,
};
use crate::modules::proxy::ProxyRotator;
use crate::modules::random::SharedRng;
use crate::modules::spoofing::{DEFAULT_ORIGIN, DEFAULT_REFERER, DeviceProfile, IdentityGenerator};
use crate::modules::throttle::{self, RetryPolicy, ThrottleGate};
use crate::transport::{
	HttpTransport, RequestAttempt, ReqwestTransport, TransportError, TransportResponse,
	reqwest_client::DEFAULT_TIMEOUT,
};

/// Result alias used across the orchestration layer.
pub type FetchResult<T> = Result<T, FetchError>;

/// Whether the orchestrator will retry a failure on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
	RetryableTransient,
	NonRetryable,
}

/// High-level error surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum FetchError {
	#[error("url parse error: {0}")]
	Url(#[from] url::ParseError),
	#[error("header conversion failed: {0}")]
	InvalidHeader(String),
	#[error("upstream rate limited the request (429)")]
	RateLimited,
	#[error("upstream server error ({status})")]
	Upstream { status: u16 },
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error("response body is not valid json: {0}")]
	Decode(#[from] serde_json::Error),
	#[error("request cancelled")]
	Cancelled,
	#[error("request deadline exceeded")]
	DeadlineExceeded,
}

impl FetchError {
	pub fn kind(&self) -> FetchErrorKind {
		match self {
			FetchError::RateLimited
			| FetchError::Transport(TransportError::Timeout)
			| FetchError::Transport(TransportError::ConnectionReset) => {
				FetchErrorKind::RetryableTransient
			}
			_ => FetchErrorKind::NonRetryable,
		}
	}

	pub fn is_retryable(&self) -> bool {
		self.kind() == FetchErrorKind::RetryableTransient
	}

	/// HTTP status observed upstream, when there was one.
	pub fn status_code(&self) -> Option<u16> {
		match self {
			FetchError::RateLimited => Some(429),
			FetchError::Upstream { status } => Some(*status),
			_ => None,
		}
	}
}

/// JSON payload returned to callers.
#[derive(Debug, Clone)]
pub struct FetchResponse {
	status: u16,
	url: Url,
	body: Value,
	from_cache: bool,
}

impl FetchResponse {
	fn from_cache(url: Url, body: Value) -> Self {
		Self {
			status: 200,
			url,
			body,
			from_cache: true,
		}
	}

	/// Upstream status. Anything below 500 other than 429 lands here as data.
	pub fn status(&self) -> u16 {
		self.status
	}

	pub fn is_success(&self) -> bool {
		self.status == 200
	}

	/// Final URL after redirects, or the request URL for cache hits.
	pub fn url(&self) -> &Url {
		&self.url
	}

	pub fn json(&self) -> &Value {
		&self.body
	}

	pub fn into_json(self) -> Value {
		self.body
	}

	pub fn is_cached(&self) -> bool {
		self.from_cache
	}
}

/// Per-call knobs: extra headers and query, caching, and identity rotation.
#[derive(Debug, Clone)]
pub struct FetchOptions {
	pub headers: HeaderMap,
	pub query: Vec<(String, String)>,
	pub use_cache: bool,
	pub cache_ttl: Option<Duration>,
	pub rotate_identity: bool,
	pub profile: Option<DeviceProfile>,
	pub cancel: Option<CancellationToken>,
	pub deadline: Option<Duration>,
}

impl Default for FetchOptions {
	fn default() -> Self {
		Self {
			headers: HeaderMap::new(),
			query: Vec::new(),
			use_cache: false,
			cache_ttl: None,
			rotate_identity: true,
			profile: None,
			cancel: None,
			deadline: None,
		}
	}
}

impl FetchOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Caller headers win over generated ones, name by name.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);
		self
	}

	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));
		self
	}

	/// Enables caching; `None` uses the client's default TTL.
	pub fn with_cache(mut self, ttl: Option<Duration>) -> Self {
		self.use_cache = true;
		self.cache_ttl = ttl;
		self
	}

	pub fn with_identity_rotation(mut self, rotate: bool) -> Self {
		self.rotate_identity = rotate;
		self
	}

	pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
		self.profile = Some(profile);
		self
	}

	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancel = Some(token);
		self
	}

	/// Overall budget for the call, retries and backoff included.
	pub fn with_deadline(mut self, deadline: Duration) -> Self {
		self.deadline = Some(deadline);
		self
	}
}

/// Client configuration used by the builder.
#[derive(Debug, Clone)]
pub struct FetchConfig {
	pub proxies: Vec<String>,
	pub min_request_delay: Duration,
	pub max_request_delay: Duration,
	pub retry: RetryPolicy,
	pub default_ttl: Duration,
	pub sweep_period: Duration,
	pub request_timeout: Duration,
	pub referer: String,
	pub origin: String,
}

impl Default for FetchConfig {
	fn default() -> Self {
		Self {
			proxies: Vec::new(),
			min_request_delay: throttle::MIN_REQUEST_DELAY,
			max_request_delay: throttle::MAX_REQUEST_DELAY,
			retry: RetryPolicy::default(),
			default_ttl: cache::DEFAULT_TTL,
			sweep_period: cache::DEFAULT_SWEEP_PERIOD,
			request_timeout: DEFAULT_TIMEOUT,
			referer: DEFAULT_REFERER.to_string(),
			origin: DEFAULT_ORIGIN.to_string(),
		}
	}
}

/// Fluent builder for [`FetchClient`].
pub struct FetchClientBuilder {
	config: FetchConfig,
	rng: Option<SharedRng>,
	transport: Option<Arc<dyn HttpTransport>>,
	cache: Option<CacheStore>,
	handlers: Vec<Arc<dyn EventHandler>>,
}

impl FetchClientBuilder {
	pub fn new() -> Self {
		Self {
			config: FetchConfig::default(),
			rng: None,
			transport: None,
			cache: None,
			handlers: Vec::new(),
		}
	}

	pub fn with_config(mut self, config: FetchConfig) -> Self {
		self.config = config;
		self
	}

	pub fn with_proxies<I, S>(mut self, proxies: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.config.proxies = proxies.into_iter().map(Into::into).collect();
		self
	}

	/// Comma-delimited list, as found in `PROXY_LIST`.
	pub fn with_proxy_list(self, list: &str) -> Self {
		self.with_proxies(list.split(',').map(str::trim).filter(|p| !p.is_empty()))
	}

	pub fn with_throttle(mut self, min: Duration, max: Duration) -> Self {
		self.config.min_request_delay = min;
		self.config.max_request_delay = max;
		self
	}

	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.config.retry = policy;
		self
	}

	pub fn with_max_attempts(mut self, attempts: u32) -> Self {
		self.config.retry.max_attempts = attempts.max(1);
		self
	}

	pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
		self.config.default_ttl = ttl;
		self
	}

	pub fn with_sweep_period(mut self, period: Duration) -> Self {
		self.config.sweep_period = period;
		self
	}

	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	pub fn with_site(mut self, referer: impl Into<String>, origin: impl Into<String>) -> Self {
		self.config.referer = referer.into();
		self.config.origin = origin.into();
		self
	}

	pub fn with_rng(mut self, rng: SharedRng) -> Self {
		self.rng = Some(rng);
		self
	}

	pub fn with_seed(self, seed: u64) -> Self {
		self.with_rng(SharedRng::seeded(seed))
	}

	pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Shares an existing cache instead of creating a private one.
	pub fn with_cache_store(mut self, cache: CacheStore) -> Self {
		self.cache = Some(cache);
		self
	}

	pub fn register_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
		self.handlers.push(handler);
		self
	}

	pub fn build(self) -> FetchResult<FetchClient> {
		FetchClient::from_builder(self)
	}
}

impl Default for FetchClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Main fetch orchestrator.
pub struct FetchClient {
	config: FetchConfig,
	cache: CacheStore,
	identity: IdentityGenerator,
	proxies: ProxyRotator,
	throttle: ThrottleGate,
	rng: SharedRng,
	transport: Arc<dyn HttpTransport>,
	events: EventDispatcher,
}

impl FetchClient {
	/// Construct a client with default configuration.
	pub fn new() -> FetchResult<Self> {
		FetchClientBuilder::new().build()
	}

	/// Obtain a builder to customise the client instance.
	pub fn builder() -> FetchClientBuilder {
		FetchClientBuilder::new()
	}

	fn from_builder(builder: FetchClientBuilder) -> FetchResult<Self> {
		let FetchClientBuilder {
			config,
			rng,
			transport,
			cache,
			handlers,
		} = builder;

		let rng = rng.unwrap_or_default();
		let referer = HeaderValue::from_str(&config.referer)
			.map_err(|_| FetchError::InvalidHeader("referer".into()))?;
		let origin = HeaderValue::from_str(&config.origin)
			.map_err(|_| FetchError::InvalidHeader("origin".into()))?;
		let identity = IdentityGenerator::new(rng.clone()).with_site(referer, origin);
		let throttle = ThrottleGate::new(
			config.min_request_delay,
			config.max_request_delay,
			rng.clone(),
		);
		let proxies = ProxyRotator::load(config.proxies.iter());
		let transport = transport
			.unwrap_or_else(|| Arc::new(ReqwestTransport::with_timeout(config.request_timeout)));

		let mut events = EventDispatcher::new();
		events.register_handler(Arc::new(LoggingHandler));
		for handler in handlers {
			events.register_handler(handler);
		}

		Ok(Self {
			config,
			cache: cache.unwrap_or_default(),
			identity,
			proxies,
			throttle,
			rng,
			transport,
			events,
		})
	}

	pub fn config(&self) -> &FetchConfig {
		&self.config
	}

	pub fn cache(&self) -> &CacheStore {
		&self.cache
	}

	pub fn proxies(&self) -> &ProxyRotator {
		&self.proxies
	}

	/// Starts the background purge of expired cache entries.
	pub fn spawn_cache_sweeper(&self) -> tokio::task::JoinHandle<()> {
		self.cache.spawn_sweeper(self.config.sweep_period)
	}

	/// Fetch `url` as JSON, honouring cache, pacing, rotation, and retries.
	pub async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<FetchResponse> {
		let url = compose_url(url, &options.query)?;
		let guard = CallGuard::new(options);
		guard.check()?;

		let cache_key = options
			.use_cache
			.then(|| CacheKey::derive(&url, &options.headers));
		if let Some(ref key) = cache_key
			&& let Some(payload) = self.cache.get(key)
		{
			self.events.dispatch(FetchEvent::CacheHit(CacheHitEvent {
				url: url.clone(),
				key: key.to_string(),
				timestamp: chrono::Utc::now(),
			}));
			return Ok(FetchResponse::from_cache(url, payload));
		}

		let mut rotate = options.rotate_identity;
		let mut attempt = 0u32;

		loop {
			attempt += 1;

			guard.run(self.throttle.wait()).await?;
			let request = self.prepare_request(&url, options, rotate);

			self.events.dispatch(FetchEvent::PreRequest(PreRequestEvent {
				url: url.clone(),
				attempt,
				user_agent: request
					.headers
					.get(USER_AGENT)
					.and_then(|ua| ua.to_str().ok())
					.map(str::to_string),
				proxy: request.proxy.as_ref().map(ToString::to_string),
				timestamp: chrono::Utc::now(),
			}));

			match guard.run(self.send(&request, attempt)).await? {
				Ok(response) => {
					return self.complete(response, cache_key, options.cache_ttl);
				}
				Err(err) if err.is_retryable() && self.config.retry.allows_retry(attempt) => {
					let delay = self.config.retry.backoff(&self.rng);
					self.events.dispatch(FetchEvent::Retry(RetryEvent {
						url: url.clone(),
						attempt: attempt + 1,
						reason: err.to_string(),
						scheduled_after: delay,
						timestamp: chrono::Utc::now(),
					}));
					guard.run(sleep(delay)).await?;
					rotate = true;
				}
				Err(err) => {
					self.events.dispatch(FetchEvent::Error(ErrorEvent {
						url: url.clone(),
						attempt,
						error: err.to_string(),
						timestamp: chrono::Utc::now(),
					}));
					return Err(err);
				}
			}
		}
	}

	fn prepare_request(&self, url: &Url, options: &FetchOptions, rotate: bool) -> RequestAttempt {
		let (mut headers, proxy) = if rotate {
			let identity = self.identity.generate(options.profile);
			(identity.headers, self.proxies.next())
		} else {
			(HeaderMap::new(), None)
		};
		merge_headers(&mut headers, &options.headers);

		RequestAttempt {
			url: url.clone(),
			headers,
			proxy,
		}
	}

	async fn send(&self, request: &RequestAttempt, attempt: u32) -> FetchResult<TransportResponse> {
		let started = Instant::now();
		let response = match timeout(self.config.request_timeout, self.transport.get(request)).await {
			Ok(result) => result?,
			Err(_) => return Err(TransportError::Timeout.into()),
		};

		self.events.dispatch(FetchEvent::PostResponse(PostResponseEvent {
			url: response.url.clone(),
			attempt,
			status: response.status,
			latency: started.elapsed(),
			timestamp: chrono::Utc::now(),
		}));

		match response.status {
			429 => {
				self.events.dispatch(FetchEvent::RateLimited(RateLimitedEvent {
					url: request.url.clone(),
					attempt,
					proxy: request.proxy.as_ref().map(ToString::to_string),
					timestamp: chrono::Utc::now(),
				}));
				Err(FetchError::RateLimited)
			}
			status if status >= 500 => Err(FetchError::Upstream { status }),
			_ => Ok(response),
		}
	}

	fn complete(
		&self,
		response: TransportResponse,
		cache_key: Option<CacheKey>,
		ttl: Option<Duration>,
	) -> FetchResult<FetchResponse> {
		let body = decode_body(response.status, &response.body)?;
		if response.status == 200
			&& let Some(key) = cache_key
		{
			self.cache
				.put(key, body.clone(), ttl.unwrap_or(self.config.default_ttl));
		}

		Ok(FetchResponse {
			status: response.status,
			url: response.url,
			body,
			from_cache: false,
		})
	}
}

/// Cancellation token and deadline observed at every suspension point.
struct CallGuard {
	cancel: Option<CancellationToken>,
	deadline: Option<Instant>,
}

impl CallGuard {
	fn new(options: &FetchOptions) -> Self {
		Self {
			cancel: options.cancel.clone(),
			deadline: options.deadline.map(|budget| Instant::now() + budget),
		}
	}

	fn check(&self) -> FetchResult<()> {
		if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
			return Err(FetchError::Cancelled);
		}
		if self.deadline.is_some_and(|at| Instant::now() >= at) {
			return Err(FetchError::DeadlineExceeded);
		}
		Ok(())
	}

	async fn run<F: Future>(&self, future: F) -> FetchResult<F::Output> {
		self.check()?;

		let cancelled = async {
			match self.cancel {
				Some(ref token) => token.cancelled().await,
				None => pending::<()>().await,
			}
		};
		let expired = async {
			match self.deadline {
				Some(at) => sleep_until(at).await,
				None => pending::<()>().await,
			}
		};

		tokio::select! {
			biased;
			_ = cancelled => Err(FetchError::Cancelled),
			_ = expired => Err(FetchError::DeadlineExceeded),
			output = future => Ok(output),
		}
	}
}

fn compose_url(raw: &str, query: &[(String, String)]) -> FetchResult<Url> {
	let mut url = Url::parse(raw)?;
	if !query.is_empty() {
		url.query_pairs_mut().extend_pairs(query.iter());
	}
	Ok(url)
}

/// Replaces each header named in `overrides`, leaving the others untouched.
fn merge_headers(base: &mut HeaderMap, overrides: &HeaderMap) {
	for name in overrides.keys() {
		base.remove(name);
		for value in overrides.get_all(name) {
			base.append(name.clone(), value.clone());
		}
	}
}

fn decode_body(status: u16, body: &[u8]) -> FetchResult<Value> {
	if body.is_empty() {
		return Ok(Value::Null);
	}
	match serde_json::from_slice(body) {
		Ok(value) => Ok(value),
		Err(err) if status == 200 => Err(FetchError::Decode(err)),
		Err(_) => Ok(Value::String(String::from_utf8_lossy(body).into_owned())),
	}
}
