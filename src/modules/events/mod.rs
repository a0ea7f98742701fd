//! Fetch lifecycle events.
//!
//! Provides hooks for logging and custom reactions around each outbound
//! request the orchestrator makes.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct CacheHitEvent {
    pub url: Url,
    pub key: String,
    pub timestamp: DateTime<Utc>,
}

/// Structured pre-request event.
#[derive(Debug, Clone)]
pub struct PreRequestEvent {
    pub url: Url,
    pub attempt: u32,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Structured post-response event.
#[derive(Debug, Clone)]
pub struct PostResponseEvent {
    pub url: Url,
    pub attempt: u32,
    pub status: u16,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RateLimitedEvent {
    pub url: Url,
    pub attempt: u32,
    pub proxy: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RetryEvent {
    pub url: Url,
    pub attempt: u32,
    pub reason: String,
    pub scheduled_after: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub url: Url,
    pub attempt: u32,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum FetchEvent {
    CacheHit(CacheHitEvent),
    PreRequest(PreRequestEvent),
    PostResponse(PostResponseEvent),
    RateLimited(RateLimitedEvent),
    Retry(RetryEvent),
    Error(ErrorEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &FetchEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: FetchEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &FetchEvent) {
        match event {
            FetchEvent::CacheHit(hit) => {
                log::debug!("cache hit {} ({})", hit.url, hit.key);
            }
            FetchEvent::PreRequest(pre) => match pre.proxy {
                Some(ref proxy) => log::info!("-> GET {} via {} (attempt {})", pre.url, proxy, pre.attempt),
                None => log::info!("-> GET {} (attempt {})", pre.url, pre.attempt),
            },
            FetchEvent::PostResponse(post) => {
                log::debug!(
                    "<- GET {} -> {} ({:.2}s)",
                    post.url,
                    post.status,
                    post.latency.as_secs_f64()
                );
            }
            FetchEvent::RateLimited(limited) => {
                log::warn!(
                    "rate limit (429) from upstream for {} on attempt {}",
                    limited.url,
                    limited.attempt
                );
            }
            FetchEvent::Retry(retry) => {
                log::info!(
                    "retry {} attempt {} after {:.2}s ({})",
                    retry.url,
                    retry.attempt,
                    retry.scheduled_after.as_secs_f64(),
                    retry.reason
                );
            }
            FetchEvent::Error(error) => {
                log::error!("request failed for {} -> {}", error.url, error.error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHandler(std::sync::Mutex<usize>);

    impl EventHandler for CountingHandler {
        fn handle(&self, _event: &FetchEvent) {
            *self.0.lock().unwrap() += 1;
        }
    }

    #[test]
    fn dispatches_to_handlers() {
        let mut dispatcher = EventDispatcher::new();
        let counter = Arc::new(CountingHandler(std::sync::Mutex::new(0)));
        dispatcher.register_handler(counter.clone());
        dispatcher.register_handler(Arc::new(LoggingHandler));
        dispatcher.dispatch(FetchEvent::Error(ErrorEvent {
            url: Url::parse("https://api.prizepicks.com/leagues").unwrap(),
            attempt: 1,
            error: "timeout".into(),
            timestamp: Utc::now(),
        }));
        assert_eq!(*counter.0.lock().unwrap(), 1);
    }
}
