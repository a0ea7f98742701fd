//! Cross-cutting services module
//!
//! Building blocks the fetch orchestrator composes around each request:
//! caching, identity spoofing, proxy rotation, pacing, and event hooks.

pub mod cache;
pub mod events;
pub mod proxy;
pub mod random;
pub mod spoofing;
pub mod throttle;

// Re-export commonly used types
pub use cache::{CacheKey, CacheStore};
pub use events::{
    CacheHitEvent, ErrorEvent, EventDispatcher, EventHandler, FetchEvent, LoggingHandler,
    PostResponseEvent, PreRequestEvent, RateLimitedEvent, RetryEvent,
};
pub use proxy::{ProxyCredentials, ProxyEndpoint, ProxyParseError, ProxyProtocol, ProxyRotator};
pub use random::SharedRng;
pub use spoofing::{
    BrowserFamily, BrowserIdentity, DeviceProfile, IdentityGenerator, Platform, Viewport,
};
pub use throttle::{RetryPolicy, ThrottleGate};
