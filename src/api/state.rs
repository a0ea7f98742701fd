use std::sync::Arc;

use crate::fetcher::FetchClient;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Resilient client every upstream call goes through
    pub client: Arc<FetchClient>,

    /// Upstream API root, without a trailing slash
    pub base_url: Arc<str>,
}

impl AppState {
    pub fn new(client: Arc<FetchClient>, base_url: impl AsRef<str>) -> Self {
        Self {
            client,
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
        }
    }

    pub fn upstream(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
