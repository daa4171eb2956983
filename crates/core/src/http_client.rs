//! Per-adapter HTTP client lifecycle.
//!
//! The teacher builds one process-global `reqwest::Client` behind a `Lazy`. The engine's
//! source adapters instead each own one client, built lazily on first use and dropped with
//! the adapter — the "mixin-based HTTP-client lifecycle" redesign flag in SPEC_FULL §9.

use once_cell::sync::OnceCell;
use std::time::Duration;

/// A lazily-constructed `reqwest::Client` owned by a single adapter instance.
pub struct LazyHttpClient {
    timeout: Duration,
    inner: OnceCell<reqwest::Client>,
}

impl LazyHttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            inner: OnceCell::new(),
        }
    }

    /// Returns the underlying client, building it on first call.
    pub fn get(&self) -> &reqwest::Client {
        self.inner.get_or_init(|| {
            reqwest::Client::builder()
                .timeout(self.timeout)
                .build()
                .expect("failed to build reqwest client")
        })
    }
}

impl Default for LazyHttpClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
