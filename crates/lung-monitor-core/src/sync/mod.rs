//! Keyed query cache with polling, gating and invalidation.
//!
//! Protocol for one key:
//! 1. First subscription creates the entry and issues a fetch
//! 2. Every fetch is tagged with the next generation number for the key
//! 3. A result is applied only if it is newer than the last settled result
//!    and newer than the last cancellation point. It need not be the latest
//!    issued: an older response that arrives while a newer fetch is still in
//!    flight is shown, and the newer one replaces it when it settles
//! 4. Disabling the key or dropping its last subscription cancels the poll
//!    timer and moves the cancellation point past every in-flight fetch

mod key;
mod manager;
mod subscription;

pub use key::*;
pub use manager::*;
pub use subscription::*;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};

use crate::gateway::{GatewayError, GatewayResult};

/// How often a key refetches on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Refresh {
    /// Only on subscription, enablement and invalidation
    #[default]
    Manual,
    /// Poll at a fixed period while enabled and subscribed
    Every(Duration),
}

/// Per-key subscription options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub enabled: bool,
    pub refresh: Refresh,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh: Refresh::Manual,
        }
    }
}

impl QueryOptions {
    pub fn polling(period: Duration) -> Self {
        Self {
            enabled: true,
            refresh: Refresh::Every(period),
        }
    }

    pub fn refresh(refresh: Refresh) -> Self {
        Self {
            enabled: true,
            refresh,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Async function producing the value for one key.
pub type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, GatewayResult<V>> + Send + Sync>;

/// Wrap an async closure as a [`Fetcher`].
pub fn fetcher<V, F, Fut>(f: F) -> Fetcher<V>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = GatewayResult<V>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// What a consumer sees for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot<V> {
    /// Last good value; kept across failed fetches
    pub value: Option<V>,
    /// No value yet and a fetch is in flight
    pub is_loading: bool,
    /// Any fetch in flight
    pub is_fetching: bool,
    pub is_error: bool,
    pub error: Option<GatewayError>,
    /// Invalidated, or disabled with a retained value
    pub is_stale: bool,
    pub enabled: bool,
    /// When the current value was applied
    pub updated_at: Option<DateTime<Utc>>,
}

impl<V> QuerySnapshot<V> {
    /// Snapshot for a view that has no key to subscribe to.
    pub fn disabled() -> Self {
        Self {
            value: None,
            is_loading: false,
            is_fetching: false,
            is_error: false,
            error: None,
            is_stale: false,
            enabled: false,
            updated_at: None,
        }
    }

    /// Map the value, keeping the status flags.
    pub fn project<U, F>(&self, f: F) -> QuerySnapshot<U>
    where
        F: FnOnce(&V) -> Option<U>,
    {
        QuerySnapshot {
            value: self.value.as_ref().and_then(f),
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
            is_error: self.is_error,
            error: self.error.clone(),
            is_stale: self.is_stale,
            enabled: self.enabled,
            updated_at: self.updated_at,
        }
    }
}

impl<V> Default for QuerySnapshot<V> {
    fn default() -> Self {
        Self::disabled()
    }
}
