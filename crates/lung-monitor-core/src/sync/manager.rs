//! The synchronization manager: the only writer of cache entries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::{Fetcher, KeySelector, QueryKey, QueryOptions, QuerySnapshot, Refresh, Subscription};
use crate::gateway::{GatewayError, GatewayResult};

/// Result of a successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome<T> {
    pub value: T,
    /// Instantiated keys that were marked stale
    pub invalidated: Vec<QueryKey>,
}

/// A fetch that has been issued a generation and must run outside the lock.
struct FetchJob<V> {
    key: QueryKey,
    generation: u64,
    fetcher: Fetcher<V>,
}

struct Entry<V> {
    value: Option<V>,
    error: Option<GatewayError>,
    stale: bool,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    options: QueryOptions,
    fetcher: Option<Fetcher<V>>,
    subscribers: usize,
    /// Last generation handed to a fetch
    issued: u64,
    /// Generation of the last applied result (value or error)
    settled: u64,
    /// Fetches at or below this generation were cancelled
    cancelled_through: u64,
    poll: Option<JoinHandle<()>>,
    tx: watch::Sender<QuerySnapshot<V>>,
}

impl<V: Clone> Entry<V> {
    fn new(options: QueryOptions) -> Self {
        let (tx, _rx) = watch::channel(QuerySnapshot::disabled());
        Self {
            value: None,
            error: None,
            stale: true,
            updated_at: None,
            options,
            fetcher: None,
            subscribers: 0,
            issued: 0,
            settled: 0,
            cancelled_through: 0,
            poll: None,
            tx,
        }
    }

    fn active(&self) -> bool {
        self.options.enabled && self.subscribers > 0
    }

    /// A fetch is in flight whose result could still be applied.
    fn pending(&self) -> bool {
        self.issued > self.settled.max(self.cancelled_through)
    }

    /// Newer than anything settled or cancelled; older in-flight responses
    /// still qualify until a newer one settles.
    fn accepts(&self, generation: u64) -> bool {
        generation > self.settled && generation > self.cancelled_through
    }

    fn snapshot(&self) -> QuerySnapshot<V> {
        let pending = self.options.enabled && self.pending();
        QuerySnapshot {
            value: self.value.clone(),
            is_loading: pending && self.value.is_none(),
            is_fetching: pending,
            is_error: self.error.is_some(),
            error: self.error.clone(),
            is_stale: self.stale || !self.options.enabled,
            enabled: self.options.enabled,
            updated_at: self.updated_at,
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }

    fn begin_fetch(&mut self, key: &QueryKey) -> Option<FetchJob<V>> {
        let fetcher = self.fetcher.clone()?;
        self.issued += 1;
        Some(FetchJob {
            key: key.clone(),
            generation: self.issued,
            fetcher,
        })
    }

    /// Stop polling and orphan every in-flight fetch.
    fn cancel(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.abort();
        }
        self.cancelled_through = self.issued;
    }
}

struct Inner<V> {
    entries: Mutex<HashMap<QueryKey, Entry<V>>>,
    retry_delay: Duration,
}

/// Injectable query cache.
///
/// Must be used from within a tokio runtime: fetches and poll timers are
/// spawned as tasks.
pub struct SyncManager<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for SyncManager<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> SyncManager<V> {
    /// `retry_delay` is the pause before the single automatic retry.
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                retry_delay,
            }),
        }
    }

    /// Subscribe to a key, creating its entry on first use.
    ///
    /// The latest `fetcher` and `options` replace the previous ones for the
    /// key. An entry that was inactive, has no value, or is stale is fetched
    /// immediately.
    pub fn subscribe(
        &self,
        key: QueryKey,
        fetcher: Fetcher<V>,
        options: QueryOptions,
    ) -> Subscription<V> {
        let mut job = None;
        let rx = {
            let mut entries = self.inner.lock();
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(options));

            let was_active = entry.active();
            let refresh_changed = entry.options.refresh != options.refresh;
            entry.subscribers += 1;
            entry.fetcher = Some(fetcher);
            entry.options = options;

            if entry.active() {
                let needs_fetch = !was_active || entry.value.is_none() || entry.stale;
                if needs_fetch && !entry.pending() {
                    job = entry.begin_fetch(&key);
                }
                if refresh_changed {
                    if let Some(poll) = entry.poll.take() {
                        poll.abort();
                    }
                }
                self.inner.ensure_poll(entry, &key);
            } else if entry.poll.is_some() {
                entry.cancel();
            }

            entry.publish();
            entry.tx.subscribe()
        };

        debug!(%key, "subscribed");
        if let Some(job) = job {
            self.inner.run(job);
        }
        Subscription::new(self.clone(), key, rx)
    }

    /// Mark matching entries stale and refetch those with live consumers.
    ///
    /// Returns the instantiated keys that matched.
    pub fn invalidate(&self, selector: &KeySelector) -> Vec<QueryKey> {
        let mut jobs = Vec::new();
        let mut matched = Vec::new();
        {
            let mut entries = self.inner.lock();
            for (key, entry) in entries.iter_mut().filter(|(k, _)| selector.matches(k)) {
                entry.stale = true;
                if entry.active() {
                    jobs.extend(entry.begin_fetch(key));
                }
                entry.publish();
                matched.push(key.clone());
            }
        }

        debug!(?selector, matched = matched.len(), "invalidated");
        for job in jobs {
            self.inner.run(job);
        }
        matched
    }

    /// Run a write, then invalidate on success. Never retried.
    pub async fn mutate<T, Fut, F>(
        &self,
        mutation: Fut,
        invalidations: F,
    ) -> GatewayResult<MutationOutcome<T>>
    where
        Fut: Future<Output = GatewayResult<T>>,
        F: FnOnce(&T) -> Vec<KeySelector>,
    {
        let value = match mutation.await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "mutation failed");
                return Err(e);
            }
        };

        let mut invalidated = Vec::new();
        for selector in invalidations(&value) {
            invalidated.extend(self.invalidate(&selector));
        }
        Ok(MutationOutcome { value, invalidated })
    }

    /// Current snapshot of a key, if it has been instantiated.
    pub fn snapshot(&self, key: &QueryKey) -> Option<QuerySnapshot<V>> {
        self.inner.lock().get(key).map(|e| e.snapshot())
    }

    /// Instantiated keys, sorted.
    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<_> = self.inner.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub(crate) fn set_enabled(&self, key: &QueryKey, enabled: bool) {
        let mut job = None;
        {
            let mut entries = self.inner.lock();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            if entry.options.enabled == enabled {
                return;
            }
            entry.options.enabled = enabled;

            if entry.active() {
                job = entry.begin_fetch(key);
                self.inner.ensure_poll(entry, key);
            } else {
                entry.cancel();
            }
            entry.publish();
        }

        debug!(%key, enabled, "enablement changed");
        if let Some(job) = job {
            self.inner.run(job);
        }
    }

    pub(crate) fn refetch(&self, key: &QueryKey) {
        let job = {
            let mut entries = self.inner.lock();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            if !entry.active() {
                return;
            }
            let job = entry.begin_fetch(key);
            entry.publish();
            job
        };
        if let Some(job) = job {
            self.inner.run(job);
        }
    }

    pub(crate) fn release(&self, key: &QueryKey) {
        let mut entries = self.inner.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                entry.cancel();
                debug!(%key, "last subscriber dropped");
            }
            entry.publish();
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Inner<V> {
    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_poll(self: &Arc<Self>, entry: &mut Entry<V>, key: &QueryKey) {
        if entry.poll.is_some() {
            return;
        }
        if let Refresh::Every(period) = entry.options.refresh {
            entry.poll = Some(spawn_poll(Arc::downgrade(self), key.clone(), period));
        }
    }

    fn poll_tick(self: &Arc<Self>, key: &QueryKey) {
        let job = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            if !entry.active() {
                return;
            }
            let job = entry.begin_fetch(key);
            entry.publish();
            job
        };
        if let Some(job) = job {
            self.run(job);
        }
    }

    fn run(self: &Arc<Self>, job: FetchJob<V>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let FetchJob {
                key,
                generation,
                fetcher,
            } = job;

            let mut result = fetcher().await;
            if let Err(e) = &result {
                if inner.is_live(&key, generation) {
                    warn!(%key, generation, error = %e, "fetch failed, retrying once");
                    tokio::time::sleep(inner.retry_delay).await;
                    result = fetcher().await;
                }
            }
            inner.apply(&key, generation, result);
        });
    }

    fn is_live(&self, key: &QueryKey, generation: u64) -> bool {
        self.lock()
            .get(key)
            .map(|e| e.accepts(generation))
            .unwrap_or(false)
    }

    fn apply(&self, key: &QueryKey, generation: u64, result: GatewayResult<V>) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        if !entry.accepts(generation) {
            debug!(%key, generation, settled = entry.settled, "discarding stale response");
            return;
        }

        entry.settled = generation;
        match result {
            Ok(value) => {
                entry.value = Some(value);
                entry.error = None;
                entry.stale = false;
                entry.updated_at = Some(chrono::Utc::now());
            }
            Err(e) => {
                warn!(%key, generation, error = %e, "fetch failed");
                entry.error = Some(e);
            }
        }
        entry.publish();
    }
}

fn spawn_poll<V: Clone + Send + Sync + 'static>(
    inner: Weak<Inner<V>>,
    key: QueryKey,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.poll_tick(&key);
        }
    })
}
