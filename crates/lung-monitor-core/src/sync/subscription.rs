use tokio::sync::watch;

use super::{QueryKey, QuerySnapshot, SyncManager};

/// A live consumer of one key.
///
/// Dropping the last subscription for a key stops its polling and discards
/// any response still in flight. The cached value is retained.
pub struct Subscription<V: Clone + Send + Sync + 'static> {
    manager: SyncManager<V>,
    key: QueryKey,
    rx: watch::Receiver<QuerySnapshot<V>>,
}

impl<V: Clone + Send + Sync + 'static> Subscription<V> {
    pub(crate) fn new(
        manager: SyncManager<V>,
        key: QueryKey,
        rx: watch::Receiver<QuerySnapshot<V>>,
    ) -> Self {
        Self { manager, key, rx }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn snapshot(&self) -> QuerySnapshot<V> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published snapshot.
    pub async fn changed(&mut self) -> QuerySnapshot<V> {
        // The sender lives as long as the entry, which outlives us
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }

    /// Wait until a snapshot satisfies `predicate`, checking the current one first.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> QuerySnapshot<V>
    where
        F: FnMut(&QuerySnapshot<V>) -> bool,
    {
        let found = self.rx.wait_for(|s| predicate(s)).await.map(|s| s.clone());
        found.unwrap_or_else(|_| self.rx.borrow().clone())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.manager.set_enabled(&self.key, enabled);
    }

    /// Force a fetch now if the key is enabled.
    pub fn refetch(&self) {
        self.manager.refetch(&self.key);
    }
}

impl<V: Clone + Send + Sync + 'static> Drop for Subscription<V> {
    fn drop(&mut self) {
        self.manager.release(&self.key);
    }
}

impl<V: Clone + Send + Sync + 'static> std::fmt::Debug for Subscription<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}
