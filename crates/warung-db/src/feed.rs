//! # Change Feed
//!
//! Reactive reads. A caller registers interest in one or more collections
//! and is woken after every committed write that touched any of them.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Live Query Lifecycle                               │
//! │                                                                         │
//! │  db.watch(&[Products], query)                                          │
//! │       │   registers Subscription { scope: [Products] }                 │
//! │       ▼                                                                 │
//! │  live.current().await        ← runs the query against current data     │
//! │                                                                         │
//! │  UnitOfWork { scope: [Transactions, Products] }.commit()               │
//! │       │   ChangeFeed::publish(scope)                                    │
//! │       ▼                                                                 │
//! │  live.changed().await        ← wakes, re-runs, returns fresh rows      │
//! │                                                                         │
//! │  drop(live)                  ← Subscription unregisters itself         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Notifications coalesce: ten commits between two `changed()` calls
//! produce one wake-up, and the re-run sees all ten.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::debug;

use crate::error::DbResult;
use crate::schema::Collection;

struct Registration {
    scope: Vec<Collection>,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct FeedInner {
    next_id: AtomicU64,
    subscriptions: Mutex<HashMap<u64, Registration>>,
}

impl FeedInner {
    fn registry(&self) -> MutexGuard<'_, HashMap<u64, Registration>> {
        // Registry entries stay valid even if a holder panicked.
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of active subscriptions, shared by every handle to a database.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in `scope`.
    pub fn subscribe(&self, scope: &[Collection]) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let notify = Arc::new(Notify::new());

        self.inner.registry().insert(
            id,
            Registration {
                scope: scope.to_vec(),
                notify: notify.clone(),
            },
        );
        debug!(id, ?scope, "Subscription registered");

        Subscription {
            id,
            feed: self.clone(),
            notify,
        }
    }

    /// Wakes every subscription whose scope overlaps `changed`.
    ///
    /// Returns how many subscriptions were notified.
    pub fn publish(&self, changed: &[Collection]) -> usize {
        let registry = self.inner.registry();
        let mut woken = 0;
        for registration in registry.values() {
            if registration.scope.iter().any(|c| changed.contains(c)) {
                registration.notify.notify_one();
                woken += 1;
            }
        }
        debug!(?changed, woken, "Change published");
        woken
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry().len()
    }

    fn unsubscribe(&self, id: u64) {
        if self.inner.registry().remove(&id).is_some() {
            debug!(id, "Subscription removed");
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// A registered interest in some collections. Unregisters on drop.
pub struct Subscription {
    id: u64,
    feed: ChangeFeed,
    notify: Arc<Notify>,
}

impl Subscription {
    /// Waits for the next commit touching this subscription's scope.
    ///
    /// Returns immediately if a commit happened since the last call.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.feed.unsubscribe(self.id);
    }
}

// =============================================================================
// Live Query
// =============================================================================

type QueryFuture<T> = Pin<Box<dyn Future<Output = DbResult<T>> + Send>>;

/// A query bound to a subscription: re-run it whenever its scope changes.
///
/// ## Example
/// ```rust,ignore
/// let products = db.products();
/// let mut live = db.watch(&[Collection::Products], move || {
///     let products = products.clone();
///     async move { products.in_stock().await }
/// });
///
/// render(live.current().await?);
/// loop {
///     render(live.changed().await?);
/// }
/// ```
pub struct LiveQuery<T> {
    subscription: Subscription,
    query: Box<dyn Fn() -> QueryFuture<T> + Send + Sync>,
}

impl<T> LiveQuery<T> {
    pub fn new<F, Fut>(subscription: Subscription, query: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DbResult<T>> + Send + 'static,
    {
        LiveQuery {
            subscription,
            query: Box::new(move || Box::pin(query())),
        }
    }

    /// Runs the query against current data.
    pub async fn current(&self) -> DbResult<T> {
        (self.query)().await
    }

    /// Waits for a relevant commit, then re-runs the query.
    pub async fn changed(&self) -> DbResult<T> {
        self.subscription.changed().await;
        self.current().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
