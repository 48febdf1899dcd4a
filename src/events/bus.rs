//! In-process publish/subscribe
//!
//! Listeners are plain closures stored per topic name. Dispatch is
//! synchronous: `broadcast` and `serial` return after every listener ran.
//! The registry lock is released before any listener is invoked, so a
//! listener may itself subscribe or drop a [`Subscription`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::{debug, trace};

use crate::error::AppResult;

use super::topics::Topic;

type Observer<P> = Arc<dyn Fn(&P) + Send + Sync>;
type Hook<P> = Arc<dyn Fn(&mut P) -> AppResult<()> + Send + Sync>;

enum Listener<P> {
    Observer(Observer<P>),
    Hook(Hook<P>),
}

impl<P> Clone for Listener<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Observer(f) => Self::Observer(f.clone()),
            Self::Hook(f) => Self::Hook(f.clone()),
        }
    }
}

struct Entry {
    id: u64,
    /// Always a `Listener<T::Payload>` for the topic the entry is filed under
    listener: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    topics: RwLock<HashMap<&'static str, Vec<Entry>>>,
}

impl BusInner {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<&'static str, Vec<Entry>>> {
        self.topics.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<&'static str, Vec<Entry>>> {
        self.topics.write().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, topic: &'static str, id: u64) -> bool {
        let mut topics = self.write();
        let Some(entries) = topics.get_mut(topic) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            topics.remove(topic);
        }
        removed
    }
}

/// Typed event bus shared by handlers and live connections
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer called by [`EventBus::broadcast`]
    pub fn on<T, F>(&self, listener: F) -> Subscription
    where
        T: Topic,
        F: Fn(&T::Payload) + Send + Sync + 'static,
    {
        self.register::<T>(Listener::Observer(Arc::new(listener)))
    }

    /// Register a hook called by [`EventBus::serial`]; it may rewrite the payload or reject it
    pub fn hook<T, F>(&self, hook: F) -> Subscription
    where
        T: Topic,
        F: Fn(&mut T::Payload) -> AppResult<()> + Send + Sync + 'static,
    {
        self.register::<T>(Listener::Hook(Arc::new(hook)))
    }

    /// Deliver `payload` to every observer of `T`, in registration order
    pub fn broadcast<T: Topic>(&self, payload: &T::Payload) {
        let listeners = self.snapshot::<T>();
        trace!(topic = T::NAME, listeners = listeners.len(), "Broadcasting event");
        for listener in listeners {
            if let Listener::Observer(f) = listener {
                f(payload);
            }
        }
    }

    /// Run every hook of `T` over `payload` in order, stopping at the first rejection
    pub async fn serial<T: Topic>(&self, payload: &mut T::Payload) -> AppResult<()> {
        let listeners = self.snapshot::<T>();
        for listener in listeners {
            if let Listener::Hook(f) = listener {
                f(payload)?;
            }
        }
        Ok(())
    }

    /// Number of listeners currently registered on `T`
    pub fn listener_count<T: Topic>(&self) -> usize {
        self.inner.read().get(T::NAME).map_or(0, Vec::len)
    }

    fn register<T: Topic>(&self, listener: Listener<T::Payload>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .write()
            .entry(T::NAME)
            .or_default()
            .push(Entry {
                id,
                listener: Box::new(listener),
            });
        debug!(topic = T::NAME, id, "Listener registered");

        Subscription {
            bus: Arc::downgrade(&self.inner),
            topic: T::NAME,
            id,
            active: true,
        }
    }

    fn snapshot<T: Topic>(&self) -> Vec<Listener<T::Payload>> {
        self.inner
            .read()
            .get(T::NAME)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.listener.downcast_ref::<Listener<T::Payload>>())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Registration handle; the listener is removed on [`Subscription::dispose`] or drop
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    bus: Weak<BusInner>,
    topic: &'static str,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Unregister the listener; later calls are no-ops
    pub fn dispose(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(bus) = self.bus.upgrade() {
            if bus.remove(self.topic, self.id) {
                debug!(topic = self.topic, id = self.id, "Listener unregistered");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use uuid::Uuid;

    use super::*;
    use crate::error::AppError;
    use crate::events::topics::{ProblemListEvent, ProblemListTopic, RecordChange};
    use crate::models::{ProblemFilter, record::fixtures::judged_record};

    #[test]
    fn test_broadcast_reaches_observers_in_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        let _a = bus.on::<RecordChange, _>(move |_| first.lock().unwrap().push(1));
        let second = seen.clone();
        let _b = bus.on::<RecordChange, _>(move |_| second.lock().unwrap().push(2));

        bus.broadcast::<RecordChange>(&judged_record("system", Uuid::new_v4(), Uuid::new_v4()));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_drop_unregisters() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let counter = count.clone();
        let sub = bus.on::<RecordChange, _>(move |_| *counter.lock().unwrap() += 1);
        assert_eq!(bus.listener_count::<RecordChange>(), 1);

        let record = judged_record("system", Uuid::new_v4(), Uuid::new_v4());
        bus.broadcast::<RecordChange>(&record);
        drop(sub);
        bus.broadcast::<RecordChange>(&record);

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(bus.listener_count::<RecordChange>(), 0);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let bus = EventBus::new();
        let mut sub = bus.on::<RecordChange, _>(|_| {});
        let _other = bus.on::<RecordChange, _>(|_| {});

        sub.dispose();
        sub.dispose();
        assert!(!sub.is_active());
        assert_eq!(bus.listener_count::<RecordChange>(), 1);
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = EventBus::new();
        let mut sub = bus.on::<RecordChange, _>(|_| {});
        drop(bus);
        sub.dispose();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_listener_can_unsubscribe_during_dispatch() {
        let bus = EventBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let inner = slot.clone();
        let sub = bus.on::<RecordChange, _>(move |_| {
            inner.lock().unwrap().take();
        });
        *slot.lock().unwrap() = Some(sub);

        bus.broadcast::<RecordChange>(&judged_record("system", Uuid::new_v4(), Uuid::new_v4()));
        assert_eq!(bus.listener_count::<RecordChange>(), 0);
    }

    #[tokio::test]
    async fn test_serial_hooks_rewrite_and_reject() {
        let bus = EventBus::new();
        let banned = Uuid::new_v4();

        let _narrow = bus.hook::<ProblemListTopic, _>(move |event| {
            event.filter.exclude_ids.push(banned);
            Ok(())
        });
        let mut event = ProblemListEvent {
            domain_id: "system".to_string(),
            viewer_id: None,
            filter: ProblemFilter::default(),
        };
        bus.serial::<ProblemListTopic>(&mut event).await.unwrap();
        assert_eq!(event.filter.exclude_ids, vec![banned]);

        let _reject = bus.hook::<ProblemListTopic, _>(|_| {
            Err(AppError::Forbidden("listing disabled".to_string()))
        });
        let result = bus.serial::<ProblemListTopic>(&mut event).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_observers_and_hooks_are_separate() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0));

        let counter = hits.clone();
        let _obs = bus.on::<ProblemListTopic, _>(move |_| *counter.lock().unwrap() += 1);
        let mut event = ProblemListEvent {
            domain_id: "system".to_string(),
            viewer_id: None,
            filter: ProblemFilter::default(),
        };
        bus.serial::<ProblemListTopic>(&mut event).await.unwrap();
        assert_eq!(*hits.lock().unwrap(), 0);

        bus.broadcast::<ProblemListTopic>(&event);
        assert_eq!(*hits.lock().unwrap(), 1);
    }
}
