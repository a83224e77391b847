//! Subscription registry shared by streams and the placement engine

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Callback invoked with each published value
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by every `subscribe`-style call; unique across the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        SubscriptionId(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Lock a mutex, recovering the guard if a handler panicked while holding it.
///
/// All guarded values in this crate are replaced wholesale, never left half
/// written, so the poisoned contents are still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered set of handlers for one kind of value
pub struct HandlerRegistry<T> {
    handlers: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }
}

impl<T> HandlerRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId::next();
        lock(&self.handlers).push((id, Arc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = lock(&self.handlers);
        let before = handlers.len();
        handlers.retain(|(handle, _)| *handle != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        lock(&self.handlers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.handlers).clear();
    }

    /// Call every handler in subscription order; returns how many ran.
    ///
    /// Handlers run on a snapshot taken outside the registry lock, so a
    /// handler may subscribe or unsubscribe without deadlocking.
    pub fn notify(&self, value: &T) -> usize {
        let snapshot: Vec<Handler<T>> = lock(&self.handlers)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in &snapshot {
            handler(value);
        }
        snapshot.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscribe_and_notify_in_order() {
        let registry = HandlerRegistry::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        registry.subscribe(move |v| first.lock().unwrap().push(("first", *v)));
        let second = Arc::clone(&seen);
        registry.subscribe(move |v| second.lock().unwrap().push(("second", *v)));

        assert_eq!(registry.notify(&7), 2);
        assert_eq!(*seen.lock().unwrap(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_unsubscribe() {
        let registry = HandlerRegistry::<u32>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let id = registry.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert_eq!(registry.notify(&1), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids_are_unique_across_registries() {
        let a = HandlerRegistry::<u32>::new();
        let b = HandlerRegistry::<String>::new();
        let id_a = a.subscribe(|_| {});
        let id_b = b.subscribe(|_| {});
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn test_handler_may_subscribe_during_notify() {
        let registry = Arc::new(HandlerRegistry::<u32>::new());
        let inner = Arc::clone(&registry);
        registry.subscribe(move |_| {
            inner.subscribe(|_| {});
        });

        registry.notify(&1);
        assert_eq!(registry.len(), 2);
    }
}
