//! Pub/Sub event bus for cache listeners.
//!
//! Listeners subscribe per event type. `emit()` calls them synchronously and
//! also queues the event, so a main loop that prefers batching can `poll()`.
//!
//! The cache emits only from its owner thread (inside `SequenceCache::poll`),
//! so listeners run there too.

use log::warn;
use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Queued events kept for `poll()`; the oldest is dropped beyond this
const MAX_QUEUE_SIZE: usize = 256;

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

type Listener = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Boxed event for queue storage
pub type BoxedEvent = Box<dyn Event>;

/// Cloning shares subscribers and queue.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<HashMap<TypeId, Vec<Listener>>>>,
    queue: Arc<Mutex<VecDeque<BoxedEvent>>>,
    dropped: Arc<AtomicUsize>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listener_types", &self.listeners.read().map(|l| l.len()).unwrap_or(0))
            .field("dropped", &self.dropped())
            .field("queue_len", &self.queue_len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of type E.
    ///
    /// # Example
    /// ```ignore
    /// let dirty = Arc::new(AtomicBool::new(false));
    /// let d = Arc::clone(&dirty);
    /// cache.event_bus().subscribe::<RequestHandled, _>(move |_| {
    ///     d.store(true, Ordering::Relaxed); // re-request on next repaint
    /// });
    /// ```
    pub fn subscribe<E, F>(&self, callback: F)
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(TypeId::of::<E>())
            .or_default()
            .push(listener);
    }

    /// Invoke listeners of E in subscription order, then queue the event.
    pub fn emit<E: Event>(&self, event: E) {
        // Snapshot so a listener may subscribe without deadlocking
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .cloned()
            .unwrap_or_default();
        for listener in &listeners {
            listener(&event);
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            queue.pop_front();
            if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                warn!(
                    "EventBus queue full ({} events), dropping oldest; nobody polls?",
                    MAX_QUEUE_SIZE
                );
            }
        }
        queue.push_back(Box::new(event));
    }

    /// Take all queued events, oldest first.
    pub fn poll(&self) -> Vec<BoxedEvent> {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }

    /// Events dropped from the queue since creation
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Downcast a polled event to its concrete type.
///
/// Derefs to `dyn Event` first; calling `as_any()` on the Box itself would
/// hit the blanket impl for `Box<dyn Event>` and never match.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}
