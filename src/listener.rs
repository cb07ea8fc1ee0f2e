//! Event listener registry and dispatch queue (spec.md §4.8, §5).
//!
//! Listener tables are an `RwLock`: event dispatch (a read) is the hot
//! path, registration (a write) is rare. Dispatch itself happens on a
//! dedicated task reading off a bounded queue, never on the pump's reader
//! task, so a slow listener can't stall wire reads. The queue drops the
//! oldest entry on overflow rather than blocking the pump.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify, RwLock};
use torctl_proto::Event;

pub type ListenerId = u64;
pub type ListenerFn = Arc<dyn Fn(Event) + Send + Sync>;

struct Registration {
    id: ListenerId,
    /// Event type names this listener subscribed to; empty means "all".
    types: Vec<String>,
    callback: ListenerFn,
}

/// The registry of `add_event_listener`/`remove_event_listener` callbacks.
/// Cloning shares the same underlying table.
#[derive(Clone)]
pub struct ListenerRegistry {
    inner: Arc<RwLock<Vec<Registration>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        ListenerRegistry {
            inner: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub async fn add(&self, types: Vec<String>, callback: ListenerFn) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.write().await.push(Registration { id, types, callback });
        id
    }

    pub async fn remove(&self, id: ListenerId) {
        self.inner.write().await.retain(|r| r.id != id);
    }

    /// The union of every registered listener's event types, used to
    /// rebuild a `SETEVENTS` command after a reconnect.
    pub async fn subscribed_types(&self) -> Vec<String> {
        let mut set = std::collections::BTreeSet::new();
        for reg in self.inner.read().await.iter() {
            set.extend(reg.types.iter().cloned());
        }
        set.into_iter().collect()
    }

    /// Invokes every listener whose subscription matches `event`'s type, in
    /// registration order. A panicking listener is caught and logged,
    /// per spec.md §7: listener exceptions never propagate into the
    /// dispatcher.
    async fn dispatch(&self, event: Event) {
        let event_type = event_type_name(&event);
        let listeners: Vec<ListenerFn> = self
            .inner
            .read()
            .await
            .iter()
            .filter(|r| r.types.is_empty() || r.types.iter().any(|t| t == event_type))
            .map(|r| r.callback.clone())
            .collect();
        for callback in listeners {
            let event = event.clone();
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::error!("event listener panicked; dropping and continuing dispatch");
            }
        }
    }
}

fn event_type_name(event: &Event) -> &str {
    match event {
        Event::Circuit(e) => &e.base.event_type,
        Event::Stream(e) => &e.base.event_type,
        Event::ORConn(e) => &e.base.event_type,
        Event::Bandwidth(e) => &e.base.event_type,
        Event::Log(e) => &e.base.event_type,
        Event::Status(e) => &e.base.event_type,
        Event::AddrMap(e) => &e.base.event_type,
        Event::BuildTimeoutSet(e) => &e.base.event_type,
        Event::ClientsSeen(e) => &e.base.event_type,
        Event::ConfChanged(e) => &e.base.event_type,
        Event::NewConsensus(e) | Event::Ns(e) => &e.base.event_type,
        Event::NewDesc(e) => &e.base.event_type,
        Event::Guard(e) => &e.base.event_type,
        Event::Unknown { event_type, .. } => event_type,
    }
}

struct BoundedRing {
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
    dropped: AtomicU64,
    capacity: usize,
}

/// The bounded, drop-oldest-on-overflow dispatch queue (spec.md §5).
#[derive(Clone)]
pub struct DispatchQueue {
    ring: Arc<BoundedRing>,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Self {
        DispatchQueue {
            ring: Arc::new(BoundedRing {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                notify: Notify::new(),
                dropped: AtomicU64::new(0),
                capacity,
            }),
        }
    }

    /// Count of events dropped for overflow since startup.
    pub fn dropped_count(&self) -> u64 {
        self.ring.dropped.load(Ordering::Relaxed)
    }

    pub async fn push(&self, event: Event) {
        let mut queue = self.ring.queue.lock().await;
        if queue.len() >= self.ring.capacity {
            queue.pop_front();
            self.ring.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(dropped = self.ring.dropped.load(Ordering::Relaxed), "event dispatch queue overflowed");
        }
        queue.push_back(event);
        drop(queue);
        self.ring.notify.notify_one();
    }

    async fn pop(&self) -> Event {
        loop {
            {
                let mut queue = self.ring.queue.lock().await;
                if let Some(event) = queue.pop_front() {
                    return event;
                }
            }
            self.ring.notify.notified().await;
        }
    }

    /// Runs the dispatch loop until the queue is dropped. Spawned as its
    /// own task so a slow listener never blocks the reader.
    pub async fn run(self, registry: ListenerRegistry) {
        loop {
            let event = self.pop().await;
            registry.dispatch(event).await;
        }
    }
}
