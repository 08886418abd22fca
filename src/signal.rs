//! Typed multicast callbacks with scoped disconnection.
//!
//! A [`Signal`] holds an ordered list of callbacks; [`Signal::publish`]
//! invokes each in connect order. Connecting hands back a [`Connection`]
//! that removes the callback when released, and [`ScopedConnection`]
//! releases on drop. Publish is reentrancy-safe: connects and disconnects
//! issued from inside a callback are queued and applied after the walk
//! finishes, so the slot list is never mutated under iteration.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Slot<T> {
    id: u64,
    callback: Callback<T>,
}

enum PendingOp<T> {
    Connect(Slot<T>),
    Disconnect(u64),
}

struct SignalInner<T> {
    slots: RwLock<Vec<Slot<T>>>,
    pending: Mutex<Vec<PendingOp<T>>>,
    /// Number of publishes currently walking the slot list. The list is
    /// only write-locked while this is zero.
    publish_depth: AtomicUsize,
    next_id: AtomicU64,
}

impl<T> SignalInner<T> {
    fn apply_pending(&self) {
        let mut pending = self.pending.lock().unwrap();
        if pending.is_empty() {
            return;
        }
        let mut slots = self.slots.write().unwrap();
        for op in pending.drain(..) {
            match op {
                PendingOp::Connect(slot) => slots.push(slot),
                PendingOp::Disconnect(id) => slots.retain(|s| s.id != id),
            }
        }
    }
}

/// Type-erased handle to a signal, so [`Connection`] doesn't need the
/// callback argument type.
trait Disconnect {
    fn disconnect(&self, id: u64);
}

impl<T> Disconnect for SignalInner<T> {
    fn disconnect(&self, id: u64) {
        if self.publish_depth.load(Ordering::Acquire) > 0 {
            self.pending.lock().unwrap().push(PendingOp::Disconnect(id));
        } else {
            self.slots.write().unwrap().retain(|s| s.id != id);
            self.apply_pending();
        }
    }
}

/// An ordered multicast of callbacks taking `&T`.
///
/// Cloning a signal clones the *handle*; both clones publish to and
/// connect into the same slot list.
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                slots: RwLock::new(Vec::new()),
                pending: Mutex::new(Vec::new()),
                publish_depth: AtomicUsize::new(0),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Connect a callback, to be invoked on every subsequent publish.
    ///
    /// Releasing the returned [`Connection`] removes it. Connecting from
    /// inside a publish of this same signal takes effect once the publish
    /// finishes.
    pub fn connect(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Connection {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Slot {
            id,
            callback: Box::new(f),
        };
        if self.inner.publish_depth.load(Ordering::Acquire) > 0 {
            self.inner.pending.lock().unwrap().push(PendingOp::Connect(slot));
        } else {
            self.inner.slots.write().unwrap().push(slot);
        }

        let dyn_inner: Arc<dyn Disconnect + Send + Sync> = self.inner.clone();
        let weak: Weak<dyn Disconnect + Send + Sync> = Arc::downgrade(&dyn_inner);
        Connection {
            signal: Some((weak, id)),
        }
    }

    /// Invoke every connected callback in connect order.
    pub fn publish(&self, arg: &T) {
        self.inner.publish_depth.fetch_add(1, Ordering::AcqRel);
        {
            let slots = self.inner.slots.read().unwrap();
            for slot in slots.iter() {
                (slot.callback)(arg);
            }
        }
        if self.inner.publish_depth.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.apply_pending();
        }
    }

    /// How many callbacks are currently connected.
    pub fn len(&self) -> usize {
        self.inner.slots.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Undoes one [`Signal::connect`] when released. Dropping a `Connection`
/// without releasing leaves the callback connected forever; wrap it in a
/// [`ScopedConnection`] if you want drop-to-disconnect.
#[derive(Default)]
pub struct Connection {
    signal: Option<(Weak<dyn Disconnect + Send + Sync>, u64)>,
}

impl Connection {
    /// Remove the callback. Idempotent; a no-op if the signal is gone.
    pub fn release(&mut self) {
        if let Some((weak, id)) = self.signal.take() {
            if let Some(signal) = weak.upgrade() {
                signal.disconnect(id);
            }
        }
    }
}

/// A [`Connection`] that releases when dropped.
#[derive(Default)]
pub struct ScopedConnection {
    conn: Connection,
}

impl ScopedConnection {
    pub fn release(&mut self) {
        self.conn.release();
    }
}

impl From<Connection> for ScopedConnection {
    fn from(conn: Connection) -> Self {
        Self { conn }
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        self.conn.release();
    }
}
