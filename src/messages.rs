//! Deferred, typed messages delivered to every active system one frame
//! after posting.
//!
//! The bus is double-buffered: posts always land in the pending buffer,
//! and [`MessageBus::drain`] walks the frame buffer snapshotted at its
//! start. A message posted during a drain is therefore never seen by that
//! drain, and a system never observes its own message in the frame it
//! posted it.

use crossbeam::channel;
use downcast::{downcast, Any};

/// A datum posted in one frame and handed to every active system on the
/// next. Marker trait; downcast in handlers to the concrete types you
/// care about.
pub trait Message: Any {}
downcast!(dyn Message);

/// The engine-wide message queue. One per engine; systems and states post
/// through cloned [`MessagePoster`]s.
pub struct MessageBus {
    tx: channel::Sender<Box<dyn Message>>,
    rx: channel::Receiver<Box<dyn Message>>,
}

impl MessageBus {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// A cloneable posting handle onto this bus.
    pub fn poster(&self) -> MessagePoster {
        MessagePoster {
            tx: self.tx.clone(),
        }
    }

    /// Post a message, to be delivered on the next drain.
    pub fn post<M: Message>(&self, msg: M) {
        self.tx.send(Box::new(msg)).unwrap();
    }

    /// Hand `f` every message posted since the previous drain, in post
    /// order, exactly once each. Returns the number of messages delivered.
    ///
    /// The pending buffer is snapshotted first, so messages posted from
    /// inside `f` wait for the next drain.
    pub fn drain(&self, mut f: impl FnMut(&dyn Message)) -> usize {
        let frame: Vec<Box<dyn Message>> = self.rx.try_iter().collect();
        for msg in &frame {
            f(&**msg);
        }
        frame.len()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Posting end of a [`MessageBus`]. Cheap to clone; hand one to anything
/// that needs to emit messages.
#[derive(Clone)]
pub struct MessagePoster {
    tx: channel::Sender<Box<dyn Message>>,
}

impl MessagePoster {
    pub fn post<M: Message>(&self, msg: M) {
        self.tx.send(Box::new(msg)).unwrap();
    }
}
