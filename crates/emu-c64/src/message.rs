//! Notifications from the emulator to the host.
//!
//! The execution thread posts a [`Message`] whenever the machine changes
//! state in a way a GUI cares about. Messages go to a bounded queue the
//! host polls, and to an optional listener callback invoked on the posting
//! thread.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Queue capacity. When full, the oldest message is dropped.
pub const MESSAGE_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    PowerOn,
    Run,
    Halt,
    Reset,
    WarpOn,
    WarpOff,
    CartridgeAttached,
    CartridgeDetached,
    SnapshotTaken,
    SnapshotRestored,
}

type Listener = Box<dyn Fn(Message) + Send>;

/// Bounded, thread-safe message queue.
#[derive(Default)]
pub struct MessageQueue {
    queue: Mutex<VecDeque<Message>>,
    listener: Mutex<Option<Listener>>,
}

/// Queue contents are plain data, so a panic while holding the lock
/// cannot leave them inconsistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MessageQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a message to the queue and the listener.
    pub fn put(&self, message: Message) {
        {
            let mut queue = lock(&self.queue);
            if queue.len() == MESSAGE_QUEUE_CAPACITY {
                queue.pop_front();
            }
            queue.push_back(message);
        }
        if let Some(listener) = lock(&self.listener).as_ref() {
            listener(message);
        }
    }

    /// Oldest pending message, if any.
    pub fn get(&self) -> Option<Message> {
        lock(&self.queue).pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.queue).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.queue).is_empty()
    }

    pub fn set_listener(&self, listener: impl Fn(Message) + Send + 'static) {
        *lock(&self.listener) = Some(Box::new(listener));
    }

    pub fn clear_listener(&self) {
        *lock(&self.listener) = None;
    }
}
