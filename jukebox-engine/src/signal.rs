//! One-shot broadcast signal
//!
//! Settles at most once; the first value wins and is never replaced. Any
//! number of waiters observe the value, including waiters that arrive after
//! it was set. Clones share the same underlying signal.

use std::sync::Arc;
use tokio::sync::watch;

pub struct Signal<T> {
    tx: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone> Signal<T> {
    /// Create an unsettled signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Create a signal that is already settled with `value`.
    pub fn settled(value: T) -> Self {
        let (tx, _) = watch::channel(Some(value));
        Self { tx: Arc::new(tx) }
    }

    /// Settle the signal. Returns false (and drops `value`) if it was
    /// already settled.
    pub fn set(&self, value: T) -> bool {
        let mut value = Some(value);
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = value.take();
            true
        })
    }

    /// Current value, if settled.
    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until the signal settles and return its value.
    pub async fn wait(&self) -> T {
        let mut rx = self.tx.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(value) = current {
                return value;
            }
            if rx.changed().await.is_err() {
                // Unreachable while `self` holds the sender; never settle.
                return std::future::pending().await;
            }
        }
    }

    /// True when both handles refer to the same signal.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

impl<T: Clone> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Signal").field(&self.get()).finish()
    }
}
