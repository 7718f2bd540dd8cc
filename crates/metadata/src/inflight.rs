//! Per-key in-flight registry.
//!
//! `acquire` is a single atomic insert-if-absent. The caller that inserts
//! becomes the leader and gets a [`LeaderGuard`]; everyone else gets a
//! [`Waiter`] bound to the leader's one-shot completion value. Dropping the
//! guard removes the entry on every path (return, error, cancellation,
//! unwind), so a key can never stay locked once its owner is gone.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

struct Slot<V> {
    id: u64,
    done: watch::Receiver<Option<V>>,
}

pub struct InFlightRegistry<K, V> {
    entries: Arc<DashMap<K, Slot<V>>>,
    next_id: Arc<AtomicU64>,
}

impl<K, V> Clone for InFlightRegistry<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<K: Eq + Hash, V> Default for InFlightRegistry<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<K: Eq + Hash, V> fmt::Debug for InFlightRegistry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("in_flight", &self.entries.len())
            .finish()
    }
}

pub enum Acquired<K: Eq + Hash, V> {
    Leader(LeaderGuard<K, V>),
    Waiter(Waiter<V>),
}

impl<K, V> InFlightRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, key: K) -> Acquired<K, V> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(slot) => Acquired::Waiter(Waiter {
                done: slot.get().done.clone(),
            }),
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                vacant.insert(Slot { id, done: rx });
                Acquired::Leader(LeaderGuard {
                    key,
                    id,
                    tx,
                    entries: self.entries.clone(),
                })
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Exclusive right to run the operation for one key.
pub struct LeaderGuard<K: Eq + Hash, V> {
    key: K,
    id: u64,
    tx: watch::Sender<Option<V>>,
    entries: Arc<DashMap<K, Slot<V>>>,
}

impl<K: Eq + Hash, V> LeaderGuard<K, V> {
    /// Release the key and publish the result to every waiter. The entry is
    /// gone before anyone wakes, so a woken waiter that acquires again leads.
    pub fn complete(self, value: V) {
        let id = self.id;
        self.entries.remove_if(&self.key, |_, slot| slot.id == id);
        self.tx.send_replace(Some(value));
    }
}

impl<K: Eq + Hash, V> Drop for LeaderGuard<K, V> {
    fn drop(&mut self) {
        let id = self.id;
        self.entries.remove_if(&self.key, |_, slot| slot.id == id);
    }
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitResult<V> {
    Done(V),
    /// The leader went away without publishing a value.
    Abandoned,
    /// The waiting caller's own token fired.
    Cancelled,
}

pub struct Waiter<V> {
    done: watch::Receiver<Option<V>>,
}

impl<V: Clone> Waiter<V> {
    /// Block until the leader publishes, the leader is dropped, or `cancel`
    /// fires. Cancelling a waiter has no effect on the leader.
    pub async fn wait(mut self, cancel: &CancellationToken) -> WaitResult<V> {
        let done = &mut self.done;
        let settled = async move {
            done.wait_for(Option::is_some)
                .await
                .map(|value| (*value).clone())
                .ok()
                .flatten()
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => WaitResult::Cancelled,
            value = settled => match value {
                Some(v) => WaitResult::Done(v),
                None => WaitResult::Abandoned,
            },
        }
    }
}
