//! The authoritative in-process record store.
//!
//! The reservation and visit collections are the only shared mutable state
//! in the system, and `MemoryStore` is their single owner: station views
//! never hold anything but snapshots pushed out through the synchronizer.
//! Mutations run as closures under one write-lock acquisition per
//! collection, which is what lets booking perform its duplicate, capacity
//! and insert steps as a single atomic unit.
//!
//! Every committed mutation publishes a change event on a broadcast channel;
//! subscriptions re-read and re-deliver full snapshots from it. Failed
//! transactions publish nothing.

use crate::error::{CoreError, CoreResult};
use crate::reservations::Reservation;
use crate::visits::Visit;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

/// The two shared collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collection {
    Reservations,
    Visits,
}

/// Published after every committed mutation.
#[derive(Clone, Copy, Debug)]
pub struct StoreEvent {
    pub collection: Collection,
}

/// Buffered change events per subscriber. A lagging subscriber only loses
/// intermediate wake-ups, never data: snapshots are recomputed from the
/// collections themselves.
const CHANGE_BUFFER: usize = 64;

pub struct MemoryStore {
    reservations: RwLock<HashMap<Uuid, Reservation>>,
    visits: RwLock<HashMap<Uuid, Visit>>,
    changes: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            reservations: RwLock::new(HashMap::new()),
            visits: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Subscribe to change events. Events carry no payload; subscribers
    /// re-read the collection they care about.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StoreEvent> {
        self.changes.subscribe()
    }

    /// Read the reservation collection.
    pub fn with_reservations<R>(
        &self,
        f: impl FnOnce(&HashMap<Uuid, Reservation>) -> R,
    ) -> CoreResult<R> {
        let guard = self
            .reservations
            .read()
            .map_err(|_| CoreError::Transient("reservation collection is poisoned".into()))?;
        Ok(f(&guard))
    }

    /// Read the visit collection.
    pub fn with_visits<R>(&self, f: impl FnOnce(&HashMap<Uuid, Visit>) -> R) -> CoreResult<R> {
        let guard = self
            .visits
            .read()
            .map_err(|_| CoreError::Transient("visit collection is poisoned".into()))?;
        Ok(f(&guard))
    }

    /// Run a transaction over the reservation collection.
    ///
    /// The closure executes under the collection's write lock; an `Err`
    /// aborts the transaction and suppresses the change event. Closures must
    /// not mutate before deciding to fail.
    pub fn mutate_reservations<T>(
        &self,
        f: impl FnOnce(&mut HashMap<Uuid, Reservation>) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let result = {
            let mut guard = self
                .reservations
                .write()
                .map_err(|_| CoreError::Transient("reservation collection is poisoned".into()))?;
            f(&mut guard)
        };
        if result.is_ok() {
            self.publish(Collection::Reservations);
        }
        result
    }

    /// Run a transaction over the visit collection.
    pub fn mutate_visits<T>(
        &self,
        f: impl FnOnce(&mut HashMap<Uuid, Visit>) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let result = {
            let mut guard = self
                .visits
                .write()
                .map_err(|_| CoreError::Transient("visit collection is poisoned".into()))?;
            f(&mut guard)
        };
        if result.is_ok() {
            self.publish(Collection::Visits);
        }
        result
    }

    fn publish(&self, collection: Collection) {
        // Send only fails when no subscriber exists, which is fine.
        if self.changes.send(StoreEvent { collection }).is_err() {
            tracing::trace!(?collection, "change event dropped, no subscribers");
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
