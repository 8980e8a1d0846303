//! Real-time view synchronization.
//!
//! Each station subscribes to the shared store through one of the sanctioned
//! views: a filter predicate plus an ordering key. The contract is full
//! replacement: whenever an underlying change touches a subscriber's
//! matching set, the subscriber receives the entire matching set again and
//! re-renders from it. No diffs, and no server-held state beyond the filter
//! itself; dropping the subscription is the only cancellation.

use crate::error::{CoreError, CoreResult};
use crate::reservations::{Reservation, ReservationKind};
use crate::store::{Collection, MemoryStore, StoreEvent};
use crate::visits::{Visit, VisitStatus};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// A sanctioned filtered, ordered view over one shared collection.
pub trait View {
    type Record: Clone + PartialEq + Send;

    /// Which collection's changes wake this view.
    fn collection(&self) -> Collection;

    /// Compute the current matching set, ordered for display.
    fn snapshot(&self, store: &MemoryStore) -> CoreResult<Vec<Self::Record>>;
}

/// Station views over the visit collection, each ordered by intake time
/// ascending (the clinic queue order).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitView {
    /// Active in-clinic queue: everything between intake and billing.
    FrontDeskQueue,
    /// Visits waiting to be settled.
    Billing,
    /// Settled visits, eligible for document issuance.
    Documents,
    /// Visits in the consulting/treatment stages carrying a test order.
    Lab,
}

impl VisitView {
    fn matches(&self, visit: &Visit) -> bool {
        match self {
            VisitView::FrontDeskQueue => matches!(
                visit.status,
                VisitStatus::Reception | VisitStatus::Consulting | VisitStatus::Treatment
            ),
            VisitView::Billing => visit.status == VisitStatus::Completed,
            VisitView::Documents => visit.status == VisitStatus::Paid,
            VisitView::Lab => {
                visit.test.is_some()
                    && matches!(visit.status, VisitStatus::Consulting | VisitStatus::Treatment)
            }
        }
    }
}

impl View for VisitView {
    type Record = Visit;

    fn collection(&self) -> Collection {
        Collection::Visits
    }

    fn snapshot(&self, store: &MemoryStore) -> CoreResult<Vec<Visit>> {
        store.with_visits(|records| {
            let mut matching: Vec<Visit> = records
                .values()
                .filter(|v| self.matches(v))
                .cloned()
                .collect();
            matching.sort_by(|a, b| a.intake_at.cmp(&b.intake_at).then(a.id.cmp(&b.id)));
            matching
        })
    }
}

/// Station views over the reservation collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationView {
    /// The appointment list for one date, ordered by slot ascending.
    Appointments(NaiveDate),
    /// The inquiry inbox, newest first.
    InquiryInbox,
}

impl ReservationView {
    fn matches(&self, reservation: &Reservation) -> bool {
        match self {
            ReservationView::Appointments(date) => {
                reservation.kind == ReservationKind::Reservation
                    && reservation.date == Some(*date)
            }
            ReservationView::InquiryInbox => reservation.kind == ReservationKind::Inquiry,
        }
    }
}

impl View for ReservationView {
    type Record = Reservation;

    fn collection(&self) -> Collection {
        Collection::Reservations
    }

    fn snapshot(&self, store: &MemoryStore) -> CoreResult<Vec<Reservation>> {
        store.with_reservations(|records| {
            let mut matching: Vec<Reservation> = records
                .values()
                .filter(|r| self.matches(r))
                .cloned()
                .collect();
            match self {
                ReservationView::Appointments(_) => {
                    matching.sort_by(|a, b| {
                        a.slot.cmp(&b.slot).then(a.created_at.cmp(&b.created_at))
                    });
                }
                ReservationView::InquiryInbox => {
                    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                }
            }
            matching
        })
    }
}

/// Hands out live subscriptions over the shared store.
#[derive(Clone)]
pub struct Synchronizer {
    store: Arc<MemoryStore>,
}

impl Synchronizer {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Open a subscription for a view. The first delivery is the current
    /// snapshot; every later delivery is a full replacement triggered by a
    /// change to the matching set.
    pub fn subscribe<V: View>(&self, view: V) -> Subscription<V> {
        Subscription {
            store: Arc::clone(&self.store),
            changes: self.store.subscribe_changes(),
            view,
            last: None,
        }
    }
}

/// One station's live subscription.
pub struct Subscription<V: View> {
    store: Arc<MemoryStore>,
    changes: broadcast::Receiver<StoreEvent>,
    view: V,
    last: Option<Vec<V::Record>>,
}

impl<V: View> Subscription<V> {
    /// Wait for the next snapshot.
    ///
    /// Deliveries where the matching set is unchanged are suppressed, so a
    /// write that does not touch this view never wakes its station. Change
    /// events may be dropped under load; that only skips intermediate
    /// wake-ups, since every delivery is recomputed from the store.
    pub async fn next_snapshot(&mut self) -> CoreResult<Vec<V::Record>> {
        if self.last.is_none() {
            let snapshot = self.view.snapshot(&self.store)?;
            self.last = Some(snapshot.clone());
            return Ok(snapshot);
        }

        loop {
            match self.changes.recv().await {
                Ok(event) if event.collection != self.view.collection() => continue,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => {
                    return Err(CoreError::Transient("store change feed closed".into()));
                }
            }

            let snapshot = self.view.snapshot(&self.store)?;
            if self.last.as_ref() == Some(&snapshot) {
                continue;
            }
            self.last = Some(snapshot.clone());
            return Ok(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::visits::{ClinicalNotes, PatientRef, VisitService};
    use clinic_types::NonEmptyText;
    use uuid::Uuid;

    fn setup() -> (Arc<MemoryStore>, VisitService, Synchronizer) {
        let store = Arc::new(MemoryStore::new());
        let config = Arc::new(CoreConfig::default());
        let visits = VisitService::new(Arc::clone(&store), config);
        let sync = Synchronizer::new(Arc::clone(&store));
        (store, visits, sync)
    }

    fn patient(name: &str) -> PatientRef {
        PatientRef {
            id: Uuid::new_v4(),
            name: NonEmptyText::new(name).unwrap(),
        }
    }

    fn walk_to_completed(visits: &VisitService, name: &str) -> Visit {
        let v = visits.intake(patient(name)).expect("intake");
        let v = visits.call(v.id, v.version).expect("call");
        let v = visits
            .send_forward(v.id, v.version, ClinicalNotes::default())
            .expect("forward");
        visits.finish_treatment(v.id, v.version).expect("finish")
    }

    #[tokio::test]
    async fn first_delivery_is_the_current_snapshot() {
        let (_store, visits, sync) = setup();
        let v = visits.intake(patient("A")).expect("intake");

        let mut sub = sync.subscribe(VisitView::FrontDeskQueue);
        let snapshot = sub.next_snapshot().await.expect("initial snapshot");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, v.id);
    }

    #[tokio::test]
    async fn queue_is_ordered_by_intake_time() {
        let (_store, visits, sync) = setup();
        let first = visits.intake(patient("First")).expect("intake");
        let second = visits.intake(patient("Second")).expect("intake");

        let mut sub = sync.subscribe(VisitView::FrontDeskQueue);
        let snapshot = sub.next_snapshot().await.expect("snapshot");
        let ids: Vec<_> = snapshot.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn payment_moves_a_visit_from_billing_to_documents() {
        let (_store, visits, sync) = setup();
        let completed = walk_to_completed(&visits, "Hong Gildong");

        let mut billing = sync.subscribe(VisitView::Billing);
        let mut documents = sync.subscribe(VisitView::Documents);

        let before = billing.next_snapshot().await.expect("billing snapshot");
        assert_eq!(before.len(), 1);
        assert!(documents
            .next_snapshot()
            .await
            .expect("documents snapshot")
            .is_empty());

        visits
            .process_payment(completed.id, completed.version)
            .expect("payment");

        let after_billing = billing.next_snapshot().await.expect("billing update");
        assert!(after_billing.is_empty(), "paid visit leaves the billing view");

        let after_documents = documents.next_snapshot().await.expect("documents update");
        assert_eq!(after_documents.len(), 1);
        assert_eq!(after_documents[0].id, completed.id);
        assert_eq!(after_documents[0].status, VisitStatus::Paid);
    }

    #[tokio::test]
    async fn snapshots_are_full_replacements_not_diffs() {
        let (_store, visits, sync) = setup();
        let mut sub = sync.subscribe(VisitView::FrontDeskQueue);

        visits.intake(patient("A")).expect("intake");
        let first = sub.next_snapshot().await.expect("first");
        assert_eq!(first.len(), 1);

        visits.intake(patient("B")).expect("intake");
        let second = sub.next_snapshot().await.expect("second");
        // The new delivery carries the whole matching set again.
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn unrelated_changes_do_not_wake_the_view() {
        let (_store, visits, sync) = setup();
        let v = visits.intake(patient("A")).expect("intake");

        let mut documents = sync.subscribe(VisitView::Documents);
        assert!(documents.next_snapshot().await.expect("initial").is_empty());

        // A front-desk change leaves the documents view's matching set empty.
        visits.call(v.id, v.version).expect("call");

        tokio::select! {
            _ = documents.next_snapshot() => panic!("documents view must stay quiet"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
        }
    }

    #[tokio::test]
    async fn lab_view_tracks_visits_with_open_test_orders() {
        let (_store, visits, sync) = setup();
        let v = visits.intake(patient("A")).expect("intake");
        let v = visits.call(v.id, v.version).expect("call");

        let mut lab = sync.subscribe(VisitView::Lab);
        assert!(lab.next_snapshot().await.expect("initial").is_empty());

        let v = visits
            .order_test(v.id, v.version, "x-ray".into())
            .expect("order");
        let snapshot = lab.next_snapshot().await.expect("after order");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, v.id);
    }
}
