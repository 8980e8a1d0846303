//! Reservation records and the booking transaction.
//!
//! A reservation is a patient-facing request for a slot (or a free-form
//! inquiry). Identity deduplication, the capacity check and the insert all
//! execute inside a single store transaction, so two requesters racing for
//! the last unit of a slot cannot both commit.

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::schedule;
use crate::store::MemoryStore;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clinic_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Who is asking for the reservation.
///
/// Authenticated requesters carry a stable account reference from the
/// identity provider; guests carry only the (name, contact) tuple. The tuple
/// is always present so the duplicate guard can catch the same person
/// booking under a different account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub account: Option<Uuid>,
    pub name: NonEmptyText,
    pub contact: NonEmptyText,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationKind {
    Reservation,
    Inquiry,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    New,
    Confirmed,
}

impl ReservationStatus {
    /// Whether this status counts against the one-active-reservation rule.
    pub fn is_active(self) -> bool {
        matches!(self, ReservationStatus::New | ReservationStatus::Confirmed)
    }
}

/// A stored reservation or inquiry.
///
/// `date` and `slot` are present exactly when `kind` is
/// [`ReservationKind::Reservation`]; inquiries carry neither and never count
/// against slot capacity. Cancellation is hard deletion, so every stored
/// record is live.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub identity: Identity,
    pub date: Option<NaiveDate>,
    pub slot: Option<NaiveTime>,
    pub note: String,
    pub consent_given: bool,
    pub kind: ReservationKind,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A patient or staff submission, before it becomes a stored record.
#[derive(Clone, Debug)]
pub struct ReservationRequest {
    pub identity: Identity,
    pub kind: ReservationKind,
    pub date: Option<NaiveDate>,
    pub slot: Option<NaiveTime>,
    pub note: String,
    pub consent_given: bool,
}

/// Fields a requester may change on an existing record.
///
/// Identity and ownership fields are never touched on edit.
#[derive(Clone, Debug)]
pub struct ReservationUpdate {
    pub date: Option<NaiveDate>,
    pub slot: Option<NaiveTime>,
    pub note: String,
}

/// Duplicate guard: find an active reservation held by the same person.
///
/// Two sequential checks, both over records of kind `Reservation` with an
/// active status, across any date:
///
/// 1. by authenticated-account reference;
/// 2. by exact (name, contact) tuple, which covers guests and the case where
///    the same person reserves under a different account.
///
/// `exclude` removes the edit target from its own conflict check.
fn active_conflict(
    records: &HashMap<Uuid, Reservation>,
    identity: &Identity,
    exclude: Option<Uuid>,
) -> Option<Uuid> {
    let candidates = || {
        records.values().filter(|r| {
            Some(r.id) != exclude
                && r.kind == ReservationKind::Reservation
                && r.status.is_active()
        })
    };

    if let Some(account) = identity.account {
        if let Some(hit) = candidates().find(|r| r.identity.account == Some(account)) {
            return Some(hit.id);
        }
    }

    candidates()
        .find(|r| r.identity.name == identity.name && r.identity.contact == identity.contact)
        .map(|r| r.id)
}

/// Count active reservations already holding a (date, slot) pair.
fn booked_count(
    records: &HashMap<Uuid, Reservation>,
    date: NaiveDate,
    slot: NaiveTime,
    exclude: Option<Uuid>,
) -> u32 {
    records
        .values()
        .filter(|r| {
            Some(r.id) != exclude
                && r.kind == ReservationKind::Reservation
                && r.status.is_active()
                && r.date == Some(date)
                && r.slot == Some(slot)
        })
        .count() as u32
}

/// Booking operations over the shared reservation collection.
#[derive(Clone)]
pub struct ReservationService {
    store: Arc<MemoryStore>,
    config: Arc<CoreConfig>,
}

impl ReservationService {
    pub fn new(store: Arc<MemoryStore>, config: Arc<CoreConfig>) -> Self {
        Self { store, config }
    }

    /// Create a reservation from a patient submission (status `new`).
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] if consent is missing, or a
    ///   reservation-kind submission has no date/slot or names a slot that is
    ///   not bookable on that date;
    /// - [`CoreError::Conflict`] if the requester already holds an active
    ///   reservation (the error carries the existing record's id);
    /// - [`CoreError::Capacity`] if the slot is fully booked.
    pub fn create(&self, request: ReservationRequest) -> CoreResult<Reservation> {
        self.commit_new(request, ReservationStatus::New)
    }

    /// Create a reservation on behalf of staff (status `confirmed` from the start).
    pub fn create_confirmed(&self, request: ReservationRequest) -> CoreResult<Reservation> {
        self.commit_new(request, ReservationStatus::Confirmed)
    }

    fn commit_new(
        &self,
        request: ReservationRequest,
        status: ReservationStatus,
    ) -> CoreResult<Reservation> {
        if !request.consent_given {
            return Err(CoreError::Validation(
                "consent to data collection is required".into(),
            ));
        }
        let booking = self.validated_booking(request.kind, request.date, request.slot)?;

        self.store.mutate_reservations(|records| {
            if request.kind == ReservationKind::Reservation {
                if let Some(existing) = active_conflict(records, &request.identity, None) {
                    return Err(CoreError::Conflict { existing });
                }
            }
            if let Some((date, slot)) = booking {
                if booked_count(records, date, slot, None) >= self.config.slot_capacity() {
                    return Err(CoreError::Capacity { date, slot });
                }
            }

            let now = Utc::now();
            let reservation = Reservation {
                id: Uuid::new_v4(),
                identity: request.identity.clone(),
                date: request.date,
                slot: request.slot,
                note: request.note.clone(),
                consent_given: true,
                kind: request.kind,
                status,
                created_at: now,
                updated_at: now,
            };
            records.insert(reservation.id, reservation.clone());
            tracing::info!(id = %reservation.id, kind = ?reservation.kind, "reservation created");
            Ok(reservation)
        })
    }

    /// Staff confirmation of a pending reservation.
    pub fn confirm(&self, id: Uuid) -> CoreResult<Reservation> {
        self.store.mutate_reservations(|records| {
            let record = records.get_mut(&id).ok_or(CoreError::NotFound(id))?;
            record.status = ReservationStatus::Confirmed;
            record.updated_at = Utc::now();
            Ok(record.clone())
        })
    }

    /// Overwrite the date/slot/note of an existing record in place.
    ///
    /// Identity and ownership fields are preserved. Unlike the system this
    /// replaces, the edit path re-runs the duplicate guard (with the edit
    /// target excluded from its own conflict check) and re-checks capacity at
    /// the new (date, slot).
    pub fn modify(&self, id: Uuid, update: ReservationUpdate) -> CoreResult<Reservation> {
        self.store.mutate_reservations(|records| {
            let current = records.get(&id).ok_or(CoreError::NotFound(id))?;
            let kind = current.kind;
            let identity = current.identity.clone();
            let booking = self.validated_booking(kind, update.date, update.slot)?;

            if kind == ReservationKind::Reservation {
                if let Some(existing) = active_conflict(records, &identity, Some(id)) {
                    return Err(CoreError::Conflict { existing });
                }
            }
            if let Some((date, slot)) = booking {
                if booked_count(records, date, slot, Some(id)) >= self.config.slot_capacity() {
                    return Err(CoreError::Capacity { date, slot });
                }
            }

            let record = records.get_mut(&id).ok_or(CoreError::NotFound(id))?;
            record.date = update.date;
            record.slot = update.slot;
            record.note = update.note.clone();
            record.updated_at = Utc::now();
            Ok(record.clone())
        })
    }

    /// Cancel a reservation: permanent removal, no retained history.
    pub fn cancel(&self, id: Uuid) -> CoreResult<()> {
        self.store.mutate_reservations(|records| {
            records.remove(&id).ok_or(CoreError::NotFound(id))?;
            tracing::info!(%id, "reservation cancelled and removed");
            Ok(())
        })
    }

    /// Fetch a single record.
    pub fn get(&self, id: Uuid) -> CoreResult<Reservation> {
        self.store
            .with_reservations(|records| records.get(&id).cloned())?
            .ok_or(CoreError::NotFound(id))
    }

    /// All reservation-kind records for a date, for capacity annotation.
    pub fn reservations_on(&self, date: NaiveDate) -> CoreResult<Vec<Reservation>> {
        self.store.with_reservations(|records| {
            records
                .values()
                .filter(|r| r.kind == ReservationKind::Reservation && r.date == Some(date))
                .cloned()
                .collect()
        })
    }

    /// Validate the (date, slot) pair for the submission kind.
    ///
    /// Reservation-kind submissions must name a date and a slot that the
    /// calendar actually generates for that date; inquiries carry neither.
    fn validated_booking(
        &self,
        kind: ReservationKind,
        date: Option<NaiveDate>,
        slot: Option<NaiveTime>,
    ) -> CoreResult<Option<(NaiveDate, NaiveTime)>> {
        match kind {
            ReservationKind::Inquiry => Ok(None),
            ReservationKind::Reservation => {
                let date = date.ok_or_else(|| {
                    CoreError::Validation("a reservation requires a date".into())
                })?;
                let slot = slot.ok_or_else(|| {
                    CoreError::Validation("a reservation requires a time slot".into())
                })?;
                if !schedule::generate(date, self.config.schedule()).contains(&slot) {
                    return Err(CoreError::Validation(format!(
                        "slot {slot} is not bookable on {date}"
                    )));
                }
                Ok(Some((date, slot)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoreConfig, FeeSchedule, ScheduleConfig};

    fn service() -> ReservationService {
        ReservationService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(CoreConfig::default()),
        )
    }

    fn identity(name: &str, contact: &str) -> Identity {
        Identity {
            account: None,
            name: NonEmptyText::new(name).unwrap(),
            contact: NonEmptyText::new(contact).unwrap(),
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn request(identity: Identity, date: NaiveDate, slot: (u32, u32)) -> ReservationRequest {
        ReservationRequest {
            identity,
            kind: ReservationKind::Reservation,
            date: Some(date),
            slot: NaiveTime::from_hms_opt(slot.0, slot.1, 0),
            note: String::new(),
            consent_given: true,
        }
    }

    #[test]
    fn create_requires_consent() {
        let svc = service();
        let mut req = request(identity("A", "010-1111-2222"), monday(), (10, 0));
        req.consent_given = false;

        let err = svc.create(req).expect_err("missing consent must fail");
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn create_requires_date_and_slot_for_reservations() {
        let svc = service();
        let mut req = request(identity("A", "010-1111-2222"), monday(), (10, 0));
        req.slot = None;

        let err = svc.create(req).expect_err("missing slot must fail");
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn inquiry_needs_no_date_or_slot() {
        let svc = service();
        let req = ReservationRequest {
            identity: identity("A", "010-1111-2222"),
            kind: ReservationKind::Inquiry,
            date: None,
            slot: None,
            note: "Do you treat knee pain?".into(),
            consent_given: true,
        };

        let record = svc.create(req).expect("inquiry should be accepted");
        assert_eq!(record.status, ReservationStatus::New);
        assert!(record.date.is_none());
    }

    #[test]
    fn rejects_slot_outside_the_calendar() {
        let svc = service();
        // 13:00 falls inside the break window on an ordinary day.
        let err = svc
            .create(request(identity("A", "010-1111-2222"), monday(), (13, 0)))
            .expect_err("break-window slot must be rejected");
        assert!(matches!(err, CoreError::Validation(_)));

        // Sunday is the closure day; nothing is bookable.
        let sunday = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let err = svc
            .create(request(identity("A", "010-1111-2222"), sunday, (10, 0)))
            .expect_err("closure-day slot must be rejected");
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn second_active_reservation_for_same_identity_conflicts() {
        let svc = service();
        let me = identity("Hong Gildong", "010-1234-5678");

        let first = svc
            .create(request(me.clone(), monday(), (14, 0)))
            .expect("first booking");

        // Different date and time, same person.
        let other_day = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let err = svc
            .create(request(me, other_day, (9, 30)))
            .expect_err("duplicate must conflict");

        match err {
            CoreError::Conflict { existing } => assert_eq!(existing, first.id),
            other => panic!("expected Conflict, got {other:?}"),
        }

        // No second record was persisted.
        assert_eq!(svc.reservations_on(other_day).unwrap().len(), 0);
    }

    #[test]
    fn same_person_under_different_account_is_caught_by_tuple_match() {
        let svc = service();
        let mut with_account = identity("Hong Gildong", "010-1234-5678");
        with_account.account = Some(Uuid::new_v4());

        svc.create(request(with_account.clone(), monday(), (14, 0)))
            .expect("first booking");

        let mut other_account = with_account.clone();
        other_account.account = Some(Uuid::new_v4());
        let err = svc
            .create(request(other_account, monday(), (15, 0)))
            .expect_err("tuple match must conflict");
        assert!(matches!(err, CoreError::Conflict { .. }));
    }

    #[test]
    fn cancelled_reservation_frees_the_identity() {
        let svc = service();
        let me = identity("A", "010-1111-2222");

        let first = svc
            .create(request(me.clone(), monday(), (14, 0)))
            .expect("first booking");
        svc.cancel(first.id).expect("cancel");

        svc.create(request(me, monday(), (15, 0)))
            .expect("rebooking after cancellation should succeed");
    }

    #[test]
    fn capacity_is_enforced_at_commit_time() {
        let svc = service();

        for i in 0..6 {
            svc.create(request(
                identity(&format!("Patient {i}"), &format!("010-0000-000{i}")),
                monday(),
                (10, 0),
            ))
            .expect("slot should admit up to capacity");
        }

        let err = svc
            .create(request(identity("Latecomer", "010-9999-9999"), monday(), (10, 0)))
            .expect_err("seventh booking must hit capacity");
        match err {
            CoreError::Capacity { date, slot } => {
                assert_eq!(date, monday());
                assert_eq!(slot, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
            }
            other => panic!("expected Capacity, got {other:?}"),
        }
    }

    #[test]
    fn concurrent_creates_admit_at_most_capacity() {
        let svc = ReservationService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(
                CoreConfig::new(ScheduleConfig::default(), FeeSchedule::default(), 2)
                    .expect("valid config"),
            ),
        );

        let mut outcomes = Vec::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let svc = svc.clone();
                    scope.spawn(move || {
                        svc.create(request(
                            identity(&format!("Racer {i}"), &format!("010-7777-000{i}")),
                            monday(),
                            (11, 0),
                        ))
                    })
                })
                .collect();
            for handle in handles {
                outcomes.push(handle.join().expect("thread panicked"));
            }
        });

        let admitted = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(admitted, 2, "exactly capacity writers may commit");
        assert_eq!(svc.reservations_on(monday()).unwrap().len(), 2);
    }

    #[test]
    fn modify_rechecks_capacity_and_excludes_self() {
        let svc = service();
        let me = identity("Mover", "010-3333-4444");
        let booked = svc
            .create(request(me, monday(), (9, 0)))
            .expect("initial booking");

        // Fill 10:00 to capacity with other people.
        for i in 0..6 {
            svc.create(request(
                identity(&format!("Other {i}"), &format!("010-5555-000{i}")),
                monday(),
                (10, 0),
            ))
            .expect("filling slot");
        }

        // Moving onto the full slot is refused.
        let err = svc
            .modify(
                booked.id,
                ReservationUpdate {
                    date: Some(monday()),
                    slot: NaiveTime::from_hms_opt(10, 0, 0),
                    note: String::new(),
                },
            )
            .expect_err("full slot must refuse the move");
        assert!(matches!(err, CoreError::Capacity { .. }));

        // Re-saving the record's own slot must not conflict with itself.
        let kept = svc
            .modify(
                booked.id,
                ReservationUpdate {
                    date: Some(monday()),
                    slot: NaiveTime::from_hms_opt(9, 0, 0),
                    note: "keep me".into(),
                },
            )
            .expect("self-preserving edit should pass the guard");
        assert_eq!(kept.note, "keep me");
        assert_eq!(kept.identity, booked.identity);
    }

    #[test]
    fn cancel_is_permanent() {
        let svc = service();
        let record = svc
            .create(request(identity("A", "010-1111-2222"), monday(), (14, 0)))
            .expect("booking");

        svc.cancel(record.id).expect("cancel");
        assert!(matches!(
            svc.get(record.id),
            Err(CoreError::NotFound(id)) if id == record.id
        ));
        assert!(matches!(
            svc.cancel(record.id),
            Err(CoreError::NotFound(_))
        ));
    }
}
