//! Visit records and the in-clinic workflow state machine.
//!
//! A visit tracks one patient's progression through the stations for a
//! single encounter. The primary status only ever moves forward through the
//! central transition table; `paid` is terminal and the record then becomes
//! read-only history for document issuance. Test-order tracking is a
//! secondary flag orthogonal to the primary status.
//!
//! Every mutation carries the caller's observed record version. Stations
//! share these records, and without the version check two stations editing
//! the same visit would silently overwrite each other.

use crate::config::{CoreConfig, FeeSchedule};
use crate::error::{CoreError, CoreResult};
use crate::store::MemoryStore;
use chrono::{DateTime, Utc};
use clinic_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Primary workflow state. Closed set; transitions only via [`VisitStatus::next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Reception,
    Consulting,
    Treatment,
    Completed,
    Paid,
}

impl VisitStatus {
    /// The central transition table.
    ///
    /// Every sanctioned action maps exactly one source state to one target
    /// state; anything else is rejected at the mutation site. There is no
    /// backward edge and no exit from `Paid`.
    pub fn next(self, action: VisitAction) -> Option<VisitStatus> {
        match (self, action) {
            (VisitStatus::Reception, VisitAction::Call) => Some(VisitStatus::Consulting),
            (VisitStatus::Consulting, VisitAction::SendForward) => Some(VisitStatus::Treatment),
            (VisitStatus::Treatment, VisitAction::FinishTreatment) => Some(VisitStatus::Completed),
            (VisitStatus::Completed, VisitAction::ProcessPayment) => Some(VisitStatus::Paid),
            _ => None,
        }
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VisitStatus::Reception => "reception",
            VisitStatus::Consulting => "consulting",
            VisitStatus::Treatment => "treatment",
            VisitStatus::Completed => "completed",
            VisitStatus::Paid => "paid",
        };
        write!(f, "{name}")
    }
}

/// The sanctioned primary-status mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitAction {
    /// Reception station calls the patient into the consulting room.
    Call,
    /// Consulting station sends the patient on to treatment.
    SendForward,
    /// Treatment station releases the patient to billing.
    FinishTreatment,
    /// Billing station settles the invoice.
    ProcessPayment,
}

impl fmt::Display for VisitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VisitAction::Call => "call",
            VisitAction::SendForward => "send forward",
            VisitAction::FinishTreatment => "finish treatment",
            VisitAction::ProcessPayment => "process payment",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Ordered,
    Completed,
}

/// A diagnostic test order attached to a visit.
///
/// Completes automatically once result text is recorded; never blocks
/// primary-status advancement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestOrder {
    pub order: String,
    pub status: TestStatus,
    pub result: String,
}

/// Reference to a patient resolved through the external directory at intake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRef {
    pub id: Uuid,
    pub name: NonEmptyText,
}

/// The opaque clinical-note fields saved from the consulting station.
#[derive(Clone, Debug, Default)]
pub struct ClinicalNotes {
    pub chief_complaint: String,
    pub diagnosis: String,
    pub treatment_note: String,
}

/// One patient's progression through the clinic for a single encounter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub patient: PatientRef,
    pub status: VisitStatus,
    pub test: Option<TestOrder>,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub treatment_note: String,
    pub intake_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Bumped on every mutation; stations must present the version they read.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The two-line bill settled at the billing station.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub consultation_fee: u32,
    /// Present if and only if a test order exists on the visit.
    pub test_fee: Option<u32>,
}

impl Invoice {
    /// Compute the bill for a visit against the fee schedule.
    pub fn for_visit(visit: &Visit, fees: &FeeSchedule) -> Self {
        Self {
            consultation_fee: fees.consultation_fee(),
            test_fee: visit.test.as_ref().map(|_| fees.test_fee()),
        }
    }

    pub fn total(&self) -> u32 {
        self.consultation_fee + self.test_fee.unwrap_or(0)
    }
}

/// Workflow operations over the shared visit collection.
#[derive(Clone)]
pub struct VisitService {
    store: Arc<MemoryStore>,
    config: Arc<CoreConfig>,
}

impl VisitService {
    pub fn new(store: Arc<MemoryStore>, config: Arc<CoreConfig>) -> Self {
        Self { store, config }
    }

    /// Register a patient at the front desk. The visit starts at `reception`.
    pub fn intake(&self, patient: PatientRef) -> CoreResult<Visit> {
        self.store.mutate_visits(|records| {
            let now = Utc::now();
            let visit = Visit {
                id: Uuid::new_v4(),
                patient: patient.clone(),
                status: VisitStatus::Reception,
                test: None,
                chief_complaint: String::new(),
                diagnosis: String::new(),
                treatment_note: String::new(),
                intake_at: now,
                started_at: None,
                paid_at: None,
                version: 0,
                created_at: now,
                updated_at: now,
            };
            records.insert(visit.id, visit.clone());
            tracing::info!(id = %visit.id, patient = %visit.patient.name, "visit registered");
            Ok(visit)
        })
    }

    /// Call the patient in: `reception` -> `consulting`, stamping `started_at`.
    pub fn call(&self, id: Uuid, expected_version: u64) -> CoreResult<Visit> {
        self.transition(id, expected_version, VisitAction::Call, |visit, now| {
            visit.started_at = Some(now);
        })
    }

    /// Send the patient on: `consulting` -> `treatment`, saving the clinical
    /// notes entered at the consulting station in the same write.
    pub fn send_forward(
        &self,
        id: Uuid,
        expected_version: u64,
        notes: ClinicalNotes,
    ) -> CoreResult<Visit> {
        self.transition(id, expected_version, VisitAction::SendForward, |visit, _| {
            visit.chief_complaint = notes.chief_complaint.clone();
            visit.diagnosis = notes.diagnosis.clone();
            visit.treatment_note = notes.treatment_note.clone();
        })
    }

    /// Release the patient to billing: `treatment` -> `completed`.
    pub fn finish_treatment(&self, id: Uuid, expected_version: u64) -> CoreResult<Visit> {
        self.transition(id, expected_version, VisitAction::FinishTreatment, |_, _| {})
    }

    /// Settle the bill: `completed` -> `paid`, stamping `paid_at`. Irreversible.
    ///
    /// The invoice is the flat consultation fee plus the test fee if and only
    /// if a test order exists on the visit.
    pub fn process_payment(&self, id: Uuid, expected_version: u64) -> CoreResult<(Visit, Invoice)> {
        let fees = *self.config.fees();
        let visit = self.transition(id, expected_version, VisitAction::ProcessPayment, |visit, now| {
            visit.paid_at = Some(now);
        })?;
        let invoice = Invoice::for_visit(&visit, &fees);
        tracing::info!(id = %visit.id, total = invoice.total(), "payment processed");
        Ok((visit, invoice))
    }

    /// Attach a diagnostic test order to an active visit.
    pub fn order_test(&self, id: Uuid, expected_version: u64, order: String) -> CoreResult<Visit> {
        if order.trim().is_empty() {
            return Err(CoreError::Validation("a test order needs a name".into()));
        }
        self.mutate_secondary(id, expected_version, |visit| {
            visit.test = Some(TestOrder {
                order: order.clone(),
                status: TestStatus::Ordered,
                result: String::new(),
            });
            Ok(())
        })
    }

    /// Record the result text for an ordered test.
    ///
    /// A non-empty result completes the order; empty text leaves it open.
    pub fn record_test_result(
        &self,
        id: Uuid,
        expected_version: u64,
        result: String,
    ) -> CoreResult<Visit> {
        self.mutate_secondary(id, expected_version, |visit| {
            let test = visit.test.as_mut().ok_or_else(|| {
                CoreError::Validation("this visit has no test order".into())
            })?;
            test.result = result.clone();
            if !test.result.trim().is_empty() {
                test.status = TestStatus::Completed;
            }
            Ok(())
        })
    }

    /// Fetch a single visit.
    pub fn get(&self, id: Uuid) -> CoreResult<Visit> {
        self.store
            .with_visits(|records| records.get(&id).cloned())?
            .ok_or(CoreError::NotFound(id))
    }

    /// Run one sanctioned primary-status transition.
    ///
    /// Under a single store transaction: existence, version and the central
    /// table are checked before `apply` runs; the version is bumped with the
    /// same write.
    fn transition(
        &self,
        id: Uuid,
        expected_version: u64,
        action: VisitAction,
        apply: impl FnOnce(&mut Visit, DateTime<Utc>),
    ) -> CoreResult<Visit> {
        self.store.mutate_visits(|records| {
            let visit = records.get_mut(&id).ok_or(CoreError::NotFound(id))?;
            if visit.version != expected_version {
                return Err(CoreError::StaleVersion {
                    expected: expected_version,
                    actual: visit.version,
                });
            }
            let next = visit.status.next(action).ok_or(CoreError::InvalidTransition {
                from: visit.status,
                action,
            })?;

            let now = Utc::now();
            apply(visit, now);
            visit.status = next;
            visit.version += 1;
            visit.updated_at = now;
            tracing::info!(id = %visit.id, status = %visit.status, action = %action, "visit advanced");
            Ok(visit.clone())
        })
    }

    /// Mutate the secondary test flag without touching the primary status.
    ///
    /// Terminal records stay read-only: no secondary writes after `paid`.
    fn mutate_secondary(
        &self,
        id: Uuid,
        expected_version: u64,
        apply: impl FnOnce(&mut Visit) -> CoreResult<()>,
    ) -> CoreResult<Visit> {
        self.store.mutate_visits(|records| {
            let visit = records.get_mut(&id).ok_or(CoreError::NotFound(id))?;
            if visit.version != expected_version {
                return Err(CoreError::StaleVersion {
                    expected: expected_version,
                    actual: visit.version,
                });
            }
            if visit.status == VisitStatus::Paid {
                return Err(CoreError::Validation(
                    "paid visits are read-only history".into(),
                ));
            }

            apply(visit)?;
            visit.version += 1;
            visit.updated_at = Utc::now();
            Ok(visit.clone())
        })
    }
}
