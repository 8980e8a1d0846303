//! Wire models for the REST surface.
//!
//! These are the exact shapes serialised to and from JSON. Dates travel as
//! `YYYY-MM-DD`, slots as `HH:MM` (the spelling the slot picker shows), and
//! timestamps as RFC 3339. Translation helpers convert between wire models
//! and the domain types in `clinic-core`.

use chrono::{NaiveDate, NaiveTime};
use clinic_core::ledger::SlotAvailability;
use clinic_core::{Invoice, Reservation, Visit};
use clinic_documents::IssuedDocument;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Wire spelling of calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Wire spelling of slot start times.
pub const SLOT_FORMAT: &str = "%H:%M";

/// Parse a wire date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// Parse a wire slot time.
pub fn parse_slot(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, SLOT_FORMAT).ok()
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SlotInfo {
    /// Slot start time, `HH:MM`.
    pub time: String,
    pub booked: u32,
    pub at_capacity: bool,
}

impl From<&SlotAvailability> for SlotInfo {
    fn from(slot: &SlotAvailability) -> Self {
        Self {
            time: slot.slot.format(SLOT_FORMAT).to_string(),
            booked: slot.booked,
            at_capacity: slot.at_capacity,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DaySlotsRes {
    /// The requested date, `YYYY-MM-DD`.
    pub date: String,
    /// Every bookable slot for the date with its current load. Empty on the
    /// weekly closure day.
    pub slots: Vec<SlotInfo>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateReservationReq {
    /// `reservation` or `inquiry`.
    pub kind: String,
    pub name: String,
    pub contact: String,
    /// Authenticated-account reference, when the requester is signed in.
    #[serde(default)]
    pub account: Option<Uuid>,
    /// Required for reservations, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<String>,
    /// Required for reservations, `HH:MM`.
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub note: String,
    pub consent_given: bool,
    /// Staff registrations start out confirmed.
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ModifyReservationReq {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub note: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReservationRes {
    pub id: Uuid,
    pub kind: String,
    pub status: String,
    pub name: String,
    pub contact: String,
    pub date: Option<String>,
    pub slot: Option<String>,
    pub note: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Reservation> for ReservationRes {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id,
            kind: match r.kind {
                clinic_core::ReservationKind::Reservation => "reservation".into(),
                clinic_core::ReservationKind::Inquiry => "inquiry".into(),
            },
            status: match r.status {
                clinic_core::ReservationStatus::New => "new".into(),
                clinic_core::ReservationStatus::Confirmed => "confirmed".into(),
            },
            name: r.identity.name.to_string(),
            contact: r.identity.contact.to_string(),
            date: r.date.map(|d| d.format(DATE_FORMAT).to_string()),
            slot: r.slot.map(|s| s.format(SLOT_FORMAT).to_string()),
            note: r.note.clone(),
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct IntakeReq {
    pub patient_id: Uuid,
    pub patient_name: String,
}

/// Body for transition actions that carry nothing but the observed version.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VersionedReq {
    /// The record version the station read; stale writers are rejected.
    pub version: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ForwardReq {
    pub version: u64,
    #[serde(default)]
    pub chief_complaint: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub treatment_note: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TestOrderReq {
    pub version: u64,
    pub order: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TestResultReq {
    pub version: u64,
    #[serde(default)]
    pub result: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VisitRes {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub status: String,
    pub test_order: Option<String>,
    pub test_status: Option<String>,
    pub test_result: Option<String>,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub treatment_note: String,
    pub intake_at: String,
    pub started_at: Option<String>,
    pub paid_at: Option<String>,
    pub version: u64,
}

impl From<&Visit> for VisitRes {
    fn from(v: &Visit) -> Self {
        Self {
            id: v.id,
            patient_id: v.patient.id,
            patient_name: v.patient.name.to_string(),
            status: v.status.to_string(),
            test_order: v.test.as_ref().map(|t| t.order.clone()),
            test_status: v.test.as_ref().map(|t| match t.status {
                clinic_core::TestStatus::Ordered => "ordered".into(),
                clinic_core::TestStatus::Completed => "completed".into(),
            }),
            test_result: v.test.as_ref().map(|t| t.result.clone()),
            chief_complaint: v.chief_complaint.clone(),
            diagnosis: v.diagnosis.clone(),
            treatment_note: v.treatment_note.clone(),
            intake_at: v.intake_at.to_rfc3339(),
            started_at: v.started_at.map(|t| t.to_rfc3339()),
            paid_at: v.paid_at.map(|t| t.to_rfc3339()),
            version: v.version,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceRes {
    pub consultation_fee: u32,
    pub test_fee: Option<u32>,
    pub total: u32,
}

impl From<&Invoice> for InvoiceRes {
    fn from(invoice: &Invoice) -> Self {
        Self {
            consultation_fee: invoice.consultation_fee,
            test_fee: invoice.test_fee,
            total: invoice.total(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentRes {
    pub visit: VisitRes,
    pub invoice: InvoiceRes,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentRes {
    pub kind: String,
    pub visit_id: Uuid,
    pub patient_name: String,
    pub issued_at: String,
    /// Kind-specific artifact content, as handed to the template renderer.
    #[schema(value_type = Object)]
    pub body: serde_json::Value,
}

impl DocumentRes {
    /// Flatten an issued document for the wire.
    pub fn from_document(document: &IssuedDocument) -> Self {
        Self {
            kind: match document.document_kind {
                clinic_documents::DocumentKind::Prescription => "prescription".into(),
                clinic_documents::DocumentKind::Receipt => "receipt".into(),
                clinic_documents::DocumentKind::MedicalCertificate => "medical-certificate".into(),
                clinic_documents::DocumentKind::Referral => "referral".into(),
            },
            visit_id: document.visit_id,
            patient_name: document.patient_name.clone(),
            issued_at: document.issued_at.to_rfc3339(),
            body: serde_json::to_value(&document.body).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_date_and_slot_parse_their_own_formats() {
        assert_eq!(
            parse_date("2025-03-10"),
            NaiveDate::from_ymd_opt(2025, 3, 10)
        );
        assert_eq!(parse_slot("14:30"), NaiveTime::from_hms_opt(14, 30, 0));
        assert!(parse_date("10/03/2025").is_none());
        assert!(parse_slot("2pm").is_none());
    }
}
