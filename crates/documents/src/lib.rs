//! Printable document issuance for settled visits.
//!
//! The documents station issues four artifact kinds from a visit's record.
//! Issuance is strictly read-only and gated on the terminal `paid` status:
//! a visit that has not been settled has nothing to certify. The output is
//! the logical artifact handed to the external template renderer; layout and
//! printing are not this crate's concern.

use chrono::{DateTime, Utc};
use clinic_core::{FeeSchedule, Invoice, Visit, VisitStatus};
use serde::{Deserialize, Serialize};
use clinic_core::visits::TestStatus;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during document issuance.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("documents can only be issued for paid visits (status '{status}')")]
    NotIssuable { status: VisitStatus },
}

/// The artifact kinds the documents station can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Prescription,
    Receipt,
    MedicalCertificate,
    Referral,
}

impl DocumentKind {
    /// Parse a kind from its wire spelling.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prescription" => Some(DocumentKind::Prescription),
            "receipt" => Some(DocumentKind::Receipt),
            "medical-certificate" => Some(DocumentKind::MedicalCertificate),
            "referral" => Some(DocumentKind::Referral),
            _ => None,
        }
    }
}

/// One line of an itemised receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub label: String,
    pub amount: u32,
}

/// The kind-specific content of an issued document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DocumentBody {
    Prescription {
        treatment_note: String,
    },
    Receipt {
        lines: Vec<ReceiptLine>,
        total: u32,
        paid_at: Option<DateTime<Utc>>,
    },
    MedicalCertificate {
        diagnosis: String,
        visit_date: DateTime<Utc>,
    },
    Referral {
        diagnosis: String,
        chief_complaint: String,
        test_summary: Option<String>,
    },
}

/// A logical printable artifact, ready for the template renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssuedDocument {
    pub document_kind: DocumentKind,
    pub visit_id: Uuid,
    pub patient_name: String,
    pub issued_at: DateTime<Utc>,
    pub body: DocumentBody,
}

/// Document issuance operations.
///
/// This is a zero-sized type used for namespacing issuance; all methods are
/// associated functions.
pub struct DocumentIssuer;

impl DocumentIssuer {
    /// Issue a document of the requested kind from a settled visit.
    ///
    /// Does not mutate the visit. The receipt re-derives its lines from the
    /// same invoice computation the billing station used, so the two can
    /// never disagree.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotIssuable`] when the visit is in any
    /// status other than `paid`.
    pub fn issue(
        visit: &Visit,
        kind: DocumentKind,
        fees: &FeeSchedule,
    ) -> Result<IssuedDocument, DocumentError> {
        if visit.status != VisitStatus::Paid {
            return Err(DocumentError::NotIssuable {
                status: visit.status,
            });
        }

        let body = match kind {
            DocumentKind::Prescription => DocumentBody::Prescription {
                treatment_note: visit.treatment_note.clone(),
            },
            DocumentKind::Receipt => {
                let invoice = Invoice::for_visit(visit, fees);
                let mut lines = vec![ReceiptLine {
                    label: "Consultation".into(),
                    amount: invoice.consultation_fee,
                }];
                if let Some(test_fee) = invoice.test_fee {
                    lines.push(ReceiptLine {
                        label: "Diagnostic test".into(),
                        amount: test_fee,
                    });
                }
                DocumentBody::Receipt {
                    lines,
                    total: invoice.total(),
                    paid_at: visit.paid_at,
                }
            }
            DocumentKind::MedicalCertificate => DocumentBody::MedicalCertificate {
                diagnosis: visit.diagnosis.clone(),
                visit_date: visit.intake_at,
            },
            DocumentKind::Referral => DocumentBody::Referral {
                diagnosis: visit.diagnosis.clone(),
                chief_complaint: visit.chief_complaint.clone(),
                test_summary: visit.test.as_ref().map(|t| match t.status {
                    TestStatus::Completed => format!("{}: {}", t.order, t.result),
                    TestStatus::Ordered => format!("{}: pending", t.order),
                }),
            },
        };

        Ok(IssuedDocument {
            document_kind: kind,
            visit_id: visit.id,
            patient_name: visit.patient.name.to_string(),
            issued_at: Utc::now(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::visits::{PatientRef, TestOrder};
    use clinic_types::NonEmptyText;

    fn paid_visit() -> Visit {
        let now = Utc::now();
        Visit {
            id: Uuid::new_v4(),
            patient: PatientRef {
                id: Uuid::new_v4(),
                name: NonEmptyText::new("Hong Gildong").unwrap(),
            },
            status: VisitStatus::Paid,
            test: None,
            chief_complaint: "knee pain".into(),
            diagnosis: "knee arthritis".into(),
            treatment_note: "NSAIDs, rest".into(),
            intake_at: now,
            started_at: Some(now),
            paid_at: Some(now),
            version: 4,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn refuses_every_unpaid_status() {
        let fees = FeeSchedule::default();
        for status in [
            VisitStatus::Reception,
            VisitStatus::Consulting,
            VisitStatus::Treatment,
            VisitStatus::Completed,
        ] {
            let mut visit = paid_visit();
            visit.status = status;
            let err = DocumentIssuer::issue(&visit, DocumentKind::Receipt, &fees)
                .expect_err("unpaid visit must be refused");
            assert!(matches!(err, DocumentError::NotIssuable { .. }));
        }
    }

    #[test]
    fn receipt_matches_the_billing_computation() {
        let fees = FeeSchedule::default();
        let visit = paid_visit();

        let receipt = DocumentIssuer::issue(&visit, DocumentKind::Receipt, &fees)
            .expect("issue receipt");
        match receipt.body {
            DocumentBody::Receipt { lines, total, .. } => {
                assert_eq!(lines.len(), 1, "no test order, single line");
                assert_eq!(lines[0].amount, fees.consultation_fee());
                assert_eq!(total, fees.consultation_fee());
            }
            other => panic!("expected a receipt body, got {other:?}"),
        }
    }

    #[test]
    fn receipt_adds_test_line_when_an_order_exists() {
        let fees = FeeSchedule::default();
        let mut visit = paid_visit();
        visit.test = Some(TestOrder {
            order: "knee x-ray".into(),
            status: TestStatus::Completed,
            result: "no fracture".into(),
        });

        let receipt = DocumentIssuer::issue(&visit, DocumentKind::Receipt, &fees)
            .expect("issue receipt");
        match receipt.body {
            DocumentBody::Receipt { lines, total, .. } => {
                assert_eq!(lines.len(), 2);
                assert_eq!(total, fees.consultation_fee() + fees.test_fee());
            }
            other => panic!("expected a receipt body, got {other:?}"),
        }
    }

    #[test]
    fn certificate_carries_the_diagnosis() {
        let fees = FeeSchedule::default();
        let visit = paid_visit();

        let cert = DocumentIssuer::issue(&visit, DocumentKind::MedicalCertificate, &fees)
            .expect("issue certificate");
        assert_eq!(cert.patient_name, "Hong Gildong");
        match cert.body {
            DocumentBody::MedicalCertificate { diagnosis, .. } => {
                assert_eq!(diagnosis, "knee arthritis");
            }
            other => panic!("expected a certificate body, got {other:?}"),
        }
    }

    #[test]
    fn kind_parsing_round_trips_wire_spellings() {
        assert_eq!(
            DocumentKind::parse("prescription"),
            Some(DocumentKind::Prescription)
        );
        assert_eq!(
            DocumentKind::parse("medical-certificate"),
            Some(DocumentKind::MedicalCertificate)
        );
        assert_eq!(DocumentKind::parse("passport"), None);
    }
}
