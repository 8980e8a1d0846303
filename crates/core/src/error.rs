use crate::visits::{VisitAction, VisitStatus};
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("an active reservation already exists for this requester (record {existing})")]
    Conflict { existing: Uuid },
    #[error("slot {slot} on {date} is fully booked")]
    Capacity { date: NaiveDate, slot: NaiveTime },
    #[error("record was modified by another station (expected version {expected}, found {actual})")]
    StaleVersion { expected: u64, actual: u64 },
    #[error("record {0} no longer exists")]
    NotFound(Uuid),
    #[error("no transition from '{from}' via '{action}'")]
    InvalidTransition {
        from: VisitStatus,
        action: VisitAction,
    },
    #[error("store unavailable: {0}")]
    Transient(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
