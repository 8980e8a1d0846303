//! # Clinic Core
//!
//! Core business logic for the clinic operations portal:
//! - Slot calendar generation and the capacity ledger
//! - Reservation booking with identity deduplication, atomic at commit time
//! - The in-clinic visit workflow state machine
//! - Real-time view synchronization for the station screens
//!
//! **No API concerns**: HTTP servers, wire formats and authentication belong
//! in `api-rest` and `api-shared`.

pub mod config;
pub mod error;
pub mod ledger;
pub mod reservations;
pub mod schedule;
pub mod store;
pub mod sync;
pub mod visits;

pub use config::{CoreConfig, FeeSchedule, ScheduleConfig};
pub use error::{CoreError, CoreResult};
pub use reservations::{
    Identity, Reservation, ReservationKind, ReservationRequest, ReservationService,
    ReservationStatus, ReservationUpdate,
};
pub use store::MemoryStore;
pub use sync::{ReservationView, Subscription, Synchronizer, View, VisitView};
pub use visits::{
    ClinicalNotes, Invoice, PatientRef, TestOrder, TestStatus, Visit, VisitAction, VisitService,
    VisitStatus,
};
