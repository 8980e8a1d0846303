//! # API REST
//!
//! REST API implementation for the clinic operations core.
//!
//! Handles:
//! - HTTP endpoints with axum for every sanctioned booking and visit action
//! - Live station views as Server-Sent Events (full snapshot per event)
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status mapping)
//!
//! Uses `api-shared` for common wire types and utilities.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use futures::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use api_shared::wire;
use api_shared::HealthService;
use clinic_core::{
    ledger, CoreConfig, CoreError, Identity, MemoryStore, Reservation, ReservationKind,
    ReservationRequest, ReservationService, ReservationUpdate, ReservationView, Subscription,
    Synchronizer, View, VisitService, VisitView,
};
use clinic_core::visits::{ClinicalNotes, PatientRef, Visit};
use clinic_documents::{DocumentError, DocumentIssuer, DocumentKind};
use clinic_types::NonEmptyText;

/// Application state for the REST API server
///
/// Contains shared state that needs to be accessible to all request handlers:
/// the resolved configuration and the services over the shared store.
#[derive(Clone)]
pub struct AppState {
    config: Arc<CoreConfig>,
    reservations: ReservationService,
    visits: VisitService,
    sync: Synchronizer,
}

impl AppState {
    /// Wire the services around one shared store.
    pub fn new(store: Arc<MemoryStore>, config: Arc<CoreConfig>) -> Self {
        Self {
            reservations: ReservationService::new(Arc::clone(&store), Arc::clone(&config)),
            visits: VisitService::new(Arc::clone(&store), Arc::clone(&config)),
            sync: Synchronizer::new(store),
            config,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        day_slots,
        create_reservation,
        confirm_reservation,
        modify_reservation,
        cancel_reservation,
        intake_visit,
        call_visit,
        forward_visit,
        finish_visit,
        pay_visit,
        order_test,
        record_test_result,
        issue_document,
        visit_view_stream,
        appointment_view_stream,
        inquiry_view_stream,
    ),
    components(schemas(
        wire::HealthRes,
        wire::SlotInfo,
        wire::DaySlotsRes,
        wire::CreateReservationReq,
        wire::ModifyReservationReq,
        wire::ReservationRes,
        wire::IntakeReq,
        wire::VersionedReq,
        wire::ForwardReq,
        wire::TestOrderReq,
        wire::TestResultReq,
        wire::VisitRes,
        wire::InvoiceRes,
        wire::PaymentRes,
        wire::DocumentRes,
    ))
)]
pub struct ApiDoc;

/// Build the full clinic REST router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/slots/:date", get(day_slots))
        .route("/reservations", post(create_reservation))
        .route("/reservations/:id/confirm", post(confirm_reservation))
        .route("/reservations/:id", put(modify_reservation))
        .route("/reservations/:id", delete(cancel_reservation))
        .route("/visits", post(intake_visit))
        .route("/visits/:id/call", post(call_visit))
        .route("/visits/:id/forward", post(forward_visit))
        .route("/visits/:id/finish", post(finish_visit))
        .route("/visits/:id/payment", post(pay_visit))
        .route("/visits/:id/test-order", post(order_test))
        .route("/visits/:id/test-result", post(record_test_result))
        .route("/visits/:id/documents/:kind", get(issue_document))
        .route("/views/:station", get(visit_view_stream))
        .route("/views/appointments/:date", get(appointment_view_stream))
        .route("/views/inquiries", get(inquiry_view_stream))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Map a core failure to the HTTP response the acting station sees.
///
/// Transient store failures deliberately hide their cause behind a generic
/// retry-later message.
fn error_response(err: CoreError) -> (StatusCode, String) {
    let status = match &err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Conflict { .. }
        | CoreError::Capacity { .. }
        | CoreError::StaleVersion { .. }
        | CoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    let message = match &err {
        CoreError::Transient(detail) => {
            tracing::error!("store failure: {detail}");
            "temporarily unavailable, please try again shortly".into()
        }
        _ => err.to_string(),
    };
    (status, message)
}

fn bad_request(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.into())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = wire::HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Returns the current health status of the clinic core service.
/// This endpoint is used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<wire::HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/slots/{date}",
    responses(
        (status = 200, description = "Bookable slots with current load", body = wire::DaySlotsRes),
        (status = 400, description = "Malformed date"),
        (status = 503, description = "Store unavailable")
    )
)]
/// List the bookable slots for a date, annotated with booking load
///
/// Generates the slot calendar for the date and overlays the capacity
/// ledger's booked counts. The weekly closure day yields an empty list.
#[axum::debug_handler]
async fn day_slots(
    State(state): State<AppState>,
    AxumPath(date): AxumPath<String>,
) -> Result<Json<wire::DaySlotsRes>, (StatusCode, String)> {
    let date = wire::parse_date(&date)
        .ok_or_else(|| bad_request(format!("malformed date: {date}")))?;

    let existing = state
        .reservations
        .reservations_on(date)
        .map_err(error_response)?;
    let annotated = ledger::annotate(date, &existing, &state.config);

    Ok(Json(wire::DaySlotsRes {
        date: date.format(wire::DATE_FORMAT).to_string(),
        slots: annotated.iter().map(wire::SlotInfo::from).collect(),
    }))
}

/// Translate a create request into a validated domain submission.
fn build_request(req: &wire::CreateReservationReq) -> Result<ReservationRequest, (StatusCode, String)> {
    let kind = match req.kind.as_str() {
        "reservation" => ReservationKind::Reservation,
        "inquiry" => ReservationKind::Inquiry,
        other => return Err(bad_request(format!("unknown submission kind: {other}"))),
    };
    let name = NonEmptyText::new(&req.name).map_err(|_| bad_request("a name is required"))?;
    let contact =
        NonEmptyText::new(&req.contact).map_err(|_| bad_request("a contact is required"))?;

    let date = match &req.date {
        None => None,
        Some(raw) => Some(
            wire::parse_date(raw).ok_or_else(|| bad_request(format!("malformed date: {raw}")))?,
        ),
    };
    let slot = match &req.slot {
        None => None,
        Some(raw) => Some(
            wire::parse_slot(raw).ok_or_else(|| bad_request(format!("malformed slot: {raw}")))?,
        ),
    };

    Ok(ReservationRequest {
        identity: Identity {
            account: req.account,
            name,
            contact,
        },
        kind,
        date,
        slot,
        note: req.note.clone(),
        consent_given: req.consent_given,
    })
}

#[utoipa::path(
    post,
    path = "/reservations",
    request_body = wire::CreateReservationReq,
    responses(
        (status = 201, description = "Reservation created", body = wire::ReservationRes),
        (status = 400, description = "Validation failure"),
        (status = 409, description = "Duplicate active reservation or slot at capacity"),
        (status = 503, description = "Store unavailable")
    )
)]
/// Create a reservation or inquiry
///
/// Patient submissions start in status `new`; staff registrations (with
/// `confirmed` set) start out confirmed. The duplicate guard and the
/// capacity check run inside the same transaction that commits the record,
/// so a conflict response means nothing was persisted.
#[axum::debug_handler]
async fn create_reservation(
    State(state): State<AppState>,
    Json(req): Json<wire::CreateReservationReq>,
) -> Result<(StatusCode, Json<wire::ReservationRes>), (StatusCode, String)> {
    let request = build_request(&req)?;
    let result = if req.confirmed {
        state.reservations.create_confirmed(request)
    } else {
        state.reservations.create(request)
    };

    match result {
        Ok(reservation) => Ok((StatusCode::CREATED, Json((&reservation).into()))),
        Err(err) => Err(error_response(err)),
    }
}

#[utoipa::path(
    post,
    path = "/reservations/{id}/confirm",
    responses(
        (status = 200, description = "Reservation confirmed", body = wire::ReservationRes),
        (status = 404, description = "No such reservation")
    )
)]
/// Confirm a pending reservation (staff action)
#[axum::debug_handler]
async fn confirm_reservation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<wire::ReservationRes>, (StatusCode, String)> {
    match state.reservations.confirm(id) {
        Ok(reservation) => Ok(Json((&reservation).into())),
        Err(err) => Err(error_response(err)),
    }
}

#[utoipa::path(
    put,
    path = "/reservations/{id}",
    request_body = wire::ModifyReservationReq,
    responses(
        (status = 200, description = "Reservation updated", body = wire::ReservationRes),
        (status = 400, description = "Validation failure"),
        (status = 404, description = "No such reservation"),
        (status = 409, description = "Duplicate active reservation or slot at capacity")
    )
)]
/// Modify a reservation's date, slot or note
///
/// Identity and ownership fields are preserved. The uniqueness and capacity
/// checks re-run with this record excluded from its own conflict check.
#[axum::debug_handler]
async fn modify_reservation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<wire::ModifyReservationReq>,
) -> Result<Json<wire::ReservationRes>, (StatusCode, String)> {
    let date = match &req.date {
        None => None,
        Some(raw) => Some(
            wire::parse_date(raw).ok_or_else(|| bad_request(format!("malformed date: {raw}")))?,
        ),
    };
    let slot = match &req.slot {
        None => None,
        Some(raw) => Some(
            wire::parse_slot(raw).ok_or_else(|| bad_request(format!("malformed slot: {raw}")))?,
        ),
    };

    match state.reservations.modify(
        id,
        ReservationUpdate {
            date,
            slot,
            note: req.note.clone(),
        },
    ) {
        Ok(reservation) => Ok(Json((&reservation).into())),
        Err(err) => Err(error_response(err)),
    }
}

#[utoipa::path(
    delete,
    path = "/reservations/{id}",
    responses(
        (status = 204, description = "Reservation removed"),
        (status = 404, description = "No such reservation")
    )
)]
/// Cancel a reservation
///
/// Cancellation is hard deletion; the record is gone and the identity may
/// book again.
#[axum::debug_handler]
async fn cancel_reservation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.reservations.cancel(id) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(error_response(err)),
    }
}

#[utoipa::path(
    post,
    path = "/visits",
    request_body = wire::IntakeReq,
    responses(
        (status = 201, description = "Visit registered at reception", body = wire::VisitRes),
        (status = 400, description = "Validation failure")
    )
)]
/// Register a patient at the front desk
///
/// The patient is resolved through the external directory beforehand; this
/// endpoint receives the resolved reference and opens the visit at
/// `reception`.
#[axum::debug_handler]
async fn intake_visit(
    State(state): State<AppState>,
    Json(req): Json<wire::IntakeReq>,
) -> Result<(StatusCode, Json<wire::VisitRes>), (StatusCode, String)> {
    let name = NonEmptyText::new(&req.patient_name)
        .map_err(|_| bad_request("a patient name is required"))?;

    match state.visits.intake(PatientRef {
        id: req.patient_id,
        name,
    }) {
        Ok(visit) => Ok((StatusCode::CREATED, Json((&visit).into()))),
        Err(err) => Err(error_response(err)),
    }
}

#[utoipa::path(
    post,
    path = "/visits/{id}/call",
    request_body = wire::VersionedReq,
    responses(
        (status = 200, description = "Patient called into consulting", body = wire::VisitRes),
        (status = 404, description = "No such visit"),
        (status = 409, description = "Invalid transition or stale version")
    )
)]
/// Call the patient in: `reception` -> `consulting`
#[axum::debug_handler]
async fn call_visit(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<wire::VersionedReq>,
) -> Result<Json<wire::VisitRes>, (StatusCode, String)> {
    match state.visits.call(id, req.version) {
        Ok(visit) => Ok(Json((&visit).into())),
        Err(err) => Err(error_response(err)),
    }
}

#[utoipa::path(
    post,
    path = "/visits/{id}/forward",
    request_body = wire::ForwardReq,
    responses(
        (status = 200, description = "Patient sent to treatment", body = wire::VisitRes),
        (status = 404, description = "No such visit"),
        (status = 409, description = "Invalid transition or stale version")
    )
)]
/// Send the patient forward: `consulting` -> `treatment`
///
/// The clinical notes entered at the consulting station are saved in the
/// same write.
#[axum::debug_handler]
async fn forward_visit(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<wire::ForwardReq>,
) -> Result<Json<wire::VisitRes>, (StatusCode, String)> {
    let notes = ClinicalNotes {
        chief_complaint: req.chief_complaint,
        diagnosis: req.diagnosis,
        treatment_note: req.treatment_note,
    };
    match state.visits.send_forward(id, req.version, notes) {
        Ok(visit) => Ok(Json((&visit).into())),
        Err(err) => Err(error_response(err)),
    }
}

#[utoipa::path(
    post,
    path = "/visits/{id}/finish",
    request_body = wire::VersionedReq,
    responses(
        (status = 200, description = "Patient released to billing", body = wire::VisitRes),
        (status = 404, description = "No such visit"),
        (status = 409, description = "Invalid transition or stale version")
    )
)]
/// Finish treatment: `treatment` -> `completed` (awaiting payment)
#[axum::debug_handler]
async fn finish_visit(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<wire::VersionedReq>,
) -> Result<Json<wire::VisitRes>, (StatusCode, String)> {
    match state.visits.finish_treatment(id, req.version) {
        Ok(visit) => Ok(Json((&visit).into())),
        Err(err) => Err(error_response(err)),
    }
}

#[utoipa::path(
    post,
    path = "/visits/{id}/payment",
    request_body = wire::VersionedReq,
    responses(
        (status = 200, description = "Payment settled", body = wire::PaymentRes),
        (status = 404, description = "No such visit"),
        (status = 409, description = "Invalid transition or stale version")
    )
)]
/// Process payment: `completed` -> `paid`. Irreversible.
///
/// The invoice is the flat consultation fee plus the test fee if and only
/// if a test order exists on the visit.
#[axum::debug_handler]
async fn pay_visit(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<wire::VersionedReq>,
) -> Result<Json<wire::PaymentRes>, (StatusCode, String)> {
    match state.visits.process_payment(id, req.version) {
        Ok((visit, invoice)) => Ok(Json(wire::PaymentRes {
            visit: (&visit).into(),
            invoice: (&invoice).into(),
        })),
        Err(err) => Err(error_response(err)),
    }
}

#[utoipa::path(
    post,
    path = "/visits/{id}/test-order",
    request_body = wire::TestOrderReq,
    responses(
        (status = 200, description = "Test ordered", body = wire::VisitRes),
        (status = 400, description = "Validation failure"),
        (status = 404, description = "No such visit"),
        (status = 409, description = "Stale version")
    )
)]
/// Attach a diagnostic test order to an active visit
#[axum::debug_handler]
async fn order_test(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<wire::TestOrderReq>,
) -> Result<Json<wire::VisitRes>, (StatusCode, String)> {
    match state.visits.order_test(id, req.version, req.order) {
        Ok(visit) => Ok(Json((&visit).into())),
        Err(err) => Err(error_response(err)),
    }
}

#[utoipa::path(
    post,
    path = "/visits/{id}/test-result",
    request_body = wire::TestResultReq,
    responses(
        (status = 200, description = "Result recorded", body = wire::VisitRes),
        (status = 400, description = "Validation failure"),
        (status = 404, description = "No such visit"),
        (status = 409, description = "Stale version")
    )
)]
/// Record a test result
///
/// A non-empty result completes the order automatically.
#[axum::debug_handler]
async fn record_test_result(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<wire::TestResultReq>,
) -> Result<Json<wire::VisitRes>, (StatusCode, String)> {
    match state.visits.record_test_result(id, req.version, req.result) {
        Ok(visit) => Ok(Json((&visit).into())),
        Err(err) => Err(error_response(err)),
    }
}

#[utoipa::path(
    get,
    path = "/visits/{id}/documents/{kind}",
    responses(
        (status = 200, description = "Issued document", body = wire::DocumentRes),
        (status = 400, description = "Unknown document kind"),
        (status = 404, description = "No such visit"),
        (status = 409, description = "Visit is not paid")
    )
)]
/// Issue a printable document from a settled visit
///
/// Read-only; permitted only for visits in status `paid`. Kinds:
/// `prescription`, `receipt`, `medical-certificate`, `referral`.
#[axum::debug_handler]
async fn issue_document(
    State(state): State<AppState>,
    AxumPath((id, kind)): AxumPath<(Uuid, String)>,
) -> Result<Json<wire::DocumentRes>, (StatusCode, String)> {
    let kind = DocumentKind::parse(&kind)
        .ok_or_else(|| bad_request(format!("unknown document kind: {kind}")))?;
    let visit = state.visits.get(id).map_err(error_response)?;

    match DocumentIssuer::issue(&visit, kind, state.config.fees()) {
        Ok(document) => Ok(Json(wire::DocumentRes::from_document(&document))),
        Err(err @ DocumentError::NotIssuable { .. }) => {
            Err((StatusCode::CONFLICT, err.to_string()))
        }
    }
}

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// Adapt a live view subscription into an SSE response.
///
/// Every event carries the full replacement snapshot for the view; the
/// station re-renders entirely from it. The stream ends when the store's
/// change feed closes; dropping the response is the only cancellation.
fn snapshot_stream<V, D>(
    subscription: Subscription<V>,
    to_wire: fn(&[V::Record]) -> Vec<D>,
) -> Sse<EventStream>
where
    V: View + Send + 'static,
    V::Record: 'static,
    D: Serialize + 'static,
{
    let stream = futures::stream::unfold(
        (subscription, to_wire),
        |(mut subscription, to_wire)| async move {
            match subscription.next_snapshot().await {
                Ok(snapshot) => match Event::default().json_data(to_wire(&snapshot)) {
                    Ok(event) => Some((Ok(event), (subscription, to_wire))),
                    Err(err) => {
                        tracing::error!("failed to encode snapshot event: {err}");
                        None
                    }
                },
                Err(err) => {
                    tracing::warn!("view subscription ended: {err}");
                    None
                }
            }
        },
    );
    Sse::new(Box::pin(stream) as EventStream).keep_alive(KeepAlive::default())
}

fn visits_to_wire(visits: &[Visit]) -> Vec<wire::VisitRes> {
    visits.iter().map(wire::VisitRes::from).collect()
}

fn reservations_to_wire(reservations: &[Reservation]) -> Vec<wire::ReservationRes> {
    reservations.iter().map(wire::ReservationRes::from).collect()
}

#[utoipa::path(
    get,
    path = "/views/{station}",
    responses(
        (status = 200, description = "SSE stream of full visit snapshots for the station"),
        (status = 404, description = "Unknown station view")
    )
)]
/// Subscribe to a station's live visit view
///
/// Stations: `front-desk` (reception through treatment, queue order),
/// `billing` (awaiting payment), `documents` (paid), `lab` (active visits
/// with a test order). Each SSE event is a full replacement snapshot.
#[axum::debug_handler]
async fn visit_view_stream(
    State(state): State<AppState>,
    AxumPath(station): AxumPath<String>,
) -> Result<Sse<EventStream>, (StatusCode, String)> {
    let view = match station.as_str() {
        "front-desk" => VisitView::FrontDeskQueue,
        "billing" => VisitView::Billing,
        "documents" => VisitView::Documents,
        "lab" => VisitView::Lab,
        other => {
            return Err((
                StatusCode::NOT_FOUND,
                format!("unknown station view: {other}"),
            ))
        }
    };

    Ok(snapshot_stream(state.sync.subscribe(view), visits_to_wire))
}

#[utoipa::path(
    get,
    path = "/views/appointments/{date}",
    responses(
        (status = 200, description = "SSE stream of the appointment list for the date"),
        (status = 400, description = "Malformed date")
    )
)]
/// Subscribe to the appointment list for a date, ordered by slot
#[axum::debug_handler]
async fn appointment_view_stream(
    State(state): State<AppState>,
    AxumPath(date): AxumPath<String>,
) -> Result<Sse<EventStream>, (StatusCode, String)> {
    let date = wire::parse_date(&date)
        .ok_or_else(|| bad_request(format!("malformed date: {date}")))?;

    Ok(snapshot_stream(
        state.sync.subscribe(ReservationView::Appointments(date)),
        reservations_to_wire,
    ))
}

#[utoipa::path(
    get,
    path = "/views/inquiries",
    responses(
        (status = 200, description = "SSE stream of the inquiry inbox, newest first")
    )
)]
/// Subscribe to the inquiry inbox
#[axum::debug_handler]
async fn inquiry_view_stream(State(state): State<AppState>) -> Sse<EventStream> {
    snapshot_stream(
        state.sync.subscribe(ReservationView::InquiryInbox),
        reservations_to_wire,
    )
}
