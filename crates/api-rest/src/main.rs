//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! This binary is useful for development and debugging when you only want the REST server (with
//! OpenAPI/Swagger UI). Deployments normally run the workspace's main `clinic-run` binary.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use clinic_core::config::{
    fee_from_env_value, slot_capacity_from_env_value, DEFAULT_CONSULTATION_FEE, DEFAULT_TEST_FEE,
};
use clinic_core::{CoreConfig, FeeSchedule, MemoryStore, ScheduleConfig};

/// Main entry point for the clinic REST API server
///
/// Starts the REST API server on the configured address (default: 0.0.0.0:3000).
/// Provides HTTP endpoints for booking and visit operations with OpenAPI/Swagger documentation.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CLINIC_SLOT_CAPACITY`: Reservations admitted per slot (default: 6)
/// - `CLINIC_CONSULTATION_FEE`: Flat consultation fee (default: 15000)
/// - `CLINIC_TEST_FEE`: Fee for visits with a test order (default: 30000)
///
/// # Returns
/// * `Ok(())` - If server starts and runs successfully
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration values cannot be parsed,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting clinic REST API on {}", addr);

    let slot_capacity = slot_capacity_from_env_value(std::env::var("CLINIC_SLOT_CAPACITY").ok())?;
    let consultation_fee = fee_from_env_value(
        std::env::var("CLINIC_CONSULTATION_FEE").ok(),
        DEFAULT_CONSULTATION_FEE,
    )?;
    let test_fee = fee_from_env_value(std::env::var("CLINIC_TEST_FEE").ok(), DEFAULT_TEST_FEE)?;

    let config = Arc::new(CoreConfig::new(
        ScheduleConfig::default(),
        FeeSchedule::new(consultation_fee, test_fee),
        slot_capacity,
    )?);

    let store = Arc::new(MemoryStore::new());
    let app = router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
