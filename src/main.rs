use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use clinic_core::config::{
    fee_from_env_value, slot_capacity_from_env_value, DEFAULT_CONSULTATION_FEE, DEFAULT_TEST_FEE,
};
use clinic_core::{CoreConfig, FeeSchedule, MemoryStore, ScheduleConfig};

/// Main entry point for the clinic operations service
///
/// Starts the REST server (default port 3000), which carries the whole
/// sanctioned surface: slot listing, booking, the visit workflow actions,
/// document issuance and the live station views over SSE.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_SLOT_CAPACITY`: Reservations admitted per slot (default: 6)
/// - `CLINIC_CONSULTATION_FEE`: Flat consultation fee (default: 15000)
/// - `CLINIC_TEST_FEE`: Fee for visits with a test order (default: 30000)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("++ Starting clinic REST on {}", rest_addr);

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

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
