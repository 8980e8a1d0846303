//! # API Shared
//!
//! Shared utilities and definitions for the clinic APIs.
//!
//! Contains:
//! - Wire types for requests and responses (`wire` module)
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and the `clinic-run` binary for common functionality.

pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
