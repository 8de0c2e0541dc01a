//! HTTP API
//!
//! - [`schools`] - school listing and class creation
//! - [`classes`] - classes, schedules, sessions and the booking calendar
//! - [`reservations`] - booking, cancellation and status changes
//! - [`payments`] - payment confirmation and refunds
//! - [`discount_codes`] - code administration and quotes
//! - [`instructors`] - instructors, class assignment and teaching schedules

pub mod classes;
pub mod discount_codes;
pub mod error;
pub mod identity;
pub mod instructors;
pub mod payments;
pub mod reservations;
pub mod schools;

use crate::{
    core::{availability::BookingPolicy, retry::RetryPolicy},
    notify::Notifier,
};
use axum::{Json, Router, routing::get};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Database handle
    pub db: DatabaseConnection,
    /// Booking rules
    pub policy: BookingPolicy,
    /// Retry policy for reads
    pub retry: RetryPolicy,
    /// Where booking events go
    pub notifier: Arc<dyn Notifier>,
}

/// All routes, without state.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .merge(schools::router())
        .merge(classes::router())
        .merge(reservations::router())
        .merge(payments::router())
        .merge(discount_codes::router())
        .merge(instructors::router())
}

/// The application: routes, tracing and state.
pub fn build_app(state: AppState) -> Router {
    build_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "surfbook",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
