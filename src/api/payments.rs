//! Payment routes

use crate::{
    api::AppState,
    core::{
        actor::Actor,
        payment::{self, PaymentConfirmation},
        reservation::Booking,
    },
    errors::Result,
    notify::{self, BookingEvent},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use chrono::Utc;

/// Payment routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payments/{id}/confirm", post(confirm_payment))
        .route("/api/payments/{id}/refund", post(refund_payment))
}

async fn confirm_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    confirmation: Option<Json<PaymentConfirmation>>,
) -> Result<Json<Booking>> {
    payment::ensure_manages_payment(&state.db, &actor, id).await?;
    let confirmation = confirmation.map(|Json(c)| c).unwrap_or_default();
    let booking =
        payment::confirm_payment(&state.db, &state.policy, id, confirmation, Utc::now()).await?;
    notify::dispatch(&state.notifier, BookingEvent::confirmed(&booking));
    Ok(Json(booking))
}

async fn refund_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<Booking>> {
    payment::ensure_manages_payment(&state.db, &actor, id).await?;
    let booking = payment::refund_payment(&state.db, id, Utc::now()).await?;
    notify::dispatch(&state.notifier, BookingEvent::refunded(&booking));
    Ok(Json(booking))
}
