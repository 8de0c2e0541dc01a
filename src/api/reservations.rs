//! Reservation routes

use crate::{
    api::AppState,
    core::{
        actor::Actor,
        reservation::{self, Booking, NewReservation},
        retry::with_retry,
        schedule,
    },
    entities::{payment::PaymentMethod, reservation::ReservationStatus},
    errors::{Error, Result},
    notify::{self, BookingEvent},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Reservation routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/reservations",
            get(list_reservations).post(create_reservation),
        )
        .route("/api/reservations/expire-holds", post(expire_holds))
        .route("/api/reservations/{id}", get(get_reservation))
        .route("/api/reservations/{id}/cancel", post(cancel_reservation))
        .route("/api/reservations/{id}/status", put(update_status))
}

const fn one() -> i32 {
    1
}

const fn transfer() -> PaymentMethod {
    PaymentMethod::Transfer
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReservationBody {
    class_id: i64,
    #[serde(default)]
    session_id: Option<i64>,
    date: String,
    time: String,
    #[serde(default = "one")]
    participants: i32,
    #[serde(default)]
    special_request: Option<String>,
    #[serde(default)]
    discount_code: Option<String>,
    #[serde(default = "transfer")]
    payment_method: PaymentMethod,
}

impl CreateReservationBody {
    fn into_request(self, user_id: i64) -> Result<NewReservation> {
        let date = schedule::parse_date("date", &self.date)?;
        let time = schedule::parse_time(&self.time)
            .map_err(|_| Error::validation("time", format!("'{}' is not a valid HH:MM time", self.time)))?;
        Ok(NewReservation {
            user_id,
            class_id: self.class_id,
            session_id: self.session_id,
            date,
            time,
            participants: self.participants,
            special_request: self.special_request,
            discount_code: self.discount_code,
            payment_method: self.payment_method,
        })
    }
}

async fn create_reservation(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<CreateReservationBody>,
) -> Result<(StatusCode, Json<Booking>)> {
    let request = body.into_request(actor.user_id)?;
    let booking = reservation::create_reservation(&state.db, &state.policy, request, Utc::now()).await?;
    notify::dispatch(&state.notifier, BookingEvent::created(&booking));
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_reservations(State(state): State<AppState>, actor: Actor) -> Result<Json<Vec<Booking>>> {
    let bookings = with_retry(&state.retry, "list_reservations", || {
        reservation::list_reservations_for_user(&state.db, actor.user_id)
    })
    .await?;
    Ok(Json(bookings))
}

async fn get_reservation(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<Booking>> {
    let booking = with_retry(&state.retry, "get_reservation", || {
        reservation::get_booking(&state.db, &actor, id)
    })
    .await?;
    Ok(Json(booking))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<Booking>> {
    let booking = reservation::cancel_reservation(&state.db, &actor, id, Utc::now()).await?;
    notify::dispatch(&state.notifier, BookingEvent::canceled(&booking));
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: ReservationStatus,
}

async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Booking>> {
    let booking = reservation::update_reservation_status(
        &state.db,
        &state.policy,
        &actor,
        id,
        body.status,
        Utc::now(),
    )
    .await?;
    match body.status {
        ReservationStatus::Canceled => {
            notify::dispatch(&state.notifier, BookingEvent::canceled(&booking));
        }
        ReservationStatus::Paid => {
            notify::dispatch(&state.notifier, BookingEvent::confirmed(&booking));
        }
        _ => {}
    }
    Ok(Json(booking))
}

#[derive(Debug, Serialize)]
struct ExpiredHolds {
    expired: u64,
}

async fn expire_holds(State(state): State<AppState>, actor: Actor) -> Result<Json<ExpiredHolds>> {
    if !actor.is_admin() {
        return Err(Error::Forbidden {
            message: "only admins may expire holds".to_string(),
        });
    }
    let expired = reservation::expire_stale_holds(&state.db, &state.policy, Utc::now()).await?;
    info!(expired, requested_by = actor.user_id, "Expired stale holds");
    Ok(Json(ExpiredHolds { expired }))
}
