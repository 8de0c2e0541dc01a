//! Availability calculation.
//!
//! `available = capacity - spots held by live reservations`, clamped to `[0, capacity]`.
//! CONFIRMED, PAID and COMPLETED reservations always hold their spots. CANCELED never
//! does. PENDING reservations are a soft hold that lapses `pending_hold_minutes` after
//! creation; a hold window of zero means PENDING reservations hold nothing.

use crate::{
    entities::{
        Reservation,
        class_session,
        reservation::{self, ReservationStatus},
    },
    errors::Result,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sea_orm::{ConnectionTrait, QueryOrder, prelude::*};
use serde::{Deserialize, Serialize};

/// Booking rules that are configurable per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BookingPolicy {
    /// How long an unpaid PENDING reservation keeps its spots
    pub pending_hold_minutes: i64,
    /// Largest party a single reservation may book
    pub max_participants: i32,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            pending_hold_minutes: 30,
            max_participants: 10,
        }
    }
}

impl BookingPolicy {
    /// Whether a PENDING reservation created at `created_at` no longer holds spots.
    #[must_use]
    pub fn hold_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.pending_hold_minutes <= 0
            || created_at + Duration::minutes(self.pending_hold_minutes) <= now
    }
}

/// The parts of a reservation that matter for capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationLoad {
    /// Current status
    pub status: ReservationStatus,
    /// Spots requested
    pub participants: i32,
    /// Creation time, for PENDING holds
    pub created_at: DateTime<Utc>,
}

impl From<&reservation::Model> for ReservationLoad {
    fn from(model: &reservation::Model) -> Self {
        Self {
            status: model.status,
            participants: model.participants,
            created_at: model.created_at,
        }
    }
}

/// Whether a reservation currently takes spots away from its session.
#[must_use]
pub fn holds_spots(load: &ReservationLoad, policy: &BookingPolicy, now: DateTime<Utc>) -> bool {
    match load.status {
        ReservationStatus::Confirmed | ReservationStatus::Paid | ReservationStatus::Completed => {
            true
        }
        ReservationStatus::Pending => !policy.hold_expired(load.created_at, now),
        ReservationStatus::Canceled => false,
    }
}

/// Total spots held by the given reservations.
#[must_use]
pub fn reserved_spots(loads: &[ReservationLoad], policy: &BookingPolicy, now: DateTime<Utc>) -> i32 {
    loads
        .iter()
        .filter(|load| holds_spots(load, policy, now))
        .map(|load| load.participants.max(0))
        .fold(0i32, i32::saturating_add)
}

/// Remaining spots; always within `[0, capacity]`.
#[must_use]
pub fn compute_availability(
    capacity: i32,
    loads: &[ReservationLoad],
    policy: &BookingPolicy,
    now: DateTime<Utc>,
) -> i32 {
    let capacity = capacity.max(0);
    capacity
        .saturating_sub(reserved_spots(loads, policy, now))
        .clamp(0, capacity)
}

/// Availability of one session, as shown on the booking calendar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionAvailability {
    /// Session id
    pub session_id: i64,
    /// Class id
    pub class_id: i64,
    /// Date
    pub date: NaiveDate,
    /// Start time
    pub start_time: NaiveTime,
    /// Capacity
    pub capacity: i32,
    /// Remaining spots
    pub available_spots: i32,
    /// Price per participant
    pub price: f64,
    /// Closed sessions cannot be booked
    pub is_closed: bool,
}

/// Non-cancelled reservations for a session, oldest first.
pub async fn live_reservations<C>(db: &C, session_id: i64) -> Result<Vec<reservation::Model>>
where
    C: ConnectionTrait,
{
    Reservation::find()
        .filter(reservation::Column::SessionId.eq(session_id))
        .filter(reservation::Column::Status.ne(ReservationStatus::Canceled))
        .order_by_asc(reservation::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Computes the availability of a stored session.
pub async fn session_availability<C>(
    db: &C,
    policy: &BookingPolicy,
    session: &class_session::Model,
    class_default_price: f64,
    now: DateTime<Utc>,
) -> Result<SessionAvailability>
where
    C: ConnectionTrait,
{
    let reservations = live_reservations(db, session.id).await?;
    let loads: Vec<ReservationLoad> = reservations.iter().map(ReservationLoad::from).collect();

    Ok(SessionAvailability {
        session_id: session.id,
        class_id: session.class_id,
        date: session.date,
        start_time: session.start_time,
        capacity: session.capacity,
        available_spots: compute_availability(session.capacity, &loads, policy, now),
        price: session.effective_price(class_default_price),
        is_closed: session.is_closed,
    })
}
