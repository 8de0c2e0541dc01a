//! Booking notifications.
//!
//! Events are dispatched after the database transaction commits, on a spawned task.
//! A failing notifier is logged and otherwise ignored; it never changes the outcome
//! of the booking that triggered it.

use crate::core::reservation::Booking;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Something worth telling the student or the school about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEvent {
    /// A reservation was created
    ReservationCreated {
        /// Reservation id
        reservation_id: i64,
        /// Student
        user_id: i64,
        /// Class
        class_id: i64,
        /// Session date
        date: NaiveDate,
        /// Session time
        start_time: NaiveTime,
        /// Spots booked
        participants: i32,
        /// Amount due or paid
        amount: f64,
    },
    /// A reservation was cancelled
    ReservationCanceled {
        /// Reservation id
        reservation_id: i64,
        /// Student
        user_id: i64,
    },
    /// An offline payment was confirmed
    PaymentConfirmed {
        /// Payment id
        payment_id: i64,
        /// Reservation id
        reservation_id: i64,
        /// Amount paid
        amount: f64,
    },
    /// A payment was refunded
    PaymentRefunded {
        /// Payment id
        payment_id: i64,
        /// Reservation id
        reservation_id: i64,
        /// Amount refunded
        amount: f64,
    },
}

impl BookingEvent {
    /// Event for a freshly created booking.
    #[must_use]
    pub fn created(booking: &Booking) -> Self {
        Self::ReservationCreated {
            reservation_id: booking.reservation.id,
            user_id: booking.reservation.user_id,
            class_id: booking.reservation.class_id,
            date: booking.reservation.date,
            start_time: booking.reservation.start_time,
            participants: booking.reservation.participants,
            amount: booking.payment.amount,
        }
    }

    /// Event for a cancelled booking.
    #[must_use]
    pub const fn canceled(booking: &Booking) -> Self {
        Self::ReservationCanceled {
            reservation_id: booking.reservation.id,
            user_id: booking.reservation.user_id,
        }
    }

    /// Event for a confirmed payment.
    #[must_use]
    pub const fn confirmed(booking: &Booking) -> Self {
        Self::PaymentConfirmed {
            payment_id: booking.payment.id,
            reservation_id: booking.reservation.id,
            amount: booking.payment.amount,
        }
    }

    /// Event for a refunded payment.
    #[must_use]
    pub const fn refunded(booking: &Booking) -> Self {
        Self::PaymentRefunded {
            payment_id: booking.payment.id,
            reservation_id: booking.reservation.id,
            amount: booking.payment.amount,
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::ReservationCreated { .. } => "reservation_created",
            Self::ReservationCanceled { .. } => "reservation_canceled",
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::PaymentRefunded { .. } => "payment_refunded",
        }
    }
}

/// Error reported by a notifier.
#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers booking events, e.g. by email.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one event.
    async fn notify(&self, event: &BookingEvent) -> Result<(), NotifyError>;
}

/// Writes events to the log. Used when no delivery channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &BookingEvent) -> Result<(), NotifyError> {
        info!(event = event.name(), ?event, "Booking notification");
        Ok(())
    }
}

/// Sends `event` on a background task.
pub fn dispatch(notifier: &Arc<dyn Notifier>, event: BookingEvent) -> tokio::task::JoinHandle<()> {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&event).await {
            warn!(event = event.name(), "Failed to deliver notification: {e}");
        }
    })
}


#[cfg(test)]
mod tests {
    use super::testing::{FailingNotifier, RecordingNotifier};
    use super::*;

    fn event() -> BookingEvent {
        BookingEvent::ReservationCanceled {
            reservation_id: 1,
            user_id: 2,
        }
    }

    #[tokio::test]
    async fn test_dispatch_delivers() {
        let recorder = Arc::new(RecordingNotifier::default());
        let notifier = Arc::clone(&recorder) as Arc<dyn Notifier>;

        let handle = dispatch(&notifier, event());
        assert!(handle.await.is_ok());
        assert_eq!(recorder.events(), vec![event()]);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let notifier: Arc<dyn Notifier> = Arc::new(FailingNotifier);
        let handle = dispatch(&notifier, event());
        assert!(handle.await.is_ok());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(event()).unwrap_or_default();
        assert_eq!(json["type"], "RESERVATION_CANCELED");
        assert_eq!(json["reservation_id"], 1);
    }
}
