//! Payment transitions - confirming an offline payment and refunding a paid one.

use crate::{
    core::{
        actor::Actor,
        availability::BookingPolicy,
        discount,
        reservation::{self as reservations, Booking},
        school,
    },
    entities::{
        Class, Payment, Reservation,
        payment::{self, PaymentStatus},
        reservation::{self, ReservationStatus},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use tracing::info;

/// Proof of an offline payment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    /// Link to the uploaded transfer voucher
    #[serde(default)]
    pub voucher_url: Option<String>,
    /// Admin notes
    #[serde(default)]
    pub notes: Option<String>,
}

fn invalid(from: PaymentStatus, to: PaymentStatus) -> Error {
    Error::InvalidTransition {
        entity: "payment",
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    }
}

/// Marks an UNPAID payment as PAID and consumes its discount code.
pub(crate) async fn settle<C>(
    db: &C,
    payment: payment::Model,
    voucher_url: Option<String>,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<payment::Model>
where
    C: ConnectionTrait,
{
    if payment.status != PaymentStatus::Unpaid {
        return Err(invalid(payment.status, PaymentStatus::Paid));
    }
    if let Some(code_id) = payment.discount_code_id {
        discount::redeem_discount(db, code_id).await?;
    }

    let mut active: payment::ActiveModel = payment.into();
    active.status = Set(PaymentStatus::Paid);
    active.paid_at = Set(Some(now));
    if voucher_url.is_some() {
        active.voucher_url = Set(voucher_url);
    }
    if notes.is_some() {
        active.notes = Set(notes);
    }
    active.update(db).await.map_err(Into::into)
}

async fn load<C>(db: &C, payment_id: i64) -> Result<(payment::Model, reservation::Model)>
where
    C: ConnectionTrait,
{
    let payment = Payment::find_by_id(payment_id)
        .one(db)
        .await?
        .ok_or(Error::PaymentNotFound { id: payment_id })?;
    let reservation = Reservation::find_by_id(payment.reservation_id)
        .one(db)
        .await?
        .ok_or(Error::ReservationNotFound {
            id: payment.reservation_id,
        })?;
    Ok((payment, reservation))
}

/// Fails with `Forbidden` unless the actor manages the school the payment belongs to.
pub async fn ensure_manages_payment<C>(db: &C, actor: &Actor, payment_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    actor.require_staff()?;
    let (_, reservation) = load(db, payment_id).await?;
    let class = Class::find_by_id(reservation.class_id)
        .one(db)
        .await?
        .ok_or(Error::ClassNotFound {
            id: reservation.class_id,
        })?;
    school::ensure_manages_school(db, actor, class.school_id).await
}

/// Confirms an offline payment.
///
/// The reservation becomes PAID and any discount code is redeemed. A PENDING reservation
/// whose hold already lapsed no longer owns its spots, so availability is checked again
/// before it is accepted. Payment and reservation are re-read under the session lock.
pub async fn confirm_payment<C>(
    db: &C,
    policy: &BookingPolicy,
    payment_id: i64,
    confirmation: PaymentConfirmation,
    now: DateTime<Utc>,
) -> Result<Booking>
where
    C: ConnectionTrait + TransactionTrait,
{
    let (_, current) = load(db, payment_id).await?;

    let txn = db.begin().await?;
    reservations::lock_session(&txn, current.session_id).await?;
    let (payment, reservation) = load(&txn, payment_id).await?;

    if payment.status != PaymentStatus::Unpaid {
        return Err(invalid(payment.status, PaymentStatus::Paid));
    }
    reservations::ensure_transition(reservation.status, ReservationStatus::Paid)?;

    reservations::reclaim_lapsed_hold(&txn, policy, &reservation, now).await?;

    let payment = settle(&txn, payment, confirmation.voucher_url, confirmation.notes, now).await?;

    let mut active: reservation::ActiveModel = reservation.into();
    active.status = Set(ReservationStatus::Paid);
    active.updated_at = Set(now);
    let reservation = active.update(&txn).await?;

    txn.commit().await?;

    info!(
        payment_id,
        reservation_id = reservation.id,
        amount = payment.amount,
        "Confirmed payment"
    );
    Ok(Booking {
        reservation,
        payment,
    })
}

/// Refunds a PAID payment and cancels its reservation in the same transaction.
///
/// A reservation the student already cancelled keeps its status; only the payment moves.
///
/// The discount code's redemption count is left as it is.
pub async fn refund_payment<C>(db: &C, payment_id: i64, now: DateTime<Utc>) -> Result<Booking>
where
    C: ConnectionTrait + TransactionTrait,
{
    let (_, current) = load(db, payment_id).await?;

    let txn = db.begin().await?;
    reservations::lock_session(&txn, current.session_id).await?;
    let (payment, reservation) = load(&txn, payment_id).await?;

    if payment.status != PaymentStatus::Paid {
        return Err(invalid(payment.status, PaymentStatus::Refunded));
    }
    let already_cancelled = reservation.status == ReservationStatus::Canceled;
    if !already_cancelled {
        reservations::ensure_transition(reservation.status, ReservationStatus::Canceled)?;
    }

    let mut active_payment: payment::ActiveModel = payment.into();
    active_payment.status = Set(PaymentStatus::Refunded);
    let payment = active_payment.update(&txn).await?;

    let reservation = if already_cancelled {
        reservation
    } else {
        let mut active_reservation: reservation::ActiveModel = reservation.into();
        active_reservation.status = Set(ReservationStatus::Canceled);
        active_reservation.updated_at = Set(now);
        active_reservation.update(&txn).await?
    };

    txn.commit().await?;

    info!(
        payment_id,
        reservation_id = reservation.id,
        amount = payment.amount,
        "Refunded payment"
    );
    Ok(Booking {
        reservation,
        payment,
    })
}
