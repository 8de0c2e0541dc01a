//! Reservation writer - books a session and creates its payment as one atomic unit.
//!
//! Every write that depends on a session's availability first bumps that session's
//! `version` inside the transaction. The bump is a write, so it takes the row lock
//! (the database write lock on SQLite) before any reservation is read, and two bookings
//! for the same session can never both pass the capacity check.

use crate::{
    core::{
        actor::Actor,
        availability::{self, BookingPolicy, ReservationLoad},
        class, discount, money,
        money::DiscountedPrice,
        payment as payments,
        school,
    },
    entities::{
        Class, ClassSession, Payment, Reservation, class_session,
        payment::{self, PaymentMethod, PaymentStatus},
        reservation::{self, ReservationStatus},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Longest special request a student may leave.
pub const MAX_SPECIAL_REQUEST_CHARS: usize = 500;

/// A booking request from a student.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReservation {
    /// Who is booking
    pub user_id: i64,
    /// Class being booked
    pub class_id: i64,
    /// Exact session, when the caller already knows it
    pub session_id: Option<i64>,
    /// Session date
    pub date: NaiveDate,
    /// Session start time
    pub time: NaiveTime,
    /// Spots requested
    pub participants: i32,
    /// Free text for the school
    pub special_request: Option<String>,
    /// Optional discount code
    pub discount_code: Option<String>,
    /// How the student pays
    pub payment_method: PaymentMethod,
}

/// A reservation together with its payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    /// The reservation
    pub reservation: reservation::Model,
    /// Its payment
    pub payment: payment::Model,
}

/// Whether a reservation may move from `from` to `to`.
#[must_use]
pub const fn can_transition(from: ReservationStatus, to: ReservationStatus) -> bool {
    use ReservationStatus::{Canceled, Completed, Confirmed, Paid, Pending};
    matches!(
        (from, to),
        (Pending, Confirmed | Paid | Canceled)
            | (Confirmed, Paid | Canceled | Completed)
            | (Paid, Completed | Canceled)
    )
}

pub(crate) fn ensure_transition(from: ReservationStatus, to: ReservationStatus) -> Result<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            entity: "reservation",
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

fn validate(input: &NewReservation, policy: &BookingPolicy) -> Result<()> {
    if input.participants < 1 || input.participants > policy.max_participants {
        return Err(Error::validation(
            "participants",
            format!("must be between 1 and {}", policy.max_participants),
        ));
    }
    if input
        .special_request
        .as_deref()
        .is_some_and(|s| s.chars().count() > MAX_SPECIAL_REQUEST_CHARS)
    {
        return Err(Error::validation(
            "specialRequest",
            format!("must be at most {MAX_SPECIAL_REQUEST_CHARS} characters"),
        ));
    }
    Ok(())
}

/// Takes the write lock on a session row by bumping its version.
pub(crate) async fn lock_session<C>(db: &C, session_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = ClassSession::update_many()
        .col_expr(
            class_session::Column::Version,
            Expr::col(class_session::Column::Version).add(1),
        )
        .filter(class_session::Column::Id.eq(session_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::SessionNotFound {
            reference: format!("id {session_id}"),
        });
    }
    Ok(())
}

/// Makes sure a PENDING reservation whose hold lapsed can still have its spots.
///
/// A lapsed hold no longer counts, so the spots may have been sold since. The caller
/// must already hold the session lock inside its transaction.
pub(crate) async fn reclaim_lapsed_hold<C>(
    db: &C,
    policy: &BookingPolicy,
    reservation: &reservation::Model,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if reservation.status != ReservationStatus::Pending
        || !policy.hold_expired(reservation.created_at, now)
    {
        return Ok(());
    }
    let session = class::get_session(db, reservation.session_id).await?;
    let others: Vec<ReservationLoad> = availability::live_reservations(db, session.id)
        .await?
        .iter()
        .filter(|r| r.id != reservation.id)
        .map(ReservationLoad::from)
        .collect();
    let available = availability::compute_availability(session.capacity, &others, policy, now);
    if reservation.participants > available {
        debug!(
            reservation_id = reservation.id,
            session_id = session.id,
            available,
            "Lapsed hold cannot be reclaimed"
        );
        return Err(Error::SessionFull {
            available,
            requested: reservation.participants,
        });
    }
    Ok(())
}

/// Finds the session a request refers to.
///
/// Without an explicit id, the first open session of the class at that date and time is
/// used; overlapping schedules may have produced more than one.
async fn find_session<C>(db: &C, input: &NewReservation) -> Result<class_session::Model>
where
    C: ConnectionTrait,
{
    if let Some(session_id) = input.session_id {
        let session = class::get_session(db, session_id).await?;
        if session.class_id != input.class_id {
            return Err(Error::SessionNotFound {
                reference: format!("id {session_id} in class {}", input.class_id),
            });
        }
        if session.is_closed {
            return Err(Error::SessionClosed { session_id });
        }
        return Ok(session);
    }

    let candidates = ClassSession::find()
        .filter(class_session::Column::ClassId.eq(input.class_id))
        .filter(class_session::Column::Date.eq(input.date))
        .filter(class_session::Column::StartTime.eq(input.time))
        .order_by_asc(class_session::Column::Id)
        .all(db)
        .await?;

    let Some(first) = candidates.first() else {
        return Err(Error::SessionNotFound {
            reference: format!(
                "class {} on {} at {}",
                input.class_id,
                input.date,
                input.time.format("%H:%M")
            ),
        });
    };
    let first_id = first.id;
    candidates
        .into_iter()
        .find(|s| !s.is_closed)
        .ok_or(Error::SessionClosed {
            session_id: first_id,
        })
}

/// Books a session.
///
/// Runs in one transaction: the session lock, the duplicate and capacity checks, pricing,
/// the reservation and payment inserts and, for prepaid bookings, the discount redemption
/// either all commit or none do. The lock is the transaction's first statement; the
/// session is looked up before it and read again under the lock.
pub async fn create_reservation<C>(
    db: &C,
    policy: &BookingPolicy,
    input: NewReservation,
    now: DateTime<Utc>,
) -> Result<Booking>
where
    C: ConnectionTrait + TransactionTrait,
{
    validate(&input, policy)?;
    class::get_class(db, input.class_id).await?;
    let session_id = find_session(db, &input).await?.id;

    let txn = db.begin().await?;
    lock_session(&txn, session_id).await?;

    let class = class::get_class(&txn, input.class_id).await?;
    let session = class::get_session(&txn, session_id).await?;
    if session.is_closed {
        return Err(Error::SessionClosed { session_id });
    }

    let live = availability::live_reservations(&txn, session.id).await?;
    let loads: Vec<ReservationLoad> = live.iter().map(ReservationLoad::from).collect();

    if let Some(existing) = live
        .iter()
        .zip(&loads)
        .find(|(r, load)| r.user_id == input.user_id && availability::holds_spots(load, policy, now))
        .map(|(r, _)| r)
    {
        return Err(Error::AlreadyReserved {
            reservation_id: existing.id,
        });
    }

    let available = availability::compute_availability(session.capacity, &loads, policy, now);
    if input.participants > available {
        debug!(
            session_id = session.id,
            available,
            requested = input.participants,
            "Session cannot take the booking"
        );
        return Err(Error::SessionFull {
            available,
            requested: input.participants,
        });
    }

    let unit_price = session.effective_price(class.default_price);
    let original = money::line_total(unit_price, input.participants);
    let code = match input.discount_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => {
            Some(discount::validate_discount(&txn, code, Some(class.school_id), now).await?)
        }
        _ => None,
    };
    let price = code.as_ref().map_or(
        DiscountedPrice {
            original,
            discount: 0.0,
            final_amount: original,
        },
        |code| discount::apply_discount(original, code),
    );

    let prepaid = input.payment_method.is_prepaid();
    let (reservation_status, payment_status) = if prepaid {
        (ReservationStatus::Confirmed, PaymentStatus::Paid)
    } else {
        (ReservationStatus::Pending, PaymentStatus::Unpaid)
    };

    let reservation = reservation::ActiveModel {
        user_id: Set(input.user_id),
        class_id: Set(class.id),
        session_id: Set(session.id),
        date: Set(session.date),
        start_time: Set(session.start_time),
        participants: Set(input.participants),
        special_request: Set(input.special_request),
        status: Set(reservation_status),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let payment = payment::ActiveModel {
        reservation_id: Set(reservation.id),
        original_amount: Set(price.original),
        amount: Set(price.final_amount),
        status: Set(payment_status),
        method: Set(input.payment_method),
        discount_code_id: Set(code.as_ref().map(|c| c.id)),
        voucher_url: Set(None),
        notes: Set(None),
        paid_at: Set(prepaid.then_some(now)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if prepaid {
        if let Some(code) = &code {
            discount::redeem_discount(&txn, code.id).await?;
        }
    }

    txn.commit().await?;

    info!(
        reservation_id = reservation.id,
        user_id = reservation.user_id,
        session_id = session.id,
        participants = reservation.participants,
        amount = payment.amount,
        status = reservation.status.as_str(),
        discount_code = code.as_ref().map(|c| c.code.as_str()),
        "Created reservation"
    );
    Ok(Booking {
        reservation,
        payment,
    })
}

async fn load_booking<C>(db: &C, reservation_id: i64) -> Result<Booking>
where
    C: ConnectionTrait,
{
    let (reservation, payment) = Reservation::find_by_id(reservation_id)
        .find_also_related(Payment)
        .one(db)
        .await?
        .ok_or(Error::ReservationNotFound { id: reservation_id })?;
    let payment = payment.ok_or_else(|| {
        Error::Database(DbErr::RecordNotFound(format!(
            "payment for reservation {reservation_id}"
        )))
    })?;
    Ok(Booking {
        reservation,
        payment,
    })
}

/// Whether the actor is the school's admin (or a platform admin) for this reservation.
async fn manages_reservation<C>(db: &C, actor: &Actor, reservation: &reservation::Model) -> Result<bool>
where
    C: ConnectionTrait,
{
    if actor.is_admin() {
        return Ok(true);
    }
    if !actor.is_staff() {
        return Ok(false);
    }
    let class = Class::find_by_id(reservation.class_id)
        .one(db)
        .await?
        .ok_or(Error::ClassNotFound {
            id: reservation.class_id,
        })?;
    Ok(school::ensure_manages_school(db, actor, class.school_id)
        .await
        .is_ok())
}

/// A booking visible to the actor: their own, or one at a school they manage.
pub async fn get_booking<C>(db: &C, actor: &Actor, reservation_id: i64) -> Result<Booking>
where
    C: ConnectionTrait,
{
    let booking = load_booking(db, reservation_id).await?;
    if booking.reservation.user_id != actor.user_id
        && !manages_reservation(db, actor, &booking.reservation).await?
    {
        return Err(Error::ReservationNotFound { id: reservation_id });
    }
    Ok(booking)
}

/// A user's bookings, newest first.
pub async fn list_reservations_for_user<C>(db: &C, user_id: i64) -> Result<Vec<Booking>>
where
    C: ConnectionTrait,
{
    let rows = Reservation::find()
        .filter(reservation::Column::UserId.eq(user_id))
        .order_by_desc(reservation::Column::CreatedAt)
        .find_also_related(Payment)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(reservation, payment)| match payment {
            Some(payment) => Some(Booking {
                reservation,
                payment,
            }),
            None => {
                warn!(reservation_id = reservation.id, "Reservation has no payment row");
                None
            }
        })
        .collect())
}

/// Cancels a reservation. Students may cancel their own; school admins any at their school.
pub async fn cancel_reservation<C>(
    db: &C,
    actor: &Actor,
    reservation_id: i64,
    now: DateTime<Utc>,
) -> Result<Booking>
where
    C: ConnectionTrait,
{
    let booking = get_booking(db, actor, reservation_id).await?;
    ensure_transition(booking.reservation.status, ReservationStatus::Canceled)?;

    let mut active: reservation::ActiveModel = booking.reservation.into();
    active.status = Set(ReservationStatus::Canceled);
    active.updated_at = Set(now);
    let reservation = active.update(db).await?;

    info!(reservation_id, cancelled_by = actor.user_id, "Cancelled reservation");
    if booking.payment.status == PaymentStatus::Paid {
        warn!(
            reservation_id,
            payment_id = booking.payment.id,
            amount = booking.payment.amount,
            "Cancelled a paid reservation, refund outstanding"
        );
    }
    Ok(Booking {
        reservation,
        payment: booking.payment,
    })
}

/// Moves a reservation along the status table. School admins and admins only.
///
/// Moving an unpaid booking to PAID settles its payment in the same transaction. A
/// PENDING booking whose hold lapsed is only accepted if its spots are still free.
pub async fn update_reservation_status<C>(
    db: &C,
    policy: &BookingPolicy,
    actor: &Actor,
    reservation_id: i64,
    status: ReservationStatus,
    now: DateTime<Utc>,
) -> Result<Booking>
where
    C: ConnectionTrait + TransactionTrait,
{
    actor.require_staff()?;
    let current = load_booking(db, reservation_id).await?;
    if !manages_reservation(db, actor, &current.reservation).await? {
        return Err(Error::Forbidden {
            message: format!("reservation {reservation_id} belongs to another school"),
        });
    }

    let txn = db.begin().await?;
    lock_session(&txn, current.reservation.session_id).await?;
    let booking = load_booking(&txn, reservation_id).await?;
    ensure_transition(booking.reservation.status, status)?;
    if matches!(status, ReservationStatus::Confirmed | ReservationStatus::Paid) {
        reclaim_lapsed_hold(&txn, policy, &booking.reservation, now).await?;
    }

    let payment = if status == ReservationStatus::Paid
        && booking.payment.status == PaymentStatus::Unpaid
    {
        payments::settle(&txn, booking.payment, None, None, now).await?
    } else {
        booking.payment
    };

    let from = booking.reservation.status;
    let mut active: reservation::ActiveModel = booking.reservation.into();
    active.status = Set(status);
    active.updated_at = Set(now);
    let reservation = active.update(&txn).await?;
    txn.commit().await?;

    info!(
        reservation_id,
        from = from.as_str(),
        to = status.as_str(),
        changed_by = actor.user_id,
        "Updated reservation status"
    );
    Ok(Booking {
        reservation,
        payment,
    })
}

/// Cancels PENDING reservations whose hold has lapsed without payment.
///
/// Returns how many were cancelled. Does nothing when holds are disabled.
pub async fn expire_stale_holds<C>(db: &C, policy: &BookingPolicy, now: DateTime<Utc>) -> Result<u64>
where
    C: ConnectionTrait,
{
    if policy.pending_hold_minutes <= 0 {
        return Ok(0);
    }
    let cutoff = now - chrono::Duration::minutes(policy.pending_hold_minutes);

    let stale: Vec<i64> = Reservation::find()
        .filter(reservation::Column::Status.eq(ReservationStatus::Pending))
        .filter(reservation::Column::CreatedAt.lte(cutoff))
        .find_also_related(Payment)
        .all(db)
        .await?
        .into_iter()
        .filter(|(_, payment)| payment.as_ref().is_none_or(|p| p.status == PaymentStatus::Unpaid))
        .map(|(reservation, _)| reservation.id)
        .collect();
    if stale.is_empty() {
        return Ok(0);
    }

    let result = Reservation::update_many()
        .col_expr(reservation::Column::Status, Expr::value(ReservationStatus::Canceled))
        .col_expr(reservation::Column::UpdatedAt, Expr::value(now))
        .filter(reservation::Column::Id.is_in(stale))
        .filter(reservation::Column::Status.eq(ReservationStatus::Pending))
        .exec(db)
        .await?;

    info!(expired = result.rows_affected, %cutoff, "Expired stale pending holds");
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp)]
    use super::*;
    use crate::core::actor::Role;
    use crate::entities::DiscountCode;
    use crate::errors::DiscountRejection;
    use crate::test_utils::*;
    use chrono::Duration;
    use sea_orm::PaginatorTrait;
    use tokio::task::JoinSet;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn request(user_id: i64, class_id: i64, participants: i32) -> NewReservation {
        NewReservation {
            user_id,
            class_id,
            session_id: None,
            date: date("2025-06-02"),
            time: time("09:00"),
            participants,
            special_request: None,
            discount_code: None,
            payment_method: PaymentMethod::Transfer,
        }
    }

    #[test]
    fn test_transition_table() {
        use ReservationStatus::*;
        assert!(can_transition(Pending, Confirmed));
        assert!(can_transition(Pending, Paid));
        assert!(can_transition(Confirmed, Completed));
        assert!(can_transition(Paid, Canceled));
        assert!(!can_transition(Pending, Completed));
        assert!(!can_transition(Canceled, Confirmed));
        assert!(!can_transition(Completed, Canceled));
        assert!(!can_transition(Paid, Pending));
    }

    #[tokio::test]
    async fn test_booking_the_last_spots() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let session = create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        for user in 0..6 {
            create_test_reservation(&db, &session, 100 + user, 1, ReservationStatus::Confirmed).await?;
        }

        let booking = create_reservation(&db, &policy, request(1, class.id, 2), Utc::now()).await?;
        assert_eq!(booking.reservation.status, ReservationStatus::Pending);
        assert_eq!(booking.payment.status, PaymentStatus::Unpaid);
        assert_eq!(booking.payment.amount, 90.0);

        let full = create_reservation(&db, &policy, request(2, class.id, 1), Utc::now()).await;
        assert!(matches!(
            full,
            Err(Error::SessionFull {
                available: 0,
                requested: 1
            })
        ));
        assert_eq!(Reservation::find().count(&db).await?, 7);
        Ok(())
    }

    #[tokio::test]
    async fn test_online_booking_with_code_redeems_it() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        let code = create_test_discount(&db, "VERANO2024", 20.0, Some(100), 99, Some(school.id)).await?;

        let mut input = request(1, class.id, 1);
        input.discount_code = Some("verano2024".to_string());
        input.payment_method = PaymentMethod::Online;
        let booking = create_reservation(&db, &policy, input, Utc::now()).await?;

        assert_eq!(booking.reservation.status, ReservationStatus::Confirmed);
        assert_eq!(booking.payment.status, PaymentStatus::Paid);
        assert_eq!(booking.payment.original_amount, 45.0);
        assert_eq!(booking.payment.amount, 36.0);
        assert_eq!(booking.payment.discount_code_id, Some(code.id));
        let reloaded = DiscountCode::find_by_id(code.id).one(&db).await?.unwrap();
        assert_eq!(reloaded.used_count, 100);

        let mut second = request(2, class.id, 1);
        second.discount_code = Some("VERANO2024".to_string());
        second.payment_method = PaymentMethod::Online;
        let rejected = create_reservation(&db, &policy, second, Utc::now()).await;
        assert!(matches!(
            rejected,
            Err(Error::DiscountRejected {
                reason: DiscountRejection::Exhausted,
                ..
            })
        ));
        let reloaded = DiscountCode::find_by_id(code.id).one(&db).await?.unwrap();
        assert_eq!(reloaded.used_count, 100);
        assert_eq!(Reservation::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_code_for_another_school_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school_a = create_test_school(&db, "A", None).await?;
        let school_b = create_test_school(&db, "B", None).await?;
        let class = create_test_class(&db, school_b.id, 45.0, 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        create_test_discount(&db, "ONLYA", 20.0, None, 0, Some(school_a.id)).await?;

        let mut input = request(1, class.id, 1);
        input.discount_code = Some("ONLYA".to_string());
        let result = create_reservation(&db, &policy, input, Utc::now()).await;
        assert!(matches!(
            result,
            Err(Error::DiscountRejected {
                reason: DiscountRejection::WrongSchool,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_double_booking_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;

        let first = create_reservation(&db, &policy, request(1, class.id, 1), Utc::now()).await?;
        let again = create_reservation(&db, &policy, request(1, class.id, 1), Utc::now()).await;
        assert!(matches!(
            again,
            Err(Error::AlreadyReserved { reservation_id }) if reservation_id == first.reservation.id
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_soft_deleted_class_rejects_booking() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        class::soft_delete_class(&db, class.id).await?;

        let result = create_reservation(&db, &policy, request(1, class.id, 1), Utc::now()).await;
        assert!(matches!(result, Err(Error::ClassNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_closed_and_missing_sessions() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let session = create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        let mut active: class_session::ActiveModel = session.into();
        active.is_closed = Set(true);
        active.update(&db).await?;

        let closed = create_reservation(&db, &policy, request(1, class.id, 1), Utc::now()).await;
        assert!(matches!(closed, Err(Error::SessionClosed { .. })));

        let mut elsewhere = request(1, class.id, 1);
        elsewhere.time = time("17:00");
        let missing = create_reservation(&db, &policy, elsewhere, Utc::now()).await;
        assert!(matches!(missing, Err(Error::SessionNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_writing() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();

        let zero = create_reservation(&db, &policy, request(1, 1, 0), Utc::now()).await;
        assert!(matches!(zero, Err(Error::Validation { ref field, .. }) if field == "participants"));

        let eleven = create_reservation(&db, &policy, request(1, 1, 11), Utc::now()).await;
        assert!(matches!(eleven, Err(Error::Validation { .. })));

        let mut chatty = request(1, 1, 1);
        chatty.special_request = Some("x".repeat(501));
        let chatty = create_reservation(&db, &policy, chatty, Utc::now()).await;
        assert!(matches!(chatty, Err(Error::Validation { ref field, .. }) if field == "specialRequest"));
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_hold_frees_capacity() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "09:00", 2).await?;

        let earlier = Utc::now() - Duration::hours(2);
        create_reservation(&db, &policy, request(1, class.id, 2), earlier).await?;

        let now = Utc::now();
        let booking = create_reservation(&db, &policy, request(2, class.id, 2), now).await?;
        assert_eq!(booking.reservation.participants, 2);

        let expired = expire_stale_holds(&db, &policy, now).await?;
        assert_eq!(expired, 1);
        let pending = Reservation::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::Pending))
            .count(&db)
            .await?;
        assert_eq!(pending, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_own_and_not_others() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        let booking = create_reservation(&db, &policy, request(1, class.id, 1), Utc::now()).await?;

        let stranger = Actor::new(2, Role::Student);
        let denied = cancel_reservation(&db, &stranger, booking.reservation.id, Utc::now()).await;
        assert!(matches!(denied, Err(Error::ReservationNotFound { .. })));

        let owner = Actor::new(1, Role::Student);
        let cancelled = cancel_reservation(&db, &owner, booking.reservation.id, Utc::now()).await?;
        assert_eq!(cancelled.reservation.status, ReservationStatus::Canceled);

        let twice = cancel_reservation(&db, &owner, booking.reservation.id, Utc::now()).await;
        assert!(matches!(twice, Err(Error::InvalidTransition { .. })));

        let rebooked = create_reservation(&db, &policy, request(1, class.id, 1), Utc::now()).await?;
        assert_ne!(rebooked.reservation.id, booking.reservation.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_status_change_settles_payment() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", Some(7)).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        let booking = create_reservation(&db, &policy, request(1, class.id, 1), Utc::now()).await?;

        let student = Actor::new(1, Role::Student);
        let forbidden = update_reservation_status(
            &db,
            &policy,
            &student,
            booking.reservation.id,
            ReservationStatus::Paid,
            Utc::now(),
        )
        .await;
        assert!(matches!(forbidden, Err(Error::Forbidden { .. })));

        let owner = Actor::new(7, Role::SchoolAdmin);
        let paid = update_reservation_status(
            &db,
            &policy,
            &owner,
            booking.reservation.id,
            ReservationStatus::Paid,
            Utc::now(),
        )
        .await?;
        assert_eq!(paid.reservation.status, ReservationStatus::Paid);
        assert_eq!(paid.payment.status, PaymentStatus::Paid);
        assert!(paid.payment.paid_at.is_some());

        let back = update_reservation_status(
            &db,
            &policy,
            &owner,
            booking.reservation.id,
            ReservationStatus::Pending,
            Utc::now(),
        )
        .await;
        assert!(matches!(back, Err(Error::InvalidTransition { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_cannot_confirm_lapsed_hold_into_full_session() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", Some(7)).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let session = create_test_session(&db, class.id, date("2025-06-02"), "09:00", 1).await?;

        let lapsed = create_reservation(
            &db,
            &policy,
            request(1, class.id, 1),
            Utc::now() - Duration::hours(2),
        )
        .await?;
        let mut online = request(2, class.id, 1);
        online.payment_method = PaymentMethod::Online;
        create_reservation(&db, &policy, online, Utc::now()).await?;

        let owner = Actor::new(7, Role::SchoolAdmin);
        for status in [ReservationStatus::Confirmed, ReservationStatus::Paid] {
            let result =
                update_reservation_status(&db, &policy, &owner, lapsed.reservation.id, status, Utc::now())
                    .await;
            assert!(matches!(
                result,
                Err(Error::SessionFull {
                    available: 0,
                    requested: 1
                })
            ));
        }

        let live = availability::live_reservations(&db, session.id).await?;
        let loads: Vec<ReservationLoad> = live.iter().map(ReservationLoad::from).collect();
        assert_eq!(availability::reserved_spots(&loads, &policy, Utc::now()), 1);
        let unchanged = load_booking(&db, lapsed.reservation.id).await?;
        assert_eq!(unchanged.reservation.status, ReservationStatus::Pending);
        assert_eq!(unchanged.payment.status, PaymentStatus::Unpaid);
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_confirms_lapsed_hold_when_spots_free() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", Some(7)).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "09:00", 1).await?;
        let lapsed = create_reservation(
            &db,
            &policy,
            request(1, class.id, 1),
            Utc::now() - Duration::hours(2),
        )
        .await?;

        let owner = Actor::new(7, Role::SchoolAdmin);
        let confirmed = update_reservation_status(
            &db,
            &policy,
            &owner,
            lapsed.reservation.id,
            ReservationStatus::Confirmed,
            Utc::now(),
        )
        .await?;
        assert_eq!(confirmed.reservation.status, ReservationStatus::Confirmed);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelling_paid_booking_leaves_refund_to_staff() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        let mut online = request(1, class.id, 1);
        online.payment_method = PaymentMethod::Online;
        let booking = create_reservation(&db, &policy, online, Utc::now()).await?;

        let owner = Actor::new(1, Role::Student);
        let cancelled = cancel_reservation(&db, &owner, booking.reservation.id, Utc::now()).await?;
        assert_eq!(cancelled.reservation.status, ReservationStatus::Canceled);
        assert_eq!(cancelled.payment.status, PaymentStatus::Paid);

        let refunded = payments::refund_payment(&db, booking.payment.id, Utc::now()).await?;
        assert_eq!(refunded.payment.status, PaymentStatus::Refunded);
        assert_eq!(refunded.reservation.status, ReservationStatus::Canceled);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bookings_for_last_spot() -> Result<()> {
        let (db, _dir) = setup_pooled_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let session = create_test_session(&db, class.id, date("2025-06-02"), "09:00", 1).await?;

        let mut tasks = JoinSet::new();
        for user_id in 1..=8 {
            let db = db.clone();
            let mut input = request(user_id, class.id, 1);
            input.payment_method = PaymentMethod::Online;
            tasks.spawn(async move { create_reservation(&db, &policy, input, Utc::now()).await });
        }

        let (mut booked, mut full, mut unexpected) = (0, 0, Vec::new());
        while let Some(joined) = tasks.join_next().await {
            match joined.unwrap() {
                Ok(_) => booked += 1,
                Err(Error::SessionFull {
                    available: 0,
                    requested: 1,
                }) => full += 1,
                Err(other) => unexpected.push(other.to_string()),
            }
        }
        assert!(unexpected.is_empty(), "{unexpected:?}");
        assert_eq!((booked, full), (1, 7));

        let held = Reservation::find()
            .filter(reservation::Column::SessionId.eq(session.id))
            .count(&db)
            .await?;
        assert_eq!(held, 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_capacity_cut_racing_bookings_never_overbooks() -> Result<()> {
        let (db, _dir) = setup_pooled_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let session = create_test_session(&db, class.id, date("2025-06-02"), "09:00", 2).await?;

        let mut bookings = JoinSet::new();
        for user_id in 1..=2 {
            let db = db.clone();
            let mut input = request(user_id, class.id, 1);
            input.payment_method = PaymentMethod::Online;
            bookings.spawn(async move { create_reservation(&db, &policy, input, Utc::now()).await });
        }
        let cut_db = db.clone();
        let session_id = session.id;
        let cut = tokio::spawn(async move {
            class::update_session(
                &cut_db,
                &policy,
                session_id,
                class::SessionUpdate {
                    capacity: Some(1),
                    ..class::SessionUpdate::default()
                },
                Utc::now(),
            )
            .await
        });

        let mut booked = 0;
        while let Some(joined) = bookings.join_next().await {
            match joined.unwrap() {
                Ok(_) => booked += 1,
                Err(err) => assert!(matches!(err, Error::SessionFull { .. }), "{err}"),
            }
        }
        match cut.await.unwrap() {
            Ok(updated) => {
                assert_eq!(updated.capacity, 1);
                assert_eq!(booked, 1);
            }
            Err(err) => {
                assert!(matches!(err, Error::CapacityBelowReservations { .. }), "{err}");
                assert_eq!(booked, 2);
            }
        }

        let session = class::get_session(&db, session.id).await?;
        let loads: Vec<ReservationLoad> = availability::live_reservations(&db, session.id)
            .await?
            .iter()
            .map(ReservationLoad::from)
            .collect();
        assert!(availability::reserved_spots(&loads, &policy, Utc::now()) <= session.capacity);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_for_user_newest_first() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "14:00", 8).await?;

        let now = Utc::now();
        create_reservation(&db, &policy, request(1, class.id, 1), now - Duration::minutes(5)).await?;
        let mut afternoon = request(1, class.id, 1);
        afternoon.time = time("14:00");
        create_reservation(&db, &policy, afternoon, now).await?;
        create_reservation(&db, &policy, request(2, class.id, 1), now).await?;

        let mine = list_reservations_for_user(&db, 1).await?;
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].reservation.start_time, time("14:00"));
        Ok(())
    }
}
