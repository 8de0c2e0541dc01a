//! Class catalog - classes, their schedules, materialized sessions and the booking calendar.
//!
//! Mutations here do not check who is calling; the HTTP layer resolves permissions with
//! [`ensure_manages_class`] and [`school::ensure_manages_school`] first. Seeding calls the
//! same functions without an actor.

use crate::{
    core::{
        actor::Actor,
        availability::{self, BookingPolicy, ReservationLoad, SessionAvailability},
        reservation as reservations,
        schedule::{self, Expansion, ExpansionWindow, ScheduleInput, ScheduleSpec, SessionDefaults},
        school,
    },
    entities::{
        Class, ClassSchedule, ClassSession, Payment, Reservation,
        class::{self, ClassLevel},
        class_schedule, class_session, payment,
        reservation::{self, ReservationStatus},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Fields for a new class.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    /// Title shown to students
    pub title: String,
    /// Long description
    #[serde(default)]
    pub description: Option<String>,
    /// Skill level
    pub level: ClassLevel,
    /// Price per participant when a session sets none
    #[serde(alias = "price")]
    pub default_price: f64,
    /// Capacity for generated sessions
    #[serde(alias = "capacity")]
    pub default_capacity: i32,
    /// Length of one session
    #[serde(alias = "duration")]
    pub duration_minutes: i32,
    /// Beach or spot name
    #[serde(default)]
    pub beach: Option<String>,
}

/// Partial class update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassUpdate {
    /// New title
    #[serde(default)]
    pub title: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// New level
    #[serde(default)]
    pub level: Option<ClassLevel>,
    /// New default price
    #[serde(default)]
    pub default_price: Option<f64>,
    /// New default capacity
    #[serde(default)]
    pub default_capacity: Option<i32>,
    /// New duration
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    /// New beach
    #[serde(default)]
    pub beach: Option<String>,
}

fn validate_title(title: &str) -> Result<()> {
    let len = title.trim().chars().count();
    if len == 0 || len > 200 {
        return Err(Error::validation("title", "must be 1-200 characters"));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<()> {
    if description.is_some_and(|d| d.chars().count() > 1000) {
        return Err(Error::validation("description", "must be at most 1000 characters"));
    }
    Ok(())
}

fn validate_duration(minutes: i32) -> Result<()> {
    if !(30..=480).contains(&minutes) {
        return Err(Error::validation("durationMinutes", "must be 30-480 minutes"));
    }
    Ok(())
}

fn validate_capacity(field: &str, capacity: i32) -> Result<()> {
    if !(1..=50).contains(&capacity) {
        return Err(Error::validation(field, "must be 1-50"));
    }
    Ok(())
}

fn validate_price(field: &str, price: f64) -> Result<()> {
    if !price.is_finite() || !(0.0..=10_000.0).contains(&price) {
        return Err(Error::validation(field, "must be between 0 and 10000"));
    }
    Ok(())
}

/// Creates a class under a school.
pub async fn create_class<C>(db: &C, school_id: i64, input: NewClass) -> Result<class::Model>
where
    C: ConnectionTrait,
{
    validate_title(&input.title)?;
    validate_description(input.description.as_deref())?;
    validate_duration(input.duration_minutes)?;
    validate_capacity("defaultCapacity", input.default_capacity)?;
    validate_price("defaultPrice", input.default_price)?;

    school::get_school(db, school_id).await?;

    let now = Utc::now();
    let class = class::ActiveModel {
        school_id: Set(school_id),
        title: Set(input.title.trim().to_string()),
        description: Set(input.description),
        level: Set(input.level),
        default_price: Set(input.default_price),
        default_capacity: Set(input.default_capacity),
        duration_minutes: Set(input.duration_minutes),
        beach: Set(input.beach),
        deleted_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(class_id = class.id, school_id, title = %class.title, "Created class");
    Ok(class)
}

/// Gets a class; soft-deleted classes are reported as missing.
pub async fn get_class<C>(db: &C, class_id: i64) -> Result<class::Model>
where
    C: ConnectionTrait,
{
    Class::find_by_id(class_id)
        .one(db)
        .await?
        .filter(|class| !class.is_deleted())
        .ok_or(Error::ClassNotFound { id: class_id })
}

/// Visible classes of a school, by title.
pub async fn list_classes_for_school<C>(db: &C, school_id: i64) -> Result<Vec<class::Model>>
where
    C: ConnectionTrait,
{
    Class::find()
        .filter(class::Column::SchoolId.eq(school_id))
        .filter(class::Column::DeletedAt.is_null())
        .order_by_asc(class::Column::Title)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Fails with `Forbidden` unless the actor manages the class's school.
pub async fn ensure_manages_class<C>(db: &C, actor: &Actor, class_id: i64) -> Result<class::Model>
where
    C: ConnectionTrait,
{
    actor.require_staff()?;
    let class = get_class(db, class_id).await?;
    school::ensure_manages_school(db, actor, class.school_id).await?;
    Ok(class)
}

/// Updates class defaults. Existing sessions keep their own capacity and price.
pub async fn update_class<C>(db: &C, class_id: i64, update: ClassUpdate) -> Result<class::Model>
where
    C: ConnectionTrait,
{
    let current = get_class(db, class_id).await?;
    let mut active: class::ActiveModel = current.into();

    if let Some(title) = update.title {
        validate_title(&title)?;
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = update.description {
        validate_description(Some(&description))?;
        active.description = Set(Some(description));
    }
    if let Some(level) = update.level {
        active.level = Set(level);
    }
    if let Some(price) = update.default_price {
        validate_price("defaultPrice", price)?;
        active.default_price = Set(price);
    }
    if let Some(capacity) = update.default_capacity {
        validate_capacity("defaultCapacity", capacity)?;
        active.default_capacity = Set(capacity);
    }
    if let Some(minutes) = update.duration_minutes {
        validate_duration(minutes)?;
        active.duration_minutes = Set(minutes);
    }
    if let Some(beach) = update.beach {
        active.beach = Set(Some(beach));
    }
    active.updated_at = Set(Utc::now());

    active.update(db).await.map_err(Into::into)
}

/// Hides a class from listings, the calendar and new bookings.
///
/// Existing reservations are left as they are.
pub async fn soft_delete_class<C>(db: &C, class_id: i64) -> Result<class::Model>
where
    C: ConnectionTrait,
{
    let current = get_class(db, class_id).await?;
    let now = Utc::now();
    let mut active: class::ActiveModel = current.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    let class = active.update(db).await?;

    info!(class_id, "Soft-deleted class");
    Ok(class)
}

/// Removes a class and everything under it.
///
/// Refused while any reservation on the class is not cancelled.
pub async fn delete_class<C>(db: &C, class_id: i64) -> Result<()>
where
    C: ConnectionTrait + TransactionTrait,
{
    Class::find_by_id(class_id)
        .one(db)
        .await?
        .ok_or(Error::ClassNotFound { id: class_id })?;

    let active = Reservation::find()
        .filter(reservation::Column::ClassId.eq(class_id))
        .filter(reservation::Column::Status.ne(ReservationStatus::Canceled))
        .count(db)
        .await?;
    if active > 0 {
        return Err(Error::ClassHasReservations { id: class_id, active });
    }

    let txn = db.begin().await?;

    let reservation_ids: Vec<i64> = Reservation::find()
        .filter(reservation::Column::ClassId.eq(class_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|r| r.id)
        .collect();
    if !reservation_ids.is_empty() {
        Payment::delete_many()
            .filter(payment::Column::ReservationId.is_in(reservation_ids.clone()))
            .exec(&txn)
            .await?;
        Reservation::delete_many()
            .filter(reservation::Column::Id.is_in(reservation_ids))
            .exec(&txn)
            .await?;
    }
    ClassSession::delete_many()
        .filter(class_session::Column::ClassId.eq(class_id))
        .exec(&txn)
        .await?;
    ClassSchedule::delete_many()
        .filter(class_schedule::Column::ClassId.eq(class_id))
        .exec(&txn)
        .await?;
    Class::delete_by_id(class_id).exec(&txn).await?;

    txn.commit().await?;

    info!(class_id, "Deleted class");
    Ok(())
}

/// Stored schedules of a class, in insertion order.
pub async fn list_schedules<C>(db: &C, class_id: i64) -> Result<Vec<class_schedule::Model>>
where
    C: ConnectionTrait,
{
    ClassSchedule::find()
        .filter(class_schedule::Column::ClassId.eq(class_id))
        .order_by_asc(class_schedule::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Result of replacing a class's schedules.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleUpdate {
    /// The stored schedules
    pub schedules: Vec<class_schedule::Model>,
    /// What the schedules expand to over the preview window
    pub preview: Expansion,
}

/// Replaces every schedule of a class.
///
/// All inputs are validated before anything is written. Future sessions generated by the
/// old schedules are removed unless they carry reservations; those are kept as ad-hoc
/// sessions.
pub async fn set_schedules<C>(
    db: &C,
    class_id: i64,
    inputs: &[ScheduleInput],
    preview_window: ExpansionWindow,
    today: NaiveDate,
) -> Result<ScheduleUpdate>
where
    C: ConnectionTrait + TransactionTrait,
{
    let class = get_class(db, class_id).await?;
    let specs = inputs
        .iter()
        .map(ScheduleInput::validate)
        .collect::<Result<Vec<ScheduleSpec>>>()?;
    for spec in &specs {
        if let Some(capacity) = spec.capacity {
            validate_capacity("capacity", capacity)?;
        }
        if let Some(price) = spec.price {
            validate_price("price", price)?;
        }
    }

    let txn = db.begin().await?;

    let old_ids: Vec<i64> = list_schedules(&txn, class_id)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();

    if !old_ids.is_empty() {
        let generated = ClassSession::find()
            .filter(class_session::Column::ScheduleId.is_in(old_ids.clone()))
            .all(&txn)
            .await?;
        let booked: HashSet<i64> = Reservation::find()
            .filter(
                reservation::Column::SessionId.is_in(generated.iter().map(|s| s.id).collect::<Vec<_>>()),
            )
            .all(&txn)
            .await?
            .into_iter()
            .map(|r| r.session_id)
            .collect();

        let (keep, drop): (Vec<_>, Vec<_>) = generated
            .into_iter()
            .partition(|s| booked.contains(&s.id) || s.date < today);

        if !drop.is_empty() {
            ClassSession::delete_many()
                .filter(class_session::Column::Id.is_in(drop.iter().map(|s| s.id).collect::<Vec<_>>()))
                .exec(&txn)
                .await?;
        }
        if !keep.is_empty() {
            ClassSession::update_many()
                .col_expr(class_session::Column::ScheduleId, Expr::value(Option::<i64>::None))
                .filter(class_session::Column::Id.is_in(keep.iter().map(|s| s.id).collect::<Vec<_>>()))
                .exec(&txn)
                .await?;
        }
        ClassSchedule::delete_many()
            .filter(class_schedule::Column::Id.is_in(old_ids))
            .exec(&txn)
            .await?;
        debug!(class_id, removed = drop.len(), detached = keep.len(), "Cleared old schedule sessions");
    }

    let mut schedules = Vec::with_capacity(specs.len());
    for spec in &specs {
        schedules.push(spec.to_active_model(class_id).insert(&txn).await?);
    }

    txn.commit().await?;

    let stored = schedules
        .iter()
        .map(ScheduleSpec::from_model)
        .collect::<Result<Vec<_>>>()?;
    let preview = schedule::expand_schedules(&stored, &defaults_for(&class), &preview_window, today);

    info!(
        class_id,
        schedules = schedules.len(),
        preview_sessions = preview.sessions.len(),
        duplicates = preview.duplicates.len(),
        "Replaced class schedules"
    );
    Ok(ScheduleUpdate { schedules, preview })
}

fn defaults_for(class: &class::Model) -> SessionDefaults {
    SessionDefaults {
        capacity: class.default_capacity,
        price: class.default_price,
    }
}

/// Result of persisting expanded slots.
#[derive(Debug, Clone, Serialize)]
pub struct Materialized {
    /// Newly stored sessions
    pub created: Vec<class_session::Model>,
    /// Slots that were already stored
    pub skipped: usize,
    /// Data-quality warnings from the expansion
    pub duplicates: Vec<schedule::DuplicateSlot>,
}

/// Persists the sessions a class's schedules produce within `window`.
///
/// A slot is skipped when its schedule already has a session at that date and time, so
/// running this again over the same window creates nothing. Dates before `today` are never
/// materialized.
pub async fn materialize_sessions<C>(
    db: &C,
    class_id: i64,
    window: ExpansionWindow,
    today: NaiveDate,
) -> Result<Materialized>
where
    C: ConnectionTrait + TransactionTrait,
{
    let class = get_class(db, class_id).await?;
    let specs = list_schedules(db, class_id)
        .await?
        .iter()
        .map(ScheduleSpec::from_model)
        .collect::<Result<Vec<_>>>()?;
    let expansion = schedule::expand_schedules(&specs, &defaults_for(&class), &window, today);

    let existing: HashSet<(Option<i64>, NaiveDate, NaiveTime)> = ClassSession::find()
        .filter(class_session::Column::ClassId.eq(class_id))
        .filter(class_session::Column::ScheduleId.is_not_null())
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.schedule_id, s.date, s.start_time))
        .collect();

    let mut seen = existing;
    let mut skipped = 0;
    let txn = db.begin().await?;
    let mut created = Vec::new();
    let now = Utc::now();

    for slot in expansion.sessions.iter().filter(|slot| slot.date >= today) {
        if !seen.insert((slot.schedule_id, slot.date, slot.time)) {
            skipped += 1;
            continue;
        }
        let session = class_session::ActiveModel {
            class_id: Set(class_id),
            schedule_id: Set(slot.schedule_id),
            date: Set(slot.date),
            start_time: Set(slot.time),
            capacity: Set(slot.capacity),
            price: Set(Some(slot.price)),
            is_closed: Set(false),
            version: Set(0),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        created.push(session);
    }

    txn.commit().await?;

    info!(
        class_id,
        created = created.len(),
        skipped,
        from = %window.from,
        until = %window.until,
        "Materialized sessions"
    );
    Ok(Materialized {
        created,
        skipped,
        duplicates: expansion.duplicates,
    })
}

/// Fields for an ad-hoc session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    #[serde(alias = "time")]
    pub start_time: String,
    /// Defaults to the class capacity
    #[serde(default)]
    pub capacity: Option<i32>,
    /// Defaults to the class price
    #[serde(default)]
    pub price: Option<f64>,
}

/// Creates a one-off session not tied to any schedule.
pub async fn create_session<C>(db: &C, class_id: i64, input: NewSession) -> Result<class_session::Model>
where
    C: ConnectionTrait,
{
    let class = get_class(db, class_id).await?;
    let date = schedule::parse_date("date", &input.date)?;
    let start_time = schedule::parse_time(&input.start_time)?;
    let capacity = input.capacity.unwrap_or(class.default_capacity);
    validate_capacity("capacity", capacity)?;
    if let Some(price) = input.price {
        validate_price("price", price)?;
    }

    let session = class_session::ActiveModel {
        class_id: Set(class_id),
        schedule_id: Set(None),
        date: Set(date),
        start_time: Set(start_time),
        capacity: Set(capacity),
        price: Set(input.price),
        is_closed: Set(false),
        version: Set(0),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(session_id = session.id, class_id, %date, "Created ad-hoc session");
    Ok(session)
}

/// Gets a session by id.
pub async fn get_session<C>(db: &C, session_id: i64) -> Result<class_session::Model>
where
    C: ConnectionTrait,
{
    ClassSession::find_by_id(session_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::SessionNotFound {
            reference: format!("id {session_id}"),
        })
}

/// Partial session update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    /// New capacity
    #[serde(default)]
    pub capacity: Option<i32>,
    /// New price
    #[serde(default)]
    pub price: Option<f64>,
    /// Open or close for booking
    #[serde(default)]
    pub is_closed: Option<bool>,
    /// Move to another date
    #[serde(default)]
    pub date: Option<String>,
    /// Move to another time
    #[serde(default, alias = "time")]
    pub start_time: Option<String>,
}

/// Updates a session, guarding the spots already held.
///
/// Capacity may not drop below the participants holding spots, and a session that holds
/// any spots may not change date or time. The session lock is taken before the
/// reservations are counted, so a concurrent booking cannot slip in between.
pub async fn update_session<C>(
    db: &C,
    policy: &BookingPolicy,
    session_id: i64,
    update: SessionUpdate,
    now: DateTime<Utc>,
) -> Result<class_session::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let date = update
        .date
        .as_deref()
        .map(|d| schedule::parse_date("date", d))
        .transpose()?;
    let start_time = update
        .start_time
        .as_deref()
        .map(schedule::parse_time)
        .transpose()?;
    if let Some(capacity) = update.capacity {
        validate_capacity("capacity", capacity)?;
    }
    if let Some(price) = update.price {
        validate_price("price", price)?;
    }

    let txn = db.begin().await?;
    reservations::lock_session(&txn, session_id).await?;
    let session = get_session(&txn, session_id).await?;
    let loads: Vec<ReservationLoad> = availability::live_reservations(&txn, session_id)
        .await?
        .iter()
        .map(ReservationLoad::from)
        .collect();
    let reserved = availability::reserved_spots(&loads, policy, now);

    let moves = date.is_some_and(|d| d != session.date)
        || start_time.is_some_and(|t| t != session.start_time);
    if moves && reserved > 0 {
        return Err(Error::SessionHasReservations { session_id });
    }

    let mut active: class_session::ActiveModel = session.into();
    if let Some(capacity) = update.capacity {
        if capacity < reserved {
            return Err(Error::CapacityBelowReservations { capacity, reserved });
        }
        active.capacity = Set(capacity);
    }
    if let Some(price) = update.price {
        active.price = Set(Some(price));
    }
    if let Some(is_closed) = update.is_closed {
        active.is_closed = Set(is_closed);
    }
    if let Some(date) = date {
        active.date = Set(date);
    }
    if let Some(start_time) = start_time {
        active.start_time = Set(start_time);
    }

    let updated = active.update(&txn).await?;
    txn.commit().await?;
    info!(session_id, capacity = updated.capacity, is_closed = updated.is_closed, "Updated session");
    Ok(updated)
}

/// Booking calendar of a class between two dates, inclusive.
pub async fn class_calendar<C>(
    db: &C,
    policy: &BookingPolicy,
    class_id: i64,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<SessionAvailability>>
where
    C: ConnectionTrait,
{
    if to < from {
        return Err(Error::validation("end", "must not be before start"));
    }
    let class = get_class(db, class_id).await?;

    let sessions = ClassSession::find()
        .filter(class_session::Column::ClassId.eq(class_id))
        .filter(class_session::Column::Date.between(from, to))
        .order_by_asc(class_session::Column::Date)
        .order_by_asc(class_session::Column::StartTime)
        .order_by_asc(class_session::Column::Id)
        .all(db)
        .await?;
    if sessions.is_empty() {
        return Ok(Vec::new());
    }

    let mut loads: HashMap<i64, Vec<ReservationLoad>> = HashMap::new();
    Reservation::find()
        .filter(reservation::Column::SessionId.is_in(sessions.iter().map(|s| s.id).collect::<Vec<_>>()))
        .filter(reservation::Column::Status.ne(ReservationStatus::Canceled))
        .all(db)
        .await?
        .iter()
        .for_each(|r| loads.entry(r.session_id).or_default().push(ReservationLoad::from(r)));

    Ok(sessions
        .into_iter()
        .map(|session| {
            let session_loads = loads.get(&session.id).map_or(&[][..], Vec::as_slice);
            SessionAvailability {
                session_id: session.id,
                class_id,
                date: session.date,
                start_time: session.start_time,
                capacity: session.capacity,
                available_spots: availability::compute_availability(
                    session.capacity,
                    session_loads,
                    policy,
                    now,
                ),
                price: session.effective_price(class.default_price),
                is_closed: session.is_closed,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp)]
    use super::*;
    use crate::entities::class_schedule::ScheduleType;
    use crate::test_utils::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn recurring(day: i32, times: &[&str]) -> ScheduleInput {
        ScheduleInput {
            schedule_type: ScheduleType::Recurring,
            day_of_week: Some(day),
            specific_date: None,
            range_start: None,
            range_end: None,
            dates: Vec::new(),
            times: times.iter().map(ToString::to_string).collect(),
            capacity: None,
            price: None,
        }
    }

    fn new_class(title: &str) -> NewClass {
        NewClass {
            title: title.to_string(),
            description: None,
            level: ClassLevel::Beginner,
            default_price: 45.0,
            default_capacity: 8,
            duration_minutes: 120,
            beach: Some("Playa Norte".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_class_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let mut input = new_class("Intro");
        input.duration_minutes = 20;
        let result = create_class(&db, 1, input).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "durationMinutes"));

        let mut input = new_class("Intro");
        input.default_capacity = 51;
        let result = create_class(&db, 1, input).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "defaultCapacity"));

        let mut input = new_class("Intro");
        input.default_price = 10_000.5;
        assert!(create_class(&db, 1, input).await.is_err());

        assert!(create_class(&db, 1, new_class("")).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_soft_delete_hides_class() -> Result<()> {
        let db = setup_test_db().await?;
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_class(&db, school.id, new_class("Intro")).await?;

        assert_eq!(list_classes_for_school(&db, school.id).await?.len(), 1);
        soft_delete_class(&db, class.id).await?;

        assert!(matches!(
            get_class(&db, class.id).await,
            Err(Error::ClassNotFound { .. })
        ));
        assert!(list_classes_for_school(&db, school.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_hard_delete_refused_with_reservations() -> Result<()> {
        let db = setup_test_db().await?;
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let session = create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        create_test_reservation(&db, &session, 1, 1, ReservationStatus::Confirmed).await?;

        let result = delete_class(&db, class.id).await;
        assert!(matches!(
            result,
            Err(Error::ClassHasReservations { active: 1, .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_hard_delete_removes_everything() -> Result<()> {
        let db = setup_test_db().await?;
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let session = create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        create_test_reservation(&db, &session, 1, 1, ReservationStatus::Canceled).await?;

        delete_class(&db, class.id).await?;
        assert!(Class::find_by_id(class.id).one(&db).await?.is_none());
        assert_eq!(ClassSession::find().count(&db).await?, 0);
        assert_eq!(Reservation::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_materialize_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let today = date("2025-06-01");
        let window = ExpansionWindow::weeks(today, 2);

        let update = set_schedules(&db, class.id, &[recurring(1, &["09:00", "14:00"])], window, today).await?;
        assert_eq!(update.schedules.len(), 1);
        assert_eq!(update.preview.sessions.len(), 4);

        let first = materialize_sessions(&db, class.id, window, today).await?;
        assert_eq!(first.created.len(), 4);
        assert_eq!(first.created[0].date, date("2025-06-02"));

        let second = materialize_sessions(&db, class.id, window, today).await?;
        assert!(second.created.is_empty());
        assert_eq!(second.skipped, 4);
        assert_eq!(ClassSession::find().count(&db).await?, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_replacing_schedules_keeps_booked_sessions() -> Result<()> {
        let db = setup_test_db().await?;
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let today = date("2025-06-01");
        let window = ExpansionWindow::weeks(today, 1);

        set_schedules(&db, class.id, &[recurring(1, &["09:00", "14:00"])], window, today).await?;
        let generated = materialize_sessions(&db, class.id, window, today).await?;
        create_test_reservation(&db, &generated.created[0], 3, 1, ReservationStatus::Confirmed).await?;

        set_schedules(&db, class.id, &[recurring(2, &["10:00"])], window, today).await?;

        let kept = ClassSession::find().all(&db).await?;
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, generated.created[0].id);
        assert_eq!(kept[0].schedule_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_schedule_writes_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let today = date("2025-06-01");
        let window = ExpansionWindow::weeks(today, 1);

        set_schedules(&db, class.id, &[recurring(1, &["09:00"])], window, today).await?;
        let bad = set_schedules(
            &db,
            class.id,
            &[recurring(2, &["10:00"]), recurring(9, &["10:00"])],
            window,
            today,
        )
        .await;
        assert!(matches!(bad, Err(Error::Validation { .. })));
        assert_eq!(list_schedules(&db, class.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_capacity_cannot_drop_below_reserved() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let session = create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        create_test_reservation(&db, &session, 1, 3, ReservationStatus::Paid).await?;

        let shrink = update_session(
            &db,
            &policy,
            session.id,
            SessionUpdate {
                capacity: Some(2),
                ..SessionUpdate::default()
            },
            Utc::now(),
        )
        .await;
        assert!(matches!(
            shrink,
            Err(Error::CapacityBelowReservations {
                capacity: 2,
                reserved: 3
            })
        ));
        let untouched = get_session(&db, session.id).await?;
        assert_eq!((untouched.capacity, untouched.version), (8, session.version));

        let missing = update_session(&db, &policy, 999, SessionUpdate::default(), Utc::now()).await;
        assert!(matches!(missing, Err(Error::SessionNotFound { .. })));

        let ok = update_session(
            &db,
            &policy,
            session.id,
            SessionUpdate {
                capacity: Some(3),
                is_closed: Some(true),
                ..SessionUpdate::default()
            },
            Utc::now(),
        )
        .await?;
        assert_eq!(ok.capacity, 3);
        assert!(ok.is_closed);

        let moved = update_session(
            &db,
            &policy,
            session.id,
            SessionUpdate {
                start_time: Some("11:00".to_string()),
                ..SessionUpdate::default()
            },
            Utc::now(),
        )
        .await;
        assert!(matches!(moved, Err(Error::SessionHasReservations { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_calendar_reports_availability() -> Result<()> {
        let db = setup_test_db().await?;
        let policy = BookingPolicy::default();
        let school = create_test_school(&db, "Costa Verde", None).await?;
        let class = create_test_class(&db, school.id, 45.0, 8).await?;
        let morning = create_test_session(&db, class.id, date("2025-06-02"), "09:00", 8).await?;
        create_test_session(&db, class.id, date("2025-06-02"), "14:00", 8).await?;
        create_test_session(&db, class.id, date("2025-06-20"), "09:00", 8).await?;
        create_test_reservation(&db, &morning, 1, 2, ReservationStatus::Confirmed).await?;
        create_test_reservation(&db, &morning, 2, 4, ReservationStatus::Canceled).await?;

        let calendar = class_calendar(
            &db,
            &policy,
            class.id,
            date("2025-06-01"),
            date("2025-06-07"),
            Utc::now(),
        )
        .await?;

        assert_eq!(calendar.len(), 2);
        assert_eq!(calendar[0].available_spots, 6);
        assert_eq!(calendar[1].available_spots, 8);
        assert_eq!(calendar[0].price, 45.0);
        Ok(())
    }
}
