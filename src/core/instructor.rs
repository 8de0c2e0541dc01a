//! Instructors - who teaches for a school, which classes they lead, and the sessions they
//! have coming up together with the students booked on them.
//!
//! Creating instructors checks ownership here; assigning one to a class is checked in the
//! HTTP layer with [`class::ensure_manages_class`] like the other class mutations.

use crate::{
    core::{
        actor::Actor,
        availability::{self, BookingPolicy, ReservationLoad},
        class, school,
    },
    entities::{
        Class, ClassSession, Instructor, Reservation, class as class_entity, class_session,
        instructor,
        reservation::{self, ReservationStatus},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Fields for a new instructor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInstructor {
    /// Auth-provider user id of the instructor
    pub user_id: i64,
    /// Display name
    pub name: String,
    /// Short biography
    #[serde(default)]
    pub bio: Option<String>,
}

/// A student booked on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    /// Reservation id
    pub reservation_id: i64,
    /// Student
    pub user_id: i64,
    /// Spots taken
    pub participants: i32,
    /// Current status
    pub status: ReservationStatus,
    /// Note left by the student
    pub special_request: Option<String>,
}

/// One session an instructor teaches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeachingSession {
    /// Session id
    pub session_id: i64,
    /// Class id
    pub class_id: i64,
    /// Class title
    pub class_title: String,
    /// Date
    pub date: NaiveDate,
    /// Start time
    pub start_time: NaiveTime,
    /// Length in minutes
    pub duration_minutes: i32,
    /// Capacity
    pub capacity: i32,
    /// Spots currently held
    pub reserved_spots: i32,
    /// Closed sessions take no new bookings
    pub is_closed: bool,
    /// Reservations holding spots, oldest first
    pub roster: Vec<RosterEntry>,
}

/// Adds an instructor to a school the actor manages.
pub async fn create_instructor<C>(
    db: &C,
    actor: &Actor,
    school_id: i64,
    input: NewInstructor,
) -> Result<instructor::Model>
where
    C: ConnectionTrait,
{
    let name = input.name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(Error::validation("name", "must be 1-100 characters"));
    }
    if input.bio.as_deref().is_some_and(|b| b.chars().count() > 1000) {
        return Err(Error::validation("bio", "must be at most 1000 characters"));
    }

    school::get_school(db, school_id).await?;
    school::ensure_manages_school(db, actor, school_id).await?;

    let existing = Instructor::find()
        .filter(instructor::Column::SchoolId.eq(school_id))
        .filter(instructor::Column::UserId.eq(input.user_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::DuplicateInstructor {
            school_id,
            user_id: input.user_id,
        });
    }

    let instructor = instructor::ActiveModel {
        school_id: Set(school_id),
        user_id: Set(input.user_id),
        name: Set(name.to_string()),
        bio: Set(input.bio),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(instructor_id = instructor.id, school_id, user_id = instructor.user_id, "Added instructor");
    Ok(instructor)
}

/// Finds an instructor by id.
pub async fn get_instructor<C>(db: &C, instructor_id: i64) -> Result<instructor::Model>
where
    C: ConnectionTrait,
{
    Instructor::find_by_id(instructor_id)
        .one(db)
        .await?
        .ok_or(Error::InstructorNotFound { id: instructor_id })
}

/// Instructors of a school, by name.
pub async fn list_instructors<C>(db: &C, school_id: i64) -> Result<Vec<instructor::Model>>
where
    C: ConnectionTrait,
{
    Instructor::find()
        .filter(instructor::Column::SchoolId.eq(school_id))
        .order_by_asc(instructor::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sets or clears the instructor leading a class.
///
/// The instructor must teach for the class's school.
pub async fn assign_instructor<C>(
    db: &C,
    class_id: i64,
    instructor_id: Option<i64>,
) -> Result<class_entity::Model>
where
    C: ConnectionTrait,
{
    let current = class::get_class(db, class_id).await?;
    if let Some(instructor_id) = instructor_id {
        let instructor = get_instructor(db, instructor_id).await?;
        if instructor.school_id != current.school_id {
            return Err(Error::validation(
                "instructorId",
                format!("instructor {instructor_id} teaches for another school"),
            ));
        }
    }

    let mut active: class_entity::ActiveModel = current.into();
    active.instructor_id = Set(instructor_id);
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    info!(class_id, instructor_id = ?instructor_id, "Assigned instructor");
    Ok(updated)
}

/// Sessions between `from` and `to` (inclusive) of every class the actor leads, with the
/// reservations currently holding spots on them.
///
/// The actor must be registered as an instructor at one school or more.
pub async fn instructor_schedule<C>(
    db: &C,
    policy: &BookingPolicy,
    actor: &Actor,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<TeachingSession>>
where
    C: ConnectionTrait,
{
    if to < from {
        return Err(Error::validation("end", "must not be before start"));
    }

    let instructor_ids: Vec<i64> = Instructor::find()
        .filter(instructor::Column::UserId.eq(actor.user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect();
    if instructor_ids.is_empty() {
        return Err(Error::Forbidden {
            message: format!("user {} is not registered as an instructor", actor.user_id),
        });
    }

    let classes: HashMap<i64, class_entity::Model> = Class::find()
        .filter(class_entity::Column::InstructorId.is_in(instructor_ids))
        .filter(class_entity::Column::DeletedAt.is_null())
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    if classes.is_empty() {
        return Ok(Vec::new());
    }

    let sessions = ClassSession::find()
        .filter(class_session::Column::ClassId.is_in(classes.keys().copied().collect::<Vec<_>>()))
        .filter(class_session::Column::Date.between(from, to))
        .order_by_asc(class_session::Column::Date)
        .order_by_asc(class_session::Column::StartTime)
        .order_by_asc(class_session::Column::Id)
        .all(db)
        .await?;
    if sessions.is_empty() {
        return Ok(Vec::new());
    }

    let mut booked: HashMap<i64, Vec<reservation::Model>> = HashMap::new();
    Reservation::find()
        .filter(reservation::Column::SessionId.is_in(sessions.iter().map(|s| s.id).collect::<Vec<_>>()))
        .filter(reservation::Column::Status.ne(ReservationStatus::Canceled))
        .order_by_asc(reservation::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .for_each(|r| booked.entry(r.session_id).or_default().push(r));

    let mut schedule = Vec::with_capacity(sessions.len());
    for session in sessions {
        let Some(class) = classes.get(&session.class_id) else {
            continue;
        };
        let holding: Vec<reservation::Model> = booked
            .remove(&session.id)
            .unwrap_or_default()
            .into_iter()
            .filter(|r| availability::holds_spots(&ReservationLoad::from(r), policy, now))
            .collect();
        let loads: Vec<ReservationLoad> = holding.iter().map(ReservationLoad::from).collect();

        schedule.push(TeachingSession {
            session_id: session.id,
            class_id: class.id,
            class_title: class.title.clone(),
            date: session.date,
            start_time: session.start_time,
            duration_minutes: class.duration_minutes,
            capacity: session.capacity,
            reserved_spots: availability::reserved_spots(&loads, policy, now),
            is_closed: session.is_closed,
            roster: holding
                .into_iter()
                .map(|r| RosterEntry {
                    reservation_id: r.id,
                    user_id: r.user_id,
                    participants: r.participants,
                    status: r.status,
                    special_request: r.special_request,
                })
                .collect(),
        });
    }
    Ok(schedule)
}
