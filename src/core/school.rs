//! School business logic - tenant lookup, creation, approval and ownership checks.

use crate::{
    core::actor::{Actor, Role},
    entities::{
        School,
        school::{self, SchoolStatus},
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;

/// Fields needed to register a school.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSchool {
    /// Display name
    pub name: String,
    /// Town or beach area
    pub location: String,
    /// Public contact email
    #[serde(default)]
    pub contact_email: Option<String>,
    /// Public contact phone
    #[serde(default)]
    pub contact_phone: Option<String>,
    /// Owning school admin
    #[serde(default)]
    pub owner_id: Option<i64>,
}

/// Creates a school in the given status.
pub async fn create_school<C>(db: &C, input: NewSchool, status: SchoolStatus) -> Result<school::Model>
where
    C: ConnectionTrait,
{
    let name = input.name.trim();
    if name.is_empty() || name.len() > 200 {
        return Err(Error::validation("name", "must be 1-200 characters"));
    }
    if input.location.trim().is_empty() {
        return Err(Error::validation("location", "is required"));
    }

    let school = school::ActiveModel {
        name: Set(name.to_string()),
        location: Set(input.location.trim().to_string()),
        contact_email: Set(input.contact_email),
        contact_phone: Set(input.contact_phone),
        rating: Set(0.0),
        total_reviews: Set(0),
        status: Set(status),
        owner_id: Set(input.owner_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    school.insert(db).await.map_err(Into::into)
}

/// Finds a school by id.
pub async fn get_school<C>(db: &C, school_id: i64) -> Result<school::Model>
where
    C: ConnectionTrait,
{
    School::find_by_id(school_id)
        .one(db)
        .await?
        .ok_or(Error::SchoolNotFound { id: school_id })
}

/// Finds a school by exact name.
pub async fn get_school_by_name<C>(db: &C, name: &str) -> Result<Option<school::Model>>
where
    C: ConnectionTrait,
{
    School::find()
        .filter(school::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Approved schools, alphabetically.
pub async fn list_approved_schools<C>(db: &C) -> Result<Vec<school::Model>>
where
    C: ConnectionTrait,
{
    School::find()
        .filter(school::Column::Status.eq(SchoolStatus::Approved))
        .order_by_asc(school::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Approves a pending school. Platform admins only.
pub async fn approve_school<C>(db: &C, actor: &Actor, school_id: i64) -> Result<school::Model>
where
    C: ConnectionTrait,
{
    if !actor.is_admin() {
        return Err(Error::Forbidden {
            message: "only platform admins can approve schools".to_string(),
        });
    }
    let school = get_school(db, school_id).await?;
    let mut active: school::ActiveModel = school.into();
    active.status = Set(SchoolStatus::Approved);
    active.update(db).await.map_err(Into::into)
}

/// The school owned by a school admin, if any.
pub async fn school_owned_by<C>(db: &C, user_id: i64) -> Result<Option<school::Model>>
where
    C: ConnectionTrait,
{
    School::find()
        .filter(school::Column::OwnerId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Fails with `Forbidden` unless the actor may manage `school_id`.
///
/// Admins manage every school; school admins only the one they own.
pub async fn ensure_manages_school<C>(db: &C, actor: &Actor, school_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    match actor.role {
        Role::Admin => Ok(()),
        Role::SchoolAdmin => {
            let owned = school_owned_by(db, actor.user_id).await?;
            if owned.is_some_and(|s| s.id == school_id) {
                Ok(())
            } else {
                Err(Error::Forbidden {
                    message: format!("school {school_id} is managed by another admin"),
                })
            }
        }
        Role::Student | Role::Instructor => Err(Error::Forbidden {
            message: "school admin or admin role required".to_string(),
        }),
    }
}
