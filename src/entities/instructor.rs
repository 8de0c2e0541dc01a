//! Instructor entity - A coach who teaches a school's classes.
//!
//! Instructors are linked to an auth-provider user id so they can look up their own
//! teaching schedule. A user teaches for a school at most once.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Instructor database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "instructors")]
pub struct Model {
    /// Unique identifier for the instructor
    #[sea_orm(primary_key)]
    pub id: i64,
    /// School the instructor teaches for
    pub school_id: i64,
    /// User id from the auth provider
    pub user_id: i64,
    /// Display name
    pub name: String,
    /// Short biography shown on class pages
    pub bio: Option<String>,
    /// When the instructor was added
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Instructor and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each instructor belongs to one school
    #[sea_orm(
        belongs_to = "super::school::Entity",
        from = "Column::SchoolId",
        to = "super::school::Column::Id"
    )]
    School,
    /// One instructor leads many classes
    #[sea_orm(has_many = "super::class::Entity")]
    Classes,
}

impl Related<super::school::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::School.def()
    }
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Classes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
