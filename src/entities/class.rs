//! Class entity - A bookable product offered by a school.
//!
//! A class carries the default price, capacity and duration that its sessions inherit.
//! Classes are soft-deleted through `deleted_at`; once a class has reservations it is
//! never removed from the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Skill level a class is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassLevel {
    /// First time on a board
    #[sea_orm(string_value = "BEGINNER")]
    Beginner,
    /// Can catch green waves
    #[sea_orm(string_value = "INTERMEDIATE")]
    Intermediate,
    /// Line-up regulars
    #[sea_orm(string_value = "ADVANCED")]
    Advanced,
}

/// Class database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "classes")]
pub struct Model {
    /// Unique identifier for the class
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning school
    pub school_id: i64,
    /// Title shown in listings
    pub title: String,
    /// Long description
    pub description: Option<String>,
    /// Target skill level
    pub level: ClassLevel,
    /// Price per participant used when a session has no override
    pub default_price: f64,
    /// Capacity copied into generated sessions
    pub default_capacity: i32,
    /// Length of one session in minutes
    pub duration_minutes: i32,
    /// Beach where the class takes place
    pub beach: Option<String>,
    /// Instructor who leads the class, if assigned
    pub instructor_id: Option<i64>,
    /// Soft delete marker - set classes are hidden from listings and new bookings
    pub deleted_at: Option<DateTimeUtc>,
    /// When the class was created
    pub created_at: DateTimeUtc,
    /// When the class was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Whether the class has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Defines relationships between Class and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each class belongs to one school
    #[sea_orm(
        belongs_to = "super::school::Entity",
        from = "Column::SchoolId",
        to = "super::school::Column::Id"
    )]
    School,
    /// Each class may be led by one instructor
    #[sea_orm(
        belongs_to = "super::instructor::Entity",
        from = "Column::InstructorId",
        to = "super::instructor::Column::Id"
    )]
    Instructor,
    /// One class has many recurrence schedules
    #[sea_orm(has_many = "super::class_schedule::Entity")]
    Schedules,
    /// One class has many materialized sessions
    #[sea_orm(has_many = "super::class_session::Entity")]
    Sessions,
    /// One class has many reservations
    #[sea_orm(has_many = "super::reservation::Entity")]
    Reservations,
}

impl Related<super::school::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::School.def()
    }
}

impl Related<super::instructor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instructor.def()
    }
}

impl Related<super::class_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedules.def()
    }
}

impl Related<super::class_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl Related<super::reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
