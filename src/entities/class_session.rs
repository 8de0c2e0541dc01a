//! Class session entity - A concrete, bookable instance of a class.
//!
//! Sessions are materialized from a schedule (`schedule_id` set) or created ad hoc.
//! `version` is bumped at the start of every booking transaction so that concurrent
//! writers for the same session serialize on the row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class session database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "class_sessions")]
pub struct Model {
    /// Unique identifier for the session
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning class
    pub class_id: i64,
    /// Schedule this session was generated from, None for ad-hoc sessions
    pub schedule_id: Option<i64>,
    /// Calendar date
    pub date: Date,
    /// Start time of day
    pub start_time: Time,
    /// Maximum participants
    pub capacity: i32,
    /// Per-participant price; None means the class default applies
    pub price: Option<f64>,
    /// Closed sessions stay visible but cannot be booked
    pub is_closed: bool,
    /// Row-lock counter
    pub version: i64,
    /// When the session was created
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Price per participant, falling back to the class default.
    #[must_use]
    pub fn effective_price(&self, class_default: f64) -> f64 {
        self.price.unwrap_or(class_default)
    }
}

/// Defines relationships between ClassSession and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each session belongs to one class
    #[sea_orm(
        belongs_to = "super::class::Entity",
        from = "Column::ClassId",
        to = "super::class::Column::Id"
    )]
    Class,
    /// One session has many reservations
    #[sea_orm(has_many = "super::reservation::Entity")]
    Reservations,
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl Related<super::reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
