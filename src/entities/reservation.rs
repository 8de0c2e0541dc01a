//! Reservation entity - A student's claim on spots in one class session.
//!
//! The session is referenced both by id and by its date/time so listings don't need a
//! join. Each reservation has exactly one payment row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Created without payment; holds spots for a limited time
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Accepted by the school or prepaid online
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    /// Payment received
    #[sea_orm(string_value = "PAID")]
    Paid,
    /// Cancelled by the student, an admin, or a refund
    #[sea_orm(string_value = "CANCELED")]
    Canceled,
    /// The session took place
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
}

impl ReservationStatus {
    /// Upper-case name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Paid => "PAID",
            Self::Canceled => "CANCELED",
            Self::Completed => "COMPLETED",
        }
    }
}

/// Reservation database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    /// Unique identifier for the reservation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Student who booked, as supplied by the auth provider
    pub user_id: i64,
    /// Booked class
    pub class_id: i64,
    /// Booked session
    pub session_id: i64,
    /// Session date
    pub date: Date,
    /// Session start time
    pub start_time: Time,
    /// Number of spots taken
    pub participants: i32,
    /// Free-text note for the school
    pub special_request: Option<String>,
    /// Current status
    pub status: ReservationStatus,
    /// When the reservation was created
    pub created_at: DateTimeUtc,
    /// When the reservation was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Reservation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each reservation belongs to one class
    #[sea_orm(
        belongs_to = "super::class::Entity",
        from = "Column::ClassId",
        to = "super::class::Column::Id"
    )]
    Class,
    /// Each reservation belongs to one session
    #[sea_orm(
        belongs_to = "super::class_session::Entity",
        from = "Column::SessionId",
        to = "super::class_session::Column::Id"
    )]
    Session,
    /// Each reservation has one payment
    #[sea_orm(has_one = "super::payment::Entity")]
    Payment,
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl Related<super::class_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
