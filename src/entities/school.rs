//! School entity - The tenant root.
//!
//! Every class and school-scoped discount code hangs off a school. Schools created through
//! signup start as `PENDING` until a platform admin approves them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Approval state of a school
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchoolStatus {
    /// Awaiting platform admin review
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Visible to students
    #[sea_orm(string_value = "APPROVED")]
    Approved,
}

/// School database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "schools")]
pub struct Model {
    /// Unique identifier for the school
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Town or beach area
    pub location: String,
    /// Public contact email
    pub contact_email: Option<String>,
    /// Public contact phone
    pub contact_phone: Option<String>,
    /// Average review rating
    pub rating: f64,
    /// Number of reviews behind `rating`
    pub total_reviews: i32,
    /// Approval state
    pub status: SchoolStatus,
    /// User id of the school admin who owns this school
    pub owner_id: Option<i64>,
    /// When the school was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between School and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One school publishes many classes
    #[sea_orm(has_many = "super::class::Entity")]
    Classes,
    /// One school owns many scoped discount codes
    #[sea_orm(has_many = "super::discount_code::Entity")]
    DiscountCodes,
    /// One school employs many instructors
    #[sea_orm(has_many = "super::instructor::Entity")]
    Instructors,
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Classes.def()
    }
}

impl Related<super::discount_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DiscountCodes.def()
    }
}

impl Related<super::instructor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instructors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
