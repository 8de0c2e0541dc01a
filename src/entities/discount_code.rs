//! Discount code entity - Percentage discounts, global or scoped to one school.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Discount code database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discount_codes")]
pub struct Model {
    /// Unique identifier for the code
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The code students type, stored upper-case
    #[sea_orm(unique)]
    pub code: String,
    /// Admin-facing description
    pub description: Option<String>,
    /// Percentage off, 0-100
    pub discount_percentage: f64,
    /// Start of the validity window
    pub valid_from: DateTimeUtc,
    /// End of the validity window
    pub valid_to: DateTimeUtc,
    /// Kill switch
    pub is_active: bool,
    /// Redemption cap, None for unlimited
    pub max_uses: Option<i32>,
    /// Number of paid redemptions so far
    pub used_count: i32,
    /// Scoping school, None for a global code
    pub school_id: Option<i64>,
    /// When the code was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between DiscountCode and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A scoped code belongs to one school
    #[sea_orm(
        belongs_to = "super::school::Entity",
        from = "Column::SchoolId",
        to = "super::school::Column::Id"
    )]
    School,
    /// One code can be applied to many payments
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::school::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::School.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
