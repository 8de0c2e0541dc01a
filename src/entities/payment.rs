//! Payment entity - One-to-one with a reservation.
//!
//! `original_amount` is the undiscounted total; `amount` is what the student owes after
//! any discount code. `discount_code_id` remembers which code was applied so it can be
//! redeemed exactly once when the payment turns `PAID`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Settlement state of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Nothing received yet
    #[sea_orm(string_value = "UNPAID")]
    Unpaid,
    /// Money received
    #[sea_orm(string_value = "PAID")]
    Paid,
    /// Money returned; the reservation is cancelled
    #[sea_orm(string_value = "REFUNDED")]
    Refunded,
}

impl PaymentStatus {
    /// Upper-case name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "UNPAID",
            Self::Paid => "PAID",
            Self::Refunded => "REFUNDED",
        }
    }
}

/// How the student pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Paid up front at booking time
    #[sea_orm(string_value = "ONLINE")]
    Online,
    /// Bank transfer, confirmed later against a voucher
    #[sea_orm(string_value = "TRANSFER")]
    Transfer,
    /// Paid at the school
    #[sea_orm(string_value = "CASH")]
    Cash,
}

impl PaymentMethod {
    /// Whether the money is captured when the reservation is created.
    #[must_use]
    pub const fn is_prepaid(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Reservation this payment settles
    #[sea_orm(unique)]
    pub reservation_id: i64,
    /// Total before discount
    pub original_amount: f64,
    /// Total after discount
    pub amount: f64,
    /// Settlement state
    pub status: PaymentStatus,
    /// Payment method
    pub method: PaymentMethod,
    /// Applied discount code, if any
    pub discount_code_id: Option<i64>,
    /// Uploaded transfer voucher
    pub voucher_url: Option<String>,
    /// Admin notes
    pub notes: Option<String>,
    /// When the payment was settled
    pub paid_at: Option<DateTimeUtc>,
    /// When the payment row was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Payment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment settles one reservation
    #[sea_orm(
        belongs_to = "super::reservation::Entity",
        from = "Column::ReservationId",
        to = "super::reservation::Column::Id"
    )]
    Reservation,
    /// A payment may have used one discount code
    #[sea_orm(
        belongs_to = "super::discount_code::Entity",
        from = "Column::DiscountCodeId",
        to = "super::discount_code::Column::Id"
    )]
    DiscountCode,
}

impl Related<super::reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservation.def()
    }
}

impl Related<super::discount_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DiscountCode.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
