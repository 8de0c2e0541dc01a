//! Class schedule entity - A recurrence rule owned by exactly one class.
//!
//! Which of the date columns is populated depends on `schedule_type`. Dates and time
//! slots are stored as JSON lists; times are kept in their `HH:MM` form.

use chrono::NaiveDate;
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of recurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleType {
    /// Every week on `day_of_week`
    #[sea_orm(string_value = "RECURRING")]
    Recurring,
    /// One `specific_date`
    #[sea_orm(string_value = "SINGLE")]
    Single,
    /// Every day from `range_start` to `range_end`
    #[sea_orm(string_value = "DATE_RANGE")]
    DateRange,
    /// Each date in `dates`
    #[sea_orm(string_value = "SPECIFIC_DATES")]
    SpecificDates,
}

/// JSON list of `HH:MM` start times
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct TimeList(pub Vec<String>);

/// JSON list of calendar dates
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct DateList(pub Vec<NaiveDate>);

/// Class schedule database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "class_schedules")]
pub struct Model {
    /// Unique identifier for the schedule
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning class
    pub class_id: i64,
    /// Recurrence kind
    pub schedule_type: ScheduleType,
    /// 0 = Sunday .. 6 = Saturday, RECURRING only
    pub day_of_week: Option<i32>,
    /// SINGLE only
    pub specific_date: Option<Date>,
    /// DATE_RANGE only
    pub range_start: Option<Date>,
    /// DATE_RANGE only
    pub range_end: Option<Date>,
    /// SPECIFIC_DATES only
    pub dates: DateList,
    /// Start times, one session per time per day
    pub times: TimeList,
    /// Overrides the class default capacity
    pub capacity: Option<i32>,
    /// Overrides the class default price
    pub price: Option<f64>,
}

/// Defines relationships between ClassSchedule and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each schedule belongs to one class
    #[sea_orm(
        belongs_to = "super::class::Entity",
        from = "Column::ClassId",
        to = "super::class::Column::Id"
    )]
    Class,
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
