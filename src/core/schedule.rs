//! Schedule expansion - turns recurrence rules into concrete bookable slots.
//!
//! Raw input ([`ScheduleInput`]) is validated into a typed [`ScheduleSpec`]; expansion is a
//! pure function of the spec, the class defaults, the expansion window and "today". Every
//! schedule type is clipped to the window; RECURRING is also clipped to today. The output
//! is sorted by (date, time) and is identical for identical input. Slots that
//! occur more than once (overlapping schedules, repeated times) are kept and reported as
//! data-quality warnings rather than merged.

use crate::{
    entities::class_schedule::{self, DateList, ScheduleType, TimeList},
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Weekday};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

const TIME_FORMAT: &str = "%H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Longest DATE_RANGE accepted, in days.
pub const MAX_RANGE_DAYS: i64 = 366;
/// Most dates a SPECIFIC_DATES schedule may list.
pub const MAX_SPECIFIC_DATES: usize = 366;

/// Schedule as submitted by a school admin or read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleInput {
    /// Recurrence kind
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    /// 0 = Sunday .. 6 = Saturday
    #[serde(default, alias = "dayOfWeek")]
    pub day_of_week: Option<i32>,
    /// `YYYY-MM-DD`
    #[serde(default, alias = "specificDate")]
    pub specific_date: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default, alias = "rangeStart")]
    pub range_start: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default, alias = "rangeEnd")]
    pub range_end: Option<String>,
    /// `YYYY-MM-DD` list
    #[serde(default)]
    pub dates: Vec<String>,
    /// `HH:MM` list
    #[serde(default)]
    pub times: Vec<String>,
    /// Capacity override
    #[serde(default)]
    pub capacity: Option<i32>,
    /// Price override
    #[serde(default)]
    pub price: Option<f64>,
}

/// The dates a schedule covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recurrence {
    /// Every week on this day
    Recurring(Weekday),
    /// One date
    Single(NaiveDate),
    /// Every day in `[start, end]`
    DateRange {
        /// First day
        start: NaiveDate,
        /// Last day, inclusive
        end: NaiveDate,
    },
    /// Listed dates
    SpecificDates(Vec<NaiveDate>),
}

/// A validated schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSpec {
    /// Persisted schedule this spec came from
    pub schedule_id: Option<i64>,
    /// Dates covered
    pub recurrence: Recurrence,
    /// Start times, never empty
    pub times: Vec<NaiveTime>,
    /// Capacity override
    pub capacity: Option<i32>,
    /// Price override
    pub price: Option<f64>,
}

/// Values copied into every slot unless the schedule overrides them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionDefaults {
    /// Default capacity
    pub capacity: i32,
    /// Default price per participant
    pub price: f64,
}

/// Inclusive date window that bounds every schedule's expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionWindow {
    /// First day
    pub from: NaiveDate,
    /// Last day, inclusive
    pub until: NaiveDate,
}

impl ExpansionWindow {
    /// `weeks` whole weeks starting at `from`.
    #[must_use]
    pub fn weeks(from: NaiveDate, weeks: u32) -> Self {
        let days = u64::from(weeks) * 7;
        let until = if days == 0 {
            from.pred_opt().unwrap_or(from)
        } else {
            from.checked_add_days(Days::new(days - 1)).unwrap_or(NaiveDate::MAX)
        };
        Self { from, until }
    }

    /// Whether `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.until
    }
}

/// One concrete bookable slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSlot {
    /// Schedule that produced the slot
    pub schedule_id: Option<i64>,
    /// Date
    pub date: NaiveDate,
    /// Start time
    pub time: NaiveTime,
    /// Capacity
    pub capacity: i32,
    /// Price per participant
    pub price: f64,
}

/// A (date, time) that more than one slot landed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateSlot {
    /// Date
    pub date: NaiveDate,
    /// Start time
    pub time: NaiveTime,
    /// How many slots share it
    pub occurrences: usize,
}

/// Result of expanding one or more schedules.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Expansion {
    /// Slots ordered by (date, time)
    pub sessions: Vec<SessionSlot>,
    /// Data-quality warnings
    pub duplicates: Vec<DuplicateSlot>,
}

/// Parses an `HH:MM` time of day.
pub fn parse_time(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    let well_formed = trimmed.len() == 5 && trimmed.as_bytes()[2] == b':';
    if !well_formed {
        return Err(Error::validation(
            "times",
            format!("'{value}' is not a valid HH:MM time"),
        ));
    }
    NaiveTime::parse_from_str(trimmed, TIME_FORMAT).map_err(|_| {
        Error::validation("times", format!("'{value}' is not a valid HH:MM time"))
    })
}

/// Parses a `YYYY-MM-DD` date; RFC 3339 timestamps are accepted and truncated.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.date_naive()))
        .map_err(|_| Error::validation(field, format!("'{value}' is not a valid date")))
}

/// Maps 0 = Sunday .. 6 = Saturday onto `Weekday`.
pub fn weekday_from_index(day_of_week: i32) -> Result<Weekday> {
    match day_of_week {
        0 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        other => Err(Error::validation(
            "day_of_week",
            format!("{other} is outside 0 (Sunday) to 6 (Saturday)"),
        )),
    }
}

fn required_date(field: &str, value: Option<&String>) -> Result<NaiveDate> {
    let raw = value.ok_or_else(|| Error::validation(field, "is required for this schedule type"))?;
    parse_date(field, raw)
}

impl ScheduleInput {
    /// Validates the raw input into a typed spec.
    pub fn validate(&self) -> Result<ScheduleSpec> {
        if self.times.is_empty() {
            return Err(Error::validation("times", "at least one time is required"));
        }
        let times = self
            .times
            .iter()
            .map(|t| parse_time(t))
            .collect::<Result<Vec<_>>>()?;

        if let Some(capacity) = self.capacity {
            if capacity < 1 {
                return Err(Error::validation("capacity", "must be at least 1"));
            }
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(Error::validation("price", "must be a non-negative amount"));
            }
        }

        let recurrence = match self.schedule_type {
            ScheduleType::Recurring => {
                let day = self
                    .day_of_week
                    .ok_or_else(|| Error::validation("day_of_week", "is required for RECURRING"))?;
                Recurrence::Recurring(weekday_from_index(day)?)
            }
            ScheduleType::Single => {
                Recurrence::Single(required_date("specific_date", self.specific_date.as_ref())?)
            }
            ScheduleType::DateRange => {
                let start = required_date("range_start", self.range_start.as_ref())?;
                let end = required_date("range_end", self.range_end.as_ref())?;
                // A reversed range is allowed and expands to nothing
                if (end - start).num_days() >= MAX_RANGE_DAYS {
                    return Err(Error::validation(
                        "range_end",
                        format!("a date range may span at most {MAX_RANGE_DAYS} days"),
                    ));
                }
                Recurrence::DateRange { start, end }
            }
            ScheduleType::SpecificDates => {
                if self.dates.is_empty() {
                    return Err(Error::validation("dates", "at least one date is required"));
                }
                if self.dates.len() > MAX_SPECIFIC_DATES {
                    return Err(Error::validation(
                        "dates",
                        format!("at most {MAX_SPECIFIC_DATES} dates may be listed"),
                    ));
                }
                let dates = self
                    .dates
                    .iter()
                    .map(|d| parse_date("dates", d))
                    .collect::<Result<Vec<_>>>()?;
                Recurrence::SpecificDates(dates)
            }
        };

        Ok(ScheduleSpec {
            schedule_id: None,
            recurrence,
            times,
            capacity: self.capacity,
            price: self.price,
        })
    }
}

impl ScheduleSpec {
    /// Rebuilds a spec from a stored schedule row.
    pub fn from_model(model: &class_schedule::Model) -> Result<Self> {
        let input = ScheduleInput {
            schedule_type: model.schedule_type,
            day_of_week: model.day_of_week,
            specific_date: model.specific_date.map(|d| d.format(DATE_FORMAT).to_string()),
            range_start: model.range_start.map(|d| d.format(DATE_FORMAT).to_string()),
            range_end: model.range_end.map(|d| d.format(DATE_FORMAT).to_string()),
            dates: model
                .dates
                .0
                .iter()
                .map(|d| d.format(DATE_FORMAT).to_string())
                .collect(),
            times: model.times.0.clone(),
            capacity: model.capacity,
            price: model.price,
        };
        let mut spec = input.validate()?;
        spec.schedule_id = Some(model.id);
        Ok(spec)
    }

    /// Active model for inserting this spec under `class_id`.
    #[must_use]
    pub fn to_active_model(&self, class_id: i64) -> class_schedule::ActiveModel {
        let (schedule_type, day_of_week, specific_date, range, dates) = match &self.recurrence {
            Recurrence::Recurring(day) => (
                ScheduleType::Recurring,
                Some(i32::try_from(day.num_days_from_sunday()).unwrap_or_default()),
                None,
                None,
                Vec::new(),
            ),
            Recurrence::Single(date) => (ScheduleType::Single, None, Some(*date), None, Vec::new()),
            Recurrence::DateRange { start, end } => (
                ScheduleType::DateRange,
                None,
                None,
                Some((*start, *end)),
                Vec::new(),
            ),
            Recurrence::SpecificDates(dates) => {
                (ScheduleType::SpecificDates, None, None, None, dates.clone())
            }
        };

        class_schedule::ActiveModel {
            class_id: Set(class_id),
            schedule_type: Set(schedule_type),
            day_of_week: Set(day_of_week),
            specific_date: Set(specific_date),
            range_start: Set(range.map(|(start, _)| start)),
            range_end: Set(range.map(|(_, end)| end)),
            dates: Set(DateList(dates)),
            times: Set(TimeList(
                self.times
                    .iter()
                    .map(|t| t.format(TIME_FORMAT).to_string())
                    .collect(),
            )),
            capacity: Set(self.capacity),
            price: Set(self.price),
            ..Default::default()
        }
    }

    fn dates(&self, window: &ExpansionWindow, today: NaiveDate) -> Vec<NaiveDate> {
        match &self.recurrence {
            Recurrence::Recurring(weekday) => {
                let from = window.from.max(today);
                let mut dates = Vec::new();
                let mut day = from;
                while day.weekday() != *weekday {
                    match day.succ_opt() {
                        Some(next) => day = next,
                        None => return dates,
                    }
                }
                while day <= window.until {
                    dates.push(day);
                    match day.checked_add_days(Days::new(7)) {
                        Some(next) => day = next,
                        None => break,
                    }
                }
                dates
            }
            Recurrence::Single(date) => {
                window.contains(*date).then_some(*date).into_iter().collect()
            }
            Recurrence::DateRange { start, end } => {
                let last = (*end).min(window.until);
                (*start)
                    .max(window.from)
                    .iter_days()
                    .take_while(|d| *d <= last)
                    .collect()
            }
            Recurrence::SpecificDates(dates) => dates
                .iter()
                .copied()
                .filter(|d| window.contains(*d))
                .collect(),
        }
    }
}

/// Expands one schedule.
#[must_use]
pub fn expand_schedule(
    spec: &ScheduleSpec,
    defaults: &SessionDefaults,
    window: &ExpansionWindow,
    today: NaiveDate,
) -> Expansion {
    expand_schedules(std::slice::from_ref(spec), defaults, window, today)
}

/// Expands every schedule of a class into one ordered list, reporting duplicates.
#[must_use]
pub fn expand_schedules(
    specs: &[ScheduleSpec],
    defaults: &SessionDefaults,
    window: &ExpansionWindow,
    today: NaiveDate,
) -> Expansion {
    let mut sessions: Vec<SessionSlot> = specs
        .iter()
        .flat_map(|spec| {
            let capacity = spec.capacity.unwrap_or(defaults.capacity);
            let price = spec.price.unwrap_or(defaults.price);
            spec.dates(window, today).into_iter().flat_map(move |date| {
                spec.times.iter().map(move |&time| SessionSlot {
                    schedule_id: spec.schedule_id,
                    date,
                    time,
                    capacity,
                    price,
                })
            })
        })
        .collect();

    // Stable: ties keep schedule order
    sessions.sort_by_key(|slot| (slot.date, slot.time));

    let mut counts: BTreeMap<(NaiveDate, NaiveTime), usize> = BTreeMap::new();
    for slot in &sessions {
        *counts.entry((slot.date, slot.time)).or_default() += 1;
    }
    let duplicates: Vec<DuplicateSlot> = counts
        .into_iter()
        .filter(|(_, occurrences)| *occurrences > 1)
        .map(|((date, time), occurrences)| DuplicateSlot {
            date,
            time,
            occurrences,
        })
        .collect();

    for dup in &duplicates {
        warn!(
            date = %dup.date,
            time = %dup.time.format(TIME_FORMAT),
            occurrences = dup.occurrences,
            "Schedules produce the same session slot more than once"
        );
    }

    Expansion {
        sessions,
        duplicates,
    }
}
