//! Catalog seeding from config.toml
//!
//! Schools listed in the config are created on startup together with their classes,
//! schedules and the next few weeks of sessions. A school that already exists (by name)
//! is left alone, so restarting the service does not duplicate anything.

use crate::{
    core::{
        class::{self, NewClass},
        schedule::{ExpansionWindow, ScheduleInput},
        school::{self, NewSchool},
    },
    entities::school::SchoolStatus,
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tracing::{debug, info};

/// A school to seed
#[derive(Debug, Clone, Deserialize)]
pub struct SchoolSeed {
    /// Display name, also the identity used to skip existing schools
    pub name: String,
    /// Town or beach area
    pub location: String,
    /// Public contact email
    #[serde(default)]
    pub contact_email: Option<String>,
    /// Public contact phone
    #[serde(default)]
    pub contact_phone: Option<String>,
    /// School admin user id
    #[serde(default)]
    pub owner_id: Option<i64>,
    /// Classes offered
    #[serde(default)]
    pub classes: Vec<ClassSeed>,
}

/// A class to seed
#[derive(Debug, Clone, Deserialize)]
pub struct ClassSeed {
    /// Class fields
    #[serde(flatten)]
    pub class: NewClass,
    /// Schedules to store and expand
    #[serde(default)]
    pub schedules: Vec<ScheduleInput>,
}

/// What seeding created
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    /// Schools created
    pub schools: usize,
    /// Classes created
    pub classes: usize,
    /// Sessions materialized
    pub sessions: usize,
}

/// Creates missing schools with their classes, schedules and sessions.
pub async fn seed_catalog(
    db: &DatabaseConnection,
    seeds: &[SchoolSeed],
    weeks: u32,
    today: NaiveDate,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    let window = ExpansionWindow::weeks(today, weeks);

    for seed in seeds {
        if school::get_school_by_name(db, &seed.name).await?.is_some() {
            debug!(school = %seed.name, "School already exists, skipping");
            continue;
        }

        let created = school::create_school(
            db,
            NewSchool {
                name: seed.name.clone(),
                location: seed.location.clone(),
                contact_email: seed.contact_email.clone(),
                contact_phone: seed.contact_phone.clone(),
                owner_id: seed.owner_id,
            },
            SchoolStatus::Approved,
        )
        .await?;
        report.schools += 1;

        for class_seed in &seed.classes {
            let class = class::create_class(db, created.id, class_seed.class.clone()).await?;
            report.classes += 1;

            if !class_seed.schedules.is_empty() {
                class::set_schedules(db, class.id, &class_seed.schedules, window, today).await?;
                let materialized = class::materialize_sessions(db, class.id, window, today).await?;
                report.sessions += materialized.created.len();
            }
        }
    }

    info!(
        schools = report.schools,
        classes = report.classes,
        sessions = report.sessions,
        "Seeded catalog"
    );
    Ok(report)
}
