//! Shared test utilities for `SurfBook`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        class::{self, NewClass},
        schedule,
        school::{self, NewSchool},
    },
    entities::{
        self,
        class::ClassLevel,
        payment::{PaymentMethod, PaymentStatus},
        reservation::ReservationStatus,
        school::SchoolStatus,
    },
    errors::Result,
};
use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, DatabaseConnection, Set};
use tempfile::TempDir;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database served by a pool of connections.
///
/// Use this when a test needs several transactions to really run at once; the in-memory
/// database above has a single connection. The database lives as long as the returned
/// directory.
pub async fn setup_pooled_test_db() -> Result<(DatabaseConnection, TempDir)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("surfbook.sqlite").display());
    let mut options = ConnectOptions::new(url);
    options.max_connections(8).min_connections(2).sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, dir))
}

/// Creates an approved test school.
///
/// # Arguments
/// * `db` - Database connection
/// * `name` - School name
/// * `owner_id` - School admin user, if any
pub async fn create_test_school(
    db: &DatabaseConnection,
    name: &str,
    owner_id: Option<i64>,
) -> Result<entities::school::Model> {
    school::create_school(
        db,
        NewSchool {
            name: name.to_string(),
            location: "Huanchaco".to_string(),
            contact_email: None,
            contact_phone: None,
            owner_id,
        },
        SchoolStatus::Approved,
    )
    .await
}

/// Creates a test class.
///
/// # Defaults
/// * `level`: Beginner
/// * `duration_minutes`: 120
pub async fn create_test_class(
    db: &DatabaseConnection,
    school_id: i64,
    price: f64,
    capacity: i32,
) -> Result<entities::class::Model> {
    class::create_class(
        db,
        school_id,
        NewClass {
            title: "Surf Basics".to_string(),
            description: None,
            level: ClassLevel::Beginner,
            default_price: price,
            default_capacity: capacity,
            duration_minutes: 120,
            beach: None,
        },
    )
    .await
}

/// Creates an open ad-hoc session without its own price.
pub async fn create_test_session(
    db: &DatabaseConnection,
    class_id: i64,
    date: NaiveDate,
    time: &str,
    capacity: i32,
) -> Result<entities::class_session::Model> {
    entities::class_session::ActiveModel {
        class_id: Set(class_id),
        schedule_id: Set(None),
        date: Set(date),
        start_time: Set(schedule::parse_time(time)?),
        capacity: Set(capacity),
        price: Set(None),
        is_closed: Set(false),
        version: Set(0),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a reservation and its payment directly, bypassing availability checks.
///
/// The payment is PAID for PAID or COMPLETED reservations and UNPAID otherwise.
pub async fn create_test_reservation(
    db: &DatabaseConnection,
    session: &entities::class_session::Model,
    user_id: i64,
    participants: i32,
    status: ReservationStatus,
) -> Result<entities::reservation::Model> {
    let now = Utc::now();
    let reservation = entities::reservation::ActiveModel {
        user_id: Set(user_id),
        class_id: Set(session.class_id),
        session_id: Set(session.id),
        date: Set(session.date),
        start_time: Set(session.start_time),
        participants: Set(participants),
        special_request: Set(None),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let paid = matches!(status, ReservationStatus::Paid | ReservationStatus::Completed);
    entities::payment::ActiveModel {
        reservation_id: Set(reservation.id),
        original_amount: Set(0.0),
        amount: Set(0.0),
        status: Set(if paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Unpaid
        }),
        method: Set(PaymentMethod::Cash),
        discount_code_id: Set(None),
        voucher_url: Set(None),
        notes: Set(None),
        paid_at: Set(paid.then_some(now)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(reservation)
}

/// Inserts an active discount code valid from yesterday for thirty days.
pub async fn create_test_discount(
    db: &DatabaseConnection,
    code: &str,
    percentage: f64,
    max_uses: Option<i32>,
    used_count: i32,
    school_id: Option<i64>,
) -> Result<entities::discount_code::Model> {
    let now = Utc::now();
    entities::discount_code::ActiveModel {
        code: Set(code.to_uppercase()),
        description: Set(None),
        discount_percentage: Set(percentage),
        valid_from: Set(now - Duration::days(1)),
        valid_to: Set(now + Duration::days(30)),
        is_active: Set(true),
        max_uses: Set(max_uses),
        used_count: Set(used_count),
        school_id: Set(school_id),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Sets up a complete test environment with a school, a class and one session.
/// Returns (db, class, session) for booking scenarios.
pub async fn setup_with_session(
    capacity: i32,
) -> Result<(
    DatabaseConnection,
    entities::class::Model,
    entities::class_session::Model,
)> {
    let db = setup_test_db().await?;
    let school = create_test_school(&db, "Test School", Some(7)).await?;
    let class = create_test_class(&db, school.id, 45.0, capacity).await?;
    let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap_or_default();
    let session = create_test_session(&db, class.id, date, "09:00", capacity).await?;
    Ok((db, class, session))
}
