//! Database configuration module.
//!
//! This module handles the `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the database schema always matches the Rust structs without hand-written SQL.
//! Creation is idempotent (`IF NOT EXISTS`) and safe to run on every startup.

use crate::entities::{
    Class, ClassSchedule, ClassSession, DiscountCode, Instructor, Payment, Reservation, School,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::debug;

const DEFAULT_DATABASE_URL: &str = "sqlite://surfbook.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns the
/// default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// The returned handle is owned by the caller (the server process) and passed to every
/// component that needs it; it is closed with [`DatabaseConnection::close`] on shutdown.
pub async fn create_connection() -> Result<DatabaseConnection> {
    connect(&get_database_url()).await
}

/// Connects to an explicit database URL.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    debug!(url = %database_url, "Connecting to database");
    Database::connect(database_url).await.map_err(Into::into)
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables, parents before children.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, School).await?;
    create_table(db, &schema, Instructor).await?;
    create_table(db, &schema, Class).await?;
    create_table(db, &schema, ClassSchedule).await?;
    create_table(db, &schema, ClassSession).await?;
    create_table(db, &schema, DiscountCode).await?;
    create_table(db, &schema, Reservation).await?;
    create_table(db, &schema, Payment).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        ClassModel, ClassScheduleModel, ClassSessionModel, DiscountCodeModel, InstructorModel,
        PaymentModel, ReservationModel, SchoolModel,
    };
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<SchoolModel> = School::find().limit(1).all(&db).await?;
        let _: Vec<InstructorModel> = Instructor::find().limit(1).all(&db).await?;
        let _: Vec<ClassModel> = Class::find().limit(1).all(&db).await?;
        let _: Vec<ClassScheduleModel> = ClassSchedule::find().limit(1).all(&db).await?;
        let _: Vec<ClassSessionModel> = ClassSession::find().limit(1).all(&db).await?;
        let _: Vec<DiscountCodeModel> = DiscountCode::find().limit(1).all(&db).await?;
        let _: Vec<ReservationModel> = Reservation::find().limit(1).all(&db).await?;
        let _: Vec<PaymentModel> = Payment::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
