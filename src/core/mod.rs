//! Core business logic, independent of the HTTP layer.
//!
//! Every database operation is generic over `ConnectionTrait` so it runs the same
//! against a pooled connection or inside a transaction.

/// Caller identity and roles
pub mod actor;
/// Spot accounting for sessions
pub mod availability;
/// Classes, schedules and concrete sessions
pub mod class;
/// Discount code validation, pricing and administration
pub mod discount;
/// Instructors, class assignment and teaching schedules
pub mod instructor;
/// Decimal-safe price arithmetic
pub mod money;
/// Payment confirmation and refunds
pub mod payment;
/// Reservation creation and lifecycle
pub mod reservation;
/// Backoff for transient database errors
pub mod retry;
/// Recurring schedule expansion
pub mod schedule;
/// Surf schools
pub mod school;
