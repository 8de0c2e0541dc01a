//! Unified error type for the booking service.
//!
//! Every business rejection has its own variant so callers (and the HTTP layer) can tell
//! "session full" apart from "invalid code" apart from "already reserved" without string
//! matching. Infrastructure failures are wrapped as-is and surfaced as opaque errors.

use serde::Serialize;
use thiserror::Error;

/// Why a discount code could not be applied.
///
/// Variants are listed in the order the validator checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountRejection {
    /// No code with that name exists
    #[error("discount code not found")]
    NotFound,
    /// The code was switched off by an admin
    #[error("discount code is not active")]
    Inactive,
    /// `valid_from` lies in the future
    #[error("discount code is not valid yet")]
    NotYetValid,
    /// `valid_to` lies in the past
    #[error("discount code has expired")]
    Expired,
    /// `used_count` reached `max_uses`
    #[error("discount code has reached its usage limit")]
    Exhausted,
    /// The code is scoped to a different school
    #[error("discount code is not valid for this school")]
    WrongSchool,
}

impl DiscountRejection {
    /// Stable machine-readable code used in API responses.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "DISCOUNT_NOT_FOUND",
            Self::Inactive => "DISCOUNT_INACTIVE",
            Self::NotYetValid => "DISCOUNT_NOT_YET_VALID",
            Self::Expired => "DISCOUNT_EXPIRED",
            Self::Exhausted => "DISCOUNT_EXHAUSTED",
            Self::WrongSchool => "DISCOUNT_WRONG_SCHOOL",
        }
    }
}

/// Coarse classification used to pick an HTTP status and a log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any write
    Validation,
    /// A business rule refused the operation
    Rejected,
    /// The referenced record does not exist (or is soft-deleted)
    NotFound,
    /// The caller is not allowed to perform the operation
    Forbidden,
    /// Database, I/O or configuration failure
    Infrastructure,
}

/// Application error.
#[derive(Debug, Error)]
pub enum Error {
    /// `config.toml` could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// A request field failed validation
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Offending field, as named in the request
        field: String,
        /// Why the value was refused
        message: String,
    },

    /// No school with this id
    #[error("School {id} not found")]
    SchoolNotFound {
        /// Requested school id
        id: i64,
    },

    /// No visible class with this id
    #[error("Class {id} not found")]
    ClassNotFound {
        /// Requested class id
        id: i64,
    },

    /// No session matched the id or (class, date, time)
    #[error("Session not found: {reference}")]
    SessionNotFound {
        /// How the session was looked up
        reference: String,
    },

    /// The session exists but takes no bookings
    #[error("Session {session_id} is closed for booking")]
    SessionClosed {
        /// Closed session
        session_id: i64,
    },

    /// Not enough spots left for the requested party
    #[error("Session is full: {available} spots left, {requested} requested")]
    SessionFull {
        /// Spots still free
        available: i32,
        /// Spots asked for
        requested: i32,
    },

    /// The student already holds a live reservation for the session
    #[error("Already reserved: reservation {reservation_id} holds this session")]
    AlreadyReserved {
        /// The existing reservation
        reservation_id: i64,
    },

    /// No reservation with this id visible to the caller
    #[error("Reservation {id} not found")]
    ReservationNotFound {
        /// Requested reservation id
        id: i64,
    },

    /// No payment with this id
    #[error("Payment {id} not found")]
    PaymentNotFound {
        /// Requested payment id
        id: i64,
    },

    /// A discount code could not be applied
    #[error("Discount code {code} rejected: {reason}")]
    DiscountRejected {
        /// Code as submitted
        code: String,
        /// First failed check
        reason: DiscountRejection,
    },

    /// No discount code with this id
    #[error("Discount code {id} not found")]
    DiscountCodeNotFound {
        /// Requested discount code id
        id: i64,
    },

    /// Discount code strings are unique
    #[error("Discount code {code} already exists")]
    DuplicateDiscountCode {
        /// The clashing code
        code: String,
    },

    /// No instructor with this id
    #[error("Instructor {id} not found")]
    InstructorNotFound {
        /// Requested instructor id
        id: i64,
    },

    /// The user already teaches for the school
    #[error("User {user_id} is already an instructor at school {school_id}")]
    DuplicateInstructor {
        /// School the instructor was added to
        school_id: i64,
        /// Auth-provider user id
        user_id: i64,
    },

    /// A status change the lifecycle does not allow
    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        /// `reservation` or `payment`
        entity: &'static str,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Hard delete refused while reservations are live
    #[error("Class {id} has {active} active reservations")]
    ClassHasReservations {
        /// Class being deleted
        id: i64,
        /// Live reservations on it
        active: u64,
    },

    /// A capacity cut would strand existing bookings
    #[error("Capacity {capacity} is below the {reserved} spots already reserved")]
    CapacityBelowReservations {
        /// Requested capacity
        capacity: i32,
        /// Spots currently held
        reserved: i32,
    },

    /// A booked session cannot change date or time
    #[error("Session {session_id} has active reservations and cannot be moved")]
    SessionHasReservations {
        /// Session being moved
        session_id: i64,
    },

    /// The caller's role or ownership does not allow the operation
    #[error("Forbidden: {message}")]
    Forbidden {
        /// What was missing
        message: String,
    },

    /// Query or connection failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a field-level validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a discount rejection.
    pub fn discount(code: impl Into<String>, reason: DiscountRejection) -> Self {
        Self::DiscountRejected {
            code: code.into(),
            reason,
        }
    }

    /// Classifies the error for the caller.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::SchoolNotFound { .. }
            | Self::ClassNotFound { .. }
            | Self::SessionNotFound { .. }
            | Self::ReservationNotFound { .. }
            | Self::PaymentNotFound { .. }
            | Self::DiscountCodeNotFound { .. }
            | Self::InstructorNotFound { .. } => ErrorKind::NotFound,
            Self::SessionClosed { .. }
            | Self::SessionFull { .. }
            | Self::AlreadyReserved { .. }
            | Self::DiscountRejected { .. }
            | Self::DuplicateDiscountCode { .. }
            | Self::DuplicateInstructor { .. }
            | Self::InvalidTransition { .. }
            | Self::ClassHasReservations { .. }
            | Self::CapacityBelowReservations { .. }
            | Self::SessionHasReservations { .. } => ErrorKind::Rejected,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => ErrorKind::Infrastructure,
        }
    }

    /// Stable machine-readable code used in API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::SchoolNotFound { .. } => "SCHOOL_NOT_FOUND",
            Self::ClassNotFound { .. } => "CLASS_NOT_FOUND",
            Self::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            Self::SessionClosed { .. } => "SESSION_CLOSED",
            Self::SessionFull { .. } => "SESSION_FULL",
            Self::AlreadyReserved { .. } => "ALREADY_RESERVED",
            Self::ReservationNotFound { .. } => "RESERVATION_NOT_FOUND",
            Self::PaymentNotFound { .. } => "PAYMENT_NOT_FOUND",
            Self::DiscountRejected { reason, .. } => reason.code(),
            Self::DiscountCodeNotFound { .. } => "DISCOUNT_NOT_FOUND",
            Self::DuplicateDiscountCode { .. } => "DISCOUNT_DUPLICATE",
            Self::InstructorNotFound { .. } => "INSTRUCTOR_NOT_FOUND",
            Self::DuplicateInstructor { .. } => "INSTRUCTOR_DUPLICATE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ClassHasReservations { .. } => "CLASS_HAS_RESERVATIONS",
            Self::CapacityBelowReservations { .. } => "CAPACITY_BELOW_RESERVATIONS",
            Self::SessionHasReservations { .. } => "SESSION_HAS_RESERVATIONS",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_distinguishable() {
        let full = Error::SessionFull {
            available: 0,
            requested: 1,
        };
        let code = Error::discount("VERANO2024", DiscountRejection::Expired);
        let dup = Error::AlreadyReserved { reservation_id: 7 };

        assert_eq!(full.code(), "SESSION_FULL");
        assert_eq!(code.code(), "DISCOUNT_EXPIRED");
        assert_eq!(dup.code(), "ALREADY_RESERVED");
        assert_eq!(full.kind(), ErrorKind::Rejected);
        assert_eq!(code.kind(), ErrorKind::Rejected);
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = Error::validation("times", "expected HH:MM");
        assert_eq!(err.to_string(), "Invalid times: expected HH:MM");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_database_errors_are_infrastructure() {
        let err = Error::from(sea_orm::DbErr::Custom("boom".to_string()));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
