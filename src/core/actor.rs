//! The authenticated caller of an operation.
//!
//! Identity comes from the external auth provider and is trusted as-is.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Platform role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Books classes
    Student,
    /// Teaches classes
    Instructor,
    /// Manages one school
    SchoolAdmin,
    /// Platform admin
    Admin,
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" | "USER" => Ok(Self::Student),
            "INSTRUCTOR" => Ok(Self::Instructor),
            "SCHOOL_ADMIN" => Ok(Self::SchoolAdmin),
            "ADMIN" => Ok(Self::Admin),
            other => Err(Error::validation("role", format!("unknown role '{other}'"))),
        }
    }
}

/// Who is calling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// User id from the auth provider
    pub user_id: i64,
    /// Role from the auth provider
    pub role: Role,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub const fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Whether this is a platform admin.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Whether this actor may manage school-level data at all.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::SchoolAdmin)
    }

    /// Fails with `Forbidden` unless the actor is a school admin or admin.
    pub fn require_staff(&self) -> Result<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(Error::Forbidden {
                message: "school admin or admin role required".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roles() {
        assert_eq!("school_admin".parse::<Role>().ok(), Some(Role::SchoolAdmin));
        assert_eq!("ADMIN".parse::<Role>().ok(), Some(Role::Admin));
        assert_eq!("USER".parse::<Role>().ok(), Some(Role::Student));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_staff_check() {
        assert!(Actor::new(1, Role::Admin).require_staff().is_ok());
        assert!(Actor::new(1, Role::SchoolAdmin).require_staff().is_ok());
        assert!(matches!(
            Actor::new(1, Role::Student).require_staff(),
            Err(Error::Forbidden { .. })
        ));
    }
}
