//! Caller identity from the upstream auth proxy.
//!
//! The proxy authenticates the user and forwards `x-user-id` and `x-user-role`.
//! Handlers that take an [`Actor`] reject requests without them.

use crate::{
    core::actor::{Actor, Role},
    errors::Error,
};
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the user role
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|h| h.to_str().ok())
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw_id) = header(parts, USER_ID_HEADER) else {
            return Err(Error::Forbidden {
                message: "missing identity".to_string(),
            });
        };
        let user_id = raw_id
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::validation(USER_ID_HEADER, "must be an integer"))?;
        let role = match header(parts, USER_ROLE_HEADER) {
            Some(raw) => raw.parse::<Role>()?,
            None => Role::Student,
        };
        Ok(Self::new(user_id, role))
    }
}
