//! Instructor routes

use crate::{
    api::AppState,
    core::{
        actor::Actor,
        class,
        instructor::{self, NewInstructor, TeachingSession},
        retry::with_retry,
    },
    entities::{class as class_entity, instructor as instructor_entity},
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

/// Instructor routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/schools/{id}/instructors",
            get(list_instructors).post(create_instructor),
        )
        .route("/api/classes/{id}/instructor", put(assign_instructor))
        .route("/api/instructors/me/sessions", get(my_sessions))
}

async fn list_instructors(
    State(state): State<AppState>,
    Path(school_id): Path<i64>,
) -> Result<Json<Vec<instructor_entity::Model>>> {
    let instructors = with_retry(&state.retry, "list_instructors", || {
        instructor::list_instructors(&state.db, school_id)
    })
    .await?;
    Ok(Json(instructors))
}

async fn create_instructor(
    State(state): State<AppState>,
    actor: Actor,
    Path(school_id): Path<i64>,
    Json(input): Json<NewInstructor>,
) -> Result<(StatusCode, Json<instructor_entity::Model>)> {
    let created = instructor::create_instructor(&state.db, &actor, school_id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignBody {
    #[serde(default)]
    instructor_id: Option<i64>,
}

async fn assign_instructor(
    State(state): State<AppState>,
    actor: Actor,
    Path(class_id): Path<i64>,
    Json(body): Json<AssignBody>,
) -> Result<Json<class_entity::Model>> {
    class::ensure_manages_class(&state.db, &actor, class_id).await?;
    Ok(Json(
        instructor::assign_instructor(&state.db, class_id, body.instructor_id).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start: NaiveDate,
    end: NaiveDate,
}

async fn my_sessions(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<TeachingSession>>> {
    let now = Utc::now();
    let sessions = with_retry(&state.retry, "instructor_schedule", || {
        instructor::instructor_schedule(&state.db, &state.policy, &actor, query.start, query.end, now)
    })
    .await?;
    Ok(Json(sessions))
}
