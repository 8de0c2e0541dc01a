//! School routes

use crate::{
    api::AppState,
    core::{
        actor::Actor,
        class::{self, NewClass},
        retry::with_retry,
        school,
    },
    entities::{class as class_entity, school as school_entity},
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

/// School routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/schools", get(list_schools))
        .route("/api/schools/{id}/approve", post(approve_school))
        .route(
            "/api/schools/{id}/classes",
            get(list_classes).post(create_class),
        )
}

async fn list_schools(State(state): State<AppState>) -> Result<Json<Vec<school_entity::Model>>> {
    let schools = with_retry(&state.retry, "list_schools", || {
        school::list_approved_schools(&state.db)
    })
    .await?;
    Ok(Json(schools))
}

async fn approve_school(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<school_entity::Model>> {
    Ok(Json(school::approve_school(&state.db, &actor, id).await?))
}

async fn list_classes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<class_entity::Model>>> {
    let classes = with_retry(&state.retry, "list_classes", || {
        class::list_classes_for_school(&state.db, id)
    })
    .await?;
    Ok(Json(classes))
}

async fn create_class(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<NewClass>,
) -> Result<(StatusCode, Json<class_entity::Model>)> {
    school::ensure_manages_school(&state.db, &actor, id).await?;
    let class = class::create_class(&state.db, id, input).await?;
    Ok((StatusCode::CREATED, Json(class)))
}
