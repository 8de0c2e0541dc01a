//! Class, schedule and session routes

use crate::{
    api::AppState,
    core::{
        actor::Actor,
        availability::SessionAvailability,
        class::{self, ClassUpdate, Materialized, NewSession, ScheduleUpdate, SessionUpdate},
        retry::with_retry,
        schedule::{ExpansionWindow, ScheduleInput},
    },
    entities::{class as class_entity, class_schedule, class_session},
    errors::{Error, Result},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Weeks previewed or generated when the request does not say.
const DEFAULT_WEEKS: u32 = 4;
/// Upper bound for one generation request.
const MAX_WEEKS: u32 = 52;

/// Class routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/classes/{id}",
            get(get_class).patch(update_class).delete(delete_class),
        )
        .route("/api/classes/{id}/schedules", put(set_schedules))
        .route("/api/classes/{id}/sessions", post(create_session))
        .route("/api/classes/{id}/sessions/generate", post(generate_sessions))
        .route("/api/classes/{id}/calendar", get(calendar))
        .route("/api/sessions/{id}", patch(update_session))
}

#[derive(Debug, Serialize)]
struct ClassDetails {
    #[serde(flatten)]
    class: class_entity::Model,
    schedules: Vec<class_schedule::Model>,
}

async fn get_class(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ClassDetails>> {
    let db = &state.db;
    let (class, schedules) = with_retry(&state.retry, "get_class", || async move {
        let class = class::get_class(db, id).await?;
        let schedules = class::list_schedules(db, id).await?;
        Ok::<_, Error>((class, schedules))
    })
    .await?;
    Ok(Json(ClassDetails { class, schedules }))
}

async fn update_class(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(update): Json<ClassUpdate>,
) -> Result<Json<class_entity::Model>> {
    class::ensure_manages_class(&state.db, &actor, id).await?;
    Ok(Json(class::update_class(&state.db, id, update).await?))
}

#[derive(Debug, Default, Deserialize)]
struct DeleteParams {
    #[serde(default)]
    hard: bool,
}

async fn delete_class(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode> {
    class::ensure_manages_class(&state.db, &actor, id).await?;
    if params.hard {
        class::delete_class(&state.db, id).await?;
    } else {
        class::soft_delete_class(&state.db, id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchedulesBody {
    schedules: Vec<ScheduleInput>,
    #[serde(default)]
    preview_weeks: Option<u32>,
}

fn weeks(requested: Option<u32>) -> Result<u32> {
    let weeks = requested.unwrap_or(DEFAULT_WEEKS);
    if weeks > MAX_WEEKS {
        return Err(Error::validation("weeks", format!("must be at most {MAX_WEEKS}")));
    }
    Ok(weeks)
}

async fn set_schedules(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(body): Json<SchedulesBody>,
) -> Result<Json<ScheduleUpdate>> {
    class::ensure_manages_class(&state.db, &actor, id).await?;
    let today = Utc::now().date_naive();
    let window = ExpansionWindow::weeks(today, weeks(body.preview_weeks)?);
    Ok(Json(
        class::set_schedules(&state.db, id, &body.schedules, window, today).await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
struct GenerateBody {
    #[serde(default)]
    weeks: Option<u32>,
}

async fn generate_sessions(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(body): Json<GenerateBody>,
) -> Result<(StatusCode, Json<Materialized>)> {
    class::ensure_manages_class(&state.db, &actor, id).await?;
    let today = Utc::now().date_naive();
    let window = ExpansionWindow::weeks(today, weeks(body.weeks)?);
    let materialized = class::materialize_sessions(&state.db, id, window, today).await?;
    Ok((StatusCode::CREATED, Json(materialized)))
}

async fn create_session(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<NewSession>,
) -> Result<(StatusCode, Json<class_session::Model>)> {
    class::ensure_manages_class(&state.db, &actor, id).await?;
    let session = class::create_session(&state.db, id, input).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn update_session(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(update): Json<SessionUpdate>,
) -> Result<Json<class_session::Model>> {
    let session = class::get_session(&state.db, id).await?;
    class::ensure_manages_class(&state.db, &actor, session.class_id).await?;
    Ok(Json(
        class::update_session(&state.db, &state.policy, id, update, Utc::now()).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct CalendarQuery {
    start: NaiveDate,
    end: NaiveDate,
}

async fn calendar(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Vec<SessionAvailability>>> {
    let now = Utc::now();
    let slots = with_retry(&state.retry, "class_calendar", || {
        class::class_calendar(&state.db, &state.policy, id, query.start, query.end, now)
    })
    .await?;
    Ok(Json(slots))
}
