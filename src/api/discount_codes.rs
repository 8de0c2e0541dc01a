//! Discount code routes

use crate::{
    api::AppState,
    core::{
        actor::Actor,
        discount::{self, DiscountCodeUpdate, DiscountQuote, NewDiscountCode},
        retry::with_retry,
    },
    entities::discount_code,
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::Deserialize;

/// Discount code routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/discount-codes", get(list_codes).post(create_code))
        .route("/api/discount-codes/validate", post(validate_code))
        .route(
            "/api/discount-codes/{id}",
            put(update_code).delete(delete_code),
        )
}

async fn list_codes(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<discount_code::Model>>> {
    actor.require_staff()?;
    let codes = with_retry(&state.retry, "list_discount_codes", || {
        discount::list_discount_codes(&state.db, &actor)
    })
    .await?;
    Ok(Json(codes))
}

async fn create_code(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<NewDiscountCode>,
) -> Result<(StatusCode, Json<discount_code::Model>)> {
    let code = discount::create_discount_code(&state.db, &actor, input).await?;
    Ok((StatusCode::CREATED, Json(code)))
}

async fn update_code(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(update): Json<DiscountCodeUpdate>,
) -> Result<Json<discount_code::Model>> {
    Ok(Json(
        discount::update_discount_code(&state.db, &actor, id, update).await?,
    ))
}

async fn delete_code(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    discount::delete_discount_code(&state.db, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateBody {
    code: String,
    #[serde(default)]
    class_id: Option<i64>,
    amount: f64,
}

async fn validate_code(
    State(state): State<AppState>,
    Json(body): Json<ValidateBody>,
) -> Result<Json<DiscountQuote>> {
    let now = Utc::now();
    let quote = with_retry(&state.retry, "validate_discount", || {
        discount::quote_discount(&state.db, &body.code, body.class_id, body.amount, now)
    })
    .await?;
    Ok(Json(quote))
}
