//! Discount code validation, redemption and administration.
//!
//! Validation runs its checks in a fixed order and reports the first failure, so a code
//! that is both inactive and expired is reported as inactive. Redemption is a single
//! conditional UPDATE and never reads-then-writes the counter.

use crate::{
    core::{
        actor::{Actor, Role},
        class, money,
        money::DiscountedPrice,
        school,
    },
    entities::{DiscountCode, discount_code},
    errors::{DiscountRejection, Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, QueryOrder, Set,
    prelude::*,
    sea_query::{Expr, Func},
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

/// Largest percentage a school admin may grant.
pub const SCHOOL_ADMIN_MAX_PERCENTAGE: f64 = 50.0;

/// Canonical stored form of a code: trimmed and upper-cased.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Runs the ordered checks against a code that exists.
///
/// `target_school` is the school of the class being booked; `None` skips the scope check.
pub fn check_discount(
    code: &discount_code::Model,
    target_school: Option<i64>,
    now: DateTime<Utc>,
) -> std::result::Result<(), DiscountRejection> {
    if !code.is_active {
        return Err(DiscountRejection::Inactive);
    }
    if now < code.valid_from {
        return Err(DiscountRejection::NotYetValid);
    }
    if now > code.valid_to {
        return Err(DiscountRejection::Expired);
    }
    if code.max_uses.is_some_and(|max| code.used_count >= max) {
        return Err(DiscountRejection::Exhausted);
    }
    if let (Some(scope), Some(target)) = (code.school_id, target_school) {
        if scope != target {
            return Err(DiscountRejection::WrongSchool);
        }
    }
    Ok(())
}

/// Applies a validated code to a price, half-up to cents.
#[must_use]
pub fn apply_discount(price: f64, code: &discount_code::Model) -> DiscountedPrice {
    money::apply_percentage(price, code.discount_percentage)
}

/// Finds a code by name, ignoring case.
pub async fn find_by_code<C>(db: &C, code: &str) -> Result<Option<discount_code::Model>>
where
    C: ConnectionTrait,
{
    let normalized = normalize_code(code);
    DiscountCode::find()
        .filter(
            Expr::expr(Func::upper(Expr::col(discount_code::Column::Code)))
                .eq(normalized.as_str()),
        )
        .one(db)
        .await
        .map_err(Into::into)
}

/// Looks up a code and runs the ordered checks for a booking at `school_id`.
///
/// Validation does not consume a use.
pub async fn validate_discount<C>(
    db: &C,
    code: &str,
    school_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<discount_code::Model>
where
    C: ConnectionTrait,
{
    let normalized = normalize_code(code);
    let Some(model) = find_by_code(db, &normalized).await? else {
        return Err(Error::discount(normalized, DiscountRejection::NotFound));
    };

    check_discount(&model, school_id, now).map_err(|reason| {
        debug!(code = %model.code, ?reason, "Discount code rejected");
        Error::discount(model.code.clone(), reason)
    })?;

    Ok(model)
}

/// Price breakdown for a code, as shown before booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountQuote {
    /// Code id
    pub discount_code_id: i64,
    /// Canonical code
    pub code: String,
    /// Admin description
    pub description: Option<String>,
    /// Percentage off
    pub discount_percentage: f64,
    /// Price before discount
    pub original_amount: f64,
    /// Amount taken off
    pub discount_amount: f64,
    /// Price after discount
    pub final_amount: f64,
}

/// Validates a code and prices `amount` with it.
///
/// With a `class_id` the code must be valid for that class's school.
pub async fn quote_discount<C>(
    db: &C,
    code: &str,
    class_id: Option<i64>,
    amount: f64,
    now: DateTime<Utc>,
) -> Result<DiscountQuote>
where
    C: ConnectionTrait,
{
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::validation("amount", "must be a non-negative number"));
    }

    let school_id = match class_id {
        Some(id) => Some(class::get_class(db, id).await?.school_id),
        None => None,
    };
    let model = validate_discount(db, code, school_id, now).await?;
    let price = apply_discount(amount, &model);

    Ok(DiscountQuote {
        discount_code_id: model.id,
        code: model.code,
        description: model.description,
        discount_percentage: model.discount_percentage,
        original_amount: price.original,
        discount_amount: price.discount,
        final_amount: price.final_amount,
    })
}

/// Consumes one use of a code.
///
/// The increment only happens while the code is under its cap, so concurrent
/// redemptions can never push `used_count` past `max_uses`.
pub async fn redeem_discount<C>(db: &C, discount_code_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = DiscountCode::update_many()
        .col_expr(
            discount_code::Column::UsedCount,
            Expr::col(discount_code::Column::UsedCount).add(1),
        )
        .filter(discount_code::Column::Id.eq(discount_code_id))
        .filter(
            Condition::any()
                .add(discount_code::Column::MaxUses.is_null())
                .add(
                    Expr::col(discount_code::Column::UsedCount)
                        .lt(Expr::col(discount_code::Column::MaxUses)),
                ),
        )
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        let code = DiscountCode::find_by_id(discount_code_id)
            .one(db)
            .await?
            .ok_or(Error::DiscountCodeNotFound {
                id: discount_code_id,
            })?;
        return Err(Error::discount(code.code, DiscountRejection::Exhausted));
    }

    debug!(discount_code_id, "Discount code redeemed");
    Ok(())
}

/// Fields for a new discount code.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDiscountCode {
    /// The code students type
    pub code: String,
    /// Admin description
    #[serde(default)]
    pub description: Option<String>,
    /// Percentage off
    pub discount_percentage: f64,
    /// Start of validity
    pub valid_from: DateTime<Utc>,
    /// End of validity
    pub valid_to: DateTime<Utc>,
    /// Defaults to active
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Redemption cap
    #[serde(default)]
    pub max_uses: Option<i32>,
    /// Scope; ignored for school admins, who always get their own school
    #[serde(default)]
    pub school_id: Option<i64>,
}

/// Partial update. `maxUses: null` clears the cap, an absent field leaves it alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCodeUpdate {
    /// New code
    #[serde(default)]
    pub code: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// New percentage
    #[serde(default)]
    pub discount_percentage: Option<f64>,
    /// New start of validity
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    /// New end of validity
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    /// Kill switch
    #[serde(default)]
    pub is_active: Option<bool>,
    /// New cap
    #[serde(default, deserialize_with = "double_option")]
    pub max_uses: Option<Option<i32>>,
}

fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_code_format(code: &str) -> Result<()> {
    let len = code.chars().count();
    if !(3..=50).contains(&len) {
        return Err(Error::validation("code", "must be 3-50 characters"));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(Error::validation(
            "code",
            "may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

fn validate_percentage(actor: &Actor, percentage: f64) -> Result<()> {
    if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
        return Err(Error::validation(
            "discountPercentage",
            "must be between 0 and 100",
        ));
    }
    if actor.role == Role::SchoolAdmin && percentage > SCHOOL_ADMIN_MAX_PERCENTAGE {
        return Err(Error::validation(
            "discountPercentage",
            format!("school admins may grant at most {SCHOOL_ADMIN_MAX_PERCENTAGE}%"),
        ));
    }
    Ok(())
}

fn validate_window(valid_from: DateTime<Utc>, valid_to: DateTime<Utc>) -> Result<()> {
    if valid_to <= valid_from {
        return Err(Error::validation("validTo", "must be after validFrom"));
    }
    Ok(())
}

fn validate_max_uses(max_uses: Option<i32>) -> Result<()> {
    if max_uses.is_some_and(|max| max < 1) {
        return Err(Error::validation("maxUses", "must be at least 1"));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<()> {
    if description.is_some_and(|d| d.chars().count() > 500) {
        return Err(Error::validation("description", "must be at most 500 characters"));
    }
    Ok(())
}

async fn ensure_code_free<C>(db: &C, code: &str, except_id: Option<i64>) -> Result<()>
where
    C: ConnectionTrait,
{
    if let Some(existing) = find_by_code(db, code).await? {
        if Some(existing.id) != except_id {
            return Err(Error::DuplicateDiscountCode {
                code: code.to_string(),
            });
        }
    }
    Ok(())
}

/// Resolves which school a new code belongs to for this actor.
async fn scope_for_actor<C>(db: &C, actor: &Actor, requested: Option<i64>) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    match actor.role {
        Role::Admin => {
            if let Some(school_id) = requested {
                school::get_school(db, school_id).await?;
            }
            Ok(requested)
        }
        Role::SchoolAdmin => {
            let owned = school::school_owned_by(db, actor.user_id).await?;
            owned.map(|s| Some(s.id)).ok_or_else(|| Error::Forbidden {
                message: "school admin has no school".to_string(),
            })
        }
        Role::Student | Role::Instructor => Err(Error::Forbidden {
            message: "school admin or admin role required".to_string(),
        }),
    }
}

/// Fails unless the actor may manage this particular code.
async fn ensure_manages_code<C>(db: &C, actor: &Actor, code: &discount_code::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    actor.require_staff()?;
    if actor.is_admin() {
        return Ok(());
    }
    match code.school_id {
        Some(school_id) => school::ensure_manages_school(db, actor, school_id).await,
        None => Err(Error::Forbidden {
            message: "global codes are managed by platform admins".to_string(),
        }),
    }
}

/// Creates a discount code.
pub async fn create_discount_code<C>(
    db: &C,
    actor: &Actor,
    input: NewDiscountCode,
) -> Result<discount_code::Model>
where
    C: ConnectionTrait,
{
    actor.require_staff()?;

    let code = normalize_code(&input.code);
    validate_code_format(&code)?;
    validate_percentage(actor, input.discount_percentage)?;
    validate_window(input.valid_from, input.valid_to)?;
    validate_max_uses(input.max_uses)?;
    validate_description(input.description.as_deref())?;

    let school_id = scope_for_actor(db, actor, input.school_id).await?;
    ensure_code_free(db, &code, None).await?;

    let model = discount_code::ActiveModel {
        code: Set(code),
        description: Set(input.description),
        discount_percentage: Set(input.discount_percentage),
        valid_from: Set(input.valid_from),
        valid_to: Set(input.valid_to),
        is_active: Set(input.is_active.unwrap_or(true)),
        max_uses: Set(input.max_uses),
        used_count: Set(0),
        school_id: Set(school_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        code = %model.code,
        percentage = model.discount_percentage,
        school_id = ?model.school_id,
        created_by = actor.user_id,
        "Created discount code"
    );
    Ok(model)
}

/// Gets a code the actor may manage.
pub async fn get_discount_code<C>(db: &C, actor: &Actor, id: i64) -> Result<discount_code::Model>
where
    C: ConnectionTrait,
{
    let code = DiscountCode::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::DiscountCodeNotFound { id })?;
    ensure_manages_code(db, actor, &code).await?;
    Ok(code)
}

/// Applies a partial update, re-checking every creation rule against the merged result.
pub async fn update_discount_code<C>(
    db: &C,
    actor: &Actor,
    id: i64,
    update: DiscountCodeUpdate,
) -> Result<discount_code::Model>
where
    C: ConnectionTrait,
{
    let current = get_discount_code(db, actor, id).await?;

    let code = update
        .code
        .as_deref()
        .map_or_else(|| current.code.clone(), normalize_code);
    let percentage = update
        .discount_percentage
        .unwrap_or(current.discount_percentage);
    let valid_from = update.valid_from.unwrap_or(current.valid_from);
    let valid_to = update.valid_to.unwrap_or(current.valid_to);
    let max_uses = update.max_uses.unwrap_or(current.max_uses);

    validate_code_format(&code)?;
    validate_percentage(actor, percentage)?;
    validate_window(valid_from, valid_to)?;
    validate_max_uses(max_uses)?;
    if max_uses.is_some_and(|max| max < current.used_count) {
        return Err(Error::validation(
            "maxUses",
            format!(
                "must not be below the {} uses already redeemed",
                current.used_count
            ),
        ));
    }
    validate_description(update.description.as_deref())?;
    if code != current.code {
        ensure_code_free(db, &code, Some(id)).await?;
    }

    let mut active: discount_code::ActiveModel = current.into();
    active.code = Set(code);
    active.discount_percentage = Set(percentage);
    active.valid_from = Set(valid_from);
    active.valid_to = Set(valid_to);
    active.max_uses = Set(max_uses);
    if let Some(description) = update.description {
        active.description = Set(Some(description));
    }
    if let Some(is_active) = update.is_active {
        active.is_active = Set(is_active);
    }

    let model = active.update(db).await?;
    info!(code = %model.code, updated_by = actor.user_id, "Updated discount code");
    Ok(model)
}

/// Deletes a code. Payments keep their historical amounts.
pub async fn delete_discount_code<C>(db: &C, actor: &Actor, id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let code = get_discount_code(db, actor, id).await?;
    DiscountCode::delete_by_id(code.id).exec(db).await?;
    info!(code = %code.code, deleted_by = actor.user_id, "Deleted discount code");
    Ok(())
}

/// Codes visible to the actor, newest first.
///
/// Admins see every code; school admins see the codes scoped to their school.
pub async fn list_discount_codes<C>(db: &C, actor: &Actor) -> Result<Vec<discount_code::Model>>
where
    C: ConnectionTrait,
{
    let mut query = DiscountCode::find().order_by_desc(discount_code::Column::CreatedAt);
    match actor.role {
        Role::Admin => {}
        Role::SchoolAdmin => {
            let Some(owned) = school::school_owned_by(db, actor.user_id).await? else {
                return Ok(Vec::new());
            };
            query = query.filter(discount_code::Column::SchoolId.eq(owned.id));
        }
        Role::Student | Role::Instructor => {
            return Err(Error::Forbidden {
                message: "school admin or admin role required".to_string(),
            });
        }
    }
    query.all(db).await.map_err(Into::into)
}
