use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{NewVoucherCode, VoucherCode},
    schema::{voucher_codes, voucher_usages},
    state::AppState,
    vouchers::{
        evaluate_voucher, load_voucher, user_usage_count, DISCOUNT_FIXED, DISCOUNT_PERCENTAGE,
    },
};

use super::jobs::to_iso;

#[derive(Deserialize)]
pub struct CreateVoucherRequest {
    pub code: String,
    pub discount_type: String,
    pub discount_value: f64,
    pub max_uses: Option<i32>,
    pub uses_per_user: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateVoucherRequest {
    pub discount_type: Option<String>,
    pub discount_value: Option<f64>,
    pub max_uses: Option<i32>,
    pub uses_per_user: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct ValidateVoucherQuery {
    pub code: String,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = voucher_codes)]
struct VoucherChangeset<'a> {
    discount_type: Option<&'a str>,
    discount_value: Option<f64>,
    max_uses: Option<i32>,
    uses_per_user: Option<i32>,
    valid_from: Option<NaiveDateTime>,
    valid_until: Option<NaiveDateTime>,
    is_active: Option<bool>,
    updated_at: Option<NaiveDateTime>,
}

#[derive(Serialize)]
pub struct VoucherInfo {
    pub id: Uuid,
    pub code: String,
    pub discount_type: String,
    pub discount_value: f64,
    pub max_uses: Option<i32>,
    pub uses_per_user: Option<i32>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub is_active: bool,
    pub used_count: i32,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct ValidateVoucherResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_value: Option<f64>,
}

fn is_valid_discount_type(discount_type: &str) -> bool {
    matches!(discount_type, DISCOUNT_PERCENTAGE | DISCOUNT_FIXED)
}

pub async fn list_vouchers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<VoucherInfo>>> {
    user.require_staff()?;

    let mut conn = state.db()?;
    let rows: Vec<VoucherCode> = voucher_codes::table
        .order(voucher_codes::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(voucher_to_info).collect()))
}

pub async fn create_voucher(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateVoucherRequest>,
) -> AppResult<(StatusCode, Json<VoucherInfo>)> {
    user.require_admin()?;

    let code = payload.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::bad_request("code must not be empty"));
    }
    if !is_valid_discount_type(&payload.discount_type) {
        return Err(AppError::bad_request("unknown discount type"));
    }
    if payload.discount_value <= 0.0 {
        return Err(AppError::bad_request("discount value must be positive"));
    }
    if payload.discount_type == DISCOUNT_PERCENTAGE && payload.discount_value > 100.0 {
        return Err(AppError::bad_request("percentage discount cannot exceed 100"));
    }

    let mut conn = state.db()?;
    let new_voucher = NewVoucherCode {
        id: Uuid::new_v4(),
        code,
        discount_type: payload.discount_type,
        discount_value: payload.discount_value,
        max_uses: payload.max_uses,
        uses_per_user: payload.uses_per_user,
        valid_from: payload.valid_from.map(|dt| dt.naive_utc()),
        valid_until: payload.valid_until.map(|dt| dt.naive_utc()),
        is_active: payload.is_active.unwrap_or(true),
    };

    match diesel::insert_into(voucher_codes::table)
        .values(&new_voucher)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("voucher code already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let created: VoucherCode = voucher_codes::table.find(new_voucher.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(voucher_to_info(created))))
}

pub async fn get_voucher(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(voucher_id): Path<Uuid>,
) -> AppResult<Json<VoucherInfo>> {
    user.require_staff()?;

    let mut conn = state.db()?;
    let voucher: VoucherCode = voucher_codes::table.find(voucher_id).first(&mut conn)?;
    Ok(Json(voucher_to_info(voucher)))
}

pub async fn update_voucher(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(voucher_id): Path<Uuid>,
    Json(payload): Json<UpdateVoucherRequest>,
) -> AppResult<Json<VoucherInfo>> {
    user.require_admin()?;

    if let Some(discount_type) = &payload.discount_type {
        if !is_valid_discount_type(discount_type) {
            return Err(AppError::bad_request("unknown discount type"));
        }
    }
    if let Some(value) = payload.discount_value {
        if value <= 0.0 {
            return Err(AppError::bad_request("discount value must be positive"));
        }
    }

    let mut conn = state.db()?;
    let existing: VoucherCode = voucher_codes::table.find(voucher_id).first(&mut conn)?;

    let changeset = VoucherChangeset {
        discount_type: payload.discount_type.as_deref(),
        discount_value: payload.discount_value,
        max_uses: payload.max_uses,
        uses_per_user: payload.uses_per_user,
        valid_from: payload.valid_from.map(|dt| dt.naive_utc()),
        valid_until: payload.valid_until.map(|dt| dt.naive_utc()),
        is_active: payload.is_active,
        updated_at: Some(Utc::now().naive_utc()),
    };

    diesel::update(voucher_codes::table.find(existing.id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: VoucherCode = voucher_codes::table.find(voucher_id).first(&mut conn)?;
    Ok(Json(voucher_to_info(updated)))
}

pub async fn delete_voucher(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(voucher_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_admin()?;

    let mut conn = state.db()?;

    let redemptions: i64 = voucher_usages::table
        .filter(voucher_usages::voucher_id.eq(voucher_id))
        .select(count_star())
        .first(&mut conn)?;
    if redemptions > 0 {
        return Err(AppError::bad_request(
            "cannot delete a voucher that has been redeemed",
        ));
    }

    let deleted = diesel::delete(voucher_codes::table.find(voucher_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Public quote-time check. Validation never consumes a use; redemption
/// is recorded at payment confirmation.
pub async fn validate_voucher(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Query(query): Query<ValidateVoucherQuery>,
) -> AppResult<Json<ValidateVoucherResponse>> {
    let mut conn = state.db()?;
    let code = query.code.trim().to_uppercase();

    let voucher = load_voucher(&mut conn, &code)?;
    let usage = match (&voucher, &user) {
        (Some(voucher), Some(user)) => {
            Some(user_usage_count(&mut conn, voucher.id, user.user_id)?)
        }
        _ => None,
    };

    let now = Utc::now().naive_utc();
    let response = match evaluate_voucher(voucher.as_ref(), now, usage) {
        Ok(discount) => ValidateVoucherResponse {
            valid: true,
            reason: None,
            discount_type: Some(discount.discount_type),
            discount_value: Some(discount.discount_value),
        },
        Err(rejection) => ValidateVoucherResponse {
            valid: false,
            reason: Some(rejection.reason().to_string()),
            discount_type: None,
            discount_value: None,
        },
    };

    Ok(Json(response))
}

fn voucher_to_info(voucher: VoucherCode) -> VoucherInfo {
    VoucherInfo {
        id: voucher.id,
        code: voucher.code,
        discount_type: voucher.discount_type,
        discount_value: voucher.discount_value,
        max_uses: voucher.max_uses,
        uses_per_user: voucher.uses_per_user,
        valid_from: voucher.valid_from.map(to_iso),
        valid_until: voucher.valid_until.map(to_iso),
        is_active: voucher.is_active,
        used_count: voucher.used_count,
        created_at: to_iso(voucher.created_at),
    }
}
