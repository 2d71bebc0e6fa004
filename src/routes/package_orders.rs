use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::DesignPackageOrder,
    schema::design_package_orders,
    state::AppState,
};

use super::jobs::to_iso;

pub const PACKAGE_STATUS_NOT_STARTED: &str = "not_started";
pub const PACKAGE_STATUS_IN_PROGRESS: &str = "in_progress";
pub const PACKAGE_STATUS_COMPLETE: &str = "complete";

fn is_valid_package_status(status: &str) -> bool {
    matches!(
        status,
        PACKAGE_STATUS_NOT_STARTED | PACKAGE_STATUS_IN_PROGRESS | PACKAGE_STATUS_COMPLETE
    )
}

#[derive(Deserialize)]
pub struct UpdateOrderRequest {
    pub virtual_prototype_status: Option<String>,
    pub sell_sheet_status: Option<String>,
    pub sell_sheet_locked: Option<bool>,
    #[serde(default)]
    pub virtual_prototype_job_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub sell_sheet_job_id: Option<Option<Uuid>>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = design_package_orders)]
struct OrderChangeset<'a> {
    virtual_prototype_status: Option<&'a str>,
    sell_sheet_status: Option<&'a str>,
    sell_sheet_locked: Option<bool>,
    virtual_prototype_job_id: Option<Option<Uuid>>,
    sell_sheet_job_id: Option<Option<Uuid>>,
    updated_at: Option<NaiveDateTime>,
}

#[derive(Serialize)]
pub struct PackageOrderInfo {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub user_id: Uuid,
    pub virtual_prototype_status: String,
    pub sell_sheet_status: String,
    pub sell_sheet_locked: bool,
    pub virtual_prototype_job_id: Option<Uuid>,
    pub sell_sheet_job_id: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<PackageOrderInfo>>> {
    let mut conn = state.db()?;

    let mut statement = design_package_orders::table
        .order(design_package_orders::created_at.desc())
        .into_boxed();
    if !user.is_staff() {
        statement = statement.filter(design_package_orders::user_id.eq(user.user_id));
    }

    let rows: Vec<DesignPackageOrder> = statement.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(order_to_info).collect()))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PackageOrderInfo>> {
    let mut conn = state.db()?;
    let order: DesignPackageOrder = design_package_orders::table
        .find(order_id)
        .first(&mut conn)?;

    if order.user_id != user.user_id && !user.is_staff() {
        return Err(AppError::forbidden());
    }

    Ok(Json(order_to_info(order)))
}

/// Staff progress updates for the two-step fulfillment. Completing the
/// virtual prototype unlocks the sell-sheet deliverable.
pub async fn update_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderRequest>,
) -> AppResult<Json<PackageOrderInfo>> {
    user.require_staff()?;

    for status in [&payload.virtual_prototype_status, &payload.sell_sheet_status]
        .into_iter()
        .flatten()
    {
        if !is_valid_package_status(status) {
            return Err(AppError::bad_request("unknown package status"));
        }
    }

    let mut conn = state.db()?;
    let order: DesignPackageOrder = design_package_orders::table
        .find(order_id)
        .first(&mut conn)?;

    let vp_completed = payload.virtual_prototype_status.as_deref() == Some(PACKAGE_STATUS_COMPLETE);
    let sell_sheet_locked = match payload.sell_sheet_locked {
        Some(explicit) => Some(explicit),
        None if vp_completed && order.sell_sheet_locked => Some(false),
        None => None,
    };

    let changeset = OrderChangeset {
        virtual_prototype_status: payload.virtual_prototype_status.as_deref(),
        sell_sheet_status: payload.sell_sheet_status.as_deref(),
        sell_sheet_locked,
        virtual_prototype_job_id: payload.virtual_prototype_job_id,
        sell_sheet_job_id: payload.sell_sheet_job_id,
        updated_at: Some(Utc::now().naive_utc()),
    };

    diesel::update(design_package_orders::table.find(order.id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: DesignPackageOrder = design_package_orders::table
        .find(order_id)
        .first(&mut conn)?;
    Ok(Json(order_to_info(updated)))
}

/// Resolves the signed access link from the confirmation email. Token
/// auth only, so buyers can reach their order before ever signing in.
pub async fn claim_order(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<PackageOrderInfo>> {
    let claims = state
        .jwt
        .verify_package_token(&token)
        .map_err(|_| AppError::unauthorized())?;

    let mut conn = state.db()?;
    let order: DesignPackageOrder = design_package_orders::table
        .find(claims.order_id)
        .first(&mut conn)?;

    if order.user_id != claims.user_id {
        return Err(AppError::unauthorized());
    }

    Ok(Json(order_to_info(order)))
}

pub fn order_to_info(order: DesignPackageOrder) -> PackageOrderInfo {
    PackageOrderInfo {
        id: order.id,
        payment_id: order.payment_id,
        user_id: order.user_id,
        virtual_prototype_status: order.virtual_prototype_status,
        sell_sheet_status: order.sell_sheet_status,
        sell_sheet_locked: order.sell_sheet_locked,
        virtual_prototype_job_id: order.virtual_prototype_job_id,
        sell_sheet_job_id: order.sell_sheet_job_id,
        created_at: to_iso(order.created_at),
        updated_at: to_iso(order.updated_at),
    }
}
