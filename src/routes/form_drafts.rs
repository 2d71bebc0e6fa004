use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::{
    auth::AuthenticatedUser,
    drafts::{DraftRecord, DraftStore, PgDraftBackend},
    error::{AppError, AppResult},
    state::AppState,
};

use super::jobs::to_iso;

#[derive(Serialize)]
pub struct DraftResponse {
    pub form_id: String,
    pub payload: Value,
    pub updated_at: String,
    pub expires_at: String,
}

pub async fn get_draft(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(form_id): Path<String>,
) -> AppResult<Json<DraftResponse>> {
    let mut conn = state.db()?;
    let mut store = DraftStore::new(PgDraftBackend::new(&mut conn), state.config.draft_ttl_days);

    let record = store
        .load(user.user_id, &form_id, Utc::now().naive_utc())
        .map_err(AppError::from)?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(to_response(form_id, record)))
}

pub async fn save_draft(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(form_id): Path<String>,
    Json(payload): Json<Value>,
) -> AppResult<Json<DraftResponse>> {
    if !payload.is_object() {
        return Err(AppError::bad_request("draft payload must be a JSON object"));
    }

    let mut conn = state.db()?;
    let mut store = DraftStore::new(PgDraftBackend::new(&mut conn), state.config.draft_ttl_days);

    let record = store
        .save(user.user_id, &form_id, payload, Utc::now().naive_utc())
        .map_err(AppError::from)?;

    Ok(Json(to_response(form_id, record)))
}

pub async fn delete_draft(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(form_id): Path<String>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let mut store = DraftStore::new(PgDraftBackend::new(&mut conn), state.config.draft_ttl_days);

    store.delete(user.user_id, &form_id).map_err(AppError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

fn to_response(form_id: String, record: DraftRecord) -> DraftResponse {
    DraftResponse {
        form_id,
        payload: record.payload,
        updated_at: to_iso(record.updated_at),
        expires_at: to_iso(record.expires_at),
    }
}
