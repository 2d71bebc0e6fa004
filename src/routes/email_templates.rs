use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{EmailLog, EmailTemplate, NewEmailTemplate, OutboxJob},
    outbox::enqueue_job,
    schema::{email_logs, email_templates, outbox_jobs},
    state::AppState,
};

use super::jobs::to_iso;

#[derive(Deserialize)]
pub struct CreateTemplateRequest {
    pub key: String,
    pub subject: String,
    pub body_html: String,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateTemplateRequest {
    pub subject: String,
    pub body_html: String,
    pub is_active: bool,
}

#[derive(Serialize)]
pub struct TemplateInfo {
    pub id: Uuid,
    pub key: String,
    pub subject: String,
    pub body_html: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct EmailLogInfo {
    pub id: Uuid,
    pub outbox_id: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub status: String,
    pub error: Option<String>,
    pub sent_at: String,
}

#[derive(Serialize)]
pub struct ResendResponse {
    pub outbox_id: Uuid,
}

pub async fn list_templates(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<TemplateInfo>>> {
    user.require_staff()?;

    let mut conn = state.db()?;
    let rows: Vec<EmailTemplate> = email_templates::table
        .order(email_templates::key.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(template_to_info).collect()))
}

pub async fn create_template(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateTemplateRequest>,
) -> AppResult<(StatusCode, Json<TemplateInfo>)> {
    user.require_admin()?;

    let key = payload.key.trim().to_string();
    if key.is_empty() {
        return Err(AppError::bad_request("key must not be empty"));
    }
    if payload.subject.trim().is_empty() {
        return Err(AppError::bad_request("subject must not be empty"));
    }

    let mut conn = state.db()?;
    let new_template = NewEmailTemplate {
        id: Uuid::new_v4(),
        key,
        subject: payload.subject,
        body_html: payload.body_html,
        is_active: payload.is_active.unwrap_or(true),
    };

    match diesel::insert_into(email_templates::table)
        .values(&new_template)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("template key already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let created: EmailTemplate = email_templates::table
        .find(new_template.id)
        .first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(template_to_info(created))))
}

pub async fn get_template(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(template_id): Path<Uuid>,
) -> AppResult<Json<TemplateInfo>> {
    user.require_staff()?;

    let mut conn = state.db()?;
    let template: EmailTemplate = email_templates::table.find(template_id).first(&mut conn)?;
    Ok(Json(template_to_info(template)))
}

pub async fn update_template(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<UpdateTemplateRequest>,
) -> AppResult<Json<TemplateInfo>> {
    user.require_admin()?;

    if payload.subject.trim().is_empty() {
        return Err(AppError::bad_request("subject must not be empty"));
    }

    let mut conn = state.db()?;
    let existing: EmailTemplate = email_templates::table.find(template_id).first(&mut conn)?;

    diesel::update(email_templates::table.find(existing.id))
        .set((
            email_templates::subject.eq(&payload.subject),
            email_templates::body_html.eq(&payload.body_html),
            email_templates::is_active.eq(payload.is_active),
            email_templates::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    let updated: EmailTemplate = email_templates::table.find(template_id).first(&mut conn)?;
    Ok(Json(template_to_info(updated)))
}

pub async fn delete_template(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(template_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let deleted = diesel::delete(email_templates::table.find(template_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Append-only audit trail of delivery attempts.
pub async fn list_logs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<EmailLogInfo>>> {
    user.require_staff()?;

    let mut conn = state.db()?;
    let rows: Vec<EmailLog> = email_logs::table
        .order(email_logs::sent_at.desc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(log_to_info).collect()))
}

/// Re-enqueues the outbox payload behind a logged attempt. The payment
/// or job that produced the notification is never re-run.
pub async fn resend_log(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(log_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ResendResponse>)> {
    user.require_staff()?;

    let mut conn = state.db()?;
    let log: EmailLog = email_logs::table.find(log_id).first(&mut conn)?;

    let outbox_id = log
        .outbox_id
        .ok_or_else(|| AppError::bad_request("log entry has no outbox job to replay"))?;
    let original: OutboxJob = outbox_jobs::table.find(outbox_id).first(&mut conn)?;

    let requeued = enqueue_job(&mut conn, &original.job_type, original.payload.clone(), None)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ResendResponse {
            outbox_id: requeued.id,
        }),
    ))
}

fn template_to_info(template: EmailTemplate) -> TemplateInfo {
    TemplateInfo {
        id: template.id,
        key: template.key,
        subject: template.subject,
        body_html: template.body_html,
        is_active: template.is_active,
        created_at: to_iso(template.created_at),
        updated_at: to_iso(template.updated_at),
    }
}

fn log_to_info(log: EmailLog) -> EmailLogInfo {
    EmailLogInfo {
        id: log.id,
        outbox_id: log.outbox_id,
        recipient: log.recipient,
        subject: log.subject,
        status: log.status,
        error: log.error,
        sent_at: to_iso(log.sent_at),
    }
}
