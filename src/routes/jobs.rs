use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    assignment::auto_assign_designer,
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    lifecycle::{
        can_view_job, initial_status, is_valid_priority, is_valid_status, PRIORITY_NORMAL,
        STATUS_PENDING,
    },
    models::{Job, NewJob},
    schema::jobs,
    state::AppState,
};

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub department: Option<String>,
    pub package_type: Option<String>,
    pub designer_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub is_draft: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub department: Option<String>,
    pub package_type: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub designer_id: Option<Option<Uuid>>,
    pub archived: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateDraftRequest {
    pub job_id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub department: Option<String>,
    pub package_type: Option<String>,
    pub activate: Option<bool>,
}

#[derive(Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub include_archived: bool,
    pub status: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = jobs)]
struct JobChangeset<'a> {
    title: Option<&'a str>,
    description: Option<&'a str>,
    status: Option<&'a str>,
    priority: Option<&'a str>,
    designer_id: Option<Option<Uuid>>,
    department: Option<&'a str>,
    package_type: Option<&'a str>,
    is_draft: Option<bool>,
    archived: Option<bool>,
    updated_at: Option<NaiveDateTime>,
    last_activity_at: Option<NaiveDateTime>,
}

#[derive(Serialize)]
pub struct JobResponse {
    pub job: JobInfo,
}

#[derive(Serialize)]
pub struct JobInfo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub client_id: Uuid,
    pub designer_id: Option<Uuid>,
    pub department: Option<String>,
    pub package_type: Option<String>,
    pub is_draft: bool,
    pub archived: bool,
    pub created_at: String,
    pub updated_at: String,
    pub last_activity_at: String,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListJobsQuery>,
) -> AppResult<Json<Vec<JobInfo>>> {
    let mut conn = state.db()?;

    let mut statement = jobs::table
        .order(jobs::last_activity_at.desc())
        .into_boxed();

    // Disallowed rows are filtered from listings rather than erroring.
    if user.role == crate::auth::ROLE_CLIENT {
        statement = statement.filter(jobs::client_id.eq(user.user_id));
    } else if user.role == crate::auth::ROLE_DESIGNER {
        statement = statement.filter(jobs::designer_id.eq(user.user_id));
    }

    if !query.include_archived {
        statement = statement.filter(jobs::archived.eq(false));
    }
    if let Some(status) = &query.status {
        statement = statement.filter(jobs::status.eq(status));
    }

    let rows: Vec<Job> = statement.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(job_to_info).collect()))
}

pub async fn create_job(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateJobRequest>,
) -> AppResult<(StatusCode, Json<JobResponse>)> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }

    let priority = payload
        .priority
        .unwrap_or_else(|| PRIORITY_NORMAL.to_string());
    if !is_valid_priority(&priority) {
        return Err(AppError::bad_request("unknown priority"));
    }

    // Clients always file for themselves; staff may file on a client's
    // behalf.
    let client_id = if user.is_staff() {
        payload.client_id.unwrap_or(user.user_id)
    } else {
        user.user_id
    };

    let is_draft = payload.is_draft.unwrap_or(false);
    let mut conn = state.db()?;

    let designer_id = match payload.designer_id {
        Some(explicit) => Some(explicit),
        None => payload
            .package_type
            .as_deref()
            .and_then(|package_type| auto_assign_designer(&mut conn, package_type)),
    };

    let new_job = NewJob {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: payload.description.unwrap_or_default(),
        status: initial_status(is_draft).to_string(),
        priority,
        client_id,
        designer_id,
        department: payload.department,
        package_type: payload.package_type,
        is_draft,
    };

    diesel::insert_into(jobs::table)
        .values(&new_job)
        .execute(&mut conn)?;

    let job: Job = jobs::table.find(new_job.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(JobResponse { job: job_to_info(job) })))
}

pub async fn get_job(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<JobResponse>> {
    let mut conn = state.db()?;
    let job: Job = jobs::table.find(job_id).first(&mut conn)?;

    if !can_view_job(&user, &job) {
        return Err(AppError::forbidden());
    }

    Ok(Json(JobResponse { job: job_to_info(job) }))
}

pub async fn update_job(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<UpdateJobRequest>,
) -> AppResult<Json<JobResponse>> {
    let mut conn = state.db()?;
    let job: Job = jobs::table.find(job_id).first(&mut conn)?;

    if !can_view_job(&user, &job) {
        return Err(AppError::forbidden());
    }

    let touches_staff_fields = payload.status.is_some()
        || payload.designer_id.is_some()
        || payload.archived.is_some();
    if !user.is_staff() && touches_staff_fields {
        return Err(AppError::forbidden());
    }

    // Clients may reshape their request only before work starts.
    if !user.is_staff() && !(job.is_draft || job.status == STATUS_PENDING) {
        return Err(AppError::forbidden());
    }

    if let Some(status) = &payload.status {
        if !is_valid_status(status) {
            return Err(AppError::bad_request("unknown job status"));
        }
    }
    if let Some(priority) = &payload.priority {
        if !is_valid_priority(priority) {
            return Err(AppError::bad_request("unknown priority"));
        }
    }
    if let Some(title) = &payload.title {
        if title.trim().is_empty() {
            return Err(AppError::bad_request("title must not be empty"));
        }
    }

    let now = Utc::now().naive_utc();
    let changeset = JobChangeset {
        title: payload.title.as_deref().map(str::trim),
        description: payload.description.as_deref(),
        status: payload.status.as_deref(),
        priority: payload.priority.as_deref(),
        designer_id: payload.designer_id,
        department: payload.department.as_deref(),
        package_type: payload.package_type.as_deref(),
        is_draft: None,
        archived: payload.archived,
        updated_at: Some(now),
        last_activity_at: Some(now),
    };

    diesel::update(jobs::table.find(job_id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: Job = jobs::table.find(job_id).first(&mut conn)?;
    Ok(Json(JobResponse {
        job: job_to_info(updated),
    }))
}

/// Repeated autosave patches for a draft job, with optional promotion to
/// the active workflow in the same call.
pub async fn update_draft(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateDraftRequest>,
) -> AppResult<Json<JobResponse>> {
    let mut conn = state.db()?;
    let job: Job = jobs::table.find(payload.job_id).first(&mut conn)?;

    let owns_job = job.client_id == user.user_id;
    if !owns_job && !user.is_manager() {
        return Err(AppError::forbidden());
    }
    if !job.is_draft {
        return Err(AppError::bad_request("job is not a draft"));
    }

    if let Some(priority) = &payload.priority {
        if !is_valid_priority(priority) {
            return Err(AppError::bad_request("unknown priority"));
        }
    }

    let activate = payload.activate.unwrap_or(false);
    let package_type = payload
        .package_type
        .clone()
        .or_else(|| job.package_type.clone());

    // Promotion re-attempts assignment if the draft never got a designer.
    let designer_id: Option<Option<Uuid>> = if activate && job.designer_id.is_none() {
        package_type
            .as_deref()
            .and_then(|pt| auto_assign_designer(&mut conn, pt))
            .map(Some)
    } else {
        None
    };

    let now = Utc::now().naive_utc();
    let changeset = JobChangeset {
        title: payload.title.as_deref().map(str::trim),
        description: payload.description.as_deref(),
        status: activate.then_some(STATUS_PENDING),
        priority: payload.priority.as_deref(),
        designer_id,
        department: payload.department.as_deref(),
        package_type: payload.package_type.as_deref(),
        is_draft: activate.then_some(false),
        archived: None,
        updated_at: Some(now),
        last_activity_at: Some(now),
    };

    diesel::update(jobs::table.find(job.id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: Job = jobs::table.find(job.id).first(&mut conn)?;
    Ok(Json(JobResponse {
        job: job_to_info(updated),
    }))
}

pub async fn delete_job(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(job_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_manager()?;

    let mut conn = state.db()?;
    let deleted = diesel::delete(jobs::table.find(job_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub fn to_iso(value: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc).to_rfc3339()
}

fn job_to_info(job: Job) -> JobInfo {
    JobInfo {
        id: job.id,
        title: job.title,
        description: job.description,
        status: job.status,
        priority: job.priority,
        client_id: job.client_id,
        designer_id: job.designer_id,
        department: job.department,
        package_type: job.package_type,
        is_draft: job.is_draft,
        archived: job.archived,
        created_at: to_iso(job.created_at),
        updated_at: to_iso(job.updated_at),
        last_activity_at: to_iso(job.last_activity_at),
    }
}
