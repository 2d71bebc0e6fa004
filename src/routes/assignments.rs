use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    assignment::{replace_bucket_assignments, BUCKET_LINE_DRAWINGS, BUCKET_SELL_SHEETS,
        BUCKET_VIRTUAL_PROTOTYPES},
    auth::{AuthenticatedUser, ROLE_DESIGNER},
    error::{AppError, AppResult},
    models::{DesignerAssignment, User},
    schema::{designer_assignments, users},
    state::AppState,
};

use super::jobs::to_iso;

#[derive(Deserialize)]
pub struct ListAssignmentsQuery {
    pub job_type: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize)]
pub struct ReplaceAssignmentsRequest {
    pub job_type: String,
    pub designer_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct DeactivateAssignmentQuery {
    pub id: Uuid,
}

#[derive(Serialize)]
pub struct AssignmentInfo {
    pub id: Uuid,
    pub job_type: String,
    pub designer_id: Uuid,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: String,
}

fn is_known_bucket(job_type: &str) -> bool {
    matches!(
        job_type,
        BUCKET_SELL_SHEETS | BUCKET_VIRTUAL_PROTOTYPES | BUCKET_LINE_DRAWINGS
    )
}

pub async fn list_assignments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListAssignmentsQuery>,
) -> AppResult<Json<Vec<AssignmentInfo>>> {
    user.require_staff()?;

    let mut conn = state.db()?;
    let mut statement = designer_assignments::table
        .order((
            designer_assignments::job_type.asc(),
            designer_assignments::priority.asc(),
        ))
        .into_boxed();

    if let Some(job_type) = &query.job_type {
        statement = statement.filter(designer_assignments::job_type.eq(job_type));
    }
    if !query.include_inactive {
        statement = statement.filter(designer_assignments::is_active.eq(true));
    }

    let rows: Vec<DesignerAssignment> = statement.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(assignment_to_info).collect()))
}

/// Replaces a bucket's ordered candidate list in one shot. Old rows are
/// deactivated, never deleted, so assignment history stays auditable.
pub async fn replace_assignments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ReplaceAssignmentsRequest>,
) -> AppResult<Json<Vec<AssignmentInfo>>> {
    user.require_admin()?;

    if !is_known_bucket(&payload.job_type) {
        return Err(AppError::bad_request("unknown job type bucket"));
    }

    let mut conn = state.db()?;

    for designer_id in &payload.designer_ids {
        let designer: Option<User> = users::table
            .find(*designer_id)
            .first(&mut conn)
            .optional()?;
        match designer {
            Some(row) if row.role == ROLE_DESIGNER => {}
            Some(_) => {
                return Err(AppError::bad_request(format!(
                    "user {designer_id} is not a designer"
                )))
            }
            None => {
                return Err(AppError::bad_request(format!(
                    "designer {designer_id} does not exist"
                )))
            }
        }
    }

    let rows = replace_bucket_assignments(&mut conn, &payload.job_type, &payload.designer_ids)?;
    Ok(Json(rows.into_iter().map(assignment_to_info).collect()))
}

pub async fn deactivate_assignment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<DeactivateAssignmentQuery>,
) -> AppResult<StatusCode> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let updated = diesel::update(
        designer_assignments::table
            .find(query.id)
            .filter(designer_assignments::is_active.eq(true)),
    )
    .set(designer_assignments::is_active.eq(false))
    .execute(&mut conn)?;

    if updated == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

fn assignment_to_info(assignment: DesignerAssignment) -> AssignmentInfo {
    AssignmentInfo {
        id: assignment.id,
        job_type: assignment.job_type,
        designer_id: assignment.designer_id,
        priority: assignment.priority,
        is_active: assignment.is_active,
        created_at: to_iso(assignment.created_at),
    }
}
