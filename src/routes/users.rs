use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{is_valid_role, password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{NewUser, User},
    schema::users,
    state::AppState,
};

use super::jobs::to_iso;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: String,
    pub phone: Option<String>,
    pub company: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = users)]
struct UserChangeset<'a> {
    full_name: Option<&'a str>,
    phone: Option<&'a str>,
    company: Option<&'a str>,
    password_hash: Option<String>,
    role: Option<&'a str>,
    updated_at: Option<NaiveDateTime>,
}

#[derive(Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<UserInfo>>> {
    user.require_staff()?;

    let mut conn = state.db()?;
    let rows: Vec<User> = users::table.order(users::created_at.asc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(user_to_info).collect()))
}

/// Admin invite path; self-service signup goes through /api/auth/register.
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserInfo>)> {
    user.require_admin()?;

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    if !is_valid_role(&payload.role) {
        return Err(AppError::bad_request("unknown role"));
    }
    if payload.password.len() < 8 {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }

    let mut conn = state.db()?;
    let new_user = NewUser {
        id: Uuid::new_v4(),
        email,
        full_name: payload.full_name.trim().to_string(),
        password_hash: password::hash_password(&payload.password)?,
        role: payload.role,
        phone: payload.phone,
        company: payload.company,
    };

    match diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("email already registered"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let created: User = users::table.find(new_user.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(user_to_info(created))))
}

pub async fn get_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserInfo>> {
    if user.user_id != user_id && !user.is_manager() {
        return Err(AppError::forbidden());
    }

    let mut conn = state.db()?;
    let row: User = users::table.find(user_id).first(&mut conn)?;
    Ok(Json(user_to_info(row)))
}

pub async fn update_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserInfo>> {
    if user.user_id != user_id && !user.is_admin() {
        return Err(AppError::forbidden());
    }

    // Role is mutable by admins only, even on their own account.
    if payload.role.is_some() && !user.is_admin() {
        return Err(AppError::forbidden());
    }
    if let Some(role) = &payload.role {
        if !is_valid_role(role) {
            return Err(AppError::bad_request("unknown role"));
        }
    }

    let password_hash = match &payload.password {
        Some(new_password) => {
            if new_password.len() < 8 {
                return Err(AppError::bad_request(
                    "password must be at least 8 characters",
                ));
            }
            Some(password::hash_password(new_password)?)
        }
        None => None,
    };

    let mut conn = state.db()?;
    let existing: User = users::table.find(user_id).first(&mut conn)?;

    let changeset = UserChangeset {
        full_name: payload.full_name.as_deref().map(str::trim),
        phone: payload.phone.as_deref(),
        company: payload.company.as_deref(),
        password_hash,
        role: payload.role.as_deref(),
        updated_at: Some(Utc::now().naive_utc()),
    };

    diesel::update(users::table.find(existing.id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: User = users::table.find(user_id).first(&mut conn)?;
    Ok(Json(user_to_info(updated)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let deleted = diesel::delete(users::table.find(user_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

fn user_to_info(user: User) -> UserInfo {
    UserInfo {
        id: user.id,
        email: user.email,
        full_name: user.full_name,
        role: user.role,
        phone: user.phone,
        company: user.company,
        created_at: to_iso(user.created_at),
        updated_at: to_iso(user.updated_at),
    }
}
