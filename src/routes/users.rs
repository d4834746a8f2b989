//! Admin user management. Deletion is soft: the row keeps its history but
//! disappears from every read path.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::audit::{self, Activity};
use crate::auth::Identity;
use crate::error::{ApiError, Result};
use crate::models::User;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UserListParams {
    pub role: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_users(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<UserListParams>,
) -> Result<Json<Vec<User>>> {
    identity.require_admin()?;
    let limit = params.limit.unwrap_or(100).clamp(1, 100);
    let skip = params.skip.unwrap_or(0).max(0);

    let users: Vec<User> = sqlx::query_as(
        "SELECT * FROM users WHERE deleted_at IS NULL \
           AND ($1::text IS NULL OR role = $1) \
           AND ($2::text IS NULL OR status = $2) \
           AND ($3::text IS NULL OR username ILIKE '%' || $3 || '%' OR email ILIKE '%' || $3 || '%') \
         ORDER BY created_at DESC LIMIT $4 OFFSET $5",
    )
    .bind(&params.role)
    .bind(&params.status)
    .bind(&params.search)
    .bind(limit)
    .bind(skip)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<User>> {
    identity.require_admin()?;
    fetch_active_user(&state, id).await.map(Json)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    /// Opaque hash produced by the auth collaborator; this service never
    /// sees or derives plaintext credentials.
    #[validate(length(min = 1, max = 255))]
    pub password_hash: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_string()
}

pub async fn create_user(
    State(state): State<AppState>,
    identity: Identity,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let admin_id = identity.require_admin()?;
    payload.validate()?;
    if !matches!(payload.role.as_str(), "admin" | "user") {
        return Err(ApiError::Validation("Role must be 'admin' or 'user'".into()));
    }

    let taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(&payload.email)
        .fetch_optional(&state.db)
        .await?;
    if taken.is_some() {
        return Err(ApiError::Validation("Email already registered".into()));
    }

    let user: User = sqlx::query_as(
        "INSERT INTO users (id, username, email, password_hash, role, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, 'active', NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&payload.password_hash)
    .bind(&payload.role)
    .fetch_one(&state.db)
    .await?;

    audit::log_activity(
        &state.db,
        Activity {
            user_id: Some(admin_id),
            activity_type: "user_created",
            resource_type: Some("user"),
            resource_id: Some(user.id.to_string()),
            description: format!("Created user {}", user.email),
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

pub async fn update_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    identity.require_admin()?;
    payload.validate()?;
    if let Some(role) = &payload.role {
        if !matches!(role.as_str(), "admin" | "user") {
            return Err(ApiError::Validation("Role must be 'admin' or 'user'".into()));
        }
    }
    if let Some(status) = &payload.status {
        if !matches!(status.as_str(), "active" | "inactive") {
            return Err(ApiError::Validation("Status must be 'active' or 'inactive'".into()));
        }
    }
    fetch_active_user(&state, id).await?;

    if let Some(email) = &payload.email {
        let taken: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id <> $2")
                .bind(email)
                .bind(id)
                .fetch_optional(&state.db)
                .await?;
        if taken.is_some() {
            return Err(ApiError::Validation("Email already taken".into()));
        }
    }

    let user: User = sqlx::query_as(
        "UPDATE users SET \
             username = COALESCE($2, username), \
             email = COALESCE($3, email), \
             role = COALESCE($4, role), \
             status = COALESCE($5, status), \
             updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING *",
    )
    .bind(id)
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&payload.role)
    .bind(&payload.status)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let admin_id = identity.require_admin()?;
    if id == admin_id {
        return Err(ApiError::Validation("Cannot delete your own account".into()));
    }

    let deleted = sqlx::query(
        "UPDATE users SET deleted_at = NOW(), status = 'inactive', updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(&state.db)
    .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound("User"));
    }

    audit::log_activity(
        &state.db,
        Activity {
            user_id: Some(admin_id),
            activity_type: "user_deleted",
            resource_type: Some("user"),
            resource_id: Some(id.to_string()),
            description: format!("Soft-deleted user {id}"),
        },
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_active_user(state: &AppState, id: Uuid) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("User"))
}
