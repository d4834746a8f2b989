//! Product comments with star ratings.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::Identity;
use crate::error::{ApiError, Result};
use crate::routes::products::fetch_product;
use crate::AppState;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CommentView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub username: Option<String>,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<CommentView>>> {
    fetch_product(&state, product_id).await?;
    let comments: Vec<CommentView> = sqlx::query_as(
        "SELECT c.id, c.product_id, c.user_id, u.username, c.rating, c.comment, c.created_at \
         FROM product_comments c \
         LEFT JOIN users u ON u.id = c.user_id AND u.deleted_at IS NULL \
         WHERE c.product_id = $1 ORDER BY c.created_at DESC",
    )
    .bind(product_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(comments))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(min = 1, message = "comment is required"))]
    pub comment: String,
}

pub async fn create_comment(
    State(state): State<AppState>,
    identity: Identity,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>)> {
    let user_id = identity.require_user()?;
    payload.validate()?;
    fetch_product(&state, product_id).await?;

    let id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO product_comments (id, product_id, user_id, rating, comment, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, NOW(), NOW())",
    )
    .bind(id)
    .bind(product_id)
    .bind(user_id)
    .bind(payload.rating)
    .bind(&payload.comment)
    .execute(&state.db)
    .await?;

    let comment: CommentView = sqlx::query_as(
        "SELECT c.id, c.product_id, c.user_id, u.username, c.rating, c.comment, c.created_at \
         FROM product_comments c \
         LEFT JOIN users u ON u.id = c.user_id AND u.deleted_at IS NULL \
         WHERE c.id = $1",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let user_id = identity.require_user()?;

    let owner: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM product_comments WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let Some((owner_id,)) = owner else {
        return Err(ApiError::NotFound("Comment"));
    };
    if owner_id != user_id && !identity.is_admin() {
        return Err(ApiError::Forbidden);
    }

    sqlx::query("DELETE FROM product_comments WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
