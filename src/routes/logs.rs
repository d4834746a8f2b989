//! Read-only listings over the audit sinks, for the admin dashboard.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::audit::{ActivityLogRow, OrderLogRow};
use crate::auth::Identity;
use crate::error::Result;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LogParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn order_logs(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<LogParams>,
) -> Result<Json<Vec<OrderLogRow>>> {
    identity.require_admin()?;
    let limit = params.limit.unwrap_or(100).clamp(1, 200);
    let skip = params.skip.unwrap_or(0).max(0);
    let rows: Vec<OrderLogRow> =
        sqlx::query_as("SELECT * FROM order_logs ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(skip)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(rows))
}

pub async fn activity_logs(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<LogParams>,
) -> Result<Json<Vec<ActivityLogRow>>> {
    identity.require_admin()?;
    let limit = params.limit.unwrap_or(100).clamp(1, 200);
    let skip = params.skip.unwrap_or(0).max(0);
    let rows: Vec<ActivityLogRow> =
        sqlx::query_as("SELECT * FROM activity_logs ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(skip)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(rows))
}
