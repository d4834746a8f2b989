//! Product catalog routes.
//!
//! Reads are projected per role: admins get stored variant capacities for
//! editing, everyone else gets the shared-pool availability broadcast.
//! Writes are admin-only and consolidate the submitted variant list before
//! anything touches storage.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::audit::{self, Activity};
use crate::auth::{Identity, Role};
use crate::domain::projection::{ProductView, ProjectionStrategy};
use crate::domain::variants::{consolidate, ConsolidatedVariant, VariantInput};
use crate::error::{ApiError, Result};
use crate::ledger;
use crate::models::{Product, ProductVariant};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DiscountBody {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub discount_type: Option<String>,
    pub value: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VoucherBody {
    pub enabled: bool,
    pub code: Option<String>,
    pub discount_type: Option<String>,
    pub discount_value: Option<i64>,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub initial_stock: i32,
    pub image: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
    pub discount: Option<DiscountBody>,
    pub voucher: Option<VoucherBody>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(range(min = 0))]
    pub initial_stock: Option<i32>,
    pub image: Option<String>,
    /// When present, replaces the whole variant set (consolidated).
    pub variants: Option<Vec<VariantInput>>,
    pub discount: Option<DiscountBody>,
    pub voucher: Option<VoucherBody>,
}

fn check_discount_terms(discount: &DiscountBody) -> Result<()> {
    if discount.enabled
        && !matches!(discount.discount_type.as_deref(), Some("percentage") | Some("fixed"))
    {
        return Err(ApiError::Validation(
            "Discount type must be 'percentage' or 'fixed'".into(),
        ));
    }
    Ok(())
}

pub async fn list_products(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ProductView>>> {
    let limit = params.limit.unwrap_or(100).clamp(1, 100);
    let skip = params.skip.unwrap_or(0).max(0);

    let products: Vec<Product> = sqlx::query_as(
        "SELECT * FROM products \
         WHERE ($1::text IS NULL OR category = $1) \
           AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR description ILIKE '%' || $2 || '%') \
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(&params.category)
    .bind(&params.search)
    .bind(limit)
    .bind(skip)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(project_page(&state, identity.role, &products).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductView>> {
    let product = fetch_product(&state, id).await?;
    let variants = fetch_variants(&state, id).await?;
    let ordered = ledger::ordered_sum(&state.db, id).await?;
    let view = ProjectionStrategy::for_role(identity.role).project(&product, &variants, ordered);
    Ok(Json(view))
}

pub async fn create_product(
    State(state): State<AppState>,
    identity: Identity,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductView>)> {
    let admin_id = identity.require_admin()?;
    payload.validate()?;
    if let Some(discount) = &payload.discount {
        check_discount_terms(discount)?;
    }
    let rows = consolidate(&payload.variants)?;

    let mut tx = state.db.begin().await?;
    let product: Product = sqlx::query_as(
        "INSERT INTO products (id, name, description, price, category, initial_stock, image, \
                               discount_enabled, discount_type, discount_value, \
                               voucher_enabled, voucher_code, voucher_discount_type, \
                               voucher_discount_value, voucher_expiry_date, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW(), NOW()) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.price)
    .bind(&payload.category)
    .bind(payload.initial_stock)
    .bind(&payload.image)
    .bind(payload.discount.as_ref().map_or(false, |d| d.enabled))
    .bind(payload.discount.as_ref().and_then(|d| d.discount_type.clone()))
    .bind(payload.discount.as_ref().and_then(|d| d.value))
    .bind(payload.voucher.as_ref().map_or(false, |v| v.enabled))
    .bind(payload.voucher.as_ref().and_then(|v| v.code.clone()))
    .bind(payload.voucher.as_ref().and_then(|v| v.discount_type.clone()))
    .bind(payload.voucher.as_ref().and_then(|v| v.discount_value))
    .bind(payload.voucher.as_ref().and_then(|v| v.expiry_date))
    .fetch_one(&mut *tx)
    .await?;

    replace_variants(&mut tx, product.id, &rows).await?;
    tx.commit().await?;

    audit::log_activity(
        &state.db,
        Activity {
            user_id: Some(admin_id),
            activity_type: "product_created",
            resource_type: Some("product"),
            resource_id: Some(product.id.to_string()),
            description: format!("Created product {}", product.name),
        },
    )
    .await;

    let variants = fetch_variants(&state, product.id).await?;
    let view = ProjectionStrategy::AdminView.project(&product, &variants, 0);
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_product(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<ProductView>> {
    let admin_id = identity.require_admin()?;
    payload.validate()?;
    if let Some(discount) = &payload.discount {
        check_discount_terms(discount)?;
    }
    let rows = payload.variants.as_deref().map(consolidate).transpose()?;

    let mut tx = state.db.begin().await?;
    let product: Option<Product> = sqlx::query_as(
        "UPDATE products SET \
             name = COALESCE($2, name), \
             description = COALESCE($3, description), \
             price = COALESCE($4, price), \
             category = COALESCE($5, category), \
             initial_stock = COALESCE($6, initial_stock), \
             image = COALESCE($7, image), \
             updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.price)
    .bind(&payload.category)
    .bind(payload.initial_stock)
    .bind(&payload.image)
    .fetch_optional(&mut *tx)
    .await?;
    let mut product = product.ok_or(ApiError::NotFound("Product"))?;

    if let Some(discount) = &payload.discount {
        product = sqlx::query_as(
            "UPDATE products SET discount_enabled = $2, discount_type = $3, discount_value = $4, \
                                 updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(discount.enabled)
        .bind(&discount.discount_type)
        .bind(discount.value)
        .fetch_one(&mut *tx)
        .await?;
    }

    if let Some(voucher) = &payload.voucher {
        product = sqlx::query_as(
            "UPDATE products SET voucher_enabled = $2, voucher_code = $3, \
                                 voucher_discount_type = $4, voucher_discount_value = $5, \
                                 voucher_expiry_date = $6, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(voucher.enabled)
        .bind(&voucher.code)
        .bind(&voucher.discount_type)
        .bind(voucher.discount_value)
        .bind(voucher.expiry_date)
        .fetch_one(&mut *tx)
        .await?;
    }

    // Replace semantics: the old rows go away and the consolidated set lands
    // in the same transaction, so readers never observe a variant-less
    // product mid-update.
    if let Some(rows) = &rows {
        replace_variants(&mut tx, id, rows).await?;
    }
    tx.commit().await?;

    audit::log_activity(
        &state.db,
        Activity {
            user_id: Some(admin_id),
            activity_type: "product_updated",
            resource_type: Some("product"),
            resource_id: Some(id.to_string()),
            description: format!("Updated product {}", product.name),
        },
    )
    .await;

    let variants = fetch_variants(&state, id).await?;
    let ordered = ledger::ordered_sum(&state.db, id).await?;
    Ok(Json(ProjectionStrategy::AdminView.project(&product, &variants, ordered)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let admin_id = identity.require_admin()?;
    let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound("Product"));
    }

    audit::log_activity(
        &state.db,
        Activity {
            user_id: Some(admin_id),
            activity_type: "product_deleted",
            resource_type: Some("product"),
            resource_id: Some(id.to_string()),
            description: format!("Deleted product {id}"),
        },
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let categories: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT category FROM products ORDER BY category")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(categories))
}

#[derive(Debug, Deserialize)]
pub struct HighlightParams {
    pub limit: Option<i64>,
}

/// Products ranked by units sold across completed, paid orders. Falls back
/// to the newest stocked products while the shop has no sales history.
pub async fn bestsellers(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<HighlightParams>,
) -> Result<Json<Vec<ProductView>>> {
    let limit = params.limit.unwrap_or(6).clamp(1, 20);

    let mut products: Vec<Product> = sqlx::query_as(
        "SELECT p.* FROM products p \
         JOIN (SELECT oi.product_id, SUM(oi.quantity) AS total_sold \
               FROM order_items oi JOIN orders o ON o.id = oi.order_id \
               WHERE o.status = 'completed' AND o.payment_status = 'completed' \
               GROUP BY oi.product_id) s ON s.product_id = p.id \
         ORDER BY s.total_sold DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    if products.is_empty() {
        products = sqlx::query_as(
            "SELECT * FROM products WHERE initial_stock > 0 ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&state.db)
        .await?;
    }

    Ok(Json(project_page(&state, identity.role, &products).await?))
}

pub async fn new_arrivals(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<HighlightParams>,
) -> Result<Json<Vec<ProductView>>> {
    let limit = params.limit.unwrap_or(6).clamp(1, 20);
    let products: Vec<Product> =
        sqlx::query_as("SELECT * FROM products ORDER BY created_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(project_page(&state, identity.role, &products).await?))
}

pub(crate) async fn fetch_product(state: &AppState, id: Uuid) -> Result<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Product"))
}

async fn fetch_variants(state: &AppState, product_id: Uuid) -> Result<Vec<ProductVariant>> {
    Ok(sqlx::query_as(
        "SELECT * FROM product_variants WHERE product_id = $1 ORDER BY size, color NULLS FIRST",
    )
    .bind(product_id)
    .fetch_all(&state.db)
    .await?)
}

async fn replace_variants(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    rows: &[ConsolidatedVariant],
) -> Result<()> {
    sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut **tx)
        .await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO product_variants (id, product_id, color, size, quantity) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::now_v7())
        .bind(product_id)
        .bind(&row.color)
        .bind(&row.size)
        .bind(row.quantity)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Projects a page of products with two batched queries: one for variants,
/// one for ledger sums. Availability is computed once per product.
async fn project_page(
    state: &AppState,
    role: Role,
    products: &[Product],
) -> Result<Vec<ProductView>> {
    let strategy = ProjectionStrategy::for_role(role);
    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let sums = ledger::ordered_sums(&state.db, &ids).await?;

    let variants: Vec<ProductVariant> = if ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as(
            "SELECT * FROM product_variants WHERE product_id = ANY($1) \
             ORDER BY size, color NULLS FIRST",
        )
        .bind(&ids)
        .fetch_all(&state.db)
        .await?
    };
    let mut by_product: HashMap<Uuid, Vec<ProductVariant>> = HashMap::new();
    for variant in variants {
        by_product.entry(variant.product_id).or_default().push(variant);
    }

    Ok(products
        .iter()
        .map(|product| {
            let ordered = sums.get(&product.id).copied().unwrap_or(0);
            let variants = by_product.get(&product.id).map_or(&[][..], Vec::as_slice);
            strategy.project(product, variants, ordered)
        })
        .collect())
}
