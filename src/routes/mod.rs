//! HTTP surface.

use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::AppState;

pub mod comments;
pub mod logs;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(products::list_products).post(products::create_product))
        .route("/api/products/categories/list", get(products::list_categories))
        .route("/api/products/bestsellers", get(products::bestsellers))
        .route("/api/products/new-arrivals", get(products::new_arrivals))
        .route(
            "/api/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route(
            "/api/products/:id/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/api/comments/:id", delete(comments::delete_comment))
        .route(
            "/api/payments/create-checkout-session",
            post(payments::create_checkout_session),
        )
        .route("/api/payments/session/:id", get(payments::session_status))
        .route("/api/orders/webhook", post(orders::webhook))
        .route("/api/orders/my-orders", get(orders::my_orders))
        .route("/api/orders/admin/all", get(orders::admin_list_orders))
        .route("/api/orders/:id", get(orders::get_order))
        .route("/api/orders/:id/status", patch(orders::update_order_status))
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/api/logs/orders", get(logs::order_logs))
        .route("/api/logs/activity", get(logs::activity_logs))
}
