use crate::db::queries::category::{
    create_category, delete_category, get_category, list_categories, update_category,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;

pub fn public_category_routes() -> Router<PgPool> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/{id}", get(get_category))
}

pub fn admin_category_routes() -> Router<PgPool> {
    Router::new()
        .route("/admin/categories", post(create_category))
        .route(
            "/admin/categories/{id}",
            put(update_category).delete(delete_category),
        )
}
