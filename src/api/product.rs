use crate::db::queries::product::{
    create_product, delete_product, get_product, get_product_by_slug, list_products,
    update_product,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;

/// Public catalog endpoints.
pub fn public_product_routes() -> Router<PgPool> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/products/slug/{slug}", get(get_product_by_slug))
}

/// Catalog management endpoints behind the JWT layer.
pub fn admin_product_routes() -> Router<PgPool> {
    Router::new()
        .route("/admin/products", post(create_product))
        .route(
            "/admin/products/{id}",
            put(update_product).delete(delete_product),
        )
}
