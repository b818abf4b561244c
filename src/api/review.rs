use crate::db::queries::review::{
    create_review, delete_review, get_product_reviews, get_review, get_user_reviews,
    mark_review_helpful, update_review,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;

/// Review endpoints that work without authentication. A bearer token, when
/// present, personalizes the `isHelpful` flags.
pub fn public_review_routes() -> Router<PgPool> {
    Router::new()
        .route("/product-reviews/{product_id}", get(get_product_reviews))
        .route("/reviews/{id}", get(get_review))
}

/// Review endpoints behind the JWT layer.
pub fn review_routes() -> Router<PgPool> {
    Router::new()
        .route("/product-reviews/{product_id}", post(create_review))
        .route("/reviews/{id}", put(update_review).delete(delete_review))
        .route("/reviews/{id}/helpful", post(mark_review_helpful))
        .route("/user-reviews", get(get_user_reviews))
}
