use crate::db::queries::bookmark::{get_bookmarks, toggle_bookmark};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

pub fn bookmark_routes() -> Router<PgPool> {
    Router::new()
        .route("/bookmarks", get(get_bookmarks))
        .route("/products/{id}/bookmark", post(toggle_bookmark))
}
