use crate::db::queries::user::{delete_user, get_user, list_users, update_user};
use axum::{routing::get, Router};
use sqlx::PgPool;

/// User administration routes; every handler checks for the admin role.
pub fn user_routes() -> Router<PgPool> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route(
            "/admin/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}
