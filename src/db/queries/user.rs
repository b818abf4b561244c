use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::db::error::is_unique_violation;
use crate::db::models::user::{UpdateUser, UserPublic};
use crate::middleware::auth::{CurrentUser, UserCache};
use crate::utils::api_response::ApiResponse;
use crate::utils::pagination::{PageParams, Pagination};

fn db_error(e: impl std::fmt::Display) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database error",
        Some(json!({ "db_error": e.to_string() })),
    )
}

fn admin_only(user: &CurrentUser) -> Result<(), ApiResponse<()>> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can manage users",
            None,
        ))
    }
}

#[derive(Serialize, Deserialize, Debug, IntoParams)]
pub struct UserListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserPublic>,
    pub pagination: Pagination,
}

/// Lists user accounts, optionally filtered by name or email (admin only).
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Users",
    params(UserListParams),
    responses(
        (status = 200, description = "Users retrieved successfully", body = UserListResponse),
        (status = 403, description = "Admin role required"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    Query(params): Query<UserListParams>,
) -> Result<ApiResponse<UserListResponse>, ApiResponse<()>> {
    admin_only(&current_user)?;

    let page_params = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let (page, limit) = page_params.clamp();

    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1=1");
    if let Some(search) = &params.search {
        let pattern = format!("%{search}%");
        count_query
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    let total: i64 = count_query
        .build_query_scalar()
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;

    let mut list_query = QueryBuilder::new(
        "SELECT id, name, email, avatar, role, created_at FROM users WHERE 1=1",
    );
    if let Some(search) = &params.search {
        let pattern = format!("%{search}%");
        list_query
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    list_query
        .push(" ORDER BY id LIMIT ")
        .push_bind(limit as i64)
        .push(" OFFSET ")
        .push_bind(page_params.offset());

    let users = list_query
        .build_query_as::<UserPublic>()
        .fetch_all(&db_pool)
        .await
        .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Users retrieved successfully",
        UserListResponse {
            users,
            pagination: Pagination::new(total, page, limit),
        },
    ))
}

/// Retrieves a single user account (admin only).
#[utoipa::path(
    get,
    path = "/admin/users/{user_id}",
    tag = "Users",
    params(
        ("user_id" = i32, Path, description = "ID of the user to retrieve")
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = UserPublic),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    AxumPath(user_id): AxumPath<i32>,
) -> Result<ApiResponse<UserPublic>, ApiResponse<()>> {
    admin_only(&current_user)?;

    let user = sqlx::query_as::<_, UserPublic>(
        "SELECT id, name, email, avatar, role, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&db_pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "User retrieved successfully",
        user,
    ))
}

/// Updates a user's name, email or role (admin only).
#[utoipa::path(
    put,
    path = "/admin/users/{user_id}",
    tag = "Users",
    params(
        ("user_id" = i32, Path, description = "ID of the user to update")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated successfully", body = UserPublic),
        (status = 400, description = "No fields provided or invalid role"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(user_cache): Extension<UserCache>,
    AxumPath(user_id): AxumPath<i32>,
    Json(payload): Json<UpdateUser>,
) -> Result<ApiResponse<UserPublic>, ApiResponse<()>> {
    admin_only(&current_user)?;

    if payload.is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "No fields provided for update",
            None,
        ));
    }
    if let Some(role) = &payload.role {
        if role != "admin" && role != "user" {
            return Err(ApiResponse::<()>::error(
                StatusCode::BAD_REQUEST,
                "Role must be 'admin' or 'user'",
                None,
            ));
        }
    }

    let user = sqlx::query_as::<_, UserPublic>(
        r#"
        UPDATE users
           SET name = COALESCE($1, name),
               email = COALESCE($2, email),
               role = COALESCE($3, role),
               updated_at = NOW()
         WHERE id = $4
        RETURNING id, name, email, avatar, role, created_at
        "#,
    )
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.email.as_deref().map(str::trim))
    .bind(payload.role.as_deref())
    .bind(user_id)
    .fetch_optional(&db_pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiResponse::<()>::error(StatusCode::CONFLICT, "Email already registered", None)
        } else {
            db_error(e)
        }
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None))?;

    // Role/name changes must be visible on the user's next request.
    user_cache.invalidate(&user_id);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "User updated successfully",
        user,
    ))
}

/// Deletes a user account and, through FK cascades, their reviews, votes and
/// bookmarks (admin only).
#[utoipa::path(
    delete,
    path = "/admin/users/{user_id}",
    tag = "Users",
    params(
        ("user_id" = i32, Path, description = "ID of the user to delete")
    ),
    responses(
        (status = 200, description = "User deleted successfully"),
        (status = 400, description = "Admins cannot delete their own account"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(user_cache): Extension<UserCache>,
    AxumPath(user_id): AxumPath<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    admin_only(&current_user)?;

    if user_id == current_user.id {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Admins cannot delete their own account",
            None,
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&db_pool)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "User not found",
            None,
        ));
    }

    user_cache.invalidate(&user_id);
    info!("🗑️ User {user_id} deleted by admin {}", current_user.id);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "User deleted successfully",
        (),
    ))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_users, get_user, update_user, delete_user),
    components(schemas(UserPublic, UpdateUser, UserListResponse)),
    tags(
        (name = "Users", description = "User Administration Endpoints")
    )
)]
pub struct UserDoc;
