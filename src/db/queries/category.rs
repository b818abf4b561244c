use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::db::error::is_unique_violation;
use crate::db::models::category::{Category, NewCategory, UpdateCategory};
use crate::middleware::auth::CurrentUser;
use crate::utils::api_response::ApiResponse;
use crate::utils::pagination::{PageParams, Pagination};
use crate::utils::slug::create_slug;

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
            "Only admins can manage categories",
            None,
        ))
    }
}

#[derive(Serialize, Deserialize, Debug, IntoParams)]
pub struct CategoryListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
    pub pagination: Pagination,
}

/// Lists categories alphabetically, optionally filtered by name.
#[utoipa::path(
    get,
    path = "/categories",
    tag = "Categories",
    params(CategoryListParams),
    responses(
        (status = 200, description = "Categories retrieved successfully", body = CategoryListResponse),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn list_categories(
    State(db_pool): State<PgPool>,
    Query(params): Query<CategoryListParams>,
) -> Result<ApiResponse<CategoryListResponse>, ApiResponse<()>> {
    let page_params = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let (page, limit) = page_params.clamp();

    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM categories WHERE 1=1");
    if let Some(search) = &params.search {
        count_query
            .push(" AND name ILIKE ")
            .push_bind(format!("%{search}%"));
    }
    let total: i64 = count_query
        .build_query_scalar()
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;

    let mut list_query = QueryBuilder::new(
        "SELECT id, name, slug, parent_id, created_at, updated_at FROM categories WHERE 1=1",
    );
    if let Some(search) = &params.search {
        list_query
            .push(" AND name ILIKE ")
            .push_bind(format!("%{search}%"));
    }
    list_query
        .push(" ORDER BY name ASC LIMIT ")
        .push_bind(limit as i64)
        .push(" OFFSET ")
        .push_bind(page_params.offset());

    let categories = list_query
        .build_query_as::<Category>()
        .fetch_all(&db_pool)
        .await
        .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Categories retrieved successfully",
        CategoryListResponse {
            categories,
            pagination: Pagination::new(total, page, limit),
        },
    ))
}

/// Retrieves a single category by ID.
#[utoipa::path(
    get,
    path = "/categories/{category_id}",
    tag = "Categories",
    params(
        ("category_id" = i32, Path, description = "ID of the category to retrieve")
    ),
    responses(
        (status = 200, description = "Category retrieved successfully", body = Category),
        (status = 404, description = "Category not found"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn get_category(
    State(db_pool): State<PgPool>,
    AxumPath(category_id): AxumPath<i32>,
) -> Result<ApiResponse<Category>, ApiResponse<()>> {
    let category = sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, parent_id, created_at, updated_at FROM categories WHERE id = $1",
    )
    .bind(category_id)
    .fetch_optional(&db_pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Category not found", None))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Category retrieved successfully",
        category,
    ))
}

/// Creates a category with a generated slug (admin only).
#[utoipa::path(
    post,
    path = "/admin/categories",
    tag = "Categories",
    request_body = NewCategory,
    responses(
        (status = 201, description = "Category created successfully", body = Category),
        (status = 400, description = "Category name is required"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "Category already exists"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_category(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<NewCategory>,
) -> Result<ApiResponse<Category>, ApiResponse<()>> {
    admin_only(&current_user)?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Category name is required",
            None,
        ));
    }

    let category = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, slug, parent_id)
        VALUES ($1, $2, $3)
        RETURNING id, name, slug, parent_id, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(create_slug(name))
    .bind(payload.parent_id)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiResponse::<()>::error(StatusCode::CONFLICT, "Category already exists", None)
        } else {
            db_error(e)
        }
    })?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Category created successfully",
        category,
    ))
}

/// Renames a category; the slug is regenerated from the new name (admin only).
#[utoipa::path(
    put,
    path = "/admin/categories/{category_id}",
    tag = "Categories",
    params(
        ("category_id" = i32, Path, description = "ID of the category to update")
    ),
    request_body = UpdateCategory,
    responses(
        (status = 200, description = "Category updated successfully", body = Category),
        (status = 400, description = "Category name is required"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category already exists"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_category(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    AxumPath(category_id): AxumPath<i32>,
    Json(payload): Json<UpdateCategory>,
) -> Result<ApiResponse<Category>, ApiResponse<()>> {
    admin_only(&current_user)?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Category name is required",
            None,
        ));
    }

    let category = sqlx::query_as::<_, Category>(
        r#"
        UPDATE categories
           SET name = $1, slug = $2, updated_at = NOW()
         WHERE id = $3
        RETURNING id, name, slug, parent_id, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(create_slug(name))
    .bind(category_id)
    .fetch_optional(&db_pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiResponse::<()>::error(StatusCode::CONFLICT, "Category already exists", None)
        } else {
            db_error(e)
        }
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Category not found", None))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Category updated successfully",
        category,
    ))
}

/// Deletes a category. Refused while any product still references it.
#[utoipa::path(
    delete,
    path = "/admin/categories/{category_id}",
    tag = "Categories",
    params(
        ("category_id" = i32, Path, description = "ID of the category to delete")
    ),
    responses(
        (status = 200, description = "Category deleted successfully"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category still has products"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_category(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    AxumPath(category_id): AxumPath<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    admin_only(&current_user)?;

    let has_products = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM products WHERE category_id = $1)",
    )
    .bind(category_id)
    .fetch_one(&db_pool)
    .await
    .map_err(db_error)?;

    if has_products {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Category still has products and cannot be deleted",
            None,
        ));
    }

    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(&db_pool)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Category not found",
            None,
        ));
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Category deleted successfully",
        (),
    ))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_categories,
        get_category,
        create_category,
        update_category,
        delete_category
    ),
    components(schemas(Category, NewCategory, UpdateCategory, CategoryListResponse)),
    tags(
        (name = "Categories", description = "Category Management Endpoints")
    )
)]
pub struct CategoryDoc;
