use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    Extension,
};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use utoipa::{OpenApi, ToSchema};

use crate::db::error::is_unique_violation;
use crate::db::models::bookmark::BookmarkToggle;
use crate::db::models::product::ProductSummary;
use crate::middleware::auth::CurrentUser;
use crate::utils::api_response::ApiResponse;
use crate::utils::pagination::{PageParams, Pagination};

fn db_error(e: impl std::fmt::Display) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database error",
        Some(json!({ "db_error": e.to_string() })),
    )
}

/// Toggles a bookmark on a product for the calling user.
#[utoipa::path(
    post,
    path = "/products/{product_id}/bookmark",
    tag = "Bookmarks",
    params(
        ("product_id" = i32, Path, description = "Product to bookmark or unbookmark")
    ),
    responses(
        (status = 200, description = "Bookmark toggled", body = BookmarkToggle),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn toggle_bookmark(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    AxumPath(product_id): AxumPath<i32>,
) -> Result<ApiResponse<BookmarkToggle>, ApiResponse<()>> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
        .bind(product_id)
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;
    if !exists {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Product not found",
            None,
        ));
    }

    let removed = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND product_id = $2")
        .bind(current_user.id)
        .bind(product_id)
        .execute(&db_pool)
        .await
        .map_err(db_error)?;

    let bookmarked = if removed.rows_affected() > 0 {
        false
    } else {
        let inserted = sqlx::query("INSERT INTO bookmarks (user_id, product_id) VALUES ($1, $2)")
            .bind(current_user.id)
            .bind(product_id)
            .execute(&db_pool)
            .await;
        match inserted {
            Ok(_) => true,
            // A concurrent toggle beat us to the insert; the bookmark exists.
            Err(ref e) if is_unique_violation(e) => true,
            Err(e) => return Err(db_error(e)),
        }
    };

    Ok(ApiResponse::success(
        StatusCode::OK,
        if bookmarked {
            "Product bookmarked"
        } else {
            "Bookmark removed"
        },
        BookmarkToggle {
            product_id,
            bookmarked,
        },
    ))
}

#[derive(Serialize, ToSchema)]
pub struct BookmarkListResponse {
    pub products: Vec<ProductSummary>,
    pub pagination: Pagination,
}

/// The calling user's bookmarked products, newest bookmark first.
#[utoipa::path(
    get,
    path = "/bookmarks",
    tag = "Bookmarks",
    params(PageParams),
    responses(
        (status = 200, description = "Bookmarks retrieved successfully", body = BookmarkListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_bookmarks(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    Query(params): Query<PageParams>,
) -> Result<ApiResponse<BookmarkListResponse>, ApiResponse<()>> {
    let (page, limit) = params.clamp();

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookmarks WHERE user_id = $1")
        .bind(current_user.id)
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;

    let products = sqlx::query_as::<_, ProductSummary>(
        r#"
        SELECT p.id, p.name, p.slug, p.price, p.rating, p.review_count,
               p.category_id, c.name AS category_name,
               (SELECT pi.image_path FROM product_images pi
                 WHERE pi.product_id = p.id
                 ORDER BY pi.is_primary DESC, pi.sort_order ASC
                 LIMIT 1) AS image
          FROM bookmarks b
          JOIN products p ON p.id = b.product_id
          JOIN categories c ON c.id = p.category_id
         WHERE b.user_id = $1
         ORDER BY b.created_at DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(current_user.id)
    .bind(limit as i64)
    .bind(params.offset())
    .fetch_all(&db_pool)
    .await
    .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Bookmarks retrieved successfully",
        BookmarkListResponse {
            products,
            pagination: Pagination::new(total, page, limit),
        },
    ))
}

#[derive(OpenApi)]
#[openapi(
    paths(toggle_bookmark, get_bookmarks),
    components(schemas(BookmarkToggle, BookmarkListResponse)),
    tags(
        (name = "Bookmarks", description = "Bookmark Endpoints")
    )
)]
pub struct BookmarkDoc;
