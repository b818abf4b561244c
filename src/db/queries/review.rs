use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use tracing::{error, info};
use utoipa::ToSchema;

use crate::db::error::StoreError;
use crate::db::models::review::{
    MarkHelpfulRequest, ReviewInput, ReviewListParams, ReviewResponse, ReviewRow, ReviewSort,
};
use crate::middleware::auth::{CurrentUser, OptionalClaims};
use crate::utils::api_response::ApiResponse;
use crate::utils::pagination::{PageParams, Pagination};

//
// STORE LAYER
//
// Every mutate-then-recompute sequence runs inside one transaction so the
// derived product aggregates can never be observed out of step with the
// review rows.
//

/// Recomputes `products.rating` and `products.review_count` from scratch.
/// The mean of an empty review set is NULL, which is exactly what a product
/// without reviews must report.
async fn recompute_product_rating(
    conn: &mut PgConnection,
    product_id: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE products
           SET rating = (SELECT AVG(rating) FROM reviews WHERE product_id = $1),
               review_count = (SELECT COUNT(*) FROM reviews WHERE product_id = $1),
               updated_at = NOW()
         WHERE id = $1
        "#,
    )
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Inserts a review and refreshes the product aggregates in one transaction.
/// The (product, author) uniqueness constraint is the authoritative
/// duplicate signal; the SELECT is only a fast path.
async fn insert_review(
    pool: &PgPool,
    product_id: i32,
    user_id: i32,
    rating: i32,
    content: &str,
) -> Result<i32, StoreError> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_scalar::<_, i32>(
        "SELECT id FROM reviews WHERE product_id = $1 AND user_id = $2",
    )
    .bind(product_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(StoreError::Duplicate);
    }

    let review_id = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO reviews (product_id, user_id, rating, content, helpful_count)
        VALUES ($1, $2, $3, $4, 0)
        RETURNING id
        "#,
    )
    .bind(product_id)
    .bind(user_id)
    .bind(rating)
    .bind(content)
    .fetch_one(&mut *tx)
    .await
    .map_err(StoreError::from_sqlx)?;

    recompute_product_rating(&mut tx, product_id).await?;
    tx.commit().await?;
    Ok(review_id)
}

/// Ownership-gated update: the row is looked up by (id, author) in one step,
/// so "not found" and "not yours" collapse into `NotFound` here. The service
/// layer distinguishes them with a prior existence check.
async fn update_review_row(
    pool: &PgPool,
    review_id: i32,
    requesting_user_id: i32,
    rating: i32,
    content: &str,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let product_id = sqlx::query_scalar::<_, i32>(
        "SELECT product_id FROM reviews WHERE id = $1 AND user_id = $2",
    )
    .bind(review_id)
    .bind(requesting_user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(StoreError::NotFound)?;

    sqlx::query("UPDATE reviews SET rating = $1, content = $2, updated_at = NOW() WHERE id = $3")
        .bind(rating)
        .bind(content)
        .bind(review_id)
        .execute(&mut *tx)
        .await?;

    recompute_product_rating(&mut tx, product_id).await?;
    tx.commit().await?;
    Ok(())
}

/// Ownership-gated delete; see `update_review_row`. Admin override happens in
/// the handler, which passes the review's real author id after its role check.
async fn delete_review_row(
    pool: &PgPool,
    review_id: i32,
    owner_id: i32,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let product_id = sqlx::query_scalar::<_, i32>(
        "SELECT product_id FROM reviews WHERE id = $1 AND user_id = $2",
    )
    .bind(review_id)
    .bind(owner_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(StoreError::NotFound)?;

    sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(review_id)
        .execute(&mut *tx)
        .await?;

    recompute_product_rating(&mut tx, product_id).await?;
    tx.commit().await?;
    Ok(())
}

/// Records or flips a helpful vote and recounts `helpful_count` as the number
/// of positive votes. A re-vote with the same flag is a no-op that still
/// recounts and returns the current value.
async fn mark_helpful(
    pool: &PgPool,
    review_id: i32,
    voter_id: i32,
    is_helpful: bool,
) -> Result<i32, StoreError> {
    let mut tx = pool.begin().await?;

    sqlx::query_scalar::<_, i32>("SELECT id FROM reviews WHERE id = $1")
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;

    let vote = sqlx::query_as::<_, (i32, bool)>(
        "SELECT id, is_helpful FROM review_helpful WHERE review_id = $1 AND user_id = $2",
    )
    .bind(review_id)
    .bind(voter_id)
    .fetch_optional(&mut *tx)
    .await?;

    match vote {
        Some((_, current)) if current == is_helpful => {
            // Same flag again: nothing to change, fall through to the recount.
        }
        Some((vote_id, _)) => {
            sqlx::query("UPDATE review_helpful SET is_helpful = $1, updated_at = NOW() WHERE id = $2")
                .bind(is_helpful)
                .bind(vote_id)
                .execute(&mut *tx)
                .await?;
        }
        None => {
            sqlx::query(
                "INSERT INTO review_helpful (review_id, user_id, is_helpful) VALUES ($1, $2, $3)",
            )
            .bind(review_id)
            .bind(voter_id)
            .bind(is_helpful)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        }
    }

    // Unconditional: only positive votes count, negative ones carry no weight.
    sqlx::query(
        r#"
        UPDATE reviews
           SET helpful_count = (SELECT COUNT(*) FROM review_helpful
                                 WHERE review_id = $1 AND is_helpful = TRUE)
         WHERE id = $1
        "#,
    )
    .bind(review_id)
    .execute(&mut *tx)
    .await?;

    let helpful_count =
        sqlx::query_scalar::<_, i32>("SELECT helpful_count FROM reviews WHERE id = $1")
            .bind(review_id)
            .fetch_one(&mut *tx)
            .await?;

    tx.commit().await?;
    Ok(helpful_count)
}

/// Single review lookup with the author summary joined in.
async fn fetch_review(pool: &PgPool, review_id: i32) -> Result<ReviewRow, StoreError> {
    sqlx::query_as::<_, ReviewRow>(
        r#"
        SELECT r.id, r.product_id, r.user_id, r.rating, r.content, r.helpful_count,
               r.created_at, r.updated_at,
               u.name AS user_name, u.avatar AS user_avatar,
               FALSE AS is_helpful
          FROM reviews r
          JOIN users u ON u.id = r.user_id
         WHERE r.id = $1
        "#,
    )
    .bind(review_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

fn db_error(e: impl std::fmt::Display) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database error",
        Some(json!({ "db_error": e.to_string() })),
    )
}

//
// API HANDLERS
//

#[derive(Serialize, ToSchema)]
pub struct ReviewListResponse {
    pub reviews: Vec<ReviewResponse>,
    pub pagination: Pagination,
}

/// Paginated reviews for a product, newest first by default. Works for
/// anonymous callers; with a valid bearer token each review also reports
/// whether the caller marked it helpful.
#[utoipa::path(
    get,
    path = "/product-reviews/{product_id}",
    tag = "Reviews",
    params(
        ("product_id" = i32, Path, description = "Product whose reviews are listed"),
        ReviewListParams
    ),
    responses(
        (status = 200, description = "Reviews retrieved successfully", body = ReviewListResponse),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn get_product_reviews(
    State(db_pool): State<PgPool>,
    claims: OptionalClaims,
    AxumPath(product_id): AxumPath<i32>,
    Query(params): Query<ReviewListParams>,
) -> Result<ApiResponse<ReviewListResponse>, ApiResponse<()>> {
    let page_params = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let (page, limit) = page_params.clamp();
    let sort = ReviewSort::from_param(params.sort.as_deref());
    let caller_id = claims.user_id();

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;

    let pagination = Pagination::new(total, page, limit);
    if total == 0 {
        return Ok(ApiResponse::success(
            StatusCode::OK,
            "Reviews retrieved successfully",
            ReviewListResponse {
                reviews: Vec::new(),
                pagination,
            },
        ));
    }

    let query = format!(
        r#"
        SELECT r.id, r.product_id, r.user_id, r.rating, r.content, r.helpful_count,
               r.created_at, r.updated_at,
               u.name AS user_name, u.avatar AS user_avatar,
               COALESCE(rh.is_helpful, FALSE) AS is_helpful
          FROM reviews r
          JOIN users u ON u.id = r.user_id
          LEFT JOIN review_helpful rh ON rh.review_id = r.id AND rh.user_id = $2
         WHERE r.product_id = $1
         ORDER BY {}
         LIMIT $3 OFFSET $4
        "#,
        sort.order_clause()
    );

    let rows = sqlx::query_as::<_, ReviewRow>(&query)
        .bind(product_id)
        .bind(caller_id)
        .bind(limit as i64)
        .bind(page_params.offset())
        .fetch_all(&db_pool)
        .await
        .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Reviews retrieved successfully",
        ReviewListResponse {
            reviews: rows.into_iter().map(ReviewResponse::from).collect(),
            pagination,
        },
    ))
}

/// Submits a review for a product. One review per (product, author).
#[utoipa::path(
    post,
    path = "/product-reviews/{product_id}",
    tag = "Reviews",
    params(
        ("product_id" = i32, Path, description = "Product being reviewed"),
    ),
    request_body = ReviewInput,
    responses(
        (status = 201, description = "Review created successfully"),
        (status = 400, description = "Missing fields or out-of-range rating"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Product already reviewed by this user"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_review(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    AxumPath(product_id): AxumPath<i32>,
    Json(payload): Json<ReviewInput>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let (rating, content) = payload
        .validate()
        .map_err(|msg| ApiResponse::<()>::error(StatusCode::BAD_REQUEST, msg, None))?;

    let review_id = insert_review(&db_pool, product_id, current_user.id, rating, content)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate => ApiResponse::<()>::error(
                StatusCode::CONFLICT,
                "You have already reviewed this product",
                None,
            ),
            other => {
                error!("Failed to create review for product {product_id}: {other}");
                db_error(other)
            }
        })?;

    info!(
        "✅ User {} reviewed product {} ({} stars)",
        current_user.id, product_id, rating
    );

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Your review has been submitted",
        json!({
            "id": review_id,
            "rating": rating,
            "content": content,
            "date": chrono::Utc::now().format("%d/%m/%Y").to_string(),
            "message": "Your review has been submitted",
        }),
    ))
}

/// Single review lookup with its author summary.
#[utoipa::path(
    get,
    path = "/reviews/{review_id}",
    tag = "Reviews",
    params(
        ("review_id" = i32, Path, description = "Id of the review being retrieved"),
    ),
    responses(
        (status = 200, description = "Review retrieved successfully", body = ReviewResponse),
        (status = 404, description = "Review not found"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn get_review(
    State(db_pool): State<PgPool>,
    AxumPath(review_id): AxumPath<i32>,
) -> Result<ApiResponse<ReviewResponse>, ApiResponse<()>> {
    let row = fetch_review(&db_pool, review_id).await.map_err(|e| match e {
        StoreError::NotFound => {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Review not found", None)
        }
        other => db_error(other),
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Review retrieved successfully",
        ReviewResponse::from(row),
    ))
}

/// Updates a review's rating/content. Only the author may update; the
/// product aggregates are refreshed in the same transaction.
#[utoipa::path(
    put,
    path = "/reviews/{review_id}",
    tag = "Reviews",
    params(
        ("review_id" = i32, Path, description = "ID of the review to be updated"),
    ),
    request_body = ReviewInput,
    responses(
        (status = 200, description = "Review updated successfully"),
        (status = 400, description = "Missing fields or out-of-range rating"),
        (status = 403, description = "Not the review's author"),
        (status = 404, description = "Review not found"),
        (status = 500, description = "Internal Server Error"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_review(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    AxumPath(review_id): AxumPath<i32>,
    Json(payload): Json<ReviewInput>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let (rating, content) = payload
        .validate()
        .map_err(|msg| ApiResponse::<()>::error(StatusCode::BAD_REQUEST, msg, None))?;

    // Existence first, so a wrong author gets 403 rather than 404.
    let existing = fetch_review(&db_pool, review_id).await.map_err(|e| match e {
        StoreError::NotFound => {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Review not found", None)
        }
        other => db_error(other),
    })?;

    if existing.user_id != current_user.id {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You do not have permission to update this review",
            None,
        ));
    }

    update_review_row(&db_pool, review_id, current_user.id, rating, content)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => {
                ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Review not found", None)
            }
            other => db_error(other),
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Review updated successfully",
        json!({ "id": review_id, "message": "Review updated successfully" }),
    ))
}

/// Deletes a review. The author may delete their own; an admin may delete
/// any. Product aggregates are refreshed in the same transaction.
#[utoipa::path(
    delete,
    path = "/reviews/{review_id}",
    tag = "Reviews",
    params(
        ("review_id" = i32, Path, description = "ID of the review to be deleted"),
    ),
    responses(
        (status = 200, description = "Review successfully deleted"),
        (status = 403, description = "Not the author and not an admin"),
        (status = 404, description = "Review not found"),
        (status = 500, description = "Internal Server Error"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_review(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    AxumPath(review_id): AxumPath<i32>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let existing = fetch_review(&db_pool, review_id).await.map_err(|e| match e {
        StoreError::NotFound => {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Review not found", None)
        }
        other => db_error(other),
    })?;

    if existing.user_id != current_user.id && !current_user.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You do not have permission to delete this review",
            None,
        ));
    }

    // The store checks literal ownership, so pass the review's author id
    // (for an admin this is another user's id).
    delete_review_row(&db_pool, review_id, existing.user_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => {
                ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Review not found", None)
            }
            other => db_error(other),
        })?;

    info!(
        "🗑️ Review {} deleted by user {} (admin: {})",
        review_id,
        current_user.id,
        current_user.is_admin()
    );

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Review deleted successfully",
        json!({ "message": "Review deleted successfully" }),
    ))
}

/// Marks a review helpful/unhelpful for the calling user. Voting the same
/// way twice is a no-op; switching flips the existing vote row.
#[utoipa::path(
    post,
    path = "/reviews/{review_id}/helpful",
    tag = "Reviews",
    params(
        ("review_id" = i32, Path, description = "ID of the review being voted on"),
    ),
    request_body = MarkHelpfulRequest,
    responses(
        (status = 200, description = "Vote recorded"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Review not found"),
        (status = 500, description = "Internal Server Error"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn mark_review_helpful(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    AxumPath(review_id): AxumPath<i32>,
    Json(payload): Json<MarkHelpfulRequest>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let helpful_count = mark_helpful(&db_pool, review_id, current_user.id, payload.is_helpful)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => {
                ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Review not found", None)
            }
            other => {
                error!("Failed to record helpful vote on review {review_id}: {other}");
                db_error(other)
            }
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Vote recorded",
        json!({
            "id": review_id,
            "helpfulCount": helpful_count,
            "isHelpful": payload.is_helpful,
        }),
    ))
}

/// The calling user's own reviews, paginated.
#[utoipa::path(
    get,
    path = "/user-reviews",
    tag = "Reviews",
    params(ReviewListParams),
    responses(
        (status = 200, description = "Reviews retrieved successfully", body = ReviewListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user_reviews(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    Query(params): Query<ReviewListParams>,
) -> Result<ApiResponse<ReviewListResponse>, ApiResponse<()>> {
    let page_params = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let (page, limit) = page_params.clamp();
    let sort = ReviewSort::from_param(params.sort.as_deref());

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE user_id = $1")
        .bind(current_user.id)
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;

    let pagination = Pagination::new(total, page, limit);
    if total == 0 {
        return Ok(ApiResponse::success(
            StatusCode::OK,
            "Reviews retrieved successfully",
            ReviewListResponse {
                reviews: Vec::new(),
                pagination,
            },
        ));
    }

    let query = format!(
        r#"
        SELECT r.id, r.product_id, r.user_id, r.rating, r.content, r.helpful_count,
               r.created_at, r.updated_at,
               u.name AS user_name, u.avatar AS user_avatar,
               FALSE AS is_helpful
          FROM reviews r
          JOIN users u ON u.id = r.user_id
         WHERE r.user_id = $1
         ORDER BY {}
         LIMIT $2 OFFSET $3
        "#,
        sort.order_clause()
    );

    let rows = sqlx::query_as::<_, ReviewRow>(&query)
        .bind(current_user.id)
        .bind(limit as i64)
        .bind(page_params.offset())
        .fetch_all(&db_pool)
        .await
        .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Reviews retrieved successfully",
        ReviewListResponse {
            reviews: rows.into_iter().map(ReviewResponse::from).collect(),
            pagination,
        },
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        get_product_reviews,
        create_review,
        get_review,
        update_review,
        delete_review,
        mark_review_helpful,
        get_user_reviews
    ),
    components(schemas(
        ReviewResponse,
        ReviewInput,
        MarkHelpfulRequest,
        ReviewListResponse
    )),
    tags(
        (name = "Reviews", description = "Review Management Endpoints")
    )
)]
pub struct ReviewDoc;
