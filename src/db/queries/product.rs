use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool, QueryBuilder};
use tracing::info;
use utoipa::ToSchema;

use crate::db::models::product::{
    NewProduct, Product, ProductDetail, ProductFilterParams, ProductSort, ProductSummary,
    Specification, UpdateProduct,
};
use crate::middleware::auth::{CurrentUser, OptionalClaims};
use crate::utils::api_response::ApiResponse;
use crate::utils::pagination::{PageParams, Pagination};
use crate::utils::slug::create_slug;

const PRODUCT_COLUMNS: &str = "id, name, slug, description, price, category_id, user_id, \
                               rating, review_count, created_at, updated_at";

fn db_error(e: impl std::fmt::Display) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database error",
        Some(json!({ "db_error": e.to_string() })),
    )
}

/// Appends `-2`, `-3`, … until the slug is free in the products table.
async fn unique_product_slug(conn: &mut PgConnection, base: &str) -> Result<String, sqlx::Error> {
    let mut candidate = base.to_string();
    let mut suffix = 2;
    loop {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE slug = $1)",
        )
        .bind(&candidate)
        .fetch_one(&mut *conn)
        .await?;
        if !taken {
            return Ok(candidate);
        }
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
}

/// Loads the child rows and caller flags for a product detail payload.
async fn load_product_detail(
    pool: &PgPool,
    product: Product,
    caller_id: Option<i32>,
) -> Result<ProductDetail, sqlx::Error> {
    let category_name =
        sqlx::query_scalar::<_, String>("SELECT name FROM categories WHERE id = $1")
            .bind(product.category_id)
            .fetch_one(pool)
            .await?;

    let specifications = sqlx::query_as::<_, Specification>(
        "SELECT name, value FROM product_specifications WHERE product_id = $1 ORDER BY sort_order, id",
    )
    .bind(product.id)
    .fetch_all(pool)
    .await?;

    let images = sqlx::query_scalar::<_, String>(
        "SELECT image_path FROM product_images WHERE product_id = $1 ORDER BY is_primary DESC, sort_order ASC",
    )
    .bind(product.id)
    .fetch_all(pool)
    .await?;

    // Anonymous callers bind NULL, which makes both EXISTS checks false.
    let is_bookmarked = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM bookmarks WHERE product_id = $1 AND user_id = $2)",
    )
    .bind(product.id)
    .bind(caller_id)
    .fetch_one(pool)
    .await?;

    let is_reviewed = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM reviews WHERE product_id = $1 AND user_id = $2)",
    )
    .bind(product.id)
    .bind(caller_id)
    .fetch_one(pool)
    .await?;

    Ok(ProductDetail {
        product,
        category_name,
        specifications,
        images,
        is_bookmarked,
        is_reviewed,
    })
}

#[derive(Serialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<ProductSummary>,
    pub pagination: Pagination,
}

/// Catalog listing with category filter, name search and sorting.
#[utoipa::path(
    get,
    path = "/products",
    tag = "Products",
    params(ProductFilterParams),
    responses(
        (status = 200, description = "Products retrieved successfully", body = ProductListResponse),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn list_products(
    State(db_pool): State<PgPool>,
    Query(params): Query<ProductFilterParams>,
) -> Result<ApiResponse<ProductListResponse>, ApiResponse<()>> {
    let page_params = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let (page, limit) = page_params.clamp();
    let sort = ProductSort::from_param(params.sort.as_deref());

    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM products p WHERE 1=1");
    if let Some(category) = params.category {
        count_query.push(" AND p.category_id = ").push_bind(category);
    }
    if let Some(search) = &params.search {
        count_query
            .push(" AND p.name ILIKE ")
            .push_bind(format!("%{search}%"));
    }
    let total: i64 = count_query
        .build_query_scalar()
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;

    let pagination = Pagination::new(total, page, limit);
    if total == 0 {
        return Ok(ApiResponse::success(
            StatusCode::OK,
            "Products retrieved successfully",
            ProductListResponse {
                products: Vec::new(),
                pagination,
            },
        ));
    }

    let mut list_query = QueryBuilder::new(
        r#"
        SELECT p.id, p.name, p.slug, p.price, p.rating, p.review_count,
               p.category_id, c.name AS category_name,
               (SELECT pi.image_path FROM product_images pi
                 WHERE pi.product_id = p.id
                 ORDER BY pi.is_primary DESC, pi.sort_order ASC
                 LIMIT 1) AS image
          FROM products p
          JOIN categories c ON c.id = p.category_id
         WHERE 1=1
        "#,
    );
    if let Some(category) = params.category {
        list_query.push(" AND p.category_id = ").push_bind(category);
    }
    if let Some(search) = &params.search {
        list_query
            .push(" AND p.name ILIKE ")
            .push_bind(format!("%{search}%"));
    }
    list_query
        .push(" ORDER BY ")
        .push(sort.order_clause())
        .push(" LIMIT ")
        .push_bind(limit as i64)
        .push(" OFFSET ")
        .push_bind(page_params.offset());

    let products = list_query
        .build_query_as::<ProductSummary>()
        .fetch_all(&db_pool)
        .await
        .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Products retrieved successfully",
        ProductListResponse {
            products,
            pagination,
        },
    ))
}

/// Retrieves a single product by ID.
#[utoipa::path(
    get,
    path = "/products/{product_id}",
    tag = "Products",
    params(
        ("product_id" = i32, Path, description = "ID of the product to retrieve")
    ),
    responses(
        (status = 200, description = "Product retrieved successfully", body = ProductDetail),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn get_product(
    State(db_pool): State<PgPool>,
    claims: OptionalClaims,
    AxumPath(product_id): AxumPath<i32>,
) -> Result<ApiResponse<ProductDetail>, ApiResponse<()>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(product_id)
    .fetch_optional(&db_pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Product not found", None))?;

    let detail = load_product_detail(&db_pool, product, claims.user_id())
        .await
        .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Product retrieved successfully",
        detail,
    ))
}

/// Retrieves a single product by its slug.
#[utoipa::path(
    get,
    path = "/products/slug/{slug}",
    tag = "Products",
    params(
        ("slug" = String, Path, description = "Slug of the product to retrieve")
    ),
    responses(
        (status = 200, description = "Product retrieved successfully", body = ProductDetail),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn get_product_by_slug(
    State(db_pool): State<PgPool>,
    claims: OptionalClaims,
    AxumPath(slug): AxumPath<String>,
) -> Result<ApiResponse<ProductDetail>, ApiResponse<()>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1"
    ))
    .bind(&slug)
    .fetch_optional(&db_pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Product not found", None))?;

    let detail = load_product_detail(&db_pool, product, claims.user_id())
        .await
        .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Product retrieved successfully",
        detail,
    ))
}

/// Creates a product with its specifications and image paths (admin only).
#[utoipa::path(
    post,
    path = "/admin/products",
    tag = "Products",
    request_body = NewProduct,
    responses(
        (status = 201, description = "Product created successfully", body = i32),
        (status = 400, description = "Missing name or invalid price"),
        (status = 403, description = "Admin role required"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_product(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<NewProduct>,
) -> Result<ApiResponse<i32>, ApiResponse<()>> {
    if !current_user.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can create products",
            None,
        ));
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Product name is required",
            None,
        ));
    }
    if payload.price < bigdecimal::BigDecimal::from(0) {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Price must not be negative",
            None,
        ));
    }

    let mut tx = db_pool.begin().await.map_err(db_error)?;

    let slug = unique_product_slug(&mut tx, &create_slug(name))
        .await
        .map_err(db_error)?;

    let product_id = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO products (name, slug, description, price, category_id, user_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(&slug)
    .bind(payload.description.as_deref().unwrap_or(""))
    .bind(&payload.price)
    .bind(payload.category_id)
    .bind(current_user.id)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;

    for (i, spec) in payload.specifications.iter().flatten().enumerate() {
        sqlx::query(
            "INSERT INTO product_specifications (product_id, name, value, sort_order) VALUES ($1, $2, $3, $4)",
        )
        .bind(product_id)
        .bind(&spec.name)
        .bind(&spec.value)
        .bind(i as i32)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    }

    for (i, path) in payload.images.iter().flatten().enumerate() {
        sqlx::query(
            "INSERT INTO product_images (product_id, image_path, is_primary, sort_order) VALUES ($1, $2, $3, $4)",
        )
        .bind(product_id)
        .bind(path)
        .bind(i == 0)
        .bind(i as i32)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    }

    tx.commit().await.map_err(db_error)?;

    info!("✅ Product {product_id} ({slug}) created by user {}", current_user.id);
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Product created successfully",
        product_id,
    ))
}

/// Updates a product (admin or the product's creator).
#[utoipa::path(
    put,
    path = "/admin/products/{product_id}",
    tag = "Products",
    params(
        ("product_id" = i32, Path, description = "ID of the product to update")
    ),
    request_body = UpdateProduct,
    responses(
        (status = 200, description = "Product updated successfully"),
        (status = 400, description = "No fields provided for update"),
        (status = 403, description = "Not the creator and not an admin"),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_product(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    AxumPath(product_id): AxumPath<i32>,
    Json(payload): Json<UpdateProduct>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if payload.is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "No fields provided for update",
            None,
        ));
    }

    let owner_id = sqlx::query_scalar::<_, i32>("SELECT user_id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&db_pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Product not found", None)
        })?;

    if owner_id != current_user.id && !current_user.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You do not have permission to edit this product",
            None,
        ));
    }

    let mut tx = db_pool.begin().await.map_err(db_error)?;

    sqlx::query(
        r#"
        UPDATE products
           SET name = COALESCE($1, name),
               description = COALESCE($2, description),
               price = COALESCE($3, price),
               category_id = COALESCE($4, category_id),
               updated_at = NOW()
         WHERE id = $5
        "#,
    )
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.description.as_deref())
    .bind(payload.price.as_ref())
    .bind(payload.category_id)
    .bind(product_id)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    if let Some(specs) = &payload.specifications {
        sqlx::query("DELETE FROM product_specifications WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        for (i, spec) in specs.iter().enumerate() {
            sqlx::query(
                "INSERT INTO product_specifications (product_id, name, value, sort_order) VALUES ($1, $2, $3, $4)",
            )
            .bind(product_id)
            .bind(&spec.name)
            .bind(&spec.value)
            .bind(i as i32)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
    }

    if let Some(images) = &payload.images {
        sqlx::query("DELETE FROM product_images WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        for (i, path) in images.iter().enumerate() {
            sqlx::query(
                "INSERT INTO product_images (product_id, image_path, is_primary, sort_order) VALUES ($1, $2, $3, $4)",
            )
            .bind(product_id)
            .bind(path)
            .bind(i == 0)
            .bind(i as i32)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
    }

    tx.commit().await.map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Product updated successfully",
        (),
    ))
}

/// Deletes a product and, through FK cascades, its reviews, votes and
/// bookmarks (admin or the product's creator).
#[utoipa::path(
    delete,
    path = "/admin/products/{product_id}",
    tag = "Products",
    params(
        ("product_id" = i32, Path, description = "ID of the product to delete")
    ),
    responses(
        (status = 200, description = "Product deleted successfully"),
        (status = 403, description = "Not the creator and not an admin"),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_product(
    State(db_pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    AxumPath(product_id): AxumPath<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let owner_id = sqlx::query_scalar::<_, i32>("SELECT user_id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&db_pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Product not found", None)
        })?;

    if owner_id != current_user.id && !current_user.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You do not have permission to delete this product",
            None,
        ));
    }

    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(product_id)
        .execute(&db_pool)
        .await
        .map_err(db_error)?;

    info!("🗑️ Product {product_id} deleted by user {}", current_user.id);
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Product deleted successfully",
        (),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_products,
        get_product,
        get_product_by_slug,
        create_product,
        update_product,
        delete_product
    ),
    components(schemas(
        Product,
        ProductSummary,
        ProductDetail,
        NewProduct,
        UpdateProduct,
        Specification,
        ProductListResponse
    )),
    tags(
        (name = "Products", description = "Product Catalog Endpoints")
    )
)]
pub struct ProductDoc;
