use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::error;

use crate::api::auth::Claims;
use crate::utils::api_response::ApiResponse;

/// ✅ Resolved-user cache using `moka`
pub type UserCache = Arc<Cache<i32, CurrentUser>>;

/// ✅ Initialize the `moka` cache
pub fn create_user_cache() -> UserCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // ✅ TTL = 10 minutes
            .build(),
    )
}

/// ✅ **JWT Middleware** (Handles Token Authentication)
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    let auth_header = req.headers().get(header::AUTHORIZATION).ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
            .into_response()
    })?;

    let token_str = auth_header.to_str().map_err(|_| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid Authorization header format",
            None,
        )
        .into_response()
    })?;

    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    let claims = Claims::decode(token).map_err(|e| {
        tracing::warn!("JWT decoding failed: {e}");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Invalid or expired token", None)
            .into_response()
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Caller identity as stored, refreshed through the cache. Role checks use
/// this row rather than the token so revoked accounts drop out within the
/// cache TTL.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct CurrentUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// ✅ Resolves the authenticated user's database row, cache-first.
pub async fn current_user_middleware(
    State(db_pool): State<PgPool>,
    Extension(user_cache): Extension<UserCache>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing JWT claims in request", None)
            .into_response()
    })?;

    let user_id = claims.user_id().map_err(IntoResponse::into_response)?;

    // ✅ Check cache first before querying DB
    if let Some(cached) = user_cache.get(&user_id) {
        req.extensions_mut().insert(cached);
        return Ok(next.run(req).await);
    }

    let user = sqlx::query_as::<_, CurrentUser>(
        "SELECT id, name, email, avatar, role FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&db_pool)
    .await
    .map_err(|e| {
        error!("Failed to load user {user_id}: {e}");
        ApiResponse::<()>::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load user", None)
            .into_response()
    })?
    .ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Account no longer exists", None)
            .into_response()
    })?;

    user_cache.insert(user_id, user.clone());
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Claims extracted from the Authorization header when one is present and
/// valid; `None` otherwise. Public endpoints use this to personalize
/// responses without requiring login; a bad token degrades to anonymous.
pub struct OptionalClaims(pub Option<Claims>);

impl OptionalClaims {
    pub fn user_id(&self) -> Option<i32> {
        self.0.as_ref().and_then(|c| c.sub.parse().ok())
    }
}

impl<S> FromRequestParts<S> for OptionalClaims
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| Claims::decode(token).ok());
        Ok(OptionalClaims(claims))
    }
}
