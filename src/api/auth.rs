use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::db::models::user::{User, UserProfile, UserPublic};
use crate::middleware::auth::{CurrentUser, UserCache};
use crate::utils::api_response::ApiResponse;

/// Token lifetime: 24 hours.
const TOKEN_TTL_SECS: i64 = 86_400;

/// JWT Claims used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - User ID as String
    pub sub: String,
    /// Email of the authenticated user.
    pub email: String,
    /// Role assigned to the user
    pub role: String,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

impl Claims {
    pub fn new(user_id: i32, email: &str, role: &str) -> Self {
        Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            exp: (chrono::Utc::now().timestamp() + TOKEN_TTL_SECS) as usize,
        }
    }

    pub fn sign_with(&self, secret: &[u8]) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::default(), self, &EncodingKey::from_secret(secret))
    }

    pub fn sign(&self) -> Result<String, jsonwebtoken::errors::Error> {
        self.sign_with(Config::get().jwt_secret.as_bytes())
    }

    pub fn decode_with(token: &str, secret: &[u8]) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &DecodingKey::from_secret(secret), &Validation::default())
            .map(|data| data.claims)
    }

    pub fn decode(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        Self::decode_with(token, Config::get().jwt_secret.as_bytes())
    }

    /// Converts `sub` (user ID) to `i32`, or returns a descriptive error.
    pub fn user_id(&self) -> Result<i32, ApiResponse<()>> {
        self.sub.parse::<i32>().map_err(|_| {
            ApiResponse::error(
                StatusCode::BAD_REQUEST,
                "Invalid user ID format in token",
                None,
            )
        })
    }
}

/// Represents a request to register a new user.
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Represents a request to log in.
#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login/registration payload.
#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserPublic,
}

fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() || email.trim().is_empty() {
        return Err("Name and email are required");
    }
    if !email.contains('@') {
        return Err("Invalid email address");
    }
    if password.len() < 6 {
        return Err("Password must be at least 6 characters");
    }
    Ok(())
}

/// Handles user registration.
///
/// # Returns
/// * `201 Created` - If registration is successful (auto-logged-in).
/// * `400 Bad Request` - If a field is missing or malformed.
/// * `409 Conflict` - If the email is already registered.
/// * `500 Internal Server Error` - If hashing or the database fails.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "Authentication",
    responses(
        (status = 201, description = "Successful registration", body = AuthResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<AuthResponse>, ApiResponse<()>> {
    validate_registration(&payload.name, &payload.email, &payload.password)
        .map_err(|msg| ApiResponse::<()>::error(StatusCode::BAD_REQUEST, msg, None))?;

    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let result = sqlx::query_as::<_, UserPublic>(
        r#"
        INSERT INTO users (name, email, password_hash, role)
        VALUES ($1, $2, $3, 'user')
        RETURNING id, name, email, avatar, role, created_at
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.email.trim())
    .bind(&password_hash)
    .fetch_one(&pool)
    .await;

    let user = match result {
        Ok(user) => user,
        Err(e) => {
            if crate::db::error::is_unique_violation(&e) {
                return Err(ApiResponse::<()>::error(
                    StatusCode::CONFLICT,
                    "Email already registered",
                    None,
                ));
            }
            return Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to register user",
                Some(json!({ "db_error": e.to_string() })),
            ));
        }
    };

    let token = Claims::new(user.id, &user.email, &user.role)
        .sign()
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Token generation failed",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    info!("✅ Registered new user: {}", user.email);
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "User registered successfully",
        AuthResponse { token, user },
    ))
}

/// Handles user login.
///
/// # Returns
/// * `200 OK` - Returns a JWT token if authentication is successful.
/// * `401 Unauthorized` - If credentials are incorrect.
/// * `500 Internal Server Error` - If a database or token generation error occurs.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Successful login", body = AuthResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn login(
    State(pool): State<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>, ApiResponse<()>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(payload.email.trim())
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    let Some(user) = user else {
        warn!("❌ Login attempt for unknown email: {}", payload.email);
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password",
            None,
        ));
    };

    match verify(&payload.password, &user.password_hash) {
        Ok(true) => {
            let token = Claims::new(user.id, &user.email, &user.role)
                .sign()
                .map_err(|e| {
                    ApiResponse::<()>::error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Token generation failed",
                        Some(json!({ "error": e.to_string() })),
                    )
                })?;
            info!("✅ Login successful for user: {}", user.email);
            Ok(ApiResponse::success(
                StatusCode::OK,
                "Login successful",
                AuthResponse {
                    token,
                    user: UserPublic::from(user),
                },
            ))
        }
        Ok(false) => {
            warn!("❌ Invalid password attempt for user: {}", payload.email);
            Err(ApiResponse::<()>::error(
                StatusCode::UNAUTHORIZED,
                "Invalid email or password",
                None,
            ))
        }
        Err(e) => Err(ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password verification error",
            Some(json!({ "error": e.to_string() })),
        )),
    }
}

/// Returns the authenticated caller's profile with activity counts.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "Profile retrieved", body = UserProfile),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(
    State(pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<ApiResponse<UserProfile>, ApiResponse<()>> {
    let user = sqlx::query_as::<_, UserPublic>(
        "SELECT id, name, email, avatar, role, created_at FROM users WHERE id = $1",
    )
    .bind(current_user.id)
    .fetch_one(&pool)
    .await
    .map_err(|_| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None))?;

    let review_count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE user_id = $1")
            .bind(current_user.id)
            .fetch_one(&pool)
            .await
            .unwrap_or(0);
    let bookmark_count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookmarks WHERE user_id = $1")
            .bind(current_user.id)
            .fetch_one(&pool)
            .await
            .unwrap_or(0);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Profile retrieved successfully",
        UserProfile {
            user,
            review_count,
            bookmark_count,
        },
    ))
}

/// Represents a request to change a user's password.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Handles a user password change request.
///
/// The user must provide their **current password** for verification.
#[utoipa::path(
    post,
    path = "/auth/change-password",
    tag = "Authentication",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated successfully"),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password incorrect"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn change_password(
    State(pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if payload.new_password.len() < 6 {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters",
            None,
        ));
    }

    let password_hash =
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(current_user.id)
            .fetch_one(&pool)
            .await
            .map_err(|_| {
                ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None)
            })?;

    let is_valid = verify(&payload.current_password, &password_hash).unwrap_or(false);
    if !is_valid {
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Incorrect current password",
            None,
        ));
    }

    let new_password_hash = hash(&payload.new_password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(&new_password_hash)
        .bind(current_user.id)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update password",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Password updated successfully",
        (),
    ))
}

/// Profile update; absent fields are left as-is.
#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[utoipa::path(
    put,
    path = "/auth/update-profile",
    tag = "Authentication",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserPublic),
        (status = 400, description = "No fields provided for update"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_profile(
    State(pool): State<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(user_cache): Extension<UserCache>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<ApiResponse<UserPublic>, ApiResponse<()>> {
    if payload.name.is_none() && payload.avatar.is_none() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "No fields provided for update",
            None,
        ));
    }

    let user = sqlx::query_as::<_, UserPublic>(
        r#"
        UPDATE users
           SET name = COALESCE($1, name),
               avatar = COALESCE($2, avatar),
               updated_at = NOW()
         WHERE id = $3
        RETURNING id, name, email, avatar, role, created_at
        "#,
    )
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.avatar.as_deref())
    .bind(current_user.id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update profile",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    // Drop the stale cached row so the next request sees the new profile.
    user_cache.invalidate(&current_user.id);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Profile updated successfully",
        user,
    ))
}

#[derive(Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Issues a one-hour password-reset token for the given email.
///
/// Always answers 200 so the endpoint cannot be used to probe which emails
/// are registered.
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "Authentication",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset token issued when the email exists"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn forgot_password(
    State(pool): State<PgPool>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    let user_id = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE email = $1")
        .bind(payload.email.trim())
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    let Some(user_id) = user_id else {
        return Ok(ApiResponse::success(
            StatusCode::OK,
            "If the email is registered, a reset token has been issued",
            json!({}),
        ));
    };

    let token = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO password_reset_tokens (user_id, token, expiry_date)
        VALUES ($1, $2, NOW() + INTERVAL '1 hour')
        "#,
    )
    .bind(user_id)
    .bind(&token)
    .execute(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create reset token",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "If the email is registered, a reset token has been issued",
        json!({ "resetToken": token }),
    ))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Consumes a reset token and sets a new password.
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    tag = "Authentication",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset successfully"),
        (status = 400, description = "Invalid or expired reset token"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn reset_password(
    State(pool): State<PgPool>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if payload.new_password.len() < 6 {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters",
            None,
        ));
    }

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database error",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    let user_id = sqlx::query_scalar::<_, i32>(
        "SELECT user_id FROM password_reset_tokens WHERE token = $1 AND expiry_date > NOW()",
    )
    .bind(&payload.token)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database error",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?
    .ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::BAD_REQUEST, "Invalid or expired reset token", None)
    })?;

    let new_password_hash = hash(&payload.new_password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(&new_password_hash)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to reset password",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    sqlx::query("DELETE FROM password_reset_tokens WHERE token = $1")
        .bind(&payload.token)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to consume reset token",
                Some(json!({ "db_error": e.to_string() })),
            )
        })?;

    tx.commit().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database error",
            Some(json!({ "db_error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Password reset successfully",
        (),
    ))
}

/// Registers the public authentication routes.
///
/// # Routes
/// - `POST /auth/register` → Register a new user.
/// - `POST /auth/login` → Authenticate and return a JWT token.
/// - `POST /auth/forgot-password` → Issue a password-reset token.
/// - `POST /auth/reset-password` → Redeem a reset token.
pub fn auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

/// Registers the **protected** authentication routes.
///
/// # Routes
/// - `GET /auth/me` → The caller's profile and activity counts.
/// - `POST /auth/change-password` → Change password (requires current one).
/// - `PUT /auth/update-profile` → Update display name / avatar.
pub fn secure_auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/change-password", post(change_password))
        .route("/auth/update-profile", put(update_profile))
}

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::Modify;
use utoipa::OpenApi;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        openapi.components = Some(components);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        register,
        login,
        me,
        change_password,
        update_profile,
        forgot_password,
        reset_password
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        AuthResponse,
        UserPublic,
        UserProfile,
        ChangePasswordRequest,
        UpdateProfileRequest,
        ForgotPasswordRequest,
        ResetPasswordRequest
    )),
    tags(
        (name = "Authentication", description = "User Auth Endpoints")
    ),
    modifiers(&SecurityAddon)
)]
pub struct AuthDoc;

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"unit-test-secret";

    #[test]
    fn token_round_trip_preserves_identity() {
        let claims = Claims::new(7, "alice@example.com", "user");
        let token = claims.sign_with(SECRET).unwrap();
        let decoded = Claims::decode_with(&token, SECRET).unwrap();
        assert_eq!(decoded.sub, "7");
        assert_eq!(decoded.email, "alice@example.com");
        assert_eq!(decoded.role, "user");
        assert_eq!(decoded.user_id().ok(), Some(7));
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = Claims::new(7, "alice@example.com", "user");
        // Well past the default validation leeway.
        claims.exp = (chrono::Utc::now().timestamp() - 600) as usize;
        let token = claims.sign_with(SECRET).unwrap();
        assert!(Claims::decode_with(&token, SECRET).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = Claims::new(7, "a@b.c", "user").sign_with(SECRET).unwrap();
        assert!(Claims::decode_with(&token, b"other-secret").is_err());
    }

    #[test]
    fn malformed_subject_is_an_error() {
        let claims = Claims {
            sub: "not-a-number".into(),
            email: "a@b.c".into(),
            role: "user".into(),
            exp: 0,
        };
        assert!(claims.user_id().is_err());
    }

    #[test]
    fn bcrypt_hash_verifies() {
        // Low cost keeps the test fast; production uses DEFAULT_COST.
        let hashed = hash("hunter42", 4).unwrap();
        assert!(verify("hunter42", &hashed).unwrap());
        assert!(!verify("hunter43", &hashed).unwrap());
    }

    #[test]
    fn registration_validation() {
        assert!(validate_registration("Alice", "alice@example.com", "secret1").is_ok());
        assert!(validate_registration("", "alice@example.com", "secret1").is_err());
        assert!(validate_registration("Alice", "not-an-email", "secret1").is_err());
        assert!(validate_registration("Alice", "alice@example.com", "short").is_err());
    }
}
