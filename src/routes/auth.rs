/// Authentication routes: registration, login, token refresh, and the
/// current-user endpoint.
///
/// Each handler is a stateless round trip over the persisted user state.
/// The refresh flow requires two independent proofs: an expired access
/// token we provably issued, and the refresh token currently stored for
/// that user. Neither is sufficient alone.

use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::auth::{
    check_session, decode_expired_token, generate_refresh_token, hash_password,
    issue_access_token, store_session, verify_password, Claims, Role, Subject,
};
use crate::configuration::JwtSettings;
use crate::email_client::EmailClient;
use crate::error::{AppError, AuthError, ValidationError};
use crate::routes::users::UserResponse;
use crate::validators::{is_valid_email, is_valid_username};

#[derive(serde::Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(serde::Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(serde::Deserialize)]
pub struct RefreshRequest {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(serde::Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

fn auth_response(access_token: String, refresh_token: String, config: &JwtSettings) -> AuthResponse {
    AuthResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: config.access_token_expiry_minutes * 60,
    }
}

/// Mint a token pair and persist the rotated refresh session.
async fn issue_token_pair(
    pool: &PgPool,
    user_id: i32,
    email: &str,
    role: Role,
    config: &JwtSettings,
) -> Result<(String, String), AppError> {
    let access_token = issue_access_token(user_id, email, role, config)?;
    let refresh_token = generate_refresh_token();
    store_session(pool, user_id, &refresh_token, config.refresh_token_expiry_days).await?;
    Ok((access_token, refresh_token))
}

/// POST /auth/register
///
/// Creates a user and returns a fresh token pair. Email and username
/// uniqueness are both checked here, with the same policy and wording as
/// the admin create path.
pub async fn register(
    form: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    email_client: web::Data<EmailClient>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    let username = is_valid_username(&form.username)?;
    let password_hash = hash_password(&form.password)?;

    let email_taken = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool.get_ref())
        .await?;
    if email_taken.is_some() {
        return Err(AppError::Conflict("email is already registered".to_string()));
    }

    let username_taken = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE username = $1")
        .bind(&username)
        .fetch_optional(pool.get_ref())
        .await?;
    if username_taken.is_some() {
        return Err(AppError::Conflict("username is already taken".to_string()));
    }

    let user_id = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO users (email, username, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(&email)
    .bind(&username)
    .bind(&password_hash)
    .bind(form.role.as_str())
    .fetch_one(pool.get_ref())
    .await?;

    let (access_token, refresh_token) =
        issue_token_pair(pool.get_ref(), user_id, &email, form.role, jwt_config.get_ref()).await?;

    // Best effort; a broken mail gateway must not fail registration.
    if let Err(e) = email_client.send_welcome_email(&email, &username).await {
        tracing::warn!(user_id = user_id, error = %e, "failed to send welcome email");
    }

    tracing::info!(user_id = user_id, "user registered");

    Ok(HttpResponse::Created().json(auth_response(
        access_token,
        refresh_token,
        jwt_config.get_ref(),
    )))
}

/// POST /auth/login
///
/// Unknown email and wrong password produce the identical error kind and
/// message, so callers cannot probe which accounts exist.
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    if form.email.trim().is_empty() {
        return Err(ValidationError::EmptyField("email").into());
    }
    if form.password.is_empty() {
        return Err(ValidationError::EmptyField("password").into());
    }

    let user = sqlx::query_as::<_, (i32, String, String, String)>(
        "SELECT id, email, password_hash, role FROM users WHERE email = $1",
    )
    .bind(form.email.trim())
    .fetch_optional(pool.get_ref())
    .await?;

    let (user_id, email, password_hash, role) = match user {
        Some(row) => row,
        None => return Err(AuthError::InvalidCredentials.into()),
    };

    if !verify_password(&form.password, &password_hash)? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let role = role.parse::<Role>().map_err(AppError::Internal)?;

    let (access_token, refresh_token) =
        issue_token_pair(pool.get_ref(), user_id, &email, role, jwt_config.get_ref()).await?;

    tracing::info!(user_id = user_id, "user logged in");

    Ok(HttpResponse::Ok().json(auth_response(
        access_token,
        refresh_token,
        jwt_config.get_ref(),
    )))
}

/// POST /auth/refresh
///
/// Strict one-time-use rotation: the stored refresh token is overwritten
/// on success, so the presented value can mint at most one successor, and
/// reuse after rotation fails as an invalid session.
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let claims = decode_expired_token(&form.access_token, jwt_config.get_ref())?;
    let subject = claims.subject()?;

    let user = load_user_by_subject(pool.get_ref(), &subject).await?;
    let user = user.ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    check_session(
        user.refresh_token_hash.as_deref(),
        user.refresh_token_expires_at,
        &form.refresh_token,
    )?;

    let role = user.role.parse::<Role>().map_err(AppError::Internal)?;

    let (access_token, refresh_token) = issue_token_pair(
        pool.get_ref(),
        user.id,
        &user.email,
        role,
        jwt_config.get_ref(),
    )
    .await?;

    tracing::info!(user_id = user.id, "token pair rotated");

    Ok(HttpResponse::Ok().json(auth_response(
        access_token,
        refresh_token,
        jwt_config.get_ref(),
    )))
}

/// GET /api/me
///
/// Current user, derived from the claims the middleware verified for
/// this request.
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let subject = claims.subject()?;

    let user = load_user_by_subject(pool.get_ref(), &subject)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    let role = user.role.parse::<Role>().map_err(AppError::Internal)?;

    Ok(HttpResponse::Ok().json(UserResponse {
        id: user.id,
        email: user.email,
        username: user.username,
        role,
    }))
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    username: String,
    role: String,
    refresh_token_hash: Option<String>,
    refresh_token_expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

async fn load_user_by_subject(
    pool: &PgPool,
    subject: &Subject,
) -> Result<Option<UserRow>, AppError> {
    let row = match subject {
        Subject::ById(id) => {
            sqlx::query_as::<_, UserRow>(
                "SELECT id, email, username, role, refresh_token_hash, refresh_token_expires_at
                 FROM users WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await?
        }
        Subject::ByEmail(email) => {
            sqlx::query_as::<_, UserRow>(
                "SELECT id, email, username, role, refresh_token_hash, refresh_token_expires_at
                 FROM users WHERE email = $1",
            )
            .bind(email)
            .fetch_optional(pool)
            .await?
        }
    };

    Ok(row)
}
