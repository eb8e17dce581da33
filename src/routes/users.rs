/// User administration routes.
///
/// Listing, lookup by email, create and delete are Admin-only; a
/// standard user may read and update their own record. Uniqueness checks
/// use the same policy and wording on every write path.

use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::auth::{hash_password, Claims, Role};
use crate::error::{AppError, ValidationError};
use crate::routes::{require_admin, require_self_or_admin};
use crate::validators::{is_valid_email, is_valid_username};

#[derive(serde::Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(serde::Deserialize)]
pub struct UpdateUserRequest {
    pub id: i32,
    pub email: String,
    pub username: String,
    /// When present and non-empty, the password is replaced.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(serde::Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub role: Role,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    username: String,
    role: String,
}

impl UserRow {
    fn into_response(self) -> Result<UserResponse, AppError> {
        let role = self.role.parse::<Role>().map_err(AppError::Internal)?;
        Ok(UserResponse {
            id: self.id,
            email: self.email,
            username: self.username,
            role,
        })
    }
}

const USER_COLUMNS: &str = "id, email, username, role";

async fn email_in_use(pool: &PgPool, email: &str, exclude_id: i32) -> Result<bool, AppError> {
    let existing = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE email = $1 AND id <> $2")
        .bind(email)
        .bind(exclude_id)
        .fetch_optional(pool)
        .await?;
    Ok(existing.is_some())
}

async fn username_in_use(pool: &PgPool, username: &str, exclude_id: i32) -> Result<bool, AppError> {
    let existing =
        sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE username = $1 AND id <> $2")
            .bind(username)
            .bind(exclude_id)
            .fetch_optional(pool)
            .await?;
    Ok(existing.is_some())
}

/// GET /api/users
pub async fn list_users(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;

    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users ORDER BY id",
        USER_COLUMNS
    ))
    .fetch_all(pool.get_ref())
    .await?;

    let users = rows
        .into_iter()
        .map(UserRow::into_response)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(users))
}

/// GET /api/users/{id}
pub async fn get_user_by_id(
    claims: web::ReqData<Claims>,
    path: web::Path<i32>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    require_self_or_admin(&claims, id)?;

    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))?;

    Ok(HttpResponse::Ok().json(row.into_response()?))
}

/// GET /api/users/email/{email}
pub async fn get_user_by_email(
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;
    let email = path.into_inner();

    if email.trim().is_empty() {
        return Err(ValidationError::EmptyField("email").into());
    }

    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE email = $1",
        USER_COLUMNS
    ))
    .bind(email.trim())
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    Ok(HttpResponse::Ok().json(row.into_response()?))
}

/// POST /api/users
pub async fn create_user(
    claims: web::ReqData<Claims>,
    form: web::Json<CreateUserRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;

    let email = is_valid_email(&form.email)?;
    let username = is_valid_username(&form.username)?;
    let password_hash = hash_password(&form.password)?;

    if email_in_use(pool.get_ref(), &email, 0).await? {
        return Err(AppError::Conflict("email is already registered".to_string()));
    }
    if username_in_use(pool.get_ref(), &username, 0).await? {
        return Err(AppError::Conflict("username is already taken".to_string()));
    }

    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        INSERT INTO users (email, username, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&email)
    .bind(&username)
    .bind(&password_hash)
    .bind(form.role.as_str())
    .fetch_one(pool.get_ref())
    .await?;

    tracing::info!(user_id = row.id, "user created");

    Ok(HttpResponse::Created().json(row.into_response()?))
}

/// PUT /api/users/{id}
///
/// Role changes require an Admin caller; a standard user's update keeps
/// the stored role regardless of the request body.
pub async fn update_user(
    claims: web::ReqData<Claims>,
    path: web::Path<i32>,
    form: web::Json<UpdateUserRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    if id != form.id {
        return Err(ValidationError::InvalidFormat(
            "id in path does not match request body".to_string(),
        )
        .into());
    }
    require_self_or_admin(&claims, id)?;

    let email = is_valid_email(&form.email)?;
    let username = is_valid_username(&form.username)?;

    let existing = sqlx::query_as::<_, (String, String, String, String)>(
        "SELECT email, username, password_hash, role FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))?;

    let (current_email, current_username, current_hash, current_role) = existing;

    if email != current_email && email_in_use(pool.get_ref(), &email, id).await? {
        return Err(AppError::Conflict("email is already registered".to_string()));
    }
    if username != current_username && username_in_use(pool.get_ref(), &username, id).await? {
        return Err(AppError::Conflict("username is already taken".to_string()));
    }

    let password_hash = match form.password.as_deref() {
        Some(password) if !password.is_empty() => hash_password(password)?,
        _ => current_hash,
    };

    let current_role = current_role.parse::<Role>().map_err(AppError::Internal)?;
    let role = if claims.role.is_admin() {
        form.role.unwrap_or(current_role)
    } else {
        current_role
    };

    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        UPDATE users
        SET email = $1, username = $2, password_hash = $3, role = $4
        WHERE id = $5
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&email)
    .bind(&username)
    .bind(&password_hash)
    .bind(role.as_str())
    .bind(id)
    .fetch_one(pool.get_ref())
    .await?;

    tracing::info!(user_id = id, "user updated");

    Ok(HttpResponse::Ok().json(row.into_response()?))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    claims: web::ReqData<Claims>,
    path: web::Path<i32>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;
    let id = path.into_inner();

    let row = sqlx::query_as::<_, UserRow>(&format!(
        "DELETE FROM users WHERE id = $1 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))?;

    tracing::info!(user_id = id, "user deleted");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "user deleted",
        "user": row.into_response()?,
    })))
}
