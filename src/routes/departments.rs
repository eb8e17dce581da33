/// Department administration routes. The whole surface is Admin-only.

use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::auth::Claims;
use crate::error::{AppError, ValidationError};
use crate::routes::require_admin;
use crate::validators::is_valid_name;

#[derive(serde::Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct UpdateDepartmentRequest {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(serde::Serialize, sqlx::FromRow)]
pub struct DepartmentResponse {
    pub id: i32,
    pub name: String,
    pub description: String,
}

async fn department_name_in_use(
    pool: &PgPool,
    name: &str,
    exclude_id: i32,
) -> Result<bool, AppError> {
    let existing =
        sqlx::query_scalar::<_, i32>("SELECT id FROM departments WHERE name = $1 AND id <> $2")
            .bind(name)
            .bind(exclude_id)
            .fetch_optional(pool)
            .await?;
    Ok(existing.is_some())
}

/// GET /api/departments
pub async fn list_departments(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;

    let departments = sqlx::query_as::<_, DepartmentResponse>(
        "SELECT id, name, description FROM departments ORDER BY id",
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(departments))
}

/// GET /api/departments/{id}
pub async fn get_department_by_id(
    claims: web::ReqData<Claims>,
    path: web::Path<i32>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;
    let id = path.into_inner();

    let department = sqlx::query_as::<_, DepartmentResponse>(
        "SELECT id, name, description FROM departments WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound(format!("department {} not found", id)))?;

    Ok(HttpResponse::Ok().json(department))
}

/// GET /api/departments/name/{name}
pub async fn get_department_by_name(
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;
    let name = path.into_inner();

    if name.trim().is_empty() {
        return Err(ValidationError::EmptyField("name").into());
    }

    let department = sqlx::query_as::<_, DepartmentResponse>(
        "SELECT id, name, description FROM departments WHERE name = $1",
    )
    .bind(name.trim())
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound(format!("department '{}' not found", name.trim())))?;

    Ok(HttpResponse::Ok().json(department))
}

/// POST /api/departments
pub async fn create_department(
    claims: web::ReqData<Claims>,
    form: web::Json<CreateDepartmentRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;

    let name = is_valid_name(&form.name)?;
    let description = form.description.as_deref().unwrap_or("").trim().to_string();

    if department_name_in_use(pool.get_ref(), &name, 0).await? {
        return Err(AppError::Conflict(format!(
            "a department named '{}' already exists",
            name
        )));
    }

    let department = sqlx::query_as::<_, DepartmentResponse>(
        r#"
        INSERT INTO departments (name, description)
        VALUES ($1, $2)
        RETURNING id, name, description
        "#,
    )
    .bind(&name)
    .bind(&description)
    .fetch_one(pool.get_ref())
    .await?;

    tracing::info!(department_id = department.id, "department created");

    Ok(HttpResponse::Created().json(department))
}

/// PUT /api/departments/{id}
pub async fn update_department(
    claims: web::ReqData<Claims>,
    path: web::Path<i32>,
    form: web::Json<UpdateDepartmentRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;
    let id = path.into_inner();
    if id != form.id {
        return Err(ValidationError::InvalidFormat(
            "id in path does not match request body".to_string(),
        )
        .into());
    }

    let name = is_valid_name(&form.name)?;
    let description = form.description.as_deref().unwrap_or("").trim().to_string();

    if department_name_in_use(pool.get_ref(), &name, id).await? {
        return Err(AppError::Conflict(format!(
            "a department named '{}' already exists",
            name
        )));
    }

    let department = sqlx::query_as::<_, DepartmentResponse>(
        r#"
        UPDATE departments
        SET name = $1, description = $2
        WHERE id = $3
        RETURNING id, name, description
        "#,
    )
    .bind(&name)
    .bind(&description)
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound(format!("department {} not found", id)))?;

    tracing::info!(department_id = id, "department updated");

    Ok(HttpResponse::Ok().json(department))
}

/// DELETE /api/departments/{id}
///
/// Refused while employees are still assigned.
pub async fn delete_department(
    claims: web::ReqData<Claims>,
    path: web::Path<i32>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;
    let id = path.into_inner();

    let assigned =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE department_id = $1")
            .bind(id)
            .fetch_one(pool.get_ref())
            .await?;

    if assigned > 0 {
        return Err(AppError::Conflict(format!(
            "department has {} employee(s) assigned and cannot be deleted",
            assigned
        )));
    }

    let department = sqlx::query_as::<_, DepartmentResponse>(
        "DELETE FROM departments WHERE id = $1 RETURNING id, name, description",
    )
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound(format!("department {} not found", id)))?;

    tracing::info!(department_id = id, "department deleted");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "department deleted",
        "department": department,
    })))
}
