/// Employee record routes.
///
/// Listing, lookup by email, create and delete are Admin-only; a
/// standard user may read and update the employee record matching their
/// own id, and fetch it through /api/employees/me.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::Claims;
use crate::error::{AppError, AuthError, ValidationError};
use crate::routes::{require_admin, require_self_or_admin};
use crate::validators::{is_valid_email, is_valid_name};

const MIN_EMPLOYEE_AGE: i32 = 18;
const MAX_EMPLOYEE_AGE: i32 = 100;

/// Employment state, stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeState {
    Active,
    Inactive,
    OnLeave,
}

impl EmployeeState {
    fn as_str(&self) -> &'static str {
        match self {
            EmployeeState::Active => "Active",
            EmployeeState::Inactive => "Inactive",
            EmployeeState::OnLeave => "OnLeave",
        }
    }

    fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "Active" => Ok(EmployeeState::Active),
            "Inactive" => Ok(EmployeeState::Inactive),
            "OnLeave" => Ok(EmployeeState::OnLeave),
            other => Err(AppError::Internal(format!(
                "unknown employee state: {}",
                other
            ))),
        }
    }
}

impl Default for EmployeeState {
    fn default() -> Self {
        EmployeeState::Active
    }
}

#[derive(Deserialize)]
pub struct CreateEmployeeRequest {
    pub name: String,
    pub last_name: String,
    pub age: i32,
    pub doc_number: String,
    pub email: String,
    pub phone_number: String,
    #[serde(default)]
    pub state: EmployeeState,
    pub department_id: i32,
}

#[derive(Deserialize)]
pub struct UpdateEmployeeRequest {
    pub id: i32,
    pub name: String,
    pub last_name: String,
    pub age: i32,
    pub doc_number: String,
    pub email: String,
    pub phone_number: String,
    pub state: EmployeeState,
    pub department_id: i32,
}

#[derive(Serialize)]
pub struct DepartmentSummary {
    pub id: i32,
    pub name: String,
    pub description: String,
}

#[derive(Serialize)]
pub struct EmployeeResponse {
    pub id: i32,
    pub name: String,
    pub last_name: String,
    pub age: i32,
    pub doc_number: String,
    pub email: String,
    pub phone_number: String,
    pub state: EmployeeState,
    pub registered_at: String,
    pub department: Option<DepartmentSummary>,
}

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    id: i32,
    name: String,
    last_name: String,
    age: i32,
    doc_number: String,
    email: String,
    phone_number: String,
    state: String,
    registered_at: chrono::DateTime<chrono::Utc>,
    department_id: i32,
    department_name: Option<String>,
    department_description: Option<String>,
}

impl EmployeeRow {
    fn into_response(self) -> Result<EmployeeResponse, AppError> {
        let state = EmployeeState::parse(&self.state)?;
        let department = self.department_name.map(|name| DepartmentSummary {
            id: self.department_id,
            name,
            description: self.department_description.unwrap_or_default(),
        });

        Ok(EmployeeResponse {
            id: self.id,
            name: self.name,
            last_name: self.last_name,
            age: self.age,
            doc_number: self.doc_number,
            email: self.email,
            phone_number: self.phone_number,
            state,
            registered_at: self.registered_at.to_rfc3339(),
            department,
        })
    }
}

const EMPLOYEE_SELECT: &str = r#"
    SELECT e.id, e.name, e.last_name, e.age, e.doc_number, e.email,
           e.phone_number, e.state, e.registered_at, e.department_id,
           d.name AS department_name, d.description AS department_description
    FROM employees e
    LEFT JOIN departments d ON d.id = e.department_id
"#;

struct CleanEmployeeFields {
    name: String,
    last_name: String,
    email: String,
    doc_number: String,
    phone_number: String,
}

fn validate_employee_fields(
    name: &str,
    last_name: &str,
    age: i32,
    doc_number: &str,
    email: &str,
    phone_number: &str,
    department_id: i32,
) -> Result<CleanEmployeeFields, AppError> {
    let name = is_valid_name(name)?;
    let last_name = is_valid_name(last_name)?;
    let email = is_valid_email(email)?;

    if !(MIN_EMPLOYEE_AGE..=MAX_EMPLOYEE_AGE).contains(&age) {
        return Err(ValidationError::OutOfRange("age").into());
    }

    let doc_number = doc_number.trim();
    if doc_number.is_empty() {
        return Err(ValidationError::EmptyField("doc_number").into());
    }

    let phone_number = phone_number.trim();
    if phone_number.is_empty() {
        return Err(ValidationError::EmptyField("phone_number").into());
    }

    if department_id <= 0 {
        return Err(ValidationError::OutOfRange("department_id").into());
    }

    Ok(CleanEmployeeFields {
        name,
        last_name,
        email,
        doc_number: doc_number.to_string(),
        phone_number: phone_number.to_string(),
    })
}

async fn department_exists(pool: &PgPool, department_id: i32) -> Result<bool, AppError> {
    let existing = sqlx::query_scalar::<_, i32>("SELECT id FROM departments WHERE id = $1")
        .bind(department_id)
        .fetch_optional(pool)
        .await?;
    Ok(existing.is_some())
}

async fn employee_email_in_use(pool: &PgPool, email: &str, exclude_id: i32) -> Result<bool, AppError> {
    let existing =
        sqlx::query_scalar::<_, i32>("SELECT id FROM employees WHERE email = $1 AND id <> $2")
            .bind(email)
            .bind(exclude_id)
            .fetch_optional(pool)
            .await?;
    Ok(existing.is_some())
}

async fn doc_number_in_use(pool: &PgPool, doc_number: &str, exclude_id: i32) -> Result<bool, AppError> {
    let existing =
        sqlx::query_scalar::<_, i32>("SELECT id FROM employees WHERE doc_number = $1 AND id <> $2")
            .bind(doc_number)
            .bind(exclude_id)
            .fetch_optional(pool)
            .await?;
    Ok(existing.is_some())
}

async fn fetch_employee(pool: &PgPool, id: i32) -> Result<Option<EmployeeRow>, AppError> {
    let row = sqlx::query_as::<_, EmployeeRow>(&format!("{} WHERE e.id = $1", EMPLOYEE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// GET /api/employees
pub async fn list_employees(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;

    let rows = sqlx::query_as::<_, EmployeeRow>(&format!("{} ORDER BY e.id", EMPLOYEE_SELECT))
        .fetch_all(pool.get_ref())
        .await?;

    let employees = rows
        .into_iter()
        .map(EmployeeRow::into_response)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(employees))
}

/// GET /api/employees/{id}
pub async fn get_employee_by_id(
    claims: web::ReqData<Claims>,
    path: web::Path<i32>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    if id <= 0 {
        return Err(ValidationError::OutOfRange("id").into());
    }
    require_self_or_admin(&claims, id)?;

    let row = fetch_employee(pool.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("employee {} not found", id)))?;

    Ok(HttpResponse::Ok().json(row.into_response()?))
}

/// GET /api/employees/email/{email}
pub async fn get_employee_by_email(
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;
    let email = is_valid_email(&path.into_inner())?;

    let row = sqlx::query_as::<_, EmployeeRow>(&format!("{} WHERE e.email = $1", EMPLOYEE_SELECT))
        .bind(&email)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("employee not found".to_string()))?;

    Ok(HttpResponse::Ok().json(row.into_response()?))
}

/// GET /api/employees/me
pub async fn get_my_employee_profile(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let id = claims.uid.ok_or(AuthError::InvalidToken)?;

    let row = fetch_employee(pool.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound("employee profile not found".to_string()))?;

    Ok(HttpResponse::Ok().json(row.into_response()?))
}

/// POST /api/employees
pub async fn create_employee(
    claims: web::ReqData<Claims>,
    form: web::Json<CreateEmployeeRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;

    let fields = validate_employee_fields(
        &form.name,
        &form.last_name,
        form.age,
        &form.doc_number,
        &form.email,
        &form.phone_number,
        form.department_id,
    )?;

    if employee_email_in_use(pool.get_ref(), &fields.email, 0).await? {
        return Err(AppError::Conflict(format!(
            "email {} is already registered to another employee",
            fields.email
        )));
    }
    if doc_number_in_use(pool.get_ref(), &fields.doc_number, 0).await? {
        return Err(AppError::Conflict(format!(
            "document number {} is already registered",
            fields.doc_number
        )));
    }
    if !department_exists(pool.get_ref(), form.department_id).await? {
        return Err(AppError::NotFound(format!(
            "department {} not found",
            form.department_id
        )));
    }

    let id = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO employees (name, last_name, age, doc_number, email, phone_number, state, department_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.last_name)
    .bind(form.age)
    .bind(&fields.doc_number)
    .bind(&fields.email)
    .bind(&fields.phone_number)
    .bind(form.state.as_str())
    .bind(form.department_id)
    .fetch_one(pool.get_ref())
    .await?;

    let row = fetch_employee(pool.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::Internal("employee vanished after insert".to_string()))?;

    tracing::info!(employee_id = id, "employee created");

    Ok(HttpResponse::Created().json(row.into_response()?))
}

/// PUT /api/employees/{id}
pub async fn update_employee(
    claims: web::ReqData<Claims>,
    path: web::Path<i32>,
    form: web::Json<UpdateEmployeeRequest>,
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

    let fields = validate_employee_fields(
        &form.name,
        &form.last_name,
        form.age,
        &form.doc_number,
        &form.email,
        &form.phone_number,
        form.department_id,
    )?;

    let existing = sqlx::query_as::<_, (String, String, i32)>(
        "SELECT email, doc_number, department_id FROM employees WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound(format!("employee {} not found", id)))?;

    let (current_email, current_doc_number, current_department_id) = existing;

    if fields.email != current_email && employee_email_in_use(pool.get_ref(), &fields.email, id).await? {
        return Err(AppError::Conflict(format!(
            "email {} is already registered to another employee",
            fields.email
        )));
    }
    if fields.doc_number != current_doc_number
        && doc_number_in_use(pool.get_ref(), &fields.doc_number, id).await?
    {
        return Err(AppError::Conflict(format!(
            "document number {} is already registered",
            fields.doc_number
        )));
    }
    if form.department_id != current_department_id
        && !department_exists(pool.get_ref(), form.department_id).await?
    {
        return Err(AppError::NotFound(format!(
            "department {} not found",
            form.department_id
        )));
    }

    sqlx::query(
        r#"
        UPDATE employees
        SET name = $1, last_name = $2, age = $3, doc_number = $4,
            email = $5, phone_number = $6, state = $7, department_id = $8
        WHERE id = $9
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.last_name)
    .bind(form.age)
    .bind(&fields.doc_number)
    .bind(&fields.email)
    .bind(&fields.phone_number)
    .bind(form.state.as_str())
    .bind(form.department_id)
    .bind(id)
    .execute(pool.get_ref())
    .await?;

    let row = fetch_employee(pool.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::Internal("employee vanished after update".to_string()))?;

    tracing::info!(employee_id = id, "employee updated");

    Ok(HttpResponse::Ok().json(row.into_response()?))
}

/// DELETE /api/employees/{id}
pub async fn delete_employee(
    claims: web::ReqData<Claims>,
    path: web::Path<i32>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_admin(&claims)?;
    let id = path.into_inner();
    if id <= 0 {
        return Err(ValidationError::OutOfRange("id").into());
    }

    let row = fetch_employee(pool.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("employee {} not found", id)))?;

    sqlx::query("DELETE FROM employees WHERE id = $1")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    tracing::info!(employee_id = id, "employee deleted");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "employee deleted",
        "employee": row.into_response()?,
    })))
}
