mod auth;
mod departments;
mod employees;
mod health_check;
mod users;

pub use auth::{get_current_user, login, refresh, register};
pub use departments::{
    create_department, delete_department, get_department_by_id, get_department_by_name,
    list_departments, update_department,
};
pub use employees::{
    create_employee, delete_employee, get_employee_by_email, get_employee_by_id,
    get_my_employee_profile, list_employees, update_employee,
};
pub use health_check::health_check;
pub use users::{
    create_user, delete_user, get_user_by_email, get_user_by_id, list_users, update_user,
};

use crate::auth::Claims;
use crate::error::AppError;

/// Admin-only gate, derived from the claims verified for this request.
pub(crate) fn require_admin(claims: &Claims) -> Result<(), AppError> {
    if claims.role.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Standard users may only target their own resource id.
pub(crate) fn require_self_or_admin(claims: &Claims, target_id: i32) -> Result<(), AppError> {
    if claims.role.is_admin() || claims.uid == Some(target_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
