use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::configuration::JwtSettings;
use crate::email_client::EmailClient;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    create_department, create_employee, create_user, delete_department, delete_employee,
    delete_user, get_current_user, get_department_by_id, get_department_by_name,
    get_employee_by_email, get_employee_by_id, get_my_employee_profile, get_user_by_email,
    get_user_by_id, health_check, list_departments, list_employees, list_users, login, refresh,
    register, update_department, update_employee, update_user,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    jwt_config: JwtSettings,
    email_client: EmailClient,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let jwt_config_data = web::Data::new(jwt_config.clone());
    let email_client = web::Data::new(email_client);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            .app_data(connection.clone())
            .app_data(jwt_config_data.clone())
            .app_data(email_client.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            // Protected routes; the middleware injects verified claims
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("/me", web::get().to(get_current_user))
                    .route("/users", web::get().to(list_users))
                    .route("/users", web::post().to(create_user))
                    .route("/users/email/{email}", web::get().to(get_user_by_email))
                    .route("/users/{id}", web::get().to(get_user_by_id))
                    .route("/users/{id}", web::put().to(update_user))
                    .route("/users/{id}", web::delete().to(delete_user))
                    .route("/departments", web::get().to(list_departments))
                    .route("/departments", web::post().to(create_department))
                    .route(
                        "/departments/name/{name}",
                        web::get().to(get_department_by_name),
                    )
                    .route("/departments/{id}", web::get().to(get_department_by_id))
                    .route("/departments/{id}", web::put().to(update_department))
                    .route("/departments/{id}", web::delete().to(delete_department))
                    .route("/employees", web::get().to(list_employees))
                    .route("/employees", web::post().to(create_employee))
                    .route("/employees/me", web::get().to(get_my_employee_profile))
                    .route(
                        "/employees/email/{email}",
                        web::get().to(get_employee_by_email),
                    )
                    .route("/employees/{id}", web::get().to(get_employee_by_id))
                    .route("/employees/{id}", web::put().to(update_employee))
                    .route("/employees/{id}", web::delete().to(delete_employee)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
