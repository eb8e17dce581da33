use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;

use staffdesk::configuration::{get_configuration, DatabaseSettings};
use staffdesk::email_client::{EmailClient, SenderEmail};
use staffdesk::startup::run;

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    let sender = SenderEmail::parse(configuration.email.sender.clone())
        .expect("Invalid sender address in configuration");
    let email_client = EmailClient::new(
        configuration.email.base_url.clone(),
        sender,
        reqwest::Client::new(),
    );

    let server = run(
        listener,
        connection_pool.clone(),
        configuration.jwt.clone(),
        email_client,
    )
    .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

/// Registers a user and returns their access token.
async fn access_token_for(app: &TestApp, email: &str, username: &str, role: &str) -> String {
    let client = reqwest::Client::new();
    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({
            "email": email,
            "username": username,
            "password": "SecurePass123",
            "role": role,
        }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

async fn admin_token(app: &TestApp) -> String {
    access_token_for(app, "admin@example.com", "admin", "Admin").await
}

async fn standard_token(app: &TestApp) -> String {
    access_token_for(app, "user@example.com", "user", "Standard").await
}

async fn create_department(app: &TestApp, token: &str, name: &str) -> i32 {
    let client = reqwest::Client::new();
    let response = client
        .post(&format!("{}/api/departments", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"name": name, "description": "test department"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    body["id"].as_i64().unwrap() as i32
}

fn employee_payload(department_id: i32) -> Value {
    json!({
        "name": "Jane",
        "last_name": "Doe",
        "age": 34,
        "doc_number": "CC-1029",
        "email": "jane.doe@example.com",
        "phone_number": "+1 555 0100",
        "department_id": department_id,
    })
}

// --- Departments ---

#[tokio::test]
async fn admin_can_crud_departments() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&app).await;

    let id = create_department(&app, &token, "Engineering").await;

    let response = client
        .get(&format!("{}/api/departments/{}", &app.address, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Engineering");

    let response = client
        .get(&format!("{}/api/departments/name/Engineering", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let response = client
        .put(&format!("{}/api/departments/{}", &app.address, id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"id": id, "name": "Platform", "description": "renamed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Platform");

    let response = client
        .delete(&format!("{}/api/departments/{}", &app.address, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let response = client
        .get(&format!("{}/api/departments/{}", &app.address, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn duplicate_department_name_is_a_conflict() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&app).await;

    create_department(&app, &token, "Engineering").await;

    let response = client
        .post(&format!("{}/api/departments", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"name": "Engineering"}))
        .send()
        .await
        .unwrap();
    assert_eq!(409, response.status().as_u16());
}

#[tokio::test]
async fn standard_user_cannot_touch_departments() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = standard_token(&app).await;

    let response = client
        .get(&format!("{}/api/departments", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(403, response.status().as_u16());

    let response = client
        .post(&format!("{}/api/departments", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"name": "Shadow"}))
        .send()
        .await
        .unwrap();
    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn staffed_department_cannot_be_deleted() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&app).await;

    let department_id = create_department(&app, &token, "Engineering").await;

    let response = client
        .post(&format!("{}/api/employees", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&employee_payload(department_id))
        .send()
        .await
        .unwrap();
    assert_eq!(201, response.status().as_u16());

    let response = client
        .delete(&format!("{}/api/departments/{}", &app.address, department_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(409, response.status().as_u16());
}

// --- Employees ---

#[tokio::test]
async fn admin_can_crud_employees() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&app).await;

    let department_id = create_department(&app, &token, "Engineering").await;

    let response = client
        .post(&format!("{}/api/employees", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&employee_payload(department_id))
        .send()
        .await
        .unwrap();
    assert_eq!(201, response.status().as_u16());
    let created: Value = response.json().await.unwrap();
    let employee_id = created["id"].as_i64().unwrap();
    assert_eq!(created["state"], "Active");
    assert_eq!(created["department"]["name"], "Engineering");

    let response = client
        .get(&format!(
            "{}/api/employees/email/jane.doe@example.com",
            &app.address
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let mut update = employee_payload(department_id);
    update["id"] = json!(employee_id);
    update["state"] = json!("OnLeave");
    update["age"] = json!(35);
    let response = client
        .put(&format!("{}/api/employees/{}", &app.address, employee_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&update)
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["state"], "OnLeave");
    assert_eq!(updated["age"], 35);

    let response = client
        .delete(&format!("{}/api/employees/{}", &app.address, employee_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let response = client
        .get(&format!("{}/api/employees/{}", &app.address, employee_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn employee_uniqueness_and_references_are_enforced() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&app).await;

    let department_id = create_department(&app, &token, "Engineering").await;

    let response = client
        .post(&format!("{}/api/employees", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&employee_payload(department_id))
        .send()
        .await
        .unwrap();
    assert_eq!(201, response.status().as_u16());

    // Same document number, different email
    let mut duplicate_doc = employee_payload(department_id);
    duplicate_doc["email"] = json!("someone.else@example.com");
    let response = client
        .post(&format!("{}/api/employees", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&duplicate_doc)
        .send()
        .await
        .unwrap();
    assert_eq!(409, response.status().as_u16());

    // Out-of-range age
    let mut underage = employee_payload(department_id);
    underage["email"] = json!("kid@example.com");
    underage["doc_number"] = json!("CC-9999");
    underage["age"] = json!(17);
    let response = client
        .post(&format!("{}/api/employees", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&underage)
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());

    // Nonexistent department
    let mut orphan = employee_payload(999_999);
    orphan["email"] = json!("orphan@example.com");
    orphan["doc_number"] = json!("CC-8888");
    let response = client
        .post(&format!("{}/api/employees", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&orphan)
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn standard_user_cannot_list_employees() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = standard_token(&app).await;

    let response = client
        .get(&format!("{}/api/employees", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(403, response.status().as_u16());
}

// --- Users ---

#[tokio::test]
async fn admin_can_list_users_but_standard_cannot() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let admin = admin_token(&app).await;
    let standard = standard_token(&app).await;

    let response = client
        .get(&format!("{}/api/users", &app.address))
        .header("Authorization", format!("Bearer {}", admin))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 2);

    let response = client
        .get(&format!("{}/api/users", &app.address))
        .header("Authorization", format!("Bearer {}", standard))
        .send()
        .await
        .unwrap();
    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn standard_user_can_read_self_but_not_others() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let _admin = admin_token(&app).await;
    let standard = standard_token(&app).await;

    let me: Value = client
        .get(&format!("{}/api/me", &app.address))
        .header("Authorization", format!("Bearer {}", standard))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let own_id = me["id"].as_i64().unwrap();

    let response = client
        .get(&format!("{}/api/users/{}", &app.address, own_id))
        .header("Authorization", format!("Bearer {}", standard))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let other_id = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE username = 'admin'")
        .fetch_one(&app.db_pool)
        .await
        .unwrap();
    let response = client
        .get(&format!("{}/api/users/{}", &app.address, other_id))
        .header("Authorization", format!("Bearer {}", standard))
        .send()
        .await
        .unwrap();
    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn standard_user_cannot_escalate_their_role() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let standard = standard_token(&app).await;

    let me: Value = client
        .get(&format!("{}/api/me", &app.address))
        .header("Authorization", format!("Bearer {}", standard))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let own_id = me["id"].as_i64().unwrap();

    let response = client
        .put(&format!("{}/api/users/{}", &app.address, own_id))
        .header("Authorization", format!("Bearer {}", standard))
        .json(&json!({
            "id": own_id,
            "email": "user@example.com",
            "username": "user",
            "role": "Admin",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    // The stored role is untouched.
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "Standard");
}

#[tokio::test]
async fn admin_can_change_roles_and_delete_users() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let admin = admin_token(&app).await;
    let _standard = standard_token(&app).await;

    let user_id = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE username = 'user'")
        .fetch_one(&app.db_pool)
        .await
        .unwrap();

    let response = client
        .put(&format!("{}/api/users/{}", &app.address, user_id))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&json!({
            "id": user_id,
            "email": "user@example.com",
            "username": "user",
            "role": "Admin",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "Admin");

    let response = client
        .delete(&format!("{}/api/users/{}", &app.address, user_id))
        .header("Authorization", format!("Bearer {}", admin))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let response = client
        .get(&format!("{}/api/users/{}", &app.address, user_id))
        .header("Authorization", format!("Bearer {}", admin))
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn user_update_rejects_conflicting_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let admin = admin_token(&app).await;
    let _standard = standard_token(&app).await;

    let user_id = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE username = 'user'")
        .fetch_one(&app.db_pool)
        .await
        .unwrap();

    let response = client
        .put(&format!("{}/api/users/{}", &app.address, user_id))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&json!({
            "id": user_id,
            "email": "admin@example.com",
            "username": "user",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(409, response.status().as_u16());
}
