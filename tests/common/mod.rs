// tests/common/mod.rs

#![allow(dead_code)]

use autoassess::{
    config::{Config, parse_base_url},
    db,
    grading::{GradingQueue, spawn_worker},
    routes,
    state::AppState,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub pool: SqlitePool,
}

pub struct TestUser {
    pub id: i64,
    pub token: String,
    pub email: String,
}

fn test_config(database_url: String, grader_url: &str) -> Config {
    Config {
        database_url,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        port: 0,
        grader_url: parse_base_url(grader_url).expect("Invalid grader URL"),
        grading_poll_interval_ms: 50,
        grading_max_attempts: 3,
        grading_retry_base_ms: 50,
        grading_timeout_secs: 5,
        seed_teacher_email: None,
        seed_teacher_password: None,
    }
}

/// Spawns the app on a random port against a fresh SQLite file. No grading worker runs.
pub async fn spawn_app() -> TestApp {
    start(None).await
}

/// Same as `spawn_app`, with a grading worker pointed at `grader_url`.
pub async fn spawn_app_with_grader(grader_url: &str) -> TestApp {
    start(Some(grader_url)).await
}

async fn start(grader_url: Option<&str>) -> TestApp {
    // 1. A database file of our own
    let path = std::env::temp_dir().join(format!("autoassess-{}.db", uuid::Uuid::new_v4()));
    let database_url = format!("sqlite://{}", path.display());

    let pool = db::connect(&database_url)
        .await
        .expect("Failed to open test database");

    // 2. Run migrations
    db::migrate(&pool).await.expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = test_config(database_url, grader_url.unwrap_or("http://127.0.0.1:9"));
    let grading = GradingQueue::new();

    if grader_url.is_some() {
        spawn_worker(pool.clone(), &config, grading.clone()).expect("Failed to start worker");
    }

    let state = AppState {
        pool: pool.clone(),
        config,
        grading,
    };

    let app = routes::create_router(state);

    // 4. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 5. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        pool,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, role: &str, first_name: &str, last_name: &str) -> TestUser {
        let email = format!("{}@example.com", uuid::Uuid::new_v4());
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "firstName": first_name,
                "lastName": last_name,
                "email": email,
                "password": "password123",
                "confirmPassword": "password123",
                "college": "City College",
                "branch": "CSE",
                "semester": "5",
                "rollNo": "42",
                "role": role
            }))
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(response.status().as_u16(), 201, "registration failed");

        let body: Value = response.json().await.expect("Failed to parse json");
        TestUser {
            id: body["id"].as_i64().expect("id not found"),
            token: body["token"].as_str().expect("Token not found").to_string(),
            email,
        }
    }

    pub async fn student(&self) -> TestUser {
        self.register("student", "Sam", "Student").await
    }

    pub async fn teacher(&self) -> TestUser {
        self.register("teacher", "Tina", "Teacher").await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> reqwest::Response {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        request.send().await.expect("Failed to execute request")
    }

    /// Creates a test with the given marks and returns its id.
    pub async fn create_test(&self, teacher: &TestUser, name: &str, marks: &[f64]) -> i64 {
        let questions: Vec<Value> = marks
            .iter()
            .enumerate()
            .map(|(i, m)| {
                json!({
                    "questionText": format!("Question {}", i + 1),
                    "marks": m,
                    "answer": format!("SELECT {}", i + 1)
                })
            })
            .collect();

        let response = self
            .post(
                "/api/test/createTest",
                Some(&teacher.token),
                &json!({
                    "testName": name,
                    "scheduledDate": "2030-01-15T09:00",
                    "duration": 60,
                    "questions": questions,
                    "schema": "CREATE TABLE emp (id INT, name TEXT, salary INT);"
                }),
            )
            .await;

        assert_eq!(response.status().as_u16(), 201, "createTest failed");
        let body: Value = response.json().await.expect("Failed to parse json");
        body["testId"].as_i64().expect("testId not found")
    }
}

pub async fn error_message(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("Failed to parse json");
    body["error"].as_str().unwrap_or_default().to_string()
}
