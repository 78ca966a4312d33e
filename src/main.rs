// src/main.rs

use std::net::SocketAddr;
use std::time::Duration;

use autoassess::config::Config;
use autoassess::db;
use autoassess::error::AppError;
use autoassess::grading::{GradingQueue, spawn_worker};
use autoassess::handlers::auth::create_user;
use autoassess::models::user::{ROLE_TEACHER, RegisterRequest};
use autoassess::routes;
use autoassess::state::AppState;
use sqlx::SqlitePool;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env is read first)
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match db::connect(&config.database_url).await {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to open database after 5 retries: {}", e);
                    std::process::exit(1);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    tracing::info!("Running migrations...");
    if let Err(e) = db::migrate(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
        std::process::exit(1);
    }
    tracing::info!("Migrations applied successfully.");

    if let Err(e) = seed_teacher(&pool, &config).await {
        tracing::error!("Failed to seed teacher account: {}", e);
    }

    let grading = GradingQueue::new();
    if let Err(e) = spawn_worker(pool.clone(), &config, grading.clone()) {
        tracing::error!("Failed to start grading worker: {}", e);
        std::process::exit(1);
    }

    let state = AppState {
        pool,
        config: config.clone(),
        grading,
    };

    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}

/// Creates the configured teacher account on first start.
async fn seed_teacher(pool: &SqlitePool, config: &Config) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&config.seed_teacher_email, &config.seed_teacher_password)
    else {
        return Ok(());
    };

    let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM accounts WHERE email = ?")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

    if exists.is_none() {
        tracing::info!("Seeding teacher account: {}", email);
        let request = RegisterRequest {
            first_name: "Admin".to_string(),
            last_name: "Teacher".to_string(),
            email: email.clone(),
            password: password.clone(),
            confirm_password: password.clone(),
            role: ROLE_TEACHER.to_string(),
            ..Default::default()
        };
        let (id, _) = create_user(pool, &request).await?;
        tracing::info!("Teacher account {} created.", id);
    }

    Ok(())
}
