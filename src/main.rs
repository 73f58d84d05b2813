// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use exam_backend::config::Config;
use exam_backend::platform::{
    College, Course, LogAuditSink, LogNotifier, MemoryDirectory, PgDirectory, Student,
};
use exam_backend::routes;
use exam_backend::state::AppState;
use exam_backend::store::{MemoryExamStore, PgExamStore};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

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

    let state = match &config.database_url {
        Some(url) => {
            let pool = connect_with_retry(url).await;
            tracing::info!("Database connected...");

            tracing::info!("Running migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Migrations applied successfully.");

            if config.seed_demo {
                if let Err(e) = seed_demo_master_data(&pool).await {
                    tracing::error!("Failed to seed demo data: {:?}", e);
                }
            }

            AppState {
                store: Arc::new(PgExamStore::new(pool.clone())),
                directory: Arc::new(PgDirectory::new(pool)),
                audit: Arc::new(LogAuditSink),
                notifier: Arc::new(LogNotifier),
                config: config.clone(),
            }
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; running on the in-memory store");
            let directory = MemoryDirectory::new();
            if config.seed_demo {
                seed_demo_directory(&directory);
            }
            AppState {
                store: Arc::new(MemoryExamStore::new()),
                directory: Arc::new(directory),
                audit: Arc::new(LogAuditSink),
                notifier: Arc::new(LogNotifier),
                config: config.clone(),
            }
        }
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listen address");

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

async fn connect_with_retry(url: &str) -> PgPool {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!(
                    "Database not ready, retrying in 2s... (Attempt {})",
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

/// Master-data rows for local demos. The exam service never writes these
/// tables otherwise; they belong to the platform.
async fn seed_demo_master_data(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO colleges (id, name) VALUES (1, 'Demo Institute of Technology') \
         ON CONFLICT (id) DO NOTHING",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "INSERT INTO courses (id, college_id, code, title) \
         VALUES (1, 1, 'CS101', 'Introduction to Computer Science') \
         ON CONFLICT (id) DO NOTHING",
    )
    .execute(pool)
    .await?;
    for (id, name, roll) in [
        (1_i64, "Asha Verma", "2025-CS-001"),
        (2, "Rohan Iyer", "2025-CS-002"),
        (3, "Meera Pillai", "2025-CS-003"),
    ] {
        sqlx::query(
            "INSERT INTO students (id, college_id, name, roll_number) \
             VALUES ($1, 1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(name)
        .bind(roll)
        .execute(pool)
        .await?;
    }
    tracing::info!("Demo master data seeded.");
    Ok(())
}

fn seed_demo_directory(directory: &MemoryDirectory) {
    directory.add_college(College {
        id: 1,
        name: "Demo Institute of Technology".to_string(),
    });
    directory.add_course(Course {
        id: 1,
        college_id: 1,
        code: "CS101".to_string(),
        title: "Introduction to Computer Science".to_string(),
    });
    for (id, name, roll) in [
        (1_i64, "Asha Verma", "2025-CS-001"),
        (2, "Rohan Iyer", "2025-CS-002"),
        (3, "Meera Pillai", "2025-CS-003"),
    ] {
        directory.add_student(Student {
            id,
            college_id: 1,
            name: name.to_string(),
            roll_number: roll.to_string(),
        });
    }
    tracing::info!("Demo directory seeded.");
}
