//! Shared infrastructure for the Postgres end-to-end tests.
//!
//! - Docker container management
//! - Auth schema fixture for images that do not ship one
//! - A dispatcher wired to the container

use meerkat_adapter_pg::PostgresAdmin;
use meerkat_core::SecretsConfig;
use meerkat_runtime::{Dispatcher, RecordingAuditSink};
use serde_json::Value;
use sqlx::PgPool;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// DOCKER CONTAINER CONFIGURATION
// =============================================================================

pub const CONTAINER_NAME: &str = "meerkat_test_postgres";
pub const POSTGRES_PORT: u16 = 5434;
pub const POSTGRES_PASSWORD: &str = "meerkat_test_password";
/// Ships pg_net and the auth schema.
pub const POSTGRES_IMAGE: &str = "supabase/postgres:15.8.1.085";

pub fn database_url() -> String {
    format!(
        "postgres://postgres:{}@localhost:{}/postgres",
        POSTGRES_PASSWORD, POSTGRES_PORT
    )
}

pub fn start_postgres_container() -> Result<(), String> {
    let _ = Command::new("docker")
        .args(["rm", "-f", CONTAINER_NAME])
        .output();

    let status = Command::new("docker")
        .args([
            "run",
            "-d",
            "--name",
            CONTAINER_NAME,
            "-e",
            &format!("POSTGRES_PASSWORD={}", POSTGRES_PASSWORD),
            "-p",
            &format!("{}:5432", POSTGRES_PORT),
            POSTGRES_IMAGE,
        ])
        .status()
        .map_err(|e| format!("Failed to start container: {}", e))?;

    if !status.success() {
        return Err("Failed to start PostgreSQL container".to_string());
    }
    Ok(())
}

pub fn stop_postgres_container() {
    let _ = Command::new("docker")
        .args(["rm", "-f", CONTAINER_NAME])
        .output();
}

pub async fn wait_for_postgres() -> Result<PgPool, String> {
    for attempt in 1..=60 {
        if let Ok(pool) = PgPool::connect(&database_url()).await
            && sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok()
        {
            println!("PostgreSQL ready after {} attempts", attempt);
            return Ok(pool);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Err("PostgreSQL did not become ready in time".to_string())
}

// =============================================================================
// DATABASE INITIALIZATION
// =============================================================================

/// Creates the pieces of the auth schema the gateway relies on when the
/// image does not provide them.
const AUTH_FIXTURE_SQL: &str = r#"
CREATE SCHEMA IF NOT EXISTS auth;
CREATE TABLE IF NOT EXISTS auth.users (
    id UUID PRIMARY KEY,
    email TEXT,
    raw_user_meta_data JSONB,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ DEFAULT NOW()
);
DO $$
BEGIN
    IF to_regprocedure('auth.uid()') IS NULL THEN
        CREATE FUNCTION auth.uid() RETURNS UUID LANGUAGE sql STABLE
        AS 'SELECT nullif(current_setting(''request.jwt.claim.sub'', true), '''')::uuid';
    END IF;
END
$$;
"#;

pub async fn initialize_database(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(AUTH_FIXTURE_SQL).execute(pool).await?;
    Ok(())
}

// =============================================================================
// TEST CONTEXT
// =============================================================================

pub type TestDispatcher = Dispatcher<PostgresAdmin, Arc<RecordingAuditSink>>;

pub struct TestContext {
    pub pool: PgPool,
    pub dispatcher: TestDispatcher,
    pub audit: Arc<RecordingAuditSink>,
}

impl TestContext {
    pub async fn setup() -> Result<Self, String> {
        start_postgres_container()?;
        let pool = wait_for_postgres().await?;
        initialize_database(&pool)
            .await
            .map_err(|e| format!("Failed to initialize database: {}", e))?;

        let audit = Arc::new(RecordingAuditSink::default());
        let secrets = SecretsConfig {
            api_key_env: None,
            service_key_env: None,
            origin_url_env: None,
            origin_url: Some("https://project.example.co".to_string()),
            ..SecretsConfig::default()
        };
        let dispatcher = Dispatcher::new(PostgresAdmin::with_pool(pool.clone()), audit.clone(), secrets);

        Ok(Self {
            pool,
            dispatcher,
            audit,
        })
    }

    /// Dispatch and expect success.
    pub async fn ok(&self, body: Value) -> Value {
        match self.dispatcher.dispatch("e2e", body.clone()).await {
            Ok(value) => value,
            Err(err) => panic!("{body} failed: {err}"),
        }
    }

    /// Dispatch and expect failure; returns the HTTP status.
    pub async fn fails(&self, body: Value) -> u16 {
        match self.dispatcher.dispatch("e2e", body.clone()).await {
            Ok(value) => panic!("{body} unexpectedly succeeded: {value}"),
            Err(err) => err.status_code(),
        }
    }

    pub async fn count(&self, sql: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(sql)
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|e| panic!("{sql}: {e}"));
        n
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        stop_postgres_container();
        println!("Cleaned up PostgreSQL container");
    }
}

/// Column names of a `table_structure` / `columns` array.
pub fn column_names(columns: &Value) -> Vec<String> {
    columns
        .as_array()
        .map(|cols| {
            cols.iter()
                .filter_map(|c| c["column_name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
