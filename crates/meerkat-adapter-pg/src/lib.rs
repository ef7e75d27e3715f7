//! Postgres backend for the Meerkat gateway.
//!
//! [`PostgresAdmin`] owns a bounded, lazily connecting pool. Each request
//! borrows one connection as a [`PgSession`], which goes back to the pool when
//! dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meerkat_core::{
    ColumnChange, ColumnDetail, ColumnInfo, GatewayError, GatewayResult, Identifier, TableRef,
    TableSpec, UpstreamConfig, WebhookDiagnostics, WebhookSubscription,
};
use meerkat_runtime::{SchemaAdmin, SchemaSession};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres};
use std::str::FromStr;
use std::time::Duration;

pub mod ddl;
pub mod introspect;
pub mod profiles;
pub mod webhook;

fn db_err(err: sqlx::Error) -> GatewayError {
    GatewayError::unexpected(err)
}

pub struct PostgresAdmin {
    pool: Option<PgPool>,
}

impl PostgresAdmin {
    /// Build the pool from configuration without connecting. With no
    /// connection string configured the admin is created unconfigured and
    /// every session request fails with a configuration error.
    pub fn from_config(upstream: &UpstreamConfig) -> Result<Self, sqlx::Error> {
        let Some(url) = upstream.connection_string() else {
            tracing::warn!("No database connection string configured");
            return Ok(Self { pool: None });
        };

        let options = PgConnectOptions::from_str(&url)?;
        let pool_config = upstream.pool_config();
        let pool = PgPoolOptions::new()
            .max_connections(pool_config.max_connections)
            .acquire_timeout(Duration::from_secs(pool_config.acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(pool_config.idle_timeout_seconds))
            .connect_lazy_with(options);

        tracing::info!(
            max_connections = pool_config.max_connections,
            "database pool created"
        );
        Ok(Self { pool: Some(pool) })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool: Some(pool) }
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_some()
    }
}

#[async_trait]
impl SchemaAdmin for PostgresAdmin {
    type Session = PgSession;

    async fn open_session(&self) -> GatewayResult<PgSession> {
        let pool = self.pool.as_ref().ok_or_else(|| {
            GatewayError::Configuration("database connection string is not configured".to_string())
        })?;
        let conn = pool.acquire().await.map_err(db_err)?;
        Ok(PgSession { conn })
    }
}

/// One pooled connection, held for the duration of a request.
pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl SchemaSession for PgSession {
    async fn server_time(&mut self) -> GatewayResult<DateTime<Utc>> {
        introspect::server_time(&mut self.conn).await.map_err(db_err)
    }

    async fn list_tables(&mut self) -> GatewayResult<Vec<String>> {
        introspect::list_tables(&mut self.conn).await.map_err(db_err)
    }

    async fn table_exists(&mut self, table: &TableRef) -> GatewayResult<bool> {
        introspect::table_exists(&mut self.conn, table)
            .await
            .map_err(db_err)
    }

    async fn column_exists(&mut self, table: &TableRef, column: &Identifier) -> GatewayResult<bool> {
        introspect::column_exists(&mut self.conn, table, column)
            .await
            .map_err(db_err)
    }

    async fn table_structure(&mut self, table: &TableRef) -> GatewayResult<Vec<ColumnInfo>> {
        introspect::table_structure(&mut self.conn, table)
            .await
            .map_err(db_err)
    }

    async fn table_schema(&mut self, table: &TableRef) -> GatewayResult<Vec<ColumnDetail>> {
        introspect::table_schema(&mut self.conn, table)
            .await
            .map_err(db_err)
    }

    async fn create_table(&mut self, spec: &TableSpec) -> GatewayResult<()> {
        let table = TableRef::public(spec.name.clone());
        let mut statements = vec![ddl::create_table(spec), ddl::enable_rls(&table)];
        statements.extend(ddl::ownership_policies(&table));

        for statement in &statements {
            sqlx::Executor::execute(&mut *self.conn, sqlx::raw_sql(statement))
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    async fn alter_column(&mut self, table: &TableRef, change: &ColumnChange) -> GatewayResult<()> {
        let sql = ddl::alter_column(table, change);
        sqlx::Executor::execute(&mut *self.conn, sqlx::raw_sql(&sql))
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn remove_webhook(&mut self, table: &TableRef) -> GatewayResult<()> {
        webhook::remove(&mut self.conn, table).await.map_err(db_err)
    }

    async fn install_webhook(&mut self, subscription: &WebhookSubscription) -> GatewayResult<()> {
        webhook::install(&mut self.conn, subscription)
            .await
            .map_err(db_err)
    }

    async fn webhook_diagnostics(&mut self, table: &TableRef) -> GatewayResult<WebhookDiagnostics> {
        webhook::diagnostics(&mut self.conn, table)
            .await
            .map_err(db_err)
    }

    async fn provision_profiles(&mut self) -> GatewayResult<()> {
        profiles::provision(&mut self.conn).await.map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meerkat_core::config::upstream::ConnectionPoolConfig;

    #[tokio::test]
    async fn test_unconfigured_admin_reports_configuration_error() {
        let upstream = UpstreamConfig {
            database_url_env: None,
            ..UpstreamConfig::default()
        };
        let admin = PostgresAdmin::from_config(&upstream).unwrap();
        assert!(!admin.is_configured());

        let err = match admin.open_session().await {
            Ok(_) => panic!("expected a configuration error"),
            Err(err) => err,
        };
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "Configuration error");
    }

    #[tokio::test]
    async fn test_lazy_pool_does_not_connect() {
        let upstream = UpstreamConfig {
            database_url_env: None,
            database_url: Some("postgres://postgres:pw@127.0.0.1:1/none".to_string()),
            pool: Some(ConnectionPoolConfig {
                max_connections: 3,
                acquire_timeout_seconds: 1,
                idle_timeout_seconds: 60,
            }),
            ..UpstreamConfig::default()
        };
        let admin = PostgresAdmin::from_config(&upstream).unwrap();
        assert!(admin.is_configured());

        // the failure surfaces only on acquire, and sanitized
        let err = match admin.open_session().await {
            Ok(_) => panic!("nothing listens on port 1"),
            Err(err) => err,
        };
        assert_eq!(err.status_code(), 500);
        assert!(!err.to_string().contains("127.0.0.1"));
    }
}
