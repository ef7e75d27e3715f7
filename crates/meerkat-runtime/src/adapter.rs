use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meerkat_core::{
    ColumnChange, ColumnDetail, ColumnInfo, GatewayResult, Identifier, TableRef, TableSpec,
    WebhookDiagnostics, WebhookSubscription,
};

/// A database backend the dispatcher can administer.
///
/// Each request opens exactly one session; dropping the session returns its
/// connection to the pool, on every exit path.
#[async_trait]
pub trait SchemaAdmin: Send + Sync {
    type Session: SchemaSession;

    async fn open_session(&self) -> GatewayResult<Self::Session>;
}

/// Operations available on one pooled connection.
///
/// Multi-statement operations run their statements in sequence without an
/// enclosing transaction; a failure part-way leaves the earlier statements
/// applied.
#[async_trait]
pub trait SchemaSession: Send {
    /// Database clock, used as a connectivity probe.
    async fn server_time(&mut self) -> GatewayResult<DateTime<Utc>>;

    /// Table names in the working schema, ordered by name.
    async fn list_tables(&mut self) -> GatewayResult<Vec<String>>;

    async fn table_exists(&mut self, table: &TableRef) -> GatewayResult<bool>;

    async fn column_exists(&mut self, table: &TableRef, column: &Identifier) -> GatewayResult<bool>;

    /// Columns in ordinal order.
    async fn table_structure(&mut self, table: &TableRef) -> GatewayResult<Vec<ColumnInfo>>;

    /// Columns in ordinal order with primary-key and unique flags.
    async fn table_schema(&mut self, table: &TableRef) -> GatewayResult<Vec<ColumnDetail>>;

    /// Create the table with its system columns and ownership policies.
    async fn create_table(&mut self, spec: &TableSpec) -> GatewayResult<()>;

    /// Apply exactly one column mutation.
    async fn alter_column(&mut self, table: &TableRef, change: &ColumnChange) -> GatewayResult<()>;

    /// Drop the triggers and dispatch function of `table` and delete its
    /// configuration record. Tolerates any of them being absent.
    async fn remove_webhook(&mut self, table: &TableRef) -> GatewayResult<()>;

    /// Store the configuration record and create the dispatch function and
    /// triggers for a table with no existing webhook wiring.
    async fn install_webhook(&mut self, subscription: &WebhookSubscription) -> GatewayResult<()>;

    /// Bring the table's webhook wiring to exactly `subscription`.
    async fn reconcile_webhook(&mut self, subscription: &WebhookSubscription) -> GatewayResult<()> {
        self.remove_webhook(&subscription.table).await?;
        self.install_webhook(subscription).await
    }

    async fn webhook_diagnostics(&mut self, table: &TableRef) -> GatewayResult<WebhookDiagnostics>;

    /// Create the companion profile table, its sync trigger, and backfill it.
    async fn provision_profiles(&mut self) -> GatewayResult<()>;
}
