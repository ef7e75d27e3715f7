use anyhow::Context;
use meerkat_adapter_pg::PostgresAdmin;
use meerkat_core::{AuthGate, MeerkatConfig};
use meerkat_runtime::{AuditSink, Dispatcher, SchemaAdmin, TracingAuditSink};

/// Shared application state.
pub struct AppState<A: SchemaAdmin, S: AuditSink> {
    pub gate: AuthGate,
    pub dispatcher: Dispatcher<A, S>,
}

impl<A: SchemaAdmin, S: AuditSink> AppState<A, S> {
    pub fn new(gate: AuthGate, dispatcher: Dispatcher<A, S>) -> Self {
        Self { gate, dispatcher }
    }
}

impl AppState<PostgresAdmin, TracingAuditSink> {
    /// Resolve secrets and build the (lazy) database pool.
    pub fn init(cfg: &MeerkatConfig) -> anyhow::Result<Self> {
        let api_key = cfg
            .secrets
            .resolve_api_key()
            .context("failed to read the API key")?;
        let gate = AuthGate::new(api_key, cfg.gate.replay_window_ms);
        if !gate.is_configured() {
            tracing::warn!("No API key configured; every automation request will be rejected");
        }

        let admin = PostgresAdmin::from_config(&cfg.upstream)
            .context("invalid database connection settings")?;

        Ok(Self::new(
            gate,
            Dispatcher::new(admin, TracingAuditSink, cfg.secrets.clone()),
        ))
    }
}
