use crate::action::{Action, ActionRequest, SessionAction};
use crate::adapter::{SchemaAdmin, SchemaSession};
use crate::audit::{AuditEvent, AuditOutcome, AuditSink};
use meerkat_core::catalog::{OWNERSHIP_POLICIES, dispatch_function_name, profiles, trigger_names};
use meerkat_core::{
    ColumnChange, GatewayError, GatewayResult, SecretsConfig, TableRef, TableSpec,
    WebhookSubscription, sanitize_error,
};
use serde_json::{Value, json};

/// Routes one authenticated request to its action and builds the response
/// envelope.
///
/// Validation runs before any session is opened; the session opened for an
/// action is dropped, and its connection released, before `dispatch` returns.
pub struct Dispatcher<A: SchemaAdmin, S: AuditSink> {
    admin: A,
    audit: S,
    secrets: SecretsConfig,
}

impl<A: SchemaAdmin, S: AuditSink> Dispatcher<A, S> {
    pub fn new(admin: A, audit: S, secrets: SecretsConfig) -> Self {
        Self {
            admin,
            audit,
            secrets,
        }
    }

    pub fn admin(&self) -> &A {
        &self.admin
    }

    /// Decode, validate and execute a request body.
    pub async fn dispatch(&self, request_id: &str, body: Value) -> GatewayResult<Value> {
        let action_name = body
            .get("action")
            .and_then(Value::as_str)
            .map(str::to_string);

        let (table, result) = match self.prepare(body) {
            Ok(action) => {
                let table = action.table();
                tracing::debug!(action = action.name(), table = table.as_deref(), "dispatching");
                (table, self.execute(action).await)
            }
            Err(err) => (None, Err(err)),
        };

        let outcome = match &result {
            Ok(_) => AuditOutcome::Success,
            Err(err) => {
                log_failure(err);
                AuditOutcome::Failure {
                    kind: err.kind(),
                    status: err.status_code(),
                }
            }
        };

        self.audit.record(AuditEvent {
            request_id: request_id.to_string(),
            action: action_name,
            table,
            outcome,
        });

        result
    }

    fn prepare(&self, body: Value) -> GatewayResult<Action> {
        let request = ActionRequest::from_value(body)?;
        Action::parse(request, self.secrets.resolve_origin_url())
    }

    async fn execute(&self, action: Action) -> GatewayResult<Value> {
        match action {
            Action::GetServiceKey => self.service_key(),
            Action::Session(action) => {
                let mut session = self.admin.open_session().await?;
                run(&mut session, action).await
            }
        }
    }

    fn service_key(&self) -> GatewayResult<Value> {
        match self.secrets.resolve_service_key() {
            Ok(Some(key)) if !key.is_empty() => Ok(json!({
                "success": true,
                "service_key": key,
            })),
            Ok(_) => Err(GatewayError::Configuration(
                "service key is not configured".to_string(),
            )),
            Err(e) => Err(GatewayError::Configuration(format!(
                "service key could not be read: {e}"
            ))),
        }
    }
}

fn log_failure(err: &GatewayError) {
    match err {
        GatewayError::Configuration(detail) => {
            tracing::error!(detail = %sanitize_error(detail), "configuration error")
        }
        GatewayError::Unexpected(message) => tracing::error!(error = %message, "action failed"),
        other => tracing::debug!(kind = other.kind(), error = %other, "request rejected"),
    }
}

async fn run<T: SchemaSession>(session: &mut T, action: SessionAction) -> GatewayResult<Value> {
    match action {
        SessionAction::TestConnection => {
            let now = session.server_time().await?;
            Ok(json!({
                "success": true,
                "connected": true,
                "timestamp": now.to_rfc3339(),
            }))
        }
        SessionAction::ListTables => {
            let tables = session.list_tables().await?;
            Ok(json!({
                "success": true,
                "count": tables.len(),
                "tables": tables,
            }))
        }
        SessionAction::GetTableSchema { table } => get_table_schema(session, &table).await,
        SessionAction::CreateTable(spec) => create_table(session, &spec).await,
        SessionAction::ManageColumn { table, change } => manage_column(session, &table, &change).await,
        SessionAction::CreateTrigger(subscription) => create_trigger(session, &subscription).await,
        SessionAction::RemoveTrigger { table } => {
            session.remove_webhook(&table).await?;
            Ok(json!({
                "success": true,
                "message": format!("Webhook triggers removed from {table}"),
            }))
        }
        SessionAction::DebugTrigger { table } => {
            let diagnostics = session.webhook_diagnostics(&table).await?;
            Ok(json!({
                "success": true,
                "table_name": table.name,
                "schema": table.schema,
                "triggers": diagnostics.triggers,
                "webhook_config": diagnostics.webhook_config,
                "pg_net_queue": diagnostics.pg_net_queue,
                "recent_responses": diagnostics.recent_responses,
                "instructions": [
                    "triggers lists the change-notification triggers installed on the table",
                    "webhook_config holds the stored endpoint for the table",
                    "pg_net_queue holds requests not yet sent",
                    "recent_responses holds the latest delivery results",
                ],
            }))
        }
        SessionAction::CreateProfileTable => {
            session.provision_profiles().await?;
            Ok(json!({
                "success": true,
                "message": "Profile table created and synced with auth.users",
                "details": {
                    "table": format!("public.{}", profiles::TABLE),
                    "columns": profiles::COLUMNS,
                    "trigger": profiles::SYNC_TRIGGER,
                    "function": format!("public.{}", profiles::SYNC_FUNCTION),
                    "rls_enabled": true,
                    "policies": profiles::POLICIES,
                },
            }))
        }
    }
}

async fn get_table_schema<T: SchemaSession>(session: &mut T, table: &TableRef) -> GatewayResult<Value> {
    if !session.table_exists(table).await? {
        return Err(GatewayError::NotFound("Table does not exist".to_string()));
    }
    let columns = session.table_schema(table).await?;
    Ok(json!({
        "success": true,
        "table_name": table.name,
        "schema": table.schema,
        "count": columns.len(),
        "columns": columns,
    }))
}

async fn create_table<T: SchemaSession>(session: &mut T, spec: &TableSpec) -> GatewayResult<Value> {
    let table = TableRef::public(spec.name.clone());
    if session.table_exists(&table).await? {
        return Err(GatewayError::Conflict("Table already exists".to_string()));
    }

    session.create_table(spec).await?;
    let columns = session.table_structure(&table).await?;

    tracing::info!(table = %table, "table created");
    Ok(json!({
        "success": true,
        "message": format!("Table '{}' created successfully with RLS enabled", spec.name),
        "table_name": spec.name,
        "schema": table.schema,
        "rls_enabled": true,
        "policies": OWNERSHIP_POLICIES,
        "columns": columns,
    }))
}

async fn manage_column<T: SchemaSession>(
    session: &mut T,
    table: &TableRef,
    change: &ColumnChange,
) -> GatewayResult<Value> {
    if !session.table_exists(table).await? {
        return Err(GatewayError::NotFound("Table does not exist".to_string()));
    }
    if change.requires_existing_column() && !session.column_exists(table, change.column()).await? {
        return Err(GatewayError::NotFound("Column does not exist".to_string()));
    }

    session.alter_column(table, change).await?;
    let structure = session.table_structure(table).await?;

    tracing::info!(table = %table, subaction = change.subaction(), column = %change.column(), "column changed");
    Ok(json!({
        "success": true,
        "message": change.describe(&table.name),
        "table_structure": structure,
    }))
}

async fn create_trigger<T: SchemaSession>(
    session: &mut T,
    subscription: &WebhookSubscription,
) -> GatewayResult<Value> {
    let table = &subscription.table;
    if !table.name.is_reserved_user_table() && !session.table_exists(table).await? {
        return Err(GatewayError::NotFound("Table does not exist".to_string()));
    }

    session.reconcile_webhook(subscription).await?;

    tracing::info!(table = %table, "webhook triggers installed");
    Ok(json!({
        "success": true,
        "message": format!("Webhook triggers created for {table}"),
        "function": format!("public.{}", dispatch_function_name(&table.name)),
        "schema": table.schema,
        "triggers": trigger_names(&table.name),
        "note": "Events are posted asynchronously by the database; use debug_trigger to inspect deliveries",
    }))
}
