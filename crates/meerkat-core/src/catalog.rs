//! Descriptors for tables, columns, webhook subscriptions and the commands
//! that mutate them.

use crate::error::GatewayError;
use crate::identifier::{Identifier, MAX_IDENTIFIER_LEN, TableRef};
use crate::types::{EngineType, FieldType};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Surrogate key added to every created table.
pub const ID_COLUMN: &str = "id";
/// Owner reference added to every created table; the ownership policies key on it.
pub const OWNER_COLUMN: &str = "user_id";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Columns `create_table` adds around the caller's columns.
pub const SYSTEM_COLUMNS: [&str; 4] = [ID_COLUMN, OWNER_COLUMN, CREATED_AT_COLUMN, UPDATED_AT_COLUMN];

/// Names of the four row-ownership policies attached to every created table.
pub const OWNERSHIP_POLICIES: [&str; 4] = [
    "Users can view own data",
    "Users can insert own data",
    "Users can update own data",
    "Users can delete own data",
];

/// Name of the administrator-only policy on the webhook configuration store.
pub const WEBHOOK_CONFIG_POLICY: &str = "Admin full access to webhook_config";

/// Table holding one webhook configuration record per table.
pub const WEBHOOK_CONFIG_TABLE: &str = "webhook_config";

/// One column as reported by the catalog, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub column_default: Option<String>,
}

/// A column with its derived key flags, as returned by `get_table_schema`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDetail {
    pub column_name: String,
    pub data_type: String,
    pub character_maximum_length: Option<i32>,
    pub is_nullable: bool,
    pub column_default: Option<String>,
    pub is_primary_key: bool,
    pub is_unique: bool,
}

/// One caller-requested column of a new table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: Identifier,
    pub field_type: FieldType,
}

/// A validated `create_table` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: Identifier,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Build a spec, rejecting empty column lists, duplicate names and names
    /// that collide with the system columns.
    pub fn new(name: Identifier, columns: Vec<ColumnSpec>) -> Result<Self, GatewayError> {
        if columns.is_empty() {
            return Err(GatewayError::validation(
                "table_name and columns array are required",
            ));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if SYSTEM_COLUMNS.contains(&column.name.as_str()) {
                return Err(GatewayError::validation(format!(
                    "Column name '{}' is reserved (system columns: {})",
                    column.name,
                    SYSTEM_COLUMNS.join(", ")
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(GatewayError::validation(format!(
                    "Duplicate column name: {}",
                    column.name
                )));
            }
        }

        Ok(Self { name, columns })
    }

    /// Column names in the order the created table will have them.
    pub fn realized_column_names(&self) -> Vec<String> {
        let mut names = vec![ID_COLUMN.to_string(), OWNER_COLUMN.to_string()];
        names.extend(self.columns.iter().map(|c| c.name.to_string()));
        names.push(CREATED_AT_COLUMN.to_string());
        names.push(UPDATED_AT_COLUMN.to_string());
        names
    }
}

/// One `manage_column` sub-operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    Add { column: Identifier, ty: EngineType },
    UpdateType { column: Identifier, ty: EngineType },
    Rename { column: Identifier, new_name: Identifier },
    Drop { column: Identifier },
}

impl ColumnChange {
    pub const SUBACTIONS: [&'static str; 4] = ["add", "update_type", "rename", "drop"];

    pub fn column(&self) -> &Identifier {
        match self {
            ColumnChange::Add { column, .. }
            | ColumnChange::UpdateType { column, .. }
            | ColumnChange::Rename { column, .. }
            | ColumnChange::Drop { column } => column,
        }
    }

    pub fn subaction(&self) -> &'static str {
        match self {
            ColumnChange::Add { .. } => "add",
            ColumnChange::UpdateType { .. } => "update_type",
            ColumnChange::Rename { .. } => "rename",
            ColumnChange::Drop { .. } => "drop",
        }
    }

    /// Everything except `add` operates on an existing column.
    pub fn requires_existing_column(&self) -> bool {
        !matches!(self, ColumnChange::Add { .. })
    }

    /// Human-readable summary returned with the new table structure.
    pub fn describe(&self, table: &Identifier) -> String {
        match self {
            ColumnChange::Add { column, .. } => {
                format!("Column '{column}' added to table '{table}'")
            }
            ColumnChange::UpdateType { column, ty } => {
                format!("Column '{column}' type updated to '{ty}'")
            }
            ColumnChange::Rename { column, new_name } => {
                format!("Column '{column}' renamed to '{new_name}'")
            }
            ColumnChange::Drop { column } => {
                format!("Column '{column}' dropped from table '{table}'")
            }
        }
    }
}

/// Row events a change-notification trigger fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl TriggerEvent {
    pub const ALL: [TriggerEvent; 3] = [TriggerEvent::Insert, TriggerEvent::Update, TriggerEvent::Delete];

    pub fn as_sql(&self) -> &'static str {
        match self {
            TriggerEvent::Insert => "INSERT",
            TriggerEvent::Update => "UPDATE",
            TriggerEvent::Delete => "DELETE",
        }
    }

    /// `<table>_<event>_webhook`
    pub fn trigger_name(&self, table: &Identifier) -> String {
        format!("{}_{}_webhook", table, self.as_sql().to_ascii_lowercase())
    }
}

const DISPATCH_FUNCTION_PREFIX: &str = "notify_webhook_";

/// Longest table name whose trigger and dispatch function names all fit in
/// an identifier without truncation.
pub const MAX_TRIGGER_TABLE_LEN: usize = MAX_IDENTIFIER_LEN - DISPATCH_FUNCTION_PREFIX.len();

/// Name of the per-table dispatch function.
pub fn dispatch_function_name(table: &Identifier) -> String {
    format!("{DISPATCH_FUNCTION_PREFIX}{table}")
}

/// Names of the three triggers installed for `table`.
pub fn trigger_names(table: &Identifier) -> Vec<String> {
    TriggerEvent::ALL.iter().map(|e| e.trigger_name(table)).collect()
}

/// A validated `create_trigger` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSubscription {
    pub table: TableRef,
    pub webhook_url: Url,
    pub api_key: String,
    /// Originating service URL embedded in every event as `origin`.
    pub origin_url: Option<String>,
}

impl WebhookSubscription {
    pub fn new(
        table: TableRef,
        webhook_url: &str,
        api_key: &str,
        origin_url: Option<String>,
    ) -> Result<Self, GatewayError> {
        if table.name.as_str().len() > MAX_TRIGGER_TABLE_LEN {
            return Err(GatewayError::validation(format!(
                "Table name '{}' is too long for webhook triggers (max {MAX_TRIGGER_TABLE_LEN} characters)",
                table.name
            )));
        }
        let webhook_url = parse_webhook_url(webhook_url)?;
        if api_key.trim().is_empty() {
            return Err(GatewayError::validation(
                "table_name, webhook_url, and webhook_api_key are required",
            ));
        }
        Ok(Self {
            table,
            webhook_url,
            api_key: api_key.to_string(),
            origin_url,
        })
    }
}

fn parse_webhook_url(raw: &str) -> Result<Url, GatewayError> {
    let url = Url::parse(raw).map_err(|_| GatewayError::validation("Invalid webhook URL"))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(GatewayError::validation("Invalid webhook URL")),
    }
}

/// Read-only view of one table's webhook wiring.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WebhookDiagnostics {
    pub triggers: Vec<Value>,
    pub webhook_config: Vec<Value>,
    pub pg_net_queue: Vec<Value>,
    pub recent_responses: Vec<Value>,
}

/// Fixed shape of the companion profile table.
pub mod profiles {
    pub const TABLE: &str = "profiles";
    pub const COLUMNS: [&str; 6] = ["id", "email", "name", "avatar_url", "created_at", "updated_at"];
    pub const SYNC_TRIGGER: &str = "on_auth_user_profile_sync";
    pub const SYNC_FUNCTION: &str = "handle_user_profile_sync";
    pub const POLICIES: [&str; 2] = ["Users can view own profile", "Users can update own profile"];
}
