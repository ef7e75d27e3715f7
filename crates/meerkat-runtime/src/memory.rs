//! In-memory [`SchemaAdmin`] that models the catalog effects of every
//! session operation. Used by the dispatcher and HTTP tests.

use crate::adapter::{SchemaAdmin, SchemaSession};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meerkat_core::catalog::{
    CREATED_AT_COLUMN, ID_COLUMN, OWNER_COLUMN, OWNERSHIP_POLICIES, UPDATED_AT_COLUMN,
    WEBHOOK_CONFIG_POLICY, WEBHOOK_CONFIG_TABLE, dispatch_function_name, profiles, trigger_names,
};
use meerkat_core::identifier::RESERVED_USER_TABLE;
use meerkat_core::{
    ColumnChange, ColumnDetail, ColumnInfo, EngineType, GatewayError, GatewayResult, Identifier,
    SchemaName, TableRef, TableSpec, TriggerEvent, WebhookDiagnostics, WebhookSubscription,
};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A stored webhook configuration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRecord {
    pub schema: SchemaName,
    pub webhook_url: String,
    pub api_key: String,
    pub origin_url: Option<String>,
}

#[derive(Debug, Clone)]
struct MemoryColumn {
    name: String,
    data_type: String,
    nullable: bool,
    default: Option<String>,
    primary_key: bool,
    unique: bool,
}

impl MemoryColumn {
    fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            default: None,
            primary_key: false,
            unique: false,
        }
    }

    fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    fn default_value(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<MemoryColumn>,
    policies: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Keyed by `schema.name`.
    tables: BTreeMap<String, MemoryTable>,
    functions: BTreeSet<String>,
    /// `(table key, trigger name)`
    triggers: BTreeSet<(String, String)>,
    /// Keyed by bare table name, as the configuration store is.
    webhooks: BTreeMap<String, WebhookRecord>,
    fail_next: Option<String>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MemoryState>,
    opened: AtomicUsize,
    open: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory database. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdmin {
    shared: Arc<Shared>,
}

impl MemoryAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    /// A database whose auth schema already holds the user table.
    pub fn with_user_table() -> Self {
        let admin = Self::new();
        admin.shared.lock().tables.insert(
            key_for(RESERVED_USER_TABLE),
            MemoryTable {
                columns: vec![
                    MemoryColumn::new("id", "uuid").primary_key(),
                    MemoryColumn::new("email", "character varying"),
                    MemoryColumn::new("raw_user_meta_data", "jsonb"),
                    MemoryColumn::new(CREATED_AT_COLUMN, "timestamp with time zone"),
                    MemoryColumn::new(UPDATED_AT_COLUMN, "timestamp with time zone"),
                ],
                policies: Vec::new(),
            },
        );
        admin
    }

    /// Make the next session operation fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.shared.lock().fail_next = Some(message.into());
    }

    /// Sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Sessions currently held.
    pub fn open_sessions(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }

    pub fn has_table(&self, schema: SchemaName, name: &str) -> bool {
        self.shared
            .lock()
            .tables
            .contains_key(&format!("{schema}.{name}"))
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.shared.lock().functions.contains(name)
    }

    /// Policy names on `table`, resolved the way trigger targets are.
    pub fn policies(&self, table: &str) -> Vec<String> {
        self.shared
            .lock()
            .tables
            .get(&key_for(table))
            .map(|t| t.policies.clone())
            .unwrap_or_default()
    }

    pub fn trigger_count(&self, table: &str) -> usize {
        let key = key_for(table);
        self.shared
            .lock()
            .triggers
            .iter()
            .filter(|(t, _)| *t == key)
            .count()
    }

    pub fn has_trigger(&self, table: &str, trigger: &str) -> bool {
        self.shared
            .lock()
            .triggers
            .contains(&(key_for(table), trigger.to_string()))
    }

    pub fn webhook_record(&self, table: &str) -> Option<WebhookRecord> {
        self.shared.lock().webhooks.get(table).cloned()
    }
}

#[async_trait]
impl SchemaAdmin for MemoryAdmin {
    type Session = MemorySession;

    async fn open_session(&self) -> GatewayResult<MemorySession> {
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        self.shared.open.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            shared: self.shared.clone(),
        })
    }
}

/// One borrowed "connection"; returned on drop.
#[derive(Debug)]
pub struct MemorySession {
    shared: Arc<Shared>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.shared.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemorySession {
    fn state(&self) -> GatewayResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.shared.lock();
        if let Some(message) = state.fail_next.take() {
            return Err(GatewayError::unexpected(message));
        }
        Ok(state)
    }
}

fn key_for(table: &str) -> String {
    match Identifier::parse(table, "table name") {
        Ok(name) => TableRef::resolve(name).to_string(),
        Err(_) => format!("public.{table}"),
    }
}

fn missing_relation(table: &TableRef) -> GatewayError {
    GatewayError::unexpected(format!("relation \"{table}\" does not exist"))
}

/// Name the catalog reports for an engine type.
fn catalog_type(ty: EngineType) -> &'static str {
    match ty {
        EngineType::Varchar => "character varying",
        EngineType::Char => "character",
        EngineType::Decimal => "numeric",
        EngineType::Serial => "integer",
        EngineType::BigSerial => "bigint",
        EngineType::Timestamp => "timestamp without time zone",
        EngineType::Time => "time without time zone",
        EngineType::TimeTz => "time with time zone",
        EngineType::TimestampTz => "timestamp with time zone",
        EngineType::Array => "ARRAY",
        EngineType::Text => "text",
        EngineType::Integer => "integer",
        EngineType::BigInt => "bigint",
        EngineType::SmallInt => "smallint",
        EngineType::Numeric => "numeric",
        EngineType::Real => "real",
        EngineType::DoublePrecision => "double precision",
        EngineType::Boolean => "boolean",
        EngineType::Date => "date",
        EngineType::Interval => "interval",
        EngineType::Uuid => "uuid",
        EngineType::Json => "json",
        EngineType::Jsonb => "jsonb",
        EngineType::Bytea => "bytea",
        EngineType::Inet => "inet",
        EngineType::Cidr => "cidr",
        EngineType::MacAddr => "macaddr",
    }
}

#[async_trait]
impl SchemaSession for MemorySession {
    async fn server_time(&mut self) -> GatewayResult<DateTime<Utc>> {
        self.state()?;
        Ok(Utc::now())
    }

    async fn list_tables(&mut self) -> GatewayResult<Vec<String>> {
        let state = self.state()?;
        Ok(state
            .tables
            .keys()
            .filter_map(|k| k.strip_prefix("public."))
            .map(str::to_string)
            .collect())
    }

    async fn table_exists(&mut self, table: &TableRef) -> GatewayResult<bool> {
        Ok(self.state()?.tables.contains_key(&table.to_string()))
    }

    async fn column_exists(&mut self, table: &TableRef, column: &Identifier) -> GatewayResult<bool> {
        Ok(self
            .state()?
            .tables
            .get(&table.to_string())
            .is_some_and(|t| t.columns.iter().any(|c| c.name == column.as_str())))
    }

    async fn table_structure(&mut self, table: &TableRef) -> GatewayResult<Vec<ColumnInfo>> {
        let state = self.state()?;
        let columns = state
            .tables
            .get(&table.to_string())
            .map(|t| t.columns.as_slice())
            .unwrap_or_default();
        Ok(columns
            .iter()
            .map(|c| ColumnInfo {
                column_name: c.name.clone(),
                data_type: c.data_type.clone(),
                is_nullable: c.nullable,
                column_default: c.default.clone(),
            })
            .collect())
    }

    async fn table_schema(&mut self, table: &TableRef) -> GatewayResult<Vec<ColumnDetail>> {
        let state = self.state()?;
        let columns = state
            .tables
            .get(&table.to_string())
            .map(|t| t.columns.as_slice())
            .unwrap_or_default();
        Ok(columns
            .iter()
            .map(|c| ColumnDetail {
                column_name: c.name.clone(),
                data_type: c.data_type.clone(),
                character_maximum_length: None,
                is_nullable: c.nullable,
                column_default: c.default.clone(),
                is_primary_key: c.primary_key,
                is_unique: c.unique,
            })
            .collect())
    }

    async fn create_table(&mut self, spec: &TableSpec) -> GatewayResult<()> {
        let table = TableRef::public(spec.name.clone());
        let mut state = self.state()?;
        if state.tables.contains_key(&table.to_string()) {
            return Err(GatewayError::unexpected(format!(
                "relation \"{}\" already exists",
                spec.name
            )));
        }

        let mut columns = vec![
            MemoryColumn::new(ID_COLUMN, "integer")
                .primary_key()
                .default_value(&format!("nextval('{}_id_seq'::regclass)", spec.name)),
            MemoryColumn::new(OWNER_COLUMN, "uuid"),
        ];
        columns.extend(
            spec.columns
                .iter()
                .map(|c| MemoryColumn::new(c.name.as_str(), catalog_type(c.field_type.engine_type()))),
        );
        columns.push(MemoryColumn::new(CREATED_AT_COLUMN, "timestamp with time zone").default_value("now()"));
        columns.push(MemoryColumn::new(UPDATED_AT_COLUMN, "timestamp with time zone").default_value("now()"));

        state.tables.insert(
            table.to_string(),
            MemoryTable {
                columns,
                policies: OWNERSHIP_POLICIES.iter().map(|p| p.to_string()).collect(),
            },
        );
        Ok(())
    }

    async fn alter_column(&mut self, table: &TableRef, change: &ColumnChange) -> GatewayResult<()> {
        let mut state = self.state()?;
        let Some(entry) = state.tables.get_mut(&table.to_string()) else {
            return Err(missing_relation(table));
        };
        let position = entry
            .columns
            .iter()
            .position(|c| c.name == change.column().as_str());

        match (change, position) {
            (ColumnChange::Add { .. }, Some(_)) => {}
            (ColumnChange::Add { column, ty }, None) => {
                entry.columns.push(MemoryColumn::new(column.as_str(), catalog_type(*ty)));
            }
            (ColumnChange::UpdateType { ty, .. }, Some(i)) => {
                entry.columns[i].data_type = catalog_type(*ty).to_string();
            }
            (ColumnChange::Rename { new_name, .. }, Some(i)) => {
                if entry.columns.iter().any(|c| c.name == new_name.as_str()) {
                    return Err(GatewayError::unexpected(format!(
                        "column \"{new_name}\" of relation \"{}\" already exists",
                        table.name
                    )));
                }
                entry.columns[i].name = new_name.to_string();
            }
            (ColumnChange::Drop { .. }, Some(i)) => {
                entry.columns.remove(i);
            }
            (_, None) => {
                return Err(GatewayError::unexpected(format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    change.column(),
                    table.name
                )));
            }
        }
        Ok(())
    }

    async fn remove_webhook(&mut self, table: &TableRef) -> GatewayResult<()> {
        let mut state = self.state()?;
        let key = table.to_string();
        let names = trigger_names(&table.name);
        state
            .triggers
            .retain(|(t, name)| *t != key || !names.contains(name));
        state.functions.remove(&dispatch_function_name(&table.name));
        state.webhooks.remove(table.name.as_str());
        Ok(())
    }

    async fn install_webhook(&mut self, subscription: &WebhookSubscription) -> GatewayResult<()> {
        let table = &subscription.table;
        let mut state = self.state()?;
        if !state.tables.contains_key(&table.to_string()) {
            return Err(missing_relation(table));
        }

        state
            .tables
            .entry(format!("public.{WEBHOOK_CONFIG_TABLE}"))
            .or_insert_with(|| MemoryTable {
                columns: vec![
                    MemoryColumn::new("table_name", "text").primary_key(),
                    MemoryColumn::new("webhook_url", "text"),
                    MemoryColumn::new("api_key", "text"),
                    MemoryColumn::new("origin_url", "text"),
                    MemoryColumn::new(CREATED_AT_COLUMN, "timestamp with time zone").default_value("now()"),
                    MemoryColumn::new(UPDATED_AT_COLUMN, "timestamp with time zone").default_value("now()"),
                ],
                policies: vec![WEBHOOK_CONFIG_POLICY.to_string()],
            });

        state.webhooks.insert(
            table.name.to_string(),
            WebhookRecord {
                schema: table.schema,
                webhook_url: subscription.webhook_url.to_string(),
                api_key: subscription.api_key.clone(),
                origin_url: subscription.origin_url.clone(),
            },
        );
        state.functions.insert(dispatch_function_name(&table.name));
        for event in TriggerEvent::ALL {
            state
                .triggers
                .insert((table.to_string(), event.trigger_name(&table.name)));
        }
        Ok(())
    }

    async fn webhook_diagnostics(&mut self, table: &TableRef) -> GatewayResult<WebhookDiagnostics> {
        let state = self.state()?;
        let key = table.to_string();

        let triggers = TriggerEvent::ALL
            .iter()
            .filter(|e| state.triggers.contains(&(key.clone(), e.trigger_name(&table.name))))
            .map(|e| {
                json!({
                    "trigger_name": e.trigger_name(&table.name),
                    "event_manipulation": e.as_sql(),
                    "action_timing": "AFTER",
                })
            })
            .collect();

        let webhook_config = state
            .webhooks
            .get(table.name.as_str())
            .map(|r| {
                json!({
                    "table_name": table.name,
                    "webhook_url": r.webhook_url,
                    "origin_url": r.origin_url,
                })
            })
            .into_iter()
            .collect();

        Ok(WebhookDiagnostics {
            triggers,
            webhook_config,
            ..WebhookDiagnostics::default()
        })
    }

    async fn provision_profiles(&mut self) -> GatewayResult<()> {
        let mut state = self.state()?;
        let users = key_for(RESERVED_USER_TABLE);
        if !state.tables.contains_key(&users) {
            return Err(GatewayError::unexpected("relation \"auth.users\" does not exist"));
        }

        state
            .tables
            .entry(format!("public.{}", profiles::TABLE))
            .or_insert_with(|| MemoryTable {
                columns: vec![
                    MemoryColumn::new("id", "uuid").primary_key(),
                    MemoryColumn::new("email", "text"),
                    MemoryColumn::new("name", "text"),
                    MemoryColumn::new("avatar_url", "text"),
                    MemoryColumn::new(CREATED_AT_COLUMN, "timestamp with time zone").default_value("now()"),
                    MemoryColumn::new(UPDATED_AT_COLUMN, "timestamp with time zone").default_value("now()"),
                ],
                policies: Vec::new(),
            })
            .policies = profiles::POLICIES.iter().map(|p| p.to_string()).collect();

        state.functions.insert(profiles::SYNC_FUNCTION.to_string());
        state
            .triggers
            .insert((users, profiles::SYNC_TRIGGER.to_string()));
        Ok(())
    }
}
