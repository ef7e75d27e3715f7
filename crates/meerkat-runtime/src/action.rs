//! Request envelope and the closed set of actions it can name.
//!
//! Every caller-supplied value is validated here, before a database session
//! is opened.

use meerkat_core::error::Hint;
use meerkat_core::identifier::RESERVED_USER_TABLE;
use meerkat_core::{
    ColumnChange, ColumnSpec, EngineType, FieldType, GatewayError, GatewayResult, Identifier,
    TableRef, TableSpec, WebhookSubscription,
};
use serde::Deserialize;
use serde_json::{Value, json};

/// The JSON body of an automation request. Fields beyond `action` are only
/// read by the actions that use them.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ActionRequest {
    pub action: Option<String>,
    pub subaction: Option<String>,
    pub table_name: Option<String>,
    pub column_name: Option<String>,
    pub column_type: Option<String>,
    pub new_column_name: Option<String>,
    pub columns: Option<Value>,
    pub webhook_url: Option<String>,
    pub webhook_api_key: Option<String>,
}

impl ActionRequest {
    /// Decode a request body. Anything that is not a JSON object with the
    /// expected field types is a 400.
    pub fn from_value(body: Value) -> GatewayResult<Self> {
        if !body.is_object() {
            return Err(GatewayError::bad_request("Request body must be a JSON object", None));
        }
        serde_json::from_value(body)
            .map_err(|e| GatewayError::bad_request(format!("Invalid request body: {e}"), None))
    }
}

/// A fully validated action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Answered from configuration, never from the database.
    GetServiceKey,
    Session(SessionAction),
}

/// Actions that run against one database session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    TestConnection,
    ListTables,
    GetTableSchema { table: TableRef },
    CreateTable(TableSpec),
    ManageColumn { table: TableRef, change: ColumnChange },
    CreateTrigger(WebhookSubscription),
    RemoveTrigger { table: TableRef },
    DebugTrigger { table: TableRef },
    CreateProfileTable,
}

impl Action {
    /// Names accepted in the `action` field.
    pub const NAMES: [&'static str; 10] = [
        "get_service_key",
        "test_connection",
        "list_tables",
        "get_table_schema",
        "create_table",
        "manage_column",
        "create_trigger",
        "remove_trigger",
        "debug_trigger",
        "create_profile_table",
    ];

    /// Validate `request` into an action. `origin_url` is embedded into
    /// webhook subscriptions.
    pub fn parse(request: ActionRequest, origin_url: Option<String>) -> GatewayResult<Self> {
        let Some(name) = request.action.as_deref().filter(|a| !a.is_empty()) else {
            return Err(GatewayError::bad_request("Action is required", None));
        };

        match name {
            "get_service_key" => Ok(Action::GetServiceKey),
            _ => SessionAction::parse(name, &request, origin_url).map(Action::Session),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::GetServiceKey => "get_service_key",
            Action::Session(action) => action.name(),
        }
    }

    /// The table this action targets, if any.
    pub fn table(&self) -> Option<String> {
        match self {
            Action::GetServiceKey => None,
            Action::Session(action) => action.table(),
        }
    }
}

impl SessionAction {
    fn parse(name: &str, request: &ActionRequest, origin_url: Option<String>) -> GatewayResult<Self> {
        match name {
            "test_connection" => Ok(SessionAction::TestConnection),
            "list_tables" => Ok(SessionAction::ListTables),
            "get_table_schema" => {
                let name = required(request.table_name.as_deref(), "table_name is required")?;
                let table = Identifier::parse(name, "table name")?;
                Ok(SessionAction::GetTableSchema {
                    table: TableRef::public(table),
                })
            }
            "create_table" => parse_create_table(request).map(SessionAction::CreateTable),
            "manage_column" => parse_manage_column(request),
            "create_trigger" => parse_create_trigger(request, origin_url),
            "remove_trigger" => {
                let name = required(request.table_name.as_deref(), "table_name is required")?;
                Ok(SessionAction::RemoveTrigger {
                    table: TableRef::resolve(Identifier::parse(name, "table name")?),
                })
            }
            "debug_trigger" => {
                let name = request
                    .table_name
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(RESERVED_USER_TABLE);
                Ok(SessionAction::DebugTrigger {
                    table: TableRef::resolve(Identifier::parse(name, "table name")?),
                })
            }
            "create_profile_table" => Ok(SessionAction::CreateProfileTable),
            _ => Err(GatewayError::bad_request(
                "Unknown action",
                Some(available_actions()),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionAction::TestConnection => "test_connection",
            SessionAction::ListTables => "list_tables",
            SessionAction::GetTableSchema { .. } => "get_table_schema",
            SessionAction::CreateTable(_) => "create_table",
            SessionAction::ManageColumn { .. } => "manage_column",
            SessionAction::CreateTrigger(_) => "create_trigger",
            SessionAction::RemoveTrigger { .. } => "remove_trigger",
            SessionAction::DebugTrigger { .. } => "debug_trigger",
            SessionAction::CreateProfileTable => "create_profile_table",
        }
    }

    /// The table this action targets, if any.
    pub fn table(&self) -> Option<String> {
        match self {
            SessionAction::GetTableSchema { table }
            | SessionAction::ManageColumn { table, .. }
            | SessionAction::RemoveTrigger { table }
            | SessionAction::DebugTrigger { table } => Some(table.to_string()),
            SessionAction::CreateTable(spec) => Some(TableRef::public(spec.name.clone()).to_string()),
            SessionAction::CreateTrigger(sub) => Some(sub.table.to_string()),
            SessionAction::TestConnection
            | SessionAction::ListTables
            | SessionAction::CreateProfileTable => None,
        }
    }
}

fn available_actions() -> Hint {
    let mut names: Vec<String> = Action::NAMES.iter().map(|n| n.to_string()).collect();
    if let Some(entry) = names.iter_mut().find(|n| n.as_str() == "manage_column") {
        *entry = format!("manage_column (subactions: {})", ColumnChange::SUBACTIONS.join(", "));
    }
    ("available_actions", json!(names))
}

fn required<'a>(value: Option<&'a str>, message: &str) -> GatewayResult<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::validation(message))
}

fn parse_create_table(request: &ActionRequest) -> GatewayResult<TableSpec> {
    const MISSING: &str = "table_name and columns array are required";

    let name = required(request.table_name.as_deref(), MISSING)?;
    let Some(Value::Array(raw_columns)) = &request.columns else {
        return Err(GatewayError::validation(MISSING));
    };

    let table = Identifier::parse(name, "table name")?;

    let mut columns = Vec::with_capacity(raw_columns.len());
    for raw in raw_columns {
        let (Some(col_name), Some(datatype)) = (
            raw.get("name").and_then(Value::as_str),
            raw.get("datatype").and_then(Value::as_str),
        ) else {
            return Err(GatewayError::validation(
                "Each column must be an object with 'name' and 'datatype' properties",
            ));
        };

        let name = Identifier::parse(col_name, "column name")?;
        let field_type = FieldType::parse(datatype).ok_or_else(|| {
            GatewayError::validation(format!(
                "Invalid datatype '{datatype}' for column '{col_name}'. Allowed: {}",
                FieldType::allowed_list()
            ))
        })?;
        columns.push(ColumnSpec { name, field_type });
    }

    TableSpec::new(table, columns)
}

fn parse_manage_column(request: &ActionRequest) -> GatewayResult<SessionAction> {
    let subaction = request.subaction.as_deref().unwrap_or_default();
    if !ColumnChange::SUBACTIONS.contains(&subaction) {
        return Err(GatewayError::validation_with(
            "Valid subaction is required",
            "valid_subactions",
            json!(ColumnChange::SUBACTIONS),
        ));
    }

    let table = valid_identifier(request.table_name.as_deref(), "Valid table_name is required")?;
    let column = valid_identifier(request.column_name.as_deref(), "Valid column_name is required")?;

    let change = match subaction {
        "add" => ColumnChange::Add {
            column,
            ty: engine_type(request.column_type.as_deref())?,
        },
        "update_type" => ColumnChange::UpdateType {
            column,
            ty: engine_type(request.column_type.as_deref())?,
        },
        "rename" => ColumnChange::Rename {
            column,
            new_name: valid_identifier(
                request.new_column_name.as_deref(),
                "Valid new_column_name is required",
            )?,
        },
        _ => ColumnChange::Drop { column },
    };

    Ok(SessionAction::ManageColumn {
        table: TableRef::public(table),
        change,
    })
}

fn valid_identifier(raw: Option<&str>, message: &str) -> GatewayResult<Identifier> {
    raw.and_then(|r| Identifier::parse(r, "identifier").ok())
        .ok_or_else(|| GatewayError::validation(message))
}

fn engine_type(raw: Option<&str>) -> GatewayResult<EngineType> {
    raw.and_then(EngineType::parse).ok_or_else(|| {
        GatewayError::validation_with(
            "Valid column_type is required",
            "allowed_types",
            EngineType::allowed_names(),
        )
    })
}

fn parse_create_trigger(
    request: &ActionRequest,
    origin_url: Option<String>,
) -> GatewayResult<SessionAction> {
    const MISSING: &str = "table_name, webhook_url, and webhook_api_key are required";

    let name = required(request.table_name.as_deref(), MISSING)?;
    let url = required(request.webhook_url.as_deref(), MISSING)?;
    let api_key = required(request.webhook_api_key.as_deref(), MISSING)?;

    let table = TableRef::resolve(Identifier::parse(name, "table name")?);
    WebhookSubscription::new(table, url, api_key, origin_url).map(SessionAction::CreateTrigger)
}
