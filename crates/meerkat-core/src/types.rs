//! Column type vocabularies.
//!
//! Two independent allowlists exist on purpose:
//! - [`EngineType`] names Postgres types directly and is only accepted by
//!   `manage_column`.
//! - [`FieldType`] is the caller-facing vocabulary of `create_table`; it maps
//!   onto engine types and can never name one directly.

use serde_json::{Value, json};
use std::fmt;

/// Postgres column types `manage_column` may add or convert to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineType {
    Text,
    Varchar,
    Char,
    Integer,
    BigInt,
    SmallInt,
    Decimal,
    Numeric,
    Real,
    DoublePrecision,
    Serial,
    BigSerial,
    Boolean,
    Date,
    Timestamp,
    TimestampTz,
    Time,
    TimeTz,
    Interval,
    Uuid,
    Json,
    Jsonb,
    Bytea,
    Array,
    Inet,
    Cidr,
    MacAddr,
}

impl EngineType {
    pub const ALL: [EngineType; 27] = [
        EngineType::Text,
        EngineType::Varchar,
        EngineType::Char,
        EngineType::Integer,
        EngineType::BigInt,
        EngineType::SmallInt,
        EngineType::Decimal,
        EngineType::Numeric,
        EngineType::Real,
        EngineType::DoublePrecision,
        EngineType::Serial,
        EngineType::BigSerial,
        EngineType::Boolean,
        EngineType::Date,
        EngineType::Timestamp,
        EngineType::TimestampTz,
        EngineType::Time,
        EngineType::TimeTz,
        EngineType::Interval,
        EngineType::Uuid,
        EngineType::Json,
        EngineType::Jsonb,
        EngineType::Bytea,
        EngineType::Array,
        EngineType::Inet,
        EngineType::Cidr,
        EngineType::MacAddr,
    ];

    /// Name as callers spell it (upper case).
    pub fn name(&self) -> &'static str {
        match self {
            EngineType::Text => "TEXT",
            EngineType::Varchar => "VARCHAR",
            EngineType::Char => "CHAR",
            EngineType::Integer => "INTEGER",
            EngineType::BigInt => "BIGINT",
            EngineType::SmallInt => "SMALLINT",
            EngineType::Decimal => "DECIMAL",
            EngineType::Numeric => "NUMERIC",
            EngineType::Real => "REAL",
            EngineType::DoublePrecision => "DOUBLE PRECISION",
            EngineType::Serial => "SERIAL",
            EngineType::BigSerial => "BIGSERIAL",
            EngineType::Boolean => "BOOLEAN",
            EngineType::Date => "DATE",
            EngineType::Timestamp => "TIMESTAMP",
            EngineType::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            EngineType::Time => "TIME",
            EngineType::TimeTz => "TIME WITH TIME ZONE",
            EngineType::Interval => "INTERVAL",
            EngineType::Uuid => "UUID",
            EngineType::Json => "JSON",
            EngineType::Jsonb => "JSONB",
            EngineType::Bytea => "BYTEA",
            EngineType::Array => "ARRAY",
            EngineType::Inet => "INET",
            EngineType::Cidr => "CIDR",
            EngineType::MacAddr => "MACADDR",
        }
    }

    /// Type expression emitted into DDL. `ARRAY` has no element type of its
    /// own in Postgres and is realised as a text array.
    pub fn as_sql(&self) -> &'static str {
        match self {
            EngineType::Array => "TEXT[]",
            other => other.name(),
        }
    }

    /// Case-insensitive lookup; runs of whitespace count as one space.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        Self::ALL.into_iter().find(|t| t.name() == normalized)
    }

    /// The allowlist as JSON, for error hints.
    pub fn allowed_names() -> Value {
        json!(Self::ALL.iter().map(|t| t.name()).collect::<Vec<_>>())
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Simplified type vocabulary accepted by `create_table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    Json,
}

impl FieldType {
    pub const ALL: [FieldType; 5] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::Json,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Json => "json",
        }
    }

    /// Case-insensitive lookup.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.name() == lowered)
    }

    /// The engine type this vocabulary entry is stored as.
    pub fn engine_type(&self) -> EngineType {
        match self {
            FieldType::Text => EngineType::Text,
            FieldType::Number => EngineType::Numeric,
            FieldType::Boolean => EngineType::Boolean,
            FieldType::Date => EngineType::TimestampTz,
            FieldType::Json => EngineType::Jsonb,
        }
    }

    /// `"text, number, boolean, date, json"`
    pub fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
