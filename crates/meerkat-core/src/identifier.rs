//! Validated SQL identifiers and table references.
//!
//! Table and column names cannot be bound as statement parameters, so the only
//! way a caller-supplied name reaches generated DDL is through [`Identifier`],
//! which can only be constructed from a string matching the identifier grammar.

use crate::error::GatewayError;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Longest identifier Postgres keeps without truncation.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// The built-in user table owned by the external auth subsystem.
pub const RESERVED_USER_TABLE: &str = "users";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// True iff `name` matches `^[A-Za-z_][A-Za-z0-9_]*$` and is at most 63 bytes.
pub fn is_valid_identifier(name: &str) -> bool {
    name.len() <= MAX_IDENTIFIER_LEN && IDENTIFIER_RE.is_match(name)
}

/// A table or column name that passed [`is_valid_identifier`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Validate `raw`; `what` names the field in the error message
    /// (e.g. "table name").
    pub fn parse(raw: &str, what: &str) -> Result<Self, GatewayError> {
        if is_valid_identifier(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(GatewayError::validation(format!("Invalid {what}: {raw}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this names the reserved user table.
    pub fn is_reserved_user_table(&self) -> bool {
        self.0 == RESERVED_USER_TABLE
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Schemas the gateway operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaName {
    /// Working schema for every caller-created table.
    Public,
    /// Reserved for the auth subsystem's user table.
    Auth,
}

impl SchemaName {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaName::Public => "public",
            SchemaName::Auth => "auth",
        }
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table name together with the schema it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableRef {
    pub schema: SchemaName,
    pub name: Identifier,
}

impl TableRef {
    /// Resolve the schema from the name: `auth` for the reserved user table,
    /// `public` for everything else.
    pub fn resolve(name: Identifier) -> Self {
        let schema = if name.is_reserved_user_table() {
            SchemaName::Auth
        } else {
            SchemaName::Public
        };
        Self { schema, name }
    }

    /// A table in the working schema.
    pub fn public(name: Identifier) -> Self {
        Self {
            schema: SchemaName::Public,
            name,
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
