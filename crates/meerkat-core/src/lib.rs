//! # meerkat-core
//!
//! Types shared by every Meerkat crate: configuration, the error taxonomy,
//! validated identifiers, the two column-type vocabularies, catalog
//! descriptors, the error sanitizer and the authentication gate.

pub mod catalog;
pub mod config;
pub mod error;
pub mod gate;
pub mod identifier;
pub mod sanitize;
pub mod types;

pub use catalog::{
    ColumnChange, ColumnDetail, ColumnInfo, ColumnSpec, TableSpec, TriggerEvent, WebhookDiagnostics,
    WebhookSubscription,
};
pub use config::{ConfigError, MeerkatConfig, SecretsConfig, UpstreamConfig};
pub use error::{GatewayError, GatewayResult};
pub use gate::AuthGate;
pub use identifier::{Identifier, SchemaName, TableRef, is_valid_identifier};
pub use sanitize::sanitize_error;
pub use types::{EngineType, FieldType};
