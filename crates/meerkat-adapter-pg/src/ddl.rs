//! Statement builders for catalog DDL.
//!
//! Names only reach these functions as [`Identifier`]s or names derived from
//! them, so quoting never has to deal with arbitrary input. Types only reach
//! them as [`EngineType`]s.

use meerkat_core::catalog::{
    CREATED_AT_COLUMN, ID_COLUMN, OWNER_COLUMN, OWNERSHIP_POLICIES, TriggerEvent, UPDATED_AT_COLUMN,
    dispatch_function_name,
};
use meerkat_core::{ColumnChange, Identifier, TableRef, TableSpec};

/// Double-quote an identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `schema."name"`
pub fn qualified(table: &TableRef) -> String {
    format!("{}.{}", table.schema, quote_ident(table.name.as_str()))
}

/// `public."notify_webhook_<table>"`
pub fn dispatch_function(table: &Identifier) -> String {
    format!("public.{}", quote_ident(&dispatch_function_name(table)))
}

pub fn create_table(spec: &TableSpec) -> String {
    let table = TableRef::public(spec.name.clone());

    let mut columns = vec![
        format!("{} SERIAL PRIMARY KEY", quote_ident(ID_COLUMN)),
        format!(
            "{} UUID REFERENCES auth.users(id) ON DELETE CASCADE",
            quote_ident(OWNER_COLUMN)
        ),
    ];
    columns.extend(spec.columns.iter().map(|c| {
        format!(
            "{} {}",
            quote_ident(c.name.as_str()),
            c.field_type.engine_type().as_sql()
        )
    }));
    columns.push(format!("{} TIMESTAMPTZ DEFAULT NOW()", quote_ident(CREATED_AT_COLUMN)));
    columns.push(format!("{} TIMESTAMPTZ DEFAULT NOW()", quote_ident(UPDATED_AT_COLUMN)));

    format!("CREATE TABLE {} ({})", qualified(&table), columns.join(", "))
}

pub fn enable_rls(table: &TableRef) -> String {
    format!("ALTER TABLE {} ENABLE ROW LEVEL SECURITY", qualified(table))
}

/// The four row-ownership policies, in the order of [`OWNERSHIP_POLICIES`].
pub fn ownership_policies(table: &TableRef) -> Vec<String> {
    let owner = format!("auth.uid() = {}", quote_ident(OWNER_COLUMN));
    let target = qualified(table);
    let [view, insert, update, delete] = OWNERSHIP_POLICIES.map(quote_ident);
    vec![
        format!("CREATE POLICY {view} ON {target} FOR SELECT USING ({owner})"),
        format!("CREATE POLICY {insert} ON {target} FOR INSERT WITH CHECK ({owner})"),
        format!("CREATE POLICY {update} ON {target} FOR UPDATE USING ({owner}) WITH CHECK ({owner})"),
        format!("CREATE POLICY {delete} ON {target} FOR DELETE USING ({owner})"),
    ]
}

/// Exactly one `ALTER TABLE` statement. Type changes always cast through
/// text.
pub fn alter_column(table: &TableRef, change: &ColumnChange) -> String {
    let target = qualified(table);
    match change {
        ColumnChange::Add { column, ty } => format!(
            "ALTER TABLE {target} ADD COLUMN IF NOT EXISTS {} {}",
            quote_ident(column.as_str()),
            ty.as_sql()
        ),
        ColumnChange::UpdateType { column, ty } => {
            let col = quote_ident(column.as_str());
            let ty = ty.as_sql();
            format!("ALTER TABLE {target} ALTER COLUMN {col} TYPE {ty} USING {col}::text::{ty}")
        }
        ColumnChange::Rename { column, new_name } => format!(
            "ALTER TABLE {target} RENAME COLUMN {} TO {}",
            quote_ident(column.as_str()),
            quote_ident(new_name.as_str())
        ),
        ColumnChange::Drop { column } => format!(
            "ALTER TABLE {target} DROP COLUMN IF EXISTS {}",
            quote_ident(column.as_str())
        ),
    }
}

pub fn drop_trigger(table: &TableRef, event: TriggerEvent) -> String {
    format!(
        "DROP TRIGGER IF EXISTS {} ON {}",
        quote_ident(&event.trigger_name(&table.name)),
        qualified(table)
    )
}

pub fn create_trigger(table: &TableRef, event: TriggerEvent) -> String {
    format!(
        "CREATE TRIGGER {} AFTER {} ON {} FOR EACH ROW EXECUTE FUNCTION {}()",
        quote_ident(&event.trigger_name(&table.name)),
        event.as_sql(),
        qualified(table),
        dispatch_function(&table.name)
    )
}

pub fn drop_dispatch_function(table: &Identifier) -> String {
    format!("DROP FUNCTION IF EXISTS {}()", dispatch_function(table))
}
