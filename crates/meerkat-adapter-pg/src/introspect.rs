use chrono::{DateTime, Utc};
use meerkat_core::{ColumnDetail, ColumnInfo, Identifier, TableRef};
use serde_json::Value;
use sqlx::{PgConnection, Row};

pub async fn server_time(conn: &mut PgConnection) -> Result<DateTime<Utc>, sqlx::Error> {
    let (now,): (DateTime<Utc>,) = sqlx::query_as("select now()").fetch_one(&mut *conn).await?;
    Ok(now)
}

/// Base tables of the working schema, ordered by name.
pub async fn list_tables(conn: &mut PgConnection) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        select table_name::text as table_name
        from information_schema.tables
        where table_schema = 'public'
          and table_type = 'BASE TABLE'
        order by table_name
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(|r| r.get("table_name")).collect())
}

pub async fn table_exists(conn: &mut PgConnection, table: &TableRef) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from information_schema.tables
            where table_schema = $1 and table_name = $2
        )
        "#,
    )
    .bind(table.schema.as_str())
    .bind(table.name.as_str())
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

pub async fn column_exists(
    conn: &mut PgConnection,
    table: &TableRef,
    column: &Identifier,
) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from information_schema.columns
            where table_schema = $1 and table_name = $2 and column_name = $3
        )
        "#,
    )
    .bind(table.schema.as_str())
    .bind(table.name.as_str())
    .bind(column.as_str())
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

pub async fn table_structure(
    conn: &mut PgConnection,
    table: &TableRef,
) -> Result<Vec<ColumnInfo>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        select column_name::text as column_name,
               data_type::text as data_type,
               is_nullable::text as is_nullable,
               column_default::text as column_default
        from information_schema.columns
        where table_schema = $1 and table_name = $2
        order by ordinal_position
        "#,
    )
    .bind(table.schema.as_str())
    .bind(table.name.as_str())
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| {
            let is_nullable: String = r.get("is_nullable");
            ColumnInfo {
                column_name: r.get("column_name"),
                data_type: r.get("data_type"),
                is_nullable: is_nullable == "YES",
                column_default: r.get("column_default"),
            }
        })
        .collect())
}

/// Columns with primary-key and unique-constraint membership.
pub async fn table_schema(
    conn: &mut PgConnection,
    table: &TableRef,
) -> Result<Vec<ColumnDetail>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        select
          c.column_name::text as column_name,
          c.data_type::text as data_type,
          c.character_maximum_length::int4 as character_maximum_length,
          c.is_nullable::text as is_nullable,
          c.column_default::text as column_default,
          exists (
            select 1
            from information_schema.table_constraints tc
            join information_schema.key_column_usage ku
              on tc.constraint_name = ku.constraint_name
             and tc.table_schema = ku.table_schema
            where tc.constraint_type = 'PRIMARY KEY'
              and tc.table_schema = c.table_schema
              and tc.table_name = c.table_name
              and ku.column_name = c.column_name
          ) as is_primary_key,
          exists (
            select 1
            from information_schema.table_constraints tc
            join information_schema.key_column_usage ku
              on tc.constraint_name = ku.constraint_name
             and tc.table_schema = ku.table_schema
            where tc.constraint_type = 'UNIQUE'
              and tc.table_schema = c.table_schema
              and tc.table_name = c.table_name
              and ku.column_name = c.column_name
          ) as is_unique
        from information_schema.columns c
        where c.table_schema = $1 and c.table_name = $2
        order by c.ordinal_position
        "#,
    )
    .bind(table.schema.as_str())
    .bind(table.name.as_str())
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| {
            let is_nullable: String = r.get("is_nullable");
            ColumnDetail {
                column_name: r.get("column_name"),
                data_type: r.get("data_type"),
                character_maximum_length: r.get("character_maximum_length"),
                is_nullable: is_nullable == "YES",
                column_default: r.get("column_default"),
                is_primary_key: r.get("is_primary_key"),
                is_unique: r.get("is_unique"),
            }
        })
        .collect())
}

/// Whether a relation resolves, e.g. `net.http_request_queue`.
pub async fn relation_exists(conn: &mut PgConnection, name: &str) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as("select to_regclass($1::text) is not null")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// Run `select` and return its rows as JSON objects. `select` must not end
/// with a semicolon; it is wrapped as a subquery.
pub async fn json_rows(
    conn: &mut PgConnection,
    select: &str,
    binds: &[&str],
) -> Result<Vec<Value>, sqlx::Error> {
    let sql = format!("select coalesce(jsonb_agg(to_jsonb(t)), '[]'::jsonb) from ({select}) t");
    let mut query = sqlx::query_as::<_, (Value,)>(&sql);
    for bind in binds {
        query = query.bind(*bind);
    }
    let (rows,) = query.fetch_one(&mut *conn).await?;
    Ok(match rows {
        Value::Array(rows) => rows,
        _ => Vec::new(),
    })
}
