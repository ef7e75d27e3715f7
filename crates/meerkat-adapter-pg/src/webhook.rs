//! Database-resident change notification.
//!
//! Installing a webhook stores one configuration record per table and binds
//! three AFTER triggers to a per-table dispatch function. The function reads
//! the record on every fire and queues the POST through `pg_net`, so
//! delivery never blocks or fails the triggering write.

use crate::ddl;
use crate::introspect::{json_rows, relation_exists, table_exists};
use meerkat_core::catalog::{TriggerEvent, WEBHOOK_CONFIG_POLICY, WEBHOOK_CONFIG_TABLE};
use meerkat_core::{Identifier, TableRef, WebhookDiagnostics, WebhookSubscription};
use sqlx::PgConnection;

/// Rows shown by diagnostics from each pg_net table.
const DIAGNOSTIC_ROW_LIMIT: u32 = 10;

/// Per-request timeout handed to `net.http_post`.
pub const DELIVERY_TIMEOUT_MS: u32 = 5000;

const ENSURE_PG_NET: &str = "CREATE EXTENSION IF NOT EXISTS pg_net";

const CREATE_CONFIG_STORE: &str = r#"
CREATE TABLE IF NOT EXISTS public.webhook_config (
    table_name TEXT PRIMARY KEY,
    webhook_url TEXT NOT NULL,
    api_key TEXT NOT NULL,
    origin_url TEXT,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ DEFAULT NOW()
)"#;

const UPSERT_CONFIG: &str = r#"
INSERT INTO public.webhook_config (table_name, webhook_url, api_key, origin_url)
VALUES ($1, $2, $3, $4)
ON CONFLICT (table_name) DO UPDATE SET
    webhook_url = EXCLUDED.webhook_url,
    api_key = EXCLUDED.api_key,
    origin_url = EXCLUDED.origin_url,
    updated_at = NOW()"#;

/// Lets the dispatch function reach pg_net and the store when it fires on
/// the auth user table.
const USER_TABLE_GRANTS: [&str; 3] = [
    "GRANT USAGE ON SCHEMA net TO postgres",
    "GRANT EXECUTE ON ALL FUNCTIONS IN SCHEMA net TO postgres",
    "GRANT SELECT ON public.webhook_config TO postgres",
];

/// Statements that create the configuration store and its admin-only policy.
pub fn config_store_statements() -> Vec<String> {
    let policy = ddl::quote_ident(WEBHOOK_CONFIG_POLICY);
    let admin = "EXISTS (SELECT 1 FROM auth.users \
                 WHERE auth.users.id = auth.uid() \
                 AND (auth.users.raw_user_meta_data->>'role' = 'admin' \
                 OR auth.users.email LIKE '%@admin.%'))";
    vec![
        CREATE_CONFIG_STORE.to_string(),
        format!("ALTER TABLE public.{WEBHOOK_CONFIG_TABLE} ENABLE ROW LEVEL SECURITY"),
        format!("DROP POLICY IF EXISTS {policy} ON public.{WEBHOOK_CONFIG_TABLE}"),
        format!(
            "CREATE POLICY {policy} ON public.{WEBHOOK_CONFIG_TABLE} FOR ALL \
             USING ({admin}) WITH CHECK ({admin})"
        ),
    ]
}

/// The per-table dispatch function.
///
/// Looks up the table's record, returns the row untouched when there is none,
/// and otherwise queues `{operation, table, schema, data, origin, timestamp}`
/// to the stored URL. Every failure is turned into a warning.
pub fn dispatch_function(table: &Identifier) -> String {
    format!(
        r#"
CREATE OR REPLACE FUNCTION {function}()
RETURNS TRIGGER
SECURITY DEFINER
SET search_path = public, auth
AS $$
DECLARE
    config_record RECORD;
    payload JSONB;
    row_data JSONB;
    request_id BIGINT;
BEGIN
    SELECT webhook_url, api_key, origin_url
      INTO config_record
      FROM public.webhook_config
     WHERE table_name = TG_TABLE_NAME;

    IF NOT FOUND THEN
        RAISE WARNING 'No webhook configuration found for table % (schema %)', TG_TABLE_NAME, TG_TABLE_SCHEMA;
        IF TG_OP = 'DELETE' THEN RETURN OLD; END IF;
        RETURN NEW;
    END IF;

    IF TG_OP = 'DELETE' THEN
        row_data := row_to_json(OLD)::jsonb;
    ELSE
        row_data := row_to_json(NEW)::jsonb;
    END IF;

    payload := jsonb_build_object(
        'operation', TG_OP,
        'table', TG_TABLE_NAME,
        'schema', TG_TABLE_SCHEMA,
        'data', row_data,
        'origin', config_record.origin_url,
        'timestamp', now()
    );

    BEGIN
        request_id := net.http_post(
            url := config_record.webhook_url,
            headers := jsonb_build_object(
                'Content-Type', 'application/json',
                'x-api-key', config_record.api_key
            ),
            body := payload,
            timeout_milliseconds := {timeout}
        );
        RAISE NOTICE 'webhook queued for table %: request %', TG_TABLE_NAME, request_id;
    EXCEPTION WHEN OTHERS THEN
        RAISE WARNING 'pg_net error for table %: % (SQLSTATE %)', TG_TABLE_NAME, SQLERRM, SQLSTATE;
    END;

    IF TG_OP = 'DELETE' THEN RETURN OLD; END IF;
    RETURN NEW;
EXCEPTION WHEN OTHERS THEN
    RAISE WARNING 'webhook trigger error for table %: % (SQLSTATE %)', TG_TABLE_NAME, SQLERRM, SQLSTATE;
    IF TG_OP = 'DELETE' THEN RETURN OLD; END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql"#,
        function = ddl::dispatch_function(table),
        timeout = DELIVERY_TIMEOUT_MS,
    )
}

async fn execute(conn: &mut PgConnection, sql: &str) -> Result<(), sqlx::Error> {
    sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await?;
    Ok(())
}

/// Install wiring for a table that has none.
pub async fn install(
    conn: &mut PgConnection,
    subscription: &WebhookSubscription,
) -> Result<(), sqlx::Error> {
    let table = &subscription.table;

    execute(conn, ENSURE_PG_NET).await?;
    for statement in config_store_statements() {
        execute(conn, &statement).await?;
    }

    sqlx::query(UPSERT_CONFIG)
        .bind(table.name.as_str())
        .bind(subscription.webhook_url.as_str())
        .bind(&subscription.api_key)
        .bind(subscription.origin_url.as_deref())
        .execute(&mut *conn)
        .await?;

    execute(conn, &dispatch_function(&table.name)).await?;

    if table.name.is_reserved_user_table() {
        for grant in USER_TABLE_GRANTS {
            execute(conn, grant).await?;
        }
    }

    for event in TriggerEvent::ALL {
        execute(conn, &ddl::drop_trigger(table, event)).await?;
        execute(conn, &ddl::create_trigger(table, event)).await?;
    }

    tracing::debug!(table = %table, url = %subscription.webhook_url, "webhook wiring installed");
    Ok(())
}

/// Remove triggers, function and record. Each step is skipped when the
/// object it touches is gone.
pub async fn remove(conn: &mut PgConnection, table: &TableRef) -> Result<(), sqlx::Error> {
    if table_exists(conn, table).await? {
        for event in TriggerEvent::ALL {
            execute(conn, &ddl::drop_trigger(table, event)).await?;
        }
    }

    execute(conn, &ddl::drop_dispatch_function(&table.name)).await?;

    if relation_exists(conn, &format!("public.{WEBHOOK_CONFIG_TABLE}")).await? {
        sqlx::query("DELETE FROM public.webhook_config WHERE table_name = $1")
            .bind(table.name.as_str())
            .execute(&mut *conn)
            .await?;
    }

    tracing::debug!(table = %table, "webhook wiring removed");
    Ok(())
}

pub async fn diagnostics(
    conn: &mut PgConnection,
    table: &TableRef,
) -> Result<WebhookDiagnostics, sqlx::Error> {
    let triggers = json_rows(
        conn,
        "select trigger_name, event_manipulation, action_timing, action_statement \
         from information_schema.triggers \
         where event_object_schema = $1 and event_object_table = $2 \
         order by trigger_name, event_manipulation",
        &[table.schema.as_str(), table.name.as_str()],
    )
    .await?;

    let webhook_config = if relation_exists(conn, &format!("public.{WEBHOOK_CONFIG_TABLE}")).await? {
        json_rows(
            conn,
            "select table_name, webhook_url, origin_url, created_at, updated_at \
             from public.webhook_config where table_name = $1",
            &[table.name.as_str()],
        )
        .await?
    } else {
        Vec::new()
    };

    let pg_net_queue = if relation_exists(conn, "net.http_request_queue").await? {
        json_rows(
            conn,
            &format!(
                "select id, method, url, timeout_milliseconds \
                 from net.http_request_queue order by id desc limit {DIAGNOSTIC_ROW_LIMIT}"
            ),
            &[],
        )
        .await?
    } else {
        Vec::new()
    };

    let recent_responses = if relation_exists(conn, "net._http_response").await? {
        json_rows(
            conn,
            &format!(
                "select id, status_code, content::text as content, error_msg, created \
                 from net._http_response order by created desc limit {DIAGNOSTIC_ROW_LIMIT}"
            ),
            &[],
        )
        .await?
    } else {
        Vec::new()
    };

    Ok(WebhookDiagnostics {
        triggers,
        webhook_config,
        pg_net_queue,
        recent_responses,
    })
}
