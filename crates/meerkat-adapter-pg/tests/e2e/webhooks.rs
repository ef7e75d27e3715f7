//! Webhook trigger lifecycle.

use super::common::*;
use serde_json::{Value, json};

pub async fn run_all_tests(ctx: &TestContext) {
    test_create_trigger_is_idempotent(ctx).await;
    test_write_queues_delivery(ctx).await;
    test_writes_commit_without_config_record(ctx).await;
    test_writes_commit_when_queueing_fails(ctx).await;
    test_debug_trigger(ctx).await;
    test_remove_trigger(ctx).await;
    test_user_table_triggers(ctx).await;
}

fn subscribe(table: &str, url: &str) -> serde_json::Value {
    json!({
        "action": "create_trigger",
        "table_name": table,
        "webhook_url": url,
        "webhook_api_key": "hook-key"
    })
}

const ORDERS_TRIGGERS: &str = "SELECT count(*) FROM information_schema.triggers \
     WHERE event_object_schema = 'public' AND event_object_table = 'orders' \
     AND trigger_name LIKE 'orders_%_webhook'";

async fn test_create_trigger_is_idempotent(ctx: &TestContext) {
    println!("  test_create_trigger_is_idempotent");

    ctx.ok(subscribe("orders", "https://hooks.example.com/one")).await;
    let body = ctx.ok(subscribe("orders", "https://hooks.example.com/two")).await;
    assert_eq!(body["schema"], "public");

    assert_eq!(ctx.count(ORDERS_TRIGGERS).await, 3);
    assert_eq!(
        ctx.count("SELECT count(*) FROM pg_proc WHERE proname = 'notify_webhook_orders'")
            .await,
        1
    );
    assert_eq!(
        ctx.count("SELECT count(*) FROM public.webhook_config WHERE table_name = 'orders'")
            .await,
        1
    );

    let (url,): (String,) =
        sqlx::query_as("SELECT webhook_url FROM public.webhook_config WHERE table_name = 'orders'")
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert!(url.starts_with("https://hooks.example.com/two"));
}

const QUEUED: &str = "SELECT count(*) FROM net.http_request_queue";

async fn queued(tx: &mut sqlx::PgConnection) -> i64 {
    let (n,): (i64,) = sqlx::query_as(QUEUED).fetch_one(tx).await.unwrap();
    n
}

async fn test_write_queues_delivery(ctx: &TestContext) {
    println!("  test_write_queues_delivery");

    // uncommitted queue rows are invisible to the pg_net worker
    let mut tx = ctx.pool.begin().await.unwrap();
    let before = queued(&mut tx).await;
    sqlx::query("INSERT INTO public.orders (code, total) VALUES (1, 2)")
        .execute(&mut *tx)
        .await
        .unwrap();
    assert_eq!(queued(&mut tx).await, before + 1);

    let (url, payload): (String, Value) = sqlx::query_as(
        "SELECT url, convert_from(body, 'UTF8')::jsonb \
         FROM net.http_request_queue ORDER BY id DESC LIMIT 1",
    )
    .fetch_one(&mut *tx)
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert!(url.starts_with("https://hooks.example.com/two"));
    assert_eq!(payload["operation"], "INSERT");
    assert_eq!(payload["table"], "orders");
    assert_eq!(payload["schema"], "public");
    assert_eq!(payload["data"]["code"], 1);
    assert_eq!(payload["origin"], "https://project.example.co");
    assert!(payload["timestamp"].is_string());
}

async fn test_writes_commit_without_config_record(ctx: &TestContext) {
    println!("  test_writes_commit_without_config_record");

    sqlx::query("DELETE FROM public.webhook_config WHERE table_name = 'orders'")
        .execute(&ctx.pool)
        .await
        .unwrap();

    let mut tx = ctx.pool.begin().await.unwrap();
    let before = queued(&mut tx).await;
    for sql in [
        "INSERT INTO public.orders (code, total) VALUES (900, 1)",
        "UPDATE public.orders SET total = 2 WHERE code = 900",
        "INSERT INTO public.orders (code, total) VALUES (901, 1)",
        "DELETE FROM public.orders WHERE code = 901",
    ] {
        sqlx::query(sql).execute(&mut *tx).await.unwrap();
    }
    assert_eq!(queued(&mut tx).await, before);
    tx.commit().await.unwrap();

    assert_eq!(
        ctx.count("SELECT count(*) FROM public.orders WHERE code = 900 AND total = 2")
            .await,
        1
    );
    assert_eq!(ctx.count("SELECT count(*) FROM public.orders WHERE code = 901").await, 0);

    ctx.ok(subscribe("orders", "https://hooks.example.com/two")).await;
}

async fn test_writes_commit_when_queueing_fails(ctx: &TestContext) {
    println!("  test_writes_commit_when_queueing_fails");

    // the queue rejects a request without a URL
    sqlx::raw_sql(
        "ALTER TABLE public.webhook_config ALTER COLUMN webhook_url DROP NOT NULL; \
         UPDATE public.webhook_config SET webhook_url = NULL WHERE table_name = 'orders';",
    )
    .execute(&ctx.pool)
    .await
    .unwrap();

    let mut tx = ctx.pool.begin().await.unwrap();
    let before = queued(&mut tx).await;
    for sql in [
        "INSERT INTO public.orders (code, total) VALUES (910, 1)",
        "UPDATE public.orders SET total = 3 WHERE code = 910",
        "INSERT INTO public.orders (code, total) VALUES (911, 1)",
        "DELETE FROM public.orders WHERE code = 911",
    ] {
        sqlx::query(sql).execute(&mut *tx).await.unwrap();
    }
    assert_eq!(queued(&mut tx).await, before);
    tx.commit().await.unwrap();

    assert_eq!(
        ctx.count("SELECT count(*) FROM public.orders WHERE code = 910 AND total = 3")
            .await,
        1
    );
    assert_eq!(ctx.count("SELECT count(*) FROM public.orders WHERE code = 911").await, 0);

    sqlx::raw_sql(
        "DELETE FROM public.webhook_config WHERE webhook_url IS NULL; \
         ALTER TABLE public.webhook_config ALTER COLUMN webhook_url SET NOT NULL;",
    )
    .execute(&ctx.pool)
    .await
    .unwrap();
    ctx.ok(subscribe("orders", "https://hooks.example.com/two")).await;
}

async fn test_debug_trigger(ctx: &TestContext) {
    println!("  test_debug_trigger");

    let body = ctx
        .ok(json!({"action": "debug_trigger", "table_name": "orders"}))
        .await;
    assert_eq!(body["triggers"].as_array().unwrap().len(), 3);
    assert_eq!(body["webhook_config"].as_array().unwrap().len(), 1);
    assert!(body["webhook_config"][0].get("api_key").is_none());
    assert!(body["pg_net_queue"].is_array());
    assert!(body["recent_responses"].is_array());
}

async fn test_remove_trigger(ctx: &TestContext) {
    println!("  test_remove_trigger");

    ctx.ok(json!({"action": "remove_trigger", "table_name": "orders"}))
        .await;
    assert_eq!(ctx.count(ORDERS_TRIGGERS).await, 0);
    assert_eq!(
        ctx.count("SELECT count(*) FROM pg_proc WHERE proname = 'notify_webhook_orders'")
            .await,
        0
    );
    assert_eq!(
        ctx.count("SELECT count(*) FROM public.webhook_config WHERE table_name = 'orders'")
            .await,
        0
    );

    // nothing left to remove, and a table that never existed
    ctx.ok(json!({"action": "remove_trigger", "table_name": "orders"}))
        .await;
    ctx.ok(json!({"action": "remove_trigger", "table_name": "ghost"}))
        .await;

    assert_eq!(ctx.fails(subscribe("ghost", "https://hooks.example.com/g")).await, 404);
}

async fn test_user_table_triggers(ctx: &TestContext) {
    println!("  test_user_table_triggers");

    let body = ctx.ok(subscribe("users", "https://hooks.example.com/users")).await;
    assert_eq!(body["schema"], "auth");
    assert_eq!(
        ctx.count(
            "SELECT count(*) FROM information_schema.triggers \
             WHERE event_object_schema = 'auth' AND event_object_table = 'users' \
             AND trigger_name LIKE 'users_%_webhook'"
        )
        .await,
        3
    );

    let debug = ctx.ok(json!({"action": "debug_trigger"})).await;
    assert_eq!(debug["schema"], "auth");

    ctx.ok(json!({"action": "remove_trigger", "table_name": "users"}))
        .await;
}
