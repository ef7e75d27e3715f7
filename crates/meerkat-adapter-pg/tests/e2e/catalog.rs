//! Catalog operations: create_table, get_table_schema, manage_column,
//! list_tables.

use super::common::*;
use serde_json::json;

pub async fn run_all_tests(ctx: &TestContext) {
    test_create_then_describe(ctx).await;
    test_conflict_leaves_structure_unchanged(ctx).await;
    test_add_then_drop_restores_structure(ctx).await;
    test_update_type_and_rename(ctx).await;
    test_ownership_policies_installed(ctx).await;
    test_missing_targets(ctx).await;
    test_list_tables(ctx).await;
}

fn create_orders() -> serde_json::Value {
    json!({
        "action": "create_table",
        "table_name": "orders",
        "columns": [
            {"name": "title", "datatype": "text"},
            {"name": "total", "datatype": "number"},
            {"name": "paid", "datatype": "boolean"},
            {"name": "placed_at", "datatype": "date"},
            {"name": "meta", "datatype": "json"}
        ]
    })
}

async fn test_create_then_describe(ctx: &TestContext) {
    println!("  test_create_then_describe");

    let created = ctx.ok(create_orders()).await;
    assert_eq!(
        column_names(&created["columns"]),
        ["id", "user_id", "title", "total", "paid", "placed_at", "meta", "created_at", "updated_at"]
    );

    let schema = ctx
        .ok(json!({"action": "get_table_schema", "table_name": "orders"}))
        .await;
    let columns = schema["columns"].as_array().unwrap();
    assert_eq!(schema["count"], 9);

    let by_name = |name: &str| columns.iter().find(|c| c["column_name"] == name).unwrap();
    assert_eq!(by_name("id")["is_primary_key"], true);
    assert_eq!(by_name("total")["data_type"], "numeric");
    assert_eq!(by_name("placed_at")["data_type"], "timestamp with time zone");
    assert_eq!(by_name("meta")["data_type"], "jsonb");
    assert_eq!(by_name("title")["is_primary_key"], false);
}

async fn test_conflict_leaves_structure_unchanged(ctx: &TestContext) {
    println!("  test_conflict_leaves_structure_unchanged");

    let before = ctx
        .ok(json!({"action": "get_table_schema", "table_name": "orders"}))
        .await;
    let status = ctx
        .fails(json!({
            "action": "create_table",
            "table_name": "orders",
            "columns": [{"name": "other", "datatype": "text"}]
        }))
        .await;
    assert_eq!(status, 409);
    let after = ctx
        .ok(json!({"action": "get_table_schema", "table_name": "orders"}))
        .await;
    assert_eq!(before["columns"], after["columns"]);
}

async fn test_add_then_drop_restores_structure(ctx: &TestContext) {
    println!("  test_add_then_drop_restores_structure");

    let before = ctx
        .ok(json!({"action": "get_table_schema", "table_name": "orders"}))
        .await;
    ctx.ok(json!({
        "action": "manage_column", "subaction": "add",
        "table_name": "orders", "column_name": "notes", "column_type": "text"
    }))
    .await;
    let dropped = ctx
        .ok(json!({
            "action": "manage_column", "subaction": "drop",
            "table_name": "orders", "column_name": "notes"
        }))
        .await;
    assert_eq!(
        column_names(&dropped["table_structure"]),
        column_names(&before["columns"])
    );
}

async fn test_update_type_and_rename(ctx: &TestContext) {
    println!("  test_update_type_and_rename");

    sqlx::query(r#"INSERT INTO public.orders (title, total) VALUES ('42', 7)"#)
        .execute(&ctx.pool)
        .await
        .unwrap();

    let changed = ctx
        .ok(json!({
            "action": "manage_column", "subaction": "update_type",
            "table_name": "orders", "column_name": "title", "column_type": "integer"
        }))
        .await;
    let title = changed["table_structure"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["column_name"] == "title")
        .unwrap()
        .clone();
    assert_eq!(title["data_type"], "integer");

    let renamed = ctx
        .ok(json!({
            "action": "manage_column", "subaction": "rename",
            "table_name": "orders", "column_name": "title", "new_column_name": "code"
        }))
        .await;
    assert!(column_names(&renamed["table_structure"]).contains(&"code".to_string()));

    let (code,): (i32,) = sqlx::query_as("SELECT code FROM public.orders LIMIT 1")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(code, 42);
}

async fn test_ownership_policies_installed(ctx: &TestContext) {
    println!("  test_ownership_policies_installed");

    let policies = ctx
        .count("SELECT count(*) FROM pg_policies WHERE schemaname = 'public' AND tablename = 'orders'")
        .await;
    assert_eq!(policies, 4);
    let rls = ctx
        .count("SELECT count(*) FROM pg_class WHERE oid = 'public.orders'::regclass AND relrowsecurity")
        .await;
    assert_eq!(rls, 1);
}

async fn test_missing_targets(ctx: &TestContext) {
    println!("  test_missing_targets");

    assert_eq!(
        ctx.fails(json!({"action": "get_table_schema", "table_name": "ghost"}))
            .await,
        404
    );
    assert_eq!(
        ctx.fails(json!({
            "action": "manage_column", "subaction": "drop",
            "table_name": "orders", "column_name": "ghost"
        }))
        .await,
        404
    );
}

async fn test_list_tables(ctx: &TestContext) {
    println!("  test_list_tables");

    let listed = ctx.ok(json!({"action": "list_tables"})).await;
    let tables: Vec<&str> = listed["tables"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t.as_str())
        .collect();
    assert!(tables.contains(&"orders"));
    let mut sorted = tables.clone();
    sorted.sort();
    assert_eq!(tables, sorted);
}
