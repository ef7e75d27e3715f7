//! Profile table provisioning.

use super::common::*;
use serde_json::json;
use uuid::Uuid;

pub async fn run_all_tests(ctx: &TestContext) {
    test_provision_backfills_existing_users(ctx).await;
    test_sync_trigger_follows_user_changes(ctx).await;
    test_provision_is_repeatable(ctx).await;
}

async fn insert_user(ctx: &TestContext, id: Uuid, email: &str, name: &str) {
    sqlx::query(
        "INSERT INTO auth.users (id, email, raw_user_meta_data, created_at, updated_at) \
         VALUES ($1, $2, jsonb_build_object('name', $3::text), now(), now())",
    )
    .bind(id)
    .bind(email)
    .bind(name)
    .execute(&ctx.pool)
    .await
    .unwrap();
}

async fn test_provision_backfills_existing_users(ctx: &TestContext) {
    println!("  test_provision_backfills_existing_users");

    let id = Uuid::new_v4();
    insert_user(ctx, id, "early@example.com", "Early").await;

    let body = ctx.ok(json!({"action": "create_profile_table"})).await;
    assert_eq!(body["details"]["table"], "public.profiles");

    let (name,): (Option<String>,) = sqlx::query_as("SELECT name FROM public.profiles WHERE id = $1")
        .bind(id)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("Early"));
}

async fn test_sync_trigger_follows_user_changes(ctx: &TestContext) {
    println!("  test_sync_trigger_follows_user_changes");

    let id = Uuid::new_v4();
    insert_user(ctx, id, "late@example.com", "Late").await;
    assert_eq!(
        ctx.count(&format!("SELECT count(*) FROM public.profiles WHERE id = '{id}'"))
            .await,
        1
    );

    sqlx::query("UPDATE auth.users SET email = 'later@example.com' WHERE id = $1")
        .bind(id)
        .execute(&ctx.pool)
        .await
        .unwrap();
    let (email,): (Option<String>,) = sqlx::query_as("SELECT email FROM public.profiles WHERE id = $1")
        .bind(id)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(email.as_deref(), Some("later@example.com"));

    sqlx::query("DELETE FROM auth.users WHERE id = $1")
        .bind(id)
        .execute(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(
        ctx.count(&format!("SELECT count(*) FROM public.profiles WHERE id = '{id}'"))
            .await,
        0
    );
}

async fn test_provision_is_repeatable(ctx: &TestContext) {
    println!("  test_provision_is_repeatable");

    ctx.ok(json!({"action": "create_profile_table"})).await;
    assert_eq!(
        ctx.count("SELECT count(*) FROM pg_policies WHERE schemaname = 'public' AND tablename = 'profiles'")
            .await,
        2
    );
    assert_eq!(
        ctx.count("SELECT count(*) FROM information_schema.triggers WHERE trigger_name = 'on_auth_user_profile_sync'")
            .await,
        3
    );
}
