//! Live-engine routing tests. These provision real tenant stores, so they
//! only run when DATABASE_URL points at a Postgres instance with CREATEDB
//! rights; otherwise each test skips.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde_json::json;

use chatdesk_api::database::models::{AgentMetric, Message, WhatsAppSession};
use chatdesk_api::database::TenantRouter;
use chatdesk_api::services::AggregateService;

fn engine_available() -> bool {
    let _ = dotenvy::dotenv();
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("skipping: DATABASE_URL not set");
        return false;
    }
    true
}

fn unique_tenant_id(label: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("it_{label}_{nanos}")
}

#[tokio::test]
async fn routed_writes_stay_inside_their_tenant_store() -> Result<()> {
    if !engine_available() {
        return Ok(());
    }

    let router = Arc::new(TenantRouter::connect().await?);
    let tenant_a = unique_tenant_id("a");
    let tenant_b = unique_tenant_id("b");

    // First access provisions an empty, schema-complete store
    let count = router.route_scalar(&tenant_a, "SELECT COUNT(*) FROM agents").await?;
    assert_eq!(count, 0);

    router
        .route_query(
            &tenant_a,
            "INSERT INTO agents (name, personality, ai_provider, model) VALUES ($1, $2, $3, $4)",
            &[
                json!("Support Bot"),
                json!("friendly"),
                json!("chatgpt"),
                json!("gpt-4o-mini"),
            ],
        )
        .await?;

    let count = router.route_scalar(&tenant_a, "SELECT COUNT(*) FROM agents").await?;
    assert_eq!(count, 1);

    // A second tenant gets its own store and never sees the first's rows
    let handle_a = router.get_store_for(&tenant_a).await?;
    let handle_b = router.get_store_for(&tenant_b).await?;
    assert!(!Arc::ptr_eq(&handle_a, &handle_b));

    let count_b = router.route_scalar(&tenant_b, "SELECT COUNT(*) FROM agents").await?;
    assert_eq!(count_b, 0);

    router.close_all().await;
    Ok(())
}

#[tokio::test]
async fn existing_store_survives_a_fresh_router() -> Result<()> {
    if !engine_available() {
        return Ok(());
    }

    let tenant = unique_tenant_id("revisit");

    let router = TenantRouter::connect().await?;
    router
        .route_query(
            &tenant,
            "INSERT INTO agents (name, personality, ai_provider, model) VALUES ($1, $2, $3, $4)",
            &[json!("Sales Bot"), json!("formal"), json!("gemini"), json!("gemini-1.5-flash")],
        )
        .await?;
    router.close_all().await;

    // New process, cold cache: bootstrap re-runs idempotently, data persists
    let router = TenantRouter::connect().await?;
    let count = router.route_scalar(&tenant, "SELECT COUNT(*) FROM agents").await?;
    assert_eq!(count, 1);

    router.close_all().await;
    Ok(())
}

#[tokio::test]
async fn registry_queries_bypass_tenant_stores() -> Result<()> {
    if !engine_available() {
        return Ok(());
    }

    let router = TenantRouter::connect().await?;

    let users = router.route_main_scalar("SELECT COUNT(*) FROM users").await?;
    assert!(users >= 0);

    // Parameterized registry round-trip returns rows as JSON maps
    let email = format!("{}@example.com", unique_tenant_id("registry"));
    let inserted = router
        .route_main_query(
            "INSERT INTO users (email, password_hash, role, status)
             VALUES ($1, $2, 'client', 'active') RETURNING id",
            &[json!(email), json!("not-a-real-hash")],
        )
        .await?;
    assert_eq!(inserted.len(), 1);
    assert!(inserted[0]["id"].as_i64().is_some());

    let rows = router
        .route_main_query(
            "SELECT id, email, role FROM users WHERE email = $1",
            &[json!(email)],
        )
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["email"], json!(email));
    assert_eq!(rows[0]["role"], json!("client"));

    router.health_check().await?;
    router.close_all().await;
    Ok(())
}

#[tokio::test]
async fn typed_rows_deserialize_into_models() -> Result<()> {
    if !engine_available() {
        return Ok(());
    }

    let router = TenantRouter::connect().await?;
    let tenant = unique_tenant_id("models");

    let inserted = router
        .route_query(
            &tenant,
            "INSERT INTO agents (name, personality, ai_provider, model)
             VALUES ($1, $2, $3, $4) RETURNING id",
            &[json!("Support Bot"), json!("friendly"), json!("chatgpt"), json!("gpt-4o-mini")],
        )
        .await?;
    let agent_id = inserted[0]["id"].as_i64().expect("agent id");

    // JSON array params land in JSONB columns
    let inserted = router
        .route_query(
            &tenant,
            "INSERT INTO conversations (agent_id, customer_name, channel_type, status, tags)
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
            &[
                json!(agent_id),
                json!("Ana"),
                json!("whatsapp"),
                json!("active"),
                json!(["vip", "billing"]),
            ],
        )
        .await?;
    let conversation_id = inserted[0]["id"].as_i64().expect("conversation id");

    let rows = router
        .route_query(
            &tenant,
            "SELECT tags FROM conversations WHERE id = $1",
            &[json!(conversation_id)],
        )
        .await?;
    assert_eq!(rows[0]["tags"], json!(["vip", "billing"]));

    router
        .route_query(
            &tenant,
            "INSERT INTO messages (conversation_id, content, sender) VALUES ($1, $2, $3)",
            &[json!(conversation_id), json!("Hello, I need help"), json!("user")],
        )
        .await?;
    let messages: Vec<Message> = router
        .route_query_as(
            &tenant,
            "SELECT id, conversation_id, content, sender, message_type, media_url,
                    whatsapp_message_id, status, response_time, metadata, timestamp,
                    created_at, updated_at
             FROM messages ORDER BY id",
        )
        .await?;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].conversation_id, conversation_id);
    assert_eq!(messages[0].sender, "user");
    assert_eq!(messages[0].message_type, "text");

    router
        .route_query(
            &tenant,
            "INSERT INTO whatsapp_sessions (phone_number, contact_name, agent_id)
             VALUES ($1, $2, $3)",
            &[json!("+5511999990001"), json!("Ana"), json!(agent_id)],
        )
        .await?;
    let sessions: Vec<WhatsAppSession> = router
        .route_query_as(
            &tenant,
            "SELECT id, phone_number, contact_name, agent_id, status, last_activity,
                    metadata, created_at, updated_at
             FROM whatsapp_sessions ORDER BY id",
        )
        .await?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].phone_number, "+5511999990001");
    assert_eq!(sessions[0].agent_id, Some(agent_id));

    router
        .route_query(
            &tenant,
            "INSERT INTO agent_metrics (agent_id, date, total_conversations, total_messages)
             VALUES ($1, CURRENT_DATE, $2, $3)",
            &[json!(agent_id), json!(1), json!(1)],
        )
        .await?;
    let metrics: Vec<AgentMetric> = router
        .route_query_as(
            &tenant,
            "SELECT id, agent_id, date, total_conversations, total_messages,
                    avg_response_time, satisfaction_rating, resolution_rate, escalation_rate,
                    active_conversations, sla_compliance, cost_per_message, revenue_generated,
                    created_at, updated_at
             FROM agent_metrics ORDER BY agent_id, date",
        )
        .await?;
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].agent_id, agent_id);
    assert_eq!(metrics[0].total_messages, 1);

    router.close_all().await;
    Ok(())
}

#[tokio::test]
async fn aggregation_covers_registered_tenants() -> Result<()> {
    if !engine_available() {
        return Ok(());
    }

    let router = Arc::new(TenantRouter::connect().await?);

    // An active client user in the registry is a tenant to aggregate over
    let email = format!("{}@example.com", unique_tenant_id("agg"));
    let inserted = router
        .route_main_query(
            "INSERT INTO users (email, password_hash, role, status)
             VALUES ($1, $2, 'client', 'active') RETURNING id",
            &[json!(email), json!("not-a-real-hash")],
        )
        .await?;
    let tenant_id = inserted[0]["id"].as_i64().expect("user id").to_string();

    let phone = format!("+55119{}", &tenant_id);
    router
        .route_query(
            &tenant_id,
            "INSERT INTO whatsapp_sessions (phone_number, contact_name) VALUES ($1, $2)",
            &[json!(phone), json!("Ana")],
        )
        .await?;

    let aggregate = AggregateService::new(Arc::clone(&router), 4);
    let sessions = aggregate.list_sessions().await?;
    assert!(
        sessions
            .iter()
            .any(|s| s.tenant_id == tenant_id && s.item.phone_number == phone),
        "aggregated sessions must include the registered tenant's rows"
    );

    let stats = aggregate.dashboard_stats().await?;
    assert!(stats.tenants_total >= 1);
    assert!(stats.tenants_reporting >= 1);

    router.close_all().await;
    Ok(())
}
