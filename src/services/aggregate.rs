//! Cross-tenant aggregation for admin-facing views.
//!
//! Tenant stores are independent, so the per-tenant calls fan out with
//! bounded concurrency. An unreachable tenant is logged and omitted from
//! the aggregate instead of failing the whole request.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::warn;

use crate::database::models::{Agent, AgentMetric, Conversation, WhatsAppSession};
use crate::database::{RouterError, TenantRouter};

const AGENTS_SQL: &str = "SELECT id, name, description, objective, personality, ai_provider, \
     model, system_prompt, temperature, max_tokens, is_active, created_at, updated_at \
     FROM agents ORDER BY id";

const CONVERSATIONS_SQL: &str = "SELECT id, agent_id, customer_name, customer_email, customer_phone, channel_type, \
     status, priority, satisfaction_rating, start_time, end_time, resolution_time, \
     tags, metadata, created_at, updated_at \
     FROM conversations ORDER BY id";

const SESSIONS_SQL: &str = "SELECT id, phone_number, contact_name, agent_id, status, last_activity, \
     metadata, created_at, updated_at \
     FROM whatsapp_sessions ORDER BY id";

const METRICS_SQL: &str = "SELECT id, agent_id, date, total_conversations, total_messages, \
     avg_response_time, satisfaction_rating, resolution_rate, escalation_rate, \
     active_conversations, sla_compliance, cost_per_message, revenue_generated, \
     created_at, updated_at \
     FROM agent_metrics ORDER BY agent_id, date";

const TENANT_COUNTS_SQL: &str = "SELECT (SELECT COUNT(*) FROM agents) AS agents, \
            (SELECT COUNT(*) FROM conversations) AS conversations, \
            (SELECT COUNT(*) FROM messages) AS messages";

/// Run `f` once per tenant with at most `width` calls in flight, keeping
/// successful results and logging the rest.
pub async fn fan_out<T, F, Fut>(tenant_ids: Vec<String>, width: usize, f: F) -> Vec<(String, T)>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, RouterError>>,
{
    stream::iter(tenant_ids.into_iter().map(|tenant_id| {
        let fut = f(tenant_id.clone());
        async move { (tenant_id, fut.await) }
    }))
    .buffer_unordered(width.max(1))
    .filter_map(|(tenant_id, result)| async move {
        match result {
            Ok(value) => Some((tenant_id, value)),
            Err(e) => {
                warn!("Skipping tenant {} in aggregation: {}", tenant_id, e);
                None
            }
        }
    })
    .collect()
    .await
}

/// An item from one tenant's store, labeled with its tenant of origin.
#[derive(Debug, Clone, Serialize)]
pub struct TenantScoped<T> {
    pub tenant_id: String,
    #[serde(flatten)]
    pub item: T,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardStats {
    pub tenants_total: i64,
    pub tenants_reporting: i64,
    pub agents: i64,
    pub conversations: i64,
    pub messages: i64,
}

pub struct AggregateService {
    router: Arc<TenantRouter>,
    fanout_width: usize,
}

impl AggregateService {
    pub fn new(router: Arc<TenantRouter>, fanout_width: usize) -> Self {
        Self { router, fanout_width }
    }

    /// All agents across all active tenants, unreachable tenants omitted.
    pub async fn list_agents(&self) -> Result<Vec<TenantScoped<Agent>>, RouterError> {
        let tenant_ids = self.router.list_tenant_ids().await?;
        let per_tenant = fan_out(tenant_ids, self.fanout_width, |tenant_id| {
            let router = Arc::clone(&self.router);
            async move { router.route_query_as::<Agent>(&tenant_id, AGENTS_SQL).await }
        })
        .await;

        Ok(flatten_scoped(per_tenant))
    }

    /// All conversations across all active tenants.
    pub async fn list_conversations(&self) -> Result<Vec<TenantScoped<Conversation>>, RouterError> {
        let tenant_ids = self.router.list_tenant_ids().await?;
        let per_tenant = fan_out(tenant_ids, self.fanout_width, |tenant_id| {
            let router = Arc::clone(&self.router);
            async move {
                router
                    .route_query_as::<Conversation>(&tenant_id, CONVERSATIONS_SQL)
                    .await
            }
        })
        .await;

        Ok(flatten_scoped(per_tenant))
    }

    /// All WhatsApp sessions across all active tenants.
    pub async fn list_sessions(&self) -> Result<Vec<TenantScoped<WhatsAppSession>>, RouterError> {
        let tenant_ids = self.router.list_tenant_ids().await?;
        let per_tenant = fan_out(tenant_ids, self.fanout_width, |tenant_id| {
            let router = Arc::clone(&self.router);
            async move {
                router
                    .route_query_as::<WhatsAppSession>(&tenant_id, SESSIONS_SQL)
                    .await
            }
        })
        .await;

        Ok(flatten_scoped(per_tenant))
    }

    /// Daily per-agent rollups across all active tenants.
    pub async fn list_agent_metrics(&self) -> Result<Vec<TenantScoped<AgentMetric>>, RouterError> {
        let tenant_ids = self.router.list_tenant_ids().await?;
        let per_tenant = fan_out(tenant_ids, self.fanout_width, |tenant_id| {
            let router = Arc::clone(&self.router);
            async move {
                router
                    .route_query_as::<AgentMetric>(&tenant_id, METRICS_SQL)
                    .await
            }
        })
        .await;

        Ok(flatten_scoped(per_tenant))
    }

    /// System-wide totals: registry tenant count plus per-tenant sums over
    /// the tenants that answered.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, RouterError> {
        let tenant_ids = self.router.list_tenant_ids().await?;
        let tenants_total = tenant_ids.len() as i64;

        let per_tenant = fan_out(tenant_ids, self.fanout_width, |tenant_id| {
            let router = Arc::clone(&self.router);
            async move {
                router
                    .route_query_as::<(i64, i64, i64)>(&tenant_id, TENANT_COUNTS_SQL)
                    .await
            }
        })
        .await;

        let mut stats = DashboardStats { tenants_total, ..Default::default() };
        for (_, rows) in &per_tenant {
            if let Some((agents, conversations, messages)) = rows.first() {
                stats.tenants_reporting += 1;
                stats.agents += agents;
                stats.conversations += conversations;
                stats.messages += messages;
            }
        }
        Ok(stats)
    }
}

/// Flatten per-tenant result batches, ordered by tenant id so admin output
/// is stable regardless of fan-out completion order.
fn flatten_scoped<T>(mut per_tenant: Vec<(String, Vec<T>)>) -> Vec<TenantScoped<T>> {
    per_tenant.sort_by(|a, b| a.0.cmp(&b.0));
    per_tenant
        .into_iter()
        .flat_map(|(tenant_id, items)| {
            items
                .into_iter()
                .map(move |item| TenantScoped { tenant_id: tenant_id.clone(), item })
        })
        .collect()
}
