use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Daily per-agent rollup; one row per (agent_id, date).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentMetric {
    pub id: i64,
    pub agent_id: i64,
    pub date: NaiveDate,
    pub total_conversations: i32,
    pub total_messages: i32,
    pub avg_response_time: Option<BigDecimal>,
    pub satisfaction_rating: Option<BigDecimal>,
    pub resolution_rate: Option<BigDecimal>,
    pub escalation_rate: Option<BigDecimal>,
    pub active_conversations: i32,
    pub sla_compliance: Option<BigDecimal>,
    pub cost_per_message: Option<BigDecimal>,
    pub revenue_generated: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
