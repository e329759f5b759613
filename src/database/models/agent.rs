use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An AI support agent configured inside one tenant's store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub objective: Option<String>,
    pub personality: String,
    pub ai_provider: String,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<BigDecimal>,
    pub max_tokens: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
