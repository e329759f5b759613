use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One customer phone number bound to an agent inside a tenant's store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WhatsAppSession {
    pub id: i64,
    pub phone_number: String,
    pub contact_name: Option<String>,
    pub agent_id: Option<i64>,
    pub status: String,
    pub last_activity: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
