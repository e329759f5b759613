//! Idempotent DDL for tenant stores and the shared registry.
//!
//! Every statement is create-if-not-exists so bootstrap can run on every
//! first access to a store without touching existing data. MySQL-style ENUM
//! columns are rendered as VARCHAR + CHECK, JSON as JSONB, DECIMAL as NUMERIC.

use sqlx::PgPool;

/// Tables bootstrapped inside each tenant store, in dependency order.
pub const TENANT_TABLES: &[(&str, &str)] = &[
    (
        "agents",
        r#"CREATE TABLE IF NOT EXISTS agents (
            id            BIGSERIAL PRIMARY KEY,
            name          VARCHAR(255) NOT NULL,
            description   TEXT,
            objective     TEXT,
            personality   VARCHAR(32) NOT NULL DEFAULT 'friendly'
                          CHECK (personality IN ('formal','casual','friendly','professional')),
            ai_provider   VARCHAR(32) NOT NULL DEFAULT 'chatgpt'
                          CHECK (ai_provider IN ('chatgpt','gemini','huggingface')),
            model         VARCHAR(128),
            system_prompt TEXT,
            temperature   NUMERIC(3,2) DEFAULT 0.70,
            max_tokens    INT DEFAULT 500,
            is_active     BOOLEAN NOT NULL DEFAULT TRUE,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    ),
    (
        "conversations",
        r#"CREATE TABLE IF NOT EXISTS conversations (
            id                  BIGSERIAL PRIMARY KEY,
            agent_id            BIGINT REFERENCES agents(id) ON DELETE SET NULL,
            customer_name       VARCHAR(255),
            customer_email      VARCHAR(255),
            customer_phone      VARCHAR(64),
            channel_type        VARCHAR(32) NOT NULL DEFAULT 'whatsapp'
                                CHECK (channel_type IN ('whatsapp','telegram','web','api')),
            status              VARCHAR(32) NOT NULL DEFAULT 'active'
                                CHECK (status IN ('active','resolved','pending','closed')),
            priority            INT NOT NULL DEFAULT 0,
            satisfaction_rating NUMERIC(3,2),
            start_time          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            end_time            TIMESTAMPTZ,
            resolution_time     INT,
            tags                JSONB,
            metadata            JSONB,
            created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    ),
    (
        "messages",
        r#"CREATE TABLE IF NOT EXISTS messages (
            id                  BIGSERIAL PRIMARY KEY,
            conversation_id     BIGINT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            content             TEXT NOT NULL,
            sender              VARCHAR(16) NOT NULL
                                CHECK (sender IN ('user','agent')),
            message_type        VARCHAR(32) NOT NULL DEFAULT 'text'
                                CHECK (message_type IN ('text','image','audio','document','video')),
            media_url           TEXT,
            whatsapp_message_id VARCHAR(128),
            status              VARCHAR(32) NOT NULL DEFAULT 'sent'
                                CHECK (status IN ('sent','delivered','read','failed')),
            response_time       INT,
            metadata            JSONB,
            timestamp           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    ),
    (
        "whatsapp_sessions",
        r#"CREATE TABLE IF NOT EXISTS whatsapp_sessions (
            id            BIGSERIAL PRIMARY KEY,
            phone_number  VARCHAR(64) NOT NULL UNIQUE,
            contact_name  VARCHAR(255),
            agent_id      BIGINT REFERENCES agents(id) ON DELETE SET NULL,
            status        VARCHAR(32) NOT NULL DEFAULT 'active'
                          CHECK (status IN ('active','inactive','ended')),
            last_activity TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            metadata      JSONB,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    ),
    (
        "agent_metrics",
        r#"CREATE TABLE IF NOT EXISTS agent_metrics (
            id                   BIGSERIAL PRIMARY KEY,
            agent_id             BIGINT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
            date                 DATE NOT NULL,
            total_conversations  INT NOT NULL DEFAULT 0,
            total_messages       INT NOT NULL DEFAULT 0,
            avg_response_time    NUMERIC(10,2),
            satisfaction_rating  NUMERIC(3,2),
            resolution_rate      NUMERIC(5,2),
            escalation_rate      NUMERIC(5,2),
            active_conversations INT NOT NULL DEFAULT 0,
            sla_compliance       NUMERIC(5,2),
            cost_per_message     NUMERIC(10,4),
            revenue_generated    NUMERIC(12,2),
            created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (agent_id, date)
        )"#,
    ),
];

/// Tables in the shared registry database (users, bookkeeping).
pub const REGISTRY_TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"CREATE TABLE IF NOT EXISTS users (
            id            BIGSERIAL PRIMARY KEY,
            email         VARCHAR(255) NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            display_name  VARCHAR(255),
            role          VARCHAR(16) NOT NULL DEFAULT 'client'
                          CHECK (role IN ('admin','client')),
            status        VARCHAR(16) NOT NULL DEFAULT 'provisioning'
                          CHECK (status IN ('provisioning','active','suspended')),
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at    TIMESTAMPTZ
        )"#,
    ),
    (
        "audit_logs",
        r#"CREATE TABLE IF NOT EXISTS audit_logs (
            id         BIGSERIAL PRIMARY KEY,
            user_id    BIGINT REFERENCES users(id) ON DELETE SET NULL,
            action     VARCHAR(128) NOT NULL,
            detail     JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    ),
    (
        "alerts",
        r#"CREATE TABLE IF NOT EXISTS alerts (
            id           BIGSERIAL PRIMARY KEY,
            user_id      BIGINT REFERENCES users(id) ON DELETE SET NULL,
            severity     VARCHAR(16) NOT NULL DEFAULT 'info'
                         CHECK (severity IN ('info','warning','critical')),
            message      TEXT NOT NULL,
            acknowledged BOOLEAN NOT NULL DEFAULT FALSE,
            created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    ),
    (
        "system_settings",
        r#"CREATE TABLE IF NOT EXISTS system_settings (
            key        VARCHAR(128) PRIMARY KEY,
            value      JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    ),
];

/// Run the tenant DDL set against a freshly opened (or existing) tenant store.
/// Safe to re-run against a populated store.
pub async fn bootstrap_tenant_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for (_, ddl) in TENANT_TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}

/// Run the registry DDL set against the shared system database.
pub async fn bootstrap_registry(pool: &PgPool) -> Result<(), sqlx::Error> {
    for (_, ddl) in REGISTRY_TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_ddl_covers_all_tables() {
        let names: Vec<&str> = TENANT_TABLES.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            ["agents", "conversations", "messages", "whatsapp_sessions", "agent_metrics"]
        );
        for (name, ddl) in TENANT_TABLES {
            assert!(
                ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {name}")),
                "{name} DDL must be idempotent"
            );
        }
    }

    #[test]
    fn tenant_ddl_keeps_local_foreign_keys() {
        let conversations = TENANT_TABLES[1].1;
        assert!(conversations.contains("REFERENCES agents(id) ON DELETE SET NULL"));

        let messages = TENANT_TABLES[2].1;
        assert!(messages.contains("REFERENCES conversations(id) ON DELETE CASCADE"));

        let metrics = TENANT_TABLES[4].1;
        assert!(metrics.contains("REFERENCES agents(id) ON DELETE CASCADE"));
        assert!(metrics.contains("UNIQUE (agent_id, date)"));
    }

    #[test]
    fn sessions_phone_number_is_unique() {
        let sessions = TENANT_TABLES[3].1;
        assert!(sessions.contains("phone_number  VARCHAR(64) NOT NULL UNIQUE"));
    }

    #[test]
    fn registry_models_tenant_status() {
        let users = REGISTRY_TABLES[0].1;
        assert!(users.contains("'provisioning','active','suspended'"));
        assert!(users.contains("deleted_at"));
    }
}
