use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row};
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};

use crate::database::provision::{PgProvisioner, StoreProvisioner};
use crate::database::schema;

/// Deterministic naming scheme for tenant stores. Never built from
/// unvalidated input; see [`store_name_for`].
pub const STORE_NAME_PREFIX: &str = "tenant_store_";

const MAX_TENANT_ID_LEN: usize = 64;

/// Scope label used in error context for queries against the shared registry.
const REGISTRY_SCOPE: &str = "registry";

/// Errors from TenantRouter
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid tenant id: {0}")]
    InvalidTenantId(String),

    #[error("Provisioning failed for tenant {tenant_id}: {source}")]
    Provisioning {
        tenant_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Query deadline exceeded for {scope}")]
    Timeout { scope: String },

    #[error("Query failed for {scope}: {source}")]
    Query {
        scope: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// A live, ready-to-query connection pool for one tenant's isolated store.
///
/// At most one handle per tenant id exists in a router's cache; it lives
/// until [`TenantRouter::close_all`].
#[derive(Debug)]
pub struct TenantStoreHandle {
    tenant_id: String,
    pool: PgPool,
    created_at: DateTime<Utc>,
}

impl TenantStoreHandle {
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

type StoreCell = Arc<OnceCell<Arc<TenantStoreHandle>>>;

/// Routes queries to per-tenant isolated stores, creating each store lazily
/// on first access.
///
/// First-time provisioning is single-flight per tenant id: the cache maps
/// tenant id to a `OnceCell`, so concurrent first accesses await one
/// initialization and settle on the same handle. A failed initialization
/// leaves the cell empty, so the next access retries provisioning (store
/// creation and schema bootstrap are both idempotent).
///
/// Routers are plain injected objects; construct one per process with
/// [`TenantRouter::connect`] or per test with [`TenantRouter::new`].
pub struct TenantRouter {
    main_pool: PgPool,
    provisioner: Arc<dyn StoreProvisioner>,
    stores: RwLock<HashMap<String, StoreCell>>,
    query_deadline: Duration,
}

impl TenantRouter {
    /// Build a router with an explicit registry pool and provisioner.
    pub fn new(
        main_pool: PgPool,
        provisioner: Arc<dyn StoreProvisioner>,
        query_deadline: Duration,
    ) -> Self {
        Self {
            main_pool,
            provisioner,
            stores: RwLock::new(HashMap::new()),
            query_deadline,
        }
    }

    /// Build a router from `DATABASE_URL` and the app config.
    ///
    /// The registry pool is opened lazily so the process can boot while the
    /// engine is down; the registry schema bootstrap is attempted once here
    /// and logged rather than treated as fatal.
    pub async fn connect() -> Result<Self, RouterError> {
        let config = crate::config::config();
        let base_url = std::env::var("DATABASE_URL")
            .map_err(|_| RouterError::ConfigMissing("DATABASE_URL"))?;

        let acquire_timeout = Duration::from_secs(config.database.acquire_timeout_secs);
        let main_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(&base_url)?;

        if let Err(e) = schema::bootstrap_registry(&main_pool).await {
            warn!("Registry bootstrap deferred, engine unreachable: {}", e);
        }

        let provisioner = PgProvisioner::new(
            main_pool.clone(),
            base_url,
            config.database.max_connections,
            acquire_timeout,
        );

        Ok(Self::new(
            main_pool,
            Arc::new(provisioner),
            Duration::from_millis(config.database.query_deadline_ms),
        ))
    }

    /// Return the cached handle for a tenant, provisioning the store on
    /// first access. Callers are expected to have authenticated the tenant
    /// id upstream; this validates only its shape.
    pub async fn get_store_for(&self, tenant_id: &str) -> Result<Arc<TenantStoreHandle>, RouterError> {
        let store_name = store_name_for(tenant_id)?;
        let cell = self.store_cell(tenant_id).await;

        let handle = cell
            .get_or_try_init(|| async {
                let pool = self.provisioner.provision(&store_name).await.map_err(|source| {
                    RouterError::Provisioning { tenant_id: tenant_id.to_string(), source }
                })?;
                info!("Provisioned tenant store: {} -> {}", tenant_id, store_name);
                Ok::<_, RouterError>(Arc::new(TenantStoreHandle {
                    tenant_id: tenant_id.to_string(),
                    pool,
                    created_at: Utc::now(),
                }))
            })
            .await?;

        Ok(Arc::clone(handle))
    }

    /// Execute a query against the tenant's isolated store, returning rows
    /// as JSON maps. Never falls back to another store.
    pub async fn route_query(
        &self,
        tenant_id: &str,
        query: &str,
        params: &[Value],
    ) -> Result<Vec<Map<String, Value>>, RouterError> {
        let handle = self.get_store_for(tenant_id).await?;
        self.run_query(tenant_id, handle.pool(), query, params).await
    }

    /// Execute a typed query against the tenant's store.
    pub async fn route_query_as<T>(&self, tenant_id: &str, query: &str) -> Result<Vec<T>, RouterError>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        let handle = self.get_store_for(tenant_id).await?;
        self.deadline(tenant_id, sqlx::query_as::<_, T>(query).fetch_all(handle.pool()))
            .await
    }

    /// Execute a single-value query (COUNT and friends) against the tenant's store.
    pub async fn route_scalar(&self, tenant_id: &str, query: &str) -> Result<i64, RouterError> {
        let handle = self.get_store_for(tenant_id).await?;
        self.deadline(tenant_id, sqlx::query_scalar::<_, i64>(query).fetch_one(handle.pool()))
            .await
    }

    /// Execute a query against the shared registry (not tenant-scoped).
    pub async fn route_main_query(
        &self,
        query: &str,
        params: &[Value],
    ) -> Result<Vec<Map<String, Value>>, RouterError> {
        self.run_query(REGISTRY_SCOPE, &self.main_pool, query, params).await
    }

    /// Execute a single-value query against the shared registry.
    pub async fn route_main_scalar(&self, query: &str) -> Result<i64, RouterError> {
        self.deadline(REGISTRY_SCOPE, sqlx::query_scalar::<_, i64>(query).fetch_one(&self.main_pool))
            .await
    }

    /// Enumerate active, non-deleted client tenants from the registry.
    pub async fn list_tenant_ids(&self) -> Result<Vec<String>, RouterError> {
        let rows: Vec<(i64,)> = self
            .deadline(
                REGISTRY_SCOPE,
                sqlx::query_as(
                    "SELECT id FROM users
                     WHERE role = 'client' AND status = 'active' AND deleted_at IS NULL
                     ORDER BY id",
                )
                .fetch_all(&self.main_pool),
            )
            .await?;
        Ok(rows.into_iter().map(|(id,)| id.to_string()).collect())
    }

    /// Pings the registry pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), RouterError> {
        self.deadline(REGISTRY_SCOPE, sqlx::query("SELECT 1").execute(&self.main_pool))
            .await?;
        Ok(())
    }

    /// Number of tenant handles currently cached.
    pub async fn cached_store_count(&self) -> usize {
        self.stores.read().await.values().filter(|c| c.get().is_some()).count()
    }

    /// Close and drop every cached tenant pool plus the registry pool
    /// (process shutdown).
    pub async fn close_all(&self) {
        let cells: Vec<StoreCell> = {
            let mut stores = self.stores.write().await;
            stores.drain().map(|(_, cell)| cell).collect()
        };
        for cell in cells {
            if let Some(handle) = cell.get() {
                handle.pool.close().await;
                info!("Closed tenant store pool: {}", handle.tenant_id);
            }
        }
        self.main_pool.close().await;
    }

    /// Fetch or install the per-tenant init cell. Read lock on the hot
    /// path, write lock only for the first access per tenant.
    async fn store_cell(&self, tenant_id: &str) -> StoreCell {
        {
            let stores = self.stores.read().await;
            if let Some(cell) = stores.get(tenant_id) {
                return Arc::clone(cell);
            }
        }

        let mut stores = self.stores.write().await;
        // Double-check after acquiring the write lock.
        if let Some(cell) = stores.get(tenant_id) {
            return Arc::clone(cell);
        }
        let cell: StoreCell = Arc::new(OnceCell::new());
        stores.insert(tenant_id.to_string(), Arc::clone(&cell));
        cell
    }

    async fn deadline<T, F>(&self, scope: &str, fut: F) -> Result<T, RouterError>
    where
        F: std::future::Future<Output = Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.query_deadline, fut)
            .await
            .map_err(|_| RouterError::Timeout { scope: scope.to_string() })?
            .map_err(|source| RouterError::Query { scope: scope.to_string(), source })
    }

    async fn run_query(
        &self,
        scope: &str,
        pool: &PgPool,
        query: &str,
        params: &[Value],
    ) -> Result<Vec<Map<String, Value>>, RouterError> {
        let mut q = sqlx::query(query);
        for p in params {
            q = bind_param(q, p);
        }
        let rows = self.deadline(scope, q.fetch_all(pool)).await?;
        Ok(rows.iter().map(row_to_map).collect())
    }
}

/// Derive the store name for a tenant id, rejecting anything outside the
/// allow-listed identifier shape so tenant ids can never smuggle SQL into
/// an identifier position.
pub fn store_name_for(tenant_id: &str) -> Result<String, RouterError> {
    if !is_valid_tenant_id(tenant_id) {
        return Err(RouterError::InvalidTenantId(tenant_id.to_string()));
    }
    Ok(format!("{STORE_NAME_PREFIX}{tenant_id}"))
}

fn is_valid_tenant_id(tenant_id: &str) -> bool {
    !tenant_id.is_empty()
        && tenant_id.len() <= MAX_TENANT_ID_LEN
        && tenant_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn row_to_map(row: &PgRow) -> Map<String, Value> {
    let mut map = Map::new();
    for i in 0..row.len() {
        let column_name = row.column(i).name();
        let value: Result<Option<Value>, _> = row.try_get(i);

        let json_value = match value {
            Ok(Some(v)) => v,
            Ok(None) => Value::Null,
            Err(_) => {
                // Fall through common scalar types when the column is not JSON
                if let Ok(s) = row.try_get::<String, _>(i) {
                    Value::String(s)
                } else if let Ok(i64_val) = row.try_get::<i64, _>(i) {
                    Value::Number(i64_val.into())
                } else if let Ok(f64_val) = row.try_get::<f64, _>(i) {
                    Value::Number(serde_json::Number::from_f64(f64_val).unwrap_or_else(|| 0.into()))
                } else if let Ok(bool_val) = row.try_get::<bool, _>(i) {
                    Value::Bool(bool_val)
                } else {
                    Value::Null
                }
            }
        };

        map.insert(column_name.to_string(), json_value);
    }
    map
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Arrays and objects both land in JSONB columns
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
