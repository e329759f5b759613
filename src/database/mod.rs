pub mod models;
pub mod provision;
pub mod router;
pub mod schema;

pub use provision::{PgProvisioner, StoreProvisioner};
pub use router::{RouterError, TenantRouter, TenantStoreHandle};
