pub mod aggregate;

pub use aggregate::{fan_out, AggregateService, DashboardStats, TenantScoped};
