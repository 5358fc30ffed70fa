pub mod workflow;

pub use workflow::{premium_expiry, Entitlement, EntitlementWorkflow, NewOrder, OrderError};
