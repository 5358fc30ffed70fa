pub mod cache;
pub mod context;
pub mod manager;
pub mod policy;

pub use cache::{CacheError, MemorySessionCache, RedbSessionCache, SessionCache};
pub use context::AuthContext;
pub use manager::{NewIdentity, SessionError, SessionManager};
pub use policy::SessionPolicy;
