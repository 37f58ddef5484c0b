//! Connection handles, sessions and their lifecycle.

pub mod handle;
pub mod manager;
pub mod pool;
pub mod session;

pub use handle::ConnectionHandle;
pub use manager::SessionManager;
pub use pool::ConnectionPool;
pub use session::{Session, SessionKind, SessionState};
