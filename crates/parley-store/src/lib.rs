//! # parley-store
//!
//! The persistence boundary consumed by the realtime engine. Rooms,
//! messages, users and friendships live behind the asynchronous [`Store`]
//! trait; callers only await a result or an error and never see how the
//! backend executes.
//!
//! [`MemoryStore`] is the in-process backend used by the server binary and
//! by tests.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::Store;
