//! Group fabric: named fanout groups over live connections.

pub mod group;
pub mod name;
pub mod registry;
pub mod subscription;

pub use name::GroupName;
pub use registry::GroupFabric;
