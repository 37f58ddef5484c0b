//! Per-user direct-room list.

pub mod aggregator;

pub use aggregator::SidebarAggregator;
