//! Token budget allocation across ranked documents

pub mod allocator;
pub mod strategy;

pub use allocator::{Allocator, AllocatorConfig};
pub use strategy::AllocationStrategy;
