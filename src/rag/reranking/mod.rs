// Re-ranking of candidate documents before allocation
pub mod scorer;

pub use scorer::{DocumentPrioritizer, PrioritizerConfig};
