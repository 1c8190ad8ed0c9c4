// Context assembly for retrieval-augmented prompts
//
// Components:
// - Terms: shared term extraction and overlap measures
// - Re-ranking: score and order candidate documents
// - Allocation: divide the token budget between documents
// - Context: render allocated documents into a prompt block
// - Pipeline: end-to-end assembly for one request

pub mod allocation;
pub mod context;
pub mod pipeline;
pub mod reranking;
pub mod terms;

// Re-export key types
pub use allocation::{AllocationStrategy, Allocator, AllocatorConfig};
pub use context::{ContextFormatter, DocumentMetadata, FormatConfig, HeaderStyle, RenderedContext};
pub use pipeline::{AssembledContext, ContextPipeline, ContextRequest};
pub use reranking::{DocumentPrioritizer, PrioritizerConfig};
