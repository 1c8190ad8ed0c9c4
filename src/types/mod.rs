//! Type definitions module
//!
//! Per-request data model: candidate documents, their annotated copies,
//! and conversation history.

pub mod document;
pub mod messages;

// Re-export commonly used types
pub use document::{AllocatedDocument, Document, RankedDocument};
pub use messages::{ConversationMessage, Role};
