//! Domain Entities
//!
//! Pure domain models without infrastructure dependencies.
//! - Memory: One ingested, durable item
//! - ExtractedFact: Atomic unit of embedding
//! - VectorRecord / SearchHit: Vector index entries and results
//! - ChatMessage / AddMemories: Batch ingestion input

mod fact;
mod memory;
mod message;
mod vector;

pub use fact::*;
pub use memory::*;
pub use message::*;
pub use vector::*;
