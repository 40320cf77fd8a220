//! Service Ports
//!
//! Abstract interfaces for external services.

mod embedding;
mod fact_extractor;
mod llm_provider;
mod vector_index;

pub use embedding::*;
pub use fact_extractor::*;
pub use llm_provider::*;
pub use vector_index::*;
