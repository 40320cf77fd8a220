//! Kioku API Models
//!
//! Request/response DTOs with OpenAPI schemas. Domain types live in the
//! kioku crate; these mirror them on the wire.

mod memory;
mod retrieval;

pub use memory::*;
pub use retrieval::*;
