//! Value Objects
//!
//! Immutable objects defined by their attributes rather than identity.

mod content_hash;
mod message_role;
mod scope;
mod vector_id;

pub use content_hash::*;
pub use message_role::*;
pub use scope::*;
pub use vector_id::*;
