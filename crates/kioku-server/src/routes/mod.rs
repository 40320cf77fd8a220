//! Kioku API Routes
//!
//! - /api/memory - Single memory lifecycle (create, get, update, delete)
//! - /api/memory/owner/:owner_id - Memories of an owner
//! - /api/memories - Conversation batch ingestion
//! - /api/memories/search - Scoped similarity search
//! - /api/memories/ask - Answer a question from memories

pub mod error;
pub mod memories;
pub mod memory;
pub mod swagger;
