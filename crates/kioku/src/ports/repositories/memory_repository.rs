//! Memory Repository Port
//!
//! Abstract interface for the durable record of memories.
//! One row per ingested item; vectors live in the vector index.

use async_trait::async_trait;

use crate::domain::{errors::DomainError, ContentHash, Memory, Scope};

/// Lookup key for "the same content already stored for this scope".
///
/// `None` fields are not constrained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupKey {
    pub content_hash: ContentHash,
    pub owner_id: Option<i64>,
    pub agent_id: Option<String>,
    pub run_id: Option<String>,
}

impl DedupKey {
    pub fn new(content_hash: ContentHash, scope: &Scope) -> Self {
        Self {
            content_hash,
            owner_id: scope.owner_id,
            agent_id: scope.agent_id.clone().filter(|s| !s.is_empty()),
            run_id: scope.run_id.clone().filter(|s| !s.is_empty()),
        }
    }

    pub fn for_owner(content_hash: ContentHash, owner_id: Option<i64>) -> Self {
        Self {
            content_hash,
            owner_id,
            agent_id: None,
            run_id: None,
        }
    }

    pub fn matches(&self, memory: &Memory) -> bool {
        memory.content_hash == self.content_hash
            && self.owner_id.map_or(true, |id| memory.owner_id == id)
            && self
                .agent_id
                .as_ref()
                .map_or(true, |id| memory.agent_id.as_ref() == Some(id))
            && self
                .run_id
                .as_ref()
                .map_or(true, |id| memory.run_id.as_ref() == Some(id))
    }
}

/// Repository interface for Memory entities
///
/// Implementations must enforce uniqueness of
/// (content_hash, owner_id, agent_id, run_id) and report a violation on
/// `insert`/`update` as `DomainError::Conflict`.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Memory>, DomainError>;

    /// All memories of an owner, newest `timestamp` first
    async fn find_by_owner(&self, owner_id: i64) -> Result<Vec<Memory>, DomainError>;

    async fn find_by_dedup_key(&self, key: &DedupKey) -> Result<Option<Memory>, DomainError>;

    /// Insert a new row; the returned memory carries the assigned id
    async fn insert(&self, memory: &Memory) -> Result<Memory, DomainError>;

    /// Overwrite every mutable field of an existing row
    async fn update(&self, memory: &Memory) -> Result<Memory, DomainError>;

    /// Record that embedding work is done, optionally setting the summary
    async fn mark_embedded(
        &self,
        id: i64,
        embedding_ref: i64,
        summary: Option<&str>,
    ) -> Result<Memory, DomainError>;

    async fn delete(&self, id: i64) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewMemory;

    fn memory(owner: i64, agent: Option<&str>) -> Memory {
        let mut input = NewMemory::new(owner, "gmail", "m-1", "hello world");
        input.agent_id = agent.map(str::to_string);
        Memory::new(input, ContentHash::compute("hello world").unwrap())
    }

    #[test]
    fn test_matches_unconstrained_fields() {
        let hash = ContentHash::compute("Hello   World").unwrap();
        let key = DedupKey::for_owner(hash.clone(), Some(1));
        assert!(key.matches(&memory(1, None)));
        assert!(key.matches(&memory(1, Some("bot"))));
        assert!(!key.matches(&memory(2, None)));

        let scoped = DedupKey::new(hash, &Scope::owner(1).with_agent("bot"));
        assert!(scoped.matches(&memory(1, Some("bot"))));
        assert!(!scoped.matches(&memory(1, None)));
    }
}
