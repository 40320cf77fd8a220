//! VectorId - Deterministic ids of vector index entries

use serde::{Deserialize, Serialize};

/// Id of one vector in the index.
///
/// Derived from the owning memory: `memory_{id}` for a raw-content vector,
/// `memory_{id}_fact_{i}` for the i-th extracted fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(String);

impl VectorId {
    pub fn for_memory(memory_id: i64) -> Self {
        Self(format!("memory_{memory_id}"))
    }

    pub fn for_fact(memory_id: i64, fact_index: usize) -> Self {
        Self(format!("memory_{memory_id}_fact_{fact_index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for VectorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for VectorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for VectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(VectorId::for_memory(7).as_str(), "memory_7");
        assert_eq!(VectorId::for_fact(7, 3).as_str(), "memory_7_fact_3");
        assert!(VectorId::from("  ").is_empty());
    }
}
