//! ExtractedFact - Atomic unit of embedding
//!
//! Transient: produced per memory by a fact extractor, never stored as a row.

use serde::{Deserialize, Serialize};

/// Shortest fact worth embedding
pub const MIN_FACT_CHARS: usize = 8;
/// Longest fact accepted from the extractor
pub const MAX_FACT_CHARS: usize = 240;
/// Upper bound on facts per memory (caps embedding fan-out)
pub const MAX_FACTS_PER_MEMORY: usize = 32;

/// An atomic, self-contained declarative sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    pub fact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ExtractedFact {
    pub fn new(fact: impl Into<String>) -> Self {
        Self {
            fact: fact.into(),
            importance: None,
            confidence: None,
            tags: Vec::new(),
        }
    }

    pub fn with_scores(mut self, importance: f32, confidence: f32) -> Self {
        self.importance = Some(importance);
        self.confidence = Some(confidence);
        self
    }

    /// Why this fact must be dropped, if it must
    pub fn rejection(&self) -> Option<String> {
        let len = self.fact.trim().chars().count();
        if !(MIN_FACT_CHARS..=MAX_FACT_CHARS).contains(&len) {
            return Some(format!(
                "fact length {len} outside {MIN_FACT_CHARS}..={MAX_FACT_CHARS}"
            ));
        }
        for (name, value) in [("importance", self.importance), ("confidence", self.confidence)] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Some(format!("{name} {v} outside [0, 1]"));
                }
            }
        }
        None
    }
}
