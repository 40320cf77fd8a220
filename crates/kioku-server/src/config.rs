//! Server settings read from Shuttle secrets

use kioku::KiokuConfig;

const DEFAULT_COLLECTION: &str = "kioku_memories";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Everything main needs to wire adapters and engines
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,
    pub openai_api_key: Option<String>,
    pub embedding_model: String,
    pub engine: KiokuConfig,
}

impl ServerSettings {
    /// Build from any key lookup (Shuttle `SecretStore::get`, env, a map in tests).
    /// Unparseable numbers fall back to defaults with a warning.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut engine = KiokuConfig::default();

        if let Some(dimension) = parse(&get, "EMBEDDING_DIMENSION") {
            engine.embedding.dimension = dimension;
        }
        if let Some(model) = get("FACT_MODEL") {
            engine.facts.model = model;
        }
        if let Some(model) = get("ANSWER_MODEL") {
            engine.answer.model = model;
        }
        if let Some(enabled) = parse(&get, "RERANK_ENABLED") {
            engine.rerank.enabled = enabled;
        }
        if let Some(model) = get("RERANK_MODEL") {
            engine.rerank.model = model;
        }
        if let Some(top_k) = parse::<usize>(&get, "RERANK_TOP_K") {
            engine.rerank.top_k = Some(top_k).filter(|k| *k > 0);
        }
        if let Some(secs) = parse::<u64>(&get, "REQUEST_TIMEOUT_SECS") {
            engine.timeouts.provider_ms = secs * 1000;
        }
        if let Some(reembed) = parse(&get, "REEMBED_ON_UPDATE") {
            engine.memory.reembed_on_update = reembed;
        }

        Self {
            qdrant_url: get("QDRANT_URL"),
            qdrant_api_key: get("QDRANT_API_KEY"),
            qdrant_collection: get("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            openai_api_key: get("OPENAI_API_KEY"),
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            engine,
        }
    }
}

fn parse<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("⚠️  Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> ServerSettings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerSettings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]);
        assert!(s.qdrant_url.is_none());
        assert!(s.openai_api_key.is_none());
        assert_eq!(s.qdrant_collection, DEFAULT_COLLECTION);
        assert_eq!(s.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(s.engine.embedding.dimension, 1536);
        assert!(!s.engine.rerank.enabled);
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("QDRANT_URL", "http://localhost:6334"),
            ("QDRANT_COLLECTION_NAME", "memories"),
            ("EMBEDDING_DIMENSION", "512"),
            ("RERANK_ENABLED", "true"),
            ("RERANK_TOP_K", "5"),
            ("REQUEST_TIMEOUT_SECS", "12"),
        ]);
        assert_eq!(s.qdrant_url.as_deref(), Some("http://localhost:6334"));
        assert_eq!(s.qdrant_collection, "memories");
        assert_eq!(s.engine.embedding.dimension, 512);
        assert!(s.engine.rerank.enabled);
        assert_eq!(s.engine.rerank.top_k, Some(5));
        assert_eq!(s.engine.timeouts.provider_ms, 12_000);
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let s = settings(&[("EMBEDDING_DIMENSION", "lots"), ("RERANK_TOP_K", "0")]);
        assert_eq!(s.engine.embedding.dimension, 1536);
        assert_eq!(s.engine.rerank.top_k, None);
    }
}
