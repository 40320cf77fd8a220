//! LLM-backed fact extraction
//!
//! One JSON-mode completion per memory. Invalid facts are dropped, the
//! rest are deduplicated and capped at `MAX_FACTS_PER_MEMORY`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::FactExtractionConfig;
use crate::domain::errors::DomainError;
use crate::domain::{normalize_text, ExtractedFact, MAX_FACTS_PER_MEMORY};
use crate::ports::{CompletionOptions, CompletionProvider, FactContext, FactExtractor};

const SYSTEM_PROMPT: &str = "You extract concise, verifiable facts. Respond ONLY with strict JSON. \
Avoid opinions, advice, speculation, instructions, greetings, and duplicates. \
Each fact must be self-contained, <=240 characters, and phrased as a declarative \
statement grounded solely in the provided content.";

#[derive(Debug, Deserialize)]
struct FactsResponse {
    #[serde(default)]
    facts: Vec<ExtractedFact>,
}

/// FactExtractor over any CompletionProvider
pub struct LlmFactExtractor {
    completion: Arc<dyn CompletionProvider>,
    config: FactExtractionConfig,
}

impl LlmFactExtractor {
    pub fn new(completion: Arc<dyn CompletionProvider>, config: FactExtractionConfig) -> Self {
        Self { completion, config }
    }

    fn build_prompt(content: &str, context: &FactContext) -> String {
        let title = context.title.as_deref().unwrap_or("n/a");
        let source = context.source.as_deref().unwrap_or("n/a");
        let timestamp = context
            .timestamp
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "n/a".to_string());

        format!(
            r#"Return only concise, self-contained facts that are directly supported by the content.
Output strictly as JSON: {{ "facts": [ {{ "fact": "...", "importance": 0-1, "confidence": 0-1, "tags": ["optional","tags"] }} ] }}
- Facts must be atomic, declarative, and <= 240 characters.
- No opinions, advice, speculation, instructions, greetings, or boilerplate.
- Avoid duplicates; keep only distinct, recall-worthy facts.
- Return {{ "facts": [] }} when nothing is worth remembering.

Context:
title: {title}
source: {source}
timestamp: {timestamp}

Content:
{content}"#
        )
    }
}

/// Parse the model reply, tolerating a Markdown code fence around the JSON
fn parse_facts(raw: &str) -> Result<Vec<ExtractedFact>, DomainError> {
    let trimmed = raw.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let response: FactsResponse = serde_json::from_str(json).map_err(|e| {
        DomainError::ExternalService(format!("Failed to parse fact extraction response: {e}"))
    })?;

    let mut seen = HashSet::new();
    let mut facts = Vec::new();
    for mut fact in response.facts {
        fact.fact = fact.fact.trim().to_string();
        if let Some(reason) = fact.rejection() {
            tracing::warn!("🚮 Dropped extracted fact {:?}: {}", fact.fact, reason);
            continue;
        }
        if seen.insert(normalize_text(&fact.fact)) {
            facts.push(fact);
        }
    }
    facts.truncate(MAX_FACTS_PER_MEMORY);
    Ok(facts)
}

#[async_trait]
impl FactExtractor for LlmFactExtractor {
    async fn extract(
        &self,
        content: &str,
        context: &FactContext,
    ) -> Result<Vec<ExtractedFact>, DomainError> {
        if content.trim().is_empty() {
            return Err(DomainError::EmptyInput("Content is empty".to_string()));
        }

        let options = CompletionOptions {
            model: Some(self.config.model.clone()),
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(0.0),
            json_mode: true,
        };

        let response = self
            .completion
            .complete_with_system(SYSTEM_PROMPT, &Self::build_prompt(content, context), &options)
            .await?;

        let facts = parse_facts(&response.content)?;
        tracing::debug!("🔎 Extracted {} facts with {}", facts.len(), response.model);
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCompletion;

    fn extractor(reply: &str) -> (LlmFactExtractor, Arc<ScriptedCompletion>) {
        let completion = Arc::new(ScriptedCompletion::fixed(reply));
        (
            LlmFactExtractor::new(completion.clone(), FactExtractionConfig::default()),
            completion,
        )
    }

    #[tokio::test]
    async fn test_extracts_facts() {
        let (extractor, _) = extractor(
            r#"{"facts":[{"fact":"Payment of $50 is owed to Acme Corp","importance":0.8,"confidence":0.9,"tags":["finance"]}]}"#,
        );
        let facts = extractor
            .extract("Pay $50 to Acme Corp", &FactContext::default())
            .await
            .unwrap();

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].fact, "Payment of $50 is owed to Acme Corp");
        assert_eq!(facts[0].importance, Some(0.8));
        assert_eq!(facts[0].tags, vec!["finance"]);
    }

    #[tokio::test]
    async fn test_drops_invalid_and_duplicate_facts() {
        let (extractor, _) = extractor(
            r#"```json
{"facts":[
  {"fact":"short"},
  {"fact":"Rent of $1200 is due on the 1st","importance":1.4},
  {"fact":"Rent of $1200 is due monthly"},
  {"fact":"  rent of $1200 is DUE monthly "}
]}
```"#,
        );
        let facts = extractor
            .extract("Rent reminder", &FactContext::default())
            .await
            .unwrap();

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].fact, "Rent of $1200 is due monthly");
    }

    #[tokio::test]
    async fn test_caps_fact_count() {
        let facts: Vec<String> = (0..50)
            .map(|i| format!(r#"{{"fact":"Distinct fact number {i}"}}"#))
            .collect();
        let reply = format!(r#"{{"facts":[{}]}}"#, facts.join(","));
        let (extractor, _) = extractor(&reply);

        let facts = extractor
            .extract("many facts", &FactContext::default())
            .await
            .unwrap();
        assert_eq!(facts.len(), MAX_FACTS_PER_MEMORY);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_external_error() {
        let (extractor, _) = extractor("Sure! Here are the facts: ...");
        assert!(matches!(
            extractor.extract("something", &FactContext::default()).await,
            Err(DomainError::ExternalService(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_content_makes_no_call() {
        let (extractor, completion) = extractor(r#"{"facts":[]}"#);
        assert!(matches!(
            extractor.extract("  \n", &FactContext::default()).await,
            Err(DomainError::EmptyInput(_))
        ));
        assert_eq!(completion.calls(), 0);
    }

    #[test]
    fn test_prompt_carries_context() {
        let prompt = LlmFactExtractor::build_prompt(
            "Standup at 9",
            &FactContext {
                title: Some("Daily".to_string()),
                source: Some("calendar".to_string()),
                timestamp: None,
            },
        );
        assert!(prompt.contains("title: Daily"));
        assert!(prompt.contains("source: calendar"));
        assert!(prompt.contains("timestamp: n/a"));
        assert!(prompt.ends_with("Standup at 9"));
    }
}
