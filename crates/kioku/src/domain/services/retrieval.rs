//! Retrieval Pipeline - similarity search → optional LLM rerank → answer
//!
//! Rerank only ever reorders and trims an existing hit list; it never adds
//! hits. Answer synthesis makes exactly one completion call.

use std::cmp::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::config::{AnswerConfig, RerankConfig, TimeoutConfig};
use crate::domain::errors::DomainError;
use crate::domain::services::embedding_engine::{EmbeddingEngine, SimilarityQuery};
use crate::domain::services::rerank_score::parse_score;
use crate::domain::services::snippet::{format_bullets, payload_text};
use crate::domain::services::timeout::bounded;
use crate::domain::{Scope, SearchHit};
use crate::ports::{CompletionOptions, CompletionProvider};

const RERANK_SYSTEM_PROMPT: &str = "You are a relevance judge for a personal memory search. \
Given a query and a document, reply with a single number between 0 and 1 \
indicating how relevant the document is to the query. \
1 means it directly answers the query, 0 means it is unrelated. \
Reply with the number only.";

const ANSWER_SYSTEM_PROMPT: &str = "You answer questions about the user's life using only \
the memories provided. Each memory is a bullet with a relevance score. \
Prefer higher-scored memories, quote concrete details (names, amounts, dates) when they \
are present, and say plainly that you do not know when the memories do not contain the answer. \
Be concise.";

/// Similarity search input
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub scope: Scope,
    pub limit: Option<usize>,
    pub score_threshold: Option<f32>,
}

/// Per-request rerank overrides; unset fields fall back to `RerankConfig`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankOptions {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Question answering input
#[derive(Debug, Clone, Default)]
pub struct AskRequest {
    pub question: String,
    /// Search query when it should differ from the question
    pub query: Option<String>,
    pub scope: Scope,
    pub limit: Option<usize>,
    pub score_threshold: Option<f32>,
    pub rerank: RerankOptions,
}

/// Synthesized answer with the memories it was built from
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer: String,
    pub memories: Vec<SearchHit>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_model: Option<String>,
}

/// Effective rerank settings for one call
struct RerankPlan {
    model: String,
    top_k: Option<usize>,
}

/// Retrieval pipeline
pub struct RetrievalPipeline {
    embeddings: Arc<EmbeddingEngine>,
    completion: Arc<dyn CompletionProvider>,
    rerank: RerankConfig,
    answer: AnswerConfig,
    timeouts: TimeoutConfig,
}

impl RetrievalPipeline {
    pub fn new(
        embeddings: Arc<EmbeddingEngine>,
        completion: Arc<dyn CompletionProvider>,
        rerank: RerankConfig,
        answer: AnswerConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            embeddings,
            completion,
            rerank,
            answer,
            timeouts,
        }
    }

    /// Scoped similarity search with display snippets
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, DomainError> {
        if request.query.trim().is_empty() {
            return Err(DomainError::EmptyQuery);
        }

        let hits = self
            .embeddings
            .search_similar(
                &request.query,
                &SimilarityQuery {
                    scope: request.scope.clone(),
                    limit: request.limit,
                    score_threshold: request.score_threshold,
                    filter: None,
                },
            )
            .await?;

        tracing::debug!("🔍 Search returned {} hits", hits.len());

        Ok(hits
            .into_iter()
            .map(|hit| SearchHit {
                text: payload_text(&hit.payload),
                id: hit.id,
                score: hit.score,
                payload: hit.payload,
                rerank_score: None,
            })
            .collect())
    }

    fn rerank_plan(&self, options: &RerankOptions) -> Option<RerankPlan> {
        let enabled = options.enabled.unwrap_or(self.rerank.enabled);
        enabled.then(|| RerankPlan {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.rerank.model.clone()),
            top_k: options.top_k.or(self.rerank.top_k),
        })
    }

    /// Score every hit with the completion provider and reorder.
    ///
    /// Disabled or empty input is returned unchanged. Hits whose score is
    /// missing or out of range sink below every scored hit, keeping their
    /// relative order.
    pub async fn rerank(
        &self,
        query: &str,
        hits: Vec<SearchHit>,
        options: &RerankOptions,
    ) -> Vec<SearchHit> {
        let Some(plan) = self.rerank_plan(options) else {
            return hits;
        };
        if hits.is_empty() {
            return hits;
        }

        let keep = match plan.top_k {
            Some(k) if k > 0 => k.min(hits.len()),
            _ => hits.len(),
        };

        let model = plan.model.as_str();
        let mut scored = join_all(hits.into_iter().map(|hit| async move {
            let rerank_score = self.score_hit(query, &hit, model).await;
            SearchHit {
                rerank_score,
                ..hit
            }
        }))
        .await;

        scored.sort_by(|a, b| match (a.rerank_score, b.rerank_score) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        scored.truncate(keep);

        tracing::debug!("🎯 Reranked with {}, kept {}", plan.model, scored.len());
        scored
    }

    async fn score_hit(&self, query: &str, hit: &SearchHit, model: &str) -> Option<f32> {
        let options = CompletionOptions {
            model: Some(model.to_string()),
            max_tokens: Some(8),
            temperature: Some(0.0),
            json_mode: false,
        };
        let user_prompt = format!("Query: \"{}\"\n\nDocument: \"{}\"", query, hit.text);

        let reply = bounded(
            "rerank completion",
            self.timeouts.provider(),
            self.completion
                .complete_with_system(RERANK_SYSTEM_PROMPT, &user_prompt, &options),
        )
        .await;

        match reply {
            Ok(response) => {
                let score = parse_score(&response.content);
                if score.is_none() {
                    tracing::warn!(
                        "🎯 Discarded rerank reply for {}: {:?}",
                        hit.id,
                        response.content
                    );
                }
                score
            }
            Err(e) => {
                tracing::warn!("🎯 Rerank scoring failed for {}: {}", hit.id, e);
                None
            }
        }
    }

    /// search → rerank → one completion over the bullet list
    pub async fn ask(&self, request: &AskRequest) -> Result<Answer, DomainError> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(DomainError::EmptyQuery);
        }
        let query = match &request.query {
            Some(query) if query.trim().is_empty() => return Err(DomainError::EmptyQuery),
            Some(query) => query.clone(),
            None => question.to_string(),
        };

        let hits = self
            .search(&SearchRequest {
                query: query.clone(),
                scope: request.scope.clone(),
                limit: request.limit,
                score_threshold: request.score_threshold,
            })
            .await?;

        let rerank_model = self.rerank_plan(&request.rerank).map(|plan| plan.model);
        let memories = self.rerank(&query, hits, &request.rerank).await;

        let user_prompt = format!(
            "Memories:\n{}\n\nUser question:\n{}",
            format_bullets(&memories),
            question
        );
        let options = CompletionOptions {
            model: Some(self.answer.model.clone()),
            temperature: Some(self.answer.temperature),
            ..Default::default()
        };

        let response = bounded(
            "answer completion",
            self.timeouts.provider(),
            self.completion
                .complete_with_system(ANSWER_SYSTEM_PROMPT, &user_prompt, &options),
        )
        .await?;

        tracing::info!(
            "💬 Answered from {} memories with {}",
            memories.len(),
            self.answer.model
        );

        Ok(Answer {
            answer: response.content.trim().to_string(),
            memories,
            model: self.answer.model.clone(),
            rerank_model,
        })
    }
}
