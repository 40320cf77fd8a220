//! Search and ask DTOs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use kioku::{Answer, AskRequest, RerankOptions, Scope, SearchHit, SearchRequest};

/// Per-request rerank overrides
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RerankRequest {
    pub enabled: Option<bool>,
    /// Keep at most this many hits after reranking (0 keeps all)
    pub top_k: Option<usize>,
    pub model: Option<String>,
}

impl From<RerankRequest> for RerankOptions {
    fn from(r: RerankRequest) -> Self {
        Self {
            enabled: r.enabled,
            top_k: r.top_k,
            model: r.model,
        }
    }
}

/// Similarity search request; at least one scope key is required
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchMemoriesRequest {
    pub query: String,
    pub owner_id: Option<i64>,
    pub agent_id: Option<String>,
    pub run_id: Option<String>,
    /// 1..=100, default 10
    pub limit: Option<usize>,
    /// 0..=1, default 0.7
    pub score_threshold: Option<f32>,
    pub rerank: Option<RerankRequest>,
}

impl SearchMemoriesRequest {
    pub fn into_parts(self) -> (SearchRequest, RerankOptions) {
        let request = SearchRequest {
            query: self.query,
            scope: Scope {
                owner_id: self.owner_id,
                agent_id: self.agent_id,
                run_id: self.run_id,
            },
            limit: self.limit,
            score_threshold: self.score_threshold,
        };
        (request, self.rerank.map(Into::into).unwrap_or_default())
    }
}

/// One search hit
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchHitResponse {
    /// Vector id, e.g. `memory_12_fact_0`
    pub id: String,
    pub score: f32,
    pub text: String,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub rerank_score: Option<f32>,
}

impl From<SearchHit> for SearchHitResponse {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            score: hit.score,
            text: hit.text,
            payload: serde_json::Value::Object(hit.payload.to_json()),
            rerank_score: hit.rerank_score,
        }
    }
}

/// Similarity search response
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchMemoriesResponse {
    pub memories: Vec<SearchHitResponse>,
    pub count: usize,
}

impl From<Vec<SearchHit>> for SearchMemoriesResponse {
    fn from(hits: Vec<SearchHit>) -> Self {
        Self {
            count: hits.len(),
            memories: hits.into_iter().map(Into::into).collect(),
        }
    }
}

/// Question answering request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AskMemoriesRequest {
    pub question: String,
    /// Search query, when it should differ from the question
    pub query: Option<String>,
    pub owner_id: Option<i64>,
    pub agent_id: Option<String>,
    pub run_id: Option<String>,
    pub limit: Option<usize>,
    pub score_threshold: Option<f32>,
    pub rerank: Option<RerankRequest>,
}

impl From<AskMemoriesRequest> for AskRequest {
    fn from(r: AskMemoriesRequest) -> Self {
        Self {
            question: r.question,
            query: r.query,
            scope: Scope {
                owner_id: r.owner_id,
                agent_id: r.agent_id,
                run_id: r.run_id,
            },
            limit: r.limit,
            score_threshold: r.score_threshold,
            rerank: r.rerank.map(Into::into).unwrap_or_default(),
        }
    }
}

/// Synthesized answer
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub memories: Vec<SearchHitResponse>,
    pub count: usize,
    pub model: String,
    pub rerank_model: Option<String>,
}

impl From<Answer> for AskResponse {
    fn from(a: Answer) -> Self {
        Self {
            answer: a.answer,
            count: a.memories.len(),
            memories: a.memories.into_iter().map(Into::into).collect(),
            model: a.model,
            rerank_model: a.rerank_model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kioku::domain::VectorPayload;

    #[test]
    fn test_search_request_scope() {
        let request: SearchMemoriesRequest = serde_json::from_value(serde_json::json!({
            "query": "acme invoice",
            "ownerId": 1,
            "runId": "",
            "rerank": { "enabled": true, "topK": 3 }
        }))
        .unwrap();

        let (search, rerank) = request.into_parts();
        assert_eq!(search.scope.owner_id, Some(1));
        assert_eq!(search.limit, None);
        assert_eq!(rerank.enabled, Some(true));
        assert_eq!(rerank.top_k, Some(3));
    }

    #[test]
    fn test_ask_response_counts_memories() {
        let hit = SearchHit {
            id: "memory_1_fact_0".to_string(),
            score: 0.9,
            text: "Payment of $50 is owed to Acme Corp".to_string(),
            payload: VectorPayload::scoped(&Scope::owner(1)),
            rerank_score: Some(0.5),
        };
        let response = AskResponse::from(Answer {
            answer: "You owe Acme Corp $50.".to_string(),
            memories: vec![hit],
            model: "gpt-4o-mini".to_string(),
            rerank_model: None,
        });

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(body["memories"][0]["payload"]["ownerId"], 1);
        assert_eq!(body["memories"][0]["rerankScore"], 0.5);
        assert!(body["rerankModel"].is_null());
    }
}
