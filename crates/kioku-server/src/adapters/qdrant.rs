//! Qdrant implementation of VectorIndex
//!
//! One adapter instance is bound to one collection. Qdrant only accepts
//! integer or UUID point ids, so each `VectorId` is mapped to a UUIDv5 and
//! the readable id travels in the payload under `vectorId`.

use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    vectors_output::VectorsOptions, Condition, CreateCollectionBuilder, DeletePointsBuilder,
    Distance, Filter, GetPointsBuilder, PointId, PointStruct, PointsIdsList, SearchPointsBuilder,
    SetPayloadPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use uuid::Uuid;

use kioku::domain::{ScoredVector, VectorId, VectorPayload, VectorRecord};
use kioku::ports::{MatchValue, VectorFilter};
use kioku::{DomainError, VectorIndex};

const VECTOR_ID_KEY: &str = "vectorId";

/// Qdrant client bound to a single collection of fixed dimension
pub struct QdrantVectorIndex {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantVectorIndex {
    /// Connect and make sure the collection exists
    pub async fn new(
        url: &str,
        api_key: Option<String>,
        collection: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let builder = Qdrant::from_url(url).timeout(timeout);
        let builder = match api_key {
            Some(key) => builder.api_key(key),
            None => builder,
        };
        let client = builder.build().map_err(infra)?;

        let index = Self {
            client,
            collection: collection.into(),
            dimension,
        };
        index.ensure_collection().await?;

        tracing::info!(
            "🌊 Connected to Qdrant collection {} (dim {})",
            index.collection,
            index.dimension
        );
        Ok(index)
    }

    async fn ensure_collection(&self) -> Result<(), DomainError> {
        if self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(infra)?
        {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(infra)?;

        tracing::info!("✨ Created collection: {}", self.collection);
        Ok(())
    }
}

fn infra(e: impl std::fmt::Display) -> DomainError {
    DomainError::Infrastructure(format!("Qdrant: {e}"))
}

/// Stable Qdrant point id for a vector id
fn point_id(id: &VectorId) -> PointId {
    PointId::from(point_uuid(id).to_string())
}

fn point_uuid(id: &VectorId) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_str().as_bytes())
}

fn to_qdrant_payload(
    id: Option<&VectorId>,
    payload: &VectorPayload,
) -> serde_json::Map<String, serde_json::Value> {
    let mut map = payload.to_json();
    if let Some(id) = id {
        map.insert(
            VECTOR_ID_KEY.to_string(),
            serde_json::Value::String(id.to_string()),
        );
    }
    map
}

/// Split a stored payload into the readable vector id and the domain payload
fn from_qdrant_payload(
    mut map: serde_json::Map<String, serde_json::Value>,
) -> (Option<String>, VectorPayload) {
    let id = match map.remove(VECTOR_ID_KEY) {
        Some(serde_json::Value::String(id)) => Some(id),
        _ => None,
    };
    (id, VectorPayload::from_json(map))
}

fn to_filter(filter: &VectorFilter) -> Filter {
    Filter::must(filter.must.iter().map(|cond| match &cond.value {
        MatchValue::Integer(v) => Condition::matches(cond.key.clone(), *v),
        MatchValue::Keyword(v) => Condition::matches(cond.key.clone(), v.clone()),
        MatchValue::Boolean(v) => Condition::matches(cond.key.clone(), *v),
    }))
}

fn ids_list(ids: &[VectorId]) -> PointsIdsList {
    PointsIdsList {
        ids: ids.iter().map(point_id).collect(),
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert(&self, record: VectorRecord) -> Result<(), DomainError> {
        let payload = to_qdrant_payload(Some(&record.id), &record.payload);
        let point = PointStruct::new(
            point_uuid(&record.id).to_string(),
            record.embedding,
            Payload::from(payload),
        );

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .map_err(infra)?;

        tracing::debug!("💾 Vector stored: {}", record.id);
        Ok(())
    }

    async fn retrieve(&self, id: &VectorId) -> Result<Option<Vec<f32>>, DomainError> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, vec![point_id(id)])
                    .with_vectors(true)
                    .with_payload(false),
            )
            .await
            .map_err(infra)?;

        let vector = response
            .result
            .into_iter()
            .next()
            .and_then(|point| point.vectors)
            .and_then(|vectors| vectors.vectors_options)
            .and_then(|options| match options {
                VectorsOptions::Vector(v) => Some(v.data),
                _ => None,
            });
        Ok(vector)
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        score_threshold: f32,
        filter: &VectorFilter,
    ) -> Result<Vec<ScoredVector>, DomainError> {
        let mut request = SearchPointsBuilder::new(&self.collection, vector, limit as u64)
            .score_threshold(score_threshold)
            .with_payload(true);
        if !filter.is_empty() {
            request = request.filter(to_filter(filter));
        }

        let response = self.client.search_points(request).await.map_err(infra)?;

        let hits: Vec<ScoredVector> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let payload_json = serde_json::to_value(&point.payload).ok()?;
                let serde_json::Value::Object(map) = payload_json else {
                    return None;
                };
                let (id, payload) = from_qdrant_payload(map);
                Some(ScoredVector {
                    id: id.unwrap_or_default(),
                    score: point.score,
                    payload,
                })
            })
            .collect();

        tracing::debug!("🔍 Qdrant returned {} hits", hits.len());
        Ok(hits)
    }

    async fn delete(&self, ids: &[VectorId]) -> Result<(), DomainError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(ids_list(ids))
                    .wait(true),
            )
            .await
            .map_err(infra)?;
        Ok(())
    }

    async fn delete_by_memory(&self, memory_id: i64) -> Result<(), DomainError> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(to_filter(&VectorFilter::for_memory(memory_id)))
                    .wait(true),
            )
            .await
            .map_err(infra)?;

        tracing::debug!("🗑️ Vectors of memory {} deleted", memory_id);
        Ok(())
    }

    async fn set_payload(
        &self,
        ids: &[VectorId],
        payload: VectorPayload,
    ) -> Result<(), DomainError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(
                    &self.collection,
                    Payload::from(to_qdrant_payload(None, &payload)),
                )
                    .points_selector(ids_list(ids))
                    .wait(true),
            )
            .await
            .map_err(infra)?;
        Ok(())
    }

    async fn set_payload_by_memory(
        &self,
        memory_id: i64,
        payload: VectorPayload,
    ) -> Result<(), DomainError> {
        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(
                    &self.collection,
                    Payload::from(to_qdrant_payload(None, &payload)),
                )
                .points_selector(to_filter(&VectorFilter::for_memory(memory_id)))
                .wait(true),
            )
            .await
            .map_err(infra)?;

        tracing::debug!("🏷️ Payload of memory {} vectors updated", memory_id);
        Ok(())
    }
}
