//! In-memory fakes of every port, for engine tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::errors::DomainError;
use crate::domain::{
    normalize_text, ChatMessage, ExtractedFact, Memory, ScoredVector, VectorId, VectorPayload,
    VectorRecord, MIN_FACT_CHARS,
};
use crate::ports::{
    CompletionOptions, CompletionProvider, CompletionResponse, DedupKey, EmbeddingProvider,
    FactContext, FactExtractor, MemoryRepository, TokenUsage, VectorFilter, VectorIndex,
};

/// Vector dimension used by every engine test
pub(crate) const DIM: usize = 16;

// =============================================================================
// Relational store
// =============================================================================

/// Rows in a Vec, with the same unique key a real store enforces
pub(crate) struct InMemoryMemoryRepository {
    rows: Mutex<Vec<Memory>>,
    next_id: AtomicI64,
    fail_lookups: AtomicBool,
    missed_lookups: AtomicUsize,
}

fn unique_key(m: &Memory) -> (String, i64, String, String) {
    (
        m.content_hash.to_string(),
        m.owner_id,
        m.agent_id.clone().unwrap_or_default(),
        m.run_id.clone().unwrap_or_default(),
    )
}

impl InMemoryMemoryRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fail_lookups: AtomicBool::new(false),
            missed_lookups: AtomicUsize::new(0),
        }
    }

    /// Make every dedup lookup fail
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Let the next `n` dedup lookups see nothing, like a concurrent writer
    /// that has not committed yet
    pub fn miss_next_lookups(&self, n: usize) {
        self.missed_lookups.store(n, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl MemoryRepository for InMemoryMemoryRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Memory>, DomainError> {
        Ok(self.rows.lock().unwrap().iter().find(|m| m.id == id).cloned())
    }

    async fn find_by_owner(&self, owner_id: i64) -> Result<Vec<Memory>, DomainError> {
        let mut rows: Vec<Memory> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(rows)
    }

    async fn find_by_dedup_key(&self, key: &DedupKey) -> Result<Option<Memory>, DomainError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(DomainError::Infrastructure("lookup failed".to_string()));
        }
        let missed = self
            .missed_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if missed.is_ok() {
            return Ok(None);
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| key.matches(m))
            .cloned())
    }

    async fn insert(&self, memory: &Memory) -> Result<Memory, DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let key = unique_key(memory);
        if rows.iter().any(|m| unique_key(m) == key) {
            return Err(DomainError::Conflict("duplicate content".to_string()));
        }
        let mut saved = memory.clone();
        saved.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        rows.push(saved.clone());
        Ok(saved)
    }

    async fn update(&self, memory: &Memory) -> Result<Memory, DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let key = unique_key(memory);
        if rows
            .iter()
            .any(|m| m.id != memory.id && unique_key(m) == key)
        {
            return Err(DomainError::Conflict("duplicate content".to_string()));
        }
        let row = rows
            .iter_mut()
            .find(|m| m.id == memory.id)
            .ok_or_else(|| DomainError::not_found("Memory", memory.id))?;
        *row = memory.clone();
        Ok(row.clone())
    }

    async fn mark_embedded(
        &self,
        id: i64,
        embedding_ref: i64,
        summary: Option<&str>,
    ) -> Result<Memory, DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| DomainError::not_found("Memory", id))?;
        row.embedding_ref = Some(embedding_ref);
        if let Some(summary) = summary {
            row.summary = summary.to_string();
        }
        Ok(row.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| m.id != id);
        Ok(rows.len() != before)
    }
}

// =============================================================================
// Vector index
// =============================================================================

/// Brute-force cosine index
pub(crate) struct InMemoryVectorIndex {
    points: Mutex<HashMap<String, (Vec<f32>, VectorPayload)>>,
    ignore_filters: AtomicBool,
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            points: Mutex::new(HashMap::new()),
            ignore_filters: AtomicBool::new(false),
        }
    }

    /// Simulate an index that returns hits regardless of the filter
    pub fn ignore_filters(&self, ignore: bool) {
        self.ignore_filters.store(ignore, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.points.lock().unwrap().len()
    }

    pub fn payload(&self, id: &VectorId) -> Option<VectorPayload> {
        self.points
            .lock()
            .unwrap()
            .get(id.as_str())
            .map(|(_, payload)| payload.clone())
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.points.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, record: VectorRecord) -> Result<(), DomainError> {
        self.points
            .lock()
            .unwrap()
            .insert(record.id.to_string(), (record.embedding, record.payload));
        Ok(())
    }

    async fn retrieve(&self, id: &VectorId) -> Result<Option<Vec<f32>>, DomainError> {
        Ok(self
            .points
            .lock()
            .unwrap()
            .get(id.as_str())
            .map(|(vector, _)| vector.clone()))
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        score_threshold: f32,
        filter: &VectorFilter,
    ) -> Result<Vec<ScoredVector>, DomainError> {
        let ignore = self.ignore_filters.load(Ordering::SeqCst);
        let mut hits: Vec<ScoredVector> = self
            .points
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (_, payload))| ignore || filter.matches(&payload.to_json()))
            .map(|(id, (stored, payload))| ScoredVector {
                id: id.clone(),
                score: cosine(&vector, stored),
                payload: payload.clone(),
            })
            .filter(|hit| hit.score >= score_threshold)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, ids: &[VectorId]) -> Result<(), DomainError> {
        let mut points = self.points.lock().unwrap();
        for id in ids {
            points.remove(id.as_str());
        }
        Ok(())
    }

    async fn delete_by_memory(&self, memory_id: i64) -> Result<(), DomainError> {
        self.points
            .lock()
            .unwrap()
            .retain(|_, (_, payload)| payload.memory_id != Some(memory_id));
        Ok(())
    }

    async fn set_payload(
        &self,
        ids: &[VectorId],
        payload: VectorPayload,
    ) -> Result<(), DomainError> {
        let patch = payload.to_json();
        let mut points = self.points.lock().unwrap();
        for id in ids {
            if let Some((_, stored)) = points.get_mut(id.as_str()) {
                let mut merged = stored.to_json();
                merged.extend(patch.clone());
                *stored = VectorPayload::from_json(merged);
            }
        }
        Ok(())
    }

    async fn set_payload_by_memory(
        &self,
        memory_id: i64,
        payload: VectorPayload,
    ) -> Result<(), DomainError> {
        let patch = payload.to_json();
        let mut points = self.points.lock().unwrap();
        for (_, stored) in points.values_mut() {
            if stored.memory_id == Some(memory_id) {
                let mut merged = stored.to_json();
                merged.extend(patch.clone());
                *stored = VectorPayload::from_json(merged);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Embedding provider
// =============================================================================

/// Deterministic bag-of-words embedder.
///
/// Each normalized word lands in an FNV-1a bucket; the vector is
/// L2-normalized, so texts sharing words have positive cosine similarity.
pub(crate) struct FakeEmbedder {
    calls: AtomicUsize,
    failures: Mutex<HashMap<String, DomainError>>,
    dimension_override: Mutex<Option<usize>>,
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

pub(crate) fn bag_of_words(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0_f32; dimension.max(1)];
    for word in normalize_text(text).split(' ') {
        let word: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if word.is_empty() {
            continue;
        }
        let bucket = (fnv1a(&word) % vector.len() as u64) as usize;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector[0] = 1.0;
    } else {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures: Mutex::new(HashMap::new()),
            dimension_override: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make embedding exactly `text` fail with `error`
    pub fn fail_with(&self, text: &str, error: DomainError) {
        self.failures
            .lock()
            .unwrap()
            .insert(text.trim().to_string(), error);
    }

    /// Return vectors of the wrong length
    pub fn set_dimension_override(&self, dimension: Option<usize>) {
        *self.dimension_override.lock().unwrap() = dimension;
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str, dimension: usize) -> Result<Vec<f32>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().get(text.trim()) {
            return Err(error.clone());
        }
        let dimension = self.dimension_override.lock().unwrap().unwrap_or(dimension);
        Ok(bag_of_words(text, dimension))
    }

    fn model_name(&self) -> &str {
        "fake-embedding"
    }
}

// =============================================================================
// Completion provider
// =============================================================================

type Responder = Box<dyn Fn(&str, &str) -> Result<String, DomainError> + Send + Sync>;

/// Completion provider answering from a closure over (system, user) prompts
pub(crate) struct ScriptedCompletion {
    responder: Responder,
    calls: AtomicUsize,
    models: Mutex<Vec<Option<String>>>,
}

impl ScriptedCompletion {
    pub fn new(
        responder: impl Fn(&str, &str) -> Result<String, DomainError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with `text`
    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Model requested by each call, in call order
    pub fn models(&self) -> Vec<Option<String>> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(options.model.clone());

        let system = messages
            .iter()
            .find(|m| m.role == crate::domain::MessageRole::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let user = messages
            .iter()
            .rev()
            .find(|m| m.role == crate::domain::MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let content = (self.responder)(system, user)?;
        Ok(CompletionResponse {
            content,
            model: options.model.clone().unwrap_or_else(|| "scripted".to_string()),
            usage: TokenUsage::default(),
        })
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

// =============================================================================
// Fact extractor
// =============================================================================

/// Splits content on '.' and keeps every sentence long enough to be a fact
pub(crate) struct SentenceFactExtractor {
    calls: AtomicUsize,
    failing: Mutex<HashSet<String>>,
}

impl SentenceFactExtractor {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_on(&self, content: &str) {
        self.failing.lock().unwrap().insert(content.to_string());
    }
}

#[async_trait]
impl FactExtractor for SentenceFactExtractor {
    async fn extract(
        &self,
        content: &str,
        _context: &FactContext,
    ) -> Result<Vec<ExtractedFact>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(content) {
            return Err(DomainError::ExternalService(
                "fact extraction failed".to_string(),
            ));
        }
        Ok(content
            .split('.')
            .map(str::trim)
            .filter(|s| s.chars().count() >= MIN_FACT_CHARS)
            .map(ExtractedFact::new)
            .collect())
    }
}
