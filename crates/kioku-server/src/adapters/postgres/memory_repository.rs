//! PostgreSQL implementation of MemoryRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use kioku::domain::{ContentHash, MessageRole};
use kioku::ports::DedupKey;
use kioku::{DomainError, Memory, MemoryRepository};

const COLUMNS: &str = "id, owner_id, agent_id, run_id, role, source, source_id, timestamp, \
content, content_url, title, origin, tags, category, attribute, summary, memory_type, \
importance, confidence, content_hash, embedding_ref, created_at, updated_at";

/// PostgreSQL implementation of MemoryRepository
pub struct PgMemoryRepository {
    pool: PgPool,
}

impl PgMemoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct MemoryRow {
    id: i64,
    owner_id: i64,
    agent_id: Option<String>,
    run_id: Option<String>,
    role: Option<String>,
    source: String,
    source_id: String,
    timestamp: DateTime<Utc>,
    content: String,
    content_url: String,
    title: String,
    origin: String,
    tags: Vec<String>,
    category: Vec<String>,
    attribute: serde_json::Value,
    summary: String,
    memory_type: String,
    importance: f32,
    confidence: f32,
    content_hash: String,
    embedding_ref: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MemoryRow> for Memory {
    type Error = DomainError;

    fn try_from(row: MemoryRow) -> Result<Self, Self::Error> {
        let content_hash = ContentHash::parse(&row.content_hash).map_err(|e| {
            DomainError::Infrastructure(format!("memory {} has a corrupt hash: {}", row.id, e))
        })?;
        let role = match row.role.as_deref() {
            Some(role) => Some(role.parse::<MessageRole>().map_err(|e| {
                DomainError::Infrastructure(format!("memory {}: {}", row.id, e))
            })?),
            None => None,
        };

        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            agent_id: row.agent_id,
            run_id: row.run_id,
            role,
            source: row.source,
            source_id: row.source_id,
            timestamp: row.timestamp,
            content: row.content,
            content_url: row.content_url,
            title: row.title,
            origin: row.origin,
            tags: row.tags,
            category: row.category,
            attribute: row.attribute,
            summary: row.summary,
            memory_type: row.memory_type,
            importance: row.importance,
            confidence: row.confidence,
            content_hash,
            embedding_ref: row.embedding_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Unique violations become `Conflict`; everything else means the store is unhealthy
fn map_db_error(e: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return DomainError::Conflict(db.message().to_string());
        }
    }
    DomainError::Infrastructure(e.to_string())
}

fn into_memory(row: Option<MemoryRow>) -> Result<Option<Memory>, DomainError> {
    row.map(Memory::try_from).transpose()
}

#[async_trait]
impl MemoryRepository for PgMemoryRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Memory>, DomainError> {
        let row = sqlx::query_as::<_, MemoryRow>(&format!(
            "SELECT {COLUMNS} FROM memories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        into_memory(row)
    }

    async fn find_by_owner(&self, owner_id: i64) -> Result<Vec<Memory>, DomainError> {
        let rows = sqlx::query_as::<_, MemoryRow>(&format!(
            "SELECT {COLUMNS} FROM memories WHERE owner_id = $1 ORDER BY timestamp DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(Memory::try_from).collect()
    }

    async fn find_by_dedup_key(&self, key: &DedupKey) -> Result<Option<Memory>, DomainError> {
        let row = sqlx::query_as::<_, MemoryRow>(&format!(
            r#"
            SELECT {COLUMNS} FROM memories
            WHERE content_hash = $1
              AND ($2::BIGINT IS NULL OR owner_id = $2)
              AND ($3::TEXT IS NULL OR agent_id = $3)
              AND ($4::TEXT IS NULL OR run_id = $4)
            ORDER BY id
            LIMIT 1
            "#
        ))
        .bind(key.content_hash.as_str())
        .bind(key.owner_id)
        .bind(&key.agent_id)
        .bind(&key.run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        into_memory(row)
    }

    async fn insert(&self, memory: &Memory) -> Result<Memory, DomainError> {
        let row = sqlx::query_as::<_, MemoryRow>(&format!(
            r#"
            INSERT INTO memories (
                owner_id, agent_id, run_id, role, source, source_id, timestamp,
                content, content_url, title, origin, tags, category, attribute,
                summary, memory_type, importance, confidence, content_hash,
                embedding_ref, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $21)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(memory.owner_id)
        .bind(&memory.agent_id)
        .bind(&memory.run_id)
        .bind(memory.role.map(|r| r.to_string()))
        .bind(&memory.source)
        .bind(&memory.source_id)
        .bind(memory.timestamp)
        .bind(&memory.content)
        .bind(&memory.content_url)
        .bind(&memory.title)
        .bind(&memory.origin)
        .bind(&memory.tags)
        .bind(&memory.category)
        .bind(&memory.attribute)
        .bind(&memory.summary)
        .bind(&memory.memory_type)
        .bind(memory.importance)
        .bind(memory.confidence)
        .bind(memory.content_hash.as_str())
        .bind(memory.embedding_ref)
        .bind(memory.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.try_into()
    }

    async fn update(&self, memory: &Memory) -> Result<Memory, DomainError> {
        let row = sqlx::query_as::<_, MemoryRow>(&format!(
            r#"
            UPDATE memories
            SET owner_id = $2, agent_id = $3, run_id = $4, role = $5, source = $6,
                source_id = $7, timestamp = $8, content = $9, content_url = $10,
                title = $11, origin = $12, tags = $13, category = $14, attribute = $15,
                summary = $16, memory_type = $17, importance = $18, confidence = $19,
                content_hash = $20, embedding_ref = $21, updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(memory.id)
        .bind(memory.owner_id)
        .bind(&memory.agent_id)
        .bind(&memory.run_id)
        .bind(memory.role.map(|r| r.to_string()))
        .bind(&memory.source)
        .bind(&memory.source_id)
        .bind(memory.timestamp)
        .bind(&memory.content)
        .bind(&memory.content_url)
        .bind(&memory.title)
        .bind(&memory.origin)
        .bind(&memory.tags)
        .bind(&memory.category)
        .bind(&memory.attribute)
        .bind(&memory.summary)
        .bind(&memory.memory_type)
        .bind(memory.importance)
        .bind(memory.confidence)
        .bind(memory.content_hash.as_str())
        .bind(memory.embedding_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        into_memory(row)?.ok_or_else(|| DomainError::not_found("Memory", memory.id))
    }

    async fn mark_embedded(
        &self,
        id: i64,
        embedding_ref: i64,
        summary: Option<&str>,
    ) -> Result<Memory, DomainError> {
        let row = sqlx::query_as::<_, MemoryRow>(&format!(
            r#"
            UPDATE memories
            SET embedding_ref = $2, summary = COALESCE($3, summary), updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(embedding_ref)
        .bind(summary)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        into_memory(row)?.ok_or_else(|| DomainError::not_found("Memory", id))
    }

    async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM memories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }
}
