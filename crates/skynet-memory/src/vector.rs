//! Vector `MemoryService` — spec.md §4.3: `embed`/`upsert`/`query` over a
//! fixed-dimension vector, backed by SQLite instead of an external vector
//! database (Qdrant is treated as an external collaborator; only the
//! persistence contract is implemented here).

use std::sync::Mutex;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MemoryError;

/// Embedding dimension. Matches spec.md §4.3's "typical" `dim=768`.
pub const EMBEDDING_DIM: usize = 768;

/// A stored memory entry: embedding vector plus its original payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: MemoryPayload,
}

/// Free-form payload carried alongside every vector — always includes the
/// original text and the `source_agent` tag used for per-specialist
/// retrieval scoping (spec.md §4.2's `memory_scope`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPayload {
    pub text: String,
    pub source_agent: Option<String>,
    pub memory_type: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: String,
}

/// Optional predicate applied during `query`: equality on `source_agent`
/// and/or a `[since, until]` time-range over `created_at`.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub source_agent: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

impl MemoryFilter {
    fn matches(&self, payload: &MemoryPayload) -> bool {
        if let Some(ref want) = self.source_agent {
            if payload.source_agent.as_deref() != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(ref since) = self.since {
            if payload.created_at.as_str() < since.as_str() {
                return false;
            }
        }
        if let Some(ref until) = self.until {
            if payload.created_at.as_str() > until.as_str() {
                return false;
            }
        }
        true
    }
}

/// A single retrieval hit: id, stored payload, and cosine similarity score.
#[derive(Debug, Clone)]
pub struct MemoryHit {
    pub id: String,
    pub payload: MemoryPayload,
    pub score: f32,
}

/// Deterministic local embedder standing in for an external embedding
/// model: a stable hash-bucket (bag-of-words) projection into a unit
/// vector of `EMBEDDING_DIM` dimensions. Same text always yields the same
/// vector (spec.md §4.3: "deterministic given model + text").
pub fn embed(text: &str) -> Vec<f32> {
    let mut v = vec![0f32; EMBEDDING_DIM];
    for token in text.split_whitespace().map(|t| t.to_lowercase()) {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::hash::Hash::hash(&token, &mut hasher);
        let h = std::hash::Hasher::finish(&hasher);
        let bucket = (h % EMBEDDING_DIM as u64) as usize;
        // Second hash decides sign so unrelated tokens partially cancel
        // instead of only ever adding, which would bias cosine similarity
        // toward longer texts.
        let sign = if (h >> 32) % 2 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign;
    }
    normalize(&mut v);
    v
}

fn normalize(v: &mut [f32]) {
    let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na = (a.iter().map(|x| x * x).sum::<f32>()).sqrt();
    let nb = (b.iter().map(|x| x * x).sum::<f32>()).sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// SQLite-backed vector store implementing the Memory Service contract.
pub struct VectorStore {
    db: Mutex<Connection>,
}

impl VectorStore {
    pub fn new(conn: Connection) -> Result<Self, MemoryError> {
        init_schema(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Idempotent write: an existing `id` is fully replaced.
    pub fn upsert(&self, id: &str, vector: &[f32], payload: &MemoryPayload) -> Result<(), MemoryError> {
        let vector_json = serde_json::to_string(vector)
            .map_err(|e| MemoryError::Serialization(e.to_string()))?;
        let payload_json = serde_json::to_string(payload)
            .map_err(|e| MemoryError::Serialization(e.to_string()))?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO memory_items (id, vector, payload, source_agent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                vector = excluded.vector,
                payload = excluded.payload,
                source_agent = excluded.source_agent,
                created_at = excluded.created_at",
            rusqlite::params![id, vector_json, payload_json, payload.source_agent, payload.created_at],
        )?;
        Ok(())
    }

    /// Top-`k` results by cosine similarity, optionally filtered, stable
    /// sorted by score descending then `id` ascending to break ties
    /// deterministically (spec.md §4.3).
    pub fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MemoryFilter>,
    ) -> Result<Vec<MemoryHit>, MemoryError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT id, vector, payload FROM memory_items")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut hits: Vec<MemoryHit> = Vec::new();
        for row in rows {
            let (id, vector_json, payload_json) = row?;
            let stored_vector: Vec<f32> = serde_json::from_str(&vector_json)
                .map_err(|e| MemoryError::Serialization(e.to_string()))?;
            let payload: MemoryPayload = serde_json::from_str(&payload_json)
                .map_err(|e| MemoryError::Serialization(e.to_string()))?;

            if let Some(f) = filter {
                if !f.matches(&payload) {
                    continue;
                }
            }

            let score = cosine_similarity(vector, &stored_vector);
            hits.push(MemoryHit { id, payload, score });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memory_items (
            id            TEXT PRIMARY KEY,
            vector        TEXT NOT NULL,
            payload       TEXT NOT NULL,
            source_agent  TEXT,
            created_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memory_items_source_agent
            ON memory_items(source_agent);",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VectorStore {
        VectorStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn payload(text: &str, agent: Option<&str>) -> MemoryPayload {
        MemoryPayload {
            text: text.to_string(),
            source_agent: agent.map(|s| s.to_string()),
            memory_type: "fact".to_string(),
            metadata: Value::Null,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn store_then_search_returns_matching_text() {
        let store = store();
        let text = "the user prefers oat milk lattes";
        let vector = embed(text);
        store.upsert("m1", &vector, &payload(text, Some("barista"))).unwrap();

        let hits = store.query(&embed(text), 5, None).unwrap();
        assert_eq!(hits[0].id, "m1");
        assert!(hits[0].payload.text.contains("oat milk"));
        assert!(hits[0].score > 0.99);
    }

    #[test]
    fn filter_by_source_agent_excludes_other_scopes() {
        let store = store();
        store
            .upsert("a", &embed("alpha"), &payload("alpha", Some("planner")))
            .unwrap();
        store
            .upsert("b", &embed("alpha"), &payload("alpha", Some("cook")))
            .unwrap();

        let filter = MemoryFilter {
            source_agent: Some("planner".to_string()),
            ..Default::default()
        };
        let hits = store.query(&embed("alpha"), 5, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn upsert_is_idempotent_on_id() {
        let store = store();
        store.upsert("x", &embed("v1"), &payload("v1", None)).unwrap();
        store.upsert("x", &embed("v2"), &payload("v2", None)).unwrap();
        let hits = store.query(&embed("v2"), 5, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.text, "v2");
    }

    #[test]
    fn embed_is_deterministic() {
        assert_eq!(embed("hello world"), embed("hello world"));
    }
}
