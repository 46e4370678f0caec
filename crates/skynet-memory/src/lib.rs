//! `skynet-memory` — the Agent Orchestration Runtime's long-term memory
//! backend: a vector `MemoryService` implementing the `embed`/`upsert`/`query`
//! contract used by the `memory_search`/`memory_store` tools.

pub mod error;
pub mod vector;

pub use error::MemoryError;
pub use vector::{embed, MemoryFilter, MemoryHit, MemoryItem, MemoryPayload, VectorStore, EMBEDDING_DIM};

use std::sync::Arc;

use rusqlite::Connection;

/// Thin handle around the vector store; `Clone` is cheap (one `Arc`).
#[derive(Clone)]
pub struct MemoryService {
    pub vectors: Arc<VectorStore>,
}

impl MemoryService {
    pub fn open(db_path: &str) -> Result<Self, MemoryError> {
        let vector_conn = Connection::open(db_path)?;
        Ok(Self { vectors: Arc::new(VectorStore::new(vector_conn)?) })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, MemoryError> {
        let vector_conn = Connection::open_in_memory()?;
        Ok(Self { vectors: Arc::new(VectorStore::new(vector_conn)?) })
    }

    /// Embed `text`, store it tagged with `source_agent`, and return the
    /// generated id. `memory_type` is free-form (e.g. `"fact"`, `"event"`).
    pub fn store(
        &self,
        id: &str,
        text: &str,
        source_agent: Option<&str>,
        memory_type: &str,
        metadata: serde_json::Value,
    ) -> Result<(), MemoryError> {
        let vector = embed(text);
        let payload = MemoryPayload {
            text: text.to_string(),
            source_agent: source_agent.map(|s| s.to_string()),
            memory_type: memory_type.to_string(),
            metadata,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.vectors.upsert(id, &vector, &payload)
    }

    /// Embed `query_text` and return the top-`k` most similar stored items,
    /// optionally scoped to `source_agent`.
    pub fn search(
        &self,
        query_text: &str,
        k: usize,
        source_agent: Option<&str>,
    ) -> Result<Vec<MemoryHit>, MemoryError> {
        let vector = embed(query_text);
        let filter = source_agent.map(|agent| MemoryFilter {
            source_agent: Some(agent.to_string()),
            ..Default::default()
        });
        self.vectors.query(&vector, k, filter.as_ref())
    }
}
