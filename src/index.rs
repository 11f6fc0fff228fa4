//! The in-memory vector index handle.
//!
//! Built once per process (fresh or reloaded from the persisted store) and
//! shared read-only behind an `Arc` for the process lifetime. Retrieval is
//! brute-force cosine similarity over all chunk vectors, sorted descending
//! with a chunk-id tiebreak so results are deterministic.

use crate::embedding::cosine_similarity;

/// One chunk as held by the index: text, provenance, and its embedding.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    /// Provenance filename. Empty in storage maps to `None` here so a
    /// chunk without provenance contributes nothing to source lists.
    pub file_name: Option<String>,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Index-level metadata, persisted alongside the chunks.
#[derive(Debug, Clone)]
pub struct IndexMeta {
    pub embedding_model: String,
    pub dims: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub built_at: i64,
    pub document_count: i64,
    pub chunk_count: i64,
}

/// The queryable index: all chunks plus their vectors and metadata.
#[derive(Debug)]
pub struct VectorIndex {
    meta: IndexMeta,
    chunks: Vec<IndexedChunk>,
}

/// A retrieval hit: a chunk and its similarity to the query.
#[derive(Debug, Clone)]
pub struct Hit<'a> {
    pub chunk: &'a IndexedChunk,
    pub score: f32,
}

impl VectorIndex {
    pub fn new(meta: IndexMeta, chunks: Vec<IndexedChunk>) -> Self {
        VectorIndex { meta, chunks }
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Return the `top_k` chunks most similar to `query_vec`, best first.
    pub fn retrieve(&self, query_vec: &[f32], top_k: usize) -> Vec<Hit<'_>> {
        let mut hits: Vec<Hit<'_>> = self
            .chunks
            .iter()
            .map(|chunk| Hit {
                score: cosine_similarity(query_vec, &chunk.embedding),
                chunk,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        hits.truncate(top_k);
        hits
    }
}
