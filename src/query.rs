//! The query-response pipeline.
//!
//! [`QueryEngine`] is the seam between the chat surface and the
//! retrieval/synthesis backend. The production engine embeds the prompt,
//! retrieves the top-k chunks from the index, and asks the chat model for
//! a grounded answer. [`answer`] wraps any engine into a chat turn:
//! success carries the sorted, de-duplicated set of contributing source
//! files; failure becomes a visible assistant message and never escapes.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{embed_query, Embedder};
use crate::error::QueryError;
use crate::index::VectorIndex;
use crate::llm::{build_context_prompt, system_prompt, ChatModel};
use crate::models::{ChatTurn, QueryAnswer, SourceChunk};

/// Something that can answer a natural-language question with supporting
/// chunks. Implementations must return typed errors, never panic.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<QueryAnswer, QueryError>;
}

/// The production engine: embed → retrieve top-k → synthesize.
pub struct RetrievalQueryEngine {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chat_model: Arc<dyn ChatModel>,
    top_k: usize,
}

impl RetrievalQueryEngine {
    pub fn new(
        config: &Config,
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        chat_model: Arc<dyn ChatModel>,
    ) -> Self {
        RetrievalQueryEngine {
            index,
            embedder,
            chat_model,
            top_k: config.retrieval.top_k,
        }
    }
}

#[async_trait]
impl QueryEngine for RetrievalQueryEngine {
    async fn query(&self, prompt: &str) -> Result<QueryAnswer, QueryError> {
        let query_vec = embed_query(self.embedder.as_ref(), prompt)
            .await
            .map_err(QueryError::Embedding)?;

        let sources: Vec<SourceChunk> = self
            .index
            .retrieve(&query_vec, self.top_k)
            .into_iter()
            .map(|hit| SourceChunk {
                file_name: hit.chunk.file_name.clone(),
                text: hit.chunk.text.clone(),
                score: hit.score,
            })
            .collect();

        let user_prompt = build_context_prompt(prompt, &sources);
        let text = self
            .chat_model
            .complete(system_prompt(), &user_prompt)
            .await
            .map_err(QueryError::Backend)?;

        Ok(QueryAnswer { text, sources })
    }
}

/// Run one prompt through the engine and package the result as an
/// assistant chat turn.
///
/// Assumes a non-empty prompt (callers guard). On success, the supporting
/// chunks' filenames are collected into a sorted set with duplicates
/// removed; chunks without a filename contribute nothing. On failure, the
/// turn carries `"An error occurred: ..."` and no source files — a query
/// failure never crashes the host.
pub async fn answer(engine: &dyn QueryEngine, prompt: &str) -> ChatTurn {
    match engine.query(prompt).await {
        Ok(answer) => {
            let files: BTreeSet<String> = answer
                .sources
                .iter()
                .filter_map(|s| s.file_name.clone())
                .collect();
            ChatTurn::assistant(answer.text, Some(files.into_iter().collect()))
        }
        Err(e) => ChatTurn::assistant(format!("An error occurred: {}", e), None),
    }
}
