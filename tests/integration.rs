//! End-to-end provisioning and query tests, run offline against stub
//! embedding and chat backends.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use docchat::config::{
    ChunkingConfig, Config, DocumentsConfig, EmbeddingConfig, IndexConfig,
};
use docchat::embedding::{embed_query, Embedder};
use docchat::index::VectorIndex;
use docchat::llm::ChatModel;
use docchat::provision::{provision, IndexProvisioner};
use docchat::query::{answer, QueryEngine, RetrievalQueryEngine};

/// Deterministic offline embedder: maps each text to a unit vector from
/// byte sums, so identical text always lands on the identical vector.
struct HashEmbedder;

impl HashEmbedder {
    fn embed_one(text: &str) -> Vec<f32> {
        let mut v = [0.0f32; 8];
        for (i, b) in text.bytes().enumerate() {
            v[i % 8] += b as f32;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        v.iter().map(|x| x / norm).collect()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-embedder"
    }
    fn dims(&self) -> usize {
        8
    }
    async fn embed(&self, texts: &[String]) -> AnyResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::embed_one(t)).collect())
    }
}

/// Chat backend that ignores the context and answers with a fixed string.
struct CannedChatModel;

#[async_trait]
impl ChatModel for CannedChatModel {
    async fn complete(&self, _system: &str, _user: &str) -> AnyResult<String> {
        Ok("The documents cover several topics.".to_string())
    }
}

fn test_config(root: &Path) -> Config {
    Config {
        documents: DocumentsConfig {
            dir: root.join("doc"),
            include_globs: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
            exclude_globs: vec![],
        },
        index: IndexConfig {
            persist_dir: root.join("storage"),
        },
        chunking: ChunkingConfig {
            chunk_size: 120,
            chunk_overlap: 20,
        },
        retrieval: Default::default(),
        embedding: EmbeddingConfig {
            dims: 8,
            ..Default::default()
        },
        llm: Default::default(),
        server: Default::default(),
    }
}

fn write_corpus(root: &Path) {
    let doc_dir = root.join("doc");
    std::fs::create_dir_all(&doc_dir).unwrap();
    std::fs::write(
        doc_dir.join("rust.md"),
        "Rust ownership, borrowing, and lifetimes. ".repeat(12),
    )
    .unwrap();
    std::fs::write(
        doc_dir.join("deploy.txt"),
        "Deployment runbooks for containers and clusters. ".repeat(12),
    )
    .unwrap();
    std::fs::write(
        doc_dir.join("ml.txt"),
        "Machine learning notes on embeddings and retrieval. ".repeat(12),
    )
    .unwrap();
}

/// Retrieve the top-k source-file set directly from the index.
fn source_file_set(index: &VectorIndex, query_vec: &[f32], k: usize) -> BTreeSet<String> {
    index
        .retrieve(query_vec, k)
        .into_iter()
        .filter_map(|hit| hit.chunk.file_name.clone())
        .collect()
}

#[tokio::test]
async fn persistence_round_trip_preserves_retrieval() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let config = test_config(tmp.path());

    let built = provision(&config, &HashEmbedder).await.unwrap();

    let query_vec = embed_query(&HashEmbedder, "How do I deploy containers?")
        .await
        .unwrap();
    let before = source_file_set(&built, &query_vec, 5);
    assert!(!before.is_empty());

    // Fresh handle from the persisted form only.
    let reloaded = provision(&config, &HashEmbedder).await.unwrap();
    let after = source_file_set(&reloaded, &query_vec, 5);

    assert_eq!(before, after);
    assert_eq!(built.chunk_count(), reloaded.chunk_count());
}

#[tokio::test]
async fn full_pipeline_answers_with_sorted_unique_sources() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let config = test_config(tmp.path());

    let provisioner = IndexProvisioner::new(config.clone(), Arc::new(HashEmbedder));
    let index = provisioner.get().await.unwrap();

    let engine = RetrievalQueryEngine::new(
        &config,
        index,
        Arc::new(HashEmbedder),
        Arc::new(CannedChatModel),
    );

    let turn = answer(&engine, "What do the notes say about retrieval?").await;
    assert_eq!(turn.content, "The documents cover several topics.");

    let files = turn.source_files.expect("successful turn carries sources");
    assert!(!files.is_empty());
    let mut sorted = files.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(files, sorted, "sources must be sorted and unique");
}

#[tokio::test]
async fn failing_backend_is_contained_per_query() {
    struct FailingChatModel;

    #[async_trait]
    impl ChatModel for FailingChatModel {
        async fn complete(&self, _system: &str, _user: &str) -> AnyResult<String> {
            Err(anyhow::anyhow!("401 invalid api key"))
        }
    }

    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let config = test_config(tmp.path());

    let index = provision(&config, &HashEmbedder).await.unwrap();
    let engine = RetrievalQueryEngine::new(
        &config,
        Arc::new(index),
        Arc::new(HashEmbedder),
        Arc::new(FailingChatModel),
    );

    let turn = answer(&engine, "anything").await;
    assert!(turn.content.starts_with("An error occurred: "));
    assert!(turn.content.contains("401 invalid api key"));
    assert!(turn.source_files.is_none());

    // The engine stays usable for the next prompt.
    let turn2 = answer(&engine, "anything else").await;
    assert!(turn2.content.starts_with("An error occurred: "));
}

#[tokio::test]
async fn query_engine_trait_object_dispatch() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let config = test_config(tmp.path());

    let index = provision(&config, &HashEmbedder).await.unwrap();
    let engine: Arc<dyn QueryEngine> = Arc::new(RetrievalQueryEngine::new(
        &config,
        Arc::new(index),
        Arc::new(HashEmbedder),
        Arc::new(CannedChatModel),
    ));

    let turn = answer(engine.as_ref(), "question").await;
    assert_eq!(turn.content, "The documents cover several topics.");
}
