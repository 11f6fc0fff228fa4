//! Index provisioning: build-or-reload at startup.
//!
//! The provisioner decides whether a persisted index already exists. If
//! not, it loads the corpus, chunks it, embeds every chunk, persists the
//! result, and returns a fresh handle; if so, it reloads the persisted
//! index. [`IndexProvisioner`] memoizes the handle for the process
//! lifetime behind an explicit one-shot guard, so every caller after the
//! first gets the same `Arc` without recomputation.
//!
//! Persistence is all-or-nothing: the database is written to a temporary
//! file and renamed into place only once complete, and a persist directory
//! created by a failed build is removed again.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::chunk::chunk_document;
use crate::config::{index_db_path, Config};
use crate::embedding::Embedder;
use crate::error::{DataLoadError, IndexLoadError, ProvisionError};
use crate::index::{IndexMeta, IndexedChunk, VectorIndex};
use crate::loader;
use crate::models::{Chunk, Document};
use crate::store;

/// One-shot provisioner holding the memoized index handle.
///
/// `get` computes the index at most once; concurrent and subsequent calls
/// receive the same shared handle. A failed provisioning attempt is not
/// cached, so a later call may retry.
pub struct IndexProvisioner {
    config: Config,
    embedder: Arc<dyn Embedder>,
    cell: OnceCell<Arc<VectorIndex>>,
}

impl IndexProvisioner {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Self {
        IndexProvisioner {
            config,
            embedder,
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<Arc<VectorIndex>, ProvisionError> {
        self.cell
            .get_or_try_init(|| async {
                provision(&self.config, self.embedder.as_ref())
                    .await
                    .map(Arc::new)
            })
            .await
            .cloned()
    }
}

/// Build or reload the index, without memoization.
pub async fn provision(
    config: &Config,
    embedder: &dyn Embedder,
) -> Result<VectorIndex, ProvisionError> {
    if config.index.persist_dir.exists() {
        Ok(reload(config).await?)
    } else {
        build_and_persist(config, embedder).await
    }
}

/// Reload a previously persisted index.
async fn reload(config: &Config) -> Result<VectorIndex, IndexLoadError> {
    let db_path = index_db_path(config);
    if !db_path.exists() {
        return Err(IndexLoadError::MissingFile(db_path));
    }

    let pool = store::connect(&db_path, false).await?;
    let meta = store::load_meta(&pool).await?;
    let chunks = store::load_chunks(&pool, &meta).await?;
    pool.close().await;

    Ok(VectorIndex::new(meta, chunks))
}

/// First run: load documents, chunk, embed, persist, return the handle.
async fn build_and_persist(
    config: &Config,
    embedder: &dyn Embedder,
) -> Result<VectorIndex, ProvisionError> {
    let documents = loader::load_documents(config)?;

    let mut chunks: Vec<Chunk> = Vec::new();
    for doc in &documents {
        chunks.extend(chunk_document(
            doc,
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
        ));
    }
    if chunks.is_empty() {
        return Err(DataLoadError::EmptyCorpus(config.documents.dir.clone()).into());
    }

    let vectors = embed_chunks(config, embedder, &chunks).await?;

    let meta = IndexMeta {
        embedding_model: embedder.model_name().to_string(),
        dims: embedder.dims(),
        chunk_size: config.chunking.chunk_size,
        chunk_overlap: config.chunking.chunk_overlap,
        built_at: Utc::now().timestamp(),
        document_count: documents.len() as i64,
        chunk_count: chunks.len() as i64,
    };

    persist(config, &documents, &chunks, &vectors, &meta)
        .await
        .map_err(ProvisionError::Persist)?;

    let indexed = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, embedding)| IndexedChunk {
            id: chunk.id,
            document_id: chunk.document_id,
            chunk_index: chunk.chunk_index,
            file_name: if chunk.file_name.is_empty() {
                None
            } else {
                Some(chunk.file_name)
            },
            text: chunk.text,
            embedding,
        })
        .collect();

    Ok(VectorIndex::new(meta, indexed))
}

/// Embed all chunk texts in config-sized batches. Backend failures during
/// build surface as `DataLoadError`.
async fn embed_chunks(
    config: &Config,
    embedder: &dyn Embedder,
    chunks: &[Chunk],
) -> Result<Vec<Vec<f32>>, ProvisionError> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut vectors = Vec::with_capacity(texts.len());

    for batch in texts.chunks(config.embedding.batch_size.max(1)) {
        let batch_vectors = embedder
            .embed(batch)
            .await
            .map_err(DataLoadError::Embedding)?;
        vectors.extend(batch_vectors);
    }

    if vectors.len() != chunks.len() {
        return Err(DataLoadError::Embedding(anyhow::anyhow!(
            "embedding backend returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        ))
        .into());
    }

    Ok(vectors)
}

/// Write the persisted index. The database is built at `index.sqlite.tmp`
/// and renamed into place only after the pool is closed, so a reader never
/// observes a half-written index. On failure, anything this run created is
/// removed.
async fn persist(
    config: &Config,
    documents: &[Document],
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
    meta: &IndexMeta,
) -> anyhow::Result<()> {
    let persist_dir = &config.index.persist_dir;
    let created_dir = !persist_dir.exists();
    std::fs::create_dir_all(persist_dir)?;

    let final_path = index_db_path(config);
    let tmp_path = persist_dir.join("index.sqlite.tmp");

    let result = write_db(&tmp_path, documents, chunks, vectors, meta).await;

    match result {
        Ok(()) => {
            std::fs::rename(&tmp_path, &final_path)?;
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_file(&tmp_path);
            if created_dir {
                let _ = std::fs::remove_dir_all(persist_dir);
            }
            Err(e)
        }
    }
}

async fn write_db(
    path: &Path,
    documents: &[Document],
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
    meta: &IndexMeta,
) -> anyhow::Result<()> {
    let pool = store::connect(path, true).await?;
    store::create_schema(&pool).await?;
    store::save_index(&pool, documents, chunks, vectors, meta).await?;
    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ChunkingConfig, Config, DocumentsConfig, EmbeddingConfig, IndexConfig,
    };
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic offline embedder: hashes each text into a small
    /// vector and counts how many batches it was asked to embed.
    struct StubEmbedder {
        calls: AtomicUsize,
    }

    impl StubEmbedder {
        fn new() -> Self {
            StubEmbedder {
                calls: AtomicUsize::new(0),
            }
        }

        fn embed_one(text: &str) -> Vec<f32> {
            let mut v = [0.0f32; 4];
            for (i, b) in text.bytes().enumerate() {
                v[i % 4] += b as f32;
            }
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
            v.iter().map(|x| x / norm).collect()
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        fn model_name(&self) -> &str {
            "stub-model"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, texts: &[String]) -> AnyResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| Self::embed_one(t)).collect())
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
                chunk_size: 100,
                chunk_overlap: 10,
            },
            retrieval: Default::default(),
            embedding: EmbeddingConfig {
                dims: 4,
                ..Default::default()
            },
            llm: Default::default(),
            server: Default::default(),
        }
    }

    fn write_corpus(root: &Path) {
        let doc_dir = root.join("doc");
        std::fs::create_dir_all(&doc_dir).unwrap();
        std::fs::write(doc_dir.join("alpha.md"), "Rust ownership and borrowing. ".repeat(10))
            .unwrap();
        std::fs::write(doc_dir.join("beta.txt"), "Deployment with containers. ".repeat(10))
            .unwrap();
    }

    #[tokio::test]
    async fn first_run_builds_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        write_corpus(tmp.path());
        let config = test_config(tmp.path());

        let index = provision(&config, &StubEmbedder::new()).await.unwrap();
        assert!(index.chunk_count() > 0);
        assert_eq!(index.meta().document_count, 2);
        assert!(index_db_path(&config).exists());
        assert!(!config.index.persist_dir.join("index.sqlite.tmp").exists());
    }

    #[tokio::test]
    async fn second_run_reloads_without_embedding() {
        let tmp = tempfile::tempdir().unwrap();
        write_corpus(tmp.path());
        let config = test_config(tmp.path());

        let built = provision(&config, &StubEmbedder::new()).await.unwrap();

        // Persist dir now exists; a reload must not touch the embedder.
        let idle = StubEmbedder::new();
        let reloaded = provision(&config, &idle).await.unwrap();
        assert_eq!(idle.calls.load(Ordering::SeqCst), 0);
        assert_eq!(reloaded.chunk_count(), built.chunk_count());
        assert_eq!(reloaded.meta().embedding_model, "stub-model");
    }

    #[tokio::test]
    async fn provisioner_memoizes_the_handle() {
        let tmp = tempfile::tempdir().unwrap();
        write_corpus(tmp.path());
        let config = test_config(tmp.path());

        let embedder = Arc::new(StubEmbedder::new());
        let provisioner = IndexProvisioner::new(config, embedder.clone());

        let a = provisioner.get().await.unwrap();
        let b = provisioner.get().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_corpus_fails_and_leaves_no_persisted_index() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("doc")).unwrap();
        let config = test_config(tmp.path());

        let err = provision(&config, &StubEmbedder::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::DataLoad(DataLoadError::EmptyCorpus(_))
        ));
        assert!(!config.index.persist_dir.exists());
    }

    #[tokio::test]
    async fn persist_dir_without_db_file_is_index_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_corpus(tmp.path());
        let config = test_config(tmp.path());
        std::fs::create_dir_all(&config.index.persist_dir).unwrap();

        let err = provision(&config, &StubEmbedder::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::IndexLoad(IndexLoadError::MissingFile(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_db_file_is_index_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_corpus(tmp.path());
        let config = test_config(tmp.path());
        std::fs::create_dir_all(&config.index.persist_dir).unwrap();
        std::fs::write(index_db_path(&config), b"not a sqlite database").unwrap();

        let err = provision(&config, &StubEmbedder::new()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::IndexLoad(_)));
    }
}
