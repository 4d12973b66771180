//! Manual RAG pipeline: local keyword retrieval plus LLM generation.

use super::RetrievalPipeline;
use crate::error::{EvalError, Result};
use crate::llm::{CompletionRequest, LlmClient};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Configuration for text chunking.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    text: String,
    terms: HashSet<String>,
}

/// In-memory keyword index over a directory of text files.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    chunks: Vec<IndexedChunk>,
}

impl KeywordIndex {
    /// Index every `.txt` and `.md` file under `dir`, in path order.
    pub fn load(dir: &Path, config: &ChunkConfig) -> Result<Self> {
        if !dir.is_dir() {
            return Err(EvalError::Pipeline(format!(
                "Corpus directory '{}' does not exist",
                dir.display()
            )));
        }

        let mut index = Self::default();
        let mut files = 0;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| EvalError::Pipeline(e.to_string()))?;
            let path = entry.path();
            let is_text = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("txt") | Some("md")
            );
            if !entry.file_type().is_file() || !is_text {
                continue;
            }

            let text = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
            index.add_text(&text, config);
            files += 1;
        }

        if index.is_empty() {
            warn!(corpus = %dir.display(), "corpus has no indexable text");
        } else {
            info!(files, chunks = index.len(), corpus = %dir.display(), "corpus indexed");
        }
        Ok(index)
    }

    /// Chunk and index a text.
    pub fn add_text(&mut self, text: &str, config: &ChunkConfig) {
        for chunk in chunk_text(text, config) {
            let terms = tokenize(&chunk).collect();
            self.chunks.push(IndexedChunk { text: chunk, terms });
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks sharing the most distinct terms with the query, best first.
    ///
    /// Chunks with no shared term are never returned; ties keep corpus order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<String> {
        let query_terms: HashSet<String> = tokenize(query).collect();

        let mut scored: Vec<(usize, usize)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, chunk.terms.intersection(&query_terms).count()))
            .filter(|&(_, overlap)| overlap > 0)
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        scored
            .into_iter()
            .take(top_k)
            .map(|(i, _)| self.chunks[i].text.clone())
            .collect()
    }
}

/// Lowercased word terms of three or more characters.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
}

/// Split text into overlapping chunks, preferring sentence boundaries.
fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let text_len = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text_len {
        let end = (start + config.chunk_size).min(text_len);

        // Break at the last sentence end within the final 100 chars, if any.
        let search_start = end.saturating_sub(100).max(start);
        let adjusted_end = if end < text_len {
            chars[search_start..end]
                .iter()
                .rposition(|c| matches!(c, '.' | '!' | '?'))
                .map(|pos| search_start + pos + 1)
                .filter(|&candidate| candidate > start)
                .unwrap_or(end)
        } else {
            end
        };

        let chunk: String = chars[start..adjusted_end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk.trim().to_string());
        }

        if adjusted_end >= text_len {
            break;
        }

        let next_start = adjusted_end.saturating_sub(config.chunk_overlap);
        start = if next_start <= start { start + 1 } else { next_start };
    }

    chunks
}

/// Manual RAG: keyword retrieval over the dataset corpus, generation via an LLM.
pub struct ManualRag {
    corpus: PathBuf,
    chunking: ChunkConfig,
    index: OnceCell<KeywordIndex>,
    client: Arc<dyn LlmClient>,
    model: String,
}

impl ManualRag {
    pub fn new(index: KeywordIndex, client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            corpus: PathBuf::new(),
            chunking: ChunkConfig::default(),
            index: OnceCell::from(index),
            client,
            model: model.into(),
        }
    }

    /// Retrieve from `corpus_dir/dataset`, indexed on the first search.
    ///
    /// A missing corpus surfaces as a search error, so it fails this
    /// pipeline only.
    pub fn open(
        corpus_dir: &Path,
        dataset: &str,
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            corpus: corpus_dir.join(dataset),
            chunking: ChunkConfig::default(),
            index: OnceCell::new(),
            client,
            model: model.into(),
        }
    }

    async fn index(&self) -> Result<&KeywordIndex> {
        self.index
            .get_or_try_init(|| async { KeywordIndex::load(&self.corpus, &self.chunking) })
            .await
    }
}

#[async_trait]
impl RetrievalPipeline for ManualRag {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        let chunks = self.index().await?.search(query, top_k);
        debug!(retrieved = chunks.len(), top_k, "keyword search");
        Ok(chunks)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let completion = self
            .client
            .complete(&CompletionRequest::user(self.model.clone(), prompt))
            .await?;
        Ok(completion.text.trim().to_string())
    }
}
