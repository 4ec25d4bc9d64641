use anyhow::{anyhow, Result};
use rayon::prelude::*;

use crate::types::KnowledgeChunk;

/// A retrieved chunk and its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: KnowledgeChunk,
    pub score: f32,
}

/// Brute-force in-memory index. Built once at startup and then only read.
#[derive(Debug, Default)]
pub struct VectorIndex {
    chunks: Vec<KnowledgeChunk>,
    vectors: Vec<Vec<f32>>,
    dimension: usize,
}

impl VectorIndex {
    /// Pair each chunk with its embedding. All vectors must share one dimension.
    pub fn build(chunks: Vec<KnowledgeChunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(anyhow!(
                "{} chunks but {} embeddings",
                chunks.len(),
                vectors.len()
            ));
        }
        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        if let Some(bad) = vectors.iter().position(|v| v.len() != dimension) {
            return Err(anyhow!(
                "Embedding {} has dimension {}, expected {}",
                bad,
                vectors[bad].len(),
                dimension
            ));
        }
        Ok(Self {
            chunks,
            vectors,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Distinct source files represented in the index.
    pub fn document_count(&self) -> usize {
        let mut sources: Vec<&str> = self.chunks.iter().map(|c| c.source.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();
        sources.len()
    }

    /// Top `k` chunks by descending cosine similarity. Equal scores keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if self.is_empty() || k == 0 || query.len() != self.dimension {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .par_iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();

        // stable sort
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| SearchHit {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
