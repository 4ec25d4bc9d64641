pub mod chunker;
pub mod loader;

pub use chunker::{ChunkResult, TextChunker};
pub use loader::{property_titles, DocumentLoader, LoadedDocument};

use crate::types::KnowledgeChunk;

/// Split every loaded document into retrieval chunks tagged with their source.
pub fn chunk_documents(documents: &[LoadedDocument], chunker: &TextChunker) -> Vec<KnowledgeChunk> {
    documents
        .iter()
        .flat_map(|doc| {
            chunker.chunk(&doc.content).into_iter().map(|c| KnowledgeChunk {
                source: doc.source.clone(),
                text: c.text,
                chunk_index: c.index,
            })
        })
        .collect()
}
