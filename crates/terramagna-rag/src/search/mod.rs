pub mod vector_index;

pub use vector_index::{cosine_similarity, SearchHit, VectorIndex};
