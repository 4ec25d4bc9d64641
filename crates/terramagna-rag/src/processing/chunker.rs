use crate::config::ChunkingConfig;

#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub text: String,
    pub index: usize,
}

/// Sliding-window splitter. Sizes are in bytes of UTF-8 text; every cut lands
/// on a char boundary.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    min_chunk_size: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize, min_chunk_size: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            min_chunk_size,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap, config.min_chunk_size)
    }

    pub fn chunk(&self, text: &str) -> Vec<ChunkResult> {
        let text = text.trim();
        if text.len() <= self.chunk_size {
            if text.len() < self.min_chunk_size {
                return Vec::new();
            }
            return vec![ChunkResult {
                text: text.to_string(),
                index: 0,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0;

        while start < text.len() {
            let raw_end = (start + self.chunk_size).min(text.len());
            let end = snap_to_char_boundary(text, raw_end);

            // Try to find a sentence boundary near the end
            let actual_end = if end < text.len() {
                self.find_break_point(text, start, end)
            } else {
                end
            };

            let chunk_text = text[start..actual_end].trim();

            if chunk_text.len() >= self.min_chunk_size {
                chunks.push(ChunkResult {
                    text: chunk_text.to_string(),
                    index,
                });
                index += 1;
            }

            if actual_end >= text.len() {
                break;
            }

            // Move forward with overlap
            let step = if actual_end - start > self.chunk_overlap {
                actual_end - start - self.chunk_overlap
            } else {
                actual_end - start
            };

            start = snap_up_to_char_boundary(text, start + step.max(1));
        }

        chunks
    }

    fn find_break_point(&self, text: &str, start: usize, preferred_end: usize) -> usize {
        let raw_search_start = preferred_end.saturating_sub(200).max(start + 1);
        let search_start = snap_up_to_char_boundary(text, raw_search_start);
        let safe_end = snap_to_char_boundary(text, preferred_end);

        if search_start >= safe_end {
            return safe_end;
        }

        let search_region = &text[search_start..safe_end];

        // Priority: paragraph break > sentence end > line break > word break
        if let Some(pos) = search_region.rfind("\n\n") {
            return search_start + pos + 2;
        }
        if let Some(pos) = search_region.rfind(". ") {
            return search_start + pos + 2;
        }
        if let Some(pos) = search_region.rfind(".\n") {
            return search_start + pos + 2;
        }
        if let Some(pos) = search_region.rfind('\n') {
            return search_start + pos + 1;
        }
        if let Some(pos) = search_region.rfind(' ') {
            return search_start + pos + 1;
        }

        safe_end
    }
}

/// Snap a byte offset to the nearest valid UTF-8 char boundary (rounding down).
/// If `pos` is beyond text length, returns `text.len()`.
fn snap_to_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut p = pos;
    while p > 0 && !text.is_char_boundary(p) {
        p -= 1;
    }
    p
}

/// Same as [`snap_to_char_boundary`] but rounding up.
fn snap_up_to_char_boundary(text: &str, pos: usize) -> usize {
    let mut p = pos;
    while p < text.len() && !text.is_char_boundary(p) {
        p += 1;
    }
    p.min(text.len())
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = TextChunker::new(100, 20, 5);
        let chunks = chunker.chunk("Villa con piscina en Adeje.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Villa con piscina en Adeje.");
    }

    #[test]
    fn test_tiny_text_is_dropped() {
        let chunker = TextChunker::new(100, 20, 10);
        assert!(chunker.chunk("hola").is_empty());
    }

    #[test]
    fn test_long_text_overlaps_and_respects_size() {
        let sentence = "El apartamento tiene dos dormitorios y vistas al mar. ";
        let text = sentence.repeat(40);
        let chunker = TextChunker::new(200, 50, 10);
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 200, "chunk too large: {}", chunk.text.len());
        }
        for pair in chunks.windows(2) {
            assert!(pair[0].text.contains(&pair[1].text[..10]), "chunks should overlap");
            assert_ne!(pair[0].text, pair[1].text);
        }
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_multibyte_text_terminates() {
        let text = "ñandú áéíóú ".repeat(100);
        let chunker = TextChunker::new(64, 60, 1);
        let chunks = chunker.chunk(&text);
        assert!(!chunks.is_empty());
        assert!(chunks.last().unwrap().text.ends_with("ñandú áéíóú"));
    }
}
