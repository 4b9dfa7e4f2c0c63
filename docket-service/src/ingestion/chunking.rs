//! Overlapping text chunker.
//!
//! Chunks are produced lazily so the embedding stage can persist them in
//! small batches without materializing the whole chunk list. Sizes, overlap
//! and the minimum step count characters; offsets are byte offsets, always
//! on char boundaries.

use tracing::warn;

use crate::config::ChunkingConfig;

/// Splits text into overlapping chunks that prefer paragraph or sentence
/// boundaries.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    min_step: usize,
    max_chunks: usize,
    max_iterations: usize,
}

/// One chunk of a source text
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk<'a> {
    /// Zero-based, contiguous over emitted chunks
    pub index: usize,
    /// Start of the raw (untrimmed) span
    pub start: usize,
    /// End of the raw span, exclusive
    pub end: usize,
    /// Trimmed chunk text
    pub content: &'a str,
}

impl TextChunk<'_> {
    /// Rough token estimate, four characters per token
    pub fn token_count(&self) -> u32 {
        self.content.chars().count().div_ceil(4) as u32
    }
}

impl TextChunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        Self {
            chunk_size,
            overlap: config.chunk_overlap.min(chunk_size / 4),
            min_step: (chunk_size / 20).max(50),
            max_chunks: config.max_chunks,
            max_iterations: config.max_iterations,
        }
    }

    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            chunker: *self,
            text,
            start: 0,
            iterations: 0,
            emitted: 0,
            done: false,
        }
    }

    /// Find a better cut in `text[start + C/2 .. end]`: a paragraph break
    /// first, else the end of a sentence.
    fn find_break(&self, text: &str, start: usize, end: usize) -> Option<usize> {
        let search_from = advance_chars(text, start, (self.chunk_size / 2).max(1));
        if search_from >= end {
            return None;
        }
        let window = &text[search_from..end];

        if let Some(pos) = window.rfind("\n\n") {
            return Some(search_from + pos);
        }
        window.rfind(". ").map(|pos| search_from + pos + 1)
    }
}

/// Lazy chunk iterator, see [`TextChunker::chunks`]
#[derive(Debug)]
pub struct Chunks<'a> {
    chunker: TextChunker,
    text: &'a str,
    start: usize,
    iterations: usize,
    emitted: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    /// Whether the iterator stopped at a ceiling before consuming the text
    pub fn truncated(&self) -> bool {
        self.done && self.start < self.text.len() && self.at_ceiling()
    }

    fn at_ceiling(&self) -> bool {
        self.emitted >= self.chunker.max_chunks || self.iterations >= self.chunker.max_iterations
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.text;
        let len = text.len();

        loop {
            if self.done {
                return None;
            }

            if self.emitted >= self.chunker.max_chunks {
                warn!(
                    max_chunks = self.chunker.max_chunks,
                    remaining_bytes = len - self.start,
                    "Chunk limit reached, truncating remaining text"
                );
                self.done = true;
                return None;
            }

            if self.iterations >= self.chunker.max_iterations {
                warn!(
                    iterations = self.iterations,
                    position = self.start,
                    text_len = len,
                    "Chunking iteration ceiling reached, aborting"
                );
                self.done = true;
                return None;
            }
            self.iterations += 1;

            let start = self.start;
            let mut end = advance_chars(text, start, self.chunker.chunk_size);
            if end < len
                && let Some(cut) = self.chunker.find_break(text, start, end)
            {
                end = cut;
            }

            if end >= len {
                self.done = true;
            } else {
                self.start = retreat_chars(text, end, self.chunker.overlap)
                    .max(advance_chars(text, start, self.chunker.min_step))
                    .min(end);
            }

            let content = text[start..end].trim();
            if !content.is_empty() {
                let index = self.emitted;
                self.emitted += 1;
                return Some(TextChunk {
                    index,
                    start,
                    end,
                    content,
                });
            }
        }
    }
}

/// Byte offset `chars` characters after `from`, clamped to the end
fn advance_chars(text: &str, from: usize, chars: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(chars)
        .map_or(text.len(), |(offset, _)| from + offset)
}

/// Byte offset `chars` characters before `to`, clamped to the start
fn retreat_chars(text: &str, to: usize, chars: usize) -> usize {
    if chars == 0 {
        return to;
    }
    text[..to]
        .char_indices()
        .rev()
        .nth(chars - 1)
        .map_or(0, |(offset, _)| offset)
}
