use crate::error::IngestError;
use crate::models::{Chunk, IngestionOptions};
use crate::text::{detect_language, normalize};

/// Sentence terminators in break priority order. Newlines never survive
/// [`normalize_whitespace`], so only the space-suffixed forms can match.
const SENTENCE_BREAKS: [[char; 2]; 5] = [['.', ' '], ['!', ' '], ['?', ' '], [';', ' '], [':', ' ']];

/// A plain space only counts as a break past this share of the window.
const MIN_SPACE_BREAK_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, IngestError> {
        let config = Self {
            max_chars,
            overlap_chars,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 || self.overlap_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk size ({}) and overlap ({}) must be positive",
                self.max_chars, self.overlap_chars
            )));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&IngestionOptions::default())
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_size,
            overlap_chars: value.chunk_overlap,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `text` into overlapping, non-empty pieces of at most
/// `config.max_chars` characters, preferring sentence ends as boundaries.
///
/// Offsets are counted in characters of the whitespace-normalised text.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    let normalized = normalize_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();
    let length = chars.len();

    if length == 0 {
        return Ok(Vec::new());
    }
    if length <= config.max_chars {
        return Ok(vec![normalized]);
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < length {
        let mut end = start + config.max_chars;
        if end < length {
            if let Some(natural) = find_break(&chars, start, end, config.max_chars) {
                end = natural;
            }
        } else {
            end = length;
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= length {
            break;
        }
        start = (start + 1).max(end.saturating_sub(config.overlap_chars));
    }

    Ok(chunks)
}

/// End offset (exclusive) of the best break inside `chars[start..end]`.
fn find_break(chars: &[char], start: usize, end: usize, max_chars: usize) -> Option<usize> {
    for pattern in SENTENCE_BREAKS {
        if let Some(position) = rfind(chars, &pattern, start, end) {
            return Some(position + pattern.len());
        }
    }

    let threshold = start as f64 + max_chars as f64 * MIN_SPACE_BREAK_RATIO;
    rfind(chars, &[' '], start, end)
        .filter(|position| *position as f64 > threshold)
        .map(|position| position + 1)
}

fn rfind(chars: &[char], pattern: &[char], start: usize, end: usize) -> Option<usize> {
    if end < start + pattern.len() {
        return None;
    }
    (start..=end - pattern.len())
        .rev()
        .find(|&position| chars[position..position + pattern.len()] == *pattern)
}

/// Chunks one document's text into ordered, immutable [`Chunk`]s.
pub fn build_chunks(
    document_id: &str,
    raw_text: &str,
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, IngestError> {
    let pieces = split_text(raw_text, config)?;

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(sequence_index, content)| Chunk {
            chunk_id: Chunk::id_for(document_id, sequence_index),
            document_id: document_id.to_string(),
            sequence_index,
            normalized_content: normalize(&content),
            language: detect_language(&content),
            content_length: content.chars().count(),
            content,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LanguageTag;

    const VI_SAMPLE: &str =
        "Học máy là một lĩnh vực của khoa học máy tính. Nó giúp máy tính học từ dữ liệu.";

    fn config(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig::new(max_chars, overlap_chars).expect("valid config")
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        let normalized = normalize_whitespace(input);
        assert_eq!(normalized, "A lot of spacing");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(10, 0).is_err());
        assert!(ChunkingConfig::new(10, 10).is_err());
        assert!(ChunkingConfig::new(10, 20).is_err());
        assert!(ChunkingConfig::new(10, 9).is_ok());
    }

    #[test]
    fn short_text_is_a_single_normalized_chunk() {
        let inputs = ["hello", "  many\n\n  lines\there  ", "Học máy.", VI_SAMPLE];
        for input in inputs {
            let chunks = split_text(input, config(1000, 200)).expect("split");
            assert_eq!(chunks, vec![normalize_whitespace(input)]);
        }
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_text("  \n\t ", config(50, 10)).expect("split").is_empty());
    }

    #[test]
    fn sentence_ends_are_preferred_and_tail_is_not_repeated() {
        let chunks = split_text(VI_SAMPLE, config(50, 10)).expect("split");
        assert_eq!(
            chunks,
            vec![
                "Học máy là một lĩnh vực của khoa học máy tính.",
                "máy tính. Nó giúp máy tính học từ dữ liệu.",
            ]
        );
    }

    #[test]
    fn spaces_late_in_the_window_are_used() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let chunks = split_text(text, config(20, 5)).expect("split");
        assert_eq!(chunks[0], "alpha beta gamma");
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 20));
        assert_eq!(chunks.last().map(String::as_str), Some("appa lambda mu"));
    }

    #[test]
    fn unbroken_text_is_cut_at_the_raw_boundary() {
        let text = "x".repeat(45);
        let chunks = split_text(&text, config(20, 5)).expect("split");
        let lengths: Vec<usize> = chunks.iter().map(|chunk| chunk.len()).collect();
        assert_eq!(lengths, vec![20, 20, 15]);
    }

    #[test]
    fn chunk_count_is_bounded_for_raw_cuts() {
        for length in [21usize, 99, 100, 101, 997, 2500] {
            let text = "y".repeat(length);
            let (max_chars, overlap_chars) = (100, 30);
            let chunks = split_text(&text, config(max_chars, overlap_chars)).expect("split");
            let stride = max_chars - overlap_chars;
            let bound = length.div_ceil(stride) + 1;
            assert!(chunks.len() <= bound, "{} chunks for {length}", chunks.len());
            assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
        }
    }

    #[test]
    fn every_chunk_is_non_empty_and_within_size() {
        let text = "Sentence one. Sentence two! Another: with colon; and semicolon? ".repeat(40);
        let chunks = split_text(&text, config(120, 30)).expect("split");
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert!(chunk.chars().count() <= 120);
        }
    }

    #[test]
    fn pathological_breaks_still_make_progress() {
        let text = format!("a. {}", "b".repeat(300));
        let chunks = split_text(&text, config(50, 40)).expect("split");
        assert!(!chunks.is_empty());
        assert!(chunks.len() < text.len());
    }

    #[test]
    fn built_chunks_are_tagged_and_indexed() {
        let chunks = build_chunks("doc1", VI_SAMPLE, config(50, 10)).expect("build");
        assert_eq!(chunks.len(), 2);
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, index);
            assert_eq!(chunk.chunk_id, format!("doc1_chunk_{index}"));
            assert_eq!(chunk.language, LanguageTag::Vi);
            assert_eq!(chunk.content_length, chunk.content.chars().count());
        }
        assert_eq!(
            chunks[0].normalized_content,
            "học máy là một lĩnh vực của khoa học máy tính"
        );
    }
}
