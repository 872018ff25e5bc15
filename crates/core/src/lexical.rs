use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalMatch {
    pub score: f64,
    pub matched_terms: Vec<String>,
}

/// Token-overlap score of a normalised document against a normalised query.
///
/// The score is the share of distinct query tokens found in the document,
/// plus `phrase_bonus` when the whole query occurs verbatim, capped at 1.0.
/// Returns `None` when no query token occurs in the document.
pub fn score_lexical(
    normalized_query: &str,
    normalized_document: &str,
    phrase_bonus: f64,
) -> Option<LexicalMatch> {
    let mut seen = HashSet::new();
    let query_tokens: Vec<&str> = normalized_query
        .split_whitespace()
        .filter(|token| seen.insert(*token))
        .collect();
    if query_tokens.is_empty() {
        return None;
    }

    let document_tokens: HashSet<&str> = normalized_document.split_whitespace().collect();
    let matched_terms: Vec<String> = query_tokens
        .iter()
        .filter(|token| document_tokens.contains(*token))
        .map(|token| token.to_string())
        .collect();
    if matched_terms.is_empty() {
        return None;
    }

    let mut score = matched_terms.len() as f64 / query_tokens.len() as f64;
    if normalized_document.contains(normalized_query) {
        score += phrase_bonus;
    }

    Some(LexicalMatch {
        score: score.min(1.0),
        matched_terms,
    })
}
