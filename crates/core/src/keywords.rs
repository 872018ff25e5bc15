use crate::text::normalize;

pub const MAX_KEYWORDS: usize = 5;
pub const MIN_KEYWORD_CHARS: usize = 3;

/// Vietnamese and English function words dropped from keyword queries.
pub const STOP_WORDS: &[&str] = &[
    // Vietnamese
    "là", "của", "và", "có", "trong", "với", "để", "được", "một", "các", "này", "đó", "như",
    "về", "cho", "từ", "khi", "nào", "nếu", "thì", "sẽ", "đã", "đang", "sao", "gì", "ai", "đâu",
    "bao", "giờ", "thế", "tại", "vì", "do", "bởi", "theo",
    // English
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "up", "about", "into", "through", "during", "before", "after", "above", "below",
    "between", "among", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should",
];

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Up to [`MAX_KEYWORDS`] salient tokens of `text`, in their original order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|token| !is_stop_word(token))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}
