//! Text canonicalisation and dominant-language detection for mixed
//! Vietnamese/English content.
//!
//! The thresholds below are fixed. Tests and stored `language` tags depend on
//! them, so they are not part of [`crate::EngineConfig`].

use crate::models::LanguageTag;

/// Lowercase Vietnamese letters carrying diacritics, listed explicitly.
pub const VIETNAMESE_DIACRITICS: &str =
    "àáảãạăắằẳẵặâấầẩẫậèéẻẽẹêếềểễệìíỉĩịòóỏõọôốồổỗộơớờởỡợùúủũụưứừửữựỳýỷỹỵđ";

/// Trimmed texts shorter than this many characters are [`LanguageTag::Unknown`].
pub const MIN_LANGUAGE_SAMPLE_CHARS: usize = 10;

/// Diacritic share of alphabetic characters above which a text is Vietnamese.
pub const VIETNAMESE_RATIO_THRESHOLD: f64 = 0.05;

/// Diacritic share above which a text is mixed Vietnamese/English.
pub const MIXED_RATIO_THRESHOLD: f64 = 0.01;

pub fn is_vietnamese_diacritic(ch: char) -> bool {
    VIETNAMESE_DIACRITICS.contains(ch)
}

fn is_kept(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch.is_whitespace() || is_vietnamese_diacritic(ch)
}

/// Lowercases, replaces punctuation with spaces and collapses whitespace.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .map(|ch| if is_kept(ch) { ch } else { ' ' })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn detect_language(text: &str) -> LanguageTag {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_LANGUAGE_SAMPLE_CHARS {
        return LanguageTag::Unknown;
    }

    let mut alphabetic = 0usize;
    let mut diacritics = 0usize;
    for ch in trimmed.to_lowercase().chars().filter(|ch| ch.is_alphabetic()) {
        alphabetic += 1;
        if is_vietnamese_diacritic(ch) {
            diacritics += 1;
        }
    }

    if alphabetic == 0 {
        return LanguageTag::Unknown;
    }

    let ratio = diacritics as f64 / alphabetic as f64;
    if ratio > VIETNAMESE_RATIO_THRESHOLD {
        LanguageTag::Vi
    } else if ratio > MIXED_RATIO_THRESHOLD {
        LanguageTag::Mixed
    } else {
        LanguageTag::En
    }
}
