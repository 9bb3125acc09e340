//! Scoring function registry
//!
//! Pure per-record heuristics. Each function maps one text value to one
//! or more scalars and never observes another function's output, so the
//! engine is free to evaluate them in any order.

use regex::Regex;

/// Signs counted as symbols for the symbol-to-word ratio.
const SYMBOLS: [&str; 3] = ["#", "...", "\u{2026}"];

/// Short stop-word list used to flag natural English prose.
const COMMON_ENGLISH_WORDS: [&str; 8] = ["the", "be", "to", "of", "and", "that", "have", "with"];

const BULLET_PREFIXES: [char; 6] = ['\u{2022}', '\u{2023}', '\u{25aa}', '\u{25e6}', '-', '*'];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordStatistics {
    pub total_words: i64,
    pub mean_word_len: f64,
    pub symbol_to_word_ratio: f64,
}

/// Whitespace-token statistics over one record.
pub fn word_statistics(text: &str) -> WordStatistics {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return WordStatistics {
            total_words: 0,
            mean_word_len: 0.0,
            symbol_to_word_ratio: 0.0,
        };
    }
    let total_len: usize = words.iter().map(|w| w.chars().count()).sum();
    let symbols: usize = SYMBOLS.iter().map(|s| text.matches(s).count()).sum();
    WordStatistics {
        total_words: words.len() as i64,
        mean_word_len: total_len as f64 / words.len() as f64,
        symbol_to_word_ratio: symbols as f64 / words.len() as f64,
    }
}

/// Number of sentences, using language-specific terminators.
pub fn sentence_count(text: &str, japanese: bool) -> i64 {
    let terminators: &[char] = if japanese {
        &['\u{3002}', '\u{ff01}', '\u{ff1f}']
    } else {
        &['.', '!', '?']
    };
    text.split(terminators)
        .filter(|segment| !segment.trim().is_empty())
        .count() as i64
}

/// Occurrences of a pattern per character of text.
pub fn pattern_ratio(text: &str, pattern: &str, normalize: bool) -> f64 {
    let chars = text.chars().count();
    if chars == 0 {
        return 0.0;
    }
    let occurrences = if normalize {
        text.to_lowercase().matches(&pattern.to_lowercase()).count()
    } else {
        text.matches(pattern).count()
    };
    occurrences as f64 / chars as f64
}

/// Combined ratio of opening and closing curly braces.
pub fn curly_bracket_ratio(text: &str) -> f64 {
    pattern_ratio(text, "{", false) + pattern_ratio(text, "}", false)
}

/// Whether any denylisted vocabulary term occurs in the record.
pub fn contains_denylisted_word(text: &str, denylist: &Regex) -> bool {
    denylist.is_match(text)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineShapeStatistics {
    pub bullet_point_ratio: f64,
    pub ellipsis_line_ratio: f64,
    pub alphabet_word_ratio: f64,
}

/// Line- and word-shape heuristics over one record.
pub fn line_shape_statistics(text: &str) -> LineShapeStatistics {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let (mut bullets, mut ellipses) = (0usize, 0usize);
    for line in &lines {
        if line.starts_with(&BULLET_PREFIXES[..]) {
            bullets += 1;
        }
        if line.ends_with("...") || line.ends_with('\u{2026}') {
            ellipses += 1;
        }
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let alphabetic = words
        .iter()
        .filter(|w| w.chars().any(char::is_alphabetic))
        .count();
    LineShapeStatistics {
        bullet_point_ratio: ratio(bullets, lines.len()),
        ellipsis_line_ratio: ratio(ellipses, lines.len()),
        alphabet_word_ratio: ratio(alphabetic, words.len()),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Whether the record contains any of a short list of English stop words.
pub fn contains_common_english_words(text: &str) -> bool {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .any(|w| COMMON_ENGLISH_WORDS.contains(&w.as_str()))
}

/// Average sentence length in characters, segmented on Japanese terminators.
pub fn average_japanese_sentence_length(text: &str) -> f64 {
    let sentences: Vec<&str> = text
        .split(['\u{3002}', '\u{ff01}', '\u{ff1f}'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return 0.0;
    }
    let total: usize = sentences.iter().map(|s| s.chars().count()).sum();
    total as f64 / sentences.len() as f64
}

fn is_japanese_alphabet(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309f}' // hiragana
        | '\u{30a0}'..='\u{30ff}' // katakana
        | '\u{4e00}'..='\u{9fff}' // kanji
    )
}

/// Character offset of the first Japanese-alphabet character, -1 if none.
pub fn first_japanese_alphabet_position(text: &str) -> i64 {
    text.chars()
        .position(is_japanese_alphabet)
        .map(|p| p as i64)
        .unwrap_or(-1)
}
