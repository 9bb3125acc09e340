//! Feature column set
//!
//! The ordered list of output columns the engine produces for a batch.
//! The set is a function of the language tag alone, decided once at
//! engine construction: Japanese input appends two heuristic columns.

use arrow::datatypes::DataType;
use docq_core::LanguageTag;

/// One output column the engine is responsible for producing.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureColumn {
    pub name: &'static str,
    pub data_type: DataType,
}

impl FeatureColumn {
    fn new(name: &'static str, data_type: DataType) -> Self {
        Self { name, data_type }
    }
}

pub const TOTAL_WORDS: &str = "docq_total_words";
pub const MEAN_WORD_LEN: &str = "docq_mean_word_len";
pub const SYMBOL_TO_WORD_RATIO: &str = "docq_symbol_to_word_ratio";
pub const SENTENCE_COUNT: &str = "docq_sentence_count";
pub const LOREM_IPSUM_RATIO: &str = "docq_lorem_ipsum_ratio";
pub const CURLY_BRACKET_RATIO: &str = "docq_curly_bracket_ratio";
pub const CONTAIN_BAD_WORD: &str = "docq_contain_bad_word";
pub const BULLET_POINT_RATIO: &str = "docq_bullet_point_ratio";
pub const ELLIPSIS_LINE_RATIO: &str = "docq_ellipsis_line_ratio";
pub const ALPHABET_WORD_RATIO: &str = "docq_alphabet_word_ratio";
pub const CONTAIN_COMMON_EN_WORDS: &str = "docq_contain_common_en_words";
pub const PERPLEX_SCORE: &str = "docq_perplex_score";
pub const AVG_JA_SENTENCE_LEN: &str = "docq_avg_ja_sentence_len";
pub const FIRST_JA_ALPHABET_POS: &str = "docq_first_ja_alphabet_pos";

/// Active feature column set for a language, in output order.
pub fn feature_columns(language: &LanguageTag) -> Vec<FeatureColumn> {
    let mut columns = vec![
        FeatureColumn::new(TOTAL_WORDS, DataType::Int64),
        FeatureColumn::new(MEAN_WORD_LEN, DataType::Float64),
        FeatureColumn::new(SYMBOL_TO_WORD_RATIO, DataType::Float64),
        FeatureColumn::new(SENTENCE_COUNT, DataType::Int64),
        FeatureColumn::new(LOREM_IPSUM_RATIO, DataType::Float64),
        FeatureColumn::new(CURLY_BRACKET_RATIO, DataType::Float64),
        FeatureColumn::new(CONTAIN_BAD_WORD, DataType::Boolean),
        FeatureColumn::new(BULLET_POINT_RATIO, DataType::Float64),
        FeatureColumn::new(ELLIPSIS_LINE_RATIO, DataType::Float64),
        FeatureColumn::new(ALPHABET_WORD_RATIO, DataType::Float64),
        FeatureColumn::new(CONTAIN_COMMON_EN_WORDS, DataType::Boolean),
        FeatureColumn::new(PERPLEX_SCORE, DataType::Float64),
    ];
    if language.is_japanese() {
        columns.push(FeatureColumn::new(AVG_JA_SENTENCE_LEN, DataType::Float64));
        columns.push(FeatureColumn::new(FIRST_JA_ALPHABET_POS, DataType::Int64));
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_column_set_has_twelve_entries() {
        let columns = feature_columns(&LanguageTag::new("en"));
        assert_eq!(columns.len(), 12);
        assert!(!columns.iter().any(|c| c.name == AVG_JA_SENTENCE_LEN));
    }

    #[test]
    fn japanese_column_set_appends_two_entries() {
        let columns = feature_columns(&LanguageTag::new("ja"));
        assert_eq!(columns.len(), 14);
        assert_eq!(columns[12].name, AVG_JA_SENTENCE_LEN);
        assert_eq!(columns[13].name, FIRST_JA_ALPHABET_POS);
    }

    #[test]
    fn column_set_is_deterministic_for_a_language() {
        let first = feature_columns(&LanguageTag::new("ja"));
        let second = feature_columns(&LanguageTag::new("ja"));
        assert_eq!(first, second);
    }
}
