//! Partition transform engine
//!
//! Applies the scoring function registry to every record of an Arrow
//! record batch and assembles a new batch with the feature columns
//! appended. The input batch is never mutated; collisions with already
//! present feature columns are either dropped (with a one-time warning
//! per engine instance) or rejected as a typed error.

use crate::columns::{feature_columns, FeatureColumn};
use crate::perplexity::PerplexityModel;
use crate::scoring;
use arrow::array::{
    Array, ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringArray,
};
use arrow::datatypes::{Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use docq_core::{DocqError, LanguageTag, Result, TransformOptions};
use regex::Regex;
use std::sync::Arc;
use tracing::warn;

/// Read the denylisted-vocabulary resource: one term per line, blank
/// lines and `#` comments skipped.
pub fn load_denylist(path: &std::path::Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        DocqError::Configuration(format!("cannot read denylist {}: {}", path.display(), e))
    })?;
    Ok(parse_denylist(&raw))
}

pub fn parse_denylist(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Compile the denylisted-vocabulary terms into one case-insensitive,
/// word-bounded alternation.
pub fn build_denylist_regex(words: &[String]) -> Result<Regex> {
    let pattern = if words.is_empty() {
        // matches nothing
        "[^\\s\\S]".to_string()
    } else {
        let escaped: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
        format!("(?i)\\b(?:{})\\b", escaped.join("|"))
    };
    Regex::new(&pattern)
        .map_err(|e| DocqError::Configuration(format!("invalid denylist pattern: {}", e)))
}

pub struct PartitionTransformEngine {
    columns: Vec<FeatureColumn>,
    language: LanguageTag,
    text_column: String,
    drop_column_if_existed: bool,
    drop_warning_issued: bool,
    denylist: Regex,
    model: Box<dyn PerplexityModel>,
}

impl PartitionTransformEngine {
    /// Build an engine for one worker. The scoring model must already be
    /// loaded; model failures surface here, before any batch is touched.
    pub fn new(
        options: &TransformOptions,
        denylist_words: &[String],
        model: Box<dyn PerplexityModel>,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            columns: feature_columns(&options.language),
            language: options.language.clone(),
            text_column: options.text_column.clone(),
            drop_column_if_existed: options.drop_column_if_existed,
            drop_warning_issued: false,
            denylist: build_denylist_regex(denylist_words)?,
            model,
        })
    }

    /// Output column names in their fixed order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Annotate one partition batch. Always produces exactly one output
    /// batch with the same records in the same order.
    pub fn transform(&mut self, batch: &RecordBatch) -> Result<Vec<RecordBatch>> {
        let schema = batch.schema();
        let conflicting: Vec<&str> = self
            .columns
            .iter()
            .map(|c| c.name)
            .filter(|name| schema.column_with_name(name).is_some())
            .collect();
        if !conflicting.is_empty() {
            if !self.drop_column_if_existed {
                return Err(DocqError::ColumnConflict {
                    column: conflicting[0].to_string(),
                });
            }
            if !self.drop_warning_issued {
                warn!(columns = ?conflicting, "dropping pre-existing feature columns");
                self.drop_warning_issued = true;
            }
        }

        let text_array = batch
            .column_by_name(&self.text_column)
            .ok_or_else(|| {
                DocqError::Transform(format!("input batch has no {} column", self.text_column))
            })?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                DocqError::Transform(format!("column {} is not a string column", self.text_column))
            })?;

        let capacity = batch.num_rows();
        let japanese = self.language.is_japanese();
        let mut total_words = Int64Builder::with_capacity(capacity);
        let mut mean_word_len = Float64Builder::with_capacity(capacity);
        let mut symbol_to_word_ratio = Float64Builder::with_capacity(capacity);
        let mut sentence_count = Int64Builder::with_capacity(capacity);
        let mut lorem_ipsum_ratio = Float64Builder::with_capacity(capacity);
        let mut curly_bracket_ratio = Float64Builder::with_capacity(capacity);
        let mut contain_bad_word = BooleanBuilder::with_capacity(capacity);
        let mut bullet_point_ratio = Float64Builder::with_capacity(capacity);
        let mut ellipsis_line_ratio = Float64Builder::with_capacity(capacity);
        let mut alphabet_word_ratio = Float64Builder::with_capacity(capacity);
        let mut contain_common_en_words = BooleanBuilder::with_capacity(capacity);
        let mut perplex_score = Float64Builder::with_capacity(capacity);
        let mut avg_ja_sentence_len = Float64Builder::with_capacity(capacity);
        let mut first_ja_alphabet_pos = Int64Builder::with_capacity(capacity);

        for row in 0..capacity {
            let text = if text_array.is_null(row) {
                ""
            } else {
                text_array.value(row)
            };

            let words = scoring::word_statistics(text);
            total_words.append_value(words.total_words);
            mean_word_len.append_value(words.mean_word_len);
            symbol_to_word_ratio.append_value(words.symbol_to_word_ratio);

            sentence_count.append_value(scoring::sentence_count(text, japanese));
            lorem_ipsum_ratio.append_value(scoring::pattern_ratio(text, "lorem ipsum", true));
            curly_bracket_ratio.append_value(scoring::curly_bracket_ratio(text));
            contain_bad_word.append_value(scoring::contains_denylisted_word(text, &self.denylist));

            let lines = scoring::line_shape_statistics(text);
            bullet_point_ratio.append_value(lines.bullet_point_ratio);
            ellipsis_line_ratio.append_value(lines.ellipsis_line_ratio);
            alphabet_word_ratio.append_value(lines.alphabet_word_ratio);

            contain_common_en_words.append_value(scoring::contains_common_english_words(text));
            perplex_score.append_value(self.model.perplexity(text));

            if japanese {
                avg_ja_sentence_len.append_value(scoring::average_japanese_sentence_length(text));
                first_ja_alphabet_pos
                    .append_value(scoring::first_japanese_alphabet_position(text));
            }
        }

        let mut fields: Vec<FieldRef> = Vec::with_capacity(schema.fields().len() + self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());
        for (index, field) in schema.fields().iter().enumerate() {
            if conflicting.contains(&field.name().as_str()) {
                continue;
            }
            fields.push(field.clone());
            arrays.push(batch.column(index).clone());
        }

        let mut feature_arrays: Vec<ArrayRef> = vec![
            Arc::new(total_words.finish()),
            Arc::new(mean_word_len.finish()),
            Arc::new(symbol_to_word_ratio.finish()),
            Arc::new(sentence_count.finish()),
            Arc::new(lorem_ipsum_ratio.finish()),
            Arc::new(curly_bracket_ratio.finish()),
            Arc::new(contain_bad_word.finish()),
            Arc::new(bullet_point_ratio.finish()),
            Arc::new(ellipsis_line_ratio.finish()),
            Arc::new(alphabet_word_ratio.finish()),
            Arc::new(contain_common_en_words.finish()),
            Arc::new(perplex_score.finish()),
        ];
        if japanese {
            feature_arrays.push(Arc::new(avg_ja_sentence_len.finish()));
            feature_arrays.push(Arc::new(first_ja_alphabet_pos.finish()));
        }
        for (column, array) in self.columns.iter().zip(&feature_arrays) {
            debug_assert_eq!(array.data_type(), &column.data_type);
            fields.push(Arc::new(Field::new(column.name, column.data_type.clone(), false)));
        }
        arrays.extend(feature_arrays);

        let output = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .map_err(|e| DocqError::Transform(format!("cannot assemble output batch: {}", e)))?;
        Ok(vec![output])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::DataType;

    struct ConstModel(f64);

    impl PerplexityModel for ConstModel {
        fn perplexity(&self, _text: &str) -> f64 {
            self.0
        }
    }

    fn options(language: &str, drop_column_if_existed: bool) -> TransformOptions {
        TransformOptions {
            language: LanguageTag::new(language),
            drop_column_if_existed,
            text_column: "text".to_string(),
            annotation_column: "blocklisted".to_string(),
            source_url_column: "title".to_string(),
            denylist_path: "corpus/resources/ldnoobw/en".to_string(),
        }
    }

    fn engine(language: &str, drop_column_if_existed: bool) -> PartitionTransformEngine {
        PartitionTransformEngine::new(
            &options(language, drop_column_if_existed),
            &["badword".to_string()],
            Box::new(ConstModel(250.0)),
        )
        .unwrap()
    }

    fn text_batch(texts: &[&str]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("text", DataType::Utf8, true)]));
        let array: ArrayRef = Arc::new(StringArray::from(texts.to_vec()));
        RecordBatch::try_new(schema, vec![array]).unwrap()
    }

    #[test]
    fn english_batch_gains_twelve_feature_columns() {
        let mut engine = engine("en", true);
        let batch = text_batch(&[
            "the quick brown fox jumps.",
            "- bullet line\nsecond line...",
            "{ json like } content",
        ]);
        let output = engine.transform(&batch).unwrap();
        assert_eq!(output.len(), 1);
        let output = &output[0];
        assert_eq!(output.num_rows(), 3);
        assert_eq!(output.num_columns(), 1 + 12);
        assert!(output.column_by_name("docq_perplex_score").is_some());
        assert!(output.column_by_name("docq_avg_ja_sentence_len").is_none());

        let totals = output
            .column_by_name("docq_total_words")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(totals.values().to_vec(), vec![5, 5, 5]);
    }

    #[test]
    fn japanese_batch_gains_fourteen_feature_columns() {
        let mut engine = engine("ja", true);
        let batch = text_batch(&[
            "\u{3053}\u{3093}\u{306b}\u{3061}\u{306f}\u{3002}",
            "plain latin",
            "",
        ]);
        let output = engine.transform(&batch).unwrap();
        let output = &output[0];
        assert_eq!(output.num_rows(), 3);
        assert_eq!(output.num_columns(), 1 + 14);
        let positions = output
            .column_by_name("docq_first_ja_alphabet_pos")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(positions.values().to_vec(), vec![0, -1, -1]);
    }

    #[test]
    fn existing_feature_column_is_replaced_when_drop_is_enabled() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("text", DataType::Utf8, true),
            Field::new("docq_total_words", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["one two three"])) as ArrayRef,
                Arc::new(Int64Array::from(vec![99])) as ArrayRef,
            ],
        )
        .unwrap();

        let mut engine = engine("en", true);
        let output = engine.transform(&batch).unwrap();
        let output = &output[0];
        let output_schema = output.schema();
        let matching: Vec<_> = output_schema
            .fields()
            .iter()
            .filter(|f| f.name() == "docq_total_words")
            .collect();
        assert_eq!(matching.len(), 1);
        let totals = output
            .column_by_name("docq_total_words")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(totals.value(0), 3);

        // input batch keeps its original column
        let original = batch
            .column_by_name("docq_total_words")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(original.value(0), 99);
    }

    #[test]
    fn existing_feature_column_is_a_conflict_when_drop_is_disabled() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("text", DataType::Utf8, true),
            Field::new("docq_sentence_count", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["hello."])) as ArrayRef,
                Arc::new(Int64Array::from(vec![7])) as ArrayRef,
            ],
        )
        .unwrap();

        let mut engine = engine("en", false);
        let result = engine.transform(&batch);
        assert!(matches!(
            result,
            Err(DocqError::ColumnConflict { column }) if column == "docq_sentence_count"
        ));
    }

    #[test]
    fn column_set_is_identical_across_engine_instances() {
        let mut first = engine("ja", true);
        let mut second = engine("ja", true);
        let batch = text_batch(&["a", "b", "c"]);
        let first_names: Vec<String> = first.transform(&batch).unwrap()[0]
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        let second_names: Vec<String> = second.transform(&batch).unwrap()[0]
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(first_names, second_names);
        assert_eq!(first.column_names(), second.column_names());
    }

    #[test]
    fn denylisted_vocabulary_is_flagged_per_record() {
        let mut engine = engine("en", true);
        let batch = text_batch(&["clean prose here", "contains badword today"]);
        let output = engine.transform(&batch).unwrap();
        let flags = output[0]
            .column_by_name("docq_contain_bad_word")
            .unwrap()
            .as_any()
            .downcast_ref::<arrow::array::BooleanArray>()
            .unwrap();
        assert!(!flags.value(0));
        assert!(flags.value(1));
    }

    #[test]
    fn missing_text_column_is_a_transform_error() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "body",
            DataType::Utf8,
            true,
        )]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["x"])) as ArrayRef],
        )
        .unwrap();
        let mut engine = engine("en", true);
        assert!(matches!(
            engine.transform(&batch),
            Err(DocqError::Transform(_))
        ));
    }

    #[test]
    fn empty_denylist_never_matches() {
        let regex = build_denylist_regex(&[]).unwrap();
        assert!(!regex.is_match("anything at all"));
    }

    #[test]
    fn denylist_parsing_skips_blanks_and_comments() {
        let words = parse_denylist("# header\nfirst\n\n  second  \n");
        assert_eq!(words, vec!["first".to_string(), "second".to_string()]);
    }
}
