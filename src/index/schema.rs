//! Tantivy schema for summary records.
//!
//! Free-text fields (`property_value`, `property_type`) are tokenized with
//! positions for phrase matching, and each has a keyword twin holding the
//! whole folded value for exact, prefix and suffix matching. Semantic tags are
//! keywords only. Records are identified by their ordinal in the snapshot's
//! record list, stored alongside.

use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::{LowerCaser, RegexTokenizer, TextAnalyzer};
use tantivy::{Index, TantivyDocument};

use crate::analysis;
use crate::model::AnnotationSummary;

/// Tokenizer for free-text summary fields.
pub const TOKENIZER_SUMMARY_TEXT: &str = "ontomap_summary_text";

// ---------------------------------------------------------------------------
// Field handles
// ---------------------------------------------------------------------------

/// Handles for every field of the summary schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryFields {
    pub ordinal: Field,
    pub property_value: Field,
    pub property_value_keyword: Field,
    pub property_type: Field,
    pub property_type_keyword: Field,
    pub semantic_tag: Field,
}

impl SummaryFields {
    /// Handles of the schema built by [`build_summary_schema`].
    pub fn new() -> Self {
        build_summary_schema().1
    }
}

impl Default for SummaryFields {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Schema builder
// ---------------------------------------------------------------------------

/// Build the summary schema; field handles are assigned in a fixed order.
pub fn build_summary_schema() -> (Schema, SummaryFields) {
    let mut b = Schema::builder();

    let ordinal = b.add_u64_field("ordinal", STORED);

    let text_options = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER_SUMMARY_TEXT)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    let property_value = b.add_text_field("property_value", text_options.clone());
    let property_value_keyword = b.add_text_field("property_value_keyword", STRING);
    let property_type = b.add_text_field("property_type", text_options);
    let property_type_keyword = b.add_text_field("property_type_keyword", STRING);
    let semantic_tag = b.add_text_field("semantic_tag", STRING);

    let fields = SummaryFields {
        ordinal,
        property_value,
        property_value_keyword,
        property_type,
        property_type_keyword,
        semantic_tag,
    };
    (b.build(), fields)
}

/// Register the summary text tokenizer on a freshly created index.
///
/// Text is folded before it is added, so the tokenizer only has to split it
/// the same way [`analysis::tokenize`] does.
pub fn register_tokenizers(index: &Index) -> tantivy::Result<()> {
    let analyzer = TextAnalyzer::builder(RegexTokenizer::new(analysis::TOKEN_PATTERN)?)
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(TOKENIZER_SUMMARY_TEXT, analyzer);
    Ok(())
}

// ---------------------------------------------------------------------------
// Document conversion
// ---------------------------------------------------------------------------

/// Convert one summary record into a document.
pub fn summary_document(ordinal: u64, record: &AnnotationSummary, fields: &SummaryFields) -> TantivyDocument {
    let mut doc = TantivyDocument::default();
    doc.add_u64(fields.ordinal, ordinal);

    doc.add_text(fields.property_value, analysis::fold(&record.property_value));
    doc.add_text(fields.property_value_keyword, analysis::keyword(&record.property_value));

    if let Some(ty) = &record.property_type {
        doc.add_text(fields.property_type, analysis::fold(ty));
        doc.add_text(fields.property_type_keyword, analysis::keyword(ty));
    }
    for tag in &record.semantic_tags {
        doc.add_text(fields.semantic_tag, analysis::keyword(tag));
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::tokenizer::TokenStream;

    #[test]
    fn field_handles_are_stable_across_builds() {
        let (schema, fields) = build_summary_schema();
        assert_eq!(fields, SummaryFields::new());
        assert_eq!(schema.get_field("semantic_tag").unwrap(), fields.semantic_tag);
        assert_eq!(schema.get_field("property_value").unwrap(), fields.property_value);
    }

    #[test]
    fn tokenizer_registers_on_index() {
        let (schema, _) = build_summary_schema();
        let index = Index::create_in_ram(schema);
        register_tokenizers(&index).unwrap();
        let mut analyzer = index.tokenizers().get(TOKENIZER_SUMMARY_TEXT).unwrap();
        let mut stream = analyzer.token_stream("liver, (adult) 12.5 h");
        let mut tokens = Vec::new();
        while let Some(token) = stream.next() {
            tokens.push(token.text.clone());
        }
        assert_eq!(tokens, analysis::tokenize("liver, (adult) 12.5 h"));
    }
}
