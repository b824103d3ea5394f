//! Structured queries over the summary index and the formulator that builds them.
//!
//! A pattern becomes a single term, prefix or suffix match when it analyzes to
//! one token, and a phrase match within the configured slop when it analyzes
//! to several. Queries compose through boolean clauses with boosts.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tantivy::query::{
    BooleanQuery, BoostQuery, Occur, PhrasePrefixQuery, PhraseQuery, Query, QueryClone, RegexQuery, TermQuery,
};
use tantivy::schema::{IndexRecordOption, Term};

use crate::analysis;
use crate::error::QueryError;
use crate::index::schema::SummaryFields;

/// A query ready to run against a summary index.
pub type SummaryQuery = Box<dyn Query>;

/// Upper bound on the terms a trailing prefix may expand to.
const PREFIX_EXPANSIONS: u32 = 4096;

/// Searchable fields of a summary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PropertyValue,
    PropertyType,
    SemanticTag,
}

impl Field {
    /// Fields holding whole identifiers rather than free text.
    pub fn is_keyword_only(self) -> bool {
        matches!(self, Field::SemanticTag)
    }
}

/// How a pattern is matched against a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// The whole field value equals the whole pattern.
    Exact,
    /// Every token of the pattern occurs, within the proximity slop.
    Full,
    /// The pattern starts the field; its last token may be incomplete.
    Prefix,
    /// The pattern ends a term; its first token may be incomplete.
    Suffix,
}

impl FromStr for QueryKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "full" => Ok(Self::Full),
            "prefix" => Ok(Self::Prefix),
            "suffix" => Ok(Self::Suffix),
            _ => Err(QueryError::UnknownKind { kind: s.to_string() }),
        }
    }
}

fn term_query(field: tantivy::schema::Field, text: &str, option: IndexRecordOption) -> SummaryQuery {
    Box::new(TermQuery::new(Term::from_field_text(field, text), option))
}

fn regex_query(field: tantivy::schema::Field, pattern: &str) -> Result<SummaryQuery, QueryError> {
    Ok(Box::new(RegexQuery::from_pattern(pattern, field)?))
}

/// Builds [`SummaryQuery`] values from raw patterns.
#[derive(Debug, Clone, Copy)]
pub struct QueryFormulator {
    fields: SummaryFields,
    slop: u32,
    typed_value_boost: f32,
}

impl QueryFormulator {
    pub fn new(slop: u32, typed_value_boost: f64) -> Self {
        Self {
            fields: SummaryFields::new(),
            slop,
            typed_value_boost: typed_value_boost as f32,
        }
    }

    fn text_field(&self, field: Field) -> tantivy::schema::Field {
        match field {
            Field::PropertyValue => self.fields.property_value,
            Field::PropertyType => self.fields.property_type,
            Field::SemanticTag => self.fields.semantic_tag,
        }
    }

    fn keyword_field(&self, field: Field) -> tantivy::schema::Field {
        match field {
            Field::PropertyValue => self.fields.property_value_keyword,
            Field::PropertyType => self.fields.property_type_keyword,
            Field::SemanticTag => self.fields.semantic_tag,
        }
    }

    /// Turn `(field, pattern, kind)` into a query.
    ///
    /// `conserve_order` makes multi-token patterns order-sensitive; property
    /// types use it so that "part of organism" does not match "organism part".
    /// Without it the tokens may also appear in reverse order.
    pub fn formulate(
        &self,
        field: Field,
        pattern: &str,
        kind: QueryKind,
        conserve_order: bool,
    ) -> Result<SummaryQuery, QueryError> {
        let tokens = analysis::tokenize(pattern);
        if tokens.is_empty() {
            return Err(QueryError::NoTerms {
                pattern: pattern.to_string(),
            });
        }

        if field.is_keyword_only() || kind == QueryKind::Exact {
            let keyword_field = self.keyword_field(field);
            let keyword = analysis::keyword(pattern);
            return match kind {
                QueryKind::Exact | QueryKind::Full => Ok(term_query(keyword_field, &keyword, IndexRecordOption::Basic)),
                QueryKind::Prefix => regex_query(keyword_field, &format!("{}.*", regex::escape(&keyword))),
                QueryKind::Suffix => regex_query(keyword_field, &format!(".*{}", regex::escape(&keyword))),
            };
        }

        let text_field = self.text_field(field);
        match (kind, tokens.as_slice()) {
            (QueryKind::Prefix, [single]) => {
                regex_query(self.keyword_field(field), &format!("{}.*", regex::escape(single)))
            }
            (QueryKind::Prefix, _) => {
                let terms = tokens.iter().map(|t| Term::from_field_text(text_field, t)).collect();
                let mut query = PhrasePrefixQuery::new(terms);
                query.set_max_expansions(PREFIX_EXPANSIONS);
                Ok(Box::new(query))
            }
            (QueryKind::Suffix, [single]) => regex_query(text_field, &format!(".*{}", regex::escape(single))),
            (QueryKind::Suffix, _) => regex_query(
                self.keyword_field(field),
                &format!(".*{}", regex::escape(&analysis::keyword(pattern))),
            ),
            (_, [single]) => Ok(term_query(text_field, single, IndexRecordOption::WithFreqs)),
            _ => Ok(self.proximity(text_field, &tokens, conserve_order)),
        }
    }

    fn phrase(&self, terms: Vec<Term>) -> SummaryQuery {
        let mut query = PhraseQuery::new(terms);
        query.set_slop(self.slop);
        Box::new(query)
    }

    /// Tokens within `slop` extra positions of each other, in order or, unless
    /// `conserve_order`, in reverse order.
    fn proximity(&self, field: tantivy::schema::Field, tokens: &[String], conserve_order: bool) -> SummaryQuery {
        let terms: Vec<Term> = tokens.iter().map(|t| Term::from_field_text(field, t)).collect();
        let reversed: Vec<Term> = terms.iter().rev().cloned().collect();
        if conserve_order || reversed == terms {
            return self.phrase(terms);
        }
        Box::new(BooleanQuery::new(vec![
            (Occur::Should, self.phrase(terms)),
            (Occur::Should, self.phrase(reversed)),
        ]))
    }

    /// Combine queries into one boolean query.
    ///
    /// With `all_must` every clause is required; otherwise only the first is
    /// when `first_must` is set and the rest are optional. A single query is
    /// returned unchanged.
    pub fn combined(&self, first_must: bool, all_must: bool, mut queries: Vec<SummaryQuery>) -> SummaryQuery {
        if queries.len() == 1 {
            return queries.remove(0);
        }
        let clauses = queries
            .into_iter()
            .enumerate()
            .map(|(i, query)| {
                let occur = if all_must || (first_must && i == 0) {
                    Occur::Must
                } else {
                    Occur::Should
                };
                (occur, query)
            })
            .collect();
        Box::new(BooleanQuery::new(clauses))
    }

    /// A value query that prefers, but does not require, a matching type.
    ///
    /// The value match carries the heavy boost so a wrong or missing type
    /// still surfaces the summary, ranked below correctly typed ones.
    pub fn typed(&self, type_query: SummaryQuery, value_query: SummaryQuery) -> SummaryQuery {
        let untyped: SummaryQuery = Box::new(BoostQuery::new(value_query.box_clone(), self.typed_value_boost));
        let typed = self.combined(true, false, vec![untyped, type_query]);
        self.combined(true, false, vec![value_query, typed])
    }
}

impl Default for QueryFormulator {
    fn default() -> Self {
        Self::new(1, 20.0)
    }
}
