//! Line-oriented lexical resources: unit dictionary, qualifier dictionary, stop words.
//!
//! Dictionaries are loaded once at startup into an immutable [`Dictionaries`]
//! value that is handed to the engine. The bundled defaults are compiled into
//! the binary via `include_str!`; configured paths override them.

use std::collections::HashSet;
use std::path::Path;

use crate::config::DictionaryConfig;
use crate::error::DictionaryError;

const UNITS_TSV: &str = include_str!("../data/units.tsv");
const QUALIFIERS_TSV: &str = include_str!("../data/qualifiers.tsv");
const STOP_WORDS_TXT: &str = include_str!("../data/stop_words.txt");

/// A flat list of lowercased dictionary entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    entries: Vec<String>,
}

impl Dictionary {
    /// Parse a dictionary resource.
    ///
    /// Blank lines and `#` comments are skipped. Tab-separated lines must carry
    /// at least three fields; the first field is the entry. Lines without tabs
    /// are taken whole.
    pub fn parse(kind: &str, text: &str) -> Self {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let entry = if line.contains('\t') {
                let fields: Vec<&str> = line.split('\t').collect();
                if fields.len() < 3 {
                    tracing::warn!(
                        dictionary = kind,
                        line = lineno + 1,
                        "skipping dictionary line with fewer than three fields"
                    );
                    continue;
                }
                fields[0]
            } else {
                line
            };
            let entry = entry.trim().to_lowercase();
            if !entry.is_empty() && seen.insert(entry.clone()) {
                entries.push(entry);
            }
        }
        Self { entries }
    }

    /// Load from a file path.
    pub fn load(kind: &'static str, path: &Path) -> Result<Self, DictionaryError> {
        let text = std::fs::read_to_string(path).map_err(|source| DictionaryError::Read {
            kind,
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(kind, &text))
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let entries = entries
            .into_iter()
            .map(|e| e.into().trim().to_lowercase())
            .filter(|e| !e.is_empty() && seen.insert(e.clone()))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, word: &str) -> bool {
        self.entries.iter().any(|e| e == word)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All lexical resources the search pipeline needs.
#[derive(Debug, Clone)]
pub struct Dictionaries {
    pub units: Dictionary,
    pub qualifiers: Dictionary,
    pub stop_words: HashSet<String>,
}

impl Dictionaries {
    /// The resources compiled into the crate.
    pub fn bundled() -> Self {
        Self {
            units: Dictionary::parse("units", UNITS_TSV),
            qualifiers: Dictionary::parse("qualifiers", QUALIFIERS_TSV),
            stop_words: Dictionary::parse("stop words", STOP_WORDS_TXT)
                .entries
                .into_iter()
                .collect(),
        }
    }

    /// Load the configured resources, falling back to bundled ones per entry.
    pub fn from_config(config: &DictionaryConfig) -> Result<Self, DictionaryError> {
        let mut dictionaries = Self::bundled();
        if let Some(path) = &config.units {
            dictionaries.units = Dictionary::load("units", path)?;
        }
        if let Some(path) = &config.qualifiers {
            dictionaries.qualifiers = Dictionary::load("qualifiers", path)?;
        }
        if let Some(path) = &config.stop_words {
            dictionaries.stop_words = Dictionary::load("stop words", path)?
                .entries
                .into_iter()
                .collect();
        }
        tracing::debug!(
            units = dictionaries.units.len(),
            qualifiers = dictionaries.qualifiers.len(),
            stop_words = dictionaries.stop_words.len(),
            "dictionaries loaded"
        );
        Ok(dictionaries)
    }
}

impl Default for Dictionaries {
    fn default() -> Self {
        Self::bundled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_takes_first_field_of_wide_lines() {
        let dict = Dictionary::parse(
            "units",
            "# header\nMilligram\tUO_1\tunit\n\nshort\tline\nmolar\tUO_2\tunit\textra\n",
        );
        assert_eq!(dict.entries(), &["milligram".to_string(), "molar".to_string()]);
    }

    #[test]
    fn parse_accepts_plain_lines_and_dedups() {
        let dict = Dictionary::parse("stop words", "the\nThe\nof\r\n");
        assert_eq!(dict.len(), 2);
        assert!(dict.contains("of"));
    }

    #[test]
    fn bundled_resources_are_populated() {
        let dicts = Dictionaries::bundled();
        assert!(dicts.units.contains("milligram per kilogram"));
        assert!(dicts.qualifiers.contains("left"));
        assert!(dicts.stop_words.contains("the"));
        assert!(!dicts.stop_words.contains("and"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Dictionary::load("units", Path::new("/nonexistent/units.tsv")).unwrap_err();
        assert!(matches!(err, DictionaryError::Read { kind: "units", .. }));
    }

    #[test]
    fn configured_path_overrides_bundled() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("quals.txt");
        std::fs::write(&path, "frontal\n").unwrap();
        let config = DictionaryConfig {
            qualifiers: Some(path),
            ..Default::default()
        };
        let dicts = Dictionaries::from_config(&config).unwrap();
        assert_eq!(dicts.qualifiers.entries(), &["frontal".to_string()]);
        assert!(dicts.units.contains("molar"));
    }
}
