//! Read-only annotation stores the engine builds its index from.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::DatasourceError;
use crate::model::Annotation;

/// A named, read-only source of annotations.
pub trait AnnotationStore: Send + Sync {
    /// Datasource name used to select this store.
    fn name(&self) -> &str;

    /// Every annotation the store holds, with full provenance.
    fn annotations(&self) -> Result<Vec<Annotation>, DatasourceError>;
}

/// Annotations held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    name: String,
    annotations: Vec<Annotation>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>, annotations: Vec<Annotation>) -> Self {
        Self {
            name: name.into(),
            annotations,
        }
    }
}

impl AnnotationStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn annotations(&self) -> Result<Vec<Annotation>, DatasourceError> {
        Ok(self.annotations.clone())
    }
}

/// A JSON array of annotations on disk, read on every load.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    name: String,
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Name the store after the file stem.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "corpus".to_string());
        Self { name, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnnotationStore for JsonFileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn annotations(&self) -> Result<Vec<Annotation>, DatasourceError> {
        let display = self.path.display().to_string();
        let text = std::fs::read_to_string(&self.path).map_err(|source| DatasourceError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| DatasourceError::Parse {
            path: display,
            message: e.to_string(),
        })
    }
}

/// Pick the single store called `name`.
pub fn resolve<'a>(
    stores: &'a [Arc<dyn AnnotationStore>],
    name: &str,
) -> Result<&'a Arc<dyn AnnotationStore>, DatasourceError> {
    let mut matching = stores.iter().filter(|s| s.name() == name);
    match (matching.next(), matching.count()) {
        (None, _) => Err(DatasourceError::NotFound {
            name: name.to_string(),
        }),
        (Some(store), 0) => Ok(store),
        (Some(_), others) => Err(DatasourceError::Ambiguous {
            name: name.to_string(),
            count: others + 1,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores(names: &[&str]) -> Vec<Arc<dyn AnnotationStore>> {
        names
            .iter()
            .map(|n| Arc::new(InMemoryStore::new(*n, Vec::new())) as Arc<dyn AnnotationStore>)
            .collect()
    }

    #[test]
    fn resolve_by_name() {
        let all = stores(&["gwas", "atlas"]);
        assert_eq!(resolve(&all, "atlas").unwrap().name(), "atlas");
    }

    #[test]
    fn missing_name_is_not_found() {
        let all = stores(&["gwas"]);
        assert!(matches!(
            resolve(&all, "cttv"),
            Err(DatasourceError::NotFound { name }) if name == "cttv"
        ));
    }

    #[test]
    fn duplicate_name_is_ambiguous() {
        let all = stores(&["gwas", "gwas", "atlas"]);
        assert!(matches!(
            resolve(&all, "gwas"),
            Err(DatasourceError::Ambiguous { count: 2, .. })
        ));
    }

    #[test]
    fn json_store_reports_parse_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::from_path(&path);
        assert_eq!(store.name(), "broken");
        assert!(matches!(store.annotations(), Err(DatasourceError::Parse { .. })));

        let missing = JsonFileStore::new("x", dir.path().join("missing.json"));
        assert!(matches!(missing.annotations(), Err(DatasourceError::Read { .. })));
    }

    #[test]
    fn json_store_reads_annotations() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("corpus.json");
        std::fs::write(
            &path,
            r#"[{
                "uri": "urn:a1",
                "property": {"type": "organism", "value": "homo sapiens"},
                "semantic_tags": ["http://purl.obolibrary.org/obo/NCBITaxon_9606"],
                "provenance": {
                    "source": {"uri": "http://www.ebi.ac.uk/gxa", "name": "atlas", "kind": "database"},
                    "evidence": "MANUAL_CURATED",
                    "generated": "2016-03-01T12:00:00Z",
                    "generator": "curator"
                }
            }]"#,
        )
        .unwrap();
        let annotations = JsonFileStore::from_path(&path).annotations().unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].property.type_name(), Some("organism"));
        assert!(!annotations[0].is_superseded());
    }
}
