//! Source catalog: the databases a search may select from.
//!
//! A catalog is a JSON array of `{id, name, url, description}` records. A
//! built-in catalog ships with the binary; a file named in the config
//! replaces it.

use std::collections::HashSet;
use std::path::Path;

use medsearch_engine::SourceDescriptor;

use crate::error::{MedSearchError, Result};

const BUILTIN_CATALOG: &str = include_str!("sources.json");

/// An ordered, id-unique list of sources.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    sources: Vec<SourceDescriptor>,
}

impl Catalog {
    /// The catalog bundled with the application.
    ///
    /// # Errors
    ///
    /// Returns [`MedSearchError::Catalog`] if the bundled file is malformed.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse a catalog from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`MedSearchError::Catalog`] for invalid JSON, blank ids or
    /// urls, and duplicate ids.
    pub fn from_json(json: &str) -> Result<Self> {
        let sources: Vec<SourceDescriptor> = serde_json::from_str(json)
            .map_err(|e| MedSearchError::Catalog(format!("invalid catalog: {e}")))?;
        let mut seen = HashSet::new();
        for source in &sources {
            if source.id.trim().is_empty() || source.base_url.trim().is_empty() {
                return Err(MedSearchError::Catalog(format!(
                    "source {:?} needs an id and a url",
                    source.name
                )));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(MedSearchError::Catalog(format!(
                    "duplicate source id {}",
                    source.id
                )));
            }
        }
        Ok(Self { sources })
    }

    /// Read a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Use `path` when given, otherwise the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen catalog cannot be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    /// All sources in catalog order.
    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Look up one source.
    pub fn get(&self, id: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Resolve `ids` in the order given. Repeated ids are kept once.
    ///
    /// # Errors
    ///
    /// Returns [`MedSearchError::Catalog`] naming every unknown id.
    pub fn select<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<SourceDescriptor>> {
        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(ids.len());
        let mut unknown = Vec::new();
        for id in ids {
            let id = id.as_ref().trim();
            if id.is_empty() || !seen.insert(id.to_owned()) {
                continue;
            }
            match self.get(id) {
                Some(source) => selected.push(source.clone()),
                None => unknown.push(id.to_owned()),
            }
        }
        if !unknown.is_empty() {
            return Err(MedSearchError::Catalog(format!(
                "unknown sources: {}",
                unknown.join(", ")
            )));
        }
        Ok(selected)
    }
}
