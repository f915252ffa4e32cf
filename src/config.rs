//! Parser configuration

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{QueryError, QueryResult};

/// File looked up in the working directory by [`ParserOptions::discover`].
pub const LOCAL_CONFIG_FILE: &str = "mongoqs.toml";

/// Options controlling how query parameters are compiled
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Query parameter holding the populate value
    pub populate_key: String,

    /// Relation names that may never be populated
    pub blacklist: Vec<String>,

    /// Maximum relation chain length per expression
    pub max_depth: Option<usize>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            populate_key: "populate".to_string(),
            blacklist: Vec::new(),
            max_depth: None,
        }
    }
}

impl ParserOptions {
    /// Create a new options builder
    pub fn builder() -> ParserOptionsBuilder {
        ParserOptionsBuilder::default()
    }

    /// Load options from a TOML file
    pub fn load(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let options = toml::from_str(&content)
            .map_err(|e| QueryError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded parser options from {}", path.display());
        Ok(options)
    }

    /// Load `mongoqs.toml` from the working directory, then the user config
    /// directory, falling back to defaults.
    pub fn discover() -> QueryResult<Self> {
        match Self::candidate_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("mongoqs").join("config.toml"));
        }
        paths
    }

    pub fn is_blacklisted(&self, relation: &str) -> bool {
        self.blacklist.iter().any(|b| b == relation)
    }
}

/// Builder for ParserOptions
#[derive(Debug, Default)]
pub struct ParserOptionsBuilder {
    options: ParserOptions,
}

impl ParserOptionsBuilder {
    /// Set the populate parameter name
    pub fn populate_key(mut self, key: impl Into<String>) -> Self {
        self.options.populate_key = key.into();
        self
    }

    /// Forbid populating a relation
    pub fn blacklist(mut self, relation: impl Into<String>) -> Self {
        self.options.blacklist.push(relation.into());
        self
    }

    /// Limit relation chain length
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = Some(depth);
        self
    }

    /// Build the options
    pub fn build(self) -> ParserOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder() {
        let options = ParserOptions::builder()
            .populate_key("expand")
            .blacklist("password")
            .max_depth(2)
            .build();
        assert_eq!(options.populate_key, "expand");
        assert!(options.is_blacklisted("password"));
        assert!(!options.is_blacklisted("name"));
        assert_eq!(options.max_depth, Some(2));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "blacklist = [\"secrets\"]").unwrap();

        let options = ParserOptions::load(file.path()).unwrap();
        assert_eq!(options.populate_key, "populate");
        assert_eq!(options.blacklist, vec!["secrets".to_string()]);
        assert_eq!(options.max_depth, None);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_depth = \"deep\"").unwrap();

        assert!(matches!(
            ParserOptions::load(file.path()),
            Err(QueryError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ParserOptions::load(dir.path().join("nope.toml")),
            Err(QueryError::Io(_))
        ));
    }
}
