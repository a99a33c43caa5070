//! Analysis configuration loaded from TOML
//!
//! ```toml
//! root = "src/main/resources/templates"
//! suffixes = ["html", "txt"]
//! strict = true
//! globals = ["config"]
//!
//! [[synthetic_parameters]]
//! key = "inject"
//! type = "org.acme.Beans"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading or parsing configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// A parameter declared in every template by a parser hook
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyntheticParameter {
    pub key: String,
    #[serde(rename = "type")]
    pub type_info: String,
}

/// Configuration options for template discovery and lint checks
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Directory searched for templates
    pub root: PathBuf,

    /// File suffixes of templates, without the leading dot
    pub suffixes: Vec<String>,

    /// Report expressions that do not resolve to a declared parameter
    pub strict: bool,

    /// Names always available to expressions, e.g. global variables
    pub globals: Vec<String>,

    /// Parameters added to every template as synthetic declarations
    pub synthetic_parameters: Vec<SyntheticParameter>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("templates"),
            suffixes: ["html", "txt", "json", "xml", "yaml", "yml"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            strict: false,
            globals: Vec::new(),
            synthetic_parameters: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string; missing keys keep their defaults
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Set the template root directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Replace the template suffixes
    pub fn with_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable strict expression checks
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Add a global name
    pub fn with_global(mut self, name: impl Into<String>) -> Self {
        self.globals.push(name.into());
        self
    }

    /// Add a synthetic parameter declared in every template
    pub fn with_synthetic_parameter(
        mut self,
        key: impl Into<String>,
        type_info: impl Into<String>,
    ) -> Self {
        self.synthetic_parameters.push(SyntheticParameter {
            key: key.into(),
            type_info: type_info.into(),
        });
        self
    }

    /// Template id of a relative path, or `None` if no suffix matches.
    ///
    /// The longest matching suffix wins, so `qute.html` beats `html`.
    pub fn strip_suffix<'p>(&self, path: &'p str) -> Option<&'p str> {
        self.suffixes
            .iter()
            .filter_map(|suffix| {
                path.strip_suffix(suffix.as_str())
                    .and_then(|rest| rest.strip_suffix('.'))
                    .filter(|rest| !rest.is_empty() && !rest.ends_with('/'))
                    .map(|rest| (suffix.len(), rest))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, rest)| rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.root, PathBuf::from("templates"));
        assert!(config.suffixes.contains(&"html".to_string()));
        assert!(!config.strict);
        assert!(config.synthetic_parameters.is_empty());
    }

    #[test]
    fn test_builder_pattern() {
        let config = AnalysisConfig::new()
            .with_root("src/templates")
            .with_suffixes(["qute.html"])
            .with_strict(true)
            .with_global("today");

        assert_eq!(config.root, PathBuf::from("src/templates"));
        assert_eq!(config.suffixes, vec!["qute.html".to_string()]);
        assert!(config.strict);
        assert_eq!(config.globals, vec!["today".to_string()]);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
root = "resources/templates"
strict = true
globals = ["config"]

[[synthetic_parameters]]
key = "inject"
type = "org.acme.Beans"
"#;
        let config = AnalysisConfig::from_str(toml_str).expect("Should parse");
        assert_eq!(config.root, PathBuf::from("resources/templates"));
        assert!(config.strict);
        // Missing keys keep their defaults
        assert!(config.suffixes.contains(&"txt".to_string()));
        assert_eq!(
            config.synthetic_parameters,
            vec![SyntheticParameter {
                key: "inject".to_string(),
                type_info: "org.acme.Beans".to_string(),
            }]
        );
    }

    #[test]
    fn test_unknown_key_error() {
        assert!(AnalysisConfig::from_str("colour = 1").is_err());
    }

    #[test]
    fn test_invalid_toml_error() {
        let invalid = "this is not valid toml {{{{";
        assert!(AnalysisConfig::from_str(invalid).is_err());
    }

    #[test]
    fn test_strip_suffix() {
        let config = AnalysisConfig::new().with_suffixes(["html", "qute.html", "txt"]);
        assert_eq!(config.strip_suffix("hello.html"), Some("hello"));
        assert_eq!(config.strip_suffix("page.qute.html"), Some("page"));
        assert_eq!(
            config.strip_suffix("ItemResource/items.txt"),
            Some("ItemResource/items")
        );
        assert_eq!(config.strip_suffix("notes.md"), None);
        assert_eq!(config.strip_suffix(".html"), None);
        assert_eq!(config.strip_suffix("xhtml"), None);
    }
}
