//! Qute Analysis - build-time analysis of Qute-style templates
//!
//! This library parses template files, records their expressions and
//! parameter declarations, and publishes the result as one immutable
//! [`TemplatesAnalysis`] for later checks.
//!
//! # Example
//!
//! ```rust
//! use qute_analysis::{analyze_sources, AnalysisConfig, Engine};
//!
//! let config = AnalysisConfig::default();
//! let sources = vec![(
//!     "items.html".to_string(),
//!     "{@org.acme.Item item}{item.name}".to_string(),
//! )];
//! let analysis = analyze_sources(&Engine::new(), &config, sources).unwrap();
//!
//! let items = analysis.find_by_id("items").unwrap();
//! assert_eq!(items.expressions()[0].value, "item.name");
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod parser;
pub mod template;

pub use analysis::lint::{LintCategory, LintWarning};
pub use analysis::{
    analyze_sources, discover, sorted_parameter_declarations, TemplateAnalysis,
    TemplatesAnalysis,
};
pub use config::{AnalysisConfig, ConfigError, SyntheticParameter};
pub use error::ParseError;
pub use parser::ast::{Expression, Origin, ParameterDeclaration, TemplateNode};
pub use template::{Engine, ParserHelper, ParserHook, SyntheticParametersHook, Template};

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Parse errors of one template file
#[derive(Debug, Clone)]
pub struct TemplateErrors {
    /// Relative path of the template
    pub path: String,
    /// Template source, kept for rendering diagnostics
    pub source: String,
    pub errors: Vec<ParseError>,
}

impl TemplateErrors {
    /// Render every error with source context
    pub fn format(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.format(&self.source, &self.path))
            .collect()
    }
}

/// Errors that can occur while analyzing a template directory
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// One or more templates failed to parse
    #[error("parse errors: {}", format_parse_errors(.0))]
    Parse(Vec<TemplateErrors>),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk template directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

fn format_parse_errors(failures: &[TemplateErrors]) -> String {
    failures
        .iter()
        .flat_map(|f| f.errors.iter().map(move |e| format!("{}: {}", f.path, e)))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load the configuration file, or the defaults when no file is given
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, AnalysisError> {
    match path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            Ok(AnalysisConfig::from_file(path)?)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

/// Discover and analyze all templates under `config.root`.
///
/// Synthetic parameters from the configuration are declared in every
/// template.
pub fn analyze(config: &AnalysisConfig) -> Result<TemplatesAnalysis, AnalysisError> {
    let engine = Engine::new().with_hook(SyntheticParametersHook::new(
        config.synthetic_parameters.clone(),
    ));
    discover(&engine, config)
}

/// Analyze, then run lint checks on the result
pub fn analyze_with_lint(
    config: &AnalysisConfig,
) -> Result<(TemplatesAnalysis, Vec<LintWarning>), AnalysisError> {
    let templates = analyze(config)?;
    let warnings = analysis::lint::check(&templates, config);
    Ok((templates, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message_names_path() {
        let config = AnalysisConfig::default();
        let sources = vec![("broken.html".to_string(), "{#if a}".to_string())];
        let err = analyze_sources(&Engine::new(), &config, sources).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("parse errors: broken.html: "), "{}", message);
    }

    #[test]
    fn test_load_config() {
        assert_eq!(load_config(None).expect("Should load"), AnalysisConfig::default());

        let dir = tempfile::TempDir::new().expect("Should create temp dir");
        let path = dir.path().join("qute.toml");
        std::fs::write(&path, "strict = true\nglobals = [\"today\"]\n").expect("Should write");
        let config = load_config(Some(&path)).expect("Should load");
        assert!(config.strict);
        assert_eq!(config.globals, vec!["today".to_string()]);

        let missing = load_config(Some(&dir.path().join("missing.toml")));
        assert!(matches!(missing, Err(AnalysisError::Config(ConfigError::IoError(_)))));

        std::fs::write(&path, "strict = 'yes'").expect("Should write");
        assert!(matches!(
            load_config(Some(&path)),
            Err(AnalysisError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_template_errors_format() {
        let failure = TemplateErrors {
            path: "a.html".to_string(),
            source: "{#if a}".to_string(),
            errors: vec![ParseError::Syntax {
                span: 0..7,
                message: "unterminated section: missing end tag".to_string(),
                expected: Vec::new(),
            }],
        };
        let rendered = failure.format();
        assert!(rendered.contains("a.html"));
        assert!(rendered.contains("unterminated section"));
    }
}
