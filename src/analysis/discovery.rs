//! Template discovery: find template files under a root and analyze them

use std::path::Path;

use walkdir::WalkDir;

use crate::config::AnalysisConfig;
use crate::template::Engine;
use crate::{AnalysisError, TemplateErrors};

use super::{TemplateAnalysis, TemplatesAnalysis};

/// Walk `config.root` and analyze every template found.
///
/// Files are visited in order of their relative path so that generated ids
/// and the order of the result do not depend on the file system.
pub fn discover(engine: &Engine, config: &AnalysisConfig) -> Result<TemplatesAnalysis, AnalysisError> {
    let sources = read_sources(&config.root, config)?;
    tracing::info!(
        "found {} templates in {}",
        sources.len(),
        config.root.display()
    );
    analyze_sources(engine, config, sources)
}

/// Analyze in-memory templates given as `(relative path, source)` pairs.
///
/// The result keeps the input order. Parse errors of all templates are
/// collected before failing.
pub fn analyze_sources(
    engine: &Engine,
    config: &AnalysisConfig,
    sources: Vec<(String, String)>,
) -> Result<TemplatesAnalysis, AnalysisError> {
    let mut analysis = Vec::with_capacity(sources.len());
    let mut failures = Vec::new();

    for (path, source) in sources {
        let id = config.strip_suffix(&path).map(str::to_string);
        match engine.parse_with_id(&source, id.as_deref()) {
            Ok(template) => {
                tracing::debug!(
                    "analyzed {} as {} ({} expressions, {} declarations)",
                    path,
                    template.generated_id(),
                    template.expressions().len(),
                    template.parameter_declarations().len()
                );
                analysis.push(TemplateAnalysis::new(id, template, path));
            }
            Err(errors) => {
                tracing::debug!("{} failed to parse with {} errors", path, errors.len());
                failures.push(TemplateErrors {
                    path,
                    source,
                    errors,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(TemplatesAnalysis::new(analysis))
    } else {
        Err(AnalysisError::Parse(failures))
    }
}

/// Read all matching files, sorted by their `/`-separated relative path
fn read_sources(root: &Path, config: &AnalysisConfig) -> Result<Vec<(String, String)>, AnalysisError> {
    let mut sources = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if config.strip_suffix(&relative).is_none() {
            tracing::trace!("skipping {}", relative);
            continue;
        }

        let source = std::fs::read_to_string(entry.path()).map_err(|source| AnalysisError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        sources.push((relative, source));
    }

    sources.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(sources)
}
