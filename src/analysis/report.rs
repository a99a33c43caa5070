//! Human and machine readable summaries of an analysis

use std::fmt::Write as _;

use serde::Serialize;

use super::{TemplateAnalysis, TemplatesAnalysis};
use crate::parser::ast::ParameterDeclaration;

/// Summary of one template, as printed by the CLI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub generated_id: String,
    /// Declarations in sorted order, rendered as `{@Type key}`
    pub parameter_declarations: Vec<DeclarationSummary>,
    pub expressions: usize,
    pub fragments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclarationSummary {
    pub key: String,
    #[serde(rename = "type")]
    pub type_info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub line: usize,
    pub synthetic: bool,
}

impl From<&ParameterDeclaration> for DeclarationSummary {
    fn from(decl: &ParameterDeclaration) -> Self {
        Self {
            key: decl.key.clone(),
            type_info: decl.type_info.clone(),
            default_value: decl.default_value.as_ref().map(|e| e.value.clone()),
            line: decl.origin.line,
            synthetic: decl.origin.is_synthetic(),
        }
    }
}

impl From<&TemplateAnalysis> for TemplateSummary {
    fn from(analysis: &TemplateAnalysis) -> Self {
        Self {
            path: analysis.path().to_string(),
            id: analysis.id().map(str::to_string),
            generated_id: analysis.generated_id().to_string(),
            parameter_declarations: analysis
                .sorted_parameter_declarations()
                .iter()
                .map(DeclarationSummary::from)
                .collect(),
            expressions: analysis.expressions().len(),
            fragments: analysis.fragment_ids().iter().cloned().collect(),
        }
    }
}

pub fn summarize(analysis: &TemplatesAnalysis) -> Vec<TemplateSummary> {
    analysis.iter().map(TemplateSummary::from).collect()
}

/// Plain text report, one block per template
pub fn to_text(analysis: &TemplatesAnalysis) -> String {
    let mut out = String::new();
    for summary in summarize(analysis) {
        let _ = write!(out, "{} [{}]", summary.path, summary.generated_id);
        if let Some(id) = &summary.id {
            let _ = write!(out, " id={}", id);
        }
        out.push('\n');

        for decl in &summary.parameter_declarations {
            let _ = write!(out, "  {{@{} {}", decl.type_info, decl.key);
            if let Some(default) = &decl.default_value {
                let _ = write!(out, "={}", default);
            }
            out.push('}');
            if decl.synthetic {
                out.push_str(" (synthetic)");
            } else {
                let _ = write!(out, " line {}", decl.line);
            }
            out.push('\n');
        }

        let _ = writeln!(out, "  expressions: {}", summary.expressions);
        if !summary.fragments.is_empty() {
            let _ = writeln!(out, "  fragments: {}", summary.fragments.join(", "));
        }
    }
    out
}

/// JSON report: an array of template summaries
pub fn to_json(analysis: &TemplatesAnalysis) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&summarize(analysis))
}
