//! Lint checks over the analysis of all templates.
//!
//! Runs after discovery and only reads the aggregate: expressions that
//! reference undeclared data, parameter declarations that are never used,
//! and include targets that do not exist.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::parser::ast::{Expression, SectionBlock, SectionNode, TemplateNode};

use super::{TemplateAnalysis, TemplatesAnalysis};

/// A lint warning about one template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintWarning {
    pub category: LintCategory,
    /// Relative path of the template the warning belongs to
    pub path: String,
    pub message: String,
}

impl fmt::Display for LintWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.category, self.path, self.message)
    }
}

/// Category of lint warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintCategory {
    Undeclared,
    Unused,
    Include,
}

impl fmt::Display for LintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintCategory::Undeclared => write!(f, "undeclared"),
            LintCategory::Unused => write!(f, "unused"),
            LintCategory::Include => write!(f, "include"),
        }
    }
}

/// Run all lint checks; warnings are grouped by template in analysis order.
pub fn check(analysis: &TemplatesAnalysis, config: &AnalysisConfig) -> Vec<LintWarning> {
    let mut warnings = Vec::new();
    for template in analysis {
        if config.strict {
            check_undeclared(template, config, &mut warnings);
        }
        check_unused(template, &mut warnings);
        check_includes(template, analysis, &mut warnings);
    }
    tracing::debug!("lint produced {} warnings", warnings.len());
    warnings
}

// ── Undeclared data ───────────────────────────────────────────────

struct Scope<'a> {
    known: HashSet<&'a str>,
    aliases: Vec<&'a str>,
}

impl<'a> Scope<'a> {
    fn resolves(&self, name: &str) -> bool {
        if self.known.contains(name) {
            return true;
        }
        // Iteration metadata such as `item_index` or `item_hasNext`
        self.aliases.iter().any(|alias| {
            name == *alias
                || name
                    .strip_prefix(alias)
                    .is_some_and(|rest| rest.starts_with('_'))
        })
    }
}

fn check_undeclared(
    template: &TemplateAnalysis,
    config: &AnalysisConfig,
    warnings: &mut Vec<LintWarning>,
) {
    let mut known: HashSet<&str> = template
        .parameter_declarations()
        .iter()
        .map(|d| d.key.as_str())
        .collect();
    known.extend(config.globals.iter().map(String::as_str));

    let mut scope = Scope {
        known,
        aliases: Vec::new(),
    };
    check_nodes(template, template.nodes(), &mut scope, warnings);
}

fn check_nodes<'a>(
    template: &TemplateAnalysis,
    nodes: &'a [TemplateNode],
    scope: &mut Scope<'a>,
    warnings: &mut Vec<LintWarning>,
) {
    for node in nodes {
        match node {
            TemplateNode::Expression(expr) => check_expression(template, expr, scope, warnings),
            TemplateNode::Section(section) => check_section(template, section, scope, warnings),
            TemplateNode::Text(_) | TemplateNode::ParameterDeclaration(_) => {}
        }
    }
}

fn check_section<'a>(
    template: &TemplateAnalysis,
    section: &'a SectionNode,
    scope: &mut Scope<'a>,
    warnings: &mut Vec<LintWarning>,
) {
    for block in &section.blocks {
        for expr in &block.expressions {
            check_expression(template, expr, scope, warnings);
        }
        // Properties of the `with` object become top-level names
        if section.name == "with" {
            continue;
        }
        check_block(template, block, scope, warnings);
    }
}

fn check_block<'a>(
    template: &TemplateAnalysis,
    block: &'a SectionBlock,
    scope: &mut Scope<'a>,
    warnings: &mut Vec<LintWarning>,
) {
    let depth = scope.aliases.len();
    scope.aliases.extend(block.aliases.iter().map(String::as_str));
    check_nodes(template, &block.nodes, scope, warnings);
    scope.aliases.truncate(depth);
}

fn check_expression(
    template: &TemplateAnalysis,
    expr: &Expression,
    scope: &Scope<'_>,
    warnings: &mut Vec<LintWarning>,
) {
    for e in expr.flatten() {
        if e.is_literal() || e.has_namespace() {
            continue;
        }
        if let Some(name) = e.first_part_name() {
            if !scope.resolves(name) {
                warnings.push(LintWarning {
                    category: LintCategory::Undeclared,
                    path: template.path().to_string(),
                    message: format!(
                        "line {}: '{}' in {{{}}} is not a declared parameter",
                        e.origin.line, name, e.value
                    ),
                });
            }
        }
    }
}

// ── Unused declarations ───────────────────────────────────────────

fn check_unused(template: &TemplateAnalysis, warnings: &mut Vec<LintWarning>) {
    let used: HashSet<&str> = template
        .expressions()
        .iter()
        .filter(|e| !e.has_namespace())
        .filter_map(|e| e.first_part_name())
        .collect();

    for decl in template.parameter_declarations() {
        if decl.origin.is_synthetic() || used.contains(decl.key.as_str()) {
            continue;
        }
        warnings.push(LintWarning {
            category: LintCategory::Unused,
            path: template.path().to_string(),
            message: format!("line {}: parameter '{}' is never used", decl.origin.line, decl.key),
        });
    }
}

// ── Include targets ───────────────────────────────────────────────

fn check_includes(
    template: &TemplateAnalysis,
    analysis: &TemplatesAnalysis,
    warnings: &mut Vec<LintWarning>,
) {
    for node in template.find_nodes(|n| n.is_section("include")) {
        let Some(section) = node.as_section() else {
            continue;
        };
        let line = section.origin.line;
        let target = section
            .main_block()
            .and_then(|b| b.positional_params().next())
            .map(|t| t.trim_matches(|c| c == '"' || c == '\''));

        let Some(target) = target else {
            warnings.push(include_warning(
                template,
                format!("line {}: include without a target", line),
            ));
            continue;
        };

        let (template_part, fragment) = match target.split_once('$') {
            Some((t, f)) => (t, Some(f)),
            None => (target, None),
        };

        let included = if template_part.is_empty() {
            Some(template)
        } else {
            find_target(analysis, template_part)
        };

        match (included, fragment) {
            (None, _) => warnings.push(include_warning(
                template,
                format!("line {}: included template '{}' not found", line, template_part),
            )),
            (Some(included), Some(fragment)) if !included.fragment_ids().contains(fragment) => {
                warnings.push(include_warning(
                    template,
                    format!(
                        "line {}: fragment '{}' not found in {}",
                        line,
                        fragment,
                        included.path()
                    ),
                ))
            }
            _ => {}
        }
    }
}

/// A target names a template by id (`items`) or by path (`items.html`)
fn find_target<'a>(analysis: &'a TemplatesAnalysis, target: &str) -> Option<&'a TemplateAnalysis> {
    analysis
        .find_by_id(target)
        .or_else(|| analysis.find_by_path(target))
}

fn include_warning(template: &TemplateAnalysis, message: String) -> LintWarning {
    LintWarning {
        category: LintCategory::Include,
        path: template.path().to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_sources;
    use crate::template::{Engine, SyntheticParametersHook};

    fn lint(config: &AnalysisConfig, sources: &[(&str, &str)]) -> Vec<LintWarning> {
        let engine = Engine::new().with_hook(SyntheticParametersHook::new(
            config.synthetic_parameters.clone(),
        ));
        let sources = sources
            .iter()
            .map(|(p, s)| (p.to_string(), s.to_string()))
            .collect();
        let analysis = analyze_sources(&engine, config, sources).expect("Should analyze");
        check(&analysis, config)
    }

    fn categories(warnings: &[LintWarning]) -> Vec<LintCategory> {
        warnings.iter().map(|w| w.category).collect()
    }

    #[test]
    fn test_clean_templates() {
        let config = AnalysisConfig::new().with_strict(true);
        let warnings = lint(
            &config,
            &[(
                "items.html",
                "{@java.util.List<org.acme.Item> items}{#for item in items}{item.name}{item_index}{/for}",
            )],
        );
        assert!(warnings.is_empty(), "Unexpected: {:?}", warnings);
    }

    #[test]
    fn test_undeclared_only_when_strict() {
        let source = [("t.html", "{name}")];
        assert!(lint(&AnalysisConfig::new(), &source).is_empty());

        let warnings = lint(&AnalysisConfig::new().with_strict(true), &source);
        assert_eq!(categories(&warnings), vec![LintCategory::Undeclared]);
        assert!(warnings[0].message.contains("'name'"));
    }

    #[test]
    fn test_alias_out_of_scope() {
        let config = AnalysisConfig::new().with_strict(true);
        let warnings = lint(
            &config,
            &[("t.html", "{@java.util.List items}{#for i in items}{i}{/for}{i}")],
        );
        assert_eq!(categories(&warnings), vec![LintCategory::Undeclared]);
        assert!(warnings[0].message.starts_with("line 1:"));
    }

    #[test]
    fn test_let_keys_and_globals_resolve() {
        let config = AnalysisConfig::new().with_strict(true).with_global("today");
        let warnings = lint(
            &config,
            &[("t.html", "{#let total=today.year}{total}{/let}{inject:bean.name}{'lit'}")],
        );
        assert!(warnings.is_empty(), "Unexpected: {:?}", warnings);
    }

    #[test]
    fn test_it_only_inside_each() {
        let config = AnalysisConfig::new().with_strict(true);
        let warnings = lint(
            &config,
            &[("t.html", "{@java.util.List items}{#each items}{it.name}{/each}{it}")],
        );
        assert_eq!(categories(&warnings), vec![LintCategory::Undeclared]);
        assert!(warnings[0].message.contains("'it'"));
    }

    #[test]
    fn test_method_params_checked() {
        let config = AnalysisConfig::new().with_strict(true);
        let warnings = lint(&config, &[("t.html", "{@org.acme.Item item}{item.price(rate)}")]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("'rate'"));
    }

    #[test]
    fn test_unused_declaration() {
        let config = AnalysisConfig::new().with_synthetic_parameter("inject", "org.acme.Beans");
        let warnings = lint(
            &config,
            &[("t.html", "{@org.acme.Item item}\n{@java.lang.String title}\n{title}")],
        );
        assert_eq!(categories(&warnings), vec![LintCategory::Unused]);
        assert_eq!(warnings[0].message, "line 1: parameter 'item' is never used");
    }

    #[test]
    fn test_include_targets() {
        let config = AnalysisConfig::new();
        let warnings = lint(
            &config,
            &[
                ("base.html", "{#fragment header}h{/fragment}"),
                (
                    "page.html",
                    "{#include base /}{#include base.html /}{#include base$header /}{#include base$footer /}{#include missing /}",
                ),
            ],
        );
        assert_eq!(
            warnings.iter().map(|w| w.message.as_str()).collect::<Vec<_>>(),
            vec![
                "line 1: fragment 'footer' not found in base.html",
                "line 1: included template 'missing' not found",
            ]
        );
        assert!(warnings.iter().all(|w| w.path == "page.html"));
    }

    #[test]
    fn test_include_own_fragment() {
        let config = AnalysisConfig::new();
        let warnings = lint(
            &config,
            &[("t.html", "{#fragment row}r{/fragment}{#include $row /}{#include $col /}")],
        );
        assert_eq!(categories(&warnings), vec![LintCategory::Include]);
        assert!(warnings[0].message.contains("'col'"));
    }

    #[test]
    fn test_warning_display() {
        let warning = LintWarning {
            category: LintCategory::Unused,
            path: "a.html".to_string(),
            message: "line 2: parameter 'x' is never used".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "[unused] a.html: line 2: parameter 'x' is never used"
        );
    }
}
