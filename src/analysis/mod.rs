//! Build-time analysis of all templates of an application
//!
//! [`TemplatesAnalysis`] is produced once, after every template was parsed,
//! and is consumed read-only by later steps such as [`lint`] and [`report`].

pub mod discovery;
pub mod lint;
pub mod report;

pub use discovery::{analyze_sources, discover};

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::parser::ast::{Expression, ParameterDeclaration, TemplateNode};
use crate::template::Template;

/// Analysis of every template found by one build
#[derive(Debug, Clone, Default)]
pub struct TemplatesAnalysis {
    analysis: Vec<TemplateAnalysis>,
}

impl TemplatesAnalysis {
    pub fn new(analysis: Vec<TemplateAnalysis>) -> Self {
        Self { analysis }
    }

    /// All analyses in the order they were discovered
    pub fn analysis(&self) -> &[TemplateAnalysis] {
        &self.analysis
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TemplateAnalysis> {
        self.analysis.iter()
    }

    pub fn len(&self) -> usize {
        self.analysis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analysis.is_empty()
    }

    /// Analysis of the template at the given relative path, e.g. `items.html`
    pub fn find_by_path(&self, path: &str) -> Option<&TemplateAnalysis> {
        self.analysis.iter().find(|a| a.path == path)
    }

    /// Analysis of the template with the given user id, e.g. `ItemResource/items`
    pub fn find_by_id(&self, id: &str) -> Option<&TemplateAnalysis> {
        self.analysis.iter().find(|a| a.id.as_deref() == Some(id))
    }

    pub fn find_by_generated_id(&self, generated_id: &str) -> Option<&TemplateAnalysis> {
        self.analysis
            .iter()
            .find(|a| a.generated_id == generated_id)
    }
}

impl<'a> IntoIterator for &'a TemplatesAnalysis {
    type Item = &'a TemplateAnalysis;
    type IntoIter = std::slice::Iter<'a, TemplateAnalysis>;

    fn into_iter(self) -> Self::IntoIter {
        self.analysis.iter()
    }
}

/// Analysis of a single template file.
///
/// Two analyses are equal when their generated ids are equal; the other
/// fields are not compared. Generated ids are unique per engine, so this
/// only distinguishes analyses produced by the same engine.
#[derive(Debug, Clone)]
pub struct TemplateAnalysis {
    id: Option<String>,
    generated_id: String,
    expressions: Vec<Expression>,
    parameter_declarations: Vec<ParameterDeclaration>,
    path: String,
    fragment_ids: BTreeSet<String>,
    template: Arc<Template>,
}

impl TemplateAnalysis {
    /// Snapshot a parsed template; `path` is relative and `/`-separated
    pub fn new(id: Option<String>, template: Template, path: impl Into<String>) -> Self {
        Self {
            id,
            generated_id: template.generated_id().to_string(),
            expressions: template.expressions().to_vec(),
            parameter_declarations: template.parameter_declarations().to_vec(),
            path: path.into(),
            fragment_ids: template.fragment_ids().clone(),
            template: Arc::new(template),
        }
    }

    /// User-defined id, e.g. `ItemResource/items`
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn generated_id(&self) -> &str {
        &self.generated_id
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    /// Declarations in the order the parser produced them
    pub fn parameter_declarations(&self) -> &[ParameterDeclaration] {
        &self.parameter_declarations
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fragment_ids(&self) -> &BTreeSet<String> {
        &self.fragment_ids
    }

    /// Child nodes of the template's root node
    pub fn nodes(&self) -> &[TemplateNode] {
        self.template.nodes()
    }

    /// Nodes at any depth that match the predicate, depth-first
    pub fn find_nodes<P>(&self, predicate: P) -> Vec<&TemplateNode>
    where
        P: Fn(&TemplateNode) -> bool,
    {
        self.template.find_nodes(predicate)
    }

    /// Non-synthetic declarations first, each group ordered by line
    pub fn sorted_parameter_declarations(&self) -> Vec<ParameterDeclaration> {
        sorted_parameter_declarations(&self.parameter_declarations)
    }

    /// Expression with the given generated id
    pub fn find_expression(&self, id: u32) -> Option<&Expression> {
        self.expressions.iter().find(|e| e.generated_id == id)
    }
}

impl PartialEq for TemplateAnalysis {
    fn eq(&self, other: &Self) -> bool {
        self.generated_id == other.generated_id
    }
}

impl Eq for TemplateAnalysis {}

impl Hash for TemplateAnalysis {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.generated_id.hash(state);
    }
}

/// Sort declarations so that non-synthetic ones come first, then by line.
///
/// The sort is stable: declarations on the same line keep their input order.
pub fn sorted_parameter_declarations(
    declarations: &[ParameterDeclaration],
) -> Vec<ParameterDeclaration> {
    let mut sorted = declarations.to_vec();
    sorted.sort_by_key(|d| (d.origin.is_synthetic(), d.origin.line()));
    sorted
}
