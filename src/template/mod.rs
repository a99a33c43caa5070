//! Parsed templates and the engine that produces them
//!
//! # Example
//!
//! ```rust
//! use qute_analysis::Engine;
//!
//! let engine = Engine::new();
//! let template = engine.parse("{@org.acme.Item item}Hello {item.name}!").unwrap();
//! assert_eq!(template.expressions().len(), 1);
//! assert_eq!(template.parameter_declarations()[0].key, "item");
//! ```

mod engine;

pub use engine::{Engine, ParserHelper, ParserHook, SyntheticParametersHook};
pub(crate) use engine::IdGenerator;

use std::collections::BTreeSet;

use crate::parser::ast::{Expression, ParameterDeclaration, TemplateNode};

/// A parsed template
#[derive(Debug, Clone)]
pub struct Template {
    generated_id: String,
    id: Option<String>,
    nodes: Vec<TemplateNode>,
    expressions: Vec<Expression>,
    parameter_declarations: Vec<ParameterDeclaration>,
    fragment_ids: BTreeSet<String>,
}

impl Template {
    /// Id generated by the engine; unique among templates parsed by one engine
    pub fn generated_id(&self) -> &str {
        &self.generated_id
    }

    /// Id given when parsing, e.g. `ItemResource/items`
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Child nodes of the root node
    pub fn nodes(&self) -> &[TemplateNode] {
        &self.nodes
    }

    /// All nodes at any depth matching the predicate, in depth-first pre-order
    pub fn find_nodes<P>(&self, predicate: P) -> Vec<&TemplateNode>
    where
        P: Fn(&TemplateNode) -> bool,
    {
        let mut found = Vec::new();
        collect_nodes(&self.nodes, &predicate, &mut found);
        found
    }

    /// Expressions in source order; method parameters follow their expression
    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    /// Synthetic declarations first, then the declarations written in the template
    pub fn parameter_declarations(&self) -> &[ParameterDeclaration] {
        &self.parameter_declarations
    }

    pub fn fragment_ids(&self) -> &BTreeSet<String> {
        &self.fragment_ids
    }
}

fn collect_nodes<'a, P>(nodes: &'a [TemplateNode], predicate: &P, found: &mut Vec<&'a TemplateNode>)
where
    P: Fn(&TemplateNode) -> bool,
{
    for node in nodes {
        if predicate(node) {
            found.push(node);
        }
        if let TemplateNode::Section(section) = node {
            for block in &section.blocks {
                collect_nodes(&block.nodes, predicate, found);
            }
        }
    }
}
