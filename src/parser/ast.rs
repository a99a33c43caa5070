//! Node and expression types for parsed templates

use serde::Serialize;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Where a node, expression or declaration comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Origin {
    /// 1-based line number; 0 for synthetic origins
    pub line: usize,
    /// 1-based column of the first character
    pub column: usize,
    /// Added by a parser hook rather than written in the template
    pub synthetic: bool,
}

impl Origin {
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            synthetic: false,
        }
    }

    /// Origin of a declaration that has no source location
    pub fn synthetic() -> Self {
        Self {
            line: 0,
            column: 0,
            synthetic: true,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

/// Literal value of an expression like `'foo'`, `10` or `true`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(n) => write!(f, "{}", n),
            Literal::Str(s) => write!(f, "'{}'", s),
        }
    }
}

/// One segment of a dotted expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub name: String,
    /// Parameters of a virtual method call, `None` for a plain property
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<Expression>>,
}

/// A value expression such as `item.name`, `inject:foo.bar(1)` or `'text'`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    /// Numeric id assigned by the engine that parsed the template
    pub generated_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<Literal>,
    /// Source text as written, without surrounding whitespace
    pub value: String,
    pub origin: Origin,
}

impl Expression {
    pub fn is_literal(&self) -> bool {
        self.literal.is_some()
    }

    pub fn has_namespace(&self) -> bool {
        self.namespace.is_some()
    }

    /// Name of the first part, i.e. the data the expression is resolved against
    pub fn first_part_name(&self) -> Option<&str> {
        self.parts.first().map(|p| p.name.as_str())
    }

    /// This expression followed by the parameters of its virtual methods, depth first
    pub fn flatten(&self) -> Vec<&Expression> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into<'a>(&'a self, out: &mut Vec<&'a Expression>) {
        out.push(self);
        for part in &self.parts {
            for param in part.params.iter().flatten() {
                param.collect_into(out);
            }
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Parameter declaration `{@org.acme.Item item}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDeclaration {
    /// Type info, e.g. `org.acme.Item` or `java.util.List<org.acme.Item>`
    pub type_info: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Expression>,
    pub origin: Origin,
}

impl ParameterDeclaration {
    pub fn origin(&self) -> &Origin {
        &self.origin
    }
}

impl std::fmt::Display for ParameterDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{@{} {}", self.type_info, self.key)?;
        if let Some(default) = &self.default_value {
            write!(f, "={}", default)?;
        }
        write!(f, "}}")
    }
}

/// Node of a parsed template
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Literal text
    Text(TextNode),
    /// Output expression `{foo.bar}`
    Expression(Expression),
    /// Section `{#if}...{/if}` or `{#include foo /}`
    Section(SectionNode),
    /// Parameter declaration `{@Type key}`
    ParameterDeclaration(ParameterDeclaration),
}

impl TemplateNode {
    pub fn origin(&self) -> &Origin {
        match self {
            TemplateNode::Text(t) => &t.origin,
            TemplateNode::Expression(e) => &e.origin,
            TemplateNode::Section(s) => &s.origin,
            TemplateNode::ParameterDeclaration(d) => &d.origin,
        }
    }

    pub fn as_section(&self) -> Option<&SectionNode> {
        match self {
            TemplateNode::Section(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_section(&self, name: &str) -> bool {
        self.as_section().is_some_and(|s| s.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub value: String,
    pub origin: Origin,
}

/// A section with its blocks; the first block carries the section's own parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SectionNode {
    pub name: String,
    pub blocks: Vec<SectionBlock>,
    pub origin: Origin,
}

impl SectionNode {
    /// The main block, i.e. the one opened by the start tag
    pub fn main_block(&self) -> Option<&SectionBlock> {
        self.blocks.first()
    }
}

/// A block of a section, e.g. the `{#else}` part of an `{#if}`
#[derive(Debug, Clone, PartialEq)]
pub struct SectionBlock {
    /// Section name for the main block, the block label otherwise
    pub label: String,
    /// Parameters as written, split on whitespace
    pub params: Vec<String>,
    /// Expressions found in the parameters
    pub expressions: Vec<Expression>,
    /// Names this block makes available to its children (`for` alias, `let` keys)
    pub aliases: Vec<String>,
    pub nodes: Vec<TemplateNode>,
    pub origin: Origin,
}

impl SectionBlock {
    /// Positional parameters, i.e. those that are not `key=value` pairs
    pub fn positional_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| split_key_value(p).is_none())
            .map(|p| p.as_str())
    }
}

/// Split `key=value`, ignoring `==` and `=` inside quotes or brackets
pub(crate) fn split_key_value(param: &str) -> Option<(&str, &str)> {
    let idx = param.find('=')?;
    let key = &param[..idx];
    if key.is_empty()
        || param[idx + 1..].starts_with('=')
        || !key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '?')
    {
        return None;
    }
    Some((key.trim_end_matches('?'), &param[idx + 1..]))
}
