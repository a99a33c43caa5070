//! Turns the raw node tree into template nodes
//!
//! Assigns expression ids, computes line numbers and collects the
//! expressions, parameter declarations and fragment ids of a template.

use std::collections::BTreeSet;

use crate::error::ParseError;
use crate::parser::ast::{
    split_key_value, Expression, Origin, ParameterDeclaration, Part, SectionBlock, SectionNode,
    Span, TemplateNode, TextNode,
};
use crate::parser::expression::{self, RawExpr};
use crate::parser::grammar::{RawBlock, RawNode, RawSection};
use crate::template::IdGenerator;

/// Operators and keywords of `{#if}` conditions; everything else is an operand
const CONDITION_OPERATORS: &[&str] = &[
    "!", "&&", "||", "and", "or", "==", "!=", "eq", "ne", "is", ">", ">=", "<", "<=", "gt", "ge",
    "lt", "le",
];

/// Everything collected while building one template
#[derive(Debug)]
pub(crate) struct BuiltTemplate {
    pub nodes: Vec<TemplateNode>,
    pub expressions: Vec<Expression>,
    pub parameter_declarations: Vec<ParameterDeclaration>,
    pub fragment_ids: BTreeSet<String>,
}

pub(crate) struct TemplateBuilder<'a> {
    line_starts: Vec<usize>,
    ids: &'a IdGenerator,
    expressions: Vec<Expression>,
    declarations: Vec<ParameterDeclaration>,
    fragment_ids: BTreeSet<String>,
    errors: Vec<ParseError>,
}

/// How the parameters of one block are interpreted
#[derive(Debug, Default, PartialEq)]
struct BlockParams {
    expressions: Vec<String>,
    aliases: Vec<String>,
}

impl<'a> TemplateBuilder<'a> {
    pub fn new(source: &str, ids: &'a IdGenerator) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            line_starts,
            ids,
            expressions: Vec::new(),
            declarations: Vec::new(),
            fragment_ids: BTreeSet::new(),
            errors: Vec::new(),
        }
    }

    /// Declarations added by parser hooks; they precede the template's own
    pub fn with_declarations(mut self, declarations: Vec<ParameterDeclaration>) -> Self {
        self.declarations = declarations;
        self
    }

    pub fn build(mut self, raw: Vec<RawNode>) -> Result<BuiltTemplate, Vec<ParseError>> {
        let nodes = self.build_nodes(raw);
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        Ok(BuiltTemplate {
            nodes,
            expressions: self.expressions,
            parameter_declarations: self.declarations,
            fragment_ids: self.fragment_ids,
        })
    }

    fn origin(&self, offset: usize) -> Origin {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Origin::new(line + 1, offset - self.line_starts[line] + 1)
    }

    fn build_nodes(&mut self, raw: Vec<RawNode>) -> Vec<TemplateNode> {
        let mut nodes = Vec::with_capacity(raw.len());
        for node in raw {
            match node {
                RawNode::Text(value, span) => {
                    // Adjacent text tokens are merged into one node
                    if let Some(TemplateNode::Text(prev)) = nodes.last_mut() {
                        prev.value.push_str(&value);
                        continue;
                    }
                    nodes.push(TemplateNode::Text(TextNode {
                        value,
                        origin: self.origin(span.start),
                    }));
                }
                RawNode::Expression(text, span) => {
                    let origin = self.origin(span.start);
                    if let Some(expr) = self.expression(&text, origin, &span, Some(span.start + 1))
                    {
                        nodes.push(TemplateNode::Expression(expr));
                    }
                }
                RawNode::ParamDecl(text, span) => {
                    if let Some(decl) = self.declaration(&text, &span) {
                        nodes.push(TemplateNode::ParameterDeclaration(decl));
                    }
                }
                RawNode::Section(section) => {
                    nodes.push(TemplateNode::Section(self.build_section(section)));
                }
            }
        }
        nodes
    }

    fn build_section(&mut self, section: RawSection) -> SectionNode {
        if let Some(end) = &section.end_name {
            if !end.node.is_empty() && end.node != section.name {
                self.errors.push(ParseError::MismatchedSectionEnd {
                    expected: section.name.clone(),
                    found: end.node.clone(),
                    span: end.span.clone(),
                });
            }
        }

        if section.name.is_empty() {
            self.errors.push(ParseError::InvalidSection {
                name: String::new(),
                message: "missing section name".to_string(),
                span: section
                    .blocks
                    .first()
                    .map(|b| b.span.clone())
                    .unwrap_or_default(),
            });
        }

        let origin = section
            .blocks
            .first()
            .map(|b| self.origin(b.span.start))
            .unwrap_or_else(|| Origin::new(1, 1));

        let mut blocks = Vec::with_capacity(section.blocks.len());
        for (index, block) in section.blocks.into_iter().enumerate() {
            if index > 0 && !is_valid_block(&section.name, &block.label) {
                self.errors.push(ParseError::UnexpectedBlock {
                    section: section.name.clone(),
                    label: block.label.clone(),
                    span: block.span.clone(),
                });
            }
            blocks.push(self.build_block(&section.name, block, index == 0));
        }

        SectionNode {
            name: section.name,
            blocks,
            origin,
        }
    }

    fn build_block(&mut self, section: &str, block: RawBlock, is_main: bool) -> SectionBlock {
        let origin = self.origin(block.span.start);
        let params = split_params(&block.params);

        if is_main && matches!(section, "fragment" | "capture") {
            self.register_fragment(&params, &block.span);
        }

        let semantics = block_params(section, &block.label, &params);
        if is_main && semantics.expressions.is_empty() {
            if let Some(message) = missing_params_message(section) {
                self.errors.push(ParseError::InvalidSection {
                    name: section.to_string(),
                    message: message.to_string(),
                    span: block.span.clone(),
                });
            }
        }
        let mut expressions = Vec::new();
        for text in &semantics.expressions {
            if let Some(expr) = self.expression(text, origin, &block.span, None) {
                expressions.push(expr);
            }
        }

        let nodes = self.build_nodes(block.nodes);
        SectionBlock {
            label: block.label,
            params,
            expressions,
            aliases: semantics.aliases,
            nodes,
            origin,
        }
    }

    fn register_fragment(&mut self, params: &[String], span: &Span) {
        let id = params
            .iter()
            .find_map(|p| match split_key_value(p) {
                Some(("id", value)) => Some(value.to_string()),
                _ => None,
            })
            .or_else(|| {
                params
                    .iter()
                    .find(|p| split_key_value(p).is_none())
                    .cloned()
            })
            .unwrap_or_default();

        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.errors.push(ParseError::InvalidFragmentId {
                id,
                span: span.clone(),
            });
        } else if !self.fragment_ids.insert(id.clone()) {
            self.errors.push(ParseError::DuplicateFragmentId {
                id,
                span: span.clone(),
            });
        }
    }

    /// Parse and register an expression.
    ///
    /// `text_offset` is the source offset of `text` when it is known exactly;
    /// otherwise errors point at `span`.
    fn expression(
        &mut self,
        text: &str,
        origin: Origin,
        span: &Span,
        text_offset: Option<usize>,
    ) -> Option<Expression> {
        match expression::parse(text) {
            Ok(raw) => {
                let expr = self.materialize(raw, text.trim(), text, origin);
                self.expressions
                    .extend(expr.flatten().into_iter().cloned());
                Some(expr)
            }
            Err(errors) => {
                let message = errors
                    .iter()
                    .map(|e| match e {
                        ParseError::Syntax { message, .. } => message.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                let span = match (text_offset, errors.first()) {
                    (Some(offset), Some(first)) => first.clone().offset(offset).span().clone(),
                    _ => span.clone(),
                };
                self.errors.push(ParseError::InvalidExpression {
                    value: text.trim().to_string(),
                    message,
                    span,
                });
                None
            }
        }
    }

    /// Assign ids depth first: an expression gets its id before its method parameters.
    ///
    /// `input` is the text the expression was parsed from; argument spans index into it.
    fn materialize(&self, raw: RawExpr, value: &str, input: &str, origin: Origin) -> Expression {
        let generated_id = self.ids.next_expression_id();
        let value = value.to_string();
        match raw {
            RawExpr::Literal(literal) => Expression {
                generated_id,
                namespace: None,
                parts: Vec::new(),
                literal: Some(literal),
                value,
                origin,
            },
            RawExpr::Path { namespace, parts } => Expression {
                generated_id,
                namespace,
                parts: parts
                    .into_iter()
                    .map(|part| Part {
                        name: part.name,
                        params: part.params.map(|params| {
                            params
                                .into_iter()
                                .map(|arg| {
                                    let text = input.get(arg.span.clone()).unwrap_or_default();
                                    self.materialize(arg.expr, text.trim(), input, origin)
                                })
                                .collect()
                        }),
                    })
                    .collect(),
                literal: None,
                value,
                origin,
            },
        }
    }

    fn declaration(&mut self, content: &str, span: &Span) -> Option<ParameterDeclaration> {
        let origin = self.origin(span.start);
        let invalid = |message: &str| ParseError::InvalidParameterDeclaration {
            value: content.to_string(),
            message: message.to_string(),
            span: span.clone(),
        };

        // The type may contain spaces inside generics: `java.util.Map<String, Item> map`
        let mut depth = 0usize;
        let mut split = None;
        for (i, c) in content.char_indices() {
            match c {
                '<' => depth += 1,
                '>' => depth = depth.saturating_sub(1),
                c if c.is_whitespace() && depth == 0 => {
                    split = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let Some(idx) = split else {
            self.errors.push(invalid("missing parameter key"));
            return None;
        };

        let type_info = content[..idx].trim();
        let rest = content[idx..].trim();
        let (key, default_text) = match rest.find('=') {
            Some(i) => (rest[..i].trim(), Some(rest[i + 1..].trim())),
            None => (rest, None),
        };

        if type_info.is_empty() {
            self.errors.push(invalid("missing type"));
            return None;
        }
        if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
            self.errors.push(invalid("key must be an identifier"));
            return None;
        }

        let default_value = match default_text {
            Some(text) => Some(self.expression(text, origin, span, None)?),
            None => None,
        };

        let decl = ParameterDeclaration {
            type_info: type_info.to_string(),
            key: key.to_string(),
            default_value,
            origin,
        };
        self.declarations.push(decl.clone());
        Some(decl)
    }
}

/// Sections that cannot do without a value in their start tag
fn missing_params_message(section: &str) -> Option<&'static str> {
    match section {
        "if" => Some("missing condition"),
        "for" | "each" => Some("expected 'alias in iterable'"),
        "with" | "when" | "switch" => Some("missing value"),
        _ => None,
    }
}

fn is_valid_block(section: &str, label: &str) -> bool {
    match label {
        "else" => matches!(section, "if" | "for" | "each" | "when" | "switch"),
        "is" | "case" => matches!(section, "when" | "switch"),
        _ => false,
    }
}

/// Split section parameters on whitespace outside quotes and brackets.
/// `key = value` written with spaces is joined into `key=value`.
pub(crate) fn split_params(params: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in params.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                // A parenthesis opening a token groups a condition; it does not
                // start a method call
                '(' if current.is_empty() || current.ends_with(['(', '!']) => {
                    current.push(c);
                }
                '(' | '[' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                c if c.is_whitespace() && depth == 0 => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    let mut merged: Vec<String> = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token == "=" && !merged.is_empty() {
            if let Some(value) = iter.next() {
                if let Some(key) = merged.last_mut() {
                    key.push('=');
                    key.push_str(&value);
                }
                continue;
            }
        }
        merged.push(token);
    }
    merged
}

/// Strip `!` negation and grouping parentheses from a condition operand
fn condition_operand(token: &str) -> Option<&str> {
    if CONDITION_OPERATORS.contains(&token) {
        return None;
    }
    let mut operand = token.trim_start_matches(['(', '!']);
    while operand.ends_with(')') && operand.matches(')').count() > operand.matches('(').count() {
        operand = &operand[..operand.len() - 1];
    }
    if operand.is_empty() || CONDITION_OPERATORS.contains(&operand) {
        None
    } else {
        Some(operand)
    }
}

fn condition(params: &[String]) -> BlockParams {
    BlockParams {
        expressions: params
            .iter()
            .filter_map(|p| condition_operand(p))
            .map(str::to_string)
            .collect(),
        aliases: Vec::new(),
    }
}

fn block_params(section: &str, label: &str, params: &[String]) -> BlockParams {
    match label {
        "else" => match params.split_first() {
            Some((first, rest)) if first == "if" => condition(rest),
            _ => BlockParams::default(),
        },
        "is" | "case" => BlockParams::default(),
        _ => match section {
            "if" => condition(params),
            "for" | "each" => match params {
                [alias, keyword, iterable @ ..] if keyword == "in" && !iterable.is_empty() => {
                    BlockParams {
                        expressions: vec![iterable.join(" ")],
                        aliases: vec![alias.clone()],
                    }
                }
                [iterable] => BlockParams {
                    expressions: vec![iterable.clone()],
                    aliases: vec!["it".to_string()],
                },
                _ => BlockParams::default(),
            },
            "let" | "set" => {
                let mut out = BlockParams::default();
                for (key, value) in params.iter().filter_map(|p| split_key_value(p)) {
                    out.aliases.push(key.to_string());
                    out.expressions.push(value.to_string());
                }
                out
            }
            "with" | "when" | "switch" => BlockParams {
                expressions: params.first().cloned().into_iter().collect(),
                aliases: Vec::new(),
            },
            // The first positional parameter is a template id, not data
            "include" => BlockParams {
                expressions: params
                    .iter()
                    .filter_map(|p| split_key_value(p))
                    .map(|(_, v)| v.to_string())
                    .collect(),
                aliases: Vec::new(),
            },
            "insert" | "fragment" | "capture" => BlockParams::default(),
            // User-defined tags: every value is an expression
            _ => BlockParams {
                expressions: params
                    .iter()
                    .map(|p| match split_key_value(p) {
                        Some((_, value)) => value.to_string(),
                        None => p.clone(),
                    })
                    .collect(),
                aliases: Vec::new(),
            },
        },
    }
}
