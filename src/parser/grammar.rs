//! Template structure parser using chumsky
//!
//! Matches section start and end tags into a tree of raw nodes. Expressions,
//! parameter declarations and section parameters are kept as text here and
//! interpreted by the builder.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::parser::lexer::{SectionTag, Span, Token};

/// Node of the raw tree
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawNode {
    Text(String, Span),
    Expression(String, Span),
    ParamDecl(String, Span),
    Section(RawSection),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawSection {
    pub name: String,
    /// The main block followed by any `{#else}`/`{#is}` blocks
    pub blocks: Vec<RawBlock>,
    /// Name in the end tag; `None` for self-closing sections, empty for `{/}`
    pub end_name: Option<Spanned<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawBlock {
    pub label: String,
    pub params: String,
    /// Span of the tag that opened the block
    pub span: Span,
    pub nodes: Vec<RawNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

/// Parse template source into the raw node tree
pub(crate) fn parse(input: &str) -> Result<Vec<RawNode>, Vec<crate::ParseError>> {
    let len = input.len();

    // Create a logos lexer and convert to token stream
    let token_iter = crate::parser::lexer::lex(input).map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    template_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Helper to extract span range from chumsky's MapExtra
pub(crate) fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn template_parser<'a, I>() -> impl Parser<'a, I, Vec<RawNode>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let text = select! {
        Token::Text(s) => s,
        Token::UnparsedData(s) => s,
        Token::EscapedBrace => "{".to_string(),
        Token::LoneBrace => "{".to_string(),
        Token::Backslash => "\\".to_string(),
    }
    .map_with(|s, e| RawNode::Text(s, span_range(&e.span())));

    let expression = select! {
        Token::Expression(s) => s,
    }
    .map_with(|s, e| RawNode::Expression(s, span_range(&e.span())));

    let declaration = select! {
        Token::ParamDecl(s) => s,
    }
    .map_with(|s, e| RawNode::ParamDecl(s, span_range(&e.span())));

    let node = recursive(|node| {
        // `{#include header /}` has no body
        let single_section = select! {
            Token::SectionStart(tag) if tag.self_closing && !tag.is_block_label() => tag,
        }
        .map_with(|tag: SectionTag, e| {
            RawNode::Section(RawSection {
                name: tag.name.clone(),
                blocks: vec![RawBlock {
                    label: tag.name,
                    params: tag.params,
                    span: span_range(&e.span()),
                    nodes: Vec::new(),
                }],
                end_name: None,
            })
        });

        let section_start = select! {
            Token::SectionStart(tag) if !tag.self_closing && !tag.is_block_label() => tag,
        }
        .map_with(|tag: SectionTag, e| (tag, span_range(&e.span())));

        let block_label = select! {
            Token::SectionStart(tag) if tag.is_block_label() => tag,
        }
        .map_with(|tag: SectionTag, e| (tag, span_range(&e.span())));

        let section_end = select! {
            Token::SectionEnd(name) => name,
        }
        .map_with(|name, e| Spanned {
            node: name,
            span: span_range(&e.span()),
        });

        let body = node.repeated().collect::<Vec<_>>();

        let section = section_start
            .then(body.clone())
            .then(
                block_label
                    .then(body)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .then(section_end)
            .map(|(((start, nodes), labelled), end)| {
                let (tag, span) = start;
                let mut blocks = vec![RawBlock {
                    label: tag.name.clone(),
                    params: tag.params,
                    span,
                    nodes,
                }];
                blocks.extend(labelled.into_iter().map(|((label, span), nodes)| RawBlock {
                    label: label.name,
                    params: label.params,
                    span,
                    nodes,
                }));
                RawNode::Section(RawSection {
                    name: tag.name,
                    blocks,
                    end_name: Some(end),
                })
            });

        choice((text, expression, declaration, single_section, section)).boxed()
    });

    node.repeated().collect().then_ignore(end())
}

/// Format a token for human-readable error messages
pub(crate) fn format_token(tok: &Token) -> String {
    match tok {
        Token::Text(_) | Token::UnparsedData(_) => "text".to_string(),
        Token::Expression(s) => format!("expression '{{{}}}'", s),
        Token::SectionStart(tag) => format!("section tag '{{#{}}}'", tag.name),
        Token::SectionEnd(name) => format!("section end '{{/{}}}'", name),
        Token::ParamDecl(s) => format!("parameter declaration '{{@{}}}'", s),
        Token::EscapedBrace | Token::LoneBrace => "'{'".to_string(),
        Token::Backslash => "'\\'".to_string(),
        Token::Comment => "comment".to_string(),
        Token::Unterminated => "unterminated tag".to_string(),
    }
}

/// Message for an unexpected token (or end of input) in template structure
pub(crate) fn unexpected_message(found: Option<&Token>) -> String {
    match found {
        None => "unterminated section: missing end tag".to_string(),
        Some(Token::SectionEnd(name)) => format!("unexpected section end '{{/{}}}'", name),
        Some(Token::SectionStart(tag)) if tag.is_block_label() => {
            format!("'{{#{}}}' is only allowed inside a section", tag.name)
        }
        Some(tok) => format!("Unexpected {}", format_token(tok)),
    }
}
