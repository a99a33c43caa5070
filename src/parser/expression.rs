//! Lexer and parser for the value expression language
//!
//! Grammar:
//!
//! ```text
//! expr      = atom { infix atom }
//! infix     = identifier | "?:"
//! atom      = literal | [ namespace ":" ] part { "." part | "[" key "]" }
//! part      = identifier [ "(" [ expr { "," expr } ] ")" ]
//! literal   = string | integer | float | "true" | "false" | "null"
//! ```
//!
//! Infix notation is sugar for a virtual method call: `name or 'N/A'` is the
//! same as `name.or('N/A')`.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use logos::Logos;

use crate::parser::ast::Literal;
use crate::parser::grammar::span_range;
use crate::parser::lexer::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum ExprToken {
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[token("?:")]
    Elvis,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"'([^'\\]|\\.)*'", |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    Str(String),

    // Identifiers must come after keywords
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    /// Anything the lexer does not recognize; always a parse error
    Invalid,
}

/// Lex an expression; unrecognized input becomes [`ExprToken::Invalid`]
pub fn lex(input: &str) -> impl Iterator<Item = (ExprToken, Span)> + '_ {
    ExprToken::lexer(input)
        .spanned()
        .map(|(tok, span)| (tok.unwrap_or(ExprToken::Invalid), span))
}

/// Expression as produced by the grammar, before ids and origins are assigned
#[derive(Debug, Clone, PartialEq)]
pub enum RawExpr {
    Literal(Literal),
    Path {
        namespace: Option<String>,
        parts: Vec<RawPart>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPart {
    pub name: String,
    pub params: Option<Vec<RawArg>>,
}

/// A method argument and its byte range in the parsed input
#[derive(Debug, Clone, PartialEq)]
pub struct RawArg {
    pub expr: RawExpr,
    pub span: Span,
}

impl std::fmt::Display for RawExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawExpr::Literal(lit) => write!(f, "{}", lit),
            RawExpr::Path { namespace, parts } => {
                if let Some(ns) = namespace {
                    write!(f, "{}:", ns)?;
                }
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", part.name)?;
                    if let Some(params) = &part.params {
                        let rendered: Vec<String> =
                            params.iter().map(|p| p.expr.to_string()).collect();
                        write!(f, "({})", rendered.join(", "))?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Parse a single expression, e.g. the content of `{item.name}`
pub fn parse(input: &str) -> Result<RawExpr, Vec<crate::ParseError>> {
    let len = input.len();

    let token_iter = lex(input).map(|(tok, span)| (tok, span.into()));

    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    expression_parser()
        .then_ignore(end())
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

fn expression_parser<'a, I>() -> impl Parser<'a, I, RawExpr, extra::Err<Rich<'a, ExprToken>>> + Clone
where
    I: ValueInput<'a, Token = ExprToken, Span = SimpleSpan>,
{
    recursive(|expr| {
        let literal = select! {
            ExprToken::True => Literal::Bool(true),
            ExprToken::False => Literal::Bool(false),
            ExprToken::Null => Literal::Null,
            ExprToken::Int(i) => Literal::Int(i),
            ExprToken::Float(n) => Literal::Float(n),
            ExprToken::Str(s) => Literal::Str(s),
        };

        let identifier = select! {
            ExprToken::Ident(s) => s,
        };

        let params = expr
            .map_with(|expr, e| RawArg {
                expr,
                span: span_range(&e.span()),
            })
            .separated_by(just(ExprToken::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(ExprToken::ParenOpen), just(ExprToken::ParenClose));

        let part = identifier
            .clone()
            .then(params.or_not())
            .map(|(name, params)| RawPart { name, params });

        // `item['name']` and `list[0]` access a property by key
        let bracket_part = select! {
            ExprToken::Str(s) => s,
            ExprToken::Int(i) => i.to_string(),
            ExprToken::Ident(s) => s,
        }
        .delimited_by(just(ExprToken::BracketOpen), just(ExprToken::BracketClose))
        .map(|name| RawPart { name, params: None });

        let namespace = identifier.clone().then_ignore(just(ExprToken::Colon));

        let path = namespace
            .or_not()
            .then(part.clone())
            .then(
                choice((just(ExprToken::Dot).ignore_then(part), bracket_part))
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(|((namespace, first), rest)| {
                let mut parts = vec![first];
                parts.extend(rest);
                RawExpr::Path { namespace, parts }
            });

        let atom = choice((literal.map(RawExpr::Literal), path));

        let infix_op = choice((identifier, just(ExprToken::Elvis).to("?:".to_string())));

        // The right-hand side of an infix method becomes its only argument
        let operand = atom.clone().map_with(|expr, e| RawArg {
            expr,
            span: span_range(&e.span()),
        });

        atom.then(infix_op.then(operand).repeated().collect::<Vec<_>>())
            .try_map(|(head, tail), span| {
                if tail.is_empty() {
                    return Ok(head);
                }
                match head {
                    RawExpr::Path {
                        namespace,
                        mut parts,
                    } => {
                        for (name, operand) in tail {
                            parts.push(RawPart {
                                name,
                                params: Some(vec![operand]),
                            });
                        }
                        Ok(RawExpr::Path { namespace, parts })
                    }
                    RawExpr::Literal(_) => Err(Rich::custom(
                        span,
                        "infix methods cannot be called on a literal",
                    )),
                }
            })
            .boxed()
    })
}

/// Format an expression token for human-readable error messages
pub(crate) fn format_token(tok: &ExprToken) -> String {
    match tok {
        ExprToken::Ident(s) => format!("identifier '{}'", s),
        ExprToken::Str(s) => format!("string '{}'", s),
        ExprToken::Int(i) => format!("number {}", i),
        ExprToken::Float(n) => format!("number {}", n),
        ExprToken::True => "'true'".to_string(),
        ExprToken::False => "'false'".to_string(),
        ExprToken::Null => "'null'".to_string(),
        ExprToken::Elvis => "'?:'".to_string(),
        ExprToken::Dot => "'.'".to_string(),
        ExprToken::Colon => "':'".to_string(),
        ExprToken::Comma => "','".to_string(),
        ExprToken::ParenOpen => "'('".to_string(),
        ExprToken::ParenClose => "')'".to_string(),
        ExprToken::BracketOpen => "'['".to_string(),
        ExprToken::BracketClose => "']'".to_string(),
        ExprToken::Invalid => "invalid character".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(input: &str) -> (Option<String>, Vec<RawPart>) {
        match parse(input).expect("Should parse") {
            RawExpr::Path { namespace, parts } => (namespace, parts),
            other => panic!("Expected path, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_property() {
        let (ns, parts) = path("item.name");
        assert_eq!(ns, None);
        let names: Vec<_> = parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["item", "name"]);
    }

    #[test]
    fn test_namespace() {
        let (ns, parts) = path("inject:foo.bar");
        assert_eq!(ns.as_deref(), Some("inject"));
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_virtual_method() {
        let (_, parts) = path("item.price.scale(2, 'HALF_UP')");
        let params = parts[2].params.as_ref().expect("Should have params");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].expr, RawExpr::Literal(Literal::Int(2)));
        assert_eq!(params[1].expr, RawExpr::Literal(Literal::Str("HALF_UP".to_string())));
        assert_eq!(params[1].span, 20..29);
    }

    #[test]
    fn test_empty_method_params() {
        let (_, parts) = path("items.size()");
        assert_eq!(parts[1].params, Some(vec![]));
    }

    #[test]
    fn test_bracket_access() {
        let (_, parts) = path("item['name'].value");
        let names: Vec<_> = parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["item", "name", "value"]);
    }

    #[test]
    fn test_infix_method() {
        let expr = parse("name or 'N/A'").expect("Should parse");
        assert_eq!(expr.to_string(), "name.or('N/A')");
    }

    #[test]
    fn test_elvis_operator() {
        let expr = parse("name ?: other.name").expect("Should parse");
        assert_eq!(expr.to_string(), "name.?:(other.name)");
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("true").unwrap(), RawExpr::Literal(Literal::Bool(true)));
        assert_eq!(parse("null").unwrap(), RawExpr::Literal(Literal::Null));
        assert_eq!(parse("-10").unwrap(), RawExpr::Literal(Literal::Int(-10)));
        assert_eq!(parse("1.5").unwrap(), RawExpr::Literal(Literal::Float(1.5)));
        assert_eq!(
            parse("\"hello\"").unwrap(),
            RawExpr::Literal(Literal::Str("hello".to_string()))
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        let (_, parts) = path("nullable.trueValue");
        assert_eq!(parts[0].name, "nullable");
        assert_eq!(parts[1].name, "trueValue");
    }

    #[test]
    fn test_invalid_character() {
        assert!(parse("item.name + 1").is_err());
    }

    #[test]
    fn test_trailing_dot() {
        assert!(parse("item.").is_err());
    }

    #[test]
    fn test_infix_on_literal_rejected() {
        assert!(parse("'a' or 'b'").is_err());
    }
}
