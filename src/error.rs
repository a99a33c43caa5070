//! Error types for parsing and validation

use ariadne::{Color, Label, Report, ReportKind, Source};
use chumsky::error::{Rich, RichPattern, RichReason};
use thiserror::Error;

use crate::parser::expression::{self, ExprToken};
use crate::parser::grammar;
use crate::parser::lexer::Token;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },

    #[error("section end '{{/{found}}}' does not match section '{{#{expected}}}'")]
    MismatchedSectionEnd {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("'{{#{label}}}' is not a valid block of section '{section}'")]
    UnexpectedBlock {
        section: String,
        label: String,
        span: Span,
    },

    #[error("invalid section '{{#{name}}}': {message}")]
    InvalidSection {
        name: String,
        message: String,
        span: Span,
    },

    #[error("invalid expression '{value}': {message}")]
    InvalidExpression {
        value: String,
        message: String,
        span: Span,
    },

    #[error("invalid parameter declaration '{value}': {message}")]
    InvalidParameterDeclaration {
        value: String,
        message: String,
        span: Span,
    },

    #[error("invalid fragment id '{id}': only letters, digits and '_' are allowed")]
    InvalidFragmentId { id: String, span: Span },

    #[error("duplicate fragment id '{id}'")]
    DuplicateFragmentId { id: String, span: Span },
}

impl ParseError {
    /// Source span of the error
    pub fn span(&self) -> &Span {
        match self {
            ParseError::Syntax { span, .. }
            | ParseError::MismatchedSectionEnd { span, .. }
            | ParseError::UnexpectedBlock { span, .. }
            | ParseError::InvalidSection { span, .. }
            | ParseError::InvalidExpression { span, .. }
            | ParseError::InvalidParameterDeclaration { span, .. }
            | ParseError::InvalidFragmentId { span, .. }
            | ParseError::DuplicateFragmentId { span, .. } => span,
        }
    }

    /// Shift the span by `offset`; used for errors from nested parsers
    pub(crate) fn offset(mut self, offset: usize) -> Self {
        let shift = |span: &mut Span| *span = span.start + offset..span.end + offset;
        match &mut self {
            ParseError::Syntax { span, .. }
            | ParseError::MismatchedSectionEnd { span, .. }
            | ParseError::UnexpectedBlock { span, .. }
            | ParseError::InvalidSection { span, .. }
            | ParseError::InvalidExpression { span, .. }
            | ParseError::InvalidParameterDeclaration { span, .. }
            | ParseError::InvalidFragmentId { span, .. }
            | ParseError::DuplicateFragmentId { span, .. } => shift(span),
        }
        self
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        let span = self.span().clone();
        let label_message = match self {
            ParseError::Syntax {
                message, expected, ..
            } => {
                if expected.is_empty() {
                    message.clone()
                } else {
                    format!("{}\nExpected: {}", message, expected.join(", "))
                }
            }
            other => other.to_string(),
        };
        let message = match self {
            ParseError::Syntax { message, .. } => message.clone(),
            other => other.to_string(),
        };

        let _ = Report::build(ReportKind::Error, filename, span.start)
            .with_message(message)
            .with_label(
                Label::new((filename, span))
                    .with_message(label_message)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn from_rich<T>(
    err: &Rich<'_, T>,
    message: String,
    describe: fn(&T) -> String,
) -> ParseError {
    // Format expected tokens nicely
    let expected: Vec<String> = err
        .expected()
        .filter_map(|e| match e {
            RichPattern::Token(tok) => Some(describe(tok)),
            RichPattern::Label(label) => Some(label.to_string()),
            RichPattern::EndOfInput => Some("end of input".to_string()),
            RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
            RichPattern::Any => Some("any token".to_string()),
            RichPattern::SomethingElse => None,
        })
        .collect();

    ParseError::Syntax {
        span: err.span().into_range(),
        message,
        expected,
    }
}

impl<'a> From<Rich<'a, Token>> for ParseError {
    fn from(err: Rich<'a, Token>) -> Self {
        let message = match err.reason() {
            RichReason::ExpectedFound { .. } => grammar::unexpected_message(err.found()),
            RichReason::Custom(msg) => msg.to_string(),
        };
        from_rich(&err, message, grammar::format_token)
    }
}

impl<'a> From<Rich<'a, ExprToken>> for ParseError {
    fn from(err: Rich<'a, ExprToken>) -> Self {
        let message = match err.reason() {
            RichReason::ExpectedFound { .. } => match err.found() {
                Some(tok) => format!("Unexpected {}", expression::format_token(tok)),
                None => "Unexpected end of expression".to_string(),
            },
            RichReason::Custom(msg) => msg.to_string(),
        };
        from_rich(&err, message, expression::format_token)
    }
}
