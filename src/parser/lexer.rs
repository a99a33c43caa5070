//! Lexer for template source using logos
//!
//! Templates are mostly literal text with embedded tags, so the lexer works on
//! whole tags: every `{...}` construct becomes a single token and everything
//! between tags becomes `Text`. The inner structure of expressions is lexed
//! separately by [`crate::parser::expression`].

use logos::Logos;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Content of a section start tag, e.g. `{#for item in items}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionTag {
    /// Section name (`for`, `if`, `include`, ...)
    pub name: String,
    /// Everything after the name, trimmed
    pub params: String,
    /// `{#include foo /}` has no body and no end tag
    pub self_closing: bool,
}

impl SectionTag {
    fn from_slice(slice: &str) -> Self {
        // Strip `{#` and `}`
        let mut content = slice[2..slice.len() - 1].trim();
        let self_closing = content.ends_with('/');
        if self_closing {
            content = content[..content.len() - 1].trim_end();
        }
        let (name, params) = match content.find(char::is_whitespace) {
            Some(idx) => (&content[..idx], content[idx..].trim()),
            None => (content, ""),
        };
        Self {
            name: name.to_string(),
            params: params.to_string(),
            self_closing,
        }
    }

    /// Block labels split a section into blocks instead of opening a new section
    pub fn is_block_label(&self) -> bool {
        matches!(self.name.as_str(), "else" | "is" | "case")
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
    // Comments (skip)
    #[regex(r"\{!([^!]|![^}])*!\}", logos::skip)]
    Comment,

    /// Unparsed character data `{| ... |}`, emitted verbatim
    #[regex(r"\{\|([^|]|\|[^}])*\|\}", |lex| {
        let s = lex.slice();
        s[2..s.len()-2].to_string()
    })]
    UnparsedData(String),

    // Quoted runs may contain `}`: `{#let brace='}'}`
    #[regex(r#"\{#([^}'"]|'[^']*'|"[^"]*")*\}"#, |lex| SectionTag::from_slice(lex.slice()))]
    SectionStart(SectionTag),

    #[regex(r"\{/[^}]*\}", |lex| {
        let s = lex.slice();
        s[2..s.len()-1].trim().to_string()
    })]
    SectionEnd(String),

    /// Parameter declaration `{@org.acme.Item item}`
    #[regex(r#"\{@([^}'"]|'[^']*'|"[^"]*")*\}"#, |lex| {
        let s = lex.slice();
        s[2..s.len()-1].trim().to_string()
    })]
    ParamDecl(String),

    /// Value expression `{item.name}`; must start right after the brace
    #[regex(r#"\{([a-zA-Z_$0-9\-\[]|'[^']*'|"[^"]*")([^}'"]|'[^']*'|"[^"]*")*\}"#, |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    Expression(String),

    #[token("\\{")]
    EscapedBrace,

    #[token("\\")]
    Backslash,

    /// A brace that does not open a tag, e.g. `{ foo}` or `{}`
    #[token("{")]
    LoneBrace,

    #[regex(r"[^{\\]+", |lex| lex.slice().to_string())]
    Text(String),

    /// Input the lexer cannot match, e.g. a tag without its closing brace
    Unterminated,
}

/// Lex input string into tokens with spans
pub fn lex(input: &str) -> impl Iterator<Item = (Token, Span)> + '_ {
    Token::lexer(input)
        .spanned()
        .map(|(tok, span)| (tok.unwrap_or(Token::Unterminated), span))
}
