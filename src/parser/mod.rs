//! Parser for Qute-style templates

pub mod ast;
pub(crate) mod builder;
pub mod expression;
pub(crate) mod grammar;
pub mod lexer;

pub use ast::*;
