//! # Marten Parser
//!
//! Recursive-descent front end for the Marten interpreter.
//!
//! ## Design
//!
//! - **Cursor lexer**: tokens carry source offsets; whitespace and line
//!   terminators are tokens too, so the parser can implement automatic
//!   semicolon insertion precisely
//! - **Precedence climbing** for binary operators, with the operator table
//!   in [`token`]
//! - **Extents everywhere**: each AST node records its `[start, end)`
//!   source interval; line/column are derived lazily
//! - **Errors, not panics**: the first syntax error terminates parsing and
//!   is returned as a [`ParseError`] naming the offending grammar rule

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod source;
pub mod token;

pub use ast::{Declaration, Expression, ExpressionKind, Literal, Statement, StatementKind};
pub use error::ParseError;
pub use lexer::Lexer;
pub use parser::parse;
pub use source::{calc_source_position, SourceExtent, SourceFile, SourcePosition};
pub use token::{
    is_right_to_left, keyword_kind, operator_precedence, Token, TokenKind, TokenValue,
    ASSIGNMENT_PRECEDENCE, COMMA_PRECEDENCE, MAX_PRECEDENCE,
};
