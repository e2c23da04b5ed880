//! FILENAME: core/parser/src/lib.rs
//! PURPOSE: Library root for the table expression parser.
//! CONTEXT: This module exposes the lexer, parser, and AST components
//! needed to convert filter and formatter rules into evaluatable expression trees.
//!
//! PIPELINE: Expression String --> Lexer --> Tokens --> Parser --> AST --> Evaluator
//!
//! SUPPORTED FEATURES:
//! - Arithmetic: +, -, *, /, ^ (power)
//! - Comparison: =, ==, <>, !=, <, >, <=, >=
//! - Boolean connectives: AND, OR, NOT (and &&, ||, !)
//! - String concatenation: &
//! - Column references: Age, [Unit Price]
//! - The formatted cell's own value: @
//! - Allow-listed function calls: SUM(Price), IF(Age > 18, "adult", "minor")
//! - Parentheses for grouping
//! - Unary negation: -5

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;


// Re-export commonly used types for convenience
pub use ast::{BinaryOperator, BuiltinFunction, Expression, UnaryOperator, Value};
pub use lexer::Lexer;
pub use parser::{parse, ParseError, ParseResult, Parser, MAX_EXPRESSION_NODES, MAX_NESTING_DEPTH};
pub use token::Token;
