//! `hcl2-eval` library crate.
//!
//! High-level layout:
//! - frontend: `lexer` + `parser` produce the spanned AST (`ast`)
//! - runtime value model: `value`
//! - evaluation: `eval` (scopes, evaluator, variable trace)
//! - static analysis: `deps` (free variables, topological generations)

pub mod ast;
pub mod deps;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod trace;
pub mod value;

pub use deps::{CycleError, expr_variable_paths, free_variable_paths, topological_generations};
pub use eval::{EvalError, Evaluator, FuncError, Scope, evaluate_body, evaluate_expr};
pub use lexer::LexError;
pub use parser::{ParseError, parse_expression, parse_file};
pub use token::Span;
pub use trace::{KeyPath, PathSeg};
pub use value::{Value, from_native, to_native};
