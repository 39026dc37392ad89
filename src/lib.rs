//! Core library for the evoscript embeddable scripting runtime: lexing, parsing,
//! tree-walking evaluation, the object/class model and the built-in library.

pub mod ast;
pub mod class;
pub mod diagnostics;
pub mod environment;
pub mod eval;
pub mod exception;
pub mod function;
pub mod interner;
pub mod lexer;
pub mod object;
pub mod operations;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticKind, EvoError, SourceSpan};
pub use exception::{EvalResult, Exception};
pub use repl::Repl;
pub use runtime::{RunMode, Runtime};
pub use value::Value;
