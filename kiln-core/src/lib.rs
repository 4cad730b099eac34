//! Core of the Kiln compiler.
//!
//! The pipeline is:
//!
//!   source .kn
//!     -> lexer      (tokens)
//!     -> parser     (AST)
//!     -> c_header   (symbols of included C headers)
//!     -> resolve    (bindings, aliases, declaration table)
//!     -> typecheck  (assignability, filled-in default arguments)
//!     -> dump | codegen_c
//!
//! The CLI and other tools should go through [`Compiler`] rather than
//! driving the passes themselves.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Semantic layers: types, C headers, aliases, resolution, checking
// ---------------------------------------------------------------------

pub mod types;
pub mod builtins;
pub mod c_header;
pub mod alias;
pub mod resolve;
pub mod typecheck;

// ---------------------------------------------------------------------
// Back-ends and compiler orchestration
// ---------------------------------------------------------------------

pub mod dump;
pub mod codegen_c;
pub mod sources;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use codegen_c::DataModel;
pub use compiler::{AnalyzedUnit, CompileError, CompileOptions, CompileOutput, Compiler, EmitFormat};
pub use error::CoreError;
pub use sources::collect_sources;
