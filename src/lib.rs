//! Crate root: wires together the compilation pipeline.
//!
//! - `tokenizer` turns source text into tokens on demand.
//! - `parser` owns the grammar, builds the statement tree and fills in the
//!   global `symbols` table as declarations are seen.
//! - `interpreter` evaluates the tree directly.
//! - `codegen` lowers the tree to x86-64 AT&T assembly using the fixed
//!   register pool in `regalloc`.
//! - `lower` builds the basic-block IR defined in `ir`.
//! - `error` holds the diagnostics shared by every stage.

pub mod config;
pub mod error;
pub mod interpreter;
pub mod ir;
pub mod lower;
pub mod parser;
pub mod regalloc;
pub mod symbols;
pub mod tokenizer;

mod codegen;

use std::io::Write;

use snafu::ResultExt;
use tracing::debug;

pub use config::{Backend, CompileOptions};
pub use error::{CompileError, CompileResult};
pub use parser::Program;

/// Parse a source string with the default identifier limit.
pub fn parse_source(source: &str) -> CompileResult<Program> {
  parser::parse(source, tokenizer::DEFAULT_MAX_IDENT_LEN)
}

/// Compile a source string into AT&T assembly with the full register pool.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  codegen::generate(&parse_source(source)?, regalloc::MAX_REGISTERS)
}

/// Compile a source string into the basic-block IR.
pub fn generate_ir(source: &str) -> CompileResult<ir::Module> {
  lower::lower(&parse_source(source)?)
}

/// Run a source string through the tree-walking interpreter.
pub fn interpret<W: Write>(source: &str, out: &mut W) -> CompileResult<()> {
  interpreter::interpret(&parse_source(source)?, out)
}

/// Run the whole pipeline with `options`, writing whatever the selected
/// backend produces to `out`.
pub fn compile<W: Write>(source: &str, options: &CompileOptions, out: &mut W) -> CompileResult<()> {
  debug!(backend = ?options.backend, "compiling");
  options.validate()?;

  let parse = || parser::parse(source, options.max_ident_len);
  match options.backend {
    Backend::Tokens => {
      for token in tokenizer::tokenize(source, options.max_ident_len)? {
        writeln!(out, "Token {token}").context(error::OutputSnafu)?;
      }
      Ok(())
    }
    Backend::Interpret => interpreter::interpret(&parse()?, out),
    Backend::Asm => {
      let asm = codegen::generate(&parse()?, options.registers)?;
      out.write_all(asm.as_bytes()).context(error::OutputSnafu)
    }
    Backend::Ir => {
      let module = lower::lower(&parse()?)?;
      write!(out, "{module}").context(error::OutputSnafu)
    }
  }
}
