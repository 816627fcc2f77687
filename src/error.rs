//! Shared error type used across the compilation pipeline.
//!
//! Every stage fails fast: the first problem found is returned to the caller
//! and nothing after it is attempted. Source-level diagnostics follow the
//! `<message> on line <n>` shape; backend failures carry no line because the
//! AST does not keep positions.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("Unrecognised character {ch:?} on line {line}"))]
  UnrecognisedChar { ch: char, line: usize },

  #[snafu(display("Identifier longer than {max} characters on line {line}"))]
  IdentTooLong { max: usize, line: usize },

  #[snafu(display("Integer literal too large on line {line}"))]
  IntTooLarge { line: usize },

  #[snafu(display("{expected} expected on line {line}"))]
  Expected { expected: String, line: usize },

  #[snafu(display("Bad comparison operator on line {line}"))]
  BadComparison { line: usize },

  #[snafu(display("Syntax error, token {token} on line {line}"))]
  UnexpectedToken { token: String, line: usize },

  #[snafu(display("Undeclared variable {name} on line {line}"))]
  Undeclared { name: String, line: usize },

  #[snafu(display("Out of registers"))]
  OutOfRegisters,

  #[snafu(display("Error trying to free register {register}"))]
  DoubleFree { register: String },

  #[snafu(display("Register pool must hold between 1 and {max} registers, got {requested}"))]
  RegisterCount { requested: usize, max: usize },

  #[snafu(display("Division by zero"))]
  DivisionByZero,

  #[snafu(display("Integer overflow in division"))]
  DivisionOverflow,

  #[snafu(display("Internal error: block {label} has no terminator"))]
  UnterminatedBlock { label: String },

  #[snafu(display("Failed to write program output: {source}"))]
  Output { source: std::io::Error },
}

impl CompileError {
  /// Source line the error was detected on, if it came from the front end.
  pub fn line(&self) -> Option<usize> {
    match self {
      Self::UnrecognisedChar { line, .. }
      | Self::IdentTooLong { line, .. }
      | Self::IntTooLarge { line }
      | Self::Expected { line, .. }
      | Self::BadComparison { line }
      | Self::UnexpectedToken { line, .. }
      | Self::Undeclared { line, .. } => Some(*line),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn diagnostics_name_the_line() {
    let err = CompileError::Undeclared {
      name: "total".into(),
      line: 7,
    };
    assert_eq!(err.to_string(), "Undeclared variable total on line 7");
    assert_eq!(err.line(), Some(7));
  }

  #[test]
  fn backend_errors_have_no_line() {
    assert_eq!(CompileError::OutOfRegisters.line(), None);
    assert_eq!(CompileError::OutOfRegisters.to_string(), "Out of registers");
  }
}
