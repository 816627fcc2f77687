//! Knobs for a single compilation run.

use crate::error::CompileResult;
use crate::regalloc::{self, MAX_REGISTERS};
use crate::tokenizer::DEFAULT_MAX_IDENT_LEN;

/// What the pipeline produces once the program has been parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
  /// Dump the token stream, one token per line.
  Tokens,
  /// Evaluate the tree directly and write printed values.
  Interpret,
  /// x86-64 AT&T assembly from the register allocator.
  #[default]
  Asm,
  /// Basic-block IR rendered as LLVM assembly.
  Ir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
  pub backend: Backend,
  /// Size of the register pool used by the assembly backend.
  pub registers: usize,
  pub max_ident_len: usize,
}

impl Default for CompileOptions {
  fn default() -> Self {
    Self {
      backend: Backend::default(),
      registers: MAX_REGISTERS,
      max_ident_len: DEFAULT_MAX_IDENT_LEN,
    }
  }
}

impl CompileOptions {
  pub fn with_backend(mut self, backend: Backend) -> Self {
    self.backend = backend;
    self
  }

  pub fn with_registers(mut self, registers: usize) -> Self {
    self.registers = registers;
    self
  }

  /// Checked before any backend runs, whichever one is selected.
  pub fn validate(&self) -> CompileResult<()> {
    regalloc::check_size(self.registers)
  }
}
