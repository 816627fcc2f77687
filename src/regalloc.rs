//! Fixed pool of scratch registers for the assembly backend.
//!
//! There is no spilling: running out of registers is a hard error, and so is
//! freeing a register twice.

use snafu::ensure;
use tracing::trace;

use crate::error::{CompileResult, DoubleFreeSnafu, OutOfRegistersSnafu, RegisterCountSnafu};

const NAMES: [&str; 4] = ["%r8", "%r9", "%r10", "%r11"];
const BYTE_NAMES: [&str; 4] = ["%r8b", "%r9b", "%r10b", "%r11b"];

pub const MAX_REGISTERS: usize = NAMES.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg(usize);

impl Reg {
  pub fn name(self) -> &'static str {
    NAMES[self.0]
  }

  /// Low byte, used as the target of `setCC`.
  pub fn byte_name(self) -> &'static str {
    BYTE_NAMES[self.0]
  }
}

/// Reject pool sizes outside `1..=MAX_REGISTERS`.
pub fn check_size(size: usize) -> CompileResult<()> {
  ensure!(
    (1..=MAX_REGISTERS).contains(&size),
    RegisterCountSnafu {
      requested: size,
      max: MAX_REGISTERS,
    }
  );
  Ok(())
}

#[derive(Debug)]
pub struct RegisterPool {
  free: Vec<bool>,
}

impl RegisterPool {
  pub fn new(size: usize) -> CompileResult<Self> {
    check_size(size)?;
    Ok(Self {
      free: vec![true; size],
    })
  }

  /// Hand out the lowest-numbered free register.
  pub fn allocate(&mut self) -> CompileResult<Reg> {
    let Some(index) = self.free.iter().position(|&free| free) else {
      return OutOfRegistersSnafu.fail();
    };
    self.free[index] = false;
    trace!(register = NAMES[index], "allocate");
    Ok(Reg(index))
  }

  pub fn free(&mut self, reg: Reg) -> CompileResult<()> {
    ensure!(
      !self.free[reg.0],
      DoubleFreeSnafu {
        register: reg.name(),
      }
    );
    self.free[reg.0] = true;
    trace!(register = reg.name(), "free");
    Ok(())
  }

  pub fn in_use(&self) -> usize {
    self.free.iter().filter(|&&free| !free).count()
  }
}
