//! Basic-block intermediate representation.
//!
//! A [`Module`] is the body of `main`: a list of blocks, each holding
//! straight-line instructions and exactly one terminator. Comparisons produce
//! an `i1` that branches consume as-is; only a comparison used as a value is
//! widened with [`Inst::ZeroExtend`]. `Display` renders the module as textual
//! LLVM IR for an external code generator, and [`Module::run`] executes it
//! directly. Globals keep their source names here and are rendered under
//! their link names.

use std::fmt;
use std::io::Write;

use snafu::ResultExt;

use crate::error::{CompileResult, OutputSnafu};
use crate::interpreter::arith;
use crate::parser::{ArithOp, CompareOp};
use crate::symbols::{SymbolId, link_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
  Const(i64),
  Value(ValueId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
  Load {
    dest: ValueId,
    global: SymbolId,
  },
  Store {
    global: SymbolId,
    src: Operand,
  },
  Binary {
    dest: ValueId,
    op: ArithOp,
    lhs: Operand,
    rhs: Operand,
  },
  /// Yields an `i1`.
  Compare {
    dest: ValueId,
    op: CompareOp,
    lhs: Operand,
    rhs: Operand,
  },
  /// Widens an `i1` to a 0/1 `i64`.
  ZeroExtend {
    dest: ValueId,
    src: ValueId,
  },
  Print {
    src: Operand,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
  Jump(BlockId),
  Branch {
    cond: ValueId,
    then_block: BlockId,
    else_block: BlockId,
  },
  Return(i64),
}

impl Terminator {
  pub fn successors(&self) -> Vec<BlockId> {
    match *self {
      Self::Jump(target) => vec![target],
      Self::Branch {
        then_block,
        else_block,
        ..
      } => vec![then_block, else_block],
      Self::Return(_) => Vec::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
  pub label: String,
  pub insts: Vec<Inst>,
  pub terminator: Terminator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
  /// Global names indexed by [`SymbolId`].
  pub globals: Vec<String>,
  /// `blocks[0]` is the entry block.
  pub blocks: Vec<Block>,
  pub value_count: usize,
}

impl Module {
  pub fn block(&self, id: BlockId) -> &Block {
    &self.blocks[id.0]
  }

  fn global(&self, id: SymbolId) -> String {
    link_name(&self.globals[id.index()])
  }

  fn label(&self, id: BlockId) -> &str {
    &self.block(id).label
  }

  /// Blocks reachable from the entry block, in discovery order.
  pub fn reachable(&self) -> Vec<BlockId> {
    let mut seen = vec![false; self.blocks.len()];
    let mut order = Vec::new();
    let mut stack = vec![BlockId(0)];
    while let Some(id) = stack.pop() {
      if std::mem::replace(&mut seen[id.0], true) {
        continue;
      }
      order.push(id);
      let mut next = self.block(id).terminator.successors();
      next.reverse();
      stack.extend(next);
    }
    order
  }

  /// Execute the module, writing printed values to `out`. Returns the exit
  /// code of the final `ret`.
  pub fn run<W: Write>(&self, out: &mut W) -> CompileResult<i64> {
    let mut globals = vec![0i64; self.globals.len()];
    let mut values = vec![Slot::Unset; self.value_count];
    let mut current = BlockId(0);

    loop {
      let block = self.block(current);
      for inst in &block.insts {
        match *inst {
          Inst::Load { dest, global } => values[dest.0] = Slot::Int(globals[global.index()]),
          Inst::Store { global, src } => globals[global.index()] = int(&values, src),
          Inst::Binary { dest, op, lhs, rhs } => {
            let value = arith(op, int(&values, lhs), int(&values, rhs))?;
            values[dest.0] = Slot::Int(value);
          }
          Inst::Compare { dest, op, lhs, rhs } => {
            values[dest.0] = Slot::Bool(op.holds(int(&values, lhs), int(&values, rhs)));
          }
          Inst::ZeroExtend { dest, src } => {
            values[dest.0] = Slot::Int(i64::from(flag(&values, src)));
          }
          Inst::Print { src } => {
            writeln!(out, "{}", int(&values, src)).context(OutputSnafu)?;
          }
        }
      }

      match block.terminator {
        Terminator::Jump(target) => current = target,
        Terminator::Branch {
          cond,
          then_block,
          else_block,
        } => {
          current = if flag(&values, cond) {
            then_block
          } else {
            else_block
          };
        }
        Terminator::Return(code) => {
          out.flush().context(OutputSnafu)?;
          return Ok(code);
        }
      }
    }
  }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
  Unset,
  Int(i64),
  Bool(bool),
}

/// Instructions are emitted in dominance order by the lowering, so every
/// operand read here has been written. A mistyped read is a lowering bug.
fn int(values: &[Slot], operand: Operand) -> i64 {
  match operand {
    Operand::Const(value) => value,
    Operand::Value(id) => match values[id.0] {
      Slot::Int(value) => value,
      slot => unreachable!("%t{} read as i64 but holds {slot:?}", id.0),
    },
  }
}

fn flag(values: &[Slot], id: ValueId) -> bool {
  match values[id.0] {
    Slot::Bool(flag) => flag,
    slot => unreachable!("%t{} read as i1 but holds {slot:?}", id.0),
  }
}

impl fmt::Display for ValueId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "%t{}", self.0)
  }
}

impl fmt::Display for Operand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Const(value) => write!(f, "{value}"),
      Self::Value(id) => write!(f, "{id}"),
    }
  }
}

fn arith_mnemonic(op: ArithOp) -> &'static str {
  match op {
    ArithOp::Add => "add",
    ArithOp::Sub => "sub",
    ArithOp::Mul => "mul",
    ArithOp::Div => "sdiv",
  }
}

fn predicate(op: CompareOp) -> &'static str {
  match op {
    CompareOp::Eq => "eq",
    CompareOp::Ne => "ne",
    CompareOp::Lt => "slt",
    CompareOp::Gt => "sgt",
    CompareOp::Le => "sle",
    CompareOp::Ge => "sge",
  }
}

struct Listing<'a> {
  module: &'a Module,
  inst: &'a Inst,
}

impl fmt::Display for Listing<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let module = self.module;
    match *self.inst {
      Inst::Load { dest, global } => write!(f, "{dest} = load i64, ptr @{}", module.global(global)),
      Inst::Store { global, src } => write!(f, "store i64 {src}, ptr @{}", module.global(global)),
      Inst::Binary { dest, op, lhs, rhs } => {
        write!(f, "{dest} = {} i64 {lhs}, {rhs}", arith_mnemonic(op))
      }
      Inst::Compare { dest, op, lhs, rhs } => {
        write!(f, "{dest} = icmp {} i64 {lhs}, {rhs}", predicate(op))
      }
      Inst::ZeroExtend { dest, src } => write!(f, "{dest} = zext i1 {src} to i64"),
      Inst::Print { src } => write!(f, "call i32 (ptr, ...) @printf(ptr @.fmt, i64 {src})"),
    }
  }
}

impl fmt::Display for Module {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for name in &self.globals {
      writeln!(f, "@{} = global i64 0", link_name(name))?;
    }
    writeln!(
      f,
      "@.fmt = private unnamed_addr constant [5 x i8] c\"%ld\\0A\\00\""
    )?;
    writeln!(f)?;
    writeln!(f, "declare i32 @printf(ptr, ...)")?;
    writeln!(f)?;
    writeln!(f, "define i32 @main() {{")?;
    for block in &self.blocks {
      writeln!(f, "{}:", block.label)?;
      for inst in &block.insts {
        writeln!(f, "  {}", Listing { module: self, inst })?;
      }
      match block.terminator {
        Terminator::Jump(target) => writeln!(f, "  br label %{}", self.label(target))?,
        Terminator::Branch {
          cond,
          then_block,
          else_block,
        } => writeln!(
          f,
          "  br i1 {cond}, label %{}, label %{}",
          self.label(then_block),
          self.label(else_block)
        )?,
        Terminator::Return(code) => writeln!(f, "  ret i32 {code}")?,
      }
    }
    writeln!(f, "}}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn module() -> Module {
    // if (x < 3) { print x; }  with x preloaded to 2
    let x = crate::symbols::SymbolTable::new().declare("x");
    Module {
      globals: vec!["x".into()],
      blocks: vec![
        Block {
          label: "entry".into(),
          insts: vec![
            Inst::Store {
              global: x,
              src: Operand::Const(2),
            },
            Inst::Load {
              dest: ValueId(0),
              global: x,
            },
            Inst::Compare {
              dest: ValueId(1),
              op: CompareOp::Lt,
              lhs: Operand::Value(ValueId(0)),
              rhs: Operand::Const(3),
            },
          ],
          terminator: Terminator::Branch {
            cond: ValueId(1),
            then_block: BlockId(1),
            else_block: BlockId(2),
          },
        },
        Block {
          label: "L1".into(),
          insts: vec![Inst::Print {
            src: Operand::Value(ValueId(0)),
          }],
          terminator: Terminator::Jump(BlockId(2)),
        },
        Block {
          label: "L2".into(),
          insts: Vec::new(),
          terminator: Terminator::Return(0),
        },
      ],
      value_count: 2,
    }
  }

  #[test]
  fn renders_llvm_text() {
    let text = module().to_string();
    assert!(text.starts_with("@v.x = global i64 0\n"));
    assert!(text.contains("declare i32 @printf(ptr, ...)\n"));
    assert!(text.contains("define i32 @main() {\nentry:\n"));
    assert!(text.contains("  store i64 2, ptr @v.x\n"));
    assert!(text.contains("  %t0 = load i64, ptr @v.x\n"));
    assert!(text.contains("  %t1 = icmp slt i64 %t0, 3\n"));
    assert!(text.contains("  br i1 %t1, label %L1, label %L2\n"));
    assert!(text.contains("L1:\n  call i32 (ptr, ...) @printf(ptr @.fmt, i64 %t0)\n  br label %L2\n"));
    assert!(text.ends_with("L2:\n  ret i32 0\n}\n"));
  }

  #[test]
  fn globals_named_like_runtime_functions_stay_distinct() {
    let mut module = module();
    module.globals = vec!["printf".into()];
    let text = module.to_string();
    assert!(text.starts_with("@v.printf = global i64 0\n"));
    assert_eq!(text.matches("@printf(").count(), 2);
    assert!(text.contains("  %t0 = load i64, ptr @v.printf\n"));
  }

  #[test]
  fn runs_blocks_following_branches() {
    let mut out = Vec::new();
    assert_eq!(module().run(&mut out).unwrap(), 0);
    assert_eq!(out, b"2\n");
  }

  #[test]
  fn reachability_follows_terminators() {
    let mut module = module();
    assert_eq!(module.reachable(), vec![BlockId(0), BlockId(1), BlockId(2)]);

    module.blocks[0].terminator = Terminator::Jump(BlockId(2));
    assert_eq!(module.reachable(), vec![BlockId(0), BlockId(2)]);
  }
}
