//! Lower the statement tree into basic blocks.
//!
//! An `if` ends the current block with a conditional branch, fills a block
//! per arm that jumps to a shared end block, and carries on in that end
//! block. Without an `else` the false edge goes straight to the end block.

use tracing::debug;

use crate::error::{CompileResult, UnterminatedBlockSnafu};
use crate::interpreter::arith;
use crate::ir::{Block, BlockId, Inst, Module, Operand, Terminator, ValueId};
use crate::parser::{AstNode, BinaryOp, Condition, Program, Stmt};

pub fn lower(program: &Program) -> CompileResult<Module> {
  let mut builder = IrBuilder {
    blocks: vec![PendingBlock::new("entry".to_string())],
    current: BlockId(0),
    values: 0,
    labels: 0,
  };

  if let Some(body) = &program.body {
    builder.lower_stmt(body)?;
  }
  builder.terminate(Terminator::Return(0));

  let blocks = builder
    .blocks
    .into_iter()
    .map(PendingBlock::finish)
    .collect::<CompileResult<Vec<Block>>>()?;
  debug!(blocks = blocks.len(), values = builder.values, "lowered to IR");

  Ok(Module {
    globals: program.globals.iter().map(|s| s.name.clone()).collect(),
    blocks,
    value_count: builder.values,
  })
}

struct PendingBlock {
  label: String,
  insts: Vec<Inst>,
  terminator: Option<Terminator>,
}

impl PendingBlock {
  fn new(label: String) -> Self {
    Self {
      label,
      insts: Vec::new(),
      terminator: None,
    }
  }

  fn finish(self) -> CompileResult<Block> {
    let Self {
      label,
      insts,
      terminator,
    } = self;
    let Some(terminator) = terminator else {
      return UnterminatedBlockSnafu { label }.fail();
    };
    Ok(Block {
      label,
      insts,
      terminator,
    })
  }
}

struct IrBuilder {
  blocks: Vec<PendingBlock>,
  current: BlockId,
  values: usize,
  labels: usize,
}

impl IrBuilder {
  fn new_value(&mut self) -> ValueId {
    let id = ValueId(self.values);
    self.values += 1;
    id
  }

  fn new_block(&mut self) -> BlockId {
    self.labels += 1;
    let id = BlockId(self.blocks.len());
    self.blocks.push(PendingBlock::new(format!("L{}", self.labels)));
    id
  }

  fn emit(&mut self, inst: Inst) {
    self.blocks[self.current.0].insts.push(inst);
  }

  fn terminate(&mut self, terminator: Terminator) {
    let block = &mut self.blocks[self.current.0];
    debug_assert!(block.terminator.is_none(), "block {} closed twice", block.label);
    block.terminator = Some(terminator);
  }

  fn lower_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Print { expr } => {
        let src = self.lower_expr(expr)?;
        self.emit(Inst::Print { src });
      }
      Stmt::Assign { value, target } => {
        let src = self.lower_expr(value)?;
        self.emit(Inst::Store {
          global: *target,
          src,
        });
      }
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        let then_block = self.new_block();
        let else_block = else_branch.as_ref().map(|_| self.new_block());
        let end_block = self.new_block();

        let flag = self.lower_condition(cond)?;
        self.terminate(Terminator::Branch {
          cond: flag,
          then_block,
          else_block: else_block.unwrap_or(end_block),
        });

        self.current = then_block;
        if let Some(then_branch) = then_branch {
          self.lower_stmt(then_branch)?;
        }
        self.terminate(Terminator::Jump(end_block));

        if let (Some(else_block), Some(else_branch)) = (else_block, else_branch) {
          self.current = else_block;
          self.lower_stmt(else_branch)?;
          self.terminate(Terminator::Jump(end_block));
        }

        self.current = end_block;
      }
      Stmt::Glue { first, second } => {
        self.lower_stmt(first)?;
        self.lower_stmt(second)?;
      }
    }
    Ok(())
  }

  /// The raw `i1` of an `if` condition, never widened.
  fn lower_condition(&mut self, cond: &Condition) -> CompileResult<ValueId> {
    let lhs = self.lower_expr(&cond.lhs)?;
    let rhs = self.lower_expr(&cond.rhs)?;
    let dest = self.new_value();
    self.emit(Inst::Compare {
      dest,
      op: cond.op,
      lhs,
      rhs,
    });
    Ok(dest)
  }

  fn lower_expr(&mut self, node: &AstNode) -> CompileResult<Operand> {
    match node {
      AstNode::Num { value } => Ok(Operand::Const(*value)),
      AstNode::Var { symbol } => {
        let dest = self.new_value();
        self.emit(Inst::Load {
          dest,
          global: *symbol,
        });
        Ok(Operand::Value(dest))
      }
      AstNode::Binary { op, lhs, rhs } => {
        let lhs = self.lower_expr(lhs)?;
        let rhs = self.lower_expr(rhs)?;
        match *op {
          BinaryOp::Arith(op) => {
            // Constant operands are folded the way an IR builder folds
            // constant expressions, except a zero divisor which must
            // surface at run time.
            if let (Operand::Const(l), Operand::Const(r)) = (lhs, rhs)
              && let Ok(value) = arith(op, l, r)
            {
              return Ok(Operand::Const(value));
            }
            let dest = self.new_value();
            self.emit(Inst::Binary { dest, op, lhs, rhs });
            Ok(Operand::Value(dest))
          }
          BinaryOp::Compare(op) => {
            let flag = self.new_value();
            self.emit(Inst::Compare {
              dest: flag,
              op,
              lhs,
              rhs,
            });
            let dest = self.new_value();
            self.emit(Inst::ZeroExtend { dest, src: flag });
            Ok(Operand::Value(dest))
          }
        }
      }
    }
  }
}
