//! Code generation: lower the parsed program into AT&T x86-64 assembly.
//!
//! Every expression value lives in a scratch register taken from a small
//! fixed pool. Operands are evaluated left to right; a binary operation keeps
//! one operand register for its result and frees the other, so register
//! pressure tracks expression depth rather than size. Globals are `.comm`
//! cells under their link names, addressed relative to `%rip` and laid out in
//! declaration order. Branch targets are assembler-local `.L` labels.

use tracing::debug;

use crate::error::CompileResult;
use crate::parser::{ArithOp, AstNode, BinaryOp, CompareOp, Condition, Program, Stmt};
use crate::regalloc::{Reg, RegisterPool};
use crate::symbols::{SymbolId, SymbolTable, link_name};

const PREAMBLE: &str = "    .text
.LC0:
    .string \"%ld\\n\"
printint:
    pushq %rbp
    movq %rsp, %rbp
    subq $16, %rsp
    movq %rdi, %rsi
    leaq .LC0(%rip), %rdi
    movl $0, %eax
    call printf@PLT
    leave
    ret

";

/// Emit assembly for a whole program using a pool of `registers` registers.
pub fn generate(program: &Program, registers: usize) -> CompileResult<String> {
  let mut codegen = CodeGen {
    asm: String::new(),
    regs: RegisterPool::new(registers)?,
    labels: 0,
    globals: &program.globals,
  };

  codegen.asm.push_str(PREAMBLE);
  for symbol in program.globals.iter() {
    codegen.emit(&format!(".comm {},8,8", link_name(&symbol.name)));
  }
  codegen.emit(".globl main");
  codegen.emit(".type main, @function");
  codegen.asm.push_str("main:\n");
  codegen.emit("pushq %rbp");
  codegen.emit("movq %rsp, %rbp");

  if let Some(body) = &program.body {
    codegen.emit_stmt(body)?;
  }

  codegen.emit("movl $0, %eax");
  codegen.emit("popq %rbp");
  codegen.emit("ret");
  codegen.emit(".section .note.GNU-stack,\"\",@progbits");

  debug!(
    bytes = codegen.asm.len(),
    labels = codegen.labels,
    "generated assembly"
  );
  Ok(codegen.asm)
}

struct CodeGen<'a> {
  asm: String,
  regs: RegisterPool,
  labels: usize,
  globals: &'a SymbolTable,
}

impl CodeGen<'_> {
  fn emit(&mut self, instr: &str) {
    self.asm.push_str("    ");
    self.asm.push_str(instr);
    self.asm.push('\n');
  }

  fn new_label(&mut self) -> String {
    self.labels += 1;
    format!(".L{}", self.labels)
  }

  fn place_label(&mut self, label: &str) {
    self.asm.push_str(label);
    self.asm.push_str(":\n");
  }

  fn global(&self, id: SymbolId) -> String {
    link_name(self.globals.name(id))
  }

  fn emit_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Print { expr } => {
        let reg = self.emit_expr(expr)?;
        self.emit(&format!("movq {}, %rdi", reg.name()));
        self.emit("call printint");
        self.regs.free(reg)?;
        debug_assert_eq!(self.regs.in_use(), 0, "register leaked by print");
        Ok(())
      }
      Stmt::Assign { value, target } => {
        let reg = self.emit_expr(value)?;
        let store = format!("movq {}, {}(%rip)", reg.name(), self.global(*target));
        self.emit(&store);
        self.regs.free(reg)?;
        debug_assert_eq!(self.regs.in_use(), 0, "register leaked by assignment");
        Ok(())
      }
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        let false_label = self.new_label();
        let end_label = else_branch.as_ref().map(|_| self.new_label());

        self.emit_jump_unless(cond, &false_label)?;
        if let Some(then_branch) = then_branch {
          self.emit_stmt(then_branch)?;
        }

        match (else_branch, end_label) {
          (Some(else_branch), Some(end_label)) => {
            self.emit(&format!("jmp {end_label}"));
            self.place_label(&false_label);
            self.emit_stmt(else_branch)?;
            self.place_label(&end_label);
          }
          _ => self.place_label(&false_label),
        }
        Ok(())
      }
      Stmt::Glue { first, second } => {
        self.emit_stmt(first)?;
        self.emit_stmt(second)
      }
    }
  }

  /// Compare and jump to `label` when the condition does not hold. The
  /// comparison result stays in the flags and never reaches a register.
  fn emit_jump_unless(&mut self, cond: &Condition, label: &str) -> CompileResult<()> {
    let lhs = self.emit_expr(&cond.lhs)?;
    let rhs = self.emit_expr(&cond.rhs)?;
    self.emit(&format!("cmpq {}, {}", rhs.name(), lhs.name()));
    let jump = match cond.op {
      CompareOp::Eq => "jne",
      CompareOp::Ne => "je",
      CompareOp::Lt => "jge",
      CompareOp::Gt => "jle",
      CompareOp::Le => "jg",
      CompareOp::Ge => "jl",
    };
    self.emit(&format!("{jump} {label}"));
    self.regs.free(lhs)?;
    self.regs.free(rhs)
  }

  fn emit_expr(&mut self, node: &AstNode) -> CompileResult<Reg> {
    match node {
      AstNode::Num { value } => {
        let reg = self.regs.allocate()?;
        let mov = if i32::try_from(*value).is_ok() {
          "movq"
        } else {
          "movabsq"
        };
        self.emit(&format!("{mov} ${value}, {}", reg.name()));
        Ok(reg)
      }
      AstNode::Var { symbol } => {
        let reg = self.regs.allocate()?;
        let load = format!("movq {}(%rip), {}", self.global(*symbol), reg.name());
        self.emit(&load);
        Ok(reg)
      }
      AstNode::Binary { op, lhs, rhs } => {
        let lhs = self.emit_expr(lhs)?;
        let rhs = self.emit_expr(rhs)?;
        match op {
          BinaryOp::Arith(op) => self.emit_arith(*op, lhs, rhs),
          BinaryOp::Compare(op) => self.emit_compare(*op, lhs, rhs),
        }
      }
    }
  }

  fn emit_arith(&mut self, op: ArithOp, lhs: Reg, rhs: Reg) -> CompileResult<Reg> {
    match op {
      ArithOp::Add => {
        self.emit(&format!("addq {}, {}", lhs.name(), rhs.name()));
        self.regs.free(lhs)?;
        Ok(rhs)
      }
      ArithOp::Sub => {
        self.emit(&format!("subq {}, {}", rhs.name(), lhs.name()));
        self.regs.free(rhs)?;
        Ok(lhs)
      }
      ArithOp::Mul => {
        self.emit(&format!("imulq {}, {}", lhs.name(), rhs.name()));
        self.regs.free(lhs)?;
        Ok(rhs)
      }
      ArithOp::Div => {
        self.emit(&format!("movq {}, %rax", lhs.name()));
        self.emit("cqo");
        self.emit(&format!("idivq {}", rhs.name()));
        self.emit(&format!("movq %rax, {}", lhs.name()));
        self.regs.free(rhs)?;
        Ok(lhs)
      }
    }
  }

  /// Comparison used as a value: widen the flag into a 0/1 integer.
  fn emit_compare(&mut self, op: CompareOp, lhs: Reg, rhs: Reg) -> CompileResult<Reg> {
    let set = match op {
      CompareOp::Eq => "sete",
      CompareOp::Ne => "setne",
      CompareOp::Lt => "setl",
      CompareOp::Gt => "setg",
      CompareOp::Le => "setle",
      CompareOp::Ge => "setge",
    };
    self.emit(&format!("cmpq {}, {}", rhs.name(), lhs.name()));
    self.emit(&format!("{set} {}", rhs.byte_name()));
    self.emit(&format!("movzbq {}, {}", rhs.byte_name(), rhs.name()));
    self.regs.free(lhs)?;
    Ok(rhs)
  }
}
