//! Tree-walking evaluator. Runs a parsed program directly and writes every
//! printed value, one per line, to the supplied sink.

use std::io::Write;

use snafu::{OptionExt, ResultExt, ensure};
use tracing::trace;

use crate::error::{CompileResult, DivisionByZeroSnafu, DivisionOverflowSnafu, OutputSnafu};
use crate::parser::{ArithOp, AstNode, BinaryOp, Program, Stmt};

/// Apply an arithmetic operator with 64-bit wrapping semantics and signed
/// division truncating toward zero. Division fails on a zero divisor and on
/// `i64::MIN / -1`, the two inputs `idivq` traps on.
pub fn arith(op: ArithOp, lhs: i64, rhs: i64) -> CompileResult<i64> {
  let value = match op {
    ArithOp::Add => lhs.wrapping_add(rhs),
    ArithOp::Sub => lhs.wrapping_sub(rhs),
    ArithOp::Mul => lhs.wrapping_mul(rhs),
    ArithOp::Div => {
      ensure!(rhs != 0, DivisionByZeroSnafu);
      lhs.checked_div(rhs).context(DivisionOverflowSnafu)?
    }
  };
  Ok(value)
}

pub fn interpret<W: Write>(program: &Program, out: &mut W) -> CompileResult<()> {
  let mut interpreter = Interpreter {
    globals: vec![0; program.globals.len()],
    out,
  };
  if let Some(body) = &program.body {
    interpreter.exec(body)?;
  }
  interpreter.out.flush().context(OutputSnafu)
}

struct Interpreter<'w, W> {
  globals: Vec<i64>,
  out: &'w mut W,
}

impl<W: Write> Interpreter<'_, W> {
  fn exec(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Print { expr } => {
        let value = self.eval(expr)?;
        writeln!(self.out, "{value}").context(OutputSnafu)
      }
      Stmt::Assign { value, target } => {
        self.globals[target.index()] = self.eval(value)?;
        Ok(())
      }
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        let lhs = self.eval(&cond.lhs)?;
        let rhs = self.eval(&cond.rhs)?;
        let branch = if cond.op.holds(lhs, rhs) {
          then_branch
        } else {
          else_branch
        };
        match branch {
          Some(stmt) => self.exec(stmt),
          None => Ok(()),
        }
      }
      Stmt::Glue { first, second } => {
        self.exec(first)?;
        self.exec(second)
      }
    }
  }

  fn eval(&mut self, node: &AstNode) -> CompileResult<i64> {
    match node {
      AstNode::Num { value } => {
        trace!("int {value}");
        Ok(*value)
      }
      AstNode::Var { symbol } => Ok(self.globals[symbol.index()]),
      AstNode::Binary { op, lhs, rhs } => {
        let left = self.eval(lhs)?;
        let right = self.eval(rhs)?;
        trace!("{left} {op} {right}");
        match op {
          BinaryOp::Arith(op) => arith(*op, left, right),
          BinaryOp::Compare(op) => Ok(i64::from(op.holds(left, right))),
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CompileError;
  use crate::parser::parse;

  fn run(source: &str) -> CompileResult<String> {
    let program = parse(source, 512)?;
    let mut out = Vec::new();
    interpret(&program, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
  }

  #[test]
  fn precedence_and_associativity() {
    assert_eq!(run("print 2 + 3 * 4;").unwrap(), "14\n");
    assert_eq!(run("print 2 * 3 + 4;").unwrap(), "10\n");
    assert_eq!(run("print 10 - 3 - 2;").unwrap(), "5\n");
    assert_eq!(run("print 100 / 10 / 5;").unwrap(), "2\n");
  }

  #[test]
  fn division_truncates_toward_zero() {
    assert_eq!(run("print 7 / 2;").unwrap(), "3\n");
    assert_eq!(run("int n; n = 0 - 7; print n / 2;").unwrap(), "-3\n");
  }

  #[test]
  fn variables_start_at_zero() {
    assert_eq!(run("int x; print x; x = 5; print x;").unwrap(), "0\n5\n");
  }

  #[test]
  fn comparisons_as_values() {
    assert_eq!(
      run("print 1 < 2; print 2 < 1; print 3 == 3; print 3 != 3; print 4 >= 4; print 4 > 4;")
        .unwrap(),
      "1\n0\n1\n0\n1\n0\n"
    );
  }

  #[test]
  fn if_else_picks_one_branch() {
    assert_eq!(run("if (1 < 2) { print 1; } else { print 2; }").unwrap(), "1\n");
    assert_eq!(run("if (2 < 1) { print 1; } else { print 2; }").unwrap(), "2\n");
    assert_eq!(run("if (2 < 1) { print 1; }").unwrap(), "");
    assert_eq!(run("if (2 < 1) { print 1; } print 3;").unwrap(), "3\n");
  }

  #[test]
  fn nested_ifs() {
    let source = "
      int a; int b;
      a = 3; b = 4;
      if (a < b) {
        if (a * 2 > b) { print a; } else { print b; }
        b = a + b;
      }
      print b;
    ";
    assert_eq!(run(source).unwrap(), "3\n7\n");
  }

  #[test]
  fn division_by_zero_is_reported() {
    let err = run("int z; print 1 / z;").unwrap_err();
    assert!(matches!(err, CompileError::DivisionByZero));
  }

  #[test]
  fn division_overflow_is_reported() {
    let err = run("int m; int n; m = 0 - 9223372036854775807 - 1; n = 0 - 1; print m / n;")
      .unwrap_err();
    assert!(matches!(err, CompileError::DivisionOverflow));
    assert_eq!(
      run("int m; m = 0 - 9223372036854775807 - 1; print m / 1;").unwrap(),
      "-9223372036854775808\n"
    );
  }

  #[test]
  fn arithmetic_wraps() {
    assert_eq!(
      run("int m; m = 9223372036854775807; print m + 1;").unwrap(),
      "-9223372036854775808\n"
    );
  }
}
