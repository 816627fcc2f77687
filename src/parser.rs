//! Single-pass parser producing the statement tree and the global symbols.
//!
//! Statements are handled by recursive descent; expressions use precedence
//! climbing driven by [`BinaryOp::precedence`]. Declarations go straight into
//! the symbol table while parsing, so a use before its `int` line is an error.

use std::fmt;

use tracing::debug;

use crate::error::{
  BadComparisonSnafu, CompileResult, ExpectedSnafu, UndeclaredSnafu, UnexpectedTokenSnafu,
};
use crate::symbols::{SymbolId, SymbolTable};
use crate::tokenizer::{Lexer, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
  Add,
  Sub,
  Mul,
  Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
  Eq,
  Ne,
  Lt,
  Gt,
  Le,
  Ge,
}

impl CompareOp {
  pub fn holds(self, lhs: i64, rhs: i64) -> bool {
    match self {
      Self::Eq => lhs == rhs,
      Self::Ne => lhs != rhs,
      Self::Lt => lhs < rhs,
      Self::Gt => lhs > rhs,
      Self::Le => lhs <= rhs,
      Self::Ge => lhs >= rhs,
    }
  }
}

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Arith(ArithOp),
  Compare(CompareOp),
}

impl BinaryOp {
  fn from_token(kind: TokenKind) -> Option<Self> {
    let op = match kind {
      TokenKind::Plus => Self::Arith(ArithOp::Add),
      TokenKind::Minus => Self::Arith(ArithOp::Sub),
      TokenKind::Star => Self::Arith(ArithOp::Mul),
      TokenKind::Slash => Self::Arith(ArithOp::Div),
      TokenKind::EqEq => Self::Compare(CompareOp::Eq),
      TokenKind::NotEq => Self::Compare(CompareOp::Ne),
      TokenKind::Lt => Self::Compare(CompareOp::Lt),
      TokenKind::Gt => Self::Compare(CompareOp::Gt),
      TokenKind::Le => Self::Compare(CompareOp::Le),
      TokenKind::Ge => Self::Compare(CompareOp::Ge),
      _ => return None,
    };
    Some(op)
  }

  /// Binding strength. Equality sits below the arithmetic operators and the
  /// relational operators bind loosest of all.
  pub fn precedence(self) -> u8 {
    match self {
      Self::Arith(ArithOp::Mul | ArithOp::Div) => 20,
      Self::Arith(ArithOp::Add | ArithOp::Sub) => 10,
      Self::Compare(CompareOp::Eq | CompareOp::Ne) => 6,
      Self::Compare(_) => 4,
    }
  }
}

impl fmt::Display for BinaryOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let symbol = match self {
      Self::Arith(ArithOp::Add) => "+",
      Self::Arith(ArithOp::Sub) => "-",
      Self::Arith(ArithOp::Mul) => "*",
      Self::Arith(ArithOp::Div) => "/",
      Self::Compare(CompareOp::Eq) => "==",
      Self::Compare(CompareOp::Ne) => "!=",
      Self::Compare(CompareOp::Lt) => "<",
      Self::Compare(CompareOp::Gt) => ">",
      Self::Compare(CompareOp::Le) => "<=",
      Self::Compare(CompareOp::Ge) => ">=",
    };
    f.write_str(symbol)
  }
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
  Num {
    value: i64,
  },
  Var {
    symbol: SymbolId,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
}

impl AstNode {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn var(symbol: SymbolId) -> Self {
    Self::Var { symbol }
  }

  pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }
}

/// The comparison guarding an `if`. Any other expression shape is rejected
/// while parsing, so backends can branch on it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
  pub op: CompareOp,
  pub lhs: AstNode,
  pub rhs: AstNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
  Print {
    expr: AstNode,
  },
  Assign {
    value: AstNode,
    target: SymbolId,
  },
  If {
    cond: Condition,
    then_branch: Option<Box<Stmt>>,
    else_branch: Option<Box<Stmt>>,
  },
  /// Sequencing: run `first`, then `second`.
  Glue {
    first: Box<Stmt>,
    second: Box<Stmt>,
  },
}

/// Append `stmt` to a statement list, keeping the chain left-leaning.
fn glue(list: Option<Stmt>, stmt: Stmt) -> Stmt {
  match list {
    None => stmt,
    Some(first) => Stmt::Glue {
      first: Box::new(first),
      second: Box::new(stmt),
    },
  }
}

/// A parsed compilation unit: the statement tree and every declared global.
#[derive(Debug, Clone)]
pub struct Program {
  pub body: Option<Stmt>,
  pub globals: SymbolTable,
}

/// Parse a whole source file.
pub fn parse(source: &str, max_ident_len: usize) -> CompileResult<Program> {
  let mut parser = Parser::new(Lexer::new(source, max_ident_len));
  parser.lexer.scan()?;

  let mut body = None;
  while parser.kind() != TokenKind::Eof {
    if let Some(stmt) = parser.statement()? {
      body = Some(glue(body, stmt));
    }
  }

  debug!(globals = parser.symbols.len(), "parsed program");
  Ok(Program {
    body,
    globals: parser.symbols,
  })
}

struct Parser<'a> {
  lexer: Lexer<'a>,
  symbols: SymbolTable,
}

impl<'a> Parser<'a> {
  fn new(lexer: Lexer<'a>) -> Self {
    Self {
      lexer,
      symbols: SymbolTable::new(),
    }
  }

  fn kind(&self) -> TokenKind {
    self.lexer.token().kind
  }

  fn line(&self) -> usize {
    self.lexer.token().line
  }

  /// Consume the current token if it has the given kind.
  fn equal(&mut self, kind: TokenKind) -> CompileResult<bool> {
    if self.kind() == kind {
      self.lexer.scan()?;
      return Ok(true);
    }
    Ok(false)
  }

  fn skip(&mut self, kind: TokenKind) -> CompileResult<()> {
    if self.equal(kind)? {
      Ok(())
    } else {
      ExpectedSnafu {
        expected: kind.to_string(),
        line: self.line(),
      }
      .fail()
    }
  }

  /// Consume an identifier token and return its text.
  fn get_ident(&mut self) -> CompileResult<String> {
    let token = self.lexer.token();
    let Some(name) = token.text.clone().filter(|_| token.kind == TokenKind::Ident) else {
      return ExpectedSnafu {
        expected: "identifier",
        line: token.line,
      }
      .fail();
    };
    self.lexer.scan()?;
    Ok(name)
  }

  fn resolve(&self, name: &str, line: usize) -> CompileResult<SymbolId> {
    match self.symbols.lookup(name) {
      Some(id) => Ok(id),
      None => UndeclaredSnafu { name, line }.fail(),
    }
  }

  /// Returns `None` for declarations, which only touch the symbol table.
  fn statement(&mut self) -> CompileResult<Option<Stmt>> {
    match self.kind() {
      TokenKind::Print => self.print_statement().map(Some),
      TokenKind::Int => {
        self.declaration()?;
        Ok(None)
      }
      TokenKind::Ident => self.assignment().map(Some),
      TokenKind::If => self.if_statement().map(Some),
      _ => UnexpectedTokenSnafu {
        token: self.lexer.token().to_string(),
        line: self.line(),
      }
      .fail(),
    }
  }

  fn print_statement(&mut self) -> CompileResult<Stmt> {
    self.skip(TokenKind::Print)?;
    let expr = self.binexpr(0)?;
    self.skip(TokenKind::Semi)?;
    Ok(Stmt::Print { expr })
  }

  fn declaration(&mut self) -> CompileResult<()> {
    self.skip(TokenKind::Int)?;
    let name = self.get_ident()?;
    let id = self.symbols.declare(&name);
    debug!(%name, slot = id.index(), "declared global");
    self.skip(TokenKind::Semi)
  }

  fn assignment(&mut self) -> CompileResult<Stmt> {
    let line = self.line();
    let name = self.get_ident()?;
    let target = self.resolve(&name, line)?;
    self.skip(TokenKind::Assign)?;
    let value = self.binexpr(0)?;
    self.skip(TokenKind::Semi)?;
    Ok(Stmt::Assign { value, target })
  }

  fn if_statement(&mut self) -> CompileResult<Stmt> {
    self.skip(TokenKind::If)?;
    self.skip(TokenKind::LParen)?;
    let line = self.line();
    let cond = match self.binexpr(0)? {
      AstNode::Binary {
        op: BinaryOp::Compare(op),
        lhs,
        rhs,
      } => Condition {
        op,
        lhs: *lhs,
        rhs: *rhs,
      },
      _ => return BadComparisonSnafu { line }.fail(),
    };
    self.skip(TokenKind::RParen)?;

    let then_branch = self.statement_list()?.map(Box::new);
    let else_branch = if self.equal(TokenKind::Else)? {
      self.statement_list()?.map(Box::new)
    } else {
      None
    };

    Ok(Stmt::If {
      cond,
      then_branch,
      else_branch,
    })
  }

  fn statement_list(&mut self) -> CompileResult<Option<Stmt>> {
    self.skip(TokenKind::LBrace)?;
    let mut list = None;
    while !self.equal(TokenKind::RBrace)? {
      if self.kind() == TokenKind::Eof {
        return ExpectedSnafu {
          expected: "}",
          line: self.line(),
        }
        .fail();
      }
      if let Some(stmt) = self.statement()? {
        list = Some(glue(list, stmt));
      }
    }
    Ok(list)
  }

  /// Precedence climbing: keep folding operators that bind tighter than
  /// `min_prec`, parsing each right operand at the operator's own level.
  fn binexpr(&mut self, min_prec: u8) -> CompileResult<AstNode> {
    let mut lhs = self.primary()?;

    while let Some(op) = BinaryOp::from_token(self.kind()) {
      if op.precedence() <= min_prec {
        break;
      }
      self.lexer.scan()?;
      let rhs = self.binexpr(op.precedence())?;
      lhs = AstNode::binary(op, lhs, rhs);
    }

    Ok(lhs)
  }

  fn primary(&mut self) -> CompileResult<AstNode> {
    let token = self.lexer.token();
    match (token.kind, token.value) {
      (TokenKind::IntLit, Some(value)) => {
        self.lexer.scan()?;
        Ok(AstNode::number(value))
      }
      (TokenKind::Ident, _) => {
        let line = token.line;
        let name = self.get_ident()?;
        Ok(AstNode::var(self.resolve(&name, line)?))
      }
      _ => UnexpectedTokenSnafu {
        token: token.to_string(),
        line: token.line,
      }
      .fail(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CompileError;

  const ADD: BinaryOp = BinaryOp::Arith(ArithOp::Add);
  const SUB: BinaryOp = BinaryOp::Arith(ArithOp::Sub);
  const MUL: BinaryOp = BinaryOp::Arith(ArithOp::Mul);

  fn parse_ok(source: &str) -> Program {
    parse(source, 512).unwrap()
  }

  fn printed_expr(source: &str) -> AstNode {
    match parse_ok(source).body {
      Some(Stmt::Print { expr }) => expr,
      other => panic!("expected a single print, got {other:?}"),
    }
  }

  fn num(value: i64) -> AstNode {
    AstNode::number(value)
  }

  #[test]
  fn multiplication_binds_tighter() {
    assert_eq!(
      printed_expr("print 2 + 3 * 4;"),
      AstNode::binary(ADD, num(2), AstNode::binary(MUL, num(3), num(4)))
    );
    assert_eq!(
      printed_expr("print 2 * 3 + 4;"),
      AstNode::binary(ADD, AstNode::binary(MUL, num(2), num(3)), num(4))
    );
  }

  #[test]
  fn equal_precedence_is_left_associative() {
    assert_eq!(
      printed_expr("print 10 - 3 - 2;"),
      AstNode::binary(SUB, AstNode::binary(SUB, num(10), num(3)), num(2))
    );
  }

  #[test]
  fn relational_binds_loosest() {
    let lt = BinaryOp::Compare(CompareOp::Lt);
    let eq = BinaryOp::Compare(CompareOp::Eq);
    assert_eq!(
      printed_expr("print 1 < 2 == 2 + 1;"),
      AstNode::binary(
        lt,
        num(1),
        AstNode::binary(eq, num(2), AstNode::binary(ADD, num(2), num(1)))
      )
    );
  }

  #[test]
  fn declarations_produce_no_nodes() {
    let program = parse_ok("int x; int y;");
    assert!(program.body.is_none());
    assert_eq!(program.globals.len(), 2);
  }

  #[test]
  fn assignment_resolves_target() {
    let program = parse_ok("int x;\nint y;\ny = x + 1;");
    let y = program.globals.lookup("y").unwrap();
    let x = program.globals.lookup("x").unwrap();
    assert_eq!(
      program.body,
      Some(Stmt::Assign {
        value: AstNode::binary(ADD, AstNode::var(x), num(1)),
        target: y,
      })
    );
  }

  #[test]
  fn statements_chain_left_leaning() {
    let program = parse_ok("print 1; print 2; int z; print 3;");
    let Some(Stmt::Glue { first, second }) = &program.body else {
      panic!("expected glue, got {:?}", program.body);
    };
    assert_eq!(**second, Stmt::Print { expr: num(3) });
    assert_eq!(
      **first,
      Stmt::Glue {
        first: Box::new(Stmt::Print { expr: num(1) }),
        second: Box::new(Stmt::Print { expr: num(2) }),
      }
    );
  }

  #[test]
  fn redeclaration_reuses_the_same_variable() {
    let program = parse_ok("int x;\nx = 1;\nint x;\nprint x;");
    assert_eq!(program.globals.len(), 1);
    let x = program.globals.lookup("x").unwrap();
    assert_eq!(
      program.body,
      Some(Stmt::Glue {
        first: Box::new(Stmt::Assign {
          value: num(1),
          target: x,
        }),
        second: Box::new(Stmt::Print {
          expr: AstNode::var(x),
        }),
      })
    );
  }

  #[test]
  fn if_with_and_without_else() {
    let program = parse_ok("if (1 < 2) { print 1; } else { print 2; }");
    let Some(Stmt::If {
      cond,
      then_branch,
      else_branch,
    }) = program.body
    else {
      panic!("expected if");
    };
    assert_eq!(cond.op, CompareOp::Lt);
    assert_eq!(then_branch.as_deref(), Some(&Stmt::Print { expr: num(1) }));
    assert_eq!(else_branch.as_deref(), Some(&Stmt::Print { expr: num(2) }));

    let program = parse_ok("if (1 >= 2) { print 1; }");
    assert!(matches!(
      program.body,
      Some(Stmt::If {
        else_branch: None,
        ..
      })
    ));
  }

  #[test]
  fn empty_blocks_are_allowed() {
    let program = parse_ok("if (1 == 1) { } else { }");
    assert!(matches!(
      program.body,
      Some(Stmt::If {
        then_branch: None,
        else_branch: None,
        ..
      })
    ));
  }

  #[test]
  fn if_condition_must_compare() {
    let err = parse("int x;\nif (x + 1) { print x; }", 512).unwrap_err();
    assert!(matches!(err, CompileError::BadComparison { line: 2 }));
  }

  #[test]
  fn undeclared_use_and_assignment() {
    let err = parse("int a;\nprint a;\nprint b;", 512).unwrap_err();
    match err {
      CompileError::Undeclared { name, line } => {
        assert_eq!(name, "b");
        assert_eq!(line, 3);
      }
      other => panic!("unexpected {other:?}"),
    }

    let err = parse("\n\nq = 4;", 512).unwrap_err();
    assert!(matches!(
      err,
      CompileError::Undeclared { ref name, line: 3 } if name == "q"
    ));
  }

  #[test]
  fn missing_tokens_are_fatal() {
    let err = parse("print 1", 512).unwrap_err();
    assert_eq!(err.to_string(), "; expected on line 1");

    let err = parse("if (1 < 2) print 1;", 512).unwrap_err();
    assert_eq!(err.to_string(), "{ expected on line 1");

    let err = parse("if (1 < 2) { print 1;", 512).unwrap_err();
    assert_eq!(err.to_string(), "} expected on line 1");

    let err = parse("int x; x 5;", 512).unwrap_err();
    assert_eq!(err.to_string(), "= expected on line 1");

    let err = parse("int 5;", 512).unwrap_err();
    assert_eq!(err.to_string(), "identifier expected on line 1");
  }

  #[test]
  fn unknown_statement_start() {
    let err = parse("print 1;\n+ 2;", 512).unwrap_err();
    assert_eq!(err.to_string(), "Syntax error, token + on line 2");
  }

  #[test]
  fn first_error_wins() {
    let err = parse("print y;\nprint $;", 512).unwrap_err();
    assert!(matches!(err, CompileError::Undeclared { line: 1, .. }));
  }
}
