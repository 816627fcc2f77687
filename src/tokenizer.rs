//! Lexical analysis: a pull-based scanner over the source text.
//!
//! The parser asks for one token at a time with [`Lexer::scan`]. A single
//! character of pushback is enough for this grammar: it ends integer literals
//! and identifiers, and lets `=`/`!`/`<`/`>` peek for a trailing `=`.

use std::fmt;
use std::str::Chars;

use snafu::ensure;

use crate::error::{
  CompileResult, IdentTooLongSnafu, IntTooLargeSnafu, UnrecognisedCharSnafu,
};

/// Identifiers longer than this are rejected unless configured otherwise.
pub const DEFAULT_MAX_IDENT_LEN: usize = 512;

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Eof,
  Plus,
  Minus,
  Star,
  Slash,
  EqEq,
  NotEq,
  Lt,
  Gt,
  Le,
  Ge,
  Assign,
  Semi,
  LBrace,
  RBrace,
  LParen,
  RParen,
  IntLit,
  Ident,
  Print,
  Int,
  If,
  Else,
}

impl TokenKind {
  fn keyword(text: &str) -> Option<Self> {
    match text {
      "print" => Some(Self::Print),
      "int" => Some(Self::Int),
      "if" => Some(Self::If),
      "else" => Some(Self::Else),
      _ => None,
    }
  }
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Self::Eof => "EOF",
      Self::Plus => "+",
      Self::Minus => "-",
      Self::Star => "*",
      Self::Slash => "/",
      Self::EqEq => "==",
      Self::NotEq => "!=",
      Self::Lt => "<",
      Self::Gt => ">",
      Self::Le => "<=",
      Self::Ge => ">=",
      Self::Assign => "=",
      Self::Semi => ";",
      Self::LBrace => "{",
      Self::RBrace => "}",
      Self::LParen => "(",
      Self::RParen => ")",
      Self::IntLit => "intlit",
      Self::Ident => "identifier",
      Self::Print => "print",
      Self::Int => "int",
      Self::If => "if",
      Self::Else => "else",
    };
    f.write_str(text)
  }
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub text: Option<String>,
  pub line: usize,
}

impl Token {
  fn new(kind: TokenKind, line: usize) -> Self {
    Self {
      kind,
      value: None,
      text: None,
      line,
    }
  }
}

/// Human-friendly description used in diagnostics and token dumps.
impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.kind, self.value, self.text.as_deref()) {
      (TokenKind::IntLit, Some(value), _) => write!(f, "intlit {value}"),
      (TokenKind::Ident, _, Some(name)) => write!(f, "identifier {name}"),
      (kind, _, _) => write!(f, "{kind}"),
    }
  }
}

pub struct Lexer<'a> {
  chars: Chars<'a>,
  putback: Option<char>,
  line: usize,
  token: Token,
  max_ident_len: usize,
}

impl<'a> Lexer<'a> {
  pub fn new(source: &'a str, max_ident_len: usize) -> Self {
    Self {
      chars: source.chars(),
      putback: None,
      line: 1,
      token: Token::new(TokenKind::Eof, 1),
      max_ident_len,
    }
  }

  /// The most recently scanned token.
  pub fn token(&self) -> &Token {
    &self.token
  }

  /// Current line of the underlying character stream.
  pub fn line(&self) -> usize {
    self.line
  }

  /// Scan the next token into [`Lexer::token`]. Returns `false` once the
  /// input is exhausted, leaving an `Eof` token behind.
  pub fn scan(&mut self) -> CompileResult<bool> {
    let Some(c) = self.skip() else {
      self.token = Token::new(TokenKind::Eof, self.line);
      return Ok(false);
    };
    let line = self.line;

    let kind = match c {
      '+' => TokenKind::Plus,
      '-' => TokenKind::Minus,
      '*' => TokenKind::Star,
      '/' => TokenKind::Slash,
      ';' => TokenKind::Semi,
      '{' => TokenKind::LBrace,
      '}' => TokenKind::RBrace,
      '(' => TokenKind::LParen,
      ')' => TokenKind::RParen,
      '=' => self.digraph(TokenKind::Assign, TokenKind::EqEq),
      '<' => self.digraph(TokenKind::Lt, TokenKind::Le),
      '>' => self.digraph(TokenKind::Gt, TokenKind::Ge),
      '!' => match self.next_char() {
        Some('=') => TokenKind::NotEq,
        other => {
          if let Some(other) = other {
            self.putback(other);
          }
          return UnrecognisedCharSnafu { ch: '!', line }.fail();
        }
      },
      c if c.is_ascii_digit() => {
        let value = self.scan_int(c)?;
        self.token = Token {
          value: Some(value),
          ..Token::new(TokenKind::IntLit, line)
        };
        return Ok(true);
      }
      c if c.is_ascii_alphabetic() || c == '_' => {
        let text = self.scan_ident(c)?;
        self.token = match TokenKind::keyword(&text) {
          Some(keyword) => Token::new(keyword, line),
          None => Token {
            text: Some(text),
            ..Token::new(TokenKind::Ident, line)
          },
        };
        return Ok(true);
      }
      ch => return UnrecognisedCharSnafu { ch, line }.fail(),
    };

    self.token = Token::new(kind, line);
    Ok(true)
  }

  fn next_char(&mut self) -> Option<char> {
    if let Some(c) = self.putback.take() {
      return Some(c);
    }
    let c = self.chars.next()?;
    if c == '\n' {
      self.line += 1;
    }
    Some(c)
  }

  fn putback(&mut self, c: char) {
    self.putback = Some(c);
  }

  fn skip(&mut self) -> Option<char> {
    loop {
      let c = self.next_char()?;
      if !matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c') {
        return Some(c);
      }
    }
  }

  /// Pick `double` when the next character is `=`, otherwise push it back.
  fn digraph(&mut self, single: TokenKind, double: TokenKind) -> TokenKind {
    match self.next_char() {
      Some('=') => double,
      Some(other) => {
        self.putback(other);
        single
      }
      None => single,
    }
  }

  fn scan_int(&mut self, first: char) -> CompileResult<i64> {
    let line = self.line;
    let mut value: i64 = 0;
    let mut c = Some(first);

    while let Some(digit) = c.and_then(|c| c.to_digit(10)) {
      value = value
        .checked_mul(10)
        .and_then(|v| v.checked_add(i64::from(digit)))
        .ok_or_else(|| IntTooLargeSnafu { line }.build())?;
      c = self.next_char();
    }

    if let Some(c) = c {
      self.putback(c);
    }
    Ok(value)
  }

  fn scan_ident(&mut self, first: char) -> CompileResult<String> {
    let line = self.line;
    let mut text = String::from(first);

    loop {
      match self.next_char() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
          ensure!(
            text.len() < self.max_ident_len,
            IdentTooLongSnafu {
              max: self.max_ident_len,
              line,
            }
          );
          text.push(c);
        }
        Some(c) => {
          self.putback(c);
          break;
        }
        None => break,
      }
    }

    Ok(text)
  }
}

/// Lex the whole input into a flat vector of tokens terminated by an `Eof`.
pub fn tokenize(source: &str, max_ident_len: usize) -> CompileResult<Vec<Token>> {
  let mut lexer = Lexer::new(source, max_ident_len);
  let mut tokens = Vec::new();
  while lexer.scan()? {
    tokens.push(lexer.token().clone());
  }
  tokens.push(lexer.token().clone());
  Ok(tokens)
}
