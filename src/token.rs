//! Resolved tokens and the keyword table.

use std::fmt;

use crate::tokenizer::SourceLocation;

/// Every kind of token the resolver can produce.
///
/// `Macro` and `Var` only exist while resolving: their spans are consumed by
/// the resolver and never reach the checker or the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  Int,
  True,
  False,
  Plus,
  Sub,
  Mult,
  DivMod,
  Print,
  Swap,
  Dup,
  Drop,
  Rot,
  Gt,
  Ge,
  Lt,
  Le,
  Eq,
  For,
  Do,
  If,
  Else,
  End,
  Macro,
  Var,
  Read,
  Write,
  Syscall1,
  Syscall3,
  Word,
}

impl TokenKind {
  /// Look up a reserved spelling.
  pub fn from_keyword(text: &str) -> Option<Self> {
    let kind = match text {
      "+" => Self::Plus,
      "-" => Self::Sub,
      "*" => Self::Mult,
      "divmod" => Self::DivMod,
      "print" => Self::Print,
      "swap" => Self::Swap,
      "dup" => Self::Dup,
      "drop" => Self::Drop,
      ">" => Self::Gt,
      ">=" => Self::Ge,
      "<" => Self::Lt,
      "<=" => Self::Le,
      "=" => Self::Eq,
      "for" => Self::For,
      "do" => Self::Do,
      "if" => Self::If,
      "else" => Self::Else,
      "end" => Self::End,
      "macro" => Self::Macro,
      "syscall1" => Self::Syscall1,
      "syscall3" => Self::Syscall3,
      "rot" => Self::Rot,
      "@" => Self::Read,
      "!" => Self::Write,
      "var" => Self::Var,
      "true" => Self::True,
      "false" => Self::False,
      _ => return None,
    };
    Some(kind)
  }

  pub fn is_keyword(text: &str) -> bool {
    Self::from_keyword(text).is_some()
  }

  /// Whether this kind opens a block that a later `end` closes.
  pub fn opens_block(self) -> bool {
    matches!(self, Self::If | Self::For)
  }
}

/// Declared element type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
  Int,
  Bool,
  Ptr,
}

impl ElementKind {
  pub fn from_name(text: &str) -> Option<Self> {
    match text {
      "int" => Some(Self::Int),
      "bool" => Some(Self::Bool),
      "ptr" => Some(Self::Ptr),
      _ => None,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Int => "int",
      Self::Bool => "bool",
      Self::Ptr => "ptr",
    }
  }
}

impl fmt::Display for ElementKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// A resolved token.
///
/// `operand` carries the literal value of `Int`/`True`/`False` and the byte
/// offset of a variable `Word`. `element` is set only on variable words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub loc: SourceLocation,
  pub operand: u64,
  pub element: Option<ElementKind>,
  pub text: String,
}

impl Token {
  pub fn new(kind: TokenKind, loc: SourceLocation, text: impl Into<String>) -> Self {
    Self {
      kind,
      loc,
      operand: 0,
      element: None,
      text: text.into(),
    }
  }

  pub fn with_operand(mut self, operand: u64) -> Self {
    self.operand = operand;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keyword_table_is_exact() {
    assert_eq!(TokenKind::from_keyword("divmod"), Some(TokenKind::DivMod));
    assert_eq!(TokenKind::from_keyword("@"), Some(TokenKind::Read));
    assert_eq!(TokenKind::from_keyword("!"), Some(TokenKind::Write));
    assert_eq!(TokenKind::from_keyword(">="), Some(TokenKind::Ge));
    assert_eq!(TokenKind::from_keyword("Print"), None);
    assert_eq!(TokenKind::from_keyword("int"), None);
    assert_eq!(TokenKind::from_keyword("42"), None);
  }

  #[test]
  fn element_kinds_round_trip_their_names() {
    for kind in [ElementKind::Int, ElementKind::Bool, ElementKind::Ptr] {
      assert_eq!(ElementKind::from_name(kind.name()), Some(kind));
    }
    assert_eq!(ElementKind::from_name("u64"), None);
  }
}
