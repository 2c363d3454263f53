//! Symbol-resolving parser.
//!
//! Turns raw lexemes into typed tokens, captures `macro … end` bodies into the
//! macro table and `var <name> <kind> end` declarations into the variable
//! table. Definition spans are elided from the main sequence, so only use
//! sites remain. Words are checked against both tables once every definition
//! has been seen, which lets a use precede its definition.

use snafu::{ResultExt, ensure};

use crate::error::{
  AmbiguousWordSnafu, CompileResult, InvalidIntegerSnafu, MalformedMacroSnafu, MalformedVarSnafu,
  NestedMacroSnafu, UndefinedWordSnafu,
};
use crate::symbols::{MacroTable, VariableTable};
use crate::token::{ElementKind, Token, TokenKind};
use crate::tokenizer::{RawToken, SourceLocation};

/// Output of the resolver: the main token sequence plus both symbol tables.
#[derive(Debug, Clone, Default)]
pub struct Program {
  pub tokens: Vec<Token>,
  pub macros: MacroTable,
  pub variables: VariableTable,
}

/// Resolve a raw token stream into a [`Program`].
pub fn resolve(raw: Vec<RawToken>) -> CompileResult<Program> {
  let resolver = Resolver::new(raw);
  let program = resolver.run()?;
  log::debug!(
    "resolved {} tokens, {} macros, {} variables",
    program.tokens.len(),
    program.macros.len(),
    program.variables.len()
  );
  Ok(program)
}

/// A macro body being collected. `depth` counts the `if`/`for` blocks opened
/// inside the body so that only the macro's own `end` closes it.
struct MacroCapture {
  name: String,
  loc: SourceLocation,
  depth: usize,
  body: Vec<Token>,
}

struct Resolver {
  stream: TokenStream,
  main: Vec<Token>,
  capture: Option<MacroCapture>,
  macros: MacroTable,
  variables: VariableTable,
  /// Every word use, in source order, for the deferred lookup.
  uses: Vec<(String, SourceLocation)>,
}

impl Resolver {
  fn new(raw: Vec<RawToken>) -> Self {
    Self {
      stream: TokenStream::new(raw),
      main: Vec::new(),
      capture: None,
      macros: MacroTable::new(),
      variables: VariableTable::new(),
      uses: Vec::new(),
    }
  }

  fn run(mut self) -> CompileResult<Program> {
    while let Some(raw) = self.stream.next_token() {
      match TokenKind::from_keyword(&raw.text) {
        Some(TokenKind::Macro) => self.begin_macro(raw)?,
        Some(TokenKind::Var) => self.declare_var(raw)?,
        Some(TokenKind::End) if self.capture.as_ref().is_some_and(|c| c.depth == 0) => {
          self.finish_macro();
        }
        Some(kind) => {
          let operand = u64::from(kind == TokenKind::True);
          self.push(Token::new(kind, raw.loc, raw.text).with_operand(operand));
        }
        None => {
          let token = literal_or_word(raw)?;
          self.push(token);
        }
      }
    }

    if let Some(capture) = self.capture.take() {
      return MalformedMacroSnafu {
        loc: capture.loc,
        message: format!("`{}` is missing its closing `end`", capture.name),
      }
      .fail();
    }

    self.resolve_words()?;

    Ok(Program {
      tokens: self.main,
      macros: self.macros,
      variables: self.variables,
    })
  }

  /// Append to the macro body being captured, or to the main sequence.
  fn push(&mut self, token: Token) {
    if token.kind == TokenKind::Word {
      self.uses.push((token.text.clone(), token.loc.clone()));
    }

    match &mut self.capture {
      Some(capture) => {
        if token.kind.opens_block() {
          capture.depth += 1;
        } else if token.kind == TokenKind::End {
          capture.depth -= 1;
        }
        capture.body.push(token);
      }
      None => self.main.push(token),
    }
  }

  fn begin_macro(&mut self, keyword: RawToken) -> CompileResult<()> {
    ensure!(
      self.capture.is_none(),
      NestedMacroSnafu { loc: keyword.loc }
    );

    let Some(name) = self.stream.next_token() else {
      return MalformedMacroSnafu {
        loc: keyword.loc,
        message: "expected a macro name but reached end of input",
      }
      .fail();
    };
    ensure!(
      !TokenKind::is_keyword(&name.text),
      MalformedMacroSnafu {
        loc: name.loc,
        message: format!("expected a macro name but found keyword `{}`", name.text),
      }
    );
    ensure!(
      !is_integer_literal(&name.text),
      MalformedMacroSnafu {
        loc: name.loc,
        message: format!("expected a macro name but found integer `{}`", name.text),
      }
    );

    log::trace!("{}: capturing macro `{}`", keyword.loc, name.text);
    self.capture = Some(MacroCapture {
      name: name.text,
      loc: keyword.loc,
      depth: 0,
      body: Vec::new(),
    });
    Ok(())
  }

  fn finish_macro(&mut self) {
    if let Some(capture) = self.capture.take() {
      log::trace!(
        "macro `{}` captured with {} tokens",
        capture.name,
        capture.body.len()
      );
      self.macros.define(capture.name, capture.body);
    }
  }

  /// Handle `var <name> <kind> end`. The `var` keyword has been consumed.
  fn declare_var(&mut self, keyword: RawToken) -> CompileResult<()> {
    let Some([name, kind, end]) = self.stream.next_array::<3>() else {
      return MalformedVarSnafu {
        loc: keyword.loc,
        message: "expected variable definition",
      }
      .fail();
    };

    ensure!(
      !TokenKind::is_keyword(&name.text) && !is_integer_literal(&name.text),
      MalformedVarSnafu {
        loc: name.loc,
        message: format!(
          "expected a variable name but found `{}`, keywords and integers are not allowed as variable names",
          name.text
        ),
      }
    );

    let Some(element) = ElementKind::from_name(&kind.text) else {
      return MalformedVarSnafu {
        loc: kind.loc,
        message: format!("expected a type (int, bool, ptr) but found `{}`", kind.text),
      }
      .fail();
    };

    ensure!(
      TokenKind::from_keyword(&end.text) == Some(TokenKind::End),
      MalformedVarSnafu {
        loc: end.loc,
        message: format!("expected `end` but found `{}`", end.text),
      }
    );

    let var = self.variables.declare(name.text.as_str(), element);
    log::trace!(
      "{}: variable `{}` {} at offset {}",
      keyword.loc,
      name.text,
      element,
      var.offset
    );
    Ok(())
  }

  /// Check every word against the finished tables and attach variable slots.
  fn resolve_words(&mut self) -> CompileResult<()> {
    for (name, loc) in &self.uses {
      let is_macro = self.macros.contains(name);
      let is_var = self.variables.contains(name);
      ensure!(
        is_macro || is_var,
        UndefinedWordSnafu {
          loc: loc.clone(),
          name: name.as_str(),
        }
      );
      ensure!(
        !(is_macro && is_var),
        AmbiguousWordSnafu {
          loc: loc.clone(),
          name: name.as_str(),
        }
      );
    }

    let variables = &self.variables;
    let bodies = self.macros.bodies_mut();
    for tokens in std::iter::once(&mut self.main).chain(bodies) {
      for token in tokens.iter_mut().filter(|t| t.kind == TokenKind::Word) {
        if let Some(var) = variables.get(&token.text) {
          token.operand = var.offset;
          token.element = Some(var.kind);
        }
      }
    }
    Ok(())
  }
}

fn is_integer_literal(text: &str) -> bool {
  !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// A non-keyword lexeme is an unsigned decimal literal or a word.
fn literal_or_word(raw: RawToken) -> CompileResult<Token> {
  if is_integer_literal(&raw.text) {
    let value = raw.text.parse::<u64>().context(InvalidIntegerSnafu {
      loc: raw.loc.clone(),
      text: raw.text.as_str(),
    })?;
    return Ok(Token::new(TokenKind::Int, raw.loc, raw.text).with_operand(value));
  }
  Ok(Token::new(TokenKind::Word, raw.loc, raw.text))
}

/// Lightweight cursor over the raw tokens.
struct TokenStream {
  tokens: std::vec::IntoIter<RawToken>,
}

impl TokenStream {
  fn new(tokens: Vec<RawToken>) -> Self {
    Self {
      tokens: tokens.into_iter(),
    }
  }

  fn next_token(&mut self) -> Option<RawToken> {
    self.tokens.next()
  }

  /// Take the next `N` tokens, or `None` if fewer remain.
  fn next_array<const N: usize>(&mut self) -> Option<[RawToken; N]> {
    if self.tokens.len() < N {
      return None;
    }
    let taken: Vec<RawToken> = self.tokens.by_ref().take(N).collect();
    taken.try_into().ok()
  }
}
