//! Lexical analysis: turns the raw source text into whitespace-delimited
//! lexemes tagged with their location.
//!
//! The scanner knows nothing about keywords or literals; it only splits on
//! whitespace and strips `//` line comments. Giving meaning to a lexeme is the
//! resolver's job.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Where a token came from. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
  pub path: Rc<Path>,
  pub line: usize,
  pub column: usize,
}

impl SourceLocation {
  pub fn new(path: Rc<Path>, line: usize, column: usize) -> Self {
    Self { path, line, column }
  }
}

impl fmt::Display for SourceLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
  }
}

/// A single lexeme as it appeared in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
  pub text: String,
  pub loc: SourceLocation,
}

/// Split `source` into raw tokens, in source order.
pub fn tokenize(source: &str, path: impl Into<PathBuf>) -> Vec<RawToken> {
  let path: Rc<Path> = Rc::from(path.into());
  let mut tokens = Vec::new();

  for (line_no, line) in source.lines().enumerate() {
    let code = match line.find("//") {
      Some(comment) => &line[..comment],
      None => line,
    };

    let mut chars = code.char_indices().enumerate().peekable();
    while let Some((column, (start, c))) = chars.next() {
      if c.is_whitespace() {
        continue;
      }

      let mut end = start + c.len_utf8();
      while let Some(&(_, (offset, next))) = chars.peek() {
        if next.is_whitespace() {
          break;
        }
        end = offset + next.len_utf8();
        chars.next();
      }

      tokens.push(RawToken {
        text: code[start..end].to_string(),
        loc: SourceLocation::new(Rc::clone(&path), line_no + 1, column + 1),
      });
    }
  }

  log::trace!("scanned {} raw tokens from {}", tokens.len(), path.display());
  tokens
}

#[cfg(test)]
mod tests {
  use super::*;

  fn texts(tokens: &[RawToken]) -> Vec<&str> {
    tokens.iter().map(|t| t.text.as_str()).collect()
  }

  #[test]
  fn splits_on_any_whitespace() {
    let tokens = tokenize("2  3\t+\n\nprint", "a.stc");
    assert_eq!(texts(&tokens), ["2", "3", "+", "print"]);
  }

  #[test]
  fn records_one_based_locations() {
    let tokens = tokenize("  dup\n10 drop", "prog.stc");
    let locs: Vec<_> = tokens.iter().map(|t| (t.loc.line, t.loc.column)).collect();
    assert_eq!(locs, [(1, 3), (2, 1), (2, 4)]);
    assert_eq!(tokens[2].loc.to_string(), "prog.stc:2:4");
  }

  #[test]
  fn strips_line_comments() {
    let tokens = tokenize("1 print // 2 print\n// whole line\n3", "c.stc");
    assert_eq!(texts(&tokens), ["1", "print", "3"]);
  }

  #[test]
  fn comment_glued_to_a_lexeme_ends_it() {
    let tokens = tokenize("dup// trailing", "c.stc");
    assert_eq!(texts(&tokens), ["dup"]);
  }

  #[test]
  fn empty_source_has_no_tokens() {
    assert!(tokenize("", "e.stc").is_empty());
    assert!(tokenize("   \n\t\n", "e.stc").is_empty());
  }
}
