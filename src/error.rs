//! Shared error utilities used across the compilation pipeline.
//!
//! Every failure is fatal: the first problem found ends the run. Located
//! variants all render as `path:line:col: <construct> <message>` so editors
//! can jump straight to the offending token.

use std::path::PathBuf;

use snafu::Snafu;

use crate::tokenizer::SourceLocation;

pub type CompileResult<T> = Result<T, CompileError>;

/// Shape of a variable declaration, appended to every malformed-`var` report.
pub const VAR_GRAMMAR: &str = "variable definition looks like this:\n  `var <var-name> <var-type> end`\neg:\n  `var x int end`";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("{loc}: `{text}` invalid integer literal: {source}"))]
  InvalidInteger {
    loc: SourceLocation,
    text: String,
    source: std::num::ParseIntError,
  },

  #[snafu(display("{loc}: `var` {message}\n{VAR_GRAMMAR}"))]
  MalformedVar { loc: SourceLocation, message: String },

  #[snafu(display("{loc}: `macro` {message}"))]
  MalformedMacro { loc: SourceLocation, message: String },

  #[snafu(display("{loc}: `macro` definition inside of a macro is not supported"))]
  NestedMacro { loc: SourceLocation },

  #[snafu(display("{loc}: `{name}` undefined word"))]
  UndefinedWord { loc: SourceLocation, name: String },

  #[snafu(display("{loc}: `{name}` is defined both as a macro and as a variable"))]
  AmbiguousWord { loc: SourceLocation, name: String },

  #[snafu(display(
    "{loc}: `{op}` expected at least {expected} element(s) but found {found} on the stack"
  ))]
  StackUnderflow {
    loc: SourceLocation,
    op: String,
    expected: usize,
    found: usize,
  },

  #[snafu(display("{loc}: `{op}` expected < {expected} > but found < {found} > on the stack"))]
  TypeMismatch {
    loc: SourceLocation,
    op: String,
    expected: String,
    found: String,
  },

  #[snafu(display("{loc}: `{op}` {message}"))]
  Structure {
    loc: SourceLocation,
    op: String,
    message: String,
  },

  #[snafu(display("{loc}: `{name}` macro invocation inside of a macro is not supported"))]
  NestedMacroCall { loc: SourceLocation, name: String },

  #[snafu(display("could not read `{}`: {source}", path.display()))]
  ReadSource {
    path: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("could not write `{}`: {source}", path.display()))]
  WriteAssembly {
    path: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("could not start `{command}`: {source}"))]
  SpawnTool {
    command: String,
    source: std::io::Error,
  },

  #[snafu(display("`{command}` failed with {status}:\n{output}"))]
  Toolchain {
    command: String,
    status: std::process::ExitStatus,
    output: String,
  },
}

impl CompileError {
  /// Location of the offending token, for errors that have one.
  pub fn location(&self) -> Option<&SourceLocation> {
    match self {
      Self::InvalidInteger { loc, .. }
      | Self::MalformedVar { loc, .. }
      | Self::MalformedMacro { loc, .. }
      | Self::NestedMacro { loc }
      | Self::UndefinedWord { loc, .. }
      | Self::AmbiguousWord { loc, .. }
      | Self::StackUnderflow { loc, .. }
      | Self::TypeMismatch { loc, .. }
      | Self::Structure { loc, .. }
      | Self::NestedMacroCall { loc, .. } => Some(loc),
      Self::ReadSource { .. }
      | Self::WriteAssembly { .. }
      | Self::SpawnTool { .. }
      | Self::Toolchain { .. } => None,
    }
  }
}
