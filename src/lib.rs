//! Crate root: the pipeline from source text to executable.
//!
//! The stages run strictly in order and each one must succeed before the next
//! starts:
//! - `tokenizer` splits source text into located lexemes.
//! - `parser` resolves lexemes into tokens and fills the macro and variable tables.
//! - `typecheck` simulates the program over a stack of abstract value types.
//! - `codegen` lowers the checked program into NASM x86-64 assembly.
//! - `toolchain` hands the assembly to the external assembler and linker.
//! - `error` holds the single fatal error type shared by all of them.

pub mod codegen;
pub mod error;
pub mod parser;
pub mod symbols;
pub mod token;
pub mod tokenizer;
pub mod toolchain;
pub mod ty;
pub mod typecheck;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use snafu::ResultExt;

pub use error::{CompileError, CompileResult};
pub use parser::Program;
pub use toolchain::BuildOptions;

use error::{ReadSourceSnafu, SpawnToolSnafu, WriteAssemblySnafu};

/// Extension every source file must carry.
pub const SOURCE_EXTENSION: &str = "stc";

/// Compile source text into NASM assembly. `path` only labels diagnostics.
pub fn generate_assembly(source: &str, path: impl Into<PathBuf>) -> CompileResult<String> {
  let raw = tokenizer::tokenize(source, path);
  let program = parser::resolve(raw)?;
  typecheck::check(&program)?;
  codegen::generate(&program)
}

pub fn has_source_extension(path: &Path) -> bool {
  path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// Files produced next to a source file: `prog.stc` gives `prog.asm`,
/// `prog.o` and `prog`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
  pub asm: PathBuf,
  pub object: PathBuf,
  pub executable: PathBuf,
}

impl Artifacts {
  pub fn for_source(path: &Path) -> Self {
    let stem = path.with_extension("");
    Self {
      asm: with_suffix(&stem, ".asm"),
      object: with_suffix(&stem, ".o"),
      executable: stem,
    }
  }
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
  let mut name = OsString::from(stem.as_os_str());
  name.push(suffix);
  PathBuf::from(name)
}

/// Compile `path` into an executable. The assembly file is only written once
/// the whole program has been checked and generated.
pub fn build(path: &Path, options: &BuildOptions) -> CompileResult<Artifacts> {
  let source = std::fs::read_to_string(path).context(ReadSourceSnafu { path })?;
  let asm = generate_assembly(&source, path)?;

  let artifacts = Artifacts::for_source(path);
  std::fs::write(&artifacts.asm, asm).context(WriteAssemblySnafu {
    path: &artifacts.asm,
  })?;
  log::info!("wrote {}", artifacts.asm.display());

  toolchain::assemble(&artifacts.asm, &artifacts.object, options)?;
  toolchain::link(&artifacts.object, &artifacts.executable, options)?;
  log::info!("built {}", artifacts.executable.display());
  Ok(artifacts)
}

/// Build `path`, then run the executable with inherited stdio.
pub fn run(path: &Path, options: &BuildOptions) -> CompileResult<ExitStatus> {
  let artifacts = build(path, options)?;
  let program = if artifacts.executable.is_relative() {
    Path::new(".").join(&artifacts.executable)
  } else {
    artifacts.executable
  };

  log::info!("running {}", program.display());
  Command::new(&program).status().context(SpawnToolSnafu {
    command: program.display().to_string(),
  })
}
