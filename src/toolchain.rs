//! External assembler and linker invocation.

use std::path::Path;
use std::process::Command;

use snafu::{ResultExt, ensure};

use crate::error::{CompileResult, SpawnToolSnafu, ToolchainSnafu};

/// Which external tools turn the emitted assembly into an executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
  pub assembler: String,
  pub linker: String,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      assembler: "nasm".to_string(),
      linker: "ld".to_string(),
    }
  }
}

/// `nasm -felf64 <asm> -o <object>`
pub fn assemble(asm: &Path, object: &Path, options: &BuildOptions) -> CompileResult<()> {
  let mut cmd = Command::new(&options.assembler);
  cmd.arg("-felf64").arg(asm).arg("-o").arg(object);
  run_tool(cmd)
}

/// `ld <object> -o <executable>`
pub fn link(object: &Path, executable: &Path, options: &BuildOptions) -> CompileResult<()> {
  let mut cmd = Command::new(&options.linker);
  cmd.arg(object).arg("-o").arg(executable);
  run_tool(cmd)
}

/// Run a tool to completion; a non-zero exit surfaces everything it printed.
fn run_tool(mut cmd: Command) -> CompileResult<()> {
  let command = describe(&cmd);
  log::info!("running `{command}`");

  let output = cmd.output().context(SpawnToolSnafu {
    command: command.as_str(),
  })?;

  let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
  combined.push_str(&String::from_utf8_lossy(&output.stderr));
  ensure!(
    output.status.success(),
    ToolchainSnafu {
      command,
      status: output.status,
      output: combined,
    }
  );
  Ok(())
}

fn describe(cmd: &Command) -> String {
  std::iter::once(cmd.get_program())
    .chain(cmd.get_args())
    .map(|part| part.to_string_lossy())
    .collect::<Vec<_>>()
    .join(" ")
}
