use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use log::{LevelFilter, Log, Metadata, Record};

use stacc::{BuildOptions, SOURCE_EXTENSION};

/// Ahead-of-time compiler for a small stack language, targeting x86-64 Linux.
#[derive(Debug, Parser)]
#[command(name = "stacc", version)]
struct Cli {
  /// Increase log output (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Compile a source file into a native executable
  Build(BuildArgs),
  /// Compile a source file, then run the executable
  Run(BuildArgs),
}

#[derive(Debug, Args)]
struct BuildArgs {
  /// Source file, must end in `.stc`
  path: PathBuf,

  /// Assembler invoked on the generated `.asm` file
  #[arg(long, default_value = "nasm")]
  assembler: String,

  /// Linker invoked on the assembled object
  #[arg(long, default_value = "ld")]
  linker: String,
}

impl BuildArgs {
  fn options(&self) -> BuildOptions {
    BuildOptions {
      assembler: self.assembler.clone(),
      linker: self.linker.clone(),
    }
  }
}

/// Plain stderr logger behind the `log` facade.
struct StderrLogger;

impl Log for StderrLogger {
  fn enabled(&self, metadata: &Metadata<'_>) -> bool {
    metadata.level() <= log::max_level()
  }

  fn log(&self, record: &Record<'_>) {
    if self.enabled(record.metadata()) {
      eprintln!("[{}] {}", record.level(), record.args());
    }
  }

  fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => LevelFilter::Warn,
    1 => LevelFilter::Info,
    2 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  };
  if log::set_logger(&LOGGER).is_ok() {
    log::set_max_level(level);
  }
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let (args, run) = match &cli.command {
    Command::Build(args) => (args, false),
    Command::Run(args) => (args, true),
  };

  if !stacc::has_source_extension(&args.path) {
    eprintln!(
      "error: `{}` is not a `.{SOURCE_EXTENSION}` file\n",
      args.path.display()
    );
    let _ = Cli::command().print_help();
    process::exit(1);
  }

  let options = args.options();
  let result = if run {
    stacc::run(&args.path, &options).map(|status| status.code().unwrap_or(1))
  } else {
    stacc::build(&args.path, &options).map(|_| 0)
  };

  match result {
    Ok(code) => process::exit(code),
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}
