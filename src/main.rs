use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use minicc::{Backend, CompileError, CompileOptions};
use snafu::{ResultExt, Snafu};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Snafu)]
enum CliError {
  #[snafu(display("Unable to open {}: {source}", path.display()))]
  ReadSource { path: PathBuf, source: io::Error },

  #[snafu(display("Unable to create {}: {source}", path.display()))]
  CreateOutput { path: PathBuf, source: io::Error },

  #[snafu(display("Unable to write output: {source}"))]
  WriteOutput { source: io::Error },

  #[snafu(display("{source}"))]
  Compile { source: CompileError },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Emit {
  Tokens,
  Interpret,
  Asm,
  Ir,
}

impl From<Emit> for Backend {
  fn from(emit: Emit) -> Self {
    match emit {
      Emit::Tokens => Backend::Tokens,
      Emit::Interpret => Backend::Interpret,
      Emit::Asm => Backend::Asm,
      Emit::Ir => Backend::Ir,
    }
  }
}

/// Compile a tiny C-like language to assembly or LLVM IR, or run it directly.
#[derive(Debug, Parser)]
#[command(name = "minicc", version)]
struct Cli {
  /// Source file to compile.
  input: PathBuf,

  /// What to produce.
  #[arg(short, long, value_enum, default_value_t = Emit::Asm)]
  emit: Emit,

  /// Write output here instead of standard output.
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Number of scratch registers available to the assembly backend.
  #[arg(long, default_value_t = minicc::regalloc::MAX_REGISTERS)]
  registers: usize,
}

fn run(cli: Cli) -> Result<(), CliError> {
  let source = fs::read_to_string(&cli.input).context(ReadSourceSnafu { path: &cli.input })?;
  let options = CompileOptions::default()
    .with_backend(cli.emit.into())
    .with_registers(cli.registers);

  let mut out: Box<dyn Write> = match &cli.output {
    Some(path) => Box::new(BufWriter::new(
      File::create(path).context(CreateOutputSnafu { path })?,
    )),
    None => Box::new(io::stdout().lock()),
  };

  minicc::compile(&source, &options, &mut out).context(CompileSnafu)?;
  out.flush().context(WriteOutputSnafu)
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  if let Err(err) = run(Cli::parse()) {
    eprintln!("{err}");
    process::exit(1);
  }
}
