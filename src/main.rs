//! cfront - command-line driver.
//!
//! Parses and type-checks one C source file, prints the diagnostic counts,
//! and dumps the scope tree (optionally to a file). By convention the
//! driver is a diagnostic tool: it exits 0 even when semantic errors were
//! reported, and 1 only for argument or open failures.

use anyhow::{Context, Result};
use cfront::utils::pretty::dump_translation_unit;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "cfront")]
#[command(version)]
#[command(about = "ANSI C89 front end: parse and type-check one translation unit")]
#[command(long_about = r#"
cfront parses a single C source file (C89 plus common extensions), resolves
scopes and declarations, runs the type-transform pass, and prints every
diagnostic found along the way followed by a dump of the scope tree.

Example usage:
  cfront test.c
  cfront test.c -dump ast.txt
"#)]
struct Cli {
    /// Input C source file (suffix must be .c)
    input: PathBuf,

    /// Redirect the scope/AST dump to a file
    #[arg(long)]
    dump: Option<PathBuf>,
}

fn main() -> ExitCode {
    // The historical spelling `-dump <path>` is accepted alongside `--dump`.
    let args = std::env::args().map(|a| if a == "-dump" { "--dump".to_string() } else { a });
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("cfront: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let is_c_file = cli
        .input
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("c"))
        .unwrap_or(false);
    if !is_c_file {
        anyhow::bail!("{}: not a C source file (suffix must be .c)", cli.input.display());
    }

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("cannot open {}", cli.input.display()))?;

    let tu = cfront::analyze(&source)
        .with_context(|| format!("failed to process {}", cli.input.display()))?;

    for diag in tu.diags.errors() {
        println!("{}", diag);
    }
    for diag in tu.diags.warnings() {
        println!("{}", diag);
    }
    println!(
        "{} - ({}) error(s), ({}) warning(s)",
        cli.input.display(),
        tu.diags.error_count(),
        tu.diags.warning_count()
    );

    let dump = dump_translation_unit(&tu);
    match &cli.dump {
        Some(path) => {
            fs::write(path, dump).with_context(|| format!("cannot write {}", path.display()))?;
        }
        None => print!("{}", dump),
    }
    Ok(())
}
