//! `script-compiler` — compiles a `.sc` source file to a signed `.scc`
//! bytecode container.
//!
//! Argument parsing and process exit codes only; the actual pipeline lives
//! in `quill_cli` (the lib half of this crate).

#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use quill_cli::{self as cli, FileResolver};

#[derive(Debug, Parser)]
#[command(name = "script-compiler", version, about = "Compiles Quill source to signed .scc bytecode")]
struct Opt {
    /// Source file to compile.
    input: PathBuf,

    /// Output container path (default: `<basename(input)>.scc`).
    #[arg(short = 'o')]
    output: Option<PathBuf>,

    /// Also write `<basename(output)>.decompiled.txt` with a readable listing.
    #[arg(short = 'd')]
    decompile: bool,

    /// Verbose progress output.
    #[arg(short = 'v')]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match real_main() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("io: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(true)` on a clean compile, `Ok(false)` if the source had
/// lexer/parser/compiler errors (already printed to stderr). `Err` is
/// reserved for I/O failures, so `main` can tell the two apart.
fn real_main() -> Result<bool> {
    let opt = Opt::parse();
    let output = opt.output.clone().unwrap_or_else(|| cli::default_output_path(&opt.input));

    if opt.verbose {
        println!("[1/4] Reading {}", opt.input.display());
    }
    let source = fs::read_to_string(&opt.input).with_context(|| format!("failed to read {}", opt.input.display()))?;

    let source_file_name = opt
        .input
        .file_name()
        .map_or_else(|| opt.input.to_string_lossy().to_string(), |n| n.to_string_lossy().to_string());

    if opt.verbose {
        println!("[2/4] Compiling {source_file_name} ({} bytes)", source.len());
    }
    let mut resolver = FileResolver::new(&opt.input);
    let compiled = match cli::compile_source(&source, &source_file_name, &mut resolver) {
        Ok(c) => c,
        Err(errors) => {
            for e in errors {
                eprintln!("{}: {}", e.stage, e.message);
            }
            return Ok(false);
        }
    };

    if opt.verbose {
        println!(
            "[3/4] Compiled: {} bytes of code, {} constants, {} functions",
            compiled.chunk.code.len(),
            compiled.chunk.constants.len(),
            compiled.chunk.functions.len()
        );
    }

    let container_bytes = quill_bytecode::write_container(&compiled.chunk);
    fs::write(&output, &container_bytes).with_context(|| format!("failed to write {}", output.display()))?;

    if opt.decompile {
        let listing_path = cli::decompiled_listing_path(&output);
        let listing = quill_bytecode::disassemble(&compiled.chunk);
        fs::write(&listing_path, listing).with_context(|| format!("failed to write {}", listing_path.display()))?;
        if opt.verbose {
            println!("Decompiled listing: {}", listing_path.display());
        }
    }

    println!("[4/4] Wrote {} ({} bytes)", output.display(), container_bytes.len());
    Ok(true)
}
