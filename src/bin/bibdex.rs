//! # bibdex CLI Entry Point
//!
//! ```bash
//! # REPL over ./database/
//! bibdex
//!
//! # REPL over another base directory
//! bibdex /var/lib/bibdex
//!
//! bibdex --version
//! bibdex --help
//! ```

use std::env;
use std::path::PathBuf;

use eyre::{bail, Result};

use bibdex::cli::Repl;
use bibdex::DEFAULT_BASE_DIR;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut base: Option<PathBuf> = None;
    for arg in &args[1..] {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-v" => {
                println!("bibdex {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            flag if flag.starts_with('-') => bail!("Unknown option: {}", flag),
            path => {
                if base.is_some() {
                    bail!("Expected at most one base directory");
                }
                base = Some(PathBuf::from(path));
            }
        }
    }

    let base = base.unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR));
    Repl::new(base)?.run()
}

fn print_usage() {
    println!("Usage: bibdex [OPTIONS] [BASE_DIR]");
    println!();
    println!("Interactive shell over the databases stored under BASE_DIR");
    println!("(default: ./{}/).", DEFAULT_BASE_DIR);
    println!();
    println!("Options:");
    println!("  -h, --help     Show this help");
    println!("  -v, --version  Show version");
}
