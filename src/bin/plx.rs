//! plx - command-line front end for the Prelax preview pipeline
//!
//! Reads generated markup from a file or stdin and emits the HTML preview,
//! the reduced markup, or a JSON report of the sanitize stage.

use clap::{Parser, ValueEnum};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process;

use prelax::utils::diagnostics::format_diagnostics;
use prelax::{render_and_splice, sanitize_with, FallbackMathRenderer, PlainRenderer, SanitizeOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Full HTML preview
    Html,
    /// Reduced markup with placeholder tokens
    Reduced,
    /// JSON report of the sanitize stage
    Report,
}

#[derive(Parser, Debug)]
#[command(name = "plx")]
#[command(version)]
#[command(about = "Sanitize generated LaTeX-like markup into a safe HTML preview")]
struct Cli {
    /// Input file (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Output file (writes stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// What to emit
    #[arg(short, long, value_enum, default_value_t = Emit::Html)]
    emit: Emit,

    /// Integrity tolerance for unbalanced environment markers
    #[arg(long, default_value_t = 2)]
    tolerance: usize,

    /// Only run the integrity check, then exit
    #[arg(long)]
    check: bool,

    /// Print diagnostics to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(serde::Serialize)]
struct Report {
    reduced: String,
    blocks: usize,
    has_bibliography: bool,
    title: Option<String>,
    diagnostics: Vec<String>,
}

fn read_input(path: &Option<PathBuf>) -> std::io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn write_output(path: &Option<PathBuf>, content: &str) -> std::io::Result<()> {
    match path {
        Some(path) => fs::write(path, content),
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let input = match read_input(&cli.input) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("error: could not read input: {}", e);
            process::exit(1);
        }
    };

    let options = SanitizeOptions {
        balance_tolerance: cli.tolerance,
        ..SanitizeOptions::default()
    };

    let doc = sanitize_with(&input, &options, &FallbackMathRenderer);

    if cli.check {
        // The gate runs on the reduced markup so extracted code bodies
        // never count against the balance
        match prelax::core::sanitize::gatekeeper::check_balance(&doc.reduced, cli.tolerance) {
            Ok(()) => {
                println!("ok");
                return;
            }
            Err(e) => {
                eprintln!("{}", e);
                process::exit(2);
            }
        }
    }

    if cli.verbose && !doc.diagnostics.is_empty() {
        eprintln!("{}", format_diagnostics(&doc.diagnostics));
    }

    let output = match cli.emit {
        Emit::Reduced => doc.reduced.clone(),
        Emit::Report => {
            let report = Report {
                reduced: doc.reduced.clone(),
                blocks: doc.blocks.len(),
                has_bibliography: doc.bibliography.is_some(),
                title: doc.meta.title.clone(),
                diagnostics: doc.diagnostics.iter().map(|d| d.to_string()).collect(),
            };
            match serde_json::to_string_pretty(&report) {
                Ok(json) => json,
                Err(e) => {
                    eprintln!("error: could not serialize report: {}", e);
                    process::exit(1);
                }
            }
        }
        Emit::Html => match render_and_splice(doc, &PlainRenderer) {
            Ok(rendered) => rendered.to_html(),
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(2);
            }
        },
    };

    if let Err(e) = write_output(&cli.output, &output) {
        eprintln!("error: could not write output: {}", e);
        process::exit(1);
    }
}
