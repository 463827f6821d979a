//! CLI entry point for diffing two note files.
//!
//! # Responsibility
//! - Normalize two files and print the line edit script between them.
//! - Keep output deterministic so scripts can be compared in shell pipelines.

use clap::Parser;
use notechain_core::{diff_texts, normalize, ChainConfig, DiffTag, ScriptStats};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Line diff between two notes, using the same normalization as stored
/// versions.
#[derive(Parser, Debug)]
#[command(name = "notechain_cli", version, about, long_about = None)]
struct Args {
    /// Print the edit script as JSON instead of marked lines
    #[arg(long)]
    json: bool,

    /// Older revision
    old: PathBuf,

    /// Newer revision
    new: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode, String> {
    let old = normalize(&read(&args.old)?);
    let new = normalize(&read(&args.new)?);
    ChainConfig::default()
        .check_diff_size(old.line_count(), new.line_count())
        .map_err(|err| err.to_string())?;

    let script = diff_texts(&old, &new);
    let stats = ScriptStats::of(&script);

    if args.json {
        let rendered = serde_json::to_string_pretty(&script)
            .map_err(|err| format!("cannot encode script: {err}"))?;
        println!("{rendered}");
    } else {
        for op in &script {
            let marker = match op.tag {
                DiffTag::Equal => ' ',
                DiffTag::Insert => '+',
                DiffTag::Delete => '-',
            };
            for line in &op.lines {
                println!("{marker} {line}");
            }
        }
    }

    // diff(1) convention: 1 when the inputs differ.
    Ok(if stats.has_changes() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

fn read(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|err| format!("cannot read {}: {err}", path.display()))
}
