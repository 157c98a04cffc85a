//! Isolation worker: `analyzer <file-path>`.
//!
//! On success the artifact path is the only thing written to stdout and the
//! exit code is 0. On any failure — bad arguments, unreadable file, parse
//! error, serialization or write error — stdout stays empty, a diagnostic
//! goes to stderr, and the exit code is 1.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;

fn main() -> ExitCode {
    let mut args = std::env::args_os().skip(1);
    let (Some(file), None) = (args.next(), args.next()) else {
        eprintln!("usage: analyzer <file-path>");
        return ExitCode::from(1);
    };

    let file = Path::new(&file);
    let result = symline::bridge::worker::run(file)
        .with_context(|| format!("failed to analyze {}", file.display()));
    match result {
        Ok(artifact) => {
            print!("{}", artifact.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("analyzer: {err:#}");
            ExitCode::from(1)
        }
    }
}
