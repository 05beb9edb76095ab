// File: crates/ketrun/src/args.rs
//
// Command-line argument definitions for the `ketrun` executable.
//
// This file defines the public CLI contract only.
// It does NOT contain execution logic.

use clap::Parser;
use std::path::PathBuf;

/// Runs a finalized quantum program (JSON) on a registered engine.
#[derive(Debug, Parser)]
#[command(name = "ketrun")]
#[command(version)]
#[command(about = "Quantum program runner for libket programs", long_about = None)]
pub struct Args {
    /// Path to the program file (JSON)
    #[arg(value_name = "PROGRAM_FILE")]
    pub program_path: PathBuf,

    /// Engine name
    ///
    /// Overrides KET_QUANTUM_EXECUTOR. Defaults to the bundled `kbw` engine.
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Measurement sampling seed
    ///
    /// Overrides KBW_SEED. Runs with the same seed produce the same results.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Instruction budget before execution is aborted
    ///
    /// Overrides KBW_MAX_INSTRUCTIONS.
    #[arg(long)]
    pub max_instructions: Option<u64>,

    /// Print the program as KQASM and exit without executing
    #[arg(long)]
    pub kqasm: bool,

    /// Enable execution tracing
    ///
    /// Raises the default log level to `info`, or `trace` when given twice.
    #[arg(long, action = clap::ArgAction::Count)]
    pub trace: u8,

    /// Emit the run trace as JSON to stdout
    ///
    /// Failures are emitted as a failure trace instead of an error message.
    #[arg(long)]
    pub emit_trace: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Default log filter when RUST_LOG is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.trace {
            0 => "warn",
            1 => "info",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_invocation() {
        let args = Args::try_parse_from(["ketrun", "bell.json"]).unwrap();
        assert_eq!(args.program_path, PathBuf::from("bell.json"));
        assert_eq!(args.backend, None);
        assert_eq!(args.seed, None);
        assert!(!args.emit_trace);
        assert_eq!(args.log_filter(), "warn");
    }

    #[test]
    fn overrides_and_trace_levels() {
        let args = Args::try_parse_from([
            "ketrun",
            "--backend",
            "kbw",
            "--seed",
            "42",
            "--max-instructions",
            "10",
            "--trace",
            "--trace",
            "p.json",
        ])
        .unwrap();
        assert_eq!(args.backend.as_deref(), Some("kbw"));
        assert_eq!(args.seed, Some(42));
        assert_eq!(args.max_instructions, Some(10));
        assert_eq!(args.log_filter(), "trace");
    }

    #[test]
    fn program_file_is_required() {
        assert!(Args::try_parse_from(["ketrun"]).is_err());
    }
}
