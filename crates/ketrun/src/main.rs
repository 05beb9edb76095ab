// File: crates/ketrun/src/main.rs

mod args;

use args::Args;
use clap::Parser;
use libket::{Engine, EngineRegistry, KetConfig, KetError, Program, QuantumResult, RunTrace};
use std::fmt::Write as _;
use std::fs;
use std::process::exit;

fn main() {
    let args = Args::parse();

    // Deterministic logging initialization:
    // - respects RUST_LOG if set
    // - otherwise info/trace with --trace, warn without
    init_logging(args.log_filter());

    let bytes = match fs::read(&args.program_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!(
                "ketrun: failed to read program file '{}': {e}",
                args.program_path.display()
            );
            exit(2);
        }
    };

    let program = match Program::from_json(&bytes) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ketrun: program load error: {e}");
            exit(3);
        }
    };

    if args.kqasm {
        print!("{}", program.to_kqasm());
        return;
    }

    let config = config_from(&args);
    let mut engine = match EngineRegistry::with_builtins().create(&config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("ketrun: {e}");
            exit(3);
        }
    };
    log::info!(
        "running '{}' on {} ({} block(s))",
        args.program_path.display(),
        engine.name(),
        program.blocks.len()
    );

    if args.emit_trace {
        let trace = RunTrace::execute(engine.as_mut(), &program);
        match serde_json::to_string_pretty(&trace) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("ketrun: failed to serialize trace: {e}");
                exit(4);
            }
        }
        if let RunTrace::Failure(failure) = &trace {
            log::warn!("execution failed: {}", failure.error.kind);
            exit(10);
        }
        append_kqasm(&config, &program);
        return;
    }

    if let Err(e) = program.validate() {
        eprintln!("ketrun: program load error: {e}");
        exit(3);
    }

    let result = match engine.execute(&program) {
        Ok(r) => r,
        Err(e) => {
            if !args.quiet {
                eprintln!("ketrun: {}", KetError::from(e));
            }
            // 10-series codes are execution failures
            exit(10);
        }
    };
    log::info!("executed in {:.6}s", result.exec_time);
    append_kqasm(&config, &program);

    if !args.quiet {
        print!("{}", render(&result, engine.name()));
    }
}

/// Append the executed program to the configured KQASM log, if any.
fn append_kqasm(config: &KetConfig, program: &Program) {
    if let Some(path) = &config.kqasm_output {
        if let Err(e) = program.append_kqasm(path) {
            eprintln!("ketrun: failed to write KQASM to '{}': {e}", path.display());
            exit(2);
        }
    }
}

/// Environment configuration with command-line overrides applied.
fn config_from(args: &Args) -> KetConfig {
    let mut config = KetConfig::from_env();
    if let Some(name) = &args.backend {
        config = config.with_backend(name.clone());
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(limit) = args.max_instructions {
        config = config.with_max_instructions(limit);
    }
    config
}

fn init_logging(default_filter: &str) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));

    // No timestamps, so output is stable across runs
    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(buf, "[{}] {}", record.level(), record.args())
    });

    let _ = builder.try_init();
}

fn render(result: &QuantumResult, backend: &str) -> String {
    let mut out = String::new();

    if result.futures.is_empty() {
        out.push_str("futures: <none>\n");
    } else {
        out.push_str("futures:\n");
        for (i, value) in result.futures.iter().enumerate() {
            let _ = writeln!(out, "  f{i} = {value}");
        }
    }

    if result.dumps.is_empty() {
        out.push_str("dumps: <none>\n");
    } else {
        out.push_str("dumps:\n");
        for (i, dump) in result.dumps.iter().enumerate() {
            let _ = writeln!(out, "  d{i}:");
            for (state, amps) in dump.iter() {
                let amps: Vec<String> = amps
                    .iter()
                    .map(|a| format!("{:.6}{:+.6}i", a.re, a.im))
                    .collect();
                let _ = writeln!(out, "    {state}: [{}]", amps.join(", "));
            }
        }
    }

    let _ = writeln!(out, "exec_time: {:.6}s", result.exec_time);
    let _ = writeln!(out, "backend: {backend}");
    out
}
