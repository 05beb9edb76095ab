//! libket: quantum program builder.
//!
//! This crate implements the program-construction state machine:
//! - qubit, label, future and dump handles owned by a [`Process`]
//! - the control-qubit stack and adjoint (inverse) region recording
//! - basic blocks, jumps and branches with forward-referenced labels
//! - deferred classical values (futures) built from measurement results
//!
//! A finalized [`Program`] is handed to an [`Engine`]; the bundled [`Kbw`]
//! engine is used when no other backend is configured.
//!
//! This crate contains NO CLI logic.

use serde::{Deserialize, Serialize};

pub mod error {
    use thiserror::Error;

    #[derive(Debug, Error, Clone, PartialEq, Eq)]
    pub enum KetError {
        #[error("allocation error: {0}")]
        Allocation(String),

        #[error("invalid qubit q{index}: {reason}")]
        InvalidQubit { index: u32, reason: String },

        #[error("control set is empty")]
        EmptyControlSet,

        #[error("control stack underflow: no control scope to pop")]
        StackUnderflow,

        #[error("no open adjoint region to end")]
        NoOpenAdjoint,

        #[error("label l{0} is already bound")]
        DuplicateBinding(u32),

        #[error("label l{0} is referenced but never bound")]
        UnboundLabel(u32),

        #[error("unbalanced control stack: {0} scope(s) still open")]
        UnbalancedControlStack(usize),

        #[error("unclosed adjoint region: {0} region(s) still open")]
        UnclosedAdjoint(usize),

        #[error("{0} is not available before the process runs")]
        NotAvailable(String),

        #[error("process {0} has already been executed")]
        AlreadyExecuted(u32),

        #[error("backend execution error: {0}")]
        BackendExecution(String),

        #[error("foreign handle: {0}")]
        ForeignHandle(String),

        #[error("{0} requires at least one qubit")]
        EmptyQubitList(String),

        #[error("{op} is not allowed inside {scope}")]
        Scope { op: String, scope: String },

        #[error("block l{block} is terminated; open a new block before {op}")]
        BlockTerminated { block: u32, op: String },

        #[error("unknown backend: {0}")]
        UnknownBackend(String),

        #[error("invalid program: {0}")]
        InvalidProgram(String),

        #[error("serialization error: {0}")]
        Serialization(String),

        #[error("io error: {0}")]
        Io(String),
    }

    impl KetError {
        /// Stable kind name used in traces.
        pub fn kind(&self) -> &'static str {
            match self {
                KetError::Allocation(_) => "Allocation",
                KetError::InvalidQubit { .. } => "InvalidQubit",
                KetError::EmptyControlSet => "EmptyControlSet",
                KetError::StackUnderflow => "StackUnderflow",
                KetError::NoOpenAdjoint => "NoOpenAdjoint",
                KetError::DuplicateBinding(_) => "DuplicateBinding",
                KetError::UnboundLabel(_) => "UnboundLabel",
                KetError::UnbalancedControlStack(_) => "UnbalancedControlStack",
                KetError::UnclosedAdjoint(_) => "UnclosedAdjoint",
                KetError::NotAvailable(_) => "NotAvailable",
                KetError::AlreadyExecuted(_) => "AlreadyExecuted",
                KetError::BackendExecution(_) => "BackendExecution",
                KetError::ForeignHandle(_) => "ForeignHandle",
                KetError::EmptyQubitList(_) => "EmptyQubitList",
                KetError::Scope { .. } => "Scope",
                KetError::BlockTerminated { .. } => "BlockTerminated",
                KetError::UnknownBackend(_) => "UnknownBackend",
                KetError::InvalidProgram(_) => "InvalidProgram",
                KetError::Serialization(_) => "Serialization",
                KetError::Io(_) => "Io",
            }
        }
    }

    impl From<std::io::Error> for KetError {
        fn from(e: std::io::Error) -> Self {
            KetError::Io(e.to_string())
        }
    }

    impl From<serde_json::Error> for KetError {
        fn from(e: serde_json::Error) -> Self {
            KetError::Serialization(e.to_string())
        }
    }

    pub type KetResult<T> = Result<T, KetError>;
}

pub use error::{KetError, KetResult};

pub mod config {
    //! Process configuration.
    //!
    //! Every field maps to an environment variable so that programs built in
    //! one place can be pointed at another backend without code changes.

    use serde::{Deserialize, Serialize};
    use std::path::PathBuf;

    /// Selects the execution engine by registered name.
    pub const BACKEND_ENV: &str = "KET_QUANTUM_EXECUTOR";
    /// Appends the KQASM text of every executed program to this file.
    pub const KQASM_OUTPUT_ENV: &str = "KQASM_OUTPUT";
    /// Seed for measurement sampling in the bundled engine.
    pub const SEED_ENV: &str = "KBW_SEED";
    /// Instruction budget for the bundled engine.
    pub const MAX_INSTRUCTIONS_ENV: &str = "KBW_MAX_INSTRUCTIONS";

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct KetConfig {
        /// Registered engine name; `None` selects the bundled default.
        #[serde(default)]
        pub backend_path: Option<String>,

        #[serde(default)]
        pub kqasm_output: Option<PathBuf>,

        #[serde(default)]
        pub seed: Option<u64>,

        #[serde(default)]
        pub max_instructions: Option<u64>,
    }

    impl KetConfig {
        /// Read configuration from the process environment.
        pub fn from_env() -> Self {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Build configuration from an arbitrary key lookup.
        ///
        /// Empty values count as unset. Numeric values that fail to parse are
        /// ignored with a warning.
        pub fn from_lookup<F>(lookup: F) -> Self
        where
            F: Fn(&str) -> Option<String>,
        {
            let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

            Self {
                backend_path: get(BACKEND_ENV),
                kqasm_output: get(KQASM_OUTPUT_ENV).map(PathBuf::from),
                seed: get(SEED_ENV).and_then(|v| parse_u64(SEED_ENV, &v)),
                max_instructions: get(MAX_INSTRUCTIONS_ENV)
                    .and_then(|v| parse_u64(MAX_INSTRUCTIONS_ENV, &v)),
            }
        }

        pub fn with_backend(mut self, name: impl Into<String>) -> Self {
            self.backend_path = Some(name.into());
            self
        }

        pub fn with_seed(mut self, seed: u64) -> Self {
            self.seed = Some(seed);
            self
        }

        pub fn with_kqasm_output(mut self, path: impl Into<PathBuf>) -> Self {
            self.kqasm_output = Some(path.into());
            self
        }

        pub fn with_max_instructions(mut self, limit: u64) -> Self {
            self.max_instructions = Some(limit);
            self
        }
    }

    fn parse_u64(key: &str, raw: &str) -> Option<u64> {
        match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!("ignoring {key}={raw:?}: not an unsigned integer");
                None
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn lookup_reads_all_keys() {
            let cfg = KetConfig::from_lookup(|key| match key {
                BACKEND_ENV => Some("kbw".into()),
                KQASM_OUTPUT_ENV => Some("/tmp/out.kqasm".into()),
                SEED_ENV => Some("42".into()),
                MAX_INSTRUCTIONS_ENV => Some("100".into()),
                _ => None,
            });

            assert_eq!(cfg.backend_path.as_deref(), Some("kbw"));
            assert_eq!(cfg.kqasm_output, Some(PathBuf::from("/tmp/out.kqasm")));
            assert_eq!(cfg.seed, Some(42));
            assert_eq!(cfg.max_instructions, Some(100));
        }

        #[test]
        fn empty_and_malformed_values_are_unset() {
            let cfg = KetConfig::from_lookup(|key| match key {
                BACKEND_ENV => Some("   ".into()),
                SEED_ENV => Some("not-a-number".into()),
                _ => None,
            });
            assert_eq!(cfg, KetConfig::default());
        }
    }
}

pub use config::KetConfig;

pub mod handle;
pub use handle::{Dump, Future, Label, Operand, OperandKind, Qubit};

pub mod code;
pub use code::{ClassicalOp, GateKind, GateOp, Instruction, IntArg, Program};

pub mod scope;

pub mod engine;
pub use engine::{DumpData, Engine, EngineError, EngineRegistry, Kbw, QuantumResult};
pub use num_complex::Complex64;

pub mod process;
pub use process::{FutureExpr, Metrics, Process, QubitState};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceError {
    pub kind: String,
    pub message: String,
}

impl From<&KetError> for TraceError {
    fn from(e: &KetError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

/// Resolved values of one program execution.
///
/// Execution time is left out so traces stay deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuccessTrace {
    pub futures: Vec<i64>,
    pub dumps: Vec<DumpData>,
}

impl From<QuantumResult> for SuccessTrace {
    fn from(r: QuantumResult) -> Self {
        Self {
            futures: r.futures,
            dumps: r.dumps,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureTrace {
    pub error: TraceError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RunTrace {
    Failure(FailureTrace),
    Success(SuccessTrace),
}

impl RunTrace {
    pub fn from_error(e: &KetError) -> Self {
        RunTrace::Failure(FailureTrace {
            error: TraceError::from(e),
        })
    }

    /// Validate `program` and execute it on `engine`, folding any failure
    /// into a failure trace.
    pub fn execute(engine: &mut dyn Engine, program: &Program) -> Self {
        if let Err(e) = program.validate() {
            return Self::from_error(&e);
        }
        match engine.execute(program) {
            Ok(result) => RunTrace::Success(result.into()),
            Err(e) => Self::from_error(&KetError::from(e)),
        }
    }
}
