//! Engine boundary.
//!
//! An [`Engine`] consumes a finalized [`Program`] and returns one resolved
//! value per future and one [`DumpData`] per dump. Failures carry their
//! message inline; there is no process-wide "last error".
//!
//! Engines are selected by name through an [`EngineRegistry`]. The bundled
//! [`Kbw`] engine is registered as `kbw` and is the default.

pub mod kbw;

pub use kbw::Kbw;

use crate::{KetConfig, KetError, KetResult, Program};
use indexmap::IndexMap;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<EngineError> for KetError {
    fn from(e: EngineError) -> Self {
        KetError::BackendExecution(e.message)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Execution backend for finalized programs.
pub trait Engine: fmt::Debug + Send {
    fn name(&self) -> &str;

    /// Run `program` to completion.
    ///
    /// On success the result holds exactly `program.num_futures` values and
    /// `program.num_dumps` dumps, indexed like the program's handles.
    fn execute(&mut self, program: &Program) -> EngineResult<QuantumResult>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumResult {
    pub futures: Vec<i64>,
    pub dumps: Vec<DumpData>,
    /// Wall time of the execution in seconds.
    pub exec_time: f64,
}

/// Resolved state snapshot of a qubit subset.
///
/// Basis states use the same bit order as measurement: the first qubit of
/// the dumped list is the most significant bit. Each basis state lists the
/// amplitudes of every component of the full state it occurs in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DumpData {
    pub basis_states: Vec<u64>,
    pub amplitudes: Vec<Vec<Complex64>>,
}

impl DumpData {
    pub fn len(&self) -> usize {
        self.basis_states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.basis_states.is_empty()
    }

    pub fn states(&self) -> impl Iterator<Item = u64> + '_ {
        self.basis_states.iter().copied()
    }

    pub fn amplitudes(&self) -> impl Iterator<Item = &[Complex64]> + '_ {
        self.amplitudes.iter().map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[Complex64])> + '_ {
        self.states().zip(self.amplitudes())
    }

    /// Single-amplitude shorthand: the amplitude of `state` when it occurs in
    /// exactly one component.
    pub fn amplitude(&self, state: u64) -> Option<Complex64> {
        match self.amplitudes_of(state)? {
            [single] => Some(*single),
            _ => None,
        }
    }

    pub fn amplitudes_of(&self, state: u64) -> Option<&[Complex64]> {
        self.iter().find(|(s, _)| *s == state).map(|(_, a)| a)
    }

    pub fn probability(&self, state: u64) -> f64 {
        self.amplitudes_of(state)
            .map(|amps| amps.iter().map(|a| a.norm_sqr()).sum())
            .unwrap_or(0.0)
    }

    pub fn total_probability(&self) -> f64 {
        self.amplitudes().flatten().map(|a| a.norm_sqr()).sum()
    }
}

type EngineFactory = Box<dyn Fn(&KetConfig) -> Box<dyn Engine> + Send + Sync>;

/// Name → engine factory table.
pub struct EngineRegistry {
    factories: IndexMap<String, EngineFactory>,
}

impl EngineRegistry {
    pub const DEFAULT_BACKEND: &'static str = "kbw";

    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Create a registry holding the bundled engines.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Self::DEFAULT_BACKEND, |cfg: &KetConfig| -> Box<dyn Engine> {
            Box::new(Kbw::from_config(cfg))
        });
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&KetConfig) -> Box<dyn Engine> + Send + Sync + 'static,
    ) {
        let name = name.into();
        log::debug!("registering engine: {name}");
        self.factories.insert(name, Box::new(factory));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate the engine selected by `config.backend_path`, falling back
    /// to the default when unset.
    pub fn create(&self, config: &KetConfig) -> KetResult<Box<dyn Engine>> {
        let name = config
            .backend_path
            .as_deref()
            .unwrap_or(Self::DEFAULT_BACKEND);

        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| KetError::UnknownBackend(name.to_string()))?;

        log::debug!("selected engine: {name}");
        Ok(factory(config))
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Null;

    impl Engine for Null {
        fn name(&self) -> &str {
            "null"
        }

        fn execute(&mut self, program: &Program) -> EngineResult<QuantumResult> {
            Ok(QuantumResult {
                futures: vec![0; program.num_futures as usize],
                dumps: vec![DumpData::default(); program.num_dumps as usize],
                exec_time: 0.0,
            })
        }
    }

    fn half() -> Complex64 {
        Complex64::new(0.5, 0.0)
    }

    #[test]
    fn default_backend_is_kbw() {
        let registry = EngineRegistry::with_builtins();
        let engine = registry.create(&KetConfig::default()).unwrap();
        assert_eq!(engine.name(), "kbw");
    }

    #[test]
    fn unknown_backend_is_reported() {
        let registry = EngineRegistry::with_builtins();
        let err = registry
            .create(&KetConfig::default().with_backend("qpu-42"))
            .unwrap_err();
        assert_eq!(err, KetError::UnknownBackend("qpu-42".into()));
    }

    #[test]
    fn custom_engines_can_be_registered() {
        let mut registry = EngineRegistry::with_builtins();
        registry.register("null", |_: &KetConfig| -> Box<dyn Engine> { Box::new(Null) });
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["kbw", "null"]);

        let engine = registry
            .create(&KetConfig::default().with_backend("null"))
            .unwrap();
        assert_eq!(engine.name(), "null");
    }

    #[test]
    fn dump_accessors() {
        let dump = DumpData {
            basis_states: vec![0, 3],
            amplitudes: vec![vec![half(), half()], vec![Complex64::new(0.0, -0.5)]],
        };

        assert_eq!(dump.len(), 2);
        assert_eq!(dump.states().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(dump.amplitude(0), None);
        assert_eq!(dump.amplitude(3), Some(Complex64::new(0.0, -0.5)));
        assert_eq!(dump.amplitude(1), None);
        assert!((dump.probability(0) - 0.5).abs() < 1e-12);
        assert!((dump.total_probability() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn engine_error_maps_to_backend_execution() {
        let e: KetError = EngineError::new("qubit budget exceeded").into();
        assert_eq!(e, KetError::BackendExecution("qubit budget exceeded".into()));
    }
}
