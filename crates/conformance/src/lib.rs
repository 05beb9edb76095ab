// File: crates/conformance/src/lib.rs
//
// Conformance harness for libket program execution.
//
// Purpose:
// - Execute serialized program fixtures on the bundled engine with fixed seeds
// - Emit traces
// - Compare traces against golden expectations
//
// Fixture programs must be deterministic for their seed; golden files hold
// the resulting `RunTrace` as JSON.

use libket::{Engine, Kbw, Program, RunTrace};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConformanceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("golden mismatch: {0}")]
    GoldenMismatch(String),

    #[error("fixture invalid: {0}")]
    FixtureInvalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub name: String,

    /// Program JSON, relative to the fixture file.
    pub program: String,

    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub max_instructions: Option<u64>,

    #[serde(default)]
    pub expect_trace: Option<String>,

    #[serde(default)]
    pub expect_error: Option<String>,
}

impl Fixture {
    pub fn base_dir(&self, fixture_file: &Path) -> PathBuf {
        fixture_file
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn program_path(&self, fixture_file: &Path) -> PathBuf {
        self.base_dir(fixture_file).join(&self.program)
    }

    /// Golden file path: `expect_trace` or `expect_error`, whichever is set.
    pub fn golden_path(&self, fixture_file: &Path) -> Result<PathBuf, ConformanceError> {
        let rel = self
            .expect_trace
            .as_ref()
            .or(self.expect_error.as_ref())
            .ok_or_else(|| {
                ConformanceError::FixtureInvalid(format!(
                    "fixture '{}' has no golden file",
                    self.name
                ))
            })?;
        Ok(self.base_dir(fixture_file).join(rel))
    }

    pub fn engine(&self) -> Kbw {
        let engine = Kbw::new().with_seed(self.seed);
        match self.max_instructions {
            Some(limit) => engine.with_max_instructions(limit),
            None => engine,
        }
    }

    pub fn validate(&self) -> Result<(), ConformanceError> {
        let has_trace = self.expect_trace.is_some();
        let has_error = self.expect_error.is_some();

        match (has_trace, has_error) {
            (true, false) => Ok(()),
            (false, true) => Ok(()),
            (false, false) => Err(ConformanceError::FixtureInvalid(format!(
                "fixture '{}' must specify exactly one of expect_trace or expect_error",
                self.name
            ))),
            (true, true) => Err(ConformanceError::FixtureInvalid(format!(
                "fixture '{}' must not specify both expect_trace and expect_error",
                self.name
            ))),
        }
    }

    /// Whether `trace` has the outcome the fixture declares.
    pub fn expects(&self, trace: &RunTrace) -> bool {
        match trace {
            RunTrace::Success(_) => self.expect_trace.is_some(),
            RunTrace::Failure(_) => self.expect_error.is_some(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    pub bless: bool,
}

pub struct Runner {
    cfg: RunnerConfig,
}

impl Runner {
    pub fn new(cfg: RunnerConfig) -> Self {
        Self { cfg }
    }

    pub fn load_fixture(path: impl AsRef<Path>) -> Result<Fixture, ConformanceError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn run_fixture(
        &self,
        fixture_file: impl AsRef<Path>,
        fixture: &Fixture,
    ) -> Result<RunTrace, ConformanceError> {
        let fixture_file = fixture_file.as_ref();
        let bytes = fs::read(fixture.program_path(fixture_file))?;

        // A program that fails to load is a failure trace, not a harness error.
        let program = match Program::from_json(&bytes) {
            Ok(p) => p,
            Err(e) => return Ok(RunTrace::from_error(&e)),
        };

        let mut engine = fixture.engine();
        log::debug!(
            "fixture '{}': running on {} with seed {}",
            fixture.name,
            engine.name(),
            fixture.seed
        );
        Ok(RunTrace::execute(&mut engine, &program))
    }

    pub fn assert_matches(
        &self,
        fixture_file: impl AsRef<Path>,
        fixture: &Fixture,
        produced: &RunTrace,
    ) -> Result<(), ConformanceError> {
        let fixture_file = fixture_file.as_ref();
        let golden_path = fixture.golden_path(fixture_file)?;

        if !fixture.expects(produced) {
            return Err(ConformanceError::GoldenMismatch(format!(
                "fixture '{}' produced the wrong outcome kind:\n{}",
                fixture.name,
                serde_json::to_string_pretty(produced)?
            )));
        }

        if self.cfg.bless {
            fs::create_dir_all(golden_path.parent().unwrap_or_else(|| Path::new(".")))?;
            let s = serde_json::to_string_pretty(produced)?;
            fs::write(golden_path, s.as_bytes())?;
            return Ok(());
        }

        let golden_bytes = fs::read(&golden_path)?;
        let golden: RunTrace = serde_json::from_slice(&golden_bytes)?;

        if &golden != produced {
            let golden_s = serde_json::to_string_pretty(&golden)?;
            let produced_s = serde_json::to_string_pretty(produced)?;
            return Err(ConformanceError::GoldenMismatch(format!(
                "fixture '{}' produced trace does not match golden.\nfixture_file: {}\nprogram: {}\nexpected: {}\n\n--- golden ---\n{}\n\n--- produced ---\n{}\n",
                fixture.name,
                fixture_file.display(),
                fixture.program_path(fixture_file).display(),
                golden_path.display(),
                golden_s,
                produced_s,
            )));
        }

        Ok(())
    }

    pub fn run_and_check(&self, fixture_file: impl AsRef<Path>) -> Result<(), ConformanceError> {
        let fixture_file = fixture_file.as_ref();
        let fixture = Self::load_fixture(fixture_file)?;
        fixture.validate()?;
        let produced = self.run_fixture(fixture_file, &fixture)?;
        self.assert_matches(fixture_file, &fixture, &produced)
    }
}
