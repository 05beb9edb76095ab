// crates/conformance/tests/conformance.rs
//
// Conformance test runner.
//
// This test scans a fixture directory for JSON fixture files and checks that
// produced run traces match golden traces deterministically.
//
// To bless (rewrite) golden traces:
//   KET_BLESS=1 cargo test -p ketrun-conformance
//
// Fixtures live in:
//   tests/fixtures/*.json
//
// Each fixture names a program under tests/fixtures/programs/ and exactly one
// golden file via:
//   - `expect_trace` (success trace), or
//   - `expect_error` (failure trace)

use ketrun_conformance::{Runner, RunnerConfig};
use libket::Program;
use std::fs;
use std::path::{Path, PathBuf};

fn fixture_root() -> PathBuf {
    // Workspace layout: crates/conformance/ -> ../../tests/fixtures (repo root)
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("tests")
        .join("fixtures")
}

fn list_fixture_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(rd) = fs::read_dir(root) {
        for ent in rd.flatten() {
            let p = ent.path();
            if p.is_file() && p.extension().map(|e| e == "json").unwrap_or(false) {
                out.push(p);
            }
        }
    }
    out.sort();
    out
}

#[test]
fn conformance_fixtures_match_golden() {
    let bless = std::env::var("KET_BLESS").ok().as_deref() == Some("1");

    let runner = Runner::new(RunnerConfig { bless });

    let root = fixture_root();
    let files = list_fixture_files(&root);

    assert!(
        !files.is_empty(),
        "no fixture files found in {}",
        root.display()
    );

    for f in files {
        check_layout(&root, &f);
        runner.run_and_check(&f).unwrap_or_else(|e| {
            panic!("fixture failed: {}\nerror: {e}", f.display());
        });
    }
}

/// Programs live in `programs/`, goldens in `golden/`, and every program
/// passes structural validation unless the fixture expects an error.
fn check_layout(root: &Path, fixture_file: &Path) {
    let fixture = Runner::load_fixture(fixture_file)
        .unwrap_or_else(|e| panic!("{}: {e}", fixture_file.display()));

    let program_path = fixture.program_path(fixture_file);
    assert!(
        program_path.starts_with(root.join("programs")) && program_path.is_file(),
        "fixture '{}': program {} is not a file under programs/",
        fixture.name,
        program_path.display()
    );

    let golden_path = fixture
        .golden_path(fixture_file)
        .unwrap_or_else(|e| panic!("{}: {e}", fixture_file.display()));
    assert!(
        golden_path.starts_with(root.join("golden")),
        "fixture '{}': golden {} is not under golden/",
        fixture.name,
        golden_path.display()
    );

    if fixture.expect_trace.is_some() {
        let bytes = fs::read(&program_path).unwrap();
        let program = Program::from_json(&bytes).unwrap();
        program
            .validate()
            .unwrap_or_else(|e| panic!("fixture '{}': {e}", fixture.name));
        assert_eq!(
            fixture_file.file_stem(),
            program_path.file_stem(),
            "fixture '{}' should be named after its program",
            fixture.name
        );
    }
}
