use std::path::PathBuf;

use schemasync_driver_sqlite::SqliteBackend;
use schemasync_testkit::{ScenarioResult, load_scenarios_from_dir, run_scenario};

#[test]
fn sqlite_scenarios_pass_on_a_fresh_database() {
    let files = load_scenarios_from_dir(fixtures_root())
        .unwrap_or_else(|error| panic!("failed to load sqlite scenarios: {error}"));

    assert!(!files.is_empty(), "sqlite scenario directory must not be empty");

    let mut scenario_count = 0_usize;
    for file in files {
        assert!(
            !file.scenarios.is_empty(),
            "scenario file '{}' must contain at least one scenario",
            file.path.display()
        );

        for (name, scenario) in file.scenarios {
            scenario_count += 1;
            let mut backend = SqliteBackend::open_in_memory()
                .unwrap_or_else(|error| panic!("failed to open sqlite: {error}"));
            if let ScenarioResult::Failed(reason) = run_scenario(&mut backend, &scenario) {
                panic!("scenario '{}::{}' failed: {}", file.file_name, name, reason);
            }
        }
    }

    assert!(
        scenario_count >= 12,
        "expected at least 12 sqlite scenarios, found {scenario_count}"
    );
}

fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("sqlite")
}
