use std::path::Path;

use mylite_core::{ConnectionConfig, EngineConfig};
use mylite_sqlite::open_engine;
use mylite_testkit::{TestResult, load_test_cases_from_dir, run_offline_test, run_online_test};

#[test]
fn bundled_translation_cases_pass() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata");
    let cases = load_test_cases_from_dir(&dir).expect("testdata must load");
    assert!(!cases.is_empty(), "testdata must contain cases");

    let mut failures = Vec::new();
    for (name, testcase) in &cases {
        let result = if testcase.offline {
            run_offline_test(testcase)
        } else {
            let mut engine = open_engine(&ConnectionConfig::new(":memory:"), EngineConfig::default())
                .expect("in-memory engine");
            run_online_test(&mut engine, testcase)
        };
        match result {
            TestResult::Passed | TestResult::Skipped(_) => {}
            TestResult::Failed(message) => failures.push(format!("{name}: {message}")),
        }
    }

    assert!(failures.is_empty(), "failing cases:\n{}", failures.join("\n"));
}
