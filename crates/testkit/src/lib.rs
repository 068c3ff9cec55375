mod yaml_runner;

pub use yaml_runner::{
    DEFAULT_SERVER_VERSION, ExpectedRow, TestResult, TranslationCase, load_test_cases_from_dir,
    load_test_cases_from_str, run_offline_test, run_online_test,
};
