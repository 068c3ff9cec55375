use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fs, io,
    path::Path,
};

use mylite_core::{
    Capabilities, Engine, EngineAdapter, EngineConfig, ExecutionOutcome, RewriteContext,
    RewrittenStatement, Row, Statement, Value, Version, parameterize, rewrite,
};
use serde::Deserialize;

/// Engine version assumed by offline cases that do not name one.
pub const DEFAULT_SERVER_VERSION: &str = "3.45.0";

const YAML_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Expected result row: column name to the value a MySQL client would
/// print, `~` for NULL.
pub type ExpectedRow = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslationCase {
    /// The MySQL-dialect statement under test.
    pub sql: String,
    /// Statements run through the engine before `sql` (online only).
    pub setup: Vec<String>,
    pub kind: Option<String>,
    /// Statements the rewrite produces, in execution order. Empty when the
    /// statement is answered without touching the engine.
    pub rewritten: Option<Vec<String>>,
    pub follow_up: Option<String>,
    /// Text handed to the engine after literals become parameters.
    pub executed: Option<String>,
    pub params: Option<Vec<Option<String>>>,
    pub rows: Option<Vec<ExpectedRow>>,
    pub affected: Option<u64>,
    /// Exact error message the statement must fail with.
    pub error: Option<String>,
    /// Version the engine reports; drives version-gated rewrites.
    pub server_version: Option<String>,
    pub min_version: Option<String>,
    pub max_version: Option<String>,
    /// Translation-only case, checked without an engine.
    pub offline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    Skipped(String),
    Failed(String),
}

impl From<Result<(), String>> for TestResult {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(message) => Self::Failed(message),
        }
    }
}

pub fn load_test_cases_from_str(
    yaml: &str,
) -> Result<BTreeMap<String, TranslationCase>, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

/// Loads every `*.yml`/`*.yaml` file in `dir`. Case names are prefixed with
/// their file stem (`dml/insert_ignore`).
pub fn load_test_cases_from_dir(
    dir: impl AsRef<Path>,
) -> io::Result<BTreeMap<String, TranslationCase>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()?;
    paths.sort();

    let mut cases = BTreeMap::new();
    for path in paths {
        let is_yaml = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| YAML_EXTENSIONS.contains(&extension));
        if !is_yaml {
            continue;
        }
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        let loaded = load_test_cases_from_str(&fs::read_to_string(&path)?).map_err(|error| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: {error}", path.display()),
            )
        })?;
        cases.extend(
            loaded
                .into_iter()
                .map(|(name, case)| (format!("{stem}/{name}"), case)),
        );
    }
    Ok(cases)
}

/// Checks classification, rewrite and parameterization without an engine.
/// The rewrite sees no table schema.
pub fn run_offline_test(test: &TranslationCase) -> TestResult {
    let version = match test_version(test) {
        Ok(version) => version,
        Err(message) => return TestResult::Failed(message),
    };
    evaluate_expected_error(test, run_offline_flow(test, version)).into()
}

/// Runs `setup` and then `sql` through `engine` and checks the outcome.
pub fn run_online_test<A: EngineAdapter>(
    engine: &mut Engine<A>,
    test: &TranslationCase,
) -> TestResult {
    let version = engine.adapter().server_version();
    match version_skip_reason(test, &version) {
        Ok(Some(reason)) => TestResult::Skipped(reason),
        Ok(None) => evaluate_expected_error(test, run_online_flow(engine, test)).into(),
        Err(message) => TestResult::Failed(message),
    }
}

/// Failure of the statement under test, kept apart from assertion failures
/// so an expected `error` can be matched against it.
enum FlowError {
    Statement(String),
    Assertion(String),
}

fn run_offline_flow(test: &TranslationCase, version: Version) -> Result<(), FlowError> {
    let statement = Statement::classify(&test.sql)
        .map_err(|error| FlowError::Statement(error.to_string()))?;
    assert_kind(test, &statement).map_err(FlowError::Assertion)?;

    let config = EngineConfig::default();
    let context = RewriteContext {
        capabilities: Capabilities::for_version(&version),
        schema: None,
        database_name: &config.database_name,
    };
    let rewritten = rewrite(&statement, &context);
    let (steps, follow_up) = match &rewritten {
        RewrittenStatement::Single(sql) => (vec![sql.clone()], None),
        RewrittenStatement::Plan(plan) => (
            plan.steps.iter().map(|step| step.sql.clone()).collect(),
            plan.follow_up.clone(),
        ),
        RewrittenStatement::Noop => (Vec::new(), None),
    };
    if let Some(expected) = &test.rewritten
        && expected != &steps
    {
        return Err(FlowError::Assertion(format!(
            "rewritten SQL mismatch; expected:\n{}\nactual:\n{}",
            expected.join("\n"),
            steps.join("\n")
        )));
    }
    if test.follow_up.is_some() && test.follow_up != follow_up {
        return Err(FlowError::Assertion(format!(
            "follow-up mismatch; expected {:?}, got {follow_up:?}",
            test.follow_up
        )));
    }

    if test.executed.is_none() && test.params.is_none() {
        return Ok(());
    }
    let RewrittenStatement::Single(sql) = &rewritten else {
        return Err(FlowError::Assertion(
            "`executed` and `params` need a single rewritten statement".to_string(),
        ));
    };
    let parameterized = parameterize(sql, config.max_statement_bytes)
        .map_err(|error| FlowError::Statement(error.to_string()))?;
    if let Some(expected) = &test.executed
        && expected != &parameterized.sql
    {
        return Err(FlowError::Assertion(format!(
            "executed SQL mismatch; expected:\n{expected}\nactual:\n{}",
            parameterized.sql
        )));
    }
    if let Some(expected) = &test.params {
        let actual = parameterized.params.iter().map(printed).collect::<Vec<_>>();
        if expected != &actual {
            return Err(FlowError::Assertion(format!(
                "params mismatch; expected {expected:?}, got {actual:?}"
            )));
        }
    }
    Ok(())
}

fn run_online_flow<A: EngineAdapter>(
    engine: &mut Engine<A>,
    test: &TranslationCase,
) -> Result<(), FlowError> {
    for (index, setup) in test.setup.iter().enumerate() {
        let outcome = engine.query(setup);
        if let Some(error) = outcome.error {
            return Err(FlowError::Assertion(format!(
                "setup statement {index} failed: {}",
                error.message
            )));
        }
    }

    let outcome = engine.query(&test.sql);
    if let Some(error) = &outcome.error {
        return Err(FlowError::Statement(error.message.clone()));
    }
    assert_outcome(test, &outcome).map_err(FlowError::Assertion)
}

fn assert_kind(test: &TranslationCase, statement: &Statement) -> Result<(), String> {
    match &test.kind {
        Some(expected) if expected != statement.kind.as_str() => Err(format!(
            "kind mismatch; expected {expected}, got {}",
            statement.kind
        )),
        _ => Ok(()),
    }
}

fn assert_outcome(test: &TranslationCase, outcome: &ExecutionOutcome) -> Result<(), String> {
    if let Some(expected) = &test.kind {
        let actual = outcome.kind.map(|kind| kind.as_str()).unwrap_or_default();
        if expected != actual {
            return Err(format!("kind mismatch; expected {expected}, got {actual}"));
        }
    }
    if let Some(expected) = test.affected
        && expected != outcome.affected_rows
    {
        return Err(format!(
            "affected rows mismatch; expected {expected}, got {}",
            outcome.affected_rows
        ));
    }
    if let Some(expected) = &test.rows {
        let actual = outcome.rows.iter().map(printed_row).collect::<Vec<_>>();
        if expected != &actual {
            return Err(format!("rows mismatch; expected {expected:?}, got {actual:?}"));
        }
    }
    Ok(())
}

fn printed(value: &Value) -> Option<String> {
    value.display_string()
}

fn printed_row(row: &Row) -> ExpectedRow {
    row.iter()
        .map(|(column, value)| (column.to_string(), printed(value)))
        .collect()
}

fn evaluate_expected_error(
    test: &TranslationCase,
    result: Result<(), FlowError>,
) -> Result<(), String> {
    match (test.error.as_deref(), result) {
        (None, Ok(())) => Ok(()),
        (None, Err(FlowError::Statement(message) | FlowError::Assertion(message))) => Err(message),
        (Some(expected), Ok(())) => Err(format!("expected error: {expected}, but got no error")),
        (Some(expected), Err(FlowError::Statement(actual))) => {
            if actual == expected {
                Ok(())
            } else {
                Err(format!("expected error: {expected}, but got: {actual}"))
            }
        }
        (Some(_), Err(FlowError::Assertion(message))) => Err(message),
    }
}

fn test_version(test: &TranslationCase) -> Result<Version, String> {
    let raw = test
        .server_version
        .as_deref()
        .unwrap_or(DEFAULT_SERVER_VERSION);
    Version::parse(raw).ok_or_else(|| format!("invalid server_version '{raw}'"))
}

fn version_skip_reason(test: &TranslationCase, version: &Version) -> Result<Option<String>, String> {
    if let Some(min_version) = normalized_version_requirement(test.min_version.as_deref())
        && compare_version_against_requirement(version, min_version)? == Ordering::Less
    {
        return Ok(Some(format!(
            "Version '{version}' is smaller than min_version '{min_version}'"
        )));
    }

    if let Some(max_version) = normalized_version_requirement(test.max_version.as_deref())
        && compare_version_against_requirement(version, max_version)? == Ordering::Greater
    {
        return Ok(Some(format!(
            "Version '{version}' is larger than max_version '{max_version}'"
        )));
    }

    Ok(None)
}

fn normalized_version_requirement(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

/// Compares only as many components as the requirement names, so `3.35`
/// admits every `3.35.x`.
fn compare_version_against_requirement(
    version: &Version,
    requirement: &str,
) -> Result<Ordering, String> {
    let expected = requirement
        .split('.')
        .map(|segment| parse_version_segment(requirement, segment))
        .collect::<Result<Vec<_>, _>>()?;
    let actual = [version.major, version.minor, version.patch];

    for (actual, expected) in actual.iter().zip(&expected) {
        match actual.cmp(expected) {
            Ordering::Equal => continue,
            ordering => return Ok(ordering),
        }
    }
    Ok(Ordering::Equal)
}

fn parse_version_segment(requirement: &str, segment: &str) -> Result<u16, String> {
    let digits: String = segment
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return Err(format!(
            "invalid version requirement '{requirement}': no numeric prefix in segment '{segment}'"
        ));
    }

    digits.parse::<u16>().map_err(|_| {
        format!("invalid version requirement '{requirement}': segment '{segment}' is out of range")
    })
}
