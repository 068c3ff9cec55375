use std::{cell::RefCell, collections::HashMap};

use mylite_core::{
    Changes, EngineAdapter, EngineError, EngineErrorCode, EngineResult, Row, TableSchema, Value,
    Version,
};

pub const MODERN: Version = Version::new(3, 45, 0);
pub const LEGACY: Version = Version::new(3, 7, 2);

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Prepare(String),
    Query(String, Vec<Value>),
    Execute(String, Vec<Value>),
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug)]
struct TransientRule {
    fragment: String,
    code: EngineErrorCode,
    remaining: u32,
}

#[derive(Debug)]
struct FailureRule {
    fragment: String,
    message: String,
}

#[derive(Debug)]
struct FakeAdapterState {
    server_version: Version,
    calls: Vec<Call>,
    rows: Vec<(String, Vec<Row>)>,
    schemas: HashMap<String, TableSchema>,
    changes: Changes,
    transient: Vec<TransientRule>,
    fail_on_sql: Option<FailureRule>,
    fail_commit: bool,
}

/// Scripted engine: records every call, answers queries from registered row
/// sets, and injects transient or permanent failures for matching SQL.
#[derive(Debug)]
pub struct FakeAdapter {
    state: RefCell<FakeAdapterState>,
}

impl Default for FakeAdapter {
    fn default() -> Self {
        Self::with_version(MODERN)
    }
}

#[allow(dead_code)]
impl FakeAdapter {
    pub fn with_version(server_version: Version) -> Self {
        Self {
            state: RefCell::new(FakeAdapterState {
                server_version,
                calls: Vec::new(),
                rows: Vec::new(),
                schemas: HashMap::new(),
                changes: Changes {
                    affected_rows: 1,
                    last_insert_id: 0,
                },
                transient: Vec::new(),
                fail_on_sql: None,
                fail_commit: false,
            }),
        }
    }

    /// Answers queries whose SQL contains `fragment` with `rows`. Later
    /// registrations win.
    pub fn respond_with(&self, fragment: impl Into<String>, rows: Vec<Row>) {
        self.state.borrow_mut().rows.insert(0, (fragment.into(), rows));
    }

    pub fn set_schema(&self, schema: TableSchema) {
        self.state
            .borrow_mut()
            .schemas
            .insert(schema.name.to_ascii_lowercase(), schema);
    }

    pub fn set_changes(&self, affected_rows: u64, last_insert_id: i64) {
        self.state.borrow_mut().changes = Changes {
            affected_rows,
            last_insert_id,
        };
    }

    /// Fails the next `times` executions of SQL containing `fragment` with a
    /// transient lock error.
    pub fn fail_transiently(&self, fragment: impl Into<String>, code: EngineErrorCode, times: u32) {
        self.state.borrow_mut().transient.push(TransientRule {
            fragment: fragment.into(),
            code,
            remaining: times,
        });
    }

    pub fn set_fail_on_sql(&self, fragment: impl Into<String>, message: impl Into<String>) {
        self.state.borrow_mut().fail_on_sql = Some(FailureRule {
            fragment: fragment.into(),
            message: message.into(),
        });
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.state.borrow_mut().fail_commit = fail;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// SQL of every query and execute call, in order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Query(sql, _) | Call::Execute(sql, _) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn prepared_sql(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Prepare(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn execute_params(&self) -> Vec<Vec<Value>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Query(_, params) | Call::Execute(_, params) => Some(params),
                _ => None,
            })
            .collect()
    }

    fn check_failures(&self, sql: &str) -> EngineResult<()> {
        let mut state = self.state.borrow_mut();
        if let Some(rule) = state
            .transient
            .iter_mut()
            .find(|rule| rule.remaining > 0 && sql.contains(&rule.fragment))
        {
            rule.remaining -= 1;
            return Err(match rule.code {
                EngineErrorCode::Locked => EngineError::locked(),
                _ => EngineError::busy(),
            });
        }
        if let Some(rule) = &state.fail_on_sql
            && sql.contains(&rule.fragment)
        {
            return Err(EngineError::other(1, rule.message.clone()));
        }
        Ok(())
    }
}

impl EngineAdapter for FakeAdapter {
    fn prepare(&self, sql: &str) -> EngineResult<()> {
        self.state
            .borrow_mut()
            .calls
            .push(Call::Prepare(sql.to_string()));
        Ok(())
    }

    fn query(&self, sql: &str, params: &[Value]) -> EngineResult<Vec<Row>> {
        self.state
            .borrow_mut()
            .calls
            .push(Call::Query(sql.to_string(), params.to_vec()));
        self.check_failures(sql)?;
        let state = self.state.borrow();
        Ok(state
            .rows
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    fn execute(&self, sql: &str, params: &[Value]) -> EngineResult<Changes> {
        self.state
            .borrow_mut()
            .calls
            .push(Call::Execute(sql.to_string(), params.to_vec()));
        self.check_failures(sql)?;
        Ok(self.state.borrow().changes)
    }

    fn table_schema(&self, table: &str) -> EngineResult<Option<TableSchema>> {
        Ok(self
            .state
            .borrow()
            .schemas
            .get(&table.to_ascii_lowercase())
            .cloned())
    }

    fn begin(&self) -> EngineResult<()> {
        self.state.borrow_mut().calls.push(Call::Begin);
        Ok(())
    }

    fn commit(&self) -> EngineResult<()> {
        self.state.borrow_mut().calls.push(Call::Commit);
        if self.state.borrow().fail_commit {
            return Err(EngineError::other(1, "cannot commit - no transaction is active"));
        }
        Ok(())
    }

    fn rollback(&self) -> EngineResult<()> {
        self.state.borrow_mut().calls.push(Call::Rollback);
        Ok(())
    }

    fn server_version(&self) -> Version {
        self.state.borrow().server_version
    }
}
