use std::thread;

use tracing::{debug, warn};

use crate::{
    Capabilities, EngineAdapter, EngineConfig, EngineError, EngineResult, Error, ExecutionError,
    ExecutionOutcome, Phase, RebuildPlan, RebuildStep, Result, RetryPolicy, Row, Statement,
    StatementKind, TransactionError, Value, introspection,
    parameterizer::parameterize,
    rewriter::{
        RewriteContext, RewrittenStatement, calculates_found_rows, found_rows_query, rewrite,
        target_table,
    },
    shaper,
    splitter::split_insert,
    trace::StatementTrace,
};

/// Follow-up statements may themselves produce follow-ups; this bounds the
/// chain.
pub const MAX_FOLLOW_UP_DEPTH: usize = 32;

/// Runs MySQL-dialect statements against an embedded engine adapter.
///
/// The engine owns its adapter. All per-statement state lives in the call;
/// only the found-rows slot and the transaction flag persist between calls.
pub struct Engine<A> {
    adapter: A,
    config: EngineConfig,
    capabilities: Capabilities,
    found_rows: Option<u64>,
    in_transaction: bool,
    trace: Option<StatementTrace>,
}

/// What executing one rewritten statement produced besides its outcome.
struct Executed {
    outcome: ExecutionOutcome,
    found_rows: Option<u64>,
    follow_up: Option<String>,
}

impl Executed {
    fn finished(outcome: ExecutionOutcome) -> Self {
        Self {
            outcome,
            found_rows: None,
            follow_up: None,
        }
    }
}

impl<A: EngineAdapter> Engine<A> {
    pub fn new(adapter: A, config: EngineConfig) -> Self {
        let capabilities = Capabilities::for_version(&adapter.server_version());
        let trace = config.trace_file.clone().map(StatementTrace::new);
        Self {
            adapter,
            config,
            capabilities,
            found_rows: None,
            in_transaction: false,
            trace,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Runs one statement. Failures are reported in the outcome's `error`
    /// field; this never panics or returns early on engine errors.
    pub fn query(&mut self, sql: &str) -> ExecutionOutcome {
        self.run(sql, 0)
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(TransactionError::AlreadyActive.into());
        }
        retry(&self.config.retry, Phase::Execute, 0, "BEGIN", None, || {
            self.adapter.begin()
        })?;
        self.in_transaction = true;
        Ok(())
    }

    /// Clears the transaction flag whether or not the engine accepted the
    /// commit.
    pub fn commit(&mut self) -> Result<()> {
        let committed = retry(&self.config.retry, Phase::Execute, 0, "COMMIT", None, || {
            self.adapter.commit()
        });
        self.in_transaction = false;
        committed
    }

    pub fn rollback(&mut self) -> Result<()> {
        let rolled_back = retry(&self.config.retry, Phase::Execute, 0, "ROLLBACK", None, || {
            self.adapter.rollback()
        });
        self.in_transaction = false;
        rolled_back
    }

    fn run(&mut self, sql: &str, depth: usize) -> ExecutionOutcome {
        self.record("raw", sql);
        let statement = match Statement::classify(sql) {
            Ok(statement) => statement,
            Err(error) => {
                let error = Error::from(error);
                debug!(%error, "statement rejected");
                return ExecutionOutcome::failed(None, &error);
            }
        };

        let kind = statement.kind;
        self.dispatch(&statement, depth).unwrap_or_else(|error| {
            debug!(kind = %kind, %error, "statement failed");
            ExecutionOutcome::failed(Some(kind), &error)
        })
    }

    fn dispatch(&mut self, statement: &Statement, depth: usize) -> Result<ExecutionOutcome> {
        let kind = statement.kind;
        match kind {
            StatementKind::FoundRows => {
                let count = self.found_rows.take().unwrap_or_default();
                return Ok(ExecutionOutcome::with_rows(kind, shaper::found_rows(count)));
            }
            StatementKind::ShowVariables => {
                return Ok(ExecutionOutcome::with_rows(kind, shaper::variables(&statement.sql)));
            }
            StatementKind::ShowStatus => {
                return Ok(ExecutionOutcome::with_rows(
                    kind,
                    shaper::table_status(&statement.sql),
                ));
            }
            StatementKind::Set => return Ok(ExecutionOutcome::empty(kind)),
            StatementKind::Begin => {
                self.begin_transaction()?;
                return Ok(ExecutionOutcome::empty(kind));
            }
            StatementKind::Commit => {
                self.commit()?;
                return Ok(ExecutionOutcome::empty(kind));
            }
            StatementKind::Rollback => {
                self.rollback()?;
                return Ok(ExecutionOutcome::empty(kind));
            }
            _ => {}
        }

        let executed = self.execute_statement(statement)?;
        if let Some(count) = executed.found_rows {
            self.found_rows = Some(count);
        }

        let Some(follow_up) = executed.follow_up else {
            return Ok(executed.outcome);
        };
        if depth >= MAX_FOLLOW_UP_DEPTH {
            return Err(ExecutionError::FollowUpDepthExceeded {
                limit: MAX_FOLLOW_UP_DEPTH,
            }
            .into());
        }
        debug!(sql = %follow_up, depth = depth + 1, "resubmitting follow-up statement");
        let resubmitted = self.run(&follow_up, depth + 1);
        Ok(ExecutionOutcome {
            error: resubmitted.error,
            ..executed.outcome
        })
    }

    fn execute_statement(&self, statement: &Statement) -> Result<Executed> {
        let kind = statement.kind;
        let schema = match target_table(statement) {
            Some(table) => retry(&self.config.retry, Phase::Prepare, 0, &statement.sql, None, || {
                self.adapter.table_schema(&table)
            })?,
            None => None,
        };
        let context = RewriteContext {
            capabilities: self.capabilities,
            schema: schema.as_ref(),
            database_name: &self.config.database_name,
        };

        if matches!(kind, StatementKind::Insert | StatementKind::Replace)
            && !self.capabilities.multi_row_insert
            && let Some(rows) = split_insert(&statement.sql, &self.config.atomic_insert_tables)
        {
            return self.execute_split_insert(kind, &rows, &context).map(Executed::finished);
        }

        match rewrite(statement, &context) {
            RewrittenStatement::Noop => {
                debug!(kind = %kind, "nothing to execute");
                Ok(Executed::finished(ExecutionOutcome::empty(kind)))
            }
            RewrittenStatement::Single(sql) => {
                self.record("rewritten", &sql);
                let outcome = self.execute_single(statement, &sql)?;
                let found_rows = (kind == StatementKind::Select
                    && calculates_found_rows(&statement.sql))
                .then(|| self.count_found_rows(statement, &context, outcome.rows.len()));
                Ok(Executed {
                    outcome,
                    found_rows,
                    follow_up: None,
                })
            }
            RewrittenStatement::Plan(plan) => {
                self.execute_plan(&plan)?;
                Ok(Executed {
                    outcome: ExecutionOutcome::empty(kind),
                    found_rows: None,
                    follow_up: plan.follow_up,
                })
            }
        }
    }

    fn execute_single(&self, statement: &Statement, rewritten: &str) -> Result<ExecutionOutcome> {
        let kind = statement.kind;
        let (sql, params) = if kind.parameterized() {
            let parameterized = parameterize(rewritten, self.config.max_statement_bytes)?;
            (parameterized.sql, parameterized.params)
        } else {
            (rewritten.to_string(), Vec::new())
        };
        self.record("executed", &sql);
        debug!(kind = %kind, sql = %sql, params = params.len(), "executing statement");

        let policy = &self.config.retry;
        retry(policy, Phase::Prepare, 0, &sql, None, || self.adapter.prepare(&sql))?;

        if kind.returns_rows() {
            let rows = retry(policy, Phase::Execute, 0, &sql, None, || {
                self.adapter.query(&sql, &params)
            })?;
            if rows.is_empty() && matches!(kind, StatementKind::Describe | StatementKind::ShowColumns)
            {
                // table_info answers an unknown table with no rows.
                let table = introspection::parse(kind, &statement.sql)
                    .table()
                    .unwrap_or_default()
                    .to_string();
                return Err(ExecutionError::StatementFailed {
                    step: 0,
                    phase: Phase::Execute,
                    sql,
                    context: None,
                    source: EngineError::no_such_table(&table),
                }
                .into());
            }
            let rows = shaper::shape(kind, &statement.sql, rows, &self.config.database_name);
            return Ok(ExecutionOutcome::with_rows(kind, rows));
        }

        let changes = retry(policy, Phase::Execute, 0, &sql, None, || {
            self.adapter.execute(&sql, &params)
        })?;
        let mut outcome = ExecutionOutcome::empty(kind);
        if kind.reports_affected_rows() {
            outcome.affected_rows = changes.affected_rows;
            outcome.last_insert_id = changes.last_insert_id;
        }
        Ok(outcome)
    }

    /// Executes one statement per row tuple. Consecutive rows with identical
    /// parameterized text share one prepared plan. Only the last row's counters
    /// are reported.
    fn execute_split_insert(
        &self,
        kind: StatementKind,
        rows: &[String],
        context: &RewriteContext<'_>,
    ) -> Result<ExecutionOutcome> {
        debug!(kind = %kind, rows = rows.len(), "splitting multi-row insert");
        let policy = &self.config.retry;
        let mut prepared: Option<String> = None;
        let mut outcome = ExecutionOutcome::empty(kind);

        for (step, row) in rows.iter().enumerate() {
            let row_statement = Statement {
                sql: row.clone(),
                kind,
            };
            let rewritten = match rewrite(&row_statement, context) {
                RewrittenStatement::Single(sql) => sql,
                _ => row.clone(),
            };
            let parameterized = parameterize(&rewritten, self.config.max_statement_bytes)?;
            let sql = parameterized.sql;
            self.record("executed", &sql);

            if prepared.as_deref() != Some(sql.as_str()) {
                retry(policy, Phase::Prepare, step, &sql, None, || self.adapter.prepare(&sql))?;
                prepared = Some(sql.clone());
            }
            let changes = retry(policy, Phase::Execute, step, &sql, None, || {
                self.adapter.execute(&sql, &parameterized.params)
            })?;
            outcome.affected_rows = changes.affected_rows;
            outcome.last_insert_id = changes.last_insert_id;
        }
        Ok(outcome)
    }

    /// Runs every step of a plan in order, stopping at the first failure.
    /// Steps already applied stay applied.
    fn execute_plan(&self, plan: &RebuildPlan) -> Result<()> {
        let policy = &self.config.ddl_retry;
        for (step, planned) in plan.steps.iter().enumerate() {
            let sql = planned.sql.as_str();
            self.record("executed", sql);
            debug!(step, context = ?planned.context, sql, "executing plan step");
            retry(policy, Phase::Prepare, step, sql, planned.context, || {
                self.adapter.prepare(sql)
            })?;
            retry(policy, Phase::Execute, step, sql, planned.context, || {
                self.adapter.execute(sql, &[])
            })?;
        }
        Ok(())
    }

    /// Row count the select would return without its `LIMIT`. Falls back to
    /// the fetched row count when the counting query cannot run.
    fn count_found_rows(
        &self,
        statement: &Statement,
        context: &RewriteContext<'_>,
        fetched: usize,
    ) -> u64 {
        match self.run_found_rows_query(statement, context) {
            Ok(Some(count)) => u64::try_from(count).unwrap_or_default(),
            Ok(None) => fetched as u64,
            Err(error) => {
                debug!(%error, "found-rows count failed, using fetched row count");
                fetched as u64
            }
        }
    }

    fn run_found_rows_query(
        &self,
        statement: &Statement,
        context: &RewriteContext<'_>,
    ) -> Result<Option<i64>> {
        let counting = Statement {
            sql: found_rows_query(&statement.sql),
            kind: StatementKind::Select,
        };
        let RewrittenStatement::Single(rewritten) = rewrite(&counting, context) else {
            return Ok(None);
        };
        let parameterized = parameterize(&rewritten, self.config.max_statement_bytes)?;
        let rows = self.query_with_retry(&parameterized.sql, &parameterized.params)?;
        Ok(rows
            .first()
            .and_then(|row| row.value_at(0))
            .and_then(Value::as_i64))
    }

    fn query_with_retry(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let policy = &self.config.retry;
        retry(policy, Phase::Prepare, 0, sql, None, || self.adapter.prepare(sql))?;
        retry(policy, Phase::Execute, 0, sql, None, || self.adapter.query(sql, params))
    }

    fn record(&self, label: &str, text: &str) {
        if let Some(trace) = &self.trace {
            trace.record(label, text);
        }
    }
}

/// Calls `op` until it succeeds, fails with a non-transient error, or the
/// policy's attempts run out. Only busy and locked conditions are retried.
fn retry<T>(
    policy: &RetryPolicy,
    phase: Phase,
    step: usize,
    sql: &str,
    context: Option<RebuildStep>,
    mut op: impl FnMut() -> EngineResult<T>,
) -> Result<T> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(source) if source.is_transient() => {
                if attempt >= max_attempts {
                    warn!(attempts = attempt, %phase, code = %source.code, sql, "lock did not clear");
                    return Err(ExecutionError::LockContention {
                        attempts: attempt,
                        phase,
                        sql: sql.to_string(),
                        source,
                    }
                    .into());
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    %phase,
                    code = %source.code,
                    delay_ms = delay.as_millis() as u64,
                    "engine reported a transient lock, retrying"
                );
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                attempt += 1;
            }
            Err(source) => {
                return Err(ExecutionError::StatementFailed {
                    step,
                    phase,
                    sql: sql.to_string(),
                    context,
                    source,
                }
                .into());
            }
        }
    }
}
