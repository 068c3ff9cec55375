mod alter;
mod create;
mod definition;
mod dml;
mod functions;
mod show;

use std::fmt;

use crate::{
    Capabilities, Statement, StatementKind, TableSchema,
    introspection,
    scan::{SqlText, trim_statement},
};

/// Stage of a table rebuild, attached to each generated statement so a failure
/// can be reported against the step that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStep {
    CreateShadowTable,
    CopyData,
    DropOldTable,
    RenameShadowTable,
    RecreateIndexes,
}

impl fmt::Display for RebuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateShadowTable => "create shadow table",
            Self::CopyData => "copy data",
            Self::DropOldTable => "drop old table",
            Self::RenameShadowTable => "rename shadow table",
            Self::RecreateIndexes => "recreate indexes",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub sql: String,
    pub context: Option<RebuildStep>,
}

impl PlanStep {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            context: None,
        }
    }

    pub fn rebuild(sql: impl Into<String>, step: RebuildStep) -> Self {
        Self {
            sql: sql.into(),
            context: Some(step),
        }
    }
}

/// Ordered statements executed as one unit, optionally followed by a statement
/// that goes back through the whole pipeline once every step succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildPlan {
    pub steps: Vec<PlanStep>,
    pub follow_up: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewrittenStatement {
    Single(String),
    Plan(RebuildPlan),
    /// Nothing to run; the statement reports success.
    Noop,
}

impl RewrittenStatement {
    pub(crate) fn with_follow_up(self, follow_up: Option<String>) -> Self {
        let Some(follow_up) = follow_up else {
            return self;
        };
        let steps = match self {
            Self::Single(sql) => vec![PlanStep::new(sql)],
            Self::Plan(plan) => plan.steps,
            Self::Noop => Vec::new(),
        };
        Self::Plan(RebuildPlan {
            steps,
            follow_up: Some(follow_up),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    pub capabilities: Capabilities,
    /// Current schema of the statement's target table, when it has one.
    pub schema: Option<&'a TableSchema>,
    pub database_name: &'a str,
}

/// Translates a classified statement into the embedded engine's dialect.
///
/// Constructs without an equivalent are passed through; the engine reports
/// them when they run.
pub fn rewrite(statement: &Statement, context: &RewriteContext<'_>) -> RewrittenStatement {
    let sql = trim_statement(&statement.sql);
    let expressions = |sql: &str| functions::translate(sql, context.database_name);

    match statement.kind {
        StatementKind::Select => RewrittenStatement::Single(expressions(sql)),
        StatementKind::Insert | StatementKind::Replace => {
            RewrittenStatement::Single(expressions(&dml::insert(sql, &context.capabilities)))
        }
        StatementKind::Update => RewrittenStatement::Single(expressions(&dml::update(sql))),
        StatementKind::Delete => RewrittenStatement::Single(expressions(&dml::delete(sql))),
        StatementKind::Create => create::rewrite(sql),
        StatementKind::Alter => alter::rewrite(sql, context.schema),
        StatementKind::DropIndex => alter::drop_index_statement(sql, context.schema),
        StatementKind::Drop => show::drop(sql),
        StatementKind::Truncate => show::truncate(sql, context.schema),
        StatementKind::Optimize => RewrittenStatement::Single("VACUUM".to_string()),
        StatementKind::Show => show::tables(sql, context.database_name),
        StatementKind::Describe | StatementKind::ShowColumns => {
            show::columns(statement.kind, sql)
        }
        StatementKind::ShowIndex => show::indexes(sql),
        StatementKind::Check => RewrittenStatement::Single("PRAGMA quick_check".to_string()),
        StatementKind::Analyze => show::analyze(sql),
        StatementKind::Pragma | StatementKind::Explain => {
            RewrittenStatement::Single(sql.to_string())
        }
        StatementKind::Set
        | StatementKind::Begin
        | StatementKind::Commit
        | StatementKind::Rollback
        | StatementKind::FoundRows
        | StatementKind::ShowVariables
        | StatementKind::ShowStatus => RewrittenStatement::Noop,
    }
}

/// The table whose current schema the rewrite of `statement` depends on.
pub fn target_table(statement: &Statement) -> Option<String> {
    let sql = trim_statement(&statement.sql);
    match statement.kind {
        StatementKind::Alter => alter::target_table(sql),
        StatementKind::DropIndex => alter::drop_index_target(sql).map(|(table, _)| table),
        StatementKind::Truncate => {
            introspection::parse(statement.kind, sql).tables.into_iter().next()
        }
        _ => None,
    }
}

/// Whether a select asks for its unlimited row count to be remembered.
pub fn calculates_found_rows(sql: &str) -> bool {
    SqlText::new(sql)
        .find_keywords(&["SQL_CALC_FOUND_ROWS"], 0)
        .is_some()
}

/// MySQL-dialect query counting the rows `sql` would return without its
/// outermost `LIMIT`.
pub fn found_rows_query(sql: &str) -> String {
    let sql = trim_statement(sql);
    let text = SqlText::new(sql);
    let unlimited = match text.find_top_level(&["LIMIT"], 0..text.len()) {
        Some(limit) => text.slice(0..limit.start).trim_end(),
        None => sql,
    };
    format!("SELECT COUNT(*) FROM ({unlimited}) AS found_rows_source")
}
