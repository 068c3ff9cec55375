mod adapter;
mod classifier;
mod config;
mod engine;
mod error;
mod introspection;
mod outcome;
mod parameterizer;
mod rewriter;
mod scan;
mod schema;
mod shaper;
mod splitter;
mod trace;
mod value;

pub use adapter::{Changes, EngineAdapter};
pub use classifier::{Statement, StatementKind, classify};
pub use config::{
    Backoff, Capabilities, ConnectionConfig, EngineConfig, MysqlFeature, REPORTED_MYSQL_VERSION,
    RetryPolicy, Version,
};
pub use engine::{Engine, MAX_FOLLOW_UP_DEPTH};
pub use error::{
    ClassifyError, ConnectError, EngineError, EngineErrorCode, EngineResult, Error, ErrorCode,
    ExecutionError, ParameterizeError, Phase, Result, TransactionError,
};
pub use outcome::{ExecutionOutcome, OutcomeError, ReturnValue};
pub use parameterizer::{ParameterizedSql, parameterize};
pub use rewriter::{
    PlanStep, RebuildPlan, RebuildStep, RewriteContext, RewrittenStatement, calculates_found_rows,
    found_rows_query, rewrite, target_table,
};
pub use schema::{ColumnInfo, IndexInfo, IndexOrigin, TableSchema};
pub use shaper::{shape as shape_result, variables};
pub use splitter::{split_insert, split_script};
pub use trace::StatementTrace;
pub use value::{Row, Value};
