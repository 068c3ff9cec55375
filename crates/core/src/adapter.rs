use crate::{EngineResult, Row, TableSchema, Value, Version};

/// Counters reported by the engine after a data-modifying statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Changes {
    pub affected_rows: u64,
    pub last_insert_id: i64,
}

/// Synchronous boundary to the embedded engine.
///
/// `prepare` compiles a statement without running it; adapters are expected
/// to keep compiled plans keyed by SQL text so a following `query` or
/// `execute` of the same text reuses the plan.
pub trait EngineAdapter {
    fn prepare(&self, sql: &str) -> EngineResult<()>;
    fn query(&self, sql: &str, params: &[Value]) -> EngineResult<Vec<Row>>;
    fn execute(&self, sql: &str, params: &[Value]) -> EngineResult<Changes>;
    fn table_schema(&self, table: &str) -> EngineResult<Option<TableSchema>>;
    fn begin(&self) -> EngineResult<()>;
    fn commit(&self) -> EngineResult<()>;
    fn rollback(&self) -> EngineResult<()>;
    fn server_version(&self) -> Version;
}
