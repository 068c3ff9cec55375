use crate::{Error, ErrorCode, Row, StatementKind};

/// Failure flattened to the code and message pair handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeError {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&Error> for OutcomeError {
    fn from(error: &Error) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Result of one call to [`crate::Engine::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// `None` when classification itself failed.
    pub kind: Option<StatementKind>,
    pub rows: Vec<Row>,
    pub affected_rows: u64,
    pub last_insert_id: i64,
    pub error: Option<OutcomeError>,
}

/// The one field of an outcome that is meaningful for its statement kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReturnValue<'a> {
    Rows(&'a [Row]),
    Affected(u64),
    Success(bool),
}

impl ExecutionOutcome {
    pub(crate) fn empty(kind: StatementKind) -> Self {
        Self {
            kind: Some(kind),
            rows: Vec::new(),
            affected_rows: 0,
            last_insert_id: 0,
            error: None,
        }
    }

    pub(crate) fn with_rows(kind: StatementKind, rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::empty(kind)
        }
    }

    pub(crate) fn failed(kind: Option<StatementKind>, error: &Error) -> Self {
        Self {
            kind,
            rows: Vec::new(),
            affected_rows: 0,
            last_insert_id: 0,
            error: Some(OutcomeError::from(error)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn return_value(&self) -> ReturnValue<'_> {
        match self.kind {
            Some(kind) if self.error.is_none() && kind.returns_rows() => {
                ReturnValue::Rows(&self.rows)
            }
            Some(kind) if self.error.is_none() && kind.reports_affected_rows() => {
                ReturnValue::Affected(self.affected_rows)
            }
            _ => ReturnValue::Success(self.error.is_none()),
        }
    }
}
