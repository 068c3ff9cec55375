use std::fmt;

use sqlparser::{
    dialect::MySqlDialect,
    tokenizer::{Token, Tokenizer},
};
use tracing::debug;

use crate::{ClassifyError, scan::SqlText};

const PREFIX_LIMIT: usize = 512;
const LEADING_WORDS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Replace,
    Create,
    Alter,
    Drop,
    DropIndex,
    Truncate,
    Optimize,
    Describe,
    Show,
    ShowColumns,
    ShowIndex,
    ShowVariables,
    ShowStatus,
    Check,
    Analyze,
    Set,
    Begin,
    Commit,
    Rollback,
    FoundRows,
    Pragma,
    Explain,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Replace => "replace",
            Self::Create => "create",
            Self::Alter => "alter",
            Self::Drop => "drop",
            Self::DropIndex => "drop_index",
            Self::Truncate => "truncate",
            Self::Optimize => "optimize",
            Self::Describe => "describe",
            Self::Show => "show",
            Self::ShowColumns => "showcolumns",
            Self::ShowIndex => "showindex",
            Self::ShowVariables => "show_variables",
            Self::ShowStatus => "showstatus",
            Self::Check => "check",
            Self::Analyze => "analyze",
            Self::Set => "set",
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::FoundRows => "foundrows",
            Self::Pragma => "pragma",
            Self::Explain => "explain",
        }
    }

    pub fn returns_rows(self) -> bool {
        matches!(
            self,
            Self::Select
                | Self::Describe
                | Self::Show
                | Self::ShowColumns
                | Self::ShowIndex
                | Self::ShowVariables
                | Self::ShowStatus
                | Self::Check
                | Self::Analyze
                | Self::FoundRows
                | Self::Pragma
                | Self::Explain
        )
    }

    pub fn reports_affected_rows(self) -> bool {
        matches!(
            self,
            Self::Insert | Self::Replace | Self::Update | Self::Delete
        )
    }

    /// Whether literals in the rewritten text become bound parameters. DDL and
    /// engine-native commands keep their literal text verbatim.
    pub fn parameterized(self) -> bool {
        matches!(
            self,
            Self::Select
                | Self::Insert
                | Self::Update
                | Self::Delete
                | Self::Replace
                | Self::Show
                | Self::ShowIndex
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub kind: StatementKind,
}

impl Statement {
    pub fn classify(sql: &str) -> Result<Self, ClassifyError> {
        let kind = classify(sql)?;
        Ok(Self {
            sql: sql.to_string(),
            kind,
        })
    }
}

/// Determines the statement kind from the leading keyword sequence.
pub fn classify(sql: &str) -> Result<StatementKind, ClassifyError> {
    let words = leading_words(sql);
    let word = |index: usize| words.get(index).map(String::as_str).unwrap_or_default();
    let unrecognized = || ClassifyError::Unrecognized {
        sql: sql.to_string(),
    };

    let kind = match word(0) {
        "SELECT" if word(1) == "FOUND_ROWS" => StatementKind::FoundRows,
        "SELECT" | "WITH" => StatementKind::Select,
        "INSERT" => StatementKind::Insert,
        "REPLACE" => StatementKind::Replace,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        "CREATE" => StatementKind::Create,
        "ALTER" => StatementKind::Alter,
        "DROP" if word(1) == "INDEX" && has_on_clause(sql) => StatementKind::DropIndex,
        "DROP" => StatementKind::Drop,
        "TRUNCATE" => StatementKind::Truncate,
        "OPTIMIZE" => StatementKind::Optimize,
        "DESCRIBE" | "DESC" => StatementKind::Describe,
        "SHOW" => classify_show(&words[1..]).ok_or_else(|| ClassifyError::UnsupportedShow {
            sql: sql.to_string(),
        })?,
        "CHECK" => StatementKind::Check,
        "ANALYZE" => StatementKind::Analyze,
        "SET" => StatementKind::Set,
        "BEGIN" => StatementKind::Begin,
        "START" if word(1) == "TRANSACTION" => StatementKind::Begin,
        "COMMIT" => StatementKind::Commit,
        "ROLLBACK" => StatementKind::Rollback,
        "PRAGMA" => StatementKind::Pragma,
        "EXPLAIN" => StatementKind::Explain,
        _ => return Err(unrecognized()),
    };

    debug!(kind = kind.as_str(), "classified statement");
    Ok(kind)
}

fn classify_show(words: &[String]) -> Option<StatementKind> {
    let mut rest = words;
    while let Some((first, tail)) = rest.split_first() {
        if matches!(first.as_str(), "FULL" | "GLOBAL" | "SESSION") {
            rest = tail;
        } else {
            break;
        }
    }

    match rest.first().map(String::as_str)? {
        "TABLE" if rest.get(1).map(String::as_str) == Some("STATUS") => {
            Some(StatementKind::ShowStatus)
        }
        "TABLES" => Some(StatementKind::Show),
        "COLUMNS" | "FIELDS" => Some(StatementKind::ShowColumns),
        "INDEX" | "INDEXES" | "KEYS" => Some(StatementKind::ShowIndex),
        "VARIABLES" => Some(StatementKind::ShowVariables),
        _ => None,
    }
}

/// Upper-cased bare words at the start of the statement, tokenized from a
/// masked prefix so comments and quoted text never contribute.
fn leading_words(sql: &str) -> Vec<String> {
    let text = SqlText::new(sql);
    let masked = text.masked();
    let mut cut = masked
        .find(['\'', '"', '`'])
        .unwrap_or(masked.len())
        .min(PREFIX_LIMIT);
    while !masked.is_char_boundary(cut) {
        cut -= 1;
    }

    let Ok(tokens) = Tokenizer::new(&MySqlDialect {}, &masked[..cut]).tokenize() else {
        return Vec::new();
    };

    let mut words = Vec::new();
    for token in tokens {
        match token {
            Token::Whitespace(_) => {}
            Token::LParen if words.is_empty() => {}
            Token::Word(word) if word.quote_style.is_none() => {
                words.push(word.value.to_ascii_uppercase());
                if words.len() == LEADING_WORDS {
                    break;
                }
            }
            _ => break,
        }
    }
    words
}

fn has_on_clause(sql: &str) -> bool {
    SqlText::new(sql).find_keywords(&["ON"], 0).is_some()
}
