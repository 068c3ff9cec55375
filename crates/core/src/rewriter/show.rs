//! Introspection and maintenance statements answered from the engine's
//! catalog.

use super::{PlanStep, RebuildPlan, RewrittenStatement};
use crate::{
    StatementKind, TableSchema,
    introspection::{self, Filter},
    scan::{SqlText, mysql_string_literal, quote_identifier, sqlite_string_literal},
};

/// `SHOW [FULL] TABLES [LIKE … | WHERE …]` as a catalog query. Literals are
/// written in MySQL syntax because the result is parameterized.
pub(super) fn tables(sql: &str, database_name: &str) -> RewrittenStatement {
    let parsed = introspection::parse(StatementKind::Show, sql);
    let column = format!("Tables_in_{database_name}");

    let mut query = format!("SELECT name AS {}", quote_identifier(&column));
    if parsed.full {
        query.push_str(", 'BASE TABLE' AS `Table_type`");
    }
    query.push_str(" FROM sqlite_master WHERE type = 'table' AND substr(name, 1, 7) <> 'sqlite_'");

    match &parsed.filter {
        Some(Filter::Like(pattern)) => {
            query.push_str(&format!(
                " AND name LIKE {} ESCAPE {}",
                mysql_string_literal(pattern),
                mysql_string_literal("\\")
            ));
        }
        Some(Filter::Equals { field, value })
            if field.eq_ignore_ascii_case(&column) || field.eq_ignore_ascii_case("name") =>
        {
            query.push_str(&format!(" AND name = {}", mysql_string_literal(value)));
        }
        Some(Filter::Equals { field, value }) if field.eq_ignore_ascii_case("Table_type") => {
            if !value.eq_ignore_ascii_case("BASE TABLE") {
                query.push_str(" AND 0");
            }
        }
        _ => {}
    }
    query.push_str(" ORDER BY name");
    RewrittenStatement::Single(query)
}

/// `DESCRIBE t` and `SHOW [FULL] COLUMNS FROM t`; filters and the MySQL
/// column layout are applied when shaping the result.
pub(super) fn columns(kind: StatementKind, sql: &str) -> RewrittenStatement {
    match introspection::parse(kind, sql).table() {
        Some(table) => {
            RewrittenStatement::Single(format!("PRAGMA table_info({})", quote_identifier(table)))
        }
        None => RewrittenStatement::Single(sql.to_string()),
    }
}

pub(super) fn indexes(sql: &str) -> RewrittenStatement {
    match introspection::parse(StatementKind::ShowIndex, sql).table() {
        Some(table) => RewrittenStatement::Single(format!(
            "SELECT type, name, tbl_name, sql FROM sqlite_master WHERE tbl_name = {} COLLATE NOCASE AND type IN ('table', 'index')",
            mysql_string_literal(table)
        )),
        None => RewrittenStatement::Single(sql.to_string()),
    }
}

pub(super) fn analyze(sql: &str) -> RewrittenStatement {
    match introspection::parse(StatementKind::Analyze, sql).tables.as_slice() {
        [table] => RewrittenStatement::Single(format!("ANALYZE {}", quote_identifier(table))),
        _ => RewrittenStatement::Single("ANALYZE".to_string()),
    }
}

/// `TRUNCATE t` deletes every row and, for `AUTOINCREMENT` tables, resets the
/// key sequence.
pub(super) fn truncate(sql: &str, schema: Option<&TableSchema>) -> RewrittenStatement {
    let parsed = introspection::parse(StatementKind::Truncate, sql);
    let Some(table) = parsed.table() else {
        return RewrittenStatement::Single(sql.to_string());
    };
    let delete = format!("DELETE FROM {}", quote_identifier(table));
    if !schema.is_some_and(|schema| schema.autoincrement) {
        return RewrittenStatement::Single(delete);
    }
    RewrittenStatement::Plan(RebuildPlan {
        steps: vec![
            PlanStep::new(delete),
            PlanStep::new(format!(
                "DELETE FROM sqlite_sequence WHERE name = {}",
                sqlite_string_literal(table)
            )),
        ],
        follow_up: None,
    })
}

/// `DROP TABLE a, b` becomes one statement per table; dropping a database is
/// accepted and ignored.
pub(super) fn drop(sql: &str) -> RewrittenStatement {
    let text = SqlText::new(sql);
    let mut cursor = text.cursor();
    cursor.eat_keyword("DROP");
    if cursor.eat_keyword("DATABASE") || cursor.eat_keyword("SCHEMA") {
        return RewrittenStatement::Noop;
    }
    let temporary = cursor.eat_keyword("TEMPORARY");
    if !cursor.eat_keyword("TABLE") {
        return RewrittenStatement::Single(sql.to_string());
    }
    let if_exists = cursor.eat_keywords(&["IF", "EXISTS"]);

    let mut tables = Vec::new();
    for part in text.split_top_level(cursor.pos()..text.len(), b',') {
        let mut part = text.cursor_in(part);
        let Some(table) = part.identifier() else {
            return RewrittenStatement::Single(sql.to_string());
        };
        tables.push(table);
    }

    let statements = tables
        .iter()
        .map(|table| {
            format!(
                "DROP {}TABLE {}{}",
                if temporary { "TEMP " } else { "" },
                if if_exists { "IF EXISTS " } else { "" },
                quote_identifier(table)
            )
        })
        .collect::<Vec<_>>();
    match statements.as_slice() {
        [] => RewrittenStatement::Single(sql.to_string()),
        [single] => RewrittenStatement::Single(single.clone()),
        _ => RewrittenStatement::Plan(RebuildPlan {
            steps: statements.into_iter().map(PlanStep::new).collect(),
            follow_up: None,
        }),
    }
}
