use std::ops::Range;

use crate::{
    Capabilities,
    scan::{SqlText, quote_identifier},
};

const INSERT_MODIFIERS: [&str; 3] = ["LOW_PRIORITY", "DELAYED", "HIGH_PRIORITY"];

/// `INSERT`/`REPLACE` structure: modifiers, `SET` form, and
/// `ON DUPLICATE KEY UPDATE`.
pub(super) fn insert(sql: &str, capabilities: &Capabilities) -> String {
    let text = SqlText::new(sql);
    let mut cursor = text.cursor();
    let replace = if cursor.eat_keyword("REPLACE") {
        true
    } else if cursor.eat_keyword("INSERT") {
        false
    } else {
        return sql.to_string();
    };
    for modifier in INSERT_MODIFIERS {
        cursor.eat_keyword(modifier);
    }
    let ignore = cursor.eat_keyword("IGNORE");
    cursor.eat_keyword("INTO");
    let Some(table) = cursor.identifier() else {
        return sql.to_string();
    };

    let duplicate = text.find_top_level(&["ON", "DUPLICATE", "KEY", "UPDATE"], cursor.pos()..text.len());
    let body_end = duplicate.as_ref().map_or(text.len(), |clause| clause.start);
    let body = body(&text, cursor.pos()..body_end);

    let (head, tail) = match duplicate {
        Some(clause) if capabilities.upsert => {
            let assignments = excluded_values(&text, clause.end..text.len());
            let guard = if body.trim_start().to_ascii_uppercase().starts_with("SELECT")
                && SqlText::new(&body)
                    .find_top_level(&["WHERE"], 0..body.len())
                    .is_none()
            {
                " WHERE true"
            } else {
                ""
            };
            (
                "INSERT INTO",
                format!("{guard} ON CONFLICT DO UPDATE SET {}", assignments.trim()),
            )
        }
        Some(_) => ("INSERT OR REPLACE INTO", String::new()),
        None if replace => ("REPLACE INTO", String::new()),
        None if ignore => ("INSERT OR IGNORE INTO", String::new()),
        None => ("INSERT INTO", String::new()),
    };

    format!("{head} {} {}{tail}", quote_identifier(&table), body.trim())
}

/// Rewrites `SET a = 1, b = 2` into a column list and `VALUES` tuple, and the
/// `VALUE` spelling into `VALUES`.
fn body(text: &SqlText<'_>, range: Range<usize>) -> String {
    let mut cursor = text.cursor_in(range.clone());
    if cursor.eat_keyword("SET") {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for assignment in text.split_top_level(cursor.pos()..range.end, b',') {
            let mut part = text.cursor_in(assignment.clone());
            let Some(column) = part.identifier() else {
                return text.slice(range).to_string();
            };
            if !part.eat_byte(b'=') {
                return text.slice(range).to_string();
            }
            columns.push(quote_identifier(&column));
            values.push(text.slice(part.rest()).to_string());
        }
        return format!("({}) VALUES ({})", columns.join(", "), values.join(", "));
    }

    if let Some(value) = text.find_top_level(&["VALUE"], range.clone()) {
        return format!(
            "{}VALUES{}",
            text.slice(range.start..value.start),
            text.slice(value.end..range.end)
        );
    }
    text.slice(range).to_string()
}

/// Replaces `VALUES(col)` references in upsert assignments with
/// `excluded.col`.
fn excluded_values(text: &SqlText<'_>, range: Range<usize>) -> String {
    let mut out = String::new();
    let mut last = range.start;
    let mut from = range.start;
    while let Some(found) = text.find_keywords(&["VALUES"], from) {
        if found.start >= range.end {
            break;
        }
        let mut cursor = text.cursor_in(found.end..range.end);
        match cursor.paren_group() {
            Some(inner) => {
                let column = text.cursor_in(inner).identifier().unwrap_or_default();
                out.push_str(text.slice(last..found.start));
                out.push_str(&format!("excluded.{}", quote_identifier(&column)));
                last = cursor.pos();
                from = cursor.pos();
            }
            None => from = found.end,
        }
    }
    out.push_str(text.slice(last..range.end));
    out
}

struct Clauses {
    table: Range<usize>,
    head: Range<usize>,
    condition: Option<Range<usize>>,
    order_by: Option<Range<usize>>,
    limit: Option<Range<usize>>,
}

/// Locates the trailing `WHERE`, `ORDER BY` and `LIMIT` clauses in
/// `range`, in that order.
fn trailing_clauses(text: &SqlText<'_>, table: Range<usize>, range: Range<usize>) -> Clauses {
    let limit = text.find_top_level(&["LIMIT"], range.clone());
    let order = text.find_top_level(&["ORDER", "BY"], range.clone());
    let condition = text.find_top_level(&["WHERE"], range.clone());

    let limit_range = limit.as_ref().map(|found| found.start..range.end);
    let order_end = limit.as_ref().map_or(range.end, |found| found.start);
    let order_range = order.as_ref().map(|found| found.start..order_end);
    let condition_end = order
        .as_ref()
        .or(limit.as_ref())
        .map_or(range.end, |found| found.start);
    let condition_range = condition.as_ref().map(|found| found.end..condition_end);
    let head_end = condition
        .as_ref()
        .or(order.as_ref())
        .or(limit.as_ref())
        .map_or(range.end, |found| found.start);

    Clauses {
        table,
        head: range.start..head_end,
        condition: condition_range.map(|range| text.trim(range)),
        order_by: order_range.map(|range| text.trim(range)),
        limit: limit_range.map(|range| text.trim(range)),
    }
}

impl Clauses {
    /// `WHERE rowid IN (SELECT rowid FROM t … LIMIT n)` standing in for
    /// `ORDER BY … LIMIT n` on single-table writes.
    fn render_tail(&self, text: &SqlText<'_>) -> String {
        let where_clause = |condition: &Range<usize>| format!(" WHERE {}", text.slice(condition.clone()));
        match &self.limit {
            Some(limit) => {
                let mut subquery = format!("SELECT rowid FROM {}", text.slice(self.table.clone()));
                if let Some(condition) = &self.condition {
                    subquery.push_str(&where_clause(condition));
                }
                if let Some(order) = &self.order_by {
                    subquery.push(' ');
                    subquery.push_str(text.slice(order.clone()));
                }
                subquery.push(' ');
                subquery.push_str(text.slice(limit.clone()));
                format!(" WHERE rowid IN ({subquery})")
            }
            None => self.condition.as_ref().map(where_clause).unwrap_or_default(),
        }
    }
}

pub(super) fn update(sql: &str) -> String {
    let text = SqlText::new(sql);
    let mut cursor = text.cursor();
    if !cursor.eat_keyword("UPDATE") {
        return sql.to_string();
    }
    cursor.eat_keyword("LOW_PRIORITY");
    let ignore = cursor.eat_keyword("IGNORE");
    let verb = if ignore { "UPDATE OR IGNORE" } else { "UPDATE" };

    let Some(set) = text.find_top_level(&["SET"], cursor.pos()..text.len()) else {
        return sql.to_string();
    };
    let table = text.trim(cursor.pos()..set.start);
    if is_multi_table(&text, table.clone()) {
        return format!("{verb} {}", text.slice(cursor.rest()));
    }

    let clauses = trailing_clauses(&text, table.clone(), set.end..text.len());
    format!(
        "{verb} {} SET {}{}",
        text.slice(table),
        text.slice(text.trim(clauses.head.clone())),
        clauses.render_tail(&text)
    )
}

pub(super) fn delete(sql: &str) -> String {
    let text = SqlText::new(sql);
    let mut cursor = text.cursor();
    if !cursor.eat_keyword("DELETE") {
        return sql.to_string();
    }
    for modifier in ["LOW_PRIORITY", "QUICK", "IGNORE"] {
        cursor.eat_keyword(modifier);
    }
    if !cursor.eat_keyword("FROM") {
        return sql.to_string();
    }

    let rest = cursor.rest();
    let clauses = trailing_clauses(&text, 0..0, rest.clone());
    let table = text.trim(clauses.head.clone());
    if is_multi_table(&text, table.clone()) || text.find_top_level(&["USING"], rest).is_some() {
        return sql.to_string();
    }
    let clauses = Clauses { table: table.clone(), ..clauses };
    format!("DELETE FROM {}{}", text.slice(table), clauses.render_tail(&text))
}

fn is_multi_table(text: &SqlText<'_>, table: Range<usize>) -> bool {
    text.split_top_level(table.clone(), b',').len() > 1
        || text.find_top_level(&["JOIN"], table).is_some()
}
