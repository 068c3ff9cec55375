//! MySQL-shaped results for introspection commands the engine answers in its
//! own format, and the fixed results of emulated commands.

use crate::{
    Row, StatementKind, Value,
    config::REPORTED_MYSQL_VERSION,
    introspection::{self, Filter, Introspection},
    scan::SqlText,
};

const VARIABLES: [(&str, &str); 12] = [
    ("max_allowed_packet", "16777216"),
    ("version", REPORTED_MYSQL_VERSION),
    ("sql_mode", ""),
    ("character_set_client", "utf8mb4"),
    ("character_set_connection", "utf8mb4"),
    ("character_set_database", "utf8mb4"),
    ("character_set_results", "utf8mb4"),
    ("character_set_server", "utf8mb4"),
    ("collation_connection", "utf8mb4_unicode_ci"),
    ("collation_database", "utf8mb4_unicode_ci"),
    ("collation_server", "utf8mb4_unicode_ci"),
    ("lower_case_table_names", "0"),
];

const DEFAULT_COLLATION: &str = "utf8mb4_unicode_ci";

/// Reshapes the engine's rows for `kind`. Kinds whose native output already
/// matches MySQL come back unchanged.
pub fn shape(kind: StatementKind, sql: &str, rows: Vec<Row>, database_name: &str) -> Vec<Row> {
    match kind {
        StatementKind::Describe | StatementKind::ShowColumns => {
            columns(&introspection::parse(kind, sql), &rows)
        }
        StatementKind::ShowIndex => indexes(&introspection::parse(kind, sql), &rows),
        StatementKind::Check | StatementKind::Analyze => {
            maintenance(kind, &introspection::parse(kind, sql), &rows, database_name)
        }
        _ => rows,
    }
}

fn columns(parsed: &Introspection, rows: &[Row]) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let field = text(row, "name");
            let data_type = text(row, "type");
            let not_null = int(row, "notnull") != 0;
            let primary_key = int(row, "pk") > 0;
            let default = row
                .get("dflt_value")
                .and_then(Value::display_string)
                .map_or(Value::Null, |raw| Value::Text(unquote_default(&raw)));

            let mut shaped = Row::new()
                .with("Field", field)
                .with("Type", data_type.clone());
            if parsed.full {
                shaped.push("Collation", collation_for(&data_type));
            }
            shaped.push("Null", if not_null { "NO" } else { "YES" });
            shaped.push("Key", if primary_key { "PRI" } else { "" });
            shaped.push("Default", default);
            shaped.push("Extra", "");
            if parsed.full {
                shaped.push("Privileges", "select,insert,update,references");
                shaped.push("Comment", "");
            }
            shaped
        })
        .filter(|row| matches_filter(row, parsed.filter.as_ref(), "Field"))
        .collect()
}

fn collation_for(data_type: &str) -> Value {
    let lowered = data_type.to_ascii_lowercase();
    if ["char", "text", "clob", "enum", "set"]
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        Value::text(DEFAULT_COLLATION)
    } else {
        Value::Null
    }
}

/// Defaults are reported as the value a client would see: a quoted string
/// default loses its quotes.
fn unquote_default(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix('\'')
        .and_then(|inner| inner.strip_suffix('\''))
    {
        Some(inner) => inner.replace("''", "'"),
        None => trimmed.to_string(),
    }
}

fn indexes(parsed: &Introspection, rows: &[Row]) -> Vec<Row> {
    let mut shaped = Vec::new();

    for row in rows.iter().filter(|row| text(row, "type") == "table") {
        let table = text(row, "tbl_name");
        let definition = text(row, "sql");
        for (position, column) in table_primary_key(&definition).into_iter().enumerate() {
            shaped.push(index_row(&table, false, "PRIMARY", position + 1, &column));
        }
    }

    for row in rows.iter().filter(|row| text(row, "type") == "index") {
        let name = text(row, "name");
        if name.starts_with("sqlite_autoindex") {
            continue;
        }
        let table = text(row, "tbl_name");
        let Some((unique, columns)) = parse_index(&text(row, "sql")) else {
            continue;
        };
        let key_name = strip_table_prefix(&table, &name);
        for (position, column) in columns.iter().enumerate() {
            shaped.push(index_row(&table, !unique, key_name, position + 1, column));
        }
    }

    match &parsed.filter {
        Some(Filter::Equals { field, value }) => shaped
            .into_iter()
            .filter(|row| {
                row.get_ignore_case(field)
                    .and_then(Value::display_string)
                    .is_some_and(|found| found.eq_ignore_ascii_case(value))
            })
            .collect(),
        _ => shaped,
    }
}

fn index_row(table: &str, non_unique: bool, key_name: &str, sequence: usize, column: &str) -> Row {
    Row::new()
        .with("Table", table)
        .with("Non_unique", i64::from(non_unique))
        .with("Key_name", key_name)
        .with("Seq_in_index", sequence as i64)
        .with("Column_name", column)
        .with("Collation", "A")
        .with("Cardinality", Value::Null)
        .with("Sub_part", Value::Null)
        .with("Packed", Value::Null)
        .with("Null", "")
        .with("Index_type", "BTREE")
        .with("Comment", "")
        .with("Index_comment", "")
}

fn strip_table_prefix<'a>(table: &str, index: &'a str) -> &'a str {
    let prefix_len = table.len() + 2;
    match index.get(..prefix_len) {
        Some(prefix) if prefix.eq_ignore_ascii_case(&format!("{table}__")) => &index[prefix_len..],
        _ => index,
    }
}

/// Primary key columns declared in a `CREATE TABLE` text, either as a table
/// constraint or inline on one column.
fn table_primary_key(sql: &str) -> Vec<String> {
    let text = SqlText::new(sql);
    let Some(open) = text.masked().find('(') else {
        return Vec::new();
    };
    let Some(close) = text.matching_paren(open) else {
        return Vec::new();
    };

    for element in text.split_top_level(open + 1..close, b',') {
        let mut cursor = text.cursor_in(element.clone());
        if cursor.eat_keyword("CONSTRAINT") {
            cursor.identifier();
        }
        if cursor.eat_keywords(&["PRIMARY", "KEY"]) {
            return cursor.paren_group().map_or_else(Vec::new, |inner| column_list(&text, inner));
        }
        if text.find_top_level(&["PRIMARY", "KEY"], element.clone()).is_some()
            && let Some(column) = text.cursor_in(element).identifier()
        {
            return vec![column];
        }
    }
    Vec::new()
}

/// `CREATE [UNIQUE] INDEX [IF NOT EXISTS] name ON table (columns)`.
fn parse_index(sql: &str) -> Option<(bool, Vec<String>)> {
    let text = SqlText::new(sql);
    let mut cursor = text.cursor();
    if !cursor.eat_keyword("CREATE") {
        return None;
    }
    let unique = cursor.eat_keyword("UNIQUE");
    if !cursor.eat_keyword("INDEX") {
        return None;
    }
    cursor.eat_keywords(&["IF", "NOT", "EXISTS"]);
    cursor.identifier()?;
    if !cursor.eat_keyword("ON") {
        return None;
    }
    cursor.identifier()?;
    let inner = cursor.paren_group()?;
    Some((unique, column_list(&text, inner)))
}

fn column_list(text: &SqlText<'_>, inner: std::ops::Range<usize>) -> Vec<String> {
    text.split_top_level(inner, b',')
        .into_iter()
        .filter_map(|part| text.cursor_in(part).identifier())
        .collect()
}

fn maintenance(
    kind: StatementKind,
    parsed: &Introspection,
    rows: &[Row],
    database_name: &str,
) -> Vec<Row> {
    let (op, ok_text) = match kind {
        StatementKind::Analyze => ("analyze", "Table is already up to date"),
        _ => ("check", "OK"),
    };
    // `PRAGMA quick_check` answers a single `ok` row for a sound database.
    let problem = rows
        .iter()
        .filter_map(|row| row.value_at(0).and_then(Value::display_string))
        .find(|message| !message.eq_ignore_ascii_case("ok"));
    let (msg_type, msg_text) = match &problem {
        Some(message) => ("error", message.as_str()),
        None => ("status", ok_text),
    };

    let tables = if parsed.tables.is_empty() {
        vec![String::new()]
    } else {
        parsed.tables.clone()
    };
    tables
        .iter()
        .map(|table| {
            Row::new()
                .with("Table", format!("{database_name}.{table}"))
                .with("Op", op)
                .with("Msg_type", msg_type)
                .with("Msg_text", msg_text)
        })
        .collect()
}

/// `SHOW VARIABLES`: the requested variable from a fixed table, or every
/// entry when no filter was given.
pub fn variables(sql: &str) -> Vec<Row> {
    let parsed = introspection::parse(StatementKind::ShowVariables, sql);
    let requested = match &parsed.filter {
        Some(Filter::Like(name)) => name.clone(),
        Some(Filter::Equals { value, .. }) => value.clone(),
        None => {
            return VARIABLES
                .iter()
                .map(|(name, value)| variable_row(name, value))
                .collect();
        }
    };
    let value = VARIABLES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(&requested))
        .map_or("", |(_, value)| value);
    vec![variable_row(&requested, value)]
}

fn variable_row(name: &str, value: &str) -> Row {
    Row::new().with("Variable_name", name).with("Value", value)
}

/// `SHOW TABLE STATUS`: one placeholder record for the requested table.
pub(crate) fn table_status(sql: &str) -> Vec<Row> {
    let parsed = introspection::parse(StatementKind::ShowStatus, sql);
    let name = match parsed.filter {
        Some(Filter::Like(name)) | Some(Filter::Equals { value: name, .. }) => name,
        None => String::new(),
    };
    vec![
        Row::new()
            .with("Name", name)
            .with("Engine", "InnoDB")
            .with("Version", 10_i64)
            .with("Row_format", "Dynamic")
            .with("Rows", 0_i64)
            .with("Avg_row_length", 0_i64)
            .with("Data_length", 0_i64)
            .with("Max_data_length", 0_i64)
            .with("Index_length", 0_i64)
            .with("Data_free", 0_i64)
            .with("Auto_increment", Value::Null)
            .with("Create_time", Value::Null)
            .with("Update_time", Value::Null)
            .with("Check_time", Value::Null)
            .with("Collation", DEFAULT_COLLATION)
            .with("Checksum", Value::Null)
            .with("Create_options", "")
            .with("Comment", ""),
    ]
}

pub(crate) fn found_rows(count: u64) -> Vec<Row> {
    vec![Row::new().with("FOUND_ROWS()", i64::try_from(count).unwrap_or(i64::MAX))]
}

fn matches_filter(row: &Row, filter: Option<&Filter>, like_field: &str) -> bool {
    match filter {
        None => true,
        Some(Filter::Like(pattern)) => row
            .get(like_field)
            .and_then(Value::display_string)
            .is_some_and(|value| like_matches(pattern, &value)),
        Some(Filter::Equals { field, value }) => row
            .get_ignore_case(field)
            .and_then(Value::display_string)
            .is_some_and(|found| found.eq_ignore_ascii_case(value)),
    }
}

/// Case-insensitive MySQL `LIKE` with `%`, `_` and backslash escapes.
pub(crate) fn like_matches(pattern: &str, value: &str) -> bool {
    let pattern = pattern.to_lowercase().chars().collect::<Vec<_>>();
    let value = value.to_lowercase().chars().collect::<Vec<_>>();

    // matched[j]: the pattern prefix consumed so far matches value[..j].
    let mut matched = vec![false; value.len() + 1];
    matched[0] = true;
    let mut index = 0;
    while index < pattern.len() {
        let (token, escaped) = match pattern[index] {
            '\\' if index + 1 < pattern.len() => {
                index += 1;
                (pattern[index], true)
            }
            other => (other, false),
        };
        index += 1;

        let mut next = vec![false; value.len() + 1];
        match token {
            '%' if !escaped => {
                let mut any = false;
                for position in 0..=value.len() {
                    any |= matched[position];
                    next[position] = any;
                }
            }
            '_' if !escaped => {
                for position in 0..value.len() {
                    next[position + 1] = matched[position];
                }
            }
            literal => {
                for position in 0..value.len() {
                    next[position + 1] = matched[position] && value[position] == literal;
                }
            }
        }
        matched = next;
    }
    matched[value.len()]
}

fn text(row: &Row, column: &str) -> String {
    row.get(column)
        .and_then(Value::display_string)
        .unwrap_or_default()
}

fn int(row: &Row, column: &str) -> i64 {
    row.get(column).and_then(Value::as_i64).unwrap_or_default()
}
