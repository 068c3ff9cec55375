use std::ops::Range;

use crate::scan::{SqlText, quote_identifier, unquote_identifier};

/// A column definition normalized to the embedded engine's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnDefinition {
    pub(crate) name: String,
    pub(crate) data_type: String,
    pub(crate) not_null: bool,
    pub(crate) default: Option<String>,
    pub(crate) auto_increment: bool,
    pub(crate) primary_key: bool,
    pub(crate) unique: bool,
    /// Clauses carried over verbatim (`CHECK`, `REFERENCES`, generated
    /// column expressions).
    pub(crate) extra: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    End,
    First,
    After,
}

impl ColumnDefinition {
    /// Parses `name type [attributes…]` from `range`. Returns the definition
    /// and any trailing `FIRST` / `AFTER col` placement.
    pub(crate) fn parse(
        text: &SqlText<'_>,
        range: Range<usize>,
    ) -> Option<(Self, Position, Option<String>)> {
        let words = text.words(range);
        let mut words = words.iter().map(|word| text.slice(word.clone())).peekable();

        let name = unquote_identifier(words.next()?);
        let mut data_type = words.next().map(str::to_string).unwrap_or_default();
        if let Some(args) = words.next_if(|word| word.starts_with('(')) {
            data_type.push_str(args);
        }

        let mut definition = Self {
            name,
            data_type: String::new(),
            not_null: false,
            default: None,
            auto_increment: false,
            primary_key: false,
            unique: false,
            extra: Vec::new(),
        };
        let mut position = Position::End;
        let mut after = None;

        while let Some(word) = words.next() {
            let keyword = word.to_ascii_uppercase();
            match keyword.as_str() {
                "UNSIGNED" | "SIGNED" | "ZEROFILL" | "PRECISION" | "VARYING" | "VISIBLE"
                | "INVISIBLE" | "BINARY" | "ASCII" | "UNICODE" => {}
                "CHARACTER" => {
                    words.next_if(|next| next.eq_ignore_ascii_case("SET"));
                    words.next();
                }
                "CHARSET" | "COLLATE" | "COMMENT" | "COLUMN_FORMAT" | "STORAGE" => {
                    words.next();
                }
                "NOT" => {
                    if words.next_if(|next| next.eq_ignore_ascii_case("NULL")).is_some() {
                        definition.not_null = true;
                    }
                }
                "NULL" => definition.not_null = false,
                "DEFAULT" => {
                    definition.default = words.next().map(normalize_default);
                }
                "AUTO_INCREMENT" => definition.auto_increment = true,
                "PRIMARY" => {
                    words.next_if(|next| next.eq_ignore_ascii_case("KEY"));
                    definition.primary_key = true;
                }
                "KEY" => definition.primary_key = true,
                "UNIQUE" => {
                    words.next_if(|next| next.eq_ignore_ascii_case("KEY"));
                    definition.unique = true;
                }
                "ON" if words.peek().is_some_and(|next| next.eq_ignore_ascii_case("UPDATE")) => {
                    words.next();
                    words.next();
                }
                "FIRST" => position = Position::First,
                "AFTER" => {
                    position = Position::After;
                    after = words.next().map(unquote_identifier);
                }
                "CHECK" => {
                    let mut clause = word.to_string();
                    if let Some(group) = words.next_if(|next| next.starts_with('(')) {
                        clause.push(' ');
                        clause.push_str(group);
                    }
                    definition.extra.push(clause);
                }
                _ => {
                    let rest = std::iter::once(word).chain(words.by_ref()).collect::<Vec<_>>();
                    definition.extra.push(rest.join(" "));
                }
            }
        }

        definition.data_type = translate_type(&data_type, definition.auto_increment);
        Some((definition, position, after))
    }

    /// Renders the definition. `inline_key` places `PRIMARY KEY` (and
    /// `AUTOINCREMENT` when requested) on the column itself.
    pub(crate) fn render(&self, inline_key: bool) -> String {
        let autoincrement = inline_key && self.auto_increment;
        let mut sql = quote_identifier(&self.name);
        let data_type = if autoincrement {
            "integer"
        } else {
            self.data_type.as_str()
        };
        if !data_type.is_empty() {
            sql.push(' ');
            sql.push_str(data_type);
        }
        if inline_key {
            sql.push_str(" PRIMARY KEY");
            if autoincrement {
                sql.push_str(" AUTOINCREMENT");
            }
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        for clause in &self.extra {
            sql.push(' ');
            sql.push_str(clause);
        }
        sql
    }

    /// The value MySQL stores in a NOT NULL column that received none.
    pub(crate) fn implicit_default(&self) -> &'static str {
        implicit_default(&self.data_type)
    }
}

pub(crate) fn implicit_default(data_type: &str) -> &'static str {
    let data_type = data_type.to_ascii_lowercase();
    let base = data_type.split('(').next().unwrap_or_default().trim();
    match base {
        "datetime" | "timestamp" => "'0000-00-00 00:00:00'",
        "date" => "'0000-00-00'",
        "time" => "'00:00:00'",
        _ if ["int", "dec", "num", "float", "doub", "real", "bit", "bool", "year"]
            .iter()
            .any(|marker| base.contains(marker)) =>
        {
            "0"
        }
        _ => "''",
    }
}

/// Maps a MySQL column type to a declared type the embedded engine accepts
/// while keeping the original name where its affinity rules already agree.
pub(crate) fn translate_type(raw: &str, auto_increment: bool) -> String {
    if auto_increment {
        return "integer".to_string();
    }
    let lowered = raw.to_ascii_lowercase();
    let (base, args) = match lowered.find('(') {
        Some(open) => (lowered[..open].trim(), &lowered[open..]),
        None => (lowered.trim(), ""),
    };
    match base {
        "enum" | "set" => "text".to_string(),
        "bool" | "boolean" => "tinyint(1)".to_string(),
        "serial" => "integer".to_string(),
        _ => format!("{base}{args}"),
    }
}

fn normalize_default(raw: &str) -> String {
    let upper = raw.to_ascii_uppercase();
    if upper.starts_with("CURRENT_TIMESTAMP")
        || upper.starts_with("NOW(")
        || upper.starts_with("LOCALTIMESTAMP")
    {
        return "CURRENT_TIMESTAMP".to_string();
    }
    raw.to_string()
}

/// Index as declared by `KEY`/`INDEX`/`UNIQUE` clauses, named in MySQL's
/// table-scoped namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexDefinition {
    pub(crate) name: String,
    pub(crate) unique: bool,
    pub(crate) columns: Vec<String>,
}

impl IndexDefinition {
    pub(crate) fn render(&self, table: &str, if_not_exists: bool) -> String {
        render_index(
            &engine_index_name(table, &self.name),
            table,
            self.unique,
            &self.columns,
            if_not_exists,
        )
    }
}

pub(crate) fn render_index(
    engine_name: &str,
    table: &str,
    unique: bool,
    columns: &[String],
    if_not_exists: bool,
) -> String {
    format!(
        "CREATE {}INDEX {}{} ON {} ({})",
        if unique { "UNIQUE " } else { "" },
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        quote_identifier(engine_name),
        quote_identifier(table),
        quote_list(columns),
    )
}

/// Index names are global in the embedded engine, so they carry their table as
/// a prefix.
pub(crate) fn engine_index_name(table: &str, index: &str) -> String {
    format!("{table}__{index}")
}

pub(crate) fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| quote_identifier(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses an index key part list `(a(10), b DESC)` into bare column names.
pub(crate) fn key_parts(text: &SqlText<'_>, inner: Range<usize>) -> Vec<String> {
    text.split_top_level(inner, b',')
        .into_iter()
        .filter_map(|part| {
            let mut cursor = text.cursor_in(part);
            cursor.identifier()
        })
        .collect()
}

/// Parses `[name] [USING type] (parts) [USING type]` following an index
/// keyword, falling back to the first column for an unnamed index.
pub(crate) fn index_clause(
    text: &SqlText<'_>,
    range: Range<usize>,
    unique: bool,
) -> Option<IndexDefinition> {
    let mut cursor = text.cursor_in(range);
    let mut name = None;
    if cursor.peek_byte() != Some(b'(') && !cursor.peek_keyword("USING") {
        name = cursor.identifier();
    }
    if cursor.eat_keyword("USING") {
        cursor.word();
    }
    let inner = cursor.paren_group()?;
    let columns = key_parts(text, inner);
    let name = name.or_else(|| columns.first().cloned())?;
    Some(IndexDefinition {
        name,
        unique,
        columns,
    })
}
