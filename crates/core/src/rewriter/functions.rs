//! Expression-level translation of MySQL functions, operators and select
//! modifiers. A single left-to-right pass; each rule replaces a disjoint span
//! and recurses into function arguments.

use std::ops::Range;

use crate::{
    REPORTED_MYSQL_VERSION,
    parameterizer::unescape_literal,
    scan::{Cursor, SqlText, mysql_string_literal},
};

const DROPPED_MODIFIERS: [&str; 7] = [
    "SQL_CALC_FOUND_ROWS",
    "SQL_NO_CACHE",
    "SQL_CACHE",
    "SQL_BUFFER_RESULT",
    "SQL_SMALL_RESULT",
    "SQL_BIG_RESULT",
    "HIGH_PRIORITY",
];

pub(super) fn translate(sql: &str, database_name: &str) -> String {
    let text = SqlText::new(sql);
    Translator {
        text: &text,
        database_name,
    }
    .range(0..text.len())
}

struct Translator<'t, 'a> {
    text: &'t SqlText<'a>,
    database_name: &'t str,
}

impl Translator<'_, '_> {
    fn range(&self, range: Range<usize>) -> String {
        let text = self.text;
        let mut out = String::with_capacity(range.len());
        let mut last = range.start;
        let mut index = range.start;

        while index < range.end {
            let Some(byte) = text.byte(index) else {
                break;
            };
            if matches!(byte, b'\'' | b'"' | b'`') {
                index = text.quoted_end(index).min(range.end);
                continue;
            }
            if byte == b'<'
                && index + 3 <= range.end
                && text.masked().as_bytes().get(index..index + 3) == Some(b"<=>".as_slice())
            {
                out.push_str(text.slice(last..index));
                out.push_str(" IS ");
                index += 3;
                last = index;
                continue;
            }
            if !text.is_word_start(index) {
                index += 1;
                continue;
            }

            let word_end = text.word_end(index).min(range.end);
            match self.word(index, word_end, range.end) {
                Some((replacement, end)) => {
                    out.push_str(text.slice(last..index));
                    out.push_str(&replacement);
                    index = end;
                    last = end;
                }
                None => index = word_end,
            }
        }

        out.push_str(text.slice(last..range.end));
        out
    }

    fn args(&self, inner: Range<usize>) -> Vec<String> {
        self.text
            .split_top_level(inner, b',')
            .into_iter()
            .map(|arg| self.range(arg))
            .collect()
    }

    /// Replacement for the word at `start..end` and the position scanning
    /// resumes from, or `None` to keep the word.
    fn word(&self, start: usize, end: usize, limit: usize) -> Option<(String, usize)> {
        let text = self.text;
        let word = text.slice(start..end).to_ascii_uppercase();

        let mut cursor = text.cursor_in(end..limit);
        if word == "LIKE" {
            return self.like(cursor);
        }
        if cursor.peek_byte() == Some(b'(') {
            if let Some(inner) = cursor.paren_group()
                && let Some(replacement) = self.function(&word, inner)
            {
                return Some((replacement, cursor.pos()));
            }
            return None;
        }

        match word.as_str() {
            _ if DROPPED_MODIFIERS.contains(&word.as_str()) => Some((String::new(), end)),
            "STRAIGHT_JOIN" => {
                let preceding = text.slice(0..start).trim_end().to_ascii_uppercase();
                let replacement = if preceding.ends_with("SELECT") || preceding.ends_with("DISTINCT") {
                    ""
                } else {
                    "JOIN"
                };
                Some((replacement.to_string(), end))
            }
            "DISTINCTROW" => Some(("DISTINCT".to_string(), end)),
            "RLIKE" => Some(("REGEXP".to_string(), end)),
            "BINARY" => Some((String::new(), end)),
            "COLLATE" => {
                let collation = cursor.word()?;
                let name = text.slice(collation).to_ascii_lowercase();
                let target = if name == "binary" || name.ends_with("_bin") {
                    "BINARY"
                } else {
                    "NOCASE"
                };
                Some((format!("COLLATE {target}"), cursor.pos()))
            }
            "LIMIT" => {
                let offset = cursor.word()?;
                if !cursor.eat_byte(b',') {
                    return None;
                }
                let count = cursor.word()?;
                Some((
                    format!(
                        "LIMIT {} OFFSET {}",
                        text.slice(count),
                        text.slice(offset)
                    ),
                    cursor.pos(),
                ))
            }
            "USE" | "FORCE" | "IGNORE" => {
                if !cursor.eat_keyword("INDEX") && !cursor.eat_keyword("KEY") {
                    return None;
                }
                if cursor.eat_keyword("FOR") {
                    cursor.eat_keyword("JOIN");
                    cursor.eat_keywords(&["ORDER", "BY"]);
                    cursor.eat_keywords(&["GROUP", "BY"]);
                }
                cursor.paren_group()?;
                Some((String::new(), cursor.pos()))
            }
            "FOR" => {
                if cursor.eat_keyword("UPDATE") || cursor.eat_keyword("SHARE") {
                    cursor.eat_keyword("NOWAIT");
                    cursor.eat_keywords(&["SKIP", "LOCKED"]);
                    return Some((String::new(), cursor.pos()));
                }
                None
            }
            "LOCK" => cursor
                .eat_keywords(&["IN", "SHARE", "MODE"])
                .then(|| (String::new(), cursor.pos())),
            _ => None,
        }
    }

    fn function(&self, name: &str, inner: Range<usize>) -> Option<String> {
        let text = self.text;
        let args = || self.args(inner.clone());

        let translated = match name {
            "NOW" | "SYSDATE" | "LOCALTIME" | "LOCALTIMESTAMP" | "CURRENT_TIMESTAMP"
            | "UTC_TIMESTAMP" => "datetime('now')".to_string(),
            "CURDATE" | "CURRENT_DATE" | "UTC_DATE" => "date('now')".to_string(),
            "CURTIME" | "CURRENT_TIME" | "UTC_TIME" => "time('now')".to_string(),
            "UNIX_TIMESTAMP" => match args().as_slice() {
                [] => "CAST(strftime('%s', 'now') AS INTEGER)".to_string(),
                [value] => format!("CAST(strftime('%s', {value}) AS INTEGER)"),
                _ => return None,
            },
            "FROM_UNIXTIME" => {
                let parts = text.split_top_level(inner.clone(), b',');
                match parts.as_slice() {
                    [value] => format!("datetime({}, 'unixepoch')", self.range(value.clone())),
                    [value, format] => format!(
                        "strftime({}, {}, 'unixepoch')",
                        self.date_format(format.clone()),
                        self.range(value.clone())
                    ),
                    _ => return None,
                }
            }
            "YEAR" | "MONTH" | "DAY" | "DAYOFMONTH" | "HOUR" | "MINUTE" | "SECOND"
            | "DAYOFYEAR" => {
                let specifier = match name {
                    "YEAR" => "%Y",
                    "MONTH" => "%m",
                    "DAY" | "DAYOFMONTH" => "%d",
                    "HOUR" => "%H",
                    "MINUTE" => "%M",
                    "SECOND" => "%S",
                    _ => "%j",
                };
                let [value]: [String; 1] = args().try_into().ok()?;
                format!("CAST(strftime('{specifier}', {value}) AS INTEGER)")
            }
            "DAYOFWEEK" => {
                let [value]: [String; 1] = args().try_into().ok()?;
                format!("(CAST(strftime('%w', {value}) AS INTEGER) + 1)")
            }
            "WEEKDAY" => {
                let [value]: [String; 1] = args().try_into().ok()?;
                format!("((CAST(strftime('%w', {value}) AS INTEGER) + 6) % 7)")
            }
            "DATE_ADD" | "ADDDATE" | "DATE_SUB" | "SUBDATE" => {
                let subtract = name == "DATE_SUB" || name == "SUBDATE";
                self.date_arithmetic(inner.clone(), subtract)?
            }
            "DATEDIFF" => {
                let [left, right]: [String; 2] = args().try_into().ok()?;
                format!("CAST(julianday(date({left})) - julianday(date({right})) AS INTEGER)")
            }
            "DATE_FORMAT" => {
                let parts = text.split_top_level(inner.clone(), b',');
                let [value, format] = parts.as_slice() else {
                    return None;
                };
                format!(
                    "strftime({}, {})",
                    self.date_format(format.clone()),
                    self.range(value.clone())
                )
            }
            "IF" => {
                let [condition, then, otherwise]: [String; 3] = args().try_into().ok()?;
                format!("CASE WHEN {condition} THEN {then} ELSE {otherwise} END")
            }
            "ISNULL" => {
                let [value]: [String; 1] = args().try_into().ok()?;
                format!("({value} IS NULL)")
            }
            "CONCAT" => format!("({})", args().join(" || ")),
            "LEAST" => format!("MIN({})", args().join(", ")),
            "GREATEST" => format!("MAX({})", args().join(", ")),
            "SUBSTRING" | "MID" => {
                let args = args();
                if !(2..=3).contains(&args.len()) {
                    return None;
                }
                format!("SUBSTR({})", args.join(", "))
            }
            "LOCATE" => match args().as_slice() {
                [needle, haystack] => format!("INSTR({haystack}, {needle})"),
                [needle, haystack, from] => format!(
                    "CASE WHEN INSTR(SUBSTR({haystack}, {from}), {needle}) > 0 \
                     THEN INSTR(SUBSTR({haystack}, {from}), {needle}) + {from} - 1 ELSE 0 END"
                ),
                _ => return None,
            },
            "LEFT" => {
                let [value, length]: [String; 2] = args().try_into().ok()?;
                format!("SUBSTR({value}, 1, {length})")
            }
            "RIGHT" => {
                let [value, length]: [String; 2] = args().try_into().ok()?;
                format!("SUBSTR({value}, -({length}))")
            }
            "UCASE" => format!("UPPER({})", args().join(", ")),
            "LCASE" => format!("LOWER({})", args().join(", ")),
            "CHAR_LENGTH" | "CHARACTER_LENGTH" => format!("LENGTH({})", args().join(", ")),
            "FIELD" => {
                let args = args();
                let (value, candidates) = args.split_first()?;
                let arms = candidates
                    .iter()
                    .enumerate()
                    .map(|(position, candidate)| format!("WHEN {candidate} THEN {}", position + 1))
                    .collect::<Vec<_>>();
                format!("CASE {value} {} ELSE 0 END", arms.join(" "))
            }
            "RAND" => "(ABS(RANDOM()) / 9223372036854775807.0)".to_string(),
            "LAST_INSERT_ID" if text.trim(inner.clone()).is_empty() => {
                "last_insert_rowid()".to_string()
            }
            "DATABASE" | "SCHEMA" => mysql_string_literal(self.database_name),
            "VERSION" => mysql_string_literal(REPORTED_MYSQL_VERSION),
            "GROUP_CONCAT" => self.group_concat(inner.clone()),
            "CAST" => self.cast(inner.clone(), b"AS")?,
            "CONVERT" => self.cast(inner.clone(), b",")?,
            _ => return None,
        };
        Some(translated)
    }

    /// `LIKE pattern` with MySQL's implicit backslash escape spelled out; a
    /// pattern that already names its `ESCAPE` is left alone.
    fn like(&self, mut cursor: Cursor<'_, '_>) -> Option<(String, usize)> {
        let text = self.text;
        cursor.eat_keyword("BINARY");
        cursor.skip_whitespace();
        let start = cursor.pos();
        match cursor.peek_byte()? {
            b'\'' | b'"' => cursor.set_pos(text.quoted_end(start)),
            b'(' => {
                cursor.paren_group()?;
            }
            _ => {
                cursor.identifier()?;
                let mut call = cursor.clone();
                if call.peek_byte() == Some(b'(') {
                    call.paren_group()?;
                    cursor = call;
                }
            }
        }
        let end = cursor.pos();
        if cursor.peek_keyword("ESCAPE") {
            return None;
        }
        Some((
            format!(
                "LIKE {} ESCAPE {}",
                self.range(start..end),
                mysql_string_literal("\\")
            ),
            end,
        ))
    }

    fn date_arithmetic(&self, inner: Range<usize>, subtract: bool) -> Option<String> {
        let text = self.text;
        let parts = text.split_top_level(inner, b',');
        let [date, interval] = parts.as_slice() else {
            return None;
        };
        let date = self.range(date.clone());

        let words = text.words(interval.clone());
        let (amount, unit) = match words.as_slice() {
            [keyword, value @ .., unit]
                if text.slice(keyword.clone()).eq_ignore_ascii_case("INTERVAL") && !value.is_empty() =>
            {
                let amount = value[0].start..value[value.len() - 1].end;
                (amount, text.slice(unit.clone()).to_ascii_uppercase())
            }
            _ => (interval.clone(), "DAY".to_string()),
        };

        let (unit, factor) = match unit.as_str() {
            "SECOND" => ("seconds", 1),
            "MINUTE" => ("minutes", 1),
            "HOUR" => ("hours", 1),
            "DAY" => ("days", 1),
            "WEEK" => ("days", 7),
            "MONTH" => ("months", 1),
            "QUARTER" => ("months", 3),
            "YEAR" => ("years", 1),
            _ => return None,
        };

        let raw_amount = text.slice(amount.clone()).trim();
        let modifier = match raw_amount.parse::<i64>() {
            Ok(value) => {
                // Out-of-range amounts keep the MySQL call as written.
                let value = value
                    .checked_mul(factor)?
                    .checked_mul(if subtract { -1 } else { 1 })?;
                mysql_string_literal(&format!("{value:+} {unit}"))
            }
            Err(_) => {
                let amount = self.range(amount);
                let scaled = match (subtract, factor) {
                    (false, 1) => amount,
                    (true, 1) => format!("-({amount})"),
                    (false, _) => format!("({amount}) * {factor}"),
                    (true, _) => format!("-({amount}) * {factor}"),
                };
                format!("({scaled}) || ' {unit}'")
            }
        };
        Some(format!("datetime({date}, {modifier})"))
    }

    /// Converts a literal MySQL `DATE_FORMAT` pattern to `strftime`
    /// specifiers; a non-literal pattern is passed through translated.
    fn date_format(&self, range: Range<usize>) -> String {
        let text = self.text;
        let range = text.trim(range);
        let quote = text.byte(range.start);
        let is_literal = matches!(quote, Some(b'\'' | b'"'))
            && text.quoted_end(range.start) == range.end;
        let Some(quote) = quote.filter(|_| is_literal) else {
            return self.range(range);
        };

        let pattern = unescape_literal(text.slice(range), quote);
        let mut converted = String::with_capacity(pattern.len());
        let mut chars = pattern.chars();
        while let Some(ch) = chars.next() {
            if ch != '%' {
                converted.push(ch);
                continue;
            }
            match chars.next() {
                Some('i') => converted.push_str("%M"),
                Some('s') => converted.push_str("%S"),
                Some('e') => converted.push_str("%d"),
                Some('c') => converted.push_str("%m"),
                Some('k') => converted.push_str("%H"),
                Some('T') => converted.push_str("%H:%M:%S"),
                Some(other) => {
                    converted.push('%');
                    converted.push(other);
                }
                None => converted.push('%'),
            }
        }
        mysql_string_literal(&converted)
    }

    fn group_concat(&self, inner: Range<usize>) -> String {
        let text = self.text;
        let separator = text.find_top_level(&["SEPARATOR"], inner.clone());
        let order = text.find_top_level(&["ORDER", "BY"], inner.clone());
        let expression_end = [separator.as_ref(), order.as_ref()]
            .into_iter()
            .flatten()
            .map(|found| found.start)
            .min()
            .unwrap_or(inner.end);

        let mut expression = text.cursor_in(inner.start..expression_end);
        let distinct = expression.eat_keyword("DISTINCT");
        let parts = self.args(expression.rest());
        let value = parts.join(" || ");

        match separator {
            Some(found) if !distinct => {
                let literal = text.slice(text.trim(found.end..inner.end));
                format!("GROUP_CONCAT({value}, {literal})")
            }
            _ if distinct => format!("GROUP_CONCAT(DISTINCT {value})"),
            _ => format!("GROUP_CONCAT({value})"),
        }
    }

    fn cast(&self, inner: Range<usize>, separator: &[u8]) -> Option<String> {
        let text = self.text;
        let (value, target) = if separator == b"," {
            let parts = text.split_top_level(inner.clone(), b',');
            match parts.as_slice() {
                [value, target] => (value.clone(), target.clone()),
                _ => {
                    let using = text.find_top_level(&["USING"], inner.clone())?;
                    return Some(self.range(inner.start..using.start).trim().to_string());
                }
            }
        } else {
            let found = text.find_top_level(&["AS"], inner.clone())?;
            (inner.start..found.start, found.end..inner.end)
        };

        let value = self.range(value).trim().to_string();
        let target = text.slice(text.trim(target)).to_ascii_uppercase();
        let base = target
            .split(|ch: char| ch == '(' || ch.is_ascii_whitespace())
            .next()
            .unwrap_or_default();
        let translated = match base {
            "SIGNED" | "UNSIGNED" | "INTEGER" | "INT" => format!("CAST({value} AS INTEGER)"),
            "CHAR" | "NCHAR" | "VARCHAR" | "JSON" => format!("CAST({value} AS TEXT)"),
            "DECIMAL" | "DOUBLE" | "FLOAT" | "REAL" => format!("CAST({value} AS REAL)"),
            "BINARY" => format!("CAST({value} AS BLOB)"),
            "DATE" => format!("date({value})"),
            "DATETIME" => format!("datetime({value})"),
            "TIME" => format!("time({value})"),
            _ => return None,
        };
        Some(translated)
    }
}
