use crate::scan::{SqlText, trim_statement};

/// Splits a multi-row `INSERT`/`REPLACE … VALUES (…), (…)` into one statement
/// per row tuple.
///
/// Returns `None` when the statement must run as written: a single tuple, no
/// `VALUES` list, an `ON DUPLICATE KEY UPDATE` clause, or a target listed in
/// `atomic_tables`.
pub fn split_insert(sql: &str, atomic_tables: &[String]) -> Option<Vec<String>> {
    let text = SqlText::new(trim_statement(sql));

    if text.find_keywords(&["ON", "DUPLICATE", "KEY", "UPDATE"], 0).is_some() {
        return None;
    }

    let table = insert_target(&text)?;
    if atomic_tables
        .iter()
        .any(|atomic| atomic.eq_ignore_ascii_case(&table))
    {
        return None;
    }

    let values = text
        .find_top_level(&["VALUES"], 0..text.len())
        .or_else(|| text.find_top_level(&["VALUE"], 0..text.len()))?;

    let tuples = text.split_top_level(values.end..text.len(), b',');
    if tuples.len() < 2 {
        return None;
    }
    let all_groups = tuples.iter().all(|tuple| {
        text.byte(tuple.start) == Some(b'(')
            && text.matching_paren(tuple.start) == Some(tuple.end - 1)
    });
    if !all_groups {
        return None;
    }

    let prefix = text.slice(0..values.start).trim_end();
    Some(
        tuples
            .into_iter()
            .map(|tuple| format!("{prefix} VALUES {}", text.slice(tuple)))
            .collect(),
    )
}

/// Splits a script into its `;`-terminated statements. Semicolons inside
/// literals, quoted identifiers and comments do not separate; comment-only
/// pieces are dropped.
pub fn split_script(script: &str) -> Vec<String> {
    let text = SqlText::new(script);
    text.split_top_level(0..text.len(), b';')
        .into_iter()
        .filter(|piece| !text.masked()[piece.clone()].trim().is_empty())
        .map(|piece| text.slice(piece).to_string())
        .collect()
}

fn insert_target(text: &SqlText<'_>) -> Option<String> {
    let mut cursor = text.cursor();
    if !cursor.eat_keyword("INSERT") && !cursor.eat_keyword("REPLACE") {
        return None;
    }
    for modifier in ["LOW_PRIORITY", "DELAYED", "HIGH_PRIORITY", "IGNORE"] {
        cursor.eat_keyword(modifier);
    }
    cursor.eat_keyword("INTO");
    cursor.identifier()
}
