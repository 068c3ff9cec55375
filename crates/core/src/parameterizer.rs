use crate::{
    ParameterizeError, Value,
    scan::{LexemeKind, is_word_byte, lex},
};

/// Rewritten SQL with its quoted literals lifted out into positional
/// parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterizedSql {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Replaces every terminated string literal with a ` ?N ` placeholder and
/// collects the unescaped values in order.
///
/// Hex and bit literals (`X'..'`, `B'..'`) stay inline. National and charset
/// introducers (`N'..'`, `_utf8mb4'..'`) are dropped along with the literal.
/// Unterminated literals are left as they are for the engine to reject.
pub fn parameterize(sql: &str, max_bytes: usize) -> Result<ParameterizedSql, ParameterizeError> {
    if sql.len() > max_bytes {
        return Err(ParameterizeError::StatementTooLarge {
            len: sql.len(),
            limit: max_bytes,
        });
    }

    let mut out = String::with_capacity(sql.len());
    let mut params = Vec::new();

    for lexeme in lex(sql) {
        let raw = &sql[lexeme.span.clone()];
        let LexemeKind::Literal(quote) = lexeme.kind else {
            out.push_str(raw);
            continue;
        };
        if !lexeme.terminated {
            out.push_str(raw);
            continue;
        }

        match trailing_word(&out) {
            Some(prefix) if prefix.eq_ignore_ascii_case("x") || prefix.eq_ignore_ascii_case("b") => {
                out.push_str(raw);
                continue;
            }
            Some(prefix) if prefix.eq_ignore_ascii_case("n") || prefix.starts_with('_') => {
                let keep = out.len() - prefix.len();
                out.truncate(keep);
            }
            _ => {}
        }

        params.push(Value::Text(unescape_literal(raw, quote)));
        out.push_str(&format!(" ?{} ", params.len()));
    }

    Ok(ParameterizedSql { sql: out, params })
}

fn trailing_word(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = bytes
        .iter()
        .rposition(|byte| !is_word_byte(*byte))
        .map_or(0, |index| index + 1);
    (start < bytes.len()).then(|| &text[start..])
}

/// Strips the delimiters of a quoted literal and resolves backslash escapes
/// and doubled delimiters.
pub(crate) fn unescape_literal(raw: &str, quote: u8) -> String {
    let quote = char::from(quote);
    let inner = raw.strip_prefix(quote).unwrap_or(raw);
    let inner = inner.strip_suffix(quote).unwrap_or(inner);

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('0') => value.push('\0'),
                Some('b') => value.push('\u{8}'),
                Some('n') => value.push('\n'),
                Some('r') => value.push('\r'),
                Some('t') => value.push('\t'),
                Some('Z') => value.push('\u{1a}'),
                Some(wildcard @ ('%' | '_')) => {
                    value.push('\\');
                    value.push(wildcard);
                }
                Some(other) => value.push(other),
                None => value.push('\\'),
            }
            continue;
        }
        if ch == quote && chars.peek() == Some(&quote) {
            chars.next();
        }
        value.push(ch);
    }
    value
}
