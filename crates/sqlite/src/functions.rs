//! MySQL functions the engine lacks, registered on every connection.

use regex::{Regex, RegexBuilder};
use rusqlite::{
    Connection, Result,
    functions::{Context, FunctionFlags},
    types::ValueRef,
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) fn register(connection: &Connection) -> Result<()> {
    connection.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        regexp,
    )
}

/// `text REGEXP pattern`, which the engine calls as `regexp(pattern, text)`.
/// Matching is case-insensitive as it is under MySQL's default collations.
/// NULL on either side yields NULL.
fn regexp(ctx: &Context<'_>) -> Result<Option<bool>> {
    if matches!(ctx.get_raw(0), ValueRef::Null) {
        return Ok(None);
    }
    let pattern = ctx.get_or_create_aux(0, |raw| -> std::result::Result<Regex, BoxError> {
        Ok(RegexBuilder::new(raw.as_str()?)
            .case_insensitive(true)
            .build()?)
    })?;

    let subject = match ctx.get_raw(1) {
        ValueRef::Null => return Ok(None),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Integer(value) => value.to_string(),
        ValueRef::Real(value) => value.to_string(),
    };
    Ok(Some(pattern.is_match(&subject)))
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::register;

    fn connection() -> Connection {
        let connection = Connection::open_in_memory().expect("in-memory database");
        register(&connection).expect("register functions");
        connection
    }

    #[test]
    fn regexp_matches_case_insensitively() {
        let connection = connection();
        let matched: bool = connection
            .query_row("SELECT 'WordPress' REGEXP '^word'", [], |row| row.get(0))
            .expect("regexp query");
        assert!(matched);
    }

    #[test]
    fn regexp_with_null_subject_is_null() {
        let connection = connection();
        let matched: Option<bool> = connection
            .query_row("SELECT NULL REGEXP 'a'", [], |row| row.get(0))
            .expect("regexp query");
        assert_eq!(matched, None);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let connection = connection();
        let result = connection.query_row("SELECT 'a' REGEXP '('", [], |row| row.get::<_, bool>(0));
        assert!(result.is_err());
    }
}
