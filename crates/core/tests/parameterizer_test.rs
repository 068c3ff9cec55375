use mylite_core::{ParameterizeError, Value, parameterize};
use pretty_assertions::assert_eq;

fn placeholder_count(sql: &str) -> usize {
    sql.matches(" ?").count()
}

#[test]
fn escaped_quotes_are_unescaped_into_parameters() {
    let sql = r#"SELECT * FROM t WHERE a = 'it\'s' AND b = "say \"hi\"" AND c = 'x''y'"#;
    let parameterized = parameterize(sql, usize::MAX).expect("parameterize");

    assert_eq!(
        parameterized.params,
        vec![
            Value::text("it's"),
            Value::text("say \"hi\""),
            Value::text("x'y"),
        ]
    );
    assert_eq!(placeholder_count(&parameterized.sql), parameterized.params.len());
    assert_eq!(
        parameterized.sql,
        "SELECT * FROM t WHERE a =  ?1  AND b =  ?2  AND c =  ?3 "
    );
}

#[test]
fn placeholders_are_separated_from_punctuation() {
    let parameterized = parameterize("INSERT INTO t VALUES('a','b')", usize::MAX).expect("parameterize");
    assert_eq!(parameterized.sql, "INSERT INTO t VALUES( ?1 , ?2 )");
}

#[test]
fn quotes_inside_comments_and_identifiers_are_not_literals() {
    let sql = "SELECT `it's` /* don't */ FROM t";
    let parameterized = parameterize(sql, usize::MAX).expect("parameterize");
    assert_eq!(parameterized.sql, sql);
    assert!(parameterized.params.is_empty());
}

#[test]
fn unterminated_literal_passes_through() {
    let sql = "SELECT 'open";
    let parameterized = parameterize(sql, usize::MAX).expect("parameterize");
    assert_eq!(parameterized.sql, sql);
    assert!(parameterized.params.is_empty());
}

#[test]
fn oversized_statement_is_rejected() {
    let sql = format!("SELECT '{}'", "x".repeat(64));
    let error = parameterize(&sql, 32).expect_err("limit exceeded");
    assert_eq!(
        error,
        ParameterizeError::StatementTooLarge {
            len: sql.len(),
            limit: 32,
        }
    );
    assert!(error.to_string().starts_with("statement too large to parse"));
}
