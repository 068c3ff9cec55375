use mylite_core::{ErrorCode, REPORTED_MYSQL_VERSION, ReturnValue, StatementKind, Value};
use pretty_assertions::assert_eq;

#[path = "support/sqlite_engine_fixture.rs"]
mod sqlite_engine_fixture;

use sqlite_engine_fixture::{
    column, create_posts, legacy_engine, memory_engine, run, text_column,
};

#[test]
fn multi_row_insert_and_found_rows_round_trip_through_sqlite() {
    let mut engine = memory_engine();
    create_posts(&mut engine);

    let inserted = run(
        &mut engine,
        "INSERT INTO posts (title, status) VALUES ('Hello', 'publish'), ('Draft', 'draft'), ('World', 'publish')",
    );
    assert_eq!(inserted.return_value(), ReturnValue::Affected(3));
    assert_eq!(inserted.last_insert_id, 3);

    let page = run(
        &mut engine,
        "SELECT SQL_CALC_FOUND_ROWS id, title FROM posts WHERE status = 'publish' ORDER BY id LIMIT 0, 1",
    );
    assert_eq!(text_column(&page.rows, "title"), vec!["Hello"]);

    let found = run(&mut engine, "SELECT FOUND_ROWS()");
    assert_eq!(column(&found.rows, "FOUND_ROWS()"), vec![&Value::Integer(2)]);
}

#[test]
fn legacy_engine_splits_multi_row_insert() {
    let mut engine = legacy_engine();
    assert!(!engine.capabilities().multi_row_insert);
    create_posts(&mut engine);

    let inserted = run(
        &mut engine,
        "INSERT INTO posts (title) VALUES ('a'), ('b'), ('c')",
    );
    assert_eq!(inserted.affected_rows, 1);
    assert_eq!(inserted.last_insert_id, 3);

    let counted = run(&mut engine, "SELECT COUNT(*) AS n FROM posts");
    assert_eq!(column(&counted.rows, "n"), vec![&Value::Integer(3)]);
}

#[test]
fn upsert_updates_the_conflicting_row() {
    for mut engine in [memory_engine(), legacy_engine()] {
        run(
            &mut engine,
            "CREATE TABLE options (
                option_name varchar(191) NOT NULL DEFAULT '',
                option_value longtext NOT NULL,
                UNIQUE KEY option_name (option_name)
            )",
        );
        for value in ["http://old", "http://new"] {
            run(
                &mut engine,
                &format!(
                    "INSERT INTO options (option_name, option_value) VALUES ('siteurl', '{value}') ON DUPLICATE KEY UPDATE option_value = VALUES(option_value)"
                ),
            );
        }

        let stored = run(&mut engine, "SELECT option_value FROM options");
        assert_eq!(text_column(&stored.rows, "option_value"), vec!["http://new"]);
    }
}

#[test]
fn add_column_after_rebuilds_table_and_keeps_rows_and_indexes() {
    let mut engine = memory_engine();
    create_posts(&mut engine);
    run(
        &mut engine,
        "INSERT INTO posts (title, status) VALUES ('Hello', 'publish'), ('World', 'draft')",
    );

    run(
        &mut engine,
        "ALTER TABLE posts ADD COLUMN slug varchar(200) NULL AFTER title",
    );

    let columns = run(&mut engine, "SHOW COLUMNS FROM posts");
    assert_eq!(
        text_column(&columns.rows, "Field"),
        vec!["id", "title", "slug", "status"]
    );

    let rows = run(&mut engine, "SELECT id, title, slug, status FROM posts ORDER BY id");
    assert_eq!(text_column(&rows.rows, "title"), vec!["Hello", "World"]);
    assert_eq!(column(&rows.rows, "slug"), vec![&Value::Null, &Value::Null]);

    let indexes = run(&mut engine, "SHOW INDEX FROM posts");
    assert_eq!(
        text_column(&indexes.rows, "Key_name"),
        vec!["PRIMARY", "type_status", "type_status"]
    );
    assert_eq!(
        text_column(&indexes.rows, "Column_name"),
        vec!["id", "status", "id"]
    );

    let inserted = run(&mut engine, "INSERT INTO posts (title) VALUES ('Third')");
    assert_eq!(inserted.last_insert_id, 3);
}

#[test]
fn modify_to_not_null_fills_existing_nulls() {
    let mut engine = memory_engine();
    run(&mut engine, "CREATE TABLE notes (id int NOT NULL, body text)");
    run(&mut engine, "INSERT INTO notes (id, body) VALUES (1, NULL), (2, 'kept')");

    run(&mut engine, "ALTER TABLE notes MODIFY body varchar(50) NOT NULL");

    let rows = run(&mut engine, "SELECT body FROM notes ORDER BY id");
    assert_eq!(text_column(&rows.rows, "body"), vec!["", "kept"]);

    let described = run(&mut engine, "DESCRIBE notes body");
    assert_eq!(text_column(&described.rows, "Type"), vec!["varchar(50)"]);
    assert_eq!(text_column(&described.rows, "Null"), vec!["NO"]);
}

#[test]
fn follow_up_subcommands_run_after_the_first() {
    let mut engine = memory_engine();
    create_posts(&mut engine);
    run(&mut engine, "INSERT INTO posts (title) VALUES ('Hello')");

    let altered = run(
        &mut engine,
        "ALTER TABLE posts ADD COLUMN hits int NOT NULL, ADD INDEX by_title (title)",
    );
    assert!(altered.is_success());

    let rows = run(&mut engine, "SELECT hits FROM posts");
    assert_eq!(column(&rows.rows, "hits"), vec![&Value::Integer(0)]);

    let by_title = run(&mut engine, "SHOW INDEX FROM posts WHERE Key_name = 'by_title'");
    assert_eq!(text_column(&by_title.rows, "Column_name"), vec!["title"]);

    run(&mut engine, "DROP INDEX by_title ON posts");
    let remaining = run(&mut engine, "SHOW INDEX FROM posts WHERE Key_name = 'by_title'");
    assert!(remaining.rows.is_empty());
}

#[test]
fn truncate_resets_the_autoincrement_sequence() {
    let mut engine = memory_engine();
    create_posts(&mut engine);
    run(&mut engine, "INSERT INTO posts (title) VALUES ('a'), ('b')");

    run(&mut engine, "TRUNCATE TABLE posts");

    let inserted = run(&mut engine, "INSERT INTO posts (title) VALUES ('c')");
    assert_eq!(inserted.last_insert_id, 1);
}

#[test]
fn regexp_operator_uses_registered_function() {
    let mut engine = memory_engine();
    create_posts(&mut engine);
    run(
        &mut engine,
        "INSERT INTO posts (title) VALUES ('Hello world'), ('Goodbye')",
    );

    let matched = run(&mut engine, "SELECT title FROM posts WHERE title REGEXP '^hel'");
    assert_eq!(text_column(&matched.rows, "title"), vec!["Hello world"]);

    let rlike = run(&mut engine, "SELECT title FROM posts WHERE title RLIKE 'bye$'");
    assert_eq!(text_column(&rlike.rows, "title"), vec!["Goodbye"]);
}

#[test]
fn show_tables_lists_user_tables_only() {
    let mut engine = memory_engine();
    create_posts(&mut engine);
    run(&mut engine, "CREATE TABLE wp_users (ID int NOT NULL)");

    let tables = run(&mut engine, "SHOW TABLES");
    assert_eq!(
        text_column(&tables.rows, "Tables_in_blog"),
        vec!["posts", "wp_users"]
    );

    let filtered = run(&mut engine, "SHOW TABLES LIKE 'wp\\_%'");
    assert_eq!(text_column(&filtered.rows, "Tables_in_blog"), vec!["wp_users"]);
}

#[test]
fn rolled_back_transaction_discards_writes() {
    let mut engine = memory_engine();
    create_posts(&mut engine);

    run(&mut engine, "START TRANSACTION");
    assert!(engine.in_transaction());
    run(&mut engine, "INSERT INTO posts (title) VALUES ('temporary')");
    run(&mut engine, "ROLLBACK");
    assert!(!engine.in_transaction());

    let counted = run(&mut engine, "SELECT COUNT(*) AS n FROM posts");
    assert_eq!(column(&counted.rows, "n"), vec![&Value::Integer(0)]);
}

#[test]
fn engine_failures_are_reported_in_the_outcome() {
    let mut engine = memory_engine();

    let missing = engine.query("SELECT * FROM missing WHERE id = 1");
    assert_eq!(missing.kind, Some(StatementKind::Select));
    let error = missing.error.expect("missing table should fail");
    assert_eq!(error.code.category(), "execute");
    assert!(
        error.message.contains("no such table: missing"),
        "unexpected message: {}",
        error.message
    );

    let garbage = engine.query("FROBNICATE everything");
    assert_eq!(garbage.kind, None);
    assert_eq!(
        garbage.error.map(|error| error.code),
        Some(ErrorCode::UnrecognizedQuery)
    );
}

#[test]
fn unknown_table_in_describe_is_an_engine_error() {
    let mut engine = memory_engine();
    create_posts(&mut engine);

    for sql in ["DESCRIBE ghost", "SHOW COLUMNS FROM ghost", "SHOW FULL COLUMNS FROM ghost"] {
        let outcome = engine.query(sql);
        assert!(outcome.rows.is_empty());
        let error = outcome.error.expect("unknown table should fail");
        assert_eq!(error.code.category(), "execute");
        assert!(
            error.message.contains("no such table: ghost"),
            "unexpected message for `{sql}`: {}",
            error.message
        );
    }

    let filtered = run(&mut engine, "SHOW COLUMNS FROM posts LIKE 'nothing%'");
    assert!(filtered.rows.is_empty());
}

#[test]
fn like_escapes_match_literal_underscores() {
    let mut engine = memory_engine();
    create_posts(&mut engine);
    run(
        &mut engine,
        "INSERT INTO posts (title) VALUES ('wp_posts'), ('wpxposts'), ('_transient_a'), ('xtransient_b')",
    );

    let prefixed = run(&mut engine, "SELECT title FROM posts WHERE title LIKE 'wp\\_%'");
    assert_eq!(text_column(&prefixed.rows, "title"), vec!["wp_posts"]);

    let unescaped = run(&mut engine, "SELECT title FROM posts WHERE title LIKE 'wp_%' ORDER BY id");
    assert_eq!(
        text_column(&unescaped.rows, "title"),
        vec!["wp_posts", "wpxposts"]
    );

    let deleted = run(
        &mut engine,
        "DELETE FROM posts WHERE title LIKE '\\_transient\\_%'",
    );
    assert_eq!(deleted.return_value(), ReturnValue::Affected(1));

    let remaining = run(&mut engine, "SELECT title FROM posts ORDER BY id");
    assert_eq!(
        text_column(&remaining.rows, "title"),
        vec!["wp_posts", "wpxposts", "xtransient_b"]
    );
}

#[test]
fn non_ascii_identifiers_next_to_operators_run() {
    let mut engine = memory_engine();
    run(&mut engine, "CREATE TABLE notes (id int NOT NULL, body text)");
    run(&mut engine, "INSERT INTO notes (id, body) VALUES (1, NULL), (2, 'kept')");

    let rows = run(
        &mut engine,
        "SELECT body FROM (SELECT body, id AS 番号 FROM notes) AS n WHERE 1<番号 AND body<=>'kept'",
    );
    assert_eq!(text_column(&rows.rows, "body"), vec!["kept"]);
}

#[test]
fn oversized_interval_fails_without_panicking() {
    let mut engine = memory_engine();

    let outcome =
        engine.query("SELECT DATE_ADD('2020-01-01', INTERVAL 9223372036854775807 WEEK) AS d");
    let error = outcome.error.expect("untranslated DATE_ADD should fail");
    assert_eq!(error.code.category(), "execute");

    let shifted = run(
        &mut engine,
        "SELECT DATE_ADD('2020-01-01', INTERVAL 1 WEEK) AS d",
    );
    assert_eq!(text_column(&shifted.rows, "d"), vec!["2020-01-08 00:00:00"]);
}

#[test]
fn reported_mysql_version_is_fixed() {
    let mut engine = memory_engine();

    let variable = run(&mut engine, "SHOW VARIABLES LIKE 'version'");
    assert_eq!(text_column(&variable.rows, "Value"), vec![REPORTED_MYSQL_VERSION]);

    let selected = run(&mut engine, "SELECT VERSION() AS v");
    assert_eq!(text_column(&selected.rows, "v"), vec![REPORTED_MYSQL_VERSION]);
}

#[test]
fn rename_table_carries_its_secondary_indexes() {
    let mut engine = memory_engine();
    create_posts(&mut engine);
    run(&mut engine, "INSERT INTO posts (title, status) VALUES ('Hello', 'publish')");

    run(&mut engine, "ALTER TABLE posts RENAME TO articles");

    let indexes = run(&mut engine, "SHOW INDEX FROM articles");
    assert_eq!(
        text_column(&indexes.rows, "Key_name"),
        vec!["PRIMARY", "type_status", "type_status"]
    );
    assert_eq!(
        text_column(&indexes.rows, "Table"),
        vec!["articles", "articles", "articles"]
    );

    run(&mut engine, "ALTER TABLE articles DROP INDEX type_status");
    let remaining = run(&mut engine, "SHOW INDEX FROM articles");
    assert_eq!(text_column(&remaining.rows, "Key_name"), vec!["PRIMARY"]);

    run(&mut engine, "CREATE TABLE posts (id int NOT NULL, status varchar(20))");
    run(&mut engine, "CREATE INDEX type_status ON posts (status)");
    let rows = run(&mut engine, "SELECT title FROM articles");
    assert_eq!(text_column(&rows.rows, "title"), vec!["Hello"]);
}
