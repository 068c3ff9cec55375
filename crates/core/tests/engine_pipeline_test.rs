#[path = "support/fake_adapter.rs"]
mod fake_adapter;

use fake_adapter::{Call, FakeAdapter, LEGACY};
use mylite_core::{
    ColumnInfo, Engine, EngineConfig, EngineErrorCode, ErrorCode, ReturnValue, RetryPolicy, Row,
    StatementKind, TableSchema, Value,
};
use pretty_assertions::assert_eq;

fn config() -> EngineConfig {
    EngineConfig {
        retry: RetryPolicy::immediate(3),
        ddl_retry: RetryPolicy::immediate(3),
        database_name: "blog".to_string(),
        ..EngineConfig::default()
    }
}

fn engine(adapter: FakeAdapter) -> Engine<FakeAdapter> {
    Engine::new(adapter, config())
}

fn column(name: &str, declared_type: &str, not_null: bool, primary_key: u32) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        declared_type: declared_type.to_string(),
        not_null,
        default: None,
        primary_key,
    }
}

fn posts_schema() -> TableSchema {
    TableSchema {
        name: "posts".to_string(),
        columns: vec![
            column("id", "integer", true, 1),
            column("title", "varchar(200)", false, 0),
            column("body", "text", false, 0),
        ],
        indexes: Vec::new(),
        autoincrement: true,
    }
}

#[test]
fn unrecognized_statement_never_reaches_engine() {
    let mut engine = engine(FakeAdapter::default());
    let outcome = engine.query("GARBAGE NOT SQL");

    assert_eq!(outcome.kind, None);
    let error = outcome.error.expect("classification failure");
    assert_eq!(error.code, ErrorCode::UnrecognizedQuery);
    assert!(engine.adapter().calls().is_empty());
}

#[test]
fn select_literals_are_bound_as_parameters() {
    let adapter = FakeAdapter::default();
    adapter.respond_with("FROM posts", vec![Row::new().with("id", 1_i64)]);
    let mut engine = engine(adapter);

    let outcome = engine.query("SELECT id FROM posts WHERE status = 'publish'");

    assert!(outcome.is_success());
    assert_eq!(outcome.return_value(), ReturnValue::Rows(&[Row::new().with("id", 1_i64)]));
    let sql = "SELECT id FROM posts WHERE status =  ?1 ".to_string();
    assert_eq!(
        engine.adapter().calls(),
        vec![
            Call::Prepare(sql.clone()),
            Call::Query(sql, vec![Value::text("publish")]),
        ]
    );
}

#[test]
fn found_rows_is_answered_once_from_the_last_calculating_select() {
    let adapter = FakeAdapter::default();
    adapter.respond_with(
        "FROM posts",
        vec![Row::new().with("id", 1_i64), Row::new().with("id", 2_i64)],
    );
    adapter.respond_with("found_rows_source", vec![Row::new().with("COUNT(*)", 42_i64)]);
    let mut engine = engine(adapter);

    let page = engine.query("SELECT SQL_CALC_FOUND_ROWS id FROM posts LIMIT 2");
    assert_eq!(page.row_count(), 2);

    let counted = engine.query("SELECT FOUND_ROWS()");
    assert_eq!(counted.kind, Some(StatementKind::FoundRows));
    assert_eq!(counted.rows[0].get("FOUND_ROWS()"), Some(&Value::Integer(42)));

    let again = engine.query("SELECT FOUND_ROWS()");
    assert_eq!(again.rows[0].get("FOUND_ROWS()"), Some(&Value::Integer(0)));
}

#[test]
fn select_without_calc_marker_leaves_found_rows_empty() {
    let adapter = FakeAdapter::default();
    adapter.respond_with("FROM posts", vec![Row::new().with("id", 1_i64)]);
    let mut engine = engine(adapter);

    engine.query("SELECT id FROM posts");
    let counted = engine.query("SELECT FOUND_ROWS()");

    assert_eq!(counted.rows[0].get("FOUND_ROWS()"), Some(&Value::Integer(0)));
    assert!(
        !engine
            .adapter()
            .executed_sql()
            .iter()
            .any(|sql| sql.contains("found_rows_source"))
    );
}

#[test]
fn legacy_engine_inserts_one_row_at_a_time() {
    let adapter = FakeAdapter::with_version(LEGACY);
    adapter.set_changes(1, 7);
    let mut engine = engine(adapter);

    let outcome = engine.query("INSERT INTO posts (title) VALUES ('a'), ('b'), ('c')");

    assert!(outcome.is_success());
    assert_eq!(outcome.affected_rows, 1);
    assert_eq!(outcome.last_insert_id, 7);
    assert_eq!(
        engine.adapter().prepared_sql(),
        vec!["INSERT INTO `posts` (title) VALUES ( ?1 )".to_string()]
    );
    assert_eq!(
        engine.adapter().execute_params(),
        vec![
            vec![Value::text("a")],
            vec![Value::text("b")],
            vec![Value::text("c")],
        ]
    );
}

#[test]
fn legacy_upsert_is_not_split() {
    let mut engine = engine(FakeAdapter::with_version(LEGACY));

    engine.query(
        "INSERT INTO options (name) VALUES ('a'), ('b') ON DUPLICATE KEY UPDATE name = VALUES(name)",
    );

    assert_eq!(
        engine.adapter().executed_sql(),
        vec!["INSERT OR REPLACE INTO `options` (name) VALUES ( ?1 ), ( ?2 )".to_string()]
    );
}

#[test]
fn atomic_tables_keep_multi_row_inserts_whole() {
    let mut engine = Engine::new(
        FakeAdapter::with_version(LEGACY),
        EngineConfig {
            atomic_insert_tables: vec!["POSTS".to_string()],
            ..config()
        },
    );

    engine.query("INSERT INTO posts (title) VALUES ('a'), ('b')");

    assert_eq!(engine.adapter().executed_sql().len(), 1);
}

#[test]
fn modern_engine_runs_multi_row_insert_as_written() {
    let mut engine = engine(FakeAdapter::default());

    engine.query("INSERT INTO posts (title) VALUES ('a'), ('b')");

    assert_eq!(
        engine.adapter().executed_sql(),
        vec!["INSERT INTO `posts` (title) VALUES ( ?1 ), ( ?2 )".to_string()]
    );
}

#[test]
fn update_reports_affected_rows() {
    let adapter = FakeAdapter::default();
    adapter.set_changes(3, 0);
    let mut engine = engine(adapter);

    let outcome = engine.query("UPDATE posts SET title = 'x' WHERE id > 1");

    assert_eq!(outcome.return_value(), ReturnValue::Affected(3));
}

#[test]
fn alter_rebuild_then_resubmits_remaining_subcommands() {
    let adapter = FakeAdapter::default();
    adapter.set_schema(posts_schema());
    let mut engine = engine(adapter);

    let outcome = engine.query("ALTER TABLE posts DROP COLUMN body, ADD INDEX by_title (title)");

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.kind, Some(StatementKind::Alter));
    assert_eq!(
        engine.adapter().executed_sql(),
        vec![
            "CREATE TABLE `_mylite_rebuild_posts` (`id` integer PRIMARY KEY AUTOINCREMENT NOT NULL, `title` varchar(200))",
            "INSERT INTO `_mylite_rebuild_posts` (`id`, `title`) SELECT `id`, `title` FROM `posts`",
            "DROP TABLE `posts`",
            "ALTER TABLE `_mylite_rebuild_posts` RENAME TO `posts`",
            "CREATE INDEX `posts__by_title` ON `posts` (`title`)",
        ]
    );
}

#[test]
fn failed_rebuild_step_stops_plan_and_names_the_step() {
    let adapter = FakeAdapter::default();
    adapter.set_schema(posts_schema());
    adapter.set_fail_on_sql("INSERT INTO `_mylite_rebuild_posts`", "no such column: body");
    let mut engine = engine(adapter);

    let outcome = engine.query("ALTER TABLE posts MODIFY title varchar(100) NOT NULL");

    let error = outcome.error.expect("copy step fails");
    assert_eq!(error.code, ErrorCode::Engine(EngineErrorCode::Other(1)));
    assert_eq!(
        error.message,
        "statement 1 failed during execute (copy data): no such column: body"
    );
    assert!(
        !engine
            .adapter()
            .executed_sql()
            .contains(&"DROP TABLE `posts`".to_string())
    );
}

#[test]
fn follow_up_failure_is_reported_on_the_original_statement() {
    let adapter = FakeAdapter::default();
    adapter.set_schema(posts_schema());
    adapter.set_fail_on_sql("posts__by_title", "index already exists");
    let mut engine = engine(adapter);

    let outcome = engine.query("ALTER TABLE posts RENAME COLUMN body TO content, ADD INDEX by_title (title)");

    assert_eq!(outcome.kind, Some(StatementKind::Alter));
    let error = outcome.error.expect("follow-up fails");
    assert!(error.message.ends_with("index already exists"), "{}", error.message);
    assert_eq!(
        engine.adapter().executed_sql()[0],
        "ALTER TABLE `posts` RENAME COLUMN `body` TO `content`"
    );
}

#[test]
fn show_columns_is_reshaped_to_mysql_layout() {
    let adapter = FakeAdapter::default();
    adapter.respond_with(
        "PRAGMA table_info",
        vec![
            Row::new()
                .with("cid", 0_i64)
                .with("name", "id")
                .with("type", "integer")
                .with("notnull", 1_i64)
                .with("dflt_value", Value::Null)
                .with("pk", 1_i64),
            Row::new()
                .with("cid", 1_i64)
                .with("name", "status")
                .with("type", "varchar(20)")
                .with("notnull", 0_i64)
                .with("dflt_value", "'draft'")
                .with("pk", 0_i64),
        ],
    );
    let mut engine = engine(adapter);

    let outcome = engine.query("SHOW COLUMNS FROM posts");

    assert_eq!(
        engine.adapter().executed_sql(),
        vec!["PRAGMA table_info(`posts`)".to_string()]
    );
    assert_eq!(
        outcome.rows,
        vec![
            Row::new()
                .with("Field", "id")
                .with("Type", "integer")
                .with("Null", "NO")
                .with("Key", "PRI")
                .with("Default", Value::Null)
                .with("Extra", ""),
            Row::new()
                .with("Field", "status")
                .with("Type", "varchar(20)")
                .with("Null", "YES")
                .with("Key", "")
                .with("Default", "draft")
                .with("Extra", ""),
        ]
    );
}

#[test]
fn show_index_lists_primary_and_secondary_keys() {
    let adapter = FakeAdapter::default();
    adapter.respond_with(
        "sqlite_master",
        vec![
            Row::new()
                .with("type", "table")
                .with("name", "posts")
                .with("tbl_name", "posts")
                .with(
                    "sql",
                    "CREATE TABLE `posts` (`id` integer PRIMARY KEY AUTOINCREMENT NOT NULL, `title` varchar(200))",
                ),
            Row::new()
                .with("type", "index")
                .with("name", "posts__by_title")
                .with("tbl_name", "posts")
                .with("sql", "CREATE INDEX `posts__by_title` ON `posts` (`title`)"),
        ],
    );
    let mut engine = engine(adapter);

    let all = engine.query("SHOW INDEX FROM posts");
    let keys = all
        .rows
        .iter()
        .map(|row| {
            (
                row.get("Key_name").cloned(),
                row.get("Column_name").cloned(),
                row.get("Non_unique").cloned(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        keys,
        vec![
            (Some(Value::text("PRIMARY")), Some(Value::text("id")), Some(Value::Integer(0))),
            (Some(Value::text("by_title")), Some(Value::text("title")), Some(Value::Integer(1))),
        ]
    );

    let filtered = engine.query("SHOW INDEX FROM posts WHERE Key_name = 'by_title'");
    assert_eq!(filtered.row_count(), 1);
}

#[test]
fn emulated_commands_make_no_engine_calls() {
    let mut engine = engine(FakeAdapter::default());

    let variables = engine.query("SHOW VARIABLES LIKE 'max_allowed_packet'");
    assert_eq!(
        variables.rows,
        vec![
            Row::new()
                .with("Variable_name", "max_allowed_packet")
                .with("Value", "16777216")
        ]
    );

    let status = engine.query("SHOW TABLE STATUS LIKE 'posts'");
    assert_eq!(status.rows[0].get("Name"), Some(&Value::text("posts")));
    assert_eq!(status.rows[0].get("Engine"), Some(&Value::text("InnoDB")));

    let set = engine.query("SET NAMES utf8mb4");
    assert_eq!(set.return_value(), ReturnValue::Success(true));

    assert!(engine.adapter().calls().is_empty());
}

#[test]
fn check_table_reports_ok_status() {
    let adapter = FakeAdapter::default();
    adapter.respond_with("quick_check", vec![Row::new().with("quick_check", "ok")]);
    let mut engine = engine(adapter);

    let outcome = engine.query("CHECK TABLE posts");

    assert_eq!(
        outcome.rows,
        vec![
            Row::new()
                .with("Table", "blog.posts")
                .with("Op", "check")
                .with("Msg_type", "status")
                .with("Msg_text", "OK")
        ]
    );
}

#[test]
fn ddl_literals_are_not_parameterized() {
    let mut engine = engine(FakeAdapter::default());

    let outcome = engine.query(
        "CREATE TABLE options (name varchar(64) NOT NULL DEFAULT '', KEY by_name (name)) ENGINE=InnoDB",
    );

    assert!(outcome.is_success());
    assert_eq!(
        engine.adapter().execute_params(),
        vec![Vec::<Value>::new(), Vec::new()]
    );
    assert_eq!(
        engine.adapter().executed_sql(),
        vec![
            "CREATE TABLE `options` (`name` varchar(64) NOT NULL DEFAULT '')",
            "CREATE INDEX `options__by_name` ON `options` (`name`)",
        ]
    );
}

#[test]
fn create_database_is_accepted_without_engine_work() {
    let mut engine = engine(FakeAdapter::default());

    let outcome = engine.query("CREATE DATABASE IF NOT EXISTS blog");

    assert!(outcome.is_success());
    assert!(engine.adapter().calls().is_empty());
}
