use mylite_core::{
    ConnectionConfig, Engine, EngineConfig, ExecutionOutcome, RetryPolicy, Row, Value,
};
use mylite_sqlite::{SqliteAdapter, open_engine};

pub const LEGACY_VERSION: &str = "3.7.2";

pub fn test_config() -> EngineConfig {
    EngineConfig {
        retry: RetryPolicy::immediate(3),
        ddl_retry: RetryPolicy::immediate(3),
        database_name: "blog".to_string(),
        ..EngineConfig::default()
    }
}

pub fn memory_engine() -> Engine<SqliteAdapter> {
    open_engine(&ConnectionConfig::new(":memory:"), test_config())
        .expect("in-memory engine should open")
}

pub fn legacy_engine() -> Engine<SqliteAdapter> {
    let connection =
        ConnectionConfig::new(":memory:").with_extra("sqlite.server_version", LEGACY_VERSION);
    open_engine(&connection, test_config()).expect("legacy engine should open")
}

/// Runs `sql` and fails the test with the engine's message when it errors.
pub fn run(engine: &mut Engine<SqliteAdapter>, sql: &str) -> ExecutionOutcome {
    let outcome = engine.query(sql);
    if let Some(error) = &outcome.error {
        panic!("`{sql}` failed: [{}] {}", error.code, error.message);
    }
    outcome
}

pub fn column<'a>(rows: &'a [Row], name: &str) -> Vec<&'a Value> {
    rows.iter()
        .map(|row| {
            row.get(name)
                .unwrap_or_else(|| panic!("row has no `{name}` column: {row:?}"))
        })
        .collect()
}

pub fn text_column(rows: &[Row], name: &str) -> Vec<String> {
    column(rows, name)
        .into_iter()
        .map(|value| value.display_string().unwrap_or_default())
        .collect()
}

pub fn create_posts(engine: &mut Engine<SqliteAdapter>) {
    run(
        engine,
        "CREATE TABLE `posts` (
            `id` bigint(20) unsigned NOT NULL AUTO_INCREMENT,
            `title` varchar(200) NOT NULL DEFAULT '',
            `status` varchar(20) NOT NULL DEFAULT 'draft',
            PRIMARY KEY (`id`),
            KEY `type_status` (`status`, `id`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
    );
}
