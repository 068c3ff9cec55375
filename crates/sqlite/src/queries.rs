pub(crate) const SERVER_VERSION_QUERY: &str = "SELECT sqlite_version()";

pub(crate) const TABLE_DDL_QUERY: &str = r#"
SELECT name, sql
FROM sqlite_master
WHERE type = 'table' AND name = ?1 COLLATE NOCASE;
"#;

pub(crate) const TABLE_COLUMNS_QUERY: &str = r#"
SELECT name, type, "notnull", dflt_value, pk
FROM pragma_table_info(?1)
ORDER BY cid ASC;
"#;

pub(crate) const TABLE_INDEXES_QUERY: &str = r#"
SELECT name, "unique", origin
FROM pragma_index_list(?1)
ORDER BY seq DESC;
"#;

// Expression index parts have no column name and are skipped.
pub(crate) const INDEX_COLUMNS_QUERY: &str = r#"
SELECT name
FROM pragma_index_info(?1)
WHERE name IS NOT NULL
ORDER BY seqno ASC;
"#;
