use std::{
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use mylite_core::{
    Changes, ColumnInfo, ConnectError, ConnectionConfig, EngineAdapter, EngineError,
    EngineErrorCode, EngineResult, IndexInfo, IndexOrigin, Row, TableSchema, Value, Version,
};
use rusqlite::{
    Connection, ErrorCode, OptionalExtension, ffi, params_from_iter,
    types::{Value as SqliteValue, ValueRef},
};
use tracing::debug;

use crate::{functions, queries};

const MINIMUM_VERSION: Version = Version::new(3, 7, 0);
const SERVER_VERSION_OVERRIDE_KEY: &str = "sqlite.server_version";
const STATEMENT_CACHE_CAPACITY: usize = 64;
const POISONED_CONNECTION_MESSAGE: &str = "sqlite connection state was poisoned";

/// [`EngineAdapter`] over one SQLite connection.
///
/// The connection's own busy handler is disabled: busy and locked conditions
/// surface immediately so the engine's retry policy governs waiting.
pub struct SqliteAdapter {
    connection: Mutex<Connection>,
    server_version: Version,
}

/// Opens `config.database` (a file path or `:memory:`). The directory must
/// already exist.
pub fn connect(config: &ConnectionConfig) -> Result<SqliteAdapter, ConnectError> {
    let override_version = config
        .extra
        .get(SERVER_VERSION_OVERRIDE_KEY)
        .map(String::as_str)
        .map(checked_version)
        .transpose()?;

    let open_error = |source: rusqlite::Error| ConnectError::Open {
        database: config.database.clone(),
        source: engine_error(source),
    };
    let connection = Connection::open(&config.database).map_err(open_error)?;
    connection.busy_timeout(Duration::ZERO).map_err(open_error)?;
    connection.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
    functions::register(&connection).map_err(open_error)?;

    let server_version = match override_version {
        Some(version) => version,
        None => {
            let raw: String = connection
                .query_row(queries::SERVER_VERSION_QUERY, [], |row| row.get(0))
                .map_err(open_error)?;
            checked_version(&raw)?
        }
    };
    debug!(database = %config.database, %server_version, "opened sqlite connection");

    Ok(SqliteAdapter {
        connection: Mutex::new(connection),
        server_version,
    })
}

fn checked_version(raw: &str) -> Result<Version, ConnectError> {
    let version = Version::parse(raw).ok_or_else(|| ConnectError::InvalidVersion {
        raw: raw.to_string(),
    })?;
    if version < MINIMUM_VERSION {
        return Err(ConnectError::UnsupportedVersion {
            found: version,
            minimum: MINIMUM_VERSION,
        });
    }
    Ok(version)
}

impl SqliteAdapter {
    fn lock_connection(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| EngineError::other(ffi::SQLITE_MISUSE, POISONED_CONNECTION_MESSAGE))
    }

    fn table_columns(connection: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
        let mut statement = connection.prepare_cached(queries::TABLE_COLUMNS_QUERY)?;
        let columns = statement
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    declared_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    not_null: row.get(2)?,
                    default: row.get(3)?,
                    primary_key: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    fn table_indexes(connection: &Connection, table: &str) -> rusqlite::Result<Vec<IndexInfo>> {
        let mut statement = connection.prepare_cached(queries::TABLE_INDEXES_QUERY)?;
        let listed = statement
            .query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut columns_of = connection.prepare_cached(queries::INDEX_COLUMNS_QUERY)?;
        listed
            .into_iter()
            .map(|(name, unique, origin)| -> rusqlite::Result<IndexInfo> {
                let columns = columns_of
                    .query_map([name.as_str()], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(IndexInfo {
                    name,
                    unique,
                    origin: match origin.as_str() {
                        "pk" => IndexOrigin::PrimaryKey,
                        "u" => IndexOrigin::UniqueConstraint,
                        _ => IndexOrigin::Created,
                    },
                    columns,
                })
            })
            .collect()
    }
}

impl EngineAdapter for SqliteAdapter {
    fn prepare(&self, sql: &str) -> EngineResult<()> {
        let connection = self.lock_connection()?;
        connection.prepare_cached(sql).map_err(engine_error)?;
        Ok(())
    }

    fn query(&self, sql: &str, params: &[Value]) -> EngineResult<Vec<Row>> {
        let connection = self.lock_connection()?;
        let mut statement = connection.prepare_cached(sql).map_err(engine_error)?;
        let columns = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = statement
            .query(params_from_iter(params.iter().map(bound_value)))
            .map_err(engine_error)?;
        let mut fetched = Vec::new();
        while let Some(row) = rows.next().map_err(engine_error)? {
            let mut record = Row::new();
            for (index, column) in columns.iter().enumerate() {
                let value = row.get_ref(index).map_err(engine_error)?;
                record.push(column.as_str(), fetched_value(value));
            }
            fetched.push(record);
        }
        Ok(fetched)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> EngineResult<Changes> {
        let connection = self.lock_connection()?;
        let mut statement = connection.prepare_cached(sql).map_err(engine_error)?;
        let affected = statement
            .execute(params_from_iter(params.iter().map(bound_value)))
            .map_err(engine_error)?;
        Ok(Changes {
            affected_rows: affected as u64,
            last_insert_id: connection.last_insert_rowid(),
        })
    }

    fn table_schema(&self, table: &str) -> EngineResult<Option<TableSchema>> {
        let connection = self.lock_connection()?;
        let Some((name, sql)) = connection
            .query_row(queries::TABLE_DDL_QUERY, [table], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })
            .optional()
            .map_err(engine_error)?
        else {
            return Ok(None);
        };

        let columns = Self::table_columns(&connection, &name).map_err(engine_error)?;
        let indexes = Self::table_indexes(&connection, &name).map_err(engine_error)?;
        let autoincrement = sql
            .is_some_and(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT"));
        Ok(Some(TableSchema {
            name,
            columns,
            indexes,
            autoincrement,
        }))
    }

    fn begin(&self) -> EngineResult<()> {
        self.lock_connection()?
            .execute_batch("BEGIN")
            .map_err(engine_error)
    }

    fn commit(&self) -> EngineResult<()> {
        self.lock_connection()?
            .execute_batch("COMMIT")
            .map_err(engine_error)
    }

    fn rollback(&self) -> EngineResult<()> {
        self.lock_connection()?
            .execute_batch("ROLLBACK")
            .map_err(engine_error)
    }

    fn server_version(&self) -> Version {
        self.server_version
    }
}

fn bound_value(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Integer(value) => SqliteValue::Integer(*value),
        Value::Real(value) => SqliteValue::Real(*value),
        Value::Text(value) => SqliteValue::Text(value.clone()),
        Value::Blob(value) => SqliteValue::Blob(value.clone()),
    }
}

fn fetched_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => Value::Integer(value),
        ValueRef::Real(value) => Value::Real(value),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

/// Maps a driver error to the engine error the core retries or reports.
pub(crate) fn engine_error(error: rusqlite::Error) -> EngineError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, _) => {
            let code = match failure.code {
                ErrorCode::DatabaseBusy => EngineErrorCode::Busy,
                ErrorCode::DatabaseLocked => EngineErrorCode::Locked,
                _ => EngineErrorCode::Other(failure.extended_code),
            };
            EngineError::new(code, error.to_string())
        }
        _ => EngineError::other(ffi::SQLITE_ERROR, error.to_string()),
    }
}
