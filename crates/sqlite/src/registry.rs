use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use mylite_core::{ConnectError, ConnectionConfig, Engine, EngineAdapter, EngineConfig};
use tracing::info;

use crate::{SqliteAdapter, connect};

pub type SharedEngine = Arc<Mutex<Engine<SqliteAdapter>>>;

static REGISTRY: OnceLock<EngineRegistry> = OnceLock::new();

/// Process-wide engine for the database at `connection.database`.
pub fn shared_engine(
    connection: &ConnectionConfig,
    config: EngineConfig,
) -> Result<SharedEngine, ConnectError> {
    REGISTRY.get_or_init(EngineRegistry::default).open(connection, config)
}

/// One engine per database path. The first caller for a path opens the
/// connection; later callers get the same engine and their configuration is
/// ignored.
#[derive(Default)]
pub struct EngineRegistry {
    engines: Mutex<HashMap<String, SharedEngine>>,
}

impl EngineRegistry {
    pub fn open(
        &self,
        connection: &ConnectionConfig,
        config: EngineConfig,
    ) -> Result<SharedEngine, ConnectError> {
        let mut engines = self.engines.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = engines.get(&connection.database) {
            info!(database = %connection.database, "reusing open engine");
            return Ok(Arc::clone(engine));
        }

        let adapter = connect(connection)?;
        info!(
            database = %connection.database,
            version = %adapter.server_version(),
            "opened engine"
        );
        let engine = Arc::new(Mutex::new(Engine::new(adapter, config)));
        engines.insert(connection.database.clone(), Arc::clone(&engine));
        Ok(engine)
    }

    /// Drops the registry's handle; the connection closes once every caller
    /// has released theirs.
    pub fn close(&self, database: &str) -> bool {
        self.engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(database)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

