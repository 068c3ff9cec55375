mod adapter;
mod functions;
mod queries;
mod registry;

pub use adapter::{SqliteAdapter, connect};
pub use registry::{EngineRegistry, SharedEngine, shared_engine};

use mylite_core::{ConnectError, ConnectionConfig, Engine, EngineConfig};

/// Opens a dedicated engine over `connection`, outside the process-wide
/// registry.
pub fn open_engine(
    connection: &ConnectionConfig,
    config: EngineConfig,
) -> Result<Engine<SqliteAdapter>, ConnectError> {
    Ok(Engine::new(connect(connection)?, config))
}
