//! The database boundary.
//!
//! The importer drives an opaque Bolt client: it needs to open sessions,
//! run statements, commit or roll back, and ask whether a session is still
//! usable. Those five operations are the whole contract, captured by the
//! [`BoltSession`] and [`Connect`] traits; production code plugs in
//! [`BoltConnector`] over `rsmgclient`, tests plug in a scripted fake.
//!
//! Sessions are exclusively owned by one worker slot and never cross
//! threads; only the connector is shared.

use rsmgclient::{ConnectParams, Connection, ConnectionStatus, SSLMode};
use tracing::debug;

use crate::error::{Result, UmbraError};

/// Advertised through the Bolt handshake, like the console client's
/// `mg/<version>` string.
pub const CLIENT_NAME: &str = concat!("umbra/", env!("CARGO_PKG_VERSION"));

/// Connection parameters for the Bolt endpoint.
#[derive(Debug, Clone)]
pub struct BoltConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_ssl: bool,
}

impl Default for BoltConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7687,
            username: String::new(),
            password: String::new(),
            use_ssl: false,
        }
    }
}

/// One live database session. `run` leaves the session inside the
/// surrounding transaction; a batch is `run` × N followed by one `commit`.
pub trait BoltSession {
    /// Runs one statement and drains its results.
    fn run(&mut self, query: &str) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
    /// True when the session is unusable and must be replaced.
    fn is_bad(&self) -> bool;
}

/// Session factory, shared across worker threads. Sessions are created on
/// the thread that will own them.
pub trait Connect: Send + Sync {
    type Session: BoltSession;

    fn connect(&self) -> Result<Self::Session>;
}

/// Production connector over the Bolt client library.
pub struct BoltConnector {
    config: BoltConfig,
}

impl BoltConnector {
    pub fn new(config: BoltConfig) -> Self {
        Self { config }
    }
}

impl Connect for BoltConnector {
    type Session = MgSession;

    fn connect(&self) -> Result<MgSession> {
        let params = ConnectParams {
            host: Some(self.config.host.clone()),
            port: self.config.port,
            username: (!self.config.username.is_empty()).then(|| self.config.username.clone()),
            password: (!self.config.password.is_empty()).then(|| self.config.password.clone()),
            client_name: CLIENT_NAME.to_string(),
            sslmode: if self.config.use_ssl {
                SSLMode::Require
            } else {
                SSLMode::Disable
            },
            // Transactions are demarcated by the importer, one per batch.
            lazy: false,
            autocommit: false,
            ..Default::default()
        };
        let connection = Connection::connect(&params)
            .map_err(|err| UmbraError::Connect(err.to_string()))?;
        debug!(host = %self.config.host, port = self.config.port, "session established");
        Ok(MgSession { connection })
    }
}

/// Session backed by a real connection. Rows are fetched and discarded:
/// the importer never looks at results, it only needs the statement to have
/// executed.
pub struct MgSession {
    connection: Connection,
}

impl BoltSession for MgSession {
    fn run(&mut self, query: &str) -> Result<()> {
        self.connection
            .execute(query, None)
            .map_err(|err| UmbraError::Query(err.to_string()))?;
        self.connection
            .fetchall()
            .map_err(|err| UmbraError::Query(err.to_string()))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.connection
            .commit()
            .map_err(|err| UmbraError::Query(err.to_string()))?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.connection
            .rollback()
            .map_err(|err| UmbraError::Session(err.to_string()))?;
        Ok(())
    }

    fn is_bad(&self) -> bool {
        matches!(
            self.connection.status(),
            ConnectionStatus::Bad | ConnectionStatus::Closed
        )
    }
}
