//! Running user and role management commands against a MongoDB deployment.
//!
//! The wire protocol itself is provided by the host through the
//! [`Connector`] and [`CommandExecutor`] traits. [`Client`] adds what every
//! command needs on top: a deadline, the acknowledgement check and decoding
//! of the response.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use educe::Educe;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use snafu::{ResultExt, Snafu};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::{
    config::ConnectionSettings,
    document::Document,
    identity::{PrincipalIdentity, PrincipalKind},
};

#[cfg(test)]
pub(crate) mod fake;
mod roles;
mod users;

/// The database that commands spanning the deployment are run on.
pub const ADMIN_DATABASE: &str = "admin";

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to connect to MongoDB"))]
    Connect { source: BoxError },

    #[snafu(display("failed to ping MongoDB after connecting"))]
    Ping {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    #[snafu(display("failed to serialize {command} command"))]
    SerializeCommand {
        command: &'static str,
        source: serde_json::Error,
    },

    #[snafu(display("{command} command did not serialize to a document"))]
    CommandNotADocument { command: &'static str },

    #[snafu(display("failed to run {command} command on database {database:?}"))]
    RunCommand {
        command: &'static str,
        database: String,
        source: BoxError,
    },

    #[snafu(display("{command} command on database {database:?} did not finish within {timeout:?}"))]
    Timeout {
        command: &'static str,
        database: String,
        timeout: Duration,
        source: tokio::time::error::Elapsed,
    },

    #[snafu(display("{command} command was not acknowledged, got ok: {ok}"))]
    CommandNotAcknowledged { command: &'static str, ok: String },

    #[snafu(display("failed to decode {command} response"))]
    DecodeResponse {
        command: &'static str,
        source: serde_json::Error,
    },

    #[snafu(display("{kind} {identity} not found"))]
    NotFound {
        kind: PrincipalKind,
        identity: PrincipalIdentity,
    },

    #[snafu(display("{operation}"))]
    ReadBack {
        operation: &'static str,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },
}

impl Error {
    /// Whether the error means that the principal does not exist, including
    /// when that was found out while reading it back after a write.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::ReadBack { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Runs database commands on an established connection.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs `command` on `database` and returns the raw response document.
    ///
    /// Errors reported by the server (for example a duplicate user) are
    /// returned as `Err`.
    async fn run_command(&self, database: &str, command: Document) -> Result<Document, BoxError>;
}

/// Establishes connections described by [`ConnectionSettings`].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<Arc<dyn CommandExecutor>, BoxError>;
}

/// A connected client.
#[derive(Clone, Educe)]
#[educe(Debug)]
pub struct Client {
    #[educe(Debug(ignore))]
    executor: Arc<dyn CommandExecutor>,
    command_timeout: Duration,
}

#[derive(Serialize)]
struct Ping {
    ping: u8,
}

impl Client {
    pub fn new(executor: Arc<dyn CommandExecutor>, command_timeout: Duration) -> Self {
        Self {
            executor,
            command_timeout,
        }
    }

    /// Connects using `connector` and verifies the connection by pinging the
    /// server.
    #[instrument(skip_all, fields(app_name = %settings.app_name))]
    pub async fn connect(connector: &dyn Connector, settings: &ConnectionSettings) -> Result<Self> {
        let executor = connector.connect(settings).await.context(ConnectSnafu)?;
        let client = Self::new(executor, settings.command_timeout);
        client.ping().await.context(PingSnafu)?;
        debug!("connected to MongoDB");
        Ok(client)
    }

    pub async fn ping(&self) -> Result<()> {
        self.run_acknowledged(ADMIN_DATABASE, "ping", &Ping { ping: 1 })
            .await
    }

    /// Runs a command and decodes its response.
    ///
    /// The command is never logged, as it may carry a password.
    #[instrument(skip(self, command), fields(timeout = ?self.command_timeout))]
    async fn run<C, R>(&self, database: &str, name: &'static str, command: &C) -> Result<R>
    where
        C: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let Value::Object(command) =
            serde_json::to_value(command).context(SerializeCommandSnafu { command: name })?
        else {
            return CommandNotADocumentSnafu { command: name }.fail();
        };

        let response = tokio::time::timeout(
            self.command_timeout,
            self.executor.run_command(database, command),
        )
        .await
        .context(TimeoutSnafu {
            command: name,
            database,
            timeout: self.command_timeout,
        })?
        .context(RunCommandSnafu {
            command: name,
            database,
        })?;

        check_acknowledged(name, &response)?;
        serde_json::from_value(Value::Object(response)).context(DecodeResponseSnafu { command: name })
    }

    /// Runs a command whose response carries nothing but the acknowledgement.
    async fn run_acknowledged<C>(&self, database: &str, name: &'static str, command: &C) -> Result<()>
    where
        C: Serialize + Sync + ?Sized,
    {
        self.run::<C, serde::de::IgnoredAny>(database, name, command)
            .await
            .map(|_| ())
    }
}

/// Fails unless the response reports `ok: 1`.
fn check_acknowledged(command: &'static str, response: &Document) -> Result<()> {
    match response.get("ok") {
        Some(ok) if ok.as_f64().is_some_and(|ok| (ok - 1.0).abs() < f64::EPSILON) => Ok(()),
        Some(ok) => CommandNotAcknowledgedSnafu {
            command,
            ok: ok.to_string(),
        }
        .fail(),
        None => CommandNotAcknowledgedSnafu {
            command,
            ok: "missing",
        }
        .fail(),
    }
}

/// A cheaply cloneable handle that connects on first use.
///
/// All clones share the same connection, so a host process connects at most
/// once. A failed attempt is not cached, the next operation tries again.
#[derive(Clone, Debug)]
pub struct SharedClient {
    inner: Arc<SharedClientInner>,
}

#[derive(Educe)]
#[educe(Debug)]
struct SharedClientInner {
    settings: ConnectionSettings,
    #[educe(Debug(ignore))]
    connector: Arc<dyn Connector>,
    client: OnceCell<Client>,
}

impl SharedClient {
    pub fn new(settings: ConnectionSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(SharedClientInner {
                settings,
                connector,
                client: OnceCell::new(),
            }),
        }
    }

    /// Returns the connected client, connecting first if needed.
    pub async fn get(&self) -> Result<&Client> {
        let inner = &*self.inner;
        inner
            .client
            .get_or_try_init(|| Client::connect(&*inner.connector, &inner.settings))
            .await
    }
}
