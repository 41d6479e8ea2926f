//! Operator-facing facade
//!
//! [`OperatorConsole`] is what a front-end talks to: it owns the proxy
//! session, resolves catalog keys, serialises runs and turns results and
//! errors into display text.
//!
//! Runs queue behind one lock, so two runs never share the session at the
//! same time. That also keeps the stale-process kill of one run away from
//! another run's log utility.

use std::path::PathBuf;

use secrecy::SecretString;
use tokio::sync::Mutex;

use crate::config::{AppSettings, CommandCatalog};
use crate::error::{HopError, HopResult};
use crate::oplog::{OperationLog, OperationRecord};
use crate::runner::{CommandSequenceRunner, ExecutionResult, RunnerSettings, kill_stale_log_processes};
use crate::transport::{
    CommandOutput, ProxyCredential, ProxyTransport, TransportSession, TransportSettings,
};

const NOT_CONNECTED: &str = "Not connected";

/// Parameters of a proxy connect request
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Proxy host
    pub host: String,
    /// Proxy account
    pub username: String,
    /// Private key path
    pub key_path: PathBuf,
    /// Key passphrase
    pub passphrase: Option<SecretString>,
}

/// Session owner and entry point for front-ends
pub struct OperatorConsole<T: ProxyTransport> {
    session: Mutex<Option<T>>,
    catalog: CommandCatalog,
    runner: RunnerSettings,
    transport: TransportSettings,
    oplog: Option<OperationLog>,
}

impl<T: ProxyTransport> std::fmt::Debug for OperatorConsole<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorConsole")
            .field("catalog_entries", &self.catalog.len())
            .field("oplog", &self.oplog)
            .finish_non_exhaustive()
    }
}

impl<T: ProxyTransport> OperatorConsole<T> {
    /// Builds a disconnected console from settings
    ///
    /// # Errors
    ///
    /// Returns `HopError::Config` if the settings are invalid.
    pub fn new(settings: &AppSettings) -> HopResult<Self> {
        settings.validate()?;
        Ok(Self {
            session: Mutex::new(None),
            catalog: settings.commands.clone(),
            runner: settings.runner_settings()?,
            transport: settings.proxy.transport_settings(),
            oplog: None,
        })
    }

    /// Records every operation in `oplog`
    #[must_use]
    pub fn with_operation_log(mut self, oplog: OperationLog) -> Self {
        self.oplog = Some(oplog);
        self
    }

    /// The command catalog
    #[must_use]
    pub const fn catalog(&self) -> &CommandCatalog {
        &self.catalog
    }

    /// Engine parameters in use
    #[must_use]
    pub const fn runner_settings(&self) -> &RunnerSettings {
        &self.runner
    }

    /// Installs an already connected transport, replacing any previous one
    pub async fn attach(&self, transport: T) -> String {
        let status = format!("Connected to {}", transport.host());
        let previous = self.session.lock().await.replace(transport);
        if let Some(mut previous) = previous {
            previous.disconnect().await;
        }
        status
    }

    /// Closes the session; a no-op when not connected
    pub async fn disconnect(&self) -> String {
        let session = self.session.lock().await.take();
        match session {
            Some(mut transport) => {
                transport.disconnect().await;
                format!("Disconnected from {}", transport.host())
            }
            None => NOT_CONNECTED.to_string(),
        }
    }

    /// Connection status text
    ///
    /// Reports a busy session instead of waiting for a running operation.
    pub fn status(&self) -> String {
        match self.session.try_lock() {
            Ok(guard) => match guard.as_ref() {
                Some(transport) if transport.is_connected() => {
                    format!("Connected to {}", transport.host())
                }
                _ => NOT_CONNECTED.to_string(),
            },
            Err(_) => "Operation in progress".to_string(),
        }
    }

    /// Runs the catalog entry `key` against the device at `address`
    ///
    /// # Errors
    ///
    /// Returns the run's failure; see [`HopError`].
    pub async fn execute(&self, address: &str, key: &str) -> HopResult<ExecutionResult> {
        let spec = self.catalog.select(key)?;
        let guard = self.session.lock().await;
        let transport = guard
            .as_ref()
            .ok_or_else(|| HopError::connect("proxy", "not connected"))?;

        let budget = self.runner.run_budget();
        let mut runner = CommandSequenceRunner::new(transport, &self.runner);
        let result = match tokio::time::timeout(budget, runner.run(address, &spec)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(device = %address, "Run exceeded its cleanup budget, forcing cleanup");
                kill_stale_log_processes(transport, address, &self.runner.monitor).await;
                Err(HopError::OperationTimeout {
                    address: address.to_string(),
                    seconds: budget.as_secs(),
                })
            }
        };

        self.record(transport.host(), Some(address), key, result.as_ref().err());
        result
    }

    /// [`execute`](Self::execute) rendered for display
    ///
    /// Failures become `"<Category> error: <message>"`.
    pub async fn execute_text(&self, address: &str, key: &str) -> String {
        match self.execute(address, key).await {
            Ok(result) => result.render(),
            Err(e) => e.user_message(),
        }
    }

    /// Runs one non-interactive command on the proxy
    ///
    /// # Errors
    ///
    /// Returns `HopError::Connect` when not connected, or the command's failure.
    pub async fn proxy_exec(&self, command: &str, want_pty: bool) -> HopResult<CommandOutput> {
        let guard = self.session.lock().await;
        let transport = guard
            .as_ref()
            .ok_or_else(|| HopError::connect("proxy", "not connected"))?;
        let result = transport.run_command(command, want_pty).await;
        self.record(transport.host(), None, command, result.as_ref().err());
        result
    }

    fn record(&self, host: &str, device: Option<&str>, command: &str, error: Option<&HopError>) {
        if let Some(oplog) = &self.oplog {
            let record = match error {
                None => OperationRecord::success(host, device, command),
                Some(e) => OperationRecord::failure(host, device, command, e),
            };
            oplog.append(&record);
        }
    }
}

impl OperatorConsole<TransportSession> {
    /// Connects to the proxy and installs the session
    ///
    /// # Errors
    ///
    /// Returns `HopError::Connect` or `HopError::Authentication`.
    pub async fn connect(&self, request: ConnectRequest) -> HopResult<String> {
        let mut credential = ProxyCredential::new(request.key_path);
        if let Some(passphrase) = request.passphrase {
            credential = credential.with_passphrase(passphrase);
        }
        let mut session = TransportSession::new(&request.host, &request.username, credential)
            .with_settings(self.transport);

        match session.connect().await {
            Ok(()) => {
                self.record(&request.host, None, "connect", None);
                Ok(self.attach(session).await)
            }
            Err(e) => {
                self.record(&request.host, None, "connect", Some(&e));
                Err(e)
            }
        }
    }
}
