//! russh-backed proxy session

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle, Handler};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::{PublicKey, load_secret_key};
use russh::{ChannelMsg, Disconnect};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::timeout;
use tracing::Instrument;

use super::{
    CommandOutput, DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, InteractiveChannel,
    ProxyTransport,
};
use crate::error::{HopError, HopResult};
use crate::tracing::span_names;

/// Terminal type requested for pseudo-terminal channels
const PTY_TERM: &str = "xterm";
const PTY_COLUMNS: u32 = 200;
const PTY_ROWS: u32 = 50;

/// Private key used to log in to the proxy
#[derive(Debug, Clone)]
pub struct ProxyCredential {
    /// Path to the private key file (`~` is expanded)
    pub key_path: PathBuf,
    /// Passphrase for an encrypted key
    pub passphrase: Option<SecretString>,
}

impl ProxyCredential {
    /// Creates a credential for an unencrypted key
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            passphrase: None,
        }
    }

    /// Sets the key passphrase
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: SecretString) -> Self {
        self.passphrase = Some(passphrase);
        self
    }

    fn expanded_path(&self) -> PathBuf {
        let raw = self.key_path.to_string_lossy();
        PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
    }
}

/// Timeouts applied by a [`TransportSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    /// SSH port of the proxy
    pub port: u16,
    /// Bound on connect plus key authentication
    pub connect_timeout: Duration,
    /// Bound on a single non-interactive command
    pub command_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            port: 22,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }
}

/// Accepts the proxy host key, mirroring an auto-add policy
struct ProxyHandler {
    host: String,
}

impl Handler for ProxyHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(
            host = %self.host,
            algorithm = %server_public_key.algorithm(),
            "Accepting proxy host key"
        );
        Ok(true)
    }
}

/// Authenticated SSH session to the proxy host
///
/// Created disconnected; [`TransportSession::connect`] establishes the
/// connection and [`ProxyTransport::disconnect`] tears it down. Commands
/// issued while disconnected fail with `HopError::Connect`.
pub struct TransportSession {
    host: String,
    username: String,
    credential: ProxyCredential,
    settings: TransportSettings,
    handle: Option<Handle<ProxyHandler>>,
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("key_path", &self.credential.key_path)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl TransportSession {
    /// Creates a disconnected session
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        credential: ProxyCredential,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            credential,
            settings: TransportSettings::default(),
            handle: None,
        }
    }

    /// Replaces the timeouts and port
    #[must_use]
    pub const fn with_settings(mut self, settings: TransportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Proxy user name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Connects and authenticates with the private key
    ///
    /// Reconnecting an already connected session first closes the old one.
    ///
    /// # Errors
    ///
    /// Returns `HopError::Connect` if the proxy cannot be reached in time and
    /// `HopError::Authentication` if the key cannot be loaded or is rejected.
    pub async fn connect(&mut self) -> HopResult<()> {
        let span = tracing::info_span!(span_names::PROXY_CONNECT, host = %self.host);
        self.connect_inner().instrument(span).await
    }

    async fn connect_inner(&mut self) -> HopResult<()> {
        if self.handle.is_some() {
            self.disconnect().await;
        }

        let limit = self.settings.connect_timeout;
        let handle = timeout(limit, self.establish())
            .await
            .map_err(|_| {
                tracing::error!(host = %self.host, seconds = limit.as_secs(), "Proxy connection timeout");
                HopError::connect(
                    &self.host,
                    format!("connection timeout after {}s", limit.as_secs()),
                )
            })??;

        self.handle = Some(handle);
        tracing::info!(host = %self.host, "Successfully connected to proxy");
        Ok(())
    }

    async fn establish(&self) -> HopResult<Handle<ProxyHandler>> {
        let config = Arc::new(Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(15)),
            keepalive_max: 3,
            ..Default::default()
        });
        let handler = ProxyHandler {
            host: self.host.clone(),
        };
        let addr = (self.host.as_str(), self.settings.port);

        let mut handle = client::connect(config, addr, handler)
            .await
            .map_err(|e| {
                tracing::error!(host = %self.host, error = %e, "Proxy connection failed");
                HopError::connect(&self.host, e.to_string())
            })?;

        self.authenticate(&mut handle).await?;
        Ok(handle)
    }

    async fn authenticate(&self, handle: &mut Handle<ProxyHandler>) -> HopResult<()> {
        let key_path = self.credential.expanded_path();
        let key = load_key(&key_path, self.credential.passphrase.as_ref())
            .map_err(|reason| self.auth_error(reason))?;

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let key = PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg);

        let result = handle
            .authenticate_publickey(&self.username, key)
            .await
            .map_err(|e| self.auth_error(e.to_string()))?;

        if result.success() {
            Ok(())
        } else {
            tracing::error!(host = %self.host, "Proxy rejected the private key");
            Err(self.auth_error("key rejected by server"))
        }
    }

    fn auth_error(&self, reason: impl Into<String>) -> HopError {
        HopError::Authentication {
            user: self.username.clone(),
            host: self.host.clone(),
            reason: reason.into(),
        }
    }

    fn connected_handle(&self) -> HopResult<&Handle<ProxyHandler>> {
        match &self.handle {
            Some(handle) if !handle.is_closed() => Ok(handle),
            _ => Err(HopError::not_connected(&self.host)),
        }
    }

    async fn open_session(&self, want_pty: bool) -> HopResult<russh::Channel<client::Msg>> {
        let handle = self.connected_handle()?;
        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| HopError::connect(&self.host, format!("failed to open channel: {e}")))?;
        if want_pty {
            channel
                .request_pty(false, PTY_TERM, PTY_COLUMNS, PTY_ROWS, 0, 0, &[])
                .await
                .map_err(|e| HopError::Channel(format!("pty request failed: {e}")))?;
        }
        Ok(channel)
    }

    async fn exec_to_completion(&self, command: &str, want_pty: bool) -> HopResult<CommandOutput> {
        bounded(self.settings.command_timeout, command, self.exec_and_collect(command, want_pty))
            .await
    }

    async fn exec_and_collect(&self, command: &str, want_pty: bool) -> HopResult<CommandOutput> {
        let mut channel = self.open_session(want_pty).await?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| HopError::Channel(format!("failed to execute command: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        // ExitStatus may arrive before or after Eof, so read until None.
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                _ => {}
            }
        }
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }
}

/// Bounds channel open, exec and read of one command by `limit`
///
/// The channel is dropped with the future when the limit is hit.
async fn bounded<F>(limit: Duration, command: &str, work: F) -> HopResult<CommandOutput>
where
    F: Future<Output = HopResult<CommandOutput>>,
{
    timeout(limit, work).await.unwrap_or_else(|_| {
        tracing::error!(command, seconds = limit.as_secs(), "Proxy command timed out");
        Err(HopError::CommandTimeout {
            command: command.to_string(),
            seconds: limit.as_secs(),
        })
    })
}

fn load_key(
    path: &Path,
    passphrase: Option<&SecretString>,
) -> Result<russh::keys::PrivateKey, String> {
    load_secret_key(path, passphrase.map(|p| p.expose_secret()))
        .map_err(|e| format!("cannot load key {}: {e}", path.display()))
}

#[async_trait]
impl ProxyTransport for TransportSession {
    fn host(&self) -> &str {
        &self.host
    }

    fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_closed())
    }

    async fn run_command(&self, command: &str, want_pty: bool) -> HopResult<CommandOutput> {
        let span = tracing::debug_span!(span_names::PROXY_EXEC, host = %self.host, pty = want_pty);
        self.exec_to_completion(command, want_pty)
            .instrument(span)
            .await
    }

    async fn open_interactive_channel(&self) -> HopResult<Box<dyn InteractiveChannel>> {
        let channel = self.open_session(true).await?;
        channel
            .request_shell(true)
            .await
            .map_err(|e| HopError::Channel(format!("shell request failed: {e}")))?;
        Ok(Box::new(SshChannel::new(channel)))
    }

    async fn open_command_channel(&self, command: &str) -> HopResult<Box<dyn InteractiveChannel>> {
        let channel = self.open_session(true).await?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| HopError::Channel(format!("failed to execute command: {e}")))?;
        Ok(Box::new(SshChannel::new(channel)))
    }

    async fn disconnect(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let host = self.host.clone();
        let span = tracing::info_span!(span_names::PROXY_DISCONNECT, host = %host);

        async move {
            match timeout(
                Duration::from_secs(5),
                handle.disconnect(Disconnect::ByApplication, "", "en"),
            )
            .await
            {
                Ok(Ok(())) => tracing::info!(host = %host, "Disconnected from proxy"),
                Ok(Err(e)) => tracing::warn!(host = %host, error = %e, "Error while disconnecting"),
                Err(_) => {
                    tracing::warn!(host = %host, "Timeout closing proxy connection, forcing drop");
                }
            }
        }
        .instrument(span)
        .await;
    }
}

/// [`InteractiveChannel`] over a russh session channel
struct SshChannel {
    channel: russh::Channel<client::Msg>,
    open: bool,
}

impl SshChannel {
    const fn new(channel: russh::Channel<client::Msg>) -> Self {
        Self {
            channel,
            open: true,
        }
    }
}

#[async_trait]
impl InteractiveChannel for SshChannel {
    async fn write(&mut self, data: &[u8]) -> HopResult<()> {
        if !self.open {
            return Err(HopError::Channel("channel is closed".into()));
        }
        self.channel
            .data(data)
            .await
            .map_err(|e| HopError::Channel(format!("write failed: {e}")))
    }

    async fn poll_output(&mut self, wait: Duration) -> HopResult<Option<Vec<u8>>> {
        if !self.open {
            return Ok(None);
        }
        match timeout(wait, self.channel.wait()).await {
            Err(_) => Ok(None),
            Ok(None | Some(ChannelMsg::Eof | ChannelMsg::Close)) => {
                self.open = false;
                Ok(None)
            }
            Ok(Some(ChannelMsg::Data { data } | ChannelMsg::ExtendedData { data, .. })) => {
                Ok(Some(data.to_vec()))
            }
            Ok(Some(_)) => Ok(None),
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> HopResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let _ = self.channel.eof().await;
        self.channel
            .close()
            .await
            .map_err(|e| HopError::Channel(format!("close failed: {e}")))
    }
}
