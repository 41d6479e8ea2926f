//! Proxy-side log capture
//!
//! [`LogMonitor::start`] launches the logging utility for one device on its
//! own channel and hands the channel to a background task, which keeps
//! reading while the run executes commands on a sibling channel. The
//! returned [`LogMonitorHandle`] stops the task and yields the captured text.
//!
//! Log capture is diagnostic: [`LogMonitorHandle::stop`] never fails, it
//! returns whatever was collected and logs the rest.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

use crate::error::{HopError, HopResult};
use crate::shell::{DEFAULT_POLL_INTERVAL_MS, EXIT_DIRECTIVE, LINE_TERMINATOR};
use crate::tracing::span_names;
use crate::transport::{InteractiveChannel, ProxyTransport};

/// Default log utility invocation; `{ip}` is the device address
pub const DEFAULT_LOG_COMMAND: &str = "logclient {ip}";

/// Default pause after each stop directive (milliseconds)
pub const DEFAULT_INTERRUPT_GRACE_MS: u64 = 1000;

/// Default window for collecting trailing output (seconds)
pub const DEFAULT_COLLECTION_WINDOW_SECS: u64 = 5;

/// Interrupt byte (Ctrl-C)
pub const INTERRUPT: &[u8] = b"\x03";

/// Log monitor parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Log utility template, `{ip}` replaced by the device address
    pub log_command: String,
    /// Pause after the interrupt and after the exit directive
    pub interrupt_grace: Duration,
    /// Upper bound on collecting trailing output
    pub collection_window: Duration,
    /// Interval between reads
    pub poll_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            log_command: DEFAULT_LOG_COMMAND.to_string(),
            interrupt_grace: Duration::from_millis(DEFAULT_INTERRUPT_GRACE_MS),
            collection_window: Duration::from_secs(DEFAULT_COLLECTION_WINDOW_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl MonitorSettings {
    /// Log utility command line for `address`
    #[must_use]
    pub fn command_for(&self, address: &str) -> String {
        self.log_command.replace("{ip}", address)
    }
}

#[derive(Debug)]
enum MonitorControl {
    Stop,
}

/// Starts log capture for a device
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMonitor;

impl LogMonitor {
    /// Launches the log utility for `address` and returns immediately
    ///
    /// # Errors
    ///
    /// Returns `HopError::LogMonitorStart` if the channel cannot be opened.
    pub async fn start<T>(
        transport: &T,
        address: &str,
        settings: &MonitorSettings,
    ) -> HopResult<LogMonitorHandle>
    where
        T: ProxyTransport + ?Sized,
    {
        let command = settings.command_for(address);
        let span = tracing::info_span!(span_names::MONITOR_START, device = %address);

        let channel = transport
            .open_command_channel(&command)
            .instrument(span)
            .await
            .map_err(|e| {
                tracing::error!(device = %address, error = %e, "Failed to start log monitor");
                HopError::LogMonitorStart {
                    address: address.to_string(),
                    reason: e.to_string(),
                }
            })?;

        tracing::info!(device = %address, command = %command, "Log monitor started");

        let (control, receiver) = mpsc::channel(1);
        let task_span = tracing::debug_span!(span_names::MONITOR_CAPTURE, device = %address);
        let task = tokio::spawn(capture(channel, receiver, settings.clone()).instrument(task_span));

        Ok(LogMonitorHandle {
            address: address.to_string(),
            running: true,
            control: Some(control),
            task: Some(task),
        })
    }
}

/// A running log capture
///
/// Dropping the handle without calling [`stop`](Self::stop) makes the
/// capture task run the stop sequence by itself; its output is discarded.
#[derive(Debug)]
pub struct LogMonitorHandle {
    address: String,
    running: bool,
    control: Option<mpsc::Sender<MonitorControl>>,
    task: Option<JoinHandle<String>>,
}

impl LogMonitorHandle {
    /// Device address the capture is scoped to
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns true until [`stop`](Self::stop) has been called
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Interrupts the utility, collects trailing output and closes the channel
    ///
    /// Returns the text captured over the whole run. Calling it again
    /// returns an empty string.
    pub async fn stop(&mut self) -> String {
        if !self.running {
            return String::new();
        }
        self.running = false;

        if let Some(control) = self.control.take() {
            // A closed receiver means the task already finished
            let _ = control.send(MonitorControl::Stop).await;
        }

        let Some(task) = self.task.take() else {
            return String::new();
        };
        let span = tracing::info_span!(span_names::MONITOR_STOP, device = %self.address);
        match task.instrument(span).await {
            Ok(output) => {
                tracing::info!(device = %self.address, bytes = output.len(), "Log monitor stopped");
                output
            }
            Err(e) => {
                tracing::warn!(device = %self.address, error = %e, "Log monitor task failed");
                String::new()
            }
        }
    }
}

async fn capture(
    mut channel: Box<dyn InteractiveChannel>,
    mut control: mpsc::Receiver<MonitorControl>,
    settings: MonitorSettings,
) -> String {
    let mut collected = Vec::new();

    loop {
        match control.try_recv() {
            Ok(MonitorControl::Stop) => break,
            Err(TryRecvError::Disconnected) => {
                tracing::debug!("Log monitor handle dropped, stopping capture");
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        match channel.poll_output(settings.poll_interval).await {
            Ok(Some(chunk)) => collected.extend_from_slice(&chunk),
            Ok(None) if !channel.is_open() => {
                tracing::debug!("Log utility exited before stop");
                let _ = control.recv().await;
                break;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Log channel read failed");
                let _ = control.recv().await;
                break;
            }
        }
    }

    finish(channel.as_mut(), &mut collected, &settings).await;
    String::from_utf8_lossy(&collected).into_owned()
}

/// Interrupt, exit, collect, close; every failure is logged and skipped
async fn finish(
    channel: &mut dyn InteractiveChannel,
    collected: &mut Vec<u8>,
    settings: &MonitorSettings,
) {
    if channel.is_open() {
        if let Err(e) = channel.write(INTERRUPT).await {
            tracing::warn!(error = %e, "Failed to interrupt log utility");
        }
        tokio::time::sleep(settings.interrupt_grace).await;

        let exit = format!("{EXIT_DIRECTIVE}{LINE_TERMINATOR}");
        if let Err(e) = channel.write(exit.as_bytes()).await {
            tracing::warn!(error = %e, "Failed to send exit to log channel");
        }
        tokio::time::sleep(settings.interrupt_grace).await;
    }

    let started = Instant::now();
    while started.elapsed() < settings.collection_window {
        match channel.poll_output(settings.poll_interval).await {
            Ok(Some(chunk)) => collected.extend_from_slice(&chunk),
            Ok(None) if !channel.is_open() => break,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Failed to collect log output");
                break;
            }
        }
    }

    if let Err(e) = channel.close().await {
        tracing::warn!(error = %e, "Failed to close log channel");
    }
}
