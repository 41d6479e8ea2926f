//! In-memory transport for exercising the engine without a network.
//!
//! [`ScriptedTransport`] implements [`ProxyTransport`] and hands out
//! [`ScriptedChannel`]s whose output is driven by a [`ChannelScript`]:
//! chunks queued up front, chunks emitted when a write contains a trigger,
//! endless streams, and remote-side closes. Everything the engine does
//! (commands, channel opens, writes, closes) is recorded in a shared
//! [`Journal`] so tests can assert on ordering.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{HopError, HopResult};
use crate::transport::{CommandOutput, InteractiveChannel, ProxyTransport};

/// Name given to channels opened with `open_interactive_channel`
pub const SHELL_CHANNEL: &str = "shell";

/// One recorded transport interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Non-interactive command run on the proxy
    Command {
        /// Command text
        command: String,
        /// Whether a pty was requested
        pty: bool,
    },
    /// Channel opened; `name` is the command or [`SHELL_CHANNEL`]
    ChannelOpened {
        /// Channel name
        name: String,
    },
    /// Bytes written to a channel
    Write {
        /// Channel name
        channel: String,
        /// Lossily decoded data
        data: String,
    },
    /// Channel closed by the local side
    ChannelClosed {
        /// Channel name
        channel: String,
    },
    /// Transport disconnected
    Disconnected,
}

/// Shared, ordered record of transport events
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<TransportEvent>>>,
}

impl Journal {
    /// Creates an empty journal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TransportEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an event
    pub fn record(&self, event: TransportEvent) {
        self.lock().push(event);
    }

    /// Snapshot of all events in order
    #[must_use]
    pub fn events(&self) -> Vec<TransportEvent> {
        self.lock().clone()
    }

    /// Data written to the channel called `channel`, one entry per write
    #[must_use]
    pub fn writes(&self, channel: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                TransportEvent::Write { channel: c, data } if c == channel => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of local closes of the channel called `channel`
    #[must_use]
    pub fn closes(&self, channel: &str) -> usize {
        self.lock()
            .iter()
            .filter(|event| matches!(event, TransportEvent::ChannelClosed { channel: c } if c == channel))
            .count()
    }

    /// Non-interactive commands run, in order
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                TransportEvent::Command { command, .. } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    /// Names of opened channels, in order
    #[must_use]
    pub fn opened_channels(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                TransportEvent::ChannelOpened { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Index of the first event matching `predicate`
    pub fn position(&self, predicate: impl Fn(&TransportEvent) -> bool) -> Option<usize> {
        self.lock().iter().position(predicate)
    }
}

#[derive(Debug, Clone)]
enum Reaction {
    Emit(Vec<Vec<u8>>),
    Stream(Vec<u8>),
    Close,
    Fail,
    Stall,
}

#[derive(Debug, Clone)]
struct Trigger {
    pattern: String,
    reaction: Reaction,
}

/// Describes how a scripted channel responds
#[derive(Debug, Clone, Default)]
pub struct ChannelScript {
    greeting: Vec<Vec<u8>>,
    triggers: Vec<Trigger>,
    echo: bool,
}

impl ChannelScript {
    /// A silent channel
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues chunks available as soon as the channel opens
    #[must_use]
    pub fn greeting<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.greeting
            .extend(chunks.into_iter().map(|c| c.as_ref().as_bytes().to_vec()));
        self
    }

    /// Emits `chunks` every time a write contains `trigger`
    #[must_use]
    pub fn on<I, S>(mut self, trigger: &str, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.triggers.push(Trigger {
            pattern: trigger.to_string(),
            reaction: Reaction::Emit(
                chunks
                    .into_iter()
                    .map(|c| c.as_ref().as_bytes().to_vec())
                    .collect(),
            ),
        });
        self
    }

    /// Emits `line` on every poll once a write contains `trigger`
    #[must_use]
    pub fn streaming(mut self, trigger: &str, line: &str) -> Self {
        self.triggers.push(Trigger {
            pattern: trigger.to_string(),
            reaction: Reaction::Stream(line.as_bytes().to_vec()),
        });
        self
    }

    /// Closes the remote side once a write contains `trigger`
    #[must_use]
    pub fn closes_on(mut self, trigger: &str) -> Self {
        self.triggers.push(Trigger {
            pattern: trigger.to_string(),
            reaction: Reaction::Close,
        });
        self
    }

    /// Fails any write containing `trigger`
    #[must_use]
    pub fn fails_on(mut self, trigger: &str) -> Self {
        self.triggers.push(Trigger {
            pattern: trigger.to_string(),
            reaction: Reaction::Fail,
        });
        self
    }

    /// Records any write containing `trigger`, then never completes it
    #[must_use]
    pub fn stalls_on(mut self, trigger: &str) -> Self {
        self.triggers.push(Trigger {
            pattern: trigger.to_string(),
            reaction: Reaction::Stall,
        });
        self
    }

    /// Echoes every write back, like a terminal in cooked mode
    #[must_use]
    pub const fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }
}

/// A channel driven by a [`ChannelScript`]
#[derive(Debug)]
pub struct ScriptedChannel {
    name: String,
    script: ChannelScript,
    queue: VecDeque<Vec<u8>>,
    stream: Option<Vec<u8>>,
    remote_closed: bool,
    open: bool,
    journal: Journal,
}

impl ScriptedChannel {
    /// Creates a channel with its own journal
    #[must_use]
    pub fn new(name: &str, script: ChannelScript) -> (Self, Journal) {
        let journal = Journal::new();
        (Self::with_journal(name, script, journal.clone()), journal)
    }

    /// Creates a channel recording into `journal`
    #[must_use]
    pub fn with_journal(name: &str, script: ChannelScript, journal: Journal) -> Self {
        let queue = script.greeting.iter().cloned().collect();
        Self {
            name: name.to_string(),
            script,
            queue,
            stream: None,
            remote_closed: false,
            open: true,
            journal,
        }
    }
}

#[async_trait]
impl InteractiveChannel for ScriptedChannel {
    async fn write(&mut self, data: &[u8]) -> HopResult<()> {
        if !self.open || self.remote_closed {
            return Err(HopError::Channel(format!("{} is closed", self.name)));
        }
        let text = String::from_utf8_lossy(data).into_owned();

        let mut stall = false;
        for trigger in &self.script.triggers {
            if !text.contains(&trigger.pattern) {
                continue;
            }
            match &trigger.reaction {
                Reaction::Fail => {
                    return Err(HopError::Channel(format!(
                        "write to {} rejected",
                        self.name
                    )));
                }
                Reaction::Stall => stall = true,
                Reaction::Emit(_) | Reaction::Stream(_) | Reaction::Close => {}
            }
        }

        self.journal.record(TransportEvent::Write {
            channel: self.name.clone(),
            data: text.clone(),
        });
        if stall {
            return std::future::pending().await;
        }
        if self.script.echo {
            self.queue.push_back(data.to_vec());
        }
        for trigger in &self.script.triggers {
            if !text.contains(&trigger.pattern) {
                continue;
            }
            match &trigger.reaction {
                Reaction::Emit(chunks) => self.queue.extend(chunks.iter().cloned()),
                Reaction::Stream(line) => self.stream = Some(line.clone()),
                Reaction::Close => self.remote_closed = true,
                Reaction::Fail | Reaction::Stall => {}
            }
        }
        Ok(())
    }

    async fn poll_output(&mut self, wait: Duration) -> HopResult<Option<Vec<u8>>> {
        if let Some(chunk) = self.queue.pop_front() {
            return Ok(Some(chunk));
        }
        if self.remote_closed || !self.open {
            return Ok(None);
        }
        tokio::time::sleep(wait).await;
        Ok(self.stream.clone())
    }

    fn is_open(&self) -> bool {
        self.open && !(self.remote_closed && self.queue.is_empty())
    }

    async fn close(&mut self) -> HopResult<()> {
        if self.open {
            self.open = false;
            self.journal.record(TransportEvent::ChannelClosed {
                channel: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// A [`ProxyTransport`] whose channels and commands follow scripts
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    host: String,
    connected: bool,
    journal: Journal,
    shell_script: ChannelScript,
    command_scripts: Vec<(String, ChannelScript)>,
    command_outputs: Vec<(String, CommandOutput)>,
    fail_command_channels: bool,
    fail_commands: bool,
}

impl ScriptedTransport {
    /// A connected transport whose channels are silent
    #[must_use]
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            connected: true,
            journal: Journal::new(),
            shell_script: ChannelScript::new(),
            command_scripts: Vec::new(),
            command_outputs: Vec::new(),
            fail_command_channels: false,
            fail_commands: false,
        }
    }

    /// Script used for every interactive shell channel
    #[must_use]
    pub fn with_shell(mut self, script: ChannelScript) -> Self {
        self.shell_script = script;
        self
    }

    /// Script used for command channels whose command contains `pattern`
    #[must_use]
    pub fn with_command_channel(mut self, pattern: &str, script: ChannelScript) -> Self {
        self.command_scripts.push((pattern.to_string(), script));
        self
    }

    /// Output returned by `run_command` for commands containing `pattern`
    #[must_use]
    pub fn with_command_output(mut self, pattern: &str, output: CommandOutput) -> Self {
        self.command_outputs.push((pattern.to_string(), output));
        self
    }

    /// Makes `open_command_channel` fail
    #[must_use]
    pub const fn failing_command_channels(mut self) -> Self {
        self.fail_command_channels = true;
        self
    }

    /// Makes `run_command` fail (the command is still recorded)
    #[must_use]
    pub const fn failing_commands(mut self) -> Self {
        self.fail_commands = true;
        self
    }

    /// Starts out disconnected
    #[must_use]
    pub const fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    /// The shared event journal
    #[must_use]
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn ensure_connected(&self) -> HopResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(HopError::not_connected(&self.host))
        }
    }
}

#[async_trait]
impl ProxyTransport for ScriptedTransport {
    fn host(&self) -> &str {
        &self.host
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn run_command(&self, command: &str, want_pty: bool) -> HopResult<CommandOutput> {
        self.ensure_connected()?;
        self.journal.record(TransportEvent::Command {
            command: command.to_string(),
            pty: want_pty,
        });
        if self.fail_commands {
            return Err(HopError::Channel(format!("exec of '{command}' failed")));
        }
        Ok(self
            .command_outputs
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput {
                exit_status: Some(0),
                ..CommandOutput::default()
            }))
    }

    async fn open_interactive_channel(&self) -> HopResult<Box<dyn InteractiveChannel>> {
        self.ensure_connected()?;
        self.journal.record(TransportEvent::ChannelOpened {
            name: SHELL_CHANNEL.to_string(),
        });
        Ok(Box::new(ScriptedChannel::with_journal(
            SHELL_CHANNEL,
            self.shell_script.clone(),
            self.journal.clone(),
        )))
    }

    async fn open_command_channel(&self, command: &str) -> HopResult<Box<dyn InteractiveChannel>> {
        self.ensure_connected()?;
        if self.fail_command_channels {
            return Err(HopError::Channel(format!("exec of '{command}' refused")));
        }
        self.journal.record(TransportEvent::ChannelOpened {
            name: command.to_string(),
        });
        let script = self
            .command_scripts
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, script)| script.clone())
            .unwrap_or_default();
        Ok(Box::new(ScriptedChannel::with_journal(
            command,
            script,
            self.journal.clone(),
        )))
    }

    async fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.journal.record(TransportEvent::Disconnected);
        }
    }
}
