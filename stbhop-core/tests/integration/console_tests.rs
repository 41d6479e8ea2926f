//! Operator console: rendering, error text, operation log, serialisation

use std::sync::Arc;
use std::time::Duration;

use stbhop_core::testing::{ScriptedTransport, TransportEvent};
use stbhop_core::transport::CommandOutput;
use stbhop_core::{AppSettings, HopError, OperationLog, OperatorConsole, Outcome};
use tempfile::TempDir;

use super::support::{
    DEVICE, LOG_CHANNEL, device_shell, is_kill, is_shell_open, log_channel, proxy,
    silent_device_shell,
};

fn console() -> OperatorConsole<ScriptedTransport> {
    OperatorConsole::new(&AppSettings::default()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn execute_text_renders_outputs_then_log() {
    let console = console();
    console.attach(proxy()).await;

    let text = console.execute_text(DEVICE, "ping").await;

    let (outputs, log) = text
        .split_once("--- log monitor output ---\n")
        .expect("log section present");
    assert!(outputs.contains("4 packets received"));
    assert!(log.contains("appman: started"));
}

#[tokio::test(start_paused = true)]
async fn authentication_timeout_is_reported_with_category() {
    let console = console();
    console
        .attach(
            ScriptedTransport::new("bastion.lab")
                .with_shell(silent_device_shell())
                .with_command_channel("logclient", log_channel()),
        )
        .await;

    let text = console.execute_text(DEVICE, "ping").await;
    assert!(text.starts_with("Authentication error:"), "{text}");
    assert!(text.contains(DEVICE));
}

#[tokio::test(start_paused = true)]
async fn invalid_address_is_a_validation_error() {
    let console = console();
    console.attach(proxy()).await;

    let text = console.execute_text("10.0.0", "ping").await;
    assert_eq!(text, "Validation error: Invalid IP address: 10.0.0");
}

#[tokio::test(start_paused = true)]
async fn operations_are_logged() {
    let dir = TempDir::new().unwrap();
    let oplog = OperationLog::new(dir.path().join("operations.jsonl"));
    let console = console().with_operation_log(oplog.clone());
    console.attach(proxy()).await;

    console.execute(DEVICE, "ping").await.unwrap();
    assert!(console.execute("10.0.0.256", "ping").await.is_err());

    let records = oplog.recent(10).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].host, "bastion.lab");
    assert_eq!(records[0].device.as_deref(), Some(DEVICE));
    assert_eq!(records[0].command, "ping");
    assert_eq!(records[0].outcome, Outcome::Success);
    assert_eq!(records[1].outcome, Outcome::Failure);
    assert!(records[1].error.is_some());
}

#[tokio::test(start_paused = true)]
async fn concurrent_runs_are_serialised() {
    let transport = proxy();
    let journal = transport.journal();
    let console = Arc::new(console());
    console.attach(transport).await;

    let first = tokio::spawn({
        let console = Arc::clone(&console);
        async move { console.execute(DEVICE, "ping").await }
    });
    let second = tokio::spawn({
        let console = Arc::clone(&console);
        async move { console.execute(DEVICE, "standby").await }
    });
    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());

    let events = journal.events();
    let shell_opens: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| is_shell_open(e))
        .map(|(i, _)| i)
        .collect();
    let first_kill = events.iter().position(is_kill).unwrap();
    assert_eq!(shell_opens.len(), 2);
    // The second run only starts after the first one's cleanup
    assert!(shell_opens[1] > first_kill);
}

#[tokio::test]
async fn proxy_exec_returns_captured_output() {
    let transport = ScriptedTransport::new("bastion.lab").with_command_output(
        "uptime",
        CommandOutput {
            stdout: " 08:00:01 up 12 days\n".to_string(),
            stderr: String::new(),
            exit_status: Some(0),
        },
    );
    let journal = transport.journal();
    let console = console();
    console.attach(transport).await;

    let output = console.proxy_exec("uptime", false).await.unwrap();
    assert!(output.stdout.contains("up 12 days"));
    assert_eq!(
        journal.events(),
        vec![TransportEvent::Command {
            command: "uptime".to_string(),
            pty: false
        }]
    );
}

#[tokio::test]
async fn disconnect_then_execute_fails_cleanly() {
    let console = console();
    console.attach(proxy()).await;
    assert_eq!(console.disconnect().await, "Disconnected from bastion.lab");

    let text = console.execute_text(DEVICE, "ping").await;
    assert!(text.starts_with("Connection error:"), "{text}");
}

#[tokio::test(start_paused = true)]
async fn hung_cleanup_is_cut_off_and_killed_on_the_same_session() {
    // Device shell accepts the commands but never finishes the closing `exit`
    let transport = ScriptedTransport::new("bastion.lab")
        .with_shell(device_shell().stalls_on("exit"))
        .with_command_channel("logclient", log_channel());
    let journal = transport.journal();
    let console = console();
    console.attach(transport).await;

    let result = console.execute(DEVICE, "ping").await;
    assert!(matches!(
        result,
        Err(HopError::OperationTimeout { ref address, .. }) if address == DEVICE
    ));

    let stalled_exit = journal
        .position(|e| matches!(e, TransportEvent::Write { channel, data } if channel == "shell" && data == "exit\n"))
        .unwrap();
    let kills: Vec<usize> = journal
        .events()
        .iter()
        .enumerate()
        .filter(|(_, e)| is_kill(e))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(kills.len(), 1);
    assert!(kills[0] > stalled_exit);
    assert!(journal.commands()[0].contains(DEVICE));

    // The abandoned log capture winds itself down
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(
        journal.writes(LOG_CHANNEL),
        vec!["\u{3}".to_string(), "exit\n".to_string()]
    );
    assert_eq!(journal.closes(LOG_CHANNEL), 1);
    assert_eq!(console.status(), "Connected to bastion.lab");
}
