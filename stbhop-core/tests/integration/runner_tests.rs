//! End-to-end command sequence runs

use std::time::Duration;

use stbhop_core::testing::{ChannelScript, SHELL_CHANNEL, ScriptedTransport, TransportEvent};
use stbhop_core::{
    AppSettings, CommandCatalog, CommandSequenceRunner, CommandSpec, HopError, RunState,
    RunnerSettings,
};

use super::support::{
    DEVICE, HOP_COMMAND, LOG_CHANNEL, device_shell, is_kill, is_shell_open, log_channel, proxy,
    silent_device_shell,
};

fn settings() -> RunnerSettings {
    AppSettings::default().runner_settings().unwrap()
}

fn spec(key: &str) -> CommandSpec {
    CommandCatalog::default().select(key).unwrap()
}

// ========== Successful runs ==========

#[tokio::test(start_paused = true)]
async fn ping_run_produces_one_output_and_cleans_up() {
    let transport = proxy();
    let journal = transport.journal();
    let settings = settings();

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    let result = runner.run(DEVICE, &spec("ping")).await.unwrap();

    assert_eq!(result.command_outputs.len(), 1);
    assert!(result.command_outputs[0].contains("4 packets received"));
    // Device banner was consumed before the first command
    assert!(!result.command_outputs[0].contains("BusyBox"));
    assert!(result.log_output.contains("tuner: locked"));

    let kills: Vec<String> = journal
        .commands()
        .into_iter()
        .filter(|c| c.contains("kill -9"))
        .collect();
    assert_eq!(kills.len(), 1);
    assert!(kills[0].contains(DEVICE));
    assert_eq!(runner.state(), RunState::Done);
}

#[tokio::test(start_paused = true)]
async fn shell_conversation_follows_login_order() {
    let transport = proxy();
    let journal = transport.journal();
    let settings = settings();

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    runner.run(DEVICE, &spec("ping")).await.unwrap();

    assert_eq!(
        journal.writes(SHELL_CHANNEL),
        vec![
            format!("{HOP_COMMAND}\n"),
            "yes\n".to_string(),
            "kreatv\n".to_string(),
            "ping -c 4 10.0.0.5\n".to_string(),
            "exit\n".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn multi_command_outputs_keep_order() {
    let transport = proxy();
    let settings = settings();

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    let result = runner.run(DEVICE, &spec("standby")).await.unwrap();

    assert_eq!(result.command_outputs.len(), 2);
    assert!(result.command_outputs[0].contains("var.standby.mode = active"));
    assert!(result.command_outputs[1].contains("OK"));
}

#[tokio::test(start_paused = true)]
async fn cleanup_order_is_shell_then_kill_then_log_stop() {
    let transport = proxy();
    let journal = transport.journal();
    let settings = settings();

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    runner.run(DEVICE, &spec("reboot")).await.unwrap();

    let log_open = journal
        .position(|e| matches!(e, TransportEvent::ChannelOpened { name } if name == LOG_CHANNEL))
        .unwrap();
    let shell_open = journal.position(is_shell_open).unwrap();
    let shell_close = journal
        .position(|e| matches!(e, TransportEvent::ChannelClosed { channel } if channel == SHELL_CHANNEL))
        .unwrap();
    let kill = journal.position(is_kill).unwrap();
    let log_close = journal
        .position(|e| matches!(e, TransportEvent::ChannelClosed { channel } if channel == LOG_CHANNEL))
        .unwrap();

    assert!(log_open < shell_open);
    assert!(shell_open < shell_close);
    assert!(shell_close < kill);
    assert!(kill < log_close);
}

#[tokio::test(start_paused = true)]
async fn catalog_commands_receive_the_device_user() {
    let transport = proxy();
    let journal = transport.journal();
    let settings = settings();
    let spec = CommandSpec::new("home", "Home dir", vec!["ls -d ~{user}".to_string()]);

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    runner.run(DEVICE, &spec).await.unwrap();

    assert!(journal.writes(SHELL_CHANNEL).contains(&"ls -d ~root\n".to_string()));
}

#[tokio::test(start_paused = true)]
async fn failed_send_records_empty_output_and_continues() {
    let shell = device_shell().fails_on("toish is getobject");
    let transport = ScriptedTransport::new("bastion.lab")
        .with_shell(shell)
        .with_command_channel("logclient", log_channel());
    let settings = settings();

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    let result = runner.run(DEVICE, &spec("standby")).await.unwrap();

    assert_eq!(result.command_outputs.len(), 2);
    assert!(result.command_outputs[0].is_empty());
    assert!(result.command_outputs[1].contains("OK"));
}

#[tokio::test(start_paused = true)]
async fn failing_kill_is_swallowed() {
    let transport = proxy().failing_commands();
    let settings = settings();

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    let result = runner.run(DEVICE, &spec("ping")).await;

    assert!(result.is_ok());
    assert_eq!(transport.journal().commands().len(), 1);
}

// ========== Failure paths ==========

#[tokio::test(start_paused = true)]
async fn invalid_address_touches_nothing() {
    let transport = proxy();
    let settings = settings();

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    let result = runner.run("999.1.1.1", &spec("ping")).await;

    assert!(matches!(result, Err(HopError::InvalidAddress(a)) if a == "999.1.1.1"));
    assert!(transport.journal().events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_password_prompt_times_out_but_stops_monitor() {
    let transport = ScriptedTransport::new("bastion.lab")
        .with_shell(silent_device_shell())
        .with_command_channel("logclient", log_channel());
    let journal = transport.journal();
    let settings = settings();

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    let result = runner.run(DEVICE, &spec("ping")).await;

    assert!(matches!(
        result,
        Err(HopError::AuthenticationTimeout { seconds: 10, .. })
    ));
    // No command reached the device
    assert!(!journal.writes(SHELL_CHANNEL).iter().any(|w| w.contains("ping")));
    // Log utility interrupted, exited and closed exactly once
    assert_eq!(
        journal.writes(LOG_CHANNEL),
        vec!["\u{3}".to_string(), "exit\n".to_string()]
    );
    assert_eq!(journal.closes(LOG_CHANNEL), 1);
    assert!(journal.position(is_kill).is_some());

    assert!(runner.failed());
    assert_eq!(
        runner.trail(),
        &[
            RunState::Init,
            RunState::Validating,
            RunState::LogStarted,
            RunState::ConnectingTarget,
            RunState::Authenticating,
            RunState::Error,
            RunState::ClosingTarget,
            RunState::Cleanup,
            RunState::LogStopped,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn log_monitor_start_failure_is_fatal() {
    let transport = proxy().failing_command_channels();
    let journal = transport.journal();
    let settings = settings();

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    let result = runner.run(DEVICE, &spec("ping")).await;

    assert!(matches!(result, Err(HopError::LogMonitorStart { .. })));
    assert!(journal.position(is_shell_open).is_none());
}

#[tokio::test(start_paused = true)]
async fn remote_shell_closing_mid_sequence_still_completes() {
    let shell = device_shell()
        .on("reboot", ["The system is going down NOW!\r\n"])
        .closes_on("reboot");
    let transport = ScriptedTransport::new("bastion.lab")
        .with_shell(shell)
        .with_command_channel("logclient", log_channel());
    let settings = settings();
    let spec = CommandSpec::new(
        "reboot-twice",
        "Reboot twice",
        vec!["reboot".to_string(), "reboot".to_string()],
    );

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    let result = runner.run(DEVICE, &spec).await.unwrap();

    assert_eq!(result.command_outputs.len(), 2);
    assert!(result.command_outputs[0].contains("going down"));
    assert!(result.command_outputs[1].is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_device_hits_operation_deadline() {
    let shell = ChannelScript::new()
        .on(HOP_COMMAND, ["password: "])
        .streaming("kreatv", "\u{7}");
    let transport = ScriptedTransport::new("bastion.lab")
        .with_shell(shell)
        .with_command_channel("logclient", log_channel());
    let mut settings = settings();
    settings.operation_deadline = Duration::from_secs(15);

    let mut runner = CommandSequenceRunner::new(&transport, &settings);
    let result = runner.run(DEVICE, &spec("ping")).await;

    assert!(matches!(result, Err(HopError::OperationTimeout { .. })));
    assert_eq!(transport.journal().closes(LOG_CHANNEL), 1);
}
