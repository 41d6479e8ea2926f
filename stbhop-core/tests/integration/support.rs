//! Shared fixtures: a proxy with one scripted device at 10.0.0.5

use stbhop_core::testing::{ChannelScript, ScriptedTransport, TransportEvent};

pub const DEVICE: &str = "10.0.0.5";
pub const LOG_CHANNEL: &str = "logclient 10.0.0.5";
pub const HOP_COMMAND: &str = "ssh -o StrictHostKeyChecking=no root@10.0.0.5";

/// Device shell that asks for the host key, then the password
pub fn device_shell() -> ChannelScript {
    ChannelScript::new()
        .greeting(["Last login: Mon Oct 12 08:00:01 from 10.1.1.1\r\n", "operator@bastion:~$ "])
        .on(HOP_COMMAND, [
            "The authenticity of host '10.0.0.5' can't be established.\r\n",
            "Are you sure you want to continue connecting (yes/",
            "no)? ",
        ])
        .on("yes", ["Warning: Permanently added '10.0.0.5'.\r\n", "root@10.0.0.5's password: "])
        .on("kreatv", ["\r\n\r\nBusyBox v1.31.1 built-in shell (ash)\r\n", "# "])
        .on("ping -c 4 10.0.0.5", [
            "PING 10.0.0.5 (10.0.0.5): 56 data bytes\r\n",
            "64 bytes from 10.0.0.5: seq=0 ttl=64 time=0.1 ms\r\n",
            "4 packets transmitted, 4 packets received, 0% packet loss\r\n# ",
        ])
        .on("toish is getobject var.standby.mode", ["var.standby.mode = active\r\n# "])
        .on("toish ps setstandby false", ["OK\r\n# "])
}

/// Device shell that never asks for a password
pub fn silent_device_shell() -> ChannelScript {
    ChannelScript::new()
        .greeting(["operator@bastion:~$ "])
        .on(HOP_COMMAND, ["ssh: connect to host 10.0.0.5 port 22: Connection timed out\r\n"])
}

/// Log utility streaming a couple of lines, ending on Ctrl-C and exit
pub fn log_channel() -> ChannelScript {
    ChannelScript::new()
        .greeting(["[10.0.0.5] INFO appman: started\n", "[10.0.0.5] INFO tuner: locked 634 MHz\n"])
        .on("\u{3}", ["^C\n"])
        .closes_on("exit")
}

pub fn proxy() -> ScriptedTransport {
    ScriptedTransport::new("bastion.lab")
        .with_shell(device_shell())
        .with_command_channel("logclient", log_channel())
}

pub fn is_kill(event: &TransportEvent) -> bool {
    matches!(event, TransportEvent::Command { command, .. } if command.contains("kill -9"))
}

pub fn is_shell_open(event: &TransportEvent) -> bool {
    matches!(event, TransportEvent::ChannelOpened { name } if name == "shell")
}
