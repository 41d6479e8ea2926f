//! Property-based tests for command sequence runs

use proptest::prelude::*;
use stbhop_core::testing::{ChannelScript, ScriptedTransport};
use stbhop_core::{AppSettings, CommandSequenceRunner, CommandSpec, RunState};

const DEVICE: &str = "10.20.30.40";
const LOG_CHANNEL: &str = "logclient 10.20.30.40";

fn device_shell(answered: &[String]) -> ChannelScript {
    let mut script = ChannelScript::new()
        .on(&format!("root@{DEVICE}"), ["root@10.20.30.40's password: "])
        .on("kreatv", ["# "]);
    for command in answered {
        script = script.on(command, [format!("{command}: done\r\n# ")]);
    }
    script
}

fn log_channel() -> ChannelScript {
    ChannelScript::new()
        .greeting(["boot complete\n"])
        .closes_on("exit")
}

/// Command names; only the first five get an answer from the device
fn arb_sequence() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(0usize..8, 1..6)
        .prop_map(|picks| picks.into_iter().map(|n| format!("probe-{n}")).collect())
}

fn run_paused<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn one_output_per_command_and_one_log_stop(sequence in arb_sequence()) {
        let answered: Vec<String> = (0..5).map(|n| format!("probe-{n}")).collect();
        let transport = ScriptedTransport::new("bastion.lab")
            .with_shell(device_shell(&answered))
            .with_command_channel("logclient", log_channel());
        let journal = transport.journal();
        let settings = AppSettings::default().runner_settings().unwrap();
        let spec = CommandSpec::new("probe", "Probe sequence", sequence.clone());

        let (result, state) = run_paused(async {
            let mut runner = CommandSequenceRunner::new(&transport, &settings);
            let result = runner.run(DEVICE, &spec).await;
            (result, runner.state())
        });

        let result = result.unwrap();
        prop_assert_eq!(result.command_outputs.len(), sequence.len());
        for (command, output) in sequence.iter().zip(&result.command_outputs) {
            if answered.contains(command) {
                prop_assert!(output.contains(&format!("{command}: done")), "missing done marker in {:?}", output);
            }
        }
        prop_assert!(result.log_output.contains("boot complete"));
        prop_assert_eq!(journal.closes(LOG_CHANNEL), 1);
        prop_assert_eq!(state, RunState::Done);
    }

    #[test]
    fn rendered_result_ends_with_log_section(
        outputs in prop::collection::vec("[a-z ]{0,12}", 0..5),
        log in "[a-z\n]{0,20}",
    ) {
        let result = stbhop_core::ExecutionResult {
            command_outputs: outputs.clone(),
            log_output: log.clone(),
        };
        let rendered = result.render();
        let expected_suffix = format!("--- log monitor output ---\n{log}");
        prop_assert!(rendered.ends_with(&expected_suffix));
        prop_assert!(rendered.starts_with(&outputs.join("\n")));
    }
}
