//! Property-based tests for the device login prompt handler

use std::time::Duration;

use proptest::prelude::*;
use secrecy::SecretString;
use stbhop_core::{AuthPromptHandler, AuthState, PromptMatcher, PromptResponse};

const HOST_KEY_TRANSCRIPT: &str =
    "The authenticity of host '10.0.0.5' can't be established.\r\nAre you sure you want to continue connecting (yes/no)? ";
const PASSWORD_TRANSCRIPT: &str = "root@10.0.0.5's password: ";

// ========== Strategies ==========

/// Cut points splitting a byte string into 1..=8 chunks
fn arb_cuts(len: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::btree_set(1..len, 0..8).prop_map(|set| set.into_iter().collect())
}

/// Noise that never contains a prompt
fn arb_noise() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,\r\n-]{0,40}".prop_filter("no prompt text", |s| {
        !s.to_lowercase().contains("password:") && !s.contains("yes/no")
    })
}

fn split_at_cuts(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        chunks.push(bytes[start..cut].to_vec());
        start = cut;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

fn handler() -> AuthPromptHandler {
    AuthPromptHandler::new(
        PromptMatcher::standard().unwrap(),
        SecretString::from("kreatv"),
        Duration::from_secs(10),
    )
}

fn feed_all(handler: &mut AuthPromptHandler, chunks: &[Vec<u8>]) -> Vec<PromptResponse> {
    chunks.iter().flat_map(|c| handler.feed(c)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn host_key_then_password_in_any_chunking(
        noise in arb_noise(),
        first_cuts in arb_cuts(HOST_KEY_TRANSCRIPT.len()),
        second_cuts in arb_cuts(PASSWORD_TRANSCRIPT.len()),
    ) {
        let mut h = handler();
        let mut first = noise.into_bytes();
        let offset = first.len();
        first.extend_from_slice(HOST_KEY_TRANSCRIPT.as_bytes());
        let cuts: Vec<usize> = first_cuts.iter().map(|c| c + offset).collect();

        let before = feed_all(&mut h, &split_at_cuts(&first, &cuts));
        prop_assert_eq!(before, vec![PromptResponse::ConfirmHostKey]);
        prop_assert_eq!(h.state(), AuthState::AwaitingPassword);

        let after = feed_all(&mut h, &split_at_cuts(PASSWORD_TRANSCRIPT.as_bytes(), &second_cuts));
        prop_assert_eq!(after, vec![PromptResponse::Password]);
        prop_assert_eq!(h.state(), AuthState::Authenticated);
    }

    #[test]
    fn password_only_in_any_chunking(
        noise in arb_noise(),
        cuts in arb_cuts(PASSWORD_TRANSCRIPT.len()),
    ) {
        let mut h = handler();
        prop_assert!(h.feed(noise.as_bytes()).is_empty());
        let responses = feed_all(&mut h, &split_at_cuts(PASSWORD_TRANSCRIPT.as_bytes(), &cuts));
        prop_assert_eq!(responses, vec![PromptResponse::Password]);
    }

    #[test]
    fn password_prompt_case_does_not_matter(upper in prop::collection::vec(any::<bool>(), 8)) {
        let prompt: String = "password"
            .chars()
            .zip(&upper)
            .map(|(c, &u)| if u { c.to_ascii_uppercase() } else { c })
            .collect();
        let mut h = handler();
        prop_assert_eq!(h.feed(format!("{prompt}: ").as_bytes()), vec![PromptResponse::Password]);
    }

    #[test]
    fn noise_alone_never_answers(chunks in prop::collection::vec(arb_noise(), 0..10)) {
        let mut h = handler();
        for chunk in &chunks {
            prop_assert!(h.feed(chunk.as_bytes()).is_empty());
        }
        prop_assert_eq!(h.state(), AuthState::AwaitingHostKey);
    }
}
