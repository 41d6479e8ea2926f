//! Property-based tests for command catalog selection and rendering

use proptest::prelude::*;
use stbhop_core::{CatalogEntry, CommandCatalog, render_template};

// ========== Strategies ==========

fn arb_address() -> impl Strategy<Value = String> {
    (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
        .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}"))
}

/// Command templates, some with the address placeholder
fn arb_template() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{2,8}( -[a-z])?".prop_map(|s| s),
        "[a-z]{2,8}".prop_map(|s| format!("{s} {{ip}}")),
        "[a-z]{2,8}".prop_map(|s| format!("{s} --target={{ip}} --again {{ip}}")),
    ]
}

fn arb_templates() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_template(), 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn rendering_replaces_every_placeholder(templates in arb_templates(), address in arb_address()) {
        let refs: Vec<&str> = templates.iter().map(String::as_str).collect();
        let mut catalog = CommandCatalog::empty();
        catalog.insert("custom", CatalogEntry::sequence("Custom", "", &refs));

        let spec = catalog.select("custom").unwrap();
        let rendered = spec.render(&address, "root");

        prop_assert_eq!(rendered.len(), templates.len());
        for (template, command) in templates.iter().zip(&rendered) {
            prop_assert!(!command.contains("{ip}"), "placeholder left in {:?}", command);
            prop_assert!(command.matches(address.as_str()).count() >= template.matches("{ip}").count(), "address missing in {:?}", command);
        }
    }

    #[test]
    fn single_entries_render_one_command(template in arb_template(), address in arb_address()) {
        let mut catalog = CommandCatalog::empty();
        catalog.insert("one", CatalogEntry::single("One", "", &template));
        let spec = catalog.select("one").unwrap();
        prop_assert_eq!(spec.render(&address, "root"), vec![template.replace("{ip}", &address)]);
    }

    #[test]
    fn hop_template_contains_user_and_address(user in "[a-z]{1,8}", address in arb_address()) {
        let hop = render_template("ssh -o StrictHostKeyChecking=no {user}@{ip}", &address, &user);
        let expected_target = format!("{user}@{address}");
        prop_assert!(hop.ends_with(&expected_target));
    }

    #[test]
    fn unknown_keys_are_rejected(key in "[a-z]{3,12}") {
        let catalog = CommandCatalog::default();
        prop_assume!(!["ping", "multicast", "reboot", "standby"].contains(&key.as_str()));
        prop_assert!(catalog.select(&key).is_err());
    }
}
