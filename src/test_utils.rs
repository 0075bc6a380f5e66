//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a drive name usable as a bare TOML key
    pub fn drive_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,15}"
    }

    /// Generate a size string in one of the accepted unit spellings
    pub fn size_string() -> impl Strategy<Value = (u64, String)> {
        (
            0u64..4096,
            prop_oneof![
                Just(("", 1u64)),
                Just(("b", 1)),
                Just(("k", 1 << 10)),
                Just(("Ki", 1 << 10)),
                Just(("KiB", 1 << 10)),
                Just(("Mb", 1 << 20)),
                Just(("Mi", 1 << 20)),
                Just(("G", 1 << 30)),
            ],
        )
            .prop_map(|(n, (unit, multiplier))| (n * multiplier, format!("{n}{unit}")))
    }

    /// Generate a kernel boot argument
    pub fn bootarg() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("no4lvl".to_string()),
            Just("quiet".to_string()),
            Just("rootfstype=ext2".to_string()),
            "[a-z]{1,8}=[a-z0-9]{1,8}",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use crate::core::bytes::parse_size;
    use crate::core::config::Config;
    use crate::core::machine::compose;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_size_strings_parse((expected, text) in size_string()) {
            prop_assert_eq!(parse_size(&text), Some(expected));
        }

        #[test]
        fn test_root_always_present(names in prop::collection::btree_set(drive_name(), 0..5)) {
            let toml: String = names
                .iter()
                .map(|n| format!("[drives.{n}]\nbuilder = \"empty\"\nsize = 4096\n"))
                .collect();
            let config = Config::parse(&toml).unwrap();
            prop_assert!(config.drives.contains_key("root"));
            for name in &names {
                prop_assert!(config.drives.contains_key(name));
            }
        }

        #[test]
        fn test_one_descriptor_per_drive(names in prop::collection::btree_set(drive_name(), 0..5)) {
            let mut toml: String = names
                .iter()
                .map(|n| format!("[drives.{n}]\nbuilder = \"empty\"\nsize = 4096\n"))
                .collect();
            toml.push_str("[machine]\nentrypoint = \"/bin/true\"\n");
            let config = Config::parse(&toml).unwrap();
            let args = compose(&config, None).unwrap();

            let descriptors: Vec<_> = args
                .iter()
                .filter(|a| a.starts_with("--flash-drive="))
                .collect();
            prop_assert_eq!(descriptors.len(), config.drives.len());
            for (descriptor, name) in descriptors.iter().zip(config.drives.keys()) {
                let prefix = format!("--flash-drive=label:{name},filename:{name}.");
                prop_assert!(descriptor.starts_with(&prefix));
            }
        }

        #[test]
        fn test_bootargs_keep_order(args in prop::collection::vec(bootarg(), 0..6)) {
            let mut config = Config::default();
            config.machine.entrypoint = Some("/bin/true".into());
            config.machine.bootargs = args.clone();
            let composed = compose(&config, None).unwrap();
            let bootargs: Vec<String> = composed
                .iter()
                .filter_map(|a| a.strip_prefix("--append-bootargs="))
                .map(String::from)
                .collect();
            prop_assert_eq!(bootargs, args);
        }
    }
}
