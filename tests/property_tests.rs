//! Property-based tests for archhypr
//!
//! These tests verify:
//! - Shell quoting keeps arbitrary values as one literal word
//! - Validators accept what they promise and never panic
//! - Partition naming and the resume edits behave on any input

use proptest::prelude::*;

// =============================================================================
// Shell Quoting Property Tests
// =============================================================================

use archhypr::shell::{escape_single_quotes, single_quote};

proptest! {
    /// single_quote: the shell reads back exactly one word equal to the input
    #[test]
    fn single_quote_is_one_literal_word(value in "[ -~\t\n]{0,40}") {
        let quoted = single_quote(&value);
        let words = shlex::split(&quoted).expect("quoted value should parse");
        prop_assert_eq!(words, vec![value]);
    }

    /// escape_single_quotes: every quote is part of a '\'' sequence
    #[test]
    fn escaped_quotes_are_always_closed(value in "[a-z' ]{0,30}") {
        let escaped = escape_single_quotes(&value);
        let stripped = escaped.replace("'\\''", "");
        prop_assert!(!stripped.contains('\''));
        prop_assert_eq!(
            escaped.matches("'\\''").count(),
            value.matches('\'').count()
        );
    }
}

// =============================================================================
// Validation Property Tests
// =============================================================================

use archhypr::validation;

proptest! {
    /// Validators never panic on arbitrary input
    #[test]
    fn validators_never_panic(input in any::<String>()) {
        let _ = validation::is_valid_username(&input);
        let _ = validation::is_valid_hostname(&input);
        let _ = validation::is_valid_country(&input);
        let _ = validation::is_valid_timezone_name(&input);
        let _ = validation::is_valid_disk_name(&input);
        let _ = validation::is_valid_swap_size(&input);
        let _ = validation::is_valid_volume_name(&input);
    }

    /// Usernames matching the documented pattern are accepted
    #[test]
    fn generated_usernames_are_valid(name in "[a-z_][a-z0-9_-]{0,31}") {
        prop_assert!(validation::is_valid_username(&name));
    }

    /// Usernames with an uppercase letter are rejected
    #[test]
    fn uppercase_usernames_are_rejected(prefix in "[a-z]{0,5}", upper in "[A-Z]", suffix in "[a-z]{0,5}") {
        let name = format!("{}{}{}", prefix, upper, suffix);
        prop_assert!(!validation::is_valid_username(&name));
    }

    /// Single labels with inner hyphens are valid hostnames
    #[test]
    fn generated_hostnames_are_valid(name in "[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?") {
        prop_assert!(validation::is_valid_hostname(&name));
    }

    /// Dotted names are not a single label
    #[test]
    fn dotted_hostnames_are_rejected(a in "[a-z]{1,10}", b in "[a-z]{1,10}") {
        let name = format!("{}.{}", a, b);
        prop_assert!(!validation::is_valid_hostname(&name));
    }

    /// Timezone names never escape the zoneinfo directory
    #[test]
    fn timezones_with_parent_segments_are_rejected(a in "[A-Za-z_]{1,10}", b in "[A-Za-z_]{1,10}") {
        let name = format!("{}/../{}", a, b);
        prop_assert!(!validation::is_valid_timezone_name(&name));
    }

    /// Every SATA/SCSI and NVMe name of the expected shape is accepted
    #[test]
    fn generated_disk_names_are_valid(
        letter in "[a-z]",
        controller in 0u32..16,
        namespace in 1u32..8,
    ) {
        let sata = format!("sd{}", letter);
        let nvme = format!("nvme{}n{}", controller, namespace);
        prop_assert!(validation::is_valid_disk_name(&sata));
        prop_assert!(validation::is_valid_disk_name(&nvme));
    }

    /// Positive sizes with an M or G suffix are valid
    #[test]
    fn positive_swap_sizes_are_valid(size in 1u32..100_000, unit in prop_oneof![Just('M'), Just('G')]) {
        let value = format!("{}{}", size, unit);
        prop_assert!(validation::is_valid_swap_size(&value));
    }
}

// =============================================================================
// Partition Naming Property Tests
// =============================================================================

use archhypr::engine::storage::partition_path;

proptest! {
    /// SATA disks take the number directly
    #[test]
    fn sata_partitions_have_no_separator(letter in "[a-z]", number in 1u32..4) {
        let disk = format!("/dev/sd{}", letter);
        prop_assert_eq!(partition_path(&disk, number), format!("{}{}", disk, number));
    }

    /// Disks ending in a digit get a `p` separator
    #[test]
    fn nvme_partitions_use_p_separator(controller in 0u32..16, namespace in 1u32..8, number in 1u32..4) {
        let disk = format!("/dev/nvme{}n{}", controller, namespace);
        prop_assert_eq!(partition_path(&disk, number), format!("{}p{}", disk, number));
    }
}

// =============================================================================
// Resume Configuration Property Tests
// =============================================================================

use archhypr::logic::resume::{ensure_resume_hooks, update_grub_cmdline};

fn kernel_params() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,8}(=[a-z0-9]{1,8})?", 0..5)
}

fn hook_lists() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop_oneof![
            Just("base".to_string()),
            Just("udev".to_string()),
            Just("autodetect".to_string()),
            Just("block".to_string()),
            Just("filesystems".to_string()),
            Just("fsck".to_string()),
            Just("btrfs".to_string()),
        ],
        0..6,
    )
}

proptest! {
    /// Applying the cmdline edit twice changes nothing the second time
    #[test]
    fn grub_cmdline_update_is_idempotent(params in kernel_params(), uuid in "[0-9a-f-]{8,36}") {
        let content = format!("GRUB_DEFAULT=0\nGRUB_CMDLINE_LINUX=\"{}\"\n", params.join(" "));
        let once = update_grub_cmdline(&content, &uuid);
        let twice = update_grub_cmdline(&once, &uuid);
        prop_assert_eq!(&once, &twice);

        let expected = format!("resume=UUID={}", uuid);
        prop_assert_eq!(once.matches("resume=").count(), 1);
        prop_assert!(once.contains(&expected));
    }

    /// A second resume UUID replaces the first
    #[test]
    fn grub_cmdline_keeps_one_resume_token(first in "[0-9a-f]{8}", second in "[0-9a-f]{8}") {
        let content = "GRUB_CMDLINE_LINUX=\"quiet\"\n";
        let updated = update_grub_cmdline(&update_grub_cmdline(content, &first), &second);
        prop_assert_eq!(updated.matches("resume=").count(), 1);
        let expected = format!("resume=UUID={}", second);
        prop_assert!(updated.contains(&expected));
    }

    /// Adding the hooks is idempotent and leaves each hook exactly once
    #[test]
    fn resume_hooks_are_idempotent(hooks in hook_lists()) {
        let mut unique = hooks.clone();
        unique.dedup();
        let content = format!("MODULES=()\nHOOKS=({})\n", unique.join(" "));
        let once = ensure_resume_hooks(&content).expect("HOOKS line present");
        let twice = ensure_resume_hooks(&once).expect("HOOKS line present");
        prop_assert_eq!(&once, &twice);

        let line = once.lines().find(|l| l.starts_with("HOOKS=(")).unwrap();
        let words: Vec<&str> = line
            .trim_start_matches("HOOKS=(")
            .trim_end_matches(')')
            .split_whitespace()
            .collect();
        prop_assert_eq!(words.iter().filter(|w| **w == "resume").count(), 1);
        prop_assert!(words.contains(&"btrfs"));
        if let Some(fs_pos) = words.iter().position(|w| *w == "filesystems") {
            let resume_pos = words.iter().position(|w| *w == "resume").unwrap();
            prop_assert!(resume_pos < fs_pos);
        }
    }
}
