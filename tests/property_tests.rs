//! Property-based tests for pkgcenter invariants
//!
//! Uses proptest to check task accounting, state derivation and glob
//! matching over generated inputs.

use proptest::prelude::*;

use pkgcenter_lib::core::drivers::glob_to_regex;
use pkgcenter_lib::core::events::EventBus;
use pkgcenter_lib::core::packages::{TaskCoordinator, derive_state};
use pkgcenter_lib::core::{Operation, PackageState};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Count always equals begins minus ends for any pairing order
    #[test]
    fn prop_task_count_tracks_open_guards(ops in prop::collection::vec(any::<bool>(), 0..64)) {
        let tasks = TaskCoordinator::new(EventBus::new());
        let mut open = Vec::new();
        for begin in ops {
            if begin || open.is_empty() {
                open.push(tasks.begin());
            } else {
                drop(open.swap_remove(0));
            }
            prop_assert_eq!(tasks.count(), open.len());
            prop_assert_eq!(tasks.has_tasks(), !open.is_empty());
        }
        open.clear();
        prop_assert_eq!(tasks.count(), 0);
    }

    /// An operation in flight always wins; otherwise installed and changes decide
    #[test]
    fn prop_state_is_a_function_of_inputs(
        installed in any::<bool>(),
        has_changes in any::<bool>(),
        op in prop::option::of(prop::sample::select(vec![
            Operation::Install,
            Operation::Update,
            Operation::Remove,
        ])),
    ) {
        let state = derive_state(installed, has_changes, op);
        prop_assert_eq!(state, derive_state(installed, has_changes, op));
        match op {
            Some(op) => prop_assert_eq!(state, op.state()),
            None if !installed => prop_assert_eq!(state, PackageState::NotInstalled),
            None if has_changes => prop_assert_eq!(state, PackageState::UpdateAvailable),
            None => prop_assert_eq!(state, PackageState::Installed),
        }
    }

    /// A glob without wildcards matches only itself
    #[test]
    fn prop_literal_glob_matches_itself(alias in "[a-zA-Z0-9:._-]{1,40}") {
        let re = glob_to_regex(&alias).unwrap();
        prop_assert!(re.is_match(&alias));
        let longer = format!("{alias}x");
        prop_assert!(!re.is_match(&longer));
    }

    /// A trailing star matches any suffix
    #[test]
    fn prop_prefix_glob_matches_extensions(prefix in "[a-z0-9:]{1,20}", suffix in "[A-Za-z0-9]{0,20}") {
        let re = glob_to_regex(&format!("{prefix}*")).unwrap();
        let alias = format!("{prefix}{suffix}");
        prop_assert!(re.is_match(&alias));
    }
}
