//! Black-box tests for the multiplexer's registry and input routing,
//! covering the capacity, dedup, identity, and navigation guarantees the
//! UI depends on.

#[cfg(test)]
mod registry_tests {
    use opsdeck::registry::{
        CreateOutcome, NavDirection, RemoveOutcome, StaticView, TabContent, TabRegistry, MAX_TABS,
    };

    fn content() -> TabContent {
        TabContent::Static(StaticView::new("body"))
    }

    /// The live tab count never exceeds the capacity; the create that
    /// would exceed it leaves state unchanged.
    #[test]
    fn test_capacity_is_never_exceeded() {
        let mut registry = TabRegistry::new();

        for i in 0..20 {
            registry.create(format!("tab-{i}"), false, |_| content());
            assert!(registry.len() <= MAX_TABS);
        }

        assert_eq!(registry.len(), MAX_TABS);
        let active_before = registry.active_region_id();
        assert_eq!(
            registry.create("overflow", false, |_| content()),
            CreateOutcome::AtCapacity
        );
        assert_eq!(registry.active_region_id(), active_before);
    }

    /// A repeated resource-tab create yields one live tab and a
    /// focus-existing signal, not a new region id.
    #[test]
    fn test_resource_tab_created_once() {
        let mut registry = TabRegistry::new();
        registry.create("home", false, |_| content());

        let first = registry.create("cluster-x", true, |_| content());
        let second = registry.create("cluster-x", true, |_| content());

        assert!(matches!(first, CreateOutcome::Created(_)));
        assert!(matches!(second, CreateOutcome::FocusExisting(_)));
        let count = registry
            .tabs()
            .iter()
            .filter(|tab| tab.title() == "cluster-x")
            .count();
        assert_eq!(count, 1);
    }

    /// Region ids are strictly increasing and never reused across any
    /// interleaving of creates and removes.
    #[test]
    fn test_region_ids_monotonic_across_churn() {
        let mut registry = TabRegistry::new();
        let mut last_id = None;
        let mut assigned = Vec::new();

        for round in 0..6 {
            let outcome = registry.create(format!("t{round}"), false, |_| content());
            let CreateOutcome::Created(id) = outcome else {
                panic!("create failed in round {round}");
            };
            if let Some(last) = last_id {
                assert!(id > last, "region id {id} not greater than {last}");
            }
            assert!(!assigned.contains(&id));
            assigned.push(id);
            last_id = Some(id);

            // Churn: remove every other tab we just made
            if round % 2 == 0 && registry.len() > 1 {
                registry.remove(id);
            }
        }
    }

    /// After any removal the remaining ordinals are a contiguous
    /// 0-based sequence in registry order.
    #[test]
    fn test_ordinals_contiguous_after_removal() {
        let mut registry = TabRegistry::new();
        for i in 0..5 {
            registry.create(format!("t{i}"), false, |_| content());
        }

        registry.remove(2);
        registry.remove(0);

        let ordinals: Vec<usize> = registry.tabs().iter().map(|t| t.ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }

    /// Removing the sole remaining tab is a quit, not an empty registry.
    #[test]
    fn test_last_tab_removal_is_quit() {
        let mut registry = TabRegistry::new();
        registry.create("home", false, |_| content());

        assert_eq!(registry.remove(0), RemoveOutcome::Quit);
        assert_eq!(registry.len(), 1);
    }

    /// Asking for the same cluster login twice refocuses the first tab.
    #[test]
    fn test_scenario_repeat_cluster_login() {
        let mut registry = TabRegistry::new();
        registry.create("shell", false, |_| content());
        registry.create("cluster-abc", true, |_| content());

        let outcome = registry.create("cluster-abc", true, |_| content());

        assert_eq!(registry.len(), 2);
        assert_eq!(outcome, CreateOutcome::FocusExisting(1));
        assert_eq!(registry.active_region_id(), Some(1));
    }

    /// Removing a middle tab renumbers ordinals but not region ids.
    #[test]
    fn test_scenario_remove_middle_tab() {
        let mut registry = TabRegistry::new();
        for title in ["a", "b", "c"] {
            registry.create(title, false, |_| content());
        }

        registry.remove(1);

        let ordinals: Vec<usize> = registry.tabs().iter().map(|t| t.ordinal()).collect();
        let regions: Vec<u64> = registry.tabs().iter().map(|t| t.region_id()).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(regions, vec![0, 2]);
        // Navigation moved to the tab preceding the removed one
        assert_eq!(registry.active_region_id(), Some(0));
    }

    /// Absolute jumps land on valid ordinals and ignore out-of-range
    /// digits.
    #[test]
    fn test_scenario_absolute_jumps() {
        let mut registry = TabRegistry::new();
        for title in ["a", "b", "c"] {
            registry.create(title, false, |_| content());
        }

        assert!(registry.navigate_to_ordinal(2).is_some());
        assert_eq!(registry.active_tab().unwrap().ordinal(), 1);

        assert!(registry.navigate_to_ordinal(9).is_none());
        assert_eq!(registry.active_tab().unwrap().ordinal(), 1);
    }

    #[test]
    fn test_navigation_wraps_both_directions() {
        let mut registry = TabRegistry::new();
        for title in ["a", "b"] {
            registry.create(title, false, |_| content());
        }

        registry.navigate_to_ordinal(2);
        assert_eq!(registry.navigate(NavDirection::Next), Some(0));
        assert_eq!(registry.navigate(NavDirection::Previous), Some(1));
    }
}

#[cfg(test)]
mod input_tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use opsdeck::input::{InputRouter, Routed};

    fn plain(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    /// While command-mode is active no event reaches the session; the
    /// digit becomes navigation, everything else is consumed.
    #[test]
    fn test_command_mode_isolation() {
        let mut router = InputRouter::new();

        assert_eq!(router.route(ctrl('b')), Routed::CommandModeArmed);
        match router.route(plain('3')) {
            Routed::JumpToOrdinal(3) => {}
            other => panic!("digit leaked as {other:?}"),
        }

        router.route(ctrl('b'));
        assert_eq!(router.route(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)),
                   Routed::Ignored);
    }

    /// The full hotkey surface routes to actions, never to the session.
    #[test]
    fn test_hotkey_surface() {
        let mut router = InputRouter::new();

        let cases = [
            (ctrl('s'), Routed::NewShellTab),
            (ctrl('o'), Routed::NewClusterTab),
            (ctrl('e'), Routed::CloseActiveTab),
            (ctrl('n'), Routed::NextTab),
            (ctrl('p'), Routed::PreviousTab),
            (ctrl('q'), Routed::Quit),
        ];
        for (key, expected) in cases {
            assert_eq!(router.route(key), expected);
        }
    }

    /// Typing "exit" inside a session closes it on Enter, even when the
    /// phrase is preceded by other input.
    #[test]
    fn test_exit_phrase_trailing_window() {
        let mut router = InputRouter::new();

        for c in "echo hi".chars() {
            router.route(plain(c));
        }
        router.route(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));

        for c in "exit".chars() {
            router.route(plain(c));
        }
        assert_eq!(
            router.route(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)),
            Routed::CloseViaExitPhrase
        );
    }
}
