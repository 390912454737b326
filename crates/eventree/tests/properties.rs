use eventree::{EmitterError, Registry};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-c]{1,2}"
}

fn dotted() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..4).prop_map(|s| s.join("."))
}

proptest! {
    #[test]
    fn get_or_create_is_idempotent(names in prop::collection::vec(dotted(), 1..12)) {
        let registry = Registry::new();
        let first: Vec<_> = names.iter().map(|n| registry.get_or_create(n).unwrap()).collect();
        for (name, emitter) in names.iter().zip(&first) {
            prop_assert_eq!(&registry.get_or_create(name).unwrap(), emitter);
        }
    }

    #[test]
    fn parent_is_longest_created_prefix(names in prop::collection::vec(dotted(), 1..12)) {
        let registry = Registry::new();
        for name in &names {
            registry.get_or_create(name).unwrap();
        }
        for name in &names {
            let expected = name
                .match_indices('.')
                .map(|(i, _)| &name[..i])
                .rev()
                .find(|prefix| registry.contains(prefix))
                .unwrap_or("root");
            let parent = registry.get(name).and_then(|e| e.parent()).unwrap();
            prop_assert_eq!(parent.name(), expected);
        }
    }

    #[test]
    fn malformed_names_do_not_mutate(prefix in dotted(), suffix in dotted()) {
        let registry = Registry::new();
        let bad = format!("{prefix}..{suffix}");
        let rejected = matches!(registry.get_or_create(&bad), Err(EmitterError::MalformedName { .. }));
        prop_assert!(rejected);
        prop_assert_eq!(registry.names(), vec!["root".to_owned()]);
    }
}
