//! Property-based invariant tests for `ObservableStore`.
//!
//! 1. History length is `min(capacity, updates + 1)` and holds the newest
//!    entries, oldest first.
//! 2. Versions increase by exactly one per update.
//! 3. Each update notifies a pre-registered subscriber exactly once with
//!    `(new, previous)`.
//! 4. Object patches overwrite only the named fields.
//! 5. Reset always restores the construction-time value.

use hostmock_core::{ObservableStore, Update};
use proptest::prelude::*;
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::rc::Rc;

// ── Strategies ────────────────────────────────────────────────────────────

fn fields_strategy() -> impl Strategy<Value = Map<String, Value>> {
    proptest::collection::btree_map("[a-e]", any::<i32>(), 0..5)
        .prop_map(|m| m.into_iter().map(|(k, v)| (k, json!(v))).collect())
}

// 1 + 2 + 3. Bounded history, versions and notifications

proptest! {
    #[test]
    fn history_is_bounded_fifo(capacity in 1usize..8, values in proptest::collection::vec(any::<i64>(), 0..30)) {
        let store = ObservableStore::with_capacity(-1_i64, capacity);
        let seen: Rc<RefCell<Vec<(i64, i64)>>> = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = store.subscribe(move |new, old| s.borrow_mut().push((*new, *old)));

        for v in &values {
            store.replace(*v);
        }

        let mut all = vec![-1_i64];
        all.extend(values.iter().copied());
        let expected_len = capacity.min(all.len());
        let tail = all[all.len() - expected_len..].to_vec();

        let history = store.history();
        prop_assert_eq!(history.len(), expected_len);
        prop_assert_eq!(history.iter().map(|e| e.value).collect::<Vec<_>>(), tail);
        for pair in history.windows(2) {
            prop_assert_eq!(pair[1].version, pair[0].version + 1);
        }
        prop_assert_eq!(store.version(), values.len() as u64);

        let expected_pairs: Vec<(i64, i64)> = all.windows(2).map(|w| (w[1], w[0])).collect();
        prop_assert_eq!(seen.borrow().clone(), expected_pairs);
    }
}

// 4. Patch semantics

proptest! {
    #[test]
    fn patch_overwrites_only_named_fields(initial in fields_strategy(), patch in fields_strategy()) {
        let store = ObservableStore::new(Value::Object(initial.clone()));
        let p = patch.clone();
        store.update(move |_| Update::Merge(p));

        let current = store.current();
        let obj = current.as_object().unwrap();
        for (k, v) in &initial {
            let expected = patch.get(k).unwrap_or(v);
            prop_assert_eq!(obj.get(k), Some(expected));
        }
        for (k, v) in &patch {
            prop_assert_eq!(obj.get(k), Some(v));
        }
        let expected_keys = initial.keys().chain(patch.keys()).collect::<std::collections::BTreeSet<_>>();
        prop_assert_eq!(obj.len(), expected_keys.len());
    }
}

proptest! {
    #[test]
    fn replace_discards_unnamed_fields(initial in fields_strategy(), next in fields_strategy()) {
        let store = ObservableStore::new(Value::Object(initial));
        let n = next.clone();
        store.update(move |_| Update::Replace(Value::Object(n)));
        prop_assert_eq!(store.current(), Value::Object(next));
    }
}

// 5. Reset

proptest! {
    #[test]
    fn reset_restores_initial(capacity in 0usize..4, updates in proptest::collection::vec(any::<u32>(), 0..12)) {
        let store = ObservableStore::with_capacity(json!({"count": 0}), capacity);
        for u in &updates {
            let u = *u;
            store.update(move |_| json!({"count": u, "extra": true}));
        }
        store.reset();
        prop_assert_eq!(store.current(), json!({"count": 0}));
        prop_assert_eq!(store.version(), updates.len() as u64 + 1);
        if capacity > 0 {
            let last = store.history().pop().unwrap();
            prop_assert_eq!(last.value, json!({"count": 0}));
        }
    }
}
