#![forbid(unsafe_code)]

//! Explicit structural deep copy for stored state.
//!
//! # Design
//!
//! [`Snapshot`] walks a value recursively and rebuilds it, so a snapshot
//! never shares storage with the original. Stores take a snapshot at every
//! write boundary (history entries, the retained initial value, the draft
//! handed to an updater) and hand out snapshots from `current()`.
//!
//! # Cycles and aliasing
//!
//! The trait is intentionally not implemented for shared-ownership or
//! interior-mutability wrappers (`Rc`, `Arc`, `Weak`, `Cell`, `RefCell`).
//! Without them an owned value is a tree, so cyclic or aliased state cannot
//! be placed in a store at all: it is rejected at compile time rather than
//! detected at runtime.
//!
//! Plain-data user types opt in with [`snapshot_by_clone!`](crate::snapshot_by_clone)
//! when their `Clone` is already structural, or implement the trait by hand.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::hash::{BuildHasher, Hash};

use serde_json::{Map, Value};

/// A recursive structural copy that shares no storage with `self`.
pub trait Snapshot: Sized {
    /// Produce an independent deep copy.
    fn snapshot(&self) -> Self;
}

/// Implement [`Snapshot`] via `Clone` for types whose clone is already a
/// full structural copy (no `Rc`/`Arc` fields).
///
/// ```
/// use hostmock_core::{Snapshot, snapshot_by_clone};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Cursor {
///     line: u32,
///     column: u32,
/// }
/// snapshot_by_clone!(Cursor);
///
/// let c = Cursor { line: 1, column: 4 };
/// assert_eq!(c.snapshot(), c);
/// ```
#[macro_export]
macro_rules! snapshot_by_clone {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::Snapshot for $ty {
                #[inline]
                fn snapshot(&self) -> Self {
                    ::core::clone::Clone::clone(self)
                }
            }
        )*
    };
}

snapshot_by_clone!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str,
    std::time::Duration,
    std::time::SystemTime,
);

impl<T: Snapshot> Snapshot for Option<T> {
    fn snapshot(&self) -> Self {
        self.as_ref().map(Snapshot::snapshot)
    }
}

impl<T: Snapshot> Snapshot for Box<T> {
    fn snapshot(&self) -> Self {
        Box::new(self.as_ref().snapshot())
    }
}

impl<T: Snapshot> Snapshot for Vec<T> {
    fn snapshot(&self) -> Self {
        self.iter().map(Snapshot::snapshot).collect()
    }
}

impl<T: Snapshot> Snapshot for VecDeque<T> {
    fn snapshot(&self) -> Self {
        self.iter().map(Snapshot::snapshot).collect()
    }
}

impl<T: Snapshot, const N: usize> Snapshot for [T; N] {
    fn snapshot(&self) -> Self {
        self.each_ref().map(Snapshot::snapshot)
    }
}

impl<K: Snapshot + Ord, V: Snapshot> Snapshot for BTreeMap<K, V> {
    fn snapshot(&self) -> Self {
        self.iter().map(|(k, v)| (k.snapshot(), v.snapshot())).collect()
    }
}

impl<T: Snapshot + Ord> Snapshot for BTreeSet<T> {
    fn snapshot(&self) -> Self {
        self.iter().map(Snapshot::snapshot).collect()
    }
}

impl<K, V, S> Snapshot for HashMap<K, V, S>
where
    K: Snapshot + Eq + Hash,
    V: Snapshot,
    S: BuildHasher + Clone,
{
    fn snapshot(&self) -> Self {
        let mut out = HashMap::with_capacity_and_hasher(self.len(), self.hasher().clone());
        for (k, v) in self {
            out.insert(k.snapshot(), v.snapshot());
        }
        out
    }
}

macro_rules! snapshot_tuple {
    ($($name:ident),+) => {
        impl<$($name: Snapshot),+> Snapshot for ($($name,)+) {
            #[allow(non_snake_case)]
            fn snapshot(&self) -> Self {
                let ($($name,)+) = self;
                ($($name.snapshot(),)+)
            }
        }
    };
}

snapshot_tuple!(A);
snapshot_tuple!(A, B);
snapshot_tuple!(A, B, C);
snapshot_tuple!(A, B, C, D);

impl Snapshot for Value {
    fn snapshot(&self) -> Self {
        match self {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(*b),
            Value::Number(n) => Value::Number(n.clone()),
            Value::String(s) => Value::String(s.clone()),
            Value::Array(items) => Value::Array(items.snapshot()),
            Value::Object(fields) => Value::Object(fields.snapshot()),
        }
    }
}

impl Snapshot for Map<String, Value> {
    fn snapshot(&self) -> Self {
        self.iter().map(|(k, v)| (k.clone(), v.snapshot())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_json_is_copied() {
        let original = json!({
            "editors": [{"path": "/a.rs", "dirty": false}],
            "focused": true,
            "nested": {"deep": {"deeper": [1, 2, 3]}},
        });
        let mut copy = original.snapshot();
        assert_eq!(copy, original);

        copy["nested"]["deep"]["deeper"][0] = json!(99);
        copy["editors"][0]["dirty"] = json!(true);
        assert_eq!(original["nested"]["deep"]["deeper"][0], json!(1));
        assert_eq!(original["editors"][0]["dirty"], json!(false));
    }

    #[test]
    fn containers_copy_recursively() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), vec![Some(1_u32), None]);
        let copy = map.snapshot();
        assert_eq!(copy, map);

        let deque: VecDeque<(String, i64)> = [("x".to_string(), 1)].into_iter().collect();
        assert_eq!(deque.snapshot(), deque);

        let arr = [vec![1_u8], vec![2, 3]];
        assert_eq!(arr.snapshot(), arr);
    }

    #[test]
    fn hash_map_keeps_entries() {
        let mut map: HashMap<String, Box<f64>> = HashMap::new();
        map.insert("ratio".into(), Box::new(2.5));
        let copy = map.snapshot();
        assert_eq!(copy.len(), 1);
        assert_eq!(*copy["ratio"], 2.5);
    }

    #[test]
    fn user_type_via_macro() {
        #[derive(Clone, Debug, PartialEq)]
        struct Selection {
            anchor: usize,
            active: usize,
        }
        crate::snapshot_by_clone!(Selection);

        let sel = Selection {
            anchor: 2,
            active: 5,
        };
        assert_eq!(sel.snapshot(), sel);
    }
}
