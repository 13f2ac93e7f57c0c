//! Read-only lookups into the state tree
//!
//! None of these fail: a missing namespace, instance or path segment simply
//! yields `None`.

use super::tree::{NamespaceState, StateTree};
use serde_json::Value;

/// All instances of `namespace`
pub fn read_namespace<'a>(tree: &'a StateTree, namespace: &str) -> Option<&'a NamespaceState> {
    tree.namespace(namespace)
}

/// Slice of (`namespace`, `instance`), optionally descending along `path`
///
/// Path segments index objects by key and arrays by position, which also
/// covers slices that nest their own sub-state one or more levels deep.
pub fn read_slice<'a>(
    tree: &'a StateTree,
    namespace: &str,
    instance: &str,
    path: &[&str],
) -> Option<&'a Value> {
    let slice = tree.namespace(namespace)?.get(instance)?;
    path.iter().try_fold(slice, |value, segment| descend(value, segment))
}

fn descend<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Ids currently registered under `namespace`, in ascending order
pub fn list_instance_ids(tree: &StateTree, namespace: &str) -> Vec<String> {
    tree.namespace(namespace)
        .map(|state| state.ids().map(str::to_string).collect())
        .unwrap_or_default()
}

/// What one instance sees of the tree: its own slice plus the global state
#[derive(Debug, Clone, Copy)]
pub struct ScopedView<'a> {
    /// This instance's slice, absent until registered
    pub local: Option<&'a Value>,
    /// The whole tree
    pub global: &'a StateTree,
    pub namespace: &'a str,
    pub instance: &'a str,
}

impl<'a> ScopedView<'a> {
    pub fn new(tree: &'a StateTree, namespace: &'a str, instance: &'a str) -> Self {
        Self {
            local: read_slice(tree, namespace, instance, &[]),
            global: tree,
            namespace,
            instance,
        }
    }

    /// Value at `path` inside the local slice
    pub fn get(&self, path: &[&str]) -> Option<&'a Value> {
        read_slice(self.global, self.namespace, self.instance, path)
    }

    pub fn is_registered(&self) -> bool {
        self.local.is_some()
    }
}
