//! Persistent state tree: namespace -> instance id -> slice
//!
//! Every level is behind an `Arc`. A transition builds a new tree that shares
//! all untouched namespaces and slices with the previous one, so consumers can
//! detect change by identity (`ptr_eq`) instead of deep comparison.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The state owned by one instance
pub type Slice = Arc<Value>;

/// All live instances of one namespace, keyed by instance id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceState(Arc<BTreeMap<String, Slice>>);

impl NamespaceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slice of instance `id`
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.0.get(id).map(Arc::as_ref)
    }

    /// Shared handle on the slice of instance `id`
    pub fn slice(&self, id: &str) -> Option<&Slice> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Instance ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(id, slice)| (id.as_str(), slice.as_ref()))
    }

    /// True when both handles point at the same version
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Plain JSON object of id -> slice
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(id, slice)| (id.clone(), slice.as_ref().clone()))
                .collect(),
        )
    }

    /// New version with every slice replaced by `f(slice)`
    pub(crate) fn map_slices<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&Value) -> Value,
    {
        if self.is_empty() {
            return self.clone();
        }
        Self(Arc::new(
            self.0
                .iter()
                .map(|(id, slice)| (id.clone(), Arc::new(f(slice))))
                .collect(),
        ))
    }

    /// New version with the given slices inserted or overwritten
    pub(crate) fn with_slices<I>(&self, slices: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut entries = (*self.0).clone();
        for (id, value) in slices {
            entries.insert(id, Arc::new(value));
        }
        Self(Arc::new(entries))
    }

    /// New version without the given ids; `self` when none of them is present
    pub(crate) fn without(&self, ids: &[&str]) -> Self {
        if !ids.iter().any(|id| self.contains(id)) {
            return self.clone();
        }
        let mut entries = (*self.0).clone();
        for id in ids {
            entries.remove(*id);
        }
        Self(Arc::new(entries))
    }
}

impl FromIterator<(String, Value)> for NamespaceState {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(Arc::new(
            iter.into_iter()
                .map(|(id, value)| (id, Arc::new(value)))
                .collect(),
        ))
    }
}

/// The whole multiplexed state: namespace name -> [`NamespaceState`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateTree(Arc<BTreeMap<String, NamespaceState>>);

impl StateTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceState> {
        self.0.get(name)
    }

    /// Namespace names in ascending order
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when both handles point at the same version
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(name, state)| (name.clone(), state.to_json()))
                .collect(),
        )
    }

    /// New version with namespace `name` replaced; every other namespace is shared
    pub(crate) fn with_namespace(&self, name: &str, state: NamespaceState) -> Self {
        let mut namespaces = (*self.0).clone();
        namespaces.insert(name.to_string(), state);
        Self(Arc::new(namespaces))
    }

    pub(crate) fn from_map(namespaces: BTreeMap<String, NamespaceState>) -> Self {
        Self(Arc::new(namespaces))
    }
}

impl FromIterator<(String, NamespaceState)> for StateTree {
    fn from_iter<I: IntoIterator<Item = (String, NamespaceState)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}
