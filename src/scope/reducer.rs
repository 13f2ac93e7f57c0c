//! ScopedReducer - composes per-namespace transition functions into one
//!
//! Routing rules, applied to every action:
//!
//! | namespace tag | instance tag | effect                                          |
//! |---------------|--------------|-------------------------------------------------|
//! | absent        | any          | every namespace reduces the action (broadcast)  |
//! | present       | absent       | every instance of that namespace reduces it     |
//! | present       | present      | REGISTER / UNREGISTER / the one tagged instance |
//!
//! Unknown namespaces and instances that are not registered are silent no-ops.

use super::tree::{NamespaceState, StateTree};
use super::types::{Action, InstanceKey};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// A transition function for the slices of one namespace
///
/// Receives `None` for an instance that has no state yet and must then return
/// its default state. Must be pure.
pub trait Transition {
    fn apply(&self, state: Option<&Value>, action: &Action) -> Value;
}

impl<F> Transition for F
where
    F: Fn(Option<&Value>, &Action) -> Value,
{
    fn apply(&self, state: Option<&Value>, action: &Action) -> Value {
        self(state, action)
    }
}

/// One composed transition function over the whole [`StateTree`]
#[derive(Default)]
pub struct ScopedReducer {
    transitions: BTreeMap<String, Box<dyn Transition>>,
}

impl ScopedReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose from an existing namespace -> transition map
    pub fn build(transitions: BTreeMap<String, Box<dyn Transition>>) -> Self {
        Self { transitions }
    }

    /// Add (or replace) the transition function for `namespace`
    pub fn namespace<T>(mut self, namespace: impl Into<String>, transition: T) -> Self
    where
        T: Transition + 'static,
    {
        self.transitions
            .insert(namespace.into(), Box::new(transition));
        self
    }

    pub fn handles(&self, namespace: &str) -> bool {
        self.transitions.contains_key(namespace)
    }

    /// Registered namespace names in ascending order
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.transitions.keys().map(String::as_str)
    }

    /// Apply `action` to the tree
    ///
    /// Returns the same version (`ptr_eq`) when nothing changed. Namespaces
    /// the action does not target are shared with the input tree.
    pub fn reduce(&self, tree: &StateTree, action: &Action) -> StateTree {
        let Some(name) = action.meta.namespace.as_deref() else {
            return self.broadcast(tree, action);
        };

        let Some(transition) = self.transitions.get(name) else {
            trace!("No transition registered for namespace '{}', ignoring {}", name, action.kind);
            return tree.clone();
        };

        let empty = NamespaceState::new();
        let current = tree.namespace(name).unwrap_or(&empty);
        let next = reduce_namespace(transition.as_ref(), current, action);

        if next.ptr_eq(current) {
            tree.clone()
        } else {
            tree.with_namespace(name, next)
        }
    }

    /// Apply `action` to one namespace's instances
    ///
    /// Returns `None` when no transition is registered for `namespace`.
    pub fn reduce_namespace(
        &self,
        namespace: &str,
        state: Option<&NamespaceState>,
        action: &Action,
    ) -> Option<NamespaceState> {
        let transition = self.transitions.get(namespace)?;
        let empty = NamespaceState::new();
        Some(reduce_namespace(
            transition.as_ref(),
            state.unwrap_or(&empty),
            action,
        ))
    }

    fn broadcast(&self, tree: &StateTree, action: &Action) -> StateTree {
        trace!("Broadcasting untagged {} to {} namespaces", action.kind, self.transitions.len());

        let empty = NamespaceState::new();
        let mut changed = false;
        let mut namespaces = BTreeMap::new();

        for (name, transition) in &self.transitions {
            let current = tree.namespace(name);
            let next = reduce_namespace(transition.as_ref(), current.unwrap_or(&empty), action);

            match current {
                Some(current) if current.ptr_eq(&next) => {}
                None if next.is_empty() => continue,
                _ => changed = true,
            }
            namespaces.insert(name.clone(), next);
        }

        // namespaces without a transition are dropped from the result
        if !changed && namespaces.len() == tree.len() {
            return tree.clone();
        }
        StateTree::from_map(namespaces)
    }
}

/// Namespace-level transition: routes `action` to the instance(s) it names
fn reduce_namespace(
    transition: &dyn Transition,
    state: &NamespaceState,
    action: &Action,
) -> NamespaceState {
    let Some(key) = action.meta.instance.as_ref() else {
        return state.map_slices(|slice| transition.apply(Some(slice), action));
    };

    if action.is_register() {
        debug!("Registering {:?}", key.ids());
        return match key {
            InstanceKey::One(id) => state.with_slices([(id.clone(), transition.apply(None, action))]),
            InstanceKey::Many(seeds) => state.with_slices(seeds.iter().map(|(id, seed)| {
                let seed = Some(seed).filter(|s| !s.is_null());
                (id.clone(), transition.apply(seed, action))
            })),
        };
    }

    if action.is_unregister() {
        debug!("Unregistering {:?}", key.ids());
        return state.without(&key.ids());
    }

    let target = key
        .as_single()
        .and_then(|id| state.get(id).map(|slice| (id, slice)));

    match target {
        Some((id, slice)) => {
            let next = transition.apply(Some(slice), action);
            state.with_slices([(id.to_string(), next)])
        }
        None => {
            trace!("No live instance for {:?}, dropping {}", key, action.kind);
            state.clone()
        }
    }
}
