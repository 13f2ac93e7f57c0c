//! Scenario replay
//!
//! A scenario is a YAML list of steps run in order against one
//! [`ScopedStore`]. Acquired instances are referred to by an alias chosen
//! in the scenario, since generated ids are not known in advance.
//!
//! ```yaml
//! steps:
//!   - step: acquire
//!     namespace: counter
//!     as: first
//!   - step: dispatch
//!     as: first
//!     kind: INCREMENT
//!   - step: print
//!     namespace: counter
//!   - step: release
//!     as: first
//! ```

pub mod builtin;

use crate::config::MuxConfig;
use crate::scope::{
    read_namespace, read_slice, register_request, unregister_request, Action, Augmenter,
    IdSource, InstanceGuard, InstanceKey, NamespaceState, ScopedReducer, ScopedStore,
    UuidSource,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info};

/// Ordered list of steps
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Scenario {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid scenario file: {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).context("Failed to parse YAML scenario")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum Step {
    /// Acquire an instance and remember it under `alias`
    Acquire {
        namespace: String,
        #[serde(rename = "as")]
        alias: String,
        /// Explicit id: observed only, never registered or released
        #[serde(default)]
        id: Option<String>,
    },
    Release {
        #[serde(rename = "as")]
        alias: String,
    },
    /// Bulk register: one slice per seed
    Register {
        namespace: String,
        seeds: BTreeMap<String, Value>,
    },
    /// Bulk unregister
    Unregister { namespace: String, ids: Vec<String> },
    /// Send one action
    ///
    /// With `as` the action goes through that instance's scoped dispatch.
    /// Otherwise it is tagged with whatever `namespace` / `instance` are
    /// given; with neither it reaches every namespace.
    Dispatch {
        #[serde(rename = "as", default)]
        alias: Option<String>,
        #[serde(default)]
        namespace: Option<String>,
        #[serde(default)]
        instance: Option<String>,
        kind: String,
        #[serde(default)]
        payload: Value,
    },
    /// Capture a snapshot of one instance, one namespace, or the whole tree
    Print {
        #[serde(rename = "as", default)]
        alias: Option<String>,
        #[serde(default)]
        namespace: Option<String>,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Acquire { .. } => "acquire",
            Step::Release { .. } => "release",
            Step::Register { .. } => "register",
            Step::Unregister { .. } => "unregister",
            Step::Dispatch { .. } => "dispatch",
            Step::Print { .. } => "print",
        }
    }
}

/// Output of one print step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub label: String,
    pub value: Value,
}

/// Runs scenarios against a store built from a [`MuxConfig`]
pub struct Replay {
    // guards release through the store, so they go first
    instances: BTreeMap<String, InstanceGuard>,
    store: ScopedStore,
    augmenter: Augmenter,
    ids: Rc<dyn IdSource>,
}

impl Replay {
    pub fn new(config: &MuxConfig) -> Result<Self> {
        let transitions = config
            .namespaces
            .iter()
            .map(|(namespace, name)| {
                builtin::lookup(name)
                    .map(|transition| (namespace.clone(), transition))
                    .with_context(|| {
                        format!("Namespace '{}' uses unknown transition '{}'", namespace, name)
                    })
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let replay = Self {
            instances: BTreeMap::new(),
            store: ScopedStore::new(ScopedReducer::build(transitions)),
            augmenter: Augmenter::new(config.diagnostics),
            ids: Rc::new(UuidSource),
        };
        info!(
            "Replay store ready with namespaces [{}], {:?} diagnostics",
            replay.store.reducer().namespaces().collect::<Vec<_>>().join(", "),
            replay.augmenter.diagnostics()
        );
        Ok(replay)
    }

    /// Use `ids` for acquired instances instead of random UUIDs
    pub fn with_id_source(mut self, ids: Rc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn store(&self) -> &ScopedStore {
        &self.store
    }

    /// Id currently bound to `alias`
    pub fn instance_id(&self, alias: &str) -> Option<&str> {
        self.instances.get(alias).map(InstanceGuard::id)
    }

    /// Run every step in order, stopping at the first failure
    pub fn run(&mut self, scenario: &Scenario) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        for (index, step) in scenario.steps.iter().enumerate() {
            debug!("Step {}: {}", index + 1, step.name());
            let output = self
                .apply(step)
                .with_context(|| format!("Step {} ({}) failed", index + 1, step.name()))?;
            snapshots.extend(output);
        }
        Ok(snapshots)
    }

    pub fn apply(&mut self, step: &Step) -> Result<Option<Snapshot>> {
        match step {
            Step::Acquire {
                namespace,
                alias,
                id,
            } => {
                if self.instances.contains_key(alias) {
                    anyhow::bail!("Alias '{}' is already in use", alias);
                }
                self.ensure_configured(namespace)?;
                let guard = self
                    .store
                    .lifecycle(namespace.as_str())
                    .with_id_source(Rc::clone(&self.ids))
                    .acquire(id.as_deref())?;
                info!("Acquired {}/{} as '{}'", namespace, guard.id(), alias);
                self.instances.insert(alias.clone(), guard);
            }
            Step::Release { alias } => {
                let guard = self
                    .instances
                    .remove(alias)
                    .with_context(|| format!("Unknown alias '{}'", alias))?;
                info!("Releasing {}/{} ('{}')", guard.namespace(), guard.id(), alias);
                guard.release()?;
            }
            Step::Register { namespace, seeds } => {
                self.ensure_configured(namespace)?;
                self.store
                    .dispatch(register_request(namespace, InstanceKey::Many(seeds.clone())))?;
            }
            Step::Unregister { namespace, ids } => {
                self.ensure_configured(namespace)?;
                let key = ids.iter().map(|id| (id.clone(), Value::Null)).collect();
                self.store
                    .dispatch(unregister_request(namespace, InstanceKey::Many(key)))?;
            }
            Step::Dispatch {
                alias,
                namespace,
                instance,
                kind,
                payload,
            } => {
                let action = Action::new(kind.as_str()).with_payload(payload.clone());
                match alias {
                    Some(alias) => self.guard(alias)?.dispatch(action)?,
                    None if namespace.is_none() && instance.is_none() => {
                        self.store.dispatch(action)?
                    }
                    None => {
                        let request = self.augmenter.augment(
                            action.into(),
                            namespace.as_deref(),
                            instance.as_deref(),
                        )?;
                        self.store.dispatch(request)?
                    }
                }
            }
            Step::Print { alias, namespace } => return self.snapshot(alias, namespace).map(Some),
        }
        Ok(None)
    }

    /// Fails when `namespace` has no transition in this store
    fn ensure_configured(&self, namespace: &str) -> Result<()> {
        let reducer = self.store.reducer();
        if !reducer.handles(namespace) {
            anyhow::bail!(
                "Namespace '{}' is not configured (configured: {})",
                namespace,
                reducer.namespaces().collect::<Vec<_>>().join(", ")
            );
        }
        Ok(())
    }

    fn guard(&self, alias: &str) -> Result<&InstanceGuard> {
        self.instances
            .get(alias)
            .with_context(|| format!("Unknown alias '{}'", alias))
    }

    fn snapshot(&self, alias: &Option<String>, namespace: &Option<String>) -> Result<Snapshot> {
        let tree = self.store.state();
        let snapshot = match (alias, namespace) {
            (Some(alias), _) => {
                let guard = self.guard(alias)?;
                Snapshot {
                    label: format!("{}/{} ({})", guard.namespace(), guard.id(), alias),
                    value: read_slice(&tree, guard.namespace(), guard.id(), &[])
                        .cloned()
                        .unwrap_or(Value::Null),
                }
            }
            (None, Some(namespace)) => Snapshot {
                label: namespace.clone(),
                value: read_namespace(&tree, namespace)
                    .map(NamespaceState::to_json)
                    .unwrap_or(Value::Null),
            },
            (None, None) => Snapshot {
                label: "tree".to_string(),
                value: tree.to_json(),
            },
        };
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct Counting(Cell<usize>);

    impl IdSource for Counting {
        fn next_id(&self) -> String {
            let n = self.0.get();
            self.0.set(n + 1);
            format!("i{}", n)
        }
    }

    fn make_replay() -> Replay {
        Replay::new(&MuxConfig::default())
            .unwrap()
            .with_id_source(Rc::new(Counting(Cell::new(0))))
    }

    fn run(yaml: &str) -> Result<Vec<Snapshot>> {
        make_replay().run(&Scenario::from_yaml(yaml)?)
    }

    #[test]
    fn test_acquire_dispatch_print_release() {
        let snapshots = run(r#"
steps:
  - { step: acquire, namespace: counter, as: a }
  - { step: acquire, namespace: counter, as: b }
  - { step: dispatch, as: a, kind: INCREMENT, payload: { by: 5 } }
  - { step: print, as: a }
  - { step: print, namespace: counter }
  - { step: release, as: a }
  - { step: print, namespace: counter }
"#)
        .unwrap();

        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].label, "counter/i0 (a)");
        assert_eq!(snapshots[0].value, json!({"count": 5}));
        assert_eq!(
            snapshots[1].value,
            json!({"i0": {"count": 5}, "i1": {"count": 0}})
        );
        assert_eq!(snapshots[2].value, json!({"i1": {"count": 0}}));
    }

    #[test]
    fn test_untagged_dispatch_reaches_every_namespace() {
        let snapshots = run(r#"
steps:
  - { step: register, namespace: counter, seeds: { x: { count: 3 } } }
  - { step: register, namespace: toggle, seeds: { y: { on: true } } }
  - { step: dispatch, kind: RESET }
  - { step: print }
"#)
        .unwrap();

        assert_eq!(
            snapshots[0].value,
            json!({"counter": {"x": {"count": 0}}, "toggle": {"y": {"on": false}}})
        );
    }

    #[test]
    fn test_tagged_dispatch_and_bulk_unregister() {
        let snapshots = run(r#"
steps:
  - { step: register, namespace: log, seeds: { p: null, q: null } }
  - { step: dispatch, namespace: log, instance: q, kind: APPEND, payload: hello }
  - { step: print, namespace: log }
  - { step: unregister, namespace: log, ids: [p, q] }
  - { step: print, namespace: log }
"#)
        .unwrap();

        assert_eq!(
            snapshots[0].value,
            json!({"p": {"items": []}, "q": {"items": ["hello"]}})
        );
        assert_eq!(snapshots[1].value, json!({}));
    }

    #[test]
    fn test_instance_without_namespace_fails() {
        let err = run(r#"
steps:
  - { step: dispatch, instance: q, kind: APPEND }
"#)
        .unwrap_err();

        assert!(format!("{:#}", err).contains("Step 1 (dispatch) failed"));
    }

    #[test]
    fn test_lifecycle_steps_need_a_configured_namespace() {
        let err = run("steps:\n  - { step: acquire, namespace: nobody, as: a }").unwrap_err();
        assert!(format!("{:#}", err).contains("Namespace 'nobody' is not configured"));

        let err = run("steps:\n  - { step: register, namespace: nobody, seeds: { x: null } }")
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Step 1 (register) failed"));
    }

    #[test]
    fn test_counter_at_its_limit_stays_there() {
        let snapshots = run(r#"
steps:
  - { step: register, namespace: counter, seeds: { a: { count: 9223372036854775807 } } }
  - { step: dispatch, namespace: counter, instance: a, kind: INCREMENT }
  - { step: print, namespace: counter }
"#)
        .unwrap();

        assert_eq!(snapshots[0].value, json!({"a": {"count": i64::MAX}}));
    }

    #[test]
    fn test_unknown_alias_fails() {
        let err = run("steps:\n  - { step: release, as: ghost }").unwrap_err();
        assert!(format!("{:#}", err).contains("Unknown alias 'ghost'"));
    }

    #[test]
    fn test_explicit_id_is_left_in_place() {
        let mut replay = make_replay();
        let scenario = Scenario::from_yaml(
            r#"
steps:
  - { step: register, namespace: toggle, seeds: { lamp: null } }
  - { step: acquire, namespace: toggle, as: l, id: lamp }
  - { step: dispatch, as: l, kind: TOGGLE }
  - { step: release, as: l }
"#,
        )
        .unwrap();
        replay.run(&scenario).unwrap();

        let tree = replay.store().state();
        assert_eq!(read_slice(&tree, "toggle", "lamp", &["on"]), Some(&json!(true)));
    }

    #[test]
    fn test_dropping_replay_releases_held_instances() {
        let mut replay = make_replay();
        let scenario = Scenario::from_yaml("steps:\n  - { step: acquire, namespace: counter, as: a }").unwrap();
        replay.run(&scenario).unwrap();
        assert_eq!(replay.instance_id("a"), Some("i0"));

        let store = replay.store().clone();
        drop(replay);
        assert!(read_namespace(&store.state(), "counter").unwrap().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "steps:\n  - step: print").unwrap();

        let scenario = Scenario::load(file.path()).unwrap();
        assert_eq!(scenario.steps.len(), 1);
        assert_eq!(scenario.steps[0].name(), "print");
    }
}
