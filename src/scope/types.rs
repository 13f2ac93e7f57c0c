//! Request and metadata type definitions
//!
//! Defines concrete actions, the metadata they carry, and the `Request`
//! variant that also covers bundles of creators and deferred requests.

use super::error::ScopeError;
use super::keys::{INSTANCE_TAG, NAMESPACE_TAG, REGISTER, UNREGISTER};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Instance tag value: one id, or a map of ids to seed states (bulk register)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceKey {
    One(String),
    Many(BTreeMap<String, Value>),
}

impl InstanceKey {
    /// The id when this key names exactly one instance
    pub fn as_single(&self) -> Option<&str> {
        match self {
            InstanceKey::One(id) => Some(id),
            InstanceKey::Many(_) => None,
        }
    }

    /// Every instance id named by this key
    pub fn ids(&self) -> Vec<&str> {
        match self {
            InstanceKey::One(id) => vec![id.as_str()],
            InstanceKey::Many(seeds) => seeds.keys().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for InstanceKey {
    fn from(id: &str) -> Self {
        InstanceKey::One(id.to_string())
    }
}

impl From<String> for InstanceKey {
    fn from(id: String) -> Self {
        InstanceKey::One(id)
    }
}

impl From<InstanceKey> for Value {
    fn from(key: InstanceKey) -> Self {
        match key {
            InstanceKey::One(id) => Value::String(id),
            InstanceKey::Many(seeds) => Value::Object(seeds.into_iter().collect()),
        }
    }
}

/// Request metadata
///
/// Holds the two well-known tags plus any caller-defined entries. On the wire
/// this is a single JSON object keyed by [`NAMESPACE_TAG`] / [`INSTANCE_TAG`];
/// every other key is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Meta {
    /// Target namespace
    pub namespace: Option<String>,
    /// Target instance(s)
    pub instance: Option<InstanceKey>,
    /// Caller-defined metadata
    pub extra: Map<String, Value>,
}

impl Meta {
    /// True when no tag and no caller metadata is present
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none() && self.instance.is_none() && self.extra.is_empty()
    }

    /// Set one entry by its wire key
    ///
    /// The reserved tag keys set the typed tags, so a tag never lands in
    /// `extra`. A tag value of the wrong shape (or `null`) clears that tag.
    pub fn insert(&mut self, key: String, value: Value) {
        match key.as_str() {
            NAMESPACE_TAG => self.namespace = value.as_str().map(str::to_string),
            INSTANCE_TAG => self.instance = serde_json::from_value(value).ok(),
            _ => {
                self.extra.insert(key, value);
            }
        }
    }
}

impl TryFrom<Map<String, Value>> for Meta {
    type Error = serde_json::Error;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let namespace = map
            .remove(NAMESPACE_TAG)
            .map(serde_json::from_value::<String>)
            .transpose()?;
        let instance = map
            .remove(INSTANCE_TAG)
            .map(serde_json::from_value::<InstanceKey>)
            .transpose()?;

        Ok(Self {
            namespace,
            instance,
            extra: map,
        })
    }
}

impl From<Meta> for Map<String, Value> {
    fn from(meta: Meta) -> Self {
        let mut map = meta.extra;
        if let Some(namespace) = meta.namespace {
            map.insert(NAMESPACE_TAG.to_string(), Value::String(namespace));
        }
        if let Some(instance) = meta.instance {
            map.insert(INSTANCE_TAG.to_string(), instance.into());
        }
        map
    }
}

/// A concrete request: a kind, an optional payload, and metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
            meta: Meta::default(),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attach metadata (kept verbatim through tagging); see [`Meta::insert`]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn is_register(&self) -> bool {
        self.kind == REGISTER
    }

    pub fn is_unregister(&self) -> bool {
        self.kind == UNREGISTER
    }
}

/// Build a REGISTER request for `key` under `namespace`
pub fn register_request(namespace: &str, key: impl Into<InstanceKey>) -> Action {
    let mut action = Action::new(REGISTER);
    action.meta.namespace = Some(namespace.to_string());
    action.meta.instance = Some(key.into());
    action
}

/// Build an UNREGISTER request for `key` under `namespace`
pub fn unregister_request(namespace: &str, key: impl Into<InstanceKey>) -> Action {
    let mut action = Action::new(UNREGISTER);
    action.meta.namespace = Some(namespace.to_string());
    action.meta.instance = Some(key.into());
    action
}

/// Dispatch sink: accepts a request and forwards it towards the store
pub type Dispatch = Rc<dyn Fn(Request) -> Result<(), ScopeError>>;

/// Request producer: turns caller arguments into a request
pub type Creator = Rc<dyn Fn(Value) -> Request>;

/// Wrap a closure as a [`Creator`]
pub fn creator<F>(f: F) -> Creator
where
    F: Fn(Value) -> Request + 'static,
{
    Rc::new(f)
}

/// A deferred request: runs later against a dispatch sink and may issue any
/// number of further requests through it
#[derive(Clone)]
pub struct Deferred(Rc<dyn Fn(&Dispatch) -> Result<(), ScopeError>>);

impl Deferred {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Dispatch) -> Result<(), ScopeError> + 'static,
    {
        Self(Rc::new(f))
    }

    /// Run the deferred body against `sink`
    pub fn run(&self, sink: &Dispatch) -> Result<(), ScopeError> {
        (self.0)(sink)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

/// Anything that can be tagged with a namespace and instance
#[derive(Clone)]
pub enum Request {
    /// A plain action, reduced directly
    Concrete(Action),
    /// Named creators; each produces a request when invoked
    Bundle(BTreeMap<String, Creator>),
    /// A body that issues requests through the sink it is given
    Deferred(Deferred),
}

impl Request {
    /// The action inside a concrete request
    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Request::Concrete(action) => Some(action),
            _ => None,
        }
    }

    /// Invoke the creator `name` of a bundle
    pub fn invoke(&self, name: &str, args: Value) -> Option<Request> {
        match self {
            Request::Bundle(creators) => creators.get(name).map(|c| c(args)),
            _ => None,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Concrete(action) => f.debug_tuple("Concrete").field(action).finish(),
            Request::Bundle(creators) => f
                .debug_tuple("Bundle")
                .field(&creators.keys().collect::<Vec<_>>())
                .finish(),
            Request::Deferred(deferred) => fmt::Debug::fmt(deferred, f),
        }
    }
}

impl From<Action> for Request {
    fn from(action: Action) -> Self {
        Request::Concrete(action)
    }
}

impl From<Deferred> for Request {
    fn from(deferred: Deferred) -> Self {
        Request::Deferred(deferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_meta_wire_format_keeps_caller_keys() {
        let raw = json!({
            "kind": "INCREMENT",
            "meta": {
                "@@scopemux/NAMESPACE": "counter",
                "@@scopemux/INSTANCE": "a",
                "trace": 42
            }
        });

        let action: Action = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(action.meta.namespace.as_deref(), Some("counter"));
        assert_eq!(action.meta.instance, Some(InstanceKey::from("a")));
        assert_eq!(action.meta.extra.get("trace"), Some(&json!(42)));

        assert_eq!(serde_json::to_value(&action).unwrap(), raw);
    }

    #[test]
    fn test_reserved_meta_keys_set_the_tags() {
        let action = Action::new("INCREMENT")
            .with_meta(NAMESPACE_TAG, json!("counter"))
            .with_meta(INSTANCE_TAG, json!("a"))
            .with_meta("trace", json!(1));

        assert_eq!(action.meta.namespace.as_deref(), Some("counter"));
        assert_eq!(action.meta.instance, Some(InstanceKey::from("a")));
        assert_eq!(action.meta.extra.len(), 1);

        let wire = serde_json::to_value(&action).unwrap();
        let back: Action = serde_json::from_value(wire).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_reserved_meta_key_of_wrong_shape_clears_the_tag() {
        let action = Action::new("X")
            .with_meta(NAMESPACE_TAG, json!("counter"))
            .with_meta(NAMESPACE_TAG, json!(7));

        assert_eq!(action.meta.namespace, None);
        assert!(action.meta.extra.is_empty());
        assert_eq!(serde_json::to_value(&action).unwrap(), json!({"kind": "X"}));
    }

    #[test]
    fn test_bulk_instance_key_parses_as_many() {
        let key: InstanceKey = serde_json::from_value(json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(key.as_single(), None);
        assert_eq!(key.ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_non_string_namespace_is_rejected() {
        let raw = json!({"kind": "X", "meta": {"@@scopemux/NAMESPACE": 7}});
        assert!(serde_json::from_value::<Action>(raw).is_err());
    }

    #[test]
    fn test_lifecycle_constructors() {
        let reg = register_request("counter", "a");
        assert!(reg.is_register());
        assert_eq!(reg.meta.namespace.as_deref(), Some("counter"));

        let unreg = unregister_request("counter", "a");
        assert!(unreg.is_unregister());
        assert_eq!(unreg.meta.instance, Some(InstanceKey::from("a")));
    }

    #[test]
    fn test_bundle_invoke() {
        let mut creators = BTreeMap::new();
        creators.insert(
            "add".to_string(),
            creator(|args| Action::new("ADD").with_payload(args).into()),
        );
        let bundle = Request::Bundle(creators);

        let produced = bundle.invoke("add", json!(3)).unwrap();
        assert_eq!(produced.as_action().unwrap().payload, json!(3));
        assert!(bundle.invoke("missing", Value::Null).is_none());
    }
}
