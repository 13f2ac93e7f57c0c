//! Request tagging
//!
//! Attaches the namespace and instance tags to a request. Concrete actions
//! get their metadata merged; bundles get every creator wrapped; deferred
//! requests get their dispatch sink wrapped so that whatever they issue later
//! is tagged too, however deeply nested.

use super::error::{Diagnostics, ScopeError};
use super::types::{Action, Creator, Deferred, Dispatch, InstanceKey, Request};
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A bound creator: builds its request and dispatches it in one call
pub type Bound = Rc<dyn Fn(Value) -> Result<(), ScopeError>>;

/// Tagging entry point with a fixed diagnostics mode
#[derive(Debug, Clone, Copy, Default)]
pub struct Augmenter {
    diagnostics: Diagnostics,
}

impl Augmenter {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self { diagnostics }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    /// Tag `request` with `namespace` and `instance`
    ///
    /// A `None` namespace is a caller bug and fails. Empty strings are legal
    /// but are not written, so callers can leave either tag out.
    pub fn augment(
        &self,
        request: Request,
        namespace: Option<&str>,
        instance: Option<&str>,
    ) -> Result<Request, ScopeError> {
        let namespace = namespace.ok_or_else(|| self.diagnostics.missing_namespace())?;
        Ok(Rc::new(Tag::new(namespace, instance)).apply(request))
    }

    /// Tag every creator of `creators` and bind it to `dispatch`
    pub fn bind_creators(
        &self,
        creators: BTreeMap<String, Creator>,
        namespace: Option<&str>,
        instance: Option<&str>,
        dispatch: Dispatch,
    ) -> Result<BTreeMap<String, Bound>, ScopeError> {
        let namespace = namespace.ok_or_else(|| self.diagnostics.missing_namespace())?;
        let tag = Rc::new(Tag::new(namespace, instance));

        Ok(creators
            .into_iter()
            .map(|(name, creator)| {
                let wrapped = tag.wrap_creator(creator);
                let dispatch = Rc::clone(&dispatch);
                let bound: Bound = Rc::new(move |args| dispatch(wrapped(args)));
                (name, bound)
            })
            .collect())
    }
}

/// Tag `request` using the build's default diagnostics mode
pub fn augment(
    request: Request,
    namespace: Option<&str>,
    instance: Option<&str>,
) -> Result<Request, ScopeError> {
    Augmenter::default().augment(request, namespace, instance)
}

/// Tag and bind a bundle of creators using the build's default diagnostics mode
pub fn bind_creators(
    creators: BTreeMap<String, Creator>,
    namespace: Option<&str>,
    instance: Option<&str>,
    dispatch: Dispatch,
) -> Result<BTreeMap<String, Bound>, ScopeError> {
    Augmenter::default().bind_creators(creators, namespace, instance, dispatch)
}

/// The (namespace, instance) pair being applied
#[derive(Debug)]
pub(crate) struct Tag {
    namespace: Option<String>,
    instance: Option<String>,
}

impl Tag {
    pub(crate) fn new(namespace: &str, instance: Option<&str>) -> Self {
        Self {
            namespace: Some(namespace).filter(|n| !n.is_empty()).map(str::to_string),
            instance: instance.filter(|i| !i.is_empty()).map(str::to_string),
        }
    }

    pub(crate) fn apply(self: &Rc<Self>, request: Request) -> Request {
        match request {
            Request::Concrete(action) => Request::Concrete(self.tag_action(action)),
            Request::Bundle(creators) => Request::Bundle(
                creators
                    .into_iter()
                    .map(|(name, creator)| (name, self.wrap_creator(creator)))
                    .collect(),
            ),
            Request::Deferred(deferred) => {
                let tag = Rc::clone(self);
                Request::Deferred(Deferred::new(move |sink| {
                    deferred.run(&tag.wrap_sink(Rc::clone(sink)))
                }))
            }
        }
    }

    /// Existing metadata wins except for the two tags, which are overwritten
    fn tag_action(&self, mut action: Action) -> Action {
        if let Some(namespace) = &self.namespace {
            action.meta.namespace = Some(namespace.clone());
        }
        if let Some(instance) = &self.instance {
            action.meta.instance = Some(InstanceKey::One(instance.clone()));
        }
        action
    }

    fn wrap_creator(self: &Rc<Self>, creator: Creator) -> Creator {
        let tag = Rc::clone(self);
        Rc::new(move |args| tag.apply(creator(args)))
    }

    /// Sink that tags everything before handing it to `sink`
    pub(crate) fn wrap_sink(self: &Rc<Self>, sink: Dispatch) -> Dispatch {
        let tag = Rc::clone(self);
        Rc::new(move |request| sink(tag.apply(request)))
    }
}
