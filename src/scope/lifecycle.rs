//! Instance lifecycle: acquire, scoped dispatch, release
//!
//! An instance is either absent from the tree or registered. `acquire`
//! registers a freshly generated id (unless the caller brings its own id, in
//! which case the caller owns registration). The returned [`InstanceGuard`]
//! unregisters exactly once, either through [`InstanceGuard::release`] or when
//! dropped.

use super::augment::Tag;
use super::error::ScopeError;
use super::types::{register_request, unregister_request, Dispatch, Request};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Source of effectively-unique instance ids
pub trait IdSource {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Dispatch sink that tags every request with (`namespace`, `instance`)
pub fn make_scoped_dispatch(namespace: &str, instance: &str, base: Dispatch) -> Dispatch {
    Rc::new(Tag::new(namespace, Some(instance))).wrap_sink(base)
}

/// Lifecycle controller for the instances of one namespace
#[derive(Clone)]
pub struct Lifecycle {
    namespace: String,
    dispatch: Dispatch,
    ids: Rc<dyn IdSource>,
}

impl Lifecycle {
    pub fn new(namespace: impl Into<String>, dispatch: Dispatch) -> Self {
        Self {
            namespace: namespace.into(),
            dispatch,
            ids: Rc::new(UuidSource),
        }
    }

    /// Use `ids` instead of random UUIDs
    pub fn with_id_source(mut self, ids: Rc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Bring an instance into existence
    ///
    /// With `explicit` the id is reused as-is and nothing is registered: the
    /// caller owns that instance's lifecycle. Otherwise a fresh id is
    /// generated and REGISTER is dispatched before returning.
    pub fn acquire(&self, explicit: Option<&str>) -> Result<InstanceGuard, ScopeError> {
        let (id, explicit) = match explicit.filter(|id| !id.is_empty()) {
            Some(id) => (id.to_string(), true),
            None => (self.ids.next_id(), false),
        };

        if !explicit {
            debug!("Acquiring {}/{}", self.namespace, id);
            (self.dispatch)(register_request(&self.namespace, id.as_str()).into())?;
        }

        Ok(InstanceGuard {
            scoped: make_scoped_dispatch(&self.namespace, &id, Rc::clone(&self.dispatch)),
            lifecycle: self.clone(),
            id,
            explicit,
            released: false,
        })
    }

    /// Tear down instance `id`; a no-op for explicitly supplied ids
    pub fn release(&self, id: &str, was_explicit: bool) -> Result<(), ScopeError> {
        if was_explicit {
            return Ok(());
        }
        debug!("Releasing {}/{}", self.namespace, id);
        (self.dispatch)(unregister_request(&self.namespace, id).into())
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// One acquired instance; releases itself when dropped
pub struct InstanceGuard {
    lifecycle: Lifecycle,
    scoped: Dispatch,
    id: String,
    explicit: bool,
    released: bool,
}

impl InstanceGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        self.lifecycle.namespace()
    }

    /// Whether the id was supplied by the caller
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Dispatch `request` tagged with this instance
    pub fn dispatch(&self, request: impl Into<Request>) -> Result<(), ScopeError> {
        (self.scoped)(request.into())
    }

    /// Tagging sink for handing to other code
    pub fn dispatcher(&self) -> Dispatch {
        Rc::clone(&self.scoped)
    }

    /// Release now and surface any dispatch error
    pub fn release(mut self) -> Result<(), ScopeError> {
        self.release_once()
    }

    fn release_once(&mut self) -> Result<(), ScopeError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.lifecycle.release(&self.id, self.explicit)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_once() {
            warn!("Failed to release {}/{}: {}", self.namespace(), self.id, e);
        }
    }
}

impl fmt::Debug for InstanceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceGuard")
            .field("namespace", &self.lifecycle.namespace)
            .field("id", &self.id)
            .field("explicit", &self.explicit)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::types::{Action, InstanceKey};
    use std::cell::{Cell, RefCell};

    /// Sequential ids: "id-0", "id-1", ...
    struct Sequence(Cell<usize>);

    impl IdSource for Sequence {
        fn next_id(&self) -> String {
            let n = self.0.get();
            self.0.set(n + 1);
            format!("id-{}", n)
        }
    }

    fn recorder() -> (Dispatch, Rc<RefCell<Vec<Action>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let sink: Dispatch = Rc::new(move |request: Request| {
            if let Request::Concrete(action) = request {
                log.borrow_mut().push(action);
            }
            Ok(())
        });
        (sink, seen)
    }

    fn lifecycle(sink: Dispatch) -> Lifecycle {
        Lifecycle::new("counter", sink).with_id_source(Rc::new(Sequence(Cell::new(0))))
    }

    #[test]
    fn test_acquire_registers_fresh_id() {
        let (sink, seen) = recorder();
        let guard = lifecycle(sink).acquire(None).unwrap();

        assert_eq!(guard.id(), "id-0");
        assert!(!guard.is_explicit());
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_register());
        assert_eq!(seen[0].meta.instance, Some(InstanceKey::from("id-0")));
        assert_eq!(seen[0].meta.namespace.as_deref(), Some("counter"));
    }

    #[test]
    fn test_explicit_id_is_not_registered_or_released() {
        let (sink, seen) = recorder();
        let guard = lifecycle(sink).acquire(Some("shared")).unwrap();
        assert_eq!(guard.id(), "shared");
        assert!(guard.is_explicit());

        guard.release().unwrap();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_drop_unregisters_exactly_once() {
        let (sink, seen) = recorder();
        {
            let _guard = lifecycle(sink).acquire(None).unwrap();
        }
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].is_unregister());
        assert_eq!(seen[1].meta.instance, Some(InstanceKey::from("id-0")));
    }

    #[test]
    fn test_release_then_drop_does_not_double_unregister() {
        let (sink, seen) = recorder();
        let guard = lifecycle(sink).acquire(None).unwrap();
        guard.release().unwrap();
        assert_eq!(seen.borrow().iter().filter(|a| a.is_unregister()).count(), 1);
    }

    #[test]
    fn test_guard_dispatch_is_tagged() {
        let (sink, seen) = recorder();
        let guard = lifecycle(sink).acquire(None).unwrap();
        guard.dispatch(Action::new("INCREMENT")).unwrap();

        let last = seen.borrow().last().cloned().unwrap();
        assert_eq!(last.kind, "INCREMENT");
        assert_eq!(last.meta.namespace.as_deref(), Some("counter"));
        assert_eq!(last.meta.instance, Some(InstanceKey::from("id-0")));
    }

    #[test]
    fn test_make_scoped_dispatch() {
        let (sink, seen) = recorder();
        let scoped = make_scoped_dispatch("toggle", "x", sink);
        scoped(Action::new("TOGGLE").into()).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen[0].meta.namespace.as_deref(), Some("toggle"));
        assert_eq!(seen[0].meta.instance, Some(InstanceKey::from("x")));
    }

    #[test]
    fn test_uuid_ids_are_unique() {
        let ids = UuidSource;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
