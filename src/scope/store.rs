//! ScopedStore - single-threaded host container for a [`ScopedReducer`]
//!
//! Holds the current [`StateTree`], applies requests strictly in dispatch
//! order, runs deferred requests against its own dispatch sink, and notifies
//! subscribers whenever a new tree version is published.

use super::error::ScopeError;
use super::lifecycle::Lifecycle;
use super::reducer::ScopedReducer;
use super::tree::StateTree;
use super::types::{Action, Dispatch, Request};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::trace;

type SubscriberFn = Rc<dyn Fn(&StateTree)>;

struct StoreInner {
    reducer: ScopedReducer,
    tree: RefCell<StateTree>,
    subscribers: RefCell<Vec<SubscriberFn>>,
    reducing: Cell<bool>,
    dispatched: Cell<u64>,
}

/// Cheaply clonable handle on one store
#[derive(Clone)]
pub struct ScopedStore {
    inner: Rc<StoreInner>,
}

impl ScopedStore {
    /// Create a store with an empty tree
    pub fn new(reducer: ScopedReducer) -> Self {
        Self::with_state(reducer, StateTree::new())
    }

    /// Create a store starting from `tree`
    pub fn with_state(reducer: ScopedReducer, tree: StateTree) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                reducer,
                tree: RefCell::new(tree),
                subscribers: RefCell::new(Vec::new()),
                reducing: Cell::new(false),
                dispatched: Cell::new(0),
            }),
        }
    }

    /// Current tree version
    pub fn state(&self) -> StateTree {
        self.inner.tree.borrow().clone()
    }

    pub fn reducer(&self) -> &ScopedReducer {
        &self.inner.reducer
    }

    /// Number of concrete actions reduced so far
    pub fn dispatch_count(&self) -> u64 {
        self.inner.dispatched.get()
    }

    /// Apply `request`
    ///
    /// Concrete actions are reduced immediately. Deferred requests run with
    /// this store's sink. Bundles must be invoked before they can be sent.
    pub fn dispatch(&self, request: impl Into<Request>) -> Result<(), ScopeError> {
        match request.into() {
            Request::Concrete(action) => self.reduce(&action),
            Request::Deferred(deferred) => deferred.run(&self.dispatcher()),
            Request::Bundle(creators) => Err(ScopeError::UndispatchableBundle {
                keys: creators.into_keys().collect(),
            }),
        }
    }

    /// Dispatch sink bound to this store
    ///
    /// Holds only a weak reference, so subscribers may keep one without
    /// creating a cycle.
    pub fn dispatcher(&self) -> Dispatch {
        let inner: Weak<StoreInner> = Rc::downgrade(&self.inner);
        Rc::new(move |request: Request| {
            let inner = inner.upgrade().ok_or(ScopeError::StoreClosed)?;
            ScopedStore { inner }.dispatch(request)
        })
    }

    /// Lifecycle controller for `namespace` bound to this store
    pub fn lifecycle(&self, namespace: impl Into<String>) -> Lifecycle {
        Lifecycle::new(namespace, self.dispatcher())
    }

    /// Subscribe to new tree versions
    ///
    /// Returns the subscriber index.
    pub fn subscribe<F>(&self, listener: F) -> usize
    where
        F: Fn(&StateTree) + 'static,
    {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        subscribers.push(Rc::new(listener));
        subscribers.len() - 1
    }

    fn reduce(&self, action: &Action) -> Result<(), ScopeError> {
        if self.inner.reducing.replace(true) {
            return Err(ScopeError::ReentrantDispatch);
        }

        let current = self.state();
        let next = self.inner.reducer.reduce(&current, action);
        self.inner.reducing.set(false);
        self.inner.dispatched.set(self.inner.dispatched.get() + 1);

        if next.ptr_eq(&current) {
            trace!("{} left the tree unchanged", action.kind);
            return Ok(());
        }

        *self.inner.tree.borrow_mut() = next.clone();

        // snapshot so listeners may subscribe or dispatch while being notified
        let subscribers: Vec<SubscriberFn> = self.inner.subscribers.borrow().clone();
        for subscriber in subscribers {
            // a listener dispatched: everyone has already seen the newer tree
            if !self.inner.tree.borrow().ptr_eq(&next) {
                break;
            }
            subscriber(&next);
        }
        Ok(())
    }
}
