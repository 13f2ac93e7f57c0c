//! scopemux - scoped-state multiplexer
//!
//! Lets one transition function back many simultaneous instances. Each
//! instance is addressed by a namespace (the kind of component) and an
//! instance id (the handle of one occurrence). Requests tagged with both are
//! routed to that instance's private slice of the state tree; register and
//! unregister requests create and remove slices.

pub mod config;
pub mod replay;
pub mod scope;

pub use config::MuxConfig;
pub use scope::{
    augment, list_instance_ids, make_scoped_dispatch, read_namespace, read_slice, Action,
    Augmenter, Deferred, Diagnostics, Dispatch, InstanceGuard, InstanceKey, Lifecycle, Meta,
    NamespaceState, Request, ScopeError, ScopedReducer, ScopedStore, StateTree, Transition,
};
