//! Scope module - namespace/instance multiplexing of transition functions
//!
//! A single transition function registered under a namespace is instantiated
//! once per live instance id. This module provides the request tagging, the
//! composed reducer that routes tagged requests to the right slice, and the
//! lifecycle controller that registers and unregisters instances.

mod accessor;
mod augment;
mod error;
pub mod keys;
mod lifecycle;
mod reducer;
mod store;
mod tree;
mod types;


pub use accessor::{list_instance_ids, read_namespace, read_slice, ScopedView};
pub use augment::{augment, bind_creators, Augmenter, Bound};
pub use error::{Diagnostics, ScopeError};
pub use lifecycle::{make_scoped_dispatch, IdSource, InstanceGuard, Lifecycle, UuidSource};
pub use reducer::{ScopedReducer, Transition};
pub use store::ScopedStore;
pub use tree::{NamespaceState, Slice, StateTree};
pub use types::{
    creator, register_request, unregister_request, Action, Creator, Deferred, Dispatch,
    InstanceKey, Meta, Request,
};
