#![doc = include_str!("../README.md")]

//! ## Lifecycle
//! ------------
//! A watcher alternates between two observers that are never active at the same time:
//!
//! - the **appearance** observer waits for a batch that adds nodes, re-queries the selector, and
//!   runs the callback once it matches;
//! - the **disappearance** observer, armed only when
//!   [`WatchConfig::observe_after`] is set, waits for a batch that removes nodes and re-arms the
//!   appearance observer once the selector no longer matches.
//!
//! Both observers are attached to the same root (`body` by default) with the same
//! [`ObserveOptions`].

mod batch;
mod config;
mod error;
mod host;
mod memory;
mod selector;
mod watcher;

#[cfg(feature = "web")]
mod web;

pub use batch::{
    additions, has_added_nodes, has_removed_nodes, removals, MutationKind, MutationRecord,
};
pub use config::{ObserveOptions, WatchConfig};
pub use error::{WatchError, WatchResult};
pub use host::{Host, MutationHandler};
pub use memory::{MemoryDocument, MemoryObserver, NodeId};
pub use watcher::watch_with;

#[cfg(feature = "web")]
pub use web::{watch, WebDocument, WebObserver};
