use crate::{MutationRecord, ObserveOptions, WatchResult};

/// The function a [`Host`] calls with every batch of mutations delivered to an observer.
pub type MutationHandler = Box<dyn FnMut(&[MutationRecord])>;

/// A document the watcher can query and observe.
///
/// This is the seam between the watcher and the DOM. [`WebDocument`](crate::WebDocument) drives a
/// browser page through `web-sys` and [`MemoryDocument`](crate::MemoryDocument) keeps a small tree
/// in memory.
///
/// Hosts must deliver batches asynchronously relative to the mutations that caused them and never
/// while another delivery is running. Handlers are allowed to call [`Host::observe`] and
/// [`Host::disconnect`] from inside a delivery.
pub trait Host: Clone + 'static {
    /// An element of the document, used as the root observations are scoped to.
    type Node: Clone + 'static;

    /// A mutation observer. Dropping it is not enough to stop deliveries; call
    /// [`Host::disconnect`].
    type Observer: 'static;

    /// Find the first element matching `selector`.
    fn query_selector(&self, selector: &str) -> WatchResult<Option<Self::Node>>;

    /// Whether any element matches `selector`.
    fn contains(&self, selector: &str) -> WatchResult<bool> {
        Ok(self.query_selector(selector)?.is_some())
    }

    /// Create an observer that is not observing anything yet.
    fn create_observer(&self, handler: MutationHandler) -> WatchResult<Self::Observer>;

    /// Start delivering mutations of `root` to `observer`.
    fn observe(
        &self,
        observer: &Self::Observer,
        root: &Self::Node,
        options: ObserveOptions,
    ) -> WatchResult;

    /// Stop all deliveries to `observer` and discard any records it has not received yet.
    fn disconnect(&self, observer: &Self::Observer);
}
