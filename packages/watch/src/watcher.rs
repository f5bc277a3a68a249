use std::{
    cell::{Cell, OnceCell, RefCell},
    rc::Rc,
};

use crate::{
    batch::{has_added_nodes, has_removed_nodes},
    Host, MutationHandler, MutationRecord, ObserveOptions, WatchConfig, WatchError, WatchResult,
};

/// Watch `selector` in `host` and run `callback` every time a matching element appears.
///
/// If a matching element already exists the callback runs before this function returns, even when
/// the root element turns out to be missing afterwards. After that
/// an observer on the root element waits for batches that add nodes and re-queries the selector.
/// Once the element is found the callback runs, the observer is released, and (with
/// [`WatchConfig::observe_after`]) a second observer waits for the element to be removed before the
/// first one is armed again.
///
/// The watcher lives for as long as the host keeps its observers alive. There is no handle to stop
/// it early.
///
/// # Errors
///
/// Fails if the selector is rejected by the host, if the root element is missing, or if the host
/// cannot create or attach an observer. Failures during later deliveries are logged instead.
pub fn watch_with<H: Host>(
    host: H,
    selector: impl Into<String>,
    callback: impl FnMut() + 'static,
    config: WatchConfig,
) -> WatchResult {
    let selector = selector.into();
    let mut callback: Box<dyn FnMut()> = Box::new(callback);

    let present = host.contains(&selector)?;
    if present {
        tracing::debug!(selector = %selector, "element already present, running callback");
        callback();
    }

    let root = host
        .query_selector(&config.root)?
        .ok_or_else(|| WatchError::MissingRoot {
            selector: config.root.clone(),
        })?;

    let watcher = Rc::new(ElementWatcher {
        host,
        selector,
        root,
        options: config.options,
        observe_after: config.observe_after,
        callback: RefCell::new(callback),
        appearance: OnceCell::new(),
        disappearance: OnceCell::new(),
        phase: Cell::new(Phase::Idle),
    });

    if present && config.settle_on_immediate_match {
        if watcher.observe_after {
            return watcher.arm_disappearance();
        }
        watcher.stop();
        return Ok(());
    }

    watcher.arm_appearance()
}

/// Where the watcher is in its appear/disappear cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing is observed yet.
    Idle,
    /// The appearance observer is active.
    Appearing,
    /// The disappearance observer is active.
    Disappearing,
    /// Both observers are released for good.
    Stopped,
}

/// The state shared by the appearance and disappearance observers.
///
/// Each observer's handler holds an `Rc` to this struct, and the struct holds both observers, so
/// the watcher stays alive exactly as long as the host keeps delivering to it.
struct ElementWatcher<H: Host> {
    host: H,
    selector: String,
    root: H::Node,
    options: ObserveOptions,
    observe_after: bool,
    callback: RefCell<Box<dyn FnMut()>>,
    appearance: OnceCell<H::Observer>,
    disappearance: OnceCell<H::Observer>,
    phase: Cell<Phase>,
}

impl<H: Host> ElementWatcher<H> {
    fn arm_appearance(self: &Rc<Self>) -> WatchResult {
        let observer = self.observer(&self.appearance, || {
            let watcher = Rc::clone(self);
            Box::new(move |batch: &[MutationRecord]| watcher.on_appearance(batch))
        })?;
        self.host.observe(observer, &self.root, self.options)?;
        self.phase.set(Phase::Appearing);
        tracing::debug!(selector = %self.selector, "waiting for element to appear");
        Ok(())
    }

    fn arm_disappearance(self: &Rc<Self>) -> WatchResult {
        let observer = self.observer(&self.disappearance, || {
            let watcher = Rc::clone(self);
            Box::new(move |batch: &[MutationRecord]| {
                watcher.on_disappearance(batch)
            })
        })?;
        self.host.observe(observer, &self.root, self.options)?;
        self.phase.set(Phase::Disappearing);
        tracing::debug!(selector = %self.selector, "waiting for element to disappear");
        Ok(())
    }

    /// Get the observer in `slot`, creating it on first use. Observers are reused across cycles.
    fn observer<'a>(
        &self,
        slot: &'a OnceCell<H::Observer>,
        handler: impl FnOnce() -> MutationHandler,
    ) -> WatchResult<&'a H::Observer> {
        if let Some(observer) = slot.get() {
            return Ok(observer);
        }
        let observer = self.host.create_observer(handler())?;
        Ok(slot.get_or_init(|| observer))
    }

    fn on_appearance(self: &Rc<Self>, batch: &[MutationRecord]) {
        if self.phase.get() != Phase::Appearing {
            tracing::trace!(phase = ?self.phase.get(), "appearance batch outside its phase");
            return;
        }

        if !has_added_nodes(batch) {
            tracing::trace!(records = batch.len(), "batch added no nodes");
            return;
        }

        if !self.is_present() {
            tracing::trace!(selector = %self.selector, "element not present yet");
            return;
        }

        self.run_callback();

        if let Some(observer) = self.appearance.get() {
            self.host.disconnect(observer);
        }

        if !self.observe_after {
            self.stop();
            return;
        }

        if let Err(err) = self.arm_disappearance() {
            tracing::error!(selector = %self.selector, %err, "failed to watch for removal");
            self.stop();
        }
    }

    fn on_disappearance(self: &Rc<Self>, batch: &[MutationRecord]) {
        if self.phase.get() != Phase::Disappearing {
            tracing::trace!(phase = ?self.phase.get(), "disappearance batch outside its phase");
            return;
        }

        if !has_removed_nodes(batch) {
            tracing::trace!(records = batch.len(), "batch removed no nodes");
            return;
        }

        match self.host.contains(&self.selector) {
            Ok(false) => {}
            Ok(true) => {
                tracing::trace!(selector = %self.selector, "element still present");
                return;
            }
            Err(err) => {
                tracing::error!(selector = %self.selector, %err, "failed to query element");
                return;
            }
        }

        if let Some(observer) = self.disappearance.get() {
            self.host.disconnect(observer);
        }

        if let Err(err) = self.arm_appearance() {
            tracing::error!(selector = %self.selector, %err, "failed to re-arm appearance");
            self.stop();
        }
    }

    /// Re-query the selector from inside a delivery. Errors count as "not present".
    fn is_present(&self) -> bool {
        match self.host.contains(&self.selector) {
            Ok(present) => present,
            Err(err) => {
                tracing::error!(selector = %self.selector, %err, "failed to query element");
                false
            }
        }
    }

    // Only called from the appearance handler, which a host never re-enters.
    fn run_callback(&self) {
        tracing::debug!(selector = %self.selector, "element found, running callback");
        (*self.callback.borrow_mut())();
    }

    fn stop(&self) {
        self.phase.set(Phase::Stopped);
        tracing::debug!(selector = %self.selector, "stopped watching");
    }
}
