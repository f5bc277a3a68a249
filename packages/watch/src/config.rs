/// Which mutations an observer is told about.
///
/// Mirrors the `MutationObserverInit` dictionary. The default watches attribute and child list
/// changes anywhere below the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveOptions {
    pub(crate) attributes: bool,
    pub(crate) child_list: bool,
    pub(crate) subtree: bool,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            attributes: true,
            child_list: true,
            subtree: true,
        }
    }
}

impl ObserveOptions {
    /// Report attribute changes.
    pub fn attributes(mut self, attributes: bool) -> Self {
        self.attributes = attributes;
        self
    }

    /// Report children being added or removed.
    pub fn child_list(mut self, child_list: bool) -> Self {
        self.child_list = child_list;
        self
    }

    /// Report changes anywhere below the root instead of only on the root itself.
    pub fn subtree(mut self, subtree: bool) -> Self {
        self.subtree = subtree;
        self
    }

    /// Whether attribute changes are reported.
    pub fn watches_attributes(&self) -> bool {
        self.attributes
    }

    /// Whether children being added or removed are reported.
    pub fn watches_child_list(&self) -> bool {
        self.child_list
    }

    /// Whether changes below the root are reported.
    pub fn watches_subtree(&self) -> bool {
        self.subtree
    }
}

/// Configuration for a single [`watch_with`](crate::watch_with) call.
///
/// # Example
///
/// ```rust
/// use element_watch::{MemoryDocument, WatchConfig};
///
/// let document = MemoryDocument::new();
/// element_watch::watch_with(
///     document.clone(),
///     "#app",
///     || println!("mount the app"),
///     WatchConfig::new().observe_after(false),
/// )
/// .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub(crate) observe_after: bool,
    pub(crate) root: String,
    pub(crate) options: ObserveOptions,
    pub(crate) settle_on_immediate_match: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            observe_after: true,
            root: "body".to_string(),
            options: ObserveOptions::default(),
            settle_on_immediate_match: false,
        }
    }
}

impl WatchConfig {
    /// Create a new config with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep watching after the callback fires.
    ///
    /// When enabled (the default) the watcher waits for the element to leave the document and then
    /// starts looking for it again, so the callback runs once per appearance. When disabled the
    /// callback runs at most once from a mutation.
    pub fn observe_after(mut self, observe_after: bool) -> Self {
        self.observe_after = observe_after;
        self
    }

    /// Set the selector of the element all observations are scoped to. Defaults to `body`.
    pub fn root(mut self, selector: impl Into<String>) -> Self {
        self.root = selector.into();
        self
    }

    /// Set which mutations the observers listen for.
    pub fn options(mut self, options: ObserveOptions) -> Self {
        self.options = options;
        self
    }

    /// Treat an element that is already present when `watch` is called as a completed appearance.
    ///
    /// By default the appearance observer is armed even after the immediate callback, so the next
    /// batch that adds any node while the element is still present runs the callback again. With
    /// this enabled the watcher skips straight to waiting for the element to disappear, or stops if
    /// [`observe_after`](Self::observe_after) is off.
    pub fn settle_on_immediate_match(mut self, settle: bool) -> Self {
        self.settle_on_immediate_match = settle;
        self
    }

    /// Whether the watcher keeps going after the callback fires.
    pub fn observes_after(&self) -> bool {
        self.observe_after
    }

    /// The selector of the element observations are scoped to.
    pub fn root_selector(&self) -> &str {
        &self.root
    }

    /// The mutations the observers listen for.
    pub fn observe_options(&self) -> ObserveOptions {
        self.options
    }
}
