//! The browser host, backed by `web_sys::Document` and `web_sys::MutationObserver`.

use js_sys::Array;
use wasm_bindgen::{prelude::Closure, JsCast, JsValue};
use web_sys::{Document, Element};

use crate::{
    Host, MutationHandler, MutationKind, MutationRecord, ObserveOptions, WatchConfig, WatchError,
    WatchResult,
};

/// Watch the current page for `selector` and run `callback` each time a matching element appears.
///
/// This is [`watch_with`](crate::watch_with) on the window's document with the default
/// [`WatchConfig`], which observes attribute and child list changes anywhere in `body`.
///
/// ```rust, ignore
/// element_watch::watch("#legacy-widget", || mount_widget(), true)?;
/// ```
pub fn watch(
    selector: impl Into<String>,
    callback: impl FnMut() + 'static,
    observe_after: bool,
) -> WatchResult {
    crate::watch_with(
        WebDocument::new()?,
        selector,
        callback,
        WatchConfig::new().observe_after(observe_after),
    )
}

/// The web-target's document host.
#[derive(Debug, Clone)]
pub struct WebDocument {
    document: Document,
}

impl WebDocument {
    /// Use the document of the current window.
    pub fn new() -> WatchResult<Self> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or(WatchError::NoDocument)?;
        Ok(Self { document })
    }

    /// Use a specific document, for example one inside an iframe.
    pub fn from_document(document: Document) -> Self {
        Self { document }
    }

    /// The wrapped document.
    pub fn document(&self) -> &Document {
        &self.document
    }
}

/// A native `MutationObserver` plus the closure it calls into.
///
/// The closure has to outlive every delivery, so it is kept next to the observer instead of being
/// forgotten.
pub struct WebObserver {
    observer: web_sys::MutationObserver,
    _handler: Closure<dyn FnMut(Array, web_sys::MutationObserver)>,
}

impl std::fmt::Debug for WebObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebObserver").finish_non_exhaustive()
    }
}

impl Host for WebDocument {
    type Node = Element;
    type Observer = WebObserver;

    fn query_selector(&self, selector: &str) -> WatchResult<Option<Element>> {
        self.document
            .query_selector(selector)
            .map_err(|err| WatchError::invalid_selector(selector, js_error_message(&err)))
    }

    fn create_observer(&self, mut handler: MutationHandler) -> WatchResult<WebObserver> {
        let closure = Closure::<dyn FnMut(Array, web_sys::MutationObserver)>::new(
            move |records: Array, _observer: web_sys::MutationObserver| {
                let batch: Vec<MutationRecord> = records
                    .iter()
                    .filter_map(|record| record.dyn_into::<web_sys::MutationRecord>().ok())
                    .filter_map(|record| convert_record(&record))
                    .collect();
                tracing::trace!(records = batch.len(), "mutation batch delivered");
                handler(batch.as_slice());
            },
        );

        let observer = web_sys::MutationObserver::new(closure.as_ref().unchecked_ref())
            .map_err(|err| WatchError::Observe(js_error_message(&err)))?;

        Ok(WebObserver {
            observer,
            _handler: closure,
        })
    }

    fn observe(
        &self,
        observer: &WebObserver,
        root: &Element,
        options: ObserveOptions,
    ) -> WatchResult {
        let init = web_sys::MutationObserverInit::new();
        init.set_attributes(options.attributes);
        init.set_child_list(options.child_list);
        init.set_subtree(options.subtree);

        observer
            .observer
            .observe_with_options(root, &init)
            .map_err(|err| WatchError::Observe(js_error_message(&err)))
    }

    fn disconnect(&self, observer: &WebObserver) {
        observer.observer.disconnect();
    }
}

fn convert_record(record: &web_sys::MutationRecord) -> Option<MutationRecord> {
    Some(MutationRecord {
        kind: MutationKind::from_type(&record.type_())?,
        added_nodes: record.added_nodes().length() as usize,
        removed_nodes: record.removed_nodes().length() as usize,
    })
}

/// Pull a readable message out of a thrown JS value, usually a `DOMException`.
fn js_error_message(err: &JsValue) -> String {
    if let Some(err) = err.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}
