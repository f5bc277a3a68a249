/// A specialized [`Result`] type for watch operations.
pub type WatchResult<T = ()> = std::result::Result<T, WatchError>;

/// Failures reported by a [`Host`](crate::Host) while querying or observing the document.
///
/// The watcher never recovers from these: errors hit while `watch` is running are returned to the
/// caller, errors hit inside a mutation delivery are logged and the delivery is dropped.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    /// The query primitive rejected the selector.
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// The element observations are scoped to could not be found.
    #[error("no root element matches `{selector}`")]
    MissingRoot { selector: String },

    /// There is no window or document to watch.
    #[error("no document is available in this context")]
    NoDocument,

    /// The host refused to create or attach a mutation observer.
    #[error("failed to observe mutations: {0}")]
    Observe(String),
}

impl WatchError {
    pub(crate) fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }
}
