use std::{cell::RefCell, rc::Rc};

use slab::Slab;

use crate::{
    selector::{SelectorElement, SelectorList},
    Host, MutationHandler, MutationKind, MutationRecord, ObserveOptions, WatchError, WatchResult,
};

/// An element in a [`MemoryDocument`].
///
/// Ids are only meaningful to the document that created them. Every [`MemoryDocument`] method that
/// takes a `NodeId` panics if the id is unknown to that document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct ObserverEntry {
    handler: Rc<RefCell<MutationHandler>>,
    registration: Option<(NodeId, ObserveOptions)>,
    pending: Vec<MutationRecord>,
}

struct DocumentState {
    nodes: Slab<NodeData>,
    observers: Slab<ObserverEntry>,
    html: NodeId,
    body: NodeId,
}

impl DocumentState {
    fn node(&self, id: NodeId) -> &NodeData {
        self.nodes
            .get(id.0)
            .unwrap_or_else(|| panic!("{id:?} does not belong to this document"))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.nodes
            .get_mut(id.0)
            .unwrap_or_else(|| panic!("{id:?} does not belong to this document"))
    }

    fn insert(&mut self, tag: &str) -> NodeId {
        NodeId(self.nodes.insert(NodeData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
        }))
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.node_mut(node).parent.take()?;
        self.node_mut(parent).children.retain(|&child| child != node);
        Some(parent)
    }

    /// `ancestor` is `node` or one of its ancestors.
    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).parent;
        }
        false
    }

    /// Queue `record` for every observer interested in mutations of `target`.
    fn queue(&mut self, target: NodeId, record: MutationRecord) {
        let interested: Vec<usize> = self
            .observers
            .iter()
            .filter(|(_, observer)| match observer.registration {
                Some((root, options)) => {
                    let wants_kind = match record.kind {
                        MutationKind::ChildList => options.child_list,
                        MutationKind::Attributes => options.attributes,
                        MutationKind::CharacterData => false,
                    };
                    let covers_target = root == target
                        || (options.subtree && self.is_inclusive_ancestor(root, target));
                    wants_kind && covers_target
                }
                None => false,
            })
            .map(|(key, _)| key)
            .collect();

        for key in interested {
            self.observers[key].pending.push(record);
        }
    }

    /// Walk the connected tree in document order.
    fn first_match(&self, selector: &SelectorList) -> Option<NodeId> {
        let mut stack = vec![self.html];
        while let Some(id) = stack.pop() {
            if selector.matches(&NodeRef { state: self, id }) {
                return Some(id);
            }
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        None
    }
}

#[derive(Clone, Copy)]
struct NodeRef<'a> {
    state: &'a DocumentState,
    id: NodeId,
}

impl SelectorElement for NodeRef<'_> {
    fn local_name(&self) -> &str {
        &self.state.node(self.id).tag
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.state
            .node(self.id)
            .attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }

    fn parent_element(&self) -> Option<Self> {
        self.state.node(self.id).parent.map(|id| NodeRef {
            state: self.state,
            id,
        })
    }
}

/// A mutation observer registered with a [`MemoryDocument`].
#[derive(Debug)]
pub struct MemoryObserver {
    key: usize,
}

/// A [`Host`] that keeps its element tree in memory.
///
/// Mutations queue records on interested observers right away, but nothing is delivered until
/// [`MemoryDocument::flush`] runs, which plays the part of the browser's microtask checkpoint. This
/// makes it possible to drive a watcher through exact sequences of batches in tests or outside a
/// browser.
///
/// Cloning the document is cheap and every clone shares the same tree.
///
/// # Panics
///
/// Methods taking a [`NodeId`] panic when given an id created by a different document.
///
/// ```rust
/// use element_watch::MemoryDocument;
///
/// let document = MemoryDocument::new();
/// let app = document.create_element_with_attributes("div", &[("id", "app")]);
/// document.append_child(document.body(), app);
///
/// assert_eq!(document.query_selector("body > #app").unwrap(), Some(app));
/// ```
#[derive(Clone)]
pub struct MemoryDocument {
    state: Rc<RefCell<DocumentState>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryDocument")
            .field("nodes", &state.nodes.len())
            .field("observers", &state.observers.len())
            .finish()
    }
}

impl MemoryDocument {
    /// Create a document containing an empty `html > head, body` skeleton.
    pub fn new() -> Self {
        let mut state = DocumentState {
            nodes: Slab::new(),
            observers: Slab::new(),
            html: NodeId(0),
            body: NodeId(0),
        };
        let html = state.insert("html");
        let head = state.insert("head");
        let body = state.insert("body");
        state.attach(html, head);
        state.attach(html, body);
        state.html = html;
        state.body = body;

        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// The root `html` element.
    pub fn document_element(&self) -> NodeId {
        self.state.borrow().html
    }

    /// The `body` element.
    pub fn body(&self) -> NodeId {
        self.state.borrow().body
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.state.borrow_mut().insert(tag)
    }

    /// Create a detached element with the given attributes already set.
    pub fn create_element_with_attributes(
        &self,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> NodeId {
        let mut state = self.state.borrow_mut();
        let id = state.insert(tag);
        state.node_mut(id).attributes = attributes
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
            .collect();
        id
    }

    /// The value of attribute `name` on `node`, if set.
    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.state
            .borrow()
            .node(node)
            .attributes
            .iter()
            .find(|(attr, _)| *attr == name)
            .map(|(_, value)| value.clone())
    }

    /// Set attribute `name` on `node` and queue an attribute record.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let mut state = self.state.borrow_mut();
        let attributes = &mut state.node_mut(node).attributes;
        match attributes.iter_mut().find(|(attr, _)| *attr == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attributes.push((name, value.to_string())),
        }
        state.queue(node, MutationRecord::attributes());
    }

    /// Remove attribute `name` from `node`, queuing an attribute record if it was set.
    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        let mut state = self.state.borrow_mut();
        let attributes = &mut state.node_mut(node).attributes;
        let before = attributes.len();
        attributes.retain(|(attr, _)| *attr != name);
        if attributes.len() != before {
            state.queue(node, MutationRecord::attributes());
        }
    }

    /// Append `child` as the last child of `parent`, moving it out of its current parent first.
    ///
    /// # Panics
    ///
    /// Panics if `child` is `parent` or one of its ancestors.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut state = self.state.borrow_mut();
        assert!(
            !state.is_inclusive_ancestor(child, parent),
            "cannot append {child:?} to its own descendant {parent:?}"
        );

        if let Some(old_parent) = state.detach(child) {
            state.queue(old_parent, MutationRecord::child_list(0, 1));
        }
        state.attach(parent, child);
        state.queue(parent, MutationRecord::child_list(1, 0));
    }

    /// Detach `node` from its parent. The node and its subtree stay valid and can be re-appended.
    pub fn remove(&self, node: NodeId) {
        let mut state = self.state.borrow_mut();
        if let Some(parent) = state.detach(node) {
            state.queue(parent, MutationRecord::child_list(0, 1));
        }
    }

    /// Whether `node` is part of the document tree.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let state = self.state.borrow();
        state.is_inclusive_ancestor(state.html, node)
    }

    /// Find the first connected element matching `selector`, in document order.
    pub fn query_selector(&self, selector: &str) -> WatchResult<Option<NodeId>> {
        let selector = SelectorList::parse(selector)?;
        Ok(self.state.borrow().first_match(&selector))
    }

    /// How many observers are currently attached to a node.
    pub fn active_observers(&self) -> usize {
        self.state
            .borrow()
            .observers
            .iter()
            .filter(|(_, observer)| observer.registration.is_some())
            .count()
    }

    /// How many records are queued and not yet delivered.
    pub fn pending_records(&self) -> usize {
        self.state
            .borrow()
            .observers
            .iter()
            .map(|(_, observer)| observer.pending.len())
            .sum()
    }

    /// Deliver every queued record, returning how many batches were delivered.
    ///
    /// Each round visits the observers in creation order and hands each one its whole queue as a
    /// single batch. Records a handler queues for an observer later in the same round are
    /// delivered in that round, while records for its own observer or earlier ones wait for the
    /// next round. An observer disconnected by an earlier handler in the same round receives
    /// nothing. Rounds repeat until no records are left.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;

        loop {
            let keys: Vec<usize> = self
                .state
                .borrow()
                .observers
                .iter()
                .map(|(key, _)| key)
                .collect();

            let mut delivered_this_round = 0;
            for key in keys {
                let next = {
                    let mut state = self.state.borrow_mut();
                    let observer = &mut state.observers[key];
                    if observer.pending.is_empty() {
                        None
                    } else {
                        let batch = std::mem::take(&mut observer.pending);
                        Some((Rc::clone(&observer.handler), batch))
                    }
                };

                let Some((handler, batch)) = next else {
                    continue;
                };

                let Ok(mut handler) = handler.try_borrow_mut() else {
                    // flushed from inside this observer's own handler; deliver on the next flush
                    let mut state = self.state.borrow_mut();
                    let mut requeued = batch;
                    requeued.append(&mut state.observers[key].pending);
                    state.observers[key].pending = requeued;
                    continue;
                };

                tracing::trace!(observer = key, records = batch.len(), "delivering batch");
                (*handler)(batch.as_slice());
                delivered_this_round += 1;
            }

            if delivered_this_round == 0 {
                break;
            }
            delivered += delivered_this_round;
        }

        delivered
    }

    fn observer_entry<R>(
        &self,
        observer: &MemoryObserver,
        f: impl FnOnce(&mut ObserverEntry) -> R,
    ) -> WatchResult<R> {
        let mut state = self.state.borrow_mut();
        let entry = state
            .observers
            .get_mut(observer.key)
            .ok_or_else(|| WatchError::Observe("observer belongs to another document".into()))?;
        Ok(f(entry))
    }
}

impl Host for MemoryDocument {
    type Node = NodeId;
    type Observer = MemoryObserver;

    fn query_selector(&self, selector: &str) -> WatchResult<Option<NodeId>> {
        MemoryDocument::query_selector(self, selector)
    }

    fn create_observer(&self, handler: MutationHandler) -> WatchResult<MemoryObserver> {
        let key = self.state.borrow_mut().observers.insert(ObserverEntry {
            handler: Rc::new(RefCell::new(handler)),
            registration: None,
            pending: Vec::new(),
        });
        Ok(MemoryObserver { key })
    }

    fn observe(
        &self,
        observer: &MemoryObserver,
        root: &NodeId,
        options: ObserveOptions,
    ) -> WatchResult {
        if !options.child_list && !options.attributes {
            return Err(WatchError::Observe(
                "options must include child_list or attributes".into(),
            ));
        }
        if !self.state.borrow().nodes.contains(root.0) {
            return Err(WatchError::Observe(format!("{root:?} is not in this document")));
        }
        self.observer_entry(observer, |entry| {
            entry.registration = Some((*root, options));
        })
    }

    fn disconnect(&self, observer: &MemoryObserver) {
        let result = self.observer_entry(observer, |entry| {
            entry.registration = None;
            entry.pending.clear();
        });
        if let Err(err) = result {
            tracing::warn!(observer = observer.key, %err, "cannot disconnect observer");
        }
    }
}
