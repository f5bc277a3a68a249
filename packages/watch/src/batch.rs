//! Host-independent mutation records and the predicates the watcher runs over each batch.
//!
//! Every host converts its native records into [`MutationRecord`]s before handing a batch to the
//! watcher, so the filtering below never touches a live DOM.

/// The kind of change a [`MutationRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Children were added to or removed from the target.
    ChildList,
    /// An attribute on the target changed.
    Attributes,
    /// The text of a character data node changed.
    CharacterData,
}

impl MutationKind {
    /// Parse the `type` string of a native `MutationRecord`.
    pub fn from_type(ty: &str) -> Option<Self> {
        match ty {
            "childList" => Some(Self::ChildList),
            "attributes" => Some(Self::Attributes),
            "characterData" => Some(Self::CharacterData),
            _ => None,
        }
    }
}

/// A summary of a single mutation: what kind it was and how many nodes it added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub added_nodes: usize,
    pub removed_nodes: usize,
}

impl MutationRecord {
    /// A child list record.
    pub const fn child_list(added_nodes: usize, removed_nodes: usize) -> Self {
        Self {
            kind: MutationKind::ChildList,
            added_nodes,
            removed_nodes,
        }
    }

    /// An attribute record. These never carry nodes.
    pub const fn attributes() -> Self {
        Self {
            kind: MutationKind::Attributes,
            added_nodes: 0,
            removed_nodes: 0,
        }
    }

    /// Whether this record added at least one node.
    pub const fn added_any(&self) -> bool {
        self.added_nodes > 0
    }

    /// Whether this record removed at least one node.
    pub const fn removed_any(&self) -> bool {
        self.removed_nodes > 0
    }
}

/// The records of a batch that added at least one node.
pub fn additions(batch: &[MutationRecord]) -> impl Iterator<Item = &MutationRecord> {
    batch.iter().filter(|record| record.added_any())
}

/// The records of a batch that removed at least one node.
pub fn removals(batch: &[MutationRecord]) -> impl Iterator<Item = &MutationRecord> {
    batch.iter().filter(|record| record.removed_any())
}

/// Whether any record in the batch added a node.
pub fn has_added_nodes(batch: &[MutationRecord]) -> bool {
    additions(batch).next().is_some()
}

/// Whether any record in the batch removed a node.
pub fn has_removed_nodes(batch: &[MutationRecord]) -> bool {
    removals(batch).next().is_some()
}
