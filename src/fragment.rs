//! [`NodeFragment`] — an in-memory, lock-scoped snapshot of one node.
//!
//! Fragments are rebuilt on every operation and are never cached across
//! lock releases. After any mutation, a still-held fragment is stale and
//! must not be reused.

use crate::meta::{FileMeta, FolderMeta};
use crate::reference::{NodeReference, REFERENCE_SIZE};

/// The metadata payload of a [`NodeFragment`], without reference/parent
/// bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    File(FileMeta),
    Folder(FolderMeta),
}

impl NodeData {
    pub fn name(&self) -> &str {
        match self {
            NodeData::File(f) => &f.name,
            NodeData::Folder(f) => &f.name,
        }
    }
}

/// A fully populated, short-lived snapshot of one node: its reference, its
/// metadata, an optional link to its parent's own fragment, and the byte
/// length of its own on-disk record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFragment {
    pub reference: NodeReference,
    pub data: NodeData,
    /// `None` for the root; the root's "parent" is logically itself. No
    /// cyclic ownership graph is built — [`NodeFragment::parent`] returns
    /// `self` when this is `None`.
    pub parent: Option<Box<NodeFragment>>,
    /// Length, in bytes, of this node's own on-disk metadata record plus
    /// the 9 bytes its reference occupies.
    pub meta_size_bytes: i64,
}

impl NodeFragment {
    /// The node's logical parent: the linked parent fragment, or `self`
    /// for the root.
    pub fn parent(&self) -> &NodeFragment {
        self.parent.as_deref().unwrap_or(self)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn name(&self) -> &str {
        self.data.name()
    }

    pub fn as_folder(&self) -> Option<&FolderMeta> {
        match &self.data {
            NodeData::Folder(f) => Some(f),
            NodeData::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileMeta> {
        match &self.data {
            NodeData::File(f) => Some(f),
            NodeData::Folder(_) => None,
        }
    }

    /// `meta_size_bytes + children_used_space - children_count * 9` for
    /// folders (avoids double-counting child references that appear both
    /// in this node's own record and in descendants' `total_size_bytes`);
    /// plain `meta_size_bytes` for files. Load-bearing for defragmentation's
    /// threshold check — must be preserved exactly.
    pub fn total_size_bytes(&self) -> i64 {
        match &self.data {
            NodeData::File(_) => self.meta_size_bytes,
            NodeData::Folder(f) => {
                self.meta_size_bytes + f.children_used_space
                    - (f.children_count() as i64) * REFERENCE_SIZE
            }
        }
    }
}
