//! Nodes of the content tree.

use std::time::SystemTime;

use crate::types::EntryIndex;
use crate::types::InnerPath;

/// Identifier of a node inside one [`ContentTree`](super::ContentTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The root folder of every tree.
    pub const ROOT: Self = Self(0);

    /// Returns the raw arena position.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// File or folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Regular file with data.
    File,
    /// Folder, explicit or synthesized from a path prefix.
    Folder,
}

/// A file or folder in the content tree.
///
/// Folder nodes synthesized from path prefixes have no entry index until an
/// explicit folder entry for the same path shows up.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) path: InnerPath,
    pub(crate) kind: NodeKind,
    pub(crate) size: u64,
    pub(crate) modified: Option<SystemTime>,
    pub(crate) encrypted: bool,
    pub(crate) entry: Option<EntryIndex>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl TreeNode {
    pub(crate) fn root() -> Self {
        Self::folder(NodeId::ROOT, InnerPath::default(), None)
    }

    pub(crate) fn folder(id: NodeId, path: InnerPath, parent: Option<NodeId>) -> Self {
        Self {
            id,
            name: path.file_name().to_string(),
            path,
            kind: NodeKind::Folder,
            size: 0,
            modified: None,
            encrypted: false,
            entry: None,
            parent,
            children: Vec::new(),
        }
    }

    /// Node identifier.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Last path segment; empty for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path relative to the archive root.
    #[must_use]
    pub const fn path(&self) -> &InnerPath {
        &self.path
    }

    /// File or folder.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns `true` for folders.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Returns `true` for files.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Returns `true` for the archive root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.id == NodeId::ROOT
    }

    /// Declared uncompressed size (0 for folders).
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Last modification time, when the format records one.
    #[must_use]
    pub const fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Returns `true` if the entry is individually password protected.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Index of the raw entry this node was created from.
    #[must_use]
    pub const fn entry_index(&self) -> Option<EntryIndex> {
        self.entry
    }

    /// Returns `true` for folders synthesized from path prefixes.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        self.entry.is_none() && !self.is_root()
    }

    /// Parent folder; `None` for the root and for detached nodes.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in first-seen order.
    #[must_use]
    pub fn child_ids(&self) -> &[NodeId] {
        &self.children
    }
}
