//! Hierarchical content tree of an archive.
//!
//! The tree is built once per session by draining an
//! [`EntryEnumerator`](crate::formats::traits::EntryEnumerator). Every raw
//! entry gets an [`EntryIndex`] equal to its position in enumeration order,
//! and the `index -> node` table never changes afterwards.
//!
//! # Duplicate paths
//!
//! Paths are matched case-sensitively and the first node created for a path
//! wins:
//!
//! - a folder synthesized from a path prefix and a later explicit folder entry
//!   for the same path are the same node; the node adopts the entry's index
//!   and modification time;
//! - any other repeated path keeps the first node and its metadata; the later
//!   entry's index maps to that same node;
//! - an entry whose path runs through an existing file gets a detached node,
//!   reachable by index but not from the root.
//!
//! # Examples
//!
//! ```
//! use arctree_core::NeverCancel;
//! use arctree_core::SessionConfig;
//! use arctree_core::test_utils::MemoryArchive;
//! use arctree_core::formats::traits::ArchiveFormat;
//! use arctree_core::tree::ContentTree;
//!
//! # fn main() -> arctree_core::Result<()> {
//! let mut archive = MemoryArchive::builder()
//!     .file("a.txt", b"a")
//!     .file("dir/b.txt", b"b")
//!     .build();
//! let tree = ContentTree::build(
//!     archive.entries()?,
//!     "demo.zip",
//!     &SessionConfig::default(),
//!     &NeverCancel,
//! )?;
//! assert_eq!(tree.entry_count(), 2);
//! assert!(tree.find("dir").is_some_and(|n| n.is_folder()));
//! # Ok(())
//! # }
//! ```

mod node;

pub use node::NodeId;
pub use node::NodeKind;
pub use node::TreeNode;

use std::collections::HashMap;
use std::ops::Deref;
use std::ops::DerefMut;

use crate::ArchiveError;
use crate::Result;
use crate::SessionConfig;
use crate::cancel::CancellationSource;
use crate::error::QuotaResource;
use crate::formats::traits::EntryEnumerator;
use crate::formats::traits::EntryMetadata;
use crate::types::EntryIndex;
use crate::types::InnerPath;
use crate::types::inner_path::honors_separator_contract;

/// Runs the enumerator's finalize hook exactly once, on every exit path.
struct FinishOnDrop<'a>(Box<dyn EntryEnumerator + 'a>);

impl<'a> Deref for FinishOnDrop<'a> {
    type Target = dyn EntryEnumerator + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl DerefMut for FinishOnDrop<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.0
    }
}

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Files and folders of one archive, indexed by entry position.
#[derive(Debug, Clone)]
pub struct ContentTree {
    display_root: String,
    nodes: Vec<TreeNode>,
    by_path: HashMap<InnerPath, NodeId>,
    by_index: Vec<NodeId>,
    duplicates: usize,
}

impl ContentTree {
    /// Builds the tree by draining `entries` exactly once.
    ///
    /// `display_root` is the human-readable location of the archive, used to
    /// build display paths (for nested archives, the path through the
    /// enclosing archives).
    ///
    /// # Errors
    ///
    /// - `Corrupt` if the enumerator reports an unreadable container
    /// - `QuotaExceeded` if the archive has more than `max_entry_count` entries
    /// - `Cancelled` if `cancel` fires between entries
    ///
    /// The enumerator's finalize hook runs in every case.
    pub fn build<'a>(
        entries: Box<dyn EntryEnumerator + 'a>,
        display_root: impl Into<String>,
        config: &SessionConfig,
        cancel: &dyn CancellationSource,
    ) -> Result<Self> {
        let mut entries = FinishOnDrop(entries);
        let mut tree = Self::empty(display_root.into());

        loop {
            if cancel.is_cancelled() {
                log::debug!("tree construction cancelled after {} entries", tree.entry_count());
                return Err(ArchiveError::Cancelled);
            }

            let Some(next) = entries.next_entry() else {
                break;
            };
            let entry = next.map_err(|e| match e {
                ArchiveError::Corrupt(_) | ArchiveError::Cancelled => e,
                other => ArchiveError::Corrupt(format!("enumeration failed: {other}")),
            })?;

            if tree.by_index.len() >= config.max_entry_count {
                return Err(ArchiveError::QuotaExceeded {
                    resource: QuotaResource::EntryCount {
                        current: tree.by_index.len() + 1,
                        max: config.max_entry_count,
                    },
                });
            }

            tree.insert(entry.as_ref());
        }

        log::debug!(
            "built content tree for {}: {} entries, {} nodes",
            tree.display_root,
            tree.entry_count(),
            tree.nodes.len()
        );
        Ok(tree)
    }

    fn empty(display_root: String) -> Self {
        let root = TreeNode::root();
        let mut by_path = HashMap::new();
        by_path.insert(root.path.clone(), NodeId::ROOT);
        Self {
            display_root,
            nodes: vec![root],
            by_path,
            by_index: Vec::new(),
            duplicates: 0,
        }
    }

    fn insert(&mut self, entry: &dyn EntryMetadata) {
        let raw = entry.inner_path();
        debug_assert!(
            honors_separator_contract(raw),
            "format adapter produced a non-normalized path: {raw}"
        );

        let index = EntryIndex::new(self.by_index.len());
        let path = InnerPath::normalize(raw);

        let Some(parent) = self.ensure_parent_folders(&path) else {
            let id = self.push_node(&path, entry, index, None);
            log::warn!(
                "entry {index} ({path}) lies below a file in {}; kept detached",
                self.display_root
            );
            self.by_index.push(id);
            return;
        };

        let id = match self.by_path.get(&path).copied() {
            Some(existing) => {
                self.merge_duplicate(existing, entry, index);
                existing
            }
            None => {
                let id = self.push_node(&path, entry, index, Some(parent));
                self.nodes[parent.0].children.push(id);
                self.by_path.insert(path, id);
                id
            }
        };
        self.by_index.push(id);
    }

    /// Walks from the root, creating missing intermediate folders. Returns
    /// `None` if an intermediate segment is an existing file.
    fn ensure_parent_folders(&mut self, path: &InnerPath) -> Option<NodeId> {
        let segments: Vec<&str> = path.segments().collect();
        let Some((_, parents)) = segments.split_last() else {
            return Some(NodeId::ROOT);
        };

        let mut current = NodeId::ROOT;
        let mut current_path = InnerPath::default();
        for segment in parents {
            current_path = current_path.join(segment);
            current = match self.by_path.get(&current_path).copied() {
                Some(id) if self.nodes[id.0].is_folder() => id,
                Some(_) => return None,
                None => {
                    let id = NodeId(self.nodes.len());
                    self.nodes
                        .push(TreeNode::folder(id, current_path.clone(), Some(current)));
                    self.nodes[current.0].children.push(id);
                    self.by_path.insert(current_path.clone(), id);
                    id
                }
            };
        }
        Some(current)
    }

    fn push_node(
        &mut self,
        path: &InnerPath,
        entry: &dyn EntryMetadata,
        index: EntryIndex,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = TreeNode::folder(id, path.clone(), parent);
        node.entry = Some(index);
        node.modified = entry.last_modified();
        node.encrypted = entry.is_encrypted();
        if !entry.is_directory() {
            node.kind = NodeKind::File;
            node.size = entry.unpacked_size();
        }
        self.nodes.push(node);
        id
    }

    fn merge_duplicate(&mut self, existing: NodeId, entry: &dyn EntryMetadata, index: EntryIndex) {
        let node = &mut self.nodes[existing.0];
        if node.is_root() && entry.is_directory() {
            // "./" in tar archives
            return;
        }
        if entry.is_directory() && node.is_folder() && node.entry.is_none() {
            node.entry = Some(index);
            node.modified = entry.last_modified();
            return;
        }

        self.duplicates += 1;
        log::warn!(
            "duplicate entry {index} for {} in {}; keeping first-seen node",
            node.path,
            self.display_root
        );
    }

    /// The root folder.
    #[must_use]
    pub fn root(&self) -> &TreeNode {
        &self.nodes[NodeId::ROOT.0]
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    /// Looks up the node an entry index maps to.
    #[must_use]
    pub fn node_for(&self, index: EntryIndex) -> Option<&TreeNode> {
        self.by_index.get(index.get()).map(|id| &self.nodes[id.0])
    }

    /// Looks up a node by inner path (normalized first, matched
    /// case-sensitively).
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        self.by_path
            .get(&InnerPath::normalize(path))
            .map(|id| &self.nodes[id.0])
    }

    /// Children of `id` in first-seen order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &TreeNode> {
        self.get(id)
            .map(TreeNode::child_ids)
            .unwrap_or_default()
            .iter()
            .map(|child| &self.nodes[child.0])
    }

    /// Depth-first, pre-order walk of every node reachable from the root,
    /// including the root itself.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![NodeId::ROOT],
        }
    }

    /// Number of raw entries (and entry indices).
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.by_index.len()
    }

    /// Number of nodes, including the root and synthesized folders.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of entries that repeated an already known path.
    #[must_use]
    pub const fn duplicate_count(&self) -> usize {
        self.duplicates
    }

    /// Entry indices of every file, one per path (first-seen wins).
    pub fn file_indices(&self) -> impl Iterator<Item = EntryIndex> + '_ {
        self.by_index.iter().enumerate().filter_map(|(i, id)| {
            let node = &self.nodes[id.0];
            let index = EntryIndex::new(i);
            (node.is_file() && node.entry == Some(index)).then_some(index)
        })
    }

    /// Sum of the declared sizes of all files.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.nodes
            .iter()
            .filter(|n| n.is_file())
            .fold(0u64, |acc, n| acc.saturating_add(n.size))
    }

    /// Human-readable location of the archive itself.
    #[must_use]
    pub fn display_root(&self) -> &str {
        &self.display_root
    }

    /// Human-readable location of `node`, e.g. `outer.zip/inner.7z/dir/a.txt`.
    #[must_use]
    pub fn display_path(&self, node: &TreeNode) -> String {
        if node.path.is_root() {
            self.display_root.clone()
        } else {
            format!("{}/{}", self.display_root, node.path)
        }
    }
}

/// Pre-order iterator returned by [`ContentTree::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    tree: &'a ContentTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.0];
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
