//! Entry indices and unpack requests.

use std::collections::BTreeSet;
use std::fmt;

/// Zero-based position of a raw entry in enumeration order.
///
/// Indices are only meaningful within the session whose content tree
/// assigned them.
///
/// # Examples
///
/// ```
/// use arctree_core::EntryIndex;
///
/// let index = EntryIndex::new(3);
/// assert_eq!(index.get(), 3);
/// assert_eq!(index.to_string(), "#3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryIndex(usize);

impl EntryIndex {
    /// Wraps a raw ordinal.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw ordinal.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl From<usize> for EntryIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for EntryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Set of entries to materialize in one decode pass.
///
/// Backed by an ordered set, so duplicates collapse and iteration follows
/// archive order.
///
/// # Examples
///
/// ```
/// use arctree_core::UnpackRequest;
///
/// let request: UnpackRequest = [2usize, 1, 2].into_iter().collect();
/// assert_eq!(request.len(), 2);
/// assert_eq!(request.iter().map(|i| i.get()).collect::<Vec<_>>(), vec![1, 2]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackRequest {
    indices: BTreeSet<EntryIndex>,
}

impl UnpackRequest {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an index; returns `false` if it was already present.
    pub fn insert(&mut self, index: impl Into<EntryIndex>) -> bool {
        self.indices.insert(index.into())
    }

    /// Returns `true` if the request names `index`.
    #[must_use]
    pub fn contains(&self, index: EntryIndex) -> bool {
        self.indices.contains(&index)
    }

    /// Number of requested entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if nothing is requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterates requested indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = EntryIndex> + '_ {
        self.indices.iter().copied()
    }

    /// Returns the underlying ordered set.
    #[must_use]
    pub const fn indices(&self) -> &BTreeSet<EntryIndex> {
        &self.indices
    }
}

impl<I: Into<EntryIndex>> FromIterator<I> for UnpackRequest {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self {
            indices: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<I: Into<EntryIndex>> Extend<I> for UnpackRequest {
    fn extend<T: IntoIterator<Item = I>>(&mut self, iter: T) {
        self.indices.extend(iter.into_iter().map(Into::into));
    }
}
