//! The current nesting path of tags, and a caller-registered set of paths
//! of interest, matched either exactly or as a prefix.

use smallvec::SmallVec;

use crate::error::{Error, PathOverflowSnafu};
use crate::Tag;

/// DICOM nesting depth stays small in practice; paths are kept inline up to
/// this many tags before the small-vector would need to spill to the heap.
pub const MAX_PATH_DEPTH: usize = 16;

/// An ordered sequence of tags, root-to-leaf, naming a position inside the
/// element tree.
///
/// Backed by a fixed-capacity small vector: `push`/`pop` are O(1) and never
/// allocate for any path this format is expected to produce. Exceeding
/// [`MAX_PATH_DEPTH`] is treated as a hard parse error rather than silently
/// spilling to the heap, since a dataset nested that deeply is far more
/// likely to be corrupt or adversarial than legitimate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPath(SmallVec<[Tag; MAX_PATH_DEPTH]>);

impl TagPath {
    /// An empty path.
    pub fn new() -> Self {
        TagPath(SmallVec::new())
    }

    /// Append a tag, descending one level.
    pub fn push(&mut self, tag: Tag) -> Result<(), Error> {
        if self.0.len() >= MAX_PATH_DEPTH {
            return PathOverflowSnafu {
                max_depth: MAX_PATH_DEPTH,
            }
            .fail();
        }
        self.0.push(tag);
        Ok(())
    }

    /// Remove and return the last tag, ascending one level.
    pub fn pop(&mut self) -> Option<Tag> {
        self.0.pop()
    }

    /// The last (deepest) tag in the path, if any.
    pub fn last(&self) -> Option<Tag> {
        self.0.last().copied()
    }

    /// The number of tags in the path.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path is empty (at the root).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The tags that make up the path, root-to-leaf.
    pub fn as_slice(&self) -> &[Tag] {
        &self.0
    }

    /// Whether `self` is a prefix of `other` (including the case where
    /// they are equal).
    pub fn is_prefix_of(&self, other: &TagPath) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl FromIterator<Tag> for TagPath {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        TagPath(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Tag; N]> for TagPath {
    fn from(tags: [Tag; N]) -> Self {
        TagPath(tags.into_iter().collect())
    }
}

/// An unordered collection of registered [`TagPath`]s, consulted by the
/// dataset walker both to decide which attributes to report to the caller's
/// handler (exact match) and which defined-length sequences/items are worth
/// descending into at all (prefix match).
///
/// Capacity is bounded (at most 16 registered paths, at most 512 tags
/// across all of them), which is generous for the handful of attributes a
/// DICOMDIR or WSMIS reader needs to reach.
#[derive(Debug, Clone, Default)]
pub struct TagPathSet {
    paths: Vec<TagPath>,
}

/// At most this many paths may be registered in one [`TagPathSet`].
pub const MAX_REGISTERED_PATHS: usize = 16;
/// At most this many tags may be registered across all paths in one
/// [`TagPathSet`].
pub const MAX_REGISTERED_TAGS: usize = 512;

impl TagPathSet {
    /// An empty set.
    pub fn new() -> Self {
        TagPathSet { paths: Vec::new() }
    }

    /// Register a copy of `path`.
    pub fn add(&mut self, path: TagPath) -> Result<(), Error> {
        let total_tags: usize = self.paths.iter().map(TagPath::len).sum::<usize>() + path.len();
        if self.paths.len() >= MAX_REGISTERED_PATHS || total_tags > MAX_REGISTERED_TAGS {
            return PathOverflowSnafu {
                max_depth: MAX_REGISTERED_PATHS,
            }
            .fail();
        }
        self.paths.push(path);
        Ok(())
    }

    /// True iff some registered path equals `path` exactly.
    pub fn find(&self, path: &TagPath) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// True iff `path` is a prefix of some registered path. This is the
    /// descent-decision predicate the walker uses to decide whether a
    /// defined-length sequence or item is worth entering: `path` names the
    /// ancestor node the walker is currently standing on, which is shorter
    /// than any registered leaf path it might lead to.
    pub fn matches(&self, path: &TagPath) -> bool {
        self.paths.iter().any(|p| path.is_prefix_of(p))
    }
}
