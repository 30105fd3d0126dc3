//! Comment tree index.
//!
//! Comments arrive as a flat list where each entry names its parent. The
//! parent → children index is built lazily on the first query and dropped on
//! every local mutation, so queries always reflect the current list.
//!
//! Removing a comment does not remove its replies. They stay in the list,
//! still answer to `children_of(<removed id>)`, and are reported by
//! [`CommentTree::orphans`]. Use [`CommentTree::remove_thread`] to drop a
//! comment together with everything below it.
//!
//! A tree built with [`CommentTree::from_collection`] owns a copy of the
//! collection's items. Later changes to the collection are not seen until
//! [`CommentTree::resync`] or a fresh `from_collection`.

use std::collections::{HashMap, HashSet};

use once_cell::sync::OnceCell;

use crate::collection::PaginatedCollection;
use crate::model::{Comment, Keyed};

#[derive(Debug, Default)]
struct Index {
    roots: Vec<usize>,
    children: HashMap<String, Vec<usize>>,
    positions: HashMap<String, usize>,
}

/// Flat comment list with parent → children lookups.
#[derive(Debug, Default)]
pub struct CommentTree {
    comments: Vec<Comment>,
    index: OnceCell<Index>,
}

impl CommentTree {
    /// Build a tree over `comments`, keeping their order.
    #[must_use]
    pub fn new(comments: Vec<Comment>) -> Self {
        Self {
            comments,
            index: OnceCell::new(),
        }
    }

    /// Build a tree over a copy of the current items of a comment collection.
    #[must_use]
    pub fn from_collection(collection: &PaginatedCollection<Comment>) -> Self {
        Self::new(collection.items())
    }

    /// Replace the tree's comments with the collection's current items.
    pub fn resync(&mut self, collection: &PaginatedCollection<Comment>) {
        self.comments = collection.items();
        self.invalidate();
    }

    fn index(&self) -> &Index {
        self.index.get_or_init(|| {
            let mut index = Index::default();
            for (position, comment) in self.comments.iter().enumerate() {
                index.positions.entry(comment.key().to_string()).or_insert(position);
                match &comment.parent_id {
                    Some(parent) => index
                        .children
                        .entry(parent.clone())
                        .or_default()
                        .push(position),
                    None => index.roots.push(position),
                }
            }
            index
        })
    }

    fn invalidate(&mut self) {
        self.index = OnceCell::new();
    }

    fn resolve(&self, positions: &[usize]) -> Vec<&Comment> {
        positions.iter().map(|&i| &self.comments[i]).collect()
    }

    /// All comments in list order.
    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Number of comments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.comments.len()
    }

    /// Whether the tree holds no comments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Comment with `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.index().positions.get(id).map(|&i| &self.comments[i])
    }

    /// Direct replies to `parent_id`, in list order.
    #[must_use]
    pub fn children_of(&self, parent_id: &str) -> Vec<&Comment> {
        self.index()
            .children
            .get(parent_id)
            .map_or_else(Vec::new, |positions| self.resolve(positions))
    }

    /// Comments without a parent, in list order.
    #[must_use]
    pub fn roots(&self) -> Vec<&Comment> {
        self.resolve(&self.index().roots)
    }

    /// Comments whose parent is not in the list.
    #[must_use]
    pub fn orphans(&self) -> Vec<&Comment> {
        let index = self.index();
        self.comments
            .iter()
            .filter(|c| {
                c.parent_id
                    .as_ref()
                    .is_some_and(|parent| !index.positions.contains_key(parent))
            })
            .collect()
    }

    /// Pre-order walk from the roots, yielding each reachable comment with
    /// its depth (roots are depth 0).
    #[must_use]
    pub fn depth_first(&self) -> Vec<(usize, &Comment)> {
        let index = self.index();
        let mut out = Vec::with_capacity(self.comments.len());
        let mut visited = HashSet::new();
        let mut stack: Vec<(usize, usize)> =
            index.roots.iter().rev().map(|&position| (0, position)).collect();

        while let Some((depth, position)) = stack.pop() {
            if !visited.insert(position) {
                continue;
            }
            let comment = &self.comments[position];
            out.push((depth, comment));
            if let Some(children) = index.children.get(comment.key()) {
                stack.extend(children.iter().rev().map(|&child| (depth + 1, child)));
            }
        }
        out
    }

    /// Append `comment`. Returns `false` if its id is already present.
    pub fn insert(&mut self, comment: Comment) -> bool {
        if self.get(comment.key()).is_some() {
            return false;
        }
        self.comments.push(comment);
        self.invalidate();
        true
    }

    /// Replace the content of comment `id`. Unknown ids are ignored.
    pub fn update_content(&mut self, id: &str, content: impl Into<String>) -> bool {
        let Some(&position) = self.index().positions.get(id) else {
            return false;
        };
        self.comments[position].entity.content = content.into();
        true
    }

    /// Remove comment `id`, leaving its replies in place.
    pub fn remove(&mut self, id: &str) -> Option<Comment> {
        let position = *self.index().positions.get(id)?;
        let removed = self.comments.remove(position);
        self.invalidate();
        Some(removed)
    }

    /// Remove comment `id` and every reply below it.
    pub fn remove_thread(&mut self, id: &str) -> Vec<Comment> {
        if self.get(id).is_none() {
            return Vec::new();
        }

        let mut doomed: HashSet<String> = HashSet::from([id.to_string()]);
        let mut frontier = vec![id.to_string()];
        while let Some(parent) = frontier.pop() {
            for child in self.children_of(&parent) {
                if doomed.insert(child.key().to_string()) {
                    frontier.push(child.key().to_string());
                }
            }
        }

        let (removed, kept): (Vec<Comment>, Vec<Comment>) = std::mem::take(&mut self.comments)
            .into_iter()
            .partition(|c| doomed.contains(c.key()));
        self.comments = kept;
        self.invalidate();
        removed
    }
}

impl From<Vec<Comment>> for CommentTree {
    fn from(comments: Vec<Comment>) -> Self {
        Self::new(comments)
    }
}
