use std::fmt;

use crate::rb_error::TreeError;
use crate::rb_node::{NodeArena, NodeId};
use crate::RbTree;

/// A detached position in a tree: a node, or the end.
///
/// Mutating calls hand positions back because a [`Cursor`] borrows its tree.
/// Re-bind one with [`RbTree::cursor`]. Any mutation invalidates every
/// position except the one the mutating call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub(crate) node: Option<NodeId>,
}

impl Position {
    /// The one-past-the-last position.
    pub const END: Position = Position { node: None };

    pub(crate) fn at(node: Option<NodeId>) -> Self {
        Position { node }
    }

    /// Returns true for the end position.
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }
}

/// In-order successor, walking only parent/child relations.
pub(crate) fn successor<T>(arena: &NodeArena<T>, id: NodeId) -> Option<NodeId> {
    if let Some(r) = arena.right(id) {
        return Some(arena.leftmost(r));
    }
    let mut child = id;
    let mut parent = arena.parent(id);
    while let Some(p) = parent {
        if arena.right(p) != Some(child) {
            break;
        }
        child = p;
        parent = arena.parent(p);
    }
    parent
}

/// In-order predecessor; mirror of [`successor`].
pub(crate) fn predecessor<T>(arena: &NodeArena<T>, id: NodeId) -> Option<NodeId> {
    if let Some(l) = arena.left(id) {
        return Some(arena.rightmost(l));
    }
    let mut child = id;
    let mut parent = arena.parent(id);
    while let Some(p) = parent {
        if arena.left(p) != Some(child) {
            break;
        }
        child = p;
        parent = arena.parent(p);
    }
    parent
}

/// A read-only position bound to a tree.
///
/// Two cursors compare equal when the values they point at are equal, not
/// when they sit on the same node. Two end cursors are equal; an end cursor
/// never equals one with a value.
pub struct Cursor<'a, T> {
    tree: &'a RbTree<T>,
    node: Option<NodeId>,
}

impl<'a, T> Cursor<'a, T> {
    pub(crate) fn new(tree: &'a RbTree<T>, node: Option<NodeId>) -> Self {
        Cursor { tree, node }
    }

    /// Returns the value under the cursor, or `None` at the end.
    pub fn get(&self) -> Option<&'a T> {
        let tree = self.tree;
        self.node.map(|id| tree.arena.value(id))
    }

    /// Returns the value under the cursor.
    ///
    /// # Errors
    /// [`TreeError::NoPosition`] when the cursor is at the end.
    pub fn value(&self) -> Result<&'a T, TreeError> {
        self.get().ok_or(TreeError::NoPosition)
    }

    /// Returns true when the cursor is at the end.
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    /// Detaches the cursor from its borrow of the tree.
    pub fn position(&self) -> Position {
        Position::at(self.node)
    }

    /// Steps to the in-order successor. Past the last value this is the end,
    /// and advancing the end leaves it there.
    pub fn advance(&mut self) {
        if let Some(id) = self.node {
            self.node = successor(&self.tree.arena, id);
        }
    }

    /// Steps to the in-order predecessor. Retreating from the end lands on
    /// the last value; retreating from the first value gives the end.
    pub fn retreat(&mut self) {
        self.node = match self.node {
            Some(id) => predecessor(&self.tree.arena, id),
            None => self.tree.root.map(|root| self.tree.arena.rightmost(root)),
        };
    }
}

impl<T> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cursor<'_, T> {}

impl<T: PartialEq> PartialEq for Cursor<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.get(), other.get()) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.get()).finish()
    }
}

/// In-order iterator over a tree, walking from both ends without a stack.
pub struct Iter<'a, T> {
    front: Cursor<'a, T>,
    back: Cursor<'a, T>,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    pub(super) fn new(tree: &'a RbTree<T>) -> Self {
        let mut back = tree.end();
        back.retreat();
        Iter {
            front: tree.begin(),
            back,
            remaining: tree.len(),
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.front.get()?;
        self.front.advance();
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.back.get()?;
        self.back.retreat();
        self.remaining -= 1;
        Some(value)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Iter {
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}
