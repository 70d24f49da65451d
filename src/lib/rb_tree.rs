//! A red-black tree, the ordered core behind set and map containers.
#![warn(missing_docs)]

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::mem;

use log::{debug, warn};

mod rb_cursor;
mod rb_error;
mod rb_node;

pub use rb_cursor::{Cursor, Iter, Position};
pub use rb_error::TreeError;

use rb_node::{Color, NodeArena, NodeId};

/// A red-black binary search tree.
///
/// Equal values are allowed unless the caller asks for uniqueness on insert;
/// a tie descends to the right. Deletion splices nodes out without a
/// rebalancing pass, so after erases the tree stays ordered but its
/// black-height may drift.
pub struct RbTree<T> {
    arena: NodeArena<T>,
    root: Option<NodeId>,
    count: usize,
}

impl<T> RbTree<T> {
    /// Creates a new empty tree.
    pub fn new() -> Self {
        RbTree {
            arena: NodeArena::new(),
            root: None,
            count: 0,
        }
    }

    /// Returns the number of values in the tree.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the tree holds no values.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Drops every value.
    pub fn clear(&mut self) {
        debug!("clearing {} nodes", self.count);
        self.arena.clear();
        self.root = None;
        self.count = 0;
    }

    /// Exchanges the contents of two trees without visiting any node.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Returns a cursor at the smallest value, or the end cursor if empty.
    pub fn begin(&self) -> Cursor<'_, T> {
        Cursor::new(self, self.root.map(|root| self.arena.leftmost(root)))
    }

    /// Returns the end cursor, one past the largest value.
    pub fn end(&self) -> Cursor<'_, T> {
        Cursor::new(self, None)
    }

    /// Binds a position handed back by a mutating call to this tree.
    ///
    /// Only a vacant slot is detected; a position that outlived its node and
    /// whose slot was refilled by a later insert binds to the new value.
    ///
    /// # Errors
    /// [`TreeError::StalePosition`] when the node behind `position` was erased.
    pub fn cursor(&self, position: Position) -> Result<Cursor<'_, T>, TreeError> {
        match position.node {
            Some(id) if !self.arena.contains(id) => Err(TreeError::StalePosition),
            node => Ok(Cursor::new(self, node)),
        }
    }

    /// Returns an in-order iterator over the values.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Removes the value at `position` and returns the position to continue
    /// from.
    ///
    /// - a leaf hands back its former parent (the end if it was the root),
    /// - a node with one child hands back the first position of the tree,
    /// - a node with two children is replaced by its in-order successor, which
    ///   is handed back.
    ///
    /// Erasing the end, or a position whose node is already gone, is a no-op.
    /// Every other position previously obtained from this tree is invalidated.
    pub fn erase(&mut self, position: Position) -> Position {
        let Some(target) = position.node else {
            return position;
        };
        if !self.arena.contains(target) {
            warn!("erase through stale position {target:?} ignored");
            return Position::END;
        }
        let (_, next) = self.unlink(target);
        next
    }

    fn unlink(&mut self, target: NodeId) -> (T, Position) {
        let parent = self.arena.parent(target);
        let next = match (self.arena.left(target), self.arena.right(target)) {
            (None, None) => {
                debug!("erase {target:?}: leaf");
                self.arena.replace_child(parent, target, None);
                if parent.is_none() {
                    self.root = None;
                }
                parent
            }
            (Some(child), None) | (None, Some(child)) => {
                debug!("erase {target:?}: single child {child:?}");
                self.arena.replace_child(parent, target, Some(child));
                if parent.is_none() {
                    self.root = Some(child);
                    self.arena.set_color(child, Color::Black);
                }
                self.root.map(|root| self.arena.leftmost(root))
            }
            (Some(left), Some(right)) => {
                let succ = self.arena.leftmost(right);
                debug!("erase {target:?}: two children, successor {succ:?}");
                if succ != right {
                    // succ is a left child with no left subtree of its own.
                    let succ_right = self.arena.right(succ);
                    if let Some(succ_parent) = self.arena.parent(succ) {
                        self.arena.set_left(succ_parent, succ_right);
                    }
                    self.arena.set_right(succ, Some(right));
                }
                self.arena.set_left(succ, Some(left));
                self.arena.replace_child(parent, target, Some(succ));
                let color = self.arena.color(target);
                self.arena.set_color(succ, color);
                if parent.is_none() {
                    self.root = Some(succ);
                }
                Some(succ)
            }
        };
        let value = self.arena.free(target);
        self.count -= 1;
        (value, Position::at(next))
    }
}

impl<T: Ord> RbTree<T> {
    /// Builds a tree by inserting `values` in order. With `keep_unique`, the
    /// first of several equal values wins.
    pub fn with_values<I: IntoIterator<Item = T>>(values: I, keep_unique: bool) -> Self {
        let mut tree = RbTree::new();
        for value in values {
            tree.insert(value, keep_unique);
        }
        tree
    }

    /// Replaces the contents with `values`, inserted in order.
    pub fn assign<I: IntoIterator<Item = T>>(&mut self, values: I, keep_unique: bool) {
        self.clear();
        for value in values {
            self.insert(value, keep_unique);
        }
        debug!("assigned {} values", self.count);
    }

    /// Inserts `value` and rebalances.
    ///
    /// With `keep_unique`, an existing equal value is left alone and its
    /// position comes back with `false`. Otherwise the new node's position
    /// comes back with `true`.
    pub fn insert(&mut self, value: T, keep_unique: bool) -> (Position, bool) {
        if keep_unique {
            if let Some(id) = self.find_node(&value) {
                return (Position::at(Some(id)), false);
            }
        }
        self.arena.reserve_slot();
        (self.link(value), true)
    }

    /// Like [`insert`](Self::insert), but reports allocation failure instead
    /// of aborting.
    ///
    /// # Errors
    /// [`TreeError::AllocationFailed`] if the arena cannot grow. The tree is
    /// unchanged in that case.
    pub fn try_insert(&mut self, value: T, keep_unique: bool) -> Result<(Position, bool), TreeError> {
        if keep_unique {
            if let Some(id) = self.find_node(&value) {
                return Ok((Position::at(Some(id)), false));
            }
        }
        self.arena.try_reserve_slot()?;
        Ok((self.link(value), true))
    }

    // The slot must already be reserved. All comparisons run before any
    // relation changes, so a panicking `Ord` leaves the tree as it was.
    fn link(&mut self, value: T) -> Position {
        let mut slot = None;
        let mut current = self.root;
        while let Some(id) = current {
            let go_left = value < *self.arena.value(id);
            slot = Some((id, go_left));
            current = if go_left {
                self.arena.left(id)
            } else {
                self.arena.right(id)
            };
        }

        let node = self.arena.alloc(value);
        match slot {
            None => {
                self.arena.set_color(node, Color::Black);
                self.root = Some(node);
            }
            Some((parent, go_left)) => {
                if go_left {
                    self.arena.set_left(parent, Some(node));
                } else {
                    self.arena.set_right(parent, Some(node));
                }
                if let Some(new_root) = self.arena.balance(node) {
                    self.root = Some(new_root);
                }
            }
        }
        self.count += 1;
        Position::at(Some(node))
    }

    fn find_node<Q: ?Sized + Ord>(&self, key: &Q) -> Option<NodeId>
    where
        T: Borrow<Q>,
    {
        let mut current = self.root;
        while let Some(id) = current {
            current = match key.cmp(self.arena.value(id).borrow()) {
                Ordering::Equal => return Some(id),
                Ordering::Less => self.arena.left(id),
                Ordering::Greater => self.arena.right(id),
            };
        }
        None
    }

    /// Returns a cursor at a value equal to `key`, or the end cursor.
    pub fn find<Q: ?Sized + Ord>(&self, key: &Q) -> Cursor<'_, T>
    where
        T: Borrow<Q>,
    {
        Cursor::new(self, self.find_node(key))
    }

    /// Returns true if a value equal to `key` is present.
    pub fn contains<Q: ?Sized + Ord>(&self, key: &Q) -> bool
    where
        T: Borrow<Q>,
    {
        self.find_node(key).is_some()
    }

    /// Removes one value equal to `key` and returns it.
    pub fn remove<Q: ?Sized + Ord>(&mut self, key: &Q) -> Option<T>
    where
        T: Borrow<Q>,
    {
        let id = self.find_node(key)?;
        Some(self.unlink(id).0)
    }
}

#[cfg(any(test, debug_assertions, feature = "verify"))]
impl<T: Ord> RbTree<T> {
    /// Checks back-references, in-order ordering and the node count.
    /// Returns the number of reachable nodes.
    ///
    /// # Errors
    /// [`TreeError::Invariant`] describing the first violation found.
    pub fn verify_bst(&self) -> Result<usize, TreeError> {
        let Some(root) = self.root else {
            if self.count != 0 {
                return Err(invariant(format!("empty root but count is {}", self.count)));
            }
            return Ok(0);
        };
        if !self.arena.contains(root) {
            return Err(invariant(format!("root {root:?} is not live")));
        }
        if self.arena.parent(root).is_some() {
            return Err(invariant(format!("root {root:?} has a parent")));
        }
        let reached = self.verify_links(root)?;
        if reached != self.count {
            return Err(invariant(format!(
                "reached {} nodes but count is {}",
                reached, self.count
            )));
        }

        let mut prev: Option<NodeId> = None;
        let mut current = Some(self.arena.leftmost(root));
        while let Some(id) = current {
            if let Some(p) = prev {
                if self.arena.value(id) < self.arena.value(p) {
                    return Err(invariant(format!("{id:?} sorts before its predecessor {p:?}")));
                }
            }
            prev = current;
            current = rb_cursor::successor(&self.arena, id);
        }
        Ok(reached)
    }

    fn verify_links(&self, id: NodeId) -> Result<usize, TreeError> {
        let mut reached = 1;
        for child in [self.arena.left(id), self.arena.right(id)].into_iter().flatten() {
            if !self.arena.contains(child) {
                return Err(invariant(format!("{id:?} links to vacant slot {child:?}")));
            }
            if self.arena.parent(child) != Some(id) {
                return Err(invariant(format!("{child:?} does not point back to {id:?}")));
            }
            reached += self.verify_links(child)?;
        }
        Ok(reached)
    }

    /// Checks the coloring rules: BLACK root, no RED node with a RED child,
    /// one black-height on every path. Returns that black-height.
    ///
    /// Holds after any run of inserts; erases may break it.
    ///
    /// # Errors
    /// [`TreeError::Invariant`] describing the first violation found.
    pub fn verify_red_black(&self) -> Result<usize, TreeError> {
        let Some(root) = self.root else {
            return Ok(0);
        };
        if self.arena.is_red(root) {
            return Err(invariant(format!("root {root:?} is red")));
        }
        self.black_height(root)
    }

    fn black_height(&self, id: NodeId) -> Result<usize, TreeError> {
        let red = self.arena.is_red(id);
        let mut heights = [0; 2];
        for (height, child) in heights
            .iter_mut()
            .zip([self.arena.left(id), self.arena.right(id)])
        {
            if let Some(child) = child {
                if red && self.arena.is_red(child) {
                    return Err(invariant(format!("red {id:?} has red child {child:?}")));
                }
                *height = self.black_height(child)?;
            }
        }
        if heights[0] != heights[1] {
            return Err(invariant(format!(
                "black-height differs below {id:?}: {} vs {}",
                heights[0], heights[1]
            )));
        }
        Ok(heights[0] + usize::from(!red))
    }
}

#[cfg(any(test, debug_assertions, feature = "verify"))]
fn invariant(message: String) -> TreeError {
    TreeError::Invariant(message)
}

impl<T> Default for RbTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for RbTree<T> {
    fn clone(&self) -> Self {
        RbTree {
            arena: self.arena.clone(),
            root: self.root,
            count: self.count,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        debug!("assigning {} nodes over {}", source.count, self.count);
        self.arena.clone_from(&source.arena);
        self.root = source.root;
        self.count = source.count;
    }
}

impl<T: fmt::Debug> fmt::Debug for RbTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for RbTree<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for RbTree<T> {}

impl<T: Ord> FromIterator<T> for RbTree<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        RbTree::with_values(iter, false)
    }
}

impl<T: Ord> Extend<T> for RbTree<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value, false);
        }
    }
}

impl<'a, T> IntoIterator for &'a RbTree<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
