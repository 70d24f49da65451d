use log::trace;

use crate::rb_error::TreeError;

/// Index into the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

/// A single tree vertex. The node knows nothing about the tree it lives in,
/// so no ordering checks happen here.
pub(crate) struct RbNode<T> {
    pub(crate) value: T,
    pub(crate) color: Color,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) parent: Option<NodeId>,
}

impl<T> RbNode<T> {
    fn new(value: T) -> Self {
        RbNode {
            value,
            color: Color::Red,
            left: None,
            right: None,
            parent: None,
        }
    }
}

impl<T: Clone> Clone for RbNode<T> {
    fn clone(&self) -> Self {
        RbNode {
            value: self.value.clone(),
            color: self.color,
            left: self.left,
            right: self.right,
            parent: self.parent,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.value.clone_from(&source.value);
        self.color = source.color;
        self.left = source.left;
        self.right = source.right;
        self.parent = source.parent;
    }
}

/// Slot storage for the node graph. Child and parent relations are indices
/// into `nodes`; a vacant slot is `None` and its id sits on the free list.
pub(crate) struct NodeArena<T> {
    nodes: Vec<Option<RbNode<T>>>,
    free_list: Vec<NodeId>,
}

impl<T> NodeArena<T> {
    pub(crate) fn new() -> Self {
        NodeArena {
            nodes: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Drops every node. Each slot is released exactly once.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.free_list.clear();
    }

    // ===== Slot management =====

    /// Makes sure the next `alloc` will not reallocate.
    pub(crate) fn reserve_slot(&mut self) {
        if self.free_list.is_empty() {
            self.nodes.reserve(1);
        }
    }

    pub(crate) fn try_reserve_slot(&mut self) -> Result<(), TreeError> {
        if self.free_list.is_empty() {
            self.nodes.try_reserve(1)?;
        }
        Ok(())
    }

    /// Stores `value` in a fresh RED node with no relations.
    pub(crate) fn alloc(&mut self, value: T) -> NodeId {
        let node = RbNode::new(value);
        if let Some(id) = self.free_list.pop() {
            self.nodes[id.index()] = Some(node);
            id
        } else {
            let id = NodeId(self.nodes.len() as u32);
            self.nodes.push(Some(node));
            id
        }
    }

    /// Releases a slot and hands back its value. Relations pointing at `id`
    /// must already have been cut by the caller.
    pub(crate) fn free(&mut self, id: NodeId) -> T {
        match self.nodes.get_mut(id.index()).and_then(Option::take) {
            Some(node) => {
                self.free_list.push(id);
                node.value
            }
            None => panic!("double free of node {id:?}"),
        }
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&RbNode<T>> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    #[inline(always)]
    pub(crate) fn node(&self, id: NodeId) -> &RbNode<T> {
        match self.get(id) {
            Some(node) => node,
            None => panic!("node {id:?} is not live"),
        }
    }

    #[inline(always)]
    fn node_mut(&mut self, id: NodeId) -> &mut RbNode<T> {
        match self.nodes.get_mut(id.index()).and_then(Option::as_mut) {
            Some(node) => node,
            None => panic!("node {id:?} is not live"),
        }
    }

    // ===== Field accessors =====

    #[inline(always)]
    pub(crate) fn value(&self, id: NodeId) -> &T {
        &self.node(id).value
    }
    #[inline(always)]
    pub(crate) fn left(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).left
    }
    #[inline(always)]
    pub(crate) fn right(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).right
    }
    #[inline(always)]
    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }
    #[inline(always)]
    pub(crate) fn color(&self, id: NodeId) -> Color {
        self.node(id).color
    }
    #[inline(always)]
    pub(crate) fn is_red(&self, id: NodeId) -> bool {
        self.color(id) == Color::Red
    }
    #[inline(always)]
    pub(crate) fn set_color(&mut self, id: NodeId, color: Color) {
        self.node_mut(id).color = color;
    }

    // ===== Relation helpers =====

    /// Makes `child` the left child of `parent`, fixing the back-reference.
    pub(crate) fn set_left(&mut self, parent: NodeId, child: Option<NodeId>) {
        self.node_mut(parent).left = child;
        if let Some(c) = child {
            self.node_mut(c).parent = Some(parent);
        }
    }

    /// Makes `child` the right child of `parent`, fixing the back-reference.
    pub(crate) fn set_right(&mut self, parent: NodeId, child: Option<NodeId>) {
        self.node_mut(parent).right = child;
        if let Some(c) = child {
            self.node_mut(c).parent = Some(parent);
        }
    }

    /// Puts `new` where `old` hangs under `parent`. With no parent, `new`
    /// becomes parentless and the caller owns updating the tree root.
    pub(crate) fn replace_child(
        &mut self,
        parent: Option<NodeId>,
        old: NodeId,
        new: Option<NodeId>,
    ) {
        match parent {
            Some(p) if self.left(p) == Some(old) => self.set_left(p, new),
            Some(p) => self.set_right(p, new),
            None => {
                if let Some(n) = new {
                    self.node_mut(n).parent = None;
                }
            }
        }
    }

    pub(crate) fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(l) = self.left(id) {
            id = l;
        }
        id
    }

    pub(crate) fn rightmost(&self, mut id: NodeId) -> NodeId {
        while let Some(r) = self.right(id) {
            id = r;
        }
        id
    }

    // ===== Rotations =====

    /// Promotes the right child of `x` into its place and returns it.
    pub(crate) fn rotate_left(&mut self, x: NodeId) -> NodeId {
        let Some(y) = self.right(x) else {
            return x;
        };
        trace!("rotate_left at {x:?}");
        let inner = self.left(y);
        let top = self.parent(x);
        self.set_right(x, inner);
        self.replace_child(top, x, Some(y));
        self.set_left(y, Some(x));
        y
    }

    /// Promotes the left child of `x` into its place and returns it.
    pub(crate) fn rotate_right(&mut self, x: NodeId) -> NodeId {
        let Some(y) = self.left(x) else {
            return x;
        };
        trace!("rotate_right at {x:?}");
        let inner = self.right(y);
        let top = self.parent(x);
        self.set_left(x, inner);
        self.replace_child(top, x, Some(y));
        self.set_right(y, Some(x));
        y
    }

    // ===== Insertion fix-up =====

    /// Restores the red-black rules after `node` was attached as a RED leaf.
    ///
    /// Climbs toward the root while the aunt is RED, and finishes with at most
    /// one single or double rotation. Returns the new tree root when a
    /// rotation promoted a node into the root slot.
    pub(crate) fn balance(&mut self, mut node: NodeId) -> Option<NodeId> {
        loop {
            let Some(parent) = self.parent(node) else {
                trace!("fix-up reached root {node:?}");
                self.set_color(node, Color::Black);
                return None;
            };
            if !self.is_red(parent) {
                return None;
            }
            let Some(grand) = self.parent(parent) else {
                // A RED root only shows up if a caller skipped recoloring.
                self.set_color(parent, Color::Black);
                return None;
            };

            let parent_is_left = self.left(grand) == Some(parent);
            let aunt = if parent_is_left {
                self.right(grand)
            } else {
                self.left(grand)
            };

            if let Some(aunt) = aunt.filter(|&a| self.is_red(a)) {
                trace!("recolor around {grand:?}");
                self.set_color(parent, Color::Black);
                self.set_color(aunt, Color::Black);
                if self.parent(grand).is_some() {
                    self.set_color(grand, Color::Red);
                }
                node = grand;
                continue;
            }

            let node_is_left = self.left(parent) == Some(node);
            let promoted = match (node_is_left, parent_is_left) {
                (true, true) => {
                    self.rotate_right(grand);
                    parent
                }
                (false, false) => {
                    self.rotate_left(grand);
                    parent
                }
                (false, true) => {
                    self.rotate_left(parent);
                    self.rotate_right(grand);
                    node
                }
                (true, false) => {
                    self.rotate_right(parent);
                    self.rotate_left(grand);
                    node
                }
            };
            self.set_color(promoted, Color::Black);
            self.set_color(grand, Color::Red);
            return match self.parent(promoted) {
                None => Some(promoted),
                Some(_) => None,
            };
        }
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for NodeArena<T> {
    fn clone(&self) -> Self {
        NodeArena {
            nodes: self.nodes.clone(),
            free_list: self.free_list.clone(),
        }
    }

    // Slot ids survive the copy, so relations stay valid as-is and existing
    // destination nodes are overwritten in place.
    fn clone_from(&mut self, source: &Self) {
        self.nodes.clone_from(&source.nodes);
        self.free_list.clone_from(&source.free_list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_order(arena: &NodeArena<i32>, id: Option<NodeId>, out: &mut Vec<i32>) {
        if let Some(id) = id {
            in_order(arena, arena.left(id), out);
            out.push(*arena.value(id));
            in_order(arena, arena.right(id), out);
        }
    }

    fn black(arena: &mut NodeArena<i32>, value: i32) -> NodeId {
        let id = arena.alloc(value);
        arena.set_color(id, Color::Black);
        id
    }

    #[test]
    fn test_alloc_starts_red_and_unlinked() {
        let mut arena = NodeArena::new();
        let id = arena.alloc(7);
        assert!(arena.is_red(id));
        assert_eq!(arena.left(id), None);
        assert_eq!(arena.right(id), None);
        assert_eq!(arena.parent(id), None);
        assert_eq!(*arena.value(id), 7);
    }

    #[test]
    fn test_free_slot_is_reused() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(1);
        let b = arena.alloc(2);
        assert_eq!(arena.free(a), 1);
        assert!(!arena.contains(a));
        arena.reserve_slot();
        let c = arena.alloc(3);
        assert_eq!(c, a);
        assert_eq!(*arena.value(c), 3);
        assert!(arena.contains(b));
    }

    #[test]
    #[should_panic]
    fn test_double_free_panics() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(1);
        arena.free(a);
        arena.free(a);
    }

    #[test]
    fn test_replace_child_updates_both_sides() {
        let mut arena = NodeArena::new();
        let p = arena.alloc(10);
        let old = arena.alloc(5);
        let new = arena.alloc(4);
        arena.set_left(p, Some(old));
        arena.replace_child(Some(p), old, Some(new));
        assert_eq!(arena.left(p), Some(new));
        assert_eq!(arena.parent(new), Some(p));

        arena.replace_child(None, p, Some(new));
        assert_eq!(arena.parent(new), None);
    }

    #[test]
    fn test_rotate_left_relinks_parents() {
        let mut arena = NodeArena::new();
        let x = arena.alloc(10);
        let alpha = arena.alloc(5);
        let y = arena.alloc(20);
        let beta = arena.alloc(15);
        let gamma = arena.alloc(25);
        arena.set_left(x, Some(alpha));
        arena.set_right(x, Some(y));
        arena.set_left(y, Some(beta));
        arena.set_right(y, Some(gamma));

        let top = arena.rotate_left(x);
        assert_eq!(top, y);
        assert_eq!(arena.parent(y), None);
        assert_eq!(arena.left(y), Some(x));
        assert_eq!(arena.parent(x), Some(y));
        assert_eq!(arena.right(x), Some(beta));
        assert_eq!(arena.parent(beta), Some(x));
        assert_eq!(arena.right(y), Some(gamma));

        let mut out = Vec::new();
        in_order(&arena, Some(y), &mut out);
        assert_eq!(out, vec![5, 10, 15, 20, 25]);
    }

    #[test]
    fn test_rotate_right_under_parent() {
        let mut arena = NodeArena::new();
        let top = arena.alloc(100);
        let x = arena.alloc(50);
        let y = arena.alloc(30);
        let inner = arena.alloc(40);
        arena.set_left(top, Some(x));
        arena.set_left(x, Some(y));
        arena.set_right(y, Some(inner));

        assert_eq!(arena.rotate_right(x), y);
        assert_eq!(arena.left(top), Some(y));
        assert_eq!(arena.parent(y), Some(top));
        assert_eq!(arena.right(y), Some(x));
        assert_eq!(arena.left(x), Some(inner));
        assert_eq!(arena.parent(inner), Some(x));

        let mut out = Vec::new();
        in_order(&arena, Some(top), &mut out);
        assert_eq!(out, vec![30, 40, 50, 100]);
    }

    #[test]
    fn test_rotate_without_child_is_noop() {
        let mut arena = NodeArena::new();
        let x = arena.alloc(1);
        assert_eq!(arena.rotate_left(x), x);
        assert_eq!(arena.rotate_right(x), x);
    }

    #[test]
    fn test_balance_new_root_turns_black() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(1);
        assert_eq!(arena.balance(root), None);
        assert!(!arena.is_red(root));
    }

    #[test]
    fn test_balance_black_parent_stops() {
        let mut arena = NodeArena::new();
        let root = black(&mut arena, 5);
        let n = arena.alloc(3);
        arena.set_left(root, Some(n));
        assert_eq!(arena.balance(n), None);
        assert!(arena.is_red(n));
        assert!(!arena.is_red(root));
    }

    #[test]
    fn test_balance_recolor_keeps_root_black() {
        let mut arena = NodeArena::new();
        let root = black(&mut arena, 5);
        let l = arena.alloc(3);
        let r = arena.alloc(8);
        arena.set_left(root, Some(l));
        arena.set_right(root, Some(r));
        let n = arena.alloc(1);
        arena.set_left(l, Some(n));

        assert_eq!(arena.balance(n), None);
        assert!(!arena.is_red(root));
        assert!(!arena.is_red(l));
        assert!(!arena.is_red(r));
        assert!(arena.is_red(n));
    }

    #[test]
    fn test_balance_recolor_then_climb() {
        // 10B(5B(2R, 7R), 20B); inserting 1 under 2 recolors 5 RED, which
        // sits under a BLACK root, so the climb stops there.
        let mut arena = NodeArena::new();
        let root = black(&mut arena, 10);
        let five = black(&mut arena, 5);
        let twenty = black(&mut arena, 20);
        let two = arena.alloc(2);
        let seven = arena.alloc(7);
        arena.set_left(root, Some(five));
        arena.set_right(root, Some(twenty));
        arena.set_left(five, Some(two));
        arena.set_right(five, Some(seven));
        let one = arena.alloc(1);
        arena.set_left(two, Some(one));

        assert_eq!(arena.balance(one), None);
        assert!(arena.is_red(five));
        assert!(!arena.is_red(two));
        assert!(!arena.is_red(seven));
        assert!(!arena.is_red(root));
    }

    #[test]
    fn test_balance_single_rotation() {
        let mut arena = NodeArena::new();
        let root = black(&mut arena, 5);
        let p = arena.alloc(3);
        arena.set_left(root, Some(p));
        let n = arena.alloc(1);
        arena.set_left(p, Some(n));

        assert_eq!(arena.balance(n), Some(p));
        assert_eq!(arena.parent(p), None);
        assert_eq!(arena.left(p), Some(n));
        assert_eq!(arena.right(p), Some(root));
        assert!(!arena.is_red(p));
        assert!(arena.is_red(root));
        assert!(arena.is_red(n));
    }

    #[test]
    fn test_balance_double_rotation() {
        let mut arena = NodeArena::new();
        let root = black(&mut arena, 5);
        let p = arena.alloc(3);
        arena.set_left(root, Some(p));
        let n = arena.alloc(4);
        arena.set_right(p, Some(n));

        assert_eq!(arena.balance(n), Some(n));
        assert_eq!(arena.left(n), Some(p));
        assert_eq!(arena.right(n), Some(root));
        assert_eq!(arena.parent(p), Some(n));
        assert_eq!(arena.parent(root), Some(n));
        assert!(!arena.is_red(n));
        assert!(arena.is_red(root));
        assert!(arena.is_red(p));
    }

    #[test]
    fn test_balance_mirrored_double_rotation() {
        let mut arena = NodeArena::new();
        let root = black(&mut arena, 5);
        let p = arena.alloc(8);
        arena.set_right(root, Some(p));
        let n = arena.alloc(7);
        arena.set_left(p, Some(n));

        assert_eq!(arena.balance(n), Some(n));
        assert_eq!(arena.left(n), Some(root));
        assert_eq!(arena.right(n), Some(p));

        let mut out = Vec::new();
        in_order(&arena, Some(n), &mut out);
        assert_eq!(out, vec![5, 7, 8]);
    }

    #[test]
    fn test_balance_rotation_below_root_keeps_root() {
        // 10B(5B, 20B(30R)); inserting 40 under 30 rotates inside the right
        // subtree and leaves 10 as root.
        let mut arena = NodeArena::new();
        let root = black(&mut arena, 10);
        let five = black(&mut arena, 5);
        let twenty = black(&mut arena, 20);
        let thirty = arena.alloc(30);
        arena.set_left(root, Some(five));
        arena.set_right(root, Some(twenty));
        arena.set_right(twenty, Some(thirty));
        let forty = arena.alloc(40);
        arena.set_right(thirty, Some(forty));

        assert_eq!(arena.balance(forty), None);
        assert_eq!(arena.right(root), Some(thirty));
        assert_eq!(arena.parent(thirty), Some(root));
        assert_eq!(arena.left(thirty), Some(twenty));
        assert_eq!(arena.right(thirty), Some(forty));
        assert!(!arena.is_red(thirty));
        assert!(arena.is_red(twenty));
    }

    #[test]
    fn test_clone_from_overwrites_in_place() {
        let mut src = NodeArena::new();
        let a = src.alloc(1);
        let b = src.alloc(2);
        src.set_right(a, Some(b));

        let mut dst = NodeArena::new();
        dst.alloc(9);
        dst.clone_from(&src);
        assert_eq!(*dst.value(a), 1);
        assert_eq!(dst.right(a), Some(b));
        assert_eq!(dst.parent(b), Some(a));
    }
}
