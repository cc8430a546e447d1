use generational_arena::{Arena, Index};
use std::fmt;
use tracing::instrument;

/// A single tree node: an integer key/value pair plus the AA-tree level.
///
/// Nodes never hold parent references; all navigation is top-down and
/// restructuring works by returning the new subtree root to the caller.
#[derive(Debug)]
struct Node {
    key: i32,
    value: i32,
    level: u32,

    left: Option<Index>,
    right: Option<Index>,
}

impl Node {
    fn new(key: i32, value: i32) -> Self {
        Node {
            key,
            value,
            // Fresh nodes always enter the tree as leaves
            level: 1,
            left: None,
            right: None,
        }
    }
}

/// An AA-tree: a balanced binary search tree that uses integer levels
/// instead of red/black colors to bound its height at O(log n).
///
/// Stores the nodes in a generational arena and the index of the root of the
/// tree. The following invariants hold between mutations:
///
/// 1. Keys in a left subtree are smaller than the node's key, keys in a
///    right subtree are larger.
/// 2. A leaf has level 1.
/// 3. A left child is exactly one level below its parent.
/// 4. A right child is at most one level below its parent.
/// 5. A right child's right child is strictly below its grandparent.
///
/// A node whose right child shares its level is called a *double* node;
/// any other node (including one with no right child) is *single*.
#[derive(Debug)]
pub struct AaTree {
    nodes: Arena<Node>,
    root: Option<Index>,
}

impl Default for AaTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AaTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        AaTree {
            nodes: Arena::new(),
            root: None,
        }
    }

    /// Number of keys currently stored in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Insert a key/value pair and rebalance the tree.
    ///
    /// If the key is already present the call is a no-op: the stored value
    /// is left untouched (first write wins).
    ///
    /// # Arguments
    ///
    /// * `key` - The key to insert at
    /// * `value` - The value to associate with the key
    ///
    #[instrument(level = "trace", skip(self))]
    pub fn insert(&mut self, key: i32, value: i32) {
        let root = self.root;
        self.root = Some(self.insert_at(root, key, value));
    }

    /// Insert a whole slice of keys in order.
    ///
    /// The value is irrelevant when only the resulting shape matters, so
    /// every key gets a placeholder value of 0.
    pub fn insert_keys(&mut self, keys: &[i32]) {
        for &key in keys {
            self.insert(key, 0);
        }
    }

    /// Delete the node holding `key`, if any, and rebalance the tree.
    /// Deleting a key that is not present leaves the tree unchanged.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to remove from the tree
    ///
    #[instrument(level = "trace", skip(self))]
    pub fn delete(&mut self, key: i32) {
        let root = self.root;
        self.root = self.delete_at(root, key);
    }

    /// Delete a whole slice of keys in order.
    pub fn delete_keys(&mut self, keys: &[i32]) {
        for &key in keys {
            self.delete(key);
        }
    }

    /// Look up the value stored under `key`. Absence is a normal outcome,
    /// reported as `None`.
    #[instrument(level = "trace", skip(self))]
    pub fn search(&self, key: i32) -> Option<i32> {
        let mut current = self.root;
        while let Some(node) = current {
            if key == self.get_key(node) {
                return Some(self.get_value(node));
            } else if key > self.get_key(node) {
                current = self.get_right(node);
            } else {
                current = self.get_left(node);
            }
        }
        None
    }

    /// Height of the tree in nodes: 0 when empty.
    #[instrument(level = "debug", skip(self))]
    pub fn height(&self) -> usize {
        self.subtree_height(self.root)
    }

    /// Width of the tree in visual units. A double node and its right
    /// partner sit on one row, so together they count as a unit of 2
    /// rather than as two separate subtrees.
    #[instrument(level = "debug", skip(self))]
    pub fn width(&self) -> usize {
        self.subtree_width(self.root)
    }

    // Recursive descent for insert. Returns the (possibly new) subtree root
    // so the caller can re-link it.
    fn insert_at(&mut self, slot: Option<Index>, key: i32, value: i32) -> Index {
        let node = match slot {
            Some(node) => node,
            None => return self.nodes.insert(Node::new(key, value)),
        };

        if key > self.get_key(node) {
            let new_right = self.insert_at(self.get_right(node), key, value);
            self.set_right(node, Some(new_right));
        } else if key < self.get_key(node) {
            let new_left = self.insert_at(self.get_left(node), key, value);
            self.set_left(node, Some(new_left));
        }
        // Equal key: leave the existing entry untouched.

        // Re-establish the level invariants on the way back up
        let node = self.skew(node);
        self.split(node)
    }

    // Recursive descent for delete. Ancestors of the removed node get
    // rebalanced via adjust as the recursion unwinds.
    fn delete_at(&mut self, slot: Option<Index>, key: i32) -> Option<Index> {
        let node = slot?;

        if key > self.get_key(node) {
            let new_right = self.delete_at(self.get_right(node), key);
            self.set_right(node, new_right);
            Some(self.adjust(node))
        } else if key < self.get_key(node) {
            let new_left = self.delete_at(self.get_left(node), key);
            self.set_left(node, new_left);
            Some(self.adjust(node))
        } else {
            match (self.get_left(node), self.get_right(node)) {
                (left, None) => {
                    self.nodes.remove(node);
                    left
                }
                (None, right @ Some(_)) => {
                    self.nodes.remove(node);
                    right
                }
                (Some(_), Some(right)) => {
                    // Two children: take over the in-order successor's entry,
                    // then splice the successor out of the right subtree.
                    // Adjust runs on the ancestors as the recursion unwinds,
                    // not on this node itself.
                    let successor = self.leftmost(right);
                    let entry = (self.get_key(successor), self.get_value(successor));
                    self.set_entry(node, entry.0, entry.1);
                    let new_right = self.splice_leftmost(right);
                    self.set_right(node, new_right);
                    Some(node)
                }
            }
        }
    }

    // Index of the leftmost node of a subtree, i.e. the in-order successor
    // of the subtree's parent.
    fn leftmost(&self, node: Index) -> Index {
        match self.get_left(node) {
            Some(left) => self.leftmost(left),
            None => node,
        }
    }

    // Removes the leftmost node of a subtree from the arena and returns the
    // new subtree root.
    fn splice_leftmost(&mut self, node: Index) -> Option<Index> {
        match self.get_left(node) {
            None => {
                let right = self.get_right(node);
                self.nodes.remove(node);
                right
            }
            Some(left) => {
                let new_left = self.splice_leftmost(left);
                self.set_left(node, new_left);
                Some(node)
            }
        }
    }

    // Removes a left-horizontal link by right-rotating:
    //    l == n             l == n
    //   / \       -->      / \
    //  a   b              a   b
    // The left child becomes the subtree root; levels are untouched because
    // both nodes already share one. Identity when there is nothing to fix.
    fn skew(&mut self, node: Index) -> Index {
        match self.get_left(node) {
            Some(left) if self.get_level(left) == self.get_level(node) => {
                self.set_left(node, self.get_right(left));
                self.set_right(left, Some(node));
                left
            }
            _ => node,
        }
    }

    // Removes two consecutive right-horizontal links by left-rotating:
    //    n == r == x            r
    //   /    |        -->      / \    with r promoted one level
    //  a     b                n   x
    // Identity when there is nothing to fix.
    fn split(&mut self, node: Index) -> Index {
        let right = match self.get_right(node) {
            Some(right) => right,
            None => return node,
        };
        let right_right = match self.get_right(right) {
            Some(right_right) => right_right,
            None => return node,
        };
        let level = self.get_level(node);
        if level == self.get_level(right) && level == self.get_level(right_right) {
            self.set_right(node, self.get_left(right));
            self.set_left(right, Some(node));
            self.set_level(right, level + 1);
            right
        } else {
            node
        }
    }

    // Returns true if the given node is a single node, and false otherwise.
    // An absent node is not single (matters for the left-child checks below).
    fn is_single(&self, node: Option<Index>) -> bool {
        match node {
            None => false,
            Some(node) => match self.get_right(node) {
                None => true,
                Some(right) => self.get_level(node) > self.get_level(right),
            },
        }
    }

    // Rebalances a node after a deletion shrank one of its subtrees. Only a
    // level gap of exactly 2 between the node and a child can appear, and
    // only when both children are present; four cases, tested in order.
    fn adjust(&mut self, node: Index) -> Index {
        let (left, right) = match (self.get_left(node), self.get_right(node)) {
            (Some(left), Some(right)) => (left, right),
            _ => return node,
        };
        let level = self.get_level(node);

        if level == self.get_level(right) + 2 && self.is_single(Some(left)) {
            // Right child two below, left single: rotate right and demote
            // the node one level; the left child takes over at its own level.
            self.set_level(node, level - 1);
            self.set_left(node, self.get_right(left));
            self.set_right(left, Some(node));
            left
        } else if level == self.get_level(right) + 2 {
            // Right child two below, left double: the left child's right
            // child comes out as the new root at the original level, with
            // the demoted left child and node as its children.
            let pivot = self.get_right(left).unwrap();
            self.set_right(left, self.get_left(pivot));
            self.set_left(node, self.get_right(pivot));
            self.set_level(node, level - 1);
            self.set_left(pivot, Some(left));
            self.set_right(pivot, Some(node));
            self.set_level(pivot, level);
            pivot
        } else if level == self.get_level(left) + 2 && self.is_single(Some(node)) {
            // Left child two below, node single: demoting the node may leave
            // its right child double, so split catches the new violation.
            self.set_level(node, level - 1);
            self.split(node)
        } else if level == self.get_level(left) + 2 {
            // Left child two below, node double: the right child's left
            // child comes out as the new root at the original level. The new
            // right side keeps the original level only if the pivot was
            // double, and may itself need a split afterwards.
            let pivot = self.get_left(right).unwrap();
            let pivot_was_single = self.is_single(Some(pivot));
            self.set_left(right, self.get_right(pivot));
            self.set_level(right, if pivot_was_single { level - 1 } else { level });
            self.set_right(node, self.get_left(pivot));
            self.set_level(node, level - 1);
            let new_right = self.split(right);
            self.set_left(pivot, Some(node));
            self.set_right(pivot, Some(new_right));
            self.set_level(pivot, level);
            pivot
        } else {
            node
        }
    }

    fn subtree_height(&self, node: Option<Index>) -> usize {
        match node {
            None => 0,
            Some(node) => {
                let left = self.subtree_height(self.get_left(node));
                let right = self.subtree_height(self.get_right(node));
                1 + left.max(right)
            }
        }
    }

    fn subtree_width(&self, node: Option<Index>) -> usize {
        let node = match node {
            Some(node) => node,
            None => return 0,
        };
        if self.is_single(Some(node)) {
            1 + self.subtree_width(self.get_left(node)) + self.subtree_width(self.get_right(node))
        } else {
            // A double node and its right partner share a row
            let right = self.get_right(node).unwrap();
            2 + self.subtree_width(self.get_left(node))
                + self.subtree_width(self.get_left(right))
                + self.subtree_width(self.get_right(right))
        }
    }

    // Preorder dump of key.level pairs, for debugging
    fn fmt_subtree(&self, node: Option<Index>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match node {
            Some(node) => {
                write!(f, " {}.{}", self.get_key(node), self.get_level(node))?;
                self.fmt_subtree(self.get_left(node), f)?;
                self.fmt_subtree(self.get_right(node), f)
            }
            None => write!(f, "null"),
        }
    }

    // Getter and setters
    fn set_right(&mut self, node: Index, right: Option<Index>) {
        let node = self.nodes.get_mut(node).unwrap();
        node.right = right;
    }

    fn get_right(&self, node: Index) -> Option<Index> {
        let node = self.nodes.get(node).unwrap();
        node.right
    }

    fn set_left(&mut self, node: Index, left: Option<Index>) {
        let node = self.nodes.get_mut(node).unwrap();
        node.left = left;
    }

    fn get_left(&self, node: Index) -> Option<Index> {
        let node = self.nodes.get(node).unwrap();
        node.left
    }

    fn set_level(&mut self, node: Index, level: u32) {
        let node = self.nodes.get_mut(node).unwrap();
        node.level = level;
    }

    fn get_level(&self, node: Index) -> u32 {
        let node = self.nodes.get(node).unwrap();
        node.level
    }

    fn get_key(&self, node: Index) -> i32 {
        let node = self.nodes.get(node).unwrap();
        node.key
    }

    fn get_value(&self, node: Index) -> i32 {
        let node = self.nodes.get(node).unwrap();
        node.value
    }

    fn set_entry(&mut self, node: Index, key: i32, value: i32) {
        let node = self.nodes.get_mut(node).unwrap();
        node.key = key;
        node.value = value;
    }
}

impl fmt::Display for AaTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_subtree(self.root, f)
    }
}
