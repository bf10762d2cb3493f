use std::cmp::Ordering;
use std::fmt;

use log::trace;

use crate::{InvariantViolation, OrderedMap, Traversal};

/// AVL tree map.
///
/// Every node keeps the exact height of its subtree (a leaf has height 0, an
/// empty subtree -1) and the heights of its two subtrees differ by at most one.
pub struct AvlTreeMap<K: Ord, V> {
    root: Link<K, V>,
    len: usize,
}

type Link<K, V> = Option<Box<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    height: i32,
    left: Link<K, V>,
    right: Link<K, V>,
}

/// Which child a descent went into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            height: 0,
            left: None,
            right: None,
        }
    }

    fn height(node: &Link<K, V>) -> i32 {
        node.as_ref().map(|n| n.height).unwrap_or(-1)
    }

    fn recalc(&mut self) {
        let hl = Self::height(&self.left);
        let hr = Self::height(&self.right);
        self.height = 1 + hl.max(hr);
    }

    fn balance_factor(&self) -> i32 {
        Self::height(&self.left) - Self::height(&self.right)
    }
}

impl<K: Ord, V> AvlTreeMap<K, V> {
    /// Height of the whole tree, -1 when empty.
    pub fn height(&self) -> i32 {
        Node::height(&self.root)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            stack: Vec::with_capacity(self.height().max(0) as usize + 1),
            remaining: self.len,
        };
        iter.push_left_spine(self.root.as_deref());
        iter
    }

    fn rotate_right(mut root: Box<Node<K, V>>) -> Box<Node<K, V>> {
        let mut left = match root.left.take() {
            Some(node) => node,
            None => return root,
        };
        trace!("avl: rotate right at height {}", root.height);
        root.left = left.right.take();
        root.recalc();
        left.right = Some(root);
        left.recalc();
        left
    }

    fn rotate_left(mut root: Box<Node<K, V>>) -> Box<Node<K, V>> {
        let mut right = match root.right.take() {
            Some(node) => node,
            None => return root,
        };
        trace!("avl: rotate left at height {}", root.height);
        root.right = right.left.take();
        root.recalc();
        right.left = Some(root);
        right.recalc();
        right
    }

    fn rotate_left_right(mut root: Box<Node<K, V>>) -> Box<Node<K, V>> {
        if let Some(left) = root.left.take() {
            root.left = Some(Self::rotate_left(left));
        }
        Self::rotate_right(root)
    }

    fn rotate_right_left(mut root: Box<Node<K, V>>) -> Box<Node<K, V>> {
        if let Some(right) = root.right.take() {
            root.right = Some(Self::rotate_right(right));
        }
        Self::rotate_left(root)
    }

    /// Restores balance at `root` after an insertion below it. `grandchild`
    /// is the side the new key took inside the child that grew.
    fn rebalance_insert(
        mut root: Box<Node<K, V>>,
        grandchild: Option<Side>,
    ) -> Box<Node<K, V>> {
        root.recalc();
        match (root.balance_factor(), grandchild) {
            (2, Some(Side::Right)) => Self::rotate_left_right(root),
            (2, _) => Self::rotate_right(root),
            (-2, Some(Side::Left)) => Self::rotate_right_left(root),
            (-2, _) => Self::rotate_left(root),
            _ => root,
        }
    }

    /// Restores balance at `root` after a removal below it, choosing single
    /// or double rotation from the heavy child's balance factor.
    fn rebalance(mut root: Box<Node<K, V>>) -> Box<Node<K, V>> {
        root.recalc();
        let bf = root.balance_factor();
        if bf > 1 {
            let left_bf = root.left.as_ref().map(|n| n.balance_factor()).unwrap_or(0);
            if left_bf < 0 {
                return Self::rotate_left_right(root);
            }
            return Self::rotate_right(root);
        }
        if bf < -1 {
            let right_bf = root.right.as_ref().map(|n| n.balance_factor()).unwrap_or(0);
            if right_bf > 0 {
                return Self::rotate_right_left(root);
            }
            return Self::rotate_left(root);
        }
        root
    }

    fn pop_min(mut node: Box<Node<K, V>>) -> (Link<K, V>, Box<Node<K, V>>) {
        match node.left.take() {
            None => {
                let right = node.right.take();
                (right, node)
            }
            Some(left) => {
                let (new_left, min_node) = Self::pop_min(left);
                node.left = new_left;
                (Some(Self::rebalance(node)), min_node)
            }
        }
    }

    /// Returns the new subtree root, the overwritten value, and the side the
    /// key descended to from this node (`None` when it stopped here).
    fn insert_node(
        root: Link<K, V>,
        key: K,
        value: V,
    ) -> (Box<Node<K, V>>, Option<V>, Option<Side>) {
        let Some(mut node) = root else {
            return (Box::new(Node::new(key, value)), None, None);
        };

        match key.cmp(&node.key) {
            Ordering::Less => {
                let (left, old, below) = Self::insert_node(node.left.take(), key, value);
                node.left = Some(left);
                let node = if old.is_none() {
                    Self::rebalance_insert(node, below)
                } else {
                    node
                };
                (node, old, Some(Side::Left))
            }
            Ordering::Greater => {
                let (right, old, below) = Self::insert_node(node.right.take(), key, value);
                node.right = Some(right);
                let node = if old.is_none() {
                    Self::rebalance_insert(node, below)
                } else {
                    node
                };
                (node, old, Some(Side::Right))
            }
            Ordering::Equal => {
                let old = std::mem::replace(&mut node.value, value);
                (node, Some(old), None)
            }
        }
    }

    fn remove_node(root: Link<K, V>, key: &K) -> (Link<K, V>, Option<V>) {
        let Some(mut node) = root else {
            return (None, None);
        };

        match key.cmp(&node.key) {
            Ordering::Less => {
                let (left, removed) = Self::remove_node(node.left.take(), key);
                node.left = left;
                if removed.is_none() {
                    return (Some(node), None);
                }
                (Some(Self::rebalance(node)), removed)
            }
            Ordering::Greater => {
                let (right, removed) = Self::remove_node(node.right.take(), key);
                node.right = right;
                if removed.is_none() {
                    return (Some(node), None);
                }
                (Some(Self::rebalance(node)), removed)
            }
            Ordering::Equal => match (node.left.take(), node.right.take()) {
                (None, child) | (child, None) => (child, Some(node.value)),
                (Some(left), Some(right)) => {
                    let (new_right, successor) = Self::pop_min(right);
                    let Node { key, value, .. } = *successor;
                    node.key = key;
                    let removed = std::mem::replace(&mut node.value, value);
                    node.left = Some(left);
                    node.right = new_right;
                    (Some(Self::rebalance(node)), Some(removed))
                }
            },
        }
    }

    fn walk<E, F>(node: &Link<K, V>, order: Traversal, visit: &mut F) -> Result<(), E>
    where
        F: FnMut(&K, &V) -> Result<(), E>,
    {
        let Some(node) = node.as_deref() else {
            return Ok(());
        };
        match order {
            Traversal::Infix => {
                Self::walk(&node.left, order, visit)?;
                visit(&node.key, &node.value)?;
                Self::walk(&node.right, order, visit)
            }
            Traversal::Prefix => {
                visit(&node.key, &node.value)?;
                Self::walk(&node.left, order, visit)?;
                Self::walk(&node.right, order, visit)
            }
            Traversal::Postfix => {
                Self::walk(&node.left, order, visit)?;
                Self::walk(&node.right, order, visit)?;
                visit(&node.key, &node.value)
            }
        }
    }

    /// In-order audit of the subtree; returns its recomputed height.
    fn audit<'a>(
        node: &'a Link<K, V>,
        position: &mut usize,
        prev: &mut Option<&'a K>,
    ) -> Result<i32, InvariantViolation> {
        let Some(node) = node.as_deref() else {
            return Ok(-1);
        };
        let hl = Self::audit(&node.left, position, prev)?;

        let here = *position;
        if prev.is_some_and(|p| p >= &node.key) {
            return Err(InvariantViolation::OutOfOrder { position: here });
        }
        *prev = Some(&node.key);
        *position += 1;

        let hr = Self::audit(&node.right, position, prev)?;
        let expected = 1 + hl.max(hr);
        if node.height != expected {
            return Err(InvariantViolation::StaleHeight {
                position: here,
                stored: node.height,
                expected,
            });
        }
        let balance = hl - hr;
        if balance.abs() > 1 {
            return Err(InvariantViolation::Unbalanced {
                position: here,
                balance,
            });
        }
        Ok(expected)
    }
}

impl<K: Ord, V> OrderedMap for AvlTreeMap<K, V> {
    type Key = K;
    type Value = V;

    fn new() -> Self {
        Self { root: None, len: 0 }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, key: &Self::Key) -> Option<&Self::Value> {
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            match key.cmp(&node.key) {
                Ordering::Less => cur = node.left.as_deref(),
                Ordering::Greater => cur = node.right.as_deref(),
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    fn insert(&mut self, key: Self::Key, value: Self::Value) -> Option<Self::Value> {
        let (root, old, _) = Self::insert_node(self.root.take(), key, value);
        self.root = Some(root);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    fn remove(&mut self, key: &Self::Key) -> Option<Self::Value> {
        let (root, removed) = Self::remove_node(self.root.take(), key);
        self.root = root;
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    fn clear(&mut self) {
        log::debug!("avl: clearing {} entries", self.len);
        self.root = None;
        self.len = 0;
    }

    fn first_key_value(&self) -> Option<(&Self::Key, &Self::Value)> {
        let mut node = self.root.as_deref()?;
        while let Some(left) = node.left.as_deref() {
            node = left;
        }
        Some((&node.key, &node.value))
    }

    fn last_key_value(&self) -> Option<(&Self::Key, &Self::Value)> {
        let mut node = self.root.as_deref()?;
        while let Some(right) = node.right.as_deref() {
            node = right;
        }
        Some((&node.key, &node.value))
    }

    fn try_traverse<E, F>(&self, order: Traversal, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&Self::Key, &Self::Value) -> Result<(), E>,
    {
        Self::walk(&self.root, order, &mut visit)
    }

    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut counted = 0;
        Self::audit(&self.root, &mut counted, &mut None)?;
        if counted != self.len {
            return Err(InvariantViolation::LenMismatch {
                recorded: self.len,
                counted,
            });
        }
        Ok(())
    }
}

impl<K: Ord, V> Default for AvlTreeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for AvlTreeMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for AvlTreeMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V> Extend<(K, V)> for AvlTreeMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a AvlTreeMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order iterator over an [`AvlTreeMap`].
pub struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left_spine(&mut self, mut node: Option<&'a Node<K, V>>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_spine(node.right.as_deref());
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
