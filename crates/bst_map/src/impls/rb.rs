use std::cmp::Ordering;
use std::fmt;

use log::trace;

use crate::{InvariantViolation, OrderedMap, Traversal};

const LEFT: usize = 0;
const RIGHT: usize = 1;

#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Id(u32);

impl Id {
    const NIL: Self = Self(u32::MAX);

    #[inline(always)]
    fn is_nil(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline(always)]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[inline(always)]
fn id(v: usize) -> Id {
    debug_assert!(v < u32::MAX as usize);
    Id(v as u32)
}

struct Node<K, V> {
    key: K,
    value: V,
    red: bool,
    ch: [Id; 2],
    /// Back-reference only; the arena owns every node.
    parent: Id,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V, parent: Id) -> Self {
        Self {
            key,
            value,
            red: true,
            ch: [Id::NIL, Id::NIL],
            parent,
        }
    }
}

/// Red-black tree map.
///
/// Nodes live in a dense arena and refer to each other by index. Removing an
/// entry moves the arena's last node into the freed slot, so `len` is always
/// the arena length.
pub struct RbTreeMap<K: Ord, V> {
    nodes: Vec<Node<K, V>>,
    root: Id,
}

impl<K: Ord, V> RbTreeMap<K, V> {
    /// Number of black nodes on every path from the root down to an empty
    /// subtree, root included. 0 when empty.
    pub fn black_height(&self) -> usize {
        let mut height = 0;
        let mut cur = self.root;
        while !cur.is_nil() {
            let node = self.node(cur);
            height += usize::from(!node.red);
            cur = node.ch[LEFT];
        }
        height
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            map: self,
            next: self.min_from(self.root),
            remaining: self.nodes.len(),
        }
    }

    #[inline(always)]
    fn node(&self, x: Id) -> &Node<K, V> {
        debug_assert!(!x.is_nil());
        &self.nodes[x.idx()]
    }

    #[inline(always)]
    fn node_mut(&mut self, x: Id) -> &mut Node<K, V> {
        debug_assert!(!x.is_nil());
        &mut self.nodes[x.idx()]
    }

    #[inline(always)]
    fn parent(&self, x: Id) -> Id {
        if x.is_nil() { Id::NIL } else { self.node(x).parent }
    }

    /// Absent children count as black.
    #[inline(always)]
    fn is_red(&self, x: Id) -> bool {
        !x.is_nil() && self.node(x).red
    }

    fn set_red(&mut self, x: Id, red: bool) {
        if !x.is_nil() {
            self.node_mut(x).red = red;
        }
    }

    /// Which child slot of `parent` holds `x`.
    fn side_of(&self, parent: Id, x: Id) -> usize {
        if self.node(parent).ch[LEFT] == x {
            LEFT
        } else {
            RIGHT
        }
    }

    fn find(&self, key: &K) -> Id {
        let mut cur = self.root;
        while !cur.is_nil() {
            let node = self.node(cur);
            cur = match key.cmp(&node.key) {
                Ordering::Less => node.ch[LEFT],
                Ordering::Greater => node.ch[RIGHT],
                Ordering::Equal => return cur,
            };
        }
        Id::NIL
    }

    fn extreme_from(&self, mut x: Id, dir: usize) -> Id {
        if x.is_nil() {
            return x;
        }
        while !self.node(x).ch[dir].is_nil() {
            x = self.node(x).ch[dir];
        }
        x
    }

    fn min_from(&self, x: Id) -> Id {
        self.extreme_from(x, LEFT)
    }

    fn successor(&self, x: Id) -> Id {
        let right = self.node(x).ch[RIGHT];
        if !right.is_nil() {
            return self.min_from(right);
        }
        let mut child = x;
        let mut parent = self.node(x).parent;
        while !parent.is_nil() && self.node(parent).ch[RIGHT] == child {
            child = parent;
            parent = self.node(parent).parent;
        }
        parent
    }

    /// Points whatever referenced `old` from above (its parent, or the root
    /// slot) at `new`.
    fn replace_child(&mut self, parent: Id, old: Id, new: Id) {
        if parent.is_nil() {
            self.root = new;
        } else {
            let side = self.side_of(parent, old);
            self.node_mut(parent).ch[side] = new;
        }
    }

    /// Moves `x` down to its `dir` side; its child on the other side takes its
    /// place. `rotate(x, LEFT)` is the classic left rotation.
    fn rotate(&mut self, x: Id, dir: usize) {
        let up = dir ^ 1;
        let y = self.node(x).ch[up];
        if y.is_nil() {
            return;
        }
        trace!(
            "rb: rotate {} at slot {}",
            if dir == LEFT { "left" } else { "right" },
            x.0
        );
        let inner = self.node(y).ch[dir];
        self.node_mut(x).ch[up] = inner;
        if !inner.is_nil() {
            self.node_mut(inner).parent = x;
        }
        let parent = self.node(x).parent;
        self.node_mut(y).parent = parent;
        self.replace_child(parent, x, y);
        self.node_mut(y).ch[dir] = x;
        self.node_mut(x).parent = y;
    }

    fn insert_fix_up(&mut self, mut x: Id) {
        loop {
            let parent = self.parent(x);
            if !self.is_red(parent) {
                break;
            }
            let grandparent = self.parent(parent);
            if grandparent.is_nil() {
                break;
            }
            let dir = self.side_of(grandparent, parent);
            let uncle = self.node(grandparent).ch[dir ^ 1];

            if self.is_red(uncle) {
                trace!("rb: insert fix-up, red uncle, recolor");
                self.set_red(parent, false);
                self.set_red(uncle, false);
                self.set_red(grandparent, true);
                x = grandparent;
                continue;
            }

            let mut parent = parent;
            if self.node(parent).ch[dir ^ 1] == x {
                trace!("rb: insert fix-up, inner grandchild");
                self.rotate(parent, dir);
                parent = x;
            }
            trace!("rb: insert fix-up, outer grandchild");
            self.rotate(grandparent, dir ^ 1);
            self.set_red(parent, false);
            self.set_red(grandparent, true);
            break;
        }
        let root = self.root;
        self.set_red(root, false);
    }

    /// Restores the black-height after a black node was unlinked. `x` is the
    /// child that took its place (possibly absent), `parent` is `x`'s parent.
    fn remove_fix_up(&mut self, mut x: Id, mut parent: Id) {
        while x != self.root && !self.is_red(x) {
            if parent.is_nil() {
                break;
            }
            let dir = self.side_of(parent, x);
            let mut sibling = self.node(parent).ch[dir ^ 1];

            if self.is_red(sibling) {
                trace!("rb: remove fix-up, red sibling");
                self.set_red(sibling, false);
                self.set_red(parent, true);
                self.rotate(parent, dir);
                sibling = self.node(parent).ch[dir ^ 1];
            }
            if sibling.is_nil() {
                x = parent;
                parent = self.parent(x);
                continue;
            }

            let near = self.node(sibling).ch[dir];
            let far = self.node(sibling).ch[dir ^ 1];
            if !self.is_red(near) && !self.is_red(far) {
                trace!("rb: remove fix-up, black nephews, move up");
                self.set_red(sibling, true);
                x = parent;
                parent = self.parent(x);
                continue;
            }

            if !self.is_red(far) {
                trace!("rb: remove fix-up, red near nephew");
                self.set_red(near, false);
                self.set_red(sibling, true);
                self.rotate(sibling, dir ^ 1);
                sibling = self.node(parent).ch[dir ^ 1];
            }
            trace!("rb: remove fix-up, red far nephew");
            let parent_red = self.node(parent).red;
            self.set_red(sibling, parent_red);
            self.set_red(parent, false);
            let far = self.node(sibling).ch[dir ^ 1];
            self.set_red(far, false);
            self.rotate(parent, dir);
            x = self.root;
            break;
        }
        self.set_red(x, false);
    }

    /// Exchanges the entries stored at two distinct slots, leaving the tree
    /// shape and colors alone.
    fn swap_entries(&mut self, a: Id, b: Id) {
        debug_assert_ne!(a, b);
        let (lo, hi) = if a.idx() < b.idx() { (a, b) } else { (b, a) };
        let (head, tail) = self.nodes.split_at_mut(hi.idx());
        let lo = &mut head[lo.idx()];
        let hi = &mut tail[0];
        std::mem::swap(&mut lo.key, &mut hi.key);
        std::mem::swap(&mut lo.value, &mut hi.value);
    }

    /// Frees the slot of an already unlinked node, filling it with the last
    /// node of the arena and retargeting the links to that node.
    fn release(&mut self, x: Id) -> V {
        let last = id(self.nodes.len() - 1);
        let removed = self.nodes.swap_remove(x.idx());
        if x != last {
            let [left, right] = self.node(x).ch;
            for child in [left, right] {
                if !child.is_nil() {
                    self.node_mut(child).parent = x;
                }
            }
            let parent = self.node(x).parent;
            self.replace_child(parent, last, x);
        }
        removed.value
    }

    fn walk<E, F>(&self, x: Id, order: Traversal, visit: &mut F) -> Result<(), E>
    where
        F: FnMut(&K, &V) -> Result<(), E>,
    {
        if x.is_nil() {
            return Ok(());
        }
        let node = self.node(x);
        let [left, right] = node.ch;
        match order {
            Traversal::Infix => {
                self.walk(left, order, visit)?;
                visit(&node.key, &node.value)?;
                self.walk(right, order, visit)
            }
            Traversal::Prefix => {
                visit(&node.key, &node.value)?;
                self.walk(left, order, visit)?;
                self.walk(right, order, visit)
            }
            Traversal::Postfix => {
                self.walk(left, order, visit)?;
                self.walk(right, order, visit)?;
                visit(&node.key, &node.value)
            }
        }
    }

    /// In-order audit of the subtree at `x`; returns the number of black
    /// nodes on each path from `x` (inclusive) to an empty subtree.
    fn audit<'a>(
        &'a self,
        x: Id,
        expected_parent: Id,
        position: &mut usize,
        prev: &mut Option<&'a K>,
    ) -> Result<usize, InvariantViolation> {
        if x.is_nil() {
            return Ok(0);
        }
        let node = self.node(x);
        let [left, right] = node.ch;
        let left_bh = self.audit(left, x, position, prev)?;

        let here = *position;
        if node.parent != expected_parent {
            return Err(InvariantViolation::BrokenParentLink { position: here });
        }
        if prev.is_some_and(|p| p >= &node.key) {
            return Err(InvariantViolation::OutOfOrder { position: here });
        }
        if node.red && (self.is_red(left) || self.is_red(right)) {
            return Err(InvariantViolation::RedRedEdge { position: here });
        }
        *prev = Some(&node.key);
        *position += 1;

        let right_bh = self.audit(right, x, position, prev)?;
        if left_bh != right_bh {
            return Err(InvariantViolation::BlackHeightMismatch {
                position: here,
                left: left_bh,
                right: right_bh,
            });
        }
        Ok(left_bh + usize::from(!node.red))
    }
}

impl<K: Ord, V> OrderedMap for RbTreeMap<K, V> {
    type Key = K;
    type Value = V;

    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: Id::NIL,
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn get(&self, key: &Self::Key) -> Option<&Self::Value> {
        let x = self.find(key);
        if x.is_nil() {
            None
        } else {
            Some(&self.node(x).value)
        }
    }

    fn insert(&mut self, key: Self::Key, value: Self::Value) -> Option<Self::Value> {
        let mut parent = Id::NIL;
        let mut side = LEFT;
        let mut cur = self.root;
        while !cur.is_nil() {
            let node = &mut self.nodes[cur.idx()];
            side = match key.cmp(&node.key) {
                Ordering::Less => LEFT,
                Ordering::Greater => RIGHT,
                Ordering::Equal => return Some(std::mem::replace(&mut node.value, value)),
            };
            parent = cur;
            cur = node.ch[side];
        }

        let x = id(self.nodes.len());
        self.nodes.push(Node::new(key, value, parent));
        if parent.is_nil() {
            self.root = x;
        } else {
            self.node_mut(parent).ch[side] = x;
        }
        self.insert_fix_up(x);
        None
    }

    fn remove(&mut self, key: &Self::Key) -> Option<Self::Value> {
        let target = self.find(key);
        if target.is_nil() {
            return None;
        }

        // The unlinked node has at most one child: a two-child target trades
        // its entry with its in-order successor, which has no left child.
        let [left, right] = self.node(target).ch;
        let unlinked = if !left.is_nil() && !right.is_nil() {
            let successor = self.min_from(right);
            self.swap_entries(target, successor);
            successor
        } else {
            target
        };

        let [left, right] = self.node(unlinked).ch;
        let child = if left.is_nil() { right } else { left };
        let parent = self.node(unlinked).parent;
        if !child.is_nil() {
            self.node_mut(child).parent = parent;
        }
        self.replace_child(parent, unlinked, child);
        if !self.node(unlinked).red {
            self.remove_fix_up(child, parent);
        }

        Some(self.release(unlinked))
    }

    fn clear(&mut self) {
        log::debug!("rb: clearing {} entries", self.nodes.len());
        self.nodes.clear();
        self.root = Id::NIL;
    }

    fn first_key_value(&self) -> Option<(&Self::Key, &Self::Value)> {
        let x = self.extreme_from(self.root, LEFT);
        (!x.is_nil()).then(|| {
            let node = self.node(x);
            (&node.key, &node.value)
        })
    }

    fn last_key_value(&self) -> Option<(&Self::Key, &Self::Value)> {
        let x = self.extreme_from(self.root, RIGHT);
        (!x.is_nil()).then(|| {
            let node = self.node(x);
            (&node.key, &node.value)
        })
    }

    fn try_traverse<E, F>(&self, order: Traversal, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&Self::Key, &Self::Value) -> Result<(), E>,
    {
        self.walk(self.root, order, &mut visit)
    }

    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.is_red(self.root) {
            return Err(InvariantViolation::RedRoot);
        }
        let mut counted = 0;
        self.audit(self.root, Id::NIL, &mut counted, &mut None)?;
        if counted != self.nodes.len() {
            return Err(InvariantViolation::LenMismatch {
                recorded: self.nodes.len(),
                counted,
            });
        }
        Ok(())
    }
}

impl<K: Ord, V> Default for RbTreeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for RbTreeMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for RbTreeMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V> Extend<(K, V)> for RbTreeMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a RbTreeMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order iterator over an [`RbTreeMap`], stepping through parent links.
pub struct Iter<'a, K: Ord, V> {
    map: &'a RbTreeMap<K, V>,
    next: Id,
    remaining: usize,
}

impl<'a, K: Ord, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next.is_nil() {
            return None;
        }
        let map = self.map;
        let node = map.node(self.next);
        self.next = map.successor(self.next);
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Ord, V> ExactSizeIterator for Iter<'_, K, V> {}
