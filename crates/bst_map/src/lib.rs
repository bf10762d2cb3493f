pub mod error;
pub mod impls;

use std::collections::BTreeSet;
use std::convert::Infallible;

pub use error::InvariantViolation;
pub use impls::{AvlTreeMap, RbTreeMap};

/// Depth-first visiting order used by [`OrderedMap::try_traverse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Traversal {
    /// Left subtree, node, right subtree. Yields keys in ascending order.
    Infix,
    /// Node, left subtree, right subtree.
    Prefix,
    /// Left subtree, right subtree, node.
    Postfix,
}

/// Ordered map interface.
///
/// - Keys are unique.
/// - `insert` overwrites the existing value and returns the old one; `put` is
///   the same without the return value.
/// - `remove` of an absent key is a no-op and leaves `len` untouched.
/// - `first_key_value` / `last_key_value` return the smallest / largest entry.
/// - Traversals are synchronous and walk the whole tree from scratch on every
///   call. A visitor that panics unwinds through the walk; a visitor that
///   returns `Err` from [`try_traverse`](Self::try_traverse) stops it.
pub trait OrderedMap {
    type Key: Ord;
    type Value;

    fn new() -> Self;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, key: &Self::Key) -> Option<&Self::Value>;

    fn contains_key(&self, key: &Self::Key) -> bool {
        self.get(key).is_some()
    }

    /// Returns a copy of the stored value, or `default` when `key` is absent.
    fn get_or_default(&self, key: &Self::Key, default: Self::Value) -> Self::Value
    where
        Self::Value: Clone,
    {
        self.get(key).cloned().unwrap_or(default)
    }

    fn insert(&mut self, key: Self::Key, value: Self::Value) -> Option<Self::Value>;

    fn put(&mut self, key: Self::Key, value: Self::Value) {
        self.insert(key, value);
    }

    fn remove(&mut self, key: &Self::Key) -> Option<Self::Value>;

    fn clear(&mut self);

    fn first_key_value(&self) -> Option<(&Self::Key, &Self::Value)>;

    fn last_key_value(&self) -> Option<(&Self::Key, &Self::Value)>;

    /// Visits every entry in `order`, stopping at the first error.
    fn try_traverse<E, F>(&self, order: Traversal, visit: F) -> Result<(), E>
    where
        F: FnMut(&Self::Key, &Self::Value) -> Result<(), E>;

    fn for_each_infix<F>(&self, visit: F)
    where
        F: FnMut(&Self::Key, &Self::Value),
    {
        self.for_each(Traversal::Infix, visit);
    }

    fn for_each_prefix<F>(&self, visit: F)
    where
        F: FnMut(&Self::Key, &Self::Value),
    {
        self.for_each(Traversal::Prefix, visit);
    }

    fn for_each_postfix<F>(&self, visit: F)
    where
        F: FnMut(&Self::Key, &Self::Value),
    {
        self.for_each(Traversal::Postfix, visit);
    }

    fn for_each<F>(&self, order: Traversal, mut visit: F)
    where
        F: FnMut(&Self::Key, &Self::Value),
    {
        let Ok(()) = self.try_traverse(order, |key, value| {
            visit(key, value);
            Ok::<(), Infallible>(())
        });
    }

    /// Every live key, collected by an in-order walk.
    fn keys(&self) -> BTreeSet<Self::Key>
    where
        Self::Key: Clone,
    {
        let mut keys = BTreeSet::new();
        self.for_each_infix(|key, _| {
            keys.insert(key.clone());
        });
        keys
    }

    /// Every value, in ascending key order.
    fn values(&self) -> Vec<Self::Value>
    where
        Self::Value: Clone,
    {
        let mut values = Vec::with_capacity(self.len());
        self.for_each_infix(|_, value| values.push(value.clone()));
        values
    }

    /// Audits the whole tree: key order, entry count and the engine's
    /// balance rules. O(n).
    fn check_invariants(&self) -> Result<(), InvariantViolation>;
}
