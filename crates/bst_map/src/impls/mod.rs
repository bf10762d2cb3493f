mod avl;
mod rb;

pub use avl::AvlTreeMap;
pub use rb::RbTreeMap;

pub mod iter {
    pub use super::avl::Iter as AvlIter;
    pub use super::rb::Iter as RbIter;
}
