//! Shared helpers for the integration tests.

#![allow(dead_code)]

use bst_map::OrderedMap;
use simplelog::{Config, LevelFilter, TestLogger};

/// Routes the crate's `log` records into the test harness output. Safe to
/// call from every test; only the first call installs the logger.
pub fn init_logging() {
    let _ = TestLogger::init(LevelFilter::Debug, Config::default());
}

#[derive(Clone, Debug)]
pub enum Op {
    Put(i16, i32),
    Remove(i16),
}

/// Applies `ops` to a fresh map, auditing the structure after every step.
pub fn replay<M>(ops: &[Op]) -> M
where
    M: OrderedMap<Key = i16, Value = i32>,
{
    let mut map = M::new();
    for (step, op) in ops.iter().enumerate() {
        match *op {
            Op::Put(key, value) => map.put(key, value),
            Op::Remove(key) => {
                map.remove(&key);
            }
        }
        if let Err(violation) = map.check_invariants() {
            panic!("step {step} ({op:?}): {violation}");
        }
    }
    map
}

pub fn infix_keys<M: OrderedMap>(map: &M) -> Vec<M::Key>
where
    M::Key: Clone,
{
    let mut keys = Vec::with_capacity(map.len());
    map.for_each_infix(|key, _| keys.push(key.clone()));
    keys
}
