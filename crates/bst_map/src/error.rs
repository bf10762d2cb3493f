use thiserror::Error;

/// A broken structural rule found by [`OrderedMap::check_invariants`].
///
/// `position` is the in-order rank of the offending node, so a report can be
/// matched against `iter()` output without requiring `K: Debug`.
///
/// [`OrderedMap::check_invariants`]: crate::OrderedMap::check_invariants
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("recorded len {recorded} but {counted} nodes are reachable")]
    LenMismatch { recorded: usize, counted: usize },

    #[error("key at position {position} is not greater than its predecessor")]
    OutOfOrder { position: usize },

    #[error("node at position {position} stores height {stored}, expected {expected}")]
    StaleHeight {
        position: usize,
        stored: i32,
        expected: i32,
    },

    #[error("node at position {position} has balance factor {balance}")]
    Unbalanced { position: usize, balance: i32 },

    #[error("root is red")]
    RedRoot,

    #[error("red node at position {position} has a red child")]
    RedRedEdge { position: usize },

    #[error("node at position {position} has black-heights {left} (left) and {right} (right)")]
    BlackHeightMismatch {
        position: usize,
        left: usize,
        right: usize,
    },

    #[error("node at position {position} does not point back to its parent")]
    BrokenParentLink { position: usize },
}

#[cfg(test)]
mod tests {
    use super::InvariantViolation;

    #[test]
    fn messages_name_the_rule() {
        let err = InvariantViolation::Unbalanced {
            position: 3,
            balance: 2,
        };
        assert_eq!(err.to_string(), "node at position 3 has balance factor 2");

        let err = InvariantViolation::LenMismatch {
            recorded: 4,
            counted: 5,
        };
        assert_eq!(
            err.to_string(),
            "recorded len 4 but 5 nodes are reachable"
        );
        assert_eq!(InvariantViolation::RedRoot.to_string(), "root is red");
    }
}
