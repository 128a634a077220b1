use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Coarse classification of a node's specialization state.
///
/// The computed states are ordered `Uninitialized < Monomorphic < Polymorphic <
/// Megamorphic` and a node only ever moves forward through them. `None` is
/// never computed; it exists so a declaration can report it verbatim.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Display,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeCost {
    #[display("NONE")]
    None,
    #[default]
    #[display("UNINITIALIZED")]
    Uninitialized,
    #[display("MONOMORPHIC")]
    Monomorphic,
    #[display("POLYMORPHIC")]
    Polymorphic,
    #[display("MEGAMORPHIC")]
    Megamorphic,
}

impl NodeCost {
    /// Classify a chain holding `activations` entries.
    pub fn classify(activations: usize, collapsed: bool) -> NodeCost {
        if collapsed {
            return NodeCost::Megamorphic;
        }
        match activations {
            0 => NodeCost::Uninitialized,
            1 => NodeCost::Monomorphic,
            _ => NodeCost::Polymorphic,
        }
    }

    /// The cost after a chain mutation, never lower than `previous`.
    pub fn advance(previous: NodeCost, activations: usize, collapsed: bool) -> NodeCost {
        previous.max(NodeCost::classify(activations, collapsed))
    }

    pub fn is_trivial(self) -> bool {
        matches!(self, NodeCost::None | NodeCost::Uninitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_follows_activation_count() {
        assert_eq!(NodeCost::classify(0, false), NodeCost::Uninitialized);
        assert_eq!(NodeCost::classify(1, false), NodeCost::Monomorphic);
        assert_eq!(NodeCost::classify(2, false), NodeCost::Polymorphic);
        assert_eq!(NodeCost::classify(3, false), NodeCost::Polymorphic);
        assert_eq!(NodeCost::classify(1, true), NodeCost::Megamorphic);
    }

    #[test]
    fn advance_never_decreases() {
        let cost = NodeCost::advance(NodeCost::Polymorphic, 1, false);
        assert_eq!(cost, NodeCost::Polymorphic);
        let cost = NodeCost::advance(NodeCost::Monomorphic, 0, false);
        assert_eq!(cost, NodeCost::Monomorphic);
        let cost = NodeCost::advance(NodeCost::Polymorphic, 1, true);
        assert_eq!(cost, NodeCost::Megamorphic);
    }
}
