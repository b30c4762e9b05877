//! Node kinds and the per-node record stored in a [`super::Graph`].

use std::fmt;

/// Stable index of a node inside its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Stable index of a block inside its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Which output of a multi-output node a projection selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    /// The computed value of a `Div`, `Mod` or `Call`.
    Result,
    /// The ordering token of `Start`, `Div`, `Mod` or `Call`.
    SideEffect,
    /// Branch taken when the condition of an `If`/`While` is non-zero.
    True,
    /// Branch taken when the condition is zero.
    False,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Start,
    Return,
    ConstInt(i32),
    ConstBool(bool),
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    LogicalAnd,
    LogicalOr,
    LogicalNot,
    If,
    While,
    Jump,
    Break,
    Continue,
    /// `side_effect` phis merge ordering tokens and never hold a runtime value.
    Phi { side_effect: bool },
    Projection(ProjectionKind),
    Parameter(u32),
    Call(String),
}

impl NodeKind {
    /// Binary operators whose operand layout is `[left, right]` and that have no
    /// ordering dependency.
    pub fn is_pure_binary(&self) -> bool {
        matches!(
            self,
            NodeKind::Add
                | NodeKind::Sub
                | NodeKind::Mul
                | NodeKind::BitAnd
                | NodeKind::BitOr
                | NodeKind::BitXor
                | NodeKind::ShiftLeft
                | NodeKind::ShiftRight
                | NodeKind::Less
                | NodeKind::LessEqual
                | NodeKind::Greater
                | NodeKind::GreaterEqual
                | NodeKind::Equal
                | NodeKind::NotEqual
                | NodeKind::LogicalAnd
                | NodeKind::LogicalOr
        )
    }

    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            NodeKind::Add
                | NodeKind::Mul
                | NodeKind::BitAnd
                | NodeKind::BitOr
                | NodeKind::BitXor
                | NodeKind::Equal
                | NodeKind::NotEqual
                | NodeKind::LogicalAnd
                | NodeKind::LogicalOr
        )
    }

    /// Nodes that may be deduplicated by value.
    pub fn is_pure(&self) -> bool {
        self.is_pure_binary()
            || matches!(
                self,
                NodeKind::ConstInt(_) | NodeKind::ConstBool(_) | NodeKind::LogicalNot
            )
    }

    /// Nodes that end a block and transfer control.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            NodeKind::Return
                | NodeKind::If
                | NodeKind::While
                | NodeKind::Jump
                | NodeKind::Break
                | NodeKind::Continue
        )
    }

    /// Whether a node of this kind produces a runtime value that needs a register.
    pub fn has_value(&self) -> bool {
        match self {
            NodeKind::Start
            | NodeKind::Return
            | NodeKind::If
            | NodeKind::While
            | NodeKind::Jump
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Projection(_) => false,
            NodeKind::Phi { side_effect } => !side_effect,
            NodeKind::ConstInt(_)
            | NodeKind::ConstBool(_)
            | NodeKind::Add
            | NodeKind::Sub
            | NodeKind::Mul
            | NodeKind::Div
            | NodeKind::Mod
            | NodeKind::BitAnd
            | NodeKind::BitOr
            | NodeKind::BitXor
            | NodeKind::ShiftLeft
            | NodeKind::ShiftRight
            | NodeKind::Less
            | NodeKind::LessEqual
            | NodeKind::Greater
            | NodeKind::GreaterEqual
            | NodeKind::Equal
            | NodeKind::NotEqual
            | NodeKind::LogicalAnd
            | NodeKind::LogicalOr
            | NodeKind::LogicalNot
            | NodeKind::Parameter(_)
            | NodeKind::Call(_) => true,
        }
    }

    /// Comparison with its operands exchanged, e.g. `a < b` becomes `b > a`.
    pub fn swapped_comparison(&self) -> Option<NodeKind> {
        Some(match self {
            NodeKind::Less => NodeKind::Greater,
            NodeKind::LessEqual => NodeKind::GreaterEqual,
            NodeKind::Greater => NodeKind::Less,
            NodeKind::GreaterEqual => NodeKind::LessEqual,
            NodeKind::Equal => NodeKind::Equal,
            NodeKind::NotEqual => NodeKind::NotEqual,
            _ => return None,
        })
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::ConstInt(value) => write!(f, "ConstInt[{value}]"),
            NodeKind::ConstBool(value) => write!(f, "ConstBool[{value}]"),
            NodeKind::Phi { side_effect: true } => write!(f, "Phi[effect]"),
            NodeKind::Phi { side_effect: false } => write!(f, "Phi"),
            NodeKind::Projection(kind) => write!(f, "Proj[{kind:?}]"),
            NodeKind::Parameter(index) => write!(f, "Param[{index}]"),
            NodeKind::Call(callee) => write!(f, "Call[{callee}]"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// One operation instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub block: BlockId,
    pub operands: Vec<NodeId>,
}

impl Node {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    /// Ordering operand of `Div`/`Mod`.
    pub const DIV_SIDE_EFFECT: usize = 2;
    /// Ordering operand of `Return` and `Call`.
    pub const SIDE_EFFECT: usize = 0;
    pub const RETURN_RESULT: usize = 1;
    pub const CONDITION: usize = 0;

    pub fn new(kind: NodeKind, block: BlockId, operands: Vec<NodeId>) -> Self {
        Self {
            kind,
            block,
            operands,
        }
    }

    pub fn operand(&self, index: usize) -> NodeId {
        self.operands[index]
    }

    pub fn const_int(&self) -> Option<i32> {
        match self.kind {
            NodeKind::ConstInt(value) => Some(value),
            _ => None,
        }
    }

    /// Integer view of a constant; booleans read as `0`/`1`.
    pub fn const_value(&self) -> Option<i32> {
        match self.kind {
            NodeKind::ConstInt(value) => Some(value),
            NodeKind::ConstBool(value) => Some(value as i32),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_effect_phis_have_no_value() {
        assert!(NodeKind::Phi { side_effect: false }.has_value());
        assert!(!NodeKind::Phi { side_effect: true }.has_value());
        assert!(!NodeKind::Projection(ProjectionKind::Result).has_value());
        assert!(NodeKind::Div.has_value());
    }

    #[test]
    fn div_and_mod_are_not_pure() {
        assert!(!NodeKind::Div.is_pure());
        assert!(!NodeKind::Mod.is_pure());
        assert!(NodeKind::Add.is_pure());
        assert!(NodeKind::ConstInt(3).is_pure());
    }

    #[test]
    fn swapped_comparisons_mirror() {
        assert_eq!(NodeKind::Less.swapped_comparison(), Some(NodeKind::Greater));
        assert_eq!(NodeKind::GreaterEqual.swapped_comparison(), Some(NodeKind::LessEqual));
        assert_eq!(NodeKind::Add.swapped_comparison(), None);
    }
}
