//! Typed-tree output: per-node inferred types and coercion holes.
//!
//! The checker never mutates the input AST; downstream consumers read this
//! parallel annotation instead. A hole records that the node's actual type
//! failed to coerce to the expected one and precision was lost there.

use rustc_hash::FxHashMap;
use vesta_ast::NodeId;
use vesta_solver::{TypeHole, TypeId};

#[derive(Debug, Default)]
pub struct TypedTree {
    node_types: FxHashMap<NodeId, TypeId>,
    holes: FxHashMap<NodeId, TypeHole>,
}

impl TypedTree {
    pub fn set_type(&mut self, node: NodeId, ty: TypeId) {
        self.node_types.insert(node, ty);
    }

    pub fn set_hole(&mut self, node: NodeId, hole: TypeHole) {
        self.holes.insert(node, hole);
    }

    pub fn type_of(&self, node: NodeId) -> Option<TypeId> {
        self.node_types.get(&node).copied()
    }

    pub fn hole_at(&self, node: NodeId) -> Option<TypeHole> {
        self.holes.get(&node).copied()
    }

    pub fn holes(&self) -> impl Iterator<Item = (NodeId, TypeHole)> + '_ {
        self.holes.iter().map(|(&id, &hole)| (id, hole))
    }
}
