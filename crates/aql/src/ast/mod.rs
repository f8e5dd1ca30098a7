//! AST module for filter expressions.
//!
//! Only the surface the range algebra needs: telling literals from
//! expressions, serializing nodes, and rebuilding serialized nodes inside the
//! query's arena.

mod node;

pub use node::{Ast, AstNode, BinaryOp, NodeId};
