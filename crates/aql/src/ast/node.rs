//! Expression arena definitions.
//!
//! Nodes live in an `Ast` arena owned by the query; everything else refers to
//! them through `NodeId` handles. A handle carries the identity of the arena
//! that issued it, and `Ast::get` rejects handles issued by any other arena.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use strata_core::{Error, JsonObject, JsonValue, Result};

static NEXT_ARENA: AtomicU64 = AtomicU64::new(1);

/// Handle of a node inside an `Ast`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    arena: u64,
    index: usize,
}

impl NodeId {
    /// Position of the node in its arena.
    #[inline]
    pub fn index(self) -> usize {
        self.index
    }
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Times,
    Div,
}

impl BinaryOp {
    /// Returns the operator symbol used in the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Times => "*",
            BinaryOp::Div => "/",
        }
    }

    /// Parses an operator symbol.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "+" => BinaryOp::Plus,
            "-" => BinaryOp::Minus,
            "*" => BinaryOp::Times,
            "/" => BinaryOp::Div,
            _ => return None,
        })
    }

    /// Returns true for `==`, `!=`, `<`, `<=`, `>`, `>=`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Returns the operator with its operands swapped: `a < b` is `b > a`.
    pub fn reversed(self) -> Self {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Ge => BinaryOp::Le,
            other => other,
        }
    }
}

/// Expression node.
#[derive(Clone, Debug, PartialEq)]
pub enum AstNode {
    /// Literal value.
    Value(JsonValue),
    /// Reference to a query variable.
    Reference(String),
    /// `object.name`
    AttributeAccess { object: NodeId, name: String },
    /// Bind parameter `@name`.
    Parameter(String),
    /// Binary operation.
    BinaryOperator {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    /// Function call.
    FunctionCall { name: String, args: Vec<NodeId> },
}

/// Arena owning every expression node of one query.
///
/// Every arena draws a process-unique identity on creation. The arena is not
/// `Clone`: two copies growing apart would hand out equal handles for
/// different nodes.
#[derive(Debug)]
pub struct Ast {
    id: u64,
    nodes: Vec<AstNode>,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    pub fn new() -> Self {
        Self {
            id: NEXT_ARENA.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
        }
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a node and returns its handle.
    pub fn add(&mut self, node: AstNode) -> NodeId {
        self.nodes.push(node);
        NodeId {
            arena: self.id,
            index: self.nodes.len() - 1,
        }
    }

    /// Returns true if `id` was issued by this arena.
    #[inline]
    pub fn owns(&self, id: NodeId) -> bool {
        id.arena == self.id && id.index < self.nodes.len()
    }

    /// Looks up a node; `None` if the handle does not belong to this arena.
    pub fn get(&self, id: NodeId) -> Option<&AstNode> {
        if id.arena != self.id {
            return None;
        }
        self.nodes.get(id.index)
    }

    fn node(&self, id: NodeId) -> Result<&AstNode> {
        self.get(id).ok_or_else(|| {
            Error::invalid_usage(format!("dangling expression node {}", id.index))
        })
    }

    pub fn value(&mut self, value: impl Into<JsonValue>) -> NodeId {
        self.add(AstNode::Value(value.into()))
    }

    pub fn reference(&mut self, name: impl Into<String>) -> NodeId {
        self.add(AstNode::Reference(name.into()))
    }

    pub fn attribute_access(&mut self, object: NodeId, name: impl Into<String>) -> NodeId {
        self.add(AstNode::AttributeAccess {
            object,
            name: name.into(),
        })
    }

    /// Builds `variable.a.b.c` from a dotted path.
    pub fn attribute_path(&mut self, variable: &str, path: &str) -> NodeId {
        let mut node = self.reference(variable);
        for part in path.split('.') {
            node = self.attribute_access(node, part);
        }
        node
    }

    pub fn parameter(&mut self, name: impl Into<String>) -> NodeId {
        self.add(AstNode::Parameter(name.into()))
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add(AstNode::BinaryOperator { op, lhs, rhs })
    }

    pub fn function_call(&mut self, name: impl Into<String>, args: Vec<NodeId>) -> NodeId {
        self.add(AstNode::FunctionCall {
            name: name.into(),
            args,
        })
    }

    /// Returns true if the node is a literal value.
    pub fn is_value(&self, id: NodeId) -> bool {
        matches!(self.get(id), Some(AstNode::Value(_)))
    }

    /// Resolves an attribute access chain rooted at a variable reference into
    /// `(variable, "a.b.c")`.
    pub fn resolve_attribute(&self, id: NodeId) -> Option<(String, String)> {
        let mut parts = Vec::new();
        let mut current = id;
        loop {
            match self.get(current)? {
                AstNode::AttributeAccess { object, name } => {
                    parts.push(name.as_str());
                    current = *object;
                }
                AstNode::Reference(variable) if !parts.is_empty() => {
                    parts.reverse();
                    return Some((variable.clone(), parts.join(".")));
                }
                _ => return None,
            }
        }
    }

    /// Returns true if the subtree below `id` refers to `variable`.
    pub fn references_variable(&self, id: NodeId, variable: &str) -> bool {
        match self.get(id) {
            Some(AstNode::Reference(name)) => name == variable,
            Some(AstNode::AttributeAccess { object, .. }) => {
                self.references_variable(*object, variable)
            }
            Some(AstNode::BinaryOperator { lhs, rhs, .. }) => {
                self.references_variable(*lhs, variable) || self.references_variable(*rhs, variable)
            }
            Some(AstNode::FunctionCall { args, .. }) => {
                args.iter().any(|arg| self.references_variable(*arg, variable))
            }
            Some(AstNode::Value(_)) | Some(AstNode::Parameter(_)) | None => false,
        }
    }

    /// Returns the literal of a value node.
    pub fn literal(&self, id: NodeId) -> Option<&JsonValue> {
        match self.get(id) {
            Some(AstNode::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Serializes the subtree below `id`.
    pub fn to_json(&self, id: NodeId) -> Result<JsonValue> {
        let obj = match self.node(id)? {
            AstNode::Value(value) => JsonObject::new()
                .with("type", "value")
                .with("value", value.clone()),
            AstNode::Reference(name) => JsonObject::new()
                .with("type", "reference")
                .with("name", name.as_str()),
            AstNode::AttributeAccess { object, name } => JsonObject::new()
                .with("type", "attribute access")
                .with("name", name.as_str())
                .with("subNodes", alloc::vec![self.to_json(*object)?]),
            AstNode::Parameter(name) => JsonObject::new()
                .with("type", "parameter")
                .with("name", name.as_str()),
            AstNode::BinaryOperator { op, lhs, rhs } => JsonObject::new()
                .with("type", "binary operator")
                .with("operator", op.as_str())
                .with(
                    "subNodes",
                    alloc::vec![self.to_json(*lhs)?, self.to_json(*rhs)?],
                ),
            AstNode::FunctionCall { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.to_json(*arg))
                    .collect::<Result<Vec<_>>>()?;
                JsonObject::new()
                    .with("type", "function call")
                    .with("name", name.as_str())
                    .with("subNodes", args)
            }
        };
        Ok(JsonValue::Object(obj))
    }

    /// Rebuilds a serialized subtree inside this arena.
    pub fn from_json(&mut self, json: &JsonValue) -> Result<NodeId> {
        let node = match json.get_str("type")? {
            "value" => {
                let value = json
                    .get("value")
                    .ok_or_else(|| Error::malformed("value node without 'value'"))?;
                AstNode::Value(value.clone())
            }
            "reference" => AstNode::Reference(json.get_str("name")?.to_string()),
            "parameter" => AstNode::Parameter(json.get_str("name")?.to_string()),
            "attribute access" => {
                let name = json.get_str("name")?.to_string();
                let [object] = self.sub_nodes::<1>(json)?;
                AstNode::AttributeAccess { object, name }
            }
            "binary operator" => {
                let symbol = json.get_str("operator")?;
                let op = BinaryOp::from_symbol(symbol)
                    .ok_or_else(|| Error::malformed(format!("unknown operator '{}'", symbol)))?;
                let [lhs, rhs] = self.sub_nodes::<2>(json)?;
                AstNode::BinaryOperator { op, lhs, rhs }
            }
            "function call" => {
                let name = json.get_str("name")?.to_string();
                let args = json
                    .get_array("subNodes")?
                    .iter()
                    .map(|arg| self.from_json(arg))
                    .collect::<Result<Vec<_>>>()?;
                AstNode::FunctionCall { name, args }
            }
            other => return Err(Error::malformed(format!("unknown node type '{}'", other))),
        };
        Ok(self.add(node))
    }

    fn sub_nodes<const N: usize>(&mut self, json: &JsonValue) -> Result<[NodeId; N]> {
        let subs = json.get_array("subNodes")?;
        if subs.len() != N {
            return Err(Error::malformed(format!(
                "expected {} sub nodes, got {}",
                N,
                subs.len()
            )));
        }
        let ids = subs
            .iter()
            .map(|sub| self.from_json(sub))
            .collect::<Result<Vec<_>>>()?;
        ids.try_into()
            .map_err(|_| Error::malformed("sub node count changed while rebuilding"))
    }
}
