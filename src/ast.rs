use crate::value::ScalarType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Root,
    Assign,
    If,
    Elif,
    Else,
    While,
    For,
    Print,
    Println,
    Append,
    Pop,
    Remove,
    FunctionDecl,
    Return(ScalarType),
    Variable(ScalarType), // typed terminal: assignment target or value expression
    Break,
    Continue,
}

impl NodeKind {
    /// Kinds whose children form a body.
    pub fn has_body(self) -> bool {
        matches!(
            self,
            NodeKind::Root
                | NodeKind::If
                | NodeKind::Elif
                | NodeKind::Else
                | NodeKind::While
                | NodeKind::For
                | NodeKind::FunctionDecl
        )
    }
}

/// A node of the block tree. Immutable once built, so one tree can be run
/// any number of times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: usize,
    pub kind: NodeKind,
    pub text: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: usize, kind: NodeKind, text: impl Into<String>) -> Self {
        Node {
            id,
            kind,
            text: text.into(),
            children: Vec::new(),
        }
    }

    pub fn root(children: Vec<Node>) -> Self {
        Node {
            id: 0,
            kind: NodeKind::Root,
            text: String::new(),
            children,
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// `type name = value` as the two-terminal `Assign` node.
    pub fn assign(id: usize, ty: ScalarType, target: &str, value: &str) -> Self {
        Node::new(id, NodeKind::Assign, "").with_children(vec![
            Node::new(id, NodeKind::Variable(ty), target),
            Node::new(id, NodeKind::Variable(ScalarType::Void), value),
        ])
    }

    /// Number of nodes in this subtree.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Node::size).sum::<usize>()
    }
}
