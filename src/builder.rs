//! Assembles the flat block list produced by the editor into a [`Node`] tree.
//!
//! Container blocks (conditions, loops, functions) are followed by a `begin`
//! ... `end` pair holding their body.

use crate::ast::{Node, NodeKind};
use crate::value::ScalarType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Block {0} has no matching end")]
    UnclosedBlock(usize),
    #[error("End delimiter at position {0} closes nothing")]
    UnmatchedEnd(usize),
    #[error("Begin delimiter at position {0} does not follow a container block")]
    UnexpectedBegin(usize),
    #[error("Block {0} needs a body")]
    MissingBody(usize),
    #[error("Block id {0} is reserved or used twice")]
    DuplicateId(usize),
    #[error("Invalid program: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    If,
    Elif,
    Else,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    For,
    While,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayMethodKind {
    Append,
    Pop,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Break,
    Continue,
}

/// One block as the editor stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum Block {
    Variable {
        id: usize,
        #[serde(rename = "type", default)]
        ty: ScalarType,
        #[serde(default)]
        name: String,
        value: String,
    },
    Output {
        id: usize,
        value: String,
        #[serde(default)]
        newline: bool,
    },
    Condition {
        id: usize,
        kind: ConditionKind,
        #[serde(default)]
        condition: String,
    },
    Loop {
        id: usize,
        kind: LoopKind,
        header: String,
    },
    Function {
        id: usize,
        signature: String,
    },
    Return {
        id: usize,
        #[serde(rename = "type", default)]
        ty: ScalarType,
        #[serde(default)]
        value: String,
    },
    ArrayMethod {
        id: usize,
        kind: ArrayMethodKind,
        value: String,
    },
    Flow {
        id: usize,
        kind: FlowKind,
    },
    Begin,
    End,
}

impl Block {
    pub fn id(&self) -> Option<usize> {
        match self {
            Block::Variable { id, .. }
            | Block::Output { id, .. }
            | Block::Condition { id, .. }
            | Block::Loop { id, .. }
            | Block::Function { id, .. }
            | Block::Return { id, .. }
            | Block::ArrayMethod { id, .. }
            | Block::Flow { id, .. } => Some(*id),
            Block::Begin | Block::End => None,
        }
    }

    /// The node for a content block; delimiters have none.
    fn to_node(&self) -> Option<Node> {
        let node = match self {
            Block::Variable { id, ty, name, value } => Node::assign(*id, *ty, name, value),
            Block::Output { id, value, newline } => {
                let kind = if *newline { NodeKind::Println } else { NodeKind::Print };
                Node::new(*id, kind, value.as_str())
            }
            Block::Condition { id, kind, condition } => {
                let kind = match kind {
                    ConditionKind::If => NodeKind::If,
                    ConditionKind::Elif => NodeKind::Elif,
                    ConditionKind::Else => NodeKind::Else,
                };
                Node::new(*id, kind, condition.as_str())
            }
            Block::Loop { id, kind, header } => {
                let kind = match kind {
                    LoopKind::For => NodeKind::For,
                    LoopKind::While => NodeKind::While,
                };
                Node::new(*id, kind, header.as_str())
            }
            Block::Function { id, signature } => Node::new(*id, NodeKind::FunctionDecl, signature.as_str()),
            Block::Return { id, ty, value } => Node::new(*id, NodeKind::Return(*ty), value.as_str()),
            Block::ArrayMethod { id, kind, value } => {
                let kind = match kind {
                    ArrayMethodKind::Append => NodeKind::Append,
                    ArrayMethodKind::Pop => NodeKind::Pop,
                    ArrayMethodKind::Remove => NodeKind::Remove,
                };
                Node::new(*id, kind, value.as_str())
            }
            Block::Flow { id, kind } => {
                let kind = match kind {
                    FlowKind::Break => NodeKind::Break,
                    FlowKind::Continue => NodeKind::Continue,
                };
                Node::new(*id, kind, "")
            }
            Block::Begin | Block::End => return None,
        };
        Some(node)
    }
}

struct TreeBuilder<'a> {
    blocks: &'a [Block],
    pos: usize,
    seen: HashSet<usize>,
}

impl<'a> TreeBuilder<'a> {
    fn peek(&self) -> Option<&'a Block> {
        self.blocks.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Block> {
        let block = self.blocks.get(self.pos);
        self.pos += 1;
        block
    }

    /// Nodes up to the `end` closing `open`, or to the end of input at top level.
    fn sequence(&mut self, open: Option<usize>) -> Result<Vec<Node>, BuildError> {
        let mut nodes = Vec::new();
        loop {
            let position = self.pos;
            match (self.advance(), open) {
                (None, Some(id)) => return Err(BuildError::UnclosedBlock(id)),
                (None, None) => return Ok(nodes),
                (Some(Block::End), Some(_)) => return Ok(nodes),
                (Some(Block::End), None) => return Err(BuildError::UnmatchedEnd(position)),
                (Some(Block::Begin), _) => return Err(BuildError::UnexpectedBegin(position)),
                (Some(block), _) => nodes.push(self.node(block)?),
            }
        }
    }

    fn node(&mut self, block: &'a Block) -> Result<Node, BuildError> {
        let id = block.id().unwrap_or_default();
        if id == 0 || !self.seen.insert(id) {
            return Err(BuildError::DuplicateId(id));
        }
        let Some(node) = block.to_node() else {
            return Err(BuildError::UnexpectedBegin(self.pos));
        };
        if !node.kind.has_body() {
            return Ok(node);
        }
        match self.peek() {
            Some(Block::Begin) => {
                self.advance();
                let body = self.sequence(Some(id))?;
                Ok(node.with_children(body))
            }
            _ => Err(BuildError::MissingBody(id)),
        }
    }
}

/// Build the tree for a block list. The root gets id 0, so block ids must be
/// unique and non-zero.
pub fn build(blocks: &[Block]) -> Result<Node, BuildError> {
    let mut builder = TreeBuilder {
        blocks,
        pos: 0,
        seen: HashSet::new(),
    };
    let children = builder.sequence(None)?;
    Ok(Node::root(children))
}

/// Parse a JSON array of blocks and build its tree.
pub fn from_json(source: &str) -> Result<Node, BuildError> {
    let blocks: Vec<Block> = serde_json::from_str(source)?;
    build(&blocks)
}
