use thiserror::Error;

/// What went wrong, independent of where.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("Undeclared variable: {0}")]
    UndeclaredVariable(String),
    #[error("Invalid variable name: {0}")]
    InvalidVariableName(String),
    #[error("Already declared: {0}")]
    AlreadyDeclared(String),
    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Undeclared function: {0}")]
    UndeclaredFunction(String),
    #[error("Function {name} expects {expected} arguments, got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Function {name} returns {declared}, found {found}")]
    ReturnTypeMismatch {
        name: String,
        declared: String,
        found: String,
    },
    #[error("Invalid node: {0}")]
    InvalidNode(String),
    #[error("Step budget of {0} exhausted")]
    StepBudgetExhausted(u64),
    #[error("Run cancelled")]
    Cancelled,
}

/// A failure attributed to the blocks it passed through, innermost first.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} (block {origin})", origin = first_block(.blocks))]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub blocks: Vec<usize>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, node_id: usize) -> Self {
        RuntimeError {
            kind,
            blocks: vec![node_id],
        }
    }

    /// Attach an enclosing block while propagating.
    pub fn at(mut self, node_id: usize) -> Self {
        if self.blocks.last() != Some(&node_id) {
            self.blocks.push(node_id);
        }
        self
    }

    /// The block where the fault was first detected.
    pub fn origin(&self) -> usize {
        first_block(&self.blocks)
    }

    /// `(kind, block)` pairs for the editor to highlight.
    pub fn pairs(&self) -> Vec<(ErrorKind, usize)> {
        self.blocks.iter().map(|id| (self.kind.clone(), *id)).collect()
    }
}

fn first_block(blocks: &[usize]) -> usize {
    blocks.first().copied().unwrap_or_default()
}

/// Extension for attaching a node id to component-level failures.
pub trait AtNode<T> {
    fn at_node(self, node_id: usize) -> Result<T, RuntimeError>;
}

impl<T> AtNode<T> for Result<T, ErrorKind> {
    fn at_node(self, node_id: usize) -> Result<T, RuntimeError> {
        self.map_err(|kind| RuntimeError::new(kind, node_id))
    }
}
