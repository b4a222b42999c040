//! Brick: an interpreter for programs assembled from visual code blocks.
//!
//! A program is a list of [`builder::Block`]s, assembled into a [`Node`]
//! tree and walked by the [`Interpreter`].

pub mod array;
pub mod ast;
pub mod builder;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod interpreter;
pub mod lexer;
pub mod normalizer;
pub mod value;

pub use array::ArrayStore;
pub use ast::{Node, NodeKind};
pub use builder::{build, from_json, Block, BuildError};
pub use error::{ErrorKind, RuntimeError};
pub use interpreter::{Config, ConsoleOutput, ControlSignal, Interpreter};
pub use value::{ScalarType, Value};
