//! User-defined functions: signature parsing, declaration checks and the
//! registry the interpreter dispatches calls through.

use crate::ast::{Node, NodeKind};
use crate::error::{AtNode, ErrorKind, RuntimeError};
use crate::lexer::{tokenize, Token};
use crate::value::{ScalarType, Value};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: ScalarType,
    /// Final value is copied back into the caller's variable.
    pub by_ref: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: ScalarType,
}

impl Signature {
    /// Parse `name(a: Int, &b: Int[]) -> Bool`. A `: Type` suffix is accepted
    /// in place of the arrow, and a missing return type means `Void`.
    pub fn parse(text: &str) -> Result<Self, ErrorKind> {
        let tokens = tokenize(text)
            .map_err(|bad| ErrorKind::Syntax(format!("unexpected character '{}' in signature", bad)))?
            .into_iter()
            .map(|spanned| spanned.token)
            .collect();
        SignatureParser { tokens, pos: 0 }.signature()
    }
}

struct SignatureParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl SignatureParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ErrorKind> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(ErrorKind::Syntax(format!("expected {}, found {}", expected, t))),
            None => Err(ErrorKind::Syntax(format!("expected {}, found end of signature", expected))),
        }
    }

    fn name(&mut self) -> Result<String, ErrorKind> {
        match self.advance() {
            Some(Token::Identifier(name)) => Ok(name),
            Some(t) => Err(ErrorKind::InvalidVariableName(t.to_string())),
            None => Err(ErrorKind::InvalidVariableName(String::new())),
        }
    }

    fn signature(mut self) -> Result<Signature, ErrorKind> {
        let name = self.name()?;
        self.expect(Token::LParen)?;

        let mut params: Vec<Parameter> = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.advance();
        } else {
            loop {
                let param = self.parameter()?;
                if params.iter().any(|p| p.name == param.name) {
                    return Err(ErrorKind::AlreadyDeclared(param.name));
                }
                params.push(param);
                match self.advance() {
                    Some(Token::Comma) => continue,
                    Some(Token::RParen) => break,
                    Some(t) => return Err(ErrorKind::Syntax(format!("expected , or ), found {}", t))),
                    None => return Err(ErrorKind::Syntax("unclosed parameter list".to_string())),
                }
            }
        }

        let return_type = match self.advance() {
            None => ScalarType::Void,
            Some(Token::Arrow | Token::Colon) => self.ty()?,
            Some(t) => return Err(ErrorKind::Syntax(format!("unexpected {} after parameters", t))),
        };
        if let Some(t) = self.peek() {
            return Err(ErrorKind::Syntax(format!("unexpected {} at end of signature", t)));
        }
        Ok(Signature {
            name,
            params,
            return_type,
        })
    }

    fn parameter(&mut self) -> Result<Parameter, ErrorKind> {
        let by_ref = self.peek() == Some(&Token::Ampersand);
        if by_ref {
            self.advance();
        }
        let name = self.name()?;
        self.expect(Token::Colon)?;
        let ty = self.ty()?;
        if ty == ScalarType::Void {
            return Err(ErrorKind::TypeMismatch {
                expected: "a parameter type".to_string(),
                found: ty.to_string(),
            });
        }
        Ok(Parameter { name, ty, by_ref })
    }

    fn ty(&mut self) -> Result<ScalarType, ErrorKind> {
        let base = match self.advance() {
            Some(Token::Identifier(base)) => base,
            Some(t) => return Err(ErrorKind::Syntax(format!("expected a type, found {}", t))),
            None => return Err(ErrorKind::Syntax("expected a type".to_string())),
        };
        if self.peek() == Some(&Token::LBracket) {
            self.advance();
            self.expect(Token::RBracket)?;
            return format!("{}[]", base).parse();
        }
        base.parse()
    }
}

/// A declared function. The body is a copy of the declaration's children.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: ScalarType,
    pub body: Vec<Node>,
    pub node_id: usize,
}

impl Function {
    pub fn check_arity(&self, found: usize) -> Result<(), ErrorKind> {
        if found != self.params.len() {
            return Err(ErrorKind::Arity {
                name: self.name.clone(),
                expected: self.params.len(),
                found,
            });
        }
        Ok(())
    }

    /// Check the value produced by the body against the declared return type.
    pub fn check_return(&self, value: Value) -> Result<Value, ErrorKind> {
        let mismatch = |found: ScalarType| ErrorKind::ReturnTypeMismatch {
            name: self.name.clone(),
            declared: self.return_type.to_string(),
            found: found.to_string(),
        };
        match (self.return_type, value) {
            (ScalarType::Void, Value::Void) => Ok(Value::Void),
            (ScalarType::Void, other) => Err(mismatch(other.scalar_type())),
            (_, Value::Void) => Err(mismatch(ScalarType::Void)),
            (declared, value) => {
                let found = value.scalar_type();
                declared.admit(value).map_err(|_| mismatch(found))
            }
        }
    }
}

/// Whether a `Return` node typed `found` may appear in a function returning `declared`.
/// An `Int` block in a `Bool` function is accepted here and must yield 0 or 1 at run time.
fn compatible(declared: ScalarType, found: ScalarType) -> bool {
    (found == ScalarType::Void && declared != ScalarType::Void)
        || found == declared
        || (declared == ScalarType::Double && found == ScalarType::Int)
        || (declared == ScalarType::Bool && found == ScalarType::Int)
}

fn check_returns(function: &Function, nodes: &[Node]) -> Result<(), RuntimeError> {
    for node in nodes {
        match node.kind {
            NodeKind::FunctionDecl => continue,
            NodeKind::Return(found) if !compatible(function.return_type, found) => {
                return Err(ErrorKind::ReturnTypeMismatch {
                    name: function.name.clone(),
                    declared: function.return_type.to_string(),
                    found: found.to_string(),
                })
                .at_node(node.id);
            }
            _ => check_returns(function, &node.children)?,
        }
    }
    Ok(())
}

/// Split a call argument into its reference marker and expression.
pub fn reference_argument(arg: &str) -> Option<&str> {
    arg.trim().strip_prefix('&').map(str::trim)
}

/// Declared functions. Names are unique within a run; a registry kept across
/// runs lets a later run redeclare (and so replace) an earlier definition.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Rc<Function>>,
    declared_this_run: HashSet<String>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry::default()
    }

    /// Register the function declared by a `FunctionDecl` node.
    pub fn declare(&mut self, node: &Node) -> Result<Rc<Function>, RuntimeError> {
        let signature = Signature::parse(&node.text).at_node(node.id)?;
        if self.declared_this_run.contains(&signature.name) {
            return Err(ErrorKind::AlreadyDeclared(signature.name)).at_node(node.id);
        }

        let function = Function {
            name: signature.name,
            params: signature.params,
            return_type: signature.return_type,
            body: node.children.clone(),
            node_id: node.id,
        };
        check_returns(&function, &function.body).map_err(|e| e.at(node.id))?;

        debug!(
            name = %function.name,
            params = function.params.len(),
            returns = %function.return_type,
            "declared function"
        );
        let function = Rc::new(function);
        self.declared_this_run.insert(function.name.clone());
        self.functions.insert(function.name.clone(), Rc::clone(&function));
        Ok(function)
    }

    pub fn get(&self, name: &str) -> Option<Rc<Function>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn clear(&mut self) {
        self.functions.clear();
        self.declared_this_run.clear();
    }

    /// Start a new run: existing definitions stay callable but may be redeclared.
    pub fn start_run(&mut self) {
        self.declared_this_run.clear();
    }

    /// Declared names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}
