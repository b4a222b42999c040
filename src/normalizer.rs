//! Rewrites raw block expressions into something the evaluator can run.
//!
//! Works over the token stream rather than the raw text: compound
//! assignments are desugared, bracketed indices are evaluated first
//! (recursively, so `a[b[0]]` works), names are replaced by their current
//! values and function calls are dispatched back to the [`Scope`].

use crate::array::ArrayStore;
use crate::error::{AtNode, ErrorKind, RuntimeError};
use crate::evaluator::evaluate;
use crate::lexer::{tokenize, Spanned, Token};
use crate::value::{ScalarType, Value};
use std::collections::HashMap;

/// What the normalizer needs from the code that owns the bindings.
pub trait Scope {
    fn scalar(&self, name: &str) -> Option<Value>;
    fn array(&self, name: &str) -> Option<&ArrayStore>;
    fn call(&mut self, name: &str, args: &[&str], node_id: usize) -> Result<Value, RuntimeError>;
}

/// `target = value` after compound operators have been expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// The expression is a single value (string, double, bool, whole array, ...).
    Literal(Value),
    /// A bracketed literal still to be built into an [`ArrayStore`].
    ArrayLiteral(String),
    /// Space-separated integer expression ready for [`evaluate`].
    Expression(String),
    Assignment(Assignment),
}

enum Piece {
    Value(Value),
    ArrayLiteral(String),
    Name(String),
    Operator(Token),
}

pub struct Normalizer<'a> {
    scope: &'a mut dyn Scope,
    node_id: usize,
}

impl<'a> Normalizer<'a> {
    pub fn new(scope: &'a mut dyn Scope, node_id: usize) -> Self {
        Normalizer { scope, node_id }
    }

    pub fn normalize(&mut self, expression: &str) -> Result<Normalized, RuntimeError> {
        let node_id = self.node_id;
        let tokens = lex(expression).at_node(node_id)?;
        if tokens.is_empty() {
            return Err(ErrorKind::InvalidValue("empty expression".to_string())).at_node(node_id);
        }
        if let Some(assignment) = desugar_tokens(expression, &tokens).at_node(node_id)? {
            return Ok(Normalized::Assignment(assignment));
        }

        let mut pieces = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i].token {
                Token::Identifier(name) => match tokens.get(i + 1).map(|t| &t.token) {
                    Some(Token::LBracket) => {
                        let close = matching(&tokens, i + 1).at_node(node_id)?;
                        let inner = &expression[tokens[i + 1].span.end..tokens[close].span.start];
                        let index = self.index(inner)?;
                        let value = self
                            .scope
                            .array(name)
                            .ok_or_else(|| ErrorKind::UndeclaredVariable(name.clone()))
                            .and_then(|store| store.get(index))
                            .at_node(node_id)?;
                        pieces.push(Piece::Value(value));
                        i = close + 1;
                    }
                    Some(Token::LParen) => {
                        let close = matching(&tokens, i + 1).at_node(node_id)?;
                        let inner = &expression[tokens[i + 1].span.end..tokens[close].span.start];
                        let args = call_arguments(inner).at_node(node_id)?;
                        let value = self.scope.call(name, &args, node_id)?;
                        pieces.push(Piece::Value(value));
                        i = close + 1;
                    }
                    _ => {
                        if let Some(value) = self.scope.scalar(name) {
                            pieces.push(Piece::Value(value));
                        } else if let Some(store) = self.scope.array(name) {
                            pieces.push(Piece::Value(Value::Array(store.clone())));
                        } else {
                            pieces.push(Piece::Name(name.clone()));
                        }
                        i += 1;
                    }
                },
                Token::LBracket => {
                    let close = matching(&tokens, i).at_node(node_id)?;
                    let raw = &expression[tokens[i].span.start..tokens[close].span.end];
                    pieces.push(Piece::ArrayLiteral(raw.to_string()));
                    i = close + 1;
                }
                token => {
                    pieces.push(match token {
                        Token::IntLiteral(n) => Piece::Value(Value::Int(*n)),
                        Token::DoubleLiteral(d) => Piece::Value(Value::Double(*d)),
                        Token::True => Piece::Value(Value::Bool(true)),
                        Token::False => Piece::Value(Value::Bool(false)),
                        Token::StringLiteral(s) => Piece::Value(Value::Str(s.clone())),
                        t if t.is_operator() || matches!(t, Token::LParen | Token::RParen) => {
                            Piece::Operator(t.clone())
                        }
                        other => {
                            return Err(ErrorKind::Syntax(format!("unexpected {}", other))).at_node(node_id)
                        }
                    });
                    i += 1;
                }
            }
        }

        // A negated double is a literal, not integer arithmetic.
        if let [Piece::Operator(Token::Minus), Piece::Value(Value::Double(d))] = pieces.as_slice() {
            return Ok(Normalized::Literal(Value::Double(-*d)));
        }
        if pieces.len() == 1 {
            match pieces.pop() {
                Some(Piece::Value(value)) => return Ok(Normalized::Literal(value)),
                Some(Piece::ArrayLiteral(raw)) => return Ok(Normalized::ArrayLiteral(raw)),
                Some(Piece::Name(name)) => return Ok(Normalized::Expression(name)),
                Some(Piece::Operator(t)) => {
                    return Err(ErrorKind::Syntax(format!("unexpected {}", t))).at_node(node_id)
                }
                None => {}
            }
        }
        render(pieces).map(Normalized::Expression).at_node(node_id)
    }

    /// Normalize and evaluate down to a single value.
    pub fn resolve(&mut self, expression: &str) -> Result<Value, RuntimeError> {
        let node_id = self.node_id;
        match self.normalize(expression)? {
            Normalized::Literal(value) => Ok(value),
            Normalized::Expression(text) => evaluate(&text).map(Value::Int).at_node(node_id),
            Normalized::ArrayLiteral(raw) => {
                ArrayStore::build(&raw, ScalarType::Void, node_id, &mut *self.scope).map(Value::Array)
            }
            Normalized::Assignment(_) => {
                Err(ErrorKind::Syntax(format!("assignment used as a value: {}", expression.trim())))
                    .at_node(node_id)
            }
        }
    }

    /// Evaluate an index expression.
    pub fn index(&mut self, expression: &str) -> Result<i64, RuntimeError> {
        match self.resolve(expression)? {
            Value::Int(n) => Ok(n),
            other => Err(ErrorKind::TypeMismatch {
                expected: "Int".to_string(),
                found: other.scalar_type().to_string(),
            })
            .at_node(self.node_id),
        }
    }
}

/// Detect an assignment form and expand compound operators:
/// `x++` becomes `x = x + 1`, `x *= a + b` becomes `x = x * (a + b)`.
pub fn desugar(expression: &str) -> Result<Option<Assignment>, ErrorKind> {
    let tokens = lex(expression)?;
    desugar_tokens(expression, &tokens)
}

fn desugar_tokens(source: &str, tokens: &[Spanned]) -> Result<Option<Assignment>, ErrorKind> {
    let mut depth = 0i32;
    let mut found = None;
    for (i, spanned) in tokens.iter().enumerate() {
        match spanned.token {
            Token::LParen | Token::LBracket => depth += 1,
            Token::RParen | Token::RBracket => depth -= 1,
            ref t if depth == 0 && t.is_assignment() => {
                found = Some(i);
                break;
            }
            _ => {}
        }
    }
    let Some(k) = found else {
        return Ok(None);
    };

    let op = &tokens[k].token;
    if matches!(op, Token::PlusPlus | Token::MinusMinus) {
        let target = if k == 0 {
            &tokens[1..]
        } else if k + 1 == tokens.len() {
            &tokens[..k]
        } else {
            return Err(ErrorKind::Syntax(format!("unexpected tokens after {}", op)));
        };
        if target.is_empty() {
            return Err(ErrorKind::Syntax(format!("{} needs a variable", op)));
        }
        let target = text_of(source, target);
        let sign = if *op == Token::PlusPlus { '+' } else { '-' };
        return Ok(Some(Assignment {
            value: format!("{} {} 1", target, sign),
            target,
        }));
    }

    if k == 0 {
        return Err(ErrorKind::Syntax("missing assignment target".to_string()));
    }
    if k + 1 == tokens.len() {
        return Err(ErrorKind::Syntax(format!("missing value after {}", op)));
    }
    let target = text_of(source, &tokens[..k]);
    let rhs = text_of(source, &tokens[k + 1..]);
    let value = match op {
        Token::PlusAssign => format!("{} + ({})", target, rhs),
        Token::MinusAssign => format!("{} - ({})", target, rhs),
        Token::StarAssign => format!("{} * ({})", target, rhs),
        Token::SlashAssign => format!("{} / ({})", target, rhs),
        Token::PercentAssign => format!("{} % ({})", target, rhs),
        _ => rhs,
    };
    Ok(Some(Assignment { target, value }))
}

/// Split on `separator` wherever it is outside quotes, parentheses and
/// brackets. Always yields at least one (possibly empty) part.
pub fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if let Some(close) = quote {
            if c == close {
                quote = None;
            }
            continue;
        }
        match c {
            '"' => quote = Some('"'),
            '“' => quote = Some('”'),
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Whether `text` is a plain identifier.
pub fn is_identifier(text: &str) -> bool {
    matches!(lex(text).as_deref(), Ok([Spanned { token: Token::Identifier(_), .. }]))
}

fn lex(expression: &str) -> Result<Vec<Spanned>, ErrorKind> {
    tokenize(expression).map_err(|bad| ErrorKind::Syntax(format!("unexpected character '{}'", bad)))
}

fn text_of(source: &str, tokens: &[Spanned]) -> String {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => source[first.span.start..last.span.end].to_string(),
        _ => String::new(),
    }
}

fn matching(tokens: &[Spanned], open: usize) -> Result<usize, ErrorKind> {
    let (opener, closer) = match tokens[open].token {
        Token::LParen => (Token::LParen, Token::RParen),
        _ => (Token::LBracket, Token::RBracket),
    };
    let mut depth = 0;
    for (i, spanned) in tokens.iter().enumerate().skip(open) {
        if spanned.token == opener {
            depth += 1;
        } else if spanned.token == closer {
            depth -= 1;
            if depth == 0 {
                return Ok(i);
            }
        }
    }
    Err(ErrorKind::Syntax(format!("unclosed {}", opener)))
}

fn call_arguments(inner: &str) -> Result<Vec<&str>, ErrorKind> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(inner, ',')
        .into_iter()
        .map(str::trim)
        .map(|arg| {
            if arg.is_empty() {
                Err(ErrorKind::InvalidValue("empty argument".to_string()))
            } else {
                Ok(arg)
            }
        })
        .collect()
}

fn render(pieces: Vec<Piece>) -> Result<String, ErrorKind> {
    let mut out = String::new();
    let mut glue = false;
    let mut expect_operand = true;
    for piece in pieces {
        let text = match &piece {
            Piece::Value(Value::Int(n)) => n.to_string(),
            Piece::Value(Value::Bool(b)) => (*b as i64).to_string(),
            Piece::Value(other) => {
                return Err(ErrorKind::TypeMismatch {
                    expected: "Int".to_string(),
                    found: other.scalar_type().to_string(),
                })
            }
            Piece::ArrayLiteral(_) => {
                return Err(ErrorKind::TypeMismatch {
                    expected: "Int".to_string(),
                    found: "array literal".to_string(),
                })
            }
            Piece::Name(name) => name.clone(),
            Piece::Operator(t) => t.to_string(),
        };
        // `-` glued to `-4` would lex as `--`.
        if !out.is_empty() && (!glue || text.starts_with('-')) {
            out.push(' ');
        }
        out.push_str(&text);

        // A minus where an operand is expected is a sign and stays attached.
        glue = false;
        match piece {
            Piece::Operator(Token::Minus) if expect_operand => glue = true,
            Piece::Operator(Token::RParen) => expect_operand = false,
            Piece::Operator(_) => expect_operand = true,
            _ => expect_operand = false,
        }
    }
    Ok(out)
}

/// A flattened, read-only set of bindings. Function calls are not available.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub scalars: HashMap<String, Value>,
    pub arrays: HashMap<String, ArrayStore>,
}

impl Snapshot {
    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.scalars.insert(name.to_string(), value);
        self
    }

    pub fn with_array(mut self, name: &str, store: ArrayStore) -> Self {
        self.arrays.insert(name.to_string(), store);
        self
    }
}

impl Scope for Snapshot {
    fn scalar(&self, name: &str) -> Option<Value> {
        self.scalars.get(name).cloned()
    }

    fn array(&self, name: &str) -> Option<&ArrayStore> {
        self.arrays.get(name)
    }

    fn call(&mut self, name: &str, _args: &[&str], node_id: usize) -> Result<Value, RuntimeError> {
        Err(RuntimeError::new(ErrorKind::UndeclaredFunction(name.to_string()), node_id))
    }
}
