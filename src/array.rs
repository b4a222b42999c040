use crate::error::{AtNode, ErrorKind, RuntimeError};
use crate::normalizer::{split_top_level, Normalizer, Scope};
use crate::value::{ScalarType, Value};
use std::fmt;

/// Typed, ordered storage behind one array variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayStore {
    array_type: ScalarType,
    elements: Vec<Value>,
}

impl ArrayStore {
    /// An empty array of `array_type` (which must be one of the array types).
    pub fn new(array_type: ScalarType) -> Result<Self, ErrorKind> {
        if !array_type.is_array() {
            return Err(ErrorKind::TypeMismatch {
                expected: "an array type".to_string(),
                found: array_type.to_string(),
            });
        }
        Ok(ArrayStore {
            array_type,
            elements: Vec::new(),
        })
    }

    /// Build from a bracketed literal such as `[1, x + 1, f(2)]`.
    ///
    /// Each element goes through the normalizer and evaluator. With
    /// `ScalarType::Void` the array type is taken from the first element.
    pub fn build(
        literal: &str,
        array_type: ScalarType,
        node_id: usize,
        scope: &mut dyn Scope,
    ) -> Result<Self, RuntimeError> {
        let inner = brackets_inner(literal).at_node(node_id)?;
        let components = split_top_level(inner, ',');

        let mut values = Vec::new();
        if !(components.len() == 1 && components[0].trim().is_empty()) {
            for component in components {
                let component = component.trim();
                if component.is_empty() {
                    return Err(ErrorKind::InvalidValue("empty array element".to_string()))
                        .at_node(node_id);
                }
                if component.starts_with('[') {
                    return Err(ErrorKind::Syntax("nested arrays are not supported".to_string()))
                        .at_node(node_id);
                }
                values.push(Normalizer::new(&mut *scope, node_id).resolve(component)?);
            }
        }

        let array_type = match array_type {
            ScalarType::Void => match values.first() {
                Some(first) => first.scalar_type().array_of().ok_or_else(|| {
                    ErrorKind::InvalidValue(format!("cannot store {} in an array", first.scalar_type()))
                }),
                None => Err(ErrorKind::InvalidValue(
                    "the type of an empty array must be declared".to_string(),
                )),
            }
            .at_node(node_id)?,
            other => other,
        };

        let mut store = ArrayStore::new(array_type).at_node(node_id)?;
        for value in values {
            store.append(value).at_node(node_id)?;
        }
        Ok(store)
    }

    pub fn array_type(&self) -> ScalarType {
        self.array_type
    }

    pub fn element_type(&self) -> ScalarType {
        self.array_type.element().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    fn position(&self, index: i64) -> Result<usize, ErrorKind> {
        if index < 0 || index as usize >= self.elements.len() {
            return Err(ErrorKind::IndexOutOfRange {
                index,
                len: self.elements.len(),
            });
        }
        Ok(index as usize)
    }

    fn checked(&self, value: Value) -> Result<Value, ErrorKind> {
        if value == Value::Void {
            return Err(ErrorKind::InvalidValue("void is not an array element".to_string()));
        }
        self.element_type().admit(value)
    }

    pub fn get(&self, index: i64) -> Result<Value, ErrorKind> {
        let position = self.position(index)?;
        Ok(self.elements[position].clone())
    }

    pub fn set(&mut self, index: i64, value: Value) -> Result<(), ErrorKind> {
        let position = self.position(index)?;
        self.elements[position] = self.checked(value)?;
        Ok(())
    }

    pub fn append(&mut self, value: Value) -> Result<(), ErrorKind> {
        let value = self.checked(value)?;
        self.elements.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, ErrorKind> {
        self.elements
            .pop()
            .ok_or(ErrorKind::IndexOutOfRange { index: 0, len: 0 })
    }

    /// Insert before an existing element; `index` must already be in range.
    pub fn insert(&mut self, index: i64, value: Value) -> Result<(), ErrorKind> {
        let position = self.position(index)?;
        let value = self.checked(value)?;
        self.elements.insert(position, value);
        Ok(())
    }

    pub fn remove(&mut self, index: i64) -> Result<Value, ErrorKind> {
        let position = self.position(index)?;
        Ok(self.elements.remove(position))
    }

    /// Rendered literal, with string elements quoted.
    pub fn literal(&self) -> String {
        let parts: Vec<String> = self.elements.iter().map(Value::literal).collect();
        format!("[{}]", parts.join(", "))
    }
}

impl fmt::Display for ArrayStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.elements.iter().map(Value::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

fn brackets_inner(literal: &str) -> Result<&str, ErrorKind> {
    let trimmed = literal.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| ErrorKind::Syntax(format!("array literal must be bracketed: {}", trimmed)))?;

    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return Err(ErrorKind::Syntax(format!("mismatched brackets in {}", trimmed)));
        }
    }
    if depth != 0 {
        return Err(ErrorKind::Syntax(format!("mismatched brackets in {}", trimmed)));
    }
    Ok(inner)
}
