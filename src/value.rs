use crate::array::ArrayStore;
use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared or inferred type of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScalarType {
    Int,
    Double,
    Bool,
    String,
    #[default]
    Void,
    #[serde(rename = "Int[]")]
    ArrayInt,
    #[serde(rename = "Double[]")]
    ArrayDouble,
    #[serde(rename = "Bool[]")]
    ArrayBool,
    #[serde(rename = "String[]")]
    ArrayString,
}

impl ScalarType {
    pub fn is_array(self) -> bool {
        matches!(
            self,
            ScalarType::ArrayInt | ScalarType::ArrayDouble | ScalarType::ArrayBool | ScalarType::ArrayString
        )
    }

    /// Element type of an array type, `None` for scalars.
    pub fn element(self) -> Option<ScalarType> {
        match self {
            ScalarType::ArrayInt => Some(ScalarType::Int),
            ScalarType::ArrayDouble => Some(ScalarType::Double),
            ScalarType::ArrayBool => Some(ScalarType::Bool),
            ScalarType::ArrayString => Some(ScalarType::String),
            _ => None,
        }
    }

    /// Array type holding elements of this type, `None` if there is none.
    pub fn array_of(self) -> Option<ScalarType> {
        match self {
            ScalarType::Int => Some(ScalarType::ArrayInt),
            ScalarType::Double => Some(ScalarType::ArrayDouble),
            ScalarType::Bool => Some(ScalarType::ArrayBool),
            ScalarType::String => Some(ScalarType::ArrayString),
            _ => None,
        }
    }

    /// Check `value` against this type, applying the two implicit widenings
    /// the language has: `Int` into `Double`, and a 0/1 comparison result
    /// into `Bool`. `Void` accepts anything and keeps the inferred type.
    pub fn admit(self, value: Value) -> Result<Value, ErrorKind> {
        match (self, value) {
            (ScalarType::Void, value) => Ok(value),
            (ScalarType::Int, Value::Int(n)) => Ok(Value::Int(n)),
            (ScalarType::Double, Value::Double(d)) => Ok(Value::Double(d)),
            (ScalarType::Double, Value::Int(n)) => Ok(Value::Double(n as f64)),
            (ScalarType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ScalarType::Bool, Value::Int(n)) if n == 0 || n == 1 => Ok(Value::Bool(n == 1)),
            (ScalarType::String, Value::Str(s)) => Ok(Value::Str(s)),
            (ty, Value::Array(store)) if ty.is_array() && store.array_type() == ty => {
                Ok(Value::Array(store))
            }
            (ty, value) => Err(ErrorKind::TypeMismatch {
                expected: ty.to_string(),
                found: value.scalar_type().to_string(),
            }),
        }
    }
}

impl FromStr for ScalarType {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (base, array) = match trimmed.strip_suffix("[]") {
            Some(base) => (base.trim(), true),
            None => (trimmed, false),
        };
        let scalar = match base.to_ascii_lowercase().as_str() {
            "int" => ScalarType::Int,
            "double" => ScalarType::Double,
            "bool" => ScalarType::Bool,
            "string" => ScalarType::String,
            "void" if !array => ScalarType::Void,
            _ => {
                return Err(ErrorKind::TypeMismatch {
                    expected: "a type name".to_string(),
                    found: trimmed.to_string(),
                })
            }
        };
        if array {
            scalar.array_of().ok_or_else(|| ErrorKind::TypeMismatch {
                expected: "an element type".to_string(),
                found: trimmed.to_string(),
            })
        } else {
            Ok(scalar)
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Int => write!(f, "Int"),
            ScalarType::Double => write!(f, "Double"),
            ScalarType::Bool => write!(f, "Bool"),
            ScalarType::String => write!(f, "String"),
            ScalarType::Void => write!(f, "Void"),
            ScalarType::ArrayInt => write!(f, "Int[]"),
            ScalarType::ArrayDouble => write!(f, "Double[]"),
            ScalarType::ArrayBool => write!(f, "Bool[]"),
            ScalarType::ArrayString => write!(f, "String[]"),
        }
    }
}

/// Runtime value. Scalars live in scope frames; `Array` only appears
/// transiently, when a whole array is passed, returned or copied.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    Array(ArrayStore),
    Void,
}

impl Value {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Value::Int(_) => ScalarType::Int,
            Value::Double(_) => ScalarType::Double,
            Value::Bool(_) => ScalarType::Bool,
            Value::Str(_) => ScalarType::String,
            Value::Array(store) => store.array_type(),
            Value::Void => ScalarType::Void,
        }
    }

    /// Truthiness of a condition result.
    pub fn truthy(&self) -> Result<bool, ErrorKind> {
        match self {
            Value::Int(n) => Ok(*n != 0),
            Value::Bool(b) => Ok(*b),
            other => Err(ErrorKind::TypeMismatch {
                expected: "Bool".to_string(),
                found: other.scalar_type().to_string(),
            }),
        }
    }

    /// Source-level spelling: strings keep their quotes so the text can be
    /// fed back through the normalizer.
    pub fn literal(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{}\"", s),
            Value::Array(store) => store.literal(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Double(d) if d.is_finite() && d.fract() == 0.0 => write!(f, "{:.1}", d),
            Value::Double(d) => write!(f, "{}", d),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(store) => write!(f, "{}", store),
            Value::Void => write!(f, "void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_parse_case_insensitively() {
        assert_eq!("int".parse::<ScalarType>().unwrap(), ScalarType::Int);
        assert_eq!("String".parse::<ScalarType>().unwrap(), ScalarType::String);
        assert_eq!("Bool[]".parse::<ScalarType>().unwrap(), ScalarType::ArrayBool);
        assert_eq!(" double [] ".parse::<ScalarType>().unwrap(), ScalarType::ArrayDouble);
        assert!("Void[]".parse::<ScalarType>().is_err());
        assert!("number".parse::<ScalarType>().is_err());
    }

    #[test]
    fn admit_widens_int_and_comparison_results() {
        assert_eq!(ScalarType::Double.admit(Value::Int(2)), Ok(Value::Double(2.0)));
        assert_eq!(ScalarType::Bool.admit(Value::Int(1)), Ok(Value::Bool(true)));
        assert!(matches!(
            ScalarType::Bool.admit(Value::Int(7)),
            Err(ErrorKind::TypeMismatch { .. })
        ));
        assert!(matches!(
            ScalarType::Int.admit(Value::Str("5".into())),
            Err(ErrorKind::TypeMismatch { .. })
        ));
    }

    #[test]
    fn doubles_keep_a_decimal_point() {
        assert_eq!(Value::Double(3.0).to_string(), "3.0");
        assert_eq!(Value::Double(2.5).to_string(), "2.5");
    }

    #[test]
    fn a_string_spelled_true_is_still_a_string() {
        let value = Value::Str("true".into());
        assert_eq!(value.scalar_type(), ScalarType::String);
        assert_eq!(value.literal(), "\"true\"");
        assert!(value.truthy().is_err());
    }
}
