use brick::normalizer::{desugar, split_top_level, Assignment, Normalized, Normalizer, Snapshot};
use brick::{ArrayStore, ErrorKind, ScalarType, Value};

fn int_array(values: &[i64]) -> ArrayStore {
    let mut store = ArrayStore::new(ScalarType::ArrayInt).unwrap();
    for v in values {
        store.append(Value::Int(*v)).unwrap();
    }
    store
}

fn scope() -> Snapshot {
    Snapshot::default()
        .with("x", Value::Int(4))
        .with("flag", Value::Bool(true))
        .with("name", Value::Str("true".into()))
        .with("ratio", Value::Double(0.5))
        .with("low", Value::Int(-4))
        .with_array("a", int_array(&[10, 20, 30]))
        .with_array("b", int_array(&[2, 0]))
}

fn normalize(text: &str) -> Result<Normalized, ErrorKind> {
    let mut scope = scope();
    Normalizer::new(&mut scope, 7).normalize(text).map_err(|e| e.kind)
}

fn resolve(text: &str) -> Result<Value, ErrorKind> {
    let mut scope = scope();
    Normalizer::new(&mut scope, 7).resolve(text).map_err(|e| e.kind)
}

#[test]
fn names_are_substituted_with_spacing() {
    assert_eq!(normalize("x*2+1"), Ok(Normalized::Expression("4 * 2 + 1".into())));
    assert_eq!(resolve("x*2+1"), Ok(Value::Int(9)));
}

#[test]
fn unary_minus_stays_attached() {
    assert_eq!(normalize("-x"), Ok(Normalized::Expression("-4".into())));
    assert_eq!(normalize("x - -1"), Ok(Normalized::Expression("4 - -1".into())));
    assert_eq!(normalize("(-x)*2"), Ok(Normalized::Expression("( -4 ) * 2".into())));
    assert_eq!(resolve("x-1"), Ok(Value::Int(3)));
}

#[test]
fn negating_a_negative_value_keeps_the_signs_apart() {
    assert_eq!(normalize("-low"), Ok(Normalized::Expression("- -4".into())));
    assert_eq!(resolve("-low"), Ok(Value::Int(4)));
    assert_eq!(resolve("- -5"), Ok(Value::Int(5)));
    assert_eq!(resolve("x - -low"), Ok(Value::Int(0)));
    assert_eq!(resolve("low * -1"), Ok(Value::Int(4)));
}

#[test]
fn negative_doubles_are_literals() {
    assert_eq!(resolve("-2.5"), Ok(Value::Double(-2.5)));
    assert_eq!(resolve("-ratio"), Ok(Value::Double(-0.5)));
    assert!(matches!(resolve("-ratio + 1"), Err(ErrorKind::TypeMismatch { .. })));
}

#[test]
fn bools_take_part_as_zero_or_one() {
    assert_eq!(resolve("flag + 1"), Ok(Value::Int(2)));
    assert_eq!(resolve("flag"), Ok(Value::Bool(true)));
}

#[test]
fn single_values_resolve_to_themselves() {
    assert_eq!(resolve("\"hello world\""), Ok(Value::Str("hello world".into())));
    assert_eq!(resolve("“curly”"), Ok(Value::Str("curly".into())));
    assert_eq!(resolve("2.25"), Ok(Value::Double(2.25)));
    assert_eq!(resolve("ratio"), Ok(Value::Double(0.5)));
    assert_eq!(resolve("a"), Ok(Value::Array(int_array(&[10, 20, 30]))));
}

#[test]
fn a_string_that_looks_like_a_bool_stays_a_string() {
    assert_eq!(resolve("name"), Ok(Value::Str("true".into())));
    assert!(matches!(resolve("name + 1"), Err(ErrorKind::TypeMismatch { .. })));
}

#[test]
fn indices_are_evaluated_first_and_nest() {
    assert_eq!(resolve("a[1]"), Ok(Value::Int(20)));
    assert_eq!(resolve("a[x - 3] + 1"), Ok(Value::Int(21)));
    assert_eq!(resolve("a[b[0]]"), Ok(Value::Int(30)));
    assert_eq!(resolve("a[b[1]] * b[0]"), Ok(Value::Int(20)));
}

#[test]
fn bad_indices_fail() {
    assert_eq!(
        resolve("a[3]"),
        Err(ErrorKind::IndexOutOfRange { index: 3, len: 3 })
    );
    assert_eq!(resolve("zs[0]"), Err(ErrorKind::UndeclaredVariable("zs".into())));
    assert!(matches!(resolve("a[ratio]"), Err(ErrorKind::TypeMismatch { .. })));
}

#[test]
fn array_literals_are_built_with_inferred_type() {
    assert_eq!(
        normalize("[1, x]"),
        Ok(Normalized::ArrayLiteral("[1, x]".into()))
    );
    let Ok(Value::Array(store)) = resolve("[x, x + 1, a[0]]") else {
        panic!("expected an array");
    };
    assert_eq!(store.array_type(), ScalarType::ArrayInt);
    assert_eq!(store.to_string(), "[4, 5, 10]");
}

#[test]
fn unknown_names_fail_at_evaluation() {
    assert_eq!(resolve("y + 1"), Err(ErrorKind::UndeclaredVariable("y".into())));
    assert_eq!(resolve("y"), Err(ErrorKind::UndeclaredVariable("y".into())));
}

#[test]
fn calls_go_through_the_scope() {
    assert_eq!(resolve("f(1)"), Err(ErrorKind::UndeclaredFunction("f".into())));
}

#[test]
fn errors_carry_the_node_id() {
    let mut scope = scope();
    let err = Normalizer::new(&mut scope, 42).resolve("1 / 0").unwrap_err();
    assert_eq!(err.kind, ErrorKind::DivisionByZero);
    assert_eq!(err.blocks, vec![42]);
}

#[test]
fn assignments_are_desugared() {
    let assignment = |target: &str, value: &str| -> Result<Option<Assignment>, ErrorKind> {
        Ok(Some(Assignment {
            target: target.into(),
            value: value.into(),
        }))
    };
    assert_eq!(desugar("x++"), assignment("x", "x + 1"));
    assert_eq!(desugar("--x"), assignment("x", "x - 1"));
    assert_eq!(desugar("x += 2 * y"), assignment("x", "x + (2 * y)"));
    assert_eq!(desugar("x %= 3"), assignment("x", "x % (3)"));
    assert_eq!(desugar("a[i] *= 2"), assignment("a[i]", "a[i] * (2)"));
    assert_eq!(desugar("int i = 0"), assignment("int i", "0"));
    assert_eq!(desugar("a[i == 1]"), Ok(None));
    assert_eq!(desugar("x == 1"), Ok(None));
}

#[test]
fn malformed_assignments_are_syntax_errors() {
    assert!(matches!(desugar("= 3"), Err(ErrorKind::Syntax(_))));
    assert!(matches!(desugar("x ="), Err(ErrorKind::Syntax(_))));
    assert!(matches!(desugar("x++ + 1"), Err(ErrorKind::Syntax(_))));
    assert!(matches!(resolve("x = 1"), Err(ErrorKind::Syntax(_))));
}

#[test]
fn top_level_split_respects_quotes_and_brackets() {
    assert_eq!(
        split_top_level("\"a, b\", f(1, 2), [3, 4], x", ','),
        vec!["\"a, b\"", " f(1, 2)", " [3, 4]", " x"]
    );
    assert_eq!(split_top_level("int i = 0; i < 3; i++", ';').len(), 3);
    assert_eq!(split_top_level("", ','), vec![""]);
}
