use brick::builder::{ConditionKind, LoopKind};
use brick::{build, from_json, Block, BuildError, Interpreter, NodeKind, ScalarType};

const SUM_OF_SQUARES: &str = r#"[
    {"block": "function", "id": 1, "signature": "square(v: Int) -> Int"},
    {"block": "begin"},
    {"block": "return", "id": 2, "type": "Int", "value": "v * v"},
    {"block": "end"},
    {"block": "variable", "id": 3, "type": "Int[]", "name": "xs", "value": "[1, 2, 3]"},
    {"block": "variable", "id": 4, "type": "Int", "name": "total", "value": "0"},
    {"block": "loop", "id": 5, "kind": "for", "header": "int i = 0; i < 3; i++"},
    {"block": "begin"},
    {"block": "variable", "id": 6, "name": "total", "value": "total + square(xs[i])"},
    {"block": "end"},
    {"block": "condition", "id": 7, "kind": "if", "condition": "total == 14"},
    {"block": "begin"},
    {"block": "output", "id": 8, "value": "\"total\", total", "newline": true},
    {"block": "end"},
    {"block": "condition", "id": 9, "kind": "else"},
    {"block": "begin"},
    {"block": "output", "id": 10, "value": "\"wrong\"", "newline": true},
    {"block": "end"}
]"#;

#[test]
fn json_programs_build_and_run() {
    let root = from_json(SUM_OF_SQUARES).unwrap();
    assert_eq!(root.id, 0);
    assert_eq!(root.children.len(), 6);
    assert_eq!(root.children[0].kind, NodeKind::FunctionDecl);
    assert_eq!(root.children[0].children[0].kind, NodeKind::Return(ScalarType::Int));

    let output = Interpreter::new().run(&root);
    assert!(output.is_ok(), "{:?}", output.errors);
    assert_eq!(output.text, "total 14\n");
}

#[test]
fn variable_blocks_become_two_terminal_assignments() {
    let root = build(&[Block::Variable {
        id: 4,
        ty: ScalarType::Double,
        name: "d".into(),
        value: "1".into(),
    }])
    .unwrap();
    let assign = &root.children[0];
    assert_eq!(assign.kind, NodeKind::Assign);
    assert_eq!(assign.children[0].kind, NodeKind::Variable(ScalarType::Double));
    assert_eq!(assign.children[0].text, "d");
    assert_eq!(assign.children[1].text, "1");
    assert!(assign.children.iter().all(|child| child.id == 4));
}

#[test]
fn unnamed_variable_blocks_are_expression_statements() {
    let root = from_json(
        r#"[
            {"block": "variable", "id": 1, "type": "Int", "name": "n", "value": "1"},
            {"block": "variable", "id": 2, "value": "n += 4"},
            {"block": "output", "id": 3, "value": "n"}
        ]"#,
    )
    .unwrap();
    assert_eq!(Interpreter::new().run(&root).text, "5");
}

#[test]
fn flow_and_array_blocks() {
    let root = from_json(
        r#"[
            {"block": "variable", "id": 1, "name": "xs", "value": "[5, 6, 7]"},
            {"block": "array_method", "id": 2, "kind": "pop", "value": "xs"},
            {"block": "loop", "id": 3, "kind": "while", "header": "1"},
            {"block": "begin"},
            {"block": "array_method", "id": 4, "kind": "remove", "value": "xs; 0"},
            {"block": "flow", "id": 5, "kind": "break"},
            {"block": "end"},
            {"block": "output", "id": 6, "value": "xs", "newline": true}
        ]"#,
    )
    .unwrap();
    assert_eq!(Interpreter::new().run(&root).text, "[6]\n");
}

#[test]
fn delimiter_errors() {
    let condition = |id| Block::Condition {
        id,
        kind: ConditionKind::If,
        condition: "1".into(),
    };
    let while_loop = |id| Block::Loop {
        id,
        kind: LoopKind::While,
        header: "0".into(),
    };

    assert!(matches!(
        build(&[condition(1), Block::Begin]),
        Err(BuildError::UnclosedBlock(1))
    ));
    assert!(matches!(build(&[Block::End]), Err(BuildError::UnmatchedEnd(0))));
    assert!(matches!(
        build(&[while_loop(1), Block::Begin, Block::End, Block::Begin, Block::End]),
        Err(BuildError::UnexpectedBegin(3))
    ));
    assert!(matches!(build(&[while_loop(1)]), Err(BuildError::MissingBody(1))));
    assert!(matches!(
        build(&[while_loop(1), Block::End]),
        Err(BuildError::MissingBody(1))
    ));
}

#[test]
fn ids_must_be_unique_and_non_zero() {
    let output = |id| Block::Output {
        id,
        value: "1".into(),
        newline: false,
    };
    assert!(matches!(build(&[output(1), output(1)]), Err(BuildError::DuplicateId(1))));
    assert!(matches!(build(&[output(0)]), Err(BuildError::DuplicateId(0))));
    assert!(build(&[output(1), output(2)]).is_ok());
}

#[test]
fn malformed_json_is_reported() {
    assert!(matches!(from_json("[{\"block\": \"teleport\", \"id\": 1}]"), Err(BuildError::Json(_))));
    assert!(matches!(from_json("not json"), Err(BuildError::Json(_))));
}

#[test]
fn trees_round_trip_through_serde() {
    let root = from_json(SUM_OF_SQUARES).unwrap();
    let text = serde_json::to_string(&root).unwrap();
    let back: brick::Node = serde_json::from_str(&text).unwrap();
    assert_eq!(back, root);
}
