use brick::{Config, ConsoleOutput, ErrorKind, Interpreter, Node, NodeKind, ScalarType};

fn assign(id: usize, ty: ScalarType, target: &str, value: &str) -> Node {
    Node::assign(id, ty, target, value)
}

/// An expression statement, e.g. a call whose result is discarded.
fn statement(id: usize, expression: &str) -> Node {
    Node::assign(id, ScalarType::Void, "", expression)
}

fn println(id: usize, text: &str) -> Node {
    Node::new(id, NodeKind::Println, text)
}

fn ret(id: usize, ty: ScalarType, text: &str) -> Node {
    Node::new(id, NodeKind::Return(ty), text)
}

fn function(id: usize, signature: &str, body: Vec<Node>) -> Node {
    Node::new(id, NodeKind::FunctionDecl, signature).with_children(body)
}

fn run(children: Vec<Node>) -> ConsoleOutput {
    Interpreter::new().run(&Node::root(children))
}

fn increment(signature: &str) -> Node {
    function(1, signature, vec![assign(2, ScalarType::Void, "x", "x + 1")])
}

#[test]
fn reference_parameters_write_back() {
    let output = run(vec![
        increment("increment(&x: Int)"),
        assign(3, ScalarType::Int, "n", "5"),
        statement(4, "increment(n)"),
        println(5, "n"),
    ]);
    assert_eq!(output.text, "6\n");
}

#[test]
fn value_parameters_leave_the_caller_alone() {
    let output = run(vec![
        increment("bump(x: Int)"),
        assign(3, ScalarType::Int, "n", "5"),
        statement(4, "bump(n)"),
        println(5, "n"),
    ]);
    assert_eq!(output.text, "5\n");
}

#[test]
fn a_reference_marker_on_the_argument_also_links() {
    let output = run(vec![
        increment("bump(x: Int)"),
        assign(3, ScalarType::Int, "n", "5"),
        statement(4, "bump(&n)"),
        println(5, "n"),
    ]);
    assert_eq!(output.text, "6\n");
}

#[test]
fn reference_arguments_must_be_variables() {
    let output = run(vec![increment("increment(&x: Int)"), statement(3, "increment(2 + 3)")]);
    assert!(matches!(output.errors[0], (ErrorKind::InvalidVariableName(_), 3)));
}

#[test]
fn arrays_pass_by_reference_when_marked() {
    let output = run(vec![
        function(1, "push(&xs: Int[], v: Int)", vec![Node::new(2, NodeKind::Append, "xs; v")]),
        assign(3, ScalarType::ArrayInt, "a", "[1]"),
        statement(4, "push(a, 9)"),
        println(5, "a"),
    ]);
    assert_eq!(output.text, "[1, 9]\n");
}

#[test]
fn return_values_flow_into_expressions() {
    let output = run(vec![
        function(1, "square(v: Int) -> Int", vec![ret(2, ScalarType::Int, "v * v")]),
        println(3, "square(3) + 1, square(square(2))"),
    ]);
    assert_eq!(output.text, "10 16\n");
}

#[test]
fn recursion_works() {
    let output = run(vec![
        function(
            1,
            "fact(k: Int) -> Int",
            vec![
                Node::new(2, NodeKind::If, "k <= 1").with_children(vec![ret(3, ScalarType::Int, "1")]),
                ret(4, ScalarType::Int, "k * fact(k - 1)"),
            ],
        ),
        println(5, "fact(5)"),
    ]);
    assert_eq!(output.text, "120\n");
}

#[test]
fn absolute_value_negates_negative_arguments() {
    let output = run(vec![
        function(
            1,
            "abs(n: Int) -> Int",
            vec![
                Node::new(2, NodeKind::If, "n < 0").with_children(vec![ret(3, ScalarType::Int, "-n")]),
                ret(4, ScalarType::Int, "n"),
            ],
        ),
        println(5, "abs(-7), abs(3)"),
    ]);
    assert!(output.is_ok(), "{:?}", output.errors);
    assert_eq!(output.text, "7 3\n");
}

#[test]
fn comparison_results_can_be_returned_as_bool() {
    let output = run(vec![
        function(1, "less(a: Int, b: Int) -> Bool", vec![ret(2, ScalarType::Int, "a < b")]),
        println(3, "less(1, 2), less(2, 1)"),
    ]);
    assert!(output.is_ok(), "{:?}", output.errors);
    assert_eq!(output.text, "true false\n");

    let not_a_bool = run(vec![
        function(1, "two() -> Bool", vec![ret(2, ScalarType::Int, "2")]),
        println(3, "two()"),
    ]);
    assert!(matches!(not_a_bool.errors[0], (ErrorKind::ReturnTypeMismatch { .. }, 3)));
}

#[test]
fn a_return_inside_a_loop_leaves_the_function() {
    let output = run(vec![
        function(
            1,
            "first_over(limit: Int) -> Int",
            vec![
                Node::new(2, NodeKind::For, "int i = 0; i < 100; i++").with_children(vec![
                    Node::new(3, NodeKind::If, "i * i > limit").with_children(vec![ret(4, ScalarType::Int, "i")]),
                ]),
                ret(5, ScalarType::Int, "-1"),
            ],
        ),
        println(6, "first_over(50)"),
    ]);
    assert_eq!(output.text, "8\n");
}

#[test]
fn call_errors() {
    let base = || function(1, "square(v: Int) -> Int", vec![ret(2, ScalarType::Int, "v * v")]);

    let arity = run(vec![base(), println(3, "square(1, 2)")]);
    assert_eq!(
        arity.errors[0],
        (
            ErrorKind::Arity {
                name: "square".into(),
                expected: 1,
                found: 2
            },
            3
        )
    );

    let unknown = run(vec![base(), println(3, "cube(2)")]);
    assert_eq!(unknown.errors[0], (ErrorKind::UndeclaredFunction("cube".into()), 3));

    let wrong_type = run(vec![base(), println(3, "square(\"x\")")]);
    assert!(matches!(wrong_type.errors[0], (ErrorKind::TypeMismatch { .. }, 3)));
}

#[test]
fn duplicate_functions_are_rejected() {
    let output = run(vec![
        function(1, "f()", vec![]),
        function(2, "f(a: Int)", vec![]),
    ]);
    assert_eq!(output.errors, vec![(ErrorKind::AlreadyDeclared("f".into()), 2)]);
}

#[test]
fn declared_return_types_are_checked_up_front() {
    let output = run(vec![
        function(
            1,
            "f() -> Int",
            vec![Node::new(2, NodeKind::While, "1").with_children(vec![ret(3, ScalarType::String, "\"s\"")])],
        ),
        println(4, "\"unreached\""),
    ]);
    assert_eq!(output.text, "");
    assert!(matches!(output.errors[0], (ErrorKind::ReturnTypeMismatch { .. }, 3)));
    assert_eq!(output.errors[1].1, 1);
}

#[test]
fn returned_values_are_checked_at_run_time() {
    let output = run(vec![
        function(1, "g() -> Int", vec![ret(2, ScalarType::Void, "\"s\"")]),
        println(3, "g()"),
    ]);
    assert!(matches!(output.errors[0], (ErrorKind::ReturnTypeMismatch { .. }, 3)));

    let void_with_value = run(vec![
        function(1, "h()", vec![ret(2, ScalarType::Void, "1")]),
        statement(3, "h()"),
    ]);
    assert!(matches!(void_with_value.errors[0], (ErrorKind::ReturnTypeMismatch { .. }, 3)));

    let missing_value = run(vec![function(1, "k() -> Int", vec![]), println(2, "k()")]);
    assert!(matches!(missing_value.errors[0], (ErrorKind::ReturnTypeMismatch { .. }, 2)));
}

#[test]
fn void_results_cannot_be_printed_or_stored() {
    let printed = run(vec![function(1, "noop()", vec![]), println(2, "noop()")]);
    assert!(matches!(printed.errors[0], (ErrorKind::InvalidValue(_), 2)));

    let stored = run(vec![function(1, "noop()", vec![]), assign(2, ScalarType::Void, "x", "noop()")]);
    assert!(matches!(stored.errors[0], (ErrorKind::InvalidValue(_), 2)));
}

#[test]
fn functions_only_see_their_parameters() {
    let output = run(vec![
        assign(1, ScalarType::Int, "hidden", "1"),
        function(2, "peek() -> Int", vec![ret(3, ScalarType::Int, "hidden")]),
        println(4, "peek()"),
    ]);
    let kind = ErrorKind::UndeclaredVariable("hidden".into());
    assert_eq!(output.errors, vec![(kind.clone(), 3), (kind.clone(), 2), (kind, 4)]);
}

#[test]
fn break_cannot_escape_a_function() {
    let output = run(vec![
        function(1, "escape()", vec![Node::new(2, NodeKind::Break, "")]),
        Node::new(3, NodeKind::While, "1").with_children(vec![statement(4, "escape()")]),
    ]);
    assert!(matches!(output.errors[0], (ErrorKind::InvalidNode(_), 2)));
}

#[test]
fn functions_reset_between_runs_unless_persisted() {
    let declare = Node::root(vec![function(1, "one() -> Int", vec![ret(2, ScalarType::Int, "1")])]);
    let call = Node::root(vec![println(1, "one()")]);

    let mut fresh = Interpreter::new();
    fresh.run(&declare);
    assert_eq!(fresh.run(&call).errors[0].0, ErrorKind::UndeclaredFunction("one".into()));

    let mut persistent = Interpreter::with_config(Config {
        persist_functions: true,
        ..Config::default()
    });
    assert!(persistent.run(&declare).is_ok());
    assert!(persistent.run(&declare).is_ok());
    assert_eq!(persistent.run(&call).text, "1\n");
    assert_eq!(persistent.functions().names(), vec!["one".to_string()]);
}
