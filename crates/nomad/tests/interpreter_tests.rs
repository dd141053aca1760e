use nomad::{Error, Interpreter};

#[test]
fn arithmetic_precedence() {
    let interp = Interpreter::new();
    let out = interp.capture("print 1 + 2 * 3").unwrap();
    assert_eq!(out.output, vec!["<int> 7"]);
}

#[test]
fn if_elif_else_chain() {
    let interp = Interpreter::new();
    let src = "int a :: 2\nint b :: 0\nif a = 1 { b :: 2 } elif a = 2 { b :: 4 } else { b :: -1 }\nprint b";
    let out = interp.capture(src).unwrap();
    assert_eq!(out.output, vec!["<int> 4"]);
}

#[test]
fn for_loop_prints_each_iteration() {
    let interp = Interpreter::new();
    let out = interp.capture("for int i :: 0; i < 3; i :: i + 1 { print i }").unwrap();
    assert_eq!(out.output, vec!["<int> 0", "<int> 1", "<int> 2"]);
}

#[test]
fn call_by_position_and_by_name_with_default() {
    let interp = Interpreter::new();
    let src = "func add :: (int x, int y::10) int { return x + y }\nprint add(5)\nprint add(y: 1, x: 2)";
    let out = interp.capture(src).unwrap();
    assert_eq!(out.output, vec!["<int> 15", "<int> 3"]);
}

#[test]
fn object_literal_with_partial_fields_keeps_defaults() {
    let interp = Interpreter::new();
    let src = "type Point :: { int x :: 0, int y :: 0 }\nPoint p :: new Point { x :: 3 }\nprint p.x + p.y";
    let out = interp.capture(src).unwrap();
    assert_eq!(out.output, vec!["<int> 3"]);
}

#[test]
fn array_index_and_len_on_string() {
    let interp = Interpreter::new();
    let out = interp.capture("print [int]{10, 20, 30}[2]\nprint len \"abc\"").unwrap();
    assert_eq!(out.output, vec!["<int> 30", "<int> 3"]);
}

#[test]
fn declaring_a_variable_with_a_mismatched_value_is_a_type_error() {
    let interp = Interpreter::new();
    let err = interp.run("int x :: \"hello\"").unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[test]
fn positional_argument_after_named_argument_is_rejected() {
    let interp = Interpreter::new();
    let src = "func f :: (int a, int b, int c) int { return a }\nf(1, x: 2, 3)";
    let err = interp.run(src).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
}

#[test]
fn reading_an_undefined_variable_is_a_name_error() {
    let interp = Interpreter::new();
    let err = interp.run("print missing").unwrap_err();
    assert!(matches!(err, Error::Name { .. }));
}

#[test]
fn array_index_out_of_range_is_a_resource_error() {
    let interp = Interpreter::new();
    let err = interp.run("print [int]{1, 2}[5]").unwrap_err();
    assert!(matches!(err, Error::Resource(_)));
}

#[test]
fn nested_call_as_argument_resolves_independently() {
    let interp = Interpreter::new();
    let src = "func inc :: (int x) int { return x + 1 }\nfunc add :: (int a, int b) int { return a + b }\nprint add(1, inc(10))";
    let out = interp.capture(src).unwrap();
    assert_eq!(out.output, vec!["<int> 12"]);
}

#[test]
fn closures_capture_their_defining_scope() {
    let interp = Interpreter::new();
    let src = "int base :: 100\nfunc adder :: () int { return base + 1 }\nbase :: 0\nprint adder()";
    let out = interp.capture(src).unwrap();
    assert_eq!(out.output, vec!["<int> 101"]);
}
