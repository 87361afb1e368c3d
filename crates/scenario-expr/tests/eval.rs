// crates/scenario-expr/tests/eval.rs
// ============================================================================
// Module: Expression Evaluator Black-Box Tests
// Description: Exercises grammar precedence, variable lookup, and built-ins.
// Dependencies: scenario_expr
// ============================================================================

use std::collections::HashMap;

use scenario_expr::EvalError;
use scenario_expr::eval;

fn vars(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

#[test]
fn evaluates_arithmetic_precedence() {
    let empty = HashMap::new();
    assert!((eval("2 + 3 * 4", &empty).unwrap() - 14.0).abs() < 1e-9);
    assert!((eval("(2 + 3) * 4", &empty).unwrap() - 20.0).abs() < 1e-9);
    assert!((eval("2 ^ 3 ^ 2", &empty).unwrap() - 512.0).abs() < 1e-9);
    assert!((eval("-2 ^ 2", &empty).unwrap() - (-4.0)).abs() < 1e-9);
}

#[test]
fn resolves_variables_by_name() {
    let env = vars(&[("base", 2.0), ("position", 5.0)]);
    assert!((eval("base * 3", &env).unwrap() - 6.0).abs() < 1e-9);
    assert!((eval("position + base", &env).unwrap() - 7.0).abs() < 1e-9);
}

#[test]
fn min_max_builtins_match_rust_semantics() {
    let env = vars(&[("a", 3.0), ("b", 7.0)]);
    let min = eval("min(a,b)", &env).unwrap();
    let max = eval("max(a,b)", &env).unwrap();
    assert!((min - env["a"].min(env["b"])).abs() < 1e-9);
    assert!((max - env["a"].max(env["b"])).abs() < 1e-9);
}

#[test]
fn comparisons_and_logical_operators_are_boolean_doubles() {
    let empty = HashMap::new();
    assert!((eval("3 > 2", &empty).unwrap() - 1.0).abs() < 1e-9);
    assert!((eval("3 < 2", &empty).unwrap()).abs() < 1e-9);
    assert!((eval("1 && 0", &empty).unwrap()).abs() < 1e-9);
    assert!((eval("0 || 5", &empty).unwrap() - 1.0).abs() < 1e-9);
    assert!((eval("1.0 == 1.0000000000005", &empty).unwrap() - 1.0).abs() < 1e-9);
}

#[test]
fn unknown_identifier_is_an_error() {
    let empty = HashMap::new();
    let err = eval("missing + 1", &empty).unwrap_err();
    assert_eq!(err, EvalError::UnknownIdentifier { name: "missing".to_string() });
}

#[test]
fn unknown_function_is_an_error() {
    let empty = HashMap::new();
    let err = eval("avg(1,2)", &empty).unwrap_err();
    assert_eq!(err, EvalError::UnknownFunction { name: "avg".to_string() });
}

#[test]
fn arity_mismatch_is_an_error() {
    let empty = HashMap::new();
    let err = eval("min(1,2,3)", &empty).unwrap_err();
    assert_eq!(err, EvalError::ArityMismatch { name: "min".to_string(), expected: 2, found: 3 });
}

#[test]
fn division_by_zero_is_an_error() {
    let empty = HashMap::new();
    assert_eq!(eval("1/0", &empty).unwrap_err(), EvalError::DivisionByZero);
}

#[test]
fn dollar_sign_is_a_valid_identifier_character() {
    let env = vars(&[("$special", 4.0)]);
    assert!((eval("$special", &env).unwrap() - 4.0).abs() < 1e-9);
}
