// crates/scenario-expr/tests/proptest_eval.rs
// ============================================================================
// Module: Expression Evaluator Property Tests
// Description: Quantified invariants the evaluator must hold for arbitrary
//              inputs.
// Dependencies: scenario_expr, proptest
// ============================================================================

use std::collections::HashMap;

use proptest::prelude::*;
use scenario_expr::eval;

proptest! {
    #[test]
    fn min_matches_pairwise_min(a in -1000.0f64..1000.0, b in -1000.0f64..1000.0) {
        let env: HashMap<String, f64> = HashMap::from([("a".to_string(), a), ("b".to_string(), b)]);
        let got = eval("min(a,b)", &env).unwrap();
        let want = eval("a", &env).unwrap().min(eval("b", &env).unwrap());
        prop_assert!((got - want).abs() < 1e-9);
    }

    #[test]
    fn addition_is_commutative_like_eval(a in -1000.0f64..1000.0, b in -1000.0f64..1000.0) {
        let env: HashMap<String, f64> = HashMap::from([("x".to_string(), a), ("y".to_string(), b)]);
        let lhs = eval("x + y", &env).unwrap();
        let rhs = eval("x", &env).unwrap() + eval("y", &env).unwrap();
        prop_assert!((lhs - rhs).abs() < 1e-6);
    }

    #[test]
    fn substitution_free_strings_round_trip(v in -1000.0f64..1000.0) {
        // A literal number contains no `$(...)` substitution tokens, so
        // re-evaluating it is idempotent by construction.
        let empty: HashMap<String, f64> = HashMap::new();
        let text = format!("{v}");
        let once = eval(&text, &empty).unwrap();
        let twice = eval(&format!("{once}"), &empty).unwrap();
        prop_assert!((once - twice).abs() < 1e-6);
    }
}
