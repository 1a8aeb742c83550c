//! # formula-rs
//!
//! A math expression parser, optimizer, and evaluation engine.
//!
//! formula-rs takes human-written arithmetic/logical expressions like
//! `sin(x*2) + if(a>b, c, d)`, builds a reusable executor, and evaluates it
//! for any binding of variable names to `f64` values. The pipeline is
//!
//! ```text
//! source text → tokens → AST → optimized AST → executable formula
//! ```
//!
//! with two interchangeable backends: a tree-walking interpreter and a
//! compiled backend that precomposes the whole expression into a closure tree
//! once and runs it without any traversal afterwards. Built formulas are
//! cached by source text.
//!
//! ## Quick start
//!
//! ```
//! use std::collections::HashMap;
//! use formula_rs::Evaluator;
//!
//! let evaluator = Evaluator::new();
//!
//! let mut variables = HashMap::new();
//! variables.insert("x".to_string(), 2.0);
//!
//! let result = evaluator.evaluate("2 + 3 * x", &variables).unwrap();
//! assert_eq!(result, 8.0);
//!
//! // Default constants and functions are registered out of the box.
//! let result = evaluator.evaluate("sin(pi / 2)", &HashMap::new()).unwrap();
//! assert_eq!(result, 1.0);
//! ```
//!
//! ## Reusable delegates
//!
//! Parsing once and evaluating many times is the intended hot path:
//!
//! ```
//! use std::collections::HashMap;
//! use formula_rs::Evaluator;
//!
//! let evaluator = Evaluator::new();
//! let formula = evaluator.create_delegate("x^2 + 2*x + 1").unwrap();
//!
//! let mut variables = HashMap::new();
//! for x in 0..5 {
//!     variables.insert("x".to_string(), x as f64);
//!     let expected = ((x + 1) * (x + 1)) as f64;
//!     assert_eq!(formula.evaluate(&variables).unwrap(), expected);
//! }
//! ```
//!
//! ## Custom constants and functions
//!
//! ```
//! use std::collections::HashMap;
//! use formula_rs::Evaluator;
//!
//! let evaluator = Evaluator::builder()
//!     .constant("answer", 42.0)
//!     .function("hypotenuse", 2, true, |args| {
//!         (args[0] * args[0] + args[1] * args[1]).sqrt()
//!     })
//!     .dynamic_function("count", true, |args| args.len() as f64)
//!     .build()
//!     .unwrap();
//!
//! let no_vars = HashMap::new();
//! assert_eq!(evaluator.evaluate("hypotenuse(3, 4)", &no_vars).unwrap(), 5.0);
//! assert_eq!(evaluator.evaluate("count(1, 2, 3)", &no_vars).unwrap(), 3.0);
//! assert_eq!(evaluator.evaluate("answer / 2", &no_vars).unwrap(), 21.0);
//! ```
//!
//! Functions marked idempotent may be folded away at build time when all of
//! their arguments are constants; `random()` is registered non-idempotent and
//! is never folded.
//!
//! ## Execution modes
//!
//! ```
//! use formula_rs::{Evaluator, ExecutionMode};
//!
//! let interpreted = Evaluator::builder()
//!     .execution_mode(ExecutionMode::Interpreted)
//!     .build()
//!     .unwrap();
//! let compiled = Evaluator::builder()
//!     .execution_mode(ExecutionMode::Compiled)
//!     .build()
//!     .unwrap();
//!
//! // The two backends are observationally identical.
//! let vars = Default::default();
//! assert_eq!(
//!     interpreted.evaluate("2^10 - 1", &vars).unwrap(),
//!     compiled.evaluate("2^10 - 1", &vars).unwrap(),
//! );
//! ```
//!
//! ## Locale
//!
//! The tokenizer takes exactly two locale parameters, the decimal separator
//! and the argument separator:
//!
//! ```
//! use formula_rs::Evaluator;
//!
//! let evaluator = Evaluator::builder()
//!     .decimal_separator(',')
//!     .argument_separator(';')
//!     .build()
//!     .unwrap();
//!
//! let result = evaluator.evaluate("max(1,5; 2,5)", &Default::default()).unwrap();
//! assert_eq!(result, 2.5);
//! ```
//!
//! ## Error handling
//!
//! Build-time problems surface as [`ParseError`] with the byte position of
//! the offending token; the only evaluation-time error is
//! [`EvaluationError::VariableNotDefined`]. IEEE-754 exceptional values do
//! not error: `1/0` is `inf`, `0/0` is `NaN`, and the values propagate:
//!
//! ```
//! use formula_rs::{Error, Evaluator, EvaluationError};
//!
//! let evaluator = Evaluator::new();
//! let vars = Default::default();
//!
//! assert!(evaluator.evaluate("1 / 0", &vars).unwrap().is_infinite());
//! assert!(evaluator.evaluate("0 / 0", &vars).unwrap().is_nan());
//!
//! match evaluator.evaluate("unknownVar + 1", &vars) {
//!     Err(Error::Evaluation(EvaluationError::VariableNotDefined { name })) => {
//!         assert_eq!(name, "unknownVar");
//!     }
//!     other => panic!("unexpected result: {:?}", other),
//! }
//! ```
//!
//! ## Thread safety
//!
//! Registries are frozen when the evaluator is built. [`Evaluator`] and
//! [`Formula`] are `Send + Sync`: one evaluator (and any delegate it handed
//! out) can be shared across threads, each evaluation running against its own
//! variable map. The formula cache synchronizes internally.

pub mod cache;
pub mod context;
pub mod engine;
pub mod error;
pub mod eval;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod optimizer;
pub mod types;
pub mod validator;

pub use context::{Arity, ConstantInfo, ConstantRegistry, FunctionInfo, FunctionRegistry};
pub use error::{ArgumentError, Error, EvaluationError, ParseError, Result};
pub use eval::{ExecutionMode, Formula};
pub use evaluator::{Evaluator, EvaluatorBuilder, EvaluatorOptions};
pub use types::{BinaryOp, Expr, Token, TokenKind, UnaryOp};

/// Asserts that two `f64` values are approximately equal.
///
/// NaN compares equal to NaN and same-signed infinities compare equal, which
/// is what expression tests want.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($left, $right, 1e-10)
    };
    ($left:expr, $right:expr, $epsilon:expr $(,)?) => {{
        let left_val: f64 = $left;
        let right_val: f64 = $right;
        let eps: f64 = $epsilon;

        if left_val.is_nan() && right_val.is_nan() {
            // NaN == NaN for our purposes.
        } else if left_val.is_infinite()
            && right_val.is_infinite()
            && left_val.signum() == right_val.signum()
        {
            // Same-signed infinities are equal.
        } else {
            assert!(
                (left_val - right_val).abs() < eps,
                "assertion failed: `(left ≈ right)` (left: `{}`, right: `{}`, epsilon: `{}`)",
                left_val,
                right_val,
                eps
            );
        }
    }};
}
