//! Constant folding and algebraic identity rewrites over the AST.
//!
//! The optimizer runs bottom-up and is pure: it consumes the input tree and
//! returns a new one. After rewriting a node's children it first applies the
//! zero/one identities (which fire even with non-constant subtrees), then
//! folds any node whose children are all numeric constants, provided the node
//! is a built-in operator or an idempotent function. Folding delegates to the
//! interpreter so the optimizer can never disagree with the executors about
//! arithmetic.
//!
//! The `0 / x → 0` identity deliberately ignores the value of `x`; with
//! `x = 0` the rewrite yields `0` where IEEE evaluation would yield `NaN`.
//! This deviation is part of the engine's contract.

use std::collections::HashMap;

use crate::context::{ConstantRegistry, FormulaContext, FunctionRegistry};
use crate::eval::interpreter::interpret;
use crate::types::{BinaryOp, Expr};

/// Rewrites an expression tree into an equivalent, cheaper one.
pub fn optimize(expr: Expr, functions: &FunctionRegistry, constants: &ConstantRegistry) -> Expr {
    let optimizer = Optimizer {
        functions,
        constants,
        no_variables: HashMap::new(),
    };
    optimizer.rewrite(expr)
}

struct Optimizer<'a> {
    functions: &'a FunctionRegistry,
    constants: &'a ConstantRegistry,
    no_variables: HashMap<String, f64>,
}

impl<'a> Optimizer<'a> {
    fn rewrite(&self, expr: Expr) -> Expr {
        match expr {
            Expr::Integer(_) | Expr::Float(_) | Expr::Variable(_) => expr,
            Expr::Unary { op, operand } => {
                let operand = self.rewrite(*operand);
                self.fold(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.rewrite(*left);
                let right = self.rewrite(*right);

                match op {
                    // x * 0 and 0 * x collapse regardless of x.
                    BinaryOp::Multiply if is_zero(&left) || is_zero(&right) => {
                        return Expr::Float(0.0);
                    }
                    // 0 / x collapses regardless of x (documented deviation
                    // for x = 0).
                    BinaryOp::Divide if is_zero(&left) => return Expr::Float(0.0),
                    // x ^ 0 is 1, 0 ^ 0 included; 0 ^ x stays untouched.
                    BinaryOp::Power if is_zero(&right) => return Expr::Float(1.0),
                    _ => {}
                }

                self.fold(Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::Function { name, args } => {
                let args: Vec<Expr> = args.into_iter().map(|arg| self.rewrite(arg)).collect();
                self.fold(Expr::Function { name, args })
            }
        }
    }

    /// Replaces a node with a float constant when all of its children are
    /// constants and evaluating it at build time is safe.
    fn fold(&self, expr: Expr) -> Expr {
        if !self.foldable(&expr) {
            return expr;
        }
        let ctx = FormulaContext::new(&self.no_variables, self.functions, self.constants);
        match interpret(&expr, &ctx) {
            Ok(value) => Expr::Float(value),
            Err(_) => expr,
        }
    }

    fn foldable(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Unary { operand, .. } => operand.is_constant(),
            Expr::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Expr::Function { name, args } => {
                args.iter().all(Expr::is_constant)
                    && self
                        .functions
                        .get_normalized(name)
                        .is_some_and(|info| info.idempotent)
            }
            _ => false,
        }
    }
}

fn is_zero(expr: &Expr) -> bool {
    match expr {
        Expr::Integer(value) => *value == 0,
        Expr::Float(value) => *value == 0.0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::build_ast;
    use crate::functions::{register_default_constants, register_default_functions};
    use crate::lexer::tokenize;

    fn registries() -> (FunctionRegistry, ConstantRegistry) {
        let mut functions = FunctionRegistry::new(false, false);
        register_default_functions(&mut functions).unwrap();
        let mut constants = ConstantRegistry::new(false, false);
        register_default_constants(&mut constants).unwrap();
        (functions, constants)
    }

    fn optimized(input: &str) -> Expr {
        let (functions, constants) = registries();
        let tokens = tokenize(input, '.', ',').unwrap();
        let ast = build_ast(&tokens, &functions, &constants).unwrap();
        optimize(ast, &functions, &constants)
    }

    #[test]
    fn test_constant_folding() {
        assert_eq!(optimized("2 + 3 * 4"), Expr::Float(14.0));
        assert_eq!(optimized("-(2 + 3)"), Expr::Float(-5.0));
        assert_eq!(optimized("2 < 3"), Expr::Float(1.0));
        assert_eq!(optimized("max(1, 2, 3)"), Expr::Float(3.0));
        assert_eq!(optimized("sin(0)"), Expr::Float(0.0));
    }

    #[test]
    fn test_partial_folding_keeps_variables() {
        // (1 + 2) folds inside a tree that still references x.
        let expr = optimized("(1 + 2) * x");
        assert_eq!(expr.to_string(), "(3.0 * x)");
    }

    #[test]
    fn test_multiply_by_zero_identity() {
        assert_eq!(optimized("x * 0"), Expr::Float(0.0));
        assert_eq!(optimized("0 * x"), Expr::Float(0.0));
        assert_eq!(optimized("x * 0.0"), Expr::Float(0.0));
    }

    #[test]
    fn test_zero_dividend_identity() {
        assert_eq!(optimized("0 / x"), Expr::Float(0.0));
        // The documented deviation: the rewrite ignores x entirely.
        assert_eq!(optimized("0 / 0"), Expr::Float(0.0));
    }

    #[test]
    fn test_power_identities() {
        assert_eq!(optimized("x ^ 0"), Expr::Float(1.0));
        assert_eq!(optimized("0 ^ 0"), Expr::Float(1.0));
        // 0 ^ x depends on x and must survive.
        assert_eq!(optimized("0 ^ x").to_string(), "(0 ^ x)");
    }

    #[test]
    fn test_identity_feeds_folding_upward() {
        // 0 * x collapses, making sin's argument constant, so sin folds too.
        assert_eq!(optimized("sin(0 * x)"), Expr::Float(0.0));
    }

    #[test]
    fn test_non_idempotent_functions_never_fold() {
        let expr = optimized("random()");
        assert_eq!(
            expr,
            Expr::Function {
                name: "random".to_string(),
                args: vec![]
            }
        );
        // And a non-idempotent child blocks the parent fold.
        let expr = optimized("random() + 1");
        assert!(matches!(expr, Expr::Binary { .. }));
    }

    #[test]
    fn test_optimizer_is_idempotent() {
        let (functions, constants) = registries();
        for input in [
            "2 + 3 * 4",
            "x * 0 + y",
            "sin(0 * var1)",
            "random() + 1",
            "(a + b * c / 2) ^ 0",
            "0 ^ x",
            "max(1, x)",
        ] {
            let tokens = tokenize(input, '.', ',').unwrap();
            let ast = build_ast(&tokens, &functions, &constants).unwrap();
            let once = optimize(ast, &functions, &constants);
            let twice = optimize(once.clone(), &functions, &constants);
            assert_eq!(once, twice, "not idempotent for {}", input);
        }
    }

    #[test]
    fn test_fold_produces_float_constants() {
        // Integer inputs fold to floating-point constants.
        assert_eq!(optimized("2 + 3"), Expr::Float(5.0));
        assert_eq!(optimized("7"), Expr::Integer(7));
    }
}
