//! The tree-walking executor.

use crate::context::FormulaContext;
use crate::error::EvaluationError;
use crate::types::Expr;

/// Evaluates an AST directly against a context.
///
/// Children evaluate left to right. Logical and comparison operators evaluate
/// both sides; there is no short-circuit. Function calls pack their evaluated
/// arguments into one contiguous slice and dispatch through the registry,
/// fixed and dynamic arity alike.
pub fn interpret(expr: &Expr, ctx: &FormulaContext<'_>) -> Result<f64, EvaluationError> {
    match expr {
        Expr::Integer(value) => Ok(*value as f64),
        Expr::Float(value) => Ok(*value),
        Expr::Variable(name) => ctx.lookup(name),
        Expr::Unary { op, operand } => Ok(op.apply(interpret(operand, ctx)?)),
        Expr::Binary { op, left, right } => {
            let left = interpret(left, ctx)?;
            let right = interpret(right, ctx)?;
            Ok(op.apply(left, right))
        }
        Expr::Function { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(interpret(arg, ctx)?);
            }
            match ctx.functions.get_normalized(name) {
                Some(info) => Ok((info.callable)(&values)),
                // The AST builder resolved the name against this same
                // registry, and registries are frozen after construction.
                None => unreachable!("function '{}' vanished from the registry", name),
            }
        }
    }
}
