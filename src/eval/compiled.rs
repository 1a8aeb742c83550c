//! The compiled executor: closure precomposition.
//!
//! The AST is walked exactly once, at build time, and each node becomes a
//! boxed closure wired to the closures of its children. Evaluating the result
//! is a chain of direct calls with no tree traversal and no name resolution
//! for functions: every call site captured its registry callable when it was
//! built. Variable nodes still resolve through the [`FormulaContext`] at call
//! time, exactly like the interpreter, so the two backends are observationally
//! identical, NaN and signed-zero cases included.

use std::sync::Arc;

use crate::context::{FormulaContext, FunctionRegistry};
use crate::error::EvaluationError;
use crate::types::Expr;

type Node = Box<dyn Fn(&FormulaContext) -> Result<f64, EvaluationError> + Send + Sync>;

/// A reusable compiled form of one expression.
pub struct CompiledExpression {
    root: Node,
}

impl CompiledExpression {
    /// Walks the AST once and precomposes the closure tree.
    pub fn compile(expr: &Expr, functions: &FunctionRegistry) -> Self {
        Self {
            root: compile_node(expr, functions),
        }
    }

    pub fn execute(&self, ctx: &FormulaContext<'_>) -> Result<f64, EvaluationError> {
        (self.root)(ctx)
    }
}

fn compile_node(expr: &Expr, functions: &FunctionRegistry) -> Node {
    match expr {
        Expr::Integer(value) => {
            let value = *value as f64;
            Box::new(move |_| Ok(value))
        }
        Expr::Float(value) => {
            let value = *value;
            Box::new(move |_| Ok(value))
        }
        Expr::Variable(name) => {
            let name = name.clone();
            Box::new(move |ctx| ctx.lookup(&name))
        }
        Expr::Unary { op, operand } => {
            let op = *op;
            let operand = compile_node(operand, functions);
            Box::new(move |ctx| Ok(op.apply(operand(ctx)?)))
        }
        Expr::Binary { op, left, right } => {
            let op = *op;
            let left = compile_node(left, functions);
            let right = compile_node(right, functions);
            Box::new(move |ctx| {
                let left = left(ctx)?;
                let right = right(ctx)?;
                Ok(op.apply(left, right))
            })
        }
        Expr::Function { name, args } => {
            let args: Vec<Node> = args
                .iter()
                .map(|arg| compile_node(arg, functions))
                .collect();
            let callable = match functions.get_normalized(name) {
                Some(info) => Arc::clone(&info.callable),
                // The AST builder resolved the name against this same
                // registry, and registries are frozen after construction.
                None => unreachable!("function '{}' vanished from the registry", name),
            };
            // Arguments are packed left to right into one contiguous buffer;
            // dynamic-arity callables see exactly the packed slice.
            Box::new(move |ctx| {
                let mut values = Vec::with_capacity(args.len());
                for arg in &args {
                    values.push(arg(ctx)?);
                }
                Ok(callable(&values))
            })
        }
    }
}
