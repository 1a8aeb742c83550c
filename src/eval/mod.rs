//! Executors: the two backends and the [`Formula`] object that wraps one.
//!
//! A [`Formula`] is the long-lived product of the build pipeline. It holds
//! either the AST (interpreted mode) or a precomposed closure tree (compiled
//! mode) together with registry handles, and can be evaluated any number of
//! times, from any number of threads, each call against its own variable map.

pub mod compiled;
pub mod interpreter;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::context::{ConstantRegistry, FormulaContext, FunctionRegistry};
use crate::error::{EvaluationError, Result};
use crate::types::Expr;

use self::compiled::CompiledExpression;

/// Which backend executes a built formula.
///
/// Both backends are observationally identical; compiled mode trades build
/// time for faster repeated evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Walk the AST on every evaluation.
    Interpreted,
    /// Precompose a closure tree once, then run it without any traversal.
    #[default]
    Compiled,
}

enum FormulaBody {
    Interpreted(Expr),
    Compiled(CompiledExpression),
}

/// A reusable executable built from one expression.
///
/// Evaluation creates a transient [`FormulaContext`] around the caller's
/// variable map; the map itself is never mutated. In guarded mode every
/// variable the expression references must be present in the map or the
/// constant registry before execution starts.
pub struct Formula {
    body: FormulaBody,
    variables: BTreeSet<String>,
    functions: Arc<FunctionRegistry>,
    constants: Arc<ConstantRegistry>,
    guarded: bool,
}

impl Formula {
    pub(crate) fn build(
        expr: Expr,
        mode: ExecutionMode,
        functions: Arc<FunctionRegistry>,
        constants: Arc<ConstantRegistry>,
        guarded: bool,
    ) -> Self {
        let mut variables = BTreeSet::new();
        expr.collect_variables(&mut variables);
        let body = match mode {
            ExecutionMode::Interpreted => FormulaBody::Interpreted(expr),
            ExecutionMode::Compiled => {
                FormulaBody::Compiled(CompiledExpression::compile(&expr, &functions))
            }
        };
        Self {
            body,
            variables,
            functions,
            constants,
            guarded,
        }
    }

    /// The variable names the expression references, in canonical form,
    /// sorted.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|name| name.as_str())
    }

    /// Evaluates against a variable map.
    pub fn evaluate(&self, variables: &HashMap<String, f64>) -> Result<f64> {
        let ctx = FormulaContext::new(variables, &self.functions, &self.constants);
        if self.guarded {
            for name in &self.variables {
                if !ctx.has_binding(name) {
                    return Err(EvaluationError::VariableNotDefined {
                        name: name.clone(),
                    }
                    .into());
                }
            }
        }
        let value = match &self.body {
            FormulaBody::Interpreted(expr) => interpreter::interpret(expr, &ctx)?,
            FormulaBody::Compiled(compiled) => compiled.execute(&ctx)?,
        };
        Ok(value)
    }
}
