//! The public facade: [`EvaluatorOptions`], [`EvaluatorBuilder`], and
//! [`Evaluator`].
//!
//! An evaluator owns one function registry, one constant registry, and
//! optionally one formula cache, all fixed at construction. Everything it
//! hands out ([`Formula`] delegates included) holds the registries by `Arc`,
//! so evaluators and delegates can be shared freely across threads.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::FormulaCache;
use crate::context::{
    Arity, ConstantInfo, ConstantRegistry, FunctionInfo, FunctionRegistry, NativeCallable,
};
use crate::engine::build_ast;
use crate::error::{ArgumentError, Result};
use crate::eval::{ExecutionMode, Formula};
use crate::functions::{register_default_constants, register_default_functions};
use crate::lexer::tokenize;
use crate::optimizer::optimize;
use crate::validator::validate;

/// The configuration record consumed at evaluator construction.
#[derive(Debug, Clone)]
pub struct EvaluatorOptions {
    /// Whether identifier lookup distinguishes case.
    pub case_sensitive: bool,
    /// Decimal separator for numeric literals, `.` or `,`.
    pub decimal_separator: char,
    /// Separator between function arguments; must differ from the decimal
    /// separator.
    pub argument_separator: char,
    pub execution_mode: ExecutionMode,
    pub optimizer_enabled: bool,
    pub validation_enabled: bool,
    /// Guarded mode forbids redefinitions and cross-kind name collisions and
    /// checks variable-map completeness before each evaluation.
    pub guarded_mode_enabled: bool,
    pub cache_enabled: bool,
    pub cache_maximum_size: usize,
    pub cache_reduction_size: usize,
    /// Pre-register `e` and `pi`.
    pub default_constants: bool,
    /// Pre-register the default function table.
    pub default_functions: bool,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            decimal_separator: '.',
            argument_separator: ',',
            execution_mode: ExecutionMode::Compiled,
            optimizer_enabled: true,
            validation_enabled: true,
            guarded_mode_enabled: false,
            cache_enabled: true,
            cache_maximum_size: 500,
            cache_reduction_size: 50,
            default_constants: true,
            default_functions: true,
        }
    }
}

impl EvaluatorOptions {
    fn check(&self) -> std::result::Result<(), ArgumentError> {
        if !matches!(self.decimal_separator, '.' | ',')
            || self.argument_separator == self.decimal_separator
        {
            return Err(ArgumentError::InvalidSeparators {
                decimal: self.decimal_separator,
                argument: self.argument_separator,
            });
        }
        if self.cache_maximum_size == 0
            || self.cache_reduction_size == 0
            || self.cache_reduction_size > self.cache_maximum_size
        {
            return Err(ArgumentError::InvalidCacheSize {
                maximum: self.cache_maximum_size,
                reduction: self.cache_reduction_size,
            });
        }
        Ok(())
    }
}

struct PendingFunction {
    name: String,
    arity: Arity,
    idempotent: bool,
    callable: NativeCallable,
}

/// Fluent construction of an [`Evaluator`].
///
/// # Examples
///
/// ```
/// use formula_rs::Evaluator;
///
/// let evaluator = Evaluator::builder()
///     .constant("g", 9.81)
///     .function("double", 1, true, |args| args[0] * 2.0)
///     .build()
///     .unwrap();
///
/// let result = evaluator
///     .evaluate("double(g)", &Default::default())
///     .unwrap();
/// assert_eq!(result, 19.62);
/// ```
pub struct EvaluatorBuilder {
    options: EvaluatorOptions,
    constants: Vec<(String, f64)>,
    functions: Vec<PendingFunction>,
}

impl Default for EvaluatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluatorBuilder {
    pub fn new() -> Self {
        Self::from_options(EvaluatorOptions::default())
    }

    pub fn from_options(options: EvaluatorOptions) -> Self {
        Self {
            options,
            constants: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn case_sensitive(mut self, enabled: bool) -> Self {
        self.options.case_sensitive = enabled;
        self
    }

    pub fn decimal_separator(mut self, separator: char) -> Self {
        self.options.decimal_separator = separator;
        self
    }

    pub fn argument_separator(mut self, separator: char) -> Self {
        self.options.argument_separator = separator;
        self
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.options.execution_mode = mode;
        self
    }

    pub fn optimizer_enabled(mut self, enabled: bool) -> Self {
        self.options.optimizer_enabled = enabled;
        self
    }

    pub fn validation_enabled(mut self, enabled: bool) -> Self {
        self.options.validation_enabled = enabled;
        self
    }

    pub fn guarded_mode(mut self, enabled: bool) -> Self {
        self.options.guarded_mode_enabled = enabled;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.options.cache_enabled = enabled;
        self
    }

    pub fn cache_sizes(mut self, maximum: usize, reduction: usize) -> Self {
        self.options.cache_maximum_size = maximum;
        self.options.cache_reduction_size = reduction;
        self
    }

    pub fn default_constants(mut self, enabled: bool) -> Self {
        self.options.default_constants = enabled;
        self
    }

    pub fn default_functions(mut self, enabled: bool) -> Self {
        self.options.default_functions = enabled;
        self
    }

    /// Adds a user constant.
    pub fn constant(mut self, name: &str, value: f64) -> Self {
        self.constants.push((name.to_string(), value));
        self
    }

    /// Adds a fixed-arity user function. All parameters are `f64`; mark it
    /// idempotent only when the output depends on nothing but the inputs.
    pub fn function<F>(mut self, name: &str, arity: usize, idempotent: bool, callable: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.functions.push(PendingFunction {
            name: name.to_string(),
            arity: Arity::Fixed(arity),
            idempotent,
            callable: Arc::new(callable),
        });
        self
    }

    /// Adds a variable-arity user function; it receives all call-site
    /// arguments as one slice and must accept one or more.
    pub fn dynamic_function<F>(mut self, name: &str, idempotent: bool, callable: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.functions.push(PendingFunction {
            name: name.to_string(),
            arity: Arity::Dynamic,
            idempotent,
            callable: Arc::new(callable),
        });
        self
    }

    /// Validates the options, registers defaults and user entries, and
    /// freezes the registries into an [`Evaluator`].
    pub fn build(self) -> Result<Evaluator> {
        self.options.check()?;
        let guarded = self.options.guarded_mode_enabled;

        let mut functions = FunctionRegistry::new(self.options.case_sensitive, guarded);
        let mut constants = ConstantRegistry::new(self.options.case_sensitive, guarded);
        if self.options.default_functions {
            register_default_functions(&mut functions)?;
        }
        if self.options.default_constants {
            register_default_constants(&mut constants)?;
        }

        for (name, value) in &self.constants {
            if guarded && functions.contains(name) {
                return Err(ArgumentError::NameCollision { name: name.clone() }.into());
            }
            constants.register(name, *value)?;
        }
        for pending in self.functions {
            if guarded && constants.contains(&pending.name) {
                return Err(ArgumentError::NameCollision { name: pending.name }.into());
            }
            let callable = pending.callable;
            functions.register(
                &pending.name,
                pending.arity,
                pending.idempotent,
                move |args| callable(args),
            )?;
        }

        let cache = self
            .options
            .cache_enabled
            .then(|| FormulaCache::new(self.options.cache_maximum_size, self.options.cache_reduction_size));

        Ok(Evaluator {
            options: self.options,
            functions: Arc::new(functions),
            constants: Arc::new(constants),
            cache,
        })
    }
}

/// The expression evaluation engine.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use formula_rs::Evaluator;
///
/// let evaluator = Evaluator::new();
///
/// let mut variables = HashMap::new();
/// variables.insert("x".to_string(), 3.0);
///
/// assert_eq!(evaluator.evaluate("x * 2 + 1", &variables).unwrap(), 7.0);
/// ```
#[derive(Debug)]
pub struct Evaluator {
    options: EvaluatorOptions,
    functions: Arc<FunctionRegistry>,
    constants: Arc<ConstantRegistry>,
    cache: Option<FormulaCache>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// An evaluator with the default options: compiled backend, optimizer,
    /// validation and caching on, guarded mode off, default functions and
    /// constants registered.
    pub fn new() -> Self {
        Self::builder()
            .build()
            .expect("default evaluator options are valid")
    }

    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::new()
    }

    /// Parses (or fetches from the cache) and evaluates an expression against
    /// a variable map.
    pub fn evaluate(&self, expression: &str, variables: &HashMap<String, f64>) -> Result<f64> {
        self.formula(expression)?.evaluate(variables)
    }

    /// Builds a reusable delegate for an expression. The delegate shares the
    /// evaluator's cache, registries, and thread-safety guarantees.
    pub fn create_delegate(&self, expression: &str) -> Result<Arc<Formula>> {
        self.formula(expression)
    }

    /// Checks an expression for syntax errors without building an executor.
    pub fn validate(&self, expression: &str) -> Result<()> {
        let tokens = tokenize(
            expression,
            self.options.decimal_separator,
            self.options.argument_separator,
        )?;
        validate(&tokens, &self.functions)?;
        build_ast(&tokens, &self.functions, &self.constants)?;
        Ok(())
    }

    /// Enumerates the registered functions.
    pub fn functions(&self) -> impl Iterator<Item = &Arc<FunctionInfo>> {
        self.functions.iter()
    }

    /// Enumerates the registered constants.
    pub fn constants(&self) -> impl Iterator<Item = &ConstantInfo> {
        self.constants.iter()
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    /// Number of formulas currently cached.
    pub fn cached_formula_count(&self) -> usize {
        self.cache.as_ref().map_or(0, FormulaCache::len)
    }

    fn formula(&self, expression: &str) -> Result<Arc<Formula>> {
        match &self.cache {
            Some(cache) => cache.get_or_build(expression, || self.build_formula(expression)),
            None => Ok(Arc::new(self.build_formula(expression)?)),
        }
    }

    fn build_formula(&self, expression: &str) -> Result<Formula> {
        tracing::debug!(expression, "building formula");
        let tokens = tokenize(
            expression,
            self.options.decimal_separator,
            self.options.argument_separator,
        )?;
        if self.options.validation_enabled {
            validate(&tokens, &self.functions)?;
        }
        let mut ast = build_ast(&tokens, &self.functions, &self.constants)?;
        if self.options.optimizer_enabled {
            ast = optimize(ast, &self.functions, &self.constants);
        }
        Ok(Formula::build(
            ast,
            self.options.execution_mode,
            Arc::clone(&self.functions),
            Arc::clone(&self.constants),
            self.options.guarded_mode_enabled,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, EvaluationError, ParseError};

    #[test]
    fn test_default_evaluator_round_trip() {
        let evaluator = Evaluator::new();
        assert_eq!(
            evaluator.evaluate("(2+3)*500", &HashMap::new()).unwrap(),
            2500.0
        );
    }

    #[test]
    fn test_invalid_separator_options() {
        let err = Evaluator::builder()
            .decimal_separator(',')
            .argument_separator(',')
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Argument(ArgumentError::InvalidSeparators { .. })
        ));
        assert!(Evaluator::builder()
            .decimal_separator(';')
            .build()
            .is_err());
    }

    #[test]
    fn test_invalid_cache_sizes() {
        let err = Evaluator::builder().cache_sizes(10, 20).build().unwrap_err();
        assert!(matches!(
            err,
            Error::Argument(ArgumentError::InvalidCacheSize {
                maximum: 10,
                reduction: 20
            })
        ));
        assert!(Evaluator::builder().cache_sizes(0, 0).build().is_err());
    }

    #[test]
    fn test_delegate_is_cached_and_reused() {
        let evaluator = Evaluator::new();
        let first = evaluator.create_delegate("1 + x").unwrap();
        let second = evaluator.create_delegate("1 + x").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(evaluator.cached_formula_count(), 1);
    }

    #[test]
    fn test_cache_disabled_builds_fresh_formulas() {
        let evaluator = Evaluator::builder().cache_enabled(false).build().unwrap();
        let first = evaluator.create_delegate("1 + 1").unwrap();
        let second = evaluator.create_delegate("1 + 1").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(evaluator.cached_formula_count(), 0);
    }

    #[test]
    fn test_validate_reports_errors_without_evaluating() {
        let evaluator = Evaluator::new();
        assert!(evaluator.validate("sin(x) + 1").is_ok());
        assert!(matches!(
            evaluator.validate("sin(1,2)").unwrap_err(),
            Error::Parse(ParseError::ArityMismatch { .. })
        ));
        assert!(matches!(
            evaluator.validate("1 +").unwrap_err(),
            Error::Parse(ParseError::MissingOperand { .. })
        ));
    }

    #[test]
    fn test_parse_errors_do_not_pollute_cache() {
        let evaluator = Evaluator::new();
        assert!(evaluator.evaluate("1 +", &HashMap::new()).is_err());
        assert_eq!(evaluator.cached_formula_count(), 0);
    }

    #[test]
    fn test_evaluation_error_keeps_formula_cached() {
        let evaluator = Evaluator::new();
        let err = evaluator.evaluate("missing + 1", &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            Error::Evaluation(EvaluationError::VariableNotDefined {
                name: "missing".to_string()
            })
        );
        // The executor survives; a later call with the variable works.
        let mut variables = HashMap::new();
        variables.insert("missing".to_string(), 2.0);
        assert_eq!(evaluator.evaluate("missing + 1", &variables).unwrap(), 3.0);
        assert_eq!(evaluator.cached_formula_count(), 1);
    }

    #[test]
    fn test_enumeration_surfaces() {
        let evaluator = Evaluator::builder()
            .constant("answer", 42.0)
            .function("nop", 1, true, |args| args[0])
            .build()
            .unwrap();
        assert!(evaluator.functions().any(|f| f.name == "nop"));
        assert!(evaluator.functions().any(|f| f.name == "sin"));
        assert!(evaluator.constants().any(|c| c.name == "answer"));
        assert!(evaluator.constants().any(|c| c.name == "pi"));
    }

    #[test]
    fn test_user_function_overrides_default_when_unguarded() {
        let evaluator = Evaluator::builder()
            .function("sin", 1, true, |_args| 99.0)
            .build()
            .unwrap();
        assert_eq!(evaluator.evaluate("sin(0)", &HashMap::new()).unwrap(), 99.0);
    }

    #[test]
    fn test_locale_separators_flow_into_tokenizer() {
        let evaluator = Evaluator::builder()
            .decimal_separator(',')
            .argument_separator(';')
            .build()
            .unwrap();
        assert_eq!(
            evaluator.evaluate("max(1,5; 2,5)", &HashMap::new()).unwrap(),
            2.5
        );
    }
}
