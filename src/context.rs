//! Function and constant registries, and the per-evaluation context.
//!
//! Both registries are populated while the evaluator is being built and are
//! effectively immutable afterwards; executors hold them by [`Arc`] handle.
//! Name handling is a registry-wide setting fixed at construction: in
//! case-insensitive mode every key is canonicalized to lowercase, at
//! registration, at parse time, and for the caller's variable map once per
//! evaluation.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ArgumentError, EvaluationError};

/// How many arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments; zero is allowed (e.g. `random()`).
    Fixed(usize),
    /// One or more arguments, passed to the callable as one slice.
    Dynamic,
}

impl Arity {
    pub fn is_dynamic(self) -> bool {
        matches!(self, Arity::Dynamic)
    }
}

/// Type-erased function body. Fixed-arity functions receive exactly their
/// declared number of values; dynamic functions receive however many the call
/// site packed.
pub type NativeCallable = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// A registered function: name, arity, idempotence, and the callable.
///
/// Idempotent means the output depends only on the inputs, which is what makes
/// a call safe to fold at build time. `random` is the canonical
/// non-idempotent example.
#[derive(Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub arity: Arity,
    pub idempotent: bool,
    pub callable: NativeCallable,
}

impl fmt::Debug for FunctionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionInfo")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("idempotent", &self.idempotent)
            .finish()
    }
}

/// A registered constant.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantInfo {
    pub name: String,
    pub value: f64,
}

/// Canonicalizes a name according to the case-sensitivity setting.
///
/// ASCII names take the fast path; non-ASCII names fall back to Unicode-aware
/// lowercasing.
pub(crate) fn normalize_name(name: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive {
        Cow::Borrowed(name)
    } else if name.is_ascii() {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            Cow::Owned(name.to_ascii_lowercase())
        } else {
            Cow::Borrowed(name)
        }
    } else {
        Cow::Owned(name.to_lowercase())
    }
}

/// Registry of callable functions, keyed by canonical name.
#[derive(Clone, Default, Debug)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<FunctionInfo>>,
    case_sensitive: bool,
    guarded: bool,
}

impl FunctionRegistry {
    pub fn new(case_sensitive: bool, guarded: bool) -> Self {
        Self {
            functions: HashMap::new(),
            case_sensitive,
            guarded,
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Registers a function, enforcing the registry rules: guarded mode
    /// forbids overwriting, and even unguarded overwrites must keep the
    /// original arity and dynamic-arity flag.
    pub fn register<F>(
        &mut self,
        name: &str,
        arity: Arity,
        idempotent: bool,
        callable: F,
    ) -> Result<(), ArgumentError>
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        let key = normalize_name(name, self.case_sensitive).into_owned();
        if let Some(existing) = self.functions.get(&key) {
            if self.guarded {
                return Err(ArgumentError::FunctionAlreadyRegistered { name: key });
            }
            if existing.arity != arity {
                return Err(ArgumentError::ArityChange { name: key });
            }
        }
        self.functions.insert(
            key.clone(),
            Arc::new(FunctionInfo {
                name: key,
                arity,
                idempotent,
                callable: Arc::new(callable),
            }),
        );
        Ok(())
    }

    /// Looks up a function by user-facing name.
    pub fn get(&self, name: &str) -> Option<&Arc<FunctionInfo>> {
        self.functions
            .get(normalize_name(name, self.case_sensitive).as_ref())
    }

    /// Hot-path lookup with an already-canonical key (AST names are stored
    /// canonicalized).
    pub(crate) fn get_normalized(&self, key: &str) -> Option<&Arc<FunctionInfo>> {
        self.functions.get(key)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Enumerates the registered functions in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FunctionInfo>> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Registry of named constants, keyed by canonical name.
#[derive(Clone, Default, Debug)]
pub struct ConstantRegistry {
    constants: HashMap<String, ConstantInfo>,
    case_sensitive: bool,
    guarded: bool,
}

impl ConstantRegistry {
    pub fn new(case_sensitive: bool, guarded: bool) -> Self {
        Self {
            constants: HashMap::new(),
            case_sensitive,
            guarded,
        }
    }

    pub fn register(&mut self, name: &str, value: f64) -> Result<(), ArgumentError> {
        let key = normalize_name(name, self.case_sensitive).into_owned();
        if self.guarded && self.constants.contains_key(&key) {
            return Err(ArgumentError::ConstantAlreadyRegistered { name: key });
        }
        self.constants
            .insert(key.clone(), ConstantInfo { name: key, value });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.constants
            .get(normalize_name(name, self.case_sensitive).as_ref())
            .map(|c| c.value)
    }

    pub(crate) fn get_normalized(&self, key: &str) -> Option<f64> {
        self.constants.get(key).map(|c| c.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constants
            .contains_key(normalize_name(name, self.case_sensitive).as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstantInfo> {
        self.constants.values()
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

/// Transient per-evaluation bundle of variables and registry handles.
///
/// Created at the start of each evaluation and discarded afterwards; the
/// engine never mutates the caller's variable map. In case-sensitive mode the
/// map is borrowed as-is; in case-insensitive mode a lowercased copy is taken
/// once so every lookup stays a plain hash probe.
pub struct FormulaContext<'a> {
    variables: Cow<'a, HashMap<String, f64>>,
    pub functions: &'a FunctionRegistry,
    pub constants: &'a ConstantRegistry,
}

impl<'a> FormulaContext<'a> {
    pub fn new(
        variables: &'a HashMap<String, f64>,
        functions: &'a FunctionRegistry,
        constants: &'a ConstantRegistry,
    ) -> Self {
        let variables = if functions.case_sensitive() {
            Cow::Borrowed(variables)
        } else {
            Cow::Owned(
                variables
                    .iter()
                    .map(|(name, value)| (normalize_name(name, false).into_owned(), *value))
                    .collect(),
            )
        };
        Self {
            variables,
            functions,
            constants,
        }
    }

    /// Resolves a canonical variable name: the variable map first, then the
    /// constant registry.
    pub fn lookup(&self, name: &str) -> Result<f64, EvaluationError> {
        if let Some(value) = self.variables.get(name) {
            return Ok(*value);
        }
        if let Some(value) = self.constants.get_normalized(name) {
            return Ok(value);
        }
        Err(EvaluationError::VariableNotDefined {
            name: name.to_string(),
        })
    }

    /// True when the canonical name resolves without error.
    pub fn has_binding(&self, name: &str) -> bool {
        self.variables.contains_key(name) || self.constants.get_normalized(name).is_some()
    }
}
