//! The default function table and default constants.
//!
//! All math functions are backed by the `libm` crate. Domain errors follow
//! IEEE-754: out-of-range inputs produce `NaN` rather than an error, and the
//! values propagate through the rest of the expression.
//!
//! Everything here is idempotent (output depends only on the inputs) except
//! `random`, which is therefore never folded by the optimizer.

use crate::context::{Arity, ConstantRegistry, FunctionRegistry};
use crate::error::ArgumentError;

/// Sum of all arguments.
fn sum(args: &[f64]) -> f64 {
    args.iter().sum()
}

/// Arithmetic mean of all arguments.
fn avg(args: &[f64]) -> f64 {
    sum(args) / args.len() as f64
}

/// Largest argument.
fn max(args: &[f64]) -> f64 {
    args[1..]
        .iter()
        .copied()
        .fold(args[0], |acc, v| if v > acc { v } else { acc })
}

/// Smallest argument.
fn min(args: &[f64]) -> f64 {
    args[1..]
        .iter()
        .copied()
        .fold(args[0], |acc, v| if v < acc { v } else { acc })
}

/// Middle value; the mean of the two middle values for even counts.
fn median(args: &[f64]) -> f64 {
    let mut sorted = args.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Registers the default function set.
///
/// Fixed-arity idempotent: trigonometry (with the reciprocal forms
/// `csc = 1/sin`, `sec = 1/cos`, `cot = cos/sin`, `acot(x) = atan(1/x)`),
/// logarithms, rounding, and the four branchless conditionals. All arguments
/// of the conditionals are evaluated; `if` treats any nonzero condition as
/// true. Dynamic-arity idempotent: `max`, `min`, `avg`, `median`, `sum`.
/// Non-idempotent: `random`, uniform in `[0, 1)`.
pub fn register_default_functions(registry: &mut FunctionRegistry) -> Result<(), ArgumentError> {
    registry.register("sin", Arity::Fixed(1), true, |args| libm::sin(args[0]))?;
    registry.register("cos", Arity::Fixed(1), true, |args| libm::cos(args[0]))?;
    registry.register("tan", Arity::Fixed(1), true, |args| libm::tan(args[0]))?;
    registry.register("asin", Arity::Fixed(1), true, |args| libm::asin(args[0]))?;
    registry.register("acos", Arity::Fixed(1), true, |args| libm::acos(args[0]))?;
    registry.register("atan", Arity::Fixed(1), true, |args| libm::atan(args[0]))?;
    registry.register("csc", Arity::Fixed(1), true, |args| 1.0 / libm::sin(args[0]))?;
    registry.register("sec", Arity::Fixed(1), true, |args| 1.0 / libm::cos(args[0]))?;
    registry.register("cot", Arity::Fixed(1), true, |args| {
        libm::cos(args[0]) / libm::sin(args[0])
    })?;
    registry.register("acot", Arity::Fixed(1), true, |args| libm::atan(1.0 / args[0]))?;

    registry.register("loge", Arity::Fixed(1), true, |args| libm::log(args[0]))?;
    registry.register("log10", Arity::Fixed(1), true, |args| libm::log10(args[0]))?;
    registry.register("logn", Arity::Fixed(2), true, |args| {
        libm::log(args[0]) / libm::log(args[1])
    })?;
    registry.register("sqrt", Arity::Fixed(1), true, |args| libm::sqrt(args[0]))?;
    registry.register("abs", Arity::Fixed(1), true, |args| libm::fabs(args[0]))?;

    registry.register("ceiling", Arity::Fixed(1), true, |args| libm::ceil(args[0]))?;
    registry.register("floor", Arity::Fixed(1), true, |args| libm::floor(args[0]))?;
    registry.register("truncate", Arity::Fixed(1), true, |args| libm::trunc(args[0]))?;
    registry.register("round", Arity::Fixed(1), true, |args| libm::round(args[0]))?;

    registry.register("if", Arity::Fixed(3), true, |args| {
        if args[0] != 0.0 {
            args[1]
        } else {
            args[2]
        }
    })?;
    registry.register("ifless", Arity::Fixed(4), true, |args| {
        if args[0] < args[1] {
            args[2]
        } else {
            args[3]
        }
    })?;
    registry.register("ifmore", Arity::Fixed(4), true, |args| {
        if args[0] > args[1] {
            args[2]
        } else {
            args[3]
        }
    })?;
    registry.register("ifequal", Arity::Fixed(4), true, |args| {
        if args[0] == args[1] {
            args[2]
        } else {
            args[3]
        }
    })?;

    registry.register("max", Arity::Dynamic, true, max)?;
    registry.register("min", Arity::Dynamic, true, min)?;
    registry.register("avg", Arity::Dynamic, true, avg)?;
    registry.register("median", Arity::Dynamic, true, median)?;
    registry.register("sum", Arity::Dynamic, true, sum)?;

    registry.register("random", Arity::Fixed(0), false, |_args| {
        rand::random::<f64>()
    })?;

    Ok(())
}

/// Registers the default constants `e` and `pi`.
pub fn register_default_constants(registry: &mut ConstantRegistry) -> Result<(), ArgumentError> {
    registry.register("e", std::f64::consts::E)?;
    registry.register("pi", std::f64::consts::PI)?;
    Ok(())
}
