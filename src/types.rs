//! Core data structures: tokens, the expression AST, and operator tables.
//!
//! The tokenizer produces [`Token`]s, the AST builder turns them into an
//! [`Expr`] tree, and both executors walk that tree (the compiled backend only
//! once, at build time). Operator precedence and associativity live on
//! [`BinaryOp`] so the parser, the renderer, and the two executors all share a
//! single definition.

use std::collections::BTreeSet;
use std::fmt;

/// A single lexical element of an expression.
///
/// `position` and `length` are byte offsets into the source text; diagnostics
/// report `position` directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
    pub length: usize,
}

/// Classifies a token, carrying its decoded value where there is one.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A numeric literal without decimal separator or exponent, within `i64`
    /// range. Literals that overflow `i64` are promoted to [`TokenKind::FloatingPoint`].
    Integer(i64),

    /// A numeric literal with a decimal separator and/or exponent.
    FloatingPoint(f64),

    /// An identifier: variable, constant, or function name.
    Symbol(String),

    /// A binary operator symbol. `-` always lexes as [`BinaryOp::Subtract`];
    /// the parser reinterprets it as unary minus by position.
    Operator(BinaryOp),

    LeftBracket,
    RightBracket,

    /// The configured argument separator (`,` or `;`).
    ArgumentSeparator,
}

impl TokenKind {
    /// Source-shaped text for diagnostics.
    pub fn text(&self) -> String {
        match self {
            TokenKind::Integer(value) => value.to_string(),
            TokenKind::FloatingPoint(value) => format!("{:?}", value),
            TokenKind::Symbol(name) => name.clone(),
            TokenKind::Operator(op) => op.symbol().to_string(),
            TokenKind::LeftBracket => "(".to_string(),
            TokenKind::RightBracket => ")".to_string(),
            TokenKind::ArgumentSeparator => ",".to_string(),
        }
    }

    /// True for tokens that can end an operand: numbers, symbols, `)`.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Integer(_)
                | TokenKind::FloatingPoint(_)
                | TokenKind::Symbol(_)
                | TokenKind::RightBracket
        )
    }
}

/// Binary operators, in the order of the precedence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

/// Precedence of unary minus; binds tighter than every binary operator,
/// including `^`, so `-2^2` is `(-2)^2`.
pub const UNARY_PRECEDENCE: u8 = 8;

impl BinaryOp {
    /// Precedence level, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal | BinaryOp::NotEqual => 3,
            BinaryOp::LessThan
            | BinaryOp::LessOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterOrEqual => 4,
            BinaryOp::Add | BinaryOp::Subtract => 5,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 6,
            BinaryOp::Power => 7,
        }
    }

    /// Every operator is left-associative except exponentiation.
    pub fn is_left_associative(self) -> bool {
        !matches!(self, BinaryOp::Power)
    }

    /// The canonical source symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "^",
        }
    }

    /// Applies the operator to two already-evaluated operands.
    ///
    /// This is the single arithmetic definition shared by the interpreter, the
    /// compiled backend, and the optimizer's folding pass, so the backends
    /// cannot drift apart. Logical and comparison operators yield `1.0`/`0.0`
    /// with the nonzero-is-true convention; both operands have already been
    /// evaluated by the caller, so there is no short-circuit.
    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Subtract => left - right,
            BinaryOp::Multiply => left * right,
            BinaryOp::Divide => left / right,
            BinaryOp::Modulo => left % right,
            BinaryOp::Power => libm::pow(left, right),
            BinaryOp::And => bool_to_real(left != 0.0 && right != 0.0),
            BinaryOp::Or => bool_to_real(left != 0.0 || right != 0.0),
            BinaryOp::LessThan => bool_to_real(left < right),
            BinaryOp::LessOrEqual => bool_to_real(left <= right),
            BinaryOp::GreaterThan => bool_to_real(left > right),
            BinaryOp::GreaterOrEqual => bool_to_real(left >= right),
            BinaryOp::Equal => bool_to_real(left == right),
            BinaryOp::NotEqual => bool_to_real(left != right),
        }
    }
}

fn bool_to_real(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Unary operators. Only negation exists; unary `+` is a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
}

impl UnaryOp {
    pub fn apply(self, operand: f64) -> f64 {
        match self {
            UnaryOp::Negate => -operand,
        }
    }
}

/// Abstract syntax tree node for a parsed expression.
///
/// Each node exclusively owns its children; the tree is acyclic. Constants
/// registered in the constant registry are resolved to [`Expr::Float`] at
/// parse time, so a surviving [`Expr::Variable`] is a genuine runtime lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal, e.g. `42`.
    Integer(i64),

    /// Floating-point literal, e.g. `2.5`, `1e-3`, or any optimizer-produced
    /// constant.
    Float(f64),

    /// Runtime variable reference. Lowercase-normalized when the engine is
    /// case-insensitive.
    Variable(String),

    /// Unary operation, currently only negation.
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation. For `Divide` the left child is the dividend, for
    /// `Power` the left child is the base.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Function call with its ordered arguments.
    Function { name: String, args: Vec<Expr> },
}

impl Expr {
    /// True for numeric leaves, the inputs of constant folding.
    pub fn is_constant(&self) -> bool {
        matches!(self, Expr::Integer(_) | Expr::Float(_))
    }

    /// The numeric value of a constant leaf.
    pub fn constant_value(&self) -> Option<f64> {
        match self {
            Expr::Integer(value) => Some(*value as f64),
            Expr::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Collects every variable name referenced anywhere in the tree.
    ///
    /// Used by guarded mode to verify the variable map before evaluation and
    /// exposed through `Formula::variables`.
    pub fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Integer(_) | Expr::Float(_) => {}
            Expr::Variable(name) => {
                names.insert(name.clone());
            }
            Expr::Unary { operand, .. } => operand.collect_variables(names),
            Expr::Binary { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
        }
    }
}

/// Renders a fully parenthesized expression string.
///
/// Parsing the rendered text yields a structurally equal tree for any tree the
/// parser itself produced (literals in the parser's output are never
/// negative).
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(value) => write!(f, "{}", value),
            Expr::Float(value) => write!(f, "{:?}", value),
            Expr::Variable(name) => write!(f, "{}", name),
            Expr::Unary { operand, .. } => match operand.as_ref() {
                Expr::Integer(_) | Expr::Float(_) | Expr::Variable(_) | Expr::Function { .. } => {
                    write!(f, "-{}", operand)
                }
                _ => write!(f, "-({})", operand),
            },
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(BinaryOp::Power.precedence() > BinaryOp::Multiply.precedence());
        assert!(BinaryOp::Multiply.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() > BinaryOp::LessThan.precedence());
        assert!(BinaryOp::LessThan.precedence() > BinaryOp::Equal.precedence());
        assert!(BinaryOp::Equal.precedence() > BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
        assert!(UNARY_PRECEDENCE > BinaryOp::Power.precedence());
    }

    #[test]
    fn test_associativity() {
        assert!(!BinaryOp::Power.is_left_associative());
        assert!(BinaryOp::Add.is_left_associative());
        assert!(BinaryOp::Divide.is_left_associative());
    }

    #[test]
    fn test_apply_comparisons_yield_unit_values() {
        assert_eq!(BinaryOp::LessThan.apply(1.0, 2.0), 1.0);
        assert_eq!(BinaryOp::LessThan.apply(2.0, 1.0), 0.0);
        assert_eq!(BinaryOp::Equal.apply(3.0, 3.0), 1.0);
        assert_eq!(BinaryOp::NotEqual.apply(3.0, 3.0), 0.0);
        assert_eq!(BinaryOp::And.apply(2.0, -1.0), 1.0);
        assert_eq!(BinaryOp::And.apply(2.0, 0.0), 0.0);
        assert_eq!(BinaryOp::Or.apply(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_apply_ieee_edge_cases() {
        assert!(BinaryOp::Divide.apply(0.0, 0.0).is_nan());
        assert_eq!(BinaryOp::Divide.apply(1.0, 0.0), f64::INFINITY);
        assert_eq!(BinaryOp::Divide.apply(-1.0, 0.0), f64::NEG_INFINITY);
        assert_eq!(BinaryOp::Power.apply(0.0, 0.0), 1.0);
        assert!(BinaryOp::Equal.apply(f64::NAN, f64::NAN) == 0.0);
    }

    #[test]
    fn test_collect_variables() {
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::Variable("x".to_string())),
            right: Box::new(Expr::Function {
                name: "max".to_string(),
                args: vec![Expr::Variable("y".to_string()), Expr::Integer(1)],
            }),
        };
        let mut names = BTreeSet::new();
        expr.collect_variables(&mut names);
        let names: Vec<_> = names.into_iter().collect();
        assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_render_is_fully_parenthesized() {
        let expr = Expr::Binary {
            op: BinaryOp::Multiply,
            left: Box::new(Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(Expr::Integer(2)),
                right: Box::new(Expr::Integer(3)),
            }),
            right: Box::new(Expr::Float(0.5)),
        };
        assert_eq!(expr.to_string(), "((2 + 3) * 0.5)");
    }
}
