//! The AST builder: a shunting-yard parser that produces an [`Expr`] tree
//! directly, without an intermediate postfix stream.
//!
//! The builder keeps an operand stack of finished subtrees and an operator
//! stack of pending operators, brackets, and function calls. Identifiers are
//! resolved while parsing: a name registered as a constant becomes a float
//! literal, a name followed by `(` must be a registered function, anything
//! else becomes a variable reference. Unary minus is recognized positionally:
//! a `-` at the start of an expression or after an operator, `(`, or argument
//! separator.

use std::sync::Arc;

use crate::context::{normalize_name, Arity, ConstantRegistry, FunctionInfo, FunctionRegistry};
use crate::error::ParseError;
use crate::types::{BinaryOp, Expr, Token, TokenKind, UnaryOp, UNARY_PRECEDENCE};

/// Builds an AST from a token sequence, resolving names against the given
/// registries.
pub fn build_ast(
    tokens: &[Token],
    functions: &FunctionRegistry,
    constants: &ConstantRegistry,
) -> Result<Expr, ParseError> {
    AstBuilder::new(functions, constants).build(tokens)
}

enum StackEntry {
    Binary { op: BinaryOp, position: usize },
    Unary { position: usize },
    Bracket { position: usize, function: bool },
    Function { info: Arc<FunctionInfo>, position: usize },
}

struct AstBuilder<'a> {
    functions: &'a FunctionRegistry,
    constants: &'a ConstantRegistry,
    operands: Vec<Expr>,
    operators: Vec<StackEntry>,
    /// Separator count per open function bracket, innermost last.
    separator_counts: Vec<usize>,
}

impl<'a> AstBuilder<'a> {
    fn new(functions: &'a FunctionRegistry, constants: &'a ConstantRegistry) -> Self {
        Self {
            functions,
            constants,
            operands: Vec::new(),
            operators: Vec::new(),
            separator_counts: Vec::new(),
        }
    }

    fn build(mut self, tokens: &[Token]) -> Result<Expr, ParseError> {
        if tokens.is_empty() {
            return Err(ParseError::EmptyExpression);
        }

        let mut prev: Option<&TokenKind> = None;
        for (index, token) in tokens.iter().enumerate() {
            match &token.kind {
                TokenKind::Integer(value) => {
                    self.guard_operand_position(prev, token)?;
                    self.operands.push(Expr::Integer(*value));
                }
                TokenKind::FloatingPoint(value) => {
                    self.guard_operand_position(prev, token)?;
                    self.operands.push(Expr::Float(*value));
                }
                TokenKind::Symbol(name) => {
                    self.guard_operand_position(prev, token)?;
                    let called = matches!(
                        tokens.get(index + 1),
                        Some(Token {
                            kind: TokenKind::LeftBracket,
                            ..
                        })
                    );
                    self.push_symbol(name, called, token.position)?;
                }
                TokenKind::Operator(op) => {
                    if unary_position(prev) {
                        if *op == BinaryOp::Subtract {
                            self.operators.push(StackEntry::Unary {
                                position: token.position,
                            });
                        } else {
                            return Err(ParseError::MissingOperand {
                                position: token.position,
                            });
                        }
                    } else {
                        self.push_binary(*op, token.position)?;
                    }
                }
                TokenKind::LeftBracket => {
                    if prev.is_some_and(|p| p.ends_operand() && !matches!(p, TokenKind::Symbol(_)))
                    {
                        return Err(ParseError::UnexpectedToken {
                            text: "(".to_string(),
                            position: token.position,
                        });
                    }
                    // A symbol directly before us was resolved as a call, so
                    // this bracket opens its argument list.
                    let function = matches!(prev, Some(TokenKind::Symbol(_)));
                    self.operators.push(StackEntry::Bracket {
                        position: token.position,
                        function,
                    });
                    if function {
                        self.separator_counts.push(0);
                    }
                }
                TokenKind::ArgumentSeparator => {
                    if !prev.is_some_and(|p| p.ends_operand()) {
                        return Err(ParseError::MissingOperand {
                            position: token.position,
                        });
                    }
                    self.separator(token.position)?;
                }
                TokenKind::RightBracket => {
                    if prev.is_some_and(|p| {
                        matches!(p, TokenKind::Operator(_) | TokenKind::ArgumentSeparator)
                    }) {
                        return Err(ParseError::MissingOperand {
                            position: token.position,
                        });
                    }
                    let empty = matches!(prev, Some(TokenKind::LeftBracket));
                    self.close_bracket(empty, token.position)?;
                }
            }
            prev = Some(&token.kind);
        }

        while let Some(entry) = self.operators.pop() {
            match entry {
                StackEntry::Bracket { position, .. } | StackEntry::Function { position, .. } => {
                    return Err(ParseError::MissingRightBracket { position });
                }
                entry => self.apply(entry)?,
            }
        }

        match self.operands.len() {
            1 => Ok(self.operands.remove(0)),
            _ => Err(ParseError::MissingOperand {
                position: tokens[tokens.len() - 1].position,
            }),
        }
    }

    /// Rejects an operand that directly follows another operand; implicit
    /// multiplication is not part of the grammar.
    fn guard_operand_position(
        &self,
        prev: Option<&TokenKind>,
        token: &Token,
    ) -> Result<(), ParseError> {
        if prev.is_some_and(|p| p.ends_operand()) {
            return Err(ParseError::UnexpectedToken {
                text: token.kind.text(),
                position: token.position,
            });
        }
        Ok(())
    }

    /// Resolves an identifier: function call, registered constant, or
    /// variable.
    fn push_symbol(&mut self, name: &str, called: bool, position: usize) -> Result<(), ParseError> {
        let key = normalize_name(name, self.functions.case_sensitive());
        if called {
            match self.functions.get_normalized(key.as_ref()) {
                Some(info) => {
                    self.operators.push(StackEntry::Function {
                        info: Arc::clone(info),
                        position,
                    });
                    Ok(())
                }
                None => Err(ParseError::UnknownFunction {
                    name: name.to_string(),
                    position,
                }),
            }
        } else if let Some(value) = self.constants.get_normalized(key.as_ref()) {
            self.operands.push(Expr::Float(value));
            Ok(())
        } else {
            self.operands.push(Expr::Variable(key.into_owned()));
            Ok(())
        }
    }

    /// Pops every pending operator of higher precedence (or equal precedence
    /// when the incoming operator is left-associative), then pushes.
    fn push_binary(&mut self, op: BinaryOp, position: usize) -> Result<(), ParseError> {
        let precedence = op.precedence();
        while let Some(top) = self.operators.last() {
            let pop = match top {
                StackEntry::Binary { op: pending, .. } => {
                    pending.precedence() > precedence
                        || (pending.precedence() == precedence && op.is_left_associative())
                }
                StackEntry::Unary { .. } => UNARY_PRECEDENCE > precedence,
                _ => false,
            };
            if !pop {
                break;
            }
            if let Some(entry) = self.operators.pop() {
                self.apply(entry)?;
            }
        }
        self.operators.push(StackEntry::Binary { op, position });
        Ok(())
    }

    /// Handles an argument separator: pop to the enclosing bracket and count
    /// the boundary, failing if the bracket is not a function call's.
    fn separator(&mut self, position: usize) -> Result<(), ParseError> {
        if !self.pop_to_bracket()? {
            return Err(ParseError::UnexpectedSeparator { position });
        }
        match self.operators.last() {
            Some(StackEntry::Bracket { function: true, .. }) => {
                if let Some(count) = self.separator_counts.last_mut() {
                    *count += 1;
                }
                Ok(())
            }
            _ => Err(ParseError::UnexpectedSeparator { position }),
        }
    }

    /// Handles `)`: pop to the matching bracket, then finish the grouping or
    /// build the function call node with arity checking.
    fn close_bracket(&mut self, empty: bool, position: usize) -> Result<(), ParseError> {
        if !self.pop_to_bracket()? {
            return Err(ParseError::MissingLeftBracket { position });
        }
        let function = match self.operators.pop() {
            Some(StackEntry::Bracket { function, .. }) => function,
            _ => return Err(ParseError::MissingLeftBracket { position }),
        };

        if !function {
            if empty {
                // "()" groups nothing.
                return Err(ParseError::MissingOperand { position });
            }
            return Ok(());
        }

        let (info, call_position) = match self.operators.pop() {
            Some(StackEntry::Function { info, position }) => (info, position),
            _ => return Err(ParseError::MissingLeftBracket { position }),
        };
        let separators = self.separator_counts.pop().unwrap_or(0);
        let count = if empty { 0 } else { separators + 1 };

        match info.arity {
            Arity::Fixed(expected) if count != expected => {
                return Err(ParseError::ArityMismatch {
                    name: info.name.clone(),
                    expected,
                    found: count,
                    position: call_position,
                });
            }
            Arity::Dynamic if count == 0 => {
                return Err(ParseError::MissingArguments {
                    name: info.name.clone(),
                    position: call_position,
                });
            }
            _ => {}
        }

        if self.operands.len() < count {
            return Err(ParseError::MissingOperand { position });
        }
        let args = self.operands.split_off(self.operands.len() - count);
        self.operands.push(Expr::Function {
            name: info.name.clone(),
            args,
        });
        Ok(())
    }

    /// Applies pending operators until a bracket is on top. Returns false if
    /// the stack drains without finding one.
    fn pop_to_bracket(&mut self) -> Result<bool, ParseError> {
        loop {
            match self.operators.last() {
                Some(StackEntry::Bracket { .. }) => return Ok(true),
                Some(_) => {
                    if let Some(entry) = self.operators.pop() {
                        self.apply(entry)?;
                    }
                }
                None => return Ok(false),
            }
        }
    }

    /// Pops operands and pushes the finished subtree for one operator.
    fn apply(&mut self, entry: StackEntry) -> Result<(), ParseError> {
        match entry {
            StackEntry::Binary { op, position } => {
                let right = self
                    .operands
                    .pop()
                    .ok_or(ParseError::MissingOperand { position })?;
                let left = self
                    .operands
                    .pop()
                    .ok_or(ParseError::MissingOperand { position })?;
                self.operands.push(Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                });
            }
            StackEntry::Unary { position } => {
                let operand = self
                    .operands
                    .pop()
                    .ok_or(ParseError::MissingOperand { position })?;
                self.operands.push(Expr::Unary {
                    op: UnaryOp::Negate,
                    operand: Box::new(operand),
                });
            }
            StackEntry::Bracket { .. } | StackEntry::Function { .. } => {}
        }
        Ok(())
    }
}

/// A `-` in these positions is a unary minus rather than subtraction.
fn unary_position(prev: Option<&TokenKind>) -> bool {
    match prev {
        None => true,
        Some(TokenKind::Operator(_))
        | Some(TokenKind::LeftBracket)
        | Some(TokenKind::ArgumentSeparator) => true,
        _ => false,
    }
}
