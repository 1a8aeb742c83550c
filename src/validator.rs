//! A token-level validation pass run before the AST builder.
//!
//! The validator enumerates tokens once and checks bracket balance, adjacency
//! rules, and argument counts, producing the same [`ParseError`] variants the
//! builder would but without constructing anything. It is a pure diagnostic
//! layer and can be disabled at evaluator construction
//! (`validation_enabled = false`); the builder still rejects every malformed
//! input on its own.

use crate::context::{Arity, FunctionRegistry};
use crate::error::ParseError;
use crate::types::{BinaryOp, Token, TokenKind};

struct Frame {
    open_position: usize,
    /// Set when this bracket opens a function argument list.
    call: Option<(String, Arity, usize)>,
    separators: usize,
}

/// Checks a token sequence without building an AST.
pub fn validate(tokens: &[Token], functions: &FunctionRegistry) -> Result<(), ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::EmptyExpression);
    }

    let mut frames: Vec<Frame> = Vec::new();
    let mut prev: Option<&Token> = None;

    for (index, token) in tokens.iter().enumerate() {
        match &token.kind {
            TokenKind::Integer(_) | TokenKind::FloatingPoint(_) | TokenKind::Symbol(_) => {
                if prev.is_some_and(|p| p.kind.ends_operand()) {
                    return Err(ParseError::UnexpectedToken {
                        text: token.kind.text(),
                        position: token.position,
                    });
                }
                if let TokenKind::Symbol(name) = &token.kind {
                    // A registered function name must open an argument list.
                    if functions.contains(name)
                        && !matches!(
                            tokens.get(index + 1),
                            Some(Token {
                                kind: TokenKind::LeftBracket,
                                ..
                            })
                        )
                    {
                        return Err(ParseError::UnexpectedToken {
                            text: name.clone(),
                            position: token.position,
                        });
                    }
                }
            }
            TokenKind::Operator(op) => {
                let unary_slot = match prev.map(|p| &p.kind) {
                    None
                    | Some(TokenKind::Operator(_))
                    | Some(TokenKind::LeftBracket)
                    | Some(TokenKind::ArgumentSeparator) => true,
                    _ => false,
                };
                // Two operators in a row (or an operator opening an
                // expression) are only allowed when the second is unary minus.
                if unary_slot && *op != BinaryOp::Subtract {
                    return Err(ParseError::MissingOperand {
                        position: token.position,
                    });
                }
            }
            TokenKind::LeftBracket => {
                let call = match prev.map(|p| (&p.kind, p.position)) {
                    Some((TokenKind::Symbol(name), symbol_position)) => {
                        match functions.get(name) {
                            Some(info) => Some((info.name.clone(), info.arity, symbol_position)),
                            None => {
                                return Err(ParseError::UnknownFunction {
                                    name: name.clone(),
                                    position: symbol_position,
                                });
                            }
                        }
                    }
                    _ => None,
                };
                if call.is_none() && prev.is_some_and(|p| p.kind.ends_operand()) {
                    // An operand cannot abut '('.
                    return Err(ParseError::UnexpectedToken {
                        text: "(".to_string(),
                        position: token.position,
                    });
                }
                frames.push(Frame {
                    open_position: token.position,
                    call,
                    separators: 0,
                });
            }
            TokenKind::ArgumentSeparator => {
                if !prev.is_some_and(|p| p.kind.ends_operand()) {
                    return Err(ParseError::MissingOperand {
                        position: token.position,
                    });
                }
                match frames.last_mut() {
                    Some(frame) if frame.call.is_some() => frame.separators += 1,
                    _ => {
                        return Err(ParseError::UnexpectedSeparator {
                            position: token.position,
                        });
                    }
                }
            }
            TokenKind::RightBracket => {
                if prev.is_some_and(|p| {
                    matches!(
                        p.kind,
                        TokenKind::Operator(_) | TokenKind::ArgumentSeparator
                    )
                }) {
                    return Err(ParseError::MissingOperand {
                        position: token.position,
                    });
                }
                let frame = frames.pop().ok_or(ParseError::MissingLeftBracket {
                    position: token.position,
                })?;
                let empty = matches!(prev.map(|p| &p.kind), Some(TokenKind::LeftBracket));
                match frame.call {
                    Some((name, arity, call_position)) => {
                        let count = if empty { 0 } else { frame.separators + 1 };
                        match arity {
                            Arity::Fixed(expected) if count != expected => {
                                return Err(ParseError::ArityMismatch {
                                    name,
                                    expected,
                                    found: count,
                                    position: call_position,
                                });
                            }
                            Arity::Dynamic if count == 0 => {
                                return Err(ParseError::MissingArguments {
                                    name,
                                    position: call_position,
                                });
                            }
                            _ => {}
                        }
                    }
                    None if empty => {
                        return Err(ParseError::MissingOperand {
                            position: token.position,
                        });
                    }
                    None => {}
                }
            }
        }
        prev = Some(token);
    }

    if let Some(frame) = frames.first() {
        return Err(ParseError::MissingRightBracket {
            position: frame.open_position,
        });
    }
    if prev.is_some_and(|p| matches!(p.kind, TokenKind::Operator(_))) {
        return Err(ParseError::MissingOperand {
            position: prev.map_or(0, |p| p.position),
        });
    }
    Ok(())
}
