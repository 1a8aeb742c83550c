//! The tokenizer: raw text to an ordered [`Token`] sequence.
//!
//! The tokenizer is locale-aware through exactly two scalar parameters, the
//! decimal separator and the argument separator. Everything else about the
//! lexical grammar is fixed: maximal-munch numeric literals with an optional
//! exponent, `letter|_` identifiers, longest-match operators, and whitespace
//! as a discarded token boundary. Implicit multiplication is never inserted;
//! `2 x` tokenizes fine and fails in the parser.

use crate::error::ParseError;
use crate::types::{BinaryOp, Token, TokenKind};

/// Streaming tokenizer over an expression string.
#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    decimal_separator: char,
    argument_separator: char,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str, decimal_separator: char, argument_separator: char) -> Self {
        Self {
            input,
            pos: 0,
            decimal_separator,
            argument_separator,
        }
    }

    /// Peek at the current character.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Peek one character past the current one.
    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advance the position by one character.
    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Produce the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };

        if c.is_ascii_digit() {
            return self.scan_number(start).map(Some);
        }

        if c.is_alphabetic() || c == '_' {
            while let Some(nc) = self.peek() {
                if nc.is_alphanumeric() || nc == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
            let name = &self.input[start..self.pos];
            return Ok(Some(self.token(TokenKind::Symbol(name.to_string()), start)));
        }

        if c == '(' {
            self.advance();
            return Ok(Some(self.token(TokenKind::LeftBracket, start)));
        }
        if c == ')' {
            self.advance();
            return Ok(Some(self.token(TokenKind::RightBracket, start)));
        }
        if c == self.argument_separator {
            self.advance();
            return Ok(Some(self.token(TokenKind::ArgumentSeparator, start)));
        }

        if let Some(op) = self.scan_operator(c) {
            return Ok(Some(self.token(TokenKind::Operator(op), start)));
        }

        Err(ParseError::UnknownCharacter {
            character: c,
            position: start,
        })
    }

    /// Longest-match operator scan. `<>` and lone `=` are synonyms for `!=`
    /// and `==`.
    fn scan_operator(&mut self, c: char) -> Option<BinaryOp> {
        let next = self.peek_second();
        let (op, chars) = match (c, next) {
            ('<', Some('=')) => (BinaryOp::LessOrEqual, 2),
            ('<', Some('>')) => (BinaryOp::NotEqual, 2),
            ('>', Some('=')) => (BinaryOp::GreaterOrEqual, 2),
            ('=', Some('=')) => (BinaryOp::Equal, 2),
            ('!', Some('=')) => (BinaryOp::NotEqual, 2),
            ('&', Some('&')) => (BinaryOp::And, 2),
            ('|', Some('|')) => (BinaryOp::Or, 2),
            ('+', _) => (BinaryOp::Add, 1),
            ('-', _) => (BinaryOp::Subtract, 1),
            ('*', _) => (BinaryOp::Multiply, 1),
            ('/', _) => (BinaryOp::Divide, 1),
            ('%', _) => (BinaryOp::Modulo, 1),
            ('^', _) => (BinaryOp::Power, 1),
            ('<', _) => (BinaryOp::LessThan, 1),
            ('>', _) => (BinaryOp::GreaterThan, 1),
            ('=', _) => (BinaryOp::Equal, 1),
            _ => return None,
        };
        for _ in 0..chars {
            self.advance();
        }
        Some(op)
    }

    /// Scan a numeric literal: a maximal digit run, at most one decimal
    /// separator (consumed only when digits follow), and an optional
    /// `e[+-]?digits` exponent (the `e` is left alone unless a full exponent
    /// follows, so `2e` lexes as `2` then the symbol `e`).
    fn scan_number(&mut self, start: usize) -> Result<Token, ParseError> {
        let mut saw_separator = false;
        let mut saw_exponent = false;

        while let Some(nc) = self.peek() {
            if nc.is_ascii_digit() {
                self.advance();
            } else if nc == self.decimal_separator && !saw_separator && !saw_exponent {
                if !self.peek_second().is_some_and(|d| d.is_ascii_digit()) {
                    break;
                }
                saw_separator = true;
                self.advance();
            } else if (nc == 'e' || nc == 'E') && !saw_exponent {
                match self.peek_second() {
                    Some(d) if d.is_ascii_digit() => {}
                    Some('+') | Some('-') => {
                        let after_sign = {
                            let mut chars = self.input[self.pos..].chars();
                            chars.next();
                            chars.next();
                            chars.next()
                        };
                        if !after_sign.is_some_and(|d| d.is_ascii_digit()) {
                            break;
                        }
                    }
                    _ => break,
                }
                saw_exponent = true;
                self.advance();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.advance();
                }
            } else {
                break;
            }
        }

        let text = &self.input[start..self.pos];
        if saw_separator || saw_exponent {
            let normalized: String = text
                .chars()
                .map(|ch| if ch == self.decimal_separator { '.' } else { ch })
                .collect();
            match normalized.parse::<f64>() {
                Ok(value) => Ok(self.token(TokenKind::FloatingPoint(value), start)),
                Err(_) => Err(ParseError::MalformedNumber {
                    text: text.to_string(),
                    position: start,
                }),
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => Ok(self.token(TokenKind::Integer(value), start)),
                // Overflowing integer literals are promoted to floating point.
                Err(_) => match text.parse::<f64>() {
                    Ok(value) => Ok(self.token(TokenKind::FloatingPoint(value), start)),
                    Err(_) => Err(ParseError::MalformedNumber {
                        text: text.to_string(),
                        position: start,
                    }),
                },
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            position: start,
            length: self.pos - start,
        }
    }
}

/// Tokenize a whole expression up front.
pub fn tokenize(
    input: &str,
    decimal_separator: char,
    argument_separator: char,
) -> Result<Vec<Token>, ParseError> {
    let mut tokenizer = Tokenizer::new(input, decimal_separator, argument_separator);
    let mut tokens = Vec::new();
    while let Some(token) = tokenizer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input, '.', ',')
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_all_kinds() {
        let tokens = kinds("1 + foo_bar * (2.5e-1), x2 / 4.2 ^ _y");
        assert!(tokens.contains(&TokenKind::Integer(1)));
        assert!(tokens.contains(&TokenKind::FloatingPoint(0.25)));
        assert!(tokens.contains(&TokenKind::Symbol("foo_bar".to_string())));
        assert!(tokens.contains(&TokenKind::Operator(BinaryOp::Power)));
        assert!(tokens.contains(&TokenKind::LeftBracket));
        assert!(tokens.contains(&TokenKind::RightBracket));
        assert!(tokens.contains(&TokenKind::ArgumentSeparator));
    }

    #[test]
    fn test_integer_versus_float() {
        assert_eq!(kinds("42"), vec![TokenKind::Integer(42)]);
        assert_eq!(kinds("42.0"), vec![TokenKind::FloatingPoint(42.0)]);
        assert_eq!(kinds("4e2"), vec![TokenKind::FloatingPoint(400.0)]);
        assert_eq!(kinds("4E+2"), vec![TokenKind::FloatingPoint(400.0)]);
        assert_eq!(kinds("1.5e-3"), vec![TokenKind::FloatingPoint(0.0015)]);
    }

    #[test]
    fn test_integer_overflow_promotes_to_float() {
        // One past i64::MAX.
        let tokens = kinds("9223372036854775808");
        assert_eq!(
            tokens,
            vec![TokenKind::FloatingPoint(9223372036854775808.0)]
        );
        assert_eq!(
            kinds("9223372036854775807"),
            vec![TokenKind::Integer(i64::MAX)]
        );
    }

    #[test]
    fn test_exponent_requires_digits() {
        // The 'e' is not consumed without a digit after it, so these lex as a
        // number followed by a symbol.
        assert_eq!(
            kinds("2e"),
            vec![TokenKind::Integer(2), TokenKind::Symbol("e".to_string())]
        );
        assert_eq!(
            kinds("2e+"),
            vec![
                TokenKind::Integer(2),
                TokenKind::Symbol("e".to_string()),
                TokenKind::Operator(BinaryOp::Add),
            ]
        );
    }

    #[test]
    fn test_multi_character_operators() {
        assert_eq!(
            kinds("a <= b >= c == d != e && f || g"),
            vec![
                TokenKind::Symbol("a".to_string()),
                TokenKind::Operator(BinaryOp::LessOrEqual),
                TokenKind::Symbol("b".to_string()),
                TokenKind::Operator(BinaryOp::GreaterOrEqual),
                TokenKind::Symbol("c".to_string()),
                TokenKind::Operator(BinaryOp::Equal),
                TokenKind::Symbol("d".to_string()),
                TokenKind::Operator(BinaryOp::NotEqual),
                TokenKind::Symbol("e".to_string()),
                TokenKind::Operator(BinaryOp::And),
                TokenKind::Symbol("f".to_string()),
                TokenKind::Operator(BinaryOp::Or),
                TokenKind::Symbol("g".to_string()),
            ]
        );
    }

    #[test]
    fn test_operator_synonyms() {
        assert_eq!(
            kinds("a <> b"),
            vec![
                TokenKind::Symbol("a".to_string()),
                TokenKind::Operator(BinaryOp::NotEqual),
                TokenKind::Symbol("b".to_string()),
            ]
        );
        assert_eq!(
            kinds("a = b"),
            vec![
                TokenKind::Symbol("a".to_string()),
                TokenKind::Operator(BinaryOp::Equal),
                TokenKind::Symbol("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_character() {
        let err = tokenize("1 $ 2", '.', ',').unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownCharacter {
                character: '$',
                position: 2
            }
        );
        // Lone '&' and '|' are not operators.
        assert!(matches!(
            tokenize("a & b", '.', ',').unwrap_err(),
            ParseError::UnknownCharacter { character: '&', .. }
        ));
    }

    #[test]
    fn test_comma_decimal_separator_locale() {
        let tokens = tokenize("max(1,5; 2,5)", ',', ';').unwrap();
        let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Symbol("max".to_string()),
                TokenKind::LeftBracket,
                TokenKind::FloatingPoint(1.5),
                TokenKind::ArgumentSeparator,
                TokenKind::FloatingPoint(2.5),
                TokenKind::RightBracket,
            ]
        );
    }

    #[test]
    fn test_stray_decimal_separator_is_rejected() {
        assert!(matches!(
            tokenize(".5", '.', ',').unwrap_err(),
            ParseError::UnknownCharacter { character: '.', .. }
        ));
    }

    #[test]
    fn test_positions_and_lengths_are_byte_offsets() {
        let tokens = tokenize("12 + pi", '.', ',').unwrap();
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[0].length, 2);
        assert_eq!(tokens[1].position, 3);
        assert_eq!(tokens[2].position, 5);
        assert_eq!(tokens[2].length, 2);
    }
}
