// Tue Oct 13 2026 - Alex

use crate::lexer::error::EvalError;
use crate::lexer::token::{parse_char_literal, parse_int_literal, SourcePos, Token, TokenKind};

/// Evaluates an integer constant expression.
///
/// Identifiers (including `a::b` qualified names) are handed to `resolve`;
/// operands that are not evaluated because of `&&`, `||` or `?:` short
/// circuits never reach it.
pub fn evaluate<F>(tokens: &[Token], resolve: F) -> Result<i64, EvalError>
where
    F: FnMut(&str, &SourcePos) -> Result<i64, EvalError>,
{
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }
    let mut eval = ConstEvaluator {
        tokens,
        pos: 0,
        resolve,
    };
    let value = eval.expr(0, true)?;
    if let Some(tok) = eval.tokens.get(eval.pos) {
        return Err(EvalError::Syntax {
            message: format!("unexpected '{}'", tok.text),
            pos: tok.pos.clone(),
        });
    }
    Ok(value)
}

struct ConstEvaluator<'t, F> {
    tokens: &'t [Token],
    pos: usize,
    resolve: F,
}

fn binary_precedence(op: &str) -> Option<u8> {
    let prec = match op {
        "||" => 2,
        "&&" => 3,
        "|" => 4,
        "^" => 5,
        "&" => 6,
        "==" | "!=" => 7,
        "<" | ">" | "<=" | ">=" => 8,
        "<<" | ">>" => 9,
        "+" | "-" => 10,
        "*" | "/" | "%" => 11,
        _ => return None,
    };
    Some(prec)
}

impl<'t, F> ConstEvaluator<'t, F>
where
    F: FnMut(&str, &SourcePos) -> Result<i64, EvalError>,
{
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn last_pos(&self) -> SourcePos {
        self.tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|t| t.pos.clone())
            .unwrap_or_else(SourcePos::builtin)
    }

    fn syntax(&self, message: &str) -> EvalError {
        EvalError::Syntax {
            message: message.to_string(),
            pos: self.last_pos(),
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), EvalError> {
        match self.peek() {
            Some(t) if t.is_punct(punct) => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.syntax(&format!("expected '{}'", punct))),
        }
    }

    /// `live == false` parses without resolving identifiers or trapping on
    /// division by zero.
    fn expr(&mut self, min_prec: u8, live: bool) -> Result<i64, EvalError> {
        let mut lhs = self.unary(live)?;
        loop {
            let tok = match self.peek() {
                Some(t) if t.kind == TokenKind::Punct => t,
                _ => break,
            };
            if tok.text == "?" {
                if min_prec > 1 {
                    break;
                }
                self.pos += 1;
                let then_v = self.expr(0, live && lhs != 0)?;
                self.expect(":")?;
                let else_v = self.expr(1, live && lhs == 0)?;
                lhs = if lhs != 0 { then_v } else { else_v };
                continue;
            }
            let prec = match binary_precedence(&tok.text) {
                Some(p) if p >= min_prec.max(2) => p,
                _ => break,
            };
            let op = tok.text.as_str();
            let op_pos = tok.pos.clone();
            self.pos += 1;
            let rhs_live = match op {
                "&&" => live && lhs != 0,
                "||" => live && lhs == 0,
                _ => live,
            };
            let rhs = self.expr(prec + 1, rhs_live)?;
            lhs = apply_binary(op, lhs, rhs, live, op_pos)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self, live: bool) -> Result<i64, EvalError> {
        let tok = self.peek().ok_or(EvalError::Empty)?;
        self.pos += 1;
        match tok.kind {
            TokenKind::IntLiteral => parse_int_literal(&tok.text)
                .map(|v| v as i64)
                .ok_or_else(|| EvalError::Syntax {
                    message: format!("bad integer literal '{}'", tok.text),
                    pos: tok.pos.clone(),
                }),
            TokenKind::CharLiteral => parse_char_literal(&tok.text).ok_or_else(|| EvalError::Syntax {
                message: format!("bad character literal {}", tok.text),
                pos: tok.pos.clone(),
            }),
            TokenKind::Keyword if tok.text == "true" => Ok(1),
            TokenKind::Keyword if tok.text == "false" => Ok(0),
            TokenKind::Identifier => {
                let mut name = tok.text.clone();
                while self.peek().map_or(false, |t| t.is_punct("::")) {
                    match self.tokens.get(self.pos + 1) {
                        Some(next) if next.is_identifier() => {
                            name.push_str("::");
                            name.push_str(&next.text);
                            self.pos += 2;
                        }
                        _ => break,
                    }
                }
                if live {
                    (self.resolve)(&name, &tok.pos)
                } else {
                    Ok(0)
                }
            }
            TokenKind::Punct => match tok.text.as_str() {
                "(" => {
                    let v = self.expr(0, live)?;
                    self.expect(")")?;
                    Ok(v)
                }
                "!" => Ok((self.unary(live)? == 0) as i64),
                "~" => Ok(!self.unary(live)?),
                "-" => Ok(self.unary(live)?.wrapping_neg()),
                "+" => self.unary(live),
                _ => Err(EvalError::Syntax {
                    message: format!("unexpected '{}'", tok.text),
                    pos: tok.pos.clone(),
                }),
            },
            _ => Err(EvalError::Syntax {
                message: format!("'{}' is not an integer constant", tok.text),
                pos: tok.pos.clone(),
            }),
        }
    }
}

fn apply_binary(op: &str, lhs: i64, rhs: i64, live: bool, pos: SourcePos) -> Result<i64, EvalError> {
    let value = match op {
        "||" => (lhs != 0 || rhs != 0) as i64,
        "&&" => (lhs != 0 && rhs != 0) as i64,
        "|" => lhs | rhs,
        "^" => lhs ^ rhs,
        "&" => lhs & rhs,
        "==" => (lhs == rhs) as i64,
        "!=" => (lhs != rhs) as i64,
        "<" => (lhs < rhs) as i64,
        ">" => (lhs > rhs) as i64,
        "<=" => (lhs <= rhs) as i64,
        ">=" => (lhs >= rhs) as i64,
        "<<" => lhs.wrapping_shl(rhs as u32),
        ">>" => lhs.wrapping_shr(rhs as u32),
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" | "%" if rhs == 0 => {
            if live {
                return Err(EvalError::DivisionByZero { pos });
            }
            0
        }
        "/" => lhs.wrapping_div(rhs),
        "%" => lhs.wrapping_rem(rhs),
        _ => 0,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scanner::tokenize;

    fn eval(src: &str) -> Result<i64, EvalError> {
        let toks = tokenize("t.h", src).unwrap();
        evaluate(&toks, |name, pos| match name {
            "TAG2" => Ok(2),
            "E::BLUE" => Ok(20),
            _ => Err(EvalError::Unresolved {
                name: name.to_string(),
                pos: pos.clone(),
            }),
        })
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), 7);
        assert_eq!(eval("(1<<2)").unwrap(), 4);
        assert_eq!(eval("((8+4))").unwrap(), 12);
        assert_eq!(eval("10 - 4 - 3").unwrap(), 3);
        assert_eq!(eval("-1 < 0").unwrap(), 1);
        assert_eq!(eval("~0 & 0xff").unwrap(), 255);
    }

    #[test]
    fn test_logic_and_ternary() {
        assert_eq!(eval("1 == 1 && 2 > 1").unwrap(), 1);
        assert_eq!(eval("0 ? 5 : 1 ? 6 : 7").unwrap(), 6);
        assert_eq!(eval("!0 || 0").unwrap(), 1);
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(eval("TAG2 * 2").unwrap(), 4);
        assert_eq!(eval("E::BLUE + 1").unwrap(), 21);
        assert!(matches!(eval("MISSING == 1"), Err(EvalError::Unresolved { .. })));
    }

    #[test]
    fn test_short_circuit_skips_resolution() {
        assert_eq!(eval("0 && MISSING").unwrap(), 0);
        assert_eq!(eval("1 || MISSING / 0").unwrap(), 1);
        assert_eq!(eval("1 ? 3 : MISSING").unwrap(), 3);
    }

    #[test]
    fn test_char_literals_and_errors() {
        assert_eq!(eval("'h'").unwrap(), 104);
        assert!(matches!(eval("1 / 0"), Err(EvalError::DivisionByZero { .. })));
        assert!(matches!(eval("1 +"), Err(EvalError::Empty)));
        assert!(matches!(eval("(1"), Err(EvalError::Syntax { .. })));
    }
}
