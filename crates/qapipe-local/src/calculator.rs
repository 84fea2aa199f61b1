//! Arithmetic expression evaluation for the calculator tool.
//!
//! Accepts `+ - * /`, parentheses, unary minus, and decimal literals.
//! Anything outside that character set is rejected before parsing.

use qapipe_core::{Error, Result};

/// Evaluate an expression and render the result; integral values render
/// without a fractional part.
pub fn evaluate(expression: &str) -> Result<String> {
    let allowed = expression
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | '.' | ' '));
    if !allowed {
        return Err(Error::Calc("invalid characters in expression".to_string()));
    }

    let mut parser = Parser {
        src: expression.as_bytes(),
        pos: 0,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(Error::Calc(format!(
            "unexpected trailing input at offset {}",
            parser.pos
        )));
    }
    if !value.is_finite() {
        return Err(Error::Calc("result is not finite".to_string()));
    }

    if value.fract() == 0.0 && value.abs() < 1e15 {
        Ok(format!("{}", value as i64))
    } else {
        Ok(format!("{value}"))
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while self.src.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<f64> {
        let mut acc = self.term()?;
        while let Some(op @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            if op == b'+' {
                acc += rhs;
            } else {
                acc -= rhs;
            }
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<f64> {
        let mut acc = self.factor()?;
        while let Some(op @ (b'*' | b'/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == b'*' {
                acc *= rhs;
            } else {
                if rhs == 0.0 {
                    return Err(Error::Calc("division by zero".to_string()));
                }
                acc /= rhs;
            }
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<f64> {
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some(b'(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if self.peek() != Some(b')') {
                    return Err(Error::Calc("unbalanced parentheses".to_string()));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            _ => Err(Error::Calc(format!(
                "expected a number at offset {}",
                self.pos
            ))),
        }
    }

    fn number(&mut self) -> Result<f64> {
        self.skip_ws();
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(&c) = self.src.get(self.pos) {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == b'.' && !seen_dot {
                seen_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).expect("ascii digits");
        text.parse::<f64>()
            .map_err(|_| Error::Calc(format!("invalid number literal: {text}")))
    }
}
