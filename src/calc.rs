//! Safe arithmetic evaluation for chat messages.
//!
//! Messages that look like arithmetic ("2+2", "12 x 3", "3,5 * 2") bypass
//! the classifier. The expression is parsed with a small recursive-descent
//! grammar instead of being handed to any kind of evaluator, and every
//! failure is a quiet "no match" that falls through to classification.
//!
//! Accepted input keeps the original chat conventions: `x` works as a
//! multiplication sign and a decimal comma works as a decimal point.

use thiserror::Error;

/// Why an expression did not evaluate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalcError {
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    #[error("expression ended unexpectedly")]
    UnexpectedEnd,
    #[error("division by zero")]
    DivisionByZero,
}

/// Evaluate a message as arithmetic if it plausibly is arithmetic.
///
/// Detection requires at least one digit and at least one operator, so
/// ordinary text never reaches the parser. A message that passes detection
/// but fails to parse ("what is 2+2") still returns `None`.
#[must_use]
pub fn try_evaluate(message: &str) -> Option<f64> {
    if !looks_like_arithmetic(message) {
        return None;
    }

    let candidate: String = message
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'x' => '*',
            ',' => '.',
            other => other,
        })
        .collect();

    let value = evaluate(&candidate).ok()?;
    value.is_finite().then_some(value)
}

/// A digit plus an operator is the gate; everything else is left to the
/// classifier.
fn looks_like_arithmetic(message: &str) -> bool {
    let has_digit = message.chars().any(|c| c.is_ascii_digit());
    let has_operator = message
        .chars()
        .any(|c| matches!(c, '+' | '-' | '*' | '/' | 'x' | 'X'));
    has_digit && has_operator
}

/// Parse and evaluate a full expression. Trailing garbage is an error.
pub fn evaluate(input: &str) -> Result<f64, CalcError> {
    let mut parser = Parser::new(input);
    let value = parser.expr()?;
    parser.skip_ws();
    match parser.peek() {
        Some(c) => Err(CalcError::UnexpectedChar(c)),
        None => Ok(value),
    }
}

/// Recursive-descent parser.
///
/// Grammar:
/// ```text
/// expr   := term (("+" | "-") term)*
/// term   := factor (("*" | "/") factor)*
/// factor := "-" factor | number | "(" expr ")"
/// ```
struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('+') => {
                    self.bump();
                    value += self.term()?;
                }
                Some('-') => {
                    self.bump();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.factor()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('*') => {
                    self.bump();
                    value *= self.factor()?;
                }
                Some('/') => {
                    self.bump();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self) -> Result<f64, CalcError> {
        self.skip_ws();
        match self.peek() {
            Some('-') => {
                self.bump();
                Ok(-self.factor()?)
            }
            Some('(') => {
                self.bump();
                let value = self.expr()?;
                self.skip_ws();
                match self.bump() {
                    Some(')') => Ok(value),
                    Some(c) => Err(CalcError::UnexpectedChar(c)),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(c) if c.is_ascii_digit() => self.number(),
            Some(c) => Err(CalcError::UnexpectedChar(c)),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn number(&mut self) -> Result<f64, CalcError> {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map_err(|_| CalcError::UnexpectedChar('.'))
    }
}

/// Format a result for chat: integral values print without a decimal part.
#[must_use]
pub fn format_result(value: f64) -> String {
    if value == 0.0 {
        // Avoid printing "-0".
        return "0".to_string();
    }
    format!("{value}")
}
