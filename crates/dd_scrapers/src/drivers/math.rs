//! A tiny arithmetic evaluator for math driver templates.
//!
//! Only numbers, quoted strings, parentheses and `+ - * / **` are accepted.
//! Strings may only be repeated (`"a" * 3`). Anything else is rejected with
//! [`DriverError::DisallowedExpression`].

use dd_core::DriverError;

use super::Value;

const MAX_REPEAT_LEN: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Value),
    Str(String),
    Plus,
    Minus,
    Star,
    Slash,
    Pow,
    LParen,
    RParen,
}

fn disallowed(msg: impl Into<String>) -> DriverError {
    DriverError::DisallowedExpression(msg.into())
}

fn tokenize(src: &str) -> Result<Vec<Token>, DriverError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(disallowed("unterminated string")),
                        Some(&c) if c == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = chars.get(i + 1).ok_or_else(|| disallowed("unterminated string"))?;
                            s.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => *other,
                            });
                            i += 2;
                        }
                        Some(&c) => {
                            s.push(c);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                let mut is_float = false;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    is_float |= chars[i] == '.';
                    i += 1;
                }
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    is_float = true;
                    i += 1;
                    if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let value = if is_float {
                    literal.parse::<f64>().map(Value::Float)
                        .map_err(|_| disallowed(format!("bad number {literal:?}")))?
                } else {
                    literal.parse::<i64>().map(Value::Int)
                        .map_err(|_| disallowed(format!("bad number {literal:?}")))?
                };
                tokens.push(Token::Num(value));
            }
            other => return Err(disallowed(format!("unexpected {other:?}"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Value, DriverError> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    lhs = add(lhs, self.term()?)?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    lhs = sub(lhs, self.term()?)?;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> Result<Value, DriverError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    lhs = mul(lhs, self.unary()?)?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    lhs = div(lhs, self.unary()?)?;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Value, DriverError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                match self.unary()? {
                    Value::Int(i) => i.checked_neg().map(Value::Int).ok_or_else(|| disallowed("integer overflow")),
                    Value::Float(v) => Ok(Value::Float(-v)),
                    Value::Str(_) => Err(disallowed("cannot negate a string")),
                }
            }
            Some(Token::Plus) => {
                self.pos += 1;
                match self.unary()? {
                    Value::Str(_) => Err(disallowed("unary plus on a string")),
                    number => Ok(number),
                }
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Value, DriverError> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Pow) {
            self.pos += 1;
            // right associative, exponent may carry its own sign
            let exponent = self.unary()?;
            return pow(base, exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Value, DriverError> {
        match self.next() {
            Some(Token::Num(value)) => Ok(value),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(disallowed("missing ')'")),
                }
            }
            Some(token) => Err(disallowed(format!("unexpected {token:?}"))),
            None => Err(disallowed("unexpected end of expression")),
        }
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(v) => Some(*v),
        Value::Str(_) => None,
    }
}

fn finite(v: f64) -> Result<Value, DriverError> {
    if v.is_finite() {
        Ok(Value::Float(v))
    } else {
        Err(disallowed("result is not a finite number"))
    }
}

fn numeric(
    lhs: Value,
    rhs: Value,
    op: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, DriverError> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => int_op(*a, *b)
            .map(Value::Int)
            .ok_or_else(|| disallowed("integer overflow")),
        _ => match (as_float(&lhs), as_float(&rhs)) {
            (Some(a), Some(b)) => finite(float_op(a, b)),
            _ => Err(disallowed(format!("'{op}' is not allowed on strings"))),
        },
    }
}

fn add(lhs: Value, rhs: Value) -> Result<Value, DriverError> {
    numeric(lhs, rhs, "+", i64::checked_add, |a, b| a + b)
}

fn sub(lhs: Value, rhs: Value) -> Result<Value, DriverError> {
    numeric(lhs, rhs, "-", i64::checked_sub, |a, b| a - b)
}

fn mul(lhs: Value, rhs: Value) -> Result<Value, DriverError> {
    match (lhs, rhs) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => repeat(&s, n),
        (lhs, rhs) => numeric(lhs, rhs, "*", i64::checked_mul, |a, b| a * b),
    }
}

fn repeat(s: &str, n: i64) -> Result<Value, DriverError> {
    let count = usize::try_from(n).unwrap_or(0);
    if s.len().saturating_mul(count) > MAX_REPEAT_LEN {
        return Err(disallowed("string repetition too long"));
    }
    Ok(Value::Str(s.repeat(count)))
}

fn div(lhs: Value, rhs: Value) -> Result<Value, DriverError> {
    match (as_float(&lhs), as_float(&rhs)) {
        (Some(_), Some(b)) if b == 0.0 => Err(disallowed("division by zero")),
        (Some(a), Some(b)) => finite(a / b),
        _ => Err(disallowed("'/' is not allowed on strings")),
    }
}

fn pow(base: Value, exponent: Value) -> Result<Value, DriverError> {
    match (&base, &exponent) {
        (Value::Int(b), Value::Int(e)) if *e >= 0 => u32::try_from(*e)
            .ok()
            .and_then(|e| b.checked_pow(e))
            .map(Value::Int)
            .ok_or_else(|| disallowed("integer overflow")),
        _ => match (as_float(&base), as_float(&exponent)) {
            (Some(b), Some(e)) if b == 0.0 && e < 0.0 => Err(disallowed("division by zero")),
            (Some(b), Some(e)) => finite(b.powf(e)),
            _ => Err(disallowed("'**' is not allowed on strings")),
        },
    }
}

/// Evaluate a whitelisted arithmetic expression.
pub fn eval(expression: &str) -> Result<Value, DriverError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(disallowed(format!("trailing input in {expression:?}")));
    }
    Ok(value)
}
