//! Step conditions (`if:` expressions)
//!
//! Grammar:
//!
//! ```text
//! or      := and ('||' and)*
//! and     := unary ('&&' unary)*
//! unary   := '!' unary | '(' or ')' | status | compare
//! status  := 'success()' | 'always()'
//! compare := operand (('==' | '!=') operand)?
//! operand := identifier | 'quoted literal'
//! ```
//!
//! A bare operand is true when its value is non-empty and not `false`.
//! Unknown identifiers evaluate to the empty string. `success()` is true
//! until a step of the entry fails fatally; `always()` is always true. Once
//! an entry has failed, only conditions that check the status can let a step
//! run.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid condition '{expr}': {message}")]
pub struct ConditionError {
    pub expr: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Var(String),
    Literal(String),
}

impl Operand {
    fn resolve<'a>(&'a self, vars: &'a HashMap<String, String>) -> &'a str {
        match self {
            Operand::Var(name) => vars.get(name).map(String::as_str).unwrap_or(""),
            Operand::Literal(value) => value,
        }
    }
}

/// Parsed condition expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Eq(Operand, Operand),
    Ne(Operand, Operand),
    Truthy(Operand),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    /// `success()`
    Success,
    /// `always()`
    Always,
}

impl Condition {
    pub fn parse(expr: &str) -> Result<Self, ConditionError> {
        let fail = |message: String| ConditionError {
            expr: expr.to_string(),
            message,
        };
        let tokens = tokenize(expr).map_err(fail)?;
        if tokens.is_empty() {
            return Err(fail("empty expression".to_string()));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let condition = parser.or().map_err(fail)?;
        if parser.pos != parser.tokens.len() {
            return Err(fail(format!(
                "unexpected token {:?}",
                parser.tokens[parser.pos]
            )));
        }
        Ok(condition)
    }

    /// Evaluate the condition against context variables
    pub fn evaluate(&self, vars: &HashMap<String, String>) -> bool {
        self.evaluate_with(vars, false)
    }

    /// Evaluate once an earlier step of the entry has failed fatally
    pub fn evaluate_after_failure(&self, vars: &HashMap<String, String>) -> bool {
        self.checks_status() && self.evaluate_with(vars, true)
    }

    fn checks_status(&self) -> bool {
        match self {
            Condition::Success | Condition::Always => true,
            Condition::Not(inner) => inner.checks_status(),
            Condition::And(lhs, rhs) | Condition::Or(lhs, rhs) => {
                lhs.checks_status() || rhs.checks_status()
            }
            Condition::Eq(..) | Condition::Ne(..) | Condition::Truthy(_) => false,
        }
    }

    fn evaluate_with(&self, vars: &HashMap<String, String>, failed: bool) -> bool {
        match self {
            Condition::Eq(lhs, rhs) => lhs.resolve(vars) == rhs.resolve(vars),
            Condition::Ne(lhs, rhs) => lhs.resolve(vars) != rhs.resolve(vars),
            Condition::Truthy(op) => {
                let value = op.resolve(vars);
                !value.is_empty() && value != "false"
            }
            Condition::Not(inner) => !inner.evaluate_with(vars, failed),
            Condition::And(lhs, rhs) => {
                lhs.evaluate_with(vars, failed) && rhs.evaluate_with(vars, failed)
            }
            Condition::Or(lhs, rhs) => {
                lhs.evaluate_with(vars, failed) || rhs.evaluate_with(vars, failed)
            }
            Condition::Success => !failed,
            Condition::Always => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Literal(String),
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '=' if next == Some('=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Bang);
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
            '\'' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == '\'')
                    .map(|offset| start + offset)
                    .ok_or_else(|| "unterminated literal".to_string())?;
                tokens.push(Token::Literal(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '.' | '-'))
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
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
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn or(&mut self) -> Result<Condition, String> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.pos += 1;
            let rhs = self.and()?;
            lhs = Condition::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Condition, String> {
        let mut lhs = self.unary()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Condition::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Condition, String> {
        match self.peek() {
            Some(Token::Bang) => {
                self.pos += 1;
                Ok(Condition::Not(Box::new(self.unary()?)))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(Token::Ident(name))
                if self.tokens.get(self.pos + 1) == Some(&Token::LParen) =>
            {
                let status = match name.as_str() {
                    "success" => Condition::Success,
                    "always" => Condition::Always,
                    _ => return Err(format!("unknown function '{}'", name)),
                };
                if self.tokens.get(self.pos + 2) != Some(&Token::RParen) {
                    return Err(format!("'{}' takes no arguments", name));
                }
                self.pos += 3;
                Ok(status)
            }
            _ => self.compare(),
        }
    }

    fn compare(&mut self) -> Result<Condition, String> {
        let lhs = self.operand()?;
        match self.peek() {
            Some(Token::EqEq) => {
                self.pos += 1;
                Ok(Condition::Eq(lhs, self.operand()?))
            }
            Some(Token::NotEq) => {
                self.pos += 1;
                Ok(Condition::Ne(lhs, self.operand()?))
            }
            _ => Ok(Condition::Truthy(lhs)),
        }
    }

    fn operand(&mut self) -> Result<Operand, String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Operand::Var(name)),
            Some(Token::Literal(value)) => Ok(Operand::Literal(value)),
            Some(other) => Err(format!("expected operand, found {:?}", other)),
            None => Err("expected operand, found end of expression".to_string()),
        }
    }
}
