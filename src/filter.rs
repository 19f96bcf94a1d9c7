//! Boolean filter expressions over entity fields.
//!
//! Expressions use the service's textual syntax:
//!
//! ```text
//! subject == 'biology'
//! id in [0, 2] and not (subject == "history")
//! year >= 1950 && text like 'Alan%'
//! ```
//!
//! A comparison against a field the row does not have is false.

use crate::entity::FieldValue;
use crate::error::{Result, VectorDbError};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// A parsed filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every row (the empty expression).
    All,
    Compare {
        field: String,
        op: CompareOp,
        value: FieldValue,
    },
    In {
        field: String,
        values: Vec<FieldValue>,
        negated: bool,
    },
    /// SQL-style pattern where `%` matches any run of characters.
    Like { field: String, pattern: String },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Parse an expression. Blank input parses to [`Filter::All`].
    pub fn parse(expr: &str) -> Result<Filter> {
        if expr.trim().is_empty() {
            return Ok(Filter::All);
        }
        let tokens = tokenize(expr).map_err(|reason| invalid(expr, &reason))?;
        let mut parser = Parser { tokens, pos: 0 };
        let filter = parser.parse_or().map_err(|reason| invalid(expr, &reason))?;
        if let Some(tok) = parser.peek() {
            return Err(invalid(expr, &format!("unexpected token {:?}", tok)));
        }
        Ok(filter)
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Compare {
            field: field.into(),
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    /// Evaluate against a row. `pk` names the primary key field, whose
    /// value is `id`; every other field is looked up in `fields`.
    pub fn matches(&self, pk: &str, id: i64, fields: &BTreeMap<String, FieldValue>) -> bool {
        let row = RowView {
            pk,
            id: FieldValue::Int(id),
            fields,
        };
        self.eval(&row)
    }

    fn eval(&self, row: &RowView<'_>) -> bool {
        match self {
            Filter::All => true,
            Filter::Compare { field, op, value } => row
                .get(field)
                .and_then(|v| v.compare(value))
                .map(|ordering| op.holds(ordering))
                .unwrap_or(false),
            Filter::In {
                field,
                values,
                negated,
            } => match row.get(field) {
                Some(v) => {
                    let found = values
                        .iter()
                        .any(|candidate| v.compare(candidate) == Some(Ordering::Equal));
                    found != *negated
                }
                None => false,
            },
            Filter::Like { field, pattern } => row
                .get(field)
                .and_then(FieldValue::as_str)
                .map(|s| like_match(pattern, s))
                .unwrap_or(false),
            Filter::And(filters) => filters.iter().all(|f| f.eval(row)),
            Filter::Or(filters) => filters.iter().any(|f| f.eval(row)),
            Filter::Not(filter) => !filter.eval(row),
        }
    }
}

struct RowView<'a> {
    pk: &'a str,
    id: FieldValue,
    fields: &'a BTreeMap<String, FieldValue>,
}

impl RowView<'_> {
    fn get(&self, name: &str) -> Option<&FieldValue> {
        if name == self.pk {
            Some(&self.id)
        } else {
            self.fields.get(name)
        }
    }
}

fn invalid(expr: &str, reason: &str) -> VectorDbError {
    VectorDbError::backend(format!("invalid filter expression `{}`: {}", expr, reason))
}

fn like_match(pattern: &str, s: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return pattern == s;
    }
    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remaining) = s.strip_prefix(first) else {
        return false;
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return true,
    };
    for part in middle {
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Op(CompareOp),
    And,
    Or,
    Not,
    In,
    Like,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                let next = chars.get(i + 1).copied();
                let (token, width) = match (c, next) {
                    ('=', Some('=')) => (Token::Op(CompareOp::Eq), 2),
                    ('!', Some('=')) => (Token::Op(CompareOp::Ne), 2),
                    ('<', Some('=')) => (Token::Op(CompareOp::Le), 2),
                    ('>', Some('=')) => (Token::Op(CompareOp::Ge), 2),
                    ('<', _) => (Token::Op(CompareOp::Lt), 1),
                    ('>', _) => (Token::Op(CompareOp::Gt), 1),
                    ('!', _) => (Token::Not, 1),
                    ('&', Some('&')) => (Token::And, 2),
                    ('|', Some('|')) => (Token::Or, 2),
                    _ => return Err(format!("unexpected character `{}` at {}", c, i)),
                };
                tokens.push(token);
                i += width;
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\\') => {
                            match chars.get(i + 1) {
                                Some(escaped) => value.push(*escaped),
                                None => return Err("unterminated string literal".to_string()),
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E'))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if let Ok(n) = text.parse::<i64>() {
                    tokens.push(Token::Int(n));
                } else if let Ok(x) = text.parse::<f64>() {
                    tokens.push(Token::Float(x));
                } else {
                    return Err(format!("invalid number `{}`", text));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "like" => Token::Like,
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => Token::Ident(word),
                };
                tokens.push(token);
            }
            other => return Err(format!("unexpected character `{}` at {}", other, i)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        match self.next() {
            Some(tok) if tok == expected => Ok(()),
            Some(tok) => Err(format!("expected {:?}, found {:?}", expected, tok)),
            None => Err(format!("expected {:?}, found end of input", expected)),
        }
    }

    fn parse_or(&mut self) -> ParseResult<Filter> {
        let mut terms = vec![self.parse_and()?];
        while self.eat(&Token::Or) {
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Filter::Or(terms)
        })
    }

    fn parse_and(&mut self) -> ParseResult<Filter> {
        let mut terms = vec![self.parse_not()?];
        while self.eat(&Token::And) {
            terms.push(self.parse_not()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Filter::And(terms)
        })
    }

    fn parse_not(&mut self) -> ParseResult<Filter> {
        if self.eat(&Token::Not) {
            return Ok(Filter::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Filter> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(field)) => self.parse_predicate(field),
            Some(tok) => Err(format!("expected field name, found {:?}", tok)),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn parse_predicate(&mut self, field: String) -> ParseResult<Filter> {
        match self.next() {
            Some(Token::Op(op)) => {
                let value = self.parse_literal()?;
                Ok(Filter::Compare { field, op, value })
            }
            Some(Token::In) => Ok(Filter::In {
                field,
                values: self.parse_list()?,
                negated: false,
            }),
            Some(Token::Not) => {
                self.expect(Token::In)?;
                Ok(Filter::In {
                    field,
                    values: self.parse_list()?,
                    negated: true,
                })
            }
            Some(Token::Like) => match self.next() {
                Some(Token::Str(pattern)) => Ok(Filter::Like { field, pattern }),
                other => Err(format!("like expects a string pattern, found {:?}", other)),
            },
            Some(tok) => Err(format!("expected operator after `{}`, found {:?}", field, tok)),
            None => Err(format!("expected operator after `{}`", field)),
        }
    }

    fn parse_list(&mut self) -> ParseResult<Vec<FieldValue>> {
        self.expect(Token::LBracket)?;
        let mut values = Vec::new();
        if self.eat(&Token::RBracket) {
            return Ok(values);
        }
        loop {
            values.push(self.parse_literal()?);
            if self.eat(&Token::RBracket) {
                return Ok(values);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn parse_literal(&mut self) -> ParseResult<FieldValue> {
        match self.next() {
            Some(Token::Str(s)) => Ok(FieldValue::Str(s)),
            Some(Token::Int(i)) => Ok(FieldValue::Int(i)),
            Some(Token::Float(x)) => Ok(FieldValue::Float(x)),
            Some(Token::Bool(b)) => Ok(FieldValue::Bool(b)),
            Some(tok) => Err(format!("expected literal, found {:?}", tok)),
            None => Err("expected literal, found end of input".to_string()),
        }
    }
}
