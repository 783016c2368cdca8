//! Tag expression language.
//!
//! ```text
//! pipeline := primary ('|' filter)*
//! filter   := ident (':' primary)*
//! primary  := '.' | path | string | number | true | false | null
//! path     := ident ('.' ident | '[' (number | string) ']')*
//! ```
//!
//! Expressions are compiled once per tag by an [`ExpressionResolver`] and
//! evaluated against a [`Scope`] for every render of that tag.

use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value};

use crate::error::ExpressionError;
use crate::filters::{Filter, Filters};
use crate::scope::Scope;

/// Compiled tag that produces a value from a scope.
pub trait Field: Send + Sync + fmt::Debug {
    /// Evaluate against `scope`; missing data gives `null`.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError`] when a filter fails.
    fn get(&self, scope: &Scope<'_>) -> Result<Value, ExpressionError>;
}

/// Compiles tag text into [`Field`]s.
pub trait FieldResolver: Send + Sync {
    /// Compile the tag text that follows the prefix character.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError`] when the text is not a valid expression.
    fn resolve(&self, tag: &str) -> Result<Box<dyn Field>, ExpressionError>;
}

/// Default resolver: the expression grammar with a filter registry.
#[derive(Clone, Debug)]
pub struct ExpressionResolver {
    filters: Filters,
}

impl ExpressionResolver {
    /// Resolver over the given filters.
    pub fn new(filters: Filters) -> Self {
        Self { filters }
    }

    /// Filters available to expressions.
    pub fn filters(&self) -> &Filters {
        &self.filters
    }
}

impl Default for ExpressionResolver {
    fn default() -> Self {
        Self::new(Filters::standard())
    }
}

impl FieldResolver for ExpressionResolver {
    fn resolve(&self, tag: &str) -> Result<Box<dyn Field>, ExpressionError> {
        let source = normalize_quotes(tag);
        let tokens = lex(&source)?;
        let expression = Parser::new(tokens, &self.filters).parse()?;
        Ok(Box::new(expression))
    }
}

/// Replace typographic quotes inserted by word processors with ASCII ones.
fn normalize_quotes(tag: &str) -> String {
    tag.chars()
        .map(|ch| match ch {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(Number),
    Dot,
    LeftBracket,
    RightBracket,
    Pipe,
    Colon,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => f.write_str(name),
            Self::Str(value) => write!(f, "'{value}'"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Dot => f.write_str("."),
            Self::LeftBracket => f.write_str("["),
            Self::RightBracket => f.write_str("]"),
            Self::Pipe => f.write_str("|"),
            Self::Colon => f.write_str(":"),
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

fn lex(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        match ch {
            c if c.is_whitespace() => {}
            '.' => tokens.push(Token::Dot),
            '[' => tokens.push(Token::LeftBracket),
            ']' => tokens.push(Token::RightBracket),
            '|' => tokens.push(Token::Pipe),
            ':' => tokens.push(Token::Colon),
            '\'' | '"' => {
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, next)) = chars.next() {
                    match next {
                        '\\' => {
                            if let Some((_, escaped)) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        c if c == ch => {
                            closed = true;
                            break;
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(ExpressionError::UnterminatedString);
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.peek().is_some_and(|(_, d)| d.is_ascii_digit())) =>
            {
                let mut end = position + c.len_utf8();
                while let Some(&(index, next)) = chars.peek() {
                    if next.is_ascii_digit() || next == '.' {
                        end = index + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(parse_number(&source[position..end])?));
            }
            c if is_ident_start(c) => {
                let mut end = position + c.len_utf8();
                while let Some(&(index, next)) = chars.peek() {
                    if is_ident_continue(next) {
                        end = index + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(source[position..end].to_owned()));
            }
            c => return Err(ExpressionError::UnexpectedChar { ch: c, position }),
        }
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> Result<Number, ExpressionError> {
    if let Ok(integer) = text.parse::<i64>() {
        return Ok(Number::from(integer));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| ExpressionError::UnexpectedToken(text.to_owned()))
}

/// Path step after the first identifier.
#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Clone, Debug, PartialEq)]
enum Operand {
    /// The innermost scope value (`.`).
    This,
    Path(String, Vec<Segment>),
    Literal(Value),
}

impl Operand {
    fn evaluate(&self, scope: &Scope<'_>) -> Value {
        match self {
            Self::This => scope.value().clone(),
            Self::Literal(value) => value.clone(),
            Self::Path(first, rest) => {
                let mut current = scope.lookup(first);
                for segment in rest {
                    current = current.and_then(|value| match segment {
                        Segment::Key(key) => value.get(key.as_str()),
                        Segment::Index(index) => value.get(*index),
                    });
                }
                current.cloned().unwrap_or(Value::Null)
            }
        }
    }
}

#[derive(Clone, Debug)]
struct FilterCall {
    name: String,
    filter: Arc<dyn Filter>,
    args: Vec<Operand>,
}

/// Compiled expression: an operand piped through zero or more filters.
#[derive(Clone, Debug)]
pub struct Expression {
    operand: Operand,
    filters: Vec<FilterCall>,
}

impl Field for Expression {
    fn get(&self, scope: &Scope<'_>) -> Result<Value, ExpressionError> {
        let mut value = self.operand.evaluate(scope);
        for call in &self.filters {
            let args: Vec<Value> = call.args.iter().map(|arg| arg.evaluate(scope)).collect();
            value = call
                .filter
                .apply(&value, &args)
                .map_err(|source| ExpressionError::Filter {
                    name: call.name.clone(),
                    source,
                })?;
        }
        Ok(value)
    }
}

struct Parser<'f> {
    tokens: std::iter::Peekable<std::vec::IntoIter<Token>>,
    filters: &'f Filters,
}

impl<'f> Parser<'f> {
    fn new(tokens: Vec<Token>, filters: &'f Filters) -> Self {
        Self {
            tokens: tokens.into_iter().peekable(),
            filters,
        }
    }

    fn parse(mut self) -> Result<Expression, ExpressionError> {
        let operand = self.operand()?;
        let mut filters = Vec::new();

        while let Some(token) = self.tokens.next() {
            if token != Token::Pipe {
                return Err(ExpressionError::UnexpectedToken(token.to_string()));
            }
            filters.push(self.filter_call()?);
        }

        Ok(Expression { operand, filters })
    }

    fn filter_call(&mut self) -> Result<FilterCall, ExpressionError> {
        let name = match self.tokens.next() {
            Some(Token::Ident(name)) => name,
            Some(other) => return Err(ExpressionError::UnexpectedToken(other.to_string())),
            None => return Err(ExpressionError::UnexpectedEnd),
        };
        let filter = self
            .filters
            .get(&name)
            .ok_or_else(|| ExpressionError::UnknownFilter(name.clone()))?;

        let mut args = Vec::new();
        while self.tokens.next_if_eq(&Token::Colon).is_some() {
            args.push(self.operand()?);
        }

        Ok(FilterCall { name, filter, args })
    }

    fn operand(&mut self) -> Result<Operand, ExpressionError> {
        match self.tokens.next() {
            Some(Token::Dot) => Ok(Operand::This),
            Some(Token::Str(value)) => Ok(Operand::Literal(Value::String(value))),
            Some(Token::Number(value)) => Ok(Operand::Literal(Value::Number(value))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Operand::Literal(Value::Bool(true))),
                "false" => Ok(Operand::Literal(Value::Bool(false))),
                "null" => Ok(Operand::Literal(Value::Null)),
                _ => self.path(name),
            },
            Some(other) => Err(ExpressionError::UnexpectedToken(other.to_string())),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn path(&mut self, first: String) -> Result<Operand, ExpressionError> {
        let mut segments = Vec::new();
        loop {
            if self.tokens.next_if_eq(&Token::Dot).is_some() {
                match self.tokens.next() {
                    Some(Token::Ident(key)) => segments.push(Segment::Key(key)),
                    Some(other) => return Err(ExpressionError::UnexpectedToken(other.to_string())),
                    None => return Err(ExpressionError::UnexpectedEnd),
                }
            } else if self.tokens.next_if_eq(&Token::LeftBracket).is_some() {
                let segment = match self.tokens.next() {
                    Some(Token::Str(key)) => Segment::Key(key),
                    Some(Token::Number(number)) => {
                        let index = number
                            .as_u64()
                            .and_then(|n| usize::try_from(n).ok())
                            .ok_or_else(|| ExpressionError::UnexpectedToken(number.to_string()))?;
                        Segment::Index(index)
                    }
                    Some(other) => return Err(ExpressionError::UnexpectedToken(other.to_string())),
                    None => return Err(ExpressionError::UnexpectedEnd),
                };
                match self.tokens.next() {
                    Some(Token::RightBracket) => segments.push(segment),
                    Some(other) => return Err(ExpressionError::UnexpectedToken(other.to_string())),
                    None => return Err(ExpressionError::UnexpectedEnd),
                }
            } else {
                return Ok(Operand::Path(first, segments));
            }
        }
    }
}
