//! Row expressions for selections, weights and variables.
//!
//! Supported syntax: numeric literals, `true`/`false`, column identifiers,
//! arithmetic (`+ - * / %`), comparisons (`== != < <= > >=`), logic
//! (`&& || !`), unary minus and the functions `abs`, `sqrt`, `log`,
//! `log10`, `exp`, `pow`, `min`, `max`, `sin`, `cos`, `tan`, `atan2` and
//! `hypot`. Comparisons and logic yield 1.0 or 0.0; a value is true when it
//! is non-zero and not NaN.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::{Error, Result};

/// Binding power of prefix operators; tighter than any binary operator.
const PREFIX_POWER: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl Op {
    fn power(self) -> u8 {
        match self {
            Op::Or => 1,
            Op::And => 2,
            Op::Eq | Op::Ne => 3,
            Op::Lt | Op::Le | Op::Gt | Op::Ge => 4,
            Op::Add | Op::Sub => 5,
            Op::Mul | Op::Div | Op::Rem => 6,
        }
    }

    #[allow(clippy::float_cmp)]
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Op::Or => flag(truthy(lhs) || truthy(rhs)),
            Op::And => flag(truthy(lhs) && truthy(rhs)),
            Op::Eq => flag(lhs == rhs),
            Op::Ne => flag(lhs != rhs),
            Op::Lt => flag(lhs < rhs),
            Op::Le => flag(lhs <= rhs),
            Op::Gt => flag(lhs > rhs),
            Op::Ge => flag(lhs >= rhs),
            Op::Add => lhs + rhs,
            Op::Sub => lhs - rhs,
            Op::Mul => lhs * rhs,
            Op::Div => lhs / rhs,
            Op::Rem => lhs % rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Abs,
    Sqrt,
    Log,
    Log10,
    Exp,
    Pow,
    Min,
    Max,
    Sin,
    Cos,
    Tan,
    Atan2,
    Hypot,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "abs" | "fabs" => Function::Abs,
            "sqrt" => Function::Sqrt,
            "log" => Function::Log,
            "log10" => Function::Log10,
            "exp" => Function::Exp,
            "pow" => Function::Pow,
            "min" => Function::Min,
            "max" => Function::Max,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "atan2" => Function::Atan2,
            "hypot" => Function::Hypot,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Function::Pow | Function::Min | Function::Max | Function::Atan2 | Function::Hypot => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let a = args[0];
        match self {
            Function::Abs => a.abs(),
            Function::Sqrt => a.sqrt(),
            Function::Log => a.ln(),
            Function::Log10 => a.log10(),
            Function::Exp => a.exp(),
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Pow => a.powf(args[1]),
            Function::Min => a.min(args[1]),
            Function::Max => a.max(args[1]),
            Function::Atan2 => a.atan2(args[1]),
            Function::Hypot => a.hypot(args[1]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Const(f64),
    Column(usize),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

impl Node {
    fn eval<F: Fn(usize) -> f64>(&self, column: &F) -> f64 {
        match self {
            Node::Const(value) => *value,
            Node::Column(index) => column(*index),
            Node::Neg(inner) => -inner.eval(column),
            Node::Not(inner) => flag(!truthy(inner.eval(column))),
            Node::Binary(op, lhs, rhs) => op.apply(lhs.eval(column), rhs.eval(column)),
            Node::Call(function, args) => {
                let values: Vec<f64> = args.iter().map(|arg| arg.eval(column)).collect();
                function.apply(&values)
            }
        }
    }
}

/// Returns true for non-zero, non-NaN values.
#[must_use]
pub fn truthy(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(Op),
    Not,
    LParen,
    RParen,
    Comma,
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn error(&self, message: String) -> Error {
        Error::Expression {
            expression: self.source.to_string(),
            message,
        }
    }

    /// Consumes `next` if it follows, returning whether it did.
    fn eat(&mut self, next: char) -> bool {
        self.chars.next_if(|&(_, c)| c == next).is_some()
    }

    fn tokens(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some((start, c)) = self.chars.next() {
            let token = match c {
                c if c.is_whitespace() => continue,
                '+' => Token::Op(Op::Add),
                '-' => Token::Op(Op::Sub),
                '*' => Token::Op(Op::Mul),
                '/' => Token::Op(Op::Div),
                '%' => Token::Op(Op::Rem),
                '(' => Token::LParen,
                ')' => Token::RParen,
                ',' => Token::Comma,
                '<' if self.eat('=') => Token::Op(Op::Le),
                '<' => Token::Op(Op::Lt),
                '>' if self.eat('=') => Token::Op(Op::Ge),
                '>' => Token::Op(Op::Gt),
                '=' if self.eat('=') => Token::Op(Op::Eq),
                '!' if self.eat('=') => Token::Op(Op::Ne),
                '!' => Token::Not,
                '&' if self.eat('&') => Token::Op(Op::And),
                '|' if self.eat('|') => Token::Op(Op::Or),
                c if c.is_ascii_digit() || c == '.' => self.number(start)?,
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let end = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                    Token::Ident(self.source[start..end].to_string())
                }
                other => {
                    return Err(self.error(format!("unexpected character '{other}' at {start}")))
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Advances over characters matching `keep`; returns the end offset.
    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> usize {
        while self.chars.next_if(|&(_, c)| keep(c)).is_some() {}
        self.chars.peek().map_or(self.source.len(), |&(i, _)| i)
    }

    fn number(&mut self, start: usize) -> Result<Token> {
        let mut end = self.take_while(|c| c.is_ascii_digit() || c == '.');
        if self.chars.next_if(|&(_, c)| c == 'e' || c == 'E').is_some() {
            self.chars.next_if(|&(_, c)| c == '+' || c == '-');
            end = self.take_while(|c| c.is_ascii_digit());
        }
        let text = &self.source[start..end];
        text.parse()
            .map(Token::Number)
            .map_err(|_| self.error(format!("invalid number '{text}'")))
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    columns: Vec<String>,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> Error {
        Error::Expression {
            expression: self.source.to_string(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(self.error(format!("expected {expected:?}, found {token:?}"))),
            None => Err(self.error(format!("expected {expected:?}, found end of input"))),
        }
    }

    fn column(&mut self, name: String) -> Node {
        let index = match self.columns.iter().position(|c| *c == name) {
            Some(index) => index,
            None => {
                self.columns.push(name);
                self.columns.len() - 1
            }
        };
        Node::Column(index)
    }

    fn expression(&mut self, min_power: u8) -> Result<Node> {
        let mut lhs = self.prefix()?;
        while let Some(&Token::Op(op)) = self.peek() {
            if op.power() < min_power {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(op.power() + 1)?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Node> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Node::Const(value)),
            Some(Token::Op(Op::Sub)) => Ok(Node::Neg(Box::new(self.expression(PREFIX_POWER)?))),
            Some(Token::Op(Op::Add)) => self.expression(PREFIX_POWER),
            Some(Token::Not) => Ok(Node::Not(Box::new(self.expression(PREFIX_POWER)?))),
            Some(Token::LParen) => {
                let inner = self.expression(0)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    return self.call(&name);
                }
                Ok(match name.as_str() {
                    "true" => Node::Const(1.0),
                    "false" => Node::Const(0.0),
                    _ => self.column(name),
                })
            }
            Some(token) => Err(self.error(format!("unexpected {token:?}"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn call(&mut self, name: &str) -> Result<Node> {
        let function = Function::from_name(name)
            .ok_or_else(|| self.error(format!("unknown function '{name}'")))?;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.expression(0)?);
                if self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        if args.len() != function.arity() {
            return Err(self.error(format!(
                "'{name}' takes {} argument(s), got {}",
                function.arity(),
                args.len()
            )));
        }
        Ok(Node::Call(function, args))
    }
}

/// A compiled row expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
    columns: Vec<String>,
}

impl Expression {
    /// Compiles `source`.
    ///
    /// # Errors
    /// Returns [`Error::Expression`] on empty input, syntax errors, unknown
    /// functions or wrong argument counts.
    pub fn compile(source: &str) -> Result<Self> {
        let tokens = Lexer::new(source).tokens()?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
            columns: Vec::new(),
        };
        let root = parser.expression(0)?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(format!("unexpected trailing {token:?}")));
        }
        Ok(Self {
            source: source.to_string(),
            root,
            columns: parser.columns,
        })
    }

    /// Source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Referenced column names, in order of first appearance.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Evaluates with `values` given in [`Expression::columns`] order.
    ///
    /// Returns `None` if fewer values than referenced columns are given.
    #[must_use]
    pub fn evaluate(&self, values: &[f64]) -> Option<f64> {
        if values.len() < self.columns.len() {
            return None;
        }
        Some(self.root.eval(&|index| values[index]))
    }

    /// Binds the referenced columns for row-wise evaluation.
    ///
    /// # Errors
    /// Returns [`Error::MissingData`] if `lookup` does not know a column.
    pub fn bind<'a, F>(&'a self, lookup: F) -> Result<BoundExpression<'a>>
    where
        F: Fn(&str) -> Option<&'a [f64]>,
    {
        let columns = self
            .columns
            .iter()
            .map(|name| {
                lookup(name).ok_or_else(|| {
                    Error::MissingData(format!("column '{name}' used by '{}'", self.source))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BoundExpression {
            expression: self,
            columns,
        })
    }
}

/// An expression bound to column slices.
#[derive(Debug, Clone)]
pub struct BoundExpression<'a> {
    expression: &'a Expression,
    columns: Vec<&'a [f64]>,
}

impl BoundExpression<'_> {
    /// Value at `row`.
    #[must_use]
    pub fn at(&self, row: usize) -> f64 {
        self.expression.root.eval(&|index| self.columns[index][row])
    }
}
