//! Reference evaluator: a small expression language over tagged values.
//!
//! Accepts exactly the shape the synthesizer produces: one `fn run(args)`
//! declaration whose body binds positional arguments to names and returns an
//! expression. Arithmetic, comparisons, boolean logic, string concatenation,
//! and a small math function library are available to formula bodies.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ripple_core::Value;
use tracing::debug;

use crate::evaluator::{CompiledScript, EvalError, ScriptEvaluator, ScriptFault};

/// The built-in evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalcEvaluator;

impl CalcEvaluator {
    /// Create an evaluator.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScriptEvaluator for CalcEvaluator {
    async fn compile(&self, source: &str) -> Result<Arc<dyn CompiledScript>, EvalError> {
        let tokens = lex(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let script = parser.parse_function()?;
        if script.name != "run" {
            return Err(EvalError::SymbolLookup(format!(
                "entry function `{}` is not `run`",
                script.name
            )));
        }
        debug!(statements = script.stmts.len(), "compiled formula function");
        Ok(Arc::new(script))
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
}

fn lex(source: &str) -> Result<Vec<Tok>, EvalError> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < len {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            b'{' => {
                tokens.push(Tok::LBrace);
                i += 1;
            }
            b'}' => {
                tokens.push(Tok::RBrace);
                i += 1;
            }
            b'[' => {
                tokens.push(Tok::LBracket);
                i += 1;
            }
            b']' => {
                tokens.push(Tok::RBracket);
                i += 1;
            }
            b',' => {
                tokens.push(Tok::Comma);
                i += 1;
            }
            b';' => {
                tokens.push(Tok::Semi);
                i += 1;
            }
            b'+' => {
                tokens.push(Tok::Plus);
                i += 1;
            }
            b'-' => {
                tokens.push(Tok::Minus);
                i += 1;
            }
            b'*' => {
                tokens.push(Tok::Star);
                i += 1;
            }
            b'/' => {
                tokens.push(Tok::Slash);
                i += 1;
            }
            b'%' => {
                tokens.push(Tok::Percent);
                i += 1;
            }
            b'=' => {
                if i + 1 < len && bytes[i + 1] == b'=' {
                    tokens.push(Tok::EqEq);
                    i += 2;
                } else {
                    tokens.push(Tok::Assign);
                    i += 1;
                }
            }
            b'!' => {
                if i + 1 < len && bytes[i + 1] == b'=' {
                    tokens.push(Tok::NotEq);
                    i += 2;
                } else {
                    tokens.push(Tok::Bang);
                    i += 1;
                }
            }
            b'<' => {
                if i + 1 < len && bytes[i + 1] == b'=' {
                    tokens.push(Tok::Le);
                    i += 2;
                } else {
                    tokens.push(Tok::Lt);
                    i += 1;
                }
            }
            b'>' => {
                if i + 1 < len && bytes[i + 1] == b'=' {
                    tokens.push(Tok::Ge);
                    i += 2;
                } else {
                    tokens.push(Tok::Gt);
                    i += 1;
                }
            }
            b'&' => {
                if i + 1 < len && bytes[i + 1] == b'&' {
                    tokens.push(Tok::AndAnd);
                    i += 2;
                } else {
                    return Err(EvalError::Compile("stray `&`".to_string()));
                }
            }
            b'|' => {
                if i + 1 < len && bytes[i + 1] == b'|' {
                    tokens.push(Tok::OrOr);
                    i += 2;
                } else {
                    return Err(EvalError::Compile("stray `|`".to_string()));
                }
            }
            b'"' => {
                let mut value = String::new();
                i += 1;
                loop {
                    if i >= len {
                        return Err(EvalError::Compile("unterminated string".to_string()));
                    }
                    match bytes[i] {
                        b'"' => {
                            i += 1;
                            break;
                        }
                        b'\\' if i + 1 < len => {
                            value.push(match bytes[i + 1] {
                                b'n' => '\n',
                                b't' => '\t',
                                other => other as char,
                            });
                            i += 2;
                        }
                        other => {
                            value.push(other as char);
                            i += 1;
                        }
                    }
                }
                tokens.push(Tok::Str(value));
            }
            b'0'..=b'9' => {
                let start = i;
                while i < len && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let mut is_float = false;
                if i + 1 < len && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
                    is_float = true;
                    i += 1;
                    while i < len && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text = &source[start..i];
                if is_float {
                    let parsed = text
                        .parse::<f64>()
                        .map_err(|e| EvalError::Compile(format!("bad float `{}`: {}", text, e)))?;
                    tokens.push(Tok::Float(parsed));
                } else {
                    let parsed = text
                        .parse::<i64>()
                        .map_err(|e| EvalError::Compile(format!("bad integer `{}`: {}", text, e)))?;
                    tokens.push(Tok::Int(parsed));
                }
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Tok::Ident(source[start..i].to_string()));
            }
            other => {
                return Err(EvalError::Compile(format!(
                    "unexpected character `{}`",
                    other as char
                )))
            }
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Stmt {
    Let(String, Expr),
    Return(Expr),
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Var(String),
    Index(String, Box<Expr>),
    Call(String, Vec<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: Tok) -> Result<(), EvalError> {
        match self.advance() {
            Some(found) if found == expected => Ok(()),
            Some(found) => Err(EvalError::Compile(format!(
                "expected {:?}, found {:?}",
                expected, found
            ))),
            None => Err(EvalError::Compile(format!(
                "expected {:?}, found end of input",
                expected
            ))),
        }
    }

    fn expect_ident(&mut self) -> Result<String, EvalError> {
        match self.advance() {
            Some(Tok::Ident(name)) => Ok(name),
            Some(found) => Err(EvalError::Compile(format!(
                "expected identifier, found {:?}",
                found
            ))),
            None => Err(EvalError::Compile(
                "expected identifier, found end of input".to_string(),
            )),
        }
    }

    fn eat_keyword(&mut self, word: &str) -> Result<(), EvalError> {
        match self.advance() {
            Some(Tok::Ident(name)) if name == word => Ok(()),
            other => Err(EvalError::Compile(format!(
                "expected `{}`, found {:?}",
                word, other
            ))),
        }
    }

    /// Parse one `fn NAME(PARAM) { ... }` declaration.
    fn parse_function(&mut self) -> Result<CalcScript, EvalError> {
        self.eat_keyword("fn")?;
        let name = self.expect_ident()?;
        self.expect(Tok::LParen)?;
        let param = self.expect_ident()?;
        self.expect(Tok::RParen)?;
        self.expect(Tok::LBrace)?;

        let mut stmts = Vec::new();
        while !matches!(self.peek(), Some(Tok::RBrace)) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(Tok::RBrace)?;
        if let Some(extra) = self.peek() {
            return Err(EvalError::Compile(format!(
                "trailing input after function body: {:?}",
                extra
            )));
        }

        Ok(CalcScript { name, param, stmts })
    }

    /// `let NAME = expr`, `return expr`, or a bare expression (treated as the
    /// return value). Trailing semicolons are optional throughout.
    fn parse_stmt(&mut self) -> Result<Stmt, EvalError> {
        let stmt = match self.peek() {
            Some(Tok::Ident(word)) if word == "let" => {
                self.advance();
                let name = self.expect_ident()?;
                self.expect(Tok::Assign)?;
                Stmt::Let(name, self.parse_expr()?)
            }
            Some(Tok::Ident(word)) if word == "return" => {
                self.advance();
                Stmt::Return(self.parse_expr()?)
            }
            _ => Stmt::Return(self.parse_expr()?),
        };
        if matches!(self.peek(), Some(Tok::Semi)) {
            self.advance();
        }
        Ok(stmt)
    }

    fn parse_expr(&mut self) -> Result<Expr, EvalError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Tok::OrOr)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_cmp()?;
        while matches!(self.peek(), Some(Tok::AndAnd)) {
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr, EvalError> {
        let lhs = self.parse_add()?;
        let op = match self.peek() {
            Some(Tok::EqEq) => BinOp::Eq,
            Some(Tok::NotEq) => BinOp::Ne,
            Some(Tok::Lt) => BinOp::Lt,
            Some(Tok::Le) => BinOp::Le,
            Some(Tok::Gt) => BinOp::Gt,
            Some(Tok::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_add()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_add(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                Some(Tok::Percent) => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Some(Tok::Minus) => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Tok::Bang) => {
                self.advance();
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Tok::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Tok::Float(x)) => Ok(Expr::Literal(Value::Float64(x))),
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Tok::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::Ident(name)) => {
                if name == "true" {
                    return Ok(Expr::Literal(Value::Bool(true)));
                }
                if name == "false" {
                    return Ok(Expr::Literal(Value::Bool(false)));
                }
                if name == "null" {
                    return Ok(Expr::Literal(Value::Null));
                }
                match self.peek() {
                    Some(Tok::LParen) => {
                        self.advance();
                        let mut call_args = Vec::new();
                        if !matches!(self.peek(), Some(Tok::RParen)) {
                            loop {
                                call_args.push(self.parse_expr()?);
                                if matches!(self.peek(), Some(Tok::Comma)) {
                                    self.advance();
                                } else {
                                    break;
                                }
                            }
                        }
                        self.expect(Tok::RParen)?;
                        Ok(Expr::Call(name, call_args))
                    }
                    Some(Tok::LBracket) => {
                        self.advance();
                        let index = self.parse_expr()?;
                        self.expect(Tok::RBracket)?;
                        Ok(Expr::Index(name, Box::new(index)))
                    }
                    _ => Ok(Expr::Var(name)),
                }
            }
            Some(found) => Err(EvalError::Compile(format!(
                "unexpected token {:?}",
                found
            ))),
            None => Err(EvalError::Compile("unexpected end of input".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// A compiled `fn run(args)` declaration.
#[derive(Debug)]
struct CalcScript {
    name: String,
    param: String,
    stmts: Vec<Stmt>,
}

impl CompiledScript for CalcScript {
    fn call(&self, args: &[Value]) -> Result<Value, ScriptFault> {
        let mut env: HashMap<String, Value> = HashMap::new();
        for stmt in &self.stmts {
            match stmt {
                Stmt::Let(name, expr) => {
                    let value = self.eval(expr, args, &env)?;
                    env.insert(name.clone(), value);
                }
                Stmt::Return(expr) => return self.eval(expr, args, &env),
            }
        }
        Ok(Value::Null)
    }
}

impl CalcScript {
    fn eval(
        &self,
        expr: &Expr,
        args: &[Value],
        env: &HashMap<String, Value>,
    ) -> Result<Value, ScriptFault> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => match env.get(name) {
                Some(value) => Ok(value.clone()),
                None if *name == self.param => Err(ScriptFault::new(format!(
                    "`{}` is the argument sequence, not a value",
                    name
                ))),
                None => Err(ScriptFault::new(format!("unknown variable `{}`", name))),
            },
            Expr::Index(name, index) => {
                if *name != self.param {
                    return Err(ScriptFault::new(format!("`{}` is not indexable", name)));
                }
                let index = match self.eval(index, args, env)? {
                    Value::Int(i) if i >= 0 => i as usize,
                    Value::Uint(u) => u as usize,
                    other => {
                        return Err(ScriptFault::new(format!(
                            "argument index must be a non-negative integer, got {}",
                            other.kind()
                        )))
                    }
                };
                args.get(index).cloned().ok_or_else(|| {
                    ScriptFault::new(format!("argument index {} out of range", index))
                })
            }
            Expr::Call(name, call_args) => {
                let mut values = Vec::with_capacity(call_args.len());
                for arg in call_args {
                    values.push(self.eval(arg, args, env)?);
                }
                call_math(name, &values)
            }
            Expr::Neg(inner) => match self.eval(inner, args, env)? {
                Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
                Value::Float32(x) => Ok(Value::Float32(-x)),
                Value::Float64(x) => Ok(Value::Float64(-x)),
                other => Err(ScriptFault::new(format!(
                    "cannot negate {}",
                    other.kind()
                ))),
            },
            Expr::Not(inner) => match self.eval(inner, args, env)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(ScriptFault::new(format!(
                    "`!` needs a bool, got {}",
                    other.kind()
                ))),
            },
            Expr::Binary(BinOp::And, lhs, rhs) => {
                match self.eval(lhs, args, env)? {
                    Value::Bool(false) => Ok(Value::Bool(false)),
                    Value::Bool(true) => match self.eval(rhs, args, env)? {
                        Value::Bool(b) => Ok(Value::Bool(b)),
                        other => Err(fault_bool_operand(&other)),
                    },
                    other => Err(fault_bool_operand(&other)),
                }
            }
            Expr::Binary(BinOp::Or, lhs, rhs) => {
                match self.eval(lhs, args, env)? {
                    Value::Bool(true) => Ok(Value::Bool(true)),
                    Value::Bool(false) => match self.eval(rhs, args, env)? {
                        Value::Bool(b) => Ok(Value::Bool(b)),
                        other => Err(fault_bool_operand(&other)),
                    },
                    other => Err(fault_bool_operand(&other)),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs, args, env)?;
                let rhs = self.eval(rhs, args, env)?;
                apply_binary(*op, lhs, rhs)
            }
        }
    }
}

fn fault_bool_operand(value: &Value) -> ScriptFault {
    ScriptFault::new(format!("logical operand must be bool, got {}", value.kind()))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Uint(u) => Some(*u as f64),
        Value::Float32(x) => Some(*x as f64),
        Value::Float64(x) => Some(*x),
        _ => None,
    }
}

fn apply_binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, ScriptFault> {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
            arith(op, lhs, rhs)
        }
        BinOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => order(op, &lhs, &rhs),
        BinOp::And | BinOp::Or => unreachable!("short-circuited in eval"),
    }
}

fn arith(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, ScriptFault> {
    // String concatenation rides on `+`.
    if op == BinOp::Add {
        if let (Value::Str(a), Value::Str(b)) = (&lhs, &rhs) {
            return Ok(Value::Str(format!("{}{}", a, b)));
        }
    }
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
        (Value::Uint(a), Value::Uint(b)) => uint_arith(op, *a, *b),
        _ => {
            let (a, b) = match (as_f64(&lhs), as_f64(&rhs)) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(ScriptFault::new(format!(
                        "cannot apply {:?} to {} and {}",
                        op,
                        lhs.kind(),
                        rhs.kind()
                    )))
                }
            };
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Rem => a % b,
                _ => unreachable!(),
            };
            Ok(Value::Float64(result))
        }
    }
}

fn int_arith(op: BinOp, a: i64, b: i64) -> Result<Value, ScriptFault> {
    let result = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => a
            .checked_div(b)
            .ok_or_else(|| ScriptFault::new("integer division by zero"))?,
        BinOp::Rem => a
            .checked_rem(b)
            .ok_or_else(|| ScriptFault::new("integer remainder by zero"))?,
        _ => unreachable!(),
    };
    Ok(Value::Int(result))
}

fn uint_arith(op: BinOp, a: u64, b: u64) -> Result<Value, ScriptFault> {
    let result = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => a
            .checked_div(b)
            .ok_or_else(|| ScriptFault::new("integer division by zero"))?,
        BinOp::Rem => a
            .checked_rem(b)
            .ok_or_else(|| ScriptFault::new("integer remainder by zero"))?,
        _ => unreachable!(),
    };
    Ok(Value::Uint(result))
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_f64(lhs), as_f64(rhs)) {
        return a == b;
    }
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}

fn order(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptFault> {
    use std::cmp::Ordering;
    let ordering = if let (Some(a), Some(b)) = (as_f64(lhs), as_f64(rhs)) {
        a.partial_cmp(&b)
            .ok_or_else(|| ScriptFault::new("cannot order NaN"))?
    } else if let (Value::Str(a), Value::Str(b)) = (lhs, rhs) {
        a.cmp(b)
    } else {
        return Err(ScriptFault::new(format!(
            "cannot order {} and {}",
            lhs.kind(),
            rhs.kind()
        )));
    };
    let result = match op {
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

/// The standard math library available to formula bodies.
fn call_math(name: &str, args: &[Value]) -> Result<Value, ScriptFault> {
    let arity = |expected: usize| -> Result<(), ScriptFault> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(ScriptFault::new(format!(
                "`{}` takes {} argument(s), got {}",
                name,
                expected,
                args.len()
            )))
        }
    };
    let numeric = |index: usize| -> Result<f64, ScriptFault> {
        as_f64(&args[index]).ok_or_else(|| {
            ScriptFault::new(format!(
                "`{}` needs numeric arguments, got {}",
                name,
                args[index].kind()
            ))
        })
    };
    match name {
        "abs" => {
            arity(1)?;
            match &args[0] {
                Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
                Value::Uint(u) => Ok(Value::Uint(*u)),
                _ => Ok(Value::Float64(numeric(0)?.abs())),
            }
        }
        "sqrt" => {
            arity(1)?;
            Ok(Value::Float64(numeric(0)?.sqrt()))
        }
        "pow" => {
            arity(2)?;
            Ok(Value::Float64(numeric(0)?.powf(numeric(1)?)))
        }
        "min" | "max" => {
            arity(2)?;
            if let (Value::Int(a), Value::Int(b)) = (&args[0], &args[1]) {
                let result = if name == "min" { *a.min(b) } else { *a.max(b) };
                return Ok(Value::Int(result));
            }
            let (a, b) = (numeric(0)?, numeric(1)?);
            Ok(Value::Float64(if name == "min" {
                a.min(b)
            } else {
                a.max(b)
            }))
        }
        "floor" => {
            arity(1)?;
            Ok(Value::Float64(numeric(0)?.floor()))
        }
        "ceil" => {
            arity(1)?;
            Ok(Value::Float64(numeric(0)?.ceil()))
        }
        "round" => {
            arity(1)?;
            Ok(Value::Float64(numeric(0)?.round()))
        }
        _ => Err(ScriptFault::new(format!("unknown function `{}`", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{synthesize, Binding};

    async fn run(source: &str, args: &[Value]) -> Result<Value, ScriptFault> {
        let script = CalcEvaluator::new().compile(source).await.unwrap();
        script.call(args)
    }

    #[tokio::test]
    async fn literal_sum() {
        let value = run("fn run(args) {\n    return 2+2\n}", &[]).await.unwrap();
        assert_eq!(value, Value::Int(4));
    }

    #[tokio::test]
    async fn bound_dependency() {
        let source = synthesize("return A * 2", &[Binding::new("A", Value::Int(10))]);
        let value = run(&source, &[Value::Int(10)]).await.unwrap();
        assert_eq!(value, Value::Int(20));
    }

    #[tokio::test]
    async fn precedence_and_parens() {
        assert_eq!(
            run("fn run(args) { return 2 + 3 * 4 }", &[]).await.unwrap(),
            Value::Int(14)
        );
        assert_eq!(
            run("fn run(args) { return (2 + 3) * 4 }", &[]).await.unwrap(),
            Value::Int(20)
        );
    }

    #[tokio::test]
    async fn mixed_arithmetic_promotes_to_float() {
        assert_eq!(
            run("fn run(args) { return 1 + 2.5 }", &[]).await.unwrap(),
            Value::Float64(3.5)
        );
    }

    #[tokio::test]
    async fn integer_division_truncates() {
        assert_eq!(
            run("fn run(args) { return 7 / 2 }", &[]).await.unwrap(),
            Value::Int(3)
        );
    }

    #[tokio::test]
    async fn division_by_zero_faults() {
        let fault = run("fn run(args) { return 1 / 0 }", &[]).await.unwrap_err();
        assert!(fault.message.contains("division by zero"));
    }

    #[tokio::test]
    async fn string_concat() {
        assert_eq!(
            run(r#"fn run(args) { return "foo" + "bar" }"#, &[])
                .await
                .unwrap(),
            Value::Str("foobar".into())
        );
    }

    #[tokio::test]
    async fn comparison_and_logic() {
        assert_eq!(
            run("fn run(args) { return 1 < 2 && !false }", &[])
                .await
                .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            run("fn run(args) { return 2 == 2.0 }", &[]).await.unwrap(),
            Value::Bool(true)
        );
    }

    #[tokio::test]
    async fn math_library() {
        assert_eq!(
            run("fn run(args) { return sqrt(16.0) }", &[]).await.unwrap(),
            Value::Float64(4.0)
        );
        assert_eq!(
            run("fn run(args) { return pow(2, 10) }", &[]).await.unwrap(),
            Value::Float64(1024.0)
        );
        assert_eq!(
            run("fn run(args) { return abs(-5) }", &[]).await.unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            run("fn run(args) { return min(3, 7) + max(1, 2) }", &[])
                .await
                .unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            run("fn run(args) { return floor(2.7) }", &[]).await.unwrap(),
            Value::Float64(2.0)
        );
    }

    #[tokio::test]
    async fn local_bindings() {
        let value = run("fn run(args) {\n    let x = 2\n    let y = 3\n    return x * y\n}", &[])
            .await
            .unwrap();
        assert_eq!(value, Value::Int(6));
    }

    #[tokio::test]
    async fn missing_return_yields_null() {
        assert_eq!(
            run("fn run(args) { let x = 1 }", &[]).await.unwrap(),
            Value::Null
        );
    }

    #[tokio::test]
    async fn unknown_variable_faults() {
        let fault = run("fn run(args) { return nope }", &[]).await.unwrap_err();
        assert!(fault.message.contains("unknown variable"));
    }

    #[tokio::test]
    async fn arity_fault() {
        let fault = run("fn run(args) { return sqrt(1, 2) }", &[])
            .await
            .unwrap_err();
        assert!(fault.message.contains("takes 1 argument"));
    }

    #[tokio::test]
    async fn argument_index_out_of_range_faults() {
        let fault = run("fn run(args) { return args[3] }", &[Value::Int(1)])
            .await
            .unwrap_err();
        assert!(fault.message.contains("out of range"));
    }

    #[tokio::test]
    async fn wrong_entry_name_is_symbol_lookup() {
        let err = CalcEvaluator::new()
            .compile("fn main(args) { return 1 }")
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::SymbolLookup(_)));
    }

    #[tokio::test]
    async fn malformed_source_is_compile_error() {
        let err = CalcEvaluator::new()
            .compile("fn run(args) { return 1 +")
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Compile(_)));
    }

    #[tokio::test]
    async fn null_equality() {
        assert_eq!(
            run("fn run(args) { return null == null }", &[]).await.unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            run("fn run(args) { return args[0] == null }", &[Value::Null])
                .await
                .unwrap(),
            Value::Bool(true)
        );
    }
}
