//! Expression bindings and the evaluator seam.
//!
//! Scripting engines live outside this crate; they plug in through `ExpressionEvaluator`.
//! `ArithmeticEvaluator` is the built-in fallback: plain arithmetic over a few context
//! variables, enough for links like `frame * 2` or `value + 1`.

use dial_api_core::{DimIdx, Time, TypedValue, ViewId};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpressionLanguage {
    #[default]
    Python,
    ExprTk,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpressionBinding {
    pub source_text: String,
    pub language: ExpressionLanguage,
    pub has_return_var: bool,
    /// Validation error recorded when an invalid expression was installed anyway.
    pub error: Option<String>,
}

impl ExpressionBinding {
    pub fn new(
        source_text: impl Into<String>,
        language: ExpressionLanguage,
        has_return_var: bool,
    ) -> Self {
        Self {
            source_text: source_text.into(),
            language,
            has_return_var,
            error: None,
        }
    }
}

/// Inputs available to an expression while it is evaluated for one channel.
#[derive(Clone, Debug)]
pub struct ExpressionContext<'a> {
    pub time: Time,
    pub dim: DimIdx,
    pub view: ViewId,
    /// Stored scalar of the channel being evaluated.
    pub value: &'a TypedValue,
    pub knob_name: &'a str,
    pub node_name: &'a str,
}

pub trait ExpressionEvaluator: Send + Sync {
    fn validate(&self, binding: &ExpressionBinding) -> Result<(), String>;
    fn evaluate(
        &self,
        binding: &ExpressionBinding,
        ctx: &ExpressionContext<'_>,
    ) -> Result<TypedValue, String>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ArithmeticEvaluator;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let mut out = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                i += 1;
                if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<f64>()
                .map_err(|_| format!("bad number '{text}'"))?;
            out.push(Token::Num(n));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            out.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            out.push(match c {
                '+' | '-' | '*' | '/' | '^' | '%' => Token::Op(c),
                '(' => Token::LParen,
                ')' => Token::RParen,
                ',' => Token::Comma,
                other => return Err(format!("unexpected character '{other}'")),
            });
            i += 1;
        }
    }
    Ok(out)
}

#[derive(Clone, Debug)]
enum Ast {
    Num(f64),
    Var(Var),
    Neg(Box<Ast>),
    Bin(char, Box<Ast>, Box<Ast>),
    Call(Func, Vec<Ast>),
}

#[derive(Copy, Clone, Debug)]
enum Var {
    Frame,
    Dimension,
    View,
    Value,
    Pi,
}

#[derive(Copy, Clone, Debug)]
enum Func {
    Min,
    Max,
    Abs,
    Floor,
    Ceil,
    Round,
    Sqrt,
    Sin,
    Cos,
}

impl Func {
    fn lookup(name: &str) -> Option<(Func, usize)> {
        Some(match name {
            "min" => (Func::Min, 2),
            "max" => (Func::Max, 2),
            "abs" => (Func::Abs, 1),
            "floor" => (Func::Floor, 1),
            "ceil" => (Func::Ceil, 1),
            "round" => (Func::Round, 1),
            "sqrt" => (Func::Sqrt, 1),
            "sin" => (Func::Sin, 1),
            "cos" => (Func::Cos, 1),
            _ => return None,
        })
    }
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
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, tok: Token) -> Result<(), String> {
        match self.next() {
            Some(t) if t == tok => Ok(()),
            Some(t) => Err(format!("expected {tok:?}, found {t:?}")),
            None => Err(format!("expected {tok:?}, found end of input")),
        }
    }

    fn expr(&mut self) -> Result<Ast, String> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Ast::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Ast, String> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Ast::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Ast, String> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(Ast::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Ast, String> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exp = self.unary()?;
            return Ok(Ast::Bin('^', Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Ast, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Ast::Num(n)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    let (func, arity) =
                        Func::lookup(&name).ok_or_else(|| format!("unknown function '{name}'"))?;
                    self.pos += 1;
                    let mut args = vec![self.expr()?];
                    while let Some(Token::Comma) = self.peek() {
                        self.pos += 1;
                        args.push(self.expr()?);
                    }
                    self.expect(Token::RParen)?;
                    if args.len() != arity {
                        return Err(format!(
                            "'{name}' takes {arity} argument(s), got {}",
                            args.len()
                        ));
                    }
                    return Ok(Ast::Call(func, args));
                }
                let var = match name.as_str() {
                    "frame" | "t" => Var::Frame,
                    "dimension" | "dim" => Var::Dimension,
                    "view" => Var::View,
                    "value" | "curve" => Var::Value,
                    "pi" => Var::Pi,
                    _ => return Err(format!("unknown name '{name}'")),
                };
                Ok(Ast::Var(var))
            }
            Some(t) => Err(format!("unexpected token {t:?}")),
            None => Err("unexpected end of input".to_string()),
        }
    }
}

fn parse(src: &str) -> Result<Ast, String> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut p = Parser { tokens, pos: 0 };
    let ast = p.expr()?;
    if let Some(t) = p.peek() {
        return Err(format!("unexpected trailing token {t:?}"));
    }
    Ok(ast)
}

fn eval(ast: &Ast, ctx: &ExpressionContext<'_>) -> Result<f64, String> {
    Ok(match ast {
        Ast::Num(n) => *n,
        Ast::Var(Var::Frame) => ctx.time,
        Ast::Var(Var::Dimension) => f64::from(ctx.dim),
        Ast::Var(Var::View) => f64::from(ctx.view.0),
        Ast::Var(Var::Value) => ctx
            .value
            .as_f64()
            .ok_or_else(|| "'value' is not numeric".to_string())?,
        Ast::Var(Var::Pi) => std::f64::consts::PI,
        Ast::Neg(inner) => -eval(inner, ctx)?,
        Ast::Bin(op, a, b) => {
            let (a, b) = (eval(a, ctx)?, eval(b, ctx)?);
            match op {
                '+' => a + b,
                '-' => a - b,
                '*' => a * b,
                '/' | '%' if b == 0.0 => return Err("division by zero".to_string()),
                '/' => a / b,
                '%' => a % b,
                '^' => a.powf(b),
                _ => return Err(format!("unknown operator '{op}'")),
            }
        }
        Ast::Call(func, args) => {
            let x = eval(&args[0], ctx)?;
            match func {
                Func::Min => x.min(eval(&args[1], ctx)?),
                Func::Max => x.max(eval(&args[1], ctx)?),
                Func::Abs => x.abs(),
                Func::Floor => x.floor(),
                Func::Ceil => x.ceil(),
                Func::Round => x.round(),
                Func::Sqrt => x.sqrt(),
                Func::Sin => x.sin(),
                Func::Cos => x.cos(),
            }
        }
    })
}

/// The expression body to evaluate. With a return variable the last `ret = ...`
/// statement provides the result.
fn body(binding: &ExpressionBinding) -> Result<&str, String> {
    if !binding.has_return_var {
        return Ok(binding.source_text.trim());
    }
    binding
        .source_text
        .split(['\n', ';'])
        .filter_map(|stmt| {
            let (lhs, rhs) = stmt.split_once('=')?;
            (lhs.trim() == "ret").then_some(rhs.trim())
        })
        .last()
        .ok_or_else(|| "expression does not assign 'ret'".to_string())
}

impl ExpressionEvaluator for ArithmeticEvaluator {
    fn validate(&self, binding: &ExpressionBinding) -> Result<(), String> {
        parse(body(binding)?).map(|_| ())
    }

    fn evaluate(
        &self,
        binding: &ExpressionBinding,
        ctx: &ExpressionContext<'_>,
    ) -> Result<TypedValue, String> {
        let ast = parse(body(binding)?)?;
        let x = eval(&ast, ctx)?;
        if !x.is_finite() {
            return Err(format!("expression produced {x}"));
        }
        Ok(TypedValue::Double(x))
    }
}
