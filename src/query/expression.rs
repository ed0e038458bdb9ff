//! Arithmetic / function sub-expressions
//!
//! Recursive descent over the token stream with two precedence levels
//! (`+ -` below `* /`), left associative. Used for calculated projection
//! columns and for `(expr) OP value` filters.

use crate::error::{Error, Result};
use crate::metrics::global_metrics;
use crate::query::ast::{AggregateFunction, Value};
use crate::query::lexer::{tokenize, Token, TokenKind};
use crate::types::{escape_string, Variable};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "+" => Some(ArithOp::Add),
            "-" => Some(ArithOp::Sub),
            "*" => Some(ArithOp::Mul),
            "/" => Some(ArithOp::Div),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Operator {
        op: ArithOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    Function {
        /// Upper-cased source name
        name: String,
        distinct: bool,
        args: Vec<ExprNode>,
    },
    Operand {
        relation: Option<String>,
        column: String,
    },
    Literal(Value),
    Negate(Box<ExprNode>),
    /// `*` argument of `COUNT(*)`
    Star,
}

/// Scalar SQL functions and their SPARQL names
const SCALAR_FUNCTIONS: [(&str, &str); 9] = [
    ("UPPER", "UCASE"),
    ("LOWER", "LCASE"),
    ("LENGTH", "STRLEN"),
    ("SUBSTRING", "SUBSTR"),
    ("ABS", "ABS"),
    ("ROUND", "ROUND"),
    ("CEIL", "CEIL"),
    ("FLOOR", "FLOOR"),
    ("CONCAT", "CONCAT"),
];

pub fn scalar_function(name: &str) -> Option<&'static str> {
    SCALAR_FUNCTIONS
        .iter()
        .find(|(sql, _)| sql.eq_ignore_ascii_case(name))
        .map(|(_, sparql)| *sparql)
}

impl ExprNode {
    pub fn operand(relation: Option<&str>, column: &str) -> Self {
        ExprNode::Operand {
            relation: relation.map(str::to_string),
            column: column.to_string(),
        }
    }

    pub fn aggregate(&self) -> Option<AggregateFunction> {
        match self {
            ExprNode::Function { name, .. } => AggregateFunction::from_name(name),
            _ => None,
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        match self {
            ExprNode::Operator { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            ExprNode::Function { args, .. } => {
                self.aggregate().is_some() || args.iter().any(ExprNode::contains_aggregate)
            }
            ExprNode::Negate(inner) => inner.contains_aggregate(),
            _ => false,
        }
    }

    /// Column references in left-to-right order
    pub fn operands(&self) -> Vec<(Option<&str>, &str)> {
        let mut out = Vec::new();
        self.collect_operands(&mut out);
        out
    }

    fn collect_operands<'a>(&'a self, out: &mut Vec<(Option<&'a str>, &'a str)>) {
        match self {
            ExprNode::Operator { left, right, .. } => {
                left.collect_operands(out);
                right.collect_operands(out);
            }
            ExprNode::Function { args, .. } => {
                for arg in args {
                    arg.collect_operands(out);
                }
            }
            ExprNode::Operand { relation, column } => {
                out.push((relation.as_deref(), column.as_str()))
            }
            ExprNode::Negate(inner) => inner.collect_operands(out),
            ExprNode::Literal(_) | ExprNode::Star => {}
        }
    }

    /// Render as a SPARQL expression.
    ///
    /// Operands resolve through `bindings` by `relation.column`, then by bare
    /// column, then to a synthesized `?column` variable. Binding keys are lowercase.
    pub fn render(&self, bindings: &HashMap<String, Variable>, strict: bool) -> Result<String> {
        match self {
            ExprNode::Operator { op, left, right } => Ok(format!(
                "({} {} {})",
                left.render(bindings, strict)?,
                op,
                right.render(bindings, strict)?
            )),
            ExprNode::Operand { relation, column } => {
                let qualified = relation.as_ref().and_then(|rel| {
                    bindings.get(&format!("{}.{}", rel, column).to_lowercase())
                });
                let var = qualified
                    .or_else(|| bindings.get(&column.to_lowercase()))
                    .cloned()
                    .unwrap_or_else(|| Variable::new(column.to_lowercase()));
                Ok(var.to_string())
            }
            ExprNode::Literal(value) => Ok(render_literal(value)),
            ExprNode::Negate(inner) => Ok(format!("-{}", inner.render(bindings, strict)?)),
            ExprNode::Star => Ok("*".to_string()),
            ExprNode::Function {
                name,
                distinct,
                args,
            } => {
                let rendered: Vec<String> = args
                    .iter()
                    .map(|a| a.render(bindings, strict))
                    .collect::<Result<_>>()?;
                let prefix = if *distinct { "DISTINCT " } else { "" };

                if let Some(agg) = AggregateFunction::from_name(name) {
                    let arg = rendered.first().map(String::as_str).unwrap_or("*");
                    return Ok(format!("{}({}{})", agg, prefix, arg));
                }
                if let Some(sparql) = scalar_function(name) {
                    return Ok(format!("{}({})", sparql, rendered.join(", ")));
                }
                if strict {
                    return Err(Error::unsupported(format!("未知函数: {}", name)));
                }
                warn!(function = %name, "unknown function, falling back to COUNT");
                global_metrics().record_fallback();
                let arg = rendered.first().map(String::as_str).unwrap_or("*");
                Ok(format!("COUNT({}{})", prefix, arg))
            }
        }
    }
}

/// Literal formatted per type: quoted string, bare number, lowercase boolean.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", escape_string(s)),
        Value::Number(n) => n.clone(),
        Value::Boolean(b) => b.to_string(),
        Value::Null => "UNDEF".to_string(),
        Value::List(items) => items
            .iter()
            .map(render_literal)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Range(low, high) => format!("{} AND {}", render_literal(low), render_literal(high)),
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Parse an expression from text.
pub fn parse_expression(text: &str) -> Result<ExprNode> {
    let tokens = tokenize(text)?;
    parse_expression_tokens(&tokens)
}

/// Parse an expression from an already tokenized slice; the whole slice must be consumed.
pub fn parse_expression_tokens(tokens: &[Token]) -> Result<ExprNode> {
    let mut parser = ExpressionParser { tokens, pos: 0 };
    if tokens.is_empty() {
        return Err(Error::syntax("表达式为空", ""));
    }
    let expr = parser.parse_additive()?;
    if parser.peek().is_some() {
        return Err(Error::syntax("表达式中有多余内容", fragment(&tokens[parser.pos..])));
    }
    Ok(expr)
}

fn fragment(tokens: &[Token]) -> String {
    tokens
        .iter()
        .take(6)
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

struct ExpressionParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ExpressionParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn try_symbol(&mut self, symbol: &str) -> bool {
        if self.peek().map_or(false, |t| t.is_symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn try_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().map_or(false, |t| t.is_keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        if self.try_symbol(symbol) {
            Ok(())
        } else {
            Err(Error::syntax(
                format!("期望 '{}'", symbol),
                fragment(&self.tokens[self.pos.min(self.tokens.len())..]),
            ))
        }
    }

    fn peek_arith(&self, ops: &[ArithOp]) -> Option<ArithOp> {
        self.peek()
            .filter(|t| t.kind == TokenKind::Symbol)
            .and_then(|t| ArithOp::from_symbol(&t.text))
            .filter(|op| ops.contains(op))
    }

    fn parse_additive(&mut self) -> Result<ExprNode> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.peek_arith(&[ArithOp::Add, ArithOp::Sub]) {
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = ExprNode::Operator {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<ExprNode> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek_arith(&[ArithOp::Mul, ArithOp::Div]) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = ExprNode::Operator {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ExprNode> {
        if self.try_symbol("-") {
            if let Some(num) = self.peek().filter(|t| t.kind == TokenKind::Number) {
                self.pos += 1;
                return Ok(ExprNode::Literal(Value::Number(format!("-{}", num.text))));
            }
            return Ok(ExprNode::Negate(Box::new(self.parse_unary()?)));
        }
        if self.try_symbol("+") {
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ExprNode> {
        let start = self.pos;
        let token = self
            .advance()
            .ok_or_else(|| Error::syntax("表达式不完整", fragment(&self.tokens[start..])))?;

        match token.kind {
            TokenKind::Number => Ok(ExprNode::Literal(Value::Number(token.text.clone()))),
            TokenKind::String => Ok(ExprNode::Literal(Value::String(token.text.clone()))),
            TokenKind::Symbol if token.text == "(" => {
                if self.peek().map_or(false, |t| t.is_keyword("SELECT")) {
                    return Err(Error::unsupported("子查询"));
                }
                let inner = self.parse_additive()?;
                self.expect_symbol(")")?;
                Ok(inner)
            }
            TokenKind::Word if token.is_keyword("TRUE") => Ok(ExprNode::Literal(Value::Boolean(true))),
            TokenKind::Word if token.is_keyword("FALSE") => {
                Ok(ExprNode::Literal(Value::Boolean(false)))
            }
            TokenKind::Word if self.peek().map_or(false, |t| t.is_symbol("(")) => {
                self.pos += 1;
                self.parse_call(&token.text)
            }
            TokenKind::Word | TokenKind::QuotedIdent => {
                if self.peek().map_or(false, |t| t.is_symbol("."))
                    && self.peek_at(1).map_or(false, Token::is_identifier)
                {
                    let column = &self.tokens[self.pos + 1].text;
                    self.pos += 2;
                    Ok(ExprNode::operand(Some(&token.text), column))
                } else {
                    Ok(ExprNode::operand(None, &token.text))
                }
            }
            _ => Err(Error::syntax(
                format!("表达式中的意外符号 '{}'", token.text),
                fragment(&self.tokens[start..]),
            )),
        }
    }

    /// Arguments after the opening parenthesis of `name(`
    fn parse_call(&mut self, name: &str) -> Result<ExprNode> {
        let name = name.to_ascii_uppercase();
        let is_aggregate = AggregateFunction::from_name(&name).is_some();
        let distinct = is_aggregate && self.try_keyword("DISTINCT");

        let mut args = Vec::new();
        if self.try_symbol("*") {
            args.push(ExprNode::Star);
        } else if !self.peek().map_or(false, |t| t.is_symbol(")")) {
            loop {
                if self.peek().map_or(false, |t| t.is_keyword("SELECT")) {
                    return Err(Error::unsupported("子查询"));
                }
                args.push(self.parse_additive()?);
                if !self.try_symbol(",") {
                    break;
                }
            }
        }
        self.expect_symbol(")")?;

        if is_aggregate && args.iter().any(ExprNode::contains_aggregate) {
            return Err(Error::unsupported(format!("嵌套聚合: {}", name)));
        }

        Ok(ExprNode::Function {
            name,
            distinct,
            args,
        })
    }
}
