//! Rule conditions.
//!
//! A condition is a boolean expression over the numeric variables an event
//! exposes, for example `split > 5ms and counter >= 100`. Expressions are
//! parsed and type checked once, when the rule is built; evaluation only
//! fails when the event lacks a variable the expression reads.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or      := and (("||" | "or") and)*
//! and     := not (("&&" | "and") not)*
//! not     := ("!" | "not") not | compare
//! compare := sum (("<" | "<=" | "==" | "!=" | ">" | ">=" | "lt" | "le"
//!                  | "eq" | "ne" | "gt" | "ge") sum)?
//! sum     := term (("+" | "-") term)*
//! term    := unary (("*" | "/") unary)*
//! unary   := "-" unary | primary
//! primary := number [unit] | "true" | "false" | variable | "(" or ")"
//! unit    := "s" | "ms" | "us" | "ns"
//! ```
//!
//! Numbers with a unit are converted to nanoseconds. Input is
//! case-insensitive. All arithmetic is done in `f64`.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, EvalError};

/// A variable an event may expose to conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    /// Argument of a counter operation.
    Value,
    /// Duration of the split in nanoseconds.
    Split,
    Counter,
    Total,
    Min,
    Max,
    Active,
    MaxActive,
    Mean,
    Last,
}

impl Variable {
    pub const COUNT: usize = 10;

    pub const ALL: [Variable; Variable::COUNT] = [
        Variable::Value,
        Variable::Split,
        Variable::Counter,
        Variable::Total,
        Variable::Min,
        Variable::Max,
        Variable::Active,
        Variable::MaxActive,
        Variable::Mean,
        Variable::Last,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::Value => "value",
            Variable::Split => "split",
            Variable::Counter => "counter",
            Variable::Total => "total",
            Variable::Min => "min",
            Variable::Max => "max",
            Variable::Active => "active",
            Variable::MaxActive => "maxactive",
            Variable::Mean => "mean",
            Variable::Last => "last",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Variable {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variable::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variable bindings for one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    values: [Option<f64>; Variable::COUNT],
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, variable: Variable, value: f64) -> Self {
        self.set(variable, value);
        self
    }

    pub fn set(&mut self, variable: Variable, value: f64) {
        self.values[variable.index()] = Some(value);
    }

    pub fn get(&self, variable: Variable) -> Option<f64> {
        self.values[variable.index()]
    }

    /// True when the event exposes no variables at all.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// A boolean test over event variables.
pub trait Condition: Send + Sync + fmt::Debug {
    fn evaluate(&self, variables: &Variables) -> Result<bool, EvalError>;

    /// The text the condition was built from.
    fn source(&self) -> &str;
}

/// A parsed, type-checked condition expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidCondition {
            expression: source.to_string(),
            reason,
        };
        let tokens = tokenize(&source.to_lowercase()).map_err(invalid)?;
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.parse_or().map_err(invalid)?;
        if let Some(token) = parser.peek() {
            return Err(invalid(format!("unexpected '{}'", token)));
        }
        if root.ty() != Type::Bool {
            return Err(invalid("expression is not boolean".to_string()));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Variables the expression reads, in first-use order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut found = Vec::new();
        self.root.collect_variables(&mut found);
        found
    }
}

impl FromStr for Expression {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

impl Condition for Expression {
    fn evaluate(&self, variables: &Variables) -> Result<bool, EvalError> {
        self.root.boolean(variables)
    }

    fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Type {
    Number,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compare {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Bool(bool),
    Var(Variable),
    Neg(Box<Node>),
    Not(Box<Node>),
    Arith(Arith, Box<Node>, Box<Node>),
    Compare(Compare, Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

impl Node {
    fn ty(&self) -> Type {
        match self {
            Node::Number(_) | Node::Var(_) | Node::Neg(_) | Node::Arith(..) => Type::Number,
            Node::Bool(_) | Node::Not(_) | Node::Compare(..) | Node::And(..) | Node::Or(..) => {
                Type::Bool
            }
        }
    }

    fn collect_variables(&self, found: &mut Vec<Variable>) {
        match self {
            Node::Var(v) => {
                if !found.contains(v) {
                    found.push(*v);
                }
            }
            Node::Number(_) | Node::Bool(_) => {}
            Node::Neg(inner) | Node::Not(inner) => inner.collect_variables(found),
            Node::Arith(_, l, r) | Node::Compare(_, l, r) | Node::And(l, r) | Node::Or(l, r) => {
                l.collect_variables(found);
                r.collect_variables(found);
            }
        }
    }

    fn number(&self, vars: &Variables) -> Result<f64, EvalError> {
        match self {
            Node::Number(n) => Ok(*n),
            Node::Var(v) => vars.get(*v).ok_or(EvalError::MissingVariable(v.as_str())),
            Node::Neg(inner) => Ok(-inner.number(vars)?),
            Node::Arith(op, l, r) => {
                let (l, r) = (l.number(vars)?, r.number(vars)?);
                Ok(match op {
                    Arith::Add => l + r,
                    Arith::Sub => l - r,
                    Arith::Mul => l * r,
                    Arith::Div => l / r,
                })
            }
            other => Ok(if other.boolean(vars)? { 1.0 } else { 0.0 }),
        }
    }

    fn boolean(&self, vars: &Variables) -> Result<bool, EvalError> {
        match self {
            Node::Bool(b) => Ok(*b),
            Node::Not(inner) => Ok(!inner.boolean(vars)?),
            Node::And(l, r) => Ok(l.boolean(vars)? && r.boolean(vars)?),
            Node::Or(l, r) => Ok(l.boolean(vars)? || r.boolean(vars)?),
            Node::Compare(op, l, r) if l.ty() == Type::Bool => {
                let (l, r) = (l.boolean(vars)?, r.boolean(vars)?);
                Ok(match op {
                    Compare::Eq => l == r,
                    _ => l != r,
                })
            }
            Node::Compare(op, l, r) => {
                let (l, r) = (l.number(vars)?, r.number(vars)?);
                Ok(match op {
                    Compare::Lt => l < r,
                    Compare::Le => l <= r,
                    Compare::Eq => l == r,
                    Compare::Ne => l != r,
                    Compare::Gt => l > r,
                    Compare::Ge => l >= r,
                })
            }
            other => Ok(other.number(vars)? != 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Word(String),
    Symbol(&'static str),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Word(w) => f.write_str(w),
            Token::Symbol(s) => f.write_str(s),
        }
    }
}

const SYMBOLS: [&str; 16] = [
    "<=", ">=", "==", "!=", "&&", "||", "<", ">", "!", "+", "-", "*", "/", "(", ")", "=",
];

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = &rest[c.len_utf8()..];
        } else if c.is_ascii_digit() || c == '.' {
            let end = rest
                .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
                .unwrap_or(rest.len());
            let value: f64 = rest[..end]
                .parse()
                .map_err(|_| format!("bad number '{}'", &rest[..end]))?;
            rest = &rest[end..];
            let unit_end = rest
                .find(|ch: char| !ch.is_ascii_alphabetic())
                .unwrap_or(rest.len());
            let scale = match &rest[..unit_end] {
                "" | "ns" => 1.0,
                "us" => 1_000.0,
                "ms" => 1_000_000.0,
                "s" => 1_000_000_000.0,
                unit => return Err(format!("unknown unit '{}'", unit)),
            };
            rest = &rest[unit_end..];
            tokens.push(Token::Number(value * scale));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let end = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                .unwrap_or(rest.len());
            tokens.push(Token::Word(rest[..end].to_string()));
            rest = &rest[end..];
        } else {
            let symbol = SYMBOLS
                .iter()
                .find(|s| rest.starts_with(**s))
                .ok_or_else(|| format!("unexpected character '{}'", c))?;
            if *symbol == "=" {
                return Err("use '==' for equality".to_string());
            }
            tokens.push(Token::Symbol(symbol));
            rest = &rest[symbol.len()..];
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

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// Consumes the next token if it is one of `symbols` or `words`.
    fn accept(&mut self, symbols: &[&str], words: &[&str]) -> Option<usize> {
        let found = match self.peek()? {
            Token::Symbol(s) => symbols.iter().position(|x| x == s),
            Token::Word(w) => words.iter().position(|x| *x == w.as_str()),
            Token::Number(_) => None,
        };
        if found.is_some() {
            self.pos += 1;
        }
        found
    }

    fn parse_or(&mut self) -> Result<Node, String> {
        let mut left = self.parse_and()?;
        while self.accept(&["||"], &["or"]).is_some() {
            let right = self.parse_and()?;
            left = Node::Or(Box::new(expect_bool(left, "or")?), Box::new(expect_bool(right, "or")?));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, String> {
        let mut left = self.parse_not()?;
        while self.accept(&["&&"], &["and"]).is_some() {
            let right = self.parse_not()?;
            left = Node::And(
                Box::new(expect_bool(left, "and")?),
                Box::new(expect_bool(right, "and")?),
            );
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Node, String> {
        if self.accept(&["!"], &["not"]).is_some() {
            let inner = self.parse_not()?;
            return Ok(Node::Not(Box::new(expect_bool(inner, "not")?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Node, String> {
        const OPS: [Compare; 6] = [
            Compare::Lt,
            Compare::Le,
            Compare::Eq,
            Compare::Ne,
            Compare::Gt,
            Compare::Ge,
        ];
        let left = self.parse_sum()?;
        let Some(index) = self.accept(
            &["<", "<=", "==", "!=", ">", ">="],
            &["lt", "le", "eq", "ne", "gt", "ge"],
        ) else {
            return Ok(left);
        };
        let op = OPS[index];
        let right = self.parse_sum()?;
        match (left.ty(), right.ty()) {
            (Type::Number, Type::Number) => {}
            (Type::Bool, Type::Bool) if matches!(op, Compare::Eq | Compare::Ne) => {}
            _ => return Err("comparison between incompatible operands".to_string()),
        }
        Ok(Node::Compare(op, Box::new(left), Box::new(right)))
    }

    fn parse_sum(&mut self) -> Result<Node, String> {
        let mut left = self.parse_term()?;
        while let Some(index) = self.accept(&["+", "-"], &[]) {
            let op = if index == 0 { Arith::Add } else { Arith::Sub };
            let right = self.parse_term()?;
            left = arith(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Node, String> {
        let mut left = self.parse_unary()?;
        while let Some(index) = self.accept(&["*", "/"], &[]) {
            let op = if index == 0 { Arith::Mul } else { Arith::Div };
            let right = self.parse_unary()?;
            left = arith(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, String> {
        if self.accept(&["-"], &[]).is_some() {
            let inner = self.parse_unary()?;
            if inner.ty() != Type::Number {
                return Err("'-' needs a number".to_string());
            }
            return Ok(Node::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node, String> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Node::Number(n)),
            Some(Token::Word(word)) => match word.as_str() {
                "true" => Ok(Node::Bool(true)),
                "false" => Ok(Node::Bool(false)),
                name => name
                    .parse::<Variable>()
                    .map(Node::Var)
                    .map_err(|_| format!("unknown variable '{}'", name)),
            },
            Some(Token::Symbol("(")) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::Symbol(")")) => Ok(inner),
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected '{}'", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn expect_bool(node: Node, op: &str) -> Result<Node, String> {
    if node.ty() == Type::Bool {
        Ok(node)
    } else {
        Err(format!("'{}' needs boolean operands", op))
    }
}

fn arith(op: Arith, left: Node, right: Node) -> Result<Node, String> {
    if left.ty() != Type::Number || right.ty() != Type::Number {
        return Err("arithmetic needs numeric operands".to_string());
    }
    Ok(Node::Arith(op, Box::new(left), Box::new(right)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str, vars: &Variables) -> bool {
        Expression::parse(source).unwrap().evaluate(vars).unwrap()
    }

    #[test]
    fn units_convert_to_nanoseconds() {
        let vars = Variables::new().with(Variable::Split, 6_000_000.0);
        assert!(eval("split > 5ms", &vars));
        assert!(eval("split < 1s", &vars));
        assert!(eval("split == 6000us", &vars));
        assert!(eval("split >= 6000000ns", &vars));
        assert!(!eval("split gt 0.01s", &vars));
    }

    #[test]
    fn word_operators_and_precedence() {
        let vars = Variables::new()
            .with(Variable::Counter, 10.0)
            .with(Variable::Max, 3.0);
        assert!(eval("counter ge 10 and max lt 5", &vars));
        assert!(eval("counter > 100 || max == 3", &vars));
        assert!(eval("not counter > 100", &vars));
        assert!(eval("!(counter > 1 && max > 5)", &vars));
        assert!(eval("counter - 2 * max == 4", &vars));
        assert!(eval("(counter - 2) * max == 24", &vars));
        assert!(eval("-max + 13 eq counter", &vars));
    }

    #[test]
    fn input_is_case_insensitive() {
        let vars = Variables::new().with(Variable::MaxActive, 4.0);
        assert!(eval("MaxActive GE 4 AND TRUE", &vars));
    }

    #[test]
    fn boolean_equality_is_allowed() {
        assert!(eval("(1 < 2) == true", &Variables::new()));
        assert!(eval("false != true", &Variables::new()));
    }

    #[test]
    fn rejects_bad_expressions() {
        for source in [
            "split >",
            "split > 5 ms extra",
            "frobs > 1",
            "split + 1",
            "split > 5xs",
            "true + 1",
            "(split > 1",
            "split = 1",
            "split < true",
            "split and true",
            "",
        ] {
            let err = Expression::parse(source).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidCondition { .. }),
                "{source}: {err}"
            );
        }
    }

    #[test]
    fn missing_variable_is_an_eval_error() {
        let expr = Expression::parse("value > 1").unwrap();
        let vars = Variables::new().with(Variable::Split, 1.0);
        assert_eq!(
            expr.evaluate(&vars),
            Err(EvalError::MissingVariable("value"))
        );
    }

    #[test]
    fn reports_variables_and_source() {
        let expr = Expression::parse("split > 1ms and (split < mean or counter > 3)").unwrap();
        assert_eq!(
            expr.variables(),
            vec![Variable::Split, Variable::Mean, Variable::Counter]
        );
        assert_eq!(expr.source(), "split > 1ms and (split < mean or counter > 3)");
    }

    #[test]
    fn variables_report_emptiness() {
        assert!(Variables::new().is_empty());
        assert!(!Variables::new().with(Variable::Last, 0.0).is_empty());
    }
}
