//! Composite rule expression parser

use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct ExprParser;

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Unexpected token: {0}")]
    Unexpected(String),
}

/// A parsed combinator over named rules
///
/// `&` binds tighter than `|`, so `a & b | c` reads as `(a & b) | c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleExpr {
    Ref(String),
    All(Vec<RuleExpr>),
    Any(Vec<RuleExpr>),
}

/// Parse a composite rule expression
pub fn parse_expr(input: &str) -> Result<RuleExpr, ExprError> {
    let pairs = ExprParser::parse(Rule::expression, input)
        .map_err(|e| ExprError::ParseError(e.to_string()))?;

    for pair in pairs {
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::or_expr {
                return build(inner);
            }
        }
    }

    Err(ExprError::ParseError("empty expression".to_string()))
}

fn build(pair: pest::iterators::Pair<Rule>) -> Result<RuleExpr, ExprError> {
    match pair.as_rule() {
        Rule::ident => Ok(RuleExpr::Ref(pair.as_str().to_string())),
        Rule::or_expr => combine(pair, RuleExpr::Any),
        Rule::and_expr => combine(pair, RuleExpr::All),
        _ => Err(ExprError::Unexpected(pair.as_str().to_string())),
    }
}

fn combine(
    pair: pest::iterators::Pair<Rule>,
    wrap: fn(Vec<RuleExpr>) -> RuleExpr,
) -> Result<RuleExpr, ExprError> {
    let mut operands = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::kw_and | Rule::kw_or => {}
            _ => operands.push(build(inner)?),
        }
    }

    match operands.len() {
        0 => Err(ExprError::ParseError("missing operand".to_string())),
        1 => Ok(operands.remove(0)),
        _ => Ok(wrap(operands)),
    }
}
