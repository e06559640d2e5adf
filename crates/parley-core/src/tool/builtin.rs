//! Built-in example tools.
//!
//! Small, dependency-free capabilities useful as deployment references and
//! as fixtures in tests: current time, arithmetic, and a canned
//! knowledge-base lookup. None of them are registered by default.

use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use parley_types::error::ToolError;

use super::Tool;

/// Reports the current date and time in UTC.
pub struct CurrentTimeTool;

impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Returns the current date and time in UTC. Use when the user asks \
         what time or what day it is."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    fn invoke(
        &self,
        _args: Value,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async { Ok(Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()) })
    }
}

/// Evaluates basic arithmetic expressions.
///
/// Uses a small recursive-descent parser rather than any form of dynamic
/// evaluation; supports `+ - * / %`, parentheses, and unary minus.
pub struct CalculatorTool;

#[derive(Deserialize)]
struct CalculatorArgs {
    expression: String,
}

impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluates a basic arithmetic expression, e.g. \"2 + 2\", \
         \"10 * (5 - 3)\", \"100 / 4\"."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Arithmetic expression to evaluate"
                }
            },
            "required": ["expression"]
        })
    }

    fn invoke(
        &self,
        args: Value,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let args: CalculatorArgs = serde_json::from_value(args)
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
            let result = eval_expression(&args.expression)
                .map_err(|e| ToolError::Execution(e.to_string()))?;
            Ok(format_number(result))
        })
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[derive(Debug, thiserror::Error)]
enum ParseError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected ')'")]
    UnbalancedParen,
    #[error("trailing input after expression")]
    TrailingInput,
    #[error("division by zero")]
    DivisionByZero,
}

/// Evaluate `expr` with standard precedence: `* / %` bind tighter than
/// `+ -`, parentheses group, unary minus allowed.
fn eval_expression(expr: &str) -> Result<f64, ParseError> {
    let mut parser = Parser {
        chars: expr.chars().collect(),
        pos: 0,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(ParseError::TrailingInput);
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<f64, ParseError> {
        let mut value = self.term()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some('-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, ParseError> {
        let mut value = self.factor()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Some('/') => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    if rhs == 0.0 {
                        return Err(ParseError::DivisionByZero);
                    }
                    value /= rhs;
                }
                Some('%') => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    if rhs == 0.0 {
                        return Err(ParseError::DivisionByZero);
                    }
                    value %= rhs;
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self) -> Result<f64, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some('(') => {
                self.pos += 1;
                let value = self.expr()?;
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err(ParseError::UnbalancedParen);
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(ParseError::UnexpectedChar(c)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn number(&mut self) -> Result<f64, ParseError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse()
            .map_err(|_| ParseError::UnexpectedChar(text.chars().next().unwrap_or(' ')))
    }
}

/// Looks up canned answers in a small static knowledge base.
///
/// Stands in for a real retrieval backend; entries cover products,
/// policies, and FAQ categories.
pub struct KnowledgeBaseTool;

#[derive(Deserialize)]
struct KnowledgeBaseArgs {
    query: String,
    #[serde(default)]
    category: Option<String>,
}

const KNOWLEDGE_BASE: &[(&str, &str, &str)] = &[
    (
        "products",
        "pricing",
        "Prices range from $50 to $500 depending on the product.",
    ),
    (
        "products",
        "shipping",
        "We ship nationwide within 10 business days.",
    ),
    (
        "products",
        "warranty",
        "Every product carries a 12-month warranty.",
    ),
    (
        "policies",
        "returns",
        "Returns are accepted up to 30 days after purchase.",
    ),
    (
        "policies",
        "refunds",
        "Refunds are processed within 5 business days.",
    ),
    (
        "faq",
        "hours",
        "Support is available Monday to Friday, 9am to 6pm.",
    ),
    (
        "faq",
        "contact",
        "You can reach support at support@example.com.",
    ),
];

impl Tool for KnowledgeBaseTool {
    fn name(&self) -> &str {
        "knowledge_lookup"
    }

    fn description(&self) -> &str {
        "Searches the knowledge base for product, policy, and FAQ \
         information. Optionally restrict the search to one category: \
         products, policies, or faq."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search term"
                },
                "category": {
                    "type": "string",
                    "enum": ["products", "policies", "faq"],
                    "description": "Optional category filter"
                }
            },
            "required": ["query"]
        })
    }

    fn invoke(
        &self,
        args: Value,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let args: KnowledgeBaseArgs = serde_json::from_value(args)
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
            let query = args.query.to_lowercase();

            let hits: Vec<String> = KNOWLEDGE_BASE
                .iter()
                .filter(|(category, _, _)| {
                    args.category
                        .as_deref()
                        .is_none_or(|wanted| wanted.eq_ignore_ascii_case(category))
                })
                .filter(|(_, key, text)| {
                    key.contains(&query) || text.to_lowercase().contains(&query)
                })
                .map(|(category, _, text)| format!("[{}] {text}", category.to_uppercase()))
                .collect();

            if hits.is_empty() {
                Ok(format!("No information found for: {}", args.query))
            } else {
                Ok(hits.join("\n"))
            }
        })
    }
}
