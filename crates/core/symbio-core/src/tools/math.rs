//! Symbolic math tool: expression evaluation and equation solving

use super::{Tool, ToolOutcome};
use crate::{Result, SymbioError};
use async_trait::async_trait;
use std::time::Instant;

/// Tolerance used when classifying fitted coefficients
const COEFF_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Variable,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => {
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' | '−' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
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
            'x' | 'X' | 'y' | 'Y' => {
                tokens.push(Token::Variable);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| SymbioError::tool(format!("Bad number literal: {}", literal)))?;
                tokens.push(Token::Number(value));
            }
            other => {
                return Err(SymbioError::tool(format!(
                    "Unexpected character in expression: '{}'",
                    other
                )));
            }
        }
    }

    // Insert implicit multiplication: 2x, 2(x+1), x(…), (a)(b)
    let mut expanded = Vec::with_capacity(tokens.len());
    for (idx, token) in tokens.iter().enumerate() {
        if idx > 0 {
            let prev = &tokens[idx - 1];
            let left_value = matches!(
                prev,
                Token::Number(_) | Token::Variable | Token::RParen
            );
            let right_value = matches!(token, Token::Variable | Token::LParen | Token::Number(_));
            if left_value && right_value {
                expanded.push(Token::Star);
            }
        }
        expanded.push(*token);
    }

    Ok(expanded)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    x: f64,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], x: f64) -> Self {
        Self { tokens, pos: 0, x }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.advance();
                    value += self.term()?;
                }
                Token::Minus => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.advance();
                    value *= self.factor()?;
                }
                Token::Slash => {
                    self.advance();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(SymbioError::tool("Division by zero"));
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64> {
        let base = self.unary()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            let exponent = self.factor()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            return Ok(-self.unary()?);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<f64> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Variable) => Ok(self.x),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(SymbioError::tool("Unbalanced parentheses")),
                }
            }
            other => Err(SymbioError::tool(format!(
                "Unexpected token in expression: {:?}",
                other
            ))),
        }
    }
}

fn evaluate_at(expression: &str, x: f64) -> Result<f64> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(SymbioError::tool("Empty expression"));
    }
    let mut parser = Parser::new(&tokens, x);
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(SymbioError::tool("Trailing input after expression"));
    }
    Ok(value)
}

fn format_number(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        let formatted = format!("{:.6}", value);
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Solve `lhs = rhs` in one variable, assuming a polynomial of degree <= 2
///
/// The difference `lhs - rhs` is sampled at four points and fitted to a
/// quadratic; a fourth sample guards against higher-degree input.
fn solve_equation(lhs: &str, rhs: &str) -> Result<String> {
    let f = |t: f64| -> Result<f64> { Ok(evaluate_at(lhs, t)? - evaluate_at(rhs, t)?) };

    let f0 = f(0.0)?;
    let f1 = f(1.0)?;
    let f2 = f(2.0)?;
    let f3 = f(3.0)?;

    let c = f0;
    let a = (f2 - 2.0 * f1 + f0) / 2.0;
    let b = f1 - f0 - a;

    let predicted_f3 = a * 9.0 + b * 3.0 + c;
    if (predicted_f3 - f3).abs() > 1e-6 * (1.0 + f3.abs()) {
        return Err(SymbioError::tool(
            "Equation is not polynomial of degree <= 2",
        ));
    }

    if a.abs() < COEFF_EPS {
        if b.abs() < COEFF_EPS {
            return Err(SymbioError::tool("Equation has no unique solution"));
        }
        return Ok(format_number(-c / b));
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return Err(SymbioError::tool("Equation has no real roots"));
    }

    let sqrt_d = discriminant.sqrt();
    let mut roots = [(-b - sqrt_d) / (2.0 * a), (-b + sqrt_d) / (2.0 * a)];
    roots.sort_by(|p, q| p.partial_cmp(q).unwrap_or(std::cmp::Ordering::Equal));

    if (roots[0] - roots[1]).abs() < 1e-9 {
        Ok(format_number(roots[0]))
    } else {
        Ok(format!(
            "{}, {}",
            format_number(roots[0]),
            format_number(roots[1])
        ))
    }
}

/// The built-in math tool
///
/// Input is either an arithmetic expression to evaluate or an equation in
/// one variable to solve. No side effects and never blocked.
pub struct MathTool;

impl MathTool {
    /// Create the tool
    pub fn new() -> Self {
        Self
    }

    fn run(input: &str) -> Result<String> {
        let input = input.trim();
        if let Some((lhs, rhs)) = input.split_once('=') {
            solve_equation(lhs, rhs)
        } else {
            let value = evaluate_at(input, f64::NAN)?;
            if value.is_nan() {
                return Err(SymbioError::tool(
                    "Expression contains an unbound variable; provide an equation",
                ));
            }
            Ok(format_number(value))
        }
    }
}

impl Default for MathTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for MathTool {
    fn name(&self) -> &str {
        "math"
    }

    fn description(&self) -> &str {
        "Symbolic simplification and equation solving"
    }

    async fn execute(&self, input: &str) -> ToolOutcome {
        let start = Instant::now();
        let mut outcome = match Self::run(input) {
            Ok(result) => ToolOutcome::ok(result),
            Err(e) => ToolOutcome::error(e.to_string()),
        };
        outcome.stdout = outcome.result.clone();
        outcome.elapsed_ms = start.elapsed().as_millis() as u64;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolStatus;

    #[tokio::test]
    async fn test_evaluates_arithmetic() {
        let tool = MathTool::new();
        let outcome = tool.execute("2 * (3 + 4)").await;
        assert_eq!(outcome.status, ToolStatus::Ok);
        assert_eq!(outcome.result, "14");
    }

    #[tokio::test]
    async fn test_solves_linear_equation() {
        let tool = MathTool::new();
        let outcome = tool.execute("2x + 3 = 11").await;
        assert_eq!(outcome.status, ToolStatus::Ok);
        assert_eq!(outcome.result, "4");
    }

    #[tokio::test]
    async fn test_solves_quadratic_with_two_roots() {
        let tool = MathTool::new();
        // (x - 2)(x + 3) = x^2 + x - 6
        let outcome = tool.execute("x^2 + x - 6 = 0").await;
        assert_eq!(outcome.status, ToolStatus::Ok);
        assert_eq!(outcome.result, "-3, 2");
    }

    #[tokio::test]
    async fn test_double_root_collapses() {
        let tool = MathTool::new();
        let outcome = tool.execute("x^2 - 2x + 1 = 0").await;
        assert_eq!(outcome.result, "1");
    }

    #[tokio::test]
    async fn test_degenerate_equation_is_error() {
        let tool = MathTool::new();
        let outcome = tool.execute("0x = 0").await;
        assert_eq!(outcome.status, ToolStatus::Error);
    }

    #[tokio::test]
    async fn test_rejects_cubic() {
        let tool = MathTool::new();
        let outcome = tool.execute("x^3 = 8").await;
        assert_eq!(outcome.status, ToolStatus::Error);
    }

    #[tokio::test]
    async fn test_bad_input_is_error_not_panic() {
        let tool = MathTool::new();
        for input in ["", "hello world?", "((1 + 2)", "1 / 0"] {
            let outcome = tool.execute(input).await;
            assert_eq!(outcome.status, ToolStatus::Error, "input: {:?}", input);
        }
    }

    #[test]
    fn test_format_number_trims() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(1.0 / 3.0), "0.333333");
    }

    #[test]
    fn test_implicit_multiplication() {
        assert_eq!(evaluate_at("2(3 + 1)", 0.0).unwrap(), 8.0);
        assert_eq!(evaluate_at("3x", 2.0).unwrap(), 6.0);
    }
}
