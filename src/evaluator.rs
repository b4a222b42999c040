//! Integer expression evaluator.
//!
//! Precedence, tightest first: parentheses and unary minus, `* / %`,
//! `+ -`, then every comparison and `&&`/`||` on one shared tier,
//! applied left to right. Both sides of `&&` and `||` are always
//! evaluated. Booleans come out as 0 or 1.

use crate::error::ErrorKind;
use crate::lexer::{tokenize, Token};

/// Evaluate a normalized expression.
pub fn evaluate(source: &str) -> Result<i64, ErrorKind> {
    let mut evaluator = Evaluator::new(source)?;
    let result = evaluator.compare()?;
    match evaluator.peek() {
        None => Ok(result),
        Some(token) => Err(ErrorKind::Syntax(format!("unexpected {}", token))),
    }
}

struct Evaluator {
    tokens: Vec<Token>,
    pos: usize,
}

impl Evaluator {
    fn new(source: &str) -> Result<Self, ErrorKind> {
        let tokens = tokenize(source)
            .map_err(|bad| ErrorKind::Syntax(format!("unexpected character '{}'", bad)))?
            .into_iter()
            .map(|spanned| spanned.token)
            .collect::<Vec<_>>();
        if tokens.is_empty() {
            return Err(ErrorKind::InvalidValue("empty expression".to_string()));
        }
        Ok(Evaluator { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ErrorKind> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(ErrorKind::Syntax(format!("expected {}, found {}", expected, t))),
            None => Err(ErrorKind::Syntax(format!("expected {}, found end of input", expected))),
        }
    }

    fn compare(&mut self) -> Result<i64, ErrorKind> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(
                    t @ (Token::Equal
                    | Token::NotEqual
                    | Token::Less
                    | Token::Greater
                    | Token::LessEqual
                    | Token::GreaterEqual
                    | Token::And
                    | Token::Or),
                ) => t.clone(),
                _ => break,
            };
            self.advance();
            let right = self.additive()?;
            let holds = match op {
                Token::Equal => left == right,
                Token::NotEqual => left != right,
                Token::Less => left < right,
                Token::Greater => left > right,
                Token::LessEqual => left <= right,
                Token::GreaterEqual => left >= right,
                Token::And => left != 0 && right != 0,
                _ => left != 0 || right != 0,
            };
            left = holds as i64;
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<i64, ErrorKind> {
        let mut left = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    let right = self.term()?;
                    left = left.checked_add(right).ok_or_else(overflow)?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    let right = self.term()?;
                    left = left.checked_sub(right).ok_or_else(overflow)?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<i64, ErrorKind> {
        let mut left = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    let right = self.unary()?;
                    left = left.checked_mul(right).ok_or_else(overflow)?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    let right = self.unary()?;
                    if right == 0 {
                        return Err(ErrorKind::DivisionByZero);
                    }
                    left = left.checked_div(right).ok_or_else(overflow)?;
                }
                Some(Token::Percent) => {
                    self.advance();
                    let right = self.unary()?;
                    if right == 0 {
                        return Err(ErrorKind::DivisionByZero);
                    }
                    left = left.checked_rem(right).ok_or_else(overflow)?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<i64, ErrorKind> {
        if self.peek() == Some(&Token::Minus) {
            self.advance();
            let operand = self.unary()?;
            return operand.checked_neg().ok_or_else(overflow);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<i64, ErrorKind> {
        match self.advance() {
            Some(Token::IntLiteral(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.compare()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            // Anything still spelled as a name was not resolved by the normalizer.
            Some(Token::Identifier(name)) => Err(ErrorKind::UndeclaredVariable(name)),
            Some(t) => Err(ErrorKind::Syntax(format!("unexpected {}", t))),
            None => Err(ErrorKind::Syntax("unexpected end of input".to_string())),
        }
    }
}

fn overflow() -> ErrorKind {
    ErrorKind::InvalidValue("integer overflow".to_string())
}
