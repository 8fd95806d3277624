//! ロックキー用の制限付き式言語。
//!
//! 対応する構文:
//! - 変数参照: `#accountId`
//! - プロパティ参照: `#order.customer.id`
//! - インデックス参照: `#items[0]`, `#attrs['region']`
//! - リテラル: `'text'`（`''` でエスケープ）, `"text"`, `42`, `1.5`, `true`, `false`, `null`
//! - 連結: `#tenant + ':' + #orderId`（両辺が数値なら加算）
//! - 括弧: `(#a + #b)`

use serde_json::{Number, Value};

use crate::error::KeyError;
use crate::params::CallParams;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hash,
    Ident(String),
    Str(String),
    Num(String),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Plus,
}

#[derive(Debug)]
struct Spanned {
    token: Token,
    position: usize,
}

#[derive(Debug)]
enum Expr {
    Var(String),
    Literal(Value),
    Property(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
}

fn syntax(position: usize, message: impl Into<String>) -> KeyError {
    KeyError::Syntax {
        position,
        message: message.into(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn tokenize(src: &str) -> Result<Vec<Spanned>, KeyError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (position, c) = chars[i];
        let single = match c {
            '#' => Some(Token::Hash),
            '.' => Some(Token::Dot),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push(Spanned { token, position });
            i += 1;
            continue;
        }

        if c.is_whitespace() {
            i += 1;
        } else if c == '\'' || c == '"' {
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(syntax(position, "文字列リテラルが閉じられていません")),
                    Some(&(_, ch)) if ch == c => {
                        if chars.get(i + 1).map(|&(_, next)| next) == Some(c) {
                            text.push(c);
                            i += 2;
                        } else {
                            i += 1;
                            break;
                        }
                    }
                    Some(&(_, ch)) => {
                        text.push(ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Spanned {
                token: Token::Str(text),
                position,
            });
        } else if c.is_ascii_digit() {
            let mut end = i;
            while end < chars.len() && chars[end].1.is_ascii_digit() {
                end += 1;
            }
            if end + 1 < chars.len() && chars[end].1 == '.' && chars[end + 1].1.is_ascii_digit() {
                end += 1;
                while end < chars.len() && chars[end].1.is_ascii_digit() {
                    end += 1;
                }
            }
            let text: String = chars[i..end].iter().map(|&(_, ch)| ch).collect();
            tokens.push(Spanned {
                token: Token::Num(text),
                position,
            });
            i = end;
        } else if is_ident_start(c) {
            let mut end = i;
            while end < chars.len() && is_ident_part(chars[end].1) {
                end += 1;
            }
            let text: String = chars[i..end].iter().map(|&(_, ch)| ch).collect();
            tokens.push(Spanned {
                token: Token::Ident(text),
                position,
            });
            i = end;
        } else {
            return Err(syntax(position, format!("予期しない文字です: '{c}'")));
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_ident(&mut self) -> Result<String, KeyError> {
        let position = self.position();
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(syntax(position, "識別子が必要です")),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), KeyError> {
        let position = self.position();
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            _ => Err(syntax(position, format!("'{what}' が必要です"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, KeyError> {
        let mut lhs = self.parse_postfix()?;
        while self.peek() == Some(&Token::Plus) {
            self.pos += 1;
            let rhs = self.parse_postfix()?;
            lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_postfix(&mut self) -> Result<Expr, KeyError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = self.expect_ident()?;
                    expr = Expr::Property(Box::new(expr), name);
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    self.expect(&Token::RBracket, "]")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, KeyError> {
        let position = self.position();
        match self.next() {
            Some(Token::Hash) => Ok(Expr::Var(self.expect_ident()?)),
            Some(Token::Str(text)) => Ok(Expr::Literal(Value::String(text))),
            Some(Token::Num(text)) => parse_number(&text)
                .map(Expr::Literal)
                .ok_or_else(|| syntax(position, format!("数値として解釈できません: {text}"))),
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ => Err(syntax(
                    position,
                    format!("変数参照には '#' が必要です: {word}"),
                )),
            },
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, ")")?;
                Ok(inner)
            }
            Some(_) => Err(syntax(position, "式が必要です")),
            None => Err(syntax(position, "式が途中で終わっています")),
        }
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if text.contains('.') {
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
    } else {
        text.parse::<i64>().ok().map(Value::from)
    }
}

fn parse(src: &str) -> Result<Expr, KeyError> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        pos: 0,
        end: src.len(),
    };
    let expr = parser.parse_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(syntax(parser.position(), "式の後に余分なトークンがあります"));
    }
    Ok(expr)
}

fn eval(expr: &Expr, params: &CallParams) -> Result<Value, KeyError> {
    match expr {
        Expr::Var(name) => params
            .get(name)
            .cloned()
            .ok_or_else(|| KeyError::UnknownVariable(name.clone())),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Property(target, name) => match eval(target, params)? {
            Value::Object(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| KeyError::MissingProperty(name.clone())),
            Value::Array(items) if name == "length" || name == "size" => Ok(Value::from(items.len())),
            Value::String(s) if name == "length" => Ok(Value::from(s.chars().count())),
            other => Err(KeyError::MissingProperty(format!("{name} (on {other})"))),
        },
        Expr::Index(target, index) => {
            let target = eval(target, params)?;
            let index = eval(index, params)?;
            match (target, &index) {
                (Value::Array(items), Value::Number(n)) => n
                    .as_u64()
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(|i| items.get(i).cloned())
                    .ok_or_else(|| KeyError::InvalidIndex(index.to_string())),
                (Value::Object(map), Value::String(k)) => map
                    .get(k)
                    .cloned()
                    .ok_or_else(|| KeyError::InvalidIndex(index.to_string())),
                _ => Err(KeyError::InvalidIndex(index.to_string())),
            }
        }
        Expr::Add(lhs, rhs) => add(eval(lhs, params)?, eval(rhs, params)?),
    }
}

fn add(lhs: Value, rhs: Value) -> Result<Value, KeyError> {
    match (&lhs, &rhs) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                return x
                    .checked_add(y)
                    .map(Value::from)
                    .ok_or_else(|| KeyError::TypeMismatch(format!("{x} + {y} はオーバーフローします")));
            }
            a.as_f64()
                .zip(b.as_f64())
                .and_then(|(x, y)| Number::from_f64(x + y))
                .map(Value::Number)
                .ok_or_else(|| KeyError::TypeMismatch(format!("{a} + {b}")))
        }
        (Value::String(_), _) | (_, Value::String(_)) => {
            Ok(Value::String(format!("{}{}", display(&lhs), display(&rhs))))
        }
        _ => Err(KeyError::TypeMismatch(format!("{lhs} + {rhs}"))),
    }
}

/// 評価結果をキー文字列にする。文字列はクォートなし、構造体は JSON 表現。
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// テンプレートを評価する。結果が null の場合は `Ok(None)`。
pub fn evaluate(template: &str, params: &CallParams) -> Result<Option<String>, KeyError> {
    let expr = parse(template)?;
    match eval(&expr, params)? {
        Value::Null => Ok(None),
        value => Ok(Some(display(&value))),
    }
}
