//! Expression language embedded in templates
//!
//! A small PHP-flavoured language: `$variables`, `->` property access,
//! `[...]` indexing, literals, array literals, arithmetic, concatenation with
//! `.`, comparisons, logical operators, `??`, ternaries and calls to built-in
//! functions. Expressions are parsed at compile time and stored in the
//! compiled template; evaluation happens in the renderer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::functions;

/// How deeply an expression tree may nest
pub const MAX_NESTING_DEPTH: usize = 128;

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Operator as written in source
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => ".",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Identical => "===",
            BinaryOp::NotIdentical => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Expression syntax tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal value
    Literal(Value),
    /// `$name`
    Variable(String),
    /// `[a, 'k' => b]`
    Array(Vec<(Option<Expr>, Expr)>),
    /// `target->name`
    Property(Box<Expr>, String),
    /// `target[index]`
    Index(Box<Expr>, Box<Expr>),
    /// Unary operation
    Unary(UnaryOp, Box<Expr>),
    /// Binary operation
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `left ?? right`
    Coalesce(Box<Expr>, Box<Expr>),
    /// `cond ? then : otherwise`, or `cond ?: otherwise` when `then` is absent
    Ternary {
        condition: Box<Expr>,
        then: Option<Box<Expr>>,
        otherwise: Box<Expr>,
    },
    /// Built-in function call
    Call(String, Vec<Expr>),
}

impl Expr {
    /// String literal content, if this is one
    pub fn as_str_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// Target of a `@foreach`: `$items as $item` or `$items as $key => $item`
#[derive(Debug, Clone, PartialEq)]
pub struct LoopHeader {
    /// Iterated expression
    pub iterable: Expr,
    /// Key variable name, without `$`
    pub key: Option<String>,
    /// Value variable name, without `$`
    pub value: String,
}

/// Parse a single expression
pub fn parse(source: &str) -> Result<Expr, String> {
    let mut parser = Parser::new(source)?;
    let expr = parser.parse_expr()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a `@foreach` header
pub fn parse_loop_header(source: &str) -> Result<LoopHeader, String> {
    let mut parser = Parser::new(source)?;
    let iterable = parser.parse_expr()?;
    match parser.next() {
        Some(Tok::Ident(word)) if word.eq_ignore_ascii_case("as") => {}
        _ => return Err("expected `as` after the iterated expression".to_string()),
    }
    let first = parser.expect_variable()?;
    let header = if parser.eat(&Tok::FatArrow) {
        LoopHeader {
            iterable,
            key: Some(first),
            value: parser.expect_variable()?,
        }
    } else {
        LoopHeader {
            iterable,
            key: None,
            value: first,
        }
    };
    parser.expect_end()?;
    Ok(header)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Var(String),
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Arrow,
    FatArrow,
    Question,
    Colon,
    Coalesce,
    Not,
    AndAnd,
    OrOr,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Dot,
}

fn tokenize(source: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let next2 = chars.get(i + 2).copied();

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '$' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && is_ident_char(chars[end], end == start) {
                end += 1;
            }
            if end == start {
                return Err("expected a variable name after `$`".to_string());
            }
            tokens.push(Tok::Var(chars[start..end].iter().collect()));
            i = end;
            continue;
        }

        if is_ident_char(c, true) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i], i == start) {
                i += 1;
            }
            tokens.push(Tok::Ident(chars[start..i].iter().collect()));
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let is_float = i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit();
            if is_float {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|e| format!("invalid number {text}: {e}"))?;
                tokens.push(Tok::Float(value));
            } else {
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|e| format!("invalid number {text}: {e}"))?;
                tokens.push(Tok::Int(value));
            }
            continue;
        }

        if c == '\'' || c == '"' {
            let (literal, end) = read_string(&chars, i)?;
            tokens.push(Tok::Str(literal));
            i = end;
            continue;
        }

        let (tok, width) = match (c, next, next2) {
            ('=', Some('='), Some('=')) => (Tok::Identical, 3),
            ('!', Some('='), Some('=')) => (Tok::NotIdentical, 3),
            ('=', Some('='), _) => (Tok::Eq, 2),
            ('=', Some('>'), _) => (Tok::FatArrow, 2),
            ('!', Some('='), _) => (Tok::NotEq, 2),
            ('<', Some('>'), _) => (Tok::NotEq, 2),
            ('<', Some('='), _) => (Tok::Le, 2),
            ('>', Some('='), _) => (Tok::Ge, 2),
            ('-', Some('>'), _) => (Tok::Arrow, 2),
            ('&', Some('&'), _) => (Tok::AndAnd, 2),
            ('|', Some('|'), _) => (Tok::OrOr, 2),
            ('?', Some('?'), _) => (Tok::Coalesce, 2),
            ('(', _, _) => (Tok::LParen, 1),
            (')', _, _) => (Tok::RParen, 1),
            ('[', _, _) => (Tok::LBracket, 1),
            (']', _, _) => (Tok::RBracket, 1),
            (',', _, _) => (Tok::Comma, 1),
            ('?', _, _) => (Tok::Question, 1),
            (':', _, _) => (Tok::Colon, 1),
            ('!', _, _) => (Tok::Not, 1),
            ('<', _, _) => (Tok::Lt, 1),
            ('>', _, _) => (Tok::Gt, 1),
            ('+', _, _) => (Tok::Plus, 1),
            ('-', _, _) => (Tok::Minus, 1),
            ('*', _, _) => (Tok::Star, 1),
            ('/', _, _) => (Tok::Slash, 1),
            ('%', _, _) => (Tok::Percent, 1),
            ('.', _, _) => (Tok::Dot, 1),
            _ => return Err(format!("unexpected character `{c}`")),
        };
        tokens.push(tok);
        i += width;
    }

    Ok(tokens)
}

fn is_ident_char(c: char, first: bool) -> bool {
    c == '_' || c.is_alphabetic() || (!first && c.is_ascii_digit())
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut literal = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return Ok((literal, i + 1));
        }
        if c == '\\' && i + 1 < chars.len() {
            let escaped = chars[i + 1];
            match (quote, escaped) {
                (_, '\\') => literal.push('\\'),
                (q, e) if q == e => literal.push(e),
                ('"', 'n') => literal.push('\n'),
                ('"', 't') => literal.push('\t'),
                ('"', 'r') => literal.push('\r'),
                ('"', '$') => literal.push('$'),
                (_, other) => {
                    literal.push('\\');
                    literal.push(other);
                }
            }
            i += 2;
            continue;
        }
        literal.push(c);
        i += 1;
    }

    Err("unterminated string literal".to_string())
}

struct Parser {
    tokens: Vec<Tok>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self, String> {
        Ok(Self {
            tokens: tokenize(source)?,
            position: 0,
            depth: 0,
        })
    }

    /// Enter one more level of the tree being built
    fn nest(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(format!("expression nested more than {MAX_NESTING_DEPTH} levels deep"));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.position + offset)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.position).cloned();
        if tok.is_some() {
            self.position += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Tok) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Tok::Ident(word)) if word.eq_ignore_ascii_case(keyword) => {
                self.position += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, expected: Tok, what: &str) -> Result<(), String> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(format!("expected {what}"))
        }
    }

    fn expect_end(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(format!("unexpected {}", describe(tok))),
        }
    }

    fn expect_variable(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Tok::Var(name)) => Ok(name),
            _ => Err("expected a $variable".to_string()),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, String> {
        let depth = self.depth;
        self.nest()?;
        let expr = self.parse_keyword_or()?;
        self.depth = depth;
        Ok(expr)
    }

    fn parse_keyword_or(&mut self) -> Result<Expr, String> {
        let depth = self.depth;
        let mut left = self.parse_keyword_and()?;
        while self.eat_keyword("or") {
            self.nest()?;
            let right = self.parse_keyword_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_keyword_and(&mut self) -> Result<Expr, String> {
        let depth = self.depth;
        let mut left = self.parse_ternary()?;
        while self.eat_keyword("and") {
            self.nest()?;
            let right = self.parse_ternary()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_ternary(&mut self) -> Result<Expr, String> {
        let condition = self.parse_coalesce()?;
        if !self.eat(&Tok::Question) {
            return Ok(condition);
        }
        let depth = self.depth;
        self.nest()?;
        let then = if self.peek() == Some(&Tok::Colon) {
            None
        } else {
            Some(Box::new(self.parse_ternary()?))
        };
        self.expect(Tok::Colon, "`:` in ternary expression")?;
        let otherwise = self.parse_ternary()?;
        self.depth = depth;
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then,
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_coalesce(&mut self) -> Result<Expr, String> {
        let left = self.parse_or()?;
        if self.eat(&Tok::Coalesce) {
            let depth = self.depth;
            self.nest()?;
            let right = self.parse_coalesce()?;
            self.depth = depth;
            return Ok(Expr::Coalesce(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let depth = self.depth;
        let mut left = self.parse_and()?;
        while self.eat(&Tok::OrOr) {
            self.nest()?;
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let depth = self.depth;
        let mut left = self.parse_equality()?;
        while self.eat(&Tok::AndAnd) {
            self.nest()?;
            let right = self.parse_equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        let depth = self.depth;
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Eq) => BinaryOp::Eq,
                Some(Tok::NotEq) => BinaryOp::NotEq,
                Some(Tok::Identical) => BinaryOp::Identical,
                Some(Tok::NotIdentical) => BinaryOp::NotIdentical,
                _ => break,
            };
            self.position += 1;
            self.nest()?;
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let depth = self.depth;
        let mut left = self.parse_concat()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Lt) => BinaryOp::Lt,
                Some(Tok::Le) => BinaryOp::Le,
                Some(Tok::Gt) => BinaryOp::Gt,
                Some(Tok::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.position += 1;
            self.nest()?;
            let right = self.parse_concat()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_concat(&mut self) -> Result<Expr, String> {
        let depth = self.depth;
        let mut left = self.parse_additive()?;
        while self.eat(&Tok::Dot) {
            self.nest()?;
            let right = self.parse_additive()?;
            left = Expr::Binary(BinaryOp::Concat, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let depth = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinaryOp::Add,
                Some(Tok::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.position += 1;
            self.nest()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinaryOp::Mul,
                Some(Tok::Slash) => BinaryOp::Div,
                Some(Tok::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.position += 1;
            self.nest()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        let op = if self.eat(&Tok::Not) {
            UnaryOp::Not
        } else if self.eat(&Tok::Minus) {
            UnaryOp::Neg
        } else {
            return self.parse_postfix();
        };
        let depth = self.depth;
        self.nest()?;
        let operand = self.parse_unary()?;
        self.depth = depth;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            if matches!(self.peek(), Some(Tok::Arrow | Tok::LBracket)) {
                self.nest()?;
            }
            if self.eat(&Tok::Arrow) {
                match self.next() {
                    Some(Tok::Ident(name)) => expr = Expr::Property(Box::new(expr), name),
                    _ => return Err("expected a property name after `->`".to_string()),
                }
            } else if self.eat(&Tok::LBracket) {
                let index = self.parse_expr()?;
                self.expect(Tok::RBracket, "`]`")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                self.depth = depth;
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Tok::Var(name)) => Ok(Expr::Variable(name)),
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Tok::Int(i)) => Ok(Expr::Literal(Value::from(i))),
            Some(Tok::Float(f)) => Ok(Expr::Literal(Value::from(f))),
            Some(Tok::LParen) => {
                let expr = self.parse_expr()?;
                self.expect(Tok::RParen, "`)`")?;
                Ok(expr)
            }
            Some(Tok::LBracket) => self.parse_array(),
            Some(Tok::Ident(word)) => self.parse_word(word),
            Some(tok) => Err(format!("unexpected {}", describe(&tok))),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_word(&mut self, word: String) -> Result<Expr, String> {
        if self.peek() == Some(&Tok::LParen) {
            self.position += 1;
            let name = word.to_ascii_lowercase();
            if !functions::is_builtin(&name) {
                return Err(format!("call to undefined function {word}()"));
            }
            let mut args = Vec::new();
            if !self.eat(&Tok::RParen) {
                loop {
                    args.push(self.parse_expr()?);
                    if self.eat(&Tok::RParen) {
                        break;
                    }
                    self.expect(Tok::Comma, "`,` or `)` in argument list")?;
                }
            }
            return Ok(Expr::Call(name, args));
        }

        match word.to_ascii_lowercase().as_str() {
            "true" => Ok(Expr::Literal(Value::Bool(true))),
            "false" => Ok(Expr::Literal(Value::Bool(false))),
            "null" => Ok(Expr::Literal(Value::Null)),
            _ => Err(format!("undefined constant {word}")),
        }
    }

    fn parse_array(&mut self) -> Result<Expr, String> {
        let mut entries = Vec::new();
        loop {
            if self.eat(&Tok::RBracket) {
                return Ok(Expr::Array(entries));
            }
            let first = self.parse_expr()?;
            if self.eat(&Tok::FatArrow) {
                let value = self.parse_expr()?;
                entries.push((Some(first), value));
            } else {
                entries.push((None, first));
            }
            if !self.eat(&Tok::Comma) && self.peek_at(0) != Some(&Tok::RBracket) {
                return Err("expected `,` or `]` in array literal".to_string());
            }
        }
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Var(name) => format!("variable ${name}"),
        Tok::Ident(word) => format!("`{word}`"),
        Tok::Str(_) => "string literal".to_string(),
        Tok::Int(i) => format!("number {i}"),
        Tok::Float(f) => format!("number {f}"),
        other => format!("token {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Variable(name.to_string()))
    }

    #[test]
    fn test_parse_variable_and_access() {
        assert_eq!(
            parse("$user->name").unwrap(),
            Expr::Property(var("user"), "name".to_string())
        );
        assert_eq!(
            parse("$items['key']").unwrap(),
            Expr::Index(var("items"), Box::new(Expr::Literal(json!("key"))))
        );
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Literal(json!(1))),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Literal(json!(2))),
                    Box::new(Expr::Literal(json!(3)))
                ))
            )
        );
    }

    #[test]
    fn test_concat_binds_looser_than_addition() {
        let expr = parse("'a' . 1 + 2").unwrap();
        assert!(matches!(expr, Expr::Binary(BinaryOp::Concat, _, _)));
    }

    #[test]
    fn test_float_literal_is_not_concat() {
        assert_eq!(parse("1.5").unwrap(), Expr::Literal(json!(1.5)));
    }

    #[test]
    fn test_ternary_and_short_ternary() {
        assert!(matches!(
            parse("$a ? 'x' : 'y'").unwrap(),
            Expr::Ternary { then: Some(_), .. }
        ));
        assert!(matches!(
            parse("$a ?: 'y'").unwrap(),
            Expr::Ternary { then: None, .. }
        ));
    }

    #[test]
    fn test_coalesce() {
        assert_eq!(
            parse("$a ?? 'b'").unwrap(),
            Expr::Coalesce(var("a"), Box::new(Expr::Literal(json!("b"))))
        );
    }

    #[test]
    fn test_keyword_operators() {
        assert!(matches!(
            parse("$a and $b or $c").unwrap(),
            Expr::Binary(BinaryOp::Or, _, _)
        ));
    }

    #[test]
    fn test_array_literal() {
        let expr = parse("['title' => $t, 2]").unwrap();
        match expr {
            Expr::Array(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].0, Some(Expr::Literal(json!("title"))));
                assert_eq!(entries[1].0, None);
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(parse(r"'it\'s'").unwrap(), Expr::Literal(json!("it's")));
        assert_eq!(parse(r#""a\nb""#).unwrap(), Expr::Literal(json!("a\nb")));
    }

    #[test]
    fn test_function_call() {
        assert_eq!(
            parse("strtoupper($name)").unwrap(),
            Expr::Call("strtoupper".to_string(), vec![Expr::Variable("name".to_string())])
        );
        assert!(parse("launch_missiles()").is_err());
    }

    #[test]
    fn test_loop_header() {
        let header = parse_loop_header("$users as $user").unwrap();
        assert_eq!(header.key, None);
        assert_eq!(header.value, "user");

        let header = parse_loop_header("$map as $key => $value").unwrap();
        assert_eq!(header.key.as_deref(), Some("key"));
        assert_eq!(header.value, "value");

        assert!(parse_loop_header("$users").is_err());
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("$").is_err());
        assert!(parse("(1 + 2").is_err());
        assert!(parse("'open").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("bareword").is_err());
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(parse(&shallow).unwrap(), Expr::Literal(Value::from(1)));

        let parens = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(parse(&parens).unwrap_err().contains("nested more than"));

        let negations = format!("{}$a", "!".repeat(100_000));
        assert!(parse(&negations).is_err());

        let chain = vec!["1"; 100_000].join(" + ");
        assert!(parse(&chain).is_err());
        assert!(parse(&vec!["1"; 50].join(" + ")).is_ok());
    }
}
