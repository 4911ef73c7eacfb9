//! Query evaluation for the in-memory store
//!
//! Supports the subset of Cosmos DB SQL that repository callers and tests
//! use against a local store:
//!
//! ```text
//! SELECT * FROM c
//!     [WHERE c.path <op> <operand> [AND c.path <op> <operand>]...]
//!     [ORDER BY c.path [ASC|DESC]]
//! ```
//!
//! `<op>` is one of `= != <> < <= > >=`; `<operand>` is a string, number,
//! `true`, `false`, `null` or an `@parameter`. Anything else is rejected as
//! an invalid request, the same way the service rejects malformed SQL.

use crate::adapters::database::QuerySpec;
use serde_json::{Number, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Param(String),
    Op(CmpOp),
    Dot,
    Star,
}

#[derive(Debug, Clone)]
struct Condition {
    path: Vec<String>,
    op: CmpOp,
    operand: Value,
}

/// A parsed query ready to run against stored documents
#[derive(Debug, Clone)]
pub(crate) struct CompiledQuery {
    conditions: Vec<Condition>,
    order_by: Option<(Vec<String>, bool)>,
}

impl CompiledQuery {
    /// Parses a query and binds its parameters
    pub(crate) fn compile(spec: &QuerySpec) -> Result<Self, String> {
        let tokens = tokenize(&spec.text)?;
        Parser {
            tokens,
            pos: 0,
            spec,
        }
        .parse()
    }

    /// Whether a document satisfies every condition
    pub(crate) fn matches(&self, document: &Value) -> bool {
        self.conditions.iter().all(|condition| {
            lookup(document, &condition.path)
                .map(|value| compare(value, condition.op, &condition.operand))
                .unwrap_or(false)
        })
    }

    /// Applies the ORDER BY clause, if any; the sort is stable
    pub(crate) fn sort(&self, documents: &mut [Value]) {
        if let Some((path, descending)) = &self.order_by {
            documents.sort_by(|a, b| {
                let ordering = order_values(lookup(a, path), lookup(b, path));
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
    }
}

fn lookup<'a>(document: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(document, |current, segment| current.get(segment.as_str()))
}

fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
    match op {
        CmpOp::Eq => values_equal(lhs, rhs),
        CmpOp::Ne => !values_equal(lhs, rhs),
        _ => {
            let ordering = match (lhs, rhs) {
                (Value::Number(a), Value::Number(b)) => a.as_f64().partial_cmp(&b.as_f64()),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            };
            match ordering {
                Some(ordering) => match op {
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::Le => ordering != Ordering::Greater,
                    CmpOp::Gt => ordering == Ordering::Greater,
                    CmpOp::Ge => ordering != Ordering::Less,
                    CmpOp::Eq | CmpOp::Ne => false,
                },
                None => false,
            }
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

fn order_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Op(CmpOp::Eq));
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(CmpOp::Ne));
                i += 2;
            }
            '<' => match next {
                Some('=') => {
                    tokens.push(Token::Op(CmpOp::Le));
                    i += 2;
                }
                Some('>') => {
                    tokens.push(Token::Op(CmpOp::Ne));
                    i += 2;
                }
                _ => {
                    tokens.push(Token::Op(CmpOp::Lt));
                    i += 1;
                }
            },
            '>' => {
                if next == Some('=') {
                    tokens.push(Token::Op(CmpOp::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CmpOp::Gt));
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut literal = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some(&ch) if ch == quote => {
                            // A doubled quote is an escaped quote.
                            if chars.get(i + 1) == Some(&quote) {
                                literal.push(quote);
                                i += 2;
                            } else {
                                i += 1;
                                break;
                            }
                        }
                        Some(&ch) => {
                            literal.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(literal));
            }
            '@' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                if i == start + 1 {
                    return Err("parameter name expected after '@'".to_string());
                }
                tokens.push(Token::Param(chars[start..i].iter().collect()));
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                let number = raw
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number literal '{raw}'"))?;
                tokens.push(Token::Num(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    spec: &'a QuerySpec,
}

impl Parser<'_> {
    fn parse(mut self) -> Result<CompiledQuery, String> {
        self.expect_keyword("SELECT")?;
        match self.advance() {
            Some(Token::Star) => {}
            _ => return Err("only SELECT * is supported".to_string()),
        }
        self.expect_keyword("FROM")?;
        let alias = match self.advance() {
            Some(Token::Ident(alias)) => alias,
            _ => return Err("container alias expected after FROM".to_string()),
        };

        let mut conditions = Vec::new();
        if self.eat_keyword("WHERE") {
            loop {
                conditions.push(self.parse_condition(&alias)?);
                if !self.eat_keyword("AND") {
                    break;
                }
            }
        }

        let mut order_by = None;
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let path = self.parse_path(&alias)?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            order_by = Some((path, descending));
        }

        if let Some(token) = self.tokens.get(self.pos) {
            return Err(format!("unexpected token {token:?}"));
        }

        Ok(CompiledQuery {
            conditions,
            order_by,
        })
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.tokens.get(self.pos) {
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), String> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(format!("{keyword} expected"))
        }
    }

    fn parse_path(&mut self, alias: &str) -> Result<Vec<String>, String> {
        match self.advance() {
            Some(Token::Ident(root)) if root == alias => {}
            other => return Err(format!("property path on '{alias}' expected, got {other:?}")),
        }

        let mut path = Vec::new();
        while self.tokens.get(self.pos) == Some(&Token::Dot) {
            self.pos += 1;
            match self.advance() {
                Some(Token::Ident(segment)) => path.push(segment),
                _ => return Err("property name expected after '.'".to_string()),
            }
        }

        if path.is_empty() {
            return Err(format!("property path on '{alias}' expected"));
        }
        Ok(path)
    }

    fn parse_condition(&mut self, alias: &str) -> Result<Condition, String> {
        let path = self.parse_path(alias)?;
        let op = match self.advance() {
            Some(Token::Op(op)) => op,
            _ => return Err("comparison operator expected".to_string()),
        };
        let operand = match self.advance() {
            Some(Token::Str(s)) => Value::String(s),
            Some(Token::Num(n)) => number_value(n),
            Some(Token::Param(name)) => self
                .spec
                .parameter(&name)
                .cloned()
                .ok_or_else(|| format!("parameter {name} is not defined"))?,
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("true") => Value::Bool(true),
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("false") => Value::Bool(false),
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("null") => Value::Null,
            other => return Err(format!("literal expected, got {other:?}")),
        };

        Ok(Condition { path, op, operand })
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn run(query: QuerySpec, docs: &[Value]) -> Vec<Value> {
        let compiled = CompiledQuery::compile(&query).unwrap();
        let mut out: Vec<Value> = docs.iter().filter(|d| compiled.matches(d)).cloned().collect();
        compiled.sort(&mut out);
        out
    }

    fn docs() -> Vec<Value> {
        vec![
            json!({"id": "1", "pk": "a", "qty": 5, "tags": {"color": "red"}}),
            json!({"id": "2", "pk": "b", "qty": 12, "tags": {"color": "blue"}}),
            json!({"id": "3", "pk": "a", "qty": 1, "active": true}),
        ]
    }

    #[test]
    fn test_select_all() {
        assert_eq!(run(QuerySpec::new("SELECT * FROM c"), &docs()).len(), 3);
    }

    #[test_case("SELECT * FROM c WHERE c.pk = 'a'", 2 ; "string equality")]
    #[test_case("select * from c where c.qty > 4", 2 ; "lowercase keywords")]
    #[test_case("SELECT * FROM c WHERE c.qty >= 5 AND c.pk = 'b'", 1 ; "conjunction")]
    #[test_case("SELECT * FROM c WHERE c.tags.color = \"red\"", 1 ; "nested path")]
    #[test_case("SELECT * FROM c WHERE c.active = true", 1 ; "boolean literal")]
    #[test_case("SELECT * FROM c WHERE c.pk != 'a'", 1 ; "inequality")]
    #[test_case("SELECT * FROM c WHERE c.missing = 1", 0 ; "missing property never matches")]
    fn test_where_clause(query: &str, expected: usize) {
        assert_eq!(run(QuerySpec::new(query), &docs()).len(), expected);
    }

    #[test]
    fn test_parameters_are_bound() {
        let query = QuerySpec::new("SELECT * FROM c WHERE c.qty < @max")
            .with_parameter("@max", json!(6));
        let ids: Vec<_> = run(query, &docs()).iter().map(|d| d["id"].clone()).collect();
        assert_eq!(ids, vec![json!("1"), json!("3")]);
    }

    #[test]
    fn test_undefined_parameter_rejected() {
        let query = QuerySpec::new("SELECT * FROM c WHERE c.qty < @max");
        assert!(CompiledQuery::compile(&query).unwrap_err().contains("@max"));
    }

    #[test]
    fn test_order_by_desc() {
        let out = run(QuerySpec::new("SELECT * FROM c ORDER BY c.qty DESC"), &docs());
        let qty: Vec<_> = out.iter().map(|d| d["qty"].as_i64().unwrap()).collect();
        assert_eq!(qty, vec![12, 5, 1]);
    }

    #[test]
    fn test_escaped_quote_in_literal() {
        let docs = vec![json!({"name": "O'Brien"})];
        let out = run(QuerySpec::new("SELECT * FROM c WHERE c.name = 'O''Brien'"), &docs);
        assert_eq!(out.len(), 1);
    }

    #[test_case("SELECT c.id FROM c" ; "projection")]
    #[test_case("SELECT * FROM c WHERE" ; "dangling where")]
    #[test_case("SELECT * FROM c WHERE x.id = 1" ; "wrong alias")]
    #[test_case("DELETE FROM c" ; "not a select")]
    #[test_case("SELECT * FROM c WHERE c.name = 'open" ; "unterminated string")]
    fn test_unsupported_queries_rejected(query: &str) {
        assert!(CompiledQuery::compile(&QuerySpec::new(query)).is_err());
    }
}
