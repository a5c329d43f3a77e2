//! Edge guard conditions.
//!
//! A guard is a single predicate over the current payload, never a general
//! expression:
//!
//! ```text
//! score >= 0.9            comparison against a literal
//! payload.meta.lang == "en"
//! approved                truthiness
//! !needs_review           negated truthiness
//! ```
//!
//! Operators: `>=`/`≥`, `<=`/`≤`, `>`, `<`, `==`/`=`, `!=`/`≠`. Literals are
//! numbers, quoted strings, `true`, `false`, `null`, or a bare word (taken
//! as a string). A comparison against a field that does not exist is false.

use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
    Ne,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// Operator spellings, longest first so `>=` wins over `>`.
const OPERATORS: [(&str, Comparator); 10] = [
    (">=", Comparator::Ge),
    ("<=", Comparator::Le),
    ("==", Comparator::Eq),
    ("!=", Comparator::Ne),
    ("≥", Comparator::Ge),
    ("≤", Comparator::Le),
    ("≠", Comparator::Ne),
    (">", Comparator::Gt),
    ("<", Comparator::Lt),
    ("=", Comparator::Eq),
];

#[derive(Debug, Clone, PartialEq)]
pub enum GuardTest {
    Truthy,
    Falsy,
    Compare(Comparator, Value),
}

/// A parsed guard: a payload path and the test applied to the value there.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    path: Vec<String>,
    test: GuardTest,
}

impl Guard {
    /// Parse a guard string. The error is a short reason suitable for
    /// [`GraphError::InvalidCondition`](crate::error::GraphError::InvalidCondition).
    pub fn parse(source: &str) -> Result<Self, String> {
        let source = source.trim();
        if source.is_empty() {
            return Err("empty condition".into());
        }

        if let Some((left, op, right)) = split_operator(source) {
            let path = parse_path(left)?;
            let literal = parse_literal(right)?;
            return Ok(Self {
                path,
                test: GuardTest::Compare(op, literal),
            });
        }

        match source.strip_prefix('!') {
            Some(rest) => Ok(Self {
                path: parse_path(rest)?,
                test: GuardTest::Falsy,
            }),
            None => Ok(Self {
                path: parse_path(source)?,
                test: GuardTest::Truthy,
            }),
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn test(&self) -> &GuardTest {
        &self.test
    }

    /// Evaluate against `payload`.
    pub fn evaluate(&self, payload: &Value) -> bool {
        let field = lookup(payload, &self.path);
        match &self.test {
            GuardTest::Truthy => field.is_some_and(truthy),
            GuardTest::Falsy => !field.is_some_and(truthy),
            GuardTest::Compare(op, literal) => field.is_some_and(|v| compare(v, *op, literal)),
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.join(".");
        match &self.test {
            GuardTest::Truthy => write!(f, "{path}"),
            GuardTest::Falsy => write!(f, "!{path}"),
            GuardTest::Compare(op, literal) => write!(f, "{path} {} {literal}", op.symbol()),
        }
    }
}

fn split_operator(source: &str) -> Option<(&str, Comparator, &str)> {
    for (i, _) in source.char_indices() {
        let (left, rest) = source.split_at(i);
        for (token, op) in OPERATORS {
            if let Some(right) = rest.strip_prefix(token) {
                return Some((left, op, right));
            }
        }
    }
    None
}

fn parse_path(raw: &str) -> Result<Vec<String>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("missing field path".into());
    }
    let raw = raw.strip_prefix("payload.").unwrap_or(raw);
    let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
    let valid = |s: &String| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    };
    if !segments.iter().all(valid) {
        return Err(format!("invalid field path '{raw}'"));
    }
    Ok(segments)
}

fn parse_literal(raw: &str) -> Result<Value, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("missing literal".into());
    }
    for quote in ['"', '\''] {
        if let Some(inner) = raw.strip_prefix(quote) {
            return inner
                .strip_suffix(quote)
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(|| format!("unterminated string literal {raw}"));
        }
    }
    match raw {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" => return Ok(Value::Null),
        _ => {}
    }
    if let Ok(n) = raw.parse::<f64>()
        && let Some(number) = Number::from_f64(n)
    {
        return Ok(Value::Number(number));
    }
    Ok(Value::String(raw.to_string()))
}

/// Follow a dotted path through objects (and arrays, by numeric index).
/// An empty path is the payload itself.
pub(crate) fn lookup<'a, S: AsRef<str>>(payload: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter().try_fold(payload, |current, segment| {
        let segment = segment.as_ref();
        match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn ordering(field: &Value, literal: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_number(field), as_number(literal)) {
        return a.partial_cmp(&b);
    }
    match (field, literal) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn compare(field: &Value, op: Comparator, literal: &Value) -> bool {
    let equal = || match ordering(field, literal) {
        Some(order) => order == Ordering::Equal,
        None => field == literal,
    };
    match op {
        Comparator::Eq => equal(),
        Comparator::Ne => !equal(),
        Comparator::Ge => matches!(ordering(field, literal), Some(Ordering::Greater | Ordering::Equal)),
        Comparator::Le => matches!(ordering(field, literal), Some(Ordering::Less | Ordering::Equal)),
        Comparator::Gt => ordering(field, literal) == Some(Ordering::Greater),
        Comparator::Lt => ordering(field, literal) == Some(Ordering::Less),
    }
}
