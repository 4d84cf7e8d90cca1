//! Predicates over roll options.
//!
//! A predicate is a small boolean expression deciding whether a modifier or
//! rule element applies in the current context. The JSON form follows the
//! authored data format:
//!
//! ```text
//! "self:trait:elf"                              bare roll option
//! ["a", "b"]                                    implicit all
//! {"all": [...]} / {"and": [...]}               every child holds
//! {"any": [...]} / {"or": [...]}                some child holds
//! {"not": [...]} / {"nor": [...]}               no child holds
//! {"nand": [...]}                               not every child holds
//! {"lt": ["self:ability:str:score", 14]}        numeric comparison
//! ```
//!
//! Unknown shapes deserialize into [`Predicate::Invalid`] instead of
//! failing, so one bad predicate in authored data cannot break loading.

use crate::error::PredicateError;
use crate::roll_options::RollOptionSet;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;

/// Comparison operators for numeric roll options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "eq" => Some(CompareOp::Eq),
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    /// The JSON key for this operator.
    pub fn key(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
        }
    }

    fn compare(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Gt => left > right,
            CompareOp::Gte => left >= right,
            CompareOp::Lt => left < right,
            CompareOp::Lte => left <= right,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal number.
    Number(f64),
    /// A roll option prefix resolved like the left-hand side.
    Tag(String),
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Operand::Number(n)
    }
}

impl From<i32> for Operand {
    fn from(n: i32) -> Self {
        Operand::Number(f64::from(n))
    }
}

impl From<&str> for Operand {
    fn from(tag: &str) -> Self {
        Operand::Tag(tag.to_string())
    }
}

/// A boolean expression over a [`RollOptionSet`].
///
/// # Examples
///
/// ```rust
/// use modstack::{Predicate, RollOptionSet};
///
/// let weak = Predicate::all(vec![Predicate::lt("self:ability:str:score", 14)]);
///
/// let options: RollOptionSet = ["self:ability:str:score:12"].into_iter().collect();
/// assert!(weak.evaluate(&options));
///
/// let options: RollOptionSet = ["self:ability:str:score:16"].into_iter().collect();
/// assert!(!weak.evaluate(&options));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// True iff the exact roll option is present.
    Atom(String),
    /// True iff every child is true.
    All(Vec<Predicate>),
    /// True iff at least one child is true.
    Any(Vec<Predicate>),
    /// True iff every child is false.
    Not(Vec<Predicate>),
    /// True iff at least one child is false.
    Nand(Vec<Predicate>),
    /// Numeric comparison against the suffix of the first `left:<n>` option.
    Compare {
        op: CompareOp,
        left: String,
        right: Operand,
    },
    /// A node that could not be understood. Always evaluates to `false`.
    Invalid { reason: String, raw: Value },
}

impl Predicate {
    pub fn atom(option: impl Into<String>) -> Self {
        Predicate::Atom(option.into())
    }

    pub fn all(children: Vec<Predicate>) -> Self {
        Predicate::All(children)
    }

    pub fn any(children: Vec<Predicate>) -> Self {
        Predicate::Any(children)
    }

    pub fn not(children: Vec<Predicate>) -> Self {
        Predicate::Not(children)
    }

    pub fn compare(op: CompareOp, left: impl Into<String>, right: impl Into<Operand>) -> Self {
        Predicate::Compare {
            op,
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn lt(left: impl Into<String>, right: impl Into<Operand>) -> Self {
        Self::compare(CompareOp::Lt, left, right)
    }

    pub fn lte(left: impl Into<String>, right: impl Into<Operand>) -> Self {
        Self::compare(CompareOp::Lte, left, right)
    }

    pub fn gt(left: impl Into<String>, right: impl Into<Operand>) -> Self {
        Self::compare(CompareOp::Gt, left, right)
    }

    pub fn gte(left: impl Into<String>, right: impl Into<Operand>) -> Self {
        Self::compare(CompareOp::Gte, left, right)
    }

    /// Parse the JSON form. Never fails; unknown shapes become `Invalid`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(option) => Predicate::Atom(option.clone()),
            Value::Array(items) => Predicate::All(items.iter().map(Self::from_value).collect()),
            Value::Object(map) if map.len() == 1 => {
                let Some((key, inner)) = map.iter().next() else {
                    return invalid("empty object", value);
                };
                match key.as_str() {
                    "all" | "and" => Self::children(inner, value, Predicate::All),
                    "any" | "or" => Self::children(inner, value, Predicate::Any),
                    "nand" => Self::children(inner, value, Predicate::Nand),
                    "not" | "nor" => match inner {
                        Value::Array(_) => Self::children(inner, value, Predicate::Not),
                        single => Predicate::Not(vec![Self::from_value(single)]),
                    },
                    other => match CompareOp::from_key(other) {
                        Some(op) => Self::comparison(op, inner, value),
                        None => invalid(&format!("unknown operator `{other}`"), value),
                    },
                }
            }
            _ => invalid("expected a string, list or single-key object", value),
        }
    }

    fn children(inner: &Value, raw: &Value, build: fn(Vec<Predicate>) -> Predicate) -> Self {
        match inner {
            Value::Array(items) => build(items.iter().map(Self::from_value).collect()),
            _ => invalid("combinator expects a list", raw),
        }
    }

    fn comparison(op: CompareOp, inner: &Value, raw: &Value) -> Self {
        let Value::Array(pair) = inner else {
            return invalid("comparison expects [left, right]", raw);
        };
        let (Some(Value::String(left)), Some(right), 2) = (pair.first(), pair.get(1), pair.len())
        else {
            return invalid("comparison expects [tag, number | tag]", raw);
        };
        let right = match right {
            Value::Number(n) => match n.as_f64() {
                Some(n) => Operand::Number(n),
                None => return invalid("comparison operand out of range", raw),
            },
            Value::String(s) => match s.parse::<f64>() {
                Ok(n) => Operand::Number(n),
                Err(_) => Operand::Tag(s.clone()),
            },
            _ => return invalid("comparison operand must be a number or tag", raw),
        };
        Predicate::Compare {
            op,
            left: left.clone(),
            right,
        }
    }

    /// Convert back to the JSON form.
    pub fn to_value(&self) -> Value {
        let list = |children: &[Predicate]| -> Value {
            Value::Array(children.iter().map(Predicate::to_value).collect())
        };
        match self {
            Predicate::Atom(option) => Value::String(option.clone()),
            Predicate::All(children) => json!({ "all": list(children) }),
            Predicate::Any(children) => json!({ "any": list(children) }),
            Predicate::Not(children) => json!({ "not": list(children) }),
            Predicate::Nand(children) => json!({ "nand": list(children) }),
            Predicate::Compare { op, left, right } => {
                let right = match right {
                    Operand::Number(n) => number_value(*n),
                    Operand::Tag(tag) => json!(tag),
                };
                let mut node = serde_json::Map::new();
                node.insert(op.key().to_string(), json!([left, right]));
                Value::Object(node)
            }
            Predicate::Invalid { raw, .. } => raw.clone(),
        }
    }

    /// Find the first structurally invalid node, if any.
    pub fn validate(&self) -> Result<(), PredicateError> {
        match self {
            Predicate::Atom(_) | Predicate::Compare { .. } => Ok(()),
            Predicate::All(children)
            | Predicate::Any(children)
            | Predicate::Not(children)
            | Predicate::Nand(children) => children.iter().try_for_each(Predicate::validate),
            Predicate::Invalid { reason, raw } => {
                Err(PredicateError::Malformed(format!("{reason}: {raw}")))
            }
        }
    }

    /// Evaluate, reporting why evaluation was impossible.
    ///
    /// Structural problems anywhere in the tree are reported even if
    /// short-circuiting would never reach them.
    pub fn try_evaluate(&self, options: &RollOptionSet) -> Result<bool, PredicateError> {
        self.validate()?;
        self.eval_node(options)
    }

    fn eval_node(&self, options: &RollOptionSet) -> Result<bool, PredicateError> {
        match self {
            Predicate::Atom(option) => Ok(options.contains(option)),
            Predicate::All(children) => {
                for child in children {
                    if !child.eval_node(options)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Any(children) => {
                for child in children {
                    if child.eval_node(options)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(children) => {
                for child in children {
                    if child.eval_node(options)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Nand(children) => {
                for child in children {
                    if !child.eval_node(options)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Compare { op, left, right } => {
                let Some(lhs) = resolve(options, left)? else {
                    return Ok(false);
                };
                let rhs = match right {
                    Operand::Number(n) => *n,
                    Operand::Tag(tag) => match resolve(options, tag)? {
                        Some(n) => n,
                        None => return Ok(false),
                    },
                };
                Ok(op.compare(lhs, rhs))
            }
            Predicate::Invalid { reason, raw } => {
                Err(PredicateError::Malformed(format!("{reason}: {raw}")))
            }
        }
    }

    /// Evaluate against `options`. Malformed predicates log a warning and
    /// evaluate to `false`.
    pub fn evaluate(&self, options: &RollOptionSet) -> bool {
        match self.try_evaluate(options) {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(predicate = %self, %error, "predicate evaluation failed; treating as false");
                false
            }
        }
    }

    /// Evaluate an optional predicate. An absent predicate is always true.
    ///
    /// ```rust
    /// use modstack::{Predicate, RollOptionSet};
    ///
    /// assert!(Predicate::test(None, &RollOptionSet::new()));
    /// ```
    pub fn test(predicate: Option<&Predicate>, options: &RollOptionSet) -> bool {
        predicate.map_or(true, |p| p.evaluate(options))
    }
}

/// Whole numbers are written as JSON integers, so `14` stays `14`.
fn number_value(n: f64) -> Value {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() <= EXACT {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn invalid(reason: &str, raw: &Value) -> Predicate {
    Predicate::Invalid {
        reason: reason.to_string(),
        raw: raw.clone(),
    }
}

fn resolve(options: &RollOptionSet, prefix: &str) -> Result<Option<f64>, PredicateError> {
    match options.numeric_suffix(prefix) {
        None => Ok(None),
        Some(Ok(n)) => Ok(Some(n)),
        Some(Err(suffix)) => Err(PredicateError::NonNumericSuffix {
            prefix: prefix.to_string(),
            suffix,
        }),
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for Predicate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.to_value() {
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in &map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            other => other.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Predicate::from_value(&value))
    }
}
