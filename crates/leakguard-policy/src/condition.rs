//! Condition trees and their evaluation
//!
//! Policies declare conditions as nested `all` / `any` / `not` blocks with
//! leaf comparisons:
//!
//! ```yaml
//! conditions:
//!   all:
//!     - field: classification.labels
//!       operator: contains
//!       value: PAN
//!     - not:
//!         field: event.direction
//!         operator: "=="
//!         value: inbound
//! ```
//!
//! [`ConditionSpec`] is the authored form. It is compiled once at load time
//! into a [`ConditionNode`], which resolves operator names to a closed
//! [`Predicate`] set and compiles regexes, so evaluation never sees an
//! unknown operator.
//!
//! Evaluation is a pure function of the event:
//! - `all([])` is `true` and `any([])` is `false`.
//! - A leaf whose field is absent is `false`, except for `not_exists`.
//! - Type mismatches (e.g. `>` on a string) are `false`, never an error.

use leakguard_classifiers::luhn_valid;
use leakguard_core::{Error, FieldPath, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Authored condition, as found in policy YAML/JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionSpec {
    /// Every child must hold
    All { all: Vec<ConditionSpec> },

    /// At least one child must hold
    Any { any: Vec<ConditionSpec> },

    /// The child must not hold
    Not { not: Box<ConditionSpec> },

    /// Field comparison
    Leaf {
        field: String,

        #[serde(default = "default_operator")]
        operator: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
}

impl ConditionSpec {
    /// Leaf comparison
    pub fn leaf(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Leaf {
            field: field.into(),
            operator: operator.into(),
            value: Some(value.into()),
        }
    }

    /// Leaf with no value, for `exists` style operators
    pub fn unary(field: impl Into<String>, operator: impl Into<String>) -> Self {
        Self::Leaf {
            field: field.into(),
            operator: operator.into(),
            value: None,
        }
    }
}

fn default_operator() -> String {
    "==".to_string()
}

/// Supported comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    NotContains,
    In,
    NotIn,
    Regex,
    Exists,
    NotExists,
    LuhnCheck,
}

impl Operator {
    /// Resolve an operator name, including the long-form aliases
    pub fn parse(raw: &str) -> Option<Self> {
        let op = match raw.trim() {
            "==" | "equals" => Self::Eq,
            "!=" | "not_equals" => Self::Ne,
            ">" | "greater_than" => Self::Gt,
            ">=" | "greater_equal" => Self::Ge,
            "<" | "less_than" => Self::Lt,
            "<=" | "less_equal" => Self::Le,
            "contains" => Self::Contains,
            "not contains" | "not_contains" => Self::NotContains,
            "in" => Self::In,
            "not in" | "not_in" => Self::NotIn,
            "regex" => Self::Regex,
            "exists" => Self::Exists,
            "not_exists" | "not exists" => Self::NotExists,
            "luhn_check" => Self::LuhnCheck,
            _ => return None,
        };
        Some(op)
    }

    /// Canonical operator name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Contains => "contains",
            Self::NotContains => "not contains",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Regex => "regex",
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
            Self::LuhnCheck => "luhn_check",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled comparison with its literal operand
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    Gt(f64),
    Ge(f64),
    Lt(f64),
    Le(f64),
    Contains(Value),
    NotContains(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Regex(Regex),
    Exists,
    NotExists,
    LuhnCheck,
    /// Literal of the wrong shape for its operator; never matches
    Never(Operator),
}

impl Predicate {
    /// Compile an operator and its literal.
    ///
    /// A non-numeric bound for `>`/`>=`/`<`/`<=` or a non-list operand for
    /// `in`/`not in` compiles to [`Predicate::Never`] with a warning, so the
    /// rest of the tree still evaluates.
    pub fn compile(operator: Operator, value: Option<&Value>) -> Result<Self> {
        let require = || {
            value.cloned().ok_or_else(|| {
                Error::policy(format!("operator '{}' requires a value", operator))
            })
        };
        let never = |expected: &str| {
            warn!(
                operator = %operator,
                value = ?value,
                "Operator requires a {} value, condition will never match",
                expected
            );
            Self::Never(operator)
        };
        let number = |build: fn(f64) -> Self| match value.and_then(Value::as_f64) {
            Some(bound) => build(bound),
            None => never("numeric"),
        };
        let list = |build: fn(Vec<Value>) -> Self| match value {
            Some(Value::Array(items)) => build(items.clone()),
            _ => never("list"),
        };

        let predicate = match operator {
            Operator::Eq => Self::Eq(value.cloned().unwrap_or(Value::Null)),
            Operator::Ne => Self::Ne(value.cloned().unwrap_or(Value::Null)),
            Operator::Gt => number(Self::Gt),
            Operator::Ge => number(Self::Ge),
            Operator::Lt => number(Self::Lt),
            Operator::Le => number(Self::Le),
            Operator::Contains => Self::Contains(require()?),
            Operator::NotContains => Self::NotContains(require()?),
            Operator::In => list(Self::In),
            Operator::NotIn => list(Self::NotIn),
            Operator::Regex => {
                let pattern = value.and_then(Value::as_str).ok_or_else(|| {
                    Error::policy("operator 'regex' requires a string pattern")
                })?;
                let regex = Regex::new(pattern).map_err(|e| {
                    Error::policy(format!("invalid regex pattern '{}': {}", pattern, e))
                })?;
                Self::Regex(regex)
            }
            Operator::Exists => Self::Exists,
            Operator::NotExists => Self::NotExists,
            Operator::LuhnCheck => Self::LuhnCheck,
        };

        Ok(predicate)
    }

    /// The operator this predicate implements
    pub fn operator(&self) -> Operator {
        match self {
            Self::Eq(_) => Operator::Eq,
            Self::Ne(_) => Operator::Ne,
            Self::Gt(_) => Operator::Gt,
            Self::Ge(_) => Operator::Ge,
            Self::Lt(_) => Operator::Lt,
            Self::Le(_) => Operator::Le,
            Self::Contains(_) => Operator::Contains,
            Self::NotContains(_) => Operator::NotContains,
            Self::In(_) => Operator::In,
            Self::NotIn(_) => Operator::NotIn,
            Self::Regex(_) => Operator::Regex,
            Self::Exists => Operator::Exists,
            Self::NotExists => Operator::NotExists,
            Self::LuhnCheck => Operator::LuhnCheck,
            Self::Never(operator) => *operator,
        }
    }

    /// Apply to a resolved field value (`None` = absent)
    pub fn test(&self, resolved: Option<&Value>) -> bool {
        let actual = match (self, resolved) {
            (Self::Exists, found) => return found.is_some(),
            (Self::NotExists, found) => return found.is_none(),
            (Self::Never(_), _) => return false,
            (_, None) => return false,
            (_, Some(actual)) => actual,
        };

        match self {
            Self::Eq(expected) => values_equal(actual, expected),
            Self::Ne(expected) => !values_equal(actual, expected),
            Self::Gt(bound) => actual.as_f64().is_some_and(|n| n > *bound),
            Self::Ge(bound) => actual.as_f64().is_some_and(|n| n >= *bound),
            Self::Lt(bound) => actual.as_f64().is_some_and(|n| n < *bound),
            Self::Le(bound) => actual.as_f64().is_some_and(|n| n <= *bound),
            Self::Contains(needle) => contains(actual, needle).unwrap_or(false),
            Self::NotContains(needle) => contains(actual, needle).map(|hit| !hit).unwrap_or(false),
            Self::In(options) => options.iter().any(|o| values_equal(actual, o)),
            Self::NotIn(options) => !options.iter().any(|o| values_equal(actual, o)),
            Self::Regex(regex) => match actual {
                Value::String(s) => regex.is_match(s),
                other => regex.is_match(&other.to_string()),
            },
            Self::LuhnCheck => match actual {
                Value::String(s) => luhn_valid(s),
                Value::Number(n) if n.is_u64() => luhn_valid(&n.to_string()),
                _ => false,
            },
            Self::Exists | Self::NotExists | Self::Never(_) => unreachable!("handled above"),
        }
    }
}

/// Type-aware equality: numbers compare by value regardless of
/// integer/float representation.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

/// Substring test for strings, membership test for lists, `None` otherwise
fn contains(haystack: &Value, needle: &Value) -> Option<bool> {
    match haystack {
        Value::String(s) => needle.as_str().map(|n| s.contains(n)),
        Value::Array(items) => Some(items.iter().any(|item| values_equal(item, needle))),
        _ => None,
    }
}

/// Compiled leaf comparison
#[derive(Debug, Clone)]
pub struct Leaf {
    pub field: FieldPath,
    pub predicate: Predicate,
}

impl Leaf {
    /// Resolve the field and apply the predicate
    pub fn evaluate(&self, event: &Value) -> bool {
        self.predicate.test(self.field.resolve(event))
    }
}

/// Compiled condition tree
#[derive(Debug, Clone)]
pub enum ConditionNode {
    All(Vec<ConditionNode>),
    Any(Vec<ConditionNode>),
    Not(Box<ConditionNode>),
    Leaf(Leaf),
}

impl ConditionNode {
    /// Compile an authored condition tree.
    ///
    /// Fails on unknown operators, invalid regexes, malformed field paths
    /// and missing operands.
    pub fn compile(spec: &ConditionSpec) -> Result<Self> {
        let node = match spec {
            ConditionSpec::All { all } => {
                Self::All(all.iter().map(Self::compile).collect::<Result<_>>()?)
            }
            ConditionSpec::Any { any } => {
                Self::Any(any.iter().map(Self::compile).collect::<Result<_>>()?)
            }
            ConditionSpec::Not { not } => Self::Not(Box::new(Self::compile(not)?)),
            ConditionSpec::Leaf {
                field,
                operator,
                value,
            } => {
                let op = Operator::parse(operator).ok_or_else(|| {
                    Error::policy(format!("unknown operator '{}' on field '{}'", operator, field))
                })?;
                Self::Leaf(Leaf {
                    field: FieldPath::parse(field)?,
                    predicate: Predicate::compile(op, value.as_ref())?,
                })
            }
        };
        Ok(node)
    }

    /// Evaluate against an event, short-circuiting `All` and `Any`
    pub fn evaluate(&self, event: &Value) -> bool {
        match self {
            Self::All(children) => children.iter().all(|c| c.evaluate(event)),
            Self::Any(children) => children.iter().any(|c| c.evaluate(event)),
            Self::Not(child) => !child.evaluate(event),
            Self::Leaf(leaf) => leaf.evaluate(event),
        }
    }

    /// True if this tree contains an `All` with no children
    pub fn has_empty_all(&self) -> bool {
        match self {
            Self::All(children) => children.is_empty() || children.iter().any(Self::has_empty_all),
            Self::Any(children) => children.iter().any(Self::has_empty_all),
            Self::Not(child) => child.has_empty_all(),
            Self::Leaf(_) => false,
        }
    }
}

/// Evaluate `node` against `event`
pub fn evaluate(event: &Value, node: &ConditionNode) -> bool {
    node.evaluate(event)
}
