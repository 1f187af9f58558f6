//! Boolean condition trees evaluated against generation data.
//!
//! Conditions gate tasks and field bindings. The evaluator defines two
//! comparator subtleties explicitly rather than leaning on type coercion:
//! blank equivalence (a missing field, JSON null, and a whitespace-only
//! string all compare equal to the empty string) and boolean normalization
//! (the strings "true"/"false" compare equal to the matching JSON booleans).

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generation::GenerationData;

/// A condition tree: conjunction, disjunction, or a single comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    And {
        and: Vec<Condition>,
    },
    Or {
        or: Vec<Condition>,
    },
    Leaf(ConditionLeaf),
}

/// A single comparison against one generation-data field.
///
/// With neither `equals` nor `is_not`, the leaf is a presence check: true
/// when the field holds a non-blank value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionLeaf {
    /// Field name in the generation data.
    #[serde(rename = "where")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_not: Option<Value>,
}

impl Condition {
    /// Evaluate the tree against the current generation data.
    pub fn evaluate(&self, data: &GenerationData) -> bool {
        match self {
            Condition::And { and } => and.iter().all(|c| c.evaluate(data)),
            Condition::Or { or } => or.iter().any(|c| c.evaluate(data)),
            Condition::Leaf(leaf) => leaf.evaluate(data),
        }
    }
}

impl ConditionLeaf {
    /// Evaluate this comparison.
    pub fn evaluate(&self, data: &GenerationData) -> bool {
        let actual = data.get(&self.field);
        if let Some(expected) = &self.equals {
            values_match(actual, expected)
        } else if let Some(expected) = &self.is_not {
            !values_match(actual, expected)
        } else {
            !is_blank(actual)
        }
    }
}

/// Blank equivalence: missing, null, and whitespace-only strings are blank.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn values_match(actual: Option<&Value>, expected: &Value) -> bool {
    if is_blank(Some(expected)) {
        return is_blank(actual);
    }
    let Some(actual) = actual else {
        return false;
    };
    if let (Some(a), Some(b)) = (as_bool(actual), as_bool(expected)) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a == b;
    }
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => a.trim() == b.trim(),
        (a, b) => a == b,
    }
}
