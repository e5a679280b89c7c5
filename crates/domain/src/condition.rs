use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shopfloor_core::{AppError, AppResult, NonEmptyString};

/// Caller-supplied attributes a conditional grant is evaluated against.
pub type AccessContext = BTreeMap<String, ConditionValue>;

/// Typed value carried by conditions and access contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// Boolean flag.
    Bool(bool),
    /// Numeric value; integers are widened.
    Number(f64),
    /// Text value.
    Text(String),
    /// Homogeneous or mixed list of values.
    List(Vec<ConditionValue>),
}

impl ConditionValue {
    fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Returns a stable type label for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<ConditionValue>> From<Vec<T>> for ConditionValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Supported comparison operators for permission conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Same type and equal value.
    Equals,
    /// Same type and different value.
    NotEquals,
    /// Text contains a substring, or list contains an element.
    Contains,
    /// Value is a member of the condition list.
    In,
    /// Value is absent from a type-consistent condition list.
    NotIn,
    /// Numeric strict greater-than.
    GreaterThan,
    /// Numeric strict less-than.
    LessThan,
}

impl ConditionOperator {
    /// Returns a stable storage value for this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
        }
    }

    /// Returns all known operators.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ConditionOperator] = &[
            ConditionOperator::Equals,
            ConditionOperator::NotEquals,
            ConditionOperator::Contains,
            ConditionOperator::In,
            ConditionOperator::NotIn,
            ConditionOperator::GreaterThan,
            ConditionOperator::LessThan,
        ];

        ALL
    }
}

impl FromStr for ConditionOperator {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|operator| operator.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown condition operator '{value}'")))
    }
}

/// Predicate over an access context gating a matching permission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionCondition {
    field: NonEmptyString,
    operator: ConditionOperator,
    value: ConditionValue,
}

impl PermissionCondition {
    /// Creates a validated condition.
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: ConditionValue,
    ) -> AppResult<Self> {
        if matches!(operator, ConditionOperator::In | ConditionOperator::NotIn)
            && !matches!(value, ConditionValue::List(_))
        {
            return Err(AppError::Validation(format!(
                "condition operator '{}' requires a list value",
                operator.as_str()
            )));
        }

        Ok(Self {
            field: NonEmptyString::new(field)?,
            operator,
            value,
        })
    }

    /// Returns the context field name.
    #[must_use]
    pub fn field(&self) -> &str {
        self.field.as_str()
    }

    /// Returns the comparison operator.
    #[must_use]
    pub fn operator(&self) -> ConditionOperator {
        self.operator
    }

    /// Returns the expected value.
    #[must_use]
    pub fn value(&self) -> &ConditionValue {
        &self.value
    }

    /// Evaluates this condition; a missing or mismatched value never passes.
    #[must_use]
    pub fn evaluate(&self, context: &AccessContext) -> bool {
        context
            .get(self.field.as_str())
            .is_some_and(|actual| evaluate_operator(self.operator, actual, &self.value))
    }
}

/// Returns whether every condition holds for the context.
#[must_use]
pub fn conditions_hold(conditions: &[PermissionCondition], context: &AccessContext) -> bool {
    conditions.iter().all(|condition| condition.evaluate(context))
}

fn evaluate_operator(
    operator: ConditionOperator,
    actual: &ConditionValue,
    expected: &ConditionValue,
) -> bool {
    match operator {
        ConditionOperator::Equals => actual == expected,
        ConditionOperator::NotEquals => actual.same_kind(expected) && actual != expected,
        ConditionOperator::Contains => match (actual, expected) {
            (ConditionValue::Text(haystack), ConditionValue::Text(needle)) => {
                haystack.contains(needle.as_str())
            }
            (ConditionValue::List(items), needle) => items.contains(needle),
            _ => false,
        },
        ConditionOperator::In => match expected {
            ConditionValue::List(items) => items.contains(actual),
            _ => false,
        },
        ConditionOperator::NotIn => match (actual, expected) {
            (ConditionValue::List(_), _) => false,
            (actual, ConditionValue::List(items)) => {
                items.iter().all(|item| item.same_kind(actual)) && !items.contains(actual)
            }
            _ => false,
        },
        ConditionOperator::GreaterThan => {
            compare_numbers(actual, expected).is_some_and(|ordering| ordering.is_gt())
        }
        ConditionOperator::LessThan => {
            compare_numbers(actual, expected).is_some_and(|ordering| ordering.is_lt())
        }
    }
}

fn compare_numbers(left: &ConditionValue, right: &ConditionValue) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (ConditionValue::Number(left), ConditionValue::Number(right)) => left.partial_cmp(right),
        _ => None,
    }
}
