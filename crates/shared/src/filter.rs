use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    Contains,
    In,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Set(Vec<Value>),
    Scalar(Value),
}

impl FilterValue {
    pub fn set<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        FilterValue::Set(values.into_iter().map(Into::into).collect())
    }

    /// Null, blank strings and sets without any non-null member carry no constraint.
    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::Scalar(value) => is_empty_scalar(value),
            FilterValue::Set(values) => values.iter().all(is_empty_scalar),
        }
    }

    fn members(&self) -> Vec<Value> {
        match self {
            FilterValue::Scalar(Value::Array(values)) | FilterValue::Set(values) => values
                .iter()
                .filter(|value| !is_empty_scalar(value))
                .cloned()
                .collect(),
            FilterValue::Scalar(value) => vec![value.clone()],
        }
    }
}

fn is_empty_scalar(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(values) => values.iter().all(is_empty_scalar),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Scalar(Value::from(value))
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Scalar(Value::from(value))
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Scalar(Value::from(value))
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Scalar(Value::from(value))
    }
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(values) => FilterValue::Set(values),
            other => FilterValue::Scalar(other),
        }
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FilterValue::Scalar(Value::Null), Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterPredicate {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Equals, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Contains, value)
    }

    pub fn one_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(field, FilterOperator::In, FilterValue::set(values))
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The `findInput` value for this predicate.
    pub fn encode(&self) -> Value {
        match self.operator {
            FilterOperator::Equals => match &self.value {
                FilterValue::Scalar(value) => value.clone(),
                FilterValue::Set(_) => json!({ "in": self.value.members() }),
            },
            FilterOperator::Contains => match &self.value {
                FilterValue::Scalar(value) => json!({ "contains": value }),
                FilterValue::Set(_) => json!({ "contains": self.value.members() }),
            },
            FilterOperator::In => json!({ "in": self.value.members() }),
        }
    }
}

/// Accumulated filter predicates keyed by field.
///
/// Never holds a predicate whose value is empty: setting one removes the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    predicates: BTreeMap<String, FilterPredicate>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the mapping changed.
    pub fn set(&mut self, predicate: FilterPredicate) -> bool {
        if predicate.is_empty() {
            return self.predicates.remove(&predicate.field).is_some();
        }
        match self.predicates.get(&predicate.field) {
            Some(existing) if *existing == predicate => false,
            _ => {
                self.predicates.insert(predicate.field.clone(), predicate);
                true
            }
        }
    }

    pub fn with(mut self, predicate: FilterPredicate) -> Self {
        self.set(predicate);
        self
    }

    pub fn remove(&mut self, field: &str) -> bool {
        self.predicates.remove(field).is_some()
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.predicates.is_empty();
        self.predicates.clear();
        changed
    }

    pub fn get(&self, field: &str) -> Option<&FilterPredicate> {
        self.predicates.get(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.predicates.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterPredicate> {
        self.predicates.values()
    }

    pub fn to_find_input(&self) -> Map<String, Value> {
        self.predicates
            .iter()
            .map(|(field, predicate)| (field.clone(), predicate.encode()))
            .collect()
    }
}

impl FromIterator<FilterPredicate> for FilterSet {
    fn from_iter<I: IntoIterator<Item = FilterPredicate>>(iter: I) -> Self {
        let mut set = FilterSet::new();
        for predicate in iter {
            set.set(predicate);
        }
        set
    }
}
