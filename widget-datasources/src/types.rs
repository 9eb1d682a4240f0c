use crate::schema::ArgumentSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::{borrow::Cow, collections::BTreeMap, fmt};

/// Label of the synthetic "no filter on this dimension" option.
pub const ALL_OPTION_LABEL: &str = "全部";
/// Value of the synthetic "no filter on this dimension" option.
pub const ALL_OPTION_VALUE: &str = "";

/// A bound argument value as it travels between the dashboard and the runtime.
///
/// JSON numbers with no fractional part deserialize as [`ArgValue::Number`]
/// even when written as floats (`300000.0`). Any other float is kept as its
/// text form, so it reaches validation instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    Number(i64),
    Text(String),
    List(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawArgValue {
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl From<RawArgValue> for ArgValue {
    fn from(value: RawArgValue) -> Self {
        match value {
            RawArgValue::Integer(n) => ArgValue::Number(n),
            RawArgValue::Float(f)
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
            {
                ArgValue::Number(f as i64)
            }
            RawArgValue::Float(f) => ArgValue::Text(f.to_string()),
            RawArgValue::Text(s) => ArgValue::Text(s),
            RawArgValue::List(items) => ArgValue::List(items),
        }
    }
}

impl<'de> Deserialize<'de> for ArgValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawArgValue::deserialize(deserializer).map(Into::into)
    }
}

impl ArgValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// Empty string or empty list. Numbers are never blank.
    pub fn is_blank(&self) -> bool {
        match self {
            ArgValue::Number(_) => false,
            ArgValue::Text(s) => s.is_empty(),
            ArgValue::List(items) => items.is_empty(),
        }
    }

    /// Blank, or a selection that contains the "all values" sentinel.
    /// Such values must not produce a backend filter.
    pub fn is_unfiltered(&self) -> bool {
        match self {
            ArgValue::List(items) => {
                items.is_empty() || items.iter().any(|item| item == ALL_OPTION_VALUE)
            }
            other => other.is_blank(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numbers, and strings holding an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            ArgValue::Text(s) => s.trim().parse().ok(),
            ArgValue::List(_) => None,
        }
    }

    /// Every non-empty component of the value as a string.
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            ArgValue::Number(n) => vec![n.to_string()],
            ArgValue::Text(s) if s.is_empty() => vec![],
            ArgValue::Text(s) => vec![s.clone()],
            ArgValue::List(items) => items.iter().filter(|s| !s.is_empty()).cloned().collect(),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Number(n) => write!(f, "{n}"),
            ArgValue::Text(s) => f.write_str(s),
            ArgValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<Vec<String>> for ArgValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// One entry of a selector's option list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionItem {
    pub label: String,
    pub value: String,
}

impl OptionItem {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// The "全部" option standing for "no filter on this dimension".
    pub fn all() -> Self {
        Self::new(ALL_OPTION_LABEL, ALL_OPTION_VALUE)
    }

    pub fn is_all(&self) -> bool {
        self.value == ALL_OPTION_VALUE
    }
}

/// One `{arg, val}` pair as submitted by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgBinding {
    pub arg: String,
    pub val: ArgValue,
}

impl ArgBinding {
    pub fn new(arg: impl Into<String>, val: impl Into<ArgValue>) -> Self {
        Self {
            arg: arg.into(),
            val: val.into(),
        }
    }
}

/// Name to value mapping built once per refresh. Read-only after binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedArgs {
    values: BTreeMap<String, ArgValue>,
}

impl ResolvedArgs {
    pub(crate) fn from_map(values: BTreeMap<String, ArgValue>) -> Self {
        Self { values }
    }

    pub(crate) fn into_map(self) -> BTreeMap<String, ArgValue> {
        self.values
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// The value unless it is blank or selects "all values".
    pub fn filter_value(&self, name: &str) -> Option<&ArgValue> {
        self.get(name).filter(|value| !value.is_unfiltered())
    }

    pub fn number(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ArgValue::as_i64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Values of an argument's upstream dependencies, in `depends_on` order.
/// `None` marks an upstream argument without a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UpstreamValues(Vec<Option<ArgValue>>);

impl UpstreamValues {
    pub fn new(values: Vec<Option<ArgValue>>) -> Self {
        Self(values)
    }

    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.0.get(index).and_then(Option::as_ref)
    }

    /// Positional value rendered as a string; absent values render as `""`.
    pub fn text(&self, index: usize) -> Cow<'_, str> {
        match self.get(index) {
            None => Cow::Borrowed(""),
            Some(ArgValue::Text(s)) => Cow::Borrowed(s),
            Some(other) => Cow::Owned(other.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Option<ArgValue>> {
        self.0
    }
}

/// Mutable working values of a configuration session.
///
/// Unlike [`ResolvedArgs`] it changes as the user edits selectors; setting an
/// upstream argument clears everything downstream of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    values: BTreeMap<String, ArgValue>,
}

impl Selection {
    pub fn from_bindings(bindings: impl IntoIterator<Item = ArgBinding>) -> Self {
        Self {
            values: crate::binder::bind(bindings).into_map(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Set `name` to `value` and clear the values of all of its transitive
    /// dependents. Returns the names whose values were cleared.
    ///
    /// Setting the value it already holds clears nothing.
    pub fn select(&mut self, schema: &ArgumentSchema, name: &str, value: ArgValue) -> Vec<String> {
        if self.values.get(name) == Some(&value) {
            return vec![];
        }
        self.values.insert(name.to_owned(), value);
        self.clear_dependents(schema, name)
    }

    /// Remove the value of `name`, clearing its dependents as well.
    pub fn unset(&mut self, schema: &ArgumentSchema, name: &str) -> Vec<String> {
        if self.values.remove(name).is_none() {
            return vec![];
        }
        self.clear_dependents(schema, name)
    }

    fn clear_dependents(&mut self, schema: &ArgumentSchema, name: &str) -> Vec<String> {
        schema
            .dependents_of(name)
            .iter()
            .filter(|dependent| self.values.remove(dependent.as_str()).is_some())
            .cloned()
            .collect()
    }

    pub fn to_bindings(&self) -> Vec<ArgBinding> {
        self.values
            .iter()
            .map(|(arg, val)| ArgBinding {
                arg: arg.clone(),
                val: val.clone(),
            })
            .collect()
    }

    pub fn to_resolved(&self) -> ResolvedArgs {
        ResolvedArgs::from_map(self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(ArgValue::text(""), true, true)]
    #[case(ArgValue::text("S1"), false, false)]
    #[case(ArgValue::Number(0), false, false)]
    #[case(ArgValue::List(vec![]), true, true)]
    #[case(ArgValue::list(["", "A1"]), false, true)]
    #[case(ArgValue::list(["A1", "A2"]), false, false)]
    fn blank_and_unfiltered(
        #[case] value: ArgValue,
        #[case] blank: bool,
        #[case] unfiltered: bool,
    ) {
        assert_eq!(value.is_blank(), blank);
        assert_eq!(value.is_unfiltered(), unfiltered);
    }

    #[test]
    fn values_deserialize_untagged() {
        let values: Vec<ArgValue> =
            serde_json::from_value(serde_json::json!([300000, "past1hour", ["A1", "A2"]]))
                .unwrap();
        assert_eq!(
            values,
            vec![
                ArgValue::Number(300000),
                ArgValue::text("past1hour"),
                ArgValue::list(["A1", "A2"]),
            ]
        );
    }

    #[rstest]
    #[case(serde_json::json!(300000.0), ArgValue::Number(300000))]
    #[case(serde_json::json!(-2.0), ArgValue::Number(-2))]
    #[case(serde_json::json!(1.5), ArgValue::text("1.5"))]
    #[case(serde_json::json!(1e300), ArgValue::text(1e300.to_string()))]
    fn float_numbers_deserialize(#[case] json: serde_json::Value, #[case] expected: ArgValue) {
        let value: ArgValue = serde_json::from_value(json).unwrap();
        assert_eq!(value, expected);
    }

    #[test]
    fn upstream_absent_renders_empty() {
        let upstream = UpstreamValues::new(vec![None, Some(ArgValue::Number(7))]);
        assert_eq!(upstream.text(0), "");
        assert_eq!(upstream.text(1), "7");
        assert_eq!(upstream.text(5), "");
    }
}
