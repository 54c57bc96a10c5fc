//! Variable values and display text.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

#[cfg(test)]
mod tests;

/// Stored value of the "all" pseudo-option.
pub const ALL_VALUE: &str = "$__all";
/// Display text of the "all" pseudo-option.
pub const ALL_TEXT: &str = "All";

/// Value object that renders itself, e.g. a custom "all" value.
pub trait CustomValue: fmt::Debug + Send + Sync {
	/// Renders the value for an interpolation format (`None` = default).
	fn format(&self, format: Option<&str>) -> String;
}

/// A variable's current value.
#[derive(Debug, Clone)]
pub enum VariableValue {
	Text(String),
	List(Vec<String>),
	/// Structured value reachable through field paths.
	Json(Value),
	Custom(Arc<dyn CustomValue>),
}

impl Default for VariableValue {
	fn default() -> Self {
		Self::Text(String::new())
	}
}

impl PartialEq for VariableValue {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Text(a), Self::Text(b)) => a == b,
			(Self::List(a), Self::List(b)) => a == b,
			(Self::Json(a), Self::Json(b)) => a == b,
			(Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b) || a.format(None) == b.format(None),
			_ => false,
		}
	}
}

impl VariableValue {
	/// Whether this is the "all" pseudo-value, single or multi form.
	pub fn is_all(&self) -> bool {
		match self {
			Self::Text(s) => s == ALL_VALUE,
			Self::List(items) => items.iter().any(|s| s == ALL_VALUE),
			_ => false,
		}
	}

	/// Individual values as strings.
	pub fn to_list(&self) -> Vec<String> {
		match self {
			Self::Text(s) => vec![s.clone()],
			Self::List(items) => items.clone(),
			Self::Json(Value::Array(items)) => items.iter().map(json_to_string).collect(),
			Self::Json(v) => vec![json_to_string(v)],
			Self::Custom(c) => vec![c.format(None)],
		}
	}

	/// Plain rendering: lists joined with `,`.
	pub fn to_plain_string(&self) -> String {
		match self {
			Self::Text(s) => s.clone(),
			Self::List(items) => items.join(","),
			Self::Json(v) => json_to_string(v),
			Self::Custom(c) => c.format(None),
		}
	}

	/// Resolves a dotted field path. List values accept numeric segments.
	pub fn field(&self, path: &str) -> Option<VariableValue> {
		match self {
			Self::Json(root) => {
				let mut current = root;
				for segment in path.split('.') {
					current = match current {
						Value::Object(map) => map.get(segment)?,
						Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
						_ => return None,
					};
				}
				Some(Self::Json(current.clone()))
			}
			Self::List(items) => items.get(path.parse::<usize>().ok()?).cloned().map(Self::Text),
			_ => None,
		}
	}
}

impl From<&str> for VariableValue {
	fn from(s: &str) -> Self {
		Self::Text(s.to_string())
	}
}

impl From<String> for VariableValue {
	fn from(s: String) -> Self {
		Self::Text(s)
	}
}

impl From<Vec<String>> for VariableValue {
	fn from(items: Vec<String>) -> Self {
		Self::List(items)
	}
}

/// Display label(s) mirroring a [`VariableValue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableText {
	Single(String),
	List(Vec<String>),
}

impl Default for VariableText {
	fn default() -> Self {
		Self::Single(String::new())
	}
}

impl VariableText {
	/// Joins multiple labels with ` + `.
	pub fn display(&self) -> String {
		match self {
			Self::Single(s) => s.clone(),
			Self::List(items) => items.join(" + "),
		}
	}
}

impl From<&str> for VariableText {
	fn from(s: &str) -> Self {
		Self::Single(s.to_string())
	}
}

impl From<String> for VariableText {
	fn from(s: String) -> Self {
		Self::Single(s)
	}
}

impl From<Vec<String>> for VariableText {
	fn from(items: Vec<String>) -> Self {
		Self::List(items)
	}
}

/// Value used for "all" when a custom all-value string is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAllValue {
	value: String,
}

impl CustomAllValue {
	pub fn new(value: impl Into<String>) -> Self {
		Self { value: value.into() }
	}
}

impl CustomValue for CustomAllValue {
	fn format(&self, _format: Option<&str>) -> String {
		self.value.clone()
	}
}

fn json_to_string(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}
