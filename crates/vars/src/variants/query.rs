use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::multi::{MultiValueConfig, MultiValueVariable, OptionSource, OptionsDefinition, VariableOption};
use crate::context::UpdateContext;
use crate::error::VariableError;
use crate::variable::VariableKind;

/// The query pipeline that answers a query variable's query.
#[async_trait]
pub trait QueryRunner: Send + Sync {
	async fn run(&self, query: &str, ctx: &UpdateContext) -> Result<Vec<VariableOption>, VariableError>;

	fn cancel(&self) {}
}

/// [`OptionSource`] backed by a [`QueryRunner`].
#[derive(Clone)]
pub struct QueryOptions {
	runner: Arc<dyn QueryRunner>,
}

impl QueryOptions {
	pub fn new(runner: Arc<dyn QueryRunner>) -> Self {
		Self { runner }
	}
}

#[async_trait]
impl OptionSource for QueryOptions {
	async fn options(&self, query: &str, ctx: &UpdateContext) -> Result<Vec<VariableOption>, VariableError> {
		self.runner.run(query, ctx).await
	}

	fn cancel(&self) {
		self.runner.cancel();
	}
}

impl MultiValueVariable {
	/// Variable whose options come from running `definition` through `runner`.
	pub fn query(name: impl Into<String>, definition: OptionsDefinition, runner: Arc<dyn QueryRunner>, config: MultiValueConfig) -> Self {
		Self::new(name, VariableKind::Query, definition, Arc::new(QueryOptions::new(runner)), config)
	}
}

/// Compiles `pattern`, accepting `/pattern/flags` notation.
fn compile(pattern: &str) -> Result<Regex, VariableError> {
	let source = match pattern.strip_prefix('/').and_then(|rest| rest.rsplit_once('/')) {
		Some((body, flags)) if flags.chars().all(|c| "gimsuy".contains(c)) => {
			let inline: String = flags.chars().filter(|c| "ims".contains(*c)).collect();
			if inline.is_empty() { body.to_string() } else { format!("(?{inline}){body}") }
		}
		_ => pattern.to_string(),
	};
	Regex::new(&source).map_err(|e| VariableError::InvalidRegex {
		pattern: pattern.to_string(),
		message: e.to_string(),
	})
}

/// Filters and rewrites options through `pattern`, matched against each value.
///
/// Options that do not match are dropped. Named groups `value` and `text`
/// pick the new value and label. Without them the first capture group is
/// used, once per match. Results are de-duplicated by value.
pub fn apply_regex(options: Vec<VariableOption>, pattern: &str) -> Result<Vec<VariableOption>, VariableError> {
	let regex = compile(pattern)?;
	let named = regex.capture_names().flatten().any(|n| n == "value" || n == "text");
	let mut out: Vec<VariableOption> = Vec::new();
	let mut push = |option: VariableOption| {
		if !out.iter().any(|o| o.value == option.value) {
			out.push(option);
		}
	};

	for option in options {
		let matches: Vec<_> = regex.captures_iter(&option.value).collect();
		if matches.is_empty() {
			continue;
		}
		if named {
			let group = |name: &str| matches.iter().find_map(|c| c.name(name)).map(|m| m.as_str().to_string());
			let (value, text) = (group("value"), group("text"));
			let value = value.or_else(|| text.clone()).unwrap_or_else(|| option.value.clone());
			let label = text.unwrap_or_else(|| value.clone());
			push(VariableOption::new(label, value));
			continue;
		}
		let groups: Vec<&str> = matches.iter().filter_map(|c| c.get(1)).map(|m| m.as_str()).collect();
		if groups.is_empty() {
			push(option.clone());
		}
		for group in groups {
			push(VariableOption::plain(group));
		}
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn plain(values: &[&str]) -> Vec<VariableOption> {
		values.iter().map(|v| VariableOption::plain(*v)).collect()
	}

	#[test]
	fn first_group_extracts_and_filters() {
		let out = apply_regex(plain(&["web-01", "web-02", "db-01", "web-01"]), "web-(\\d+)").unwrap();
		assert_eq!(out, plain(&["01", "02"]));
	}

	#[test]
	fn named_groups_split_label_and_value() {
		let out = apply_regex(plain(&["host=a;zone=eu"]), "/host=(?P<value>\\w+);zone=(?P<text>\\w+)/").unwrap();
		assert_eq!(out, vec![VariableOption::new("eu", "a")]);
	}

	#[test]
	fn pattern_without_groups_keeps_matching_options() {
		let out = apply_regex(plain(&["Alpha", "beta"]), "/^a/i").unwrap();
		assert_eq!(out, plain(&["Alpha"]));
	}

	#[test]
	fn invalid_pattern_is_reported() {
		let err = apply_regex(plain(&["x"]), "(").unwrap_err();
		assert!(matches!(err, VariableError::InvalidRegex { .. }), "{err}");
	}
}
