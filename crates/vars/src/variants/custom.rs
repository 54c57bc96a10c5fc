use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use super::multi::{MultiValueConfig, MultiValueVariable, OptionSource, OptionsDefinition, VariableOption};
use crate::context::UpdateContext;
use crate::error::VariableError;
use crate::variable::VariableKind;

static ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:\\,|[^,])+").expect("custom option pattern is valid"));
static LABELLED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(.+)\s:\s(.+)$").expect("custom label pattern is valid"));

/// Parses a comma separated option list.
///
/// `\,` escapes a comma inside an item and `label : value` gives an item a
/// label distinct from its value.
pub fn parse_custom_options(query: &str) -> Vec<VariableOption> {
	ITEM.find_iter(query)
		.filter_map(|item| {
			let text = item.as_str().replace(r"\,", ",");
			if let Some(caps) = LABELLED.captures(&text) {
				return Some(VariableOption::new(caps[1].trim(), caps[2].trim()));
			}
			let text = text.trim();
			(!text.is_empty()).then(|| VariableOption::plain(text))
		})
		.collect()
}

/// Options written out in the variable's own query.
#[derive(Debug, Default, Clone, Copy)]
pub struct CustomOptions;

#[async_trait]
impl OptionSource for CustomOptions {
	async fn options(&self, query: &str, _ctx: &UpdateContext) -> Result<Vec<VariableOption>, VariableError> {
		Ok(parse_custom_options(query))
	}
}

impl MultiValueVariable {
	/// Variable over a literal option list such as `a, b, label : c`.
	pub fn custom(name: impl Into<String>, query: impl Into<String>, config: MultiValueConfig) -> Self {
		Self::new(name, VariableKind::Custom, OptionsDefinition::new(query), Arc::new(CustomOptions), config)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn splits_on_unescaped_commas() {
		assert_eq!(
			parse_custom_options(r"a, b\,c ,d"),
			vec![VariableOption::plain("a"), VariableOption::plain("b,c"), VariableOption::plain("d")]
		);
	}

	#[test]
	fn labelled_items() {
		assert_eq!(
			parse_custom_options("Production : prod, staging"),
			vec![VariableOption::new("Production", "prod"), VariableOption::plain("staging")]
		);
	}

	#[test]
	fn blank_items_are_dropped() {
		assert_eq!(parse_custom_options(" , x,,"), vec![VariableOption::plain("x")]);
	}
}
