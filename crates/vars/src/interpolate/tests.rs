use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::context::VariableLookup;
use crate::value::{CustomAllValue, VariableText, VariableValue};
use crate::variable::Variable;
use crate::variants::ConstantVariable;

struct Fixed(Vec<Arc<dyn Variable>>);

impl VariableLookup for Fixed {
	fn lookup_variable(&self, name: &str) -> Option<Arc<dyn Variable>> {
		self.0.iter().find(|v| v.name() == name).cloned()
	}
}

fn lookup() -> Fixed {
	let hosts = ConstantVariable::with_text(
		"hosts",
		VariableValue::List(vec!["a".into(), "b".into()]),
		VariableText::List(vec!["A".into(), "B".into()]),
	);
	let any = ConstantVariable::new("any", VariableValue::Custom(Arc::new(CustomAllValue::new(".*"))));
	let labels = ConstantVariable::new("labels", VariableValue::Json(serde_json::json!({ "zone": "eu" })));
	Fixed(vec![
		Arc::new(ConstantVariable::new("env", "prod")),
		Arc::new(hosts),
		Arc::new(any),
		Arc::new(labels),
	])
}

#[test]
fn single_values_render_plainly() {
	assert_eq!(PlainInterpolator.interpolate("env=$env [[env]] ${env}", &lookup()), "env=prod prod prod");
}

#[test]
fn multi_values_follow_format() {
	let lookup = lookup();
	let cases = [
		("$hosts", "{a,b}"),
		("${hosts:csv}", "a,b"),
		("${hosts:pipe}", "a|b"),
		("[[hosts:raw]]", "a,b"),
		("${hosts:json}", r#"["a","b"]"#),
		("${hosts:text}", "A + B"),
	];
	for (template, expected) in cases {
		assert_eq!(PlainInterpolator.interpolate(template, &lookup), expected, "{template}");
	}
}

#[test]
fn field_paths_and_custom_values() {
	let lookup = lookup();
	assert_eq!(PlainInterpolator.interpolate("${labels.zone}", &lookup), "eu");
	assert_eq!(PlainInterpolator.interpolate("host=~$any", &lookup), "host=~.*");
}

#[test]
fn unresolved_references_are_kept() {
	assert_eq!(PlainInterpolator.interpolate("$__interval and ${missing:csv}", &lookup()), "$__interval and ${missing:csv}");
}
