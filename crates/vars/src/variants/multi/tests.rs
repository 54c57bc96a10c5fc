use pretty_assertions::assert_eq;

use super::*;

fn opts(values: &[&str]) -> Vec<VariableOption> {
	values.iter().map(|v| VariableOption::plain(*v)).collect()
}

fn multi() -> MultiValueConfig {
	MultiValueConfig {
		is_multi: true,
		..MultiValueConfig::default()
	}
}

fn list(values: &[&str]) -> Vec<String> {
	values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn multi_keeps_valid_values_in_order() {
	let (value, text) = reconcile(
		&multi(),
		&VariableValue::List(list(&["c", "gone", "a"])),
		&VariableText::List(list(&["c", "gone", "a"])),
		&opts(&["a", "b", "c"]),
	);
	assert_eq!(value, VariableValue::List(list(&["c", "a"])));
	assert_eq!(text, VariableText::List(list(&["c", "a"])));
}

#[test]
fn multi_without_valid_values_uses_default() {
	let current = VariableValue::List(list(&["gone"]));
	let text = VariableText::List(list(&["gone"]));

	let (value, _) = reconcile(&multi(), &current, &text, &opts(&["a", "b"]));
	assert_eq!(value, VariableValue::List(list(&["a"])));

	let to_all = MultiValueConfig {
		default_to_all: true,
		..multi()
	};
	let (value, text) = reconcile(&to_all, &current, &text, &opts(&["a", "b"]));
	assert_eq!(value, VariableValue::List(list(&[ALL_VALUE])));
	assert_eq!(text, VariableText::List(list(&[ALL_TEXT])));
}

#[test]
fn single_matches_by_value_then_text() {
	let config = MultiValueConfig::default();
	let options = vec![VariableOption::new("Production", "prod"), VariableOption::new("Staging", "stage")];

	let (value, text) = reconcile(&config, &VariableValue::from("stage"), &VariableText::from("old label"), &options);
	assert_eq!((value, text), (VariableValue::from("stage"), VariableText::from("Staging")));

	let (value, _) = reconcile(&config, &VariableValue::from("renamed"), &VariableText::from("Production"), &options);
	assert_eq!(value, VariableValue::from("prod"));

	let (value, _) = reconcile(&config, &VariableValue::from("gone"), &VariableText::from("gone"), &options);
	assert_eq!(value, VariableValue::from("prod"));
}

#[test]
fn all_value_survives_only_with_include_all() {
	let current = VariableValue::from(ALL_VALUE);
	let text = VariableText::from(ALL_TEXT);
	let with_all = MultiValueConfig {
		include_all: true,
		..MultiValueConfig::default()
	};
	assert_eq!(reconcile(&with_all, &current, &text, &opts(&["a"])).0, current);
	assert_eq!(reconcile(&MultiValueConfig::default(), &current, &text, &opts(&["a"])).0, VariableValue::from("a"));
}

#[test]
fn empty_options() {
	let current = VariableValue::from("a");
	let text = VariableText::from("a");
	assert_eq!(reconcile(&MultiValueConfig::default(), &current, &text, &[]).0, VariableValue::default());
	assert_eq!(reconcile(&multi(), &current, &text, &[]).0, VariableValue::List(Vec::new()));
	let with_all = MultiValueConfig {
		include_all: true,
		..MultiValueConfig::default()
	};
	assert_eq!(reconcile(&with_all, &current, &text, &[]).0, VariableValue::from(ALL_VALUE));
}

#[test]
fn all_selection_signals_when_options_change() {
	let config = MultiValueConfig {
		include_all: true,
		default_to_all: true,
		..MultiValueConfig::default()
	};
	let variable = MultiValueVariable::custom("v", "a,b", config);
	assert!(variable.apply_options(opts(&["a", "b"])));
	assert!(variable.has_all_value());
	assert!(!variable.apply_options(opts(&["a", "b"])));
	assert!(variable.apply_options(opts(&["a", "b", "c"])));
	assert_eq!(variable.value(None), Some(VariableValue::List(list(&["a", "b", "c"]))));
	assert_eq!(variable.value_text(None), ALL_TEXT);
}

#[test]
fn custom_all_value_replaces_option_list() {
	let config = MultiValueConfig {
		include_all: true,
		default_to_all: true,
		all_value: Some(".*".into()),
		..MultiValueConfig::default()
	};
	let variable = MultiValueVariable::custom("v", "a,b", config);
	variable.apply_options(opts(&["a", "b"]));
	let value = variable.value(None).unwrap();
	assert!(matches!(&value, VariableValue::Custom(c) if c.format(None) == ".*"));
}

#[test]
fn restored_value_skips_one_validation() {
	let variable = MultiValueVariable::custom("v", "a,b", MultiValueConfig::default());
	variable.restore_value(VariableValue::from("restored"), VariableText::from("restored"));

	assert!(!variable.apply_options(opts(&["a", "b"])));
	assert_eq!(variable.core().value(), VariableValue::from("restored"));
	assert_eq!(variable.options(), opts(&["a", "b"]));

	assert!(variable.apply_options(opts(&["a", "b"])));
	assert_eq!(variable.core().value(), VariableValue::from("a"));
}

#[tokio::test]
async fn custom_variable_updates_from_its_query() {
	let variable = MultiValueVariable::custom("env", "dev, Production : prod", MultiValueConfig::default());
	variable.select(&["prod"]);
	variable.validate_and_update(&UpdateContext::detached()).await.unwrap();
	assert_eq!(variable.core().value(), VariableValue::from("prod"));
	assert_eq!(variable.value_text(None), "Production");
	assert_eq!(variable.options().len(), 2);
}

#[tokio::test]
async fn regex_filters_fetched_options() {
	let definition = OptionsDefinition::new("web-01,web-02,db-01").with_regex("web-(\\d+)");
	let variable = MultiValueVariable::new("host", VariableKind::Custom, definition, Arc::new(crate::variants::CustomOptions), multi());
	variable.validate_and_update(&UpdateContext::detached()).await.unwrap();
	assert_eq!(variable.options(), opts(&["01", "02"]));
	assert_eq!(variable.core().value(), VariableValue::List(list(&["01"])));
}

#[test]
fn dependencies_track_query_and_regex() {
	let variable = MultiValueVariable::custom("v", "$region", MultiValueConfig::default());
	assert!(variable.has_dependency_on("region"));
	variable.set_definition(OptionsDefinition::new("static").with_regex("${zone}"));
	assert!(!variable.has_dependency_on("region"));
	assert!(variable.has_dependency_on("zone"));
}
