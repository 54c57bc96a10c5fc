//! Rendering resolved variable values into template text.

use scopevars_deps::VariableRef;

use crate::context::VariableLookup;
use crate::value::VariableValue;

#[cfg(test)]
mod tests;

/// Turns a template into text using the variables visible in one scope.
pub trait Interpolator: Send + Sync {
	fn interpolate(&self, template: &str, lookup: &dyn VariableLookup) -> String;
}

/// Built-in formatter for the common interpolation formats.
///
/// Multi-values render as `{a,b}` by default (glob), or per the reference's
/// format: `csv`, `pipe`, `raw`, `json`, `text`. References that do not resolve
/// are left in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainInterpolator;

impl Interpolator for PlainInterpolator {
	fn interpolate(&self, template: &str, lookup: &dyn VariableLookup) -> String {
		scopevars_deps::interpolate(template, |reference| render(reference, lookup))
	}
}

fn render(reference: &VariableRef<'_>, lookup: &dyn VariableLookup) -> Option<String> {
	let variable = lookup.lookup_variable(reference.name)?;
	if reference.format == Some("text") {
		return Some(variable.value_text(reference.field_path));
	}
	let value = variable.value(reference.field_path)?;
	if let VariableValue::Custom(custom) = &value {
		return Some(custom.format(reference.format));
	}

	let values = value.to_list();
	let rendered = match reference.format {
		Some("csv" | "raw") => values.join(","),
		Some("pipe") => values.join("|"),
		Some("json") => match &value {
			VariableValue::Json(json) => json.to_string(),
			VariableValue::List(items) => serde_json::to_string(items).unwrap_or_default(),
			other => serde_json::Value::String(other.to_plain_string()).to_string(),
		},
		_ => match &value {
			VariableValue::List(items) if items.len() > 1 => format!("{{{}}}", items.join(",")),
			other => other.to_plain_string(),
		},
	};
	Some(rendered)
}
