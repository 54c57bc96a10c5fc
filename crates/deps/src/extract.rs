use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;


/// Set of referenced variable names. Ordered only to keep logs stable.
pub type NameSet = BTreeSet<String>;

static VARIABLE_REF: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\$(\w+)|\[\[(\w+?)(?::(\w+))?\]\]|\$\{(\w+)(?:\.([^:^\}]+))?(?::([^\}]+))?\}").expect("variable reference pattern is valid")
});

/// Syntax a reference was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefSyntax {
	/// `$name`
	Bare,
	/// `[[name]]` / `[[name:format]]`
	Bracketed,
	/// `${name}` / `${name.path}` / `${name:format}`
	Braced,
}

/// One variable reference found in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRef<'a> {
	pub name: &'a str,
	pub field_path: Option<&'a str>,
	pub format: Option<&'a str>,
	pub syntax: RefSyntax,
	/// Byte range of the whole reference in the scanned text.
	pub span: Range<usize>,
}

impl<'a> VariableRef<'a> {
	fn from_captures(caps: &Captures<'a>) -> Option<Self> {
		let whole = caps.get(0)?;
		let text = |i: usize| caps.get(i).map(|m| m.as_str());
		let (name, field_path, format, syntax) = if let Some(name) = text(1) {
			(name, None, None, RefSyntax::Bare)
		} else if let Some(name) = text(2) {
			(name, None, text(3), RefSyntax::Bracketed)
		} else {
			(text(4)?, text(5), text(6), RefSyntax::Braced)
		};
		Some(Self {
			name,
			field_path,
			format,
			syntax,
			span: whole.range(),
		})
	}
}

/// Iterates every variable reference in `text`, left to right.
pub fn references(text: &str) -> impl Iterator<Item = VariableRef<'_>> {
	VARIABLE_REF.captures_iter(text).filter_map(|caps| VariableRef::from_captures(&caps))
}

/// Adds the names referenced by `text` to `out`.
pub fn extract_names(text: &str, out: &mut NameSet) {
	if !text.contains(['$', '[']) {
		return;
	}
	for reference in references(text) {
		out.insert(reference.name.to_string());
	}
}

/// Adds the names referenced anywhere in a JSON document (keys and strings).
pub fn scan_json(value: &Value, out: &mut NameSet) {
	match value {
		Value::String(s) => extract_names(s, out),
		Value::Array(items) => items.iter().for_each(|item| scan_json(item, out)),
		Value::Object(map) => {
			for (key, item) in map {
				extract_names(key, out);
				scan_json(item, out);
			}
		}
		Value::Null | Value::Bool(_) | Value::Number(_) => {}
	}
}

/// Serializes `state` and scans the result.
pub fn scan_state<T: Serialize + ?Sized>(state: &T) -> Result<NameSet, serde_json::Error> {
	let value = serde_json::to_value(state)?;
	let mut names = NameSet::new();
	scan_json(&value, &mut names);
	Ok(names)
}

/// Replaces each reference in `template` with `resolve`'s answer.
///
/// References `resolve` declines (returns `None` for) are kept verbatim.
pub fn interpolate(template: &str, mut resolve: impl FnMut(&VariableRef<'_>) -> Option<String>) -> String {
	let mut out = String::with_capacity(template.len());
	let mut last = 0;
	for reference in references(template) {
		out.push_str(&template[last..reference.span.start]);
		match resolve(&reference) {
			Some(text) => out.push_str(&text),
			None => out.push_str(&template[reference.span.clone()]),
		}
		last = reference.span.end;
	}
	out.push_str(&template[last..]);
	out
}
