use crate::value::{VariableText, VariableValue};
use crate::variable::{Variable, VariableCore, VariableKind};

/// Free text entered by the user.
#[derive(Debug)]
pub struct TextBoxVariable {
	core: VariableCore,
}

impl TextBoxVariable {
	pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
		let value = value.into();
		Self {
			core: VariableCore::new(name, VariableKind::TextBox, VariableValue::Text(value.clone()), VariableText::Single(value)),
		}
	}

	/// Replaces the text. Returns whether it changed.
	pub fn set_value(&self, value: impl Into<String>) -> bool {
		let value = value.into();
		self.core.set_value(VariableValue::Text(value.clone()), VariableText::Single(value))
	}
}

impl Variable for TextBoxVariable {
	fn core(&self) -> &VariableCore {
		&self.core
	}
}
