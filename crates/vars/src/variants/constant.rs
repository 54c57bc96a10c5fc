use crate::value::{VariableText, VariableValue};
use crate::variable::{Variable, VariableCore, VariableKind};

/// A fixed value that never needs revalidation.
#[derive(Debug)]
pub struct ConstantVariable {
	core: VariableCore,
}

impl ConstantVariable {
	/// Text mirrors the value's plain rendering.
	pub fn new(name: impl Into<String>, value: impl Into<VariableValue>) -> Self {
		let value = value.into();
		let text = VariableText::Single(value.to_plain_string());
		Self::with_text(name, value, text)
	}

	pub fn with_text(name: impl Into<String>, value: VariableValue, text: VariableText) -> Self {
		let core = VariableCore::new(name, VariableKind::Constant, value, text);
		core.update(|s| s.skip_url_sync = true);
		Self { core }
	}
}

impl Variable for ConstantVariable {
	fn core(&self) -> &VariableCore {
		&self.core
	}
}
