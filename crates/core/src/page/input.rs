//! Keyboard input for [`Page`] via `Input.dispatchKeyEvent`.

use serde_json::{Value, json};

use super::Page;
use crate::error::{Error, Result};

/// Modifier keys, with their `Input.dispatchKeyEvent` bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
	Alt = 1,
	Control = 2,
	Meta = 4,
	Shift = 8,
}

impl Modifier {
	/// The modifier used for application shortcuts on this platform.
	pub fn platform() -> Self {
		if cfg!(target_os = "macos") {
			Modifier::Meta
		} else {
			Modifier::Control
		}
	}

	pub fn key_name(self) -> &'static str {
		match self {
			Modifier::Alt => "Alt",
			Modifier::Control => "Control",
			Modifier::Meta => "Meta",
			Modifier::Shift => "Shift",
		}
	}

	fn bit(self) -> u32 {
		self as u32
	}
}

#[derive(Debug, Clone, Copy)]
struct KeyDefinition {
	key: &'static str,
	code: &'static str,
	key_code: u32,
	text: Option<&'static str>,
	modifier: Option<Modifier>,
	/// 1 for left-hand modifier keys.
	location: u32,
}

impl KeyDefinition {
	const fn plain(key: &'static str, code: &'static str, key_code: u32, text: Option<&'static str>) -> Self {
		Self {
			key,
			code,
			key_code,
			text,
			modifier: None,
			location: 0,
		}
	}

	const fn modifier(key: &'static str, code: &'static str, key_code: u32, modifier: Modifier) -> Self {
		Self {
			key,
			code,
			key_code,
			text: None,
			modifier: Some(modifier),
			location: 1,
		}
	}
}

fn key_definition(name: &str) -> Option<KeyDefinition> {
	let definition = match name {
		"Alt" => KeyDefinition::modifier("Alt", "AltLeft", 18, Modifier::Alt),
		"Control" => KeyDefinition::modifier("Control", "ControlLeft", 17, Modifier::Control),
		"Meta" => KeyDefinition::modifier("Meta", "MetaLeft", 91, Modifier::Meta),
		"Shift" => KeyDefinition::modifier("Shift", "ShiftLeft", 16, Modifier::Shift),
		"Enter" => KeyDefinition::plain("Enter", "Enter", 13, Some("\r")),
		"Escape" => KeyDefinition::plain("Escape", "Escape", 27, None),
		"Tab" => KeyDefinition::plain("Tab", "Tab", 9, None),
		"BracketLeft" | "[" => KeyDefinition::plain("[", "BracketLeft", 219, Some("[")),
		"BracketRight" | "]" => KeyDefinition::plain("]", "BracketRight", 221, Some("]")),
		_ => return None,
	};
	Some(definition)
}

/// Sends key events to a [`Page`], tracking held modifiers.
#[derive(Debug)]
pub struct Keyboard {
	page: Page,
	modifiers: u32,
}

impl Keyboard {
	pub(super) fn new(page: Page) -> Self {
		Self { page, modifiers: 0 }
	}

	pub async fn down(&mut self, key: &str) -> Result<()> {
		let definition = key_definition(key).ok_or_else(|| Error::UnknownKey(key.to_string()))?;
		if let Some(modifier) = definition.modifier {
			self.modifiers |= modifier.bit();
		}
		let params = key_down_params(&definition, self.modifiers);
		self.page.send("Input.dispatchKeyEvent", params).await?;
		Ok(())
	}

	pub async fn up(&mut self, key: &str) -> Result<()> {
		let definition = key_definition(key).ok_or_else(|| Error::UnknownKey(key.to_string()))?;
		if let Some(modifier) = definition.modifier {
			self.modifiers &= !modifier.bit();
		}
		let params = key_up_params(&definition, self.modifiers);
		self.page.send("Input.dispatchKeyEvent", params).await?;
		Ok(())
	}

	pub async fn press(&mut self, key: &str) -> Result<()> {
		self.down(key).await?;
		self.up(key).await
	}

	/// Presses `key` while `modifier` is held.
	pub async fn chord(&mut self, modifier: Modifier, key: &str) -> Result<()> {
		self.down(modifier.key_name()).await?;
		let pressed = self.press(key).await;
		self.up(modifier.key_name()).await?;
		pressed
	}
}

fn key_down_params(definition: &KeyDefinition, modifiers: u32) -> Value {
	let mut params = json!({
		"type": if definition.text.is_some() { "keyDown" } else { "rawKeyDown" },
		"modifiers": modifiers,
		"key": definition.key,
		"code": definition.code,
		"windowsVirtualKeyCode": definition.key_code,
		"nativeVirtualKeyCode": definition.key_code,
		"location": definition.location,
		"autoRepeat": false,
		"isKeypad": false,
	});
	if let (Some(text), Some(obj)) = (definition.text, params.as_object_mut()) {
		obj.insert("text".to_string(), json!(text));
		obj.insert("unmodifiedText".to_string(), json!(text));
	}
	params
}

fn key_up_params(definition: &KeyDefinition, modifiers: u32) -> Value {
	json!({
		"type": "keyUp",
		"modifiers": modifiers,
		"key": definition.key,
		"code": definition.code,
		"windowsVirtualKeyCode": definition.key_code,
		"nativeVirtualKeyCode": definition.key_code,
		"location": definition.location,
	})
}
