//! Flat-or-nested XML messages exchanged with the platform.
//!
//! Every message has the root element `<xml>`; children are either text (plain or
//! CDATA) or nested element lists. Field order is preserved.

// std
use std::borrow::Cow;
// crates.io
use quick_xml::{
	Reader, Writer,
	events::{BytesEnd, BytesStart, BytesText, Event},
};
// self
use crate::{_prelude::*, error::FormatError};

const ROOT: &str = "xml";

/// Value of a message field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
	/// Text content.
	Text(String),
	/// Child elements.
	Nested(PlatformMessage),
}

/// Named field of a [`PlatformMessage`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageField {
	/// Element name.
	pub name: String,
	/// Element content.
	pub value: FieldValue,
}

/// Structured protocol message rooted at `<xml>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformMessage {
	/// Fields in document order.
	pub fields: Vec<MessageField>,
}
impl PlatformMessage {
	/// Creates an empty message.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a text field.
	pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.push_text(name, value);

		self
	}

	/// Appends a nested field.
	pub fn with_nested(mut self, name: impl Into<String>, value: PlatformMessage) -> Self {
		self.fields.push(MessageField { name: name.into(), value: FieldValue::Nested(value) });

		self
	}

	/// Appends a text field in place.
	pub fn push_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.fields.push(MessageField { name: name.into(), value: FieldValue::Text(value.into()) });
	}

	/// Returns the text of the first field with the given name.
	///
	/// A self-closed element (`<Name/>`) reads as empty text.
	pub fn text(&self, name: &str) -> Option<&str> {
		self.fields.iter().find(|field| field.name == name).and_then(|field| match &field.value {
			FieldValue::Text(text) => Some(text.as_str()),
			FieldValue::Nested(nested) if nested.fields.is_empty() => Some(""),
			FieldValue::Nested(_) => None,
		})
	}

	/// Returns the first nested field with the given name.
	pub fn nested(&self, name: &str) -> Option<&PlatformMessage> {
		self.fields.iter().find(|field| field.name == name).and_then(|field| match &field.value {
			FieldValue::Nested(nested) => Some(nested),
			FieldValue::Text(_) => None,
		})
	}

	/// Like [`text`](Self::text) but fails when the field is missing.
	pub fn require_text(&self, name: &'static str) -> Result<&str, FormatError> {
		self.text(name).ok_or(FormatError::MissingElement { element: name })
	}

	/// Parses a message, ignoring any declaration, comments, or whitespace around the root.
	pub fn from_xml(xml: &str) -> Result<Self, FormatError> {
		let mut reader = Reader::from_str(xml);

		loop {
			match reader.read_event().map_err(FormatError::xml)? {
				Event::Start(_) => {
					return match read_value(&mut reader)? {
						FieldValue::Nested(message) => Ok(message),
						FieldValue::Text(_) => Ok(Self::default()),
					};
				},
				Event::Empty(_) => return Ok(Self::default()),
				Event::Eof => return Err(FormatError::MissingElement { element: ROOT }),
				_ => continue,
			}
		}
	}

	/// Serializes the message under a `<xml>` root, escaping text content.
	pub fn to_xml(&self) -> Result<String, FormatError> {
		let mut writer = Writer::new(Vec::new());

		write_element(&mut writer, ROOT, self)?;

		String::from_utf8(writer.into_inner()).map_err(|e| FormatError::Utf8(e.utf8_error()))
	}
}

fn element_name(start: &BytesStart) -> Result<String, FormatError> {
	Ok(std::str::from_utf8(start.name().as_ref())?.to_owned())
}

// Reads until the end tag matching an already consumed start tag.
fn read_value(reader: &mut Reader<&[u8]>) -> Result<FieldValue, FormatError> {
	let mut text = String::new();
	let mut children = Vec::new();

	loop {
		match reader.read_event().map_err(FormatError::xml)? {
			Event::Text(t) => text.push_str(&t.unescape().map_err(FormatError::xml)?),
			Event::CData(c) => text.push_str(&c.decode().map_err(FormatError::xml)?),
			Event::Start(start) => {
				let name = element_name(&start)?;
				let value = read_value(reader)?;

				children.push(MessageField { name, value });
			},
			Event::Empty(start) =>
				children.push(MessageField {
					name: element_name(&start)?,
					value: FieldValue::Nested(PlatformMessage::default()),
				}),
			Event::End(_) => break,
			Event::Eof => return Err(FormatError::xml("unexpected end of document")),
			_ => {},
		}
	}

	if children.is_empty() {
		Ok(FieldValue::Text(text))
	} else {
		Ok(FieldValue::Nested(PlatformMessage { fields: children }))
	}
}

fn write_element(
	writer: &mut Writer<Vec<u8>>,
	name: &str,
	message: &PlatformMessage,
) -> Result<(), FormatError> {
	writer.write_event(Event::Start(BytesStart::new(name))).map_err(FormatError::xml)?;

	for field in &message.fields {
		match &field.value {
			FieldValue::Text(text) => {
				writer
					.write_event(Event::Start(BytesStart::new(field.name.as_str())))
					.map_err(FormatError::xml)?;
				writer
					.write_event(Event::Text(BytesText::new(text)))
					.map_err(FormatError::xml)?;
				writer
					.write_event(Event::End(BytesEnd::new(Cow::Borrowed(field.name.as_str()))))
					.map_err(FormatError::xml)?;
			},
			FieldValue::Nested(nested) if nested.fields.is_empty() => {
				writer
					.write_event(Event::Empty(BytesStart::new(field.name.as_str())))
					.map_err(FormatError::xml)?;
			},
			FieldValue::Nested(nested) => write_element(writer, &field.name, nested)?,
		}
	}

	writer.write_event(Event::End(BytesEnd::new(name))).map_err(FormatError::xml)?;

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_cdata_and_plain_text() {
		let xml = "<xml><ToUserName><![CDATA[gh_123]]></ToUserName>\n<CreateTime>1413192605</CreateTime>\n<Content><![CDATA[a < b & c]]></Content></xml>";
		let message = PlatformMessage::from_xml(xml).expect("Message should parse.");

		assert_eq!(message.text("ToUserName"), Some("gh_123"));
		assert_eq!(message.text("CreateTime"), Some("1413192605"));
		assert_eq!(message.text("Content"), Some("a < b & c"));
		assert_eq!(message.fields.len(), 3);
	}

	#[test]
	fn nested_fields_survive_round_trip() {
		let message = PlatformMessage::new()
			.with_text("MsgType", "event")
			.with_nested(
				"ScanCodeInfo",
				PlatformMessage::new().with_text("ScanType", "qrcode").with_text("ScanResult", "1"),
			)
			.with_text("Empty", "");
		let xml = message.to_xml().expect("Message should serialize.");
		let parsed = PlatformMessage::from_xml(&xml).expect("Serialized message should parse.");

		assert_eq!(parsed, message);
		assert_eq!(
			parsed.nested("ScanCodeInfo").and_then(|info| info.text("ScanType")),
			Some("qrcode")
		);
	}

	#[test]
	fn empty_elements_keep_their_kind() {
		let message = PlatformMessage::new()
			.with_nested("Extra", PlatformMessage::new())
			.with_text("Blank", "");
		let xml = message.to_xml().expect("Message should serialize.");

		assert_eq!(xml, "<xml><Extra/><Blank></Blank></xml>");

		let parsed = PlatformMessage::from_xml(&xml).expect("Serialized message should parse.");

		assert_eq!(parsed, message);
		assert_eq!(parsed.text("Extra"), Some(""));
		assert_eq!(parsed.text("Blank"), Some(""));
		assert_eq!(parsed.nested("Extra"), Some(&PlatformMessage::new()));
	}

	#[test]
	fn text_is_escaped_on_write() {
		let xml = PlatformMessage::new()
			.with_text("Content", "<b>&</b>")
			.to_xml()
			.expect("Message should serialize.");

		assert_eq!(xml, "<xml><Content>&lt;b&gt;&amp;&lt;/b&gt;</Content></xml>");
	}

	#[test]
	fn missing_root_and_fields_are_reported() {
		assert!(matches!(
			PlatformMessage::from_xml("   "),
			Err(FormatError::MissingElement { element: "xml" })
		));
		assert!(PlatformMessage::from_xml("<xml><Encrypt>abc</Encrypt>").is_err());

		let message =
			PlatformMessage::from_xml("<xml><A>1</A></xml>").expect("Message should parse.");

		assert!(matches!(
			message.require_text("Encrypt"),
			Err(FormatError::MissingElement { element: "Encrypt" })
		));
	}
}
