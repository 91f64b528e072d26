//! XML encoding of envelopes.
//!
//! The envelope is first lowered to a `serde_json::Value` (field order is preserved)
//! and then written element by element. `null` members are omitted, string lists
//! under `ValidationMessages` become `<string>` children, every other array item
//! becomes an `<Item>` child.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use serde_json::Value;

use crate::envelope::Envelope;
use crate::error::RenderError;

const ROOT_TAG: &str = "Response";

fn child_tag(parent: &str) -> &'static str {
    match parent {
        "ValidationMessages" => "string",
        _ => "Item",
    }
}

fn write_text<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_value<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &Value,
) -> Result<(), quick_xml::Error> {
    match value {
        Value::Null => {}
        Value::Bool(b) => write_text(writer, tag, if *b { "true" } else { "false" })?,
        Value::Number(n) => write_text(writer, tag, &n.to_string())?,
        Value::String(s) => write_text(writer, tag, s)?,
        Value::Array(items) => {
            writer.write_event(Event::Start(BytesStart::new(tag)))?;
            let item_tag = child_tag(tag);
            for item in items {
                write_value(writer, item_tag, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }
        Value::Object(map) => {
            writer.write_event(Event::Start(BytesStart::new(tag)))?;
            for (key, member) in map {
                write_value(writer, key, member)?;
            }
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }
    }
    Ok(())
}

fn write_document<W: std::io::Write>(
    writer: &mut Writer<W>,
    value: &Value,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_value(writer, ROOT_TAG, value)
}

/// Encode an envelope as a UTF-8 XML document rooted at `<Response>`.
pub fn envelope_to_xml<T: Serialize>(envelope: &Envelope<T>) -> Result<Vec<u8>, RenderError> {
    let value = serde_json::to_value(envelope)?;
    let mut writer = Writer::new(Vec::new());
    write_document(&mut writer, &value)?;
    Ok(writer.into_inner())
}
