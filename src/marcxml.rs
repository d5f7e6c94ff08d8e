//! MARCXML serialization and deserialization of MARC records.
//!
//! This module provides conversion between MARC records and standard MARCXML,
//! as defined by the Library of Congress (<https://www.loc.gov/standards/marcxml/>).
//!
//! Output is a `<collection>` of `<record>` elements carrying the
//! `xmlns="http://www.loc.gov/MARC21/slim"` namespace; `tag`, `ind1`, `ind2`,
//! and `code` are XML attributes. Parsing accepts a collection or a bare
//! `<record>` root, with or without a namespace prefix (elements are matched
//! by local name).
//!
//! The codec walks XML events rather than deserializing into per-kind field
//! lists, so the interleaved control-field/data-field order of each record is
//! preserved exactly.
//!
//! Unlike the binary reader there is no per-record recovery here: any
//! structural violation fails the whole parse with
//! [`MarcError::ParseError`].

use crate::error::{MarcError, Result};
use crate::record::{ControlField, DataField, Field, Record};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// The MARCXML namespace URI.
pub const MARCXML_NS: &str = "http://www.loc.gov/MARC21/slim";

fn parse_err(e: impl std::fmt::Display) -> MarcError {
    MarcError::ParseError(format!("Failed to parse MARCXML: {e}"))
}

fn ser_err(e: impl std::fmt::Display) -> MarcError {
    MarcError::ParseError(format!("Failed to serialize MARCXML: {e}"))
}

// ---------------------------------------------------------------------------
// Serialization: records → MARCXML
// ---------------------------------------------------------------------------

/// Convert records to a MARCXML `<collection>` string.
///
/// The output includes an XML declaration; field and subfield order mirror
/// the record model exactly, and text/attribute values are escaped for the
/// five XML special characters.
///
/// # Errors
///
/// Returns an error if the records cannot be serialized to XML.
pub fn records_to_marcxml(records: &[Record]) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(ser_err)?;

    let mut collection = BytesStart::new("collection");
    collection.push_attribute(("xmlns", MARCXML_NS));
    writer.write_event(Event::Start(collection)).map_err(ser_err)?;

    for record in records {
        write_record(&mut writer, record)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("collection")))
        .map_err(ser_err)?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| MarcError::EncodingError(format!("MARCXML output is not UTF-8: {e}")))
}

fn write_record(writer: &mut Writer<Vec<u8>>, record: &Record) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("record")))
        .map_err(ser_err)?;

    write_text_element(writer, "leader", &record.leader)?;

    for field in &record.fields {
        match field {
            Field::Control(cf) => {
                let mut el = BytesStart::new("controlfield");
                el.push_attribute(("tag", cf.tag()));
                writer.write_event(Event::Start(el)).map_err(ser_err)?;
                writer
                    .write_event(Event::Text(BytesText::new(&cf.data)))
                    .map_err(ser_err)?;
                writer
                    .write_event(Event::End(BytesEnd::new("controlfield")))
                    .map_err(ser_err)?;
            },
            Field::Data(df) => {
                let mut el = BytesStart::new("datafield");
                el.push_attribute(("tag", df.tag()));
                el.push_attribute(("ind1", df.indicator1.to_string().as_str()));
                el.push_attribute(("ind2", df.indicator2.to_string().as_str()));
                writer.write_event(Event::Start(el)).map_err(ser_err)?;

                for subfield in &df.subfields {
                    let mut sf = BytesStart::new("subfield");
                    sf.push_attribute(("code", subfield.code.to_string().as_str()));
                    writer.write_event(Event::Start(sf)).map_err(ser_err)?;
                    writer
                        .write_event(Event::Text(BytesText::new(&subfield.value)))
                        .map_err(ser_err)?;
                    writer
                        .write_event(Event::End(BytesEnd::new("subfield")))
                        .map_err(ser_err)?;
                }

                writer
                    .write_event(Event::End(BytesEnd::new("datafield")))
                    .map_err(ser_err)?;
            },
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("record")))
        .map_err(ser_err)?;
    Ok(())
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(ser_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(ser_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(ser_err)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Deserialization: MARCXML → records
// ---------------------------------------------------------------------------

/// The leaf element whose text content is currently being collected.
enum Leaf {
    Leader,
    Control(String),
    Subfield(char),
}

/// Parse a MARCXML document into records.
///
/// Accepts a `<collection>` of `<record>` elements or a bare `<record>`
/// root, in default-namespace, prefixed-namespace, or namespace-free form.
///
/// # Errors
///
/// Returns [`MarcError::ParseError`] on malformed XML, a missing `tag` or
/// `code` attribute, a field element whose tag contradicts its shape, a
/// record with no fields, or input containing no records at all. The whole
/// parse fails on the first such violation.
pub fn parse_marcxml(xml: &str) -> Result<Vec<Record>> {
    let mut reader = Reader::from_str(xml);
    let mut records = Vec::new();

    let mut current: Option<Record> = None;
    let mut datafield: Option<DataField> = None;
    let mut leaf: Option<Leaf> = None;
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(parse_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"record" => {
                    current = Some(Record::new(String::new()));
                },
                b"leader" => {
                    leaf = Some(Leaf::Leader);
                    text.clear();
                },
                b"controlfield" => {
                    leaf = Some(Leaf::Control(require_attr(&e, "tag")?));
                    text.clear();
                },
                b"datafield" => {
                    let tag = require_attr(&e, "tag")?;
                    let ind1 = indicator_attr(&e, "ind1")?;
                    let ind2 = indicator_attr(&e, "ind2")?;
                    datafield = Some(DataField::new(tag, ind1, ind2).map_err(parse_err)?);
                },
                b"subfield" => {
                    let code = require_attr(&e, "code")?;
                    let code = code.chars().next().ok_or_else(|| {
                        MarcError::ParseError("Empty subfield code attribute".to_string())
                    })?;
                    leaf = Some(Leaf::Subfield(code));
                    text.clear();
                },
                _ => {},
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"controlfield" => {
                    let tag = require_attr(&e, "tag")?;
                    let record = current
                        .as_mut()
                        .ok_or_else(|| parse_err("controlfield outside record"))?;
                    record.add_field(Field::Control(
                        ControlField::new(tag, String::new()).map_err(parse_err)?,
                    ));
                },
                b"datafield" => {
                    let tag = require_attr(&e, "tag")?;
                    let ind1 = indicator_attr(&e, "ind1")?;
                    let ind2 = indicator_attr(&e, "ind2")?;
                    let record = current
                        .as_mut()
                        .ok_or_else(|| parse_err("datafield outside record"))?;
                    record.add_field(Field::Data(
                        DataField::new(tag, ind1, ind2).map_err(parse_err)?,
                    ));
                },
                b"subfield" => {
                    let code = require_attr(&e, "code")?;
                    let code = code.chars().next().ok_or_else(|| {
                        MarcError::ParseError("Empty subfield code attribute".to_string())
                    })?;
                    let field = datafield
                        .as_mut()
                        .ok_or_else(|| parse_err("subfield outside datafield"))?;
                    field.add_subfield(code, String::new());
                },
                _ => {},
            },
            Event::Text(t) => {
                if leaf.is_some() {
                    text.push_str(&t.unescape().map_err(parse_err)?);
                }
            },
            Event::CData(t) => {
                if leaf.is_some() {
                    text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"leader" => {
                    if let (Some(Leaf::Leader), Some(record)) = (leaf.take(), current.as_mut()) {
                        record.leader = std::mem::take(&mut text);
                    }
                },
                b"controlfield" => {
                    let Some(Leaf::Control(tag)) = leaf.take() else {
                        return Err(parse_err("unexpected </controlfield>"));
                    };
                    let record = current
                        .as_mut()
                        .ok_or_else(|| parse_err("controlfield outside record"))?;
                    record.add_field(Field::Control(
                        ControlField::new(tag, std::mem::take(&mut text)).map_err(parse_err)?,
                    ));
                },
                b"subfield" => {
                    let Some(Leaf::Subfield(code)) = leaf.take() else {
                        return Err(parse_err("unexpected </subfield>"));
                    };
                    let field = datafield
                        .as_mut()
                        .ok_or_else(|| parse_err("subfield outside datafield"))?;
                    field.add_subfield(code, std::mem::take(&mut text));
                },
                b"datafield" => {
                    let field = datafield
                        .take()
                        .ok_or_else(|| parse_err("unexpected </datafield>"))?;
                    let record = current
                        .as_mut()
                        .ok_or_else(|| parse_err("datafield outside record"))?;
                    record.add_field(Field::Data(field));
                },
                b"record" => {
                    let record = current
                        .take()
                        .ok_or_else(|| parse_err("unexpected </record>"))?;
                    if record.fields.is_empty() {
                        return Err(MarcError::ParseError(
                            "Record contained no MARC fields".to_string(),
                        ));
                    }
                    records.push(record);
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if records.is_empty() {
        return Err(MarcError::ParseError(
            "No MARCXML records found".to_string(),
        ));
    }
    Ok(records)
}

fn require_attr(e: &BytesStart<'_>, name: &str) -> Result<String> {
    let attr = e
        .try_get_attribute(name)
        .map_err(parse_err)?
        .ok_or_else(|| {
            MarcError::ParseError(format!(
                "Missing {name} attribute on <{}>",
                String::from_utf8_lossy(e.name().as_ref())
            ))
        })?;
    Ok(attr.unescape_value().map_err(parse_err)?.into_owned())
}

/// Indicator attribute: first character, defaulting to space when the
/// attribute is missing or empty.
fn indicator_attr(e: &BytesStart<'_>, name: &str) -> Result<char> {
    let Some(attr) = e.try_get_attribute(name).map_err(parse_err)? else {
        return Ok(' ');
    };
    let value = attr.unescape_value().map_err(parse_err)?;
    Ok(value.chars().next().unwrap_or(' '))
}
