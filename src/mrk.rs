//! MRK mnemonic-text serialization and deserialization of MARC records.
//!
//! The MRK format is the line-oriented human-readable serialization used by
//! MARC editing tools: one line per field, `=TAG` prefixes, a two-space
//! separator, `$code` subfield markers, and a blank line between records.
//!
//! ```text
//! =LDR  00000nam a2200000 a 4500
//! =001  12345
//! =245  10$aIntroduction to algorithms /$cThomas H. Cormen.
//! ```
//!
//! Parsing is all-or-nothing: an invalid line, a data-field line without
//! indicators, or a block with no fields fails the whole input (the same
//! atomic policy as the MARCXML codec, unlike the binary reader's per-record
//! recovery).

use crate::error::{MarcError, Result};
use crate::record::{is_control_tag, ControlField, DataField, Field, Record};
use lazy_static::lazy_static;
use regex::Regex;

/// Tag token marking the leader line.
const LEADER_TAG: &str = "LDR";
/// Character introducing each subfield.
const SUBFIELD_MARKER: char = '$';

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"^=([0-9A-Za-z]{3})").expect("valid tag pattern");
}

/// Parse MRK text into records.
///
/// The input is split into blocks on blank lines; each block becomes one
/// record.
///
/// # Errors
///
/// Returns an error on a line that does not start with `=` and a
/// 3-character tag ([`MarcError::InvalidLine`]), a data-field line with
/// fewer than two characters after the separator
/// ([`MarcError::MissingIndicators`]), a block with zero fields
/// ([`MarcError::EmptyRecord`]), or input with no blocks at all.
pub fn parse_mrk(text: &str) -> Result<Vec<Record>> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    if blocks.is_empty() {
        return Err(MarcError::ParseError("No MRK records found".to_string()));
    }

    blocks.iter().map(|block| parse_block(block)).collect()
}

fn parse_block(lines: &[&str]) -> Result<Record> {
    let mut record = Record::new(String::new());

    for line in lines {
        if !line.starts_with('=') {
            return Err(MarcError::InvalidLine((*line).to_string()));
        }
        let caps = TAG_RE
            .captures(line)
            .ok_or_else(|| MarcError::InvalidLine((*line).to_string()))?;
        let tag = caps.get(1).map_or("", |m| m.as_str());
        let rest = strip_separator(&line[caps.get(0).map_or(0, |m| m.end())..]);

        if tag == LEADER_TAG {
            record.leader = rest.trim().to_string();
        } else if is_control_tag(tag) {
            record.add_field(Field::Control(ControlField::new(tag, rest.trim())?));
        } else {
            record.add_field(Field::Data(parse_data_line(tag, rest)?));
        }
    }

    if record.fields.is_empty() {
        return Err(MarcError::EmptyRecord);
    }
    Ok(record)
}

/// Consume the separator between the tag token and the field content:
/// the canonical two spaces, or a single space from hand-edited files.
fn strip_separator(rest: &str) -> &str {
    rest.strip_prefix("  ")
        .or_else(|| rest.strip_prefix(' '))
        .unwrap_or(rest)
}

fn parse_data_line(tag: &str, rest: &str) -> Result<DataField> {
    let mut chars = rest.chars();
    let (Some(ind1), Some(ind2)) = (chars.next(), chars.next()) else {
        return Err(MarcError::MissingIndicators(tag.to_string()));
    };
    let mut field = DataField::new(tag, ind1, ind2)?;

    for chunk in chars.as_str().split(SUBFIELD_MARKER) {
        let mut chunk_chars = chunk.chars();
        if let Some(code) = chunk_chars.next() {
            field.add_subfield(code, chunk_chars.as_str());
        }
        // Empty chunks ("$$", or nothing before the first marker) are skipped.
    }
    Ok(field)
}

/// Serialize records to MRK text.
///
/// One line per field, a blank line between records, trailing whitespace
/// stripped per line; the output always ends with a single newline.
#[must_use]
pub fn write_mrk(records: &[Record]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for record in records {
        push_line(&mut lines, format!("={LEADER_TAG}  {}", record.leader));
        for field in &record.fields {
            let line = match field {
                Field::Control(cf) => format!("={}  {}", cf.tag(), cf.data),
                Field::Data(df) => {
                    let mut line =
                        format!("={}  {}{}", df.tag(), df.indicator1, df.indicator2);
                    for subfield in &df.subfields {
                        line.push(SUBFIELD_MARKER);
                        line.push(subfield.code);
                        line.push_str(&subfield.value);
                    }
                    line
                },
            };
            push_line(&mut lines, line);
        }
        lines.push(String::new());
    }

    let mut out = lines.join("\n");
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

fn push_line(lines: &mut Vec<String>, line: String) {
    lines.push(line.trim_end().to_string());
}
