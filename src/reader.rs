//! Reading MARC records from ISO 2709 binary streams.
//!
//! This module provides [`MarcReader`] for reading binary MARC records from
//! any source that implements [`std::io::Read`].
//!
//! Each call to [`MarcReader::read_record`] consumes exactly one framed
//! record. A malformed record yields an `Err` without poisoning the stream:
//! the reader consumes the full frame (realigning on the record terminator
//! when the length prefix itself is unusable), so the caller can drop the bad
//! record and keep reading. That per-record recovery is how
//! [`read_records`](crate::formats::read_records) builds its warnings and
//! dropped count.
//!
//! # Examples
//!
//! ```no_run
//! use marclite::MarcReader;
//! use std::fs::File;
//!
//! let file = File::open("records.mrc")?;
//! let mut reader = MarcReader::new(file);
//!
//! while let Some(record) = reader.read_record()? {
//!     println!("leader: {}", record.leader);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{MarcError, Result};
use crate::record::{is_control_tag, ControlField, DataField, Field, Record};
use std::io::{BufRead, BufReader, Read};

const FIELD_TERMINATOR: u8 = 0x1E;
const RECORD_TERMINATOR: u8 = 0x1D;
const SUBFIELD_DELIMITER: char = '\u{1F}';
const LEADER_LEN: usize = 24;
const DIRECTORY_ENTRY_LEN: usize = 12;

/// How field data that is not valid UTF-8 is handled during decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Utf8Mode {
    /// Fail the record with an encoding error.
    Strict,
    /// Substitute invalid sequences with U+FFFD (default).
    #[default]
    Replace,
}

/// Reader for ISO 2709 binary MARC format.
///
/// `MarcReader` reads one MARC record at a time from any source implementing
/// [`std::io::Read`]. Records are fully parsed and returned as [`Record`]
/// instances.
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    reader: BufReader<R>,
    utf8_mode: Utf8Mode,
    records_read: usize,
}

impl<R: Read> MarcReader<R> {
    /// Create a new MARC reader with the default (permissive) UTF-8 mode.
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader: BufReader::new(reader),
            utf8_mode: Utf8Mode::default(),
            records_read: 0,
        }
    }

    /// Set how invalid UTF-8 in field data is handled.
    ///
    /// # Examples
    ///
    /// ```
    /// use marclite::{MarcReader, Utf8Mode};
    /// use std::io::Cursor;
    ///
    /// let reader = MarcReader::new(Cursor::new(vec![])).with_utf8_mode(Utf8Mode::Strict);
    /// ```
    #[must_use]
    pub fn with_utf8_mode(mut self, mode: Utf8Mode) -> Self {
        self.utf8_mode = mode;
        self
    }

    /// Read a single MARC record.
    ///
    /// Returns `Ok(Some(record))` if a record was successfully read,
    /// `Ok(None)` if EOF was reached, or `Err` if the record was malformed.
    /// After an `Err` the stream is positioned at the next record, so
    /// reading may continue.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The length prefix or directory is malformed
    /// - The record is truncated
    /// - The record contains no fields
    /// - Field data is not valid UTF-8 under [`Utf8Mode::Strict`]
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        let mut leader_bytes = [0u8; LEADER_LEN];
        match self.reader.read_exact(&mut leader_bytes) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            },
            Err(e) => return Err(MarcError::IoError(e)),
        }

        // The 5-digit length prefix frames the record. If it is unusable we
        // cannot size the frame, so realign on the record terminator before
        // reporting the error.
        let record_length = match parse_digits(&leader_bytes[0..5]) {
            Ok(len) => len,
            Err(e) => {
                self.skip_to_record_terminator()?;
                return Err(e);
            },
        };
        if record_length < LEADER_LEN + 2 {
            self.skip_to_record_terminator()?;
            return Err(MarcError::InvalidRecord(format!(
                "Record length must be at least {}, got {record_length}",
                LEADER_LEN + 2
            )));
        }

        let mut body = vec![0u8; record_length - LEADER_LEN];
        if let Err(e) = self.reader.read_exact(&mut body) {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                return Err(MarcError::TruncatedRecord(
                    "Unexpected end of file while reading record data".to_string(),
                ));
            }
            return Err(MarcError::IoError(e));
        }

        let record = self.parse_frame(&leader_bytes, &body)?;
        self.records_read += 1;
        Ok(Some(record))
    }

    /// Returns the number of records read so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Parse one fully-buffered record frame (leader already split off).
    fn parse_frame(&self, leader_bytes: &[u8], body: &[u8]) -> Result<Record> {
        if body.last() != Some(&RECORD_TERMINATOR) {
            return Err(MarcError::InvalidRecord(
                "Missing record terminator".to_string(),
            ));
        }

        let base_address = parse_digits(&leader_bytes[12..17])?;
        if base_address <= LEADER_LEN || base_address >= LEADER_LEN + body.len() {
            return Err(MarcError::InvalidRecord(format!(
                "Base address {base_address} outside record"
            )));
        }

        // Directory runs from the end of the leader to the base address and
        // is closed by a field terminator.
        let directory = &body[..base_address - LEADER_LEN - 1];
        if body[base_address - LEADER_LEN - 1] != FIELD_TERMINATOR {
            return Err(MarcError::InvalidRecord(
                "Directory not terminated".to_string(),
            ));
        }
        if directory.len() % DIRECTORY_ENTRY_LEN != 0 {
            return Err(MarcError::InvalidRecord(
                "Incomplete directory entry".to_string(),
            ));
        }
        let data = &body[base_address - LEADER_LEN..body.len() - 1];

        let mut record = Record::new(String::from_utf8_lossy(leader_bytes).into_owned());

        // Directory entries are 12 bytes: tag(3) + length(4) + offset(5).
        for entry in directory.chunks(DIRECTORY_ENTRY_LEN) {
            let tag = String::from_utf8_lossy(&entry[0..3]).into_owned();
            let field_length = parse_digits(&entry[3..7])?;
            let start = parse_digits(&entry[7..12])?;
            let end = start + field_length;
            if end > data.len() {
                return Err(MarcError::InvalidRecord(format!(
                    "Field {tag} exceeds data area"
                )));
            }

            let mut field_bytes = &data[start..end];
            if field_bytes.last() == Some(&FIELD_TERMINATOR) {
                field_bytes = &field_bytes[..field_bytes.len() - 1];
            }
            let text = self.decode_text(field_bytes)?;

            if is_control_tag(&tag) {
                record.add_field(Field::Control(ControlField::new(tag, text)?));
            } else {
                record.add_field(Field::Data(parse_data_field(tag, &text)?));
            }
        }

        if record.fields.is_empty() {
            return Err(MarcError::EmptyRecord);
        }
        Ok(record)
    }

    fn decode_text(&self, bytes: &[u8]) -> Result<String> {
        match self.utf8_mode {
            Utf8Mode::Strict => match std::str::from_utf8(bytes) {
                Ok(s) => Ok(s.to_string()),
                Err(e) => Err(MarcError::EncodingError(format!(
                    "Invalid UTF-8 in field data: {e}"
                ))),
            },
            Utf8Mode::Replace => Ok(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// Consume bytes until just past the next record terminator (or EOF).
    fn skip_to_record_terminator(&mut self) -> Result<()> {
        let mut skipped = Vec::new();
        self.reader.read_until(RECORD_TERMINATOR, &mut skipped)?;
        Ok(())
    }
}

/// Parse a data field from its decoded text: two indicator characters
/// followed by delimiter-separated subfields.
fn parse_data_field(tag: String, text: &str) -> Result<DataField> {
    let mut chars = text.chars();
    let (Some(ind1), Some(ind2)) = (chars.next(), chars.next()) else {
        return Err(MarcError::InvalidField(format!(
            "Field {tag} too short (needs indicators)"
        )));
    };
    let mut field = DataField::new(tag, ind1, ind2)?;

    for (i, chunk) in chars.as_str().split(SUBFIELD_DELIMITER).enumerate() {
        if i == 0 {
            // Anything between the indicators and the first delimiter is
            // structurally out of place.
            if !chunk.is_empty() {
                return Err(MarcError::InvalidField(format!(
                    "Field {}: expected subfield delimiter",
                    field.tag()
                )));
            }
            continue;
        }
        let mut chunk_chars = chunk.chars();
        let Some(code) = chunk_chars.next() else {
            return Err(MarcError::InvalidField(format!(
                "Field {}: dangling subfield delimiter",
                field.tag()
            )));
        };
        field.add_subfield(code, chunk_chars.as_str());
    }
    Ok(field)
}

/// Parse a fixed-width ASCII number from bytes.
fn parse_digits(bytes: &[u8]) -> Result<usize> {
    let mut result = 0usize;
    for &byte in bytes {
        if byte.is_ascii_digit() {
            result = result * 10 + usize::from(byte - b'0');
        } else {
            return Err(MarcError::InvalidRecord(format!(
                "Invalid numeric field: expected digits, got byte 0x{byte:02X}"
            )));
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const FT: u8 = FIELD_TERMINATOR;
    const RT: u8 = RECORD_TERMINATOR;
    const SD: u8 = 0x1F;

    /// Assemble a binary record from pre-encoded field payloads
    /// (payloads exclude the trailing field terminator).
    fn build_record(fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut directory = Vec::new();
        let mut data = Vec::new();
        let mut position = 0;
        for (tag, payload) in fields {
            let length = payload.len() + 1;
            directory.extend_from_slice(tag.as_bytes());
            directory.extend_from_slice(format!("{length:04}").as_bytes());
            directory.extend_from_slice(format!("{position:05}").as_bytes());
            data.extend_from_slice(payload);
            data.push(FT);
            position += length;
        }
        directory.push(FT);

        let base_address = LEADER_LEN + directory.len();
        let record_length = base_address + data.len() + 1;

        let mut out = Vec::new();
        out.extend_from_slice(format!("{record_length:05}").as_bytes());
        out.extend_from_slice(b"nam a22");
        out.extend_from_slice(format!("{base_address:05}").as_bytes());
        out.extend_from_slice(b" a 4500");
        out.extend_from_slice(&directory);
        out.extend_from_slice(&data);
        out.push(RT);
        out
    }

    fn title_field(title: &str) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"10");
        payload.push(SD);
        payload.push(b'a');
        payload.extend_from_slice(title.as_bytes());
        payload
    }

    #[test]
    fn test_read_simple_record() {
        let bytes = build_record(&[
            ("001", b"12345".to_vec()),
            ("245", title_field("Test title")),
        ]);
        let mut reader = MarcReader::new(Cursor::new(bytes));

        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.control_field("001"), Some("12345"));

        let field = record.data_fields_by_tag("245").next().unwrap();
        assert_eq!(field.indicator1, '1');
        assert_eq!(field.indicator2, '0');
        assert_eq!(field.subfield('a'), Some("Test title"));
        assert_eq!(reader.records_read(), 1);
    }

    #[test]
    fn test_eof_returns_none() {
        let mut reader = MarcReader::new(Cursor::new(vec![]));
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_read_multiple_records() {
        let mut bytes = build_record(&[("245", title_field("First"))]);
        bytes.extend_from_slice(&build_record(&[("245", title_field("Second"))]));
        let mut reader = MarcReader::new(Cursor::new(bytes));

        let r1 = reader.read_record().unwrap().unwrap();
        let r2 = reader.read_record().unwrap().unwrap();
        assert!(reader.read_record().unwrap().is_none());

        let t1 = r1.data_fields_by_tag("245").next().unwrap();
        let t2 = r2.data_fields_by_tag("245").next().unwrap();
        assert_eq!(t1.subfield('a'), Some("First"));
        assert_eq!(t2.subfield('a'), Some("Second"));
    }

    #[test]
    fn test_field_order_preserved_across_decode() {
        let bytes = build_record(&[
            ("001", b"0001".to_vec()),
            ("245", title_field("Title")),
            ("005", b"20240101000000.0".to_vec()),
        ]);
        let mut reader = MarcReader::new(Cursor::new(bytes));
        let record = reader.read_record().unwrap().unwrap();
        let tags: Vec<&str> = record.fields.iter().map(Field::tag).collect();
        assert_eq!(tags, vec!["001", "245", "005"]);
    }

    #[test]
    fn test_bad_length_prefix_realigns_stream() {
        let mut bytes = b"XXXXXjunk frame".to_vec();
        bytes.push(RT);
        bytes.extend_from_slice(&build_record(&[("245", title_field("Survivor"))]));
        let mut reader = MarcReader::new(Cursor::new(bytes));

        assert!(reader.read_record().is_err());
        let record = reader.read_record().unwrap().unwrap();
        let field = record.data_fields_by_tag("245").next().unwrap();
        assert_eq!(field.subfield('a'), Some("Survivor"));
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_truncated_record_errors() {
        let mut bytes = build_record(&[("245", title_field("Cut short"))]);
        bytes.truncate(bytes.len() - 5);
        let mut reader = MarcReader::new(Cursor::new(bytes));
        let err = reader.read_record().unwrap_err();
        assert!(matches!(err, MarcError::TruncatedRecord(_)), "got: {err}");
    }

    #[test]
    fn test_truncated_directory_errors_but_stream_continues() {
        // Frame with a directory that is not a whole number of entries.
        let directory: &[u8] = b"24500";
        let base_address = LEADER_LEN + directory.len() + 1;
        let record_length = base_address + 1;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(format!("{record_length:05}").as_bytes());
        bytes.extend_from_slice(b"nam a22");
        bytes.extend_from_slice(format!("{base_address:05}").as_bytes());
        bytes.extend_from_slice(b" a 4500");
        bytes.extend_from_slice(directory);
        bytes.push(FT);
        bytes.push(RT);
        bytes.extend_from_slice(&build_record(&[("245", title_field("After"))]));

        let mut reader = MarcReader::new(Cursor::new(bytes));
        let err = reader.read_record().unwrap_err();
        assert!(err.to_string().contains("Incomplete directory"), "got: {err}");

        let record = reader.read_record().unwrap().unwrap();
        let field = record.data_fields_by_tag("245").next().unwrap();
        assert_eq!(field.subfield('a'), Some("After"));
    }

    #[test]
    fn test_zero_fields_is_empty_record_error() {
        let bytes = build_record(&[]);
        let mut reader = MarcReader::new(Cursor::new(bytes));
        let err = reader.read_record().unwrap_err();
        assert!(matches!(err, MarcError::EmptyRecord));
    }

    #[test]
    fn test_dangling_subfield_delimiter_errors() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"10");
        payload.push(SD);
        payload.push(b'a');
        payload.extend_from_slice(b"value");
        payload.push(SD); // delimiter with no code following
        let bytes = build_record(&[("245", payload)]);
        let mut reader = MarcReader::new(Cursor::new(bytes));
        let err = reader.read_record().unwrap_err();
        assert!(err.to_string().contains("dangling"), "got: {err}");
    }

    #[test]
    fn test_invalid_utf8_replaced_by_default() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"10");
        payload.push(SD);
        payload.push(b'a');
        payload.extend_from_slice(&[0xFF, 0xFE]);
        let bytes = build_record(&[("245", payload)]);

        let mut reader = MarcReader::new(Cursor::new(bytes));
        let record = reader.read_record().unwrap().unwrap();
        let field = record.data_fields_by_tag("245").next().unwrap();
        assert_eq!(field.subfield('a'), Some("\u{FFFD}\u{FFFD}"));
    }

    #[test]
    fn test_invalid_utf8_fails_in_strict_mode() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"10");
        payload.push(SD);
        payload.push(b'a');
        payload.extend_from_slice(&[0xFF, 0xFE]);
        let bytes = build_record(&[("245", payload)]);

        let mut reader = MarcReader::new(Cursor::new(bytes)).with_utf8_mode(Utf8Mode::Strict);
        let err = reader.read_record().unwrap_err();
        assert!(matches!(err, MarcError::EncodingError(_)), "got: {err}");
    }

    #[test]
    fn test_non_ascii_subfield_value() {
        let bytes = build_record(&[("245", title_field("Übersetzung 日本語"))]);
        let mut reader = MarcReader::new(Cursor::new(bytes));
        let record = reader.read_record().unwrap().unwrap();
        let field = record.data_fields_by_tag("245").next().unwrap();
        assert_eq!(field.subfield('a'), Some("Übersetzung 日本語"));
    }
}
