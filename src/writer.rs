//! Writing MARC records to ISO 2709 binary format.
//!
//! This module provides [`MarcWriter`] for serializing [`Record`] instances
//! to the binary interchange format. The directory and the leader's
//! record-length and base-address digits are recomputed from the actual
//! encoded field contents; the rest of the leader is written verbatim.
//! Fields are emitted in record order, never reordered.
//!
//! A record that cannot fit the format's fixed-width length fields (a field
//! longer than 9999 bytes, an offset past 99999, or a record longer than
//! 99999 bytes) fails with an encoding error rather than being truncated.
//!
//! # Examples
//!
//! ```
//! use marclite::{DataField, Field, MarcWriter, Record};
//!
//! # fn main() -> marclite::Result<()> {
//! let mut record = Record::new("00000nam a2200000 a 4500");
//! let mut field = DataField::new("245", '1', '0')?;
//! field.add_subfield('a', "Title");
//! record.add_field(Field::Data(field));
//!
//! let mut writer = MarcWriter::new(Vec::new());
//! writer.write_record(&record)?;
//! let bytes = writer.into_inner();
//! # Ok(())
//! # }
//! ```

use crate::error::{MarcError, Result};
use crate::record::{Field, Record};
use std::io::Write;

const FIELD_TERMINATOR: u8 = 0x1E;
const SUBFIELD_DELIMITER: u8 = 0x1F;
const RECORD_TERMINATOR: u8 = 0x1D;
const LEADER_LEN: usize = 24;

const MAX_FIELD_LENGTH: usize = 9999;
const MAX_OFFSET: usize = 99_999;
const MAX_RECORD_LENGTH: usize = 99_999;

/// Writer for ISO 2709 binary MARC format.
///
/// Records are written one at a time to any destination implementing
/// [`std::io::Write`].
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    records_written: usize,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a new MARC writer.
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            records_written: 0,
            finished: false,
        }
    }

    /// Write a single MARC record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be framed (length overflow, a
    /// non-ASCII leader or tag) or an I/O error occurs during writing.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::InvalidRecord(
                "Cannot write to a finished writer".to_string(),
            ));
        }

        let mut directory = Vec::new();
        let mut data_area = Vec::new();
        let mut position = 0usize;

        for field in &record.fields {
            let tag = field.tag();
            if tag.len() != 3 {
                return Err(MarcError::EncodingError(format!(
                    "Tag must be 3 ASCII characters for binary framing: {tag:?}"
                )));
            }

            let field_data = encode_field(field);
            let field_length = field_data.len();
            if field_length > MAX_FIELD_LENGTH {
                return Err(MarcError::EncodingError(format!(
                    "Field {tag} length {field_length} exceeds ISO 2709 capacity"
                )));
            }
            if position > MAX_OFFSET {
                return Err(MarcError::EncodingError(format!(
                    "Field {tag} offset {position} exceeds ISO 2709 capacity"
                )));
            }

            directory.extend_from_slice(tag.as_bytes());
            directory.extend_from_slice(format!("{field_length:04}").as_bytes());
            directory.extend_from_slice(format!("{position:05}").as_bytes());
            data_area.extend_from_slice(&field_data);
            position += field_length;
        }

        directory.push(FIELD_TERMINATOR);

        let base_address = LEADER_LEN + directory.len();
        let record_length = base_address + data_area.len() + 1;
        if record_length > MAX_RECORD_LENGTH {
            return Err(MarcError::EncodingError(format!(
                "Record length {record_length} exceeds ISO 2709 capacity"
            )));
        }

        let leader = stamp_leader(&record.leader, record_length, base_address);
        if !leader.is_ascii() {
            return Err(MarcError::EncodingError(
                "Leader must be ASCII for binary framing".to_string(),
            ));
        }

        self.writer.write_all(leader.as_bytes())?;
        self.writer.write_all(&directory)?;
        self.writer.write_all(&data_area)?;
        self.writer.write_all(&[RECORD_TERMINATOR])?;

        self.records_written += 1;
        Ok(())
    }

    /// Flush the writer and mark it as finished.
    ///
    /// After calling `finish`, no more records can be written.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Consume the writer, returning the underlying destination.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Encode one field's data-area bytes, including the field terminator.
fn encode_field(field: &Field) -> Vec<u8> {
    let mut out = Vec::new();
    match field {
        Field::Control(cf) => {
            out.extend_from_slice(cf.data.as_bytes());
        },
        Field::Data(df) => {
            let mut buf = [0u8; 4];
            out.extend_from_slice(df.indicator1.encode_utf8(&mut buf).as_bytes());
            out.extend_from_slice(df.indicator2.encode_utf8(&mut buf).as_bytes());
            for subfield in &df.subfields {
                out.push(SUBFIELD_DELIMITER);
                out.extend_from_slice(subfield.code.encode_utf8(&mut buf).as_bytes());
                out.extend_from_slice(subfield.value.as_bytes());
            }
        },
    }
    out.push(FIELD_TERMINATOR);
    out
}

/// Normalize a leader to 24 characters and stamp the recomputed
/// record-length (0-4) and base-address (12-16) digits into it.
fn stamp_leader(leader: &str, record_length: usize, base_address: usize) -> String {
    let mut chars: Vec<char> = leader.chars().take(LEADER_LEN).collect();
    chars.resize(LEADER_LEN, ' ');
    for (i, digit) in format!("{record_length:05}").chars().enumerate() {
        chars[i] = digit;
    }
    for (i, digit) in format!("{base_address:05}").chars().enumerate() {
        chars[12 + i] = digit;
    }
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MarcReader;
    use crate::record::{ControlField, DataField};
    use std::io::Cursor;

    const TEST_LEADER: &str = "00000nam a2200000 a 4500";

    fn title_record(title: &str) -> Record {
        let mut record = Record::new(TEST_LEADER);
        record.add_field(Field::Control(ControlField::new("001", "12345").unwrap()));
        let mut field = DataField::new("245", '1', '0').unwrap();
        field.add_subfield('a', title);
        record.add_field(Field::Data(field));
        record
    }

    #[test]
    fn test_write_simple_record() {
        let record = title_record("Test title");
        let mut writer = MarcWriter::new(Vec::new());
        writer.write_record(&record).unwrap();
        let buffer = writer.into_inner();

        // Leader(24) + directory(2*12 + 1) + "12345" + FT + "10" + SD + "aTest title" + FT + RT
        assert_eq!(&buffer[0..5], b"00071");
        assert_eq!(&buffer[12..17], b"00049");
        assert_eq!(&buffer[24..27], b"001");
        assert_eq!(*buffer.last().unwrap(), RECORD_TERMINATOR);
    }

    #[test]
    fn test_write_and_read_roundtrip() {
        let record = title_record("Test title");
        let mut writer = MarcWriter::new(Vec::new());
        writer.write_record(&record).unwrap();

        let mut reader = MarcReader::new(Cursor::new(writer.into_inner()));
        let restored = reader.read_record().unwrap().unwrap();

        // The leader's length and base-address digits are recomputed on
        // encode; everything else must match structurally.
        assert_eq!(restored.fields, record.fields);
        assert_eq!(&restored.leader[5..12], &record.leader[5..12]);
        assert_eq!(&restored.leader[17..], &record.leader[17..]);
    }

    #[test]
    fn test_interleaved_field_order_survives() {
        let mut record = Record::new(TEST_LEADER);
        let mut f650 = DataField::new("650", ' ', '0').unwrap();
        f650.add_subfield('a', "Subject");
        record.add_field(Field::Data(f650));
        record.add_field(Field::Control(ControlField::new("001", "after").unwrap()));

        let mut writer = MarcWriter::new(Vec::new());
        writer.write_record(&record).unwrap();
        let mut reader = MarcReader::new(Cursor::new(writer.into_inner()));
        let restored = reader.read_record().unwrap().unwrap();

        let tags: Vec<&str> = restored.fields.iter().map(Field::tag).collect();
        assert_eq!(tags, vec!["650", "001"]);
    }

    #[test]
    fn test_repeated_subfield_codes_roundtrip() {
        let mut record = Record::new(TEST_LEADER);
        let mut field = DataField::new("650", ' ', '0').unwrap();
        field.add_subfield('a', "First");
        field.add_subfield('a', "Second");
        record.add_field(Field::Data(field));

        let mut writer = MarcWriter::new(Vec::new());
        writer.write_record(&record).unwrap();
        let mut reader = MarcReader::new(Cursor::new(writer.into_inner()));
        let restored = reader.read_record().unwrap().unwrap();

        let field = restored.data_fields_by_tag("650").next().unwrap();
        assert_eq!(field.subfields.len(), 2);
        assert_eq!(field.subfields[0].value, "First");
        assert_eq!(field.subfields[1].value, "Second");
    }

    #[test]
    fn test_oversized_field_is_encoding_error() {
        let mut record = Record::new(TEST_LEADER);
        let mut field = DataField::new("520", ' ', ' ').unwrap();
        field.add_subfield('a', "x".repeat(10_000));
        record.add_field(Field::Data(field));

        let mut writer = MarcWriter::new(Vec::new());
        let err = writer.write_record(&record).unwrap_err();
        assert!(matches!(err, MarcError::EncodingError(_)), "got: {err}");
        assert_eq!(writer.records_written(), 0);
    }

    #[test]
    fn test_oversized_record_is_encoding_error() {
        let mut record = Record::new(TEST_LEADER);
        for _ in 0..15 {
            let mut field = DataField::new("520", ' ', ' ').unwrap();
            field.add_subfield('a', "x".repeat(9000));
            record.add_field(Field::Data(field));
        }

        let mut writer = MarcWriter::new(Vec::new());
        let err = writer.write_record(&record).unwrap_err();
        assert!(matches!(err, MarcError::EncodingError(_)), "got: {err}");
    }

    #[test]
    fn test_short_leader_is_padded_before_stamping() {
        let mut record = Record::new("");
        record.add_field(Field::Control(ControlField::new("001", "x").unwrap()));

        let mut writer = MarcWriter::new(Vec::new());
        writer.write_record(&record).unwrap();
        let buffer = writer.into_inner();
        assert!(buffer[0..5].iter().all(u8::is_ascii_digit));
        let stamped: usize = std::str::from_utf8(&buffer[0..5]).unwrap().parse().unwrap();
        assert_eq!(buffer.len(), stamped);
    }

    #[test]
    fn test_writer_cannot_write_after_finish() {
        let record = title_record("Test");
        let mut writer = MarcWriter::new(Vec::new());
        writer.finish().unwrap();
        assert!(writer.write_record(&record).is_err());
    }
}
