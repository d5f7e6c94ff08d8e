//! Format detection and whole-file read/write orchestration.
//!
//! [`detect_format`] resolves a path to one of the three supported formats,
//! trusting the file extension first and falling back to sniffing the first
//! bytes of content. [`read_records`] and [`write_records`] are the
//! file-level entry points that dispatch to the per-format codecs.
//!
//! The two directions have different failure policies, inherited from the
//! codecs they dispatch to:
//! - reading binary recovers per record, collecting warnings and a dropped
//!   count in [`ReadResult`];
//! - reading MARCXML or MRK is all-or-nothing;
//! - writing any format is all-or-nothing, and the output file is only
//!   created once the full serialization succeeded in memory.

use crate::error::{MarcError, Result};
use crate::marcxml::{parse_marcxml, records_to_marcxml};
use crate::mrk::{parse_mrk, write_mrk};
use crate::reader::MarcReader;
use crate::record::Record;
use crate::writer::MarcWriter;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// How many bytes of a file to inspect when sniffing its format.
const SNIFF_LEN: u64 = 2048;
/// How far into a sniffed sample an XML `<record` element may appear.
const XML_SCAN_LEN: usize = 500;
/// How many lines of a sniffed sample to scan for MRK tag lines.
const MRK_SCAN_LINES: usize = 20;

lazy_static! {
    static ref MRK_LINE_RE: Regex = Regex::new(r"^=\d{3}").expect("valid tag-line pattern");
}

/// A supported MARC serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// ISO 2709 binary interchange format (`.mrc`).
    Binary,
    /// MARCXML (`.xml`).
    MarcXml,
    /// MRK mnemonic text (`.mrk`).
    Mrk,
}

impl Format {
    /// Resolve a file extension to a format, case-insensitively.
    ///
    /// `.txt` is treated as MRK, matching common practice for mnemonic
    /// exports.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mrc" => Some(Format::Binary),
            "xml" => Some(Format::MarcXml),
            "mrk" | "txt" => Some(Format::Mrk),
            _ => None,
        }
    }

    /// The canonical file extension for this format.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Binary => "mrc",
            Format::MarcXml => "xml",
            Format::Mrk => "mrk",
        }
    }

    /// The format's name as used in messages and summaries.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Format::Binary => "mrc",
            Format::MarcXml => "marcxml",
            Format::Mrk => "mrk",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = MarcError;

    /// Parse a format name (`mrc`, `marcxml`, `xml`, `mrk`) as given on a
    /// command line or in configuration.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mrc" | "binary" | "marc" => Ok(Format::Binary),
            "marcxml" | "xml" => Ok(Format::MarcXml),
            "mrk" | "text" => Ok(Format::Mrk),
            other => Err(MarcError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Detect the MARC format of a file.
///
/// The file extension is trusted when it maps to a known format; otherwise
/// the first bytes of content are sniffed.
///
/// # Errors
///
/// Returns [`MarcError::UnknownFormat`] if neither extension nor content
/// identifies the file, or an I/O error if the file cannot be opened.
pub fn detect_format(path: impl AsRef<Path>) -> Result<Format> {
    let path = path.as_ref();
    if let Some(format) = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(Format::from_extension)
    {
        return Ok(format);
    }

    let mut sample = Vec::new();
    File::open(path)?.take(SNIFF_LEN).read_to_end(&mut sample)?;
    sniff_format(&sample, &path.display().to_string())
}

/// Identify a format from a sample of file content.
///
/// Checks, in order: an XML declaration or `<record` element near the start;
/// an ISO 2709 frame (digit length prefix and a record terminator byte); an
/// MRK tag line within the first lines.
///
/// # Errors
///
/// Returns [`MarcError::UnknownFormat`] naming `origin` if no check matches.
pub fn sniff_format(sample: &[u8], origin: &str) -> Result<Format> {
    let text = String::from_utf8_lossy(sample);

    let trimmed = text.trim_start();
    let head: String = text.chars().take(XML_SCAN_LEN).collect();
    if trimmed.starts_with("<?xml") || head.contains("<record") {
        return Ok(Format::MarcXml);
    }

    if sample.len() > 6
        && sample[..5].iter().all(u8::is_ascii_digit)
        && memchr::memchr(0x1D, sample).is_some()
    {
        return Ok(Format::Binary);
    }

    for line in text.lines().take(MRK_SCAN_LINES) {
        if line.starts_with("=LDR") || MRK_LINE_RE.is_match(line) {
            return Ok(Format::Mrk);
        }
    }

    Err(MarcError::UnknownFormat(origin.to_string()))
}

/// Outcome of reading a file of records.
#[derive(Debug, Default)]
pub struct ReadResult {
    /// Successfully decoded records, in file order.
    pub records: Vec<Record>,
    /// One message per dropped record.
    pub warnings: Vec<String>,
    /// Number of records dropped during binary recovery.
    pub dropped: usize,
}

/// Read all records from a file.
///
/// When `format` is `None` the format is detected from the path. Binary
/// input is read with per-record recovery: undecodable records are dropped,
/// each noted in [`ReadResult::warnings`] with its 1-based position.
/// MARCXML and MRK input is parsed atomically.
///
/// # Errors
///
/// Returns an error if detection fails, the file cannot be read, or an
/// atomic format fails to parse.
pub fn read_records(path: impl AsRef<Path>, format: Option<Format>) -> Result<ReadResult> {
    let path = path.as_ref();
    let format = match format {
        Some(format) => format,
        None => detect_format(path)?,
    };

    let mut result = ReadResult::default();
    match format {
        Format::Binary => {
            let mut reader = MarcReader::new(File::open(path)?);
            for index in 1.. {
                match reader.read_record() {
                    Ok(Some(record)) => result.records.push(record),
                    Ok(None) => break,
                    Err(MarcError::IoError(e)) => return Err(MarcError::IoError(e)),
                    Err(e) => {
                        result.dropped += 1;
                        result.warnings.push(format!("Dropped record {index}: {e}"));
                    },
                }
            }
        },
        Format::MarcXml => {
            let text = std::fs::read_to_string(path)?;
            result.records = parse_marcxml(&text)?;
        },
        Format::Mrk => {
            let bytes = std::fs::read(path)?;
            result.records = parse_mrk(&String::from_utf8_lossy(&bytes))?;
        },
    }
    Ok(result)
}

/// Write records to a file in the given format.
///
/// The whole output is serialized in memory first; the file is not touched
/// if any record fails to encode.
///
/// # Errors
///
/// Returns an error if a record cannot be encoded or the file cannot be
/// written.
pub fn write_records(records: &[Record], path: impl AsRef<Path>, format: Format) -> Result<()> {
    let bytes = match format {
        Format::Binary => {
            let mut writer = MarcWriter::new(Vec::new());
            for record in records {
                writer.write_record(record)?;
            }
            writer.finish()?;
            writer.into_inner()
        },
        Format::MarcXml => records_to_marcxml(records)?.into_bytes(),
        Format::Mrk => write_mrk(records).into_bytes(),
    };
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_extension("mrc"), Some(Format::Binary));
        assert_eq!(Format::from_extension("XML"), Some(Format::MarcXml));
        assert_eq!(Format::from_extension("mrk"), Some(Format::Mrk));
        assert_eq!(Format::from_extension("txt"), Some(Format::Mrk));
        assert_eq!(Format::from_extension("json"), None);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("marcxml".parse::<Format>().unwrap(), Format::MarcXml);
        assert_eq!("MRC".parse::<Format>().unwrap(), Format::Binary);
        assert_eq!("mrk".parse::<Format>().unwrap(), Format::Mrk);
        assert!(matches!(
            "csv".parse::<Format>(),
            Err(MarcError::UnsupportedFormat(f)) if f == "csv"
        ));
    }

    #[test]
    fn test_format_display_roundtrip() {
        for format in [Format::Binary, Format::MarcXml, Format::Mrk] {
            assert_eq!(format.to_string().parse::<Format>().unwrap(), format);
        }
    }

    #[test]
    fn test_sniff_xml() {
        let sample = br#"<?xml version="1.0"?><collection>"#;
        assert_eq!(sniff_format(sample, "test").unwrap(), Format::MarcXml);

        let bare = b"  <record><leader>00000nam</leader></record>";
        assert_eq!(sniff_format(bare, "test").unwrap(), Format::MarcXml);
    }

    #[test]
    fn test_sniff_binary() {
        let mut sample = b"00071nam a2200049 a 4500".to_vec();
        sample.extend_from_slice(&[0x1E, 0x1D]);
        assert_eq!(sniff_format(&sample, "test").unwrap(), Format::Binary);
    }

    #[test]
    fn test_sniff_binary_requires_terminator() {
        // Digits alone are not enough; a CSV of numbers must not match.
        let sample = b"00071,00049,00123";
        assert!(sniff_format(sample, "test").is_err());
    }

    #[test]
    fn test_sniff_mrk() {
        let sample = b"=LDR  00000nam a2200000 a 4500\n=001  12345\n";
        assert_eq!(sniff_format(sample, "test").unwrap(), Format::Mrk);

        let no_leader = b"=245  10$aTitle\n";
        assert_eq!(sniff_format(no_leader, "test").unwrap(), Format::Mrk);
    }

    #[test]
    fn test_sniff_unknown() {
        let err = sniff_format(b"hello world", "data.bin").unwrap_err();
        assert!(matches!(err, MarcError::UnknownFormat(origin) if origin == "data.bin"));
    }
}
