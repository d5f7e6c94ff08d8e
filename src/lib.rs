#![doc = include_str!("../README.md")]

pub mod error;
pub mod formats;
pub mod marcxml;
pub mod mrk;
pub mod ops;
pub mod reader;
pub mod record;
pub mod writer;

pub use error::{MarcError, Result};
pub use formats::{detect_format, read_records, sniff_format, write_records, Format, ReadResult};
pub use reader::{MarcReader, Utf8Mode};
pub use record::{ControlField, DataField, Field, Record, Subfield};
pub use writer::MarcWriter;
