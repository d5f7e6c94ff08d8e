//! MARC bibliographic record structures.
//!
//! This module provides the core record types shared by all three codecs:
//! - [`Record`] — a leader plus an ordered sequence of fields
//! - [`Field`] — control/data tagged union, discriminated by tag prefix
//! - [`ControlField`] — raw data carried under a `00x` tag
//! - [`DataField`] — indicators plus ordered subfields
//! - [`Subfield`] — a (code, value) pair; codes may repeat
//!
//! Field order is significant: codecs preserve the sequence in which fields
//! were decoded, including interleaved control and data fields, so records
//! round-trip between formats without reordering.
//!
//! Whether a field is a control field is determined solely by its tag's
//! first two characters being `"00"`. The constructors validate that
//! pairing, so a `00x` tag carrying indicators is unrepresentable.
//!
//! # Examples
//!
//! ```
//! use marclite::{DataField, Field, Record};
//!
//! let mut record = Record::new("00000nam a2200000 a 4500");
//! record.add_field(Field::control("001", "12345").unwrap());
//!
//! let mut title = DataField::new("245", '1', '0').unwrap();
//! title.add_subfield('a', "Introduction to algorithms /");
//! title.add_subfield('c', "Thomas H. Cormen.");
//! record.add_field(Field::Data(title));
//!
//! assert_eq!(record.fields.len(), 2);
//! ```

use crate::error::{MarcError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Returns true if `tag` names a control field (first two characters `"00"`).
#[must_use]
pub fn is_control_tag(tag: &str) -> bool {
    tag.starts_with("00")
}

fn check_tag(tag: &str) -> Result<()> {
    if tag.chars().count() != 3 {
        return Err(MarcError::InvalidField(format!(
            "Tag must be exactly 3 characters: {tag:?}"
        )));
    }
    Ok(())
}

/// A MARC bibliographic record.
///
/// Records are plain value objects: they are constructed by a codec's decode
/// step or programmatically by a caller, carry no identity beyond their
/// position in a list, and compare structurally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record leader (24 characters).
    ///
    /// Treated as an opaque string everywhere except the binary encoder,
    /// which stamps the record-length and base-address digits.
    pub leader: String,
    /// Fields in decode order.
    pub fields: Vec<Field>,
}

impl Record {
    /// Create an empty record with the given leader.
    #[must_use]
    pub fn new(leader: impl Into<String>) -> Self {
        Record {
            leader: leader.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field, preserving insertion order.
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Get the first control field value with the given tag.
    #[must_use]
    pub fn control_field(&self, tag: &str) -> Option<&str> {
        self.fields.iter().find_map(|field| match field {
            Field::Control(cf) if cf.tag() == tag => Some(cf.data.as_str()),
            _ => None,
        })
    }

    /// Iterate over data fields with the given tag.
    pub fn data_fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a DataField> {
        self.fields.iter().filter_map(move |field| match field {
            Field::Data(df) if df.tag() == tag => Some(df),
            _ => None,
        })
    }
}

/// A field in a MARC record.
///
/// The two payload shapes mirror the two kinds of MARC fields: control
/// fields carry raw data, data fields carry indicators and subfields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    /// A control field (tag starting `"00"`).
    Control(ControlField),
    /// A data field (any other tag).
    Data(DataField),
}

impl Field {
    /// Shorthand for constructing a [`ControlField`] variant.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is not 3 characters or does not start
    /// with `"00"`.
    pub fn control(tag: impl Into<String>, data: impl Into<String>) -> Result<Self> {
        Ok(Field::Control(ControlField::new(tag, data)?))
    }

    /// The field's 3-character tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Field::Control(cf) => cf.tag(),
            Field::Data(df) => df.tag(),
        }
    }

    /// Returns true for the [`Field::Control`] variant.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self, Field::Control(_))
    }
}

/// A control field: a `00x` tag carrying raw, untyped data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlField {
    tag: String,
    /// Raw field data; no internal structure imposed.
    pub data: String,
}

impl ControlField {
    /// Create a control field, validating the tag/shape pairing.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is not 3 characters or does not start
    /// with `"00"`.
    pub fn new(tag: impl Into<String>, data: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        check_tag(&tag)?;
        if !is_control_tag(&tag) {
            return Err(MarcError::InvalidField(format!(
                "Control field tag must start with \"00\": {tag}"
            )));
        }
        Ok(ControlField {
            tag,
            data: data.into(),
        })
    }

    /// The field's 3-character tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

/// A data field: two indicator characters plus ordered subfields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataField {
    tag: String,
    /// First indicator.
    pub indicator1: char,
    /// Second indicator.
    pub indicator2: char,
    /// Subfields in decode order; codes may repeat.
    pub subfields: SmallVec<[Subfield; 4]>,
}

impl DataField {
    /// Create a data field with no subfields, validating the tag/shape
    /// pairing.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is not 3 characters or starts with
    /// `"00"` (which would make it a control field).
    pub fn new(tag: impl Into<String>, indicator1: char, indicator2: char) -> Result<Self> {
        let tag = tag.into();
        check_tag(&tag)?;
        if is_control_tag(&tag) {
            return Err(MarcError::InvalidField(format!(
                "Data field tag must not start with \"00\": {tag}"
            )));
        }
        Ok(DataField {
            tag,
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        })
    }

    /// The field's 3-character tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Append a subfield, preserving insertion order.
    pub fn add_subfield(&mut self, code: char, value: impl Into<String>) {
        self.subfields.push(Subfield {
            code,
            value: value.into(),
        });
    }

    /// Get the first subfield value with the given code.
    #[must_use]
    pub fn subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }
}

/// A subfield within a data field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character).
    pub code: char,
    /// Subfield value.
    pub value: String,
}
