//! File-level operations built on the read/write layer.
//!
//! Each operation reads whole files through [`read_records`], works on the
//! in-memory records, and writes through [`write_records`], so the per-format
//! failure policies apply uniformly: binary inputs recover per record and
//! report drops in the summary, text inputs fail atomically.

use crate::error::Result;
use crate::formats::{detect_format, read_records, write_records, Format, ReadResult};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Summary of a [`count`] operation.
#[derive(Debug, Serialize)]
pub struct CountSummary {
    /// Detected or requested input format.
    pub format: Format,
    /// Number of records successfully read.
    pub records: usize,
    /// Number of records dropped during binary recovery.
    pub dropped: usize,
    /// One message per dropped record.
    pub warnings: Vec<String>,
}

/// Count the records in a file.
///
/// # Errors
///
/// Returns an error if the input cannot be detected, opened, or (for the
/// atomic formats) parsed.
pub fn count(input: impl AsRef<Path>, format: Option<Format>) -> Result<CountSummary> {
    let input = input.as_ref();
    let format = match format {
        Some(format) => format,
        None => detect_format(input)?,
    };
    let result = read_records(input, Some(format))?;
    Ok(CountSummary {
        format,
        records: result.records.len(),
        dropped: result.dropped,
        warnings: result.warnings,
    })
}

/// Summary of a [`convert`] operation.
#[derive(Debug, Serialize)]
pub struct ConvertSummary {
    /// Detected or requested input format.
    pub from: Format,
    /// Output format.
    pub to: Format,
    /// Number of records written.
    pub records: usize,
    /// Number of records dropped during binary recovery.
    pub dropped: usize,
    /// One message per dropped record.
    pub warnings: Vec<String>,
}

/// Convert a file of records from one format to another.
///
/// The input format is detected from the path unless given explicitly; the
/// output format must be given. Converting a format to itself is a valid
/// normalization pass.
///
/// # Errors
///
/// Returns an error if reading fails, a record cannot be encoded in the
/// output format, or the output file cannot be written.
pub fn convert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    from: Option<Format>,
    to: Format,
) -> Result<ConvertSummary> {
    let input = input.as_ref();
    let from = match from {
        Some(format) => format,
        None => detect_format(input)?,
    };
    let result = read_records(input, Some(from))?;
    write_records(&result.records, output, to)?;
    Ok(ConvertSummary {
        from,
        to,
        records: result.records.len(),
        dropped: result.dropped,
        warnings: result.warnings,
    })
}

/// Summary of a [`merge`] operation.
#[derive(Debug, Serialize)]
pub struct MergeSummary {
    /// Output format.
    pub format: Format,
    /// Number of input files read.
    pub inputs: usize,
    /// Number of records written.
    pub records: usize,
    /// Records dropped across all inputs.
    pub dropped: usize,
    /// Drop messages across all inputs, prefixed with the source path.
    pub warnings: Vec<String>,
}

/// Merge several input files into one output file.
///
/// Inputs may be in different formats; each is detected independently.
/// Records are concatenated in input order.
///
/// # Errors
///
/// Returns an error if any input fails to read or the output fails to
/// write.
pub fn merge<P: AsRef<Path>>(
    inputs: &[P],
    output: impl AsRef<Path>,
    to: Format,
) -> Result<MergeSummary> {
    let mut records = Vec::new();
    let mut dropped = 0;
    let mut warnings = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        let ReadResult {
            records: mut batch,
            warnings: batch_warnings,
            dropped: batch_dropped,
        } = read_records(input, None)?;
        records.append(&mut batch);
        dropped += batch_dropped;
        warnings.extend(
            batch_warnings
                .into_iter()
                .map(|w| format!("{}: {w}", input.display())),
        );
    }

    write_records(&records, output, to)?;
    Ok(MergeSummary {
        format: to,
        inputs: inputs.len(),
        records: records.len(),
        dropped,
        warnings,
    })
}

/// Summary of a [`split`] operation.
#[derive(Debug, Serialize)]
pub struct SplitSummary {
    /// Output format.
    pub format: Format,
    /// Number of records distributed across the chunks.
    pub records: usize,
    /// Paths of the chunk files written, in order.
    pub outputs: Vec<PathBuf>,
    /// Records dropped while reading the input.
    pub dropped: usize,
    /// One message per dropped record.
    pub warnings: Vec<String>,
}

/// Split a file into chunks of at most `every` records.
///
/// Chunk files are named `{stem}_part{NNN}.{ext}` under `out_dir`, numbered
/// from 001; the last chunk may be short. When `to` is `None` the chunks
/// keep the input's format. The output directory is created if missing. An
/// input that reads as zero records produces zero files.
///
/// # Errors
///
/// Returns an error if the input fails to read, the output directory
/// cannot be created, or a chunk fails to write.
pub fn split(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    every: NonZeroUsize,
    to: Option<Format>,
) -> Result<SplitSummary> {
    let input = input.as_ref();
    let out_dir = out_dir.as_ref();
    let from = detect_format(input)?;
    let to = to.unwrap_or(from);
    let result = read_records(input, Some(from))?;

    std::fs::create_dir_all(out_dir)?;
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("records");

    let mut outputs = Vec::new();
    for (number, chunk) in result.records.chunks(every.get()).enumerate() {
        let path = out_dir.join(format!(
            "{stem}_part{:03}.{}",
            number + 1,
            to.extension()
        ));
        write_records(chunk, &path, to)?;
        outputs.push(path);
    }

    Ok(SplitSummary {
        format: to,
        records: result.records.len(),
        outputs,
        dropped: result.dropped,
        warnings: result.warnings,
    })
}
