//! Tolerant CSV tokenising.
//!
//! Every data record becomes a [`ParsedRow`]. Records whose field count does
//! not match the header, or that carry bytes which are not UTF-8, are kept
//! as [`ParsedRow::Malformed`] with the offending fields set to null, so the
//! caller decides whether they take part in joins and aggregations.

use common::{Error, Result};
use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

pub type Fields = Vec<Option<String>>;

/// How malformed records are handled while reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Keep malformed records with null-filled fields.
    #[default]
    Permissive,
    /// Skip malformed records.
    DropMalformed,
    /// Abort the read on the first malformed record.
    FailFast,
}

impl FromStr for ParseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "permissive" => Ok(ParseMode::Permissive),
            "dropmalformed" => Ok(ParseMode::DropMalformed),
            "failfast" => Ok(ParseMode::FailFast),
            other => Err(Error::InvalidInput(format!("unknown parse mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    FieldCount { expected: usize, found: usize },
    InvalidUtf8 { column: usize },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::FieldCount { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            }
            MalformedReason::InvalidUtf8 { column } => {
                write!(f, "field {} is not valid UTF-8", column)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRow {
    Parsed(Fields),
    Malformed {
        /// Line on which the record starts, 1-based.
        line: u64,
        fields: Fields,
        reason: MalformedReason,
    },
}

impl ParsedRow {
    pub fn fields(&self) -> &[Option<String>] {
        match self {
            ParsedRow::Parsed(fields) => fields,
            ParsedRow::Malformed { fields, .. } => fields,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ParsedRow::Malformed { .. })
    }

    pub fn into_fields(self) -> Fields {
        match self {
            ParsedRow::Parsed(fields) => fields,
            ParsedRow::Malformed { fields, .. } => fields,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Data records read, malformed ones included.
    pub rows: usize,
    pub malformed: usize,
    /// Malformed records left out of the table.
    pub dropped: usize,
}

impl fmt::Display for ParseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows, {} malformed, {} dropped",
            self.rows, self.malformed, self.dropped
        )
    }
}

/// Streams every record [`ParseMode`] keeps to `on_row`, one at a time.
/// Quoted fields may span lines and use `""` for a literal quote. Empty
/// fields are null. Returns the normalized headers and the counts for the
/// whole input.
pub fn scan_rows<R, F>(reader: R, mode: ParseMode, mut on_row: F) -> Result<(Vec<String>, ParseReport)>
where
    R: Read,
    F: FnMut(ParsedRow) -> Result<()>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(b',')
        .quote(b'"')
        .double_quote(true)
        .from_reader(reader);

    let headers = normalize_headers(csv_reader.byte_headers()?);
    let width = headers.len();

    let mut report = ParseReport::default();
    let mut record = csv::ByteRecord::new();

    while csv_reader.read_byte_record(&mut record)? {
        report.rows += 1;
        let (fields, reason) = decode_record(&record, width);

        let Some(reason) = reason else {
            on_row(ParsedRow::Parsed(fields))?;
            continue;
        };

        report.malformed += 1;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        match mode {
            ParseMode::Permissive => on_row(ParsedRow::Malformed {
                line,
                fields,
                reason,
            })?,
            ParseMode::DropMalformed => report.dropped += 1,
            ParseMode::FailFast => {
                return Err(Error::InputFormat(format!(
                    "malformed record at line {}: {}",
                    line, reason
                )));
            }
        }
    }

    Ok((headers, report))
}

/// Header names are trimmed; blank names become `_c<index>` and repeated
/// names get their column index appended.
fn normalize_headers(record: &csv::ByteRecord) -> Vec<String> {
    let names: Vec<String> = record
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let name = String::from_utf8_lossy(raw)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_string();
            if name.is_empty() {
                format!("_c{}", i)
            } else {
                name
            }
        })
        .collect();

    let mut seen = HashSet::new();
    let duplicated: HashSet<String> = names
        .iter()
        .filter(|name| !seen.insert(name.as_str()))
        .cloned()
        .collect();

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            if duplicated.contains(&name) {
                format!("{}{}", name, i)
            } else {
                name
            }
        })
        .collect()
}

fn decode_record(record: &csv::ByteRecord, width: usize) -> (Fields, Option<MalformedReason>) {
    let mut reason = None;
    if record.len() != width {
        reason = Some(MalformedReason::FieldCount {
            expected: width,
            found: record.len(),
        });
    }

    let fields = (0..width)
        .map(|column| {
            let raw = record.get(column).filter(|raw| !raw.is_empty())?;
            match std::str::from_utf8(raw) {
                Ok(value) => Some(value.to_string()),
                Err(_) => {
                    reason.get_or_insert(MalformedReason::InvalidUtf8 { column });
                    None
                }
            }
        })
        .collect();

    (fields, reason)
}
