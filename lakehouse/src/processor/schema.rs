use crate::processor::csv::ParsedRow;
use arrow::datatypes::{DataType, Field, Schema};

/// Narrowest type accepting every value seen so far in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inferred {
    Null,
    Int64,
    Float64,
    Boolean,
    Utf8,
}

impl Inferred {
    fn merge(self, other: Inferred) -> Inferred {
        use Inferred::*;
        match (self, other) {
            (Null, other) | (other, Null) => other,
            (a, b) if a == b => a,
            (Int64, Float64) | (Float64, Int64) => Float64,
            _ => Utf8,
        }
    }

    fn data_type(self) -> DataType {
        match self {
            Inferred::Int64 => DataType::Int64,
            Inferred::Float64 => DataType::Float64,
            Inferred::Boolean => DataType::Boolean,
            Inferred::Null | Inferred::Utf8 => DataType::Utf8,
        }
    }
}

fn classify(value: &str) -> Inferred {
    if looks_integral(value) {
        // integers beyond i64 stay text so identifiers keep every digit
        return if value.parse::<i64>().is_ok() {
            Inferred::Int64
        } else {
            Inferred::Utf8
        };
    }
    if value.bytes().any(|b| b.is_ascii_digit()) && value.parse::<f64>().is_ok() {
        return Inferred::Float64;
    }
    if parse_bool(value).is_some() {
        return Inferred::Boolean;
    }
    Inferred::Utf8
}

fn looks_integral(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

pub fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Infers one nullable column per header from the non-null values of every
/// row it observes, malformed rows included. Columns without values are
/// `Utf8`.
#[derive(Debug, Default)]
pub struct SchemaInference {
    inferred: Vec<Inferred>,
}

impl SchemaInference {
    pub fn observe(&mut self, row: &ParsedRow) {
        let fields = row.fields();
        if self.inferred.len() < fields.len() {
            self.inferred.resize(fields.len(), Inferred::Null);
        }

        for (slot, value) in self.inferred.iter_mut().zip(fields) {
            if *slot == Inferred::Utf8 {
                continue;
            }
            if let Some(value) = value {
                *slot = slot.merge(classify(value));
            }
        }
    }

    pub fn finish(self, headers: &[String]) -> Schema {
        Schema::new(
            headers
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let kind = self.inferred.get(i).copied().unwrap_or(Inferred::Null);
                    Field::new(name, kind.data_type(), true)
                })
                .collect::<Vec<_>>(),
        )
    }
}

/// All-text schema for the given column names.
pub fn utf8_schema(columns: &[&str]) -> Schema {
    Schema::new(
        columns
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    )
}
