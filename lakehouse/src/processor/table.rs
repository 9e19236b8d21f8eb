use crate::processor::csv::{Fields, ParsedRow};
use crate::processor::schema::parse_bool;
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use common::Result;
use datafusion::datasource::MemTable;
use std::sync::Arc;

pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Collects parsed rows into record batches of at most `batch_size` rows,
/// holding no more than one batch worth of text at a time. Values that do
/// not convert to their column type become null.
pub struct BatchBuilder {
    schema: SchemaRef,
    batch_size: usize,
    pending: Vec<Fields>,
    batches: Vec<RecordBatch>,
}

impl BatchBuilder {
    pub fn new(schema: SchemaRef, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            schema,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            batches: Vec::new(),
        }
    }

    pub fn push(&mut self, row: ParsedRow) -> Result<()> {
        self.pending.push(row.into_fields());
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<RecordBatch>> {
        self.flush()?;
        Ok(self.batches)
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let columns = self
            .schema
            .fields()
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                let values = self
                    .pending
                    .iter()
                    .map(|row| row.get(idx).and_then(|v| v.as_deref()));
                build_column(field.data_type(), values)
            })
            .collect::<Vec<_>>();

        self.batches
            .push(RecordBatch::try_new(self.schema.clone(), columns)?);
        self.pending.clear();
        Ok(())
    }
}

fn build_column<'a>(data_type: &DataType, values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    match data_type {
        DataType::Int64 => Arc::new(
            values
                .map(|v| v.and_then(|v| v.parse::<i64>().ok()))
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            values
                .map(|v| v.and_then(|v| v.parse::<f64>().ok()))
                .collect::<Float64Array>(),
        ),
        DataType::Boolean => Arc::new(values.map(|v| v.and_then(parse_bool)).collect::<BooleanArray>()),
        _ => Arc::new(values.collect::<StringArray>()),
    }
}

/// Spreads batches round-robin over `partitions` partitions so the engine
/// can scan them in parallel.
pub fn into_mem_table(schema: SchemaRef, batches: Vec<RecordBatch>, partitions: usize) -> Result<MemTable> {
    let partitions = partitions.max(1);
    let mut partitioned: Vec<Vec<RecordBatch>> = vec![Vec::new(); partitions];

    for (i, batch) in batches.into_iter().enumerate() {
        partitioned[i % partitions].push(batch);
    }

    Ok(MemTable::try_new(schema, partitioned)?)
}
