pub mod csv;
pub mod query;
pub mod schema;
pub mod table;

pub use csv::{ParseMode, ParseReport};
pub use query::ReviewCountQuery;

use crate::storage::{Location, StoreRegistry, WriteMode};
use common::{Error, Result};
use arrow::array::{Array, UInt64Array};
use arrow::datatypes::DataType;
use datafusion::config::CsvOptions;
use datafusion::dataframe::{DataFrame, DataFrameWriteOptions};
use datafusion::datasource::TableProvider;
use datafusion::prelude::{SessionConfig, SessionContext};
use std::sync::Arc;
use schema::SchemaInference;
use table::{BatchBuilder, DEFAULT_BATCH_SIZE, into_mem_table};
use tracing::{debug, info, warn};

/// Loads CSV inputs into the session as in-memory tables and runs the
/// aggregation queries over them.
pub struct LakehouseProcessor {
    pub ctx: SessionContext,
    stores: Arc<StoreRegistry>,
    batch_size: usize,
}

impl LakehouseProcessor {
    pub fn new(stores: Arc<StoreRegistry>) -> Self {
        // sorted results go to a single part file so ordering survives the write
        let config = SessionConfig::new()
            .set_usize("datafusion.execution.minimum_parallel_output_files", 1);

        Self {
            ctx: SessionContext::new_with_config(config),
            stores,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn session_context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Reads `location` and registers it as `table_name`, replacing any
    /// earlier registration. The input is read twice, once to infer the
    /// schema and once to build batches, so parsed text is never held for
    /// the whole input. An input without a header row registers an empty
    /// table of text columns named after `required_columns`.
    pub async fn register_csv_table(
        &self,
        table_name: &str,
        location: &Location,
        required_columns: &[&str],
        mode: ParseMode,
    ) -> Result<ParseReport> {
        let source = self.stores.open_input(location).await?;

        let mut inference = SchemaInference::default();
        let (headers, report) = csv::scan_rows(source.reader()?, mode, |row| {
            inference.observe(&row);
            Ok(())
        })?;

        let (schema, batches) = if headers.is_empty() {
            warn!("{} is empty, registering {} without rows", location, table_name);
            (Arc::new(schema::utf8_schema(required_columns)), Vec::new())
        } else {
            let missing: Vec<&str> = required_columns
                .iter()
                .copied()
                .filter(|column| !headers.iter().any(|h| h == column))
                .collect();
            if !missing.is_empty() {
                return Err(Error::InputFormat(format!(
                    "{} is missing required columns: {}",
                    location,
                    missing.join(", ")
                )));
            }

            let schema = Arc::new(inference.finish(&headers));
            let mut builder = BatchBuilder::new(schema.clone(), self.batch_size);
            csv::scan_rows(source.reader()?, mode, |row| builder.push(row))?;
            (schema, builder.finish()?)
        };

        if report.malformed > 0 {
            warn!(
                table = table_name,
                malformed = report.malformed,
                dropped = report.dropped,
                "Malformed records in {}",
                location
            );
        }

        let partitions = self.ctx.copied_config().target_partitions();
        let mem_table = into_mem_table(schema, batches, partitions)?;

        self.ctx.deregister_table(table_name)?;
        self.ctx.register_table(table_name, Arc::new(mem_table))?;

        info!("Registered {} from {} ({})", table_name, location, report);
        Ok(report)
    }

    /// Review count per listing over the registered listings and reviews
    /// tables. The result is lazy; nothing runs until it is collected or
    /// written.
    pub async fn reviews_per_listing(&self, query: &ReviewCountQuery) -> Result<DataFrame> {
        let listing_key_type = self
            .column_type(&query.listings_table, &query.listing_id)
            .await?;
        let review_key_type = self
            .column_type(&query.reviews_table, &query.review_listing_key)
            .await?;

        let sql = query.to_sql(&listing_key_type, &review_key_type);
        debug!("Reviews per listing query: {}", sql);

        Ok(self.ctx.sql(&sql).await?)
    }

    async fn column_type(&self, table_name: &str, column: &str) -> Result<DataType> {
        let provider = self.ctx.table_provider(table_name).await?;
        let schema = provider.schema();
        let field = schema.field_with_name(column)?;
        Ok(field.data_type().clone())
    }

    /// Executes `df` and writes it as CSV part files under `location`, with
    /// a header row only when `header` is set. Returns the number of rows
    /// written.
    pub async fn write_csv(
        &self,
        df: DataFrame,
        location: &Location,
        mode: WriteMode,
        header: bool,
    ) -> Result<u64> {
        self.stores.prepare_output(location, mode).await?;
        self.stores.register_object_store(&self.ctx, location).await?;

        let url = location.collection_url()?;
        let options = CsvOptions::default().with_has_header(header);
        let results = df
            .write_csv(&url, DataFrameWriteOptions::new(), Some(options))
            .await?;

        let rows = results
            .iter()
            .filter_map(|batch| batch.column(0).as_any().downcast_ref::<UInt64Array>())
            .flat_map(|counts| counts.iter().flatten())
            .sum::<u64>();

        info!("Wrote {} rows to {}", rows, location);
        Ok(rows)
    }
}
