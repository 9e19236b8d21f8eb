pub mod processor;
pub mod storage;
pub mod utils;

use common::Result;
use common::config::Settings;
use processor::{LakehouseProcessor, ParseMode, ParseReport, ReviewCountQuery};
use std::fmt;
use std::sync::Arc;
use storage::{Location, StoreRegistry, WriteMode};
use tracing::info;

/// Inputs and options of one "popular listings" run.
#[derive(Debug, Clone)]
pub struct PopularListingsJob {
    pub listings: String,
    pub reviews: String,
    pub output: String,
    pub review_key: String,
    pub mode: ParseMode,
    pub write_mode: WriteMode,
    /// Write a header row before the data rows.
    pub header: bool,
}

impl PopularListingsJob {
    pub fn new(listings: &str, reviews: &str, output: &str) -> Self {
        Self {
            listings: listings.to_string(),
            reviews: reviews.to_string(),
            output: output.to_string(),
            review_key: ReviewCountQuery::default().review_listing_key,
            mode: ParseMode::default(),
            write_mode: WriteMode::default(),
            header: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationReport {
    pub listings: ParseReport,
    pub reviews: ParseReport,
    pub rows_written: u64,
}

impl fmt::Display for AggregationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listings: {}; reviews: {}; wrote {} rows",
            self.listings, self.reviews, self.rows_written
        )
    }
}

/// Counts reviews per listing and writes the result, most reviewed first,
/// as CSV under the job's output location.
pub async fn run_popular_listings(job: &PopularListingsJob, settings: &Settings) -> Result<AggregationReport> {
    let listings = Location::parse(&job.listings)?;
    let reviews = Location::parse(&job.reviews)?;
    let output = Location::parse(&job.output)?;

    let stores = Arc::new(StoreRegistry::from_settings(settings));

    // nothing is read until both inputs exist and the output is usable
    stores.ensure_input_exists(&listings).await?;
    stores.ensure_input_exists(&reviews).await?;
    stores.prepare_output(&output, job.write_mode).await?;

    let query = ReviewCountQuery::default().with_review_listing_key(&job.review_key);
    let processor = LakehouseProcessor::new(stores);

    info!("Reading listings from {}", listings);
    let listings_report = processor
        .register_csv_table(&query.listings_table, &listings, &query.listings_columns(), job.mode)
        .await?;

    info!("Reading reviews from {}", reviews);
    let reviews_report = processor
        .register_csv_table(&query.reviews_table, &reviews, &query.reviews_columns(), job.mode)
        .await?;

    let df = processor.reviews_per_listing(&query).await?;
    let rows_written = processor
        .write_csv(df, &output, job.write_mode, job.header)
        .await?;

    Ok(AggregationReport {
        listings: listings_report,
        reviews: reviews_report,
        rows_written,
    })
}
