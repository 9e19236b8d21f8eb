use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use common::config::Settings;
use lakehouse::processor::ParseMode;
use lakehouse::storage::WriteMode;
use lakehouse::{PopularListingsJob, run_popular_listings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::logging::init();

    let matches = Command::new("Inside Airbnb Lakehouse")
        .version("1.0")
        .about("Aggregates Inside Airbnb snapshots with DataFusion")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("popular-listings")
                .about("Count reviews per listing, most reviewed first")
                .arg(
                    Arg::new("listings")
                        .long("listings")
                        .value_name("PATH")
                        .required(true)
                        .help("Listings CSV, local path or s3:// URI"),
                )
                .arg(
                    Arg::new("reviews")
                        .long("reviews")
                        .value_name("PATH")
                        .required(true)
                        .help("Reviews CSV, local path or s3:// URI"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .value_name("DIR")
                        .required(true)
                        .help("Output directory, local path or s3:// URI"),
                )
                .arg(
                    Arg::new("review-key")
                        .long("review-key")
                        .value_name("COLUMN")
                        .default_value("listings_review_id")
                        .help("Reviews column holding the listing id"),
                )
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .value_name("MODE")
                        .default_value("permissive")
                        .help("Malformed row handling: permissive, dropmalformed or failfast"),
                )
                .arg(
                    Arg::new("header")
                        .long("header")
                        .action(ArgAction::SetTrue)
                        .help("Write a header row to the output"),
                )
                .arg(
                    Arg::new("overwrite")
                        .long("overwrite")
                        .action(ArgAction::SetTrue)
                        .help("Replace existing output"),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Sets a custom config file"),
                ),
        )
        .get_matches();

    let (name, sub) = matches
        .subcommand()
        .context("Please specify a valid subcommand")?;

    match name {
        "popular-listings" => {
            let config_path = sub.get_one::<String>("config").map(|s| s.as_str());
            let settings = Settings::new(config_path).context("Failed to load settings")?;

            let arg = |name: &str| sub.get_one::<String>(name).cloned().unwrap_or_default();
            let mode: ParseMode = arg("mode").parse().context("Invalid --mode")?;
            let write_mode = if sub.get_flag("overwrite") {
                WriteMode::Overwrite
            } else {
                WriteMode::ErrorIfExists
            };

            let job = PopularListingsJob {
                listings: arg("listings"),
                reviews: arg("reviews"),
                output: arg("output"),
                review_key: arg("review-key"),
                mode,
                write_mode,
                header: sub.get_flag("header"),
            };

            let report = run_popular_listings(&job, &settings)
                .await
                .context("Popular listings job failed")?;
            info!("Done. {}", report);
        }
        other => anyhow::bail!("Unknown subcommand: {}", other),
    }

    Ok(())
}
