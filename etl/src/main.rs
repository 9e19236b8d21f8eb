use anyhow::Context;
use clap::{Arg, Command};
use common::config::Settings;

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Settings file; AIRBNB_* environment variables take precedence")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::logging::init();

    let matches = Command::new("Inside Airbnb ETL")
        .version("1.0")
        .about("Downloads raw Inside Airbnb snapshots and loads them into S3")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("ingest")
                .about("Download listings and reviews for the configured city and snapshot date")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("upload")
                .about("Upload the local snapshot directory to the configured S3 bucket")
                .arg(config_arg()),
        )
        .get_matches();

    let (name, sub_matches) = matches
        .subcommand()
        .context("Please specify a valid subcommand")?;
    let config_path = sub_matches.get_one::<String>("config").map(|s| s.as_str());
    let settings = Settings::new(config_path).context("Failed to load settings")?;

    match name {
        "ingest" => {
            let ingested = etl::run_ingest(&settings)
                .await
                .context("Ingestion failed")?;
            println!("{}", ingested.listings.display());
            println!("{}", ingested.reviews.display());
        }
        "upload" => {
            let stats = etl::run_upload(&settings).await.context("Upload failed")?;
            println!("Done. {}", stats);
        }
        other => anyhow::bail!("Unknown subcommand: {}", other),
    }

    Ok(())
}
