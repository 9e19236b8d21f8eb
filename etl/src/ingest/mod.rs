pub mod check;
pub mod download;

use check::{DEFAULT_CHECK_LINES, quick_gzip_check};
use common::Result;
use common::config::Settings;
use common::snapshot::{Role, Snapshot};
use download::download_file;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Local paths of the two raw files of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedSnapshot {
    pub listings: PathBuf,
    pub reviews: PathBuf,
}

pub struct Ingestor {
    client: reqwest::Client,
    source_url: String,
    source_region: String,
    base_dir: PathBuf,
    check_lines: usize,
}

impl Ingestor {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_sec))
            .build()?;

        Ok(Self {
            client,
            source_url: settings.source_url.trim_end_matches('/').to_string(),
            source_region: settings.source_region.trim_matches('/').to_string(),
            base_dir: settings.base_dir.clone(),
            check_lines: DEFAULT_CHECK_LINES,
        })
    }

    /// `<source_url>/<region>/<city>/<date>/data/<role>.csv.gz`
    pub fn source_url(&self, snapshot: &Snapshot, role: Role) -> String {
        let mut url = self.source_url.clone();
        if !self.source_region.is_empty() {
            url.push('/');
            url.push_str(&self.source_region);
        }
        format!(
            "{}/{}/{}/data/{}",
            url,
            snapshot.city(),
            snapshot.date_string(),
            role.file_name()
        )
    }

    /// Downloads both files, then smoke-checks each one. A rejected or
    /// failed download aborts the run before any file is checked.
    pub async fn run(&self, snapshot: &Snapshot) -> Result<IngestedSnapshot> {
        let out_dir = snapshot.local_dir(&self.base_dir);
        info!("Saving raw snapshot to: {}", out_dir.display());

        let ingested = IngestedSnapshot {
            listings: self.fetch(snapshot, Role::Listings).await?,
            reviews: self.fetch(snapshot, Role::Reviews).await?,
        };

        quick_gzip_check(&ingested.listings, self.check_lines)?;
        quick_gzip_check(&ingested.reviews, self.check_lines)?;

        info!("Ingestion of data complete.");
        Ok(ingested)
    }

    async fn fetch(&self, snapshot: &Snapshot, role: Role) -> Result<PathBuf> {
        let url = self.source_url(snapshot, role);
        let path = snapshot.raw_file(&self.base_dir, role);
        download_file(&self.client, &url, &path).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use chrono::NaiveDate;
    use common::Error;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::collections::HashMap;
    use std::io::Write;
    use std::net::SocketAddr;
    use tempfile::TempDir;

    const LISTINGS_PATH: &str = "/united-kingdom/england/london/2025-09-14/data/listings.csv.gz";
    const REVIEWS_PATH: &str = "/united-kingdom/england/london/2025-09-14/data/reviews.csv.gz";

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn settings(addr: SocketAddr, base_dir: &std::path::Path) -> Settings {
        let vars: HashMap<String, String> = [
            ("AIRBNB_SOURCE_URL", format!("http://{addr}")),
            ("AIRBNB_BASE_DIR", base_dir.display().to_string()),
            ("AIRBNB_TIMEOUT_SEC", "10".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Settings::from_vars(vars).unwrap()
    }

    fn london() -> Snapshot {
        Snapshot::new(
            "insideairbnb",
            "london",
            NaiveDate::from_ymd_opt(2025, 9, 14).unwrap(),
        )
        .unwrap()
    }

    async fn serve_bytes(body: Vec<u8>) -> Vec<u8> {
        body
    }

    fn snapshot_router(listings: Vec<u8>, reviews: Vec<u8>) -> Router {
        Router::new()
            .route(LISTINGS_PATH, get(move || serve_bytes(listings.clone())))
            .route(REVIEWS_PATH, get(move || serve_bytes(reviews.clone())))
    }

    #[tokio::test]
    async fn test_source_url_template() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings("127.0.0.1:1".parse().unwrap(), dir.path());
        settings.source_url = "https://data.insideairbnb.com/".to_string();
        let ingestor = Ingestor::new(&settings).unwrap();

        assert_eq!(
            ingestor.source_url(&london(), Role::Reviews),
            "https://data.insideairbnb.com/united-kingdom/england/london/2025-09-14/data/reviews.csv.gz"
        );
    }

    #[tokio::test]
    async fn test_downloads_both_files_to_partitioned_path() {
        let listings = gzip(b"id,name\n1,A\n2,B\n");
        let reviews = gzip(b"id,listings_review_id\n10,1\n");
        let addr = serve(snapshot_router(listings.clone(), reviews.clone())).await;
        let dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(&settings(addr, dir.path())).unwrap();

        let ingested = ingestor.run(&london()).await.unwrap();

        let expected_dir = dir
            .path()
            .join("source=insideairbnb/city=london/snapshot_date=2025-09-14");
        assert_eq!(ingested.listings, expected_dir.join("listings.csv.gz"));
        assert_eq!(ingested.reviews, expected_dir.join("reviews.csv.gz"));
        assert_eq!(std::fs::read(&ingested.listings).unwrap(), listings);
        assert_eq!(std::fs::read(&ingested.reviews).unwrap(), reviews);

        let mut entries: Vec<_> = std::fs::read_dir(&expected_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        assert_eq!(entries, vec!["listings.csv.gz", "reviews.csv.gz"]);
    }

    #[tokio::test]
    async fn test_rerun_overwrites_existing_files() {
        let fresh = gzip(b"id,name\n3,C\n");
        let addr = serve(snapshot_router(fresh.clone(), gzip(b"id\n"))).await;
        let dir = TempDir::new().unwrap();
        let settings = settings(addr, dir.path());
        let stale = london().raw_file(dir.path(), Role::Listings);
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, vec![0u8; 4096]).unwrap();

        let ingestor = Ingestor::new(&settings).unwrap();
        let first = ingestor.run(&london()).await.unwrap();
        let second = ingestor.run(&london()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.listings, stale);
        assert_eq!(std::fs::read(&stale).unwrap(), fresh);
    }

    #[tokio::test]
    async fn test_http_error_raises_before_any_check() {
        let router = Router::new()
            .route(LISTINGS_PATH, get(|| async { StatusCode::NOT_FOUND }))
            .route(REVIEWS_PATH, get(|| async { b"not gzip at all".to_vec() }));
        let addr = serve(router).await;
        let dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(&settings(addr, dir.path())).unwrap();

        let err = ingestor.run(&london()).await.unwrap_err();

        match err {
            Error::HttpStatus { url, status } => {
                assert_eq!(status, 404);
                assert!(url.ends_with(LISTINGS_PATH));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!london().raw_file(dir.path(), Role::Listings).exists());
        assert!(!london().raw_file(dir.path(), Role::Reviews).exists());
    }

    #[tokio::test]
    async fn test_server_error_on_second_file_skips_checks() {
        let router = Router::new()
            .route(LISTINGS_PATH, get(|| async { b"corrupt".to_vec() }))
            .route(
                REVIEWS_PATH,
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            );
        let addr = serve(router).await;
        let dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(&settings(addr, dir.path())).unwrap();

        let err = ingestor.run(&london()).await.unwrap_err();

        // the corrupt listings file would fail the check, but it is never reached
        assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_corrupt_download_is_an_integrity_error() {
        let addr = serve(snapshot_router(b"<html>moved</html>".to_vec(), gzip(b"id\n"))).await;
        let dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(&settings(addr, dir.path())).unwrap();

        let err = ingestor.run(&london()).await.unwrap_err();

        assert!(matches!(err, Error::Integrity { ref path, .. } if path.ends_with("listings.csv.gz")));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(&settings(addr, dir.path())).unwrap();

        let err = ingestor.run(&london()).await.unwrap_err();

        assert!(matches!(err, Error::Http(_)));
    }
}
