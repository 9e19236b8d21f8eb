use crate::storage::s3::ObjectStorage;
use common::{Error, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// Totals for one upload run. Bytes are summed from local file sizes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadStats {
    pub files: u64,
    pub bytes: u64,
}

impl UploadStats {
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}

impl fmt::Display for UploadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Uploaded {} files ({:.2} MB total)",
            self.files,
            self.megabytes()
        )
    }
}

/// Object key for a file at `relative` below the upload root. Separators are
/// always `/` regardless of platform; an empty prefix leaves the relative
/// path unchanged.
pub fn object_key(prefix: &str, relative: &Path) -> String {
    let rel = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        rel
    } else {
        format!("{}/{}", prefix, rel)
    }
}

/// Every regular file below `root`, in file-name order.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Uploads every file under `local_root` to `s3://<bucket>/<prefix>/...`,
/// preserving relative paths. The first failing file aborts the run; files
/// uploaded before it stay in the bucket.
pub async fn upload_folder(
    storage: &dyn ObjectStorage,
    local_root: &Path,
    prefix: &str,
) -> Result<UploadStats> {
    if !local_root.is_dir() {
        return Err(Error::LocalRootNotFound(local_root.to_path_buf()));
    }

    let files = collect_files(local_root)?;
    upload_files(storage, local_root, &files, prefix).await
}

async fn upload_files(
    storage: &dyn ObjectStorage,
    local_root: &Path,
    files: &[PathBuf],
    prefix: &str,
) -> Result<UploadStats> {
    let mut stats = UploadStats::default();

    for file_path in files {
        let relative = file_path
            .strip_prefix(local_root)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        let key = object_key(prefix, relative);
        let target = storage.object_url(&key);

        let size = match upload_file(storage, &key, file_path).await {
            Ok(size) => size,
            Err(e) => {
                return Err(Error::Upload {
                    path: file_path.clone(),
                    target,
                    source: Box::new(e),
                });
            }
        };

        stats.files += 1;
        stats.bytes += size;
        info!("Uploaded: {}", target);
    }

    Ok(stats)
}

async fn upload_file(storage: &dyn ObjectStorage, key: &str, path: &Path) -> Result<u64> {
    let size = tokio::fs::metadata(path).await?.len();
    storage.put_file(key, path).await?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn snapshot_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "listings.csv.gz", &[1u8; 1500]);
        write(dir.path(), "reviews.csv.gz", &[2u8; 700]);
        write(dir.path(), "extra/calendar/calendar.csv.gz", b"abc");
        dir
    }

    #[test]
    fn test_object_key() {
        let rel = Path::new("extra").join("calendar.csv.gz");

        assert_eq!(
            object_key("/raw/city=london/", &rel),
            "raw/city=london/extra/calendar.csv.gz"
        );
        assert_eq!(object_key("", &rel), "extra/calendar.csv.gz");
        assert_eq!(object_key("///", Path::new("a.txt")), "a.txt");
    }

    #[test]
    fn test_collect_files_skips_directories() {
        let dir = snapshot_tree();
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| object_key("", p.strip_prefix(dir.path()).unwrap()))
            .collect();

        assert_eq!(
            names,
            vec![
                "extra/calendar/calendar.csv.gz",
                "listings.csv.gz",
                "reviews.csv.gz"
            ]
        );
    }

    #[tokio::test]
    async fn test_upload_reports_files_and_bytes() {
        let dir = snapshot_tree();
        let storage = MemoryStorage::new("lake");

        let stats = upload_folder(&storage, dir.path(), "raw/source=insideairbnb")
            .await
            .unwrap();

        assert_eq!(stats, UploadStats { files: 3, bytes: 2203 });
        assert_eq!(
            storage.keys(),
            vec![
                "raw/source=insideairbnb/extra/calendar/calendar.csv.gz",
                "raw/source=insideairbnb/listings.csv.gz",
                "raw/source=insideairbnb/reviews.csv.gz",
            ]
        );
        assert_eq!(
            storage.object("raw/source=insideairbnb/reviews.csv.gz").unwrap(),
            vec![2u8; 700]
        );
    }

    #[tokio::test]
    async fn test_empty_prefix_uses_relative_paths() {
        let dir = snapshot_tree();
        let storage = MemoryStorage::new("lake");

        upload_folder(&storage, dir.path(), "").await.unwrap();

        assert!(storage.keys().contains(&"listings.csv.gz".to_string()));
    }

    #[tokio::test]
    async fn test_missing_root_fails_before_uploading() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new("lake");
        let missing = dir.path().join("nope");

        let err = upload_folder(&storage, &missing, "raw").await.unwrap_err();

        assert!(matches!(err, Error::LocalRootNotFound(ref p) if *p == missing));
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_file_as_root_is_rejected() {
        let dir = snapshot_tree();
        let storage = MemoryStorage::new("lake");

        let err = upload_folder(&storage, &dir.path().join("listings.csv.gz"), "raw")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::LocalRootNotFound(_)));
    }

    #[tokio::test]
    async fn test_failure_aborts_without_rollback() {
        let dir = snapshot_tree();
        let storage = MemoryStorage::new("lake").fail_on("raw/listings.csv.gz");

        let err = upload_folder(&storage, dir.path(), "raw").await.unwrap_err();

        match err {
            Error::Upload { path, target, .. } => {
                assert_eq!(path, dir.path().join("listings.csv.gz"));
                assert_eq!(target, "s3://lake/raw/listings.csv.gz");
            }
            other => panic!("unexpected error: {other}"),
        }
        // calendar sorts first and stays uploaded, reviews is never attempted
        assert_eq!(storage.keys(), vec!["raw/extra/calendar/calendar.csv.gz"]);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_named_in_error() {
        let dir = snapshot_tree();
        let storage = MemoryStorage::new("lake");
        let vanished = dir.path().join("calendar.csv.gz");
        let files = vec![vanished.clone(), dir.path().join("listings.csv.gz")];

        let err = upload_files(&storage, dir.path(), &files, "raw")
            .await
            .unwrap_err();

        match err {
            Error::Upload { path, target, source } => {
                assert_eq!(path, vanished);
                assert_eq!(target, "s3://lake/raw/calendar.csv.gz");
                assert!(matches!(*source, Error::Io(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(storage.keys().is_empty());
    }
}
