use common::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

/// Buffered writes are flushed to disk in blocks of this size.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Streams `url` into `out_path`, replacing any existing file, and returns
/// the number of bytes written.
///
/// The body is written to a sibling `.part` file which is renamed over the
/// destination once the transfer completes, so a failed download never
/// leaves a truncated file at `out_path`.
pub async fn download_file(client: &reqwest::Client, url: &str, out_path: &Path) -> Result<u64> {
    if let Some(parent) = out_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let part_path = part_path(out_path);
    let written = match write_body(&mut response, &part_path).await {
        Ok(written) => written,
        Err(e) => {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e);
        }
    };
    tokio::fs::rename(&part_path, out_path).await?;

    let size_mb = written as f64 / (1024.0 * 1024.0);
    info!("Downloaded: {} ({:.2} MB)", out_path.display(), size_mb);

    Ok(written)
}

async fn write_body(response: &mut reqwest::Response, path: &Path) -> Result<u64> {
    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await? {
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;

    Ok(written)
}

fn part_path(out_path: &Path) -> PathBuf {
    let mut name = out_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    out_path.with_file_name(name)
}
