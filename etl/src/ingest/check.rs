use common::{Error, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_CHECK_LINES: usize = 5;

/// Preview lines are cut to this many characters.
const PREVIEW_WIDTH: usize = 200;

/// Reads the first `max_lines` lines of a gzip-compressed text file to prove
/// it decompresses. This is a smoke test, not schema validation.
pub fn quick_gzip_check(gz_path: &Path, max_lines: usize) -> Result<Vec<String>> {
    info!(
        "Quick check (first {} lines): {}",
        max_lines,
        gz_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
    );

    let integrity = |source: io::Error| Error::Integrity {
        path: gz_path.to_path_buf(),
        source,
    };

    let file = File::open(gz_path)?;
    if file.metadata()?.len() == 0 {
        return Err(integrity(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "file is empty",
        )));
    }

    let mut reader = BufReader::new(MultiGzDecoder::new(BufReader::new(file)));
    let mut lines = Vec::with_capacity(max_lines);
    let mut buf = Vec::new();

    while lines.len() < max_lines {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(integrity)?;
        if read == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let preview: String = line.trim().chars().take(PREVIEW_WIDTH).collect();
        debug!("{}", preview);
        lines.push(preview);
    }

    Ok(lines)
}
