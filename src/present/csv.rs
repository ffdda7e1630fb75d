use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

use crate::readings::{Reading, ReadingType};

use super::format_value;

pub const CSV_HEADER: &str = "timestamp,value";

/// `None` when there is nothing to export.
///
/// Rows are `timestamp,value` joined with `\n` and no trailing newline.
/// Fields are written verbatim, without quoting. Values use the shortest
/// round-trip form, so `7.0` exports as `7`. Non-finite values export as
/// `NaN`, `Infinity` and `-Infinity`.
pub fn export(readings: &[Reading]) -> Option<String> {
    if readings.is_empty() {
        return None;
    }
    let mut lines = Vec::with_capacity(readings.len() + 1);
    lines.push(CSV_HEADER.to_owned());
    lines.extend(
        readings
            .iter()
            .map(|r| format!("{},{}", r.timestamp, format_value(r.value, None))),
    );
    Some(lines.join("\n"))
}

pub fn export_file_name(node_id: &str, reading_type: &ReadingType) -> String {
    format!("{node_id}_{reading_type}_data.csv")
}

/// Write `body` to `dir/name`, creating `dir` if needed.
pub async fn write_export(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;
    let path = dir.join(name);
    fs::write(&path, body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = body.len(), "CSV exported");
    Ok(path)
}
