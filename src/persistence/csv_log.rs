use super::{LogError, SignalLog, SignalRow};
use crate::models::SignalRecord;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Signal journal kept as a local CSV file
///
/// The header is written when the file is created or empty. Appends are
/// serialized so concurrent scans never interleave rows.
pub struct CsvSignalLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvSignalLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn append_row(path: &Path, row: SignalRow) -> Result<(), LogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

#[async_trait]
impl SignalLog for CsvSignalLog {
    fn name(&self) -> &str {
        "csv"
    }

    async fn append(&self, record: &SignalRecord) -> Result<(), LogError> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let row = SignalRow::from_record(record);

        tokio::task::spawn_blocking(move || append_row(&path, row)).await??;

        tracing::debug!(path = %self.path.display(), symbol = %record.symbol, "Appended signal to CSV");
        Ok(())
    }
}
