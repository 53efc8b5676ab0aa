use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};

use crate::Result;

/// Writes records as JSON lines, one object per line.
#[derive(Debug, Clone)]
pub struct JsonLinesWriter {
    path: PathBuf,
}

impl JsonLinesWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonLinesWriter { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncates the file, then writes `records`.
    pub async fn overwrite<T: Serialize>(&self, records: &[T]) -> Result<()> {
        let file = File::create(&self.path).await?;
        write_lines(file, records).await
    }

    /// Appends `records`, creating the file if needed.
    pub async fn append<T: Serialize>(&self, records: &[T]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        write_lines(file, records).await
    }
}

/// Every record is serialized before the first byte is written.
async fn write_lines<T: Serialize>(mut file: File, records: &[T]) -> Result<()> {
    let mut bytes = Vec::new();
    for record in records {
        serde_json::to_writer(&mut bytes, record)?;
        bytes.push(b'\n');
    }
    file.write_all(&bytes).await?;
    file.flush().await?;
    Ok(())
}
