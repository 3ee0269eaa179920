//! CSV persistence for feed tables.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::WriterBuilder;
use tracing::{debug, info};

use crate::feed::{RowSink, Table};

/// [`RowSink`] writing one comma-delimited `<table>.txt` file. The header
/// row comes from the [`FeedWriter`](crate::feed::FeedWriter), so the csv
/// writer adds none of its own.
pub struct CsvSink {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl CsvSink {
    pub fn create(directory: &Path, table: Table) -> Result<Self> {
        let path = directory.join(table.file_name());
        debug!(path = %path.display(), "creating table file");
        let writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self { writer, path })
    }
}

impl RowSink for CsvSink {
    fn write_row(&mut self, row: &[String]) -> Result<()> {
        self.writer
            .write_record(row)
            .with_context(|| format!("failed to write to {}", self.path.display()))
    }

    fn close(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))
    }
}

/// Deletes table files holding only their header row and returns the number
/// of files kept.
pub fn remove_empty_tables(directory: &Path) -> Result<usize> {
    let mut kept = 0;
    for table in Table::ALL {
        let path = directory.join(table.file_name());
        if !path.exists() {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        if content.lines().count() <= 1 {
            info!(table = table.name(), "removing empty table");
            std::fs::remove_file(&path)?;
        } else {
            kept += 1;
        }
    }
    Ok(kept)
}
