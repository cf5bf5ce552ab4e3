use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use books_common::record::Record;
use thiserror::Error;

/// Column names of the store, written once when the file is created.
pub const HEADER: [&str; 5] = ["Title", "Author", "Price", "Seller Name", "URL"];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("i/o on {path} failed with: {error}")]
    IoError { path: String, error: io::Error },
    #[error("writing a row to {path} failed with: {error}")]
    CsvError { path: String, error: csv::Error },
}

/// Durable, append-only destination for collected listings.
pub trait RecordStore: Send {
    /// Append one row per record, in order. Returns only once the rows are durable.
    fn append(&mut self, records: &[Record]) -> Result<(), StoreError>;
}

/// A CSV file that only ever grows. Existing rows are never rewritten or reordered.
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    /// Open the store at `path`, creating it with the header row if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        let writer = store.writer()?;
        store.finish(writer)?;

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A writer positioned at the end of the file. The header is written first if the file is empty.
    fn writer(&self) -> Result<csv::Writer<File>, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|error| self.io_error(error))?;
        let is_empty = file.metadata().map_err(|error| self.io_error(error))?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_empty {
            writer
                .write_record(HEADER)
                .map_err(|error| self.csv_error(error))?;
        }

        Ok(writer)
    }

    /// Flush buffered rows and wait for the OS to persist them.
    fn finish(&self, mut writer: csv::Writer<File>) -> Result<(), StoreError> {
        writer.flush().map_err(|error| self.io_error(error))?;
        let file = writer
            .into_inner()
            .map_err(|error| self.io_error(error.into_error()))?;
        file.sync_data().map_err(|error| self.io_error(error))
    }

    fn io_error(&self, error: io::Error) -> StoreError {
        StoreError::IoError {
            path: self.path.display().to_string(),
            error,
        }
    }

    fn csv_error(&self, error: csv::Error) -> StoreError {
        StoreError::CsvError {
            path: self.path.display().to_string(),
            error,
        }
    }
}

impl RecordStore for CsvStore {
    fn append(&mut self, records: &[Record]) -> Result<(), StoreError> {
        let mut writer = self.writer()?;
        for record in records {
            writer
                .write_record(row(record))
                .map_err(|error| self.csv_error(error))?;
        }
        self.finish(writer)
    }
}

/// Fields in `HEADER` order. A missing URL is an empty field.
fn row(record: &Record) -> [String; 5] {
    [
        record.title().to_owned(),
        record.author().to_owned(),
        record.price().to_string(),
        record.seller_id().to_owned(),
        record.url().unwrap_or_default().to_owned(),
    ]
}
