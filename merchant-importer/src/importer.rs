use std::io;
use std::path::Path;

use books_common::queue::QueuePort;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("cannot open import file {path}: {error}")]
    OpenError { path: String, error: csv::Error },
    #[error("cannot read headers of import file: {0}")]
    HeaderError(csv::Error),
}

/// One row of a merchant CSV file.
#[derive(Deserialize, Debug)]
struct ImportRow {
    merchant_id: String,
    title: String,
    author: String,
    price: String,
    #[serde(default)]
    seller_rating: Option<f64>,
    #[serde(default)]
    url: Option<String>,
}

/// The message published for a row. The price is kept as written so the
/// validator judges it, not the importer.
#[derive(Serialize, Debug)]
struct Listing<'a> {
    title: &'a str,
    author: &'a str,
    price: &'a str,
    seller_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    seller_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

impl<'a> From<&'a ImportRow> for Listing<'a> {
    fn from(row: &'a ImportRow) -> Self {
        Self {
            title: &row.title,
            author: &row.author,
            price: &row.price,
            seller_id: &row.merchant_id,
            seller_rating: row.seller_rating,
            url: row.url.as_deref().filter(|url| !url.is_empty()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Data rows in the file, readable or not.
    pub read: usize,
    pub sent: usize,
    /// Rows that could not be read or could not be sent.
    pub failed: usize,
}

/// Publish every row of the CSV file at `path` to `queue`.
pub async fn import_file<Q: QueuePort + ?Sized>(
    path: impl AsRef<Path>,
    queue: &Q,
) -> Result<ImportSummary, ImportError> {
    let path = path.as_ref();
    let reader = csv::Reader::from_path(path).map_err(|error| ImportError::OpenError {
        path: path.display().to_string(),
        error,
    })?;

    import_rows(reader, queue).await
}

/// Publish every row read from `reader`. Bad rows and failed sends are logged
/// and counted; they never stop the import.
pub async fn import_rows<R: io::Read, Q: QueuePort + ?Sized>(
    mut reader: csv::Reader<R>,
    queue: &Q,
) -> Result<ImportSummary, ImportError> {
    reader.headers().map_err(ImportError::HeaderError)?;

    let mut summary = ImportSummary::default();
    for (index, row) in reader.deserialize::<ImportRow>().enumerate() {
        summary.read += 1;
        // Line 1 is the header.
        let line = index + 2;

        let row = match row {
            Ok(row) => row,
            Err(error) => {
                warn!(line, "skipping unreadable row: {}", error);
                summary.failed += 1;
                continue;
            }
        };

        let body = match serde_json::to_string(&Listing::from(&row)) {
            Ok(body) => body,
            Err(error) => {
                error!(line, "failed to serialize row: {}", error);
                summary.failed += 1;
                continue;
            }
        };

        info!(
            line,
            title = row.title.as_str(),
            merchant_id = row.merchant_id.as_str(),
            "publishing listing"
        );
        match queue.send(body).await {
            Ok(message_id) => {
                info!(line, %message_id, "listing published");
                summary.sent += 1;
            }
            Err(error) => {
                error!(line, "failed to publish listing: {}", error);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use books_common::queue::MemoryQueue;
    use serde_json::{json, Value};

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::Reader::from_reader(data.as_bytes())
    }

    fn published(queue: &MemoryQueue) -> Vec<Value> {
        queue
            .visible_bodies()
            .iter()
            .map(|body| serde_json::from_str(body).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_rows_become_listings_for_the_validator() {
        let queue = MemoryQueue::new("validator");
        let data = "\
merchant_id,title,author,price,seller_rating,url
m-1,Dune,Frank Herbert,9.99,4.5,https://books.example.com/dune
m-2,Ubik,Philip K. Dick,abc,,
";

        let summary = import_rows(reader(data), &queue).await.unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                read: 2,
                sent: 2,
                failed: 0
            }
        );
        assert_eq!(
            published(&queue),
            vec![
                json!({
                    "title": "Dune",
                    "author": "Frank Herbert",
                    "price": "9.99",
                    "seller_id": "m-1",
                    "seller_rating": 4.5,
                    "url": "https://books.example.com/dune",
                }),
                json!({
                    "title": "Ubik",
                    "author": "Philip K. Dick",
                    "price": "abc",
                    "seller_id": "m-2",
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_optional_columns_may_be_absent() {
        let queue = MemoryQueue::new("validator");
        let data = "merchant_id,title,author,price\nm-9,Solaris,Stanislaw Lem,7\n";

        let summary = import_rows(reader(data), &queue).await.unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(
            published(&queue)[0],
            json!({"title": "Solaris", "author": "Stanislaw Lem", "price": "7", "seller_id": "m-9"})
        );
    }

    #[tokio::test]
    async fn test_unreadable_rows_are_skipped() {
        let queue = MemoryQueue::new("validator");
        let data = "\
merchant_id,title,author,price,seller_rating
m-1,short row
m-2,Fine,Writer,3,not-a-number
m-3,Also fine,Writer,4,2.0
";

        let summary = import_rows(reader(data), &queue).await.unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                read: 3,
                sent: 1,
                failed: 2
            }
        );
        assert_eq!(published(&queue)[0]["title"], "Also fine");
    }

    #[tokio::test]
    async fn test_send_failures_do_not_stop_the_import() {
        let queue = MemoryQueue::new("validator");
        queue.fail_next_sends(1);
        let data = "merchant_id,title,author,price\nm-1,First,A,1\nm-2,Second,B,2\n";

        let summary = import_rows(reader(data), &queue).await.unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(published(&queue)[0]["title"], "Second");
    }

    #[tokio::test]
    async fn test_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import-data.csv");
        std::fs::write(&path, "merchant_id,title,author,price\nm-1,Dune,Frank Herbert,9.99\n")
            .unwrap();
        let queue = MemoryQueue::new("validator");

        let summary = import_file(&path, &queue).await.unwrap();

        assert_eq!(summary.sent, 1);
        assert!(matches!(
            import_file(dir.path().join("missing.csv"), &queue).await,
            Err(ImportError::OpenError { .. })
        ));
    }
}
