//! The ingestion pipeline: decoded rows are driven into fixed-size bulk
//! inserts, and the chunked variant wraps that in combine + cleanup.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::decode::{self, ParseError, Row};
use crate::models::NewTicket;
use crate::staging::{Staging, StagingError};
use crate::storage::{StorageError, TicketStore};

/// What one import run accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("no chunks staged for import")]
    NoChunks,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("staging area failure: {0}")]
    Staging(StagingError),

    #[error("batch {batch} failed after {committed} rows were committed: {source}")]
    Batch {
        /// Zero-based index of the first failing batch.
        batch: usize,
        /// Rows committed by the batches before it. They stay committed.
        committed: usize,
        source: StorageError,
    },
}

impl From<StagingError> for ImportError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::NoChunks => ImportError::NoChunks,
            other => ImportError::Staging(other),
        }
    }
}

/// Buffers rows up to `batch_size` and submits each full batch as one bulk
/// insert, in source-row order, stopping at the first failed batch. No
/// rollback, no retries; the final partial batch is flushed at the end.
pub async fn import_rows<I>(
    store: &dyn TicketStore,
    rows: I,
    batch_size: usize,
) -> Result<ImportOutcome, ImportError>
where
    I: Iterator<Item = Result<Row, ParseError>>,
{
    let mut batch = Vec::with_capacity(batch_size);
    let mut inserted = 0;
    let mut skipped = 0;
    let mut batches_sent = 0;

    for row in rows {
        match row? {
            Row::Ticket(ticket) => batch.push(ticket),
            Row::Skipped(issue) => {
                warn!(row = issue.row, "skipping row: {}", issue.reason);
                skipped += 1;
            }
        }

        if batch.len() == batch_size {
            inserted += submit(store, &mut batch, batches_sent, inserted).await?;
            batches_sent += 1;
        }
    }

    if !batch.is_empty() {
        inserted += submit(store, &mut batch, batches_sent, inserted).await?;
    }

    Ok(ImportOutcome { inserted, skipped })
}

async fn submit(
    store: &dyn TicketStore,
    batch: &mut Vec<NewTicket>,
    index: usize,
    committed: usize,
) -> Result<usize, ImportError> {
    let size = batch.len();

    store
        .insert_batch(std::mem::take(batch))
        .await
        .map_err(|source| ImportError::Batch {
            batch: index,
            committed,
            source,
        })?;

    Ok(size)
}

/// The non-chunked variant: the whole CSV is already in hand.
pub async fn import_bytes(
    store: &dyn TicketStore,
    bytes: &[u8],
    batch_size: usize,
) -> Result<ImportOutcome, ImportError> {
    import_rows(store, decode::decode(bytes), batch_size).await
}

/// One chunked import run: combine staged chunks, decode, bulk-insert. The
/// staging area is cleared on every exit path before the result is returned,
/// success or failure.
pub async fn import_staged(
    staging: &Staging,
    store: &dyn TicketStore,
    batch_size: usize,
) -> Result<ImportOutcome, ImportError> {
    let result = combine_and_import(staging, store, batch_size).await;

    if let Err(err) = staging.clear().await {
        warn!("failed to clear staging area: {err}");
    }

    result
}

async fn combine_and_import(
    staging: &Staging,
    store: &dyn TicketStore,
    batch_size: usize,
) -> Result<ImportOutcome, ImportError> {
    let combined = staging.combine_all().await?;
    let bytes = tokio::fs::read(&combined)
        .await
        .map_err(|err| ImportError::Staging(StagingError::Io(err)))?;

    let outcome = import_bytes(store, &bytes, batch_size).await?;
    info!(
        inserted = outcome.inserted,
        skipped = outcome.skipped,
        "import run finished"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn csv_rows(n: usize) -> String {
        let mut csv = String::from("name,email,reference,barcode,table_no\n");
        for i in 0..n {
            csv.push_str(&format!("Guest {i},guest{i}@example.com,R{i},B{i},{i}\n"));
        }
        csv
    }

    #[tokio::test]
    async fn batches_are_ceil_n_over_b() {
        let store = MemoryStore::new();

        let outcome = import_bytes(&store, csv_rows(250).as_bytes(), 100)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ImportOutcome {
                inserted: 250,
                skipped: 0
            }
        );
        assert_eq!(store.batch_calls(), 3);
        assert_eq!(store.batch_sizes().await, [100, 100, 50]);
        assert_eq!(store.list().await.unwrap().len(), 250);
    }

    #[tokio::test]
    async fn exact_multiple_sends_only_full_batches() {
        let store = MemoryStore::new();

        let outcome = import_bytes(&store, csv_rows(200).as_bytes(), 100)
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 200);
        assert_eq!(store.batch_sizes().await, [100, 100]);
    }

    #[tokio::test]
    async fn failing_batch_stops_the_run() {
        let store = MemoryStore::failing_from_batch(3);

        let err = import_bytes(&store, csv_rows(250).as_bytes(), 100)
            .await
            .unwrap_err();

        match err {
            ImportError::Batch {
                batch, committed, ..
            } => {
                assert_eq!(batch, 2);
                assert_eq!(committed, 200);
            }
            other => panic!("unexpected error: {other}"),
        }

        // No further bulk calls after the failure; earlier batches stay.
        assert_eq!(store.batch_calls(), 3);
        assert_eq!(store.list().await.unwrap().len(), 200);
    }

    #[tokio::test]
    async fn skipped_rows_never_reach_the_store() {
        let store = MemoryStore::new();
        let input = "name,email,reference,barcode,table_no\n\
                     A,a@x.com,R1,B1,5\n\
                     B,b@x.com,R2,B2,abc\n\
                     C,c@x.com,R3,B3,9\n";

        let outcome = import_bytes(&store, input.as_bytes(), 100).await.unwrap();

        assert_eq!(
            outcome,
            ImportOutcome {
                inserted: 2,
                skipped: 1
            }
        );
        let stored = store.list().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].barcode, "B1");
        assert_eq!(stored[1].barcode, "B3");
    }

    #[tokio::test]
    async fn row_order_is_kept_across_batches() {
        let store = MemoryStore::new();

        import_bytes(&store, csv_rows(5).as_bytes(), 2).await.unwrap();

        let barcodes: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|ticket| ticket.barcode)
            .collect();
        assert_eq!(barcodes, ["B0", "B1", "B2", "B3", "B4"]);
        assert_eq!(store.batch_calls(), 3);
    }

    #[tokio::test]
    async fn staged_run_cleans_up_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());
        let store = MemoryStore::new();

        staging
            .store_chunk("c1.csv", csv_rows(3).as_bytes())
            .await
            .unwrap();

        let outcome = import_staged(&staging, &store, 100).await.unwrap();
        assert_eq!(outcome.inserted, 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn staged_run_cleans_up_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());
        let store = MemoryStore::failing_from_batch(1);

        staging
            .store_chunk("c1.csv", csv_rows(3).as_bytes())
            .await
            .unwrap();

        assert!(import_staged(&staging, &store, 100).await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn staged_run_without_chunks_reports_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());
        let store = MemoryStore::new();

        assert!(matches!(
            import_staged(&staging, &store, 100).await,
            Err(ImportError::NoChunks)
        ));
        assert_eq!(store.batch_calls(), 0);
    }
}
