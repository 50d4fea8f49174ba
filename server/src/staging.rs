//! Disk-backed staging area for chunked CSV uploads.
//!
//! Chunks are written under their uploaded filename and consumed exactly once
//! when combined. One import run at a time per staging directory; concurrent
//! runs against the same directory are not supported.

use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io;
use uuid::Uuid;

const COMBINED_PREFIX: &str = "combined-";

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("no chunks staged")]
    NoChunks,

    #[error("invalid chunk name")]
    InvalidName,

    #[error("staging io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Stores one chunk under the file-name component of `name`. A later
    /// write to the same name replaces the earlier chunk.
    pub async fn store_chunk(&self, name: &str, bytes: &[u8]) -> Result<(), StagingError> {
        let file_name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(StagingError::InvalidName)?;
        if file_name.starts_with(COMBINED_PREFIX) {
            return Err(StagingError::InvalidName);
        }

        fs::create_dir_all(&self.dir).await?;
        fs::write(self.dir.join(file_name), bytes).await?;

        Ok(())
    }

    /// Concatenates all staged chunks, in sequence-number order, into one
    /// combined file and returns its path. Each chunk is deleted only after
    /// its bytes have been fully copied.
    pub async fn combine_all(&self) -> Result<PathBuf, StagingError> {
        let chunks = self.staged_chunks().await?;
        if chunks.is_empty() {
            return Err(StagingError::NoChunks);
        }

        let combined = self.dir.join(format!("{COMBINED_PREFIX}{}.csv", Uuid::new_v4()));
        let mut out = File::create(&combined).await?;

        for chunk in chunks {
            let mut input = File::open(&chunk).await?;
            io::copy(&mut input, &mut out).await?;
            fs::remove_file(&chunk).await?;
        }
        out.sync_all().await?;

        Ok(combined)
    }

    /// Removes every staged file, chunks and combined artifacts alike.
    pub async fn clear(&self) -> Result<(), StagingError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
            }
        }

        Ok(())
    }

    /// Staged chunk paths sorted by the sequence number embedded in the
    /// filename, then by name. Combined artifacts are not chunks.
    async fn staged_chunks(&self) -> Result<Vec<PathBuf>, StagingError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut chunks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(COMBINED_PREFIX) || !entry.file_type().await?.is_file() {
                continue;
            }
            chunks.push((sequence_key(&name), name, entry.path()));
        }

        chunks.sort();
        Ok(chunks.into_iter().map(|(_, _, path)| path).collect())
    }
}

/// First integer embedded in a chunk name; chunks without one sort last.
fn sequence_key(name: &str) -> u64 {
    let digits = Regex::new(r"\d+").unwrap();

    digits
        .find(name)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn contents(path: &Path) -> String {
        String::from_utf8(fs::read(path).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn combines_in_sequence_order() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());

        staging.store_chunk("part-10.csv", b"ten").await.unwrap();
        staging.store_chunk("part-2.csv", b"two,").await.unwrap();

        let combined = staging.combine_all().await.unwrap();
        assert_eq!(contents(&combined).await, "two,ten");
    }

    #[tokio::test]
    async fn chunks_are_consumed_by_combine() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());

        staging.store_chunk("c1.csv", b"a").await.unwrap();
        staging.store_chunk("c2.csv", b"b").await.unwrap();

        staging.combine_all().await.unwrap();

        assert!(staging.staged_chunks().await.unwrap().is_empty());
        assert!(matches!(
            staging.combine_all().await,
            Err(StagingError::NoChunks)
        ));
    }

    #[tokio::test]
    async fn empty_staging_is_an_error_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());

        assert!(matches!(
            staging.combine_all().await,
            Err(StagingError::NoChunks)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn last_write_for_a_name_wins() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());

        staging.store_chunk("c1.csv", b"first").await.unwrap();
        staging.store_chunk("c1.csv", b"second").await.unwrap();

        let combined = staging.combine_all().await.unwrap();
        assert_eq!(contents(&combined).await, "second");
    }

    #[tokio::test]
    async fn chunk_names_are_reduced_to_their_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());

        staging
            .store_chunk("nested/dir/c1.csv", b"payload")
            .await
            .unwrap();

        let staged = staging.staged_chunks().await.unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0], dir.path().join("c1.csv"));

        assert!(matches!(
            staging.store_chunk("..", b"x").await,
            Err(StagingError::InvalidName)
        ));
    }

    #[tokio::test]
    async fn clear_removes_chunks_and_combined_files() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());

        staging.store_chunk("c1.csv", b"a").await.unwrap();
        staging.combine_all().await.unwrap();
        staging.store_chunk("c2.csv", b"b").await.unwrap();

        staging.clear().await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
