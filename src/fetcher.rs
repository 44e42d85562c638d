//! Plant fetcher - materialize final point-cloud members for one entity
//!
//! For each member the payload range inside the packed archive is computed
//! from the listing's block number: the block points at the member's 512-byte
//! header, so the payload starts exactly one block later. Getting this wrong
//! mixes header bytes into every extracted file.

use crate::error::Result;
use crate::index::TarIndex;
use crate::transfer::{fetch_range_with_retry, RangeSource, RetryPolicy};
use crate::types::ScanDate;
use bytes::Bytes;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Suffix of an entity's output folder name
const TIMESERIES_SUFFIX: &str = "_timeseries";

/// Output folder for one entity's timeseries
pub fn timeseries_folder(output_root: &Path, entity: &str) -> PathBuf {
    output_root.join(format!("{}{}", entity, TIMESERIES_SUFFIX))
}

/// Result of fetching one entity for one date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Entity absent from the index; normal for many dates
    NotFound,
    /// Nothing new: no final members exist, or every output is already on disk
    UpToDate,
    /// At least one member was downloaded
    Fetched {
        last_file: PathBuf,
        downloaded: usize,
    },
}

impl FetchOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self, FetchOutcome::Fetched { .. })
    }
}

/// Materializes final point-cloud members from remote archives
pub struct PlantFetcher<S: RangeSource> {
    source: S,
    output_root: PathBuf,
    retry: RetryPolicy,
}

impl<S: RangeSource> PlantFetcher<S> {
    pub fn new(source: S, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source,
            output_root: output_root.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy for range requests
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Output folder for one entity
    pub fn output_folder(&self, entity: &str) -> PathBuf {
        timeseries_folder(&self.output_root, entity)
    }

    /// Fetch every final member of `entity` from one date's archive
    ///
    /// Idempotent: members whose destination file already exists are skipped
    /// without a network call. Entry-level failures are logged and the
    /// remaining entries still run; an error is returned only if nothing was
    /// written and at least one entry failed.
    pub async fn fetch_plant(
        &self,
        entity: &str,
        index: &TarIndex,
        archive_location: &str,
        date: &ScanDate,
    ) -> Result<FetchOutcome> {
        let Some(entries) = index.get(entity) else {
            debug!("{}: not in index for {}", entity, date);
            return Ok(FetchOutcome::NotFound);
        };

        // lookup comes first so an absent entity leaves no folder behind
        let folder = self.output_folder(entity);
        fs::create_dir_all(&folder).await?;

        let mut last_file = None;
        let mut downloaded = 0usize;
        let mut last_err = None;

        for entry in entries.iter().filter(|e| e.kind.is_final()) {
            let dest = folder.join(format!("{}_{}.ply", date, entry.filename));
            if fs::try_exists(&dest).await? {
                debug!("already downloaded {}", dest.display());
                continue;
            }

            let (start, end) = entry.payload_range();
            let fetched =
                fetch_range_with_retry(&self.source, archive_location, start, end, &self.retry)
                    .await;

            match fetched {
                Ok(bytes) => match write_atomic(&dest, &bytes).await {
                    Ok(()) => {
                        debug!("wrote {} ({} bytes)", dest.display(), bytes.len());
                        downloaded += 1;
                        last_file = Some(dest);
                    }
                    Err(err) => {
                        warn!("{}: failed to write {} ({})", entity, dest.display(), err);
                        last_err = Some(err);
                    }
                },
                Err(err) => {
                    warn!(
                        "{}: failed to fetch {} from {} ({})",
                        entity, entry.filename, archive_location, err
                    );
                    last_err = Some(err);
                }
            }
        }

        match (last_file, last_err) {
            (Some(last_file), _) => {
                info!("{}: downloaded {} member(s) for {}", entity, downloaded, date);
                Ok(FetchOutcome::Fetched {
                    last_file,
                    downloaded,
                })
            }
            (None, Some(err)) => Err(err),
            (None, None) => Ok(FetchOutcome::UpToDate),
        }
    }
}

/// Write to a unique temp name in the destination directory, then rename
///
/// A crash mid-write leaves only a `.part` file; the destination either does
/// not exist or holds the complete payload.
async fn write_atomic(dest: &Path, bytes: &Bytes) -> Result<()> {
    let tmp = dest.with_extension(format!("{}.part", Uuid::new_v4().simple()));
    fs::write(&tmp, bytes).await?;
    if let Err(err) = fs::rename(&tmp, dest).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}
