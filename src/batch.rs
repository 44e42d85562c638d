//! Batch fan-out across plants and dates
//!
//! One task per plant name, gated by a semaphore sized to the worker count.
//! Tasks share nothing mutable except the run counters; the per-date indices
//! are read-only behind `Arc`.

use crate::fetcher::{timeseries_folder, FetchOutcome, PlantFetcher};
use crate::index::TarIndex;
use crate::transfer::RangeSource;
use crate::types::ScanDate;
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One scan date's archive location and pre-built, read-only index
#[derive(Debug, Clone)]
pub struct DateArchive {
    pub date: ScanDate,
    /// Archive URL, or a local path when reading through [`crate::FileRangeSource`]
    pub location: String,
    pub index: Arc<TarIndex>,
}

/// Counters for one batch run
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchStats {
    pub fetched: usize,
    pub up_to_date: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl BatchStats {
    fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Fetched { .. } => self.fetched += 1,
            FetchOutcome::UpToDate => self.up_to_date += 1,
            FetchOutcome::NotFound => self.not_found += 1,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "batch complete: {} fetched, {} up to date, {} not found, {} failed",
            self.fetched, self.up_to_date, self.not_found, self.failed
        )
    }
}

/// Plants worth fetching: entities with a final member in the designated
/// final-date index(es), optionally narrowed by genotype substrings
///
/// Sorted and deduplicated so batch runs enumerate deterministically.
pub fn candidate_plants(final_indices: &[&TarIndex], genotypes: &[String]) -> Vec<String> {
    let mut names = BTreeSet::new();
    for index in final_indices {
        for (entity, entries) in index.entities() {
            if entries.iter().any(|e| e.kind.is_final()) {
                names.insert(entity.to_string());
            }
        }
    }

    names
        .into_iter()
        .filter(|name| {
            genotypes.is_empty() || genotypes.iter().any(|g| name.contains(g.trim()))
        })
        .collect()
}

/// Drop plants whose timeseries folder already exists under `output_root`
pub fn prune_existing(candidates: Vec<String>, output_root: &Path) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|name| !timeseries_folder(output_root, name).is_dir())
        .collect()
}

/// Runs plant fetches in parallel across scan dates
pub struct BatchRunner<S: RangeSource + 'static> {
    fetcher: Arc<PlantFetcher<S>>,
    workers: usize,
}

impl<S: RangeSource + 'static> BatchRunner<S> {
    /// One worker per logical CPU by default
    pub fn new(fetcher: PlantFetcher<S>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            workers: default_workers(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        if workers > 0 {
            self.workers = workers;
        }
        self
    }

    /// Fetch every plant across every date archive
    ///
    /// Per-plant failures are tallied, never fatal; completed downloads are
    /// untouched by later failures.
    pub async fn run(&self, plants: Vec<String>, dates: Arc<Vec<DateArchive>>) -> BatchStats {
        info!(
            "dispatching {} plant(s) over {} date(s) on {} worker(s)",
            plants.len(),
            dates.len(),
            self.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let stats = Arc::new(Mutex::new(BatchStats::default()));
        let mut tasks = JoinSet::new();

        for plant in plants {
            let fetcher = Arc::clone(&self.fetcher);
            let dates = Arc::clone(&dates);
            let semaphore = Arc::clone(&semaphore);
            let stats = Arc::clone(&stats);

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    // the semaphore lives as long as the run
                    return;
                };

                for archive in dates.iter() {
                    let fetched = fetcher
                        .fetch_plant(&plant, &archive.index, &archive.location, &archive.date)
                        .await;
                    match fetched {
                        Ok(outcome) => stats.lock().record(&outcome),
                        Err(err) => {
                            warn!("{}: fetch failed for {} ({})", plant, archive.date, err);
                            stats.lock().failed += 1;
                        }
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!("worker task failed: {}", err);
                stats.lock().failed += 1;
            }
        }

        let stats = *stats.lock();
        info!("{}", stats.summary());
        stats
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FINAL_LISTING: &str = "\
block 0: -rw-r--r-- scanner/field 700 2022-02-01 09:41 pc/plant_001/plant_001_final.ply
block 3: -rw-r--r-- scanner/field 500 2022-02-01 09:41 pc/plant_002/plant_002_raw.ply
block 6: -rw-r--r-- scanner/field 300 2022-02-01 09:42 pc/sorghum_b100_003/sorghum_b100_003_final.ply
";

    #[test]
    fn test_candidates_require_a_final_member() {
        let index = TarIndex::parse(FINAL_LISTING);
        let plants = candidate_plants(&[&index], &[]);

        // plant_002 only has an intermediate member
        assert_eq!(plants, vec!["plant_001", "sorghum_b100_003"]);
    }

    #[test]
    fn test_candidates_merge_and_dedupe_across_indices() {
        let index_a = TarIndex::parse(FINAL_LISTING);
        let index_b = TarIndex::parse(
            "block 0: -rw-r--r-- scanner/field 10 2022-02-08 09:41 pc/plant_001/plant_001_final.ply\n\
             block 3: -rw-r--r-- scanner/field 10 2022-02-08 09:41 pc/plant_007/plant_007_final.ply\n",
        );

        let plants = candidate_plants(&[&index_a, &index_b], &[]);
        assert_eq!(plants, vec!["plant_001", "plant_007", "sorghum_b100_003"]);
    }

    #[test]
    fn test_genotype_filter_is_substring_match() {
        let index = TarIndex::parse(FINAL_LISTING);

        let plants = candidate_plants(&[&index], &["b100".to_string()]);
        assert_eq!(plants, vec!["sorghum_b100_003"]);

        // surrounding whitespace in the filter is tolerated
        let plants = candidate_plants(&[&index], &[" b100 ".to_string()]);
        assert_eq!(plants, vec!["sorghum_b100_003"]);

        let plants = candidate_plants(&[&index], &["nonexistent".to_string()]);
        assert!(plants.is_empty());
    }

    #[test]
    fn test_prune_existing_timeseries_folders() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("plant_001_timeseries")).unwrap();

        let remaining = prune_existing(
            vec!["plant_001".to_string(), "plant_002".to_string()],
            dir.path(),
        );
        assert_eq!(remaining, vec!["plant_002"]);
    }

    #[test]
    fn test_stats_recording() {
        let mut stats = BatchStats::default();
        stats.record(&FetchOutcome::NotFound);
        stats.record(&FetchOutcome::UpToDate);
        stats.record(&FetchOutcome::Fetched {
            last_file: "x.ply".into(),
            downloaded: 2,
        });

        assert_eq!(stats.not_found, 1);
        assert_eq!(stats.up_to_date, 1);
        assert_eq!(stats.fetched, 1);
        assert!(stats.summary().contains("1 fetched"));
    }
}
