//! phytofetch - Individual plant point-cloud fetcher
//!
//! Sparse, random-access retrieval of single plant point clouds from large
//! remote tar archives, without downloading the archives themselves.
//!
//! # How it works
//!
//! A pre-built tar listing records, for every archive member, the 512-byte
//! block at which its header sits and its payload size. Parsing that listing
//! yields a per-date [`TarIndex`] keyed by plant name; the payload of any
//! member then lives at the absolute byte range
//! `block * 512 + 512 .. + file_size` of the packed stream, which a single
//! HTTP range request can pull on its own.
//!
//! # Example
//!
//! ```rust,ignore
//! use phytofetch::{Catalog, HttpRangeSource, Level, PlantFetcher, ScanDate, Season, Sensor, TarIndex};
//!
//! # async fn example() -> phytofetch::Result<()> {
//! let catalog = Catalog::new(Season::Season12, Level::new(0)?, Sensor::PointCloud3d,
//!     Some("sorghum".to_string()))?;
//! let date = ScanDate::parse("2021-05-03__11-22-33-444")?;
//!
//! let http = HttpRangeSource::new();
//! let listing = http.fetch_text(&catalog.index_url(&date)).await?;
//! let index = TarIndex::parse(&listing);
//!
//! let fetcher = PlantFetcher::new(http, "plant_point_clouds");
//! let outcome = fetcher
//!     .fetch_plant("sorghum_b100_003", &index, &catalog.archive_url(&date), &date)
//!     .await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod index;
pub mod transfer;
pub mod types;

// Re-exports
pub use batch::{candidate_plants, prune_existing, BatchRunner, BatchStats, DateArchive};
pub use catalog::{scan_date_from_index_filename, Catalog, Level, Season, Sensor};
pub use config::FetchConfig;
pub use error::{FetchError, Result};
pub use fetcher::{timeseries_folder, FetchOutcome, PlantFetcher};
pub use index::TarIndex;
pub use transfer::{
    fetch_range_with_retry, FileRangeSource, HttpRangeSource, RangeSource, RetryPolicy,
};
pub use types::{IndexEntry, MemberKind, ScanDate};

/// Version of the phytofetch implementation
pub const PHYTOFETCH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tar block size; headers and payload padding are aligned to it
pub const TAR_BLOCK_SIZE: u64 = 512;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!PHYTOFETCH_VERSION.is_empty());
    }
}
