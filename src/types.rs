//! Core data types for the plant point-cloud fetcher

use crate::error::{FetchError, Result};
use crate::TAR_BLOCK_SIZE;
use chrono::NaiveDate;
use std::fmt;

/// Naming marker that distinguishes the canonical processed point cloud
/// from intermediate pipeline outputs
const FINAL_MARKER: &str = "final";

/// Processing stage of an archive member, resolved once at parse time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Intermediate pipeline output, never fetched
    Intermediate,
    /// Canonical, fully processed point cloud
    Final,
}

impl MemberKind {
    /// Classify a member by its file stem
    pub fn from_stem(stem: &str) -> Self {
        if stem.contains(FINAL_MARKER) {
            MemberKind::Final
        } else {
            MemberKind::Intermediate
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, MemberKind::Final)
    }
}

/// One archive member as recorded in a tar listing
///
/// `block` is the 512-byte block number of the member *header*; the payload
/// begins one block later. Both integer fields come from unsigned parses, so
/// the `>= 0` invariants hold by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Block number of the member's header in the source tar stream
    pub block: u64,
    /// Declared payload size in bytes
    pub file_size: u64,
    /// Member path as recorded in the listing
    pub path: String,
    /// File name without extension
    pub filename: String,
    /// Processing stage, derived from `filename`
    pub kind: MemberKind,
}

impl IndexEntry {
    /// Build an entry, deriving the member kind from the stem
    pub fn new(block: u64, file_size: u64, path: impl Into<String>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let kind = MemberKind::from_stem(&filename);
        Self {
            block,
            file_size,
            path: path.into(),
            filename,
            kind,
        }
    }

    /// First byte of the member's payload in the packed archive stream
    ///
    /// The listing's block number points at the 512-byte header block, so the
    /// payload starts exactly one block after it.
    pub fn payload_start(&self) -> u64 {
        self.block * TAR_BLOCK_SIZE + TAR_BLOCK_SIZE
    }

    /// One past the last payload byte
    pub fn payload_end(&self) -> u64 {
        self.payload_start() + self.file_size
    }

    /// Absolute byte range `[start, end)` of the payload
    pub fn payload_range(&self) -> (u64, u64) {
        (self.payload_start(), self.payload_end())
    }

    /// Payload end rounded up to the next block boundary
    ///
    /// Tar pads each payload to a full block; a consumer that wants to keep
    /// reading past this member (e.g. to the next header) needs the padded
    /// end. The fetch path itself never does.
    pub fn padded_end(&self) -> u64 {
        self.payload_end().div_ceil(TAR_BLOCK_SIZE) * TAR_BLOCK_SIZE
    }
}

/// A validated scan-date token as it appears in archive and listing names
///
/// Two forms occur in the Data Store: plain `YYYY-MM-DD` (season 10) and the
/// timestamped `YYYY-MM-DD__HH-MM-SS-mmm` used everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanDate(String);

impl ScanDate {
    /// Parse and validate a scan-date token
    pub fn parse(token: impl Into<String>) -> Result<Self> {
        let token = token.into();

        let (date_part, rest) = match token.split_once("__") {
            Some((d, t)) => (d, Some(t)),
            None => (token.as_str(), None),
        };

        NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|_| FetchError::InvalidScanDate(token.clone()))?;

        if let Some(time_part) = rest {
            if !is_valid_scan_time(time_part) {
                return Err(FetchError::InvalidScanDate(token));
            }
        }

        Ok(Self(token))
    }

    /// The raw token, exactly as it appears in Data Store names
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `YYYY-MM-DD` component
    pub fn day(&self) -> &str {
        self.0.split_once("__").map_or(self.0.as_str(), |(d, _)| d)
    }
}

impl fmt::Display for ScanDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate the `HH-MM-SS-mmm` tail of a timestamped scan date
fn is_valid_scan_time(time_part: &str) -> bool {
    let fields: Vec<&str> = time_part.split('-').collect();
    if fields.len() != 4 {
        return false;
    }

    let widths = [2, 2, 2, 3];
    fields
        .iter()
        .zip(widths)
        .all(|(field, width)| field.len() == width && field.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_kind_from_stem() {
        assert_eq!(
            MemberKind::from_stem("plant_001_final"),
            MemberKind::Final
        );
        assert_eq!(
            MemberKind::from_stem("plant_001_soil_segmentation_final"),
            MemberKind::Final
        );
        assert_eq!(
            MemberKind::from_stem("plant_001_raw"),
            MemberKind::Intermediate
        );
    }

    #[test]
    fn test_payload_range_law() {
        // block 10, size 12345 -> payload spans 5632..17977
        let entry = IndexEntry::new(10, 12345, "path/to/plant_001/final.ply", "final");
        assert_eq!(entry.payload_range(), (5632, 17977));
        assert_eq!(entry.payload_end() - entry.payload_start(), 12345);
    }

    #[test]
    fn test_first_member_range() {
        // a header at block 0 puts its payload at exactly one block in
        let entry = IndexEntry::new(0, 100, "a/b.ply", "b");
        assert_eq!(entry.payload_start(), 512);
        assert_eq!(entry.payload_end(), 612);
    }

    #[test]
    fn test_padded_end() {
        let entry = IndexEntry::new(0, 100, "a/b.ply", "b");
        assert_eq!(entry.padded_end(), 1024);

        // an exact multiple needs no padding
        let aligned = IndexEntry::new(0, 512, "a/c.ply", "c");
        assert_eq!(aligned.padded_end(), aligned.payload_end());
    }

    #[test]
    fn test_scan_date_plain() {
        let date = ScanDate::parse("2020-01-22").unwrap();
        assert_eq!(date.as_str(), "2020-01-22");
        assert_eq!(date.day(), "2020-01-22");
    }

    #[test]
    fn test_scan_date_timestamped() {
        let date = ScanDate::parse("2022-02-01__10-11-12-345").unwrap();
        assert_eq!(date.as_str(), "2022-02-01__10-11-12-345");
        assert_eq!(date.day(), "2022-02-01");
    }

    #[test]
    fn test_scan_date_rejects_garbage() {
        assert!(ScanDate::parse("not-a-date").is_err());
        assert!(ScanDate::parse("2022-13-01").is_err());
        assert!(ScanDate::parse("2022-02-01__10-11").is_err());
        assert!(ScanDate::parse("2022-02-01__aa-bb-cc-ddd").is_err());
    }
}
