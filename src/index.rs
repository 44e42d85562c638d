//! Tar listing parser and per-date entity index
//!
//! A listing is the text output of a block-report tar inspection, one member
//! per line:
//!
//! ```text
//! block 6830: -rw-r--r-- scanner/field 1049258 2022-02-01 09:41 segmentation_pointclouds/plant_001/plant_001_final.ply
//! ```
//!
//! The field positions are a fixed contract with the listing generator. A
//! candidate line with any other shape is skipped, never guessed at, so a
//! truncated or partially corrupt listing still yields every well-formed
//! entry.

use crate::error::{FetchError, Result};
use crate::types::IndexEntry;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Recognized member suffix; lines without it are not member candidates
const MEMBER_SUFFIX: &str = ".ply";

/// Field count of a well-formed member line after whitespace normalization
const LISTING_FIELDS: usize = 8;

/// Label opening every member line
const BLOCK_LABEL: &str = "block";

/// Position of the payload-size field
const SIZE_FIELD: usize = 4;

/// Read-only mapping from entity (plant) name to its archive members
///
/// Entity keys come from the parent directory of each member path. Member
/// order within an entity is listing order. An empty index means "no data
/// for this date", which callers treat as normal.
#[derive(Debug, Clone, Default)]
pub struct TarIndex {
    entities: HashMap<String, Vec<IndexEntry>>,
}

/// Sidecar JSON record; field names are a compatibility contract
#[derive(Serialize, Deserialize)]
struct SidecarRecord {
    block: u64,
    file_size: u64,
    path: String,
    filename: String,
}

impl TarIndex {
    /// Parse the full text of a listing file
    ///
    /// Never fails: malformed lines are logged at debug level and dropped.
    pub fn parse(content: &str) -> Self {
        let mut entities: HashMap<String, Vec<IndexEntry>> = HashMap::new();

        for line in content.lines() {
            if !line.contains(MEMBER_SUFFIX) {
                continue;
            }
            match parse_line(line) {
                Ok((entity, entry)) => entities.entry(entity).or_default().push(entry),
                Err(err) => debug!("skipping listing line: {}", err),
            }
        }

        Self { entities }
    }

    /// Read and parse a local listing file
    ///
    /// A missing or unreadable file yields an empty index: many dates simply
    /// have no listing, and the caller moves on to the next one.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path).await {
            Ok(content) => {
                let index = Self::parse(&content);
                if index.is_empty() {
                    warn!("no valid entries in listing {}", path.display());
                }
                index
            }
            Err(err) => {
                warn!(
                    "listing {} unreadable ({}), treating as no data",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Members recorded for one entity, in listing order
    pub fn get(&self, entity: &str) -> Option<&[IndexEntry]> {
        self.entities.get(entity).map(|entries| entries.as_slice())
    }

    /// Iterate over all (entity, members) pairs
    pub fn entities(&self) -> impl Iterator<Item = (&str, &[IndexEntry])> {
        self.entities
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    /// Number of distinct entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Total number of member records across all entities
    pub fn member_count(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }

    /// Persist the index as `<listing_path>.json` for reuse without reparsing
    pub async fn write_sidecar(&self, listing_path: impl AsRef<Path>) -> Result<PathBuf> {
        let sidecar_path = sidecar_path_for(listing_path.as_ref());

        let records: HashMap<&str, Vec<SidecarRecord>> = self
            .entities
            .iter()
            .map(|(name, entries)| {
                let records = entries
                    .iter()
                    .map(|entry| SidecarRecord {
                        block: entry.block,
                        file_size: entry.file_size,
                        path: entry.path.clone(),
                        filename: entry.filename.clone(),
                    })
                    .collect();
                (name.as_str(), records)
            })
            .collect();

        let json = serde_json::to_vec(&records)?;
        fs::write(&sidecar_path, json).await?;
        Ok(sidecar_path)
    }

    /// Reload an index from a sidecar written by [`TarIndex::write_sidecar`]
    ///
    /// Member kinds are re-derived from the stored file names.
    pub async fn from_sidecar(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read(path.as_ref()).await?;
        let records: HashMap<String, Vec<SidecarRecord>> = serde_json::from_slice(&json)?;

        let entities = records
            .into_iter()
            .map(|(name, records)| {
                let entries = records
                    .into_iter()
                    .map(|r| IndexEntry::new(r.block, r.file_size, r.path, r.filename))
                    .collect();
                (name, entries)
            })
            .collect();

        Ok(Self { entities })
    }
}

/// Sidecar file name: the listing name with `.json` appended
fn sidecar_path_for(listing_path: &Path) -> PathBuf {
    let mut name = listing_path.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

/// Parse one member line into (entity, entry)
fn parse_line(line: &str) -> Result<(String, IndexEntry)> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    if fields.len() != LISTING_FIELDS {
        return Err(FetchError::InvalidListing(format!(
            "expected {} fields, found {}: '{}'",
            LISTING_FIELDS,
            fields.len(),
            line.trim()
        )));
    }
    if fields[0] != BLOCK_LABEL {
        return Err(FetchError::InvalidListing(format!(
            "missing '{}' label: '{}'",
            BLOCK_LABEL,
            line.trim()
        )));
    }

    let block: u64 = fields[1]
        .strip_suffix(':')
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| {
            FetchError::InvalidListing(format!("bad block field '{}'", fields[1]))
        })?;

    let file_size: u64 = fields[SIZE_FIELD].parse().map_err(|_| {
        FetchError::InvalidListing(format!("bad size field '{}'", fields[SIZE_FIELD]))
    })?;

    let path = fields[LISTING_FIELDS - 1];
    let member = Path::new(path);

    let filename = member
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| FetchError::InvalidListing(format!("bad member path '{}'", path)))?;

    let entity = member
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            FetchError::InvalidListing(format!("member path '{}' has no parent directory", path))
        })?;

    Ok((
        entity.to_string(),
        IndexEntry::new(block, file_size, path, filename),
    ))
}
