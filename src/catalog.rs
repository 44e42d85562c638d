//! CyVerse Data Store naming conventions
//!
//! Archive and listing locations are deterministic functions of season,
//! level, sensor, crop and scan date. Nothing here performs I/O; the catalog
//! only builds names and URLs for the transfer layer to use.

use crate::error::{FetchError, Result};
use crate::types::ScanDate;
use std::fmt;
use std::str::FromStr;

/// Anonymous DAV endpoint for community-released PhytoOracle data
pub const DAV_BASE: &str =
    "https://data.cyverse.org/dav-anon/iplant/commons/community_released/phytooracle";

/// Suffix of tar listing files produced alongside each archive
pub const LISTING_SUFFIX: &str = "_segmentation_pointclouds_index";

/// Suffix of the packed point-cloud archive for one scan date
const ARCHIVE_SUFFIX: &str = "_segmentation_pointclouds.tar";

/// Field season, mapped to its Data Store directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Season10,
    Season11,
    Season12,
    Season13,
    Season14,
    Season15,
}

impl Season {
    /// Data Store path segment for this season
    pub fn path_segment(&self) -> &'static str {
        match self {
            Season::Season10 => "season_10_lettuce_yr_2020",
            Season::Season11 => "season_11_sorghum_yr_2020",
            Season::Season12 => "season_12_sorghum_soybean_sunflower_tepary_yr_2021",
            Season::Season13 => "season_13_lettuce_yr_2022",
            Season::Season14 => "season_14_sorghum_yr_2022",
            Season::Season15 => "season_15_lettuce_yr_2022",
        }
    }

    /// Season 10 predates the per-crop directory layout
    pub fn uses_crop_segment(&self) -> bool {
        !matches!(self, Season::Season10)
    }
}

impl FromStr for Season {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "10" => Ok(Season::Season10),
            "11" => Ok(Season::Season11),
            "12" => Ok(Season::Season12),
            "13" => Ok(Season::Season13),
            "14" => Ok(Season::Season14),
            "15" => Ok(Season::Season15),
            _ => Err(FetchError::Configuration(format!(
                "unknown season '{}' (expected 10-15)",
                s
            ))),
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let number = match self {
            Season::Season10 => "10",
            Season::Season11 => "11",
            Season::Season12 => "12",
            Season::Season13 => "13",
            Season::Season14 => "14",
            Season::Season15 => "15",
        };
        f.write_str(number)
    }
}

/// Processing level of the data (0 = raw, 4 = fully derived)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level(u8);

impl Level {
    pub fn new(level: u8) -> Result<Self> {
        if level > 4 {
            return Err(FetchError::Configuration(format!(
                "unknown level '{}' (expected 0-4)",
                level
            )));
        }
        Ok(Self(level))
    }

    /// Data Store path segment, e.g. `level_1`
    pub fn path_segment(&self) -> String {
        format!("level_{}", self.0)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl FromStr for Level {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        let value: u8 = s
            .parse()
            .map_err(|_| FetchError::Configuration(format!("unknown level '{}'", s)))?;
        Level::new(value)
    }
}

/// Phenotyping instrument on the field scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    /// Stereo RGB camera
    Rgb,
    /// FLIR thermal infrared camera
    ThermalIr,
    /// PS2 chlorophyll fluorescence sensor
    Fluorescence,
    /// Laser line scanner producing 3D point clouds
    PointCloud3d,
    /// Environmental logger
    EnvironmentLogger,
}

impl Sensor {
    /// Data Store path segment for this sensor
    pub fn path_segment(&self) -> &'static str {
        match self {
            Sensor::Rgb => "stereoTop",
            Sensor::ThermalIr => "flirIrCamera",
            Sensor::Fluorescence => "ps2Top",
            Sensor::PointCloud3d => "scanner3DTop",
            Sensor::EnvironmentLogger => "EnvironmentLogger",
        }
    }
}

impl FromStr for Sensor {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "RGB" => Ok(Sensor::Rgb),
            "FLIR" => Ok(Sensor::ThermalIr),
            "PS2" => Ok(Sensor::Fluorescence),
            "3D" => Ok(Sensor::PointCloud3d),
            "ENV" => Ok(Sensor::EnvironmentLogger),
            _ => Err(FetchError::Configuration(format!(
                "unknown sensor '{}' (expected RGB, FLIR, PS2, 3D or ENV)",
                s
            ))),
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Deterministic URL construction for one (season, level, sensor, crop)
#[derive(Debug, Clone)]
pub struct Catalog {
    season: Season,
    level: Level,
    sensor: Sensor,
    crop: Option<String>,
    base: String,
}

impl Catalog {
    /// Build a catalog, validating the crop requirement
    ///
    /// Seasons after 10 store archives under a per-crop directory; the crop
    /// must be given for those and is ignored for season 10.
    pub fn new(season: Season, level: Level, sensor: Sensor, crop: Option<String>) -> Result<Self> {
        let crop = crop.filter(|c| !c.is_empty() && c != "NA");
        if season.uses_crop_segment() && crop.is_none() {
            return Err(FetchError::Configuration(format!(
                "season {} requires a crop name",
                season
            )));
        }

        Ok(Self {
            season,
            level,
            sensor,
            crop,
            base: DAV_BASE.to_string(),
        })
    }

    /// Override the DAV base URL (tests, mirrors)
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    /// Directory holding one scan date's archive and listing
    fn date_dir(&self, date: &ScanDate) -> String {
        let mut dir = format!(
            "{}/{}/{}/{}",
            self.base,
            self.season.path_segment(),
            self.level.path_segment(),
            self.sensor.path_segment()
        );
        if self.season.uses_crop_segment() {
            // crop presence is validated in `new`
            if let Some(crop) = &self.crop {
                dir.push('/');
                dir.push_str(crop);
            }
        }
        format!("{}/{}/individual_plants_out", dir, date)
    }

    /// URL of the packed point-cloud archive for one scan date
    pub fn archive_url(&self, date: &ScanDate) -> String {
        format!("{}/{}{}", self.date_dir(date), date, ARCHIVE_SUFFIX)
    }

    /// File name of the tar listing for one scan date
    pub fn index_filename(&self, date: &ScanDate) -> String {
        format!("{}{}", date, LISTING_SUFFIX)
    }

    /// URL of the tar listing for one scan date
    pub fn index_url(&self, date: &ScanDate) -> String {
        format!("{}/{}", self.date_dir(date), self.index_filename(date))
    }
}

/// Recover the scan date from a listing file name
pub fn scan_date_from_index_filename(name: &str) -> Result<ScanDate> {
    let name = name.rsplit('/').next().unwrap_or(name);
    let token = name
        .strip_suffix(LISTING_SUFFIX)
        .ok_or_else(|| FetchError::InvalidScanDate(name.to_string()))?;
    ScanDate::parse(token)
}
