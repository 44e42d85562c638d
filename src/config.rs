//! CLI configuration for the batch driver

use crate::catalog::{Level, Season, Sensor};
use clap::Parser;
use log::info;
use std::path::PathBuf;

/// Individual plant point cloud fetcher
#[derive(Clone, Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct FetchConfig {
    /// Output directory for per-plant timeseries folders
    #[arg(short, long, default_value = "plant_point_clouds")]
    pub out_dir: PathBuf,

    /// Season during which data were collected (10-15)
    #[arg(short, long)]
    pub season: Season,

    /// Crop name of data to download (required for seasons after 10)
    #[arg(short, long, default_value = "NA")]
    pub crop: String,

    /// Instrument (sensor) used to collect phenotype data
    #[arg(short, long, default_value = "3D")]
    pub instrument: Sensor,

    /// Level of the data (0-4)
    #[arg(short, long, default_value = "0")]
    pub level: Level,

    /// Final scan date(s); plants present on these dates are fetched
    #[arg(short, long, required = true, num_args = 1..)]
    pub final_date: Vec<String>,

    /// Genotype substring(s) to collect
    #[arg(short, long, num_args = 1..)]
    pub genotype: Vec<String>,

    /// Scan date(s) to fetch; listings missing locally are downloaded
    #[arg(short, long, num_args = 1..)]
    pub date: Vec<String>,

    /// Directory holding downloaded listing files
    #[arg(long, default_value = "index_files")]
    pub index_dir: PathBuf,

    /// Worker task count (0 = one per logical CPU)
    #[arg(short, long, default_value_t = 0)]
    pub workers: usize,

    /// Write a JSON sidecar next to each parsed listing
    #[arg(long)]
    pub write_sidecar: bool,
}

impl FetchConfig {
    pub fn read_args() -> FetchConfig {
        let config = FetchConfig::parse();
        info!("Output directory: [{}]", config.out_dir.display());
        info!("Season: [{}]", config.season);
        info!("Crop: [{}]", config.crop);
        info!("Instrument: [{}]", config.instrument);
        info!("Level: [{}]", config.level.value());
        info!("Final date(s): {:?}", config.final_date);
        if !config.genotype.is_empty() {
            info!("Genotype filter(s): {:?}", config.genotype);
        }
        info!("Index directory: [{}]", config.index_dir.display());
        info!("Workers: [{}]", config.workers);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_arguments() {
        let config = FetchConfig::parse_from([
            "phytofetch",
            "--season",
            "12",
            "--crop",
            "sorghum",
            "--final-date",
            "2021-05-03",
        ]);

        assert_eq!(config.season, Season::Season12);
        assert_eq!(config.crop, "sorghum");
        assert_eq!(config.instrument, Sensor::PointCloud3d);
        assert_eq!(config.level.value(), 0);
        assert_eq!(config.final_date, vec!["2021-05-03"]);
        assert_eq!(config.out_dir, PathBuf::from("plant_point_clouds"));
        assert_eq!(config.workers, 0);
    }

    #[test]
    fn test_rejects_unknown_season() {
        let result =
            FetchConfig::try_parse_from(["phytofetch", "--season", "16", "--final-date", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_multiple_final_dates_and_genotypes() {
        let config = FetchConfig::parse_from([
            "phytofetch",
            "-s",
            "14",
            "-c",
            "sorghum",
            "-f",
            "2022-06-10",
            "2022-06-11",
            "-g",
            "b100",
            "rtx430",
        ]);

        assert_eq!(config.final_date.len(), 2);
        assert_eq!(config.genotype, vec!["b100", "rtx430"]);
    }
}
