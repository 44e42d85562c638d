use anyhow::Context;
use log::{info, warn};
use phytofetch::catalog::LISTING_SUFFIX;
use phytofetch::{
    candidate_plants, prune_existing, scan_date_from_index_filename, BatchRunner, Catalog,
    DateArchive, FetchConfig, HttpRangeSource, PlantFetcher, ScanDate, TarIndex,
};
use std::sync::Arc;
use tokio::fs;

const DEFAULT_LOGGING: &str = "info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // init logging from RUST_LOG env var with info as default
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOGGING))
        .init();
    let config = FetchConfig::read_args();

    let catalog = Catalog::new(
        config.season,
        config.level,
        config.instrument,
        Some(config.crop.clone()),
    )?;

    fs::create_dir_all(&config.out_dir)
        .await
        .with_context(|| format!("cannot create output root {}", config.out_dir.display()))?;
    fs::create_dir_all(&config.index_dir)
        .await
        .with_context(|| format!("cannot create index directory {}", config.index_dir.display()))?;

    let http = HttpRangeSource::new();

    // make sure every requested date has a local listing; a date without one
    // remotely simply has no data
    for token in &config.date {
        let date = ScanDate::parse(token.as_str())?;
        let listing_path = config.index_dir.join(catalog.index_filename(&date));
        if fs::try_exists(&listing_path).await? {
            continue;
        }
        let url = catalog.index_url(&date);
        info!("downloading listing {}", url);
        match http.fetch_text(&url).await {
            Ok(text) => fs::write(&listing_path, text)
                .await
                .with_context(|| format!("cannot write {}", listing_path.display()))?,
            Err(err) => warn!("no listing for {} ({}), skipping date", date, err),
        }
    }

    // build per-date indices from every listing present locally
    let mut listing_names = Vec::new();
    let mut entries = fs::read_dir(&config.index_dir).await?;
    while let Some(dirent) = entries.next_entry().await? {
        if let Some(name) = dirent.file_name().to_str() {
            if name.ends_with(LISTING_SUFFIX) {
                listing_names.push(name.to_string());
            }
        }
    }
    listing_names.sort();

    let mut dates = Vec::new();
    for name in &listing_names {
        let date = match scan_date_from_index_filename(name) {
            Ok(date) => date,
            Err(err) => {
                warn!("ignoring listing {} ({})", name, err);
                continue;
            }
        };
        let path = config.index_dir.join(name);
        let index = TarIndex::load(&path).await;
        if config.write_sidecar {
            if let Err(err) = index.write_sidecar(&path).await {
                warn!("cannot write sidecar for {} ({})", path.display(), err);
            }
        }
        if index.is_empty() {
            continue;
        }
        dates.push(DateArchive {
            location: catalog.archive_url(&date),
            date,
            index: Arc::new(index),
        });
    }
    info!("indexed {} scan date(s)", dates.len());

    // plants present in the designated final-date listing(s)
    let plants = {
        let final_indices: Vec<&TarIndex> = dates
            .iter()
            .filter(|archive| {
                config
                    .final_date
                    .iter()
                    .any(|f| archive.date.as_str().contains(f.as_str()))
            })
            .map(|archive| archive.index.as_ref())
            .collect();

        if final_indices.is_empty() {
            warn!("no listing matches the final date(s); nothing to fetch");
            return Ok(());
        }

        candidate_plants(&final_indices, &config.genotype)
    };
    info!("{} candidate plant(s)", plants.len());

    let plants = prune_existing(plants, &config.out_dir);
    info!("{} plant(s) after pruning existing timeseries", plants.len());

    let fetcher = PlantFetcher::new(http, config.out_dir.clone());
    let runner = BatchRunner::new(fetcher).with_workers(config.workers);
    runner.run(plants, Arc::new(dates)).await;

    Ok(())
}
