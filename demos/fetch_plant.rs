//! Example: fetch one plant's final point cloud for one scan date
//!
//! Run with: cargo run --example fetch_plant

use phytofetch::{
    Catalog, FetchOutcome, HttpRangeSource, Level, PlantFetcher, ScanDate, Season, Sensor,
    TarIndex,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let catalog = Catalog::new(
        Season::Season12,
        Level::new(0)?,
        Sensor::PointCloud3d,
        Some("sorghum".to_string()),
    )?;
    let date = ScanDate::parse("2021-05-03__11-22-33-444")?;

    println!("Listing URL: {}", catalog.index_url(&date));
    println!("Archive URL: {}", catalog.archive_url(&date));

    let http = HttpRangeSource::new();
    let listing = http.fetch_text(&catalog.index_url(&date)).await?;
    let index = TarIndex::parse(&listing);
    println!(
        "Indexed {} plants ({} members)",
        index.len(),
        index.member_count()
    );

    let Some((plant, _)) = index.entities().next() else {
        println!("No plants recorded for {}", date);
        return Ok(());
    };
    let plant = plant.to_string();

    let fetcher = PlantFetcher::new(http, "plant_point_clouds");
    match fetcher
        .fetch_plant(&plant, &index, &catalog.archive_url(&date), &date)
        .await?
    {
        FetchOutcome::Fetched {
            last_file,
            downloaded,
        } => println!("Downloaded {} file(s), last: {}", downloaded, last_file.display()),
        FetchOutcome::UpToDate => println!("{} already up to date", plant),
        FetchOutcome::NotFound => println!("{} not present on {}", plant, date),
    }

    Ok(())
}
