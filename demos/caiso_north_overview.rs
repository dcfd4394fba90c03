use tracing_subscriber::EnvFilter;
use watttime::{Client, DataOptions, IndexStyle, Result};

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Configure credentials via env vars or a `.watttimerc` file.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut client = Client::from_env()?.with_progress(true);

    let region = client.determine_grid_region(33.844978, -118.387238)?;
    println!("region: {:?}", region);

    let index = client.real_time_emissions_index(Some("CAISO_NORTH"), None, Some(IndexStyle::All))?;
    println!("index: {:?}", index);

    let data = client.grid_emissions_data(Some("CAISO_NORTH"), None, &DataOptions::default())?;
    println!("{} data points", data.len());

    let forecast = client.emissions_forecast("CAISO_NORTH", false)?;
    println!(
        "forecast generated at {} with {} points",
        forecast.generated_at,
        forecast.forecast.len()
    );

    let download = client.historical_emissions("CAISO_NORTH", "historical_emissions", true, true)?;
    println!("historical data: {}", download.output().display());
    Ok(())
}
