use reqwest::Method;
use reqwest::header::CONTENT_LENGTH;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::archive;
use crate::config::{ClientConfig, load_config};
use crate::error::{Error, Result};
use crate::models::{
    DataOptions, EmissionsDataPoint, Forecast, GridRegion, HistoricalDownload, IndexStyle,
    MoerVersion, RealTimeIndex, RegionAccess, RegionSelector, TimeRange, check_ba,
    check_coordinates,
};
use crate::session::Session;
use crate::util::{Clock, SystemClock, archive_stem, urljoin};

/// Client for the WattTime grid emissions endpoints.
///
/// Construction logs in; the token is refreshed transparently once it is 30
/// minutes old, and requests are throttled to the published quota.
#[derive(Debug)]
pub struct Client {
    session: Session,
    output_dir: PathBuf,
    progress: bool,
}

impl Client {
    /// Creates a client using environment variables and/or `.watttimerc`.
    ///
    /// This is equivalent to `Client::new(None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `username`/`password` arguments
    /// - environment variables `WATTTIME_USERNAME` / `WATTTIME_PASSWORD`
    /// - config file from `WATTTIME_RC` or `.watttimerc`
    pub fn new(username: Option<String>, password: Option<String>) -> Result<Self> {
        let cfg = load_config(username, password).map_err(Error::Config)?;
        Self::with_config(cfg)
    }

    pub fn with_config(cfg: ClientConfig) -> Result<Self> {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    /// Like [`Client::with_config`], with a custom time source for token
    /// ageing and throttling.
    pub fn with_clock(cfg: ClientConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let session = Session::connect(&cfg, clock)?;
        Ok(Self {
            session,
            output_dir: cfg.output_dir,
            progress: cfg.progress,
        })
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Balancing authority serving a location.
    ///
    /// Fails with an API error when the point lies outside covered regions.
    pub fn determine_grid_region(&mut self, latitude: f64, longitude: f64) -> Result<GridRegion> {
        check_coordinates(latitude, longitude)?;
        let params = vec![
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
        ];
        self.get_json("/ba-from-loc", &params)
    }

    /// Regions the account can access, or every covered region when
    /// `all_regions` is set.
    pub fn list_grid_regions(&mut self, all_regions: bool) -> Result<Vec<RegionAccess>> {
        self.get_json("/ba-access", &[("all", all_regions.to_string())])
    }

    /// Marginal carbon intensity of the local grid right now.
    ///
    /// Exactly one of `ba` and `location` (`(latitude, longitude)`) must be
    /// given.
    pub fn real_time_emissions_index(
        &mut self,
        ba: Option<&str>,
        location: Option<(f64, f64)>,
        style: Option<IndexStyle>,
    ) -> Result<RealTimeIndex> {
        let selector = RegionSelector::from_parts(ba, location)?;
        let mut params = Vec::new();
        selector.push_params(&mut params);
        if let Some(style) = style {
            params.push(("style", style.as_str().to_string()));
        }
        self.get_json("/index", &params)
    }

    /// Historical MOER observations for a region or location.
    ///
    /// Restricted to ANALYST and PRO subscriptions; `CAISO_NORTH` can be
    /// previewed by anyone.
    pub fn grid_emissions_data(
        &mut self,
        ba: Option<&str>,
        location: Option<(f64, f64)>,
        options: &DataOptions,
    ) -> Result<Vec<EmissionsDataPoint>> {
        let selector = RegionSelector::from_parts(ba, location)?;
        let mut params = Vec::new();
        selector.push_params(&mut params);
        if let Some(range) = &options.range {
            range.validate()?;
            params.push(("starttime", range.start.clone()));
            params.push(("endtime", range.end.clone()));
        }
        if let Some(style) = options.style {
            params.push(("style", style.as_str().to_string()));
        }
        if let Some(version) = options.moer_version.as_deref().filter(|v| !v.trim().is_empty()) {
            params.push(("moerversion", version.to_string()));
        }
        self.get_json("/data", &params)
    }

    /// Downloads the zip of monthly MOER CSV files for (up to) the past two
    /// years, containing every MOER version.
    ///
    /// The archive is written to `{output_dir}/{filename}.zip`. With
    /// `extract_files` it is unpacked into `{output_dir}/{filename}/`, and with
    /// `concatenate` as well the CSV files are merged into
    /// `{output_dir}/{filename} (Combined Data).csv`.
    pub fn historical_emissions(
        &mut self,
        ba: &str,
        filename: &str,
        extract_files: bool,
        concatenate: bool,
    ) -> Result<HistoricalDownload> {
        self.historical_emissions_version(ba, filename, extract_files, concatenate, MoerVersion::All)
    }

    /// [`Client::historical_emissions`] restricted to a MOER version selection.
    pub fn historical_emissions_version(
        &mut self,
        ba: &str,
        filename: &str,
        extract_files: bool,
        concatenate: bool,
        version: MoerVersion,
    ) -> Result<HistoricalDownload> {
        let ba = check_ba(ba)?;
        let stem = archive_stem(filename).to_string();
        if stem.is_empty() {
            return Err(Error::Param(format!(
                "archive filename {filename:?} has no name before its extension"
            )));
        }

        let params = vec![("ba", ba), ("version", version.as_str().to_string())];
        let resp = self.session.dispatch(Method::GET, "/historical", &params)?;
        let content_length = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let archive_path = self.output_dir.join(format!("{stem}.zip"));
        let bytes = archive::save_stream(resp, &archive_path, content_length, self.progress)?;
        tracing::info!(
            path = %archive_path.display(),
            bytes,
            "saved historical emissions archive"
        );

        let mut download = HistoricalDownload {
            archive: archive_path,
            extracted_dir: None,
            combined: None,
        };
        if !extract_files {
            return Ok(download);
        }

        let dir = self.output_dir.join(&stem);
        archive::extract(&download.archive, &dir)?;
        download.extracted_dir = Some(dir.clone());

        if concatenate {
            let target = self.output_dir.join(format!("{stem} (Combined Data).csv"));
            download.combined = Some(archive::concatenate_csv(&dir, &target)?);
        }
        Ok(download)
    }

    /// Most recently generated MOER forecast for a region. With
    /// `extended_forecast` it covers 72 hours instead of 24.
    pub fn emissions_forecast(&mut self, ba: &str, extended_forecast: bool) -> Result<Forecast> {
        let params = forecast_params(ba, None, extended_forecast)?;
        self.get_json("/forecast", &params)
    }

    /// Forecasts generated between `range.start` and `range.end`.
    pub fn emissions_forecast_between(
        &mut self,
        ba: &str,
        range: &TimeRange,
        extended_forecast: bool,
    ) -> Result<Vec<Forecast>> {
        let params = forecast_params(ba, Some(range), extended_forecast)?;
        self.get_json("/forecast", &params)
    }

    /// GeoJSON FeatureCollection of every region's boundary.
    pub fn get_region_map_geometry(&mut self) -> Result<Value> {
        self.get_json("/maps", &[])
    }

    fn get_json<T: DeserializeOwned>(&mut self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let resp = self.session.dispatch(Method::GET, path, params)?;
        let text = resp.text()?;
        serde_json::from_str(&text).map_err(|source| Error::Decode {
            url: urljoin(self.session.base_url(), path),
            source,
        })
    }
}

fn forecast_params(
    ba: &str,
    range: Option<&TimeRange>,
    extended_forecast: bool,
) -> Result<Vec<(&'static str, String)>> {
    let mut params = vec![("ba", check_ba(ba)?)];
    if let Some(range) = range {
        range.validate()?;
        params.push(("starttime", range.start.clone()));
        params.push(("endtime", range.end.clone()));
    }
    if extended_forecast {
        params.push(("extended_forecast", "true".to_string()));
    }
    Ok(params)
}
