//! Request options and response records for the WattTime endpoints.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Output units of the real-time index and grid data endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStyle {
    Percent,
    /// Requires a PRO subscription.
    Moer,
    All,
}

impl IndexStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStyle::Percent => "percent",
            IndexStyle::Moer => "moer",
            IndexStyle::All => "all",
        }
    }
}

/// Which MOER versions the historical archive should contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoerVersion {
    Latest,
    #[default]
    All,
}

impl MoerVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoerVersion::Latest => "latest",
            MoerVersion::All => "all",
        }
    }
}

/// Start and end timestamps, e.g. `2024-03-01T00:00:00-0800`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.start.trim().is_empty() || self.end.trim().is_empty() {
            return Err(Error::Param(
                "time range needs both a start and an end timestamp".into(),
            ));
        }
        Ok(())
    }
}

/// Optional arguments of [`Client::grid_emissions_data`](crate::Client::grid_emissions_data).
#[derive(Debug, Clone, Default)]
pub struct DataOptions {
    pub style: Option<IndexStyle>,
    pub range: Option<TimeRange>,
    /// Defaults to the latest version for the region when omitted.
    pub moer_version: Option<String>,
}

/// A validated "balancing authority or coordinates" choice.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionSelector {
    BalancingAuthority(String),
    Location { latitude: f64, longitude: f64 },
}

impl RegionSelector {
    /// Accepts exactly one of `ba` or `location`.
    pub fn from_parts(ba: Option<&str>, location: Option<(f64, f64)>) -> Result<Self> {
        match (ba, location) {
            (Some(_), Some(_)) => Err(Error::Param(
                "pass either a balancing authority or a latitude/longitude pair, not both".into(),
            )),
            (None, None) => Err(Error::Param(
                "a balancing authority or a latitude/longitude pair is required".into(),
            )),
            (Some(ba), None) => Ok(RegionSelector::BalancingAuthority(check_ba(ba)?)),
            (None, Some((latitude, longitude))) => {
                check_coordinates(latitude, longitude)?;
                Ok(RegionSelector::Location {
                    latitude,
                    longitude,
                })
            }
        }
    }

    pub(crate) fn push_params(&self, params: &mut Vec<(&'static str, String)>) {
        match self {
            RegionSelector::BalancingAuthority(ba) => params.push(("ba", ba.clone())),
            RegionSelector::Location {
                latitude,
                longitude,
            } => {
                params.push(("latitude", latitude.to_string()));
                params.push(("longitude", longitude.to_string()));
            }
        }
    }
}

pub(crate) fn check_ba(ba: &str) -> Result<String> {
    let ba = ba.trim();
    if ba.is_empty() {
        return Err(Error::Param(
            "balancing authority abbreviation is empty".into(),
        ));
    }
    Ok(ba.to_string())
}

pub(crate) fn check_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::Param(format!(
            "latitude {latitude} is outside [-90, 90]"
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::Param(format!(
            "longitude {longitude} is outside [-180, 180]"
        )));
    }
    Ok(())
}

/// Balancing authority serving a location (`/ba-from-loc`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GridRegion {
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub id: Option<i64>,
    pub abbrev: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Entry of `/ba-access`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegionAccess {
    pub ba: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_flexible_bool")]
    pub access: bool,
    #[serde(default)]
    pub datatype: Option<String>,
}

/// Current marginal emissions for a region (`/index`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RealTimeIndex {
    pub ba: String,
    /// Data frequency in seconds.
    #[serde(default, alias = "frequency", deserialize_with = "de_opt_u64")]
    pub freq: Option<u64>,
    /// Relative emissions, 0 (cleanest) to 100 (dirtiest) over the past month.
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub percent: Option<f64>,
    /// Marginal operating emissions rate in lbs CO2/MWh.
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub moer: Option<f64>,
    #[serde(default)]
    pub point_time: Option<String>,
}

/// One observation of `/data`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmissionsDataPoint {
    pub point_time: String,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub frequency: Option<u64>,
    #[serde(default)]
    pub market: Option<String>,
    pub ba: String,
    #[serde(default)]
    pub datatype: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// A generated MOER forecast (`/forecast`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Forecast {
    pub generated_at: String,
    #[serde(default)]
    pub forecast: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecastPoint {
    pub point_time: String,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub value: Option<f64>,
    #[serde(default)]
    pub ba: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Files written by [`Client::historical_emissions`](crate::Client::historical_emissions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalDownload {
    pub archive: PathBuf,
    /// Set when the archive was extracted.
    pub extracted_dir: Option<PathBuf>,
    /// Set when the extracted CSV files were concatenated.
    pub combined: Option<PathBuf>,
}

impl HistoricalDownload {
    /// The most processed artifact: combined CSV, then directory, then archive.
    pub fn output(&self) -> &PathBuf {
        self.combined
            .as_ref()
            .or(self.extracted_dir.as_ref())
            .unwrap_or(&self.archive)
    }
}

// The v2 API serializes many numbers as strings ("percent": "53").
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Number(f64),
    Text(String),
}

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(match Option::<Loose>::deserialize(d)? {
        Some(Loose::Number(n)) => Some(n),
        Some(Loose::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn de_opt_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u64>, D::Error> {
    Ok(de_opt_f64(d)?
        .filter(|n| *n >= 0.0 && n.fract() == 0.0)
        .map(|n| n as u64))
}

fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    Ok(match Option::<Loose>::deserialize(d)? {
        Some(Loose::Number(n)) if n.fract() == 0.0 => Some(n as i64),
        Some(Loose::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn de_flexible_bool<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    Ok(match Option::<Loose>::deserialize(d)? {
        Some(Loose::Bool(b)) => b,
        Some(Loose::Text(s)) => s.trim().eq_ignore_ascii_case("true"),
        Some(Loose::Number(n)) => n != 0.0,
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selector_requires_exactly_one_target() {
        assert!(matches!(
            RegionSelector::from_parts(None, None),
            Err(Error::Param(_))
        ));
        assert!(matches!(
            RegionSelector::from_parts(Some("CAISO_NORTH"), Some((37.0, -122.0))),
            Err(Error::Param(_))
        ));
        assert_eq!(
            RegionSelector::from_parts(Some(" CAISO_NORTH "), None).unwrap(),
            RegionSelector::BalancingAuthority("CAISO_NORTH".into())
        );
        assert_eq!(
            RegionSelector::from_parts(None, Some((33.844978, -118.387238))).unwrap(),
            RegionSelector::Location {
                latitude: 33.844978,
                longitude: -118.387238
            }
        );
    }

    #[test]
    fn selector_rejects_bad_values() {
        assert!(RegionSelector::from_parts(Some("  "), None).is_err());
        assert!(RegionSelector::from_parts(None, Some((91.0, 0.0))).is_err());
        assert!(RegionSelector::from_parts(None, Some((0.0, -180.5))).is_err());
        assert!(RegionSelector::from_parts(None, Some((f64::NAN, 0.0))).is_err());
    }

    #[test]
    fn selector_params() {
        let mut params = Vec::new();
        RegionSelector::Location {
            latitude: 42.5,
            longitude: -71.25,
        }
        .push_params(&mut params);
        assert_eq!(
            params,
            vec![("latitude", "42.5".to_string()), ("longitude", "-71.25".to_string())]
        );
    }

    #[test]
    fn index_accepts_stringly_numbers() {
        let index: RealTimeIndex = serde_json::from_value(json!({
            "freq": "300",
            "ba": "CAISO_NORTH",
            "percent": "53",
            "moer": "850.743982",
            "point_time": "2019-01-29T14:55:00.00Z"
        }))
        .unwrap();
        assert_eq!(index.freq, Some(300));
        assert_eq!(index.percent, Some(53.0));
        assert_eq!(index.moer, Some(850.743982));
    }

    #[test]
    fn region_id_accepts_strings() {
        let regions: Vec<GridRegion> = serde_json::from_value(json!([
            {"id": "263", "abbrev": "CAISO_NORTH", "name": "California ISO Northern"},
            {"id": 263, "abbrev": "CAISO_NORTH"},
            {"id": null, "abbrev": "PJM_NJ"},
            {"id": "n/a", "abbrev": "ERCOT_EASTTX"},
            {"abbrev": "MISO_MI"}
        ]))
        .unwrap();
        assert_eq!(regions[0].id, Some(263));
        assert_eq!(regions[1].id, Some(263));
        assert_eq!(regions[2].id, None);
        assert_eq!(regions[3].id, None);
        assert_eq!(regions[4].id, None);
        assert_eq!(regions[0].name.as_deref(), Some("California ISO Northern"));
    }

    #[test]
    fn region_access_flag_variants() {
        let regions: Vec<RegionAccess> = serde_json::from_value(json!([
            {"ba": "CAISO_NORTH", "name": "California ISO Northern", "access": "true", "datatype": "MOER"},
            {"ba": "PJM_NJ", "access": false},
            {"ba": "ERCOT_EASTTX"}
        ]))
        .unwrap();
        assert!(regions[0].access);
        assert!(!regions[1].access);
        assert!(!regions[2].access);
    }

    #[test]
    fn historical_download_output_prefers_combined() {
        let mut dl = HistoricalDownload {
            archive: "output/h.zip".into(),
            extracted_dir: None,
            combined: None,
        };
        assert_eq!(dl.output(), &PathBuf::from("output/h.zip"));
        dl.extracted_dir = Some("output/h".into());
        assert_eq!(dl.output(), &PathBuf::from("output/h"));
        dl.combined = Some("output/h (Combined Data).csv".into());
        assert_eq!(dl.output(), &PathBuf::from("output/h (Combined Data).csv"));
    }
}
