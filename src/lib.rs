//! A small blocking Rust client for the WattTime grid emissions API (v2).
//!
//! The client logs in once, keeps its bearer token fresh (tokens expire after
//! 30 minutes and are renewed lazily, right before the next request) and
//! throttles itself to the published quota of 3000 requests per rolling five
//! minutes.
//!
//! ## Quick start
//! - Configure credentials via environment variables (`WATTTIME_USERNAME`,
//!   `WATTTIME_PASSWORD`) or a `.watttimerc` file (current directory or home
//!   directory), or pass them explicitly.
//! - Call the endpoint methods on [`Client`].
//!
//! ```no_run
//! use watttime::{Client, IndexStyle};
//!
//! fn main() -> watttime::Result<()> {
//!     let mut client = Client::from_env()?;
//!
//!     let region = client.determine_grid_region(33.844978, -118.387238)?;
//!     println!("{} serves this location", region.abbrev);
//!
//!     let index = client.real_time_emissions_index(Some("CAISO_NORTH"), None, Some(IndexStyle::Percent))?;
//!     println!("{:?}% of the past month's dirtiest", index.percent);
//!
//!     let download = client.historical_emissions("CAISO_NORTH", "historical_emissions", true, true)?;
//!     println!("combined data written to {}", download.output().display());
//!     Ok(())
//! }
//! ```
//!
//! New accounts are created with [`register_new_user`], which needs no session.

#![forbid(unsafe_code)]

mod archive;
mod client;
mod config;
mod error;
mod models;
mod rate_limit;
mod register;
mod session;
mod util;

pub use client::Client;
pub use config::{ClientConfig, DEFAULT_URL};
pub use error::{Error, Result};
pub use models::{
    DataOptions, EmissionsDataPoint, Forecast, ForecastPoint, GridRegion, HistoricalDownload,
    IndexStyle, MoerVersion, RealTimeIndex, RegionAccess, RegionSelector, TimeRange,
};
pub use rate_limit::{DEFAULT_QUOTA, DEFAULT_WINDOW, RateLimiter};
pub use register::{NewUser, register_new_user, register_new_user_at};
pub use session::{Session, TOKEN_LIFETIME};
pub use util::{Clock, SystemClock};
