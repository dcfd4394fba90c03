use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::rate_limit::{DEFAULT_QUOTA, DEFAULT_WINDOW};

pub const DEFAULT_URL: &str = "https://api2.watttime.org/v2";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base API URL, typically `https://api2.watttime.org/v2`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Directory that receives historical archives and their extracted files.
    pub output_dir: PathBuf,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Show a progress bar while downloading archives.
    pub progress: bool,
    /// Maximum number of requests per `rate_window`.
    pub rate_quota: usize,
    pub rate_window: Duration,
}

impl ClientConfig {
    /// Configuration with default URL, output directory and quota.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: username.into(),
            password: password.into(),
            output_dir: PathBuf::from("output"),
            timeout: Duration::from_secs(60),
            progress: false,
            rate_quota: DEFAULT_QUOTA,
            rate_window: DEFAULT_WINDOW,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[derive(Debug, Default)]
struct RcConfig {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

pub(crate) fn load_config(
    username: Option<String>,
    password: Option<String>,
) -> Result<ClientConfig> {
    let mut url = std::env::var("WATTTIME_URL").ok();
    let mut username = username.or_else(|| std::env::var("WATTTIME_USERNAME").ok());
    let mut password = password.or_else(|| std::env::var("WATTTIME_PASSWORD").ok());

    let rc_candidates = rc_candidates();

    if url.is_none() || username.is_none() || password.is_none() {
        for rc_path in &rc_candidates {
            if rc_path.exists() {
                let cfg = read_rc(rc_path).with_context(|| {
                    format!("failed to read configuration file {}", rc_path.display())
                })?;

                url = url.or(cfg.url);
                username = username.or(cfg.username);
                password = password.or(cfg.password);
                break;
            }
        }
    }

    let searched = || {
        rc_candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let Some(username) = username else {
        bail!(
            "Missing configuration: username (set WATTTIME_USERNAME or put `username:` in one of: {})",
            searched()
        );
    };
    let Some(password) = password else {
        bail!(
            "Missing configuration: password (set WATTTIME_PASSWORD or put `password:` in one of: {})",
            searched()
        );
    };

    let mut cfg = ClientConfig::new(username, password);
    if let Some(url) = url {
        cfg.url = url;
    }
    Ok(cfg)
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // A key may be left empty with its value on the following line.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !line.contains(':') {
                set_field(&mut cfg, pk, strip_quotes(line));
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            if !matches!(k, "url" | "username" | "password") {
                continue;
            }
            if v.is_empty() {
                pending_key = Some(k);
            } else {
                set_field(&mut cfg, k, v);
            }
        }
    }

    cfg
}

fn set_field(cfg: &mut RcConfig, key: &str, value: &str) {
    let value = Some(value.to_string());
    match key {
        "url" => cfg.url = value,
        "username" => cfg.username = value,
        "password" => cfg.password = value,
        _ => {}
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    // 1) WATTTIME_RC (explicit)
    // 2) ./.watttimerc
    // 3) ~/.watttimerc
    if let Ok(p) = std::env::var("WATTTIME_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".watttimerc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".watttimerc"));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inline_values_and_comments() {
        let cfg = parse_rc(
            "# WattTime account\nurl: https://example.test/v2\nusername: grid_user\npassword: 's3cret:pw'\n",
        );
        assert_eq!(cfg.url.as_deref(), Some("https://example.test/v2"));
        assert_eq!(cfg.username.as_deref(), Some("grid_user"));
        assert_eq!(cfg.password.as_deref(), Some("s3cret:pw"));
    }

    #[test]
    fn value_may_follow_on_next_line() {
        let cfg = parse_rc("username:\n  \"grid_user\"\npassword:\nhunter2\n");
        assert_eq!(cfg.username.as_deref(), Some("grid_user"));
        assert_eq!(cfg.password.as_deref(), Some("hunter2"));
        assert_eq!(cfg.url, None);
    }

    #[test]
    fn empty_key_followed_by_other_key_is_dropped() {
        let cfg = parse_rc("password:\nusername: someone\nverify: 0\n");
        assert_eq!(cfg.password, None);
        assert_eq!(cfg.username.as_deref(), Some("someone"));
    }

    #[test]
    fn defaults_point_at_public_api() {
        let cfg = ClientConfig::new("u", "p");
        assert_eq!(cfg.url, DEFAULT_URL);
        assert_eq!(cfg.output_dir, PathBuf::from("output"));
        assert_eq!(cfg.rate_quota, 3000);
        assert_eq!(cfg.rate_window, Duration::from_secs(300));
    }
}
