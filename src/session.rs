//! Authenticated session: login, lazy token refresh and throttled dispatch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::config::ClientConfig;
use crate::error::{Error, Result, read_error_body, server_message};
use crate::rate_limit::RateLimiter;
use crate::util::{Clock, urljoin};

/// Tokens are valid for 30 minutes after login.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, serde::Deserialize)]
struct LoginReply {
    #[serde(default)]
    token: Option<String>,
}

struct Token {
    value: String,
    issued_at: Instant,
}

/// Owns the HTTP connection pool, the bearer token and the rate window.
///
/// Not meant to be shared between threads; every call takes `&mut self`.
pub struct Session {
    url: String,
    username: String,
    password: String,
    http: HttpClient,
    token: Token,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    logins: u64,
}

pub(crate) fn build_http(timeout: Duration) -> Result<HttpClient> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("watttime-rs/{}", env!("CARGO_PKG_VERSION")))
            .unwrap_or(HeaderValue::from_static("watttime-rs")),
    );

    Ok(HttpClient::builder()
        .default_headers(default_headers)
        .timeout(timeout)
        .build()?)
}

impl Session {
    /// Builds the HTTP client and performs the initial login.
    pub fn connect(cfg: &ClientConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let http = build_http(cfg.timeout)?;
        let token = request_token(&http, &cfg.url, &cfg.username, &cfg.password)?;
        tracing::info!(user = %cfg.username, "logged in to WattTime");

        Ok(Self {
            url: cfg.url.clone(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            http,
            token: Token {
                value: token,
                issued_at: clock.now(),
            },
            limiter: RateLimiter::new(cfg.rate_quota, cfg.rate_window, clock.clone()),
            clock,
            logins: 1,
        })
    }

    /// Obtains a new token, replacing the stored one.
    pub fn login(&mut self) -> Result<()> {
        let value = request_token(&self.http, &self.url, &self.username, &self.password)?;
        self.token = Token {
            value,
            issued_at: self.clock.now(),
        };
        self.logins += 1;
        tracing::info!(user = %self.username, "refreshed WattTime token");
        Ok(())
    }

    /// Logs in again when the token is 30 minutes old or older.
    pub fn ensure_fresh(&mut self) -> Result<()> {
        if self.token_age() >= TOKEN_LIFETIME {
            self.login()?;
        }
        Ok(())
    }

    /// Sends an authenticated request and returns the successful response.
    ///
    /// The limiter is consulted before the token check, so a token that aged
    /// past its lifetime while waiting for quota is renewed before sending.
    pub fn dispatch(
        &mut self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Response> {
        self.limiter.admit();
        self.ensure_fresh()?;

        let url = urljoin(&self.url, path);
        let mut req = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.token.value);
        if !params.is_empty() {
            req = req.query(params);
        }

        let resp = req.send()?;
        let status = resp.status();
        tracing::debug!(%method, path, status = status.as_u16(), "WattTime request");

        if !status.is_success() {
            let body = read_error_body(resp.text());
            return Err(Error::from_api_response(status, body));
        }
        Ok(resp)
    }

    pub fn base_url(&self) -> &str {
        &self.url
    }

    pub fn token_issued_at(&self) -> Instant {
        self.token.issued_at
    }

    pub fn token_age(&self) -> Duration {
        self.clock
            .now()
            .saturating_duration_since(self.token.issued_at)
    }

    /// Number of successful logins, including the initial one.
    pub fn login_count(&self) -> u64 {
        self.logins
    }

    pub fn rate_limiter(&mut self) -> &mut RateLimiter {
        &mut self.limiter
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("token_age", &self.token_age())
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

fn request_token(http: &HttpClient, base: &str, username: &str, password: &str) -> Result<String> {
    let url = urljoin(base, "/login");
    let resp = http.get(&url).basic_auth(username, Some(password)).send()?;

    let status = resp.status();
    let text = resp.text()?;
    if !status.is_success() {
        return Err(Error::Auth {
            status: status.as_u16(),
            message: server_message(status, &text),
        });
    }

    let reply: LoginReply = serde_json::from_str(&text).map_err(|source| Error::Decode {
        url: url.clone(),
        source,
    })?;

    match reply.token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(Error::Auth {
            status: status.as_u16(),
            message: "login response did not contain a token".to_string(),
        }),
    }
}
