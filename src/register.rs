//! Self-service account registration.

use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

use crate::config::DEFAULT_URL;
use crate::error::{Error, Result, read_error_body, server_message};
use crate::session::build_http;
use crate::util::urljoin;

/// Details submitted to `/register`.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: email.into(),
            org: None,
        }
    }

    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    /// Registers against the public WattTime API.
    pub fn register(&self) -> Result<()> {
        self.register_at(DEFAULT_URL)
    }

    /// Registers against the API rooted at `base_url`.
    ///
    /// A 400 response (e.g. a username that is already taken) fails with
    /// [`Error::Registration`] carrying the server's explanation.
    pub fn register_at(&self, base_url: &str) -> Result<()> {
        for (field, value) in [
            ("username", &self.username),
            ("password", &self.password),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Param(format!("registration {field} is empty")));
            }
        }

        let http = build_http(Duration::from_secs(60))?;
        let url = urljoin(base_url, "/register");
        let resp = http.post(&url).json(self).send()?;

        let status = resp.status();
        if status.is_success() {
            tracing::info!(user = %self.username, "registered WattTime account");
            return Ok(());
        }

        let body = read_error_body(resp.text());
        if status == StatusCode::BAD_REQUEST {
            return Err(Error::Registration(server_message(status, &body)));
        }
        Err(Error::from_api_response(status, body))
    }
}

/// Creates a WattTime account. No session is established.
pub fn register_new_user(
    username: &str,
    password: &str,
    email: &str,
    org: Option<&str>,
) -> Result<()> {
    register_new_user_at(DEFAULT_URL, username, password, email, org)
}

/// [`register_new_user`] against the API rooted at `base_url`.
pub fn register_new_user_at(
    base_url: &str,
    username: &str,
    password: &str,
    email: &str,
    org: Option<&str>,
) -> Result<()> {
    let mut user = NewUser::new(username, password, email);
    user.org = org.map(str::to_string);
    user.register_at(base_url)
}
