//! Error types returned by the WattTime client.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// A specialized `Result` type for WattTime operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Login was rejected or returned no token.
    #[error("WattTime login failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("API request failed: HTTP {status}: {message}")]
    Api {
        status: u16,
        /// Server message, or the raw body when it carried none.
        message: String,
        /// Raw response body.
        body: String,
    },

    #[error("failed to decode API response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("filesystem error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The downloaded archive could not be read.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Account registration was refused by the server.
    #[error("registration rejected: {0}")]
    Registration(String),

    /// Invalid parameter combination, detected before any network call.
    #[error("invalid parameters: {0}")]
    Param(String),

    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Auth { status, .. } | Error::Api { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        match self {
            Error::Auth { .. } => true,
            Error::Api { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Returns `true` when the caller, not the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::Api { status, .. } => (400..500).contains(status),
            Error::Param(_) | Error::Registration(_) | Error::Config(_) => true,
            _ => false,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds an [`Error::Api`] from a failed response body.
    pub(crate) fn from_api_response(status: StatusCode, body: String) -> Self {
        Error::Api {
            status: status.as_u16(),
            message: server_message(status, &body),
            body,
        }
    }
}

/// Error payloads look like `{"error": "..."}`, sometimes with a `message`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct WattTimeErrorResponse {
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

impl WattTimeErrorResponse {
    fn text(&self) -> Option<String> {
        let parts: Vec<&str> = [self.error.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(": "))
    }
}

/// Body of a failed response, or a placeholder naming why it could not be read.
pub(crate) fn read_error_body<E>(read: std::result::Result<String, E>) -> String
where
    E: std::fmt::Display,
{
    match read {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "failed to read error response body");
            format!("<unreadable response body: {e}>")
        }
    }
}

/// Extracts a readable message from an error body.
pub(crate) fn server_message(status: StatusCode, body: &str) -> String {
    if let Some(text) = serde_json::from_str::<WattTimeErrorResponse>(body)
        .ok()
        .and_then(|e| e.text())
    {
        return text;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_uses_server_message() {
        let err = Error::from_api_response(
            StatusCode::FORBIDDEN,
            r#"{"error":"Unauthorized","message":"This endpoint requires a PRO subscription"}"#
                .to_string(),
        );
        match err {
            Error::Api {
                status, message, ..
            } => {
                assert_eq!(status, 403);
                assert_eq!(
                    message,
                    "Unauthorized: This endpoint requires a PRO subscription"
                );
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn api_error_falls_back_to_body_or_reason() {
        let err = Error::from_api_response(StatusCode::BAD_GATEWAY, "upstream down".into());
        assert!(err.to_string().contains("upstream down"));

        let err = Error::from_api_response(StatusCode::NOT_FOUND, String::new());
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn unreadable_body_is_reported() {
        let body = read_error_body::<&str>(Err("connection closed before message completed"));
        assert_eq!(
            body,
            "<unreadable response body: connection closed before message completed>"
        );

        let err = Error::from_api_response(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert!(err.to_string().contains("connection closed"));

        assert_eq!(read_error_body::<&str>(Ok("plain".into())), "plain");
    }

    #[test]
    fn classifies_errors() {
        let unauthorized = Error::from_api_response(StatusCode::UNAUTHORIZED, "{}".into());
        assert!(unauthorized.is_auth_error());
        assert!(unauthorized.is_client_error());
        assert_eq!(unauthorized.status(), Some(401));

        assert!(Error::Param("neither".into()).is_client_error());
        assert!(!Error::Param("neither".into()).is_auth_error());
        assert_eq!(Error::Registration("taken".into()).status(), None);
    }
}
