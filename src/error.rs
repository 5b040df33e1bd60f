//! Error types for PostgREST calls.
//!
//! Two kinds of failure exist and they never mix:
//!
//! - [`PostgrestError`] is what the *server* reports for a non-2xx status. It is
//!   part of a successful exchange and is returned inside
//!   [`Response`](crate::Response), never as an `Err`.
//! - [`Error`] is everything that prevents a well-formed exchange: transport
//!   failures, unparsable bodies, invalid configuration. These are returned as
//!   `Err` from the awaited builder.

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// The structured error body PostgREST returns with a non-2xx status.
///
/// See <https://postgrest.org/en/stable/api.html#errors-and-http-status-codes>.
///
/// Fields missing from the server's body deserialize to their defaults, so
/// any JSON object is accepted.
///
/// # Examples
///
/// ```
/// use pgrest::PostgrestError;
///
/// let error: PostgrestError = serde_json::from_str(
///     r#"{"message":"duplicate key","details":null,"hint":null,"code":"23505"}"#,
/// ).unwrap();
///
/// assert_eq!(error.message, "duplicate key");
/// assert_eq!(error.code.as_deref(), Some("23505"));
/// assert!(error.hint.is_none());
/// ```
#[derive(thiserror::Error, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
#[serde(default)]
pub struct PostgrestError {
    /// Human readable summary of the failure.
    pub message: String,
    /// Additional detail, often the offending row or constraint.
    pub details: Option<String>,
    /// A suggestion for fixing the request.
    pub hint: Option<String>,
    /// The PostgreSQL or PostgREST error code (e.g. `23505`, `PGRST116`).
    pub code: Option<String>,
}

/// Errors that prevent a request from producing a [`Response`](crate::Response).
///
/// # Examples
///
/// ```no_run
/// use pgrest::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::new("https://db.example.com/rest/v1")?;
///
/// match client.from::<serde_json::Value>("users").select("*").await {
///     Ok(response) => match response.error() {
///         None => println!("rows: {:?}", response.data()),
///         Some(error) => eprintln!("server refused ({}): {}", response.status, error),
///     },
///     Err(Error::DeserializationFailed { raw_response, serde_error, .. }) => {
///         eprintln!("unparsable body {raw_response}: {serde_error}");
///     }
///     Err(e) => eprintln!("request failed: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection refused, DNS failure, reset, ...).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be parsed as the expected JSON.
    ///
    /// This applies to both branches: a malformed row payload on a 2xx and a
    /// malformed error object on a non-2xx.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// The request body could not be serialized to JSON.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// Invalid configuration, such as a bad header name or value.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns the HTTP status code if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error carries one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for PostgREST calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgrest_error_accepts_partial_body() {
        let error: PostgrestError = serde_json::from_str(r#"{"message":"nope"}"#).unwrap();
        assert_eq!(error.message, "nope");
        assert_eq!(error.details, None);
        assert_eq!(error.code, None);
        assert_eq!(error.to_string(), "nope");
    }

    #[test]
    fn test_postgrest_error_rejects_non_object() {
        assert!(serde_json::from_str::<PostgrestError>(r#""plain string""#).is_err());
    }

    #[test]
    fn test_deserialization_error_accessors() {
        let err = Error::DeserializationFailed {
            raw_response: "<html>".to_string(),
            serde_error: "expected value".to_string(),
            status: StatusCode::OK,
        };
        assert_eq!(err.status(), Some(StatusCode::OK));
        assert_eq!(err.raw_response(), Some("<html>"));

        let err = Error::ConfigurationError("bad".to_string());
        assert_eq!(err.status(), None);
        assert_eq!(err.raw_response(), None);
    }
}
