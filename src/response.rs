//! The normalized result of an awaited builder.
//!
//! A [`Response`] always carries the HTTP status and status text. Its
//! [`Outcome`] is either a success (rows plus an optional count) or the
//! structured [`PostgrestError`] the server reported.

use crate::PostgrestError;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// Success or failure of a completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The server answered with a 2xx status.
    Success {
        /// The parsed body. `None` for `HEAD` requests and `return=minimal` writes.
        data: Option<T>,
        /// Total row count, present only when a count was requested and the
        /// server sent a parsable `Content-Range`.
        count: Option<u64>,
    },
    /// The server answered with a non-2xx status.
    Failure(PostgrestError),
}

/// A resolved PostgREST call.
///
/// # Examples
///
/// ```no_run
/// use pgrest::{Client, Count};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), pgrest::Error> {
/// let client = Client::new("https://db.example.com/rest/v1")?;
///
/// let response = client
///     .from::<User>("users")
///     .select("id,name")
///     .count(Count::Exact)
///     .limit(10)
///     .await?;
///
/// println!("{} {} in {:?}", response.status, response.status_text, response.latency);
/// if let Some(users) = response.data() {
///     println!("{} of {:?} users", users.len(), response.count());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The success or failure payload.
    pub outcome: Outcome<T>,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The reason phrase the server sent, or the canonical reason for
    /// [`status`](Self::status) when it sent none.
    pub status_text: String,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from sending the request until the body was read.
    pub latency: Duration,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    ///
    /// The status text is derived from the status code.
    pub fn new(
        outcome: Outcome<T>,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
    ) -> Self {
        Self {
            outcome,
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            latency,
        }
    }

    /// Returns `true` if the server answered with a 2xx status.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// The parsed body of a successful response.
    pub fn data(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Success { data, .. } => data.as_ref(),
            Outcome::Failure(_) => None,
        }
    }

    /// Same as [`data`](Self::data).
    pub fn body(&self) -> Option<&T> {
        self.data()
    }

    /// The row count of a successful response.
    pub fn count(&self) -> Option<u64> {
        match &self.outcome {
            Outcome::Success { count, .. } => *count,
            Outcome::Failure(_) => None,
        }
    }

    /// The server's error for a non-2xx response.
    pub fn error(&self) -> Option<&PostgrestError> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::Failure(error) => Some(error),
        }
    }

    /// Converts into a `Result`, keeping only the data.
    ///
    /// # Examples
    ///
    /// ```
    /// # use pgrest::{Outcome, PostgrestError, Response};
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let failed: Response<Vec<u32>> = Response::new(
    ///     Outcome::Failure(PostgrestError {
    ///         message: "permission denied".to_string(),
    ///         ..Default::default()
    ///     }),
    ///     StatusCode::FORBIDDEN,
    ///     HeaderMap::new(),
    ///     Duration::ZERO,
    /// );
    ///
    /// let err = failed.into_result().unwrap_err();
    /// assert_eq!(err.message, "permission denied");
    /// ```
    pub fn into_result(self) -> Result<Option<T>, PostgrestError> {
        match self.outcome {
            Outcome::Success { data, .. } => Ok(data),
            Outcome::Failure(error) => Err(error),
        }
    }

    /// Maps the data to a different type, preserving everything else.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        let outcome = match self.outcome {
            Outcome::Success { data, count } => Outcome::Success {
                data: data.map(f),
                count,
            },
            Outcome::Failure(error) => Outcome::Failure(error),
        };
        Response {
            outcome,
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
            latency: self.latency,
        }
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}
