//! The execution engine: one descriptor in, one normalized [`Response`] out.
//!
//! Only status-code failures are normalized into [`Outcome::Failure`].
//! Transport errors and unparsable bodies are returned as [`Error`] so that an
//! API-declared error is never confused with a broken exchange.

use crate::{
    descriptor::{BuildRequest, Method, RequestDescriptor},
    prefer, Error, Outcome, PostgrestError, Response, Result,
};
use serde::de::DeserializeOwned;
use std::time::Instant;

/// Builds the descriptor, sends exactly one request and resolves the response.
///
/// There is no retry and no timeout here; configure timeouts on the
/// `reqwest::Client` passed in.
///
/// # Errors
///
/// - [`Error::SerializationFailed`] / [`Error::ConfigurationError`] if the
///   builder could not produce a descriptor.
/// - [`Error::Network`] on transport failure.
/// - [`Error::DeserializationFailed`] if a body that had to be read was not
///   the expected JSON.
///
/// # Examples
///
/// ```no_run
/// use pgrest::{engine, Method, RequestDescriptor};
///
/// # async fn example() -> Result<(), pgrest::Error> {
/// let url = "http://localhost:3000/users?select=id".parse()?;
/// let descriptor = RequestDescriptor::new(Method::Get, url)
///     .with_header("prefer", "count=exact")?;
///
/// let response = engine::execute(&reqwest::Client::new(), descriptor).await?;
/// println!("{:?} rows, count {:?}", response.data(), response.count());
/// # Ok(())
/// # }
/// ```
pub async fn execute<R>(http_client: &reqwest::Client, builder: R) -> Result<Response<R::Output>>
where
    R: BuildRequest,
{
    let descriptor = builder.into_descriptor()?;
    let headers = descriptor.derive_headers();

    tracing::debug!(
        method = ?descriptor.method,
        url = %descriptor.url,
        schema = ?descriptor.schema,
        "Executing PostgREST request"
    );
    tracing::trace!(headers = ?headers, "Derived request headers");

    let mut request = http_client
        .request(descriptor.method.into(), descriptor.url.clone())
        .headers(headers);

    if descriptor.method.is_mutating() {
        if let Some(body) = &descriptor.body {
            let json =
                serde_json::to_vec(body).map_err(|e| Error::SerializationFailed(e.to_string()))?;
            request = request.body(json);
        }
    }

    let start_time = Instant::now();
    let response = request.send().await?;

    resolve(&descriptor, response, start_time).await
}

/// Maps a raw HTTP response onto a [`Response`].
async fn resolve<T>(
    descriptor: &RequestDescriptor,
    response: reqwest::Response,
    start_time: Instant,
) -> Result<Response<T>>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let headers = response.headers().clone();
    let status_text = reason_phrase(&response);

    let outcome = if status.is_success() {
        let skip_body =
            descriptor.method == Method::Head || prefer::is_return_minimal(&descriptor.headers);
        let data = if skip_body {
            None
        } else {
            Some(read_json::<T>(response).await?)
        };

        let count = match prefer::requested_count(&descriptor.headers) {
            Some(_) => headers
                .get(http::header::CONTENT_RANGE)
                .and_then(|value| value.to_str().ok())
                .and_then(prefer::content_range_total),
            None => None,
        };

        Outcome::Success { data, count }
    } else if descriptor.method == Method::Head {
        // A HEAD response has no body to carry the error object.
        Outcome::Failure(PostgrestError {
            message: status_text.clone(),
            ..Default::default()
        })
    } else {
        Outcome::Failure(read_json::<PostgrestError>(response).await?)
    };

    let latency = start_time.elapsed();

    tracing::debug!(
        status = status.as_u16(),
        latency_ms = latency.as_millis(),
        success = status.is_success(),
        "Received PostgREST response"
    );

    let mut resolved = Response::new(outcome, status, headers, latency);
    resolved.status_text = status_text;
    Ok(resolved)
}

/// The reason phrase the server sent, or the canonical one for the status.
///
/// Only HTTP/1 carries a phrase on the wire, and hyper keeps it only when it
/// differs from the canonical reason.
fn reason_phrase(response: &reqwest::Response) -> String {
    response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            response
                .status()
                .canonical_reason()
                .unwrap_or_default()
                .to_string()
        })
}

async fn read_json<T>(response: reqwest::Response) -> Result<T>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let raw_body = response.text().await?;

    serde_json::from_str::<T>(&raw_body).map_err(|e| Error::DeserializationFailed {
        raw_response: raw_body,
        serde_error: e.to_string(),
        status,
    })
}
