//! Request descriptors: the fully-assembled description of one pending call.

use crate::Result;
use http::{header, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use url::Url;

/// The HTTP verbs a PostgREST call can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read rows (`GET`).
    Get,
    /// Read without a body, typically to obtain a count (`HEAD`).
    Head,
    /// Create rows or call a function (`POST`).
    Post,
    /// Modify rows (`PATCH`).
    Patch,
    /// Delete rows (`DELETE`).
    Delete,
}

impl Method {
    /// Returns `true` for `GET` and `HEAD`, which never carry a body.
    pub fn is_read(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }

    /// Returns `true` for methods that send a JSON body.
    pub fn is_mutating(&self) -> bool {
        !self.is_read()
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => http::Method::GET,
            Method::Head => http::Method::HEAD,
            Method::Post => http::Method::POST,
            Method::Patch => http::Method::PATCH,
            Method::Delete => http::Method::DELETE,
        }
    }
}

/// Header carrying the target schema of a read.
pub const ACCEPT_PROFILE: HeaderName = HeaderName::from_static("accept-profile");

/// Header carrying the target schema of a write.
pub const CONTENT_PROFILE: HeaderName = HeaderName::from_static("content-profile");

/// Everything needed to issue one PostgREST request.
///
/// The URL already carries every filter, ordering and pagination parameter;
/// it is opaque to the execution engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// The HTTP method.
    pub method: Method,

    /// Fully-qualified URL, query string included.
    pub url: Url,

    /// Request headers, including any `Prefer` tokens.
    pub headers: HeaderMap,

    /// Target schema, routed to `Accept-Profile` or `Content-Profile`.
    pub schema: Option<HeaderValue>,

    /// JSON body for mutating methods.
    pub body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    /// Creates a descriptor with no headers, schema or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            schema: None,
            body: None,
        }
    }

    /// Adds a header to the descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the target schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is not a valid header value.
    pub fn with_schema(mut self, schema: impl AsRef<str>) -> Result<Self> {
        self.schema = Some(parse_schema(schema.as_ref())?);
        Ok(self)
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Computes the headers that are actually sent.
    ///
    /// Starts from [`headers`](Self::headers) and adds schema routing and the
    /// JSON content type for mutating methods. `Prefer` is passed through as is.
    /// The descriptor itself is not modified, so calling this twice yields the
    /// same map.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgrest::{Method, RequestDescriptor};
    ///
    /// let url = "https://db.example.com/users".parse().unwrap();
    /// let read = RequestDescriptor::new(Method::Get, url)
    ///     .with_schema("tenant_a")
    ///     .unwrap();
    ///
    /// let headers = read.derive_headers();
    /// assert_eq!(headers["accept-profile"], "tenant_a");
    /// assert!(!headers.contains_key("content-profile"));
    /// assert!(!headers.contains_key("content-type"));
    /// ```
    pub fn derive_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();

        // https://postgrest.org/en/stable/api.html#switching-schemas
        if let Some(schema) = &self.schema {
            let name = if self.method.is_read() {
                ACCEPT_PROFILE
            } else {
                CONTENT_PROFILE
            };
            headers.insert(name, schema.clone());
        }

        if self.method.is_mutating() {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        headers
    }
}

/// Implemented by everything that can be turned into a [`RequestDescriptor`].
///
/// The execution engine depends only on this trait. Builders implement it and
/// are converted when awaited, so anything they read from the client (such as
/// its shared headers) is read at that moment.
pub trait BuildRequest {
    /// The type the response body deserializes into.
    type Output: DeserializeOwned;

    /// Consumes the builder and returns the descriptor to execute.
    ///
    /// # Errors
    ///
    /// Returns an error if intent accumulated by the builder was invalid, for
    /// example a body that failed to serialize or a malformed header.
    fn into_descriptor(self) -> Result<RequestDescriptor>;
}

impl BuildRequest for RequestDescriptor {
    type Output = serde_json::Value;

    fn into_descriptor(self) -> Result<RequestDescriptor> {
        Ok(self)
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
    Ok((name, value))
}

pub(crate) fn parse_schema(schema: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(schema)
        .map_err(|e| crate::Error::ConfigurationError(format!("Invalid schema: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(method: Method) -> RequestDescriptor {
        RequestDescriptor::new(method, Url::parse("http://localhost:3000/users").unwrap())
    }

    #[test]
    fn test_schema_routes_to_accept_profile_for_reads() {
        for method in [Method::Get, Method::Head] {
            let headers = descriptor(method).with_schema("tenant_a").unwrap().derive_headers();
            assert_eq!(headers[ACCEPT_PROFILE], "tenant_a");
            assert!(!headers.contains_key(CONTENT_PROFILE));
        }
    }

    #[test]
    fn test_schema_routes_to_content_profile_for_writes() {
        for method in [Method::Post, Method::Patch, Method::Delete] {
            let headers = descriptor(method).with_schema("tenant_a").unwrap().derive_headers();
            assert_eq!(headers[CONTENT_PROFILE], "tenant_a");
            assert!(!headers.contains_key(ACCEPT_PROFILE));
        }
    }

    #[test]
    fn test_no_schema_emits_no_profile_headers() {
        let headers = descriptor(Method::Post).derive_headers();
        assert!(!headers.contains_key(ACCEPT_PROFILE));
        assert!(!headers.contains_key(CONTENT_PROFILE));
    }

    #[test]
    fn test_content_type_only_for_mutating_methods() {
        assert!(!descriptor(Method::Get)
            .derive_headers()
            .contains_key(header::CONTENT_TYPE));
        assert!(!descriptor(Method::Head)
            .derive_headers()
            .contains_key(header::CONTENT_TYPE));
        for method in [Method::Post, Method::Patch, Method::Delete] {
            assert_eq!(
                descriptor(method).derive_headers()[header::CONTENT_TYPE],
                "application/json"
            );
        }
    }

    #[test]
    fn test_prefer_is_passed_through() {
        let headers = descriptor(Method::Post)
            .with_header("Prefer", "return=minimal,count=exact")
            .unwrap()
            .derive_headers();
        assert_eq!(headers["prefer"], "return=minimal,count=exact");
    }

    #[test]
    fn test_derive_headers_is_idempotent() {
        let descriptor = descriptor(Method::Patch)
            .with_schema("tenant_a")
            .unwrap()
            .with_header("prefer", "count=exact")
            .unwrap();
        let first = descriptor.derive_headers();
        let second = descriptor.derive_headers();
        assert_eq!(first, second);
        assert!(!descriptor.headers.contains_key(CONTENT_PROFILE));
    }

    #[test]
    fn test_invalid_schema_is_configuration_error() {
        let result = descriptor(Method::Get).with_schema("tenant\na");
        assert!(matches!(result, Err(crate::Error::ConfigurationError(_))));
    }

    #[test]
    fn test_invalid_header_is_configuration_error() {
        let result = descriptor(Method::Get).with_header("bad header", "x");
        assert!(matches!(result, Err(crate::Error::ConfigurationError(_))));
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(http::Method::from(Method::Patch), http::Method::PATCH);
        assert!(Method::Head.is_read());
        assert!(Method::Delete.is_mutating());
    }
}
