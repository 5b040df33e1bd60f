//! The PostgREST client: base URL, shared headers and default schema.
//!
//! The [`Client`] type hands out builders. Use [`ClientBuilder`] to configure it.

use crate::{
    descriptor::{parse_header, parse_schema, Method},
    query::{FilterBuilder, QueryBuilder},
    Error, Result,
};
use http::{header, HeaderMap};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

/// A client for a PostgREST endpoint.
///
/// Cloning is cheap and clones share headers. Headers are read when a builder
/// is awaited, not when it is created, so a header set with [`auth`](Self::auth)
/// or [`set_header`](Self::set_header) applies to every builder that has not
/// been awaited yet.
///
/// # Examples
///
/// ```no_run
/// use pgrest::Client;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct NewUser {
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), pgrest::Error> {
/// let client = Client::builder()
///     .base_url("https://db.example.com/rest/v1")?
///     .header("apikey", "public-anon-key")?
///     .schema("public")
///     .build()?;
///
/// client.auth("user-jwt")?;
///
/// let users = client.from::<User>("users").select("id,name").await?;
/// if let Some(users) = users.data() {
///     println!("{} users", users.len());
/// }
///
/// let created = client
///     .from::<User>("users")
///     .insert(&NewUser { name: "Alice".to_string() })
///     .await?;
/// match created.error() {
///     None => println!("created {:?}", created.data().map(|rows| rows[0].id)),
///     Some(error) => eprintln!("insert failed: {}", error),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: Url,
    headers: RwLock<HeaderMap>,
    schema: Option<String>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client for `url` with no extra headers or schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        Self::builder().base_url(url)?.build()
    }

    /// Authenticates subsequent requests with a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value.
    pub fn auth(&self, token: impl AsRef<str>) -> Result<&Self> {
        self.set_header(header::AUTHORIZATION.as_str(), format!("Bearer {}", token.as_ref()))
    }

    /// Sets a header on every request made through this client or its clones.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn set_header(&self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<&Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.inner
            .headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, value);
        Ok(self)
    }

    /// Starts an operation on `table`.
    ///
    /// `T` is the row type the response deserializes into.
    pub fn from<T>(&self, table: &str) -> QueryBuilder<T> {
        QueryBuilder::new(self.clone(), self.endpoint(&[table]))
    }

    /// Calls the stored procedure `function` with `params` as its JSON body.
    ///
    /// `R` is whatever the function returns: a scalar, a single object, or a
    /// `Vec` for set-returning functions. The returned builder accepts filters,
    /// which apply to set-returning functions, and
    /// [`count`](FilterBuilder::count).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pgrest::{Client, Count};
    /// use serde_json::json;
    ///
    /// # async fn example() -> Result<(), pgrest::Error> {
    /// let client = Client::new("http://localhost:3000")?;
    ///
    /// let response = client
    ///     .rpc::<Vec<serde_json::Value>, _>("search_users", &json!({ "term": "ali" }))
    ///     .filter("active", "is", "true")
    ///     .count(Count::Exact)
    ///     .await?;
    /// println!("{:?}", response.count());
    /// # Ok(())
    /// # }
    /// ```
    pub fn rpc<R, P>(&self, function: &str, params: &P) -> FilterBuilder<R>
    where
        P: Serialize + ?Sized,
    {
        FilterBuilder::new(self.clone(), Method::Post, self.endpoint(&["rpc", function]))
            .json_body(params)
    }

    /// The default schema, if one was configured.
    pub fn schema(&self) -> Option<&str> {
        self.inner.schema.as_deref()
    }

    /// The base URL all table and function paths are appended to.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.inner.http_client
    }

    /// A snapshot of the shared headers as they are right now.
    pub(crate) fn shared_headers(&self) -> HeaderMap {
        self.inner
            .headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base_url.clone();
        // `build` rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use pgrest::ClientBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), pgrest::Error> {
/// let http_client = reqwest::Client::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
///
/// let client = ClientBuilder::new()
///     .base_url("https://db.example.com/rest/v1")?
///     .header("apikey", "public-anon-key")?
///     .http_client(http_client)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    headers: HeaderMap,
    schema: Option<String>,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            headers: HeaderMap::new(),
            schema: None,
            http_client: None,
        }
    }

    /// Sets the URL of the PostgREST endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the schema every builder targets unless it overrides it.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Uses `http_client` for all requests.
    ///
    /// Timeouts, proxies and TLS settings belong on this client; requests made
    /// through [`Client`] are never retried or timed out on their own.
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided, if it cannot have a path
    /// appended, if the schema is not a valid header value, or if the default
    /// HTTP client cannot be built.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        if base_url.cannot_be_a_base() {
            return Err(Error::ConfigurationError(format!(
                "Base URL cannot have paths appended: {}",
                base_url
            )));
        }

        if let Some(schema) = &self.schema {
            parse_schema(schema)?;
        }

        let http_client = match self.http_client {
            Some(http_client) => http_client,
            None => reqwest::Client::builder().build().map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                headers: RwLock::new(self.headers),
                schema: self.schema,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
