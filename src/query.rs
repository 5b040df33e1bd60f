//! Builders that accumulate a table operation or function call.
//!
//! Builders perform no I/O. They are turned into a
//! [`RequestDescriptor`] when awaited, which is also when the client's shared
//! headers are read.

use crate::{
    descriptor::{parse_header, parse_schema, BuildRequest, Method, RequestDescriptor},
    engine,
    prefer::{Count, Preferences, Returning},
    Client, Error, Response, Result,
};
use futures::future::BoxFuture;
use http::{header, HeaderMap, HeaderValue};
use serde::{de::DeserializeOwned, Serialize};
use std::future::IntoFuture;
use std::marker::PhantomData;
use url::Url;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Selects the operation to perform on a table.
///
/// Created by [`Client::from`]. Every verb returns a [`FilterBuilder`] that
/// resolves to `Vec<T>`.
#[must_use = "builders do nothing until selected and awaited"]
pub struct QueryBuilder<T> {
    client: Client,
    url: Url,
    _row: PhantomData<fn() -> T>,
}

impl<T> QueryBuilder<T> {
    pub(crate) fn new(client: Client, url: Url) -> Self {
        Self {
            client,
            url,
            _row: PhantomData,
        }
    }

    fn chain(self, method: Method) -> FilterBuilder<Vec<T>> {
        FilterBuilder::new(self.client, method, self.url)
    }

    /// Reads rows.
    ///
    /// Whitespace in `columns` is removed unless it is inside double quotes.
    pub fn select(self, columns: &str) -> FilterBuilder<Vec<T>> {
        self.chain(Method::Get)
            .query("select", clean_columns(columns))
    }

    /// Inserts one record or an array of records.
    pub fn insert<V>(self, values: &V) -> FilterBuilder<Vec<T>>
    where
        V: Serialize + ?Sized,
    {
        self.chain(Method::Post)
            .json_body(values)
            .returning(Returning::Representation)
    }

    /// Inserts records, merging with existing rows on a primary key conflict.
    ///
    /// Use [`FilterBuilder::on_conflict`] to merge on other unique columns.
    pub fn upsert<V>(self, values: &V) -> FilterBuilder<Vec<T>>
    where
        V: Serialize + ?Sized,
    {
        let mut builder = self.insert(values);
        builder.prefer.set("resolution=merge-duplicates");
        builder
    }

    /// Updates the rows matched by the filters added afterwards.
    pub fn update<V>(self, values: &V) -> FilterBuilder<Vec<T>>
    where
        V: Serialize + ?Sized,
    {
        self.chain(Method::Patch)
            .json_body(values)
            .returning(Returning::Representation)
    }

    /// Deletes the rows matched by the filters added afterwards.
    pub fn delete(self) -> FilterBuilder<Vec<T>> {
        self.chain(Method::Delete)
            .returning(Returning::Representation)
    }
}

/// A pending call with filters, ordering, pagination and preferences.
///
/// Await it to execute. `O` is the type the response body deserializes into:
/// `Vec<T>` for table operations, whatever the caller chose for
/// [`Client::rpc`], and `T` after [`single`](FilterBuilder::single).
///
/// # Examples
///
/// ```no_run
/// use pgrest::{Client, Count};
///
/// # async fn example() -> Result<(), pgrest::Error> {
/// let client = Client::new("http://localhost:3000")?;
///
/// let response = client
///     .from::<serde_json::Value>("messages")
///     .select("id, body, author:users(name)")
///     .filter("channel_id", "eq", "3")
///     .order("inserted_at", false)
///     .range(0, 24)
///     .count(Count::Planned)
///     .await?;
///
/// println!("page of {:?}, total {:?}", response.data().map(Vec::len), response.count());
/// # Ok(())
/// # }
/// ```
#[must_use = "builders do nothing unless awaited"]
pub struct FilterBuilder<O> {
    client: Client,
    method: Method,
    url: Url,
    query: Vec<(String, String)>,
    order: Vec<String>,
    offset: Option<u64>,
    limit: Option<u64>,
    headers: HeaderMap,
    prefer: Preferences,
    schema: Option<String>,
    body: Option<serde_json::Value>,
    error: Option<Error>,
    _output: PhantomData<fn() -> O>,
}

impl<O> FilterBuilder<O> {
    pub(crate) fn new(client: Client, method: Method, url: Url) -> Self {
        let schema = client.schema().map(str::to_string);
        Self {
            client,
            method,
            url,
            query: Vec::new(),
            order: Vec::new(),
            offset: None,
            limit: None,
            headers: HeaderMap::new(),
            prefer: Preferences::default(),
            schema,
            body: None,
            error: None,
            _output: PhantomData,
        }
    }

    /// Keeps the first error; it is returned when the builder is awaited.
    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub(crate) fn json_body<V>(mut self, values: &V) -> Self
    where
        V: Serialize + ?Sized,
    {
        match serde_json::to_value(values) {
            Ok(body) => self.body = Some(body),
            Err(e) => self.fail(Error::SerializationFailed(e.to_string())),
        }
        self
    }

    /// Appends a raw query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Filters rows with `column=operator.value`.
    ///
    /// `operator` and `value` are passed through unchanged, e.g.
    /// `filter("age", "gte", "18")` or `filter("id", "in", "(1,2,3)")`.
    pub fn filter(self, column: &str, operator: &str, value: impl AsRef<str>) -> Self {
        let condition = format!("{}.{}", operator, value.as_ref());
        self.query(column, condition)
    }

    /// Orders by `column`. Later calls add lower-priority sort keys.
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{}.{}", column, direction));
        self
    }

    /// Returns at most `count` rows.
    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Returns rows `from` through `to`, both inclusive and zero based.
    ///
    /// A `to` smaller than `from` is reported when the builder is awaited.
    pub fn range(mut self, from: u64, to: u64) -> Self {
        if to < from {
            self.fail(Error::ConfigurationError(format!(
                "Invalid range: {} is before {}",
                to, from
            )));
            return self;
        }
        self.offset = Some(from);
        self.limit = Some((to - from).saturating_add(1));
        self
    }

    /// Merges on `columns` instead of the primary key for an upsert.
    pub fn on_conflict(self, columns: &str) -> Self {
        self.query("on_conflict", clean_columns(columns))
    }

    /// Asks the server to count the matched rows.
    ///
    /// The total is available from [`Response::count`].
    pub fn count(mut self, count: Count) -> Self {
        self.prefer.set_count(count);
        self
    }

    /// Chooses whether a write returns the affected rows.
    pub fn returning(mut self, returning: Returning) -> Self {
        self.prefer.set_returning(returning);
        self
    }

    /// Sends a `HEAD` instead of a `GET`, so no rows are transferred.
    ///
    /// Combine with [`count`](Self::count) to only fetch the total. Has no
    /// effect on writes.
    pub fn head(mut self) -> Self {
        if self.method == Method::Get {
            self.method = Method::Head;
        }
        self
    }

    /// Targets `schema` instead of the client's default.
    ///
    /// A schema that is not a valid header value is reported when the
    /// builder is awaited.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Adds a header to this call only.
    ///
    /// An invalid name or value is reported when the builder is awaited.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match parse_header(name.as_ref(), value.as_ref()) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(e) => self.fail(e),
        }
        self
    }

    fn build_descriptor(self) -> Result<RequestDescriptor> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let schema = self.schema.as_deref().map(parse_schema).transpose()?;

        let mut url = self.url;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
            if !self.order.is_empty() {
                pairs.append_pair("order", &self.order.join(","));
            }
            if let Some(offset) = self.offset {
                pairs.append_pair("offset", &offset.to_string());
            }
            if let Some(limit) = self.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        // Read now rather than at construction, so the latest client headers win.
        let mut headers = self.client.shared_headers();
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        if !self.prefer.is_empty() {
            let value = HeaderValue::try_from(self.prefer.header_value()).map_err(|e| {
                Error::ConfigurationError(format!("Invalid Prefer header: {}", e))
            })?;
            headers.append(http::header::HeaderName::from_static("prefer"), value);
        }

        Ok(RequestDescriptor {
            method: self.method,
            url,
            headers,
            schema,
            body: self.body.filter(|_| self.method.is_mutating()),
        })
    }
}

impl<T> FilterBuilder<Vec<T>> {
    /// Expects exactly one row and resolves to it instead of a `Vec`.
    ///
    /// The server answers with an error when zero or several rows match.
    pub fn single(self) -> FilterBuilder<T> {
        let mut builder = FilterBuilder {
            client: self.client,
            method: self.method,
            url: self.url,
            query: self.query,
            order: self.order,
            offset: self.offset,
            limit: self.limit,
            headers: self.headers,
            prefer: self.prefer,
            schema: self.schema,
            body: self.body,
            error: self.error,
            _output: PhantomData,
        };
        builder
            .headers
            .insert(header::ACCEPT, HeaderValue::from_static(SINGLE_OBJECT));
        builder
    }
}

impl<O> BuildRequest for FilterBuilder<O>
where
    O: DeserializeOwned,
{
    type Output = O;

    fn into_descriptor(self) -> Result<RequestDescriptor> {
        self.build_descriptor()
    }
}

impl<O> IntoFuture for FilterBuilder<O>
where
    O: DeserializeOwned + Send + 'static,
{
    type Output = Result<Response<O>>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let http_client = self.client.http_client().clone();
        Box::pin(async move { engine::execute(&http_client, self).await })
    }
}

/// Removes whitespace that is not inside double quotes.
fn clean_columns(columns: &str) -> String {
    let mut quoted = false;
    columns
        .chars()
        .filter(|&c| {
            if c == '"' {
                quoted = !quoted;
            }
            quoted || !c.is_whitespace()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ACCEPT_PROFILE, CONTENT_PROFILE};
    use serde_json::{json, Value};

    fn client() -> Client {
        Client::builder()
            .base_url("http://localhost:3000/rest/v1/")
            .unwrap()
            .build()
            .unwrap()
    }

    fn descriptor<B: BuildRequest>(builder: B) -> RequestDescriptor {
        builder.into_descriptor().unwrap()
    }

    #[test]
    fn test_clean_columns() {
        assert_eq!(clean_columns("id, name ,\n email"), "id,name,email");
        assert_eq!(clean_columns(r#"id, "first name""#), r#"id,"first name""#);
        assert_eq!(clean_columns("*"), "*");
    }

    #[test]
    fn test_select_descriptor() {
        let d = descriptor(
            client()
                .from::<Value>("users")
                .select("id, name")
                .filter("age", "gte", "18")
                .order("name", true)
                .order("id", false)
                .range(10, 19),
        );
        assert_eq!(d.method, Method::Get);
        assert_eq!(d.url.path(), "/rest/v1/users");
        let pairs: Vec<(String, String)> = d.url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("select".to_string(), "id,name".to_string()),
                ("age".to_string(), "gte.18".to_string()),
                ("order".to_string(), "name.asc,id.desc".to_string()),
                ("offset".to_string(), "10".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
        assert!(d.body.is_none());
        assert!(!d.headers.contains_key("prefer"));
    }

    #[test]
    fn test_insert_descriptor() {
        let d = descriptor(
            client()
                .from::<Value>("users")
                .insert(&json!([{ "name": "a" }, { "name": "b" }]))
                .count(Count::Exact),
        );
        assert_eq!(d.method, Method::Post);
        assert_eq!(d.url.query(), None);
        assert_eq!(d.body, Some(json!([{ "name": "a" }, { "name": "b" }])));
        assert_eq!(d.headers["prefer"], "return=representation,count=exact");
    }

    #[test]
    fn test_upsert_descriptor() {
        let d = descriptor(
            client()
                .from::<Value>("users")
                .upsert(&json!({ "email": "a@b.c" }))
                .on_conflict("email")
                .returning(Returning::Minimal),
        );
        assert_eq!(d.url.query(), Some("on_conflict=email"));
        assert_eq!(
            d.headers["prefer"],
            "resolution=merge-duplicates,return=minimal"
        );
    }

    #[test]
    fn test_update_and_delete_descriptors() {
        let update = descriptor(
            client()
                .from::<Value>("users")
                .update(&json!({ "name": "b" }))
                .filter("id", "eq", "1"),
        );
        assert_eq!(update.method, Method::Patch);
        assert_eq!(update.url.query(), Some("id=eq.1"));

        let delete = descriptor(client().from::<Value>("users").delete().filter("id", "eq", "1"));
        assert_eq!(delete.method, Method::Delete);
        assert!(delete.body.is_none());
        assert_eq!(delete.headers["prefer"], "return=representation");
    }

    #[test]
    fn test_head_only_applies_to_reads() {
        let d = descriptor(client().from::<Value>("users").select("*").head());
        assert_eq!(d.method, Method::Head);

        let d = descriptor(client().from::<Value>("users").delete().head());
        assert_eq!(d.method, Method::Delete);
    }

    #[test]
    fn test_single_sets_accept() {
        let d = descriptor(client().from::<Value>("users").select("*").single());
        assert_eq!(d.headers[header::ACCEPT], SINGLE_OBJECT);
    }

    #[test]
    fn test_schema_is_inherited_and_overridable() {
        let client = Client::builder()
            .base_url("http://localhost:3000")
            .unwrap()
            .schema("tenant_a")
            .build()
            .unwrap();

        let d = descriptor(client.from::<Value>("users").select("*"));
        assert_eq!(d.schema, Some(HeaderValue::from_static("tenant_a")));
        assert_eq!(d.derive_headers()[ACCEPT_PROFILE], "tenant_a");

        let d = descriptor(client.from::<Value>("users").delete().schema("tenant_b"));
        assert_eq!(d.derive_headers()[CONTENT_PROFILE], "tenant_b");
    }

    #[test]
    fn test_invalid_schema_surfaces_when_built() {
        let result = client()
            .from::<Value>("users")
            .select("*")
            .schema("tenant\na")
            .into_descriptor();
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let result = client()
            .from::<Value>("users")
            .select("*")
            .range(5, 2)
            .into_descriptor();
        assert!(matches!(result, Err(Error::ConfigurationError(_))));

        let d = descriptor(client().from::<Value>("users").select("*").range(3, 3));
        assert_eq!(d.url.query(), Some("select=*&offset=3&limit=1"));
    }

    #[test]
    fn test_invalid_header_surfaces_when_built() {
        let result = client()
            .from::<Value>("users")
            .select("*")
            .header("bad header", "x")
            .into_descriptor();
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_unserializable_body_surfaces_when_built() {
        use std::collections::HashMap;

        // Non-string map keys cannot become JSON object keys.
        let mut values = HashMap::new();
        values.insert((1, 2), "x");
        let result = client().from::<Value>("pairs").insert(&values).into_descriptor();
        assert!(matches!(result, Err(Error::SerializationFailed(_))));
    }

    #[test]
    fn test_client_headers_are_read_when_built() {
        let client = client();
        let pending = client.from::<Value>("users").select("*");

        client.auth("late-token").unwrap();

        let d = descriptor(pending);
        assert_eq!(d.headers[header::AUTHORIZATION], "Bearer late-token");
    }

    #[test]
    fn test_chain_headers_override_client_headers() {
        let client = client();
        client.set_header("x-client-info", "base").unwrap();

        let d = descriptor(
            client
                .from::<Value>("users")
                .select("*")
                .header("x-client-info", "override"),
        );
        assert_eq!(d.headers["x-client-info"], "override");
    }
}
