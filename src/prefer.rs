//! The `Prefer` request header and the `Content-Range` response header.
//!
//! Builders write `Prefer` tokens; the execution engine only reads them.

use http::HeaderMap;
use std::fmt;

/// Server-side strategy for counting the rows matched by a request.
///
/// Requested with `Prefer: count=<algorithm>` and reported back as the total
/// in `Content-Range` (`0-9/42`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Count {
    /// Accurate `count(*)`; can be slow on large tables.
    Exact,
    /// The query planner's estimate.
    Planned,
    /// Exact below the server's `db-max-rows`, planned above it.
    Estimated,
}

impl Count {
    const ALL: [Count; 3] = [Count::Exact, Count::Planned, Count::Estimated];

    /// The algorithm name as it appears in the `Prefer` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Count::Exact => "exact",
            Count::Planned => "planned",
            Count::Estimated => "estimated",
        }
    }

    fn token(&self) -> String {
        format!("count={}", self.as_str())
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a mutating request should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Returning {
    /// Return the affected rows.
    #[default]
    Representation,
    /// Return no body.
    Minimal,
}

impl Returning {
    /// The `Prefer` token for this choice.
    pub fn token(&self) -> &'static str {
        match self {
            Returning::Representation => "return=representation",
            Returning::Minimal => "return=minimal",
        }
    }
}

pub(crate) const RETURN_MINIMAL: &str = "return=minimal";

/// An ordered set of `Prefer` tokens.
///
/// Tokens sharing a key (`count`, `return`, `resolution`) replace each other,
/// so the last call on a builder wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Preferences {
    tokens: Vec<String>,
}

impl Preferences {
    pub(crate) fn set(&mut self, token: impl Into<String>) {
        let token = token.into();
        let key = token_key(&token).to_string();
        self.tokens.retain(|t| token_key(t) != key);
        self.tokens.push(token);
    }

    pub(crate) fn set_count(&mut self, count: Count) {
        self.set(count.token());
    }

    pub(crate) fn set_returning(&mut self, returning: Returning) {
        self.set(returning.token());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The comma separated header value.
    pub(crate) fn header_value(&self) -> String {
        self.tokens.join(",")
    }
}

fn token_key(token: &str) -> &str {
    token.split_once('=').map_or(token, |(key, _)| key).trim()
}

/// Iterates over every token of every `Prefer` header in `headers`.
fn prefer_tokens(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    headers
        .get_all(http::header::HeaderName::from_static("prefer"))
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
}

/// Returns `true` if the request asked the server to omit the response body.
pub fn is_return_minimal(headers: &HeaderMap) -> bool {
    prefer_tokens(headers).any(|token| token == RETURN_MINIMAL)
}

/// Returns the count algorithm requested in `Prefer`, if any.
///
/// # Examples
///
/// ```
/// use http::HeaderMap;
/// use pgrest::prefer::{requested_count, Count};
///
/// let mut headers = HeaderMap::new();
/// headers.insert("prefer", "return=representation,count=planned".parse().unwrap());
/// assert_eq!(requested_count(&headers), Some(Count::Planned));
/// ```
pub fn requested_count(headers: &HeaderMap) -> Option<Count> {
    prefer_tokens(headers).find_map(|token| {
        Count::ALL
            .into_iter()
            .find(|count| token == count.token())
    })
}

/// Extracts the total from a `Content-Range` value such as `0-9/42`.
///
/// Returns `None` when there is no `/`, or when the total is not a
/// non-negative integer (PostgREST sends `*` when it did not count).
///
/// # Examples
///
/// ```
/// use pgrest::prefer::content_range_total;
///
/// assert_eq!(content_range_total("0-9/42"), Some(42));
/// assert_eq!(content_range_total("*/0"), Some(0));
/// assert_eq!(content_range_total("0-9/*"), None);
/// assert_eq!(content_range_total("0-9"), None);
/// ```
pub fn content_range_total(content_range: &str) -> Option<u64> {
    let mut segments = content_range.split('/');
    segments.next()?;
    segments.next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn prefer(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("prefer", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_return_minimal_detection() {
        assert!(is_return_minimal(&prefer("return=minimal")));
        assert!(is_return_minimal(&prefer("count=exact,return=minimal")));
        assert!(is_return_minimal(&prefer("count=exact, return=minimal")));
        assert!(!is_return_minimal(&prefer("return=representation")));
        assert!(!is_return_minimal(&HeaderMap::new()));
    }

    #[test]
    fn test_requested_count() {
        assert_eq!(requested_count(&prefer("count=exact")), Some(Count::Exact));
        assert_eq!(
            requested_count(&prefer("return=minimal,count=estimated")),
            Some(Count::Estimated)
        );
        assert_eq!(requested_count(&prefer("count=bogus")), None);
        assert_eq!(requested_count(&prefer("return=minimal")), None);
        assert_eq!(requested_count(&HeaderMap::new()), None);
    }

    #[test]
    fn test_requested_count_across_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append("prefer", HeaderValue::from_static("return=minimal"));
        headers.append("prefer", HeaderValue::from_static("count=exact"));
        assert_eq!(requested_count(&headers), Some(Count::Exact));
        assert!(is_return_minimal(&headers));
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total("0-9/42"), Some(42));
        assert_eq!(content_range_total("0-0/1"), Some(1));
        assert_eq!(content_range_total("0-9/*"), None);
        assert_eq!(content_range_total("0-9/-3"), None);
        assert_eq!(content_range_total("garbage"), None);
        assert_eq!(content_range_total(""), None);
    }

    #[test]
    fn test_preferences_replace_same_key() {
        let mut prefs = Preferences::default();
        prefs.set_returning(Returning::Representation);
        prefs.set_count(Count::Exact);
        prefs.set_count(Count::Planned);
        prefs.set_returning(Returning::Minimal);
        assert_eq!(prefs.header_value(), "count=planned,return=minimal");
    }

    #[test]
    fn test_preferences_keep_distinct_keys() {
        let mut prefs = Preferences::default();
        assert!(prefs.is_empty());
        prefs.set("resolution=merge-duplicates");
        prefs.set_returning(Returning::Representation);
        assert_eq!(
            prefs.header_value(),
            "resolution=merge-duplicates,return=representation"
        );
    }
}
