//! Upstream URL construction

use url::{form_urlencoded, Url};

/// Query value as received from the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// Sets the parameter, replacing earlier values
    One(String),
    /// Appended once per value
    Many(Vec<String>),
}

/// Ordered query parameters to copy onto an upstream URL.
///
/// A `None` value is dropped from the target URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyQuery {
    params: Vec<(String, Option<QueryValue>)>,
}

impl ProxyQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string. Repeated keys become `Many`, keeping the
    /// position of the first occurrence.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::new();
        let Some(raw) = raw else {
            return query;
        };

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let value = value.into_owned();
            match query.params.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => {
                    *slot = Some(match slot.take() {
                        Some(QueryValue::One(first)) => QueryValue::Many(vec![first, value]),
                        Some(QueryValue::Many(mut values)) => {
                            values.push(value);
                            QueryValue::Many(values)
                        }
                        None => QueryValue::One(value),
                    });
                }
                None => query
                    .params
                    .push((key.into_owned(), Some(QueryValue::One(value)))),
            }
        }
        query
    }

    pub fn one(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .push((key.into(), Some(QueryValue::One(value.into()))));
        self
    }

    pub fn many<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.params
            .push((key.into(), Some(QueryValue::Many(values))));
        self
    }

    pub fn absent(mut self, key: impl Into<String>) -> Self {
        self.params.push((key.into(), None));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&QueryValue>)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}

/// Ensure exactly one leading `/`
pub fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Resolve `path` against the upstream base and copy the query onto it.
///
/// The path replaces any path on the base URL. Dot segments are resolved, so
/// the returned URL's path is the one to check against an allowlist.
pub fn build_target_url(
    base: &Url,
    path: &str,
    query: &ProxyQuery,
) -> Result<Url, url::ParseError> {
    let mut url = base.join(&normalize_path(path))?;

    let mut pairs: Vec<(&str, &str)> = Vec::new();
    for (key, value) in query.iter() {
        match value {
            None => continue,
            Some(QueryValue::One(v)) => {
                pairs.retain(|(k, _)| *k != key);
                pairs.push((key, v));
            }
            Some(QueryValue::Many(values)) => {
                pairs.extend(values.iter().map(|v| (key, v.as_str())));
            }
        }
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    Ok(url)
}

/// Join a fixed upstream prefix and one caller-supplied path segment.
///
/// The segment is percent-encoded so it cannot add segments of its own.
pub fn with_segment(prefix: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        urlencoding::encode(segment)
    )
}
