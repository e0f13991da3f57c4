//! Query parameters for Strapi REST requests.
//!
//! Strapi reads nested parameters in `qs` bracket notation:
//!
//! ```text
//! sort=id:desc&pagination[start]=0&pagination[limit]=25&filters[slug][$eq]=hello
//! ```
//!
//! [`QueryParams`] stores them as a tree keyed by `BTreeMap`, so flattening is
//! deterministic no matter in which order parameters were inserted. That
//! matters because the flattened form feeds the cache key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Reserved key for sort expressions (`field:asc|desc`).
pub const SORT: &str = "sort";
/// Reserved key for pagination (`start`/`limit` or `page`/`pageSize`).
pub const PAGINATION: &str = "pagination";
/// Reserved key for filters.
pub const FILTERS: &str = "filters";
/// Reserved key for relation population.
pub const POPULATE: &str = "populate";

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Plain value, e.g. `sort=title:asc`.
    Scalar(String),
    /// Indexed values, flattened as `key[0]=a&key[1]=b`.
    List(Vec<QueryValue>),
    /// Nested values, flattened as `key[sub]=v`.
    Map(BTreeMap<String, QueryValue>),
}

impl QueryValue {
    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        match self {
            Self::Scalar(value) => out.push((prefix.to_string(), value.clone())),
            Self::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    item.flatten_into(&format!("{prefix}[{index}]"), out);
                }
            },
            Self::Map(entries) => {
                for (key, item) in entries {
                    item.flatten_into(&format!("{prefix}[{key}]"), out);
                }
            },
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<u64> for QueryValue {
    fn from(value: u64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl<T: Into<Self>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Self>> for QueryValue {
    fn from(values: BTreeMap<String, Self>) -> Self {
        Self::Map(values)
    }
}

/// One filter condition, encoded as `filters[<field>][<operator>]=<value>`.
///
/// ```rust
/// use strapi_cache_core::{Filter, QueryParams};
///
/// let params = QueryParams::new()
///     .with_filter(Filter::eq("slug", "hello-world"))
///     .with_filter(Filter::new("views", "$gte", "10"));
///
/// assert_eq!(
///     params.canonical(),
///     "filters%5Bslug%5D%5B%24eq%5D=hello-world&filters%5Bviews%5D%5B%24gte%5D=10"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    field: String,
    operator: String,
    value: QueryValue,
}

impl Filter {
    /// Condition with an explicit Strapi operator (`$eq`, `$contains`, `$in`, ...).
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<QueryValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Equality condition.
    pub fn eq(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        Self::new(field, "$eq", value)
    }
}

/// Ordered query parameters for a CMS request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, QueryValue>);

impl QueryParams {
    /// Empty parameter set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Set a top-level parameter, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder form of [`QueryParams::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a parameter addressed in bracket notation, e.g.
    /// `pagination[limit]` or `filters[title][$contains]`.
    ///
    /// Intermediate maps are created as needed; a scalar standing where a map
    /// is required gets replaced.
    pub fn insert_path(&mut self, path: &str, value: impl Into<QueryValue>) {
        let segments = split_path(path);
        let Some((first, rest)) = segments.split_first() else {
            return;
        };
        if rest.is_empty() {
            self.insert(first.clone(), value);
            return;
        }

        let slot = self
            .0
            .entry(first.clone())
            .or_insert_with(|| QueryValue::Map(BTreeMap::new()));
        insert_at(slot, rest, value.into());
    }

    /// Add a filter condition under `filters`.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        let path = format!("{FILTERS}[{}][{}]", filter.field, filter.operator);
        self.insert_path(&path, filter.value);
        self
    }

    /// Value stored under a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    /// Whether a top-level key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether no parameters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flatten into bracket-encoded `(name, value)` pairs, sorted by key.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, value) in &self.0 {
            value.flatten_into(key, &mut pairs);
        }
        pairs
    }

    /// URL-encoded query string. Deterministic for equal parameter sets.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.to_pairs() {
            serializer.append_pair(&key, &value);
        }
        serializer.finish()
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert_path(&key.into(), value);
        }
        params
    }
}

fn insert_at(slot: &mut QueryValue, segments: &[String], value: QueryValue) {
    if !matches!(slot, QueryValue::Map(_)) {
        *slot = QueryValue::Map(BTreeMap::new());
    }
    let QueryValue::Map(map) = slot else {
        return;
    };
    match segments {
        [] => {},
        [last] => {
            map.insert(last.clone(), value);
        },
        [next, rest @ ..] => {
            let child = map
                .entry(next.clone())
                .or_insert_with(|| QueryValue::Map(BTreeMap::new()));
            insert_at(child, rest, value);
        },
    }
}

fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let (head, mut rest) = path.find('[').map_or((path, ""), |i| path.split_at(i));
    if head.is_empty() {
        return segments;
    }
    segments.push(head.to_string());
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(end) = stripped.find(']') else {
            // Unbalanced bracket: keep the remainder verbatim as one segment.
            segments.push(stripped.to_string());
            break;
        };
        segments.push(stripped[..end].to_string());
        rest = &stripped[end + 1..];
    }
    segments
}
