//! Filter objects and their serialized form
//!
//! A filter serializes to [`QueryParams`], an ordered map of wire keys to
//! values. Ordering by key makes the serialized form independent of the order
//! fields were set in, which is what lets two equal filters share one cache
//! key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Default page size when a filter does not specify one
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Serialized filter: wire key to wire value
///
/// Empty values are never stored, so an absent or blank filter field can not
/// produce a dangling `key=`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryParams {
    pairs: BTreeMap<String, String>,
}

impl QueryParams {
    /// Empty parameter set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar value; blank values are skipped
    pub fn push(&mut self, key: impl Into<String>, value: impl fmt::Display) -> &mut Self {
        let value = value.to_string();
        if !value.trim().is_empty() {
            self.pairs.insert(key.into(), value);
        }
        self
    }

    /// Set a value if present
    pub fn push_opt<V: fmt::Display>(
        &mut self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(v) = value {
            self.push(key, v);
        }
        self
    }

    /// Set an array value, joined with `,`; empty arrays are skipped
    pub fn push_list<I, V>(&mut self, key: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: fmt::Display,
    {
        let joined = values
            .into_iter()
            .map(|v| v.to_string())
            .filter(|v| !v.trim().is_empty())
            .collect::<Vec<_>>()
            .join(",");
        self.push(key, joined)
    }

    /// Builder-style [`push`](Self::push)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.push(key, value);
        self
    }

    /// Look up a value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    /// Iterate pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no key is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: fmt::Display> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.push(k, v);
        }
        params
    }
}

/// Page selection (1-based)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, 1-based
    pub page: Option<u32>,
    /// Items per page
    pub per_page: Option<u32>,
}

impl PageRequest {
    /// Request a specific page
    #[inline]
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub(crate) fn write(&self, params: &mut QueryParams) {
        params.push_opt("page", self.page);
        params.push_opt("per_page", self.per_page);
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Asc,
    /// Largest first
    Desc,
}

impl SortDirection {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Sort field and direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    /// Wire field name (snake_case)
    pub field: String,
    /// Direction
    pub direction: SortDirection,
}

impl SortSpec {
    /// Ascending sort on field
    #[inline]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending sort on field
    #[inline]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    pub(crate) fn write(spec: Option<&Self>, params: &mut QueryParams) {
        if let Some(spec) = spec {
            params.push("sort_by", &spec.field);
            params.push("sort_order", spec.direction.as_str());
        }
    }
}

/// Comparable projection of a record field, used when sorting fixtures
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Compared case-insensitively
    Text(String),
    /// Numeric value
    Number(f64),
    /// Timestamp
    Time(DateTime<Utc>),
}

impl SortKey {
    /// Total order over keys of the same kind; mixed kinds compare equal
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Inclusive numeric bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    /// Lower bound (inclusive)
    pub min: Option<f64>,
    /// Upper bound (inclusive)
    pub max: Option<f64>,
}

impl NumericRange {
    /// Range between two inclusive bounds
    #[inline]
    #[must_use]
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Check a value against both bounds
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    pub(crate) fn write(&self, prefix: &str, params: &mut QueryParams) {
        params.push_opt(format!("{prefix}_min"), self.min);
        params.push_opt(format!("{prefix}_max"), self.max);
    }
}

/// Server list envelope shared by every list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    /// Items on this page
    pub data: Vec<T>,
    /// Matching items across all pages
    pub total: u64,
    /// Current page, 1-based
    pub page: u32,
    /// Page size
    pub per_page: u32,
    /// Number of pages
    pub total_pages: u32,
}

impl<T> ListResponse<T> {
    /// Slice an already-filtered result set the way the server pages it
    #[must_use]
    pub fn paginate(matching: Vec<T>, request: PageRequest) -> Self {
        let total = matching.len();
        let per_page = request.per_page.unwrap_or(DEFAULT_PER_PAGE).max(1);
        let page = request.page.unwrap_or(1).max(1);
        let per = per_page as usize;
        let start = (page as usize - 1).saturating_mul(per);
        let data: Vec<T> = matching.into_iter().skip(start).take(per).collect();
        let total_pages = u32::try_from(total.div_ceil(per)).unwrap_or(u32::MAX);

        Self {
            data,
            total: total as u64,
            page,
            per_page,
            total_pages,
        }
    }

    /// Empty first page
    #[must_use]
    pub fn empty() -> Self {
        Self::paginate(Vec::new(), PageRequest::default())
    }

    /// Number of items on this page
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when this page has no items
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A resource's filter object
///
/// Serializes to query parameters for the server and evaluates the same
/// predicates locally for the fixture data source.
pub trait ResourceFilter<T>: Default + Clone + fmt::Debug + Send + Sync + 'static {
    /// Wire form of every present field
    fn query_params(&self) -> QueryParams;

    /// Whether a record passes every present predicate
    fn matches(&self, record: &T) -> bool;

    /// Requested page
    fn page(&self) -> PageRequest;

    /// Requested ordering
    fn sort(&self) -> Option<&SortSpec>;
}

/// Case-insensitive substring match over several fields
pub(crate) fn text_matches(search: Option<&str>, fields: &[&str]) -> bool {
    let Some(needle) = search.map(str::trim).filter(|s| !s.is_empty()) else {
        return true;
    };
    let needle = needle.to_lowercase();
    fields.iter().any(|f| f.to_lowercase().contains(&needle))
}

/// Enum membership; an empty facet accepts everything
pub(crate) fn facet_matches<T: PartialEq>(facet: &[T], value: &T) -> bool {
    facet.is_empty() || facet.contains(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_skip_blank_values() {
        let mut params = QueryParams::new();
        params.push("search", "").push("status", "  ").push_opt::<u32>("page", None);
        params.push_list("severity", Vec::<String>::new());
        assert!(params.is_empty());
    }

    #[test]
    fn query_params_join_lists() {
        let mut params = QueryParams::new();
        params.push_list("severity", ["critical", "high"]);
        assert_eq!(params.get("severity"), Some("critical,high"));
    }

    #[test]
    fn query_params_order_independent() {
        let a: QueryParams = [("b", "2"), ("a", "1")].into_iter().collect();
        let b: QueryParams = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn numeric_range_inclusive() {
        let range = NumericRange::between(5.0, 8.0);
        assert!(range.contains(5.0));
        assert!(range.contains(8.0));
        assert!(!range.contains(8.01));
        assert!(NumericRange::default().contains(-1.0));
    }

    #[test]
    fn paginate_slices_and_counts() {
        let page = ListResponse::paginate((1..=7).collect(), PageRequest::new(2, 3));
        assert_eq!(page.data, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages, 3);

        let past_end = ListResponse::paginate((1..=7).collect::<Vec<_>>(), PageRequest::new(9, 3));
        assert!(past_end.is_empty());
        assert_eq!(past_end.total, 7);
    }

    #[test]
    fn paginate_defaults() {
        let page = ListResponse::paginate(vec!["a"], PageRequest::default());
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, DEFAULT_PER_PAGE);
        assert_eq!(page.total_pages, 1);
        assert_eq!(ListResponse::<u8>::empty().total_pages, 0);
    }

    #[test]
    fn text_match_is_case_insensitive() {
        assert!(text_matches(Some("BANK"), &["Core Banking"]));
        assert!(!text_matches(Some("bank"), &["Web Frontend"]));
        assert!(text_matches(None, &["anything"]));
        assert!(text_matches(Some("  "), &["anything"]));
    }

    #[test]
    fn sort_key_compare() {
        assert_eq!(
            SortKey::Text("alpha".into()).compare(&SortKey::Text("Beta".into())),
            Ordering::Less
        );
        assert_eq!(
            SortKey::Number(9.0).compare(&SortKey::Number(1.5)),
            Ordering::Greater
        );
    }
}
