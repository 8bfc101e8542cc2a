//! Query building: filter operators, wire parameter rendering, and the
//! lazy [`QuerySet`].
//!
//! Filters follow the `field__operator` query-string convention of the
//! remote collection endpoints. Values that look like resource URIs are
//! normalized to raw primary keys before transmission, because the wire
//! filter language expects ids, not URIs, for foreign-key filters.
//!
//! The wire protocol does not honor a literal empty `in` set, so an `In`
//! filter over an empty list marks the whole query *impossible*: it is
//! guaranteed to match zero records and executes without a network call.

use crate::backend::CacheBackend;
use crate::entity::EntityProxy;
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::uri;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;

/// Filter operator, rendered as a `__operator` suffix on the field name.
///
/// `Exact` renders as the bare field name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Exact,
    Iexact,
    Contains,
    Icontains,
    Startswith,
    Endswith,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    Isnull,
}

impl Op {
    /// Query-string suffix for this operator.
    pub fn suffix(&self) -> &'static str {
        match self {
            Op::Exact => "",
            Op::Iexact => "__iexact",
            Op::Contains => "__contains",
            Op::Icontains => "__icontains",
            Op::Startswith => "__startswith",
            Op::Endswith => "__endswith",
            Op::In => "__in",
            Op::Gt => "__gt",
            Op::Gte => "__gte",
            Op::Lt => "__lt",
            Op::Lte => "__lte",
            Op::Isnull => "__isnull",
        }
    }
}

/// A filter value, normalized before transmission.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Render the wire form of this value. Strings shaped like resource
    /// URIs are reduced to their primary key; lists render comma-joined.
    pub fn render(&self) -> String {
        match self {
            FilterValue::Str(s) => {
                if uri::looks_like_uri(s) {
                    // Renders the raw pk when the URI parses, the string
                    // itself otherwise.
                    uri::parse_pk(s).unwrap_or_else(|_| s.clone())
                } else {
                    s.clone()
                }
            }
            FilterValue::Int(i) => i.to_string(),
            FilterValue::Float(x) => x.to_string(),
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::List(items) => items
                .iter()
                .map(FilterValue::render)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    fn is_empty_list(&self) -> bool {
        matches!(self, FilterValue::List(items) if items.is_empty())
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Str(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Str(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        FilterValue::Int(v as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Float(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        FilterValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<&Value> for FilterValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Bool(b) => FilterValue::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(FilterValue::Int)
                .unwrap_or_else(|| FilterValue::Float(n.as_f64().unwrap_or(0.0))),
            Value::String(s) => FilterValue::Str(s.clone()),
            other => FilterValue::Str(other.to_string()),
        }
    }
}

/// An ordered set of rendered filter parameters.
///
/// Parameters are kept sorted so the same criteria always render the same
/// query string (and therefore the same response cache key).
#[derive(Clone, Debug, Default)]
pub struct Query {
    params: BTreeMap<String, String>,
    impossible: bool,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    /// Add one filter criterion.
    pub fn filter(mut self, field: &str, op: Op, value: impl Into<FilterValue>) -> Self {
        let value = value.into();

        if op == Op::In && value.is_empty_list() {
            // Empty membership: nothing can match, and the wire protocol
            // would misread a literal empty `in`.
            self.impossible = true;
            return self;
        }

        self.params
            .insert(format!("{}{}", field, op.suffix()), value.render());
        self
    }

    /// Merge another query's criteria into this one (other wins on
    /// conflicting keys).
    pub fn merge(mut self, other: &Query) -> Self {
        self.impossible = self.impossible || other.impossible;
        for (k, v) in &other.params {
            self.params.insert(k.clone(), v.clone());
        }
        self
    }

    /// Whether this query is guaranteed to match zero records.
    pub fn is_impossible(&self) -> bool {
        self.impossible
    }

    /// Whether a rendered parameter key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Rendered parameters in deterministic order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Lazy, composable query against one resource collection.
///
/// Nothing touches the network until `fetch`, `get`, `count`, `first` or
/// `exists` runs; `filter` and `order_by` refine and return a new set.
#[derive(Clone)]
pub struct QuerySet<B: CacheBackend> {
    manager: Manager<B>,
    query: Query,
    ordering: Option<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl<B: CacheBackend> QuerySet<B> {
    pub(crate) fn new(manager: Manager<B>, query: Query) -> Self {
        QuerySet {
            manager,
            query,
            ordering: None,
            limit: None,
            offset: None,
        }
    }

    /// Refine with one more criterion.
    pub fn filter(mut self, field: &str, op: Op, value: impl Into<FilterValue>) -> Self {
        self.query = self.query.filter(field, op, value);
        self
    }

    /// Order results by a field (`-field` for descending).
    pub fn order_by(mut self, field: &str) -> Self {
        self.ordering = Some(field.to_string());
        self
    }

    /// Limit the number of returned records.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` records.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The accumulated query.
    pub fn query(&self) -> &Query {
        &self.query
    }

    fn list_url(&self, extra: &[(&str, String)]) -> String {
        let base = self
            .manager
            .client()
            .collection_url(self.manager.resource_name());

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in self.query.params() {
            serializer.append_pair(k, v);
        }
        if let Some(ordering) = &self.ordering {
            serializer.append_pair("order_by", ordering);
        }
        if let Some(limit) = self.limit {
            serializer.append_pair("limit", &limit.to_string());
        }
        if let Some(offset) = self.offset {
            serializer.append_pair("offset", &offset.to_string());
        }
        for (k, v) in extra {
            serializer.append_pair(k, v);
        }
        let encoded = serializer.finish();

        if encoded.is_empty() {
            base
        } else {
            format!("{}?{}", base, encoded)
        }
    }

    /// Execute the query and wrap every matched record.
    ///
    /// An impossible query returns an empty result set without touching
    /// the network.
    pub async fn fetch(&self) -> Result<Vec<EntityProxy<B>>> {
        if self.query.is_impossible() {
            return Ok(Vec::new());
        }

        let url = self.list_url(&[]);
        let value = self
            .manager
            .client()
            .request(Method::GET, &url, None)
            .await?;

        let objects = value
            .get("objects")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| {
                Error::DeserializationError(format!(
                    "List endpoint returned no \"objects\" array ({})",
                    url
                ))
            })?;

        objects
            .into_iter()
            .map(|object| self.manager.wrap(object))
            .collect()
    }

    /// Total number of matching records, from the list endpoint's
    /// `meta.total_count`.
    pub async fn count(&self) -> Result<u64> {
        if self.query.is_impossible() {
            return Ok(0);
        }

        let url = self.list_url(&[("limit", "1".to_string())]);
        let value = self
            .manager
            .client()
            .request(Method::GET, &url, None)
            .await?;

        if let Some(total) = value
            .pointer("/meta/total_count")
            .and_then(Value::as_u64)
        {
            return Ok(total);
        }

        // Older endpoints without a meta block.
        Ok(value
            .get("objects")
            .and_then(Value::as_array)
            .map(|objects| objects.len() as u64)
            .unwrap_or(0))
    }

    /// The single matching record.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` when no record matches, `Error::MultipleObjects`
    /// when more than one does.
    pub async fn get(&self) -> Result<EntityProxy<B>> {
        if self.query.is_impossible() {
            return Err(Error::NotFound(format!(
                "No {} matches an impossible query",
                self.manager.resource_name()
            )));
        }

        let mut matches = self.fetch().await?;
        match matches.len() {
            0 => Err(Error::NotFound(format!(
                "No {} matches the given query",
                self.manager.resource_name()
            ))),
            1 => Ok(matches.remove(0)),
            n => Err(Error::MultipleObjects(format!(
                "{} {} records match the given query",
                n,
                self.manager.resource_name()
            ))),
        }
    }

    /// The first matching record, if any.
    pub async fn first(&self) -> Result<Option<EntityProxy<B>>> {
        let mut matches = self.clone().limit(1).fetch().await?;
        if matches.is_empty() {
            Ok(None)
        } else {
            Ok(Some(matches.remove(0)))
        }
    }

    /// Whether any record matches.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.count().await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_suffixes() {
        assert_eq!(Op::Exact.suffix(), "");
        assert_eq!(Op::Startswith.suffix(), "__startswith");
        assert_eq!(Op::In.suffix(), "__in");
    }

    #[test]
    fn test_filter_value_render_scalar() {
        assert_eq!(FilterValue::from("abc").render(), "abc");
        assert_eq!(FilterValue::from(42).render(), "42");
        assert_eq!(FilterValue::from(true).render(), "true");
    }

    #[test]
    fn test_filter_value_normalizes_resource_uri() {
        let value = FilterValue::from("/api/v1/core/item/7/");
        assert_eq!(value.render(), "7");
    }

    #[test]
    fn test_filter_value_render_list() {
        let value = FilterValue::from(vec![1, 2, 3]);
        assert_eq!(value.render(), "1,2,3");
    }

    #[test]
    fn test_filter_value_list_of_uris() {
        let value = FilterValue::from(vec!["/api/v1/item/1/", "/api/v1/item/2/"]);
        assert_eq!(value.render(), "1,2");
    }

    #[test]
    fn test_query_renders_operator_keys() {
        let query = Query::new()
            .filter("source_item_id", Op::Startswith, "t-")
            .filter("item_type", Op::Exact, 0);

        let params: Vec<_> = query.params().collect();
        assert_eq!(
            params,
            vec![
                ("item_type", "0"),
                ("source_item_id__startswith", "t-"),
            ]
        );
    }

    #[test]
    fn test_query_empty_in_is_impossible() {
        let query = Query::new().filter("id", Op::In, Vec::<i64>::new());
        assert!(query.is_impossible());
        assert!(query.is_empty());
    }

    #[test]
    fn test_query_nonempty_in_is_possible() {
        let query = Query::new().filter("id", Op::In, vec![1, 2]);
        assert!(!query.is_impossible());
        assert!(query.contains_key("id__in"));
    }

    #[test]
    fn test_query_merge_prefers_other() {
        let base = Query::new().filter("id", Op::In, vec![1]);
        let other = Query::new().filter("id", Op::In, vec![2, 3]);
        let merged = base.merge(&other);

        let params: Vec<_> = merged.params().collect();
        assert_eq!(params, vec![("id__in", "2,3")]);
    }

    #[test]
    fn test_query_merge_carries_impossibility() {
        let base = Query::new();
        let other = Query::new().filter("id", Op::In, Vec::<i64>::new());
        assert!(base.merge(&other).is_impossible());
    }
}
