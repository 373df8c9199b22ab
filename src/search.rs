//! # Search Connector Boundary
//!
//! The core never talks wire protocols; it hands a [`QueryRequest`] to a
//! [`SearchConnector`] implementation and consumes ranked ids or facet
//! counts. Concrete Solr/Elasticsearch connectors live outside this crate;
//! tests use deterministic in-memory implementations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::query::Query;

/// Ordered document ids returned for one query execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResultSet {
    ids: Vec<String>,
}

impl SearchResultSet {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Facet counts for one field over some document population.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetResult {
    total_docs: u64,
    facet_counts: BTreeMap<String, u64>,
}

impl FacetResult {
    pub fn new(total_docs: u64, facet_counts: BTreeMap<String, u64>) -> Self {
        Self {
            total_docs,
            facet_counts,
        }
    }

    pub fn total_docs(&self) -> u64 {
        self.total_docs
    }

    pub fn facet_counts(&self) -> &BTreeMap<String, u64> {
        &self.facet_counts
    }

    pub fn count(&self, value: &str) -> u64 {
        self.facet_counts.get(value).copied().unwrap_or(0)
    }
}

/// Everything a connector needs to run one search or facet call.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    query: Query,
    fields_to_retrieve: Vec<String>,
    filter_queries: Vec<Query>,
    num_results: usize,
    facet_field: Option<String>,
    facet_limit: usize,
}

impl QueryRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            fields_to_retrieve: Vec::new(),
            filter_queries: Vec::new(),
            num_results: 10,
            facet_field: None,
            facet_limit: 100,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn add_field_to_retrieve(&mut self, field: &str) {
        self.fields_to_retrieve.push(field.to_string());
    }

    pub fn fields_to_retrieve(&self) -> &[String] {
        &self.fields_to_retrieve
    }

    pub fn add_filter_queries<I: IntoIterator<Item = Query>>(&mut self, queries: I) {
        self.filter_queries.extend(queries);
    }

    pub fn filter_queries(&self) -> &[Query] {
        &self.filter_queries
    }

    /// `0` means counts only: the connector must return no documents.
    pub fn set_num_results(&mut self, num_results: usize) {
        self.num_results = num_results;
    }

    pub fn num_results(&self) -> usize {
        self.num_results
    }

    pub fn set_facet_field(&mut self, field: &str) {
        self.facet_field = Some(field.to_string());
    }

    pub fn facet_field(&self) -> Option<&str> {
        self.facet_field.as_deref()
    }

    pub fn set_facet_limit(&mut self, limit: usize) {
        self.facet_limit = limit;
    }

    pub fn facet_limit(&self) -> usize {
        self.facet_limit
    }
}

/// Executes queries against a concrete search engine.
///
/// Implementations distinguish two failure classes: a per-query problem
/// (timeout, bad query) surfaces as [`crate::error::TuneError::Evaluation`]
/// and is absorbed by the optimizer as a sentinel score; an unreachable or
/// misbehaving server surfaces as [`crate::error::TuneError::Search`] and
/// aborts the run.
pub trait SearchConnector: Send + Sync {
    /// Runs the query and returns ranked document ids.
    fn execute(&self, request: &QueryRequest) -> Result<SearchResultSet>;

    /// Returns facet counts for `request.facet_field()` over the matching
    /// documents. A `num_results` of 0 requests counts without documents.
    fn facet(&self, request: &QueryRequest) -> Result<FacetResult>;

    /// The engine's document-id field name.
    fn default_id_field(&self) -> &str;
}

impl<C: SearchConnector + ?Sized> SearchConnector for Box<C> {
    fn execute(&self, request: &QueryRequest) -> Result<SearchResultSet> {
        (**self).execute(request)
    }

    fn facet(&self, request: &QueryRequest) -> Result<FacetResult> {
        (**self).facet(request)
    }

    fn default_id_field(&self) -> &str {
        (**self).default_id_field()
    }
}
