//! # Contrast Analyzer
//!
//! Ranks index facet values by how well they separate the judged document
//! set (foreground) from the full collection (background), using the
//! chi-square statistic over a 2×2 contingency table per facet value.
//! Surfacing strongly contrasting field values tells a relevance engineer
//! which fields are worth boosting before any optimization runs.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use tracing::debug;

use crate::error::Result;
use crate::query::Query;
use crate::search::{FacetResult, QueryRequest, SearchConnector};

/// Cumulative id-length budget per term-lookup batch; caps request size for
/// connectors with URL/body limits.
pub const ID_BATCH_CHAR_BUDGET: usize = 1000;

/// Facet values requested per facet call.
const FACET_LIMIT: usize = 10_000;

/// How many contrast rows to report per field.
const REPORT_ROWS: usize = 10;

/// One facet value's contrast between foreground and background.
#[derive(Debug, Clone, PartialEq)]
pub struct ContrastResult {
    term: String,
    target_count: u64,
    target_total: u64,
    background_count: u64,
    background_total: u64,
    contrast_value: f64,
}

impl ContrastResult {
    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn target_count(&self) -> u64 {
        self.target_count
    }

    pub fn target_total(&self) -> u64 {
        self.target_total
    }

    pub fn background_count(&self) -> u64 {
        self.background_count
    }

    pub fn background_total(&self) -> u64 {
        self.background_total
    }

    pub fn contrast_value(&self) -> f64 {
        self.contrast_value
    }

    /// Descending contrast value, ties broken by term for determinism.
    fn ranking(&self, other: &Self) -> Ordering {
        other
            .contrast_value
            .total_cmp(&self.contrast_value)
            .then_with(|| self.term.cmp(&other.term))
    }
}

/// Pearson chi-square statistic for the 2×2 table
/// `[[a, b], [c, d]]`, without continuity correction.
pub fn chi_square(a: u64, b: u64, c: u64, d: u64) -> f64 {
    let (a, b, c, d) = (a as f64, b as f64, c as f64, d as f64);
    let n = a + b + c + d;
    let denominator = (a + b) * (c + d) * (a + c) * (b + d);
    if denominator == 0.0 {
        return 0.0;
    }
    let diff = a * d - b * c;
    n * diff * diff / denominator
}

/// Splits ids into batches whose cumulative character length stays within
/// `budget`. Every id lands in exactly one batch; an id longer than the
/// budget still gets its own batch.
pub fn batch_ids<'a, I: IntoIterator<Item = &'a String>>(
    ids: I,
    budget: usize,
) -> Vec<Vec<String>> {
    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut length = 0usize;
    for id in ids {
        if !current.is_empty() && length + id.len() > budget {
            batches.push(std::mem::take(&mut current));
            length = 0;
        }
        length += id.len();
        current.push(id.clone());
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Runs contrast analysis through a search connector.
pub struct FeatureContraster<'a, C: SearchConnector> {
    connector: &'a C,
    id_field: Option<String>,
}

impl<'a, C: SearchConnector> FeatureContraster<'a, C> {
    pub fn new(connector: &'a C) -> Self {
        Self {
            connector,
            id_field: None,
        }
    }

    /// Overrides the connector's default document-id field.
    pub fn with_id_field(connector: &'a C, id_field: Option<String>) -> Self {
        Self {
            connector,
            id_field,
        }
    }

    /// Compares facet-value distributions of the judged ids against the
    /// (optionally filtered) full collection for one field, ranked by
    /// descending chi-square.
    pub fn contrast_field(
        &self,
        facet_field: &str,
        foreground_ids: &BTreeSet<String>,
        filter_query: Option<&Query>,
    ) -> Result<Vec<ContrastResult>> {
        let foreground = self.foreground_facets(facet_field, foreground_ids, filter_query)?;
        let background = self.background_facets(facet_field, filter_query)?;

        let mut terms: BTreeSet<&str> =
            foreground.facet_counts().keys().map(String::as_str).collect();
        terms.extend(background.facet_counts().keys().map(String::as_str));

        let target_total = foreground.total_docs();
        let background_total = background.total_docs();
        let mut results = Vec::new();
        for term in terms {
            let a = foreground.count(term);
            let b = background.count(term);
            if a == 0 && b == 0 {
                continue;
            }
            let c = target_total.saturating_sub(a);
            let d = background_total.saturating_sub(b);
            // a zero foreground cell would trip the test's zero handling;
            // score it as no contrast directly
            let chi = if a == 0 { 0.0 } else { chi_square(a, b, c, d) };
            results.push(ContrastResult {
                term: term.to_string(),
                target_count: a,
                target_total,
                background_count: b,
                background_total,
                contrast_value: chi,
            });
        }
        results.sort_by(ContrastResult::ranking);
        Ok(results)
    }

    /// Facet counts over the judged document set, batched so no single
    /// term-lookup request exceeds the id-length budget.
    fn foreground_facets(
        &self,
        facet_field: &str,
        ids: &BTreeSet<String>,
        filter_query: Option<&Query>,
    ) -> Result<FacetResult> {
        let id_field = self
            .id_field
            .clone()
            .unwrap_or_else(|| self.connector.default_id_field().to_string());
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        let batches = batch_ids(ids, ID_BATCH_CHAR_BUDGET);
        debug!(
            field = facet_field,
            ids = ids.len(),
            batches = batches.len(),
            "faceting foreground"
        );
        for batch in batches {
            let mut request = QueryRequest::new(Query::Terms {
                field: id_field.clone(),
                terms: batch,
            });
            request.add_field_to_retrieve(&id_field);
            if let Some(fq) = filter_query {
                request.add_filter_queries(vec![fq.deep_copy()]);
            }
            request.set_facet_field(facet_field);
            request.set_facet_limit(FACET_LIMIT);
            request.set_num_results(0);
            let facets = self.connector.facet(&request)?;
            for (value, count) in facets.facet_counts() {
                *counts.entry(value.clone()).or_insert(0) += count;
            }
        }
        Ok(FacetResult::new(ids.len() as u64, counts))
    }

    fn background_facets(
        &self,
        facet_field: &str,
        filter_query: Option<&Query>,
    ) -> Result<FacetResult> {
        let mut request = QueryRequest::new(Query::MatchAll);
        request.add_field_to_retrieve(self.connector.default_id_field());
        if let Some(fq) = filter_query {
            request.add_filter_queries(vec![fq.deep_copy()]);
        }
        request.set_facet_field(facet_field);
        request.set_facet_limit(FACET_LIMIT);
        request.set_num_results(0);
        self.connector.facet(&request)
    }
}

/// Writes the top contrast rows for one field, percentages left blank when
/// the corresponding total is zero.
pub fn write_report<W: Write>(
    out: &mut W,
    field: &str,
    results: &[ContrastResult],
) -> std::io::Result<()> {
    writeln!(out, "{}:", field)?;
    for row in results.iter().take(REPORT_ROWS) {
        let target_percent = percent(row.target_count(), row.target_total());
        let background_percent = percent(row.background_count(), row.background_total());
        writeln!(out, "\tfacet_value={}", row.term())?;
        writeln!(out, "\t\ttargCount={}", row.target_count())?;
        writeln!(out, "\t\ttargTotal={}", row.target_total())?;
        writeln!(out, "\t\ttargPercent={}", target_percent)?;
        writeln!(out, "\t\tbackgroundCount={}", row.background_count())?;
        writeln!(out, "\t\tbackgroundTotal={}", row.background_total())?;
        writeln!(out, "\t\tbackgroundPercent={}", background_percent)?;
        writeln!(out, "\t\tcontrastValue={:.3}", row.contrast_value())?;
    }
    Ok(())
}

fn percent(count: u64, total: u64) -> String {
    if total == 0 {
        String::new()
    } else {
        format!("{:.2}%", (count as f64 / total as f64) * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chi_square_of_even_split_is_zero() {
        assert_eq!(chi_square(5, 5, 5, 5), 0.0);
    }

    #[test]
    fn chi_square_detects_contrast() {
        // foreground heavily concentrated on the term
        let strong = chi_square(90, 10, 10, 90);
        let weak = chi_square(55, 45, 45, 55);
        assert!(strong > weak);
        assert!(weak > 0.0);
    }

    #[test]
    fn chi_square_degenerate_table_is_zero() {
        assert_eq!(chi_square(0, 0, 10, 10), 0.0);
    }

    #[test]
    fn batching_covers_every_id_exactly_once() {
        let ids: Vec<String> = (0..500).map(|i| format!("doc-{:05}", i)).collect();
        let batches = batch_ids(&ids, ID_BATCH_CHAR_BUDGET);
        assert!(batches.len() > 1);
        let mut flattened: Vec<String> = batches.into_iter().flatten().collect();
        flattened.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(flattened, expected);
    }

    #[test]
    fn batches_respect_the_character_budget() {
        let ids: Vec<String> = (0..200).map(|i| format!("id{}", i)).collect();
        for batch in batch_ids(&ids, 50) {
            let length: usize = batch.iter().map(String::len).sum();
            assert!(length <= 50 || batch.len() == 1);
        }
    }

    #[test]
    fn oversized_id_still_gets_a_batch() {
        let long = "x".repeat(ID_BATCH_CHAR_BUDGET + 5);
        let ids = vec![long.clone(), "short".to_string()];
        let batches = batch_ids(&ids, ID_BATCH_CHAR_BUDGET);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().any(|b| b == &vec![long.clone()]));
    }

    #[test]
    fn percent_is_blank_for_zero_total() {
        assert_eq!(percent(3, 0), "");
        assert_eq!(percent(1, 4), "25.00%");
    }
}
