//! # Judgment Model
//!
//! Human relevance judgments: per-query graded labels keyed by document id.
//! Judgments are loaded once per run and read-only thereafter.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Result, TuneError};

/// Named query strings for one judged query.
///
/// Most queries carry a single string under the conventional `query` name;
/// multi-field handlers may add further named strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryStrings {
    strings: BTreeMap<String, String>,
}

/// Conventional name of the primary query string.
pub const QUERY_STRING_NAME: &str = "query";

impl QueryStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(query: &str) -> Self {
        let mut qs = Self::default();
        qs.set_query(query);
        qs
    }

    pub fn set_query(&mut self, query: &str) {
        self.strings
            .insert(QUERY_STRING_NAME.to_string(), query.to_string());
    }

    pub fn query(&self) -> Option<&str> {
        self.strings.get(QUERY_STRING_NAME).map(String::as_str)
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.strings.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.strings.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Identity and importance of one judged query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryInfo {
    query_id: String,
    #[serde(default)]
    query_set: String,
    query_strings: QueryStrings,
    /// Frequency or importance weight for aggregate scoring.
    weight: f64,
}

impl QueryInfo {
    pub fn new(query_id: &str, query_set: &str, query_strings: QueryStrings, weight: f64) -> Self {
        Self {
            query_id: query_id.to_string(),
            query_set: query_set.to_string(),
            query_strings,
            weight,
        }
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn query_set(&self) -> &str {
        &self.query_set
    }

    pub fn query_strings(&self) -> &QueryStrings {
        &self.query_strings
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// Graded relevance judgments for one query, keyed by document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgments {
    query_info: QueryInfo,
    sorted_judgments: BTreeMap<String, f64>,
}

impl Judgments {
    pub fn new(query_info: QueryInfo) -> Self {
        Self {
            query_info,
            sorted_judgments: BTreeMap::new(),
        }
    }

    pub fn query_info(&self) -> &QueryInfo {
        &self.query_info
    }

    /// Records a graded judgment.
    ///
    /// # Errors
    ///
    /// Duplicate document ids and negative grades are data errors.
    pub fn add_judgment(&mut self, doc_id: &str, relevance: f64) -> Result<()> {
        if relevance < 0.0 || !relevance.is_finite() {
            return Err(TuneError::Judgment(format!(
                "relevance grade for '{}' must be a non-negative finite number, got {}",
                doc_id, relevance
            )));
        }
        match self.sorted_judgments.entry(doc_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(relevance);
                Ok(())
            }
            Entry::Occupied(_) => Err(TuneError::Judgment(format!(
                "duplicate judgment for document id '{}' in query '{}'",
                doc_id,
                self.query_info.query_id()
            ))),
        }
    }

    pub fn judgment(&self, doc_id: &str) -> Option<f64> {
        self.sorted_judgments.get(doc_id).copied()
    }

    pub fn contains_judgment(&self, doc_id: &str) -> bool {
        self.sorted_judgments.contains_key(doc_id)
    }

    pub fn judgment_count(&self) -> usize {
        self.sorted_judgments.len()
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &String> {
        self.sorted_judgments.keys()
    }

    pub fn sorted_judgments(&self) -> &BTreeMap<String, f64> {
        &self.sorted_judgments
    }
}

/// All judged queries for a run, one entry per distinct query id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgmentList {
    judgments: Vec<Judgments>,
}

impl JudgmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one query's judgments; a repeated query id replaces the
    /// previous entry.
    pub fn add(&mut self, judgments: Judgments) {
        let id = judgments.query_info().query_id().to_string();
        if let Some(existing) = self
            .judgments
            .iter_mut()
            .find(|j| j.query_info().query_id() == id)
        {
            *existing = judgments;
        } else {
            self.judgments.push(judgments);
        }
    }

    pub fn get(&self, query_id: &str) -> Option<&Judgments> {
        self.judgments
            .iter()
            .find(|j| j.query_info().query_id() == query_id)
    }

    pub fn judgments(&self) -> &[Judgments] {
        &self.judgments
    }

    pub fn len(&self) -> usize {
        self.judgments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.judgments.is_empty()
    }

    /// Union of all judged document ids across queries.
    pub fn all_doc_ids(&self) -> std::collections::BTreeSet<String> {
        self.judgments
            .iter()
            .flat_map(|j| j.doc_ids().cloned())
            .collect()
    }
}

/// One judged query as it appears in a judgments file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JudgmentsDocument {
    query_id: String,
    #[serde(default)]
    query_set: String,
    query: String,
    #[serde(default = "default_query_weight")]
    weight: f64,
    judgments: BTreeMap<String, f64>,
}

fn default_query_weight() -> f64 {
    1.0
}

/// Loads a judgments file: a JSON array of judged queries.
///
/// Judgments at or below `min_relevance` are silently dropped as noise;
/// malformed documents fail the whole load.
pub fn load_judgments<P: AsRef<Path>>(
    path: P,
    min_relevance: Option<f64>,
) -> Result<JudgmentList> {
    let file = File::open(path.as_ref())?;
    read_judgments(BufReader::new(file), min_relevance)
}

/// Reads judgments from any reader; see [`load_judgments`].
pub fn read_judgments<R: Read>(reader: R, min_relevance: Option<f64>) -> Result<JudgmentList> {
    let docs: Vec<JudgmentsDocument> = serde_json::from_reader(reader)
        .map_err(|e| TuneError::Judgment(format!("malformed judgments input: {}", e)))?;
    let floor = min_relevance.unwrap_or(f64::NEG_INFINITY);
    let mut list = JudgmentList::new();
    for doc in docs {
        let info = QueryInfo::new(
            &doc.query_id,
            &doc.query_set,
            QueryStrings::single(&doc.query),
            doc.weight,
        );
        if list.get(info.query_id()).is_some() {
            return Err(TuneError::Judgment(format!(
                "duplicate query id '{}' in judgments input",
                info.query_id()
            )));
        }
        let mut judgments = Judgments::new(info);
        for (doc_id, grade) in doc.judgments {
            if grade <= floor {
                continue;
            }
            judgments.add_judgment(&doc_id, grade)?;
        }
        list.add(judgments);
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Judgments {
        let mut j = Judgments::new(QueryInfo::new(
            "q1",
            "",
            QueryStrings::single("query1"),
            1.0,
        ));
        j.add_judgment("id1", 2.0).unwrap();
        j.add_judgment("id2", 4.0).unwrap();
        j.add_judgment("id5", 6.0).unwrap();
        j
    }

    #[test]
    fn duplicate_doc_id_is_a_data_error() {
        let mut j = sample();
        assert!(j.add_judgment("id1", 3.0).is_err());
    }

    #[test]
    fn negative_grade_is_a_data_error() {
        let mut j = sample();
        assert!(j.add_judgment("id9", -1.0).is_err());
    }

    #[test]
    fn list_replaces_repeated_query_ids() {
        let mut list = JudgmentList::new();
        list.add(sample());
        let mut replacement = Judgments::new(QueryInfo::new(
            "q1",
            "",
            QueryStrings::single("query1b"),
            1.0,
        ));
        replacement.add_judgment("id7", 1.0).unwrap();
        list.add(replacement);
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("q1").unwrap().judgment_count(), 1);
    }

    #[test]
    fn loader_applies_minimum_relevance_floor() {
        let raw = r#"[
            {"queryId": "q1", "query": "jaguar",
             "judgments": {"id1": 0.5, "id2": 4.0, "id3": 1.0}}
        ]"#;
        let list = read_judgments(raw.as_bytes(), Some(1.0)).unwrap();
        let j = list.get("q1").unwrap();
        assert_eq!(j.judgment_count(), 1);
        assert!(j.contains_judgment("id2"));
    }

    #[test]
    fn loader_rejects_malformed_input() {
        let raw = r#"[{"queryId": "q1"}]"#;
        assert!(read_judgments(raw.as_bytes(), None).is_err());
    }

    #[test]
    fn loader_keeps_query_weight() {
        let raw = r#"[
            {"queryId": "q1", "query": "jaguar", "weight": 3.0,
             "judgments": {"id1": 2.0}}
        ]"#;
        let list = read_judgments(raw.as_bytes(), None).unwrap();
        assert_eq!(list.get("q1").unwrap().query_info().weight(), 3.0);
    }
}
