use ranktune::experiment::{Experiment, ServerConnection};
use ranktune::features::WeightableField;
use ranktune::judgments::{Judgments, QueryInfo, QueryStrings};
use ranktune::query::{EDisMaxQuery, Query};
use ranktune::scorers::ScorerSpec;
use ranktune::store::ExperimentDB;

#[test]
fn store_round_trips_experiments_scorers_and_judgments() {
    let dir = tempfile::tempdir().unwrap();

    let mut qf_query = EDisMaxQuery::new("actualQuery");
    qf_query.qf_mut().add(WeightableField::parse("f1^2").unwrap());
    qf_query.qf_mut().add(WeightableField::parse("f2^5").unwrap());
    qf_query.qf_mut().add(WeightableField::parse("f3^10").unwrap());

    let mut experiment = Experiment::new(
        "test1",
        ServerConnection::new("http://solr"),
        Query::EDisMax(qf_query.clone()),
    );
    let filter_queries: Vec<Query> = ["fq1", "fq2"]
        .iter()
        .map(|fq| Query::Lucene {
            default_field: "defaultField".to_string(),
            query_string: fq.to_string(),
        })
        .collect();
    experiment.add_filter_queries(filter_queries.clone());

    {
        let mut db = ExperimentDB::open(dir.path()).unwrap();
        db.add_experiment(experiment).unwrap();
        for at_n in [1, 3, 5, 10] {
            db.add_scorer(ScorerSpec::new("atLeastOneAtN", at_n)).unwrap();
        }
        db.close().unwrap();
    }

    {
        let db = ExperimentDB::open(dir.path()).unwrap();
        let revivified = db.experiments().get("test1").expect("experiment survives");
        assert_eq!(revivified.name(), "test1");
        assert_eq!(revivified.server_connection().url(), "http://solr");
        assert_eq!(revivified.filter_queries(), filter_queries.as_slice());
        assert_eq!(db.scorers().len(), 4);

        // the query string is transient and not serialized
        let mut expected = Query::EDisMax(qf_query.clone()).deep_copy();
        expected.set_query_string("");
        assert_eq!(revivified.query(), expected);
    }

    {
        let mut db = ExperimentDB::open(dir.path()).unwrap();
        let mut query_strings = QueryStrings::new();
        query_strings.set_query("query1");
        let mut judgments =
            Judgments::new(QueryInfo::new("q1", "", query_strings, 1.0));
        judgments.add_judgment("id1", 2.0).unwrap();
        judgments.add_judgment("id2", 4.0).unwrap();
        judgments.add_judgment("id5", 6.0).unwrap();
        db.add_judgments(judgments).unwrap();
        db.close().unwrap();
    }

    let db = ExperimentDB::open(dir.path()).unwrap();
    let judgment_list = db.judgments();
    assert_eq!(judgment_list.len(), 1);
    let revivified = &judgment_list.judgments()[0];
    assert_eq!(revivified.query_info().query_id(), "q1");
    assert!((revivified.judgment("id2").unwrap() - 4.0).abs() < 0.01);
}

#[test]
fn adding_judgments_for_the_same_query_replaces_them() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = ExperimentDB::open(dir.path()).unwrap();

    let mut first = Judgments::new(QueryInfo::new(
        "q1",
        "",
        QueryStrings::single("query1"),
        1.0,
    ));
    first.add_judgment("id1", 1.0).unwrap();
    db.add_judgments(first).unwrap();

    let mut second = Judgments::new(QueryInfo::new(
        "q1",
        "",
        QueryStrings::single("query1"),
        1.0,
    ));
    second.add_judgment("id2", 2.0).unwrap();
    db.add_judgments(second).unwrap();

    assert_eq!(db.judgments().len(), 1);
    let stored = db.judgments().get("q1").unwrap();
    assert!(!stored.contains_judgment("id1"));
    assert!(stored.contains_judgment("id2"));
}

#[test]
fn reopening_an_empty_directory_yields_empty_collections() {
    let dir = tempfile::tempdir().unwrap();
    let db = ExperimentDB::open(dir.path()).unwrap();
    assert!(db.experiments().is_empty());
    assert!(db.scorers().is_empty());
    assert!(db.judgments().is_empty());
}
