//! Contrast analyzer CLI: ranks facet values of the given fields by how
//! strongly they separate the judged document set from the collection.
//!
//! Concrete connectors are wired in by the deployment; this binary ships
//! with an HTTP-less placeholder and exits early when no connector is
//! available for the given URL scheme.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ranktune::contrast::{write_report, FeatureContraster};
use ranktune::error::{Result, TuneError};
use ranktune::judgments::load_judgments;
use ranktune::query::Query;
use ranktune::search::SearchConnector;
use ranktune::store::ExperimentDB;

#[derive(Debug, Parser)]
#[command(
    name = "find-features",
    about = "Rank facet values by chi-square contrast between judged documents and the collection"
)]
struct Args {
    /// Experiment database directory
    #[arg(long)]
    db: PathBuf,

    /// Search server URL
    #[arg(long = "search-server-url", short = 's')]
    search_server_url: String,

    /// Comma-delimited list of facet fields
    #[arg(long, short = 'f', value_delimiter = ',')]
    fields: Vec<String>,

    /// Filter query restricting the background collection
    #[arg(long = "filter-query")]
    filter_query: Option<String>,

    /// Judgments file to load into the database first
    #[arg(long, short = 'j')]
    judgments: Option<PathBuf>,

    /// Ignore judgments with a relevance grade at or below this floor
    #[arg(long = "min-relevance", short = 'm')]
    min_relevance: Option<f64>,

    /// Id field name override for the judgments file
    #[arg(long = "id-field")]
    id_field: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().init();

    // argument-parse failure is the non-fatal help path
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("find-features failed: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut db = ExperimentDB::open(&args.db)?;
    if let Some(path) = &args.judgments {
        let loaded = load_judgments(path, args.min_relevance)?;
        for judgments in loaded.judgments() {
            db.add_judgments(judgments.clone())?;
        }
    }
    let judgment_list = db.judgments().clone();
    if judgment_list.is_empty() {
        return Err(TuneError::Judgment(
            "no judgments in the database; load a judgments file with --judgments".to_string(),
        ));
    }
    let foreground_ids = judgment_list.all_doc_ids();

    let connector = connect(&args.search_server_url)?;
    let contraster = FeatureContraster::with_id_field(&connector, args.id_field.clone());
    let filter_query = args.filter_query.as_ref().map(|fq| Query::Lucene {
        default_field: String::new(),
        query_string: fq.clone(),
    });

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for field in &args.fields {
        let results = contraster.contrast_field(field, &foreground_ids, filter_query.as_ref())?;
        write_report(&mut out, field, &results)?;
        out.flush()?;
    }
    db.close()?;
    Ok(())
}

/// Wire-level connectors live outside this crate; deployments register
/// their client factory here per URL scheme.
fn connect(url: &str) -> Result<Box<dyn SearchConnector>> {
    Err(TuneError::Search(format!(
        "no search connector is registered for '{}'; link a connector crate",
        url
    )))
}
