mod audit;
mod partition;
mod resolve;
mod table;
mod util;

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use lazy_static::lazy_static;
use log::info;
use org_match_service::dto::{DataFile, ResolveConfig, ResolveStats, ResolveSummary};
use org_match_service::error::ServiceError;
use org_match_service::response::make_response_payload;
use org_match_service::util::{get_region, output_bucket};
use rusoto_core::{Client, Region};
use rusoto_s3::S3Client;
use serde_json::Value;
use std::time::Instant;

lazy_static! {
    // AWS Region
    static ref REGION: Region = get_region().unwrap();
}

const RESOLVED_SUFFIX: &str = "_idexpanded";
const CLASSIFIED_ERRORS_SUFFIX: &str = "_classified_errors";

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    run(service_fn(process)).await?;
    Ok(())
}

async fn process(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let (payload, _context) = event.into_parts();
    let result = match serde_json::from_value::<ResolveConfig>(payload) {
        Ok(config) => resolve_clusters(config).await,
        Err(err) => Err(ServiceError::bad_request(format!("invalid event: {err}"))),
    };
    make_response_payload(result)
}

/// CSV bodies and counters produced from one clustered table.
struct Outputs {
    resolved: Vec<u8>,
    accept: Vec<u8>,
    unaccept: Vec<u8>,
    id_errors: Option<Vec<u8>>,
    stats: ResolveStats,
    accepted: usize,
    unaccepted: usize,
    id_mismatches: usize,
}

fn build_outputs(config: &ResolveConfig, mut table: table::Table) -> Result<Outputs, ServiceError> {
    let audit = config
        .reference_column
        .as_deref()
        .map(|column| audit::IdAudit::new(&table.columns, column))
        .transpose()?;

    let resolver = resolve::ClusterResolver::new(config.threshold());
    let stats = resolver.resolve(&mut table.records);
    info!(
        "Resolved {} rows in {} clusters at threshold {}: {} anchored, {} unanchored, {} ids propagated",
        stats.records,
        stats.clusters,
        resolver.threshold(),
        stats.anchored_clusters,
        stats.unanchored_clusters,
        stats.propagated
    );
    if stats.malformed_confidence > 0 {
        info!(
            "{} rows had a malformed confidence and were scored as zero",
            stats.malformed_confidence
        );
    }
    if stats.missing_cluster > 0 {
        info!(
            "{} rows had no cluster id and were left unresolved",
            stats.missing_cluster
        );
    }

    let partitioner = partition::ConfidencePartitioner::new(
        config.confidence_floor(),
        config.string_length_floor,
    );
    let split = partitioner.partition(&table.records);
    info!(
        "Partitioned into {} accepted and {} unaccepted rows",
        split.accept.len(),
        split.unaccept.len()
    );

    let format = config.confidence_format;
    let mismatches = audit.map(|audit| audit.mismatches(&table.records));
    let id_errors = mismatches
        .as_ref()
        .map(|rows| table.columns.write(rows.iter().copied(), format))
        .transpose()?;

    Ok(Outputs {
        resolved: table.to_csv(format)?,
        accept: table.columns.write(split.accept.iter().copied(), format)?,
        unaccept: table.columns.write(split.unaccept.iter().copied(), format)?,
        id_errors,
        accepted: split.accept.len(),
        unaccepted: split.unaccept.len(),
        id_mismatches: mismatches.map_or(0, |rows| rows.len()),
        stats,
    })
}

async fn resolve_clusters(config: ResolveConfig) -> Result<ResolveSummary, ServiceError> {
    config.validate()?;
    let client = S3Client::new_with_client(Client::shared(), REGION.clone());

    let start = Instant::now();
    let table = util::pull_data_file(&client, &config.data, &config.columns).await?;
    info!(
        "Loaded {} rows from {} in {:.4} secs",
        table.len(),
        config.data.key,
        start.elapsed().as_secs_f64()
    );

    if table.is_empty() {
        info!("{} has no rows, writing empty outputs", config.data.key);
    }

    let start = Instant::now();
    let outputs = build_outputs(&config, table)?;
    info!("Resolution completed in {:.4} secs", start.elapsed().as_secs_f64());

    let bucket = output_bucket(&config.data.bucket);
    let suffixes = config.suffix_style();
    let target = |suffix: &str| -> DataFile { config.data.with_suffix(&bucket, suffix) };

    let resolved = util::push_result_file(&client, outputs.resolved, target(RESOLVED_SUFFIX)).await?;
    let accept = util::push_result_file(&client, outputs.accept, target(suffixes.accept())).await?;
    let unaccept =
        util::push_result_file(&client, outputs.unaccept, target(suffixes.unaccept())).await?;
    let id_errors = match outputs.id_errors {
        Some(object) => {
            Some(util::push_result_file(&client, object, target(CLASSIFIED_ERRORS_SUFFIX)).await?)
        }
        None => None,
    };

    Ok(ResolveSummary {
        bucket,
        resolved,
        accept,
        unaccept,
        id_errors,
        stats: outputs.stats,
        accepted: outputs.accepted,
        unaccepted: outputs.unaccepted,
        id_mismatches: outputs.id_mismatches,
    })
}
