use crate::table::Record;
use log::debug;
use org_match_service::dto::ResolveStats;
use std::cmp::Ordering;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ClusterKey<'a> {
    Numeric(i64),
    Text(&'a str),
    /// No cluster assigned; sorts last and never groups.
    Missing,
}

fn cluster_key(record: &Record, numeric: bool) -> ClusterKey<'_> {
    if record.cluster_id.is_empty() {
        return ClusterKey::Missing;
    }
    match record.cluster_id.parse::<i64>() {
        Ok(id) if numeric => ClusterKey::Numeric(id),
        _ => ClusterKey::Text(&record.cluster_id),
    }
}

fn same_cluster(a: &ClusterKey, b: &ClusterKey) -> bool {
    a == b && *a != ClusterKey::Missing
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Anchored { propagated: usize },
    Unanchored,
}

///
/// Propagates the most trusted external id of each cluster to every member
/// whose confidence clears the threshold.
///
/// The anchor of a cluster is its highest-confidence member carrying an
/// external id. Members below the threshold, or with a malformed
/// confidence, are never written to; a malformed confidence also rules a
/// row out as anchor.
///
pub struct ClusterResolver {
    threshold: f64,
}

impl ClusterResolver {
    pub fn new(threshold: f64) -> Self {
        ClusterResolver { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    ///
    /// Sorts `records` by cluster id (stable, so input order breaks ties) and
    /// rewrites external ids in place.
    ///
    /// Cluster ids are ordered and grouped numerically when every id is an
    /// integer, so `01` and `1` name the same cluster; otherwise they are
    /// compared as text. Rows without a cluster id sort last and are left
    /// unresolved: they neither anchor nor receive an id.
    ///
    pub fn resolve(&self, records: &mut [Record]) -> ResolveStats {
        let numeric = records
            .iter()
            .filter(|record| !record.cluster_id.is_empty())
            .all(|record| record.cluster_id.parse::<i64>().is_ok());
        records.sort_by(|a, b| cluster_key(a, numeric).cmp(&cluster_key(b, numeric)));

        let mut stats = ResolveStats {
            records: records.len(),
            malformed_confidence: records.iter().filter(|r| r.confidence.is_none()).count(),
            ..ResolveStats::default()
        };
        for cluster in records
            .chunk_by_mut(|a, b| same_cluster(&cluster_key(a, numeric), &cluster_key(b, numeric)))
        {
            if cluster[0].cluster_id.is_empty() {
                stats.missing_cluster += 1;
                continue;
            }
            stats.clusters += 1;
            match self.resolve_cluster(cluster) {
                Outcome::Anchored { propagated } => {
                    stats.anchored_clusters += 1;
                    stats.propagated += propagated;
                }
                Outcome::Unanchored => stats.unanchored_clusters += 1,
            }
        }
        stats
    }

    fn resolve_cluster(&self, cluster: &mut [Record]) -> Outcome {
        let anchor_id = match anchor(cluster).and_then(|r| r.external_id.clone()) {
            Some(id) => id,
            None => {
                debug!("cluster {} has no anchor", cluster[0].cluster_id);
                return Outcome::Unanchored;
            }
        };
        let mut propagated = 0;
        for record in cluster.iter_mut().filter(|r| r.meets(self.threshold)) {
            if record.external_id.as_deref() != Some(anchor_id.as_str()) {
                record.external_id = Some(anchor_id.clone());
                propagated += 1;
            }
        }
        debug!(
            "cluster {}: anchor {} propagated to {} of {} rows",
            cluster[0].cluster_id,
            anchor_id,
            propagated,
            cluster.len()
        );
        Outcome::Anchored { propagated }
    }
}

/// Highest-confidence member with an external id; the earliest row wins a tie.
fn anchor(cluster: &[Record]) -> Option<&Record> {
    cluster
        .iter()
        .filter(|r| r.external_id.is_some() && r.confidence.is_some())
        .fold(None, |best: Option<&Record>, candidate| match best {
            Some(best) if best.score().partial_cmp(&candidate.score()) != Some(Ordering::Less) => {
                Some(best)
            }
            _ => Some(candidate),
        })
}
