use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

pub const DEFAULT_STRING_LENGTH_FLOOR: usize = 3;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DataFile {
    pub bucket: String,
    pub key: String,
}

impl DataFile {
    /// Object key without its `.csv` extension; any prefix is kept.
    pub fn stem(&self) -> &str {
        self.key.strip_suffix(".csv").unwrap_or(&self.key)
    }

    /// A file next to this one, in `bucket`, named `<stem><suffix>.csv`.
    pub fn with_suffix(&self, bucket: &str, suffix: &str) -> DataFile {
        DataFile {
            bucket: bucket.to_string(),
            key: format!("{}{}.csv", self.stem(), suffix),
        }
    }
}

/// Where the upstream external ids came from. Each source has its own
/// confidence threshold and file suffix convention.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Preset {
    /// Ids joined from the locally curated database.
    #[default]
    SqlJoin,
    /// Ids looked up against the government company registry.
    RegistryLookup,
}

impl Preset {
    pub fn threshold(&self) -> f64 {
        match self {
            Preset::SqlJoin => 0.7,
            Preset::RegistryLookup => 0.9,
        }
    }

    pub fn suffix_style(&self) -> SuffixStyle {
        match self {
            Preset::SqlJoin => SuffixStyle::Short,
            Preset::RegistryLookup => SuffixStyle::Conf,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SuffixStyle {
    /// `_accept` / `_unaccept`
    Short,
    /// `_accepted_conf` / `_unaccepted_conf`
    Conf,
}

impl SuffixStyle {
    pub fn accept(&self) -> &'static str {
        match self {
            SuffixStyle::Short => "_accept",
            SuffixStyle::Conf => "_accepted_conf",
        }
    }

    pub fn unaccept(&self) -> &'static str {
        match self {
            SuffixStyle::Short => "_unaccept",
            SuffixStyle::Conf => "_unaccepted_conf",
        }
    }
}

/// How confidence scores are rendered in the output files.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConfidenceFormat {
    Raw,
    #[default]
    Round2,
    Percent,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnNames {
    pub org_string: String,
    /// Falls back to `cluster_id` / `Cluster ID` when unset.
    pub cluster_id: Option<String>,
    /// Falls back to `confidence` / `Confidence Score` when unset.
    pub confidence: Option<String>,
    /// Falls back to `external_id` / `obtd_id` / `obtained_id` when unset.
    pub external_id: Option<String>,
}

impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames {
            org_string: String::from("org_string"),
            cluster_id: None,
            confidence: None,
            external_id: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveConfig {
    pub data: DataFile,
    #[serde(default)]
    pub preset: Preset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_floor: Option<f64>,
    #[serde(default = "default_string_length_floor")]
    pub string_length_floor: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix_style: Option<SuffixStyle>,
    #[serde(default)]
    pub confidence_format: ConfidenceFormat,
    #[serde(default)]
    pub columns: ColumnNames,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_column: Option<String>,
}

fn default_string_length_floor() -> usize {
    DEFAULT_STRING_LENGTH_FLOOR
}

impl ResolveConfig {
    /// Confidence at or above which a row receives its cluster's anchor id.
    pub fn threshold(&self) -> f64 {
        self.threshold.unwrap_or_else(|| self.preset.threshold())
    }

    /// Confidence at or above which a row may be accepted. Follows the
    /// resolver threshold unless set on its own.
    pub fn confidence_floor(&self) -> f64 {
        self.confidence_floor.unwrap_or_else(|| self.threshold())
    }

    pub fn suffix_style(&self) -> SuffixStyle {
        self.suffix_style
            .unwrap_or_else(|| self.preset.suffix_style())
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.data.bucket.is_empty() || self.data.key.is_empty() {
            return Err(ServiceError::bad_request(
                "'data' must name a bucket and a key",
            ));
        }
        for (name, value) in [
            ("threshold", self.threshold()),
            ("confidenceFloor", self.confidence_floor()),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ServiceError::bad_request(format!(
                    "'{name}' must be within [0, 1], got {value}"
                )));
            }
        }
        if self.columns.org_string.is_empty() {
            return Err(ServiceError::bad_request("'columns.orgString' is empty"));
        }
        Ok(())
    }
}

/// Counters produced by a single resolver pass.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolveStats {
    pub records: usize,
    pub clusters: usize,
    pub anchored_clusters: usize,
    pub unanchored_clusters: usize,
    /// Rows whose external id was changed by propagation.
    pub propagated: usize,
    /// Rows whose confidence was empty or unparsable, scored as zero.
    pub malformed_confidence: usize,
    /// Rows with an empty cluster id, left unresolved.
    pub missing_cluster: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveSummary {
    pub bucket: String,
    pub resolved: String,
    pub accept: String,
    pub unaccept: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_errors: Option<String>,
    pub stats: ResolveStats,
    pub accepted: usize,
    pub unaccepted: usize,
    #[serde(default)]
    pub id_mismatches: usize,
}
