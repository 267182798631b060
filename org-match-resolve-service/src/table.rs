use csv::{ReaderBuilder, StringRecord, Writer};
use org_match_service::dto::{ColumnNames, ConfidenceFormat};
use org_match_service::error::ServiceError;

pub const CLUSTER_ID_ALIASES: [&str; 2] = ["cluster_id", "Cluster ID"];
pub const CONFIDENCE_ALIASES: [&str; 2] = ["confidence", "Confidence Score"];
pub const EXTERNAL_ID_ALIASES: [&str; 3] = ["external_id", "obtd_id", "obtained_id"];

/// Scratch column left behind by the upstream join step.
const SCRATCH_COLUMNS: [&str; 1] = ["results"];
const ORIGINAL_SUFFIX: &str = "_orig";

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub org_string: String,
    pub cluster_id: String,
    /// `None` when the cell was empty or not a probability.
    pub confidence: Option<f64>,
    pub external_id: Option<String>,
    /// External id as it was before resolution.
    pub original_external_id: Option<String>,
    /// Auxiliary columns, carried through untouched.
    pub extra: Vec<String>,
}

impl Record {
    pub fn new(
        org_string: &str,
        cluster_id: &str,
        confidence: Option<f64>,
        external_id: Option<&str>,
    ) -> Self {
        let external_id = external_id.map(String::from);
        Record {
            org_string: org_string.to_string(),
            cluster_id: cluster_id.to_string(),
            confidence,
            original_external_id: external_id.clone(),
            external_id,
            extra: Vec::new(),
        }
    }

    /// Confidence with malformed values scored as zero.
    pub fn score(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }

    pub fn meets(&self, floor: f64) -> bool {
        self.confidence.map_or(false, |c| c >= floor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    OrgString,
    ClusterId,
    Confidence,
    ExternalId,
    Extra(usize),
}

/// Header layout of a clustered file: which input column feeds which
/// record field, and the order columns are written back in.
#[derive(Clone, Debug)]
pub struct Columns {
    layout: Vec<(String, Field)>,
    /// Input index of every kept column, parallel to `layout`.
    sources: Vec<usize>,
    /// Input index of a previously written `<external id>_orig` column.
    original_source: Option<usize>,
    external_id: Option<String>,
}

impl Columns {
    pub fn resolve(headers: &StringRecord, names: &ColumnNames) -> Result<Columns, ServiceError> {
        let kept: Vec<(usize, &str)> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx, name.trim()))
            .filter(|(_, name)| !is_tidied(name))
            .collect();
        let org_string = locate(&kept, Some(names.org_string.as_str()), &[])
            .ok_or_else(|| ServiceError::missing_column(&names.org_string, &[]))?;
        let cluster_id = locate(&kept, names.cluster_id.as_deref(), &CLUSTER_ID_ALIASES).ok_or_else(|| {
            ServiceError::missing_column(
                names.cluster_id.as_deref().unwrap_or(CLUSTER_ID_ALIASES[0]),
                &CLUSTER_ID_ALIASES,
            )
        })?;
        let confidence = locate(&kept, names.confidence.as_deref(), &CONFIDENCE_ALIASES).ok_or_else(|| {
            ServiceError::missing_column(
                names.confidence.as_deref().unwrap_or(CONFIDENCE_ALIASES[0]),
                &CONFIDENCE_ALIASES,
            )
        })?;
        let external_id = locate(&kept, names.external_id.as_deref(), &EXTERNAL_ID_ALIASES);
        if names.external_id.is_some() && external_id.is_none() {
            let configured = names.external_id.as_deref().unwrap_or_default();
            return Err(ServiceError::missing_column(configured, &EXTERNAL_ID_ALIASES));
        }
        let external_name = external_id.map(|idx| headers[idx].trim().to_string());
        let original_source = external_name.as_ref().and_then(|name| {
            let original = format!("{name}{ORIGINAL_SUFFIX}");
            kept.iter()
                .find(|(_, header)| *header == original)
                .map(|&(idx, _)| idx)
        });

        let mut layout = Vec::with_capacity(kept.len());
        let mut sources = Vec::with_capacity(kept.len());
        let mut extras = 0;
        for &(idx, name) in &kept {
            if Some(idx) == original_source {
                continue;
            }
            let field = if idx == org_string {
                Field::OrgString
            } else if idx == cluster_id {
                Field::ClusterId
            } else if idx == confidence {
                Field::Confidence
            } else if Some(idx) == external_id {
                Field::ExternalId
            } else {
                extras += 1;
                Field::Extra(extras - 1)
            };
            layout.push((name.to_string(), field));
            sources.push(idx);
        }

        Ok(Columns {
            layout,
            sources,
            original_source,
            external_id: external_name,
        })
    }

    /// Position of an auxiliary column within `Record::extra`.
    pub fn extra_index(&self, name: &str) -> Option<usize> {
        self.layout.iter().find_map(|(header, field)| match field {
            Field::Extra(idx) if header == name => Some(*idx),
            _ => None,
        })
    }

    pub fn has_external_id(&self) -> bool {
        self.external_id.is_some()
    }

    fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = self.layout.iter().map(|(name, _)| name.clone()).collect();
        if let Some(name) = &self.external_id {
            headers.push(format!("{name}{ORIGINAL_SUFFIX}"));
        }
        headers
    }

    fn read(&self, row: &StringRecord) -> Record {
        let mut record = Record {
            org_string: String::new(),
            cluster_id: String::new(),
            confidence: None,
            external_id: None,
            original_external_id: None,
            extra: Vec::new(),
        };
        for ((_, field), &source) in self.layout.iter().zip(&self.sources) {
            let cell = row.get(source).unwrap_or_default();
            match field {
                Field::OrgString => record.org_string = cell.to_string(),
                Field::ClusterId => record.cluster_id = cell.trim().to_string(),
                Field::Confidence => record.confidence = parse_confidence(cell),
                Field::ExternalId => record.external_id = normalise_id(cell),
                Field::Extra(_) => record.extra.push(cell.to_string()),
            }
        }
        record.original_external_id = match self.original_source {
            Some(source) => row.get(source).and_then(normalise_id),
            None => record.external_id.clone(),
        };
        record
    }

    fn render(&self, record: &Record, format: ConfidenceFormat) -> Vec<String> {
        let mut row: Vec<String> = self
            .layout
            .iter()
            .map(|(_, field)| match field {
                Field::OrgString => record.org_string.clone(),
                Field::ClusterId => record.cluster_id.clone(),
                Field::Confidence => render_confidence(record.confidence, format),
                Field::ExternalId => record.external_id.clone().unwrap_or_default(),
                Field::Extra(idx) => record.extra.get(*idx).cloned().unwrap_or_default(),
            })
            .collect();
        if self.has_external_id() {
            row.push(record.original_external_id.clone().unwrap_or_default());
        }
        row
    }

    /// Serialises `records` as CSV under this layout.
    pub fn write<'a, I>(&self, records: I, format: ConfidenceFormat) -> Result<Vec<u8>, ServiceError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut writer = Writer::from_writer(vec![]);
        writer
            .write_record(self.headers())
            .map_err(ServiceError::internal_server_error)?;
        for record in records {
            writer
                .write_record(self.render(record, format))
                .map_err(ServiceError::internal_server_error)?;
        }
        writer
            .into_inner()
            .map_err(ServiceError::internal_server_error)
    }
}

#[derive(Clone, Debug)]
pub struct Table {
    pub columns: Columns,
    pub records: Vec<Record>,
}

impl Table {
    pub fn from_csv(bytes: &[u8], names: &ColumnNames) -> Result<Table, ServiceError> {
        let mut reader = ReaderBuilder::new().from_reader(bytes);
        let headers = reader
            .headers()
            .map_err(|err| ServiceError::bad_request(format!("unreadable header: {err}")))?
            .clone();
        let columns = Columns::resolve(&headers, names)?;
        let records = reader
            .records()
            .map(|row| {
                let row = row.map_err(|err| ServiceError::bad_request(err.to_string()))?;
                Ok(columns.read(&row))
            })
            .collect::<Result<Vec<Record>, ServiceError>>()?;
        Ok(Table { columns, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_csv(&self, format: ConfidenceFormat) -> Result<Vec<u8>, ServiceError> {
        self.columns.write(&self.records, format)
    }
}

fn locate(kept: &[(usize, &str)], configured: Option<&str>, aliases: &[&str]) -> Option<usize> {
    configured
        .into_iter()
        .chain(aliases.iter().copied())
        .find_map(|candidate| {
            kept.iter()
                .find(|(_, name)| *name == candidate)
                .map(|&(idx, _)| idx)
        })
}

/// Index columns written by dataframe tooling and upstream scratch
/// columns are dropped on load.
fn is_tidied(header: &str) -> bool {
    header.to_lowercase().contains("unnamed") || SCRATCH_COLUMNS.contains(&header)
}

/// Accepts `0.87` and `87%`; anything outside [0, 1] is malformed.
pub fn parse_confidence(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    let value = match cell.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().ok()? / 100.0,
        None => cell.parse::<f64>().ok()?,
    };
    (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(value)
}

/// Empty and `nan` cells are absent; float-cast integer ids (`1234.0`)
/// are restored to their integer spelling.
pub fn normalise_id(cell: &str) -> Option<String> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return None;
    }
    match cell.strip_suffix(".0") {
        Some(int) if !int.is_empty() && int.bytes().all(|b| b.is_ascii_digit()) => {
            Some(int.to_string())
        }
        _ => Some(cell.to_string()),
    }
}

pub fn render_confidence(confidence: Option<f64>, format: ConfidenceFormat) -> String {
    match (confidence, format) {
        (None, _) => String::new(),
        (Some(c), ConfidenceFormat::Raw) => c.to_string(),
        (Some(c), ConfidenceFormat::Round2) => format!("{:.2}", c),
        (Some(c), ConfidenceFormat::Percent) => format!("{:.0}%", c * 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> ColumnNames {
        ColumnNames::default()
    }

    #[test]
    fn resolves_aliased_headers_and_drops_index_columns() {
        let csv = "Unnamed: 0,Cluster ID,Confidence Score,org_string,obtd_id,address,results\n\
                   0,1,0.95,ABC Ltd,111,1 High St,x\n\
                   1,1,0.72,ABC Limited,,2 High St,y\n";
        let table = Table::from_csv(csv.as_bytes(), &names()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].cluster_id, "1");
        assert_eq!(table.records[0].confidence, Some(0.95));
        assert_eq!(table.records[0].external_id.as_deref(), Some("111"));
        assert_eq!(table.records[1].external_id, None);
        assert_eq!(table.records[1].extra, vec!["2 High St".to_string()]);
        assert_eq!(table.columns.extra_index("address"), Some(0));
        assert_eq!(table.columns.extra_index("results"), None);

        let out = String::from_utf8(table.to_csv(ConfidenceFormat::Raw).unwrap()).unwrap();
        let header = out.lines().next().unwrap();
        assert_eq!(header, "Cluster ID,Confidence Score,org_string,obtd_id,address,obtd_id_orig");
    }

    #[test]
    fn missing_cluster_column_is_a_bad_request() {
        let csv = "org_string,confidence\nABC,0.9\n";
        let err = Table::from_csv(csv.as_bytes(), &names()).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.msg.contains("cluster_id"));
    }

    #[test]
    fn configured_external_column_must_exist() {
        let csv = "org_string,cluster_id,confidence\nABC,1,0.9\n";
        let names = ColumnNames {
            external_id: Some(String::from("company_number")),
            ..ColumnNames::default()
        };
        let err = Table::from_csv(csv.as_bytes(), &names).unwrap_err();
        assert!(err.msg.contains("company_number"));
    }

    #[test]
    fn row_without_cluster_id_is_kept() {
        let csv = "org_string,cluster_id,confidence\nABC Ltd,1,0.9\nStray Row,,0.8\nABC Limited,1,0.75\n";
        let table = Table::from_csv(csv.as_bytes(), &names()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.records[1].org_string, "Stray Row");
        assert!(table.records[1].cluster_id.is_empty());
        assert_eq!(table.records[2].cluster_id, "1");
    }

    #[test]
    fn header_only_file_is_an_empty_table() {
        let csv = "org_string,cluster_id,confidence\n";
        let table = Table::from_csv(csv.as_bytes(), &names()).unwrap();
        assert!(table.is_empty());
        assert!(!table.columns.has_external_id());
        let out = String::from_utf8(table.to_csv(ConfidenceFormat::Round2).unwrap()).unwrap();
        assert_eq!(out, "org_string,cluster_id,confidence\n");
    }

    #[test]
    fn malformed_confidence_is_none() {
        assert_eq!(parse_confidence("0.5"), Some(0.5));
        assert_eq!(parse_confidence(" 87% "), Some(0.87));
        assert_eq!(parse_confidence(""), None);
        assert_eq!(parse_confidence("high"), None);
        assert_eq!(parse_confidence("NaN"), None);
        assert_eq!(parse_confidence("1.5"), None);
        assert_eq!(parse_confidence("-0.1"), None);
    }

    #[test]
    fn ids_are_normalised() {
        assert_eq!(normalise_id("1234.0").as_deref(), Some("1234"));
        assert_eq!(normalise_id("01234").as_deref(), Some("01234"));
        assert_eq!(normalise_id("SC12.0").as_deref(), Some("SC12.0"));
        assert_eq!(normalise_id("nan"), None);
        assert_eq!(normalise_id("  "), None);
    }

    #[test]
    fn confidence_is_rendered_per_format() {
        assert_eq!(render_confidence(Some(0.956), ConfidenceFormat::Round2), "0.96");
        assert_eq!(render_confidence(Some(0.956), ConfidenceFormat::Percent), "96%");
        assert_eq!(render_confidence(Some(0.956), ConfidenceFormat::Raw), "0.956");
        assert_eq!(render_confidence(None, ConfidenceFormat::Round2), "");
    }

    #[test]
    fn existing_original_column_is_reused() {
        let csv = "org_string,cluster_id,confidence,obtd_id,obtd_id_orig\n\
                   ABC Limited,1,0.72,111,\n";
        let table = Table::from_csv(csv.as_bytes(), &names()).unwrap();
        let record = &table.records[0];
        assert_eq!(record.external_id.as_deref(), Some("111"));
        assert_eq!(record.original_external_id, None);
        assert!(record.extra.is_empty());

        let out = String::from_utf8(table.to_csv(ConfidenceFormat::Raw).unwrap()).unwrap();
        assert_eq!(
            out,
            "org_string,cluster_id,confidence,obtd_id,obtd_id_orig\nABC Limited,1,0.72,111,\n"
        );
    }
}
