use crate::table::{normalise_id, Columns, Record};
use org_match_service::error::ServiceError;

/// Compares resolved external ids against a column of previously analysed
/// ids. Leading zeros are not significant: registry numbers are often
/// stored both padded and unpadded.
pub struct IdAudit {
    reference: usize,
}

impl IdAudit {
    pub fn new(columns: &Columns, reference_column: &str) -> Result<Self, ServiceError> {
        columns
            .extra_index(reference_column)
            .map(|reference| IdAudit { reference })
            .ok_or_else(|| ServiceError::missing_column(reference_column, &[]))
    }

    pub fn is_mismatch(&self, record: &Record) -> bool {
        let reference = record
            .extra
            .get(self.reference)
            .and_then(|cell| normalise_id(cell));
        comparable(record.external_id.as_deref()) != comparable(reference.as_deref())
    }

    pub fn mismatches<'a>(&self, records: &'a [Record]) -> Vec<&'a Record> {
        records.iter().filter(|r| self.is_mismatch(r)).collect()
    }
}

fn comparable(id: Option<&str>) -> Option<&str> {
    id.map(|id| id.trim_start_matches('0'))
}
