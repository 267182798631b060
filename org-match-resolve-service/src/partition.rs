use crate::table::Record;
use std::collections::HashSet;

/// Borrowed views over a resolved table.
#[derive(Debug, Default)]
pub struct Partition<'a> {
    pub accept: Vec<&'a Record>,
    pub unaccept: Vec<&'a Record>,
}

///
/// Splits resolved records into rows that need no further review and rows
/// routed to manual review.
///
/// A row qualifies when its confidence reaches `confidence_floor` and its
/// organisation string is at least `string_length_floor` characters long;
/// short strings such as acronyms are ambiguous at any score. Membership is
/// decided per string value: once any row with a given `org_string`
/// qualifies, every row with that string is accepted.
///
pub struct ConfidencePartitioner {
    confidence_floor: f64,
    string_length_floor: usize,
}

impl ConfidencePartitioner {
    pub fn new(confidence_floor: f64, string_length_floor: usize) -> Self {
        ConfidencePartitioner {
            confidence_floor,
            string_length_floor,
        }
    }

    fn qualifies(&self, record: &Record) -> bool {
        record.meets(self.confidence_floor)
            && record.org_string.chars().count() >= self.string_length_floor
    }

    pub fn partition<'a>(&self, records: &'a [Record]) -> Partition<'a> {
        let accepted: HashSet<&str> = records
            .iter()
            .filter(|r| self.qualifies(r))
            .map(|r| r.org_string.as_str())
            .collect();
        let (accept, unaccept) = records
            .iter()
            .partition(|r| accepted.contains(r.org_string.as_str()));
        Partition { accept, unaccept }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use org_match_service::dto::DEFAULT_STRING_LENGTH_FLOOR;
    use proptest::prelude::*;

    fn strings<'a>(rows: &[&'a Record]) -> Vec<&'a str> {
        rows.iter().map(|r| r.org_string.as_str()).collect()
    }

    #[test]
    fn short_strings_are_never_accepted() {
        let records = vec![Record::new("XY", "2", Some(0.99), Some("222"))];
        let partition = ConfidencePartitioner::new(0.7, DEFAULT_STRING_LENGTH_FLOOR).partition(&records);

        assert!(partition.accept.is_empty());
        assert_eq!(strings(&partition.unaccept), vec!["XY"]);
    }

    #[test]
    fn splits_on_confidence_floor() {
        let records = vec![
            Record::new("ABC Ltd", "1", Some(0.95), Some("111")),
            Record::new("ABC Limited", "1", Some(0.72), Some("111")),
            Record::new("Zeta", "3", Some(0.5), Some("333")),
            Record::new("Zeta Co", "3", None, None),
        ];
        let partition = ConfidencePartitioner::new(0.9, 3).partition(&records);

        assert_eq!(strings(&partition.accept), vec!["ABC Ltd"]);
        assert_eq!(strings(&partition.unaccept), vec!["ABC Limited", "Zeta", "Zeta Co"]);
    }

    #[test]
    fn duplicate_strings_travel_together() {
        let records = vec![
            Record::new("Omega Srl", "9", Some(0.95), Some("1")),
            Record::new("Omega Srl", "9", Some(0.2), None),
            Record::new("Omega", "9", Some(0.2), None),
        ];
        let partition = ConfidencePartitioner::new(0.7, 3).partition(&records);

        assert_eq!(strings(&partition.accept), vec!["Omega Srl", "Omega Srl"]);
        assert_eq!(strings(&partition.unaccept), vec!["Omega"]);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let records = vec![Record::new("Ré", "1", Some(0.99), None)];
        let partition = ConfidencePartitioner::new(0.7, 3).partition(&records);
        assert!(partition.accept.is_empty());
    }

    #[test]
    fn unaffected_by_output_rounding() {
        let records = vec![Record::new("Kappa Holdings", "1", Some(0.695), None)];
        let partition = ConfidencePartitioner::new(0.7, 3).partition(&records);
        assert!(partition.accept.is_empty());
    }

    #[test]
    fn empty_input_gives_empty_partitions() {
        let partition = ConfidencePartitioner::new(0.7, 3).partition(&[]);
        assert!(partition.accept.is_empty());
        assert!(partition.unaccept.is_empty());
    }

    proptest! {
        #[test]
        fn partitions_cover_every_string_once(
            rows in prop::collection::vec(("[a-c]{1,4}", prop::option::of(0.0f64..=1.0)), 0..30),
            floor in 0.0f64..=1.0,
            length in 0usize..5,
        ) {
            let records: Vec<Record> = rows
                .iter()
                .map(|(name, conf)| Record::new(name, "1", *conf, None))
                .collect();
            let partition = ConfidencePartitioner::new(floor, length).partition(&records);

            let accept: HashSet<&str> = strings(&partition.accept).into_iter().collect();
            let unaccept: HashSet<&str> = strings(&partition.unaccept).into_iter().collect();
            let all: HashSet<&str> = records.iter().map(|r| r.org_string.as_str()).collect();

            prop_assert!(accept.is_disjoint(&unaccept));
            prop_assert_eq!(accept.union(&unaccept).copied().collect::<HashSet<&str>>(), all);
            prop_assert_eq!(partition.accept.len() + partition.unaccept.len(), records.len());
        }
    }
}
