use crate::core::types::Record;
use crate::core::error::Result;

/// Per-partition filter evaluated inside a worker
pub trait Predicate: Send + 'static {
    /// Return the matching records of `records`, keeping their relative order
    fn filter(&self, records: &[Record], query: &str) -> Result<Vec<Record>>;
}

/// Case-insensitive substring match over every field value
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringPredicate;

impl SubstringPredicate {
    pub fn new() -> Self {
        SubstringPredicate
    }

    /// Whether any field's lower-cased text contains `needle` (already lower-cased)
    pub fn matches(record: &Record, needle: &str) -> bool {
        record
            .fields
            .values()
            .any(|value| value.to_text().to_lowercase().contains(needle))
    }
}

impl Predicate for SubstringPredicate {
    fn filter(&self, records: &[Record], query: &str) -> Result<Vec<Record>> {
        let needle = query.trim();
        if needle.is_empty() {
            return Ok(records.to_vec());
        }

        let needle = needle.to_lowercase();
        Ok(records
            .iter()
            .filter(|record| Self::matches(record, &needle))
            .cloned()
            .collect())
    }
}

impl<F> Predicate for F
where
    F: Fn(&[Record], &str) -> Result<Vec<Record>> + Send + 'static,
{
    fn filter(&self, records: &[Record], query: &str) -> Result<Vec<Record>> {
        (self)(records, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FieldValue;

    fn fruit() -> Vec<Record> {
        vec![
            Record::new().with_field("id", 1i64).with_field("name", "Apple"),
            Record::new().with_field("id", 2i64).with_field("name", "Banana"),
            Record::new().with_field("id", 3i64).with_field("name", "apple pie"),
        ]
    }

    #[test]
    fn empty_and_blank_queries_return_everything() {
        let records = fruit();
        assert_eq!(SubstringPredicate.filter(&records, "").unwrap(), records);
        assert_eq!(SubstringPredicate.filter(&records, "  \t\n").unwrap(), records);
    }

    #[test]
    fn matches_case_insensitively_and_keeps_order() {
        let hits = SubstringPredicate.filter(&fruit(), "  APPLE ").unwrap();
        let ids: Vec<_> = hits.iter().map(|r| r.get_field("id").cloned()).collect();
        assert_eq!(ids, vec![Some(FieldValue::Integer(1)), Some(FieldValue::Integer(3))]);
    }

    #[test]
    fn matches_non_text_values() {
        let records = fruit();
        let hits = SubstringPredicate.filter(&records, "2").unwrap();
        assert_eq!(hits, vec![records[1].clone()]);

        let flagged = vec![Record::new().with_field("active", true)];
        assert_eq!(SubstringPredicate.filter(&flagged, "TRU").unwrap().len(), 1);
    }

    #[test]
    fn field_names_are_not_searched() {
        let hits = SubstringPredicate.filter(&fruit(), "name").unwrap();
        assert!(hits.is_empty());
    }
}
