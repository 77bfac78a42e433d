use std::time::Duration;
use crate::core::types::{QueryId, Record};

/// Joined answer to one query, handed to the bound callback
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub query_id: QueryId,
    pub query: String,
    pub hits: Vec<Record>,
    pub total_hits: usize,
    pub partitions: usize,
    pub took: Duration,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn took_ms(&self) -> u64 {
        self.took.as_millis() as u64
    }
}
