use std::sync::Arc;
use crate::core::types::{QueryId, Record};
use crate::core::error::Result;
use crate::parallel::partitioner::Partition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(pub usize);

impl WorkerId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Message sent from the coordinator to one worker
#[derive(Debug)]
pub enum WorkerRequest {
    Search {
        query_id: QueryId,
        partition: Partition,
        query: Arc<str>,
    },
    Shutdown,
}

/// Message sent back by a worker once it has evaluated a partition
#[derive(Debug)]
pub struct WorkerResponse {
    pub query_id: QueryId,
    pub worker: WorkerId,
    pub partition_index: usize,
    pub outcome: Result<Vec<Record>>,
}
