use crate::core::config::ResultOrder;
use crate::core::types::{QueryId, Record};
use crate::core::error::{Error, Result};
use crate::worker::protocol::WorkerResponse;

/// Joined result of one query once every partition has answered
#[derive(Debug)]
pub struct Joined {
    pub query_id: QueryId,
    pub partitions: usize,
    pub outcome: Result<Vec<Record>>,
}

/// What a response did to the barrier
#[derive(Debug)]
pub enum Progress {
    /// Response belongs to another generation and was dropped
    Stale,
    Waiting { received: usize, expected: usize },
    Closed(Joined),
}

/// Join barrier over the N partial results of the in-flight query
#[derive(Debug)]
pub struct Aggregator {
    order: ResultOrder,
    query_id: Option<QueryId>,
    expected: usize,
    received: usize,
    buffer: Vec<Record>,
    slots: Vec<Option<Vec<Record>>>,
    failure: Option<Error>,
}

impl Aggregator {
    pub fn new(order: ResultOrder) -> Self {
        Aggregator {
            order,
            query_id: None,
            expected: 0,
            received: 0,
            buffer: Vec::new(),
            slots: Vec::new(),
            failure: None,
        }
    }

    /// Reset the barrier for a new generation expecting `expected` responses
    pub fn begin(&mut self, query_id: QueryId, expected: usize) {
        self.reset();
        self.query_id = Some(query_id);
        self.expected = expected;
        if self.order == ResultOrder::Partition {
            self.slots = (0..expected).map(|_| None).collect();
        }
    }

    /// Drop the current generation; its late responses become stale
    pub fn abandon(&mut self) {
        self.reset();
    }

    pub fn in_flight(&self) -> Option<QueryId> {
        self.query_id
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn on_response(&mut self, response: WorkerResponse) -> Progress {
        if self.query_id != Some(response.query_id) {
            return Progress::Stale;
        }

        self.received += 1;
        match response.outcome {
            Ok(matches) => self.absorb(response.partition_index, matches),
            Err(err) => {
                tracing::warn!(
                    query_id = %response.query_id,
                    partition = response.partition_index,
                    error = %err,
                    "partition failed"
                );
                // First failure wins; the barrier still waits for every partition
                if self.failure.is_none() {
                    self.failure = Some(err);
                }
            }
        }

        if self.received < self.expected {
            return Progress::Waiting {
                received: self.received,
                expected: self.expected,
            };
        }

        Progress::Closed(self.close())
    }

    fn absorb(&mut self, partition_index: usize, matches: Vec<Record>) {
        match self.order {
            ResultOrder::Completion => self.buffer.extend(matches),
            ResultOrder::Partition => match self.slots.get_mut(partition_index) {
                Some(slot) => *slot = Some(matches),
                None => self.buffer.extend(matches),
            },
        }
    }

    fn close(&mut self) -> Joined {
        let query_id = self.query_id.unwrap_or_default();
        let partitions = self.expected;

        let outcome = match self.failure.take() {
            Some(err) => Err(err),
            None => {
                let mut hits = std::mem::take(&mut self.buffer);
                if self.order == ResultOrder::Partition {
                    let mut ordered: Vec<Record> = std::mem::take(&mut self.slots)
                        .into_iter()
                        .flatten()
                        .flatten()
                        .collect();
                    ordered.append(&mut hits);
                    hits = ordered;
                }
                Ok(hits)
            }
        };

        self.reset();
        Joined { query_id, partitions, outcome }
    }

    fn reset(&mut self) {
        self.query_id = None;
        self.expected = 0;
        self.received = 0;
        self.buffer.clear();
        self.slots.clear();
        self.failure = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::worker::protocol::WorkerId;

    fn rec(id: i64) -> Record {
        Record::new().with_field("id", id)
    }

    fn response(query_id: u64, partition: usize, ids: &[i64]) -> WorkerResponse {
        WorkerResponse {
            query_id: QueryId(query_id),
            worker: WorkerId(partition),
            partition_index: partition,
            outcome: Ok(ids.iter().copied().map(rec).collect()),
        }
    }

    #[test]
    fn closes_exactly_once_in_completion_order() {
        let mut agg = Aggregator::new(ResultOrder::Completion);
        agg.begin(QueryId(1), 3);

        assert!(matches!(agg.on_response(response(1, 2, &[5])), Progress::Waiting { received: 1, expected: 3 }));
        assert!(matches!(agg.on_response(response(1, 0, &[1, 2])), Progress::Waiting { received: 2, .. }));

        let Progress::Closed(joined) = agg.on_response(response(1, 1, &[])) else {
            panic!("barrier should close on the third response");
        };
        assert_eq!(joined.query_id, QueryId(1));
        assert_eq!(joined.partitions, 3);
        assert_eq!(joined.outcome.unwrap(), vec![rec(5), rec(1), rec(2)]);

        // Reset after closing: a late duplicate is stale
        assert!(agg.in_flight().is_none());
        assert!(matches!(agg.on_response(response(1, 1, &[9])), Progress::Stale));
    }

    #[test]
    fn partition_order_restores_dataset_order() {
        let mut agg = Aggregator::new(ResultOrder::Partition);
        agg.begin(QueryId(4), 3);
        agg.on_response(response(4, 2, &[7, 8]));
        agg.on_response(response(4, 0, &[1]));
        let Progress::Closed(joined) = agg.on_response(response(4, 1, &[3])) else {
            panic!("barrier should close");
        };
        assert_eq!(joined.outcome.unwrap(), vec![rec(1), rec(3), rec(7), rec(8)]);
    }

    #[test]
    fn other_generation_is_discarded() {
        let mut agg = Aggregator::new(ResultOrder::Completion);
        agg.begin(QueryId(2), 1);
        assert!(matches!(agg.on_response(response(1, 0, &[1])), Progress::Stale));
        assert_eq!(agg.received(), 0);

        let Progress::Closed(joined) = agg.on_response(response(2, 0, &[2])) else {
            panic!("barrier should close");
        };
        assert_eq!(joined.outcome.unwrap(), vec![rec(2)]);
    }

    #[test]
    fn failure_waits_for_all_partitions_then_reports() {
        let mut agg = Aggregator::new(ResultOrder::Completion);
        agg.begin(QueryId(3), 2);

        let failed = WorkerResponse {
            query_id: QueryId(3),
            worker: WorkerId(0),
            partition_index: 0,
            outcome: Err(Error::new(ErrorKind::PredicateFailure, "bad record".to_string())),
        };
        assert!(matches!(agg.on_response(failed), Progress::Waiting { .. }));

        let Progress::Closed(joined) = agg.on_response(response(3, 1, &[1])) else {
            panic!("barrier should close");
        };
        assert_eq!(joined.outcome.unwrap_err().kind, ErrorKind::PredicateFailure);
    }

    #[test]
    fn empty_partials_still_close() {
        let mut agg = Aggregator::new(ResultOrder::Completion);
        agg.begin(QueryId(9), 2);
        agg.on_response(response(9, 0, &[]));
        let Progress::Closed(joined) = agg.on_response(response(9, 1, &[])) else {
            panic!("barrier should close");
        };
        assert!(joined.outcome.unwrap().is_empty());
    }
}
