use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use crossbeam::channel::{unbounded, Receiver, Sender};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Record;
use crate::parallel::partitioner::Partition;
use crate::search::predicate::Predicate;
use crate::worker::protocol::{WorkerId, WorkerRequest, WorkerResponse};

/// One long-lived worker thread plus the coordinator-side view of it
pub struct WorkerHandle {
    pub id: WorkerId,
    busy: bool,
    requests: Sender<WorkerRequest>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn<P: Predicate>(
        id: WorkerId,
        name: String,
        predicate: P,
        responses: Sender<WorkerResponse>,
    ) -> Result<Self> {
        let (requests, request_receiver) = unbounded();

        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || Self::run(id, predicate, request_receiver, responses))
            .map_err(|e| Error::new(
                ErrorKind::WorkerSpawn,
                format!("failed to spawn worker {}: {}", id.0, e),
            ))?;

        Ok(WorkerHandle {
            id,
            busy: false,
            requests,
            thread: Some(thread),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn mark_busy(&mut self) {
        self.busy = true;
    }

    pub fn mark_idle(&mut self) {
        self.busy = false;
    }

    /// Send a request; the response arrives later on the pool's response channel
    pub fn dispatch(&self, request: WorkerRequest) -> Result<()> {
        self.requests.send(request).map_err(|_| Error::new(
            ErrorKind::Internal,
            format!("worker {} is no longer running", self.id.0),
        ))
    }

    /// Stop the thread and wait for it; a pending request is finished first
    pub fn shutdown(&mut self) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                tracing::warn!(worker = self.id.0, "worker thread panicked");
            }
        }
    }

    fn run<P: Predicate>(
        id: WorkerId,
        predicate: P,
        requests: Receiver<WorkerRequest>,
        responses: Sender<WorkerResponse>,
    ) {
        tracing::trace!(worker = id.0, "worker started");

        while let Ok(request) = requests.recv() {
            match request {
                WorkerRequest::Search { query_id, partition, query } => {
                    let outcome = Self::evaluate(&predicate, &partition, &query);
                    let response = WorkerResponse {
                        query_id,
                        worker: id,
                        partition_index: partition.index,
                        outcome,
                    };
                    if responses.send(response).is_err() {
                        break;
                    }
                }
                WorkerRequest::Shutdown => break,
            }
        }

        tracing::trace!(worker = id.0, "worker stopped");
    }

    /// Run the predicate, turning a panic into a PredicateFailure so the worker survives
    fn evaluate<P: Predicate>(predicate: &P, partition: &Partition, query: &str) -> Result<Vec<Record>> {
        match panic::catch_unwind(AssertUnwindSafe(|| predicate.filter(partition.records(), query))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(Error::new(
                ErrorKind::PredicateFailure,
                format!("predicate panicked on partition {}: {}", partition.index, panic_message(payload.as_ref())),
            )),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::core::types::QueryId;
    use crate::parallel::partitioner::partition;
    use crate::search::predicate::SubstringPredicate;

    fn one_partition() -> Partition {
        let data: Arc<[Record]> = vec![
            Record::new().with_field("name", "Apple"),
            Record::new().with_field("name", "Banana"),
        ].into();
        partition(&data, 1).unwrap().remove(0)
    }

    #[test]
    fn answers_search_requests() {
        let (tx, rx) = unbounded();
        let worker = WorkerHandle::spawn(WorkerId(0), "test-worker".to_string(), SubstringPredicate, tx).unwrap();

        worker.dispatch(WorkerRequest::Search {
            query_id: QueryId(7),
            partition: one_partition(),
            query: Arc::from("ban"),
        }).unwrap();

        let response = rx.recv().unwrap();
        assert_eq!(response.query_id, QueryId(7));
        assert_eq!(response.worker, WorkerId(0));
        assert_eq!(response.partition_index, 0);
        assert_eq!(response.outcome.unwrap().len(), 1);
    }

    #[test]
    fn panicking_predicate_is_reported_and_worker_survives() {
        let (tx, rx) = unbounded();
        let predicate = |records: &[Record], query: &str| -> Result<Vec<Record>> {
            if query == "boom" {
                panic!("bad record");
            }
            Ok(records.to_vec())
        };
        let worker = WorkerHandle::spawn(WorkerId(3), "test-worker".to_string(), predicate, tx).unwrap();

        for query in ["boom", "fine"] {
            worker.dispatch(WorkerRequest::Search {
                query_id: QueryId(1),
                partition: one_partition(),
                query: Arc::from(query),
            }).unwrap();
        }

        let first = rx.recv().unwrap();
        let err = first.outcome.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PredicateFailure);
        assert!(err.context.contains("bad record"));

        let second = rx.recv().unwrap();
        assert_eq!(second.outcome.unwrap().len(), 2);
    }

    #[test]
    fn shutdown_joins_thread() {
        let (tx, _rx) = unbounded();
        let mut worker = WorkerHandle::spawn(WorkerId(0), "test-worker".to_string(), SubstringPredicate, tx).unwrap();
        worker.shutdown();
        assert!(worker.dispatch(WorkerRequest::Shutdown).is_err());
    }
}
