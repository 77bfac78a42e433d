use std::collections::VecDeque;
use std::sync::Arc;
use crate::core::types::QueryId;
use crate::core::error::Result;
use crate::parallel::partitioner::Partition;
use crate::worker::protocol::WorkerId;

/// One partition of one query, assigned to a worker
#[derive(Debug, Clone)]
pub struct Task {
    pub query_id: QueryId,
    pub partition: Partition,
    pub worker: WorkerId,
    pub query: Arc<str>,
}

/// Where the scheduler sends tasks; implemented by the worker pool
pub trait TaskSink {
    fn is_idle(&self, worker: WorkerId) -> bool;

    fn set_idle(&mut self, worker: WorkerId);

    /// Mark `worker` busy and hand it `task`
    fn dispatch(&mut self, worker: WorkerId, task: Task) -> Result<()>;
}

/// Counters for one `run_query` or `on_worker_idle` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dispatched {
    pub immediate: usize,
    pub backlogged: usize,
}

/// Dispatches tasks to idle workers and queues the rest FIFO
#[derive(Debug, Default)]
pub struct Scheduler {
    backlog: VecDeque<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            backlog: VecDeque::new(),
        }
    }

    /// Build one task per partition (partition i goes to worker i modulo the pool) and submit them
    pub fn run_query<S: TaskSink>(
        &mut self,
        query_id: QueryId,
        query: Arc<str>,
        partitions: &[Partition],
        pool_size: usize,
        sink: &mut S,
    ) -> Result<Dispatched> {
        let mut dispatched = Dispatched::default();
        for partition in partitions {
            let task = Task {
                query_id,
                partition: partition.clone(),
                worker: WorkerId(partition.index % pool_size.max(1)),
                query: Arc::clone(&query),
            };
            if self.submit(task, sink)? {
                dispatched.immediate += 1;
            } else {
                dispatched.backlogged += 1;
            }
        }

        tracing::debug!(
            %query_id,
            immediate = dispatched.immediate,
            backlogged = dispatched.backlogged,
            "query dispatched"
        );
        Ok(dispatched)
    }

    /// Dispatch `task` if its worker is idle, otherwise append it to the backlog.
    /// Returns whether it was dispatched.
    pub fn submit<S: TaskSink>(&mut self, task: Task, sink: &mut S) -> Result<bool> {
        if sink.is_idle(task.worker) {
            sink.dispatch(task.worker, task)?;
            Ok(true)
        } else {
            tracing::trace!(worker = task.worker.0, partition = task.partition.index, "task backlogged");
            self.backlog.push_back(task);
            Ok(false)
        }
    }

    /// Mark `worker` idle and hand it the backlog head, if any
    pub fn on_worker_idle<S: TaskSink>(&mut self, worker: WorkerId, sink: &mut S) -> Result<Option<Task>> {
        sink.set_idle(worker);

        let Some(mut task) = self.backlog.pop_front() else {
            return Ok(None);
        };
        task.worker = worker;
        tracing::trace!(worker = worker.0, partition = task.partition.index, "backlog task drained");
        sink.dispatch(worker, task.clone())?;
        Ok(Some(task))
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn clear(&mut self) {
        self.backlog.clear();
    }
}
