use crossbeam::channel::Sender;
use crate::core::error::{Error, Result};
use crate::parallel::scheduler::{Task, TaskSink};
use crate::search::predicate::Predicate;
use crate::worker::handle::WorkerHandle;
use crate::worker::protocol::{WorkerId, WorkerRequest, WorkerResponse};

/// Fixed-size set of workers sharing one response channel
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Spawn `size` workers, each owning the predicate `factory` builds for it
    pub fn spawn<P, F>(
        size: usize,
        thread_name_prefix: &str,
        mut factory: F,
        responses: Sender<WorkerResponse>,
    ) -> Result<Self>
    where
        P: Predicate,
        F: FnMut(WorkerId) -> P,
    {
        if size == 0 {
            return Err(Error::configuration("pool size must be positive"));
        }

        // Dropping `workers` on an early return stops the threads already started
        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let id = WorkerId(i);
            let name = format!("{}-{}", thread_name_prefix, i);
            workers.push(WorkerHandle::spawn(id, name, factory(id), responses.clone())?);
        }

        tracing::info!(size, "worker pool started");
        Ok(WorkerPool { workers })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn handle(&self, id: WorkerId) -> Option<&WorkerHandle> {
        self.workers.get(id.0)
    }

    pub fn idle_handles(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.workers.iter().filter(|w| !w.is_busy())
    }

    pub fn busy_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_busy()).count()
    }

    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        for worker in &mut self.workers {
            worker.shutdown();
        }
        tracing::info!(size = self.workers.len(), "worker pool stopped");
        self.workers.clear();
    }

    fn worker_mut(&mut self, id: WorkerId) -> Result<&mut WorkerHandle> {
        self.workers
            .get_mut(id.0)
            .ok_or_else(|| Error::invalid_state(format!("no worker {} in pool", id.0)))
    }
}

impl TaskSink for WorkerPool {
    fn is_idle(&self, worker: WorkerId) -> bool {
        self.handle(worker).is_some_and(|w| !w.is_busy())
    }

    fn set_idle(&mut self, worker: WorkerId) {
        if let Ok(w) = self.worker_mut(worker) {
            w.mark_idle();
        }
    }

    fn dispatch(&mut self, worker: WorkerId, task: Task) -> Result<()> {
        let handle = self.worker_mut(worker)?;
        handle.mark_busy();
        let result = handle.dispatch(WorkerRequest::Search {
            query_id: task.query_id,
            partition: task.partition,
            query: task.query,
        });
        if result.is_err() {
            handle.mark_idle();
        }
        result
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
