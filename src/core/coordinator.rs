use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use crossbeam::channel::{select, unbounded, Receiver, Sender};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{CoordinatorCounters, CoordinatorStats};
use crate::core::types::{dataset_from_json, QueryId, Record};
use crate::parallel::aggregator::{Aggregator, Joined, Progress};
use crate::parallel::partitioner::{partition, Partition};
use crate::parallel::scheduler::{Scheduler, TaskSink};
use crate::search::predicate::{Predicate, SubstringPredicate};
use crate::search::results::SearchResults;
use crate::worker::pool::WorkerPool;
use crate::worker::protocol::{WorkerId, WorkerResponse};

/// Callback bound at initialization and invoked once per completed query
pub type ResultCallback = Box<dyn Fn(Result<SearchResults>) + Send + 'static>;

/// Owns the dataset and, once initialized, the worker pool and its event loop.
///
/// ```text
///  search() ──Command──▶ event loop ──WorkerRequest──▶ worker 0..N-1
///                           ▲                              │
///                           └────────WorkerResponse────────┘
///                           │
///                           └──▶ callback(SearchResults)   (once per query)
/// ```
pub struct Coordinator {
    dataset: Arc<[Record]>,
    counters: Arc<CoordinatorCounters>,
    next_query: AtomicU64,
    runtime: Option<Runtime>,
}

/// Handle to a running event loop
struct Runtime {
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
    pool_size: usize,
    partition_sizes: Vec<usize>,
    max_pending: usize,
    outstanding: Arc<AtomicUsize>,
}

enum Command {
    Search(PendingQuery),
    Shutdown,
}

struct PendingQuery {
    query_id: QueryId,
    query: Arc<str>,
}

impl Coordinator {
    pub fn new(dataset: impl Into<Arc<[Record]>>) -> Self {
        Coordinator {
            dataset: dataset.into(),
            counters: Arc::new(CoordinatorCounters::default()),
            next_query: AtomicU64::new(0),
            runtime: None,
        }
    }

    /// Build a coordinator over a JSON array of objects
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(dataset_from_json(json)?))
    }

    /// Spawn one worker per logical core and bind `on_result`
    pub fn initialize<F>(&mut self, on_result: F) -> Result<()>
    where
        F: Fn(Result<SearchResults>) + Send + 'static,
    {
        self.initialize_with(Config::default(), on_result)
    }

    pub fn initialize_with<F>(&mut self, config: Config, on_result: F) -> Result<()>
    where
        F: Fn(Result<SearchResults>) + Send + 'static,
    {
        self.initialize_with_predicate(config, |_| SubstringPredicate, on_result)
    }

    /// Initialize with a custom predicate; `factory` builds the instance each worker owns.
    /// Re-initializing stops the previous pool first; a query in flight then is abandoned.
    pub fn initialize_with_predicate<P, G, F>(&mut self, config: Config, factory: G, on_result: F) -> Result<()>
    where
        P: Predicate,
        G: FnMut(WorkerId) -> P,
        F: Fn(Result<SearchResults>) + Send + 'static,
    {
        config.validate()?;
        self.shutdown();

        let partitions = partition(&self.dataset, config.pool_size)?;
        let partition_sizes = partitions.iter().map(Partition::len).collect();

        let (response_sender, responses) = unbounded();
        let pool = WorkerPool::spawn(config.pool_size, &config.thread_name_prefix, factory, response_sender)?;

        let (commands, command_receiver) = unbounded();
        let outstanding = Arc::new(AtomicUsize::new(0));
        let event_loop = EventLoop {
            pool,
            partitions,
            scheduler: Scheduler::new(),
            aggregator: Aggregator::new(config.result_order),
            pending: VecDeque::new(),
            current: None,
            callback: Box::new(on_result),
            counters: Arc::clone(&self.counters),
            outstanding: Arc::clone(&outstanding),
        };

        let thread = thread::Builder::new()
            .name(format!("{}-coordinator", config.thread_name_prefix))
            .spawn(move || event_loop.run(command_receiver, responses))
            .map_err(|e| Error::new(
                ErrorKind::WorkerSpawn,
                format!("failed to spawn coordinator thread: {}", e),
            ))?;

        tracing::info!(
            records = self.dataset.len(),
            pool_size = config.pool_size,
            order = ?config.result_order,
            "coordinator initialized"
        );

        self.runtime = Some(Runtime {
            commands,
            thread: Some(thread),
            pool_size: config.pool_size,
            partition_sizes,
            max_pending: config.max_pending_queries,
            outstanding,
        });
        Ok(())
    }

    /// Start a search and return immediately; the result reaches the bound callback.
    /// A search issued while another is in flight waits its turn.
    pub fn search(&self, query: &str) -> Result<QueryId> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| Error::invalid_state("coordinator is not initialized"))?;

        // One in flight plus max_pending waiting
        let outstanding = runtime.outstanding.fetch_add(1, Ordering::AcqRel);
        if outstanding > runtime.max_pending {
            runtime.outstanding.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::invalid_state(format!(
                "too many pending queries ({} waiting)",
                runtime.max_pending
            )));
        }

        let query_id = QueryId(self.next_query.fetch_add(1, Ordering::Relaxed) + 1);
        let sent = runtime.commands.send(Command::Search(PendingQuery {
            query_id,
            query: Arc::from(query),
        }));
        if sent.is_err() {
            runtime.outstanding.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::new(ErrorKind::Internal, "coordinator event loop has stopped".to_string()));
        }
        Ok(query_id)
    }

    /// Stop the event loop and worker pool; no-op when not initialized
    pub fn shutdown(&mut self) {
        let Some(mut runtime) = self.runtime.take() else {
            return;
        };
        let _ = runtime.commands.send(Command::Shutdown);
        if let Some(thread) = runtime.thread.take() {
            // The callback may drop its own coordinator; never join the current thread
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                tracing::warn!("coordinator event loop panicked");
            }
        }
        tracing::info!("coordinator stopped");
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn dataset(&self) -> &[Record] {
        &self.dataset
    }

    pub fn pool_size(&self) -> Option<usize> {
        self.runtime.as_ref().map(|r| r.pool_size)
    }

    pub fn partition_sizes(&self) -> Option<&[usize]> {
        self.runtime.as_ref().map(|r| r.partition_sizes.as_slice())
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.counters.snapshot()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Owns everything mutable; runs on its own thread
struct EventLoop {
    pool: WorkerPool,
    partitions: Vec<Partition>,
    scheduler: Scheduler,
    aggregator: Aggregator,
    pending: VecDeque<PendingQuery>,
    current: Option<(PendingQuery, Instant)>,
    callback: ResultCallback,
    counters: Arc<CoordinatorCounters>,
    outstanding: Arc<AtomicUsize>,
}

impl EventLoop {
    fn run(mut self, commands: Receiver<Command>, responses: Receiver<WorkerResponse>) {
        loop {
            let running = select! {
                recv(commands) -> msg => match msg {
                    Ok(Command::Search(query)) => {
                        self.enqueue(query);
                        true
                    }
                    Ok(Command::Shutdown) | Err(_) => false,
                },
                recv(responses) -> msg => match msg {
                    Ok(response) => {
                        self.on_response(response);
                        true
                    }
                    Err(_) => false,
                },
            };
            if !running {
                break;
            }
        }

        if let Some((query, _)) = self.current.take() {
            tracing::debug!(query_id = %query.query_id, "abandoning in-flight query");
        }
        self.pool.shutdown();
    }

    fn enqueue(&mut self, query: PendingQuery) {
        if self.current.is_some() {
            tracing::debug!(query_id = %query.query_id, waiting = self.pending.len() + 1, "query queued");
            CoordinatorCounters::incr(&self.counters.queries_queued);
            self.pending.push_back(query);
        } else {
            self.start(query);
        }
    }

    /// Start `query`, moving on to the next pending one if dispatch fails outright
    fn start(&mut self, query: PendingQuery) {
        let mut next = Some(query);
        while let Some(query) = next.take() {
            CoordinatorCounters::incr(&self.counters.queries_started);
            let started = Instant::now();
            self.aggregator.begin(query.query_id, self.partitions.len());
            self.scheduler.clear();

            let dispatched = self.scheduler.run_query(
                query.query_id,
                Arc::clone(&query.query),
                &self.partitions,
                self.pool.size(),
                &mut self.pool,
            );

            match dispatched {
                Ok(dispatched) => {
                    CoordinatorCounters::add(&self.counters.tasks_dispatched, dispatched.immediate);
                    CoordinatorCounters::add(&self.counters.tasks_backlogged, dispatched.backlogged);
                    self.current = Some((query, started));
                }
                Err(err) => {
                    tracing::warn!(query_id = %query.query_id, error = %err, "query dispatch failed");
                    self.aggregator.abandon();
                    self.deliver(&query, started, Err(err), 0);
                    next = self.pending.pop_front();
                }
            }
        }
    }

    fn on_response(&mut self, response: WorkerResponse) {
        let worker = response.worker;
        self.pool.set_idle(worker);

        let progress = self.aggregator.on_response(response);

        match self.scheduler.on_worker_idle(worker, &mut self.pool) {
            Ok(Some(_)) => CoordinatorCounters::incr(&self.counters.tasks_dispatched),
            Ok(None) => {}
            Err(err) => tracing::warn!(worker = worker.0, error = %err, "backlog dispatch failed"),
        }

        match progress {
            Progress::Stale => {
                tracing::debug!(worker = worker.0, "discarded response from another generation");
                CoordinatorCounters::incr(&self.counters.stale_responses);
            }
            Progress::Waiting { received, expected } => {
                tracing::trace!(received, expected, "partial result received");
            }
            Progress::Closed(joined) => self.complete(joined),
        }
    }

    fn complete(&mut self, joined: Joined) {
        let Some((query, started)) = self.current.take() else {
            return;
        };
        debug_assert_eq!(query.query_id, joined.query_id);

        self.deliver(&query, started, joined.outcome, joined.partitions);

        if let Some(next) = self.pending.pop_front() {
            self.start(next);
        }
    }

    fn deliver(&mut self, query: &PendingQuery, started: Instant, outcome: Result<Vec<Record>>, partitions: usize) {
        let result = outcome.map(|hits| SearchResults {
            query_id: query.query_id,
            query: query.query.to_string(),
            total_hits: hits.len(),
            hits,
            partitions,
            took: started.elapsed(),
        });

        match &result {
            Ok(results) => tracing::debug!(
                query_id = %query.query_id,
                hits = results.total_hits,
                took_ms = results.took_ms(),
                "query completed"
            ),
            Err(err) => {
                CoordinatorCounters::incr(&self.counters.queries_failed);
                tracing::warn!(query_id = %query.query_id, error = %err, "query failed");
            }
        }

        CoordinatorCounters::incr(&self.counters.queries_completed);
        self.outstanding.fetch_sub(1, Ordering::AcqRel);

        if panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(result))).is_err() {
            tracing::warn!(query_id = %query.query_id, "result callback panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crossbeam::channel::RecvTimeoutError;
    use crate::core::config::ResultOrder;

    const WAIT: Duration = Duration::from_secs(10);

    fn fruit() -> Vec<Record> {
        vec![
            Record::new().with_field("id", 1i64).with_field("name", "Apple"),
            Record::new().with_field("id", 2i64).with_field("name", "Banana"),
            Record::new().with_field("id", 3i64).with_field("name", "apple pie"),
        ]
    }

    fn channel_callback() -> (impl Fn(Result<SearchResults>) + Send + 'static, Receiver<Result<SearchResults>>) {
        let (tx, rx) = unbounded();
        (move |result: Result<SearchResults>| { let _ = tx.send(result); }, rx)
    }

    #[test]
    fn search_before_initialize_fails() {
        let coordinator = Coordinator::new(fruit());
        let err = coordinator.search("apple").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);
    }

    #[test]
    fn example_query_with_two_workers() {
        let mut coordinator = Coordinator::new(fruit());
        let (callback, rx) = channel_callback();
        coordinator
            .initialize_with(Config::default().with_pool_size(2).with_result_order(ResultOrder::Partition), callback)
            .unwrap();
        assert_eq!(coordinator.partition_sizes(), Some(&[2usize, 1][..]));

        let query_id = coordinator.search("apple").unwrap();
        let results = rx.recv_timeout(WAIT).unwrap().unwrap();
        assert_eq!(results.query_id, query_id);
        assert_eq!(results.partitions, 2);
        assert_eq!(results.hits, vec![fruit()[0].clone(), fruit()[2].clone()]);
        assert!(matches!(rx.recv_timeout(Duration::from_millis(100)), Err(RecvTimeoutError::Timeout)));
    }

    #[test]
    fn zero_pool_size_is_a_configuration_error() {
        let mut coordinator = Coordinator::new(fruit());
        let (callback, _rx) = channel_callback();
        let err = coordinator
            .initialize_with(Config::default().with_pool_size(0), callback)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
        assert!(!coordinator.is_initialized());
    }

    #[test]
    fn reinitialize_replaces_pool_and_callback() {
        let mut coordinator = Coordinator::new(fruit());
        let (first, first_rx) = channel_callback();
        coordinator.initialize_with(Config::default().with_pool_size(3), first).unwrap();
        coordinator.search("banana").unwrap();
        assert_eq!(first_rx.recv_timeout(WAIT).unwrap().unwrap().total_hits, 1);

        let (second, second_rx) = channel_callback();
        coordinator.initialize_with(Config::default().with_pool_size(1), second).unwrap();
        assert_eq!(coordinator.pool_size(), Some(1));

        coordinator.search("").unwrap();
        assert_eq!(second_rx.recv_timeout(WAIT).unwrap().unwrap().total_hits, 3);
        assert!(first_rx.try_recv().is_err());
    }

    #[test]
    fn pending_limit_rejects_excess_searches() {
        let mut coordinator = Coordinator::new(fruit());
        let (gate_tx, gate_rx) = unbounded::<()>();
        let (callback, rx) = channel_callback();
        let config = Config::default().with_pool_size(1).with_max_pending_queries(1);
        coordinator
            .initialize_with_predicate(
                config,
                move |_| {
                    let gate = gate_rx.clone();
                    move |records: &[Record], _query: &str| -> Result<Vec<Record>> {
                        let _ = gate.recv();
                        Ok(records.to_vec())
                    }
                },
                callback,
            )
            .unwrap();

        coordinator.search("a").unwrap();
        coordinator.search("b").unwrap();
        let err = coordinator.search("c").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);

        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        assert!(rx.recv_timeout(WAIT).unwrap().is_ok());
        assert!(rx.recv_timeout(WAIT).unwrap().is_ok());
        assert_eq!(coordinator.stats().queries_completed, 2);
    }
}
