pub mod core;
pub mod parallel;
pub mod worker;
pub mod search;
pub mod logging;

pub use crate::core::config::{Config, ResultOrder};
pub use crate::core::coordinator::{Coordinator, ResultCallback};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::stats::CoordinatorStats;
pub use crate::core::types::{FieldValue, QueryId, Record};
pub use crate::search::async_search::AsyncSearcher;
pub use crate::search::predicate::{Predicate, SubstringPredicate};
pub use crate::search::results::SearchResults;

/*
┌──────────────────────────────────────────────────────────────────────────────────┐
│                              FANSEEK ARCHITECTURE                                │
└──────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── CALLER THREAD ───────────────────────────────────┐
│                                                                                  │
│  struct Coordinator                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────┐  │
│  │ dataset: Arc<[Record]>            // immutable, shared read-only           │  │
│  │ counters: Arc<CoordinatorCounters>// stats()                               │  │
│  │ next_query: AtomicU64             // QueryId generation allocator          │  │
│  │ runtime: Option<Runtime>          // Some after initialize()               │  │
│  └────────────────────────────────────────────────────────────────────────────┘  │
│        │ search(query) ── Command::Search ──▶                                    │
└────────┼─────────────────────────────────────────────────────────────────────────┘
         ▼
┌──────────────────────────────── EVENT LOOP THREAD ───────────────────────────────┐
│                                                                                  │
│  struct EventLoop                                                                │
│  ┌────────────────────────────────────────────────────────────────────────────┐  │
│  │ pool: WorkerPool                  // N WorkerHandles, busy flags           │  │
│  │ partitions: Vec<Partition>        // computed once per initialize()        │  │
│  │ scheduler: Scheduler              // FIFO backlog, TaskSink dispatch       │  │
│  │ aggregator: Aggregator            // N-way barrier, generation check       │  │
│  │ pending: VecDeque<PendingQuery>   // searches waiting for the barrier      │  │
│  │ callback: ResultCallback          // bound once, fired once per query      │  │
│  └────────────────────────────────────────────────────────────────────────────┘  │
│        │ WorkerRequest::Search                     ▲ WorkerResponse              │
└────────┼───────────────────────────────────────────┼─────────────────────────────┘
         ▼                                           │
┌──────────────────────────────── WORKER THREADS 0..N-1 ───────────────────────────┐
│                                                                                  │
│  Predicate::filter(partition.records(), query) ──▶ matching records              │
│                                                                                  │
└──────────────────────────────────────────────────────────────────────────────────┘
*/
