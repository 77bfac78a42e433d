use std::collections::VecDeque;
use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use crate::core::config::Config;
use crate::core::coordinator::Coordinator;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::CoordinatorStats;
use crate::core::types::Record;
use crate::search::results::SearchResults;

type Waiters = Arc<Mutex<VecDeque<oneshot::Sender<Result<SearchResults>>>>>;

/// Future-per-query front end over a coordinator.
///
/// The coordinator completes queries strictly in submission order, so the
/// bound callback resolves waiters front to back.
pub struct AsyncSearcher {
    coordinator: Coordinator,
    waiters: Waiters,
}

impl AsyncSearcher {
    pub fn new(dataset: impl Into<Arc<[Record]>>, config: Config) -> Result<Self> {
        let mut coordinator = Coordinator::new(dataset);
        let waiters: Waiters = Arc::new(Mutex::new(VecDeque::new()));

        let pending = Arc::clone(&waiters);
        coordinator.initialize_with(config, move |result| {
            match pending.lock().pop_front() {
                // The receiver may have been dropped; nothing left to notify
                Some(waiter) => { let _ = waiter.send(result); }
                None => tracing::warn!("search result arrived with no waiter"),
            }
        })?;

        Ok(AsyncSearcher { coordinator, waiters })
    }

    pub async fn search(&self, query: &str) -> Result<SearchResults> {
        let (tx, rx) = oneshot::channel();
        {
            // Enqueue and submit under one lock so waiter order matches submission order
            let mut waiters = self.waiters.lock();
            self.coordinator.search(query)?;
            waiters.push_back(tx);
        }

        rx.await.map_err(|_| Error::new(
            ErrorKind::Internal,
            "coordinator stopped before answering".to_string(),
        ))?
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }
}
