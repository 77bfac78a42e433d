use crate::core::error::{Error, Result};

/// Order in which partial results are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultOrder {
    /// Append partials as workers finish; cross-partition order is arbitrary
    #[default]
    Completion,
    /// Buffer partials by partition index and join in dataset order
    Partition,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub pool_size: usize,
    pub result_order: ResultOrder,
    pub thread_name_prefix: String,
    pub max_pending_queries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pool_size: num_cpus::get(),                // one worker per logical core
            result_order: ResultOrder::Completion,
            thread_name_prefix: "fanseek-worker".to_string(),
            max_pending_queries: 1024,                 // searches queued behind the in-flight one
        }
    }
}

impl Config {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_result_order(mut self, result_order: ResultOrder) -> Self {
        self.result_order = result_order;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_max_pending_queries(mut self, max: usize) -> Self {
        self.max_pending_queries = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::configuration("pool size must be positive"));
        }
        if self.max_pending_queries == 0 {
            return Err(Error::configuration("max_pending_queries must be positive"));
        }
        Ok(())
    }
}
