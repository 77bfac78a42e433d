pub mod partitioner;
pub mod scheduler;
pub mod aggregator;
