pub mod protocol;
pub mod handle;
pub mod pool;
