pub mod predicate;
pub mod results;
pub mod async_search;
