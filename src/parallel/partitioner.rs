use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use crate::core::types::Record;
use crate::core::error::{Error, Result};

/// Contiguous view over the shared, immutable dataset
#[derive(Clone)]
pub struct Partition {
    pub index: usize,
    data: Arc<[Record]>,
    range: Range<usize>,
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Partition")
            .field("index", &self.index)
            .field("range", &self.range)
            .finish()
    }
}

impl Partition {
    pub fn records(&self) -> &[Record] {
        &self.data[self.range.clone()]
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Split `dataset` into exactly `n` contiguous partitions of `ceil(len / n)` records.
/// Trailing partitions absorb the remainder and may be short or empty.
pub fn partition(dataset: &Arc<[Record]>, n: usize) -> Result<Vec<Partition>> {
    if n == 0 {
        return Err(Error::configuration("partition count must be positive"));
    }

    let len = dataset.len();
    let chunk = len.div_ceil(n);

    Ok((0..n)
        .map(|index| {
            let start = (index * chunk).min(len);
            let end = (start + chunk).min(len);
            Partition {
                index,
                data: Arc::clone(dataset),
                range: start..end,
            }
        })
        .collect())
}
