use std::sync::atomic::{AtomicU64, Ordering};

use super::Id;

/// Abstraction over ID generation to support deterministic tests.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> Id;
}

#[derive(Debug, Clone, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn new_id(&self) -> Id {
        Id::new()
    }
}

/// Yields `{prefix}-1`, `{prefix}-2`, ... in order.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn new_id(&self) -> Id {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Id::from_string(format!("{}-{n}", self.prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_generator_counts_from_one() {
        let ids = SequentialIdGenerator::new("tx");
        assert_eq!(ids.new_id().as_str(), "tx-1");
        assert_eq!(ids.new_id().as_str(), "tx-2");
    }
}
