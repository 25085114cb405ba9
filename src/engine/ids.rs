use std::sync::atomic::{AtomicU64, Ordering};

/// Mints identities for newly opened trades and for split-off closure records.
pub trait TradeIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Time-ordered UUIDv7 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidTradeIds;

impl TradeIdGenerator for UuidTradeIds {
    fn next_id(&self) -> String {
        uuid::Uuid::now_v7().to_string()
    }
}

/// Deterministic `prefix-1`, `prefix-2`, ... ids.
#[derive(Debug)]
pub struct SequentialTradeIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialTradeIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl TradeIdGenerator for SequentialTradeIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialTradeIds::new("t");
        assert_eq!(ids.next_id(), "t-1");
        assert_eq!(ids.next_id(), "t-2");
    }

    #[test]
    fn test_uuid_ids_are_unique() {
        let ids = UuidTradeIds;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
