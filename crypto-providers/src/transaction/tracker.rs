//! Confirmation tracking
//!
//! Status is derived fresh on every poll from two lookups: the ledger's
//! record of included transactions, and (on a miss) its in-flight pool.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::ledger::{LedgerError, LedgerResult};
use super::types::{SendResult, TransactionStatus};

/// What the primary lookup knows about a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sighting {
    /// Included in the block at this height
    Included(u64),
    /// Known to the ledger but not yet in a block
    Unmined,
    /// Included or processed with a permanent failure
    Failed(String),
}

/// What the in-flight pool knows about a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InFlight {
    /// Waiting for inclusion
    Pending,
    /// Dropped with a reason
    Failed(String),
}

/// Chain-specific lookups feeding the tracker
#[async_trait]
pub trait TransactionLookup: Send + Sync {
    /// Look the transaction up among processed transactions
    async fn lookup(&self, id: &str) -> LedgerResult<Option<Sighting>>;

    /// Look the transaction up in the in-flight pool
    async fn lookup_in_flight(&self, id: &str) -> LedgerResult<Option<InFlight>>;

    /// Current chain height
    async fn chain_height(&self) -> LedgerResult<u64>;
}

/// Derives [`SendResult`]s with a fixed confirmation depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationTracker {
    depth: u64,
}

impl ConfirmationTracker {
    /// Create a tracker requiring `depth` blocks on top of the including block
    pub fn new(depth: u64) -> Self {
        Self { depth }
    }

    /// Status of a transaction included at `included_at` when the chain is at `chain_height`
    pub fn classify(&self, included_at: u64, chain_height: u64) -> TransactionStatus {
        if chain_height.saturating_sub(included_at) < self.depth {
            TransactionStatus::Processing
        } else {
            TransactionStatus::Sent
        }
    }

    /// Run one poll. Never fails; query failures become `error` results.
    pub async fn poll(&self, lookup: &dyn TransactionLookup, id: &str) -> SendResult {
        match lookup.lookup(id).await {
            Ok(Some(Sighting::Included(height))) => self.confirmations(lookup, id, height).await,
            Ok(Some(Sighting::Unmined)) => SendResult::status(TransactionStatus::Pending),
            Ok(Some(Sighting::Failed(reason))) => {
                warn!(tx_id = %id, reason = %reason, "Transaction failed on ledger");
                SendResult::rejected(reason)
            }
            Ok(None) => self.in_flight(lookup, id).await,
            Err(e) => query_failed(id, e),
        }
    }

    async fn confirmations(&self, lookup: &dyn TransactionLookup, id: &str, height: u64) -> SendResult {
        let chain_height = match lookup.chain_height().await {
            Ok(chain_height) => chain_height,
            Err(e) => return query_failed(id, e),
        };

        let status = self.classify(height, chain_height);
        debug!(tx_id = %id, height, chain_height, depth = self.depth, %status, "Classified transaction");

        match status {
            TransactionStatus::Sent => SendResult::sent(id, format!("mined in block {}", height)),
            other => SendResult::status(other),
        }
    }

    async fn in_flight(&self, lookup: &dyn TransactionLookup, id: &str) -> SendResult {
        match lookup.lookup_in_flight(id).await {
            Ok(Some(InFlight::Pending)) => SendResult::status(TransactionStatus::Pending),
            Ok(Some(InFlight::Failed(reason))) => {
                warn!(tx_id = %id, reason = %reason, "Transaction dropped from pool");
                SendResult::rejected(reason)
            }
            Ok(None) => {
                warn!(tx_id = %id, "Transaction unknown to ledger and pool");
                SendResult::rejected("transaction not found")
            }
            Err(e) => query_failed(id, e),
        }
    }
}

fn query_failed(id: &str, err: LedgerError) -> SendResult {
    warn!(tx_id = %id, error = %err, "Status query failed");
    SendResult::error(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        sighting: LedgerResult<Option<Sighting>>,
        in_flight: LedgerResult<Option<InFlight>>,
        height: LedgerResult<u64>,
    }

    impl Fixed {
        fn new(sighting: Option<Sighting>, in_flight: Option<InFlight>, height: u64) -> Self {
            Self { sighting: Ok(sighting), in_flight: Ok(in_flight), height: Ok(height) }
        }
    }

    #[async_trait]
    impl TransactionLookup for Fixed {
        async fn lookup(&self, _id: &str) -> LedgerResult<Option<Sighting>> {
            self.sighting.clone()
        }

        async fn lookup_in_flight(&self, _id: &str) -> LedgerResult<Option<InFlight>> {
            self.in_flight.clone()
        }

        async fn chain_height(&self) -> LedgerResult<u64> {
            self.height.clone()
        }
    }

    #[test]
    fn test_classify_depth_boundary() {
        let tracker = ConfirmationTracker::new(5);
        assert_eq!(tracker.classify(96, 100), TransactionStatus::Processing);
        assert_eq!(tracker.classify(95, 100), TransactionStatus::Sent);
        assert_eq!(tracker.classify(94, 100), TransactionStatus::Sent);
        // a lagging height source must not underflow
        assert_eq!(tracker.classify(101, 100), TransactionStatus::Processing);
    }

    #[tokio::test]
    async fn test_included_and_confirmed() {
        let tracker = ConfirmationTracker::new(5);
        let result = tracker.poll(&Fixed::new(Some(Sighting::Included(94)), None, 100), "0xabc").await;

        assert_eq!(result.status, TransactionStatus::Sent);
        let info = result.info.unwrap();
        assert_eq!(info.id, "0xabc");
        assert!(info.message.contains("94"));
        assert!(info.sent_time.is_some());
    }

    #[tokio::test]
    async fn test_included_not_deep_enough() {
        let tracker = ConfirmationTracker::new(5);
        let result = tracker.poll(&Fixed::new(Some(Sighting::Included(96)), None, 100), "0xabc").await;
        assert_eq!(result.status, TransactionStatus::Processing);
    }

    #[tokio::test]
    async fn test_missing_everywhere_is_rejected() {
        let tracker = ConfirmationTracker::new(5);
        let result = tracker.poll(&Fixed::new(None, None, 100), "0xabc").await;
        assert_eq!(result.status, TransactionStatus::Rejected);
    }

    #[tokio::test]
    async fn test_in_flight_states() {
        let tracker = ConfirmationTracker::new(5);

        let pending = tracker.poll(&Fixed::new(None, Some(InFlight::Pending), 100), "h").await;
        assert_eq!(pending.status, TransactionStatus::Pending);

        let failed = tracker
            .poll(&Fixed::new(None, Some(InFlight::Failed("bad nonce".to_string())), 100), "h")
            .await;
        assert_eq!(failed.status, TransactionStatus::Rejected);
        assert_eq!(failed.error.as_deref(), Some("bad nonce"));
    }

    #[tokio::test]
    async fn test_unmined_and_failed_sightings() {
        let tracker = ConfirmationTracker::new(5);

        let unmined = tracker.poll(&Fixed::new(Some(Sighting::Unmined), None, 100), "h").await;
        assert_eq!(unmined.status, TransactionStatus::Pending);

        let reverted = tracker
            .poll(&Fixed::new(Some(Sighting::Failed("reverted".to_string())), None, 100), "h")
            .await;
        assert_eq!(reverted.status, TransactionStatus::Rejected);
    }

    #[tokio::test]
    async fn test_transport_failures_become_error_status() {
        let tracker = ConfirmationTracker::new(5);

        let mut lookup = Fixed::new(None, None, 100);
        lookup.sighting = Err(LedgerError::Timeout("node slow".to_string()));
        let result = tracker.poll(&lookup, "h").await;
        assert_eq!(result.status, TransactionStatus::Error);
        assert!(result.error.unwrap().contains("node slow"));

        let mut lookup = Fixed::new(Some(Sighting::Included(90)), None, 100);
        lookup.height = Err(LedgerError::Transport("connection reset".to_string()));
        assert_eq!(tracker.poll(&lookup, "h").await.status, TransactionStatus::Error);

        let mut lookup = Fixed::new(None, None, 100);
        lookup.in_flight = Err(LedgerError::Transport("connection reset".to_string()));
        assert_eq!(tracker.poll(&lookup, "h").await.status, TransactionStatus::Error);
    }
}
