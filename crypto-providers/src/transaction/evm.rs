//! Plumbing shared by the EVM providers

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Transaction, TransactionReceipt, H256};
use ethers::utils::to_checksum;
use ethers_signers::{LocalWallet, Signer};
use tracing::{info, warn};

use crate::crypto::keys::ethereum;
use crate::error::{Error, Result};
use crate::ledger::evm::EvmLedger;
use crate::ledger::LedgerResult;
use super::tracker::{InFlight, Sighting, TransactionLookup};
use super::types::{BlockRef, Log, Receipt, TransactionIntent, TransactionPayload};

/// Parse an address or fail with a validation error naming the field
pub(crate) fn require_address(address: &str, field: &str) -> Result<Address> {
    ethereum::parse_address(address)
        .ok_or_else(|| Error::Validation(format!("Invalid {} address: {}", field, address)))
}

/// Address formats plus key ownership, without touching the network
pub(crate) fn validate_intent(intent: &TransactionIntent) -> bool {
    let (Some(from), Some(_)) = (
        ethereum::parse_address(&intent.agent.address),
        ethereum::parse_address(&intent.credentials.address),
    ) else {
        return false;
    };

    ethereum::address_of(&intent.agent.private_key)
        .map(|owner| owner == from)
        .unwrap_or(false)
}

/// Sign `tx` for `chain_id` and return the RLP-encoded signed transaction
pub(crate) fn sign(wallet: &LocalWallet, mut tx: TypedTransaction, chain_id: u64) -> Result<Bytes> {
    tx.set_chain_id(chain_id);
    let wallet = wallet.clone().with_chain_id(chain_id);
    let signature = wallet
        .sign_transaction_sync(&tx)
        .map_err(|e| Error::Signing(format!("Failed to sign transaction: {}", e)))?;
    Ok(tx.rlp_signed(&signature))
}

/// Submit a signed payload and return the `0x` transaction hash
pub(crate) async fn broadcast(ledger: &dyn EvmLedger, payload: &TransactionPayload) -> Result<String> {
    let raw = Bytes::from_str(&payload.data)
        .map_err(|e| Error::Validation(format!("Payload is not hex encoded: {}", e)))?;

    match ledger.send_raw_transaction(raw).await {
        Ok(hash) => {
            let id = format!("{:#x}", hash);
            info!(tx_id = %id, "Broadcast transaction");
            Ok(id)
        }
        Err(e) => {
            warn!(error = %e, "Broadcast failed");
            Err(Error::broadcast(e))
        }
    }
}

/// Parse a transaction id
pub(crate) fn parse_hash(id: &str) -> Option<H256> {
    let hex_part = id.trim().strip_prefix("0x")?;
    if hex_part.len() != 64 {
        return None;
    }
    H256::from_str(hex_part).ok()
}

/// Resolve an optional historical point to a block height
pub(crate) async fn resolve_block(ledger: &dyn EvmLedger, at: Option<BlockRef>) -> Result<Option<u64>> {
    match at {
        None => Ok(None),
        Some(BlockRef::Number(number)) => Ok(Some(number)),
        Some(BlockRef::Hash(hash)) => {
            let hash = parse_hash(&hash).ok_or_else(|| Error::Validation(format!("Invalid block hash: {}", hash)))?;
            ledger
                .block_number_by_hash(hash)
                .await
                .map_err(|e| Error::lookup("block lookup", e))?
                .map(Some)
                .ok_or_else(|| Error::Lookup(format!("Block {:#x} not found", hash)))
        }
    }
}

/// Tracker lookups backed by receipts and the node's transaction pool
pub(crate) struct EvmLookup {
    pub(crate) ledger: Arc<dyn EvmLedger>,
    pub(crate) hash: H256,
}

#[async_trait]
impl TransactionLookup for EvmLookup {
    async fn lookup(&self, _id: &str) -> LedgerResult<Option<Sighting>> {
        let receipt = match self.ledger.transaction_receipt(self.hash).await? {
            Some(receipt) => receipt,
            None => return Ok(None),
        };

        if receipt.status.map(|s| s.is_zero()).unwrap_or(false) {
            return Ok(Some(Sighting::Failed("execution reverted".to_string())));
        }
        Ok(Some(match receipt.block_number {
            Some(number) => Sighting::Included(number.as_u64()),
            None => Sighting::Unmined,
        }))
    }

    async fn lookup_in_flight(&self, _id: &str) -> LedgerResult<Option<InFlight>> {
        Ok(self.ledger.transaction(self.hash).await?.map(|_| InFlight::Pending))
    }

    async fn chain_height(&self) -> LedgerResult<u64> {
        self.ledger.block_number().await
    }
}

/// Receipt and transaction of a mined hash, `None` when not mined
pub(crate) async fn fetch_receipt(
    ledger: &dyn EvmLedger,
    hash: H256,
) -> Result<Option<(TransactionReceipt, Option<Transaction>)>> {
    let receipt = match ledger.transaction_receipt(hash).await.map_err(|e| Error::lookup("receipt lookup", e))? {
        Some(receipt) => receipt,
        None => return Ok(None),
    };
    let transaction = ledger.transaction(hash).await.map_err(|e| Error::lookup("transaction lookup", e))?;
    Ok(Some((receipt, transaction)))
}

/// Convert an ethers receipt; `amount` and `to` are filled by the caller's view of the transfer
pub(crate) fn to_receipt(
    receipt: &TransactionReceipt,
    chain_height: Option<u64>,
    to: Vec<String>,
    amount: Option<String>,
) -> Receipt {
    let block = receipt.block_number.map(|n| n.as_u64());
    let confirmations = match (block, chain_height) {
        (Some(block), Some(height)) => Some(height.saturating_sub(block) + 1),
        _ => None,
    };

    Receipt {
        block,
        block_hash: receipt.block_hash.map(|h| format!("{:#x}", h)),
        hash: format!("{:#x}", receipt.transaction_hash),
        from: vec![to_checksum(&receipt.from, None)],
        to,
        amount,
        date: None,
        confirmations,
        logs: receipt
            .logs
            .iter()
            .map(|log| Log {
                address: to_checksum(&log.address, None),
                data: format!("0x{}", hex::encode(&log.data)),
                topics: log.topics.iter().map(|t| format!("{:#x}", t)).collect(),
                log_index: log.log_index.map(|i| i.as_u64()),
            })
            .collect(),
        raw: serde_json::to_value(receipt).unwrap_or(serde_json::Value::Null),
    }
}
