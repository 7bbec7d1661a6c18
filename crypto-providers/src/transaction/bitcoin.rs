//! Bitcoin transfers over unspent outputs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use ethers::types::U256;
use tracing::{debug, info, warn};

use crate::config::Network;
use crate::crypto::keys::bitcoin as keys;
use crate::error::{Error, Result};
use crate::ledger::bitcoin::{BitcoinSigner, TxOutput, UnsignedBitcoinTx, Utxo, UtxoLedger};
use crate::ledger::LedgerResult;
use crate::units::{from_native, native_to_u64, to_native};
use super::provider::CryptoProvider;
use super::tracker::{ConfirmationTracker, InFlight, Sighting, TransactionLookup};
use super::types::{
    BitcoinTxInfo, BlockRef, GasParams, KeyPair, PayloadInfo, Receipt, SendResult, TransactionIntent,
    TransactionPayload,
};

const DECIMALS: u32 = Network::Bitcoin.native_decimals();
/// Outputs below this many satoshis are not relayed
pub const DUST_LIMIT: u64 = 546;

/// Virtual size estimate for a P2PKH transaction
pub fn estimate_fee(inputs: usize, outputs: usize, fee_rate: u64) -> u64 {
    (10 + 148 * inputs as u64 + 34 * outputs as u64).saturating_mul(fee_rate)
}

/// Outcome of coin selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Outputs spent
    pub inputs: Vec<Utxo>,
    /// Satoshis delivered to the recipient
    pub amount: u64,
    /// Satoshis returned to the sender
    pub change: Option<u64>,
    /// Satoshis left to the miner
    pub fee: u64,
}

/// Greedy largest-first selection.
///
/// Change below [`DUST_LIMIT`] is left to the miner. With `subtract_fee`
/// the recipient receives `amount - fee`.
pub fn select_coins(utxos: &[Utxo], amount: u64, fee_rate: u64, subtract_fee: bool) -> Result<Selection> {
    if amount == 0 {
        return Err(Error::InvalidAmount("Amount must be positive".to_string()));
    }

    let mut sorted = utxos.to_vec();
    sorted.sort_by(|a, b| b.value.cmp(&a.value));

    let mut inputs = Vec::new();
    let mut total: u64 = 0;
    for utxo in sorted {
        total = total.saturating_add(utxo.value);
        inputs.push(utxo);
        let n = inputs.len();

        if subtract_fee {
            if total < amount {
                continue;
            }
            let change = total - amount;
            let (fee, change) = if change >= DUST_LIMIT {
                (estimate_fee(n, 2, fee_rate), Some(change))
            } else {
                (estimate_fee(n, 1, fee_rate), None)
            };
            if amount <= fee {
                return Err(Error::InvalidAmount(format!("Fee {} sat exceeds amount {} sat", fee, amount)));
            }
            let sent = amount - fee;
            if sent < DUST_LIMIT {
                return Err(Error::InvalidAmount(format!("Amount after fee ({} sat) is dust", sent)));
            }
            let fee = total - sent - change.unwrap_or(0);
            return Ok(Selection { inputs, amount: sent, change, fee });
        }

        let with_change = estimate_fee(n, 2, fee_rate);
        if total >= amount.saturating_add(with_change) {
            let change = total - amount - with_change;
            return Ok(if change >= DUST_LIMIT {
                Selection { inputs, amount, change: Some(change), fee: with_change }
            } else {
                Selection { inputs, amount, change: None, fee: total - amount }
            });
        }
        if total >= amount.saturating_add(estimate_fee(n, 1, fee_rate)) {
            return Ok(Selection { inputs, amount, change: None, fee: total - amount });
        }
    }

    Err(Error::InsufficientFunds(format!(
        "Unspent outputs total {} sat, {} sat plus fee required",
        total, amount
    )))
}

/// Bitcoin provider
pub struct BitcoinProvider {
    ledger: Arc<dyn UtxoLedger>,
    signer: Arc<dyn BitcoinSigner>,
    network: ::bitcoin::Network,
    tracker: ConfirmationTracker,
}

impl BitcoinProvider {
    /// Create a new Bitcoin provider
    pub fn new(
        ledger: Arc<dyn UtxoLedger>,
        signer: Arc<dyn BitcoinSigner>,
        network: ::bitcoin::Network,
        confirmations: u64,
    ) -> Self {
        Self { ledger, signer, network, tracker: ConfirmationTracker::new(confirmations) }
    }
}

struct UtxoLookup {
    ledger: Arc<dyn UtxoLedger>,
}

#[async_trait]
impl TransactionLookup for UtxoLookup {
    async fn lookup(&self, id: &str) -> LedgerResult<Option<Sighting>> {
        Ok(self.ledger.transaction(id).await?.map(|tx| match tx.block_height {
            Some(height) => Sighting::Included(height),
            None => Sighting::Unmined,
        }))
    }

    async fn lookup_in_flight(&self, id: &str) -> LedgerResult<Option<InFlight>> {
        Ok(self.ledger.in_mempool(id).await?.then_some(InFlight::Pending))
    }

    async fn chain_height(&self) -> LedgerResult<u64> {
        self.ledger.block_height().await
    }
}

#[async_trait]
impl CryptoProvider for BitcoinProvider {
    fn network(&self) -> Network {
        Network::Bitcoin
    }

    fn generate_key_pair(&self, path: Option<&str>) -> Result<KeyPair> {
        let key_pair = keys::generate_key_pair(path, self.network)?;
        if !keys::is_valid_address(&key_pair.address, self.network) {
            return Err(Error::KeyGeneration(format!("Produced an invalid address: {}", key_pair.address)));
        }
        Ok(key_pair)
    }

    fn validate_transaction_options(&self, intent: &TransactionIntent) -> bool {
        if !keys::is_valid_address(&intent.agent.address, self.network)
            || !keys::is_valid_address(&intent.credentials.address, self.network)
        {
            return false;
        }
        keys::parse_private_key(&intent.agent.private_key)
            .map(|key| keys::addresses_of(&key, self.network).contains(&intent.agent.address.trim().to_string()))
            .unwrap_or(false)
    }

    async fn balance_by_address(&self, address: &str, at: Option<BlockRef>) -> Result<String> {
        if at.is_some() {
            return Err(Error::Validation("Historical balances are not available on btc".to_string()));
        }
        if !keys::is_valid_address(address, self.network) {
            return Err(Error::Validation(format!("Invalid holder address: {}", address)));
        }

        let unspent = self.ledger.unspent(address).await.map_err(|e| Error::lookup("unspent lookup", e))?;
        let total = unspent.iter().fold(0u64, |acc, utxo| acc.saturating_add(utxo.value));
        Ok(from_native(U256::from(total), DECIMALS))
    }

    async fn tx_create(&self, intent: &TransactionIntent) -> Result<TransactionPayload> {
        if !self.validate_transaction_options(intent) {
            return Err(Error::Validation("Sender key does not control the sender address or an address is malformed".to_string()));
        }
        let private_key = keys::parse_private_key(&intent.agent.private_key)?;
        let sender = intent.agent.address.trim().to_string();
        let amount = native_to_u64(to_native(&intent.value, DECIMALS)?)?;

        let unspent = self.ledger.unspent(&sender).await.map_err(|e| Error::lookup("unspent lookup", e))?;
        let fee_rate = self.ledger.fee_rate().await.map_err(|e| Error::lookup("fee rate lookup", e))?;
        let selection = select_coins(&unspent, amount, fee_rate, intent.subtract_fee)?;
        debug!(
            network = %Network::Bitcoin,
            address = %sender,
            inputs = selection.inputs.len(),
            fee = selection.fee,
            fee_rate,
            "Selected coins"
        );

        let mut outputs = vec![TxOutput { address: intent.credentials.address.trim().to_string(), value: selection.amount }];
        if let Some(change) = selection.change {
            outputs.push(TxOutput { address: sender, value: change });
        }
        let unsigned = UnsignedBitcoinTx { inputs: selection.inputs, outputs };
        let data = self.signer.sign(&unsigned, &private_key)?;

        Ok(TransactionPayload {
            data,
            info: PayloadInfo::Bitcoin(BitcoinTxInfo {
                inputs: unsigned.inputs.iter().map(Utxo::outpoint).collect(),
                amount: selection.amount,
                change: selection.change,
                fee: selection.fee,
                fee_rate,
            }),
            gas_params: Some(GasParams { gas_value: from_native(U256::from(selection.fee), DECIMALS) }),
        })
    }

    async fn tx_transfer_raw(&self, payload: &TransactionPayload) -> Result<String> {
        match self.ledger.broadcast(&payload.data).await {
            Ok(txid) => {
                info!(network = %Network::Bitcoin, tx_id = %txid, "Broadcast transaction");
                Ok(txid)
            }
            Err(e) => {
                warn!(network = %Network::Bitcoin, error = %e, "Broadcast failed");
                Err(Error::broadcast(e))
            }
        }
    }

    async fn tx_get_sending_result(&self, id: &str) -> SendResult {
        let lookup = UtxoLookup { ledger: self.ledger.clone() };
        self.tracker.poll(&lookup, id).await
    }

    async fn tx_get_receipt(&self, id: &str) -> Result<Option<Receipt>> {
        let Some(tx) = self.ledger.transaction(id).await.map_err(|e| Error::lookup("transaction lookup", e))? else {
            return Ok(None);
        };
        let confirmations = match tx.block_height {
            Some(height) => {
                let chain_height = self.ledger.block_height().await.map_err(|e| Error::lookup("height lookup", e))?;
                Some(chain_height.saturating_sub(height) + 1)
            }
            None => None,
        };

        Ok(Some(Receipt {
            block: tx.block_height,
            block_hash: tx.block_hash,
            hash: tx.txid,
            from: Vec::new(),
            to: Vec::new(),
            amount: None,
            date: tx.block_time.and_then(|t| Utc.timestamp_opt(t, 0).single()),
            confirmations,
            logs: Vec::new(),
            raw: tx.raw,
        }))
    }
}
