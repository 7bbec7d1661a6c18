//! Native Ethereum transfers

use std::sync::Arc;

use async_trait::async_trait;
use ethers::prelude::{TransactionRequest as EthersTransactionRequest, U256};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::utils::to_checksum;
use tracing::debug;

use crate::config::Network;
use crate::crypto::keys::ethereum;
use crate::error::{Error, Result};
use crate::ledger::evm::EvmLedger;
use crate::ledger::NonceMode;
use crate::units::{from_native, to_native};
use super::evm::{self, EvmLookup};
use super::provider::CryptoProvider;
use super::tracker::ConfirmationTracker;
use super::types::{
    BlockRef, EvmTxInfo, GasParams, KeyPair, PayloadInfo, Receipt, SendResult, TransactionIntent,
    TransactionPayload,
};

/// Gas used by a plain value transfer
pub const TRANSFER_GAS: u64 = 21_000;

const DECIMALS: u32 = Network::Ethereum.native_decimals();

/// Ethereum provider
pub struct EthereumProvider {
    /// Node client
    ledger: Arc<dyn EvmLedger>,
    /// Confirmation tracker
    tracker: ConfirmationTracker,
}

impl EthereumProvider {
    /// Create a new Ethereum provider
    pub fn new(ledger: Arc<dyn EvmLedger>, confirmations: u64) -> Self {
        Self { ledger, tracker: ConfirmationTracker::new(confirmations) }
    }
}

#[async_trait]
impl CryptoProvider for EthereumProvider {
    fn network(&self) -> Network {
        Network::Ethereum
    }

    fn generate_key_pair(&self, path: Option<&str>) -> Result<KeyPair> {
        let key_pair = ethereum::generate_key_pair(path)?;
        if !ethereum::is_valid_address(&key_pair.address) {
            return Err(Error::KeyGeneration(format!("Produced an invalid address: {}", key_pair.address)));
        }
        Ok(key_pair)
    }

    fn validate_transaction_options(&self, intent: &TransactionIntent) -> bool {
        evm::validate_intent(intent)
    }

    async fn balance_by_address(&self, address: &str, at: Option<BlockRef>) -> Result<String> {
        let holder = evm::require_address(address, "holder")?;
        let block = evm::resolve_block(self.ledger.as_ref(), at).await?;
        let balance = self
            .ledger
            .balance(holder, block)
            .await
            .map_err(|e| Error::lookup("balance lookup", e))?;
        Ok(from_native(balance, DECIMALS))
    }

    async fn tx_create(&self, intent: &TransactionIntent) -> Result<TransactionPayload> {
        if !self.validate_transaction_options(intent) {
            return Err(Error::Validation("Sender key does not control the sender address or an address is malformed".to_string()));
        }
        let from = evm::require_address(&intent.agent.address, "sender")?;
        let to = evm::require_address(&intent.credentials.address, "recipient")?;
        let amount = to_native(&intent.value, DECIMALS)?;

        let nonce = match intent.explicit_nonce()? {
            Some(nonce) => U256::from(nonce),
            None => self
                .ledger
                .transaction_count(from, NonceMode::Latest)
                .await
                .map_err(|e| Error::lookup("nonce lookup", e))?,
        };
        let gas_price = self.ledger.gas_price().await.map_err(|e| Error::lookup("gas price lookup", e))?;
        let fee = gas_price
            .checked_mul(U256::from(TRANSFER_GAS))
            .ok_or_else(|| Error::InvalidAmount("Fee overflows".to_string()))?;

        let value = if intent.subtract_fee {
            if amount <= fee {
                return Err(Error::InvalidAmount(format!(
                    "Fee {} exceeds amount {}",
                    from_native(fee, DECIMALS),
                    from_native(amount, DECIMALS)
                )));
            }
            amount - fee
        } else {
            amount
        };
        if value.is_zero() {
            return Err(Error::InvalidAmount("Amount must be positive".to_string()));
        }

        let balance = self
            .ledger
            .balance(from, None)
            .await
            .map_err(|e| Error::lookup("balance lookup", e))?;
        let required = value.saturating_add(fee);
        if balance < required {
            return Err(Error::InsufficientFunds(format!(
                "Balance {} below required {}",
                from_native(balance, DECIMALS),
                from_native(required, DECIMALS)
            )));
        }

        let block_height = self.ledger.block_number().await.map_err(|e| Error::lookup("block height lookup", e))?;
        let chain_id = self.ledger.chain_id().await.map_err(|e| Error::lookup("chain id lookup", e))?;
        debug!(
            network = %Network::Ethereum,
            address = %to_checksum(&from, None),
            nonce = %nonce,
            gas_price = %gas_price,
            subtract_fee = intent.subtract_fee,
            "Building transfer"
        );

        let request = EthersTransactionRequest::new()
            .from(from)
            .to(to)
            .value(value)
            .gas(TRANSFER_GAS)
            .gas_price(gas_price)
            .nonce(nonce);
        let wallet = ethereum::wallet_from_private_key(&intent.agent.private_key)?;
        let signed = evm::sign(&wallet, TypedTransaction::Legacy(request), chain_id)?;

        Ok(TransactionPayload {
            data: format!("0x{}", hex::encode(&signed)),
            info: PayloadInfo::Evm(EvmTxInfo {
                nonce: nonce.low_u64(),
                gas_price: gas_price.to_string(),
                gas_limit: TRANSFER_GAS,
                value: value.to_string(),
                create_block_height: block_height,
            }),
            gas_params: Some(GasParams { gas_value: from_native(fee, DECIMALS) }),
        })
    }

    async fn tx_transfer_raw(&self, payload: &TransactionPayload) -> Result<String> {
        evm::broadcast(self.ledger.as_ref(), payload).await
    }

    async fn tx_get_sending_result(&self, id: &str) -> SendResult {
        let Some(hash) = evm::parse_hash(id) else {
            return SendResult::rejected(format!("Malformed transaction id: {}", id));
        };
        let lookup = EvmLookup { ledger: self.ledger.clone(), hash };
        self.tracker.poll(&lookup, id).await
    }

    async fn tx_get_receipt(&self, id: &str) -> Result<Option<Receipt>> {
        let hash = evm::parse_hash(id).ok_or_else(|| Error::Validation(format!("Malformed transaction id: {}", id)))?;
        let Some((receipt, transaction)) = evm::fetch_receipt(self.ledger.as_ref(), hash).await? else {
            return Ok(None);
        };
        let height = self.ledger.block_number().await.map_err(|e| Error::lookup("block height lookup", e))?;

        let to = receipt.to.map(|to| vec![to_checksum(&to, None)]).unwrap_or_default();
        let amount = transaction.map(|tx| from_native(tx.value, DECIMALS));
        Ok(Some(evm::to_receipt(&receipt, Some(height), to, amount)))
    }
}
