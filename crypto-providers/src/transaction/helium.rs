//! Helium payments priced in data credits

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use ethers::types::U256;
use tracing::{debug, info, warn};

use crate::config::Network;
use crate::crypto::keys::helium;
use crate::error::{Error, Result};
use crate::ledger::helium::{ChainVars, HeliumLedger, HeliumPayment, HeliumSigner, OraclePrice, PendingStatus};
use crate::ledger::LedgerResult;
use crate::units::{from_native, native_to_u64, to_native};
use super::provider::CryptoProvider;
use super::tracker::{ConfirmationTracker, InFlight, Sighting, TransactionLookup};
use super::types::{
    BlockRef, GasParams, HeliumTxInfo, KeyPair, PayloadInfo, Receipt, SendResult, TransactionIntent,
    TransactionPayload,
};

const DECIMALS: u32 = Network::Helium.native_decimals();
/// Added to every fee, in bones (0.01 HNT)
pub const FEE_MARGIN_BONES: u64 = 1_000_000;
// 1 DC = 0.00001 USD, oracle prices carry 8 decimals, 1 HNT = 10^8 bones
const DC_TO_BONES_NUMERATOR: u128 = 100_000_000_000;

/// Fee in data credits for a payload of `payload_len` bytes
pub fn fee_in_dc(payload_len: usize, vars: &ChainVars) -> u64 {
    let chunk = vars.dc_payload_size.max(1);
    let chunks = (payload_len as u64).div_ceil(chunk).max(1);
    chunks.saturating_mul(vars.txn_fee_multiplier)
}

/// Convert a data-credit fee into bones at the highest oracle price, plus the margin
pub fn fee_in_bones(fee_dc: u64, prices: &[OraclePrice]) -> Result<u64> {
    let price = prices
        .iter()
        .filter_map(|p| p.price)
        .filter(|p| *p > 0)
        .max()
        .ok_or_else(|| Error::Lookup("Oracle price feed is empty".to_string()))?;

    let bones = (fee_dc as u128 * DC_TO_BONES_NUMERATOR).div_ceil(price as u128);
    let bones = u64::try_from(bones).map_err(|_| Error::InvalidAmount(format!("Fee of {} DC overflows", fee_dc)))?;
    Ok(bones.saturating_add(FEE_MARGIN_BONES))
}

/// Helium provider
pub struct HeliumProvider {
    ledger: Arc<dyn HeliumLedger>,
    signer: Arc<dyn HeliumSigner>,
    tracker: ConfirmationTracker,
}

impl HeliumProvider {
    /// Create a new Helium provider
    pub fn new(ledger: Arc<dyn HeliumLedger>, signer: Arc<dyn HeliumSigner>, confirmations: u64) -> Self {
        Self { ledger, signer, tracker: ConfirmationTracker::new(confirmations) }
    }
}

struct HeliumLookup {
    ledger: Arc<dyn HeliumLedger>,
}

#[async_trait]
impl TransactionLookup for HeliumLookup {
    async fn lookup(&self, id: &str) -> LedgerResult<Option<Sighting>> {
        Ok(self.ledger.transaction(id).await?.map(|tx| {
            if !tx.is_payment() {
                Sighting::Failed(format!("{} is a {} transaction, not a payment", id, tx.kind))
            } else {
                match tx.height {
                    Some(height) => Sighting::Included(height),
                    None => Sighting::Unmined,
                }
            }
        }))
    }

    async fn lookup_in_flight(&self, id: &str) -> LedgerResult<Option<InFlight>> {
        let pending = self.ledger.pending_transactions(id).await?;
        Ok(pending.into_iter().next().map(|entry| match entry.status {
            PendingStatus::Failed => {
                InFlight::Failed(entry.failed_reason.unwrap_or_else(|| "dropped by the chain".to_string()))
            }
            // cleared but not yet indexed
            PendingStatus::Pending | PendingStatus::Cleared => InFlight::Pending,
        }))
    }

    async fn chain_height(&self) -> LedgerResult<u64> {
        self.ledger.height().await
    }
}

#[async_trait]
impl CryptoProvider for HeliumProvider {
    fn network(&self) -> Network {
        Network::Helium
    }

    fn generate_key_pair(&self, _path: Option<&str>) -> Result<KeyPair> {
        helium::generate_key_pair()
    }

    fn validate_transaction_options(&self, intent: &TransactionIntent) -> bool {
        helium::is_valid_address(&intent.agent.address)
            && helium::is_valid_address(&intent.credentials.address)
            && helium::words_control_address(&intent.agent.private_key, &intent.agent.address)
    }

    async fn balance_by_address(&self, address: &str, at: Option<BlockRef>) -> Result<String> {
        if at.is_some() {
            return Err(Error::Validation("Historical balances are not available on hnt".to_string()));
        }
        if !helium::is_valid_address(address) {
            return Err(Error::Validation(format!("Invalid holder address: {}", address)));
        }

        let account = self
            .ledger
            .account(address)
            .await
            .map_err(|e| Error::lookup("account lookup", e))?
            .ok_or_else(|| Error::Lookup(format!("Account {} not found", address)))?;
        Ok(from_native(U256::from(account.balance), DECIMALS))
    }

    async fn tx_create(&self, intent: &TransactionIntent) -> Result<TransactionPayload> {
        if !self.validate_transaction_options(intent) {
            return Err(Error::Validation("Sender words do not control the sender address or an address is malformed".to_string()));
        }
        let amount = native_to_u64(to_native(&intent.value, DECIMALS)?)?;
        let payer = intent.agent.address.trim().to_string();
        let payee = intent.credentials.address.trim().to_string();

        let account = self
            .ledger
            .account(&payer)
            .await
            .map_err(|e| Error::lookup("account lookup", e))?
            .ok_or_else(|| Error::Lookup(format!("Account {} not found", payer)))?;
        let vars = self.ledger.chain_vars().await.map_err(|e| Error::lookup("chain vars lookup", e))?;
        let nonce = match intent.explicit_nonce()? {
            Some(nonce) => nonce,
            None => account.speculative_nonce + 1,
        };

        let mut payment = HeliumPayment { payer, payee, amount, fee: 0, nonce };
        let fee_dc = fee_in_dc(self.signer.encoded_len(&payment), &vars);
        let prices = self.ledger.oracle_prices().await.map_err(|e| Error::lookup("oracle price lookup", e))?;
        let fee = fee_in_bones(fee_dc, &prices)?;

        let final_amount = if intent.subtract_fee {
            if amount <= fee {
                return Err(Error::InvalidAmount(format!(
                    "Fee {} exceeds amount {}",
                    from_native(U256::from(fee), DECIMALS),
                    from_native(U256::from(amount), DECIMALS)
                )));
            }
            amount - fee
        } else {
            amount
        };
        if final_amount == 0 {
            return Err(Error::InvalidAmount("Amount must be positive".to_string()));
        }

        let required = final_amount.saturating_add(fee);
        if account.balance < required {
            return Err(Error::InsufficientFunds(format!(
                "Balance {} below required {}",
                from_native(U256::from(account.balance), DECIMALS),
                from_native(U256::from(required), DECIMALS)
            )));
        }
        debug!(network = %Network::Helium, address = %payment.payer, nonce, fee_dc, fee, "Building payment");

        payment.amount = final_amount;
        payment.fee = fee;
        let signing_key = helium::signing_key_from_words(&intent.agent.private_key)?;
        let data = self.signer.sign(&payment, &signing_key)?;

        Ok(TransactionPayload {
            data,
            info: PayloadInfo::Helium(HeliumTxInfo {
                payer: payment.payer,
                payee: payment.payee,
                amount: final_amount,
                fee,
                fee_dc,
                nonce,
            }),
            gas_params: Some(GasParams { gas_value: from_native(U256::from(fee), DECIMALS) }),
        })
    }

    async fn tx_transfer_raw(&self, payload: &TransactionPayload) -> Result<String> {
        match self.ledger.submit(&payload.data).await {
            Ok(hash) => {
                info!(network = %Network::Helium, tx_id = %hash, "Broadcast transaction");
                Ok(hash)
            }
            Err(e) => {
                warn!(network = %Network::Helium, error = %e, "Broadcast failed");
                Err(Error::broadcast(e))
            }
        }
    }

    async fn tx_get_sending_result(&self, id: &str) -> SendResult {
        let lookup = HeliumLookup { ledger: self.ledger.clone() };
        self.tracker.poll(&lookup, id).await
    }

    async fn tx_get_receipt(&self, id: &str) -> Result<Option<Receipt>> {
        let Some(tx) = self.ledger.transaction(id).await.map_err(|e| Error::lookup("transaction lookup", e))? else {
            return Ok(None);
        };
        let confirmations = match tx.height {
            Some(height) => {
                let chain_height = self.ledger.height().await.map_err(|e| Error::lookup("height lookup", e))?;
                Some(chain_height.saturating_sub(height) + 1)
            }
            None => None,
        };

        Ok(Some(Receipt {
            block: tx.height,
            block_hash: None,
            hash: tx.hash,
            from: tx.payer.into_iter().collect(),
            to: tx.payee.into_iter().collect(),
            amount: tx.amount.map(|a| from_native(U256::from(a), DECIMALS)),
            date: tx.time.and_then(|t| Utc.timestamp_opt(t, 0).single()),
            confirmations,
            logs: Vec::new(),
            raw: tx.raw,
        }))
    }
}
