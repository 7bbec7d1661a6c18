//! ERC-20 token transfers
//!
//! Token metadata (decimals) is resolved once by `initialize`; balance and
//! construction refuse to run before that. Fees are paid in the native coin,
//! so the fee never comes out of the token amount.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::AbiEncode;
use ethers::prelude::{TransactionRequest as EthersTransactionRequest, U256};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionReceipt, H256};
use ethers::utils::{keccak256, to_checksum};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::Network;
use crate::crypto::keys::ethereum;
use crate::error::{Error, Result};
use crate::ledger::evm::{EvmLedger, TransferCall};
use crate::ledger::NonceMode;
use crate::units::{from_native, to_native};
use super::evm::{self, EvmLookup};
use super::provider::CryptoProvider;
use super::tracker::ConfirmationTracker;
use super::types::{
    BlockRef, GasParams, KeyPair, PayloadInfo, Receipt, SendResult, TokenTxInfo, TransactionIntent,
    TransactionPayload,
};

const GWEI: u64 = 1_000_000_000;
/// Margin added to the oracle gas price
pub const GAS_PRICE_MARGIN_GWEI: u64 = 5;
/// Ceiling on the gas price
pub const GAS_PRICE_CEILING_GWEI: u64 = 950;
/// Allowance added on top of the simulated gas requirement
pub const BASE_GAS_LIMIT: u64 = 25_000;

const NATIVE_DECIMALS: u32 = Network::EthereumToken.native_decimals();

/// Contract metadata resolved by `initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMetadata {
    /// Contract `decimals()`
    pub decimals: u8,
    /// Contract address
    pub contract: Address,
}

/// ERC-20 provider
pub struct TokenProvider {
    ledger: Arc<dyn EvmLedger>,
    contract: Address,
    ticker: String,
    metadata: OnceCell<TokenMetadata>,
    tracker: ConfirmationTracker,
}

impl TokenProvider {
    /// Create a provider for the token at `contract_id`. No network access.
    pub fn new(ledger: Arc<dyn EvmLedger>, contract_id: &str, ticker: &str, confirmations: u64) -> Result<Self> {
        let contract = ethereum::parse_address(contract_id)
            .ok_or_else(|| Error::Configuration(format!("Invalid token contract address: {}", contract_id)))?;

        Ok(Self {
            ledger,
            contract,
            ticker: ticker.to_string(),
            metadata: OnceCell::new(),
            tracker: ConfirmationTracker::new(confirmations),
        })
    }

    /// Resolved metadata, `None` before `initialize`
    pub fn metadata(&self) -> Option<&TokenMetadata> {
        self.metadata.get()
    }

    fn ready(&self) -> Result<&TokenMetadata> {
        self.metadata
            .get()
            .ok_or_else(|| Error::NotInitialized(format!("{} token metadata has not been resolved", self.ticker)))
    }

    /// `min(oracle + margin, ceiling)`
    pub fn gas_price(oracle: U256) -> U256 {
        let margined = oracle.saturating_add(U256::from(GAS_PRICE_MARGIN_GWEI * GWEI));
        margined.min(U256::from(GAS_PRICE_CEILING_GWEI * GWEI))
    }

    fn transfer_log(&self, receipt: &TransactionReceipt) -> Option<(Address, U256)> {
        let topic = H256::from(keccak256("Transfer(address,address,uint256)"));
        receipt
            .logs
            .iter()
            .filter(|log| log.address == self.contract && log.topics.len() == 3 && log.topics[0] == topic)
            .find_map(|log| {
                if log.data.len() != 32 {
                    return None;
                }
                let to = Address::from_slice(&log.topics[2].as_bytes()[12..]);
                Some((to, U256::from_big_endian(&log.data)))
            })
    }
}

#[async_trait]
impl CryptoProvider for TokenProvider {
    fn network(&self) -> Network {
        Network::EthereumToken
    }

    fn is_token(&self) -> bool {
        true
    }

    async fn initialize(&self) -> Result<()> {
        let contract = self.contract;
        let ledger = self.ledger.clone();
        let metadata = self
            .metadata
            .get_or_try_init(|| async move {
                let decimals = ledger
                    .token_decimals(contract)
                    .await
                    .map_err(|e| Error::lookup("token decimals lookup", e))?;
                Ok::<_, Error>(TokenMetadata { decimals, contract })
            })
            .await?;

        info!(network = %Network::EthereumToken, ticker = %self.ticker, decimals = metadata.decimals, "Token provider ready");
        Ok(())
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
        let metadata = *self.ready()?;
        let holder = evm::require_address(address, "holder")?;
        let block = evm::resolve_block(self.ledger.as_ref(), at).await?;

        let balance = self
            .ledger
            .token_balance(metadata.contract, holder, block)
            .await
            .map_err(|e| Error::lookup("token balance lookup", e))?;
        Ok(from_native(balance, metadata.decimals as u32))
    }

    async fn tx_create(&self, intent: &TransactionIntent) -> Result<TransactionPayload> {
        let metadata = *self.ready()?;
        if !self.validate_transaction_options(intent) {
            return Err(Error::Validation("Sender key does not control the sender address or an address is malformed".to_string()));
        }
        let from = evm::require_address(&intent.agent.address, "sender")?;
        let to = evm::require_address(&intent.credentials.address, "recipient")?;

        let token_amount = to_native(&intent.value, metadata.decimals as u32)?;
        if token_amount.is_zero() {
            return Err(Error::InvalidAmount("Token amount must be positive".to_string()));
        }

        let nonce = match intent.explicit_nonce()? {
            Some(nonce) => U256::from(nonce),
            None => self
                .ledger
                .transaction_count(from, NonceMode::Pending)
                .await
                .map_err(|e| Error::lookup("nonce lookup", e))?,
        };
        let oracle = self.ledger.gas_price().await.map_err(|e| Error::lookup("gas price lookup", e))?;
        let gas_price = Self::gas_price(oracle);

        let calldata = TransferCall { recipient: to, amount: token_amount }.encode();
        let mut request = EthersTransactionRequest::new()
            .from(from)
            .to(metadata.contract)
            .data(calldata)
            .gas_price(gas_price)
            .nonce(nonce);

        let estimate = self
            .ledger
            .estimate_gas(&TypedTransaction::Legacy(request.clone()))
            .await
            .map_err(|e| Error::lookup("gas estimation", e))?;
        let gas_limit = estimate.saturating_add(U256::from(BASE_GAS_LIMIT));
        let gas_value = gas_price.saturating_mul(gas_limit);
        request = request.gas(gas_limit);
        debug!(
            network = %Network::EthereumToken,
            address = %to_checksum(&from, None),
            nonce = %nonce,
            oracle = %oracle,
            gas_price = %gas_price,
            gas_limit = %gas_limit,
            "Building token transfer"
        );

        let token_balance = self
            .ledger
            .token_balance(metadata.contract, from, None)
            .await
            .map_err(|e| Error::lookup("token balance lookup", e))?;
        if token_balance < token_amount {
            return Err(Error::InsufficientFunds(format!(
                "{} balance {} below {}",
                self.ticker,
                from_native(token_balance, metadata.decimals as u32),
                from_native(token_amount, metadata.decimals as u32)
            )));
        }
        let native_balance = self
            .ledger
            .balance(from, None)
            .await
            .map_err(|e| Error::lookup("balance lookup", e))?;
        if native_balance < gas_value {
            return Err(Error::InsufficientFunds(format!(
                "Native balance {} does not cover fee {}",
                from_native(native_balance, NATIVE_DECIMALS),
                from_native(gas_value, NATIVE_DECIMALS)
            )));
        }

        let chain_id = self.ledger.chain_id().await.map_err(|e| Error::lookup("chain id lookup", e))?;
        let wallet = ethereum::wallet_from_private_key(&intent.agent.private_key)?;
        let signed = evm::sign(&wallet, TypedTransaction::Legacy(request), chain_id)?;

        Ok(TransactionPayload {
            data: format!("0x{}", hex::encode(&signed)),
            info: PayloadInfo::Token(TokenTxInfo {
                nonce: nonce.low_u64(),
                gas_price: gas_price.to_string(),
                gas_limit: gas_limit.low_u64(),
                contract: to_checksum(&metadata.contract, None),
                token_amount: token_amount.to_string(),
            }),
            gas_params: Some(GasParams { gas_value: from_native(gas_value, NATIVE_DECIMALS) }),
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
        let Some((receipt, _)) = evm::fetch_receipt(self.ledger.as_ref(), hash).await? else {
            return Ok(None);
        };
        let height = self.ledger.block_number().await.map_err(|e| Error::lookup("block height lookup", e))?;

        let (to, amount) = match (self.transfer_log(&receipt), self.metadata.get()) {
            (Some((to, value)), Some(metadata)) => {
                (vec![to_checksum(&to, None)], Some(from_native(value, metadata.decimals as u32)))
            }
            (Some((to, _)), None) => (vec![to_checksum(&to, None)], None),
            (None, _) => (Vec::new(), None),
        };
        Ok(Some(evm::to_receipt(&receipt, Some(height), to, amount)))
    }
}
