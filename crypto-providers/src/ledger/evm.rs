//! Ethereum ledger surface and its ethers-backed client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::providers::{Middleware, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockId, BlockNumber, Bytes, Transaction, TransactionReceipt, H256, U256};
use ethers_providers::{Http, Provider};

use crate::error::{Error, Result};
use super::{LedgerError, LedgerResult, NonceMode};

// ERC-20 surface used for token metadata, balances and transfer calldata
abigen!(
    IERC20,
    r#"[
        function decimals() external view returns (uint8)
        function balanceOf(address account) external view returns (uint256)
        function transfer(address recipient, uint256 amount) external returns (bool)
    ]"#,
);

/// Read and submit operations an EVM provider needs from a node
#[async_trait]
pub trait EvmLedger: Send + Sync {
    /// EIP-155 chain id
    async fn chain_id(&self) -> LedgerResult<u64>;

    /// Native balance, optionally at a historical block height
    async fn balance(&self, address: Address, block: Option<u64>) -> LedgerResult<U256>;

    /// Number of transactions sent by `address`
    async fn transaction_count(&self, address: Address, mode: NonceMode) -> LedgerResult<U256>;

    /// Gas price suggested by the node's oracle
    async fn gas_price(&self) -> LedgerResult<U256>;

    /// Simulate `tx` against current state and return the gas it needs
    async fn estimate_gas(&self, tx: &TypedTransaction) -> LedgerResult<U256>;

    /// Current chain height
    async fn block_number(&self) -> LedgerResult<u64>;

    /// Height of the block with the given hash, `None` if unknown
    async fn block_number_by_hash(&self, hash: H256) -> LedgerResult<Option<u64>>;

    /// Receipt of a mined transaction, `None` if not mined
    async fn transaction_receipt(&self, hash: H256) -> LedgerResult<Option<TransactionReceipt>>;

    /// Transaction as known to the node (including the mempool)
    async fn transaction(&self, hash: H256) -> LedgerResult<Option<Transaction>>;

    /// Submit a signed RLP payload
    async fn send_raw_transaction(&self, raw: Bytes) -> LedgerResult<H256>;

    /// `decimals()` of an ERC-20 contract
    async fn token_decimals(&self, token: Address) -> LedgerResult<u8>;

    /// `balanceOf(holder)` of an ERC-20 contract
    async fn token_balance(&self, token: Address, holder: Address, block: Option<u64>) -> LedgerResult<U256>;
}

/// [`EvmLedger`] over an ethers HTTP provider
pub struct EthersLedger {
    /// Ethers provider
    provider: Arc<Provider<Http>>,
}

impl EthersLedger {
    /// Connect to a JSON-RPC endpoint; `timeout` bounds every request
    pub fn new(rpc_address: &str, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(rpc_address)
            .map_err(|e| Error::Configuration(format!("Invalid RPC address '{}': {}", rpc_address, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        let provider = Provider::new(Http::new_with_client(url, client));

        Ok(Self { provider: Arc::new(provider) })
    }

    fn token(&self, token: Address) -> IERC20<Provider<Http>> {
        IERC20::new(token, self.provider.clone())
    }
}

fn at_block(block: Option<u64>) -> Option<BlockId> {
    block.map(|n| BlockId::Number(BlockNumber::Number(n.into())))
}

fn provider_error(err: ProviderError) -> LedgerError {
    if let Some(response) = err.as_error_response() {
        return LedgerError::Rejected(response.message.clone());
    }
    let message = err.to_string();
    if message.contains("timed out") || message.contains("timeout") {
        LedgerError::Timeout(message)
    } else {
        LedgerError::Transport(message)
    }
}

#[async_trait]
impl EvmLedger for EthersLedger {
    async fn chain_id(&self) -> LedgerResult<u64> {
        let id = self.provider.get_chainid().await.map_err(provider_error)?;
        Ok(id.low_u64())
    }

    async fn balance(&self, address: Address, block: Option<u64>) -> LedgerResult<U256> {
        self.provider.get_balance(address, at_block(block)).await.map_err(provider_error)
    }

    async fn transaction_count(&self, address: Address, mode: NonceMode) -> LedgerResult<U256> {
        let block = match mode {
            NonceMode::Latest => None,
            NonceMode::Pending => Some(BlockId::from(BlockNumber::Pending)),
        };
        self.provider.get_transaction_count(address, block).await.map_err(provider_error)
    }

    async fn gas_price(&self) -> LedgerResult<U256> {
        self.provider.get_gas_price().await.map_err(provider_error)
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> LedgerResult<U256> {
        self.provider.estimate_gas(tx, None).await.map_err(provider_error)
    }

    async fn block_number(&self) -> LedgerResult<u64> {
        let number = self.provider.get_block_number().await.map_err(provider_error)?;
        Ok(number.as_u64())
    }

    async fn block_number_by_hash(&self, hash: H256) -> LedgerResult<Option<u64>> {
        let block = self.provider.get_block(hash).await.map_err(provider_error)?;
        Ok(block.and_then(|b| b.number).map(|n| n.as_u64()))
    }

    async fn transaction_receipt(&self, hash: H256) -> LedgerResult<Option<TransactionReceipt>> {
        self.provider.get_transaction_receipt(hash).await.map_err(provider_error)
    }

    async fn transaction(&self, hash: H256) -> LedgerResult<Option<Transaction>> {
        self.provider.get_transaction(hash).await.map_err(provider_error)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> LedgerResult<H256> {
        let pending = self.provider.send_raw_transaction(raw).await.map_err(provider_error)?;
        Ok(pending.tx_hash())
    }

    async fn token_decimals(&self, token: Address) -> LedgerResult<u8> {
        self.token(token)
            .decimals()
            .call()
            .await
            .map_err(|e| LedgerError::Transport(format!("decimals() failed: {}", e)))
    }

    async fn token_balance(&self, token: Address, holder: Address, block: Option<u64>) -> LedgerResult<U256> {
        let contract = self.token(token);
        let mut call = contract.balance_of(holder);
        if let Some(block) = at_block(block) {
            call = call.block(block);
        }
        call.call()
            .await
            .map_err(|e| LedgerError::Transport(format!("balanceOf() failed: {}", e)))
    }
}

impl std::fmt::Debug for EthersLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthersLedger").field("url", &self.provider.url().as_str()).finish()
    }
}
