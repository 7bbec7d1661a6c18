//! Provider contract and factory

use async_trait::async_trait;
use tracing::info;

use crate::config::{ChainConfig, Network};
use crate::error::Result;
use crate::ledger::LedgerConnector;
use super::bitcoin::BitcoinProvider;
use super::ethereum::EthereumProvider;
use super::helium::HeliumProvider;
use super::token::TokenProvider;
use super::types::{BlockRef, KeyPair, Receipt, SendResult, TransactionIntent, TransactionPayload};

/// Lifecycle of a transfer on one network: keys, balances, construction,
/// broadcast and confirmation tracking.
///
/// `tx_create` only reads ledger state; the payload it returns is submitted
/// separately through `tx_transfer_raw`, so callers decide when (and
/// whether) to broadcast.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Network served by this provider
    fn network(&self) -> Network;

    /// Whether the provider moves a contract token rather than the native coin
    fn is_token(&self) -> bool {
        false
    }

    /// Resolve any remote metadata the provider needs. Idempotent.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Generate fresh key material, optionally at a derivation path
    fn generate_key_pair(&self, path: Option<&str>) -> Result<KeyPair>;

    /// Check address formats and that the agent's key controls its address
    fn validate_transaction_options(&self, intent: &TransactionIntent) -> bool;

    /// Balance in human units, optionally at a historical block
    async fn balance_by_address(&self, address: &str, at: Option<BlockRef>) -> Result<String>;

    /// Build and sign a transfer without submitting it
    async fn tx_create(&self, intent: &TransactionIntent) -> Result<TransactionPayload>;

    /// Submit a signed payload and return the transaction id
    async fn tx_transfer_raw(&self, payload: &TransactionPayload) -> Result<String>;

    /// Derive the current status of a transaction
    async fn tx_get_sending_result(&self, id: &str) -> SendResult;

    /// Chain-native receipt, `None` if the transaction is unknown
    async fn tx_get_receipt(&self, id: &str) -> Result<Option<Receipt>>;
}

/// Provider factory
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the provider selected by `config`, obtaining ledger clients from `connector`
    pub fn create(config: ChainConfig, connector: &dyn LedgerConnector) -> Result<Box<dyn CryptoProvider>> {
        config.validate()?;
        let network = config.network();
        let depth = config.confirmations();
        info!(%network, rpc_address = %config.rpc_address(), depth, "Creating provider");

        match config {
            ChainConfig::Ethereum(options) => {
                let ledger = connector.evm(&options.rpc_address)?;
                Ok(Box::new(EthereumProvider::new(ledger, depth)))
            }
            ChainConfig::EthereumToken(options) => {
                let ledger = connector.evm(&options.rpc_address)?;
                Ok(Box::new(TokenProvider::new(ledger, &options.token_contract_id, &options.ticker, depth)?))
            }
            ChainConfig::Helium(options) => {
                let (ledger, signer) = connector.helium(&options.rpc_address)?;
                Ok(Box::new(HeliumProvider::new(ledger, signer, depth)))
            }
            ChainConfig::Bitcoin(options) => {
                let (ledger, signer) = connector.bitcoin(&options.rpc_address)?;
                let network = if options.testnet {
                    ::bitcoin::Network::Testnet
                } else {
                    ::bitcoin::Network::Bitcoin
                };
                Ok(Box::new(BitcoinProvider::new(ledger, signer, network, depth)))
            }
        }
    }

    /// Parse a JSON configuration and create its provider
    pub fn from_json(json: &str, connector: &dyn LedgerConnector) -> Result<Box<dyn CryptoProvider>> {
        Self::create(ChainConfig::from_json(json)?, connector)
    }
}
