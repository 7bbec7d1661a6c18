//! Supplies ledger clients and signers to the provider factory

use std::sync::Arc;

use crate::config::ConnectorSettings;
use crate::error::{Error, Result};
use super::bitcoin::{BitcoinSigner, UtxoLedger};
use super::evm::{EthersLedger, EvmLedger};
use super::helium::{HeliumLedger, HeliumSigner};

/// Creates the collaborators a provider needs for an endpoint.
///
/// Every method defaults to an error so a connector only implements the
/// networks it can actually reach.
pub trait LedgerConnector: Send + Sync {
    /// EVM node client
    fn evm(&self, rpc_address: &str) -> Result<Arc<dyn EvmLedger>> {
        Err(Error::Configuration(format!("No EVM ledger client available for {}", rpc_address)))
    }

    /// Helium API client and payment signer
    fn helium(&self, rpc_address: &str) -> Result<(Arc<dyn HeliumLedger>, Arc<dyn HeliumSigner>)> {
        Err(Error::Configuration(format!("No Helium ledger client available for {}", rpc_address)))
    }

    /// Bitcoin node client and transaction signer
    fn bitcoin(&self, rpc_address: &str) -> Result<(Arc<dyn UtxoLedger>, Arc<dyn BitcoinSigner>)> {
        Err(Error::Configuration(format!("No Bitcoin ledger client available for {}", rpc_address)))
    }
}

/// Connector backed by ethers HTTP providers
#[derive(Debug, Clone, Default)]
pub struct EthersConnector {
    settings: ConnectorSettings,
}

impl EthersConnector {
    /// Create a connector with explicit settings
    pub fn new(settings: ConnectorSettings) -> Self {
        Self { settings }
    }

    /// Create a connector configured from the environment
    pub fn from_env() -> Self {
        Self::new(ConnectorSettings::from_env())
    }
}

impl LedgerConnector for EthersConnector {
    fn evm(&self, rpc_address: &str) -> Result<Arc<dyn EvmLedger>> {
        let ledger = EthersLedger::new(rpc_address, self.settings.rpc_timeout)?;
        Ok(Arc::new(ledger))
    }
}
