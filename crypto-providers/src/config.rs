//! Provider selection and configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default request timeout for ledger clients
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Supported networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    /// Bitcoin (UTXO)
    Bitcoin,
    /// Ethereum native coin
    Ethereum,
    /// ERC-20 token on Ethereum
    EthereumToken,
    /// Helium
    Helium,
}

impl Network {
    /// All supported networks
    pub const ALL: [Network; 4] = [Network::Bitcoin, Network::Ethereum, Network::EthereumToken, Network::Helium];

    /// Short discriminant used by callers
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Bitcoin => "btc",
            Network::Ethereum => "eth",
            Network::EthereumToken => "erc20",
            Network::Helium => "hnt",
        }
    }

    /// Native-unit decimals; token contracts report their own
    pub const fn native_decimals(&self) -> u32 {
        match self {
            Network::Bitcoin | Network::Helium => 8,
            Network::Ethereum | Network::EthereumToken => 18,
        }
    }

    /// Blocks required before a transaction counts as sent
    pub fn default_confirmations(&self) -> u64 {
        match self {
            Network::Bitcoin => 6,
            Network::Ethereum | Network::EthereumToken | Network::Helium => 5,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btc" | "bitcoin" => Ok(Network::Bitcoin),
            "eth" | "ethereum" => Ok(Network::Ethereum),
            "erc20" | "eth_token" | "ethereum_token" => Ok(Network::EthereumToken),
            "hnt" | "helium" => Ok(Network::Helium),
            other => Err(Error::UnsupportedNetwork(other.to_string())),
        }
    }
}

/// Options for Bitcoin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinOptions {
    /// Node or indexer endpoint
    pub rpc_address: String,
    /// Use testnet address encoding
    #[serde(default)]
    pub testnet: bool,
    /// Confirmation depth override
    #[serde(default)]
    pub confirmations: Option<u64>,
}

/// Options for the native Ethereum coin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthereumOptions {
    /// JSON-RPC endpoint
    pub rpc_address: String,
    /// Confirmation depth override
    #[serde(default)]
    pub confirmations: Option<u64>,
}

/// Options for an ERC-20 token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthereumTokenOptions {
    /// JSON-RPC endpoint
    pub rpc_address: String,
    /// Token contract address
    pub token_contract_id: String,
    /// Token ticker
    pub ticker: String,
    /// Confirmation depth override
    #[serde(default)]
    pub confirmations: Option<u64>,
}

/// Options for Helium
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeliumOptions {
    /// API endpoint
    pub rpc_address: String,
    /// Confirmation depth override
    #[serde(default)]
    pub confirmations: Option<u64>,
}

/// Per-network configuration, tagged by `network`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "network", rename_all = "snake_case")]
pub enum ChainConfig {
    /// Bitcoin
    Bitcoin(BitcoinOptions),
    /// Ethereum
    Ethereum(EthereumOptions),
    /// ERC-20 token
    EthereumToken(EthereumTokenOptions),
    /// Helium
    Helium(HeliumOptions),
}

impl ChainConfig {
    /// Network this configuration selects
    pub fn network(&self) -> Network {
        match self {
            ChainConfig::Bitcoin(_) => Network::Bitcoin,
            ChainConfig::Ethereum(_) => Network::Ethereum,
            ChainConfig::EthereumToken(_) => Network::EthereumToken,
            ChainConfig::Helium(_) => Network::Helium,
        }
    }

    /// Ledger endpoint
    pub fn rpc_address(&self) -> &str {
        match self {
            ChainConfig::Bitcoin(o) => &o.rpc_address,
            ChainConfig::Ethereum(o) => &o.rpc_address,
            ChainConfig::EthereumToken(o) => &o.rpc_address,
            ChainConfig::Helium(o) => &o.rpc_address,
        }
    }

    /// Effective confirmation depth
    pub fn confirmations(&self) -> u64 {
        let configured = match self {
            ChainConfig::Bitcoin(o) => o.confirmations,
            ChainConfig::Ethereum(o) => o.confirmations,
            ChainConfig::EthereumToken(o) => o.confirmations,
            ChainConfig::Helium(o) => o.confirmations,
        };
        configured.unwrap_or_else(|| self.network().default_confirmations())
    }

    /// Parse a JSON configuration object
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ChainConfig = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("Invalid chain configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.rpc_address().trim().is_empty() {
            return Err(Error::Configuration(format!("{}: rpc_address is required", self.network())));
        }
        if self.confirmations() == 0 {
            return Err(Error::Configuration(format!("{}: confirmations must be positive", self.network())));
        }
        if let ChainConfig::EthereumToken(o) = self {
            if o.token_contract_id.trim().is_empty() {
                return Err(Error::Configuration("erc20: token_contract_id is required".to_string()));
            }
        }
        Ok(())
    }
}

/// Settings shared by the ledger clients a connector creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSettings {
    /// Per-request timeout
    pub rpc_timeout: Duration,
}

impl ConnectorSettings {
    /// Read settings from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let secs = std::env::var("PROVIDER_RPC_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_RPC_TIMEOUT_SECS);

        Self { rpc_timeout: Duration::from_secs(secs) }
    }
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self { rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS) }
    }
}
