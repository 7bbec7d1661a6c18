//! Mock ledgers, signers and fixtures shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Transaction, TransactionReceipt, H256, U256, U64};
use ethers::utils::keccak256;

use crypto_providers::crypto::keys::helium as helium_keys;
use crypto_providers::ledger::bitcoin::{BitcoinSigner, BitcoinTransaction, UnsignedBitcoinTx, Utxo, UtxoLedger};
use crypto_providers::ledger::evm::EvmLedger;
use crypto_providers::ledger::helium::{
    ChainVars, HeliumAccount, HeliumLedger, HeliumPayment, HeliumSigner, HeliumTransaction, OraclePrice,
    PendingTransaction,
};
use crypto_providers::ledger::{LedgerConnector, LedgerError, LedgerResult, NonceMode};
use crypto_providers::transaction::{Agent, TransactionIntent};

pub const GWEI: u64 = 1_000_000_000;

/// First Hardhat development account
pub const HARDHAT_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const HARDHAT_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
/// Second Hardhat development account
pub const RECIPIENT_ADDRESS: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
pub const TOKEN_CONTRACT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

/// WIF of secret key 1 and its P2PKH address
pub const BTC_WIF: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
pub const BTC_ADDRESS: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";
pub const BTC_RECIPIENT: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

pub fn eth(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

pub fn gwei(n: u64) -> U256 {
    U256::from(n) * U256::from(GWEI)
}

pub fn tx_hash(byte: u8) -> H256 {
    H256::repeat_byte(byte)
}

pub fn evm_intent(value: &str) -> TransactionIntent {
    let agent = Agent {
        address: HARDHAT_ADDRESS.to_string(),
        private_key: HARDHAT_KEY.to_string(),
        agent_id: "agent-1".to_string(),
    };
    TransactionIntent::new(agent, RECIPIENT_ADDRESS, value)
}

pub fn btc_intent(value: &str) -> TransactionIntent {
    let agent = Agent {
        address: BTC_ADDRESS.to_string(),
        private_key: BTC_WIF.to_string(),
        agent_id: "agent-1".to_string(),
    };
    TransactionIntent::new(agent, BTC_RECIPIENT, value)
}

pub fn address(s: &str) -> Address {
    s.parse().unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ============================================================================
// EVM
// ============================================================================

/// Mock EVM node with configurable state and call counters.
#[derive(Debug)]
pub struct MockEvmLedger {
    pub chain_id: Mutex<u64>,
    pub balances: Mutex<HashMap<Address, U256>>,
    pub nonce: Mutex<U256>,
    pub gas_price: Mutex<U256>,
    pub estimate: Mutex<U256>,
    pub block_number: Mutex<u64>,
    pub blocks_by_hash: Mutex<HashMap<H256, u64>>,
    pub receipts: Mutex<HashMap<H256, TransactionReceipt>>,
    pub transactions: Mutex<HashMap<H256, Transaction>>,
    pub token_decimals: Mutex<u8>,
    pub token_balances: Mutex<HashMap<Address, U256>>,
    pub balance_queries: Mutex<Vec<Option<u64>>>,
    pub nonce_modes: Mutex<Vec<NonceMode>>,
    pub estimated: Mutex<Vec<TypedTransaction>>,
    pub sent: Mutex<Vec<Bytes>>,
    pub send_error: Mutex<Option<LedgerError>>,
    pub read_error: Mutex<Option<LedgerError>>,
    pub calls: AtomicUsize,
    pub decimals_calls: AtomicUsize,
}

impl Default for MockEvmLedger {
    fn default() -> Self {
        Self {
            chain_id: Mutex::new(1),
            balances: Mutex::new(HashMap::new()),
            nonce: Mutex::new(U256::from(7)),
            gas_price: Mutex::new(gwei(20)),
            estimate: Mutex::new(U256::from(50_000)),
            block_number: Mutex::new(100),
            blocks_by_hash: Mutex::new(HashMap::new()),
            receipts: Mutex::new(HashMap::new()),
            transactions: Mutex::new(HashMap::new()),
            token_decimals: Mutex::new(6),
            token_balances: Mutex::new(HashMap::new()),
            balance_queries: Mutex::new(Vec::new()),
            nonce_modes: Mutex::new(Vec::new()),
            estimated: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            send_error: Mutex::new(None),
            read_error: Mutex::new(None),
            calls: AtomicUsize::new(0),
            decimals_calls: AtomicUsize::new(0),
        }
    }
}

impl MockEvmLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, holder: &str, balance: U256) -> Self {
        self.balances.lock().unwrap().insert(address(holder), balance);
        self
    }

    pub fn with_token_balance(self, holder: &str, balance: U256) -> Self {
        self.token_balances.lock().unwrap().insert(address(holder), balance);
        self
    }

    pub fn set_gas_price(&self, price: U256) {
        *self.gas_price.lock().unwrap() = price;
    }

    pub fn set_send_error(&self, err: LedgerError) {
        *self.send_error.lock().unwrap() = Some(err);
    }

    pub fn set_read_error(&self, err: LedgerError) {
        *self.read_error.lock().unwrap() = Some(err);
    }

    pub fn add_receipt(&self, hash: H256, block: Option<u64>, success: bool) {
        let receipt = TransactionReceipt {
            transaction_hash: hash,
            block_number: block.map(U64::from),
            block_hash: block.map(|_| H256::repeat_byte(0xbb)),
            status: Some(U64::from(u64::from(success))),
            from: address(HARDHAT_ADDRESS),
            to: Some(address(RECIPIENT_ADDRESS)),
            ..Default::default()
        };
        self.receipts.lock().unwrap().insert(hash, receipt);
    }

    pub fn insert_receipt(&self, receipt: TransactionReceipt) {
        self.receipts.lock().unwrap().insert(receipt.transaction_hash, receipt);
    }

    pub fn add_transaction(&self, hash: H256, value: U256) {
        let tx = Transaction { hash, value, ..Default::default() };
        self.transactions.lock().unwrap().insert(hash, tx);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn read(&self) -> LedgerResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.read_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EvmLedger for MockEvmLedger {
    async fn chain_id(&self) -> LedgerResult<u64> {
        self.read()?;
        Ok(*self.chain_id.lock().unwrap())
    }

    async fn balance(&self, holder: Address, block: Option<u64>) -> LedgerResult<U256> {
        self.read()?;
        self.balance_queries.lock().unwrap().push(block);
        Ok(self.balances.lock().unwrap().get(&holder).copied().unwrap_or_default())
    }

    async fn transaction_count(&self, _address: Address, mode: NonceMode) -> LedgerResult<U256> {
        self.read()?;
        self.nonce_modes.lock().unwrap().push(mode);
        Ok(*self.nonce.lock().unwrap())
    }

    async fn gas_price(&self) -> LedgerResult<U256> {
        self.read()?;
        Ok(*self.gas_price.lock().unwrap())
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> LedgerResult<U256> {
        self.read()?;
        self.estimated.lock().unwrap().push(tx.clone());
        Ok(*self.estimate.lock().unwrap())
    }

    async fn block_number(&self) -> LedgerResult<u64> {
        self.read()?;
        Ok(*self.block_number.lock().unwrap())
    }

    async fn block_number_by_hash(&self, hash: H256) -> LedgerResult<Option<u64>> {
        self.read()?;
        Ok(self.blocks_by_hash.lock().unwrap().get(&hash).copied())
    }

    async fn transaction_receipt(&self, hash: H256) -> LedgerResult<Option<TransactionReceipt>> {
        self.read()?;
        Ok(self.receipts.lock().unwrap().get(&hash).cloned())
    }

    async fn transaction(&self, hash: H256) -> LedgerResult<Option<Transaction>> {
        self.read()?;
        Ok(self.transactions.lock().unwrap().get(&hash).cloned())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> LedgerResult<H256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.send_error.lock().unwrap().clone() {
            return Err(err);
        }
        let hash = H256::from(keccak256(&raw));
        self.sent.lock().unwrap().push(raw);
        Ok(hash)
    }

    async fn token_decimals(&self, _token: Address) -> LedgerResult<u8> {
        self.read()?;
        self.decimals_calls.fetch_add(1, Ordering::SeqCst);
        // widen the race window for concurrent initialization
        tokio::task::yield_now().await;
        Ok(*self.token_decimals.lock().unwrap())
    }

    async fn token_balance(&self, _token: Address, holder: Address, block: Option<u64>) -> LedgerResult<U256> {
        self.read()?;
        self.balance_queries.lock().unwrap().push(block);
        Ok(self.token_balances.lock().unwrap().get(&holder).copied().unwrap_or_default())
    }
}

// ============================================================================
// Helium
// ============================================================================

/// Mock Helium API.
#[derive(Debug)]
pub struct MockHeliumLedger {
    pub accounts: Mutex<HashMap<String, HeliumAccount>>,
    pub chain_vars: Mutex<ChainVars>,
    pub prices: Mutex<Vec<OraclePrice>>,
    pub height: Mutex<u64>,
    pub transactions: Mutex<HashMap<String, HeliumTransaction>>,
    pub pending: Mutex<HashMap<String, Vec<PendingTransaction>>>,
    pub submitted: Mutex<Vec<String>>,
    pub submit_error: Mutex<Option<LedgerError>>,
    pub read_error: Mutex<Option<LedgerError>>,
    pub account_calls: AtomicUsize,
}

impl Default for MockHeliumLedger {
    fn default() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            chain_vars: Mutex::new(ChainVars::default()),
            prices: Mutex::new(vec![OraclePrice { price: Some(200_000_000), height: Some(1) }]),
            height: Mutex::new(100),
            transactions: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            submit_error: Mutex::new(None),
            read_error: Mutex::new(None),
            account_calls: AtomicUsize::new(0),
        }
    }
}

impl MockHeliumLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, address: &str, balance: u64, speculative_nonce: u64) -> Self {
        let account = HeliumAccount { address: address.to_string(), balance, speculative_nonce };
        self.accounts.lock().unwrap().insert(address.to_string(), account);
        self
    }

    pub fn add_transaction(&self, hash: &str, kind: &str, height: Option<u64>) {
        let tx = HeliumTransaction {
            hash: hash.to_string(),
            kind: kind.to_string(),
            height,
            time: Some(1_600_000_000),
            payer: Some("payer".to_string()),
            payee: Some("payee".to_string()),
            amount: Some(150_000_000),
            raw: serde_json::json!({ "hash": hash, "type": kind }),
        };
        self.transactions.lock().unwrap().insert(hash.to_string(), tx);
    }

    pub fn add_pending(&self, entry: PendingTransaction) {
        self.pending.lock().unwrap().entry(entry.hash.clone()).or_default().push(entry);
    }

    fn read(&self) -> LedgerResult<()> {
        match self.read_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HeliumLedger for MockHeliumLedger {
    async fn account(&self, address: &str) -> LedgerResult<Option<HeliumAccount>> {
        self.read()?;
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn chain_vars(&self) -> LedgerResult<ChainVars> {
        self.read()?;
        Ok(*self.chain_vars.lock().unwrap())
    }

    async fn oracle_prices(&self) -> LedgerResult<Vec<OraclePrice>> {
        self.read()?;
        Ok(self.prices.lock().unwrap().clone())
    }

    async fn height(&self) -> LedgerResult<u64> {
        self.read()?;
        Ok(*self.height.lock().unwrap())
    }

    async fn transaction(&self, hash: &str) -> LedgerResult<Option<HeliumTransaction>> {
        self.read()?;
        Ok(self.transactions.lock().unwrap().get(hash).cloned())
    }

    async fn pending_transactions(&self, hash: &str) -> LedgerResult<Vec<PendingTransaction>> {
        self.read()?;
        Ok(self.pending.lock().unwrap().get(hash).cloned().unwrap_or_default())
    }

    async fn submit(&self, signed: &str) -> LedgerResult<String> {
        if let Some(err) = self.submit_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.submitted.lock().unwrap().push(signed.to_string());
        Ok(format!("hash-{}", self.submitted.lock().unwrap().len()))
    }
}

/// Signer producing `json(payment).hex(signature)` with a fixed encoded size.
#[derive(Debug)]
pub struct MockHeliumSigner {
    pub encoded_len: usize,
    pub signed: Mutex<Vec<(HeliumPayment, String)>>,
}

impl MockHeliumSigner {
    pub fn new(encoded_len: usize) -> Self {
        Self { encoded_len, signed: Mutex::new(Vec::new()) }
    }

    pub fn last(&self) -> Option<(HeliumPayment, String)> {
        self.signed.lock().unwrap().last().cloned()
    }
}

impl HeliumSigner for MockHeliumSigner {
    fn encoded_len(&self, _payment: &HeliumPayment) -> usize {
        self.encoded_len
    }

    fn sign(&self, payment: &HeliumPayment, signing_key: &SigningKey) -> crypto_providers::Result<String> {
        let message = serde_json::to_string(payment).unwrap();
        let signature = signing_key.sign(message.as_bytes());
        let signer_address = helium_keys::address_from_key(&signing_key.verifying_key());
        self.signed.lock().unwrap().push((payment.clone(), signer_address));
        Ok(format!("{}.{}", message, hex::encode(signature.to_bytes())))
    }
}

// ============================================================================
// Bitcoin
// ============================================================================

/// Mock Bitcoin node.
#[derive(Debug)]
pub struct MockUtxoLedger {
    pub unspent: Mutex<Vec<Utxo>>,
    pub fee_rate: Mutex<u64>,
    pub height: Mutex<u64>,
    pub transactions: Mutex<HashMap<String, BitcoinTransaction>>,
    pub mempool: Mutex<Vec<String>>,
    pub broadcasts: Mutex<Vec<String>>,
    pub broadcast_error: Mutex<Option<LedgerError>>,
}

impl Default for MockUtxoLedger {
    fn default() -> Self {
        Self {
            unspent: Mutex::new(Vec::new()),
            fee_rate: Mutex::new(10),
            height: Mutex::new(800_000),
            transactions: Mutex::new(HashMap::new()),
            mempool: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            broadcast_error: Mutex::new(None),
        }
    }
}

impl MockUtxoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_utxo(self, txid: &str, vout: u32, value: u64) -> Self {
        self.unspent.lock().unwrap().push(Utxo { txid: txid.to_string(), vout, value });
        self
    }

    pub fn add_transaction(&self, txid: &str, block_height: Option<u64>) {
        let tx = BitcoinTransaction {
            txid: txid.to_string(),
            block_height,
            block_hash: block_height.map(|h| format!("{:064x}", h)),
            block_time: block_height.map(|_| 1_700_000_000),
            raw: serde_json::json!({ "txid": txid }),
        };
        self.transactions.lock().unwrap().insert(txid.to_string(), tx);
    }
}

#[async_trait]
impl UtxoLedger for MockUtxoLedger {
    async fn unspent(&self, _address: &str) -> LedgerResult<Vec<Utxo>> {
        Ok(self.unspent.lock().unwrap().clone())
    }

    async fn fee_rate(&self) -> LedgerResult<u64> {
        Ok(*self.fee_rate.lock().unwrap())
    }

    async fn block_height(&self) -> LedgerResult<u64> {
        Ok(*self.height.lock().unwrap())
    }

    async fn transaction(&self, txid: &str) -> LedgerResult<Option<BitcoinTransaction>> {
        Ok(self.transactions.lock().unwrap().get(txid).cloned())
    }

    async fn in_mempool(&self, txid: &str) -> LedgerResult<bool> {
        Ok(self.mempool.lock().unwrap().iter().any(|t| t == txid))
    }

    async fn broadcast(&self, raw_hex: &str) -> LedgerResult<String> {
        if let Some(err) = self.broadcast_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.broadcasts.lock().unwrap().push(raw_hex.to_string());
        Ok(hex::encode(keccak256(raw_hex.as_bytes())))
    }
}

/// Signer recording every transaction it is asked to sign.
#[derive(Debug, Default)]
pub struct MockBitcoinSigner {
    pub signed: Mutex<Vec<UnsignedBitcoinTx>>,
}

impl MockBitcoinSigner {
    pub fn last(&self) -> Option<UnsignedBitcoinTx> {
        self.signed.lock().unwrap().last().cloned()
    }
}

impl BitcoinSigner for MockBitcoinSigner {
    fn sign(&self, tx: &UnsignedBitcoinTx, _private_key: &::bitcoin::PrivateKey) -> crypto_providers::Result<String> {
        self.signed.lock().unwrap().push(tx.clone());
        Ok(hex::encode(serde_json::to_vec(tx).unwrap()))
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Connector handing out shared mocks.
pub struct MockConnector {
    pub evm: Arc<MockEvmLedger>,
    pub helium: Arc<MockHeliumLedger>,
    pub helium_signer: Arc<MockHeliumSigner>,
    pub utxo: Arc<MockUtxoLedger>,
    pub bitcoin_signer: Arc<MockBitcoinSigner>,
    pub requested: Mutex<Vec<String>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self {
            evm: Arc::new(MockEvmLedger::new()),
            helium: Arc::new(MockHeliumLedger::new()),
            helium_signer: Arc::new(MockHeliumSigner::new(30)),
            utxo: Arc::new(MockUtxoLedger::new()),
            bitcoin_signer: Arc::new(MockBitcoinSigner::default()),
            requested: Mutex::new(Vec::new()),
        }
    }
}

impl LedgerConnector for MockConnector {
    fn evm(&self, rpc_address: &str) -> crypto_providers::Result<Arc<dyn EvmLedger>> {
        self.requested.lock().unwrap().push(rpc_address.to_string());
        let ledger: Arc<dyn EvmLedger> = self.evm.clone();
        Ok(ledger)
    }

    fn helium(&self, rpc_address: &str) -> crypto_providers::Result<(Arc<dyn HeliumLedger>, Arc<dyn HeliumSigner>)> {
        self.requested.lock().unwrap().push(rpc_address.to_string());
        let ledger: Arc<dyn HeliumLedger> = self.helium.clone();
        let signer: Arc<dyn HeliumSigner> = self.helium_signer.clone();
        Ok((ledger, signer))
    }

    fn bitcoin(&self, rpc_address: &str) -> crypto_providers::Result<(Arc<dyn UtxoLedger>, Arc<dyn BitcoinSigner>)> {
        self.requested.lock().unwrap().push(rpc_address.to_string());
        let ledger: Arc<dyn UtxoLedger> = self.utxo.clone();
        let signer: Arc<dyn BitcoinSigner> = self.bitcoin_signer.clone();
        Ok((ledger, signer))
    }
}
