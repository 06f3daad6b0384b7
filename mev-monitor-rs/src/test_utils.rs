use crate::{
    chain::ChainClient,
    contracts::{AbiKind, PairSource},
    error::Error,
    explorer::ExplorerApi,
    types::InternalTx,
};
use async_trait::async_trait;
use ethers::types::{
    Address, Block, Bytes, Log, Transaction, TransactionReceipt, TxHash, H256, U256, U64,
};
use std::collections::HashMap;

pub fn addr(tail: u64) -> Address {
    let mut raw = [0u8; 20];
    raw[12..].copy_from_slice(&tail.to_be_bytes());
    Address::from(raw)
}

pub fn tx_hash(tail: u64) -> H256 {
    let mut raw = [0u8; 32];
    raw[24..].copy_from_slice(&tail.to_be_bytes());
    H256::from(raw)
}

pub fn tx(index: u64, from: Address, to: Option<Address>, hash: H256) -> Transaction {
    Transaction {
        hash,
        from,
        to,
        transaction_index: Some(U64::from(index)),
        gas_price: Some(U256::from(30_000_000_000u64)),
        value: U256::zero(),
        ..Default::default()
    }
}

pub fn block(number: u64, base_fee: U256, miner: Address, txs: Vec<Transaction>) -> Block<Transaction> {
    Block {
        number: Some(U64::from(number)),
        hash: Some(tx_hash(number)),
        author: Some(miner),
        base_fee_per_gas: Some(base_fee),
        transactions: txs,
        ..Default::default()
    }
}

pub fn receipt(
    status: u64,
    gas_used: U256,
    effective_gas_price: U256,
    logs: Vec<Log>,
) -> TransactionReceipt {
    TransactionReceipt {
        status: Some(U64::from(status)),
        gas_used: Some(gas_used),
        effective_gas_price: Some(effective_gas_price),
        logs,
        ..Default::default()
    }
}

pub fn words(values: &[U256]) -> Bytes {
    let mut raw = Vec::with_capacity(values.len() * 32);
    for value in values {
        let mut word = [0u8; 32];
        value.to_big_endian(&mut word);
        raw.extend_from_slice(&word);
    }
    Bytes::from(raw)
}

/// Two's-complement encoding of a signed amount into a 256-bit word.
pub fn signed_word(value: i128) -> U256 {
    if value >= 0 {
        U256::from(value as u128)
    } else {
        let (word, _) = (!U256::from(value.unsigned_abs())).overflowing_add(U256::one());
        word
    }
}

pub fn log(address: Address, topics: Vec<H256>, data: Bytes) -> Log {
    Log { address, topics, data, ..Default::default() }
}

pub fn address_topic(address: Address) -> H256 {
    let mut raw = [0u8; 32];
    raw[12..].copy_from_slice(address.as_bytes());
    H256::from(raw)
}

#[derive(Default)]
pub struct MockChain {
    pub blocks: HashMap<u64, Block<Transaction>>,
    pub receipts: HashMap<TxHash, TransactionReceipt>,
    pub pools: HashMap<Address, (Address, Address)>,
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_with_transactions(
        &self,
        number: u64,
    ) -> Result<Option<Block<Transaction>>, Error> {
        Ok(self.blocks.get(&number).cloned())
    }

    async fn latest_block_number(&self) -> Result<u64, Error> {
        Ok(self.blocks.keys().copied().max().unwrap_or_default())
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>, Error> {
        Ok(self.receipts.get(&hash).cloned())
    }

    async fn pool_tokens(&self, address: Address) -> Result<(Address, Address), Error> {
        self.pools
            .get(&address)
            .copied()
            .ok_or_else(|| Error::Contract(format!("unknown pool {address:#x}")))
    }
}

#[derive(Default)]
pub struct MockExplorer {
    pub abis: HashMap<Address, String>,
    pub internals: Vec<InternalTx>,
    pub eth_usd: f64,
}

#[async_trait]
impl ExplorerApi for MockExplorer {
    async fn contract_abi(&self, address: Address) -> Option<String> {
        self.abis.get(&address).cloned()
    }

    async fn internal_transactions(
        &self,
        _block_number: u64,
        _miner: Address,
    ) -> Result<Vec<InternalTx>, Error> {
        Ok(self.internals.clone())
    }

    async fn eth_usd(&self) -> Result<f64, Error> {
        Ok(if self.eth_usd == 0.0 { 2000.0 } else { self.eth_usd })
    }
}

#[derive(Default)]
pub struct MockPairs {
    pub pools: HashMap<Address, (Address, Address)>,
}

#[async_trait]
impl PairSource for MockPairs {
    async fn pair_tokens(&self, address: Address, _kind: AbiKind) -> Option<(Address, Address)> {
        self.pools.get(&address).copied()
    }
}
