use crate::{
    chain::ChainClient,
    explorer::ExplorerApi,
    tokens::KNOWN_ERC20,
};
use async_trait::async_trait;
use ethers::types::Address;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

/// How a contract's interface is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbiKind {
    /// Standard ERC-20.
    Token,
    /// Uniswap V2 pair.
    Pair,
    /// Uniswap V3 pool.
    Pool,
    /// Needs a verified ABI from the explorer before use.
    Unknown,
}

#[derive(Clone, Debug)]
enum AbiSource {
    Builtin(AbiKind),
    Verified(String),
}

/// Process-wide memo of contract interfaces and pool token pairs.
/// Each key is written at most once; failures are not cached so transient
/// explorer trouble can heal on a later block.
#[derive(Default)]
pub struct ContractCache {
    abis: RwLock<HashMap<Address, AbiSource>>,
    pairs: RwLock<HashMap<Address, (Address, Address)>>,
}

/// Token-pair resolution as seen by the log decoder.
#[async_trait]
pub trait PairSource: Send + Sync {
    /// `(token0, token1)` of the pool, or `None` when the pool's interface
    /// cannot be established; callers skip such events.
    async fn pair_tokens(&self, address: Address, kind: AbiKind) -> Option<(Address, Address)>;
}

pub struct Contracts<C, E> {
    chain: Arc<C>,
    explorer: Arc<E>,
    cache: ContractCache,
}

impl<C: ChainClient, E: ExplorerApi> Contracts<C, E> {
    pub fn new(chain: Arc<C>, explorer: Arc<E>) -> Self {
        Self { chain, explorer, cache: ContractCache::default() }
    }

    /// Explorer-verified ABI for `address`, when one has been cached.
    pub fn verified_abi(&self, address: &Address) -> Option<String> {
        match self.cache.abis.read().get(address) {
            Some(AbiSource::Verified(abi)) => Some(abi.clone()),
            _ => None,
        }
    }

    async fn ensure_abi(&self, address: Address, kind: AbiKind) -> bool {
        if self.cache.abis.read().contains_key(&address) {
            return true;
        }
        let source = if KNOWN_ERC20.contains(&address) {
            AbiSource::Builtin(AbiKind::Token)
        } else {
            match kind {
                AbiKind::Token | AbiKind::Pair | AbiKind::Pool => AbiSource::Builtin(kind),
                AbiKind::Unknown => match self.explorer.contract_abi(address).await {
                    Some(abi) => AbiSource::Verified(abi),
                    None => return false,
                },
            }
        };
        tracing::debug!(%address, ?kind, "caching contract interface");
        self.cache.abis.write().entry(address).or_insert(source);
        true
    }
}

#[async_trait]
impl<C: ChainClient, E: ExplorerApi> PairSource for Contracts<C, E> {
    async fn pair_tokens(&self, address: Address, kind: AbiKind) -> Option<(Address, Address)> {
        if let Some(tokens) = self.cache.pairs.read().get(&address) {
            return Some(*tokens);
        }
        if !self.ensure_abi(address, kind).await {
            tracing::warn!(%address, "no usable interface for pool; skipping its events");
            return None;
        }
        match self.chain.pool_tokens(address).await {
            Ok(tokens) => {
                self.cache.pairs.write().entry(address).or_insert(tokens);
                Some(tokens)
            }
            Err(err) => {
                tracing::warn!(%address, %err, "token0/token1 lookup failed");
                None
            }
        }
    }
}
