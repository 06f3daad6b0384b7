use crate::error::Error;
use async_trait::async_trait;
use ethers::{
    contract::abigen,
    providers::{Http, Middleware, Provider},
    types::{Address, Block, Transaction, TransactionReceipt, TxHash},
};
use std::sync::Arc;

abigen!(
    TokenPair,
    r#"[
        function token0() external view returns (address)
        function token1() external view returns (address)
    ]"#
);

/// Read-only view of the chain; the detector and decoder run against this
/// trait so tests can substitute canned blocks.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_with_transactions(
        &self,
        number: u64,
    ) -> Result<Option<Block<Transaction>>, Error>;

    async fn latest_block_number(&self) -> Result<u64, Error>;

    async fn receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>, Error>;

    /// `token0()` / `token1()` of a Uniswap-style pool.
    async fn pool_tokens(&self, address: Address) -> Result<(Address, Address), Error>;
}

/// JSON-RPC implementation over the configured node provider.
pub struct RpcChainClient {
    provider: Arc<Provider<Http>>,
}

impl RpcChainClient {
    pub fn connect(url: &str) -> Result<Self, Error> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|err| Error::Config(format!("bad rpc url: {err}")))?;
        Ok(Self { provider: Arc::new(provider) })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_with_transactions(
        &self,
        number: u64,
    ) -> Result<Option<Block<Transaction>>, Error> {
        Ok(self.provider.get_block_with_txs(number).await?)
    }

    async fn latest_block_number(&self) -> Result<u64, Error> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>, Error> {
        Ok(self.provider.get_transaction_receipt(hash).await?)
    }

    async fn pool_tokens(&self, address: Address) -> Result<(Address, Address), Error> {
        let pair = TokenPair::new(address, self.provider.clone());
        let token0 = pair
            .token_0()
            .call()
            .await
            .map_err(|err| Error::Contract(format!("token0() on {address:#x}: {err}")))?;
        let token1 = pair
            .token_1()
            .call()
            .await
            .map_err(|err| Error::Contract(format!("token1() on {address:#x}: {err}")))?;
        Ok((token0, token1))
    }
}
