use crate::{error::Error, types::InternalTx};
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use serde::Deserialize;
use std::time::Duration;

/// Attempts for an ABI lookup before giving up.
const MAX_RETRY: usize = 10;
/// Pause before re-issuing a rate-limited request.
const RATE_LIMIT_PAUSE: Duration = Duration::from_millis(200);

/// Block-explorer HTTP API: contract metadata, miner internal transfers and
/// the ETH/USD quote.
#[async_trait]
pub trait ExplorerApi: Send + Sync {
    /// Verified contract ABI, or `None` when unavailable.
    async fn contract_abi(&self, address: Address) -> Option<String>;

    /// Internal transfers touching `miner` within the block.
    async fn internal_transactions(
        &self,
        block_number: u64,
        miner: Address,
    ) -> Result<Vec<InternalTx>, Error>;

    async fn eth_usd(&self) -> Result<f64, Error>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InternalTxEntry {
    hash: String,
    #[serde(default)]
    to: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct EthPrice {
    ethusd: String,
}

pub struct EtherscanClient {
    http: reqwest::Client,
    base: String,
    api_key: String,
}

impl EtherscanClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base("https://api.etherscan.io/api".to_string(), api_key)
    }

    pub fn with_base(base: String, api_key: String) -> Self {
        Self { http: reqwest::Client::new(), base, api_key }
    }

    async fn get(&self, url: &str) -> Result<Envelope, Error> {
        Ok(self.http.get(url).send().await?.json().await?)
    }

    fn internals_url(&self, block_number: u64, miner: Address, bust: bool) -> String {
        let mut url = format!(
            "{}?module=account&action=txlistinternal&address={:#x}&startblock={}&endblock={}&apikey={}",
            self.base, miner, block_number, block_number, self.api_key
        );
        if bust {
            url.push_str("&norefresh=1");
        }
        url
    }

    fn parse_internals(result: &serde_json::Value) -> Option<Vec<InternalTx>> {
        let entries: Vec<InternalTxEntry> = serde_json::from_value(result.clone()).ok()?;
        let mut txs = Vec::with_capacity(entries.len());
        for entry in entries {
            let hash: H256 = entry.hash.parse().ok()?;
            let to = entry.to.parse::<Address>().ok();
            let value = U256::from_dec_str(&entry.value).ok()?;
            txs.push(InternalTx { hash, to, value });
        }
        Some(txs)
    }

    fn is_rate_limited(result: &serde_json::Value) -> bool {
        result.as_str().map(|s| s.contains("rate limit")).unwrap_or(false)
    }
}

#[async_trait]
impl ExplorerApi for EtherscanClient {
    async fn contract_abi(&self, address: Address) -> Option<String> {
        let url = format!(
            "{}?module=contract&action=getabi&address={:#x}&apikey={}",
            self.base, address, self.api_key
        );
        for attempt in 0..MAX_RETRY {
            match self.get(&url).await {
                Ok(envelope) => {
                    if envelope.status == "1" {
                        if let Some(abi) = envelope.result.as_str() {
                            return Some(abi.to_string());
                        }
                    }
                    if envelope
                        .result
                        .as_str()
                        .map(|s| s.contains("not verified"))
                        .unwrap_or(false)
                    {
                        return None;
                    }
                }
                Err(err) => {
                    tracing::warn!(%address, %err, "abi lookup failed");
                }
            }
            if attempt + 1 < MAX_RETRY {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
        None
    }

    async fn internal_transactions(
        &self,
        block_number: u64,
        miner: Address,
    ) -> Result<Vec<InternalTx>, Error> {
        let mut envelope = self.get(&self.internals_url(block_number, miner, false)).await?;
        if Self::is_rate_limited(&envelope.result) {
            tokio::time::sleep(RATE_LIMIT_PAUSE).await;
            envelope = self.get(&self.internals_url(block_number, miner, true)).await?;
        }
        match Self::parse_internals(&envelope.result) {
            Some(txs) => Ok(txs),
            None => {
                tracing::warn!(
                    block_number,
                    status = %envelope.status,
                    "unusable internal transaction response"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn eth_usd(&self) -> Result<f64, Error> {
        let url = format!("{}?module=stats&action=ethprice&apikey={}", self.base, self.api_key);
        let envelope = self.get(&url).await?;
        let price: EthPrice = serde_json::from_value(envelope.result)
            .map_err(|err| Error::Explorer(format!("bad ethprice response: {err}")))?;
        price
            .ethusd
            .parse()
            .map_err(|err| Error::Explorer(format!("bad ethusd value `{}`: {err}", price.ethusd)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_internal_transfer_entries() {
        let result: serde_json::Value = serde_json::from_str(
            r#"[{"blockNumber":"19360531",
                 "hash":"0x00000000000000000000000000000000000000000000000000000000000000aa",
                 "from":"0x1111111111111111111111111111111111111111",
                 "to":"0x2222222222222222222222222222222222222222",
                 "value":"12500000000000000"}]"#,
        )
        .unwrap();
        let txs = EtherscanClient::parse_internals(&result).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].value, U256::from(12_500_000_000_000_000u64));
        assert_eq!(
            txs[0].to.unwrap(),
            "0x2222222222222222222222222222222222222222".parse().unwrap()
        );
    }

    #[test]
    fn recognizes_rate_limit_payload() {
        let limited = serde_json::json!("Max rate limit reached");
        assert!(EtherscanClient::is_rate_limited(&limited));
        let normal = serde_json::json!([]);
        assert!(!EtherscanClient::is_rate_limited(&normal));
    }
}
