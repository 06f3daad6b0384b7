use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("rpc error: {0}")]
    Rpc(#[from] ethers::providers::ProviderError),
    #[error("contract call failed: {0}")]
    Contract(String),
    #[error("explorer error: {0}")]
    Explorer(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("block {0} not available from the chain client")]
    MissingBlock(u64),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("ssh forward failed: {0}")]
    Forward(String),
}
