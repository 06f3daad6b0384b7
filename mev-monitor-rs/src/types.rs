use ethers::types::{Address, Bytes, H256, U256};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

/// A balance-map key: native ether or an ERC-20 token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Asset {
    Eth,
    Token(Address),
}

impl Asset {
    pub fn token(address: Address) -> Self {
        Self::Token(address)
    }

    pub fn as_token(&self) -> Option<Address> {
        match self {
            Self::Eth => None,
            Self::Token(address) => Some(*address),
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eth => write!(f, "eth"),
            Self::Token(address) => write!(f, "{address:#x}"),
        }
    }
}

impl FromStr for Asset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "eth" {
            Ok(Self::Eth)
        } else {
            s.parse::<Address>().map(Self::Token).map_err(|err| format!("bad asset `{s}`: {err}"))
        }
    }
}

impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Canonical unordered token pair: the lexicographically smaller address
/// comes first. Rates stored under the key are oriented from the first
/// element; direction is recovered at lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey(pub Address, pub Address);

impl PairKey {
    pub fn new(a: Address, b: Address) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn contains(&self, token: Address) -> bool {
        self.0 == token || self.1 == token
    }

    /// The pair member that is not `token`.
    pub fn other(&self, token: Address) -> Address {
        if self.0 == token {
            self.1
        } else {
            self.0
        }
    }
}

pub type RateMap = BTreeMap<PairKey, f64>;

/// Persisted form of a rate map: a JSON list of `[token_a, token_b, rate]`.
pub fn rates_to_json(rates: &RateMap) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = rates
        .iter()
        .map(|(pair, rate)| {
            serde_json::json!([format!("{:#x}", pair.0), format!("{:#x}", pair.1), rate])
        })
        .collect();
    serde_json::Value::Array(entries)
}

pub fn rates_from_json(value: &serde_json::Value) -> Option<RateMap> {
    let entries = value.as_array()?;
    let mut rates = RateMap::new();
    for entry in entries {
        let triple = entry.as_array()?;
        if triple.len() != 3 {
            return None;
        }
        let a: Address = triple[0].as_str()?.parse().ok()?;
        let b: Address = triple[1].as_str()?.parse().ok()?;
        let rate = triple[2].as_f64()?;
        rates.insert(PairKey(a, b), rate);
    }
    Some(rates)
}

/// Block header facts persisted to `t_blocks`.
#[derive(Clone, Debug)]
pub struct BlockData {
    pub number: u64,
    pub base_fee_per_gas: U256,
    pub hash: String,
    pub miner: Address,
}

/// A bundle member transaction, monetary fields in wei.
#[derive(Clone, Debug)]
pub struct TxRecord {
    pub hash: H256,
    pub block_number: u64,
    pub index: u64,
    pub from: Address,
    pub to: Address,
    pub gas_used: U256,
    pub gas_price: U256,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    /// `baseFeePerGas * gasUsed`.
    pub gas_burnt: U256,
    /// `(effectiveGasPrice - baseFeePerGas) * gasUsed`.
    pub gas_overpay: U256,
    /// Internal transfer to the miner attributed to this transaction.
    pub direct_bribe: U256,
    pub value: U256,
    pub role: i64,
}

/// A raw decoded log attached to a bundle transaction.
#[derive(Clone, Debug)]
pub struct EventRecord {
    pub block_number: u64,
    pub tx_hash: H256,
    pub address: Address,
    pub data: Bytes,
    pub topics: Vec<H256>,
}

/// Bundle identity within a block: sender (`None` when the recipient is a
/// registered multisender) and recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BundleKey {
    pub attacker0: Option<Address>,
    pub attacker1: Address,
}

/// Mutable decoding state of a bundle, created lazily by the first
/// decodable event.
#[derive(Clone, Debug, Default)]
pub struct SaldoState {
    pub saldo: BTreeMap<Asset, f64>,
    pub capital_requirements: BTreeMap<Asset, f64>,
    pub rates: RateMap,
    /// Transactions already charged for gas; guards double counting.
    pub charged: BTreeSet<H256>,
    pub direct_bribe: f64,
    pub gas_burnt: f64,
    pub gas_overpay: f64,
    pub uniswap_v2: u64,
    pub uniswap_v3: u64,
    pub pancake_v3: u64,
    pub mint_burn_v3: u64,
    pub mint_burn_nft: u64,
}

impl SaldoState {
    pub fn ensure_assets(&mut self, assets: &[Asset]) {
        for asset in assets {
            self.saldo.entry(*asset).or_insert(0.0);
            self.capital_requirements.entry(*asset).or_insert(0.0);
        }
    }

    /// Raise the capital requirement to the deepest negative saldo seen.
    pub fn raise_capital(&mut self, assets: &[Asset]) {
        for asset in assets {
            let saldo = self.saldo.get(asset).copied().unwrap_or(0.0);
            let capital = self.capital_requirements.entry(*asset).or_insert(0.0);
            if saldo < -*capital {
                *capital = -saldo;
            }
        }
    }
}

/// Valuation of a bundle in its base token, computed once decoding is done.
#[derive(Clone, Debug)]
pub struct Valuation {
    pub base_token: Address,
    pub total_capital: f64,
    pub profit_estimation: f64,
    pub start_token: Option<Asset>,
    pub complexity: u64,
    pub n_start_tokens: u64,
    pub irreducible_tokens: u64,
    pub before_bribes: f64,
    pub bribes_ratio: Option<f64>,
}

/// The primary analytic entity: a same-sender-same-recipient transaction
/// group bracketing at least one third-party transaction.
#[derive(Clone, Debug)]
pub struct Bundle {
    pub key: BundleKey,
    pub block_number: u64,
    pub min_index: u64,
    pub max_index: u64,
    pub inner_tx_count: u64,
    pub transactions: Vec<TxRecord>,
    pub events: Vec<EventRecord>,
    /// Frame-level ether accumulators from detection; superseded by the
    /// saldo state once the bundle decodes.
    pub direct_bribe: f64,
    pub gas_burnt: f64,
    pub gas_overpay: f64,
    pub state: Option<SaldoState>,
    pub valuation: Option<Valuation>,
}

impl Bundle {
    /// Convert to the persisted form shared with the recalc path.
    pub fn to_stored(&self, bundle_id: i64) -> StoredBundle {
        let (direct_bribe, gas_burnt, gas_overpay) = match &self.state {
            Some(state) => (state.direct_bribe, state.gas_burnt, state.gas_overpay),
            None => (self.direct_bribe, self.gas_burnt, self.gas_overpay),
        };
        let features = self.state.as_ref().map(|state| Features {
            inner_tx_count: self.inner_tx_count,
            uniswap_v2: state.uniswap_v2,
            uniswap_v3: state.uniswap_v3,
            pancake_v3: state.pancake_v3,
            mint_burn_v3: state.mint_burn_v3,
            mint_burn_nft: state.mint_burn_nft,
            irreducible_tokens: self
                .valuation
                .as_ref()
                .map(|v| v.irreducible_tokens)
                .unwrap_or(0),
            base_token: self.valuation.as_ref().map(|v| Asset::Token(v.base_token)),
            start_token: self.valuation.as_ref().and_then(|v| v.start_token),
            complexity: self.valuation.as_ref().map(|v| v.complexity),
            n_start_tokens: self.valuation.as_ref().map(|v| v.n_start_tokens),
        });
        StoredBundle {
            bundle_id,
            block_number: self.block_number,
            attacker0: self.key.attacker0,
            attacker1: self.key.attacker1,
            direct_bribe,
            gas_burnt,
            gas_overpay,
            profit_estimation: self.valuation.as_ref().map(|v| v.profit_estimation),
            bribes_ratio: self.valuation.as_ref().and_then(|v| v.bribes_ratio),
            total_capital: self.valuation.as_ref().map(|v| v.total_capital),
            capital_requirements: self.state.as_ref().map(|s| s.capital_requirements.clone()),
            saldo: self.state.as_ref().map(|s| s.saldo.clone()),
            rates: self.state.as_ref().map(|s| s.rates.clone()),
            features,
        }
    }
}

/// Feature counters and analytic labels persisted as the `features` JSON
/// column and visible to attack-class rules.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Features {
    #[serde(rename = "innerTxCount", default)]
    pub inner_tx_count: u64,
    #[serde(rename = "uniswapV2", default)]
    pub uniswap_v2: u64,
    #[serde(rename = "uniswapV3", default)]
    pub uniswap_v3: u64,
    #[serde(rename = "pancakeV3", default)]
    pub pancake_v3: u64,
    #[serde(rename = "mintBurnV3", default)]
    pub mint_burn_v3: u64,
    #[serde(rename = "mintBurnNFT", default)]
    pub mint_burn_nft: u64,
    #[serde(rename = "irreducibleTokens", default)]
    pub irreducible_tokens: u64,
    #[serde(rename = "baseToken", default)]
    pub base_token: Option<Asset>,
    #[serde(rename = "startToken", default, skip_serializing_if = "Option::is_none")]
    pub start_token: Option<Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u64>,
    #[serde(rename = "N_startTokens", default, skip_serializing_if = "Option::is_none")]
    pub n_start_tokens: Option<u64>,
}

/// A bundle as it exists in `t_bundles`; the classifier reads only this form.
#[derive(Clone, Debug)]
pub struct StoredBundle {
    pub bundle_id: i64,
    pub block_number: u64,
    pub attacker0: Option<Address>,
    pub attacker1: Address,
    pub direct_bribe: f64,
    pub gas_burnt: f64,
    pub gas_overpay: f64,
    pub profit_estimation: Option<f64>,
    pub bribes_ratio: Option<f64>,
    pub total_capital: Option<f64>,
    pub capital_requirements: Option<BTreeMap<Asset, f64>>,
    pub saldo: Option<BTreeMap<Asset, f64>>,
    pub rates: Option<RateMap>,
    pub features: Option<Features>,
}

/// Operator-configured attacker row.
#[derive(Clone, Debug)]
pub struct AttackerRow {
    pub attacker_id: i64,
    /// `None` marks a multisender: its callers are anonymized for bundling.
    pub from: Option<Address>,
    pub to: Address,
    pub status: AttackerStatus,
    pub note: Option<String>,
    pub report: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttackerStatus {
    Enabled,
    Disabled,
}

impl AttackerStatus {
    pub fn from_i64(status: i64) -> Self {
        if status == -1 {
            Self::Disabled
        } else {
            Self::Enabled
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Enabled => 1,
            Self::Disabled => -1,
        }
    }
}

/// Rule operators for attack-class predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOp {
    EQ,
    NE,
    GT,
    GE,
    LT,
    LE,
}

/// A single rule: operator plus threshold, persisted as `["GT", 0]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule(pub RuleOp, pub serde_json::Value);

pub type Rules = BTreeMap<String, Rule>;

#[derive(Clone, Debug)]
pub struct AttackClass {
    pub attack_class_id: i64,
    pub name: String,
    pub rules: Rules,
}

/// Exponentially-weighted bribe-ratio aggregate per (class, bucket).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmaRow {
    pub count_attacks: i64,
    pub last_block_number: Option<u64>,
    pub last_bribes_ratio: Option<f64>,
    pub bribes_ratio_ema: Option<f64>,
}

/// Miner internal transfer reported by the explorer.
#[derive(Clone, Debug)]
pub struct InternalTx {
    pub hash: H256,
    pub to: Option<Address>,
    pub value: U256,
}

/// Row of the dashboard summary join.
#[derive(Clone, Debug)]
pub struct MonitorOutputRow {
    pub attack_class: String,
    pub attacker: String,
    pub count_attacks: i64,
    pub last_block_number: Option<u64>,
    pub last_bribes_ratio: Option<f64>,
    pub bribes_ratio_ema: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{USDC, WETH};

    #[test]
    fn asset_round_trips_through_strings() {
        let eth = Asset::Eth;
        assert_eq!(eth.to_string(), "eth");
        assert_eq!("eth".parse::<Asset>().unwrap(), eth);

        let weth = Asset::Token(*WETH);
        let s = weth.to_string();
        assert_eq!(s, "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        assert_eq!(s.parse::<Asset>().unwrap(), weth);
    }

    #[test]
    fn asset_maps_serialize_with_string_keys() {
        let mut saldo = BTreeMap::new();
        saldo.insert(Asset::Eth, -0.25);
        saldo.insert(Asset::Token(*WETH), 2.0);
        let json = serde_json::to_string(&saldo).unwrap();
        assert!(json.contains("\"eth\":-0.25"));
        let back: BTreeMap<Asset, f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, saldo);
    }

    #[test]
    fn pair_keys_are_canonical() {
        let forward = PairKey::new(*WETH, *USDC);
        let backward = PairKey::new(*USDC, *WETH);
        assert_eq!(forward, backward);
        // USDC sorts below WETH lexicographically
        assert_eq!(forward.0, *USDC);
        assert_eq!(forward.other(*USDC), *WETH);
        assert!(forward.contains(*WETH));
    }

    #[test]
    fn rates_round_trip_as_triples() {
        let mut rates = RateMap::new();
        rates.insert(PairKey::new(*USDC, *WETH), 2000.0);
        let json = rates_to_json(&rates);
        let back = rates_from_json(&json).unwrap();
        assert_eq!(back, rates);
    }

    #[test]
    fn rules_deserialize_from_pair_arrays() {
        let rules: Rules =
            serde_json::from_str(r#"{"uniswapV2": ["GT", 0], "uniswapV3": ["EQ", 0]}"#).unwrap();
        assert_eq!(rules["uniswapV2"].0, RuleOp::GT);
        assert_eq!(rules["uniswapV3"].1, serde_json::json!(0));
    }
}
