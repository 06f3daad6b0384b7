use crate::{
    contracts::{AbiKind, PairSource},
    tokens::{coin_decimals, s256_to_f64, token_units, u256_to_f64, wei_to_ether, WETH},
    types::{Asset, Bundle, BundleKey, EventRecord, PairKey, SaldoState},
};
use ethers::types::{Address, H256, U256};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

pub(crate) static TOPIC_WITHDRAW: Lazy<H256> = Lazy::new(|| {
    "0x7fcf532c15f0a6db0bd6d0e038bea71d30d808c7d98cb3bf7268a95bf5081b65".parse().expect("topic")
});
pub(crate) static TOPIC_DEPOSIT: Lazy<H256> = Lazy::new(|| {
    "0xe1fffcc4923d04b559f4d29a8bfc6cda04eb5b0d3c460751c2402c5c5cc9109c".parse().expect("topic")
});
pub(crate) static TOPIC_UNISWAP_V2_SWAP: Lazy<H256> = Lazy::new(|| {
    "0xd78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822".parse().expect("topic")
});
pub(crate) static TOPIC_UNISWAP_V3_SWAP: Lazy<H256> = Lazy::new(|| {
    "0xc42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67".parse().expect("topic")
});
pub(crate) static TOPIC_PANCAKE_V3_SWAP: Lazy<H256> = Lazy::new(|| {
    "0x19b47279256b2a23a1665c810c8d55a1758940ee09377d4f8d26497a3577dc83".parse().expect("topic")
});
pub(crate) static TOPIC_MINT: Lazy<H256> = Lazy::new(|| {
    "0x7a53080ba414158be7ec69b987b5fb7d07dee101fe85488f0853ae16239d0bde".parse().expect("topic")
});
pub(crate) static TOPIC_COLLECT: Lazy<H256> = Lazy::new(|| {
    "0x70935338e69775456a85ddef226c395fb668b63fa0115f5f20610b388e6ca9c0".parse().expect("topic")
});
pub(crate) static TOPIC_TRANSFER: Lazy<H256> = Lazy::new(|| {
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef".parse().expect("topic")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventKind {
    Withdraw,
    Deposit,
    UniswapV2Swap,
    UniswapV3Swap,
    PancakeV3Swap,
    Mint,
    Collect,
    Transfer,
}

fn event_kind(topics: &[H256]) -> Option<EventKind> {
    let topic0 = topics.first()?;
    if *topic0 == *TOPIC_WITHDRAW {
        Some(EventKind::Withdraw)
    } else if *topic0 == *TOPIC_DEPOSIT {
        Some(EventKind::Deposit)
    } else if *topic0 == *TOPIC_UNISWAP_V2_SWAP {
        Some(EventKind::UniswapV2Swap)
    } else if *topic0 == *TOPIC_UNISWAP_V3_SWAP {
        Some(EventKind::UniswapV3Swap)
    } else if *topic0 == *TOPIC_PANCAKE_V3_SWAP {
        Some(EventKind::PancakeV3Swap)
    } else if *topic0 == *TOPIC_MINT {
        Some(EventKind::Mint)
    } else if *topic0 == *TOPIC_COLLECT {
        Some(EventKind::Collect)
    } else if *topic0 == *TOPIC_TRANSFER {
        Some(EventKind::Transfer)
    } else {
        None
    }
}

/// 32-byte word `index` of the log data.
fn word(data: &[u8], index: usize) -> Option<U256> {
    let start = index * 32;
    data.get(start..start + 32).map(U256::from_big_endian)
}

/// The whole data payload as a single amount word.
fn full_word(data: &[u8]) -> Option<U256> {
    if data.len() == 32 {
        Some(U256::from_big_endian(data))
    } else {
        None
    }
}

/// Gas facts of a member transaction, in ether.
struct GasCharge {
    hash: H256,
    gas_burnt: f64,
    gas_overpay: f64,
    direct_bribe: f64,
}

impl SaldoState {
    /// Charge a transaction's gas and bribe at most once per bundle; the
    /// same wei leave `saldo[eth]`.
    fn charge_gas(&mut self, charge: &GasCharge) {
        if !self.charged.insert(charge.hash) {
            return;
        }
        self.gas_burnt += charge.gas_burnt;
        self.gas_overpay += charge.gas_overpay;
        self.direct_bribe += charge.direct_bribe;
        *self.saldo.entry(Asset::Eth).or_insert(0.0) -=
            charge.gas_burnt + charge.gas_overpay + charge.direct_bribe;
        self.raise_capital(&[Asset::Eth]);
    }

    /// Record the latest observed price for the pair, canonical key,
    /// direction recovered at lookup. `amount1`/`amount0` are raw net flows.
    fn update_rates(&mut self, token0: Address, token1: Address, amount1: f64, amount0: f64) {
        if amount1 == 0.0 || amount0 == 0.0 {
            return;
        }
        let rate = (amount1 * coin_decimals(&token0) / (amount0 * coin_decimals(&token1))).abs();
        if token0 <= token1 {
            self.rates.insert(PairKey(token0, token1), rate);
        } else {
            self.rates.insert(PairKey(token1, token0), 1.0 / rate);
        }
    }
}

fn wrap_state(bundle: &mut Bundle) -> &mut SaldoState {
    bundle.state.get_or_insert_with(|| {
        let mut state = SaldoState::default();
        state.ensure_assets(&[Asset::Eth]);
        state
    })
}

fn pool_state(bundle: &mut Bundle, token0: Address, token1: Address) -> &mut SaldoState {
    bundle.state.get_or_insert_with(|| {
        let mut state = SaldoState::default();
        state.ensure_assets(&[Asset::Token(token0), Asset::Token(token1), Asset::Eth]);
        state
    })
}

/// Run the decoder over every bundle of a block, mutating saldo state,
/// capital requirements, rates and feature counters in place.
pub async fn apply_events<P>(pairs: &P, bundles: &mut BTreeMap<BundleKey, Bundle>)
where
    P: PairSource + ?Sized,
{
    for bundle in bundles.values_mut() {
        decode_bundle(pairs, bundle).await;
    }
}

async fn decode_bundle<P>(pairs: &P, bundle: &mut Bundle)
where
    P: PairSource + ?Sized,
{
    let events = bundle.events.clone();
    for event in &events {
        let Some(kind) = event_kind(&event.topics) else {
            continue;
        };
        let Some(charge) = gas_charge(bundle, event.tx_hash) else {
            continue;
        };
        match kind {
            EventKind::Transfer => handle_transfer(bundle, event, &charge),
            EventKind::Deposit => handle_wrap(bundle, event, &charge, 1.0),
            EventKind::Withdraw => handle_wrap(bundle, event, &charge, -1.0),
            EventKind::UniswapV2Swap => {
                let Some((token0, token1)) =
                    pairs.pair_tokens(event.address, AbiKind::Pair).await
                else {
                    continue;
                };
                handle_v2_swap(bundle, event, &charge, token0, token1);
            }
            EventKind::UniswapV3Swap | EventKind::PancakeV3Swap => {
                let abi_kind = if kind == EventKind::UniswapV3Swap {
                    AbiKind::Pool
                } else {
                    AbiKind::Unknown
                };
                let Some((token0, token1)) = pairs.pair_tokens(event.address, abi_kind).await
                else {
                    continue;
                };
                handle_v3_swap(bundle, event, &charge, token0, token1, kind);
            }
            EventKind::Mint | EventKind::Collect => {
                let Some((token0, token1)) =
                    pairs.pair_tokens(event.address, AbiKind::Pool).await
                else {
                    continue;
                };
                handle_mint_collect(bundle, event, &charge, token0, token1, kind);
            }
        }
    }
}

fn gas_charge(bundle: &Bundle, tx_hash: H256) -> Option<GasCharge> {
    let tx = bundle.transactions.iter().find(|tx| tx.hash == tx_hash)?;
    Some(GasCharge {
        hash: tx.hash,
        gas_burnt: wei_to_ether(tx.gas_burnt),
        gas_overpay: wei_to_ether(tx.gas_overpay),
        direct_bribe: wei_to_ether(tx.direct_bribe),
    })
}

fn handle_transfer(bundle: &mut Bundle, event: &EventRecord, charge: &GasCharge) {
    let emitter = event.address;
    let state = wrap_state(bundle);
    if let Some(topic1) = event.topics.get(1) {
        if topic1.is_zero() {
            state.mint_burn_nft += 1;
        } else if let Some(topic2) = event.topics.get(2) {
            if topic2.is_zero() {
                state.mint_burn_nft += 1;
            } else if Address::from_slice(&topic2.as_bytes()[12..]) == emitter {
                // tax pattern: tokens flow back to the emitting contract
                if let Some(value) = full_word(&event.data) {
                    let token = Asset::Token(emitter);
                    state.ensure_assets(&[token]);
                    *state.saldo.entry(token).or_insert(0.0) -= token_units(value, &emitter);
                    state.raise_capital(&[token]);
                }
            }
        }
    }
    state.charge_gas(charge);
}

fn handle_wrap(bundle: &mut Bundle, event: &EventRecord, charge: &GasCharge, sign: f64) {
    let amount = word(&event.data, 0)
        .or_else(|| event.topics.get(2).map(|t| U256::from_big_endian(t.as_bytes())));
    let Some(amount) = amount else {
        tracing::warn!(tx = ?event.tx_hash, "wrap event without an amount; discarding");
        return;
    };
    let amount = u256_to_f64(amount) / 1e18;
    let weth = Asset::Token(*WETH);
    let state = wrap_state(bundle);
    state.ensure_assets(&[weth]);
    *state.saldo.entry(weth).or_insert(0.0) += sign * amount;
    *state.saldo.entry(Asset::Eth).or_insert(0.0) -= sign * amount;
    state.raise_capital(&[weth]);
    state.charge_gas(charge);
}

fn handle_v2_swap(
    bundle: &mut Bundle,
    event: &EventRecord,
    charge: &GasCharge,
    token0: Address,
    token1: Address,
) {
    let (in0, in1, out0, out1) = match (
        word(&event.data, 0),
        word(&event.data, 1),
        word(&event.data, 2),
        word(&event.data, 3),
    ) {
        (Some(in0), Some(in1), Some(out0), Some(out1)) => (in0, in1, out0, out1),
        _ => {
            tracing::warn!(tx = ?event.tx_hash, "short V2 swap data; discarding");
            return;
        }
    };
    let state = pool_state(bundle, token0, token1);
    state.uniswap_v2 += 1;
    let (asset0, asset1) = (Asset::Token(token0), Asset::Token(token1));
    state.ensure_assets(&[asset0, asset1]);
    state.charge_gas(charge);

    *state.saldo.entry(asset0).or_insert(0.0) +=
        token_units(out0, &token0) - token_units(in0, &token0);
    *state.saldo.entry(asset1).or_insert(0.0) +=
        token_units(out1, &token1) - token_units(in1, &token1);
    state.update_rates(
        token0,
        token1,
        u256_to_f64(in1) + u256_to_f64(out1),
        u256_to_f64(in0) + u256_to_f64(out0),
    );
    state.raise_capital(&[asset0, asset1]);
}

fn handle_v3_swap(
    bundle: &mut Bundle,
    event: &EventRecord,
    charge: &GasCharge,
    token0: Address,
    token1: Address,
    kind: EventKind,
) {
    let (amount0, amount1) = match (word(&event.data, 0), word(&event.data, 1)) {
        (Some(raw0), Some(raw1)) => (s256_to_f64(raw0), s256_to_f64(raw1)),
        _ => {
            tracing::warn!(tx = ?event.tx_hash, "short V3 swap data; discarding");
            return;
        }
    };
    let state = pool_state(bundle, token0, token1);
    if kind == EventKind::UniswapV3Swap {
        state.uniswap_v3 += 1;
    } else {
        state.pancake_v3 += 1;
    }
    let (asset0, asset1) = (Asset::Token(token0), Asset::Token(token1));
    state.ensure_assets(&[asset0, asset1, Asset::Token(*WETH)]);
    state.charge_gas(charge);

    *state.saldo.entry(asset0).or_insert(0.0) -= amount0 / coin_decimals(&token0);
    *state.saldo.entry(asset1).or_insert(0.0) -= amount1 / coin_decimals(&token1);
    state.update_rates(token0, token1, amount1, amount0);
    state.raise_capital(&[asset0, asset1]);
}

fn handle_mint_collect(
    bundle: &mut Bundle,
    event: &EventRecord,
    charge: &GasCharge,
    token0: Address,
    token1: Address,
    kind: EventKind,
) {
    // Mint data: (sender, liquidity, amount0, amount1); Collect: (recipient, amount0, amount1)
    let (word0, word1, sign) = if kind == EventKind::Mint {
        (word(&event.data, 2), word(&event.data, 3), -1.0)
    } else {
        (word(&event.data, 1), word(&event.data, 2), 1.0)
    };
    let (amount0, amount1) = match (word0, word1) {
        (Some(a0), Some(a1)) => (a0, a1),
        _ => {
            tracing::warn!(tx = ?event.tx_hash, "short mint/collect data; discarding");
            return;
        }
    };
    let state = pool_state(bundle, token0, token1);
    state.mint_burn_v3 += 1;
    let (asset0, asset1) = (Asset::Token(token0), Asset::Token(token1));
    state.ensure_assets(&[asset0, asset1]);
    state.charge_gas(charge);

    *state.saldo.entry(asset0).or_insert(0.0) += sign * token_units(amount0, &token0);
    *state.saldo.entry(asset1).or_insert(0.0) += sign * token_units(amount1, &token1);
    state.raise_capital(&[asset0, asset1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::tokens::{USDC, WETH};
    use crate::types::TxRecord;

    fn member_tx(hash: H256) -> TxRecord {
        TxRecord {
            hash,
            block_number: 1,
            index: 0,
            from: addr(1),
            to: addr(2),
            gas_used: U256::from(100_000u64),
            gas_price: U256::zero(),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            gas_burnt: U256::exp10(16),    // 0.01 ether
            gas_overpay: U256::exp10(16) * U256::from(2u64), // 0.02 ether
            direct_bribe: U256::zero(),
            value: U256::zero(),
            role: 1,
        }
    }

    fn bundle_with(transactions: Vec<TxRecord>, events: Vec<EventRecord>) -> Bundle {
        Bundle {
            key: BundleKey { attacker0: Some(addr(1)), attacker1: addr(2) },
            block_number: 1,
            min_index: 0,
            max_index: 2,
            inner_tx_count: 1,
            transactions,
            events,
            direct_bribe: 0.0,
            gas_burnt: 0.0,
            gas_overpay: 0.0,
            state: None,
            valuation: None,
        }
    }

    fn event(address: Address, topics: Vec<H256>, data: ethers::types::Bytes) -> EventRecord {
        EventRecord { block_number: 1, tx_hash: tx_hash(1), address, data, topics }
    }

    async fn decode(pairs: &MockPairs, bundle: &mut Bundle) {
        let mut bundles = BTreeMap::new();
        bundles.insert(bundle.key, bundle.clone());
        apply_events(pairs, &mut bundles).await;
        *bundle = bundles.into_values().next().unwrap();
    }

    #[tokio::test]
    async fn wrap_events_move_balance_between_weth_and_eth() {
        let weth = Asset::Token(*WETH);
        let amount = U256::exp10(18) * U256::from(3u64);

        let mut bundle = bundle_with(
            vec![member_tx(tx_hash(1))],
            vec![
                event(*WETH, vec![*TOPIC_WITHDRAW, address_topic(addr(1))], words(&[amount])),
            ],
        );
        decode(&MockPairs::default(), &mut bundle).await;
        let state = bundle.state.as_ref().unwrap();
        assert_eq!(state.saldo[&weth], -3.0);
        // withdraw releases ether, gas (0.03) is deducted once
        assert!((state.saldo[&Asset::Eth] - (3.0 - 0.03)).abs() < 1e-12);
        assert_eq!(state.capital_requirements[&weth], 3.0);
        assert_eq!(state.capital_requirements[&Asset::Eth], 0.0);

        let mut bundle = bundle_with(
            vec![member_tx(tx_hash(1))],
            vec![event(*WETH, vec![*TOPIC_DEPOSIT, address_topic(addr(1))], words(&[amount]))],
        );
        decode(&MockPairs::default(), &mut bundle).await;
        let state = bundle.state.as_ref().unwrap();
        assert_eq!(state.saldo[&weth], 3.0);
        assert!((state.saldo[&Asset::Eth] - (-3.0 - 0.03)).abs() < 1e-12);
        assert!((state.capital_requirements[&Asset::Eth] - 3.03).abs() < 1e-12);
    }

    #[tokio::test]
    async fn transfer_decodes_nft_and_tax_patterns() {
        let token = addr(77);
        // mint: from is the zero address
        let nft_mint = event(
            token,
            vec![*TOPIC_TRANSFER, H256::zero(), address_topic(addr(1))],
            words(&[U256::one()]),
        );
        // tax: recipient is the emitting contract itself
        let tax = event(
            token,
            vec![*TOPIC_TRANSFER, address_topic(addr(1)), address_topic(token)],
            words(&[U256::exp10(18) * U256::from(5u64)]),
        );
        // ordinary transfer: intentionally no saldo effect
        let plain = event(
            token,
            vec![*TOPIC_TRANSFER, address_topic(addr(1)), address_topic(addr(9))],
            words(&[U256::exp10(18)]),
        );
        let mut bundle =
            bundle_with(vec![member_tx(tx_hash(1))], vec![nft_mint, tax, plain]);
        decode(&MockPairs::default(), &mut bundle).await;
        let state = bundle.state.as_ref().unwrap();
        assert_eq!(state.mint_burn_nft, 1);
        assert_eq!(state.saldo[&Asset::Token(token)], -5.0);
        assert_eq!(state.capital_requirements[&Asset::Token(token)], 5.0);
        // three events, one transaction: gas charged exactly once
        assert!((state.gas_burnt - 0.01).abs() < 1e-12);
        assert!((state.gas_overpay - 0.02).abs() < 1e-12);
        assert!((state.saldo[&Asset::Eth] - (-0.03)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn v2_sandwich_round_trip() {
        let pool = addr(50);
        let mut pairs = MockPairs::default();
        pairs.pools.insert(pool, (*WETH, *USDC));

        let hundred_weth = U256::exp10(18) * U256::from(100u64);
        let usdc_out = U256::from(200_000u64) * U256::exp10(6);
        let front = event(
            pool,
            vec![*TOPIC_UNISWAP_V2_SWAP, address_topic(addr(1)), address_topic(addr(1))],
            words(&[hundred_weth, U256::zero(), U256::zero(), usdc_out]),
        );
        let back_weth = U256::exp10(18) * U256::from(102u64);
        let back = EventRecord {
            tx_hash: tx_hash(2),
            ..event(
                pool,
                vec![*TOPIC_UNISWAP_V2_SWAP, address_topic(addr(1)), address_topic(addr(1))],
                words(&[U256::zero(), usdc_out, back_weth, U256::zero()]),
            )
        };
        let mut tx2 = member_tx(tx_hash(2));
        tx2.index = 2;
        let mut bundle = bundle_with(vec![member_tx(tx_hash(1)), tx2], vec![front, back]);
        decode(&pairs, &mut bundle).await;

        let state = bundle.state.as_ref().unwrap();
        assert_eq!(state.uniswap_v2, 2);
        assert!((state.saldo[&Asset::Token(*WETH)] - 2.0).abs() < 1e-9);
        assert!(state.saldo[&Asset::Token(*USDC)].abs() < 1e-9);
        assert!((state.capital_requirements[&Asset::Token(*WETH)] - 100.0).abs() < 1e-9);
        assert_eq!(state.capital_requirements[&Asset::Token(*USDC)], 0.0);
        // latest observed price wins: 200000 / 102 per WETH
        let rate = state.rates[&PairKey::new(*WETH, *USDC)];
        let expected_from_usdc_side = 102.0 / 200_000.0;
        assert!((rate - expected_from_usdc_side).abs() / expected_from_usdc_side < 1e-9);
        // both transactions charged
        assert!((state.gas_burnt - 0.02).abs() < 1e-12);
        assert!((state.gas_overpay - 0.04).abs() < 1e-12);
    }

    #[tokio::test]
    async fn v3_swap_uses_signed_amounts() {
        let pool = addr(51);
        let mut pairs = MockPairs::default();
        pairs.pools.insert(pool, (*WETH, *USDC));

        // pool receives 5 WETH, pays out 9000 USDC
        let amount0 = signed_word(5_000_000_000_000_000_000);
        let amount1 = signed_word(-9_000_000_000);
        let swap = event(
            pool,
            vec![*TOPIC_UNISWAP_V3_SWAP, address_topic(addr(1)), address_topic(addr(1))],
            words(&[amount0, amount1]),
        );
        let mut bundle = bundle_with(vec![member_tx(tx_hash(1))], vec![swap]);
        decode(&pairs, &mut bundle).await;

        let state = bundle.state.as_ref().unwrap();
        assert_eq!(state.uniswap_v3, 1);
        assert!((state.saldo[&Asset::Token(*WETH)] + 5.0).abs() < 1e-9);
        assert!((state.saldo[&Asset::Token(*USDC)] - 9000.0).abs() < 1e-9);
        assert!((state.capital_requirements[&Asset::Token(*WETH)] - 5.0).abs() < 1e-9);
        // WETH is ensured in the maps even when untouched by the swap legs
        assert!(state.saldo.contains_key(&Asset::Token(*WETH)));
        // canonical key orients the rate from the USDC side: 5 WETH per 9000 USDC
        let rate = state.rates[&PairKey::new(*WETH, *USDC)];
        assert!((rate - 5.0 / 9000.0).abs() < 1e-15);
    }

    #[tokio::test]
    async fn mint_and_collect_share_the_v3_counter() {
        let pool = addr(52);
        let mut pairs = MockPairs::default();
        pairs.pools.insert(pool, (*WETH, *USDC));

        let mint = event(
            pool,
            vec![*TOPIC_MINT, address_topic(addr(1))],
            words(&[
                U256::from_big_endian(address_topic(addr(1)).as_bytes()),
                U256::from(123u64),
                U256::exp10(18) * U256::from(4u64),
                U256::from(8_000u64) * U256::exp10(6),
            ]),
        );
        let collect = EventRecord {
            tx_hash: tx_hash(2),
            ..event(
                pool,
                vec![*TOPIC_COLLECT, address_topic(addr(1))],
                words(&[
                    U256::from_big_endian(address_topic(addr(1)).as_bytes()),
                    U256::exp10(18),
                    U256::from(2_000u64) * U256::exp10(6),
                ]),
            )
        };
        let mut tx2 = member_tx(tx_hash(2));
        tx2.index = 2;
        let mut bundle = bundle_with(vec![member_tx(tx_hash(1)), tx2], vec![mint, collect]);
        decode(&pairs, &mut bundle).await;

        let state = bundle.state.as_ref().unwrap();
        assert_eq!(state.mint_burn_v3, 2);
        assert!((state.saldo[&Asset::Token(*WETH)] + 3.0).abs() < 1e-9);
        assert!((state.saldo[&Asset::Token(*USDC)] + 6000.0).abs() < 1e-9);
        assert!((state.capital_requirements[&Asset::Token(*WETH)] - 4.0).abs() < 1e-9);
        assert!((state.capital_requirements[&Asset::Token(*USDC)] - 8000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unresolvable_pool_skips_the_event() {
        let pool = addr(53);
        let swap = event(
            pool,
            vec![*TOPIC_UNISWAP_V2_SWAP, address_topic(addr(1)), address_topic(addr(1))],
            words(&[U256::one(), U256::zero(), U256::zero(), U256::one()]),
        );
        let mut bundle = bundle_with(vec![member_tx(tx_hash(1))], vec![swap]);
        decode(&MockPairs::default(), &mut bundle).await;
        assert!(bundle.state.is_none());
    }

    #[tokio::test]
    async fn replaying_events_yields_identical_accumulators() {
        let pool = addr(50);
        let mut pairs = MockPairs::default();
        pairs.pools.insert(pool, (*WETH, *USDC));
        let swap = event(
            pool,
            vec![*TOPIC_UNISWAP_V2_SWAP, address_topic(addr(1)), address_topic(addr(1))],
            words(&[U256::exp10(18), U256::zero(), U256::zero(), U256::exp10(6)]),
        );
        let mut first = bundle_with(vec![member_tx(tx_hash(1))], vec![swap]);
        let mut second = first.clone();
        decode(&pairs, &mut first).await;
        decode(&pairs, &mut second).await;
        let (a, b) = (first.state.unwrap(), second.state.unwrap());
        assert_eq!(a.saldo, b.saldo);
        assert_eq!(a.capital_requirements, b.capital_requirements);
        assert_eq!(a.gas_burnt.to_bits(), b.gas_burnt.to_bits());
        assert_eq!(a.gas_overpay.to_bits(), b.gas_overpay.to_bits());
        assert_eq!(a.direct_bribe.to_bits(), b.direct_bribe.to_bits());
    }
}
