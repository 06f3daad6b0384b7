use crate::{
    chain::ChainClient,
    error::Error,
    explorer::ExplorerApi,
    registry::AttackerRegistry,
    tokens::wei_to_ether,
    types::{BlockData, Bundle, BundleKey, EventRecord, TxRecord},
};
use ethers::types::{Block, Transaction, U256};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;

/// Receipt fetches in flight per bundle window.
const RECEIPT_CONCURRENCY: usize = 8;

/// Everything the detector learned about one block.
pub struct BlockOutcome {
    pub block: BlockData,
    pub bundles: BTreeMap<BundleKey, Bundle>,
}

impl BlockOutcome {
    pub fn events(&self) -> impl Iterator<Item = &EventRecord> {
        self.bundles.values().flat_map(|bundle| bundle.events.iter())
    }
}

struct Window {
    count: u64,
    min_index: u64,
    max_index: u64,
}

/// Detect candidate bundles in `number`: group transactions by
/// (sender, recipient), keep pairs seen at least twice, verify receipts and
/// require at least one third-party transaction inside the window.
pub async fn collect_block<C, E>(
    chain: &C,
    explorer: &E,
    registry: &AttackerRegistry,
    number: u64,
) -> Result<BlockOutcome, Error>
where
    C: ChainClient + ?Sized,
    E: ExplorerApi + ?Sized,
{
    let block =
        chain.block_with_transactions(number).await?.ok_or(Error::MissingBlock(number))?;
    let base_fee = block.base_fee_per_gas.unwrap_or_default();
    let miner = block.author.unwrap_or_default();
    let block_data = BlockData {
        number,
        base_fee_per_gas: base_fee,
        hash: block.hash.map(|h| format!("{h:#x}")).unwrap_or_default(),
        miner,
    };

    let mut windows: BTreeMap<BundleKey, Window> = BTreeMap::new();
    for tx in &block.transactions {
        let Some(to) = tx.to else { continue };
        let from = registry.bundle_sender(tx.from, &to);
        if registry.is_disabled(from, to) {
            continue;
        }
        let index = tx.transaction_index.map(|i| i.as_u64()).unwrap_or_default();
        let window = windows
            .entry(BundleKey { attacker0: from, attacker1: to })
            .or_insert(Window { count: 0, min_index: index, max_index: index });
        window.count += 1;
        window.min_index = window.min_index.min(index);
        window.max_index = window.max_index.max(index);
    }
    windows.retain(|_, window| window.count >= 2);

    let mut bundles = BTreeMap::new();
    for (key, window) in &windows {
        if let Some(bundle) = build_bundle(chain, &block, &block_data, *key, window).await? {
            bundles.insert(*key, bundle);
        }
    }

    if !bundles.is_empty() {
        match explorer.internal_transactions(number, miner).await {
            Ok(internals) => {
                for itx in internals {
                    if itx.to != Some(miner) {
                        continue;
                    }
                    for bundle in bundles.values_mut() {
                        for tx in &mut bundle.transactions {
                            if tx.hash == itx.hash {
                                tx.direct_bribe = itx.value;
                            }
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%err, "internal transfer lookup failed; direct bribes unattributed")
            }
        }
    }

    for bundle in bundles.values_mut() {
        let mut bribe = U256::zero();
        let mut burnt = U256::zero();
        let mut overpay = U256::zero();
        for tx in &bundle.transactions {
            bribe += tx.direct_bribe;
            burnt += tx.gas_burnt;
            overpay += tx.gas_overpay;
        }
        bundle.direct_bribe = wei_to_ether(bribe);
        bundle.gas_burnt = wei_to_ether(burnt);
        bundle.gas_overpay = wei_to_ether(overpay);
    }

    Ok(BlockOutcome { block: block_data, bundles })
}

fn matches_key(key: &BundleKey, tx: &Transaction) -> bool {
    (key.attacker0.is_none() || Some(tx.from) == key.attacker0) && tx.to == Some(key.attacker1)
}

async fn build_bundle<C>(
    chain: &C,
    block: &Block<Transaction>,
    block_data: &BlockData,
    key: BundleKey,
    window: &Window,
) -> Result<Option<Bundle>, Error>
where
    C: ChainClient + ?Sized,
{
    let mut members: Vec<&Transaction> = Vec::new();
    for ti in window.min_index..=window.max_index {
        let Some(tx) = block.transactions.get(ti as usize) else {
            break;
        };
        let index = tx.transaction_index.map(|i| i.as_u64()).unwrap_or_default();
        if index != ti {
            tracing::warn!(
                block = block_data.number,
                expected = ti,
                actual = index,
                "transaction index mismatch; abandoning window"
            );
            break;
        }
        if matches_key(&key, tx) {
            members.push(tx);
        }
    }

    let receipts = stream::iter(members.iter().map(|tx| {
        let hash = tx.hash;
        async move { chain.receipt(hash).await }
    }))
    .buffered(RECEIPT_CONCURRENCY)
    .collect::<Vec<_>>()
    .await;

    let mut transactions = Vec::new();
    let mut events = Vec::new();
    let mut actual_min = None;
    let mut actual_max = None;
    for (tx, receipt) in members.iter().zip(receipts) {
        let receipt = match receipt? {
            Some(receipt) => receipt,
            None => {
                tracing::warn!(hash = ?tx.hash, "missing receipt; skipping transaction");
                continue;
            }
        };
        if receipt.status.map(|s| s.as_u64()) != Some(1) {
            continue;
        }
        let index = tx.transaction_index.map(|i| i.as_u64()).unwrap_or_default();
        let gas_used = receipt.gas_used.unwrap_or_default();
        let effective_gas_price = receipt.effective_gas_price.unwrap_or_default();
        for log in &receipt.logs {
            events.push(EventRecord {
                block_number: block_data.number,
                tx_hash: tx.hash,
                address: log.address,
                data: log.data.clone(),
                topics: log.topics.clone(),
            });
        }
        transactions.push(TxRecord {
            hash: tx.hash,
            block_number: block_data.number,
            index,
            from: tx.from,
            to: key.attacker1,
            gas_used,
            gas_price: tx.gas_price.unwrap_or_default(),
            max_fee_per_gas: tx.max_fee_per_gas,
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
            gas_burnt: block_data.base_fee_per_gas * gas_used,
            gas_overpay: effective_gas_price.saturating_sub(block_data.base_fee_per_gas)
                * gas_used,
            direct_bribe: U256::zero(),
            value: tx.value,
            role: 1,
        });
        actual_min = Some(actual_min.map_or(index, |min: u64| min.min(index)));
        actual_max = Some(actual_max.map_or(index, |max: u64| max.max(index)));
    }

    // a bundle with no logs at all carries no analyzable signal
    if events.is_empty() {
        return Ok(None);
    }
    let (Some(min_index), Some(max_index)) = (actual_min, actual_max) else {
        return Ok(None);
    };

    let mut inner_tx_count = 0u64;
    for ti in (min_index + 1)..=max_index {
        let Some(tx) = block.transactions.get(ti as usize) else {
            break;
        };
        if matches_key(&key, tx) {
            continue;
        }
        if tx.to.is_some() {
            inner_tx_count += 1;
        }
    }
    if inner_tx_count == 0 {
        return Ok(None);
    }

    Ok(Some(Bundle {
        key,
        block_number: block_data.number,
        min_index,
        max_index,
        inner_tx_count,
        transactions,
        events,
        direct_bribe: 0.0,
        gas_burnt: 0.0,
        gas_overpay: 0.0,
        state: None,
        valuation: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::types::{AttackerRow, AttackerStatus, InternalTx};
    use ethers::types::{Address, H256};

    const BLOCK: u64 = 19_360_531;

    fn base_fee() -> U256 {
        U256::from(10_000_000_000u64) // 10 gwei
    }

    fn plain_log(address: Address) -> ethers::types::Log {
        log(address, vec![H256::zero()], words(&[U256::one()]))
    }

    struct Fixture {
        chain: MockChain,
        explorer: MockExplorer,
        registry: AttackerRegistry,
    }

    /// txs `[A->X, B->C, A->X, D->E]`, both A->X succeed with one log each.
    fn sandwich_fixture() -> Fixture {
        let (a, x) = (addr(1), addr(2));
        let (b, c) = (addr(3), addr(4));
        let (d, e) = (addr(5), addr(6));
        let txs = vec![
            tx(0, a, Some(x), tx_hash(10)),
            tx(1, b, Some(c), tx_hash(11)),
            tx(2, a, Some(x), tx_hash(12)),
            tx(3, d, Some(e), tx_hash(13)),
        ];
        let mut chain = MockChain::default();
        chain.blocks.insert(BLOCK, block(BLOCK, base_fee(), addr(99), txs));
        let gas_price = U256::from(12_000_000_000u64);
        chain
            .receipts
            .insert(tx_hash(10), receipt(1, U256::from(100_000u64), gas_price, vec![plain_log(addr(50))]));
        chain
            .receipts
            .insert(tx_hash(12), receipt(1, U256::from(100_000u64), gas_price, vec![plain_log(addr(50))]));
        Fixture {
            chain,
            explorer: MockExplorer::default(),
            registry: AttackerRegistry::default(),
        }
    }

    #[tokio::test]
    async fn detects_single_sandwich_bundle() {
        let fixture = sandwich_fixture();
        let outcome =
            collect_block(&fixture.chain, &fixture.explorer, &fixture.registry, BLOCK)
                .await
                .unwrap();

        assert_eq!(outcome.bundles.len(), 1);
        let key = BundleKey { attacker0: Some(addr(1)), attacker1: addr(2) };
        let bundle = &outcome.bundles[&key];
        assert_eq!(bundle.min_index, 0);
        assert_eq!(bundle.max_index, 2);
        assert_eq!(bundle.inner_tx_count, 1);
        assert_eq!(bundle.transactions.len(), 2);
        assert_eq!(bundle.events.len(), 2);

        // gasBurnt = baseFee * gasUsed, gasOverpay = (effective - base) * gasUsed
        let tx = &bundle.transactions[0];
        assert_eq!(tx.gas_burnt, U256::from(1_000_000_000_000_000u64));
        assert_eq!(tx.gas_overpay, U256::from(200_000_000_000_000u64));
        assert!((bundle.gas_burnt - 0.002).abs() < 1e-12);
        assert!((bundle.gas_overpay - 0.0004).abs() < 1e-12);
    }

    #[tokio::test]
    async fn attributes_direct_bribes_from_internal_transfers() {
        let mut fixture = sandwich_fixture();
        fixture.explorer.internals = vec![
            InternalTx {
                hash: tx_hash(12),
                to: Some(addr(99)),
                value: U256::exp10(16),
            },
            // transfer to someone other than the miner is ignored
            InternalTx { hash: tx_hash(10), to: Some(addr(98)), value: U256::exp10(18) },
        ];
        let outcome =
            collect_block(&fixture.chain, &fixture.explorer, &fixture.registry, BLOCK)
                .await
                .unwrap();
        let key = BundleKey { attacker0: Some(addr(1)), attacker1: addr(2) };
        let bundle = &outcome.bundles[&key];
        assert_eq!(bundle.transactions[0].direct_bribe, U256::zero());
        assert_eq!(bundle.transactions[1].direct_bribe, U256::exp10(16));
        assert!((bundle.direct_bribe - 0.01).abs() < 1e-12);
    }

    #[tokio::test]
    async fn multisender_bundle_is_keyed_with_null_sender() {
        let x = addr(2);
        let txs = vec![
            tx(0, addr(20), Some(x), tx_hash(30)),
            tx(1, addr(7), Some(addr(8)), tx_hash(31)),
            tx(2, addr(21), Some(x), tx_hash(32)),
        ];
        let mut chain = MockChain::default();
        chain.blocks.insert(BLOCK, block(BLOCK, base_fee(), addr(99), txs));
        let gas_price = U256::from(11_000_000_000u64);
        for hash in [tx_hash(30), tx_hash(32)] {
            chain
                .receipts
                .insert(hash, receipt(1, U256::from(90_000u64), gas_price, vec![plain_log(addr(50))]));
        }
        let registry = AttackerRegistry::from_rows(vec![AttackerRow {
            attacker_id: 1,
            from: None,
            to: x,
            status: AttackerStatus::Enabled,
            note: Some("router".to_string()),
            report: 0,
        }]);

        let outcome =
            collect_block(&chain, &MockExplorer::default(), &registry, BLOCK).await.unwrap();
        assert_eq!(outcome.bundles.len(), 1);
        let key = BundleKey { attacker0: None, attacker1: x };
        let bundle = &outcome.bundles[&key];
        assert_eq!(bundle.inner_tx_count, 1);
        assert_eq!(bundle.transactions.len(), 2);
    }

    #[tokio::test]
    async fn disabled_pairs_are_suppressed() {
        let fixture = sandwich_fixture();
        let registry = AttackerRegistry::from_rows(vec![AttackerRow {
            attacker_id: 1,
            from: Some(addr(1)),
            to: addr(2),
            status: AttackerStatus::Disabled,
            note: None,
            report: 0,
        }]);
        let outcome =
            collect_block(&fixture.chain, &fixture.explorer, &registry, BLOCK).await.unwrap();
        assert!(outcome.bundles.is_empty());
    }

    #[tokio::test]
    async fn failed_receipts_shrink_the_window_until_discard() {
        let mut fixture = sandwich_fixture();
        // first leg reverts: only one transaction survives, no bracketing
        fixture.chain.receipts.insert(
            tx_hash(10),
            receipt(0, U256::from(100_000u64), U256::from(12_000_000_000u64), vec![]),
        );
        let outcome =
            collect_block(&fixture.chain, &fixture.explorer, &fixture.registry, BLOCK)
                .await
                .unwrap();
        assert!(outcome.bundles.is_empty());
    }

    #[tokio::test]
    async fn bundles_without_logs_are_discarded() {
        let mut fixture = sandwich_fixture();
        let gas_price = U256::from(12_000_000_000u64);
        fixture
            .chain
            .receipts
            .insert(tx_hash(10), receipt(1, U256::from(100_000u64), gas_price, vec![]));
        fixture
            .chain
            .receipts
            .insert(tx_hash(12), receipt(1, U256::from(100_000u64), gas_price, vec![]));
        let outcome =
            collect_block(&fixture.chain, &fixture.explorer, &fixture.registry, BLOCK)
                .await
                .unwrap();
        assert!(outcome.bundles.is_empty());
    }
}
