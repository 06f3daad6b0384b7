use crate::{
    chain::{ChainClient, RpcChainClient},
    classify,
    config::{self, Config},
    contracts::Contracts,
    detect,
    ema::EmaBook,
    error::Error,
    explorer::{EtherscanClient, ExplorerApi},
    registry::AttackerRegistry,
    remote::{SshForward, DEFAULT_DB_PORT},
    saldo,
    store::Store,
    types::StoredBundle,
    valuation,
};
use std::sync::Arc;

/// The block-processing service: one block at a time is detected, decoded,
/// valued, persisted and classified before the next begins. EMA updates
/// commit together with the block that produced them, so a restart resumes
/// exactly from the persisted gap.
pub struct Monitor<C, E> {
    chain: Arc<C>,
    explorer: Arc<E>,
    contracts: Contracts<C, E>,
    store: Store,
    registry: AttackerRegistry,
    eth_rate: f64,
    alpha: f64,
    forward: Option<SshForward>,
}

impl Monitor<RpcChainClient, EtherscanClient> {
    pub async fn build(config: &Config) -> Result<Self, Error> {
        let node_keys = config::load_node_keys(&config.key_file)?;
        if let Some(wss_url) = &node_keys.wss_url {
            tracing::debug!(%wss_url, "websocket endpoint configured");
        }
        let chain = Arc::new(RpcChainClient::connect(&node_keys.http_url)?);
        let api_key = config::load_api_key(&config.etherscan_key_file)?;
        let explorer = Arc::new(EtherscanClient::new(api_key));
        // the forward must be up before the store connects and is torn down
        // with the monitor on every exit path
        let forward = match config.db_server() {
            Some(host) => Some(SshForward::open(host, DEFAULT_DB_PORT).await?),
            None => None,
        };
        let store = Store::connect(&format!("sqlite://{}", config.db_file)).await?;
        Self::assemble(chain, explorer, store, config.ema_alpha, forward).await
    }
}

impl<C: ChainClient, E: ExplorerApi> Monitor<C, E> {
    pub async fn assemble(
        chain: Arc<C>,
        explorer: Arc<E>,
        store: Store,
        alpha: f64,
        forward: Option<SshForward>,
    ) -> Result<Self, Error> {
        let registry = AttackerRegistry::from_rows(store.attackers().await?);
        let eth_rate = explorer.eth_usd().await?;
        tracing::info!(eth_rate, "monitor ready");
        let contracts = Contracts::new(chain.clone(), explorer.clone());
        Ok(Self { chain, explorer, contracts, store, registry, eth_rate, alpha, forward })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Catch up from the persisted gap to the current head, then stop.
    pub async fn run(&self) -> Result<(), Error> {
        let latest = self.chain.latest_block_number().await?;
        let start = match self.store.blocks_gap(latest).await? {
            Some(gap) => (gap + 1).min(latest),
            None => latest,
        };
        tracing::info!(start, latest, behind = latest.saturating_sub(start), "catching up");
        for number in start..=latest {
            self.process_block(number).await?;
        }
        Ok(())
    }

    /// Full pipeline for one block, committed atomically.
    pub async fn process_block(&self, number: u64) -> Result<(), Error> {
        let mut outcome = detect::collect_block(
            self.chain.as_ref(),
            self.explorer.as_ref(),
            &self.registry,
            number,
        )
        .await?;
        saldo::apply_events(&self.contracts, &mut outcome.bundles).await;
        for bundle in outcome.bundles.values_mut() {
            valuation::finalize(bundle, self.eth_rate);
        }

        let classes = self.store.attack_classes().await?;
        let mut book = EmaBook::new(self.store.attack_emas().await?);
        let mut stored: Vec<StoredBundle> =
            outcome.bundles.values().map(|bundle| bundle.to_stored(0)).collect();

        let mut tx = self.store.begin().await?;
        self.store.add_block(&mut tx, &outcome.block).await?;
        self.store.add_bundles(&mut tx, &mut stored).await?;
        for (bundle, row) in outcome.bundles.values().zip(&stored) {
            self.store
                .add_bundle_transactions(&mut tx, row.bundle_id, &bundle.transactions)
                .await?;
        }
        self.store.add_events(&mut tx, outcome.events()).await?;
        let decoded: Vec<StoredBundle> =
            stored.iter().filter(|row| row.saldo.is_some()).cloned().collect();
        self.store.update_bundles(&mut tx, &decoded).await?;

        for row in &stored {
            if row.saldo.is_none() {
                continue;
            }
            let Some(ratio) = row.bribes_ratio else {
                continue;
            };
            let buckets = self.registry.report_buckets(row.attacker1);
            for class in &classes {
                if classify::matches(class, row) {
                    for bucket in &buckets {
                        self.store
                            .add_attack(
                                &mut tx,
                                row.bundle_id,
                                class.attack_class_id,
                                bucket,
                                number,
                                ratio,
                            )
                            .await?;
                        book.apply(class.attack_class_id, bucket, number, ratio, self.alpha);
                    }
                }
            }
        }
        for (key, row) in book.touched_rows() {
            self.store.update_attack_ema(&mut tx, key.0, &key.1, row).await?;
        }
        tx.commit().await?;
        tracing::info!(block = number, bundles = stored.len(), "block committed");
        Ok(())
    }

    /// Rebuild `t_attacks` and the EMA table from the persisted bundles,
    /// in (block, bundle) order.
    pub async fn recalc_attacks(&self) -> Result<(), Error> {
        let blocks = self.store.bundle_block_numbers().await?;
        let classes = self.store.attack_classes().await?;
        let mut all: Vec<StoredBundle> = Vec::new();
        for block in &blocks {
            all.extend(self.store.bundles(*block).await?);
        }
        tracing::info!(bundles = all.len(), "recalculating attacks");

        let mut book = EmaBook::default();
        let mut tx = self.store.begin().await?;
        self.store.delete_all_emas(&mut tx).await?;
        for row in &all {
            if row.saldo.is_none() {
                continue;
            }
            self.store.delete_attacks_for_bundle(&mut tx, row.bundle_id).await?;
            let Some(ratio) = row.bribes_ratio else {
                continue;
            };
            let buckets = self.registry.report_buckets(row.attacker1);
            for class in &classes {
                if classify::matches(class, row) {
                    for bucket in &buckets {
                        self.store
                            .add_attack(
                                &mut tx,
                                row.bundle_id,
                                class.attack_class_id,
                                bucket,
                                row.block_number,
                                ratio,
                            )
                            .await?;
                        book.apply(
                            class.attack_class_id,
                            bucket,
                            row.block_number,
                            ratio,
                            self.alpha,
                        );
                    }
                }
            }
        }
        for (key, row) in book.touched_rows() {
            self.store.update_attack_ema(&mut tx, key.0, &key.1, row).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Tear the monitor down, closing the ssh forward when one is open.
    pub async fn close(self) -> Result<(), Error> {
        if let Some(forward) = self.forward {
            forward.close().await?;
        }
        Ok(())
    }
}
