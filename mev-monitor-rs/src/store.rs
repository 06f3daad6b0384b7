use crate::{
    error::Error,
    types::{
        rates_from_json, rates_to_json, AttackClass, AttackerRow, AttackerStatus, BlockData,
        EmaRow, Features, MonitorOutputRow, Rules, StoredBundle, TxRecord,
    },
};
use crate::ema::EmaKey;
use crate::types::EventRecord;
use ethers::types::{Address, H256, U256};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row, Sqlite, Transaction,
};
use std::str::FromStr;

pub type StoreTx<'a> = Transaction<'a, Sqlite>;

/// Typed persistence layer over SQLite. One writer; every per-block write
/// set goes through a single transaction.
pub struct Store {
    pool: SqlitePool,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS t_blocks (
        blockNumber INTEGER NOT NULL PRIMARY KEY,
        baseFeePerGas TEXT,
        blockHash TEXT,
        miner TEXT)",
    "CREATE TABLE IF NOT EXISTS t_transactions (
        hash TEXT NOT NULL PRIMARY KEY,
        blockNumber INTEGER,
        transactionIndex INTEGER,
        bundleId INTEGER,
        fromTx TEXT,
        toTx TEXT,
        gasUsed TEXT,
        gasPrice TEXT,
        maxFeePerGas TEXT,
        maxPriorityFeePerGas TEXT,
        gasBurnt TEXT,
        gasOverpay TEXT,
        directBribe TEXT,
        value TEXT,
        role INTEGER)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_block ON t_transactions (blockNumber)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_bundle ON t_transactions (bundleId)",
    "CREATE TABLE IF NOT EXISTS t_events (
        eventId INTEGER PRIMARY KEY AUTOINCREMENT,
        blockNumber INTEGER,
        transactionHash TEXT,
        address TEXT,
        data TEXT)",
    "CREATE INDEX IF NOT EXISTS idx_events_block ON t_events (blockNumber)",
    "CREATE INDEX IF NOT EXISTS idx_events_tx ON t_events (transactionHash)",
    "CREATE TABLE IF NOT EXISTS t_event_topics (
        eventId INTEGER NOT NULL,
        topicIndex INTEGER NOT NULL,
        topic TEXT,
        PRIMARY KEY (eventId, topicIndex))",
    "CREATE TABLE IF NOT EXISTS t_bundles (
        bundleId INTEGER PRIMARY KEY AUTOINCREMENT,
        blockNumber INTEGER,
        attacker0 TEXT,
        attacker1 TEXT,
        directBribe REAL,
        gasBurnt REAL,
        gasOverpay REAL,
        profitEstimation REAL,
        bribesRatio REAL,
        totalCapital REAL,
        capitalRequirements TEXT,
        saldo TEXT,
        rates TEXT,
        features TEXT)",
    "CREATE INDEX IF NOT EXISTS idx_bundles_block ON t_bundles (blockNumber)",
    "CREATE TABLE IF NOT EXISTS t_attackers (
        attackerId INTEGER PRIMARY KEY AUTOINCREMENT,
        tx_from TEXT,
        tx_to TEXT,
        status INTEGER,
        note TEXT,
        report INTEGER)",
    "CREATE TABLE IF NOT EXISTS t_attack_classes (
        attackClassId INTEGER PRIMARY KEY AUTOINCREMENT,
        attackClass TEXT,
        rules TEXT)",
    "CREATE TABLE IF NOT EXISTS t_attacks (
        bundleId INTEGER NOT NULL,
        attackClassId INTEGER NOT NULL,
        attacker TEXT NOT NULL,
        blockNumber INTEGER NOT NULL,
        bribesRatio REAL,
        PRIMARY KEY (bundleId, attackClassId, attacker))",
    "CREATE TABLE IF NOT EXISTS t_attack_EMAs (
        attackClassId INTEGER NOT NULL,
        attacker TEXT NOT NULL,
        countAttacks INTEGER,
        lastBlockNumber INTEGER,
        bribesRatio REAL,
        bribesRatioEMA REAL,
        PRIMARY KEY (attackClassId, attacker))",
];

fn addr_str(address: &Address) -> String {
    format!("{address:#x}")
}

fn decode_err(message: impl std::fmt::Display) -> Error {
    Error::Store(sqlx::Error::Decode(message.to_string().into()))
}

fn parse_addr(raw: &str) -> Result<Address, Error> {
    raw.parse().map_err(|err| decode_err(format!("bad address `{raw}`: {err}")))
}

fn parse_wei(raw: &str) -> Result<U256, Error> {
    U256::from_dec_str(raw).map_err(|err| decode_err(format!("bad wei value `{raw}`: {err}")))
}

/// An event as stored, hex fields kept verbatim.
#[derive(Clone, Debug)]
pub struct StoredEvent {
    pub event_id: i64,
    pub block_number: u64,
    pub transaction_hash: String,
    pub address: String,
    pub data: String,
    pub topics: Vec<String>,
}

impl Store {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(Error::Store)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> Result<(), Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn begin(&self) -> Result<StoreTx<'_>, Error> {
        Ok(self.pool.begin().await?)
    }

    pub async fn add_block(&self, tx: &mut StoreTx<'_>, block: &BlockData) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO t_blocks (blockNumber, baseFeePerGas, blockHash, miner) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(block.number as i64)
        .bind(block.base_fee_per_gas.to_string())
        .bind(&block.hash)
        .bind(addr_str(&block.miner))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Insert bundle frames; each bundle receives its assigned row id.
    pub async fn add_bundles(
        &self,
        tx: &mut StoreTx<'_>,
        bundles: &mut [StoredBundle],
    ) -> Result<(), Error> {
        for bundle in bundles {
            let result = sqlx::query(
                "INSERT INTO t_bundles \
                 (blockNumber, attacker0, attacker1, directBribe, gasBurnt, gasOverpay) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(bundle.block_number as i64)
            .bind(bundle.attacker0.as_ref().map(addr_str))
            .bind(addr_str(&bundle.attacker1))
            .bind(bundle.direct_bribe)
            .bind(bundle.gas_burnt)
            .bind(bundle.gas_overpay)
            .execute(&mut **tx)
            .await?;
            bundle.bundle_id = result.last_insert_rowid();
        }
        Ok(())
    }

    pub async fn add_bundle_transactions(
        &self,
        tx: &mut StoreTx<'_>,
        bundle_id: i64,
        transactions: &[TxRecord],
    ) -> Result<(), Error> {
        for record in transactions {
            sqlx::query(
                "INSERT INTO t_transactions \
                 (hash, blockNumber, transactionIndex, bundleId, fromTx, toTx, gasUsed, gasPrice, \
                  maxFeePerGas, maxPriorityFeePerGas, gasBurnt, gasOverpay, directBribe, value, role) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(format!("{:#x}", record.hash))
            .bind(record.block_number as i64)
            .bind(record.index as i64)
            .bind(bundle_id)
            .bind(addr_str(&record.from))
            .bind(addr_str(&record.to))
            .bind(record.gas_used.to_string())
            .bind(record.gas_price.to_string())
            .bind(record.max_fee_per_gas.map(|v| v.to_string()))
            .bind(record.max_priority_fee_per_gas.map(|v| v.to_string()))
            .bind(record.gas_burnt.to_string())
            .bind(record.gas_overpay.to_string())
            .bind(record.direct_bribe.to_string())
            .bind(record.value.to_string())
            .bind(record.role)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    pub async fn add_events<'a>(
        &self,
        tx: &mut StoreTx<'_>,
        events: impl Iterator<Item = &'a EventRecord>,
    ) -> Result<(), Error> {
        for event in events {
            let mut data = format!("0x{}", hex::encode(&event.data));
            data.truncate(2048);
            let result = sqlx::query(
                "INSERT INTO t_events (blockNumber, transactionHash, address, data) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(event.block_number as i64)
            .bind(format!("{:#x}", event.tx_hash))
            .bind(addr_str(&event.address))
            .bind(data)
            .execute(&mut **tx)
            .await?;
            let event_id = result.last_insert_rowid();
            for (index, topic) in event.topics.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO t_event_topics (eventId, topicIndex, topic) VALUES (?, ?, ?)",
                )
                .bind(event_id)
                .bind(index as i64)
                .bind(format!("{topic:#x}"))
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }

    /// Write recomputed valuation and the JSON columns for decoded bundles.
    pub async fn update_bundles(
        &self,
        tx: &mut StoreTx<'_>,
        bundles: &[StoredBundle],
    ) -> Result<(), Error> {
        for bundle in bundles {
            let capital = bundle
                .capital_requirements
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let saldo = bundle.saldo.as_ref().map(serde_json::to_string).transpose()?;
            let rates = bundle
                .rates
                .as_ref()
                .map(|rates| serde_json::to_string(&rates_to_json(rates)))
                .transpose()?;
            let features = bundle.features.as_ref().map(serde_json::to_string).transpose()?;
            sqlx::query(
                "UPDATE t_bundles SET directBribe = ?, gasBurnt = ?, gasOverpay = ?, \
                 profitEstimation = ?, totalCapital = ?, bribesRatio = ?, \
                 capitalRequirements = ?, saldo = ?, rates = ?, features = ? \
                 WHERE bundleId = ?",
            )
            .bind(bundle.direct_bribe)
            .bind(bundle.gas_burnt)
            .bind(bundle.gas_overpay)
            .bind(bundle.profit_estimation)
            .bind(bundle.total_capital)
            .bind(bundle.bribes_ratio)
            .bind(capital)
            .bind(saldo)
            .bind(rates)
            .bind(features)
            .bind(bundle.bundle_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Cascading delete of everything derived from one block.
    pub async fn clean_block(&self, number: u64) -> Result<(), Error> {
        let mut tx = self.begin().await?;
        let statements = [
            "DELETE FROM t_event_topics WHERE eventId IN \
             (SELECT eventId FROM t_events WHERE blockNumber = ?)",
            "DELETE FROM t_events WHERE blockNumber = ?",
            "DELETE FROM t_attacks WHERE blockNumber = ?",
            "DELETE FROM t_bundles WHERE blockNumber = ?",
            "DELETE FROM t_transactions WHERE blockNumber = ?",
            "DELETE FROM t_blocks WHERE blockNumber = ?",
        ];
        for statement in statements {
            sqlx::query(statement).bind(number as i64).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Highest persisted block strictly below `latest`.
    pub async fn blocks_gap(&self, latest: u64) -> Result<Option<u64>, Error> {
        let row: (Option<i64>,) =
            sqlx::query_as("SELECT max(blockNumber) FROM t_blocks WHERE blockNumber < ?")
                .bind(latest as i64)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0.map(|n| n as u64))
    }

    pub async fn block(&self, number: u64) -> Result<Option<BlockData>, Error> {
        let row = sqlx::query("SELECT * FROM t_blocks WHERE blockNumber = ?")
            .bind(number as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(BlockData {
                number: row.try_get::<i64, _>("blockNumber")? as u64,
                base_fee_per_gas: parse_wei(&row.try_get::<String, _>("baseFeePerGas")?)?,
                hash: row.try_get("blockHash")?,
                miner: parse_addr(&row.try_get::<String, _>("miner")?)?,
            })
        })
        .transpose()
    }

    pub async fn attackers(&self) -> Result<Vec<AttackerRow>, Error> {
        let rows = sqlx::query("SELECT * FROM t_attackers ORDER BY attackerId")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let from: Option<String> = row.try_get("tx_from")?;
                Ok(AttackerRow {
                    attacker_id: row.try_get("attackerId")?,
                    from: from.as_deref().map(parse_addr).transpose()?,
                    to: parse_addr(&row.try_get::<String, _>("tx_to")?)?,
                    status: AttackerStatus::from_i64(row.try_get("status")?),
                    note: row.try_get("note")?,
                    report: row.try_get::<Option<i64>, _>("report")?.unwrap_or(0),
                })
            })
            .collect()
    }

    pub async fn add_attacker(
        &self,
        from: Option<Address>,
        to: Address,
        status: AttackerStatus,
        note: Option<&str>,
        report: i64,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO t_attackers (tx_from, tx_to, status, note, report) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(from.as_ref().map(addr_str))
        .bind(addr_str(&to))
        .bind(status.as_i64())
        .bind(note)
        .bind(report)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn attack_classes(&self) -> Result<Vec<AttackClass>, Error> {
        let rows = sqlx::query("SELECT * FROM t_attack_classes ORDER BY attackClassId")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let rules: Option<String> = row.try_get("rules")?;
                let rules: Rules = match rules {
                    Some(raw) => serde_json::from_str(&raw)?,
                    None => Rules::new(),
                };
                Ok(AttackClass {
                    attack_class_id: row.try_get("attackClassId")?,
                    name: row.try_get("attackClass")?,
                    rules,
                })
            })
            .collect()
    }

    /// Replace any same-named class and return the new id.
    pub async fn add_attack_class(&self, name: &str, rules: &Rules) -> Result<i64, Error> {
        sqlx::query("DELETE FROM t_attack_classes WHERE attackClass = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        let result = sqlx::query("INSERT INTO t_attack_classes (attackClass, rules) VALUES (?, ?)")
            .bind(name)
            .bind(serde_json::to_string(rules)?)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn attack_emas(&self) -> Result<Vec<(EmaKey, EmaRow)>, Error> {
        let rows = sqlx::query("SELECT * FROM t_attack_EMAs").fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let key = (row.try_get("attackClassId")?, row.try_get("attacker")?);
                let value = EmaRow {
                    count_attacks: row.try_get::<Option<i64>, _>("countAttacks")?.unwrap_or(0),
                    last_block_number: row
                        .try_get::<Option<i64>, _>("lastBlockNumber")?
                        .map(|n| n as u64),
                    last_bribes_ratio: row.try_get("bribesRatio")?,
                    bribes_ratio_ema: row.try_get("bribesRatioEMA")?,
                };
                Ok((key, value))
            })
            .collect()
    }

    pub async fn add_attack(
        &self,
        tx: &mut StoreTx<'_>,
        bundle_id: i64,
        attack_class_id: i64,
        attacker: &str,
        block_number: u64,
        bribes_ratio: f64,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO t_attacks (bundleId, attackClassId, attacker, blockNumber, bribesRatio) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(bundle_id)
        .bind(attack_class_id)
        .bind(attacker)
        .bind(block_number as i64)
        .bind(bribes_ratio)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn update_attack_ema(
        &self,
        tx: &mut StoreTx<'_>,
        attack_class_id: i64,
        attacker: &str,
        row: &EmaRow,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO t_attack_EMAs \
             (attackClassId, attacker, countAttacks, lastBlockNumber, bribesRatio, bribesRatioEMA) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (attackClassId, attacker) DO UPDATE SET \
             countAttacks = excluded.countAttacks, lastBlockNumber = excluded.lastBlockNumber, \
             bribesRatio = excluded.bribesRatio, bribesRatioEMA = excluded.bribesRatioEMA",
        )
        .bind(attack_class_id)
        .bind(attacker)
        .bind(row.count_attacks)
        .bind(row.last_block_number.map(|n| n as i64))
        .bind(row.last_bribes_ratio)
        .bind(row.bribes_ratio_ema)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn delete_attacks_for_bundle(
        &self,
        tx: &mut StoreTx<'_>,
        bundle_id: i64,
    ) -> Result<(), Error> {
        sqlx::query("DELETE FROM t_attacks WHERE bundleId = ?")
            .bind(bundle_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn delete_all_emas(&self, tx: &mut StoreTx<'_>) -> Result<(), Error> {
        sqlx::query("DELETE FROM t_attack_EMAs").execute(&mut **tx).await?;
        Ok(())
    }

    pub async fn bundle_block_numbers(&self) -> Result<Vec<u64>, Error> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT DISTINCT blockNumber FROM t_bundles ORDER BY blockNumber")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(n,)| n as u64).collect())
    }

    pub async fn bundles(&self, block_number: u64) -> Result<Vec<StoredBundle>, Error> {
        let rows =
            sqlx::query("SELECT * FROM t_bundles WHERE blockNumber = ? ORDER BY bundleId")
                .bind(block_number as i64)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(bundle_from_row).collect()
    }

    pub async fn transactions(&self, block_number: u64) -> Result<Vec<TxRecord>, Error> {
        let rows = sqlx::query(
            "SELECT * FROM t_transactions WHERE blockNumber = ? ORDER BY transactionIndex",
        )
        .bind(block_number as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let hash: String = row.try_get("hash")?;
                Ok(TxRecord {
                    hash: hash
                        .parse::<H256>()
                        .map_err(|err| decode_err(format!("bad hash `{hash}`: {err}")))?,
                    block_number: row.try_get::<i64, _>("blockNumber")? as u64,
                    index: row.try_get::<i64, _>("transactionIndex")? as u64,
                    from: parse_addr(&row.try_get::<String, _>("fromTx")?)?,
                    to: parse_addr(&row.try_get::<String, _>("toTx")?)?,
                    gas_used: parse_wei(&row.try_get::<String, _>("gasUsed")?)?,
                    gas_price: parse_wei(&row.try_get::<String, _>("gasPrice")?)?,
                    max_fee_per_gas: row
                        .try_get::<Option<String>, _>("maxFeePerGas")?
                        .as_deref()
                        .map(parse_wei)
                        .transpose()?,
                    max_priority_fee_per_gas: row
                        .try_get::<Option<String>, _>("maxPriorityFeePerGas")?
                        .as_deref()
                        .map(parse_wei)
                        .transpose()?,
                    gas_burnt: parse_wei(&row.try_get::<String, _>("gasBurnt")?)?,
                    gas_overpay: parse_wei(&row.try_get::<String, _>("gasOverpay")?)?,
                    direct_bribe: parse_wei(&row.try_get::<String, _>("directBribe")?)?,
                    value: parse_wei(&row.try_get::<String, _>("value")?)?,
                    role: row.try_get("role")?,
                })
            })
            .collect()
    }

    pub async fn events(&self, block_number: u64) -> Result<Vec<StoredEvent>, Error> {
        let rows = sqlx::query("SELECT * FROM t_events WHERE blockNumber = ? ORDER BY eventId")
            .bind(block_number as i64)
            .fetch_all(&self.pool)
            .await?;
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_id: i64 = row.try_get("eventId")?;
            let topics: Vec<(String,)> = sqlx::query_as(
                "SELECT topic FROM t_event_topics WHERE eventId = ? ORDER BY topicIndex",
            )
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
            events.push(StoredEvent {
                event_id,
                block_number: row.try_get::<i64, _>("blockNumber")? as u64,
                transaction_hash: row.try_get("transactionHash")?,
                address: row.try_get("address")?,
                data: row.try_get("data")?,
                topics: topics.into_iter().map(|(topic,)| topic).collect(),
            });
        }
        Ok(events)
    }

    /// Dashboard summary: EMA rows joined with their class names.
    pub async fn monitor_output(&self) -> Result<Vec<MonitorOutputRow>, Error> {
        let rows = sqlx::query(
            "SELECT attackClass, attacker, countAttacks, lastBlockNumber, \
             t_attack_EMAs.bribesRatio AS lastBribesRatio, bribesRatioEMA \
             FROM t_attack_EMAs INNER JOIN t_attack_classes \
             ON t_attack_EMAs.attackClassId = t_attack_classes.attackClassId \
             ORDER BY attackClass, attacker",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(MonitorOutputRow {
                    attack_class: row.try_get("attackClass")?,
                    attacker: row.try_get("attacker")?,
                    count_attacks: row.try_get::<Option<i64>, _>("countAttacks")?.unwrap_or(0),
                    last_block_number: row
                        .try_get::<Option<i64>, _>("lastBlockNumber")?
                        .map(|n| n as u64),
                    last_bribes_ratio: row.try_get("lastBribesRatio")?,
                    bribes_ratio_ema: row.try_get("bribesRatioEMA")?,
                })
            })
            .collect()
    }

    /// Per-(class, bucket) attack history, oldest first, at most `limit`
    /// most recent entries.
    pub async fn attack_history(
        &self,
        attack_class_id: i64,
        attacker: &str,
        limit: u32,
    ) -> Result<Vec<(u64, Option<f64>)>, Error> {
        let rows: Vec<(i64, Option<f64>)> = sqlx::query_as(
            "SELECT blockNumber, bribesRatio FROM t_attacks \
             WHERE attackClassId = ? AND attacker = ? ORDER BY blockNumber DESC LIMIT ?",
        )
        .bind(attack_class_id)
        .bind(attacker)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().rev().map(|(n, ratio)| (n as u64, ratio)).collect())
    }
}

fn bundle_from_row(row: &SqliteRow) -> Result<StoredBundle, Error> {
    let attacker0: Option<String> = row.try_get("attacker0")?;
    let capital: Option<String> = row.try_get("capitalRequirements")?;
    let saldo: Option<String> = row.try_get("saldo")?;
    let rates: Option<String> = row.try_get("rates")?;
    let features: Option<String> = row.try_get("features")?;
    Ok(StoredBundle {
        bundle_id: row.try_get("bundleId")?,
        block_number: row.try_get::<i64, _>("blockNumber")? as u64,
        attacker0: attacker0.as_deref().map(parse_addr).transpose()?,
        attacker1: parse_addr(&row.try_get::<String, _>("attacker1")?)?,
        direct_bribe: row.try_get::<Option<f64>, _>("directBribe")?.unwrap_or(0.0),
        gas_burnt: row.try_get::<Option<f64>, _>("gasBurnt")?.unwrap_or(0.0),
        gas_overpay: row.try_get::<Option<f64>, _>("gasOverpay")?.unwrap_or(0.0),
        profit_estimation: row.try_get("profitEstimation")?,
        bribes_ratio: row.try_get("bribesRatio")?,
        total_capital: row.try_get("totalCapital")?,
        capital_requirements: capital.as_deref().map(serde_json::from_str).transpose()?,
        saldo: saldo.as_deref().map(serde_json::from_str).transpose()?,
        rates: rates
            .as_deref()
            .map(|raw| -> Result<_, Error> {
                let value: serde_json::Value = serde_json::from_str(raw)?;
                rates_from_json(&value).ok_or_else(|| decode_err("unparseable rates column"))
            })
            .transpose()?,
        features: features.as_deref().map(serde_json::from_str).transpose()?,
    })
}
