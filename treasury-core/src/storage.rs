//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `transactions` - Append-only transaction log (key: transaction id)
//! - `bank` - Singleton bank aggregate (fixed key)
//! - `indices` - Period index for fast period scans (key: period || txn id)
//!
//! Multi-row commits go through `WriteBatch`, so a movement's fact row and
//! the aggregate row land atomically: the log and the balance cannot
//! diverge on a crash between the two writes.

use crate::{
    error::{Error, Result},
    types::{BankAggregate, Page, Transaction, TransactionFilter, TransactionState},
    Config,
};
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_TRANSACTIONS: &str = "transactions";
const CF_BANK: &str = "bank";
const CF_INDICES: &str = "indices";

/// Fixed key of the singleton aggregate row
const BANK_KEY: &[u8] = b"bank";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy log
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
            ColumnFamilyDescriptor::new(CF_BANK, Self::cf_options_bank()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_bank() -> Options {
        let mut opts = Options::default();
        // One hot row, read often
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Index key: "<period>|<txn id bytes>"
    fn index_key_period_txn(period: &str, txn_id: Uuid) -> Vec<u8> {
        let mut key = period.as_bytes().to_vec();
        key.push(b'|');
        key.extend_from_slice(txn_id.as_bytes());
        key
    }

    // Transaction operations

    /// Get transaction by ID
    pub fn get_transaction(&self, id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        let value = self
            .db
            .get_cf(cf, id.as_bytes())?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let txn: Transaction = bincode::deserialize(&value)?;
        Ok(txn)
    }

    /// Append a transaction and write the updated aggregate in one batch
    pub fn apply_movement_atomic(&self, txn: &Transaction, bank: &BankAggregate) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_put_transaction(&mut batch, txn)?;
        self.batch_put_bank(&mut batch, bank)?;
        self.db.write(batch)?;

        tracing::debug!(
            txn_id = %txn.id,
            period = %txn.period,
            direction = %txn.direction,
            "Transaction appended"
        );

        Ok(())
    }

    /// Commit a reversal: compensating transaction, updated original,
    /// updated aggregate, all in one batch
    pub fn apply_reversal_atomic(
        &self,
        original: &Transaction,
        compensating: &Transaction,
        bank: &BankAggregate,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_put_transaction(&mut batch, compensating)?;
        // Original keeps its key and index; only state/linkage change
        let cf_txns = self.cf_handle(CF_TRANSACTIONS)?;
        batch.put_cf(cf_txns, original.id.as_bytes(), bincode::serialize(original)?);
        self.batch_put_bank(&mut batch, bank)?;
        self.db.write(batch)?;

        Ok(())
    }

    fn batch_put_transaction(&self, batch: &mut WriteBatch, txn: &Transaction) -> Result<()> {
        let cf_txns = self.cf_handle(CF_TRANSACTIONS)?;
        batch.put_cf(cf_txns, txn.id.as_bytes(), bincode::serialize(txn)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::index_key_period_txn(txn.period.as_str(), txn.id);
        batch.put_cf(cf_indices, &idx, b"");

        Ok(())
    }

    fn batch_put_bank(&self, batch: &mut WriteBatch, bank: &BankAggregate) -> Result<()> {
        let cf_bank = self.cf_handle(CF_BANK)?;
        batch.put_cf(cf_bank, BANK_KEY, bincode::serialize(bank)?);
        Ok(())
    }

    // Bank aggregate operations

    /// Get the singleton aggregate, if it exists yet
    pub fn get_bank(&self) -> Result<Option<BankAggregate>> {
        let cf = self.cf_handle(CF_BANK)?;

        match self.db.get_cf(cf, BANK_KEY)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Write the singleton aggregate
    pub fn put_bank(&self, bank: &BankAggregate) -> Result<()> {
        let cf = self.cf_handle(CF_BANK)?;
        self.db.put_cf(cf, BANK_KEY, bincode::serialize(bank)?)?;
        Ok(())
    }

    // Period queries

    /// All transactions of one period, via the period index
    pub fn transactions_for_period(&self, period: &str) -> Result<Vec<Transaction>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut prefix = period.as_bytes().to_vec();
        prefix.push(b'|');

        let iter = self.db.prefix_iterator_cf(cf_indices, &prefix);

        let mut txns = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            let id_bytes: [u8; 16] = key[prefix.len()..]
                .try_into()
                .map_err(|_| Error::Storage("Malformed period index key".to_string()))?;
            txns.push(self.get_transaction(Uuid::from_bytes(id_bytes))?);
        }

        Ok(txns)
    }

    /// Bulk-transition a period's in-flight transactions to consolidated.
    ///
    /// Idempotent: only rows still in-flight are touched, so a partial
    /// failure is repaired by running the transition again.
    pub fn mark_period_consolidated(
        &self,
        period: &str,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let txns = self.transactions_for_period(period)?;
        let cf_txns = self.cf_handle(CF_TRANSACTIONS)?;

        let mut batch = WriteBatch::default();
        let mut moved = 0u64;
        for mut txn in txns {
            if txn.state != TransactionState::InFlight {
                continue;
            }
            txn.state = TransactionState::Consolidated;
            txn.consolidated_at = Some(at);
            txn.consolidated_by = Some(actor.to_string());
            batch.put_cf(cf_txns, txn.id.as_bytes(), bincode::serialize(&txn)?);
            moved += 1;
        }

        if moved > 0 {
            self.db.write(batch)?;
        }

        Ok(moved)
    }

    /// List transactions matching a filter, newest first, paginated
    pub fn list_transactions(&self, filter: &TransactionFilter) -> Result<Page<Transaction>> {
        let mut matches = if let Some(ref period) = filter.period {
            self.transactions_for_period(period.as_str())?
                .into_iter()
                .filter(|t| filter.matches(t))
                .collect::<Vec<_>>()
        } else {
            let cf = self.cf_handle(CF_TRANSACTIONS)?;
            let mut txns = Vec::new();
            for item in self.db.iterator_cf(cf, IteratorMode::Start) {
                let (_, value) = item?;
                let txn: Transaction = bincode::deserialize(&value)?;
                if filter.matches(&txn) {
                    txns.push(txn);
                }
            }
            txns
        };

        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matches.len();
        let limit = filter.effective_limit();
        let items = matches
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .collect();

        Ok(Page {
            items,
            total,
            offset: filter.offset,
            limit,
        })
    }

    /// Approximate transaction count
    pub fn transaction_count(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let count = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);
        Ok(count)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::types::{Direction, Origin, Period};
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    fn test_transaction(period: &str, direction: Direction, amount_stored: i64) -> Transaction {
        Transaction {
            id: Uuid::now_v7(),
            period: Period::parse(period).unwrap(),
            direction,
            origin: Origin::ModelEarnings,
            amount_stored,
            currency: Currency::EUR,
            reason: "test movement".to_string(),
            reference: None,
            owner_ref: None,
            created_by: "system".to_string(),
            created_at: Utc::now(),
            state: TransactionState::InFlight,
            consolidated_at: None,
            consolidated_by: None,
            reverted_by: None,
            reversal_reason: None,
            reverted_at: None,
        }
    }

    fn test_bank() -> BankAggregate {
        BankAggregate::new(Currency::EUR, Period::parse("2025-10").unwrap())
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_TRANSACTIONS).is_some());
        assert!(storage.db.cf_handle(CF_BANK).is_some());
    }

    #[test]
    fn test_atomic_append_and_get() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let txn = test_transaction("2025-10", Direction::Inflow, 100_000);
        let mut bank = test_bank();
        bank.in_flight_stored = txn.signed_stored();

        storage.apply_movement_atomic(&txn, &bank).unwrap();

        let retrieved = storage.get_transaction(txn.id).unwrap();
        assert_eq!(retrieved.id, txn.id);
        assert_eq!(retrieved.amount_stored, 100_000);

        let bank = storage.get_bank().unwrap().unwrap();
        assert_eq!(bank.in_flight_stored, 100_000);
    }

    #[test]
    fn test_get_missing_transaction() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let result = storage.get_transaction(Uuid::now_v7());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_bank_starts_absent() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.get_bank().unwrap().is_none());
    }

    #[test]
    fn test_transactions_for_period() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        let bank = test_bank();

        for _ in 0..3 {
            let txn = test_transaction("2025-10", Direction::Inflow, 100_000);
            storage.apply_movement_atomic(&txn, &bank).unwrap();
        }
        let other = test_transaction("2025-11", Direction::Outflow, 50_000);
        storage.apply_movement_atomic(&other, &bank).unwrap();

        let txns = storage.transactions_for_period("2025-10").unwrap();
        assert_eq!(txns.len(), 3);
        assert!(txns.iter().all(|t| t.period.as_str() == "2025-10"));
    }

    #[test]
    fn test_mark_period_consolidated_idempotent() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        let bank = test_bank();

        for _ in 0..2 {
            let txn = test_transaction("2025-10", Direction::Inflow, 100_000);
            storage.apply_movement_atomic(&txn, &bank).unwrap();
        }

        let moved = storage
            .mark_period_consolidated("2025-10", "ops", Utc::now())
            .unwrap();
        assert_eq!(moved, 2);

        // Re-running touches nothing
        let moved = storage
            .mark_period_consolidated("2025-10", "ops", Utc::now())
            .unwrap();
        assert_eq!(moved, 0);

        let txns = storage.transactions_for_period("2025-10").unwrap();
        assert!(txns
            .iter()
            .all(|t| t.state == TransactionState::Consolidated));
        assert!(txns.iter().all(|t| t.consolidated_by.as_deref() == Some("ops")));
    }

    #[test]
    fn test_list_transactions_newest_first_and_paginated() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        let bank = test_bank();

        let mut ids = Vec::new();
        for i in 0..5 {
            let mut txn = test_transaction("2025-10", Direction::Inflow, 100_000 + i);
            txn.created_at = Utc::now() + chrono::Duration::milliseconds(i);
            storage.apply_movement_atomic(&txn, &bank).unwrap();
            ids.push(txn.id);
        }

        let page = storage
            .list_transactions(&TransactionFilter {
                limit: 2,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        // Newest (last appended) first
        assert_eq!(page.items[0].id, ids[4]);
        assert_eq!(page.items[1].id, ids[3]);

        let page = storage
            .list_transactions(&TransactionFilter {
                limit: 2,
                offset: 4,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, ids[0]);
    }

    #[test]
    fn test_list_transactions_filters() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        let bank = test_bank();

        let mut earning = test_transaction("2025-10", Direction::Inflow, 100_000);
        earning.owner_ref = Some("model-7".to_string());
        storage.apply_movement_atomic(&earning, &bank).unwrap();

        let mut cost = test_transaction("2025-10", Direction::Outflow, 50_000);
        cost.origin = Origin::FixedCost;
        storage.apply_movement_atomic(&cost, &bank).unwrap();

        let page = storage
            .list_transactions(&TransactionFilter {
                period: Some(Period::parse("2025-10").unwrap()),
                direction: Some(Direction::Outflow),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].origin, Origin::FixedCost);

        let page = storage
            .list_transactions(&TransactionFilter {
                owner_ref: Some("model-7".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, earning.id);
    }
}
