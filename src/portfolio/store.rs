//! Key-value persistence for the ledger and last seen prices
//!
//! Values are opaque JSON strings by key. Reading a value that is missing
//! or malformed falls back to a default instead of failing.

use super::ledger::PortfolioLedger;
use super::types::{HoldingPosition, QuickAddPreset};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cash balance key
pub const CASH_KEY: &str = "cash_krw";
/// Positions key
pub const HOLDINGS_KEY: &str = "holdings";

/// Key for an asset's last live price
pub fn last_live_key(asset_id: &str) -> String {
    format!("{}_last_live", asset_id.to_lowercase())
}

/// String store addressed by key
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: String) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file
///
/// Every write rewrites the file through a sibling temp file and rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> anyhow::Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Read and decode `key`, falling back to `default` when missing or unreadable
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return default,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read stored value");
            return default;
        }
    };

    match serde_json::from_str::<Option<T>>(&raw) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring malformed stored value");
            default
        }
    }
}

/// Encode and write `value` under `key`
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    store.set(key, serde_json::to_string(value)?)
}

/// Ledger and last-price persistence on top of a [`KeyValueStore`]
#[derive(Clone)]
pub struct PortfolioStore {
    store: Arc<dyn KeyValueStore>,
    initial_cash: Decimal,
}

impl PortfolioStore {
    pub fn new(store: Arc<dyn KeyValueStore>, initial_cash: Decimal) -> Self {
        Self {
            store,
            initial_cash,
        }
    }

    /// File-backed store at `path`
    pub fn open(path: impl Into<PathBuf>, initial_cash: Decimal) -> Self {
        Self::new(Arc::new(JsonFileStore::new(path)), initial_cash)
    }

    /// Stored ledger; a fresh one starts with the initial cash and the BTC preset
    pub fn load(&self) -> PortfolioLedger {
        let cash = load_json(self.store.as_ref(), CASH_KEY, self.initial_cash);
        let positions = load_json::<Vec<HoldingPosition>>(
            self.store.as_ref(),
            HOLDINGS_KEY,
            vec![QuickAddPreset::BTC.to_position()],
        );
        PortfolioLedger::with_positions(cash, positions)
    }

    pub fn save(&self, ledger: &PortfolioLedger) -> anyhow::Result<()> {
        save_json(self.store.as_ref(), CASH_KEY, &ledger.cash())?;
        save_json(self.store.as_ref(), HOLDINGS_KEY, ledger.positions())?;
        tracing::debug!(positions = ledger.positions().len(), "Portfolio saved");
        Ok(())
    }

    /// Last live price for an asset, if a positive one was stored
    pub fn last_live(&self, asset_id: &str) -> Option<Decimal> {
        load_json::<Option<Decimal>>(self.store.as_ref(), &last_live_key(asset_id), None)
            .filter(|p| *p > Decimal::ZERO)
    }

    /// Stored last live prices for the given assets
    pub fn last_live_prices(&self, asset_ids: &[String]) -> HashMap<String, Decimal> {
        asset_ids
            .iter()
            .filter_map(|id| Some((id.clone(), self.last_live(id)?)))
            .collect()
    }

    pub fn save_last_live(&self, asset_id: &str, price: Decimal) -> anyhow::Result<()> {
        save_json(self.store.as_ref(), &last_live_key(asset_id), &price)
    }
}
